//! Registry of running sessions and their eviction.
//!
//! Sessions are keyed by file, stream, representation and window, so every
//! segment request for the same window lands on the same encoder. Sessions
//! nobody has asked for in a while are destroyed by a periodic cleanup task,
//! which is what bounds the number of live encoder processes.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use sf_core::Result;
use tokio::sync::OnceCell;

use crate::resolver::StreamRepresentation;
use crate::session::{SessionInfo, SessionOptions, TranscodingSession};

/// Identifies the encoder work for one window of one rendition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub file: PathBuf,
    pub stream_index: u32,
    pub representation_id: String,
    /// First segment id of the window.
    pub first_segment_id: u64,
}

/// A registry entry. The session is created at most once, by whichever
/// request gets there first; concurrent requests wait for that one.
struct Slot {
    session: OnceCell<Arc<TranscodingSession>>,
    last_access: Mutex<Instant>,
}

impl Slot {
    fn new() -> Self {
        Self {
            session: OnceCell::new(),
            last_access: Mutex::new(Instant::now()),
        }
    }

    fn touch(&self) {
        *self.last_access.lock() = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        self.last_access.lock().elapsed()
    }
}

/// A running session together with its access bookkeeping.
#[derive(Debug, Clone, Serialize)]
pub struct ManagedSessionInfo {
    #[serde(flatten)]
    pub session: SessionInfo,
    pub idle_secs: u64,
}

/// Thread-safe registry of transcoding sessions.
#[derive(Clone)]
pub struct SessionManager {
    sessions: Arc<DashMap<SessionKey, Arc<Slot>>>,
    options: Arc<SessionOptions>,
    /// Sessions idle for longer than this are destroyed by cleanup.
    idle_timeout: Duration,
}

impl SessionManager {
    pub fn new(options: SessionOptions, idle_timeout: Duration) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            options: Arc::new(options),
            idle_timeout,
        }
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// The session producing `segment_id` of `sr`, starting it if needed.
    ///
    /// Concurrent calls for the same window share one session and spawn
    /// exactly one encoder. A failed start is reported to every waiting
    /// caller's own attempt and leaves nothing registered.
    pub async fn get_or_start(
        &self,
        sr: &StreamRepresentation,
        segment_id: u64,
    ) -> Result<Arc<TranscodingSession>> {
        let window = sr.find_window(segment_id)?;
        let key = SessionKey {
            file: sr.stream.file.clone(),
            stream_index: sr.stream.index(),
            representation_id: sr.representation.id.to_string(),
            first_segment_id: window.first_segment_id(),
        };

        let slot = self
            .sessions
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Slot::new()))
            .clone();
        slot.touch();

        let started = slot
            .session
            .get_or_try_init(|| async {
                let session = TranscodingSession::new(sr, segment_id, &self.options)?;
                session.start().await?;
                Ok(Arc::new(session))
            })
            .await;

        match started {
            Ok(session) => Ok(session.clone()),
            Err(e) => {
                self.sessions
                    .remove_if(&key, |_, existing| Arc::ptr_eq(existing, &slot) && existing.session.get().is_none());
                Err(e)
            }
        }
    }

    /// Snapshot of every running session.
    pub fn list(&self) -> Vec<ManagedSessionInfo> {
        let mut out: Vec<ManagedSessionInfo> = self
            .sessions
            .iter()
            .filter_map(|entry| {
                let slot = entry.value();
                slot.session.get().map(|session| ManagedSessionInfo {
                    session: session.info(),
                    idle_secs: slot.idle_for().as_secs(),
                })
            })
            .collect();
        out.sort_by(|a, b| a.session.created_at.cmp(&b.session.created_at));
        out
    }

    /// Number of registered sessions, including ones still starting.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Destroy sessions that have not been accessed within the idle timeout.
    ///
    /// Returns the number of sessions removed.
    pub async fn cleanup_idle_sessions(&self) -> usize {
        let idle_timeout = self.idle_timeout;
        let expired: Vec<SessionKey> = self
            .sessions
            .iter()
            .filter(|entry| {
                let slot = entry.value();
                slot.session.initialized() && slot.idle_for() > idle_timeout
            })
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed = 0;
        for key in expired {
            // Re-check: a request may have touched it since the scan.
            let Some((_, slot)) = self
                .sessions
                .remove_if(&key, |_, slot| slot.idle_for() > idle_timeout)
            else {
                continue;
            };
            if let Some(session) = slot.session.get() {
                tracing::info!(
                    session_id = %session.id(),
                    file = %key.file.display(),
                    first_segment = key.first_segment_id,
                    inactive_secs = slot.idle_for().as_secs(),
                    "Evicting idle session"
                );
                if let Err(e) = session.destroy().await {
                    tracing::warn!(session_id = %session.id(), error = %e, "Failed to destroy idle session");
                }
            }
            removed += 1;
        }

        if removed > 0 {
            tracing::debug!(removed, "Cleaned up idle sessions");
        }
        removed
    }

    /// Destroy every session. Returns the number destroyed.
    pub async fn shutdown(&self) -> usize {
        let keys: Vec<SessionKey> = self.sessions.iter().map(|e| e.key().clone()).collect();
        let mut destroyed = 0;
        for key in keys {
            let Some((_, slot)) = self.sessions.remove(&key) else {
                continue;
            };
            if let Some(session) = slot.session.get() {
                if let Err(e) = session.destroy().await {
                    tracing::warn!(session_id = %session.id(), error = %e, "Failed to destroy session");
                }
                destroyed += 1;
            }
        }
        if destroyed > 0 {
            tracing::info!(destroyed, "Destroyed all sessions");
        }
        destroyed
    }
}

/// Start a background task that periodically evicts idle sessions.
///
/// # Returns
/// A join handle for the background task.
pub fn start_cleanup_task(manager: SessionManager, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            manager.cleanup_idle_sessions().await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::{fake_ffmpeg, options, transcode_sr};
    use crate::session::SessionState;
    use sf_core::Error;
    use std::path::Path;

    fn manager(ffmpeg: PathBuf, scratch: &Path, idle: Duration) -> SessionManager {
        SessionManager::new(options(ffmpeg, scratch), idle)
    }

    #[tokio::test]
    async fn same_window_shares_one_session() {
        let dir = tempfile::tempdir().unwrap();
        let ffmpeg = fake_ffmpeg(dir.path(), 1);
        let manager = manager(ffmpeg, dir.path(), Duration::from_secs(60));
        let sr = Arc::new(transcode_sr(300_000));

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let manager = manager.clone();
                let sr = sr.clone();
                tokio::spawn(async move { manager.get_or_start(&sr, 12 + i).await })
            })
            .collect();
        let mut ids = Vec::new();
        for task in tasks {
            ids.push(task.await.unwrap().unwrap().id());
        }
        ids.dedup();
        assert_eq!(ids.len(), 1, "all callers must share one session");
        assert_eq!(manager.len(), 1);

        let other = manager.get_or_start(&sr, 0).await.unwrap();
        assert_ne!(other.id(), ids[0]);
        assert_eq!(manager.list().len(), 2);

        assert_eq!(manager.shutdown().await, 2);
        assert!(manager.is_empty());
        assert_eq!(other.state(), SessionState::Destroyed);
    }

    #[tokio::test]
    async fn one_scratch_dir_per_session() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = dir.path().join("scratch");
        let ffmpeg = fake_ffmpeg(dir.path(), 1);
        let manager = manager(ffmpeg, &scratch, Duration::from_secs(60));
        let sr = Arc::new(transcode_sr(300_000));

        let tasks: Vec<_> = (0..6)
            .map(|_| {
                let manager = manager.clone();
                let sr = sr.clone();
                tokio::spawn(async move { manager.get_or_start(&sr, 3).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert_eq!(std::fs::read_dir(&scratch).unwrap().count(), 1);
        manager.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn stalled_session_does_not_hold_up_others() {
        let dir = tempfile::tempdir().unwrap();
        let ffmpeg = fake_ffmpeg(dir.path(), 1);
        let manager = manager(ffmpeg, dir.path(), Duration::from_secs(60));

        // Only segment 0 of this window is ever written.
        let stalled_sr = transcode_sr(300_000);
        let stalled = manager.get_or_start(&stalled_sr, 5).await.unwrap();
        let waiting = tokio::spawn(async move {
            stalled.get_segment(5, Duration::from_secs(20)).await
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!waiting.is_finished());

        let mut other_sr = transcode_sr(300_000);
        other_sr.stream.file = PathBuf::from("/media/show/e02.mkv");
        let started = std::time::Instant::now();
        let other = manager.get_or_start(&other_sr, 12).await.unwrap();
        let path = other
            .get_segment(12, Duration::from_secs(5))
            .await
            .unwrap();
        assert!(path.ends_with("stream0_12.m4s"));
        assert!(started.elapsed() < Duration::from_secs(2), "took {:?}", started.elapsed());

        assert!(!waiting.is_finished(), "stalled wait must still be pending");
        assert_eq!(manager.len(), 2);

        manager.shutdown().await;
        waiting.abort();
    }

    #[tokio::test]
    async fn failed_start_leaves_nothing_registered() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(
            PathBuf::from("/nonexistent/ffmpeg"),
            dir.path(),
            Duration::from_secs(60),
        );
        let sr = transcode_sr(60_000);

        let err = manager.get_or_start(&sr, 0).await.unwrap_err();
        assert!(matches!(err, Error::Spawn { .. }), "got {err}");
        assert!(manager.is_empty());
    }

    #[tokio::test]
    async fn out_of_range_segment_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(PathBuf::from("ffmpeg"), dir.path(), Duration::from_secs(60));
        let err = manager
            .get_or_start(&transcode_sr(60_000), 12)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SegmentOutOfRange { segment_id: 12 }));
    }

    #[tokio::test]
    async fn cleanup_evicts_only_idle_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let ffmpeg = fake_ffmpeg(dir.path(), 1);
        let manager = manager(ffmpeg, dir.path(), Duration::from_millis(200));
        let sr = transcode_sr(300_000);

        let stale = manager.get_or_start(&sr, 0).await.unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        let fresh = manager.get_or_start(&sr, 12).await.unwrap();

        assert_eq!(manager.cleanup_idle_sessions().await, 1);
        assert_eq!(stale.state(), SessionState::Destroyed);
        assert!(!stale.output_dir().exists());
        assert_eq!(fresh.state(), SessionState::Running);
        assert_eq!(manager.len(), 1);

        manager.shutdown().await;
    }

    #[tokio::test]
    async fn cleanup_task_runs_periodically() {
        let dir = tempfile::tempdir().unwrap();
        let ffmpeg = fake_ffmpeg(dir.path(), 1);
        let manager = manager(ffmpeg, dir.path(), Duration::from_millis(100));
        manager.get_or_start(&transcode_sr(60_000), 0).await.unwrap();

        let handle = start_cleanup_task(manager.clone(), Duration::from_millis(100));
        tokio::time::sleep(Duration::from_millis(800)).await;

        assert!(manager.is_empty());
        handle.abort();
    }
}
