//! One encoder process producing one window of segments.
//!
//! A session moves through `Starting -> Running -> Destroyed` exactly once.
//! While running, ffmpeg writes `init.mp4` and `stream0_<N>.m4s` files into
//! the session's scratch directory; the session learns about progress only
//! by listing that directory. Destroying a session signals the encoder's
//! whole process group, waits for it to exit and removes the directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use regex::Regex;
use serde::Serialize;
use sf_av::encoder::{extract_subtitles, segment_command, EncodeMode, SegmentJob};
use sf_av::workspace::{INIT_SEGMENT_NAME, SUBTITLE_FILE_NAME};
use sf_av::Workspace;
use sf_core::config::StreamingConfig;
use sf_core::{Error, Result, SessionId, StreamType};
use tokio::process::Child;
use tokio::sync::watch;

use crate::representation::RepresentationKind;
use crate::resolver::StreamRepresentation;

const SEGMENT_FILE_PATTERN: &str = r"^stream0_(\d+)\.m4s$";

/// How long an encoder gets to exit after SIGTERM before it is killed.
const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(5);

/// Lifecycle of a [`TranscodingSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Starting,
    Running,
    Destroyed,
}

/// Settings shared by every session a server starts.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub ffmpeg: PathBuf,
    /// Parent directory of session scratch directories.
    pub scratch_root: PathBuf,
    /// Segments one session is expected to produce.
    pub window_size: u64,
    pub poll_interval: Duration,
    /// Segment length handed to the muxer when remuxing.
    pub min_segment: Duration,
    /// Segment length (and forced keyframe interval) when transcoding.
    pub transcode_segment: Duration,
    pub kill_grace: Duration,
}

impl SessionOptions {
    pub fn from_config(ffmpeg: PathBuf, streaming: &StreamingConfig) -> Self {
        Self {
            ffmpeg,
            scratch_root: streaming.scratch_root(),
            window_size: streaming.window_size(),
            poll_interval: streaming.poll_interval(),
            min_segment: streaming.min_segment_duration(),
            transcode_segment: streaming.transcode_segment_duration(),
            kill_grace: DEFAULT_KILL_GRACE,
        }
    }
}

/// Snapshot of a session for listings.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub id: SessionId,
    pub file: PathBuf,
    pub stream_index: u32,
    pub representation_id: String,
    pub first_segment_id: u64,
    pub last_segment_id: u64,
    pub state: SessionState,
    pub created_at: DateTime<Utc>,
    pub output_dir: PathBuf,
}

/// The encoder process and scratch directory a session owns.
#[derive(Default)]
struct ProcessSlot {
    workspace: Option<Workspace>,
    pid: Option<u32>,
    /// Flips to `true` once the reaper task has collected the exit status.
    exited: Option<watch::Receiver<bool>>,
}

/// An encoder run covering one window of a stream representation.
pub struct TranscodingSession {
    id: SessionId,
    file: PathBuf,
    stream_index: u32,
    stream_type: StreamType,
    representation_id: String,
    /// `None` for subtitle sessions, which convert synchronously.
    job: Option<SegmentJob>,
    first_segment_id: u64,
    last_segment_id: u64,
    window_size: u64,
    output_dir: PathBuf,
    ffmpeg: PathBuf,
    poll_interval: Duration,
    kill_grace: Duration,
    segment_file: Regex,
    created_at: DateTime<Utc>,
    state: Mutex<SessionState>,
    process: tokio::sync::Mutex<ProcessSlot>,
}

impl std::fmt::Debug for TranscodingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranscodingSession")
            .field("id", &self.id)
            .field("file", &self.file)
            .field("stream_index", &self.stream_index)
            .field("representation_id", &self.representation_id)
            .field("first_segment_id", &self.first_segment_id)
            .field("state", &self.state())
            .finish()
    }
}

impl TranscodingSession {
    /// Prepare a session for the window containing `segment_id`.
    ///
    /// Creates the scratch directory but does not launch anything; see
    /// [`TranscodingSession::start`].
    pub fn new(sr: &StreamRepresentation, segment_id: u64, opts: &SessionOptions) -> Result<Self> {
        let window = sr.find_window(segment_id)?;
        let stream_type = sr.stream.stream_type();

        let (mode, segment_duration) = match sr.representation.kind {
            RepresentationKind::Transmux => (Some(EncodeMode::Copy), opts.min_segment),
            RepresentationKind::Transcode(params) => match stream_type {
                StreamType::Video => (Some(EncodeMode::Video(params)), opts.transcode_segment),
                StreamType::Audio => (Some(EncodeMode::Audio(params)), opts.transcode_segment),
                StreamType::Subtitle => {
                    return Err(Error::Validation(
                        "subtitle streams cannot be transcoded".into(),
                    ))
                }
            },
            RepresentationKind::Subtitle => (None, opts.min_segment),
        };

        let segment_file = Regex::new(SEGMENT_FILE_PATTERN)
            .map_err(|e| Error::Internal(format!("segment file pattern: {e}")))?;
        let workspace = Workspace::create_in(&opts.scratch_root, "sf-session-")?;
        let output_dir = workspace.path().to_path_buf();

        let job = mode.map(|mode| SegmentJob {
            input: sr.stream.file.clone(),
            stream_index: sr.stream.index(),
            mode,
            window_start: window.start(),
            window_duration: window.duration(),
            first_segment: window.first_segment_id(),
            segment_duration,
            output_dir: output_dir.clone(),
        });

        Ok(Self {
            id: SessionId::new(),
            file: sr.stream.file.clone(),
            stream_index: sr.stream.index(),
            stream_type,
            representation_id: sr.representation.id.to_string(),
            job,
            first_segment_id: window.first_segment_id(),
            last_segment_id: window.last_segment_id(),
            window_size: opts.window_size.max(1),
            output_dir,
            ffmpeg: opts.ffmpeg.clone(),
            poll_interval: opts.poll_interval,
            kill_grace: opts.kill_grace,
            segment_file,
            created_at: Utc::now(),
            state: Mutex::new(SessionState::Starting),
            process: tokio::sync::Mutex::new(ProcessSlot {
                workspace: Some(workspace),
                ..ProcessSlot::default()
            }),
        })
    }

    /// Launch the encoder and return without waiting for output.
    ///
    /// Subtitle sessions instead convert the whole track before returning.
    /// On failure the session never reaches `Running`; dropping it removes
    /// the scratch directory.
    pub async fn start(&self) -> Result<()> {
        let mut slot = self.process.lock().await;
        if self.state() != SessionState::Starting {
            return Err(Error::Internal(format!("session {} already started", self.id)));
        }

        match &self.job {
            None => {
                extract_subtitles(
                    &self.ffmpeg,
                    &self.file,
                    self.stream_index,
                    &self.output_dir.join(SUBTITLE_FILE_NAME),
                )
                .await?;
            }
            Some(job) => {
                let child = segment_command(&self.ffmpeg, job).spawn_group_leader()?;
                let (tx, rx) = watch::channel(false);
                slot.pid = child.id();
                slot.exited = Some(rx);
                tokio::spawn(reap(child, tx, self.id));
            }
        }

        *self.state.lock() = SessionState::Running;
        tracing::info!(
            session_id = %self.id,
            file = %self.file.display(),
            stream = self.stream_index,
            representation = %self.representation_id,
            first_segment = self.first_segment_id,
            pid = ?slot.pid,
            "Started session"
        );
        Ok(())
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    pub fn first_segment_id(&self) -> u64 {
        self.first_segment_id
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn is_subtitle(&self) -> bool {
        self.job.is_none()
    }

    /// Whether this session will ever produce `segment_id`.
    ///
    /// Depends only on the window, never on what is on disk. Subtitle
    /// sessions serve every id.
    pub fn is_projected_available(&self, segment_id: u64) -> bool {
        if self.is_subtitle() {
            return true;
        }
        self.first_segment_id <= segment_id && segment_id < self.first_segment_id + self.window_size
    }

    /// Media segments currently present in the output directory, by id.
    ///
    /// Fails with [`Error::Filesystem`] once the directory is gone.
    pub async fn available_segments(&self) -> Result<BTreeMap<u64, PathBuf>> {
        let mut entries = tokio::fs::read_dir(&self.output_dir)
            .await
            .map_err(|e| Error::filesystem(&self.output_dir, e))?;

        let mut segments = BTreeMap::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::filesystem(&self.output_dir, e))?
        {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let Some(caps) = self.segment_file.captures(name) else {
                continue;
            };
            if let Ok(id) = caps[1].parse::<u64>() {
                segments.insert(id, entry.path());
            }
        }
        Ok(segments)
    }

    /// Path of segment `segment_id`, waiting up to `deadline` for the encoder
    /// to write it.
    ///
    /// Fails with [`Error::DeadlineExceeded`] straight away when the segment
    /// is outside this session's window, and after `deadline` when it does
    /// not show up in time.
    pub async fn get_segment(&self, segment_id: u64, deadline: Duration) -> Result<PathBuf> {
        if !self.is_projected_available(segment_id) {
            return Err(Error::DeadlineExceeded {
                segment_id,
                deadline,
            });
        }
        if self.is_subtitle() {
            return Ok(self.output_dir.join(SUBTITLE_FILE_NAME));
        }

        tokio::time::timeout(deadline, self.poll_segment(segment_id))
            .await
            .map_err(|_| Error::DeadlineExceeded {
                segment_id,
                deadline,
            })?
    }

    async fn poll_segment(&self, segment_id: u64) -> Result<PathBuf> {
        loop {
            if let Some(path) = self.available_segments().await?.remove(&segment_id) {
                return Ok(path);
            }
            tracing::debug!(session_id = %self.id, segment_id, "Segment not ready yet");
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Expected path of the initialization segment. Not checked for existence.
    pub fn initial_segment(&self) -> PathBuf {
        self.output_dir.join(INIT_SEGMENT_NAME)
    }

    /// Path of the initialization segment, waiting up to `deadline` for it.
    pub async fn wait_for_initial_segment(&self, deadline: Duration) -> Result<PathBuf> {
        let path = self.initial_segment();
        let poll = async {
            loop {
                match tokio::fs::try_exists(&path).await {
                    Ok(true) => return Ok(()),
                    Ok(false) => tokio::time::sleep(self.poll_interval).await,
                    Err(e) => return Err(Error::filesystem(&path, e)),
                }
            }
        };
        tokio::time::timeout(deadline, poll)
            .await
            .map_err(|_| Error::DeadlineExceeded {
                segment_id: self.first_segment_id,
                deadline,
            })??;
        Ok(path)
    }

    /// Stop the encoder and delete the output directory.
    ///
    /// Signals the encoder's process group, waits for the reaper to see it
    /// exit (escalating to SIGKILL after a grace period) and then removes
    /// the directory. Calling this more than once is a no-op.
    pub async fn destroy(&self) -> Result<()> {
        let mut slot = self.process.lock().await;
        {
            let mut state = self.state.lock();
            if *state == SessionState::Destroyed {
                return Ok(());
            }
            *state = SessionState::Destroyed;
        }

        if let Some(pid) = slot.pid.take() {
            signal_group(pid, GroupSignal::Terminate);
            if let Some(mut exited) = slot.exited.take() {
                let timed_out = tokio::time::timeout(self.kill_grace, exited.wait_for(|done| *done))
                    .await
                    .is_err();
                if timed_out {
                    tracing::warn!(session_id = %self.id, pid, "Encoder ignored SIGTERM, killing");
                    signal_group(pid, GroupSignal::Kill);
                    let _ = exited.wait_for(|done| *done).await;
                }
            }
        }

        let result = match slot.workspace.take() {
            Some(workspace) => workspace.close(),
            None => Ok(()),
        };
        tracing::info!(
            session_id = %self.id,
            file = %self.file.display(),
            stream = self.stream_index,
            first_segment = self.first_segment_id,
            "Destroyed session"
        );
        result
    }

    /// Snapshot for listings.
    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id,
            file: self.file.clone(),
            stream_index: self.stream_index,
            representation_id: self.representation_id.clone(),
            first_segment_id: self.first_segment_id,
            last_segment_id: self.last_segment_id,
            state: self.state(),
            created_at: self.created_at,
            output_dir: self.output_dir.clone(),
        }
    }

    pub fn stream_type(&self) -> StreamType {
        self.stream_type
    }
}

impl Drop for TranscodingSession {
    fn drop(&mut self) {
        // A session dropped without destroy() must not leave its encoder
        // running; the workspace removes itself.
        if let Some(pid) = self.process.get_mut().pid.take() {
            signal_group(pid, GroupSignal::Kill);
        }
    }
}

/// Wait for the encoder to exit so it never lingers as a zombie.
async fn reap(mut child: Child, exited: watch::Sender<bool>, session_id: SessionId) {
    match child.wait().await {
        Ok(status) => tracing::debug!(session_id = %session_id, %status, "Encoder exited"),
        Err(e) => tracing::warn!(session_id = %session_id, error = %e, "Failed to wait on encoder"),
    }
    let _ = exited.send(true);
}

#[derive(Debug, Clone, Copy)]
enum GroupSignal {
    Terminate,
    Kill,
}

#[cfg(unix)]
fn signal_group(pid: u32, signal: GroupSignal) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return;
    };
    let signal = match signal {
        GroupSignal::Terminate => Signal::SIGTERM,
        GroupSignal::Kill => Signal::SIGKILL,
    };
    match killpg(Pid::from_raw(raw), signal) {
        // Already gone.
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => tracing::warn!(pid, ?signal, error = %e, "Failed to signal encoder process group"),
    }
}

#[cfg(not(unix))]
fn signal_group(pid: u32, signal: GroupSignal) {
    tracing::warn!(pid, ?signal, "Process groups are not supported on this platform");
}
