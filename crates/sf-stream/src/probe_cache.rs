//! Memoized probe results with request coalescing.
//!
//! Every manifest and segment request needs the file's stream list, and
//! transmuxed streams also need its keyframes. Both are stable for a given
//! file, so they are probed once and shared. Concurrent requests for a path
//! that is still being probed wait for that probe instead of starting their
//! own. Failures are handed to the request that triggered them and are not
//! cached, so the next request probes again.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use sf_core::Result;
use sf_probe::{MediaInfo, Prober};
use tokio::sync::Notify;

type Loading = DashMap<PathBuf, Arc<Notify>>;

/// Probe results shared across requests.
pub struct ProbeCache {
    prober: Arc<dyn Prober>,
    media: DashMap<PathBuf, Arc<MediaInfo>>,
    media_loading: Loading,
    keyframes: DashMap<PathBuf, Arc<Vec<Duration>>>,
    keyframes_loading: Loading,
}

impl ProbeCache {
    pub fn new(prober: Arc<dyn Prober>) -> Self {
        Self {
            prober,
            media: DashMap::new(),
            media_loading: DashMap::new(),
            keyframes: DashMap::new(),
            keyframes_loading: DashMap::new(),
        }
    }

    /// Stream list and duration of `path`.
    pub async fn probe(&self, path: &Path) -> Result<Arc<MediaInfo>> {
        get_or_load(&self.media, &self.media_loading, path, || self.prober.probe(path)).await
    }

    /// Keyframe timestamps of the first video stream of `path`.
    pub async fn keyframes(&self, path: &Path) -> Result<Arc<Vec<Duration>>> {
        get_or_load(&self.keyframes, &self.keyframes_loading, path, || {
            self.prober.probe_keyframes(path)
        })
        .await
    }

    /// Number of files with a cached probe result.
    pub fn len(&self) -> usize {
        self.media.len()
    }

    pub fn is_empty(&self) -> bool {
        self.media.is_empty()
    }
}

/// Removes the in-flight marker and wakes waiters, even if the loading
/// request is cancelled halfway.
struct LoadingGuard<'a> {
    loading: &'a Loading,
    path: &'a Path,
    notify: Arc<Notify>,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.loading.remove(self.path);
        self.notify.notify_waiters();
    }
}

async fn get_or_load<T, F, Fut>(
    cache: &DashMap<PathBuf, Arc<T>>,
    loading: &Loading,
    path: &Path,
    load: F,
) -> Result<Arc<T>>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    loop {
        if let Some(hit) = cache.get(path) {
            return Ok(hit.value().clone());
        }

        match loading.entry(path.to_path_buf()) {
            Entry::Occupied(entry) => {
                // Register interest before releasing the map shard so the
                // loader's wake-up cannot slip in between.
                let notify = entry.get().clone();
                let notified = notify.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                drop(entry);
                notified.await;
                // Either cached now, or the load failed and this request
                // takes its own turn.
            }
            Entry::Vacant(entry) => {
                let notify = Arc::new(Notify::new());
                entry.insert(notify.clone());
                let _guard = LoadingGuard {
                    loading,
                    path,
                    notify,
                };

                let value = Arc::new(load().await?);
                cache.insert(path.to_path_buf(), value.clone());
                tracing::debug!(path = %path.display(), "Probe cache populated");
                return Ok(value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sf_core::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts calls and fails the first `failures` probes.
    struct CountingProber {
        probes: AtomicUsize,
        keyframe_probes: AtomicUsize,
        failures: usize,
    }

    impl CountingProber {
        fn new(failures: usize) -> Self {
            Self {
                probes: AtomicUsize::new(0),
                keyframe_probes: AtomicUsize::new(0),
                failures,
            }
        }
    }

    #[async_trait]
    impl Prober for CountingProber {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn probe(&self, path: &Path) -> Result<MediaInfo> {
            let n = self.probes.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            if n < self.failures {
                return Err(Error::Probe(format!("{}: corrupt", path.display())));
            }
            Ok(MediaInfo {
                file_path: path.to_path_buf(),
                duration: Duration::from_secs(60),
                streams: vec![],
            })
        }

        async fn probe_keyframes(&self, _path: &Path) -> Result<Vec<Duration>> {
            self.keyframe_probes.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(vec![Duration::ZERO, Duration::from_secs(5)])
        }
    }

    #[tokio::test]
    async fn concurrent_requests_probe_once() {
        let prober = Arc::new(CountingProber::new(0));
        let cache = Arc::new(ProbeCache::new(prober.clone()));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.probe(Path::new("/media/a.mkv")).await })
            })
            .collect();
        for task in tasks {
            let info = task.await.unwrap().unwrap();
            assert_eq!(info.duration, Duration::from_secs(60));
        }

        assert_eq!(prober.probes.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn keyframes_are_cached_separately() {
        let prober = Arc::new(CountingProber::new(0));
        let cache = ProbeCache::new(prober.clone());
        let path = Path::new("/media/a.mkv");

        let first = cache.keyframes(path).await.unwrap();
        let second = cache.keyframes(path).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(prober.keyframe_probes.load(Ordering::SeqCst), 1);
        assert_eq!(prober.probes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let prober = Arc::new(CountingProber::new(1));
        let cache = ProbeCache::new(prober.clone());
        let path = Path::new("/media/broken.mkv");

        let err = cache.probe(path).await.unwrap_err();
        assert!(matches!(err, Error::Probe(_)));
        assert!(cache.is_empty());

        cache.probe(path).await.unwrap();
        assert_eq!(prober.probes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cancelled_load_releases_waiters() {
        let prober = Arc::new(CountingProber::new(0));
        let cache = Arc::new(ProbeCache::new(prober.clone()));
        let path = Path::new("/media/a.mkv");

        let loader = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.probe(Path::new("/media/a.mkv")).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        loader.abort();

        let info = tokio::time::timeout(Duration::from_secs(2), cache.probe(path))
            .await
            .expect("waiter must not hang")
            .unwrap();
        assert_eq!(info.file_path, path);
    }
}
