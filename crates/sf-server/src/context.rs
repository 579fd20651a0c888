//! Application context shared across route handlers via Axum state.
//!
//! Everything here is built once at startup from the immutable [`Config`]
//! and cheap to clone: the shared pieces sit behind `Arc`s and the session
//! registry is itself a handle.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use sf_core::config::Config;
use sf_metadata::{MetadataAgent, MetadataManager, MetadataStore};
use sf_probe::Prober;
use sf_stream::{Catalog, ProbeCache, Resolver, SessionManager, SessionOptions};

#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub catalog: Arc<Catalog>,
    pub sessions: SessionManager,
    pub metadata: Arc<MetadataManager>,
}

impl AppContext {
    /// Wire up the streaming core and metadata manager.
    ///
    /// `ffmpeg` is the encoder every session launches.
    pub fn new(config: Config, prober: Arc<dyn Prober>, agent: Arc<dyn MetadataAgent>, ffmpeg: PathBuf) -> Self {
        let streaming = config.streaming.clone();
        let catalog = Catalog::new(
            Arc::new(ProbeCache::new(prober)),
            Arc::new(Resolver::new(streaming.clone())),
        );
        let sessions = SessionManager::new(
            SessionOptions::from_config(ffmpeg, &streaming),
            streaming.session_idle(),
        );
        let metadata = MetadataManager::new(Arc::new(MetadataStore::new()), agent);

        Self {
            config: Arc::new(config),
            catalog: Arc::new(catalog),
            sessions,
            metadata: Arc::new(metadata),
        }
    }

    pub fn media_root(&self) -> &Path {
        &self.config.server.media_root
    }

    /// How long a segment request waits for the encoder.
    pub fn segment_deadline(&self) -> Duration {
        self.config.streaming.segment_deadline()
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.config.streaming.cleanup_interval_secs.max(1))
    }
}
