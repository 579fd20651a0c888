//! The [`Prober`] trait defining the interface for media file probing.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::types::MediaInfo;

/// A media file prober.
///
/// Implementations must be safe to share across threads (`Send + Sync`);
/// a single instance serves every request.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Human-readable name identifying this prober implementation.
    fn name(&self) -> &'static str;

    /// Probe a media file and describe its streams.
    ///
    /// Fails with [`sf_core::Error::Probe`] when the file cannot be read or
    /// parsed.
    async fn probe(&self, path: &Path) -> sf_core::Result<MediaInfo>;

    /// Presentation timestamps of the keyframes of the first video stream,
    /// in ascending order and rounded to milliseconds.
    async fn probe_keyframes(&self, path: &Path) -> sf_core::Result<Vec<Duration>>;
}
