//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON and carries all
//! sub-configs for server, tools, streaming and metadata. Every section
//! defaults sensibly so a completely empty `{}` file is valid.
//!
//! The config is built once at startup and then shared immutably; in
//! particular the encoder preset tables live here rather than in globals.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;
use crate::media::{EncoderParams, StreamType};
use crate::Error;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub tools: ToolsConfig,
    pub streaming: StreamingConfig,
    pub metadata: MetadataConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    ///
    /// This is intentionally string-based so the caller can read the file
    /// however it sees fit (async, embedded, etc.).
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.port == 0 {
            warnings.push("server.port is 0; a random port will be assigned".into());
        }

        if !self.server.media_root.exists() {
            warnings.push(format!(
                "server.media_root {} does not exist",
                self.server.media_root.display()
            ));
        }

        let s = &self.streaming;
        if s.segments_per_session == 0 {
            warnings.push("streaming.segments_per_session is 0; 1 will be used".into());
        }
        if s.min_segment_ms == 0 || s.transcode_segment_ms == 0 {
            warnings.push("streaming segment durations must be positive".into());
        }
        if s.transcode_segment_ms % 1000 != 0 {
            warnings.push(format!(
                "streaming.transcode_segment_ms {} is not a whole number of seconds",
                s.transcode_segment_ms
            ));
        }
        if !s.presets.video.contains_key(&s.fallback_video_preset) {
            warnings.push(format!(
                "streaming.fallback_video_preset '{}' is not a known video preset",
                s.fallback_video_preset
            ));
        }
        if !s.presets.audio.contains_key(&s.fallback_audio_preset) {
            warnings.push(format!(
                "streaming.fallback_audio_preset '{}' is not a known audio preset",
                s.fallback_audio_preset
            ));
        }

        if self.metadata.tmdb_api_key.is_none() {
            warnings.push("metadata.tmdb_api_key is not set; episode matching is disabled".into());
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory that stream file ids are resolved against.
    pub media_root: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            media_root: PathBuf::from("/media"),
        }
    }
}

/// External tool path overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
}

/// Segmenting, session and encoder preset settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Minimum duration of a transmuxed segment; boundaries land on the next
    /// keyframe at or after this much accumulated time.
    pub min_segment_ms: u64,
    /// Exact duration of a transcoded segment (forced keyframe interval).
    pub transcode_segment_ms: u64,
    /// Segments produced by one encoder process.
    pub segments_per_session: u64,
    /// How often `get_segment` re-lists the session directory.
    pub poll_interval_ms: u64,
    /// Upper bound on how long a segment request waits for the encoder.
    pub segment_deadline_secs: u64,
    /// Sessions untouched for this long are destroyed by the cleanup task.
    pub session_idle_secs: u64,
    pub cleanup_interval_secs: u64,
    /// Parent directory for session scratch dirs (system temp if unset).
    pub temp_dir: Option<PathBuf>,
    pub presets: PresetTable,
    pub fallback_video_preset: String,
    pub fallback_audio_preset: String,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            min_segment_ms: 5000,
            transcode_segment_ms: 5000,
            segments_per_session: 12,
            poll_interval_ms: 500,
            segment_deadline_secs: 30,
            session_idle_secs: 300,
            cleanup_interval_secs: 30,
            temp_dir: None,
            presets: PresetTable::default(),
            fallback_video_preset: "720-5000k-video".into(),
            fallback_audio_preset: "128k-audio".into(),
        }
    }
}

impl StreamingConfig {
    pub fn min_segment_duration(&self) -> Duration {
        Duration::from_millis(self.min_segment_ms)
    }

    pub fn transcode_segment_duration(&self) -> Duration {
        Duration::from_millis(self.transcode_segment_ms)
    }

    /// Window size, never less than one.
    pub fn window_size(&self) -> u64 {
        self.segments_per_session.max(1)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn segment_deadline(&self) -> Duration {
        Duration::from_secs(self.segment_deadline_secs)
    }

    pub fn session_idle(&self) -> Duration {
        Duration::from_secs(self.session_idle_secs)
    }

    /// Directory under which session scratch directories are created.
    pub fn scratch_root(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Named encoder presets, split by the stream type they apply to.
///
/// Addressed by representation ids of the form `preset:<name>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PresetTable {
    pub video: BTreeMap<String, EncoderParams>,
    pub audio: BTreeMap<String, EncoderParams>,
}

impl PresetTable {
    /// Presets applicable to streams of `stream_type`.
    pub fn for_type(&self, stream_type: StreamType) -> Option<&BTreeMap<String, EncoderParams>> {
        match stream_type {
            StreamType::Video => Some(&self.video),
            StreamType::Audio => Some(&self.audio),
            StreamType::Subtitle => None,
        }
    }

    /// Look up a preset by name for a stream type.
    pub fn get(&self, stream_type: StreamType, name: &str) -> Option<&EncoderParams> {
        self.for_type(stream_type)?.get(name)
    }
}

impl Default for PresetTable {
    fn default() -> Self {
        let video = [
            ("480-1000k-video", 854, 480, 1_000_000),
            ("720-5000k-video", 1280, 720, 5_000_000),
            ("1080-10000k-video", 1920, 1080, 10_000_000),
        ]
        .into_iter()
        .map(|(name, width, height, video_bitrate)| {
            (
                name.to_string(),
                EncoderParams {
                    width,
                    height,
                    video_bitrate,
                    audio_bitrate: 0,
                },
            )
        })
        .collect();

        let audio = BTreeMap::from([(
            "128k-audio".to_string(),
            EncoderParams {
                width: 0,
                height: 0,
                video_bitrate: 0,
                audio_bitrate: 128_000,
            },
        )]);

        Self { video, audio }
    }
}

/// Metadata agent settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    pub tmdb_api_key: Option<String>,
    pub language: String,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            tmdb_api_key: None,
            language: "en-US".into(),
        }
    }
}
