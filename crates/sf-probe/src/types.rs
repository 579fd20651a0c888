//! Core types for media probe results.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sf_core::StreamType;

/// Everything the streaming core needs to know about a media file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Path to the probed file.
    pub file_path: PathBuf,
    /// Total duration, rounded to milliseconds.
    pub duration: Duration,
    /// Streams in container order.
    pub streams: Vec<StreamInfo>,
}

impl MediaInfo {
    /// Look up a stream by its container index.
    pub fn stream(&self, index: u32) -> Option<&StreamInfo> {
        self.streams.iter().find(|s| s.index == index)
    }

    /// The first video stream, if any.
    pub fn primary_video(&self) -> Option<&StreamInfo> {
        self.streams_of(StreamType::Video).next()
    }

    /// The first audio stream, if any.
    pub fn primary_audio(&self) -> Option<&StreamInfo> {
        self.streams_of(StreamType::Audio).next()
    }

    /// Iterate the streams of one type in container order.
    pub fn streams_of(&self, stream_type: StreamType) -> impl Iterator<Item = &StreamInfo> {
        self.streams
            .iter()
            .filter(move |s| s.stream_type == stream_type)
    }
}

/// A single stream within a media file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamInfo {
    /// Container stream index (what `-map 0:<index>` selects).
    pub index: u32,
    pub stream_type: StreamType,
    /// Decoder name as reported by the prober (e.g. "h264", "aac").
    pub codec_name: String,
    /// RFC 6381 codec string (e.g. "avc1.64001f", "mp4a.40.2").
    pub codecs: String,
    /// Bits per second, when the container declares it.
    pub bitrate: Option<u64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u32>,
    /// Language code (ISO 639-2 or IETF).
    pub language: Option<String>,
}
