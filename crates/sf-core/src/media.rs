//! Media-domain enums and value types shared across crates.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::Error;

// ---------------------------------------------------------------------------
// StreamType
// ---------------------------------------------------------------------------

/// Type of media stream within a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamType {
    Video,
    Audio,
    Subtitle,
}

impl StreamType {
    /// Parse an ffprobe `codec_type` value.
    pub fn from_codec_type(s: &str) -> Option<Self> {
        match s {
            "video" => Some(Self::Video),
            "audio" => Some(Self::Audio),
            "subtitle" => Some(Self::Subtitle),
            _ => None,
        }
    }

    /// MIME type of the segments served for this stream type.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Video => "video/mp4",
            Self::Audio => "audio/mp4",
            Self::Subtitle => "text/vtt",
        }
    }

    /// DASH `contentType` of the adaptation set.
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Subtitle => "text",
        }
    }
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Audio => write!(f, "audio"),
            Self::Subtitle => write!(f, "subtitle"),
        }
    }
}

/// Round a duration to the nearest whole millisecond (half rounds up).
pub fn round_to_millis(d: Duration) -> Duration {
    let nanos = d.as_nanos();
    let millis = (nanos + 500_000) / 1_000_000;
    Duration::from_millis(millis as u64)
}

// ---------------------------------------------------------------------------
// Output codec strings
// ---------------------------------------------------------------------------

/// Codec string of AAC-LC output.
pub const AAC_LC_CODECS: &str = "mp4a.40.2";

/// Codec string of an H.264 High profile encode at the given output height.
///
/// The level follows the resolution class: 3.0 up to 480p, 3.1 up to 720p,
/// 4.0 up to 1080p and 5.1 above.
pub fn h264_codecs_for_height(height: u32) -> &'static str {
    match height {
        0..=480 => "avc1.64001e",
        481..=720 => "avc1.64001f",
        721..=1080 => "avc1.640028",
        _ => "avc1.640033",
    }
}

// ---------------------------------------------------------------------------
// EncoderParams
// ---------------------------------------------------------------------------

/// Output parameters for a transcode.
///
/// Video presets leave `audio_bitrate` at zero and audio presets leave the
/// video fields at zero. The canonical string form
/// (`width=1280,height=720,videoBitrate=5000000,audioBitrate=0`) is embedded
/// in `transcode:` representation ids and must round-trip exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EncoderParams {
    pub width: u32,
    pub height: u32,
    pub video_bitrate: u64,
    pub audio_bitrate: u64,
}

/// Video bitrates accepted in `transcode:` ids, in bits per second.
pub const VIDEO_BITRATE_RANGE: std::ops::RangeInclusive<u64> = 100_000..=100_000_000;
/// Audio bitrates accepted in `transcode:` ids, in bits per second.
pub const AUDIO_BITRATE_RANGE: std::ops::RangeInclusive<u64> = 32_000..=512_000;
/// Largest output frame when the source dimensions are unknown.
pub const MAX_OUTPUT_DIMENSIONS: (u32, u32) = (7680, 4320);

impl EncoderParams {
    /// Reject parameters the encoder could never produce output for.
    ///
    /// Video needs a nonzero, even frame no larger than `max_dimensions`
    /// (the source frame when known) and a bitrate in
    /// [`VIDEO_BITRATE_RANGE`]. Audio needs a bitrate in
    /// [`AUDIO_BITRATE_RANGE`]. Fields that do not apply to `stream_type`
    /// are ignored.
    pub fn validate(&self, stream_type: StreamType, max_dimensions: Option<(u32, u32)>) -> Result<(), Error> {
        match stream_type {
            StreamType::Video => {
                let (max_width, max_height) = max_dimensions.unwrap_or(MAX_OUTPUT_DIMENSIONS);
                if self.width == 0 || self.height == 0 || self.width % 2 != 0 || self.height % 2 != 0 {
                    return Err(Error::Validation(format!(
                        "output size {}x{} must be nonzero and even",
                        self.width, self.height
                    )));
                }
                if self.width > max_width || self.height > max_height {
                    return Err(Error::Validation(format!(
                        "output size {}x{} exceeds {max_width}x{max_height}",
                        self.width, self.height
                    )));
                }
                check_bitrate("videoBitrate", self.video_bitrate, &VIDEO_BITRATE_RANGE)
            }
            StreamType::Audio => check_bitrate("audioBitrate", self.audio_bitrate, &AUDIO_BITRATE_RANGE),
            StreamType::Subtitle => Ok(()),
        }
    }

    /// Codec string of what the encoder produces for a stream of this type.
    pub fn output_codecs(&self, stream_type: StreamType) -> &'static str {
        match stream_type {
            StreamType::Video => h264_codecs_for_height(self.height),
            StreamType::Audio => AAC_LC_CODECS,
            StreamType::Subtitle => "wvtt",
        }
    }

    /// Bits per second of the output for a stream of this type.
    pub fn bandwidth(&self, stream_type: StreamType) -> u64 {
        match stream_type {
            StreamType::Video => self.video_bitrate,
            StreamType::Audio => self.audio_bitrate,
            StreamType::Subtitle => 0,
        }
    }
}

fn check_bitrate(name: &str, value: u64, range: &std::ops::RangeInclusive<u64>) -> Result<(), Error> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "{name} {value} outside {}..={}",
            range.start(),
            range.end()
        )))
    }
}

impl fmt::Display for EncoderParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "width={},height={},videoBitrate={},audioBitrate={}",
            self.width, self.height, self.video_bitrate, self.audio_bitrate
        )
    }
}

impl FromStr for EncoderParams {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut width = None;
        let mut height = None;
        let mut video_bitrate = None;
        let mut audio_bitrate = None;

        for pair in s.split(',') {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| Error::Validation(format!("malformed encoder param '{pair}'")))?;
            let bad = |_| Error::Validation(format!("invalid value for {key}: '{value}'"));
            match key {
                "width" => width = Some(value.parse().map_err(bad)?),
                "height" => height = Some(value.parse().map_err(bad)?),
                "videoBitrate" => video_bitrate = Some(value.parse().map_err(bad)?),
                "audioBitrate" => audio_bitrate = Some(value.parse().map_err(bad)?),
                other => {
                    return Err(Error::Validation(format!("unknown encoder param '{other}'")))
                }
            }
        }

        let missing = |name: &str| Error::Validation(format!("encoder params missing {name}"));
        Ok(Self {
            width: width.ok_or_else(|| missing("width"))?,
            height: height.ok_or_else(|| missing("height"))?,
            video_bitrate: video_bitrate.ok_or_else(|| missing("videoBitrate"))?,
            audio_bitrate: audio_bitrate.ok_or_else(|| missing("audioBitrate"))?,
        })
    }
}
