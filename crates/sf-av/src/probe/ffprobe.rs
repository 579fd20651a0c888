//! FFprobe-based [`sf_probe::Prober`] implementation.
//!
//! Stream metadata comes from
//! `ffprobe -v quiet -print_format json -show_format -show_streams`;
//! keyframes come from the packet list of the first video stream, keeping
//! packets flagged `K`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use sf_core::{round_to_millis, StreamType};
use sf_probe::{MediaInfo, Prober, StreamInfo};

use super::codecs::codec_string;
use crate::command::ToolCommand;

/// A prober backed by the `ffprobe` CLI.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    /// Path to the ffprobe binary.
    ffprobe_path: PathBuf,
}

impl FfprobeProber {
    /// Create a new prober using the given ffprobe path.
    pub fn new(ffprobe_path: PathBuf) -> Self {
        Self { ffprobe_path }
    }

    /// Create a prober that finds ffprobe on `PATH`.
    pub fn from_path() -> Option<Self> {
        which::which("ffprobe").ok().map(Self::new)
    }

    async fn run(&self, args: &[&str], path: &Path) -> sf_core::Result<String> {
        let mut cmd = ToolCommand::new(self.ffprobe_path.clone());
        cmd.args(args.iter().copied());
        cmd.arg(path.to_string_lossy());
        // Tool failures on a probe are scoped to this file: report them as
        // probe errors so the HTTP layer answers 422 rather than 502.
        let output = cmd.execute().await.map_err(|e| match e {
            sf_core::Error::Tool { message, .. } => {
                sf_core::Error::Probe(format!("{}: {message}", path.display()))
            }
            other => other,
        })?;
        Ok(output.stdout)
    }
}

#[async_trait]
impl Prober for FfprobeProber {
    fn name(&self) -> &'static str {
        "ffprobe"
    }

    async fn probe(&self, path: &Path) -> sf_core::Result<MediaInfo> {
        let stdout = self
            .run(
                &["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"],
                path,
            )
            .await?;
        let ff: FfprobeOutput = serde_json::from_str(&stdout)
            .map_err(|e| sf_core::Error::Probe(format!("ffprobe JSON parse error: {e}")))?;

        parse_ffprobe_output(path, ff)
    }

    async fn probe_keyframes(&self, path: &Path) -> sf_core::Result<Vec<Duration>> {
        let stdout = self
            .run(
                &[
                    "-v", "quiet",
                    "-select_streams", "v:0",
                    "-show_entries", "packet=pts_time,flags",
                    "-of", "csv=p=0",
                ],
                path,
            )
            .await?;
        Ok(parse_keyframes(&stdout))
    }
}

// ---------------------------------------------------------------------------
// JSON structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    index: u32,
    codec_type: Option<String>,
    codec_name: Option<String>,
    profile: Option<String>,
    level: Option<i64>,
    width: Option<u32>,
    height: Option<u32>,
    bit_rate: Option<String>,
    sample_rate: Option<String>,
    channels: Option<u32>,
    #[serde(default)]
    tags: FfprobeTags,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeTags {
    language: Option<String>,
    /// Matroska muxers store the stream bitrate as a tag.
    #[serde(rename = "BPS")]
    bps: Option<String>,
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

/// Longest timestamp accepted from a container. Anything beyond is corrupt.
const MAX_MEDIA_DURATION: Duration = Duration::from_secs(7 * 24 * 3600);

fn parse_ffprobe_output(path: &Path, output: FfprobeOutput) -> sf_core::Result<MediaInfo> {
    let duration = output
        .format
        .duration
        .as_deref()
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|secs| *secs > 0.0)
        .and_then(seconds_to_duration)
        .ok_or_else(|| {
            sf_core::Error::Probe(format!("{}: no usable duration", path.display()))
        })?;

    let container_bitrate = output
        .format
        .bit_rate
        .as_deref()
        .and_then(|s| s.parse::<u64>().ok());

    let mut streams = Vec::new();
    for stream in output.streams {
        let Some(stream_type) = stream
            .codec_type
            .as_deref()
            .and_then(StreamType::from_codec_type)
        else {
            continue;
        };

        let codec_name = stream.codec_name.unwrap_or_default();
        let codecs = codec_string(&codec_name, stream.profile.as_deref(), stream.level);
        let mut bitrate = stream
            .bit_rate
            .as_deref()
            .or(stream.tags.bps.as_deref())
            .and_then(|s| s.parse::<u64>().ok());
        // Single-video files often only declare an overall bitrate.
        if bitrate.is_none() && stream_type == StreamType::Video {
            bitrate = container_bitrate;
        }

        streams.push(StreamInfo {
            index: stream.index,
            stream_type,
            codec_name,
            codecs,
            bitrate,
            width: stream.width,
            height: stream.height,
            sample_rate: stream.sample_rate.and_then(|s| s.parse().ok()),
            channels: stream.channels,
            language: stream.tags.language,
        });
    }

    Ok(MediaInfo {
        file_path: path.to_path_buf(),
        duration,
        streams,
    })
}

/// Convert ffprobe seconds to a millisecond-rounded duration.
///
/// `None` for NaN, negative values and anything past [`MAX_MEDIA_DURATION`].
fn seconds_to_duration(secs: f64) -> Option<Duration> {
    let d = Duration::try_from_secs_f64(secs).ok()?;
    (d <= MAX_MEDIA_DURATION).then(|| round_to_millis(d))
}

/// Parse `pts_time,flags` CSV rows, keeping keyframe packets.
fn parse_keyframes(csv: &str) -> Vec<Duration> {
    let mut keyframes: Vec<Duration> = csv
        .lines()
        .filter_map(|line| {
            let mut fields = line.trim().split(',');
            let pts = fields.next()?;
            let flags = fields.next()?;
            if !flags.contains('K') {
                return None;
            }
            pts.parse::<f64>().ok().and_then(seconds_to_duration)
        })
        .collect();
    // Packets arrive in decode order; B-frame reordering can swap pts.
    keyframes.sort();
    keyframes.dedup();
    keyframes
}
