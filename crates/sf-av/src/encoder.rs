//! ffmpeg invocations that produce DASH segments for one window.
//!
//! Every invocation writes `init.mp4` plus `stream0_<N>.m4s` files into a
//! workspace, where `N` continues the absolute segment numbering of the
//! stream so later windows pick up where earlier ones stop.

use std::path::{Path, PathBuf};
use std::time::Duration;

use sf_core::EncoderParams;

use crate::command::ToolCommand;
use crate::workspace::INIT_SEGMENT_NAME;

/// How the selected stream is turned into segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeMode {
    /// Repackage the compressed stream unchanged. Cuts land on existing
    /// keyframes only.
    Copy,
    /// Re-encode to H.264 with keyframes forced every segment duration.
    Video(EncoderParams),
    /// Re-encode to stereo AAC.
    Audio(EncoderParams),
}

/// Everything needed to launch the encoder for one window.
#[derive(Debug, Clone)]
pub struct SegmentJob {
    pub input: PathBuf,
    /// Container stream index to map.
    pub stream_index: u32,
    pub mode: EncodeMode,
    /// Start offset of the window's first segment.
    pub window_start: Duration,
    /// Summed duration of the window's segments.
    pub window_duration: Duration,
    /// Absolute id of the window's first segment.
    pub first_segment: u64,
    /// Target segment length handed to the muxer.
    pub segment_duration: Duration,
    pub output_dir: PathBuf,
}

/// Format a duration as decimal seconds with millisecond precision, the
/// form ffmpeg accepts for `-ss`, `-t` and `-seg_duration`.
pub fn seconds_arg(d: Duration) -> String {
    let ms = d.as_millis();
    format!("{}.{:03}", ms / 1000, ms % 1000)
}

/// Build the ffmpeg command for a segmenting job.
pub fn segment_command(ffmpeg: &Path, job: &SegmentJob) -> ToolCommand {
    let mut cmd = ToolCommand::new(ffmpeg.to_path_buf());
    cmd.args(["-hide_banner", "-nostdin", "-loglevel", "error"]);
    cmd.arg("-ss").arg(seconds_arg(job.window_start));
    cmd.arg("-i").arg(job.input.to_string_lossy());
    cmd.arg("-copyts");
    cmd.arg("-t").arg(seconds_arg(job.window_duration));
    cmd.arg("-map").arg(format!("0:{}", job.stream_index));

    let seg_secs = seconds_arg(job.segment_duration);
    match job.mode {
        EncodeMode::Copy => {
            cmd.args(["-c:0", "copy"]);
        }
        EncodeMode::Video(p) => {
            cmd.args(["-c:0", "libx264", "-preset:0", "veryfast", "-profile:0", "high"]);
            cmd.arg("-b:0").arg(p.video_bitrate.to_string());
            cmd.arg("-filter:0").arg(format!("scale={}:{}", p.width, p.height));
            cmd.arg("-force_key_frames:0")
                .arg(format!("expr:gte(t,n_forced*{seg_secs})"));
        }
        EncodeMode::Audio(p) => {
            cmd.args(["-c:0", "aac", "-ac:0", "2"]);
            cmd.arg("-b:0").arg(p.audio_bitrate.to_string());
        }
    }

    cmd.args(["-f", "dash", "-use_template", "1", "-use_timeline", "0"]);
    cmd.arg("-seg_duration").arg(seg_secs);
    cmd.arg("-init_seg_name").arg(INIT_SEGMENT_NAME);
    cmd.arg("-media_seg_name").arg("stream$RepresentationID$_$Number$.m4s");
    cmd.arg("-start_number").arg(job.first_segment.to_string());
    cmd.arg(job.output_dir.join("manifest.mpd").to_string_lossy());
    cmd
}

/// Build the ffmpeg command that converts a subtitle stream to WebVTT.
pub fn subtitle_command(ffmpeg: &Path, input: &Path, stream_index: u32, output: &Path) -> ToolCommand {
    let mut cmd = ToolCommand::new(ffmpeg.to_path_buf());
    cmd.args(["-hide_banner", "-nostdin", "-loglevel", "error", "-y"]);
    cmd.arg("-i").arg(input.to_string_lossy());
    cmd.arg("-map").arg(format!("0:{stream_index}"));
    cmd.args(["-c:0", "webvtt", "-f", "webvtt"]);
    cmd.arg(output.to_string_lossy());
    cmd
}

/// Extract a subtitle stream to `output`, waiting for ffmpeg to finish.
pub async fn extract_subtitles(
    ffmpeg: &Path,
    input: &Path,
    stream_index: u32,
    output: &Path,
) -> sf_core::Result<()> {
    subtitle_command(ffmpeg, input, stream_index, output)
        .execute()
        .await?;
    tracing::debug!(
        input = %input.display(),
        stream = stream_index,
        "Extracted subtitles to WebVTT"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(mode: EncodeMode) -> SegmentJob {
        SegmentJob {
            input: PathBuf::from("/media/show/e01.mkv"),
            stream_index: 1,
            mode,
            window_start: Duration::from_millis(60_000),
            window_duration: Duration::from_millis(61_250),
            first_segment: 12,
            segment_duration: Duration::from_secs(5),
            output_dir: PathBuf::from("/tmp/sf-x"),
        }
    }

    fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn seconds_arg_keeps_milliseconds() {
        assert_eq!(seconds_arg(Duration::from_millis(61_250)), "61.250");
        assert_eq!(seconds_arg(Duration::from_millis(5)), "0.005");
        assert_eq!(seconds_arg(Duration::ZERO), "0.000");
    }

    #[test]
    fn copy_job_remuxes_window() {
        let cmd = segment_command(Path::new("ffmpeg"), &job(EncodeMode::Copy));
        let args = cmd.get_args();
        assert_eq!(value_after(args, "-ss"), Some("60.000"));
        assert_eq!(value_after(args, "-t"), Some("61.250"));
        assert_eq!(value_after(args, "-map"), Some("0:1"));
        assert_eq!(value_after(args, "-c:0"), Some("copy"));
        assert_eq!(value_after(args, "-start_number"), Some("12"));
        assert_eq!(value_after(args, "-init_seg_name"), Some("init.mp4"));
        assert!(args.iter().any(|a| a == "-copyts"));
        assert!(!args.iter().any(|a| a.starts_with("-force_key_frames")));
        assert_eq!(args.last().map(String::as_str), Some("/tmp/sf-x/manifest.mpd"));
    }

    #[test]
    fn video_job_forces_keyframes_at_segment_interval() {
        let params = EncoderParams {
            width: 1280,
            height: 720,
            video_bitrate: 5_000_000,
            audio_bitrate: 0,
        };
        let cmd = segment_command(Path::new("ffmpeg"), &job(EncodeMode::Video(params)));
        let args = cmd.get_args();
        assert_eq!(value_after(args, "-c:0"), Some("libx264"));
        assert_eq!(value_after(args, "-b:0"), Some("5000000"));
        assert_eq!(value_after(args, "-filter:0"), Some("scale=1280:720"));
        assert_eq!(
            value_after(args, "-force_key_frames:0"),
            Some("expr:gte(t,n_forced*5.000)")
        );
        assert_eq!(value_after(args, "-seg_duration"), Some("5.000"));
    }

    #[test]
    fn audio_job_downmixes_to_stereo_aac() {
        let params = EncoderParams {
            width: 0,
            height: 0,
            video_bitrate: 0,
            audio_bitrate: 128_000,
        };
        let cmd = segment_command(Path::new("ffmpeg"), &job(EncodeMode::Audio(params)));
        let args = cmd.get_args();
        assert_eq!(value_after(args, "-c:0"), Some("aac"));
        assert_eq!(value_after(args, "-ac:0"), Some("2"));
        assert_eq!(value_after(args, "-b:0"), Some("128000"));
    }

    #[test]
    fn subtitle_command_targets_webvtt() {
        let cmd = subtitle_command(
            Path::new("ffmpeg"),
            Path::new("/media/a.mkv"),
            3,
            Path::new("/tmp/out/subtitles.vtt"),
        );
        let args = cmd.get_args();
        assert_eq!(value_after(args, "-map"), Some("0:3"));
        assert_eq!(value_after(args, "-f"), Some("webvtt"));
        assert_eq!(args.last().map(String::as_str), Some("/tmp/out/subtitles.vtt"));
    }
}
