//! The two manifest shapes served to clients.
//!
//! A transmux manifest mirrors the source: one rendition per media type with
//! the probed codec, size and bitrate, addressed by an explicit timeline of
//! keyframe-aligned segment durations. A transcode manifest offers a ladder
//! of encoder outputs addressed by a constant segment duration.

use std::time::Duration;

use sf_core::{EncoderParams, StreamType};
use sf_probe::{MediaInfo, StreamInfo};

use super::types::{AdaptationSet, Mpd, Representation, SegmentAddressing};

/// Representation id of the passthrough rendition.
pub const DIRECT_REPRESENTATION_ID: &str = "direct";
/// Representation id of subtitle tracks.
pub const SUBTITLE_REPRESENTATION_ID: &str = "webvtt";
/// Track URL of a subtitle stream, relative to its adaptation set.
pub const SUBTITLE_TRACK_URL: &str = "webvtt/subtitles.vtt";

/// Sample rate advertised for AAC encodes when the source rate is unknown.
const DEFAULT_AUDIO_SAMPLE_RATE: u32 = 48_000;

/// One encoder output offered in a transcode manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LadderRung {
    /// Representation id, in the `preset:` or `transcode:` form.
    pub id: String,
    pub params: EncoderParams,
}

/// Encoder outputs offered for the primary video and audio streams.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranscodeLadder {
    pub video: Vec<LadderRung>,
    pub audio: Vec<LadderRung>,
}

/// Build the manifest for serving every stream without re-encoding.
///
/// The primary video and audio streams share `timeline`, the durations the
/// encoder cuts when remuxing at the video keyframes. Subtitle streams are
/// listed as whole-file text tracks.
pub fn transmux_manifest(info: &MediaInfo, timeline: &[Duration]) -> Mpd {
    let mut adaptation_sets = Vec::new();

    for stream in primary_streams(info) {
        let representation = Representation {
            id: DIRECT_REPRESENTATION_ID.to_string(),
            mime_type: stream.stream_type.mime_type().to_string(),
            codecs: stream.codecs.clone(),
            bandwidth: stream.bitrate,
            width: stream.width,
            height: stream.height,
            audio_sampling_rate: stream.sample_rate,
            addressing: SegmentAddressing::Timeline(timeline.to_vec()),
        };
        adaptation_sets.push(adaptation_set(stream, vec![representation]));
    }
    adaptation_sets.extend(subtitle_sets(info));

    Mpd {
        duration: info.duration,
        adaptation_sets,
    }
}

/// Build the manifest for serving encoder outputs at a fixed segment length.
pub fn transcode_manifest(info: &MediaInfo, ladder: &TranscodeLadder, segment: Duration) -> Mpd {
    let mut adaptation_sets = Vec::new();

    for stream in primary_streams(info) {
        let rungs = match stream.stream_type {
            StreamType::Video => &ladder.video,
            _ => &ladder.audio,
        };
        let representations = rungs
            .iter()
            .map(|rung| transcoded_representation(stream, rung, segment))
            .collect();
        adaptation_sets.push(adaptation_set(stream, representations));
    }
    adaptation_sets.extend(subtitle_sets(info));

    Mpd {
        duration: info.duration,
        adaptation_sets,
    }
}

fn transcoded_representation(
    stream: &StreamInfo,
    rung: &LadderRung,
    segment: Duration,
) -> Representation {
    let stream_type = stream.stream_type;
    let (width, height, audio_sampling_rate) = match stream_type {
        StreamType::Video => (Some(rung.params.width), Some(rung.params.height), None),
        _ => (
            None,
            None,
            Some(stream.sample_rate.unwrap_or(DEFAULT_AUDIO_SAMPLE_RATE)),
        ),
    };
    Representation {
        id: rung.id.clone(),
        mime_type: stream_type.mime_type().to_string(),
        codecs: rung.params.output_codecs(stream_type).to_string(),
        bandwidth: Some(rung.params.bandwidth(stream_type)),
        width,
        height,
        audio_sampling_rate,
        addressing: SegmentAddressing::Fixed(segment),
    }
}

/// The first video stream and the first audio stream, in that order.
fn primary_streams(info: &MediaInfo) -> impl Iterator<Item = &StreamInfo> {
    info.primary_video().into_iter().chain(info.primary_audio())
}

fn subtitle_sets(info: &MediaInfo) -> impl Iterator<Item = AdaptationSet> + '_ {
    info.streams_of(StreamType::Subtitle).map(|stream| {
        let representation = Representation {
            id: SUBTITLE_REPRESENTATION_ID.to_string(),
            mime_type: StreamType::Subtitle.mime_type().to_string(),
            codecs: "wvtt".to_string(),
            bandwidth: None,
            width: None,
            height: None,
            audio_sampling_rate: None,
            addressing: SegmentAddressing::SingleFile(SUBTITLE_TRACK_URL.to_string()),
        };
        adaptation_set(stream, vec![representation])
    })
}

fn adaptation_set(stream: &StreamInfo, representations: Vec<Representation>) -> AdaptationSet {
    AdaptationSet {
        stream_index: stream.index,
        stream_type: stream.stream_type,
        language: stream.language.clone(),
        representations,
    }
}
