//! MPD document model.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use sf_core::StreamType;

/// A static single-period MPD.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mpd {
    /// Total presentation duration.
    pub duration: Duration,
    /// One adaptation set per advertised stream.
    pub adaptation_sets: Vec<AdaptationSet>,
}

/// All renditions of one source stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdaptationSet {
    /// Container index of the source stream; becomes the set's `BaseURL`.
    pub stream_index: u32,
    pub stream_type: StreamType,
    pub language: Option<String>,
    pub representations: Vec<Representation>,
}

/// One rendition inside an adaptation set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Representation {
    /// Representation id, echoed back by clients in segment URLs.
    pub id: String,
    pub mime_type: String,
    pub codecs: String,
    pub bandwidth: Option<u64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub audio_sampling_rate: Option<u32>,
    pub addressing: SegmentAddressing,
}

/// How a client locates the segments of a representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SegmentAddressing {
    /// Explicit per-segment durations.
    Timeline(Vec<Duration>),
    /// Every segment has the same nominal duration.
    Fixed(Duration),
    /// The whole track is one file at a URL relative to the set's base.
    SingleFile(String),
}

/// Position of an entry within a `SegmentTimeline`.
///
/// Only the first entry carries an explicit start time (`t="0"`); the rest
/// follow on from their predecessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelinePosition {
    First,
    Rest,
}

/// Pair each timeline duration with its position marker.
pub fn timeline_entries(
    durations: &[Duration],
) -> impl Iterator<Item = (TimelinePosition, Duration)> + '_ {
    let first = durations
        .first()
        .map(|&d| (TimelinePosition::First, d))
        .into_iter();
    let rest = durations
        .iter()
        .skip(1)
        .map(|&d| (TimelinePosition::Rest, d));
    first.chain(rest)
}
