//! MPEG-DASH manifest (MPD) generation.

pub mod builder;
pub mod generator;
pub mod types;

pub use builder::{
    transcode_manifest, transmux_manifest, LadderRung, TranscodeLadder, DIRECT_REPRESENTATION_ID,
    SUBTITLE_REPRESENTATION_ID, SUBTITLE_TRACK_URL,
};
pub use generator::{format_duration, render_mpd, validate};
pub use types::{AdaptationSet, Mpd, Representation, SegmentAddressing, TimelinePosition};
