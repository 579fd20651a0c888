//! sf-media: segment planning and DASH manifest generation.
//!
//! This crate holds the pure bookkeeping behind on-demand DASH delivery:
//! where segment boundaries fall, how segments are grouped into encoder
//! windows, and how the result is described to clients as an MPD.
//!
//! # Modules
//!
//! - [`planner`] - Segment durations from keyframes or a fixed interval
//! - [`window`] - Fixed-size groups of segments, one encoder process each
//! - [`dash`] - MPD document model, builders and rendering

pub mod dash;
pub mod planner;
pub mod window;

// Re-export commonly used items at the crate root.
pub use dash::{format_duration, render_mpd, transcode_manifest, transmux_manifest, Mpd};
pub use planner::{plan_fixed_durations, plan_keyframe_durations, segments_from_durations, Segment};
pub use window::{find_window, partition, Window};
