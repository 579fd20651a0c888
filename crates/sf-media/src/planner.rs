//! Segment duration planning.
//!
//! Turns keyframe positions (transmux) or a fixed interval (transcode) plus
//! the total media duration into the ordered list of segments a
//! representation is served as. For every input the produced durations sum
//! to the total duration exactly; inputs are expected to be rounded to whole
//! milliseconds already, so the sum is exact at that precision too.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// One independently fetchable chunk of a representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Position in the representation, contiguous from 0.
    pub id: u64,
    /// Offset of the segment from the start of the media.
    pub start: Duration,
    pub duration: Duration,
}

impl Segment {
    /// Offset at which the next segment starts.
    pub fn end(&self) -> Duration {
        self.start + self.duration
    }
}

/// Plan transmux segment durations from keyframe positions.
///
/// Walks the keyframes and closes a segment at the first keyframe that lies
/// at least `min` after the previous boundary, so every boundary is a
/// keyframe the source already has. Whatever remains after the last cut
/// becomes the final segment regardless of its length, even when that is
/// zero because a keyframe sits exactly at `total`.
///
/// Keyframes beyond `total` are ignored. A zero `total` yields no segments.
pub fn plan_keyframe_durations(
    keyframes: &[Duration],
    total: Duration,
    min: Duration,
) -> Vec<Duration> {
    if total.is_zero() {
        return Vec::new();
    }

    let mut durations = Vec::new();
    let mut last = Duration::ZERO;

    for &kf in keyframes.iter().filter(|&&kf| kf <= total) {
        let Some(elapsed) = kf.checked_sub(last) else {
            continue;
        };
        if !elapsed.is_zero() && elapsed >= min {
            durations.push(elapsed);
            last = kf;
        }
    }

    durations.push(total - last);
    durations
}

/// Plan transcode segment durations at a fixed interval.
///
/// All segments are `segment` long except the last, which is shortened to
/// whatever remains. A zero `total` yields no segments.
pub fn plan_fixed_durations(total: Duration, segment: Duration) -> Vec<Duration> {
    if total.is_zero() {
        return Vec::new();
    }
    if segment.is_zero() {
        return vec![total];
    }

    let full = (total.as_nanos() / segment.as_nanos()) as usize;
    let mut durations = vec![segment; full];
    let covered = segment * full as u32;
    if total > covered {
        durations.push(total - covered);
    }
    durations
}

/// Number durations into contiguous segments starting at id 0.
pub fn segments_from_durations(durations: &[Duration]) -> Vec<Segment> {
    let mut start = Duration::ZERO;
    durations
        .iter()
        .enumerate()
        .map(|(i, &duration)| {
            let segment = Segment {
                id: i as u64,
                start,
                duration,
            };
            start += duration;
            segment
        })
        .collect()
}
