//! Grouping segments into encoder windows.
//!
//! A window is the run of consecutive segments produced by a single encoder
//! launch. Windows partition the segment list without overlap; every window
//! holds `size` segments except possibly the last.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::planner::Segment;

/// A contiguous run of segments encoded by one process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    /// Position of the window, contiguous from 0.
    pub index: usize,
    pub segments: Vec<Segment>,
}

impl Window {
    /// Id of the first segment in the window.
    pub fn first_segment_id(&self) -> u64 {
        self.segments.first().map(|s| s.id).unwrap_or(0)
    }

    /// Id of the last segment in the window.
    pub fn last_segment_id(&self) -> u64 {
        self.segments.last().map(|s| s.id).unwrap_or(0)
    }

    pub fn contains(&self, segment_id: u64) -> bool {
        !self.segments.is_empty()
            && self.first_segment_id() <= segment_id
            && segment_id <= self.last_segment_id()
    }

    /// Offset of the window's first segment.
    pub fn start(&self) -> Duration {
        self.segments.first().map(|s| s.start).unwrap_or_default()
    }

    /// Summed duration of the window's segments.
    pub fn duration(&self) -> Duration {
        self.segments.iter().map(|s| s.duration).sum()
    }
}

/// Split `segments` into consecutive windows of `size` segments.
///
/// A `size` of zero is treated as one.
pub fn partition(segments: &[Segment], size: u64) -> Vec<Window> {
    let size = size.max(1) as usize;
    segments
        .chunks(size)
        .enumerate()
        .map(|(index, chunk)| Window {
            index,
            segments: chunk.to_vec(),
        })
        .collect()
}

/// Find the window containing `segment_id`.
pub fn find_window(windows: &[Window], segment_id: u64) -> Option<&Window> {
    windows.iter().find(|w| w.contains(segment_id))
}
