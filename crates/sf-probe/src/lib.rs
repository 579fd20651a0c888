//! # sf-probe
//!
//! The probing contract the streaming core depends on.
//!
//! A [`Prober`] answers two questions about a media file: what streams it
//! contains (codec, bitrate, resolution, total duration) and where its video
//! keyframes fall. The transmux planner needs the keyframes to cut segments
//! on boundaries the source already has.
//!
//! ```no_run
//! use sf_probe::Prober;
//! use std::path::Path;
//!
//! # async fn example(prober: &dyn Prober) -> sf_core::Result<()> {
//! let info = prober.probe(Path::new("episode.mkv")).await?;
//! if let Some(v) = info.primary_video() {
//!     println!("{} {}x{}", v.codecs, v.width.unwrap_or(0), v.height.unwrap_or(0));
//! }
//! # Ok(())
//! # }
//! ```

pub mod prober;
pub mod types;

pub use prober::Prober;
pub use types::{MediaInfo, StreamInfo};
