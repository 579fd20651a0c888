//! # sf-av
//!
//! External tool plumbing for the streaming server.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find ffmpeg and ffprobe.
//! - **Command execution** ([`ToolCommand`]) -- async builder that either
//!   runs a tool to completion with a timeout or starts it as a process
//!   group leader for long-lived encoding.
//! - **Encoder invocations** ([`encoder`]) -- the ffmpeg argument lists that
//!   remux or transcode one window of a stream into DASH segments, plus
//!   WebVTT subtitle extraction.
//! - **Scratch directories** ([`Workspace`]) -- one per encoder process.
//! - **Probe backend** ([`probe::FfprobeProber`]) -- implements
//!   [`sf_probe::Prober`] on top of ffprobe.

pub mod command;
pub mod encoder;
pub mod probe;
pub mod tools;
pub mod workspace;

// ---- Re-exports for convenience ----

pub use command::{ToolCommand, ToolOutput};
pub use encoder::{EncodeMode, SegmentJob};
pub use probe::FfprobeProber;
pub use tools::{ToolInfo, ToolRegistry};
pub use workspace::Workspace;
