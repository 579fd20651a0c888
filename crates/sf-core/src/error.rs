//! Unified error type for the streamforged workspace.
//!
//! All crates funnel their failures into [`Error`], which carries enough context
//! for API handlers to derive an HTTP status code via [`Error::http_status`].

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Unified error type covering all failure modes in streamforged.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested entity could not be found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "file", "series").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// Request data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Media probing failed (unreadable or corrupt source).
    #[error("Probe error: {0}")]
    Probe(String),

    /// No representation of the stream is playable with the declared codecs.
    #[error("No representation of {stream_type} stream matches playable codecs [{playable}]")]
    RepresentationNotFound {
        stream_type: String,
        /// Comma-joined client codec list.
        playable: String,
    },

    /// The segment id belongs to no known window.
    #[error("Segment {segment_id} is out of range")]
    SegmentOutOfRange { segment_id: u64 },

    /// The segment did not become available within the deadline.
    #[error("Segment {segment_id} not available within {deadline:?}")]
    DeadlineExceeded { segment_id: u64, deadline: Duration },

    /// An external process could not be started.
    #[error("Failed to spawn {tool}: {message}")]
    Spawn {
        /// Name of the tool that failed to start.
        tool: String,
        message: String,
    },

    /// An external tool (ffmpeg, ffprobe) returned an error.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// A session output directory could not be read, created, or removed.
    #[error("Filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// The manifest could not be generated from the available timing data.
    #[error("Manifest error: {0}")]
    Manifest(String),

    /// The metadata agent (TMDB) failed or returned no match.
    #[error("Metadata error: {0}")]
    Metadata(String),

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to an appropriate HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::NotFound { .. } => 404,
            Error::Validation(_) => 400,
            Error::Probe(_) => 422,
            Error::RepresentationNotFound { .. } => 406,
            Error::SegmentOutOfRange { .. } => 404,
            Error::DeadlineExceeded { .. } => 504,
            Error::Spawn { .. } => 502,
            Error::Tool { .. } => 502,
            Error::Filesystem { .. } => 500,
            Error::Io { .. } => 500,
            Error::Manifest(_) => 500,
            Error::Metadata(_) => 502,
            Error::Internal(_) => 500,
        }
    }

    /// Short machine-readable code used in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Error::NotFound { .. } => "not_found",
            Error::Validation(_) => "validation_error",
            Error::Probe(_) => "probe_error",
            Error::RepresentationNotFound { .. } => "representation_not_found",
            Error::SegmentOutOfRange { .. } => "segment_out_of_range",
            Error::DeadlineExceeded { .. } => "deadline_exceeded",
            Error::Spawn { .. } => "spawn_error",
            Error::Tool { .. } => "tool_error",
            Error::Filesystem { .. } => "filesystem_error",
            Error::Io { .. } => "io_error",
            Error::Manifest(_) => "manifest_error",
            Error::Metadata(_) => "metadata_error",
            Error::Internal(_) => "internal_error",
        }
    }

    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Spawn`].
    pub fn spawn(tool: impl Into<String>, message: impl fmt::Display) -> Self {
        Error::Spawn {
            tool: tool.into(),
            message: message.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Filesystem`].
    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Filesystem {
            path: path.into(),
            source,
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display() {
        let err = Error::not_found("file", "movies/a.mkv");
        assert_eq!(err.to_string(), "file not found: movies/a.mkv");
        assert_eq!(err.http_status(), 404);
    }

    #[test]
    fn validation_display() {
        let err = Error::Validation("bad representation id".into());
        assert_eq!(err.to_string(), "Validation error: bad representation id");
        assert_eq!(err.http_status(), 400);
    }

    #[test]
    fn representation_not_found_display() {
        let err = Error::RepresentationNotFound {
            stream_type: "video".into(),
            playable: "vp9".into(),
        };
        assert_eq!(
            err.to_string(),
            "No representation of video stream matches playable codecs [vp9]"
        );
        assert_eq!(err.http_status(), 406);
        assert_eq!(err.code(), "representation_not_found");
    }

    #[test]
    fn deadline_exceeded_is_gateway_timeout() {
        let err = Error::DeadlineExceeded {
            segment_id: 14,
            deadline: Duration::from_secs(2),
        };
        assert!(err.to_string().contains("Segment 14"));
        assert_eq!(err.http_status(), 504);
    }

    #[test]
    fn segment_out_of_range_display() {
        let err = Error::SegmentOutOfRange { segment_id: 99 };
        assert_eq!(err.to_string(), "Segment 99 is out of range");
        assert_eq!(err.http_status(), 404);
    }

    #[test]
    fn spawn_display() {
        let err = Error::spawn("ffmpeg", "No such file or directory");
        assert_eq!(
            err.to_string(),
            "Failed to spawn ffmpeg: No such file or directory"
        );
        assert_eq!(err.http_status(), 502);
    }

    #[test]
    fn filesystem_display_includes_path() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = Error::filesystem("/tmp/sf-session-1", io);
        assert!(err.to_string().contains("/tmp/sf-session-1"));
        assert_eq!(err.http_status(), 500);
    }

    #[test]
    fn io_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io { .. }));
        assert_eq!(err.http_status(), 500);
    }

    #[test]
    fn tool_display() {
        let err = Error::tool("ffprobe", "exit code 1");
        assert_eq!(err.to_string(), "Tool error [ffprobe]: exit code 1");
        assert_eq!(err.http_status(), 502);
    }

    #[test]
    fn probe_display() {
        let err = Error::Probe("corrupt header".into());
        assert_eq!(err.to_string(), "Probe error: corrupt header");
        assert_eq!(err.http_status(), 422);
    }

    #[test]
    fn manifest_display() {
        let err = Error::Manifest("empty segment timeline".into());
        assert_eq!(err.to_string(), "Manifest error: empty segment timeline");
        assert_eq!(err.code(), "manifest_error");
    }

    #[test]
    fn result_alias() {
        fn ok_fn() -> Result<i32> {
            Ok(42)
        }
        assert_eq!(ok_fn().unwrap(), 42);

        fn err_fn() -> Result<i32> {
            Err(Error::Internal("boom".into()))
        }
        assert!(err_fn().is_err());
    }
}
