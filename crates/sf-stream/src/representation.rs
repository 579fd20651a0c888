//! Playable renditions of a source stream and their stable ids.
//!
//! Representation ids travel through manifests and segment URLs, so their
//! text form is a contract with clients:
//!
//! ```text
//! direct
//! preset:<name>
//! transcode:width=<w>,height=<h>,videoBitrate=<bps>,audioBitrate=<bps>
//! webvtt
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use sf_core::{EncoderParams, Error, StreamType};
use sf_media::dash::{DIRECT_REPRESENTATION_ID, SUBTITLE_REPRESENTATION_ID};
use sf_probe::StreamInfo;

const PRESET_PREFIX: &str = "preset:";
const TRANSCODE_PREFIX: &str = "transcode:";

/// Parsed representation id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RepresentationId {
    /// Serve the source stream without re-encoding.
    Direct,
    /// A named entry of the configured preset table.
    Preset(String),
    /// Ad-hoc encoder parameters.
    Transcode(EncoderParams),
    /// The WebVTT rendition of a subtitle stream.
    Subtitle,
}

impl fmt::Display for RepresentationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => f.write_str(DIRECT_REPRESENTATION_ID),
            Self::Preset(name) => write!(f, "{PRESET_PREFIX}{name}"),
            Self::Transcode(params) => write!(f, "{TRANSCODE_PREFIX}{params}"),
            Self::Subtitle => f.write_str(SUBTITLE_REPRESENTATION_ID),
        }
    }
}

impl FromStr for RepresentationId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == DIRECT_REPRESENTATION_ID {
            return Ok(Self::Direct);
        }
        if s == SUBTITLE_REPRESENTATION_ID {
            return Ok(Self::Subtitle);
        }
        if let Some(name) = s.strip_prefix(PRESET_PREFIX) {
            if name.is_empty() {
                return Err(Error::Validation("empty preset name".into()));
            }
            return Ok(Self::Preset(name.to_string()));
        }
        if let Some(params) = s.strip_prefix(TRANSCODE_PREFIX) {
            return Ok(Self::Transcode(params.parse()?));
        }
        Err(Error::Validation(format!("unknown representation id '{s}'")))
    }
}

impl Serialize for RepresentationId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// How a representation's segments are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "params", rename_all = "lowercase")]
pub enum RepresentationKind {
    /// Repackaged from the source; segment boundaries follow its keyframes.
    Transmux,
    /// Re-encoded with the given parameters at a fixed segment length.
    Transcode(EncoderParams),
    /// Converted to WebVTT in one go.
    Subtitle,
}

/// One playable rendition of a stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Representation {
    pub id: RepresentationId,
    /// Bits per second, when known.
    pub bitrate: Option<u64>,
    /// MIME type of the served segments.
    pub container: &'static str,
    /// RFC 6381 codec string of the served segments.
    pub codecs: String,
    pub kind: RepresentationKind,
}

impl Representation {
    /// The passthrough rendition of `stream`.
    pub fn transmux(stream: &StreamInfo) -> Self {
        Self {
            id: RepresentationId::Direct,
            bitrate: stream.bitrate,
            container: stream.stream_type.mime_type(),
            codecs: stream.codecs.clone(),
            kind: RepresentationKind::Transmux,
        }
    }

    /// A re-encoded rendition of a video or audio stream.
    pub fn transcode(stream_type: StreamType, id: RepresentationId, params: EncoderParams) -> Self {
        Self {
            id,
            bitrate: Some(params.bandwidth(stream_type)),
            container: stream_type.mime_type(),
            codecs: params.output_codecs(stream_type).to_string(),
            kind: RepresentationKind::Transcode(params),
        }
    }

    /// The WebVTT rendition of a subtitle stream.
    pub fn subtitle() -> Self {
        Self {
            id: RepresentationId::Subtitle,
            bitrate: None,
            container: StreamType::Subtitle.mime_type(),
            codecs: "wvtt".to_string(),
            kind: RepresentationKind::Subtitle,
        }
    }

    pub fn is_transcoded(&self) -> bool {
        matches!(self.kind, RepresentationKind::Transcode(_))
    }

    pub fn is_transmuxed(&self) -> bool {
        self.kind == RepresentationKind::Transmux
    }
}
