//! Choosing how each source stream is served.
//!
//! A client lists the codec strings it can decode. A stream whose own codec
//! is on that list (or any stream, when the list is empty) is remuxed as-is.
//! Anything else is transcoded, preferring parameters close to the source
//! over the configured fallback preset. Representation ids coming back from
//! clients are mapped to the same [`Representation`] values by
//! [`Resolver::from_id`].

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use sf_core::config::StreamingConfig;
use sf_core::{EncoderParams, Error, Result, StreamType, VIDEO_BITRATE_RANGE};
use sf_media::dash::{LadderRung, TranscodeLadder};
use sf_media::{
    partition, plan_fixed_durations, plan_keyframe_durations, segments_from_durations, Segment,
    Window,
};
use sf_probe::{MediaInfo, StreamInfo};

use crate::representation::{Representation, RepresentationId, RepresentationKind};

const MIN_AUDIO_BITRATE: u64 = 64_000;
const MAX_AUDIO_BITRATE: u64 = 320_000;
const DEFAULT_AUDIO_BITRATE: u64 = 128_000;

/// A source stream of a media file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stream {
    /// The media file the stream belongs to.
    pub file: PathBuf,
    /// Total duration of the file.
    pub duration: Duration,
    pub info: StreamInfo,
}

impl Stream {
    /// Select stream `index` of a probed file.
    pub fn from_media(media: &MediaInfo, index: u32) -> Result<Self> {
        let info = media
            .stream(index)
            .ok_or_else(|| Error::not_found("stream", index))?;
        Ok(Self {
            file: media.file_path.clone(),
            duration: media.duration,
            info: info.clone(),
        })
    }

    /// Container index of the stream.
    pub fn index(&self) -> u32 {
        self.info.index
    }

    pub fn stream_type(&self) -> StreamType {
        self.info.stream_type
    }
}

/// A stream paired with the rendition it is served as and the segment
/// windows that rendition is produced in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamRepresentation {
    pub stream: Stream,
    pub representation: Representation,
    pub windows: Vec<Window>,
}

impl StreamRepresentation {
    /// All segments in order.
    pub fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.windows.iter().flat_map(|w| w.segments.iter())
    }

    pub fn segment_count(&self) -> usize {
        self.windows.iter().map(|w| w.segments.len()).sum()
    }

    /// Per-segment durations in order.
    pub fn segment_durations(&self) -> Vec<Duration> {
        self.segments().map(|s| s.duration).collect()
    }

    /// The window containing `segment_id`.
    pub fn find_window(&self, segment_id: u64) -> Result<&Window> {
        sf_media::find_window(&self.windows, segment_id)
            .ok_or(Error::SegmentOutOfRange { segment_id })
    }
}

/// Picks representations using the configured presets and segment timing.
#[derive(Debug, Clone)]
pub struct Resolver {
    streaming: StreamingConfig,
}

impl Resolver {
    pub fn new(streaming: StreamingConfig) -> Self {
        Self { streaming }
    }

    pub fn streaming(&self) -> &StreamingConfig {
        &self.streaming
    }

    /// Choose the representation a client with `playable` codecs receives.
    pub fn choose(&self, stream: &Stream, playable: &[String]) -> Result<Representation> {
        if stream.stream_type() == StreamType::Subtitle {
            return Ok(Representation::subtitle());
        }
        if playable.is_empty() || playable.iter().any(|c| *c == stream.info.codecs) {
            return Ok(Representation::transmux(&stream.info));
        }

        self.candidates(stream)
            .into_iter()
            .find(|r| playable.iter().any(|c| *c == r.codecs))
            .ok_or_else(|| Error::RepresentationNotFound {
                stream_type: stream.stream_type().to_string(),
                playable: playable.join(","),
            })
    }

    /// Transcode candidates in order of preference: parameters similar to
    /// the source first, then the configured fallback preset.
    pub fn candidates(&self, stream: &Stream) -> Vec<Representation> {
        let stream_type = stream.stream_type();
        let mut out = Vec::new();

        if let Some(params) = similar_params(&stream.info) {
            out.push(Representation::transcode(
                stream_type,
                RepresentationId::Transcode(params),
                params,
            ));
        }

        let fallback = match stream_type {
            StreamType::Video => &self.streaming.fallback_video_preset,
            StreamType::Audio => &self.streaming.fallback_audio_preset,
            StreamType::Subtitle => return out,
        };
        if let Some(params) = self.streaming.presets.get(stream_type, fallback) {
            out.push(Representation::transcode(
                stream_type,
                RepresentationId::Preset(fallback.clone()),
                *params,
            ));
        }
        out
    }

    /// Map a representation id received from a client back to its
    /// representation.
    ///
    /// Subtitle streams always map to the WebVTT rendition.
    pub fn representation_from_id(&self, stream: &Stream, id: &str) -> Result<Representation> {
        let stream_type = stream.stream_type();
        if stream_type == StreamType::Subtitle {
            return Ok(Representation::subtitle());
        }

        match id.parse::<RepresentationId>()? {
            RepresentationId::Direct => Ok(Representation::transmux(&stream.info)),
            RepresentationId::Preset(name) => {
                let params = self
                    .streaming
                    .presets
                    .get(stream_type, &name)
                    .ok_or_else(|| Error::not_found("representation", id))?;
                Ok(Representation::transcode(
                    stream_type,
                    RepresentationId::Preset(name),
                    *params,
                ))
            }
            RepresentationId::Transcode(params) => {
                let source = stream.info.width.zip(stream.info.height);
                params.validate(stream_type, source)?;
                Ok(Representation::transcode(
                    stream_type,
                    RepresentationId::Transcode(params),
                    params,
                ))
            }
            RepresentationId::Subtitle => Err(Error::not_found("representation", id)),
        }
    }

    /// Choose a representation and lay out its segment windows.
    pub fn resolve(
        &self,
        stream: &Stream,
        keyframes: &[Duration],
        playable: &[String],
    ) -> Result<StreamRepresentation> {
        let representation = self.choose(stream, playable)?;
        Ok(self.plan(stream.clone(), representation, keyframes))
    }

    /// Rebuild the stream representation a client refers to by id.
    pub fn from_id(
        &self,
        stream: &Stream,
        keyframes: &[Duration],
        id: &str,
    ) -> Result<StreamRepresentation> {
        let representation = self.representation_from_id(stream, id)?;
        Ok(self.plan(stream.clone(), representation, keyframes))
    }

    /// Lay out the segment windows of `representation`.
    ///
    /// `keyframes` only matter for transmuxed representations.
    pub fn plan(
        &self,
        stream: Stream,
        representation: Representation,
        keyframes: &[Duration],
    ) -> StreamRepresentation {
        let windows = match representation.kind {
            RepresentationKind::Transmux => {
                let durations = plan_keyframe_durations(
                    keyframes,
                    stream.duration,
                    self.streaming.min_segment_duration(),
                );
                partition(&segments_from_durations(&durations), self.streaming.window_size())
            }
            RepresentationKind::Transcode(_) => {
                let durations = plan_fixed_durations(
                    stream.duration,
                    self.streaming.transcode_segment_duration(),
                );
                partition(&segments_from_durations(&durations), self.streaming.window_size())
            }
            RepresentationKind::Subtitle => {
                partition(&segments_from_durations(&[stream.duration]), 1)
            }
        };

        StreamRepresentation {
            stream,
            representation,
            windows,
        }
    }

    /// Encoder outputs to offer in a transcode manifest.
    ///
    /// For the primary video and audio streams this is every candidate and
    /// every preset of the stream's type whose output codec the client can
    /// play. Video presets taller than the source are left out. Fails with
    /// [`Error::RepresentationNotFound`] when a primary stream ends up with
    /// nothing to offer.
    pub fn transcode_ladder(&self, media: &MediaInfo, playable: &[String]) -> Result<TranscodeLadder> {
        let mut ladder = TranscodeLadder::default();

        if let Some(video) = media.primary_video() {
            ladder.video = self.rungs_for(media, video, playable)?;
        }
        if let Some(audio) = media.primary_audio() {
            ladder.audio = self.rungs_for(media, audio, playable)?;
        }
        Ok(ladder)
    }

    fn rungs_for(
        &self,
        media: &MediaInfo,
        info: &StreamInfo,
        playable: &[String],
    ) -> Result<Vec<LadderRung>> {
        let stream_type = info.stream_type;
        let stream = Stream::from_media(media, info.index)?;

        let mut offered: Vec<Representation> = self.candidates(&stream);
        if let Some(presets) = self.streaming.presets.for_type(stream_type) {
            for (name, params) in presets {
                let fits = match (stream_type, info.height) {
                    (StreamType::Video, Some(source_height)) => params.height <= source_height,
                    _ => true,
                };
                if fits {
                    offered.push(Representation::transcode(
                        stream_type,
                        RepresentationId::Preset(name.clone()),
                        *params,
                    ));
                }
            }
        }

        let mut rungs: Vec<LadderRung> = Vec::new();
        for repr in offered {
            let RepresentationKind::Transcode(params) = repr.kind else {
                continue;
            };
            let playable_codec = playable.is_empty() || playable.iter().any(|c| *c == repr.codecs);
            if playable_codec && !rungs.iter().any(|r| r.params == params) {
                rungs.push(LadderRung {
                    id: repr.id.to_string(),
                    params,
                });
            }
        }

        if rungs.is_empty() {
            return Err(Error::RepresentationNotFound {
                stream_type: stream_type.to_string(),
                playable: playable.join(","),
            });
        }
        rungs.sort_by_key(|r| r.params.bandwidth(stream_type));
        Ok(rungs)
    }
}

/// Encoder parameters that keep the source's resolution and bitrate class.
///
/// Video keeps the source dimensions rounded down to even numbers (H.264
/// with 4:2:0 chroma requires it) and the source bitrate, or a default for
/// the height class when the bitrate is unknown, clamped to what
/// `transcode:` ids accept. Audio keeps the source
/// bitrate clamped to a sane AAC range. Returns `None` for video without
/// known dimensions and for subtitles.
pub fn similar_params(stream: &StreamInfo) -> Option<EncoderParams> {
    match stream.stream_type {
        StreamType::Video => {
            let width = stream.width? & !1;
            let height = stream.height? & !1;
            if width == 0 || height == 0 {
                return None;
            }
            Some(EncoderParams {
                width,
                height,
                video_bitrate: stream
                    .bitrate
                    .map(|b| b.clamp(*VIDEO_BITRATE_RANGE.start(), *VIDEO_BITRATE_RANGE.end()))
                    .unwrap_or_else(|| default_video_bitrate(height)),
                audio_bitrate: 0,
            })
        }
        StreamType::Audio => Some(EncoderParams {
            width: 0,
            height: 0,
            video_bitrate: 0,
            audio_bitrate: stream
                .bitrate
                .map(|b| b.clamp(MIN_AUDIO_BITRATE, MAX_AUDIO_BITRATE))
                .unwrap_or(DEFAULT_AUDIO_BITRATE),
        }),
        StreamType::Subtitle => None,
    }
}

fn default_video_bitrate(height: u32) -> u64 {
    match height {
        0..=480 => 1_000_000,
        481..=720 => 5_000_000,
        721..=1080 => 10_000_000,
        _ => 20_000_000,
    }
}
