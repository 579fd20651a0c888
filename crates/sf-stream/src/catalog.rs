//! Per-file answers built from probe results: the manifest, the stream
//! list, and the stream representation a segment URL refers to.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use sf_core::{Result, StreamType};
use sf_media::{plan_keyframe_durations, render_mpd, transcode_manifest, transmux_manifest};
use sf_probe::MediaInfo;

use crate::probe_cache::ProbeCache;
use crate::resolver::{Resolver, Stream, StreamRepresentation};

/// Which of the two manifest shapes was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestKind {
    Transmux,
    Transcode,
}

#[derive(Debug, Clone)]
pub struct Manifest {
    pub kind: ManifestKind,
    pub xml: String,
}

/// A probed stream and how a client would be served it.
#[derive(Debug, Clone, Serialize)]
pub struct StreamSummary {
    pub index: u32,
    pub stream_type: StreamType,
    pub codec_name: String,
    pub codecs: String,
    pub bitrate: Option<u64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub language: Option<String>,
    /// `None` when nothing is playable with the client's codecs.
    pub representation_id: Option<String>,
}

pub struct Catalog {
    probes: Arc<ProbeCache>,
    resolver: Arc<Resolver>,
}

impl Catalog {
    pub fn new(probes: Arc<ProbeCache>, resolver: Arc<Resolver>) -> Self {
        Self { probes, resolver }
    }

    pub fn probes(&self) -> &ProbeCache {
        &self.probes
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// The MPD for `path`.
    ///
    /// The transmux shape is served when the primary video and audio
    /// streams both resolve to `direct`; otherwise the transcode shape.
    pub async fn manifest(&self, path: &Path, playable: &[String]) -> Result<Manifest> {
        let media = self.probes.probe(path).await?;

        let mut direct = true;
        for info in [media.primary_video(), media.primary_audio()].into_iter().flatten() {
            let stream = Stream::from_media(&media, info.index)?;
            if !self.resolver.choose(&stream, playable)?.is_transmuxed() {
                direct = false;
            }
        }

        let (kind, mpd) = if direct {
            let keyframes = self.keyframes_for(path, &media).await?;
            let timeline = plan_keyframe_durations(
                &keyframes,
                media.duration,
                self.resolver.streaming().min_segment_duration(),
            );
            (ManifestKind::Transmux, transmux_manifest(&media, &timeline))
        } else {
            let ladder = self.resolver.transcode_ladder(&media, playable)?;
            let segment = self.resolver.streaming().transcode_segment_duration();
            (ManifestKind::Transcode, transcode_manifest(&media, &ladder, segment))
        };

        let xml = render_mpd(&mpd)?;
        tracing::debug!(path = %path.display(), ?kind, sets = mpd.adaptation_sets.len(), "Built manifest");
        Ok(Manifest { kind, xml })
    }

    /// Every stream of `path` with the representation a client with
    /// `playable` codecs would get.
    pub async fn streams(&self, path: &Path, playable: &[String]) -> Result<Vec<StreamSummary>> {
        let media = self.probes.probe(path).await?;
        media
            .streams
            .iter()
            .map(|info| {
                let stream = Stream::from_media(&media, info.index)?;
                let representation_id = self
                    .resolver
                    .choose(&stream, playable)
                    .ok()
                    .map(|r| r.id.to_string());
                Ok(StreamSummary {
                    index: info.index,
                    stream_type: info.stream_type,
                    codec_name: info.codec_name.clone(),
                    codecs: info.codecs.clone(),
                    bitrate: info.bitrate,
                    width: info.width,
                    height: info.height,
                    language: info.language.clone(),
                    representation_id,
                })
            })
            .collect()
    }

    /// The stream representation addressed by a segment URL.
    pub async fn stream_representation(
        &self,
        path: &Path,
        stream_index: u32,
        representation_id: &str,
    ) -> Result<StreamRepresentation> {
        let media = self.probes.probe(path).await?;
        let stream = Stream::from_media(&media, stream_index)?;
        let representation = self.resolver.representation_from_id(&stream, representation_id)?;
        let keyframes = if representation.is_transmuxed() {
            self.keyframes_for(path, &media).await?
        } else {
            Arc::new(Vec::new())
        };
        Ok(self.resolver.plan(stream, representation, &keyframes))
    }

    async fn keyframes_for(&self, path: &Path, media: &MediaInfo) -> Result<Arc<Vec<Duration>>> {
        if media.primary_video().is_some() {
            self.probes.keyframes(path).await
        } else {
            Ok(Arc::new(Vec::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::media;
    use async_trait::async_trait;
    use sf_core::config::StreamingConfig;
    use sf_core::Error;
    use sf_probe::Prober;

    struct FixedProber {
        media: MediaInfo,
        keyframes_ms: Vec<u64>,
    }

    #[async_trait]
    impl Prober for FixedProber {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn probe(&self, _path: &Path) -> Result<MediaInfo> {
            Ok(self.media.clone())
        }

        async fn probe_keyframes(&self, _path: &Path) -> Result<Vec<Duration>> {
            Ok(self.keyframes_ms.iter().copied().map(Duration::from_millis).collect())
        }
    }

    fn catalog() -> Catalog {
        catalog_with_keyframes(vec![0, 5200, 10100])
    }

    fn catalog_with_keyframes(keyframes_ms: Vec<u64>) -> Catalog {
        catalog_for(media(12_500), keyframes_ms)
    }

    fn catalog_for(media: MediaInfo, keyframes_ms: Vec<u64>) -> Catalog {
        let prober = Arc::new(FixedProber { media, keyframes_ms });
        Catalog::new(
            Arc::new(ProbeCache::new(prober)),
            Arc::new(Resolver::new(StreamingConfig::default())),
        )
    }

    fn codecs(list: &[&str]) -> Vec<String> {
        list.iter().map(|c| c.to_string()).collect()
    }

    #[tokio::test]
    async fn playable_source_gets_transmux_manifest() {
        let manifest = catalog()
            .manifest(Path::new("/media/a.mkv"), &codecs(&["avc1.64001f"]))
            .await
            .unwrap();
        assert_eq!(manifest.kind, ManifestKind::Transmux);
        assert!(manifest.xml.contains(r#"<S t="0" d="5200"/>"#), "{}", manifest.xml);
        assert!(manifest.xml.contains(r#"<S d="7300"/>"#));
        assert!(manifest.xml.contains(r#"<Representation id="direct""#));
        assert!(manifest.xml.contains("<BaseURL>webvtt/subtitles.vtt</BaseURL>"));
    }

    #[tokio::test]
    async fn keyframe_at_end_fails_closed() {
        // The last keyframe sits exactly at the end, leaving a zero-width
        // final segment.
        let err = catalog_with_keyframes(vec![0, 5200, 10100, 12500])
            .manifest(Path::new("/media/a.mkv"), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Manifest(_)), "got {err}");
    }

    #[tokio::test]
    async fn unplayable_source_gets_transcode_manifest() {
        let mut hevc = media(12_500);
        hevc.streams[0].codec_name = "hevc".into();
        hevc.streams[0].codecs = "hvc1.1.6.L93.B0".into();

        let manifest = catalog_for(hevc, vec![0])
            .manifest(Path::new("/media/a.mkv"), &codecs(&["avc1.64001e", "avc1.64001f"]))
            .await
            .unwrap();
        assert_eq!(manifest.kind, ManifestKind::Transcode);
        assert!(manifest.xml.contains(r#"duration="5000""#), "{}", manifest.xml);
        assert!(!manifest.xml.contains(r#"id="direct""#));
    }

    #[tokio::test]
    async fn nothing_playable_is_not_acceptable() {
        let err = catalog()
            .manifest(Path::new("/media/a.mkv"), &codecs(&["vp09.00.10.08"]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RepresentationNotFound { .. }));
        assert_eq!(err.http_status(), 406);
    }

    #[tokio::test]
    async fn streams_list_resolved_ids() {
        let streams = catalog()
            .streams(Path::new("/media/a.mkv"), &[])
            .await
            .unwrap();
        assert_eq!(streams.len(), 2);
        assert_eq!(streams[0].representation_id.as_deref(), Some("direct"));
        assert_eq!(streams[1].representation_id.as_deref(), Some("webvtt"));
    }

    #[tokio::test]
    async fn direct_representation_follows_keyframes() {
        let sr = catalog()
            .stream_representation(Path::new("/media/a.mkv"), 0, "direct")
            .await
            .unwrap();
        let durations: Vec<u128> = sr.segment_durations().iter().map(|d| d.as_millis()).collect();
        assert_eq!(durations, vec![5200, 7300]);

        let sr = catalog()
            .stream_representation(Path::new("/media/a.mkv"), 0, "preset:480-1000k-video")
            .await
            .unwrap();
        assert_eq!(sr.segment_count(), 3);
    }

    #[tokio::test]
    async fn unknown_stream_is_not_found() {
        let err = catalog()
            .stream_representation(Path::new("/media/a.mkv"), 7, "direct")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }
}
