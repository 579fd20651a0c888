//! Shared test harness for integration tests.
//!
//! [`TestHarness`] builds a full [`AppContext`] around a canned prober, a
//! shell-script stand-in for ffmpeg and a temporary media root, then serves
//! it on a random port.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sf_core::config::Config;
use sf_core::StreamType;
use sf_metadata::agent::{EpisodeDetails, SeasonDetails, SeriesDetails, SeriesMatch};
use sf_metadata::{MetadataAgent, NullAgent};
use sf_probe::{MediaInfo, Prober, StreamInfo};
use sf_server::context::AppContext;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Media segments the fake encoder writes per session.
pub const FAKE_SEGMENTS_PER_RUN: u32 = 5;

/// Relative path of the sample episode under the media root.
pub const SAMPLE_FILE: &str = "tv/Show Name/Show.Name.S01E02.mkv";

/// A 12.5 s file: H.264 video, AAC audio and an SRT subtitle track.
pub fn sample_media(path: &Path, video_codecs: &str) -> MediaInfo {
    MediaInfo {
        file_path: path.to_path_buf(),
        duration: Duration::from_millis(12_500),
        streams: vec![
            StreamInfo {
                index: 0,
                stream_type: StreamType::Video,
                codec_name: "h264".into(),
                codecs: video_codecs.into(),
                bitrate: Some(3_000_000),
                width: Some(1280),
                height: Some(720),
                sample_rate: None,
                channels: None,
                language: None,
            },
            StreamInfo {
                index: 1,
                stream_type: StreamType::Audio,
                codec_name: "aac".into(),
                codecs: "mp4a.40.2".into(),
                bitrate: Some(128_000),
                width: None,
                height: None,
                sample_rate: Some(48_000),
                channels: Some(2),
                language: Some("eng".into()),
            },
            StreamInfo {
                index: 2,
                stream_type: StreamType::Subtitle,
                codec_name: "subrip".into(),
                codecs: "wvtt".into(),
                bitrate: None,
                width: None,
                height: None,
                sample_rate: None,
                channels: None,
                language: Some("eng".into()),
            },
        ],
    }
}

/// Prober answering from [`sample_media`] for any file that exists.
pub struct CannedProber {
    pub video_codecs: String,
}

#[async_trait]
impl Prober for CannedProber {
    fn name(&self) -> &'static str {
        "canned"
    }

    async fn probe(&self, path: &Path) -> sf_core::Result<MediaInfo> {
        if !path.exists() {
            return Err(sf_core::Error::Probe(format!("{} does not exist", path.display())));
        }
        Ok(sample_media(path, &self.video_codecs))
    }

    async fn probe_keyframes(&self, _path: &Path) -> sf_core::Result<Vec<Duration>> {
        Ok([0, 5_200, 10_100].into_iter().map(Duration::from_millis).collect())
    }
}

/// Agent that knows a single series, "Show Name" (TMDB id 1).
pub struct SingleShowAgent;

#[async_trait]
impl MetadataAgent for SingleShowAgent {
    fn name(&self) -> &'static str {
        "single-show"
    }

    async fn search_tv(&self, _query: &str, _year: Option<u32>) -> sf_core::Result<Vec<SeriesMatch>> {
        Ok(vec![SeriesMatch {
            tmdb_id: 1,
            name: "Show Name".into(),
            first_air_date: Some("2010-01-01".into()),
        }])
    }

    async fn series(&self, _tmdb_id: u64) -> sf_core::Result<SeriesDetails> {
        Ok(SeriesDetails {
            name: "Show Name".into(),
            overview: None,
            first_air_date: Some("2010-01-01".into()),
        })
    }

    async fn season(&self, _tmdb_id: u64, season_number: u32) -> sf_core::Result<SeasonDetails> {
        Ok(SeasonDetails {
            name: Some(format!("Season {season_number}")),
        })
    }

    async fn episode(&self, _tmdb_id: u64, _s: u32, episode_number: u32) -> sf_core::Result<EpisodeDetails> {
        Ok(EpisodeDetails {
            name: Some(format!("Episode {episode_number}")),
        })
    }
}

/// Stand-in for ffmpeg.
///
/// Subtitle conversions (output ending in `.vtt`) write a WebVTT header and
/// exit. Segment jobs write `init.mp4` plus [`FAKE_SEGMENTS_PER_RUN`] media
/// segments numbered from `-start_number`, then idle until killed.
fn write_fake_ffmpeg(dir: &Path) -> PathBuf {
    let script = format!(
        r#"#!/bin/sh
out=""
start=0
while [ $# -gt 0 ]; do
  case "$1" in
    -start_number) start="$2"; shift 2 ;;
    *) out="$1"; shift ;;
  esac
done
case "$out" in
  *.vtt) printf 'WEBVTT\n' > "$out"; exit 0 ;;
esac
dir=$(dirname "$out")
printf 'init' > "$dir/init.mp4"
i=0
while [ $i -lt {FAKE_SEGMENTS_PER_RUN} ]; do
  n=$((start + i))
  printf 'segment %s' "$n" > "$dir/stream0_$n.m4s"
  i=$((i + 1))
done
sleep 30
"#
    );
    let path = dir.join("ffmpeg");
    std::fs::write(&path, script).expect("failed to write fake ffmpeg");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("failed to chmod fake ffmpeg");
    path
}

pub struct HarnessOptions {
    pub video_codecs: String,
    pub agent: Arc<dyn MetadataAgent>,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            video_codecs: "avc1.64001f".into(),
            agent: Arc::new(NullAgent),
        }
    }
}

/// A running server plus everything it was built from.
pub struct TestHarness {
    pub ctx: AppContext,
    pub addr: SocketAddr,
    pub client: reqwest::Client,
    pub cancel: CancellationToken,
    pub server: tokio::task::JoinHandle<sf_core::Result<()>>,
    _dir: TempDir,
}

impl TestHarness {
    /// Serve the sample file with default options.
    pub async fn start() -> Self {
        Self::with_options(HarnessOptions::default()).await
    }

    pub async fn with_options(options: HarnessOptions) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let media_root = dir.path().join("media");
        let scratch = dir.path().join("scratch");
        std::fs::create_dir_all(&scratch).expect("failed to create scratch dir");

        let sample = media_root.join(SAMPLE_FILE);
        std::fs::create_dir_all(sample.parent().expect("sample has a parent"))
            .expect("failed to create media dirs");
        std::fs::write(&sample, b"not really matroska").expect("failed to write sample");

        let mut config = Config::default();
        config.server.media_root = media_root;
        config.streaming.temp_dir = Some(scratch);
        config.streaming.poll_interval_ms = 10;
        config.streaming.segment_deadline_secs = 5;

        let prober: Arc<dyn Prober> = Arc::new(CannedProber {
            video_codecs: options.video_codecs,
        });
        let ffmpeg = write_fake_ffmpeg(dir.path());
        let ctx = AppContext::new(config, prober, options.agent, ffmpeg);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        let cancel = CancellationToken::new();
        let server = tokio::spawn(sf_server::serve(listener, ctx.clone(), cancel.clone()));

        Self {
            ctx,
            addr,
            client: reqwest::Client::new(),
            cancel,
            server,
            _dir: dir,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Base URL of the streaming routes for the file at `relative`.
    pub fn stream_url(&self, relative: &str, rest: &str) -> String {
        let id = sf_server::encode_file_id(Path::new(relative));
        self.url(&format!("/api/stream/{id}/{rest}"))
    }

    pub async fn get(&self, url: &str) -> reqwest::Response {
        self.client.get(url).send().await.expect("request failed")
    }

    /// Stop the server and wait for it to destroy its sessions.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        self.server
            .await
            .expect("server task panicked")
            .expect("server returned an error");
    }
}
