//! DASH streaming route handlers.
//!
//! URLs address a file by its [file id](crate::file_id), a stream by its
//! container index and a rendition by its representation id:
//!
//! ```text
//! /api/stream/{file}/manifest.mpd?playableCodecs=avc1.64001f,mp4a.40.2
//! /api/stream/{file}/{stream}/{repr}/init.mp4
//! /api/stream/{file}/{stream}/{repr}/{n}.m4s
//! /api/stream/{file}/{stream}/webvtt/subtitles.vtt
//! ```
//!
//! The segment paths are what the manifest's templates expand to relative
//! to the manifest URL.

use std::path::Path as FsPath;

use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use sf_core::{Error, StreamType};
use sf_stream::{RepresentationKind, StreamRepresentation, StreamSummary};

use crate::context::AppContext;
use crate::error::AppError;
use crate::file_id::decode_file_id;

const DASH_CONTENT_TYPE: &str = "application/dash+xml";
const VTT_CONTENT_TYPE: &str = "text/vtt";
const INIT_SEGMENT: &str = "init.mp4";
const SUBTITLE_TRACK: &str = "subtitles.vtt";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayableQuery {
    /// Comma-separated RFC 6381 codec strings the client can decode.
    pub playable_codecs: Option<String>,
}

impl PlayableQuery {
    fn codecs(&self) -> Vec<String> {
        self.playable_codecs
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(String::from)
            .collect()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct InitQuery {
    /// Segment the client is about to fetch; picks the window whose session
    /// serves the init segment.
    pub segment: Option<u64>,
}

/// GET /api/stream/{file}/manifest.mpd
pub async fn manifest(
    State(ctx): State<AppContext>,
    Path(file): Path<String>,
    Query(query): Query<PlayableQuery>,
) -> Result<impl IntoResponse, AppError> {
    let path = decode_file_id(ctx.media_root(), &file)?;
    let manifest = ctx.catalog.manifest(&path, &query.codecs()).await?;
    Ok(([(header::CONTENT_TYPE, DASH_CONTENT_TYPE)], manifest.xml))
}

/// GET /api/stream/{file}/streams
pub async fn streams(
    State(ctx): State<AppContext>,
    Path(file): Path<String>,
    Query(query): Query<PlayableQuery>,
) -> Result<Json<Vec<StreamSummary>>, AppError> {
    let path = decode_file_id(ctx.media_root(), &file)?;
    Ok(Json(ctx.catalog.streams(&path, &query.codecs()).await?))
}

/// GET /api/stream/{file}/{stream}/{repr}/{segment}
///
/// `segment` is `init.mp4`, `<n>.m4s`, or `subtitles.vtt` under the
/// `webvtt` representation.
pub async fn segment(
    State(ctx): State<AppContext>,
    Path((file, stream_index, repr, segment)): Path<(String, u32, String, String)>,
    Query(query): Query<InitQuery>,
) -> Result<Response, AppError> {
    let path = decode_file_id(ctx.media_root(), &file)?;
    let sr = ctx
        .catalog
        .stream_representation(&path, stream_index, &repr)
        .await?;
    let is_subtitle = sr.representation.kind == RepresentationKind::Subtitle;

    if segment == SUBTITLE_TRACK && is_subtitle {
        return subtitle_track(&ctx, &sr).await;
    }
    if is_subtitle {
        return Err(Error::not_found("segment", &segment).into());
    }

    if segment == INIT_SEGMENT {
        return init_segment(&ctx, &sr, query.segment.unwrap_or(0)).await;
    }

    let segment_id = segment
        .strip_suffix(".m4s")
        .and_then(|n| n.parse::<u64>().ok())
        .ok_or_else(|| Error::not_found("segment", &segment))?;
    media_segment(&ctx, &sr, segment_id).await
}

async fn init_segment(ctx: &AppContext, sr: &StreamRepresentation, hint: u64) -> Result<Response, AppError> {
    let session = ctx.sessions.get_or_start(sr, hint).await?;
    let file = session.wait_for_initial_segment(ctx.segment_deadline()).await?;
    serve_file(&file, sr.representation.container).await
}

async fn media_segment(ctx: &AppContext, sr: &StreamRepresentation, segment_id: u64) -> Result<Response, AppError> {
    let session = ctx.sessions.get_or_start(sr, segment_id).await?;
    let file = session.get_segment(segment_id, ctx.segment_deadline()).await?;
    serve_file(&file, sr.representation.container).await
}

async fn subtitle_track(ctx: &AppContext, sr: &StreamRepresentation) -> Result<Response, AppError> {
    debug_assert_eq!(sr.stream.stream_type(), StreamType::Subtitle);
    let session = ctx.sessions.get_or_start(sr, 0).await?;
    let file = session.get_segment(0, ctx.segment_deadline()).await?;
    serve_file(&file, VTT_CONTENT_TYPE).await
}

async fn serve_file(file: &FsPath, content_type: &'static str) -> Result<Response, AppError> {
    let bytes = tokio::fs::read(file)
        .await
        .map_err(|e| Error::filesystem(file, e))?;
    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn playable_codecs_are_split_and_trimmed() {
        let q = PlayableQuery {
            playable_codecs: Some("avc1.64001f, mp4a.40.2,,".into()),
        };
        assert_eq!(q.codecs(), vec!["avc1.64001f", "mp4a.40.2"]);
        assert!(PlayableQuery::default().codecs().is_empty());
    }
}
