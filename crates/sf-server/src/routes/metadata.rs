//! Series metadata routes.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use sf_core::{EpisodeFileId, Error};
use sf_metadata::{GcReport, MatchedFile, SeriesTree};

use crate::context::AppContext;
use crate::error::AppError;
use crate::file_id::resolve_media_path;

#[derive(Debug, Deserialize)]
pub struct RegisterFileRequest {
    /// Path relative to the media root.
    pub path: String,
}

/// GET /api/metadata/series
pub async fn list_series(State(ctx): State<AppContext>) -> Json<Vec<SeriesTree>> {
    Json(ctx.metadata.series_tree())
}

/// POST /api/metadata/episode-files
pub async fn register_episode_file(
    State(ctx): State<AppContext>,
    Json(req): Json<RegisterFileRequest>,
) -> Result<(StatusCode, Json<MatchedFile>), AppError> {
    let path = resolve_media_path(ctx.media_root(), &req.path)?;
    let matched = ctx.metadata.register_episode_file(path).await?;
    Ok((StatusCode::CREATED, Json(matched)))
}

/// DELETE /api/metadata/episode-files/{id}
pub async fn remove_episode_file(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<GcReport>, AppError> {
    let id: EpisodeFileId = id
        .parse()
        .map_err(|_| Error::Validation("Invalid episode file id".into()))?;
    Ok(Json(ctx.metadata.remove_episode_file(id).await?))
}
