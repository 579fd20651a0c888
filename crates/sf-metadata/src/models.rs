//! Metadata records.
//!
//! Records reference their parent by id only; the store answers the
//! reverse questions (which seasons belong to a series, and so on).

use std::path::PathBuf;

use serde::Serialize;
use sf_core::{EpisodeFileId, EpisodeId, SeasonId, SeriesId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Series {
    pub id: SeriesId,
    pub tmdb_id: u64,
    pub name: String,
    pub overview: Option<String>,
    pub first_air_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Season {
    pub id: SeasonId,
    pub series_id: SeriesId,
    pub season_number: u32,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Episode {
    pub id: EpisodeId,
    pub season_id: SeasonId,
    pub episode_number: u32,
    pub name: Option<String>,
}

/// A media file on disk, optionally matched to an episode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EpisodeFile {
    pub id: EpisodeFileId,
    pub path: PathBuf,
    pub file_name: String,
    pub episode_id: Option<EpisodeId>,
}

impl EpisodeFile {
    pub fn new(path: PathBuf) -> Self {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            id: EpisodeFileId::new(),
            path,
            file_name,
            episode_id: None,
        }
    }
}

/// A series with its seasons and episodes, for listings.
#[derive(Debug, Clone, Serialize)]
pub struct SeriesTree {
    #[serde(flatten)]
    pub series: Series,
    pub seasons: Vec<SeasonTree>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeasonTree {
    #[serde(flatten)]
    pub season: Season,
    pub episodes: Vec<Episode>,
}
