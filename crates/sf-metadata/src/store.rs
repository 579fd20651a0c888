//! In-memory metadata store.
//!
//! Individual operations are atomic, but sequences of them are not:
//! find-then-insert races are the manager's job to serialize, except for
//! episode files, which are looked up and created by path in one step.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use sf_core::{EpisodeFileId, EpisodeId, SeasonId, SeriesId};

use crate::models::{Episode, EpisodeFile, SeasonTree, Season, Series, SeriesTree};

#[derive(Default)]
struct Tables {
    series: HashMap<SeriesId, Series>,
    seasons: HashMap<SeasonId, Season>,
    episodes: HashMap<EpisodeId, Episode>,
    files: HashMap<EpisodeFileId, EpisodeFile>,
}

#[derive(Default)]
pub struct MetadataStore {
    tables: RwLock<Tables>,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    // -- series ---------------------------------------------------------------

    pub fn find_series(&self, id: SeriesId) -> Option<Series> {
        self.tables.read().series.get(&id).cloned()
    }

    pub fn find_series_by_tmdb_id(&self, tmdb_id: u64) -> Option<Series> {
        self.tables
            .read()
            .series
            .values()
            .find(|s| s.tmdb_id == tmdb_id)
            .cloned()
    }

    pub fn all_series(&self) -> Vec<Series> {
        let mut all: Vec<Series> = self.tables.read().series.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    pub fn save_series(&self, series: Series) {
        self.tables.write().series.insert(series.id, series);
    }

    pub fn delete_series(&self, id: SeriesId) -> bool {
        self.tables.write().series.remove(&id).is_some()
    }

    // -- seasons --------------------------------------------------------------

    pub fn find_season(&self, id: SeasonId) -> Option<Season> {
        self.tables.read().seasons.get(&id).cloned()
    }

    pub fn find_season_by_number(&self, series_id: SeriesId, season_number: u32) -> Option<Season> {
        self.tables
            .read()
            .seasons
            .values()
            .find(|s| s.series_id == series_id && s.season_number == season_number)
            .cloned()
    }

    pub fn seasons_for_series(&self, series_id: SeriesId) -> Vec<Season> {
        let mut seasons: Vec<Season> = self
            .tables
            .read()
            .seasons
            .values()
            .filter(|s| s.series_id == series_id)
            .cloned()
            .collect();
        seasons.sort_by_key(|s| s.season_number);
        seasons
    }

    pub fn save_season(&self, season: Season) {
        self.tables.write().seasons.insert(season.id, season);
    }

    pub fn delete_season(&self, id: SeasonId) -> bool {
        self.tables.write().seasons.remove(&id).is_some()
    }

    // -- episodes -------------------------------------------------------------

    pub fn find_episode(&self, id: EpisodeId) -> Option<Episode> {
        self.tables.read().episodes.get(&id).cloned()
    }

    pub fn find_episode_by_number(&self, season_id: SeasonId, episode_number: u32) -> Option<Episode> {
        self.tables
            .read()
            .episodes
            .values()
            .find(|e| e.season_id == season_id && e.episode_number == episode_number)
            .cloned()
    }

    pub fn episodes_for_season(&self, season_id: SeasonId) -> Vec<Episode> {
        let mut episodes: Vec<Episode> = self
            .tables
            .read()
            .episodes
            .values()
            .filter(|e| e.season_id == season_id)
            .cloned()
            .collect();
        episodes.sort_by_key(|e| e.episode_number);
        episodes
    }

    pub fn save_episode(&self, episode: Episode) {
        self.tables.write().episodes.insert(episode.id, episode);
    }

    pub fn delete_episode(&self, id: EpisodeId) -> bool {
        self.tables.write().episodes.remove(&id).is_some()
    }

    // -- files ----------------------------------------------------------------

    pub fn find_episode_file(&self, id: EpisodeFileId) -> Option<EpisodeFile> {
        self.tables.read().files.get(&id).cloned()
    }

    pub fn find_episode_file_by_path(&self, path: &Path) -> Option<EpisodeFile> {
        self.tables
            .read()
            .files
            .values()
            .find(|f| f.path == path)
            .cloned()
    }

    /// The file registered at `path`, registering a new unmatched one if
    /// there is none. Concurrent callers for one path get the same record.
    pub fn get_or_insert_episode_file(&self, path: PathBuf) -> EpisodeFile {
        let mut tables = self.tables.write();
        if let Some(existing) = tables.files.values().find(|f| f.path == path) {
            return existing.clone();
        }
        let file = EpisodeFile::new(path);
        tables.files.insert(file.id, file.clone());
        file
    }

    pub fn files_for_episode(&self, episode_id: EpisodeId) -> Vec<EpisodeFile> {
        self.tables
            .read()
            .files
            .values()
            .filter(|f| f.episode_id == Some(episode_id))
            .cloned()
            .collect()
    }

    pub fn save_episode_file(&self, file: EpisodeFile) {
        self.tables.write().files.insert(file.id, file);
    }

    pub fn delete_episode_file(&self, id: EpisodeFileId) -> Option<EpisodeFile> {
        self.tables.write().files.remove(&id)
    }

    /// Every series with its seasons and episodes, ordered by name and number.
    pub fn tree(&self) -> Vec<SeriesTree> {
        self.all_series()
            .into_iter()
            .map(|series| {
                let seasons = self
                    .seasons_for_series(series.id)
                    .into_iter()
                    .map(|season| SeasonTree {
                        episodes: self.episodes_for_season(season.id),
                        season,
                    })
                    .collect();
                SeriesTree { series, seasons }
            })
            .collect()
    }
}
