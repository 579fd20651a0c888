//! Matching episode files to series, seasons and episodes.
//!
//! Records are created on demand when a file is matched and removed again
//! when the last file referring to them goes away. Each aggregate root
//! (series, season, episode) has one coarse lock held across the whole
//! find-or-create, including the agent lookup. That serializes creation for
//! unrelated keys too; writes are rare (a library scan) and one lock per
//! root rules out duplicate records without per-key lock bookkeeping.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use sf_core::{EpisodeFileId, EpisodeId, Error, Result, SeasonId, SeriesId};
use tokio::sync::Mutex;

use crate::agent::MetadataAgent;
use crate::levenshtein;
use crate::models::{Episode, EpisodeFile, Season, Series, SeriesTree};
use crate::parser::parse_series_name;
use crate::store::MetadataStore;

/// What a garbage collection pass deleted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GcReport {
    pub episode: Option<EpisodeId>,
    pub season: Option<SeasonId>,
    pub series: Option<SeriesId>,
}

/// A registered file and the episode it was matched to.
#[derive(Debug, Clone, Serialize)]
pub struct MatchedFile {
    pub file: EpisodeFile,
    pub episode: Episode,
}

pub struct MetadataManager {
    store: Arc<MetadataStore>,
    agent: Arc<dyn MetadataAgent>,
    series_lock: Mutex<()>,
    season_lock: Mutex<()>,
    episode_lock: Mutex<()>,
}

impl MetadataManager {
    pub fn new(store: Arc<MetadataStore>, agent: Arc<dyn MetadataAgent>) -> Self {
        Self {
            store,
            agent,
            series_lock: Mutex::new(()),
            season_lock: Mutex::new(()),
            episode_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &MetadataStore {
        &self.store
    }

    pub fn agent_name(&self) -> &'static str {
        self.agent.name()
    }

    pub fn series_tree(&self) -> Vec<SeriesTree> {
        self.store.tree()
    }

    /// Register the file at `path` and match it to an episode.
    ///
    /// A path that is already registered and matched is returned as is.
    /// If the file cannot be matched it is not kept.
    pub async fn register_episode_file(&self, path: PathBuf) -> Result<MatchedFile> {
        let file = self.store.get_or_insert_episode_file(path);

        match self.get_or_create_episode_for_file(file.id).await {
            Ok(episode) => {
                let file = self
                    .store
                    .find_episode_file(file.id)
                    .ok_or_else(|| Error::not_found("episode file", file.id))?;
                Ok(MatchedFile { file, episode })
            }
            Err(e) => {
                if file.episode_id.is_none() {
                    self.store.delete_episode_file(file.id);
                }
                Err(e)
            }
        }
    }

    /// Match a registered file to an episode, creating the episode (and its
    /// season and series) if this is the first file for it.
    pub async fn get_or_create_episode_for_file(&self, file_id: EpisodeFileId) -> Result<Episode> {
        let mut file = self
            .store
            .find_episode_file(file_id)
            .ok_or_else(|| Error::not_found("episode file", file_id))?;

        if let Some(episode_id) = file.episode_id {
            return self
                .store
                .find_episode(episode_id)
                .ok_or_else(|| Error::not_found("episode", episode_id));
        }

        let stem = file
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.file_name.clone());
        let parsed = parse_series_name(&stem);
        let Some((season_number, episode_number)) = parsed.numbers() else {
            return Err(Error::Validation(format!(
                "cannot parse season/episode number from file name '{stem}'"
            )));
        };

        let results = self.agent.search_tv(&parsed.title, parsed.year).await?;
        let Some(best) = results
            .iter()
            .min_by_key(|r| levenshtein::distance(&parsed.title, &r.name))
        else {
            tracing::warn!(title = %parsed.title, year = ?parsed.year, "No series match for parsed title");
            return Err(Error::not_found("series", &parsed.title));
        };

        let episode = self
            .get_or_create_episode_by_tmdb_id(best.tmdb_id, season_number, episode_number)
            .await?;

        file.episode_id = Some(episode.id);
        self.store.save_episode_file(file);
        Ok(episode)
    }

    /// The episode `season_number`x`episode_number` of the series with
    /// `series_tmdb_id`, created with its season and series as needed.
    pub async fn get_or_create_episode_by_tmdb_id(
        &self,
        series_tmdb_id: u64,
        season_number: u32,
        episode_number: u32,
    ) -> Result<Episode> {
        let season = self.get_or_create_season(series_tmdb_id, season_number).await?;

        let _guard = self.episode_lock.lock().await;
        if let Some(episode) = self.store.find_episode_by_number(season.id, episode_number) {
            return Ok(episode);
        }

        let details = self
            .agent
            .episode(series_tmdb_id, season_number, episode_number)
            .await?;
        let episode = Episode {
            id: EpisodeId::new(),
            season_id: season.id,
            episode_number,
            name: details.name,
        };
        self.store.save_episode(episode.clone());
        tracing::info!(
            episode_id = %episode.id,
            tmdb_id = series_tmdb_id,
            season = season_number,
            episode = episode_number,
            "Created episode"
        );
        Ok(episode)
    }

    async fn get_or_create_season(&self, series_tmdb_id: u64, season_number: u32) -> Result<Season> {
        let series = self.get_or_create_series(series_tmdb_id).await?;

        let _guard = self.season_lock.lock().await;
        if let Some(season) = self.store.find_season_by_number(series.id, season_number) {
            return Ok(season);
        }

        let details = self.agent.season(series_tmdb_id, season_number).await?;
        let season = Season {
            id: SeasonId::new(),
            series_id: series.id,
            season_number,
            name: details.name,
        };
        self.store.save_season(season.clone());
        tracing::info!(season_id = %season.id, tmdb_id = series_tmdb_id, season = season_number, "Created season");
        Ok(season)
    }

    async fn get_or_create_series(&self, tmdb_id: u64) -> Result<Series> {
        let _guard = self.series_lock.lock().await;
        if let Some(series) = self.store.find_series_by_tmdb_id(tmdb_id) {
            return Ok(series);
        }

        let details = self.agent.series(tmdb_id).await?;
        let series = Series {
            id: SeriesId::new(),
            tmdb_id,
            name: details.name,
            overview: details.overview,
            first_air_date: details.first_air_date,
        };
        self.store.save_series(series.clone());
        tracing::info!(series_id = %series.id, tmdb_id, name = %series.name, "Created series");
        Ok(series)
    }

    /// Unregister a file and collect whatever it leaves orphaned.
    pub async fn remove_episode_file(&self, file_id: EpisodeFileId) -> Result<GcReport> {
        let file = self
            .store
            .delete_episode_file(file_id)
            .ok_or_else(|| Error::not_found("episode file", file_id))?;
        tracing::debug!(file_id = %file.id, path = %file.path.display(), "Removed episode file");

        match file.episode_id {
            Some(episode_id) => self.garbage_collect_episode(episode_id).await,
            None => Ok(GcReport::default()),
        }
    }

    /// Delete the episode if no files refer to it, then its season if it has
    /// no episodes left, then its series if it has no seasons left.
    pub async fn garbage_collect_episode(&self, episode_id: EpisodeId) -> Result<GcReport> {
        let _series = self.series_lock.lock().await;
        let _season = self.season_lock.lock().await;
        let _episode = self.episode_lock.lock().await;

        let mut report = GcReport::default();
        if !self.store.files_for_episode(episode_id).is_empty() {
            return Ok(report);
        }
        let episode = self
            .store
            .find_episode(episode_id)
            .ok_or_else(|| Error::not_found("episode", episode_id))?;
        self.store.delete_episode(episode.id);
        report.episode = Some(episode.id);

        let season = self
            .store
            .find_season(episode.season_id)
            .ok_or_else(|| Error::not_found("season", episode.season_id))?;
        if !self.store.episodes_for_season(season.id).is_empty() {
            return Ok(report);
        }
        self.store.delete_season(season.id);
        report.season = Some(season.id);

        let series = self
            .store
            .find_series(season.series_id)
            .ok_or_else(|| Error::not_found("series", season.series_id))?;
        if !self.store.seasons_for_series(series.id).is_empty() {
            return Ok(report);
        }
        self.store.delete_series(series.id);
        report.series = Some(series.id);

        tracing::info!(series_id = %series.id, name = %series.name, "Removed series with no remaining files");
        Ok(report)
    }
}
