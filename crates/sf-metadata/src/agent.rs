//! Metadata agents: where series, season and episode details come from.

use async_trait::async_trait;
use sf_core::Result;

/// A series search hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesMatch {
    pub tmdb_id: u64,
    pub name: String,
    pub first_air_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeriesDetails {
    pub name: String,
    pub overview: Option<String>,
    pub first_air_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeasonDetails {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EpisodeDetails {
    pub name: Option<String>,
}

/// Source of TV metadata, keyed by TMDB ids.
#[async_trait]
pub trait MetadataAgent: Send + Sync {
    fn name(&self) -> &'static str;

    /// Series whose name matches `query`, best guesses first.
    async fn search_tv(&self, query: &str, year: Option<u32>) -> Result<Vec<SeriesMatch>>;

    async fn series(&self, tmdb_id: u64) -> Result<SeriesDetails>;

    async fn season(&self, tmdb_id: u64, season_number: u32) -> Result<SeasonDetails>;

    async fn episode(&self, tmdb_id: u64, season_number: u32, episode_number: u32) -> Result<EpisodeDetails>;
}

/// Agent used when no TMDB key is configured: every search comes back
/// empty, so files can be registered but never matched.
pub struct NullAgent;

#[async_trait]
impl MetadataAgent for NullAgent {
    fn name(&self) -> &'static str {
        "none"
    }

    async fn search_tv(&self, _query: &str, _year: Option<u32>) -> Result<Vec<SeriesMatch>> {
        Ok(Vec::new())
    }

    async fn series(&self, tmdb_id: u64) -> Result<SeriesDetails> {
        Err(sf_core::Error::not_found("series", tmdb_id))
    }

    async fn season(&self, tmdb_id: u64, season_number: u32) -> Result<SeasonDetails> {
        Err(sf_core::Error::not_found("season", format!("{tmdb_id}/{season_number}")))
    }

    async fn episode(&self, tmdb_id: u64, season_number: u32, episode_number: u32) -> Result<EpisodeDetails> {
        Err(sf_core::Error::not_found(
            "episode",
            format!("{tmdb_id}/{season_number}/{episode_number}"),
        ))
    }
}
