//! TMDB (The Movie Database) TV agent.
//!
//! Rate-limited to stay under TMDB's request limits.

use std::num::NonZeroU32;
use std::sync::Arc;

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use serde::Deserialize;
use sf_core::config::MetadataConfig;
use sf_core::{Error, Result};

use crate::agent::{EpisodeDetails, MetadataAgent, SeasonDetails, SeriesDetails, SeriesMatch};

const BASE_URL: &str = "https://api.themoviedb.org/3";
const REQUESTS_PER_SECOND: NonZeroU32 = match NonZeroU32::new(30) {
    Some(n) => n,
    None => unreachable!(),
};

type Limiter = RateLimiter<governor::state::NotKeyed, governor::state::InMemoryState, governor::clock::DefaultClock>;

pub struct TmdbAgent {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    language: String,
    limiter: Arc<Limiter>,
}

impl TmdbAgent {
    pub fn new(api_key: String, language: String) -> Self {
        Self::with_base_url(BASE_URL.to_string(), api_key, language)
    }

    /// Point the agent at another TMDB-compatible endpoint.
    pub fn with_base_url(base_url: String, api_key: String, language: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            language,
            limiter: Arc::new(RateLimiter::direct(Quota::per_second(REQUESTS_PER_SECOND))),
        }
    }

    /// The agent for `config`, if an API key is set.
    pub fn from_config(config: &MetadataConfig) -> Option<Self> {
        config
            .tmdb_api_key
            .as_ref()
            .filter(|key| !key.is_empty())
            .map(|key| Self::new(key.clone(), config.language.clone()))
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str, extra_params: &[(&str, &str)]) -> Result<T> {
        self.limiter.until_ready().await;

        let url = format!("{}{path}", self.base_url);
        let mut params: Vec<(&str, &str)> = vec![("api_key", &self.api_key), ("language", &self.language)];
        params.extend_from_slice(extra_params);

        let resp = self
            .http
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|e| Error::Metadata(format!("TMDB request failed: {e}")))?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::not_found("tmdb resource", path));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Metadata(format!("TMDB {status}: {body}")));
        }

        resp.json::<T>()
            .await
            .map_err(|e| Error::Metadata(format!("TMDB parse error: {e}")))
    }
}

#[async_trait]
impl MetadataAgent for TmdbAgent {
    fn name(&self) -> &'static str {
        "tmdb"
    }

    async fn search_tv(&self, query: &str, year: Option<u32>) -> Result<Vec<SeriesMatch>> {
        let mut params: Vec<(&str, &str)> = vec![("query", query)];
        let year_str = year.map(|y| y.to_string());
        if let Some(ref y) = year_str {
            params.push(("first_air_date_year", y.as_str()));
        }
        let resp: TmdbSearchResponse = self.get("/search/tv", &params).await?;
        Ok(resp
            .results
            .into_iter()
            .map(|r| SeriesMatch {
                tmdb_id: r.id,
                name: r.name.unwrap_or_default(),
                first_air_date: r.first_air_date,
            })
            .collect())
    }

    async fn series(&self, tmdb_id: u64) -> Result<SeriesDetails> {
        let tv: TmdbTvShow = self.get(&format!("/tv/{tmdb_id}"), &[]).await?;
        Ok(SeriesDetails {
            name: tv.name,
            overview: tv.overview.filter(|o| !o.is_empty()),
            first_air_date: tv.first_air_date.filter(|d| !d.is_empty()),
        })
    }

    async fn season(&self, tmdb_id: u64, season_number: u32) -> Result<SeasonDetails> {
        let season: TmdbSeason = self
            .get(&format!("/tv/{tmdb_id}/season/{season_number}"), &[])
            .await?;
        Ok(SeasonDetails { name: season.name })
    }

    async fn episode(&self, tmdb_id: u64, season_number: u32, episode_number: u32) -> Result<EpisodeDetails> {
        let episode: TmdbEpisode = self
            .get(
                &format!("/tv/{tmdb_id}/season/{season_number}/episode/{episode_number}"),
                &[],
            )
            .await?;
        Ok(EpisodeDetails { name: episode.name })
    }
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TmdbSearchResponse {
    results: Vec<TmdbSearchResult>,
}

#[derive(Debug, Deserialize)]
struct TmdbSearchResult {
    id: u64,
    name: Option<String>,
    first_air_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TmdbTvShow {
    name: String,
    overview: Option<String>,
    first_air_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TmdbSeason {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TmdbEpisode {
    name: Option<String>,
}
