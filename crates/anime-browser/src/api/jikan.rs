//! Jikan API v4 client.

use super::types::*;
use super::{build_url, validate_base_url};
use crate::cache::TtlCache;
use crate::fetch::{FetchError, FetchErrorKind, ResilientFetcher};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Lifetime of cached Jikan responses
pub const JIKAN_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

const SEASONS: [&str; 4] = ["winter", "spring", "summer", "fall"];

/// Jikan API v4 client
#[derive(Clone)]
pub struct JikanClient {
    fetcher: ResilientFetcher,
    cache: Arc<TtlCache>,
    base_url: String,
}

impl JikanClient {
    /// Create a new Jikan client
    pub fn new(base_url: impl Into<String>, fetcher: ResilientFetcher, cache: Arc<TtlCache>) -> anyhow::Result<Self> {
        let base_url = base_url.into();
        validate_base_url(&base_url)?;

        Ok(Self {
            fetcher,
            cache,
            base_url,
        })
    }

    /// Search anime by title
    pub async fn search_anime(&self, query: &str, page: u32) -> Result<PaginatedResponse<AnimeSummary>, FetchError> {
        info!(query = query, page = page, "Searching anime");
        let url = build_url(
            &self.base_url,
            "/anime",
            &[("q", query.to_string()), ("page", page.to_string())],
        )?;

        self.cache
            .get_or_fetch(&format!("jikan_search_{}_page_{}", query, page), JIKAN_CACHE_TTL, || {
                self.fetcher.get_json(&url)
            })
            .await
    }

    /// Currently airing season
    pub async fn seasons_now(&self) -> Result<PaginatedResponse<AnimeSummary>, FetchError> {
        info!("Fetching current season");
        let url = build_url(&self.base_url, "/seasons/now", &[])?;

        self.cache
            .get_or_fetch("jikan_seasons_now", JIKAN_CACHE_TTL, || self.fetcher.get_json(&url))
            .await
    }

    /// Anime from a given season (`winter`, `spring`, `summer` or `fall`)
    pub async fn season(&self, year: u16, season: &str) -> Result<PaginatedResponse<AnimeSummary>, FetchError> {
        let season = season.to_lowercase();
        if !SEASONS.contains(&season.as_str()) {
            return Err(FetchError::new(
                FetchErrorKind::BadRequest,
                format!("Invalid request: unknown season '{}'", season),
            ));
        }

        info!(year = year, season = %season, "Fetching season");
        let url = build_url(&self.base_url, &format!("/seasons/{}/{}", year, season), &[])?;

        self.cache
            .get_or_fetch(&format!("jikan_season_{}_{}", year, season), JIKAN_CACHE_TTL, || {
                self.fetcher.get_json(&url)
            })
            .await
    }

    /// A random anime; never cached
    pub async fn random_anime(&self) -> Result<AnimeSummary, FetchError> {
        info!("Fetching random anime");
        let url = build_url(&self.base_url, "/random/anime", &[])?;
        let response: SingleResponse<AnimeSummary> = self.fetcher.get_json(&url).await?;
        Ok(response.data)
    }

    /// Full anime details by MAL ID
    pub async fn anime_full(&self, mal_id: u32) -> Result<AnimeFull, FetchError> {
        debug!(mal_id = mal_id, "Fetching anime details");
        let url = build_url(&self.base_url, &format!("/anime/{}/full", mal_id), &[])?;

        let response: SingleResponse<AnimeFull> = self
            .cache
            .get_or_fetch(&format!("jikan_anime_full_{}", mal_id), JIKAN_CACHE_TTL, || {
                self.fetcher.get_json(&url)
            })
            .await?;
        Ok(response.data)
    }
}
