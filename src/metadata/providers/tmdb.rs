//! TMDB (The Movie Database) metadata provider.
//!
//! Primary provider in the fallback chain: API-key authenticated REST with a
//! fixed language parameter. Search hits are followed by a detail lookup so
//! the cached record carries canonical fields.
//!
//! Features:
//! - Token-bucket rate limiting at 4 requests / second via [`governor`].
//! - Per-query on-disk caching; a hit skips the network entirely.
//! - Bounded request timeout; timeouts surface as provider errors which the
//!   resolver treats as misses.

use std::num::NonZeroU32;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use serde::Deserialize;
use tracing::debug;

use pl_core::{MediaKind, ProviderRecord};

use crate::metadata::cache::MetadataCache;
use crate::metadata::provider::{EpisodeDetail, MetadataProvider};
use crate::metadata::urlencoded;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const TMDB_BASE_URL: &str = "https://api.themoviedb.org/3";
const TMDB_IMAGE_BASE: &str = "https://image.tmdb.org/t/p/w500";

// ---------------------------------------------------------------------------
// TMDB API response types (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TmdbSearchResponse<T> {
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct TmdbMovieSearchResult {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct TmdbTvSearchResult {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct TmdbMovieDetail {
    id: u64,
    title: Option<String>,
    original_title: Option<String>,
    overview: Option<String>,
    release_date: Option<String>,
    poster_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TmdbTvDetail {
    id: u64,
    name: Option<String>,
    original_name: Option<String>,
    overview: Option<String>,
    first_air_date: Option<String>,
    poster_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TmdbEpisode {
    name: Option<String>,
    season_number: Option<u32>,
    episode_number: Option<u32>,
    overview: Option<String>,
    air_date: Option<String>,
}

// ---------------------------------------------------------------------------
// Provider implementation
// ---------------------------------------------------------------------------

/// TMDB metadata provider.
pub struct TmdbProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    language: String,
    cache: MetadataCache,
    rate_limiter: RateLimiter<
        governor::state::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl TmdbProvider {
    /// Create a new TMDB provider.
    ///
    /// An empty `api_key` leaves the provider registered but unavailable.
    /// `language` is an ISO-639-1 tag such as `"zh-CN"`.
    pub fn new(api_key: String, language: String, cache: MetadataCache, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build reqwest client");

        let quota = Quota::per_second(NonZeroU32::new(4).unwrap());

        Self {
            client,
            base_url: TMDB_BASE_URL.to_string(),
            api_key,
            language,
            cache,
            rate_limiter: RateLimiter::direct(quota),
        }
    }

    /// Point the provider at a different API root (tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Build a full API URL with the API key and language query parameters.
    fn url(&self, path: &str, extra_params: &[(&str, &str)]) -> String {
        let mut url = format!(
            "{}{path}?api_key={}&language={}",
            self.base_url, self.api_key, self.language
        );
        for (key, value) in extra_params {
            url.push('&');
            url.push_str(key);
            url.push('=');
            url.push_str(&urlencoded(value));
        }
        url
    }

    /// Execute a rate-limited GET and deserialize the JSON body.
    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> anyhow::Result<T> {
        self.rate_limiter.until_ready().await;

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("TMDB request failed: {url}"))?
            .error_for_status()
            .with_context(|| format!("TMDB request returned error: {url}"))?;

        resp.json::<T>()
            .await
            .with_context(|| format!("failed to parse TMDB response: {url}"))
    }

    async fn search_movie(
        &self,
        title: &str,
        year: Option<&str>,
    ) -> anyhow::Result<Option<ProviderRecord>> {
        let mut params = vec![("query", title)];
        if let Some(year) = year {
            params.push(("year", year));
        }
        let url = self.url("/search/movie", &params);
        debug!(url = %url, "TMDB search movie");

        let body: TmdbSearchResponse<TmdbMovieSearchResult> = self.get_json(&url).await?;
        let Some(first) = body.results.into_iter().next() else {
            return Ok(None);
        };

        let detail: TmdbMovieDetail = self
            .get_json(&self.url(&format!("/movie/{}", first.id), &[]))
            .await?;

        Ok(Some(ProviderRecord {
            title: detail
                .title
                .or(detail.original_title.clone())
                .unwrap_or_else(|| title.to_string()),
            original_title: detail.original_title,
            year: year_from_date(&detail.release_date).or_else(|| year.map(String::from)),
            kind: MediaKind::Movie,
            external_id: detail.id.to_string(),
            overview: detail.overview,
            poster_url: detail.poster_path.as_deref().map(poster_url),
            provider: "tmdb".to_string(),
        }))
    }

    async fn search_tv(
        &self,
        title: &str,
        year: Option<&str>,
    ) -> anyhow::Result<Option<ProviderRecord>> {
        let mut params = vec![("query", title)];
        if let Some(year) = year {
            params.push(("first_air_date_year", year));
        }
        let url = self.url("/search/tv", &params);
        debug!(url = %url, "TMDB search TV");

        let body: TmdbSearchResponse<TmdbTvSearchResult> = self.get_json(&url).await?;
        let Some(first) = body.results.into_iter().next() else {
            return Ok(None);
        };

        let detail: TmdbTvDetail = self
            .get_json(&self.url(&format!("/tv/{}", first.id), &[]))
            .await?;

        Ok(Some(ProviderRecord {
            title: detail
                .name
                .or(detail.original_name.clone())
                .unwrap_or_else(|| title.to_string()),
            original_title: detail.original_name,
            year: year_from_date(&detail.first_air_date).or_else(|| year.map(String::from)),
            kind: MediaKind::Tv,
            external_id: detail.id.to_string(),
            overview: detail.overview,
            poster_url: detail.poster_path.as_deref().map(poster_url),
            provider: "tmdb".to_string(),
        }))
    }
}

/// Cache key for a kind-scoped title search.
fn query_key(kind: MediaKind, title: &str, year: Option<&str>) -> String {
    match year {
        Some(year) => format!("{kind}_{title}_{year}"),
        None => format!("{kind}_{title}"),
    }
}

/// Extract a four-digit year from a date string like `"2010-07-16"`.
fn year_from_date(date: &Option<String>) -> Option<String> {
    date.as_deref()
        .and_then(|d| d.split('-').next())
        .filter(|y| y.len() == 4 && y.chars().all(|c| c.is_ascii_digit()))
        .map(String::from)
}

/// Convert a TMDB image path fragment to a full URL.
fn poster_url(path: &str) -> String {
    format!("{TMDB_IMAGE_BASE}{path}")
}

#[async_trait]
impl MetadataProvider for TmdbProvider {
    fn name(&self) -> &'static str {
        "tmdb"
    }

    fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn search(
        &self,
        title: &str,
        kind: MediaKind,
        year: Option<&str>,
    ) -> anyhow::Result<Option<ProviderRecord>> {
        let key = query_key(kind, title, year);
        if let Some(record) = self.cache.load::<ProviderRecord>(&key) {
            debug!(key = %key, "TMDB cache hit");
            return Ok(Some(record));
        }

        let record = match kind {
            MediaKind::Movie => self.search_movie(title, year).await?,
            MediaKind::Tv => self.search_tv(title, year).await?,
            MediaKind::Unknown => return Ok(None),
        };

        if let Some(ref record) = record {
            self.cache.store(&key, record);
        }
        Ok(record)
    }

    async fn episode_detail(
        &self,
        series_id: &str,
        season: u32,
        episode: u32,
    ) -> anyhow::Result<Option<EpisodeDetail>> {
        if !self.is_available() {
            return Ok(None);
        }

        let key = format!("episode_{series_id}_S{season:02}E{episode:02}");
        if let Some(detail) = self.cache.load::<EpisodeDetail>(&key) {
            debug!(key = %key, "TMDB episode cache hit");
            return Ok(Some(detail));
        }

        let url = self.url(
            &format!("/tv/{series_id}/season/{season}/episode/{episode}"),
            &[],
        );
        debug!(url = %url, "TMDB episode detail");

        self.rate_limiter.until_ready().await;
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("TMDB request failed: {url}"))?;

        // An unknown episode is a miss, not an error.
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = resp
            .error_for_status()
            .with_context(|| format!("TMDB request returned error: {url}"))?;

        let body: TmdbEpisode = resp
            .json()
            .await
            .with_context(|| format!("failed to parse TMDB episode response: {url}"))?;

        let detail = EpisodeDetail {
            title: body.name.unwrap_or_else(|| format!("Episode {episode}")),
            season: body.season_number.unwrap_or(season),
            episode: body.episode_number.unwrap_or(episode),
            overview: body.overview,
            air_date: body.air_date,
        };
        self.cache.store(&key, &detail);
        Ok(Some(detail))
    }
}
