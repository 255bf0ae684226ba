//! Douban metadata provider.
//!
//! Secondary provider in the fallback chain: the lightweight
//! `subject_suggest` search endpoint, optionally cookie-authenticated. It is
//! search-only — no detail or per-episode lookups — so records carry only
//! what the suggest response includes.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use pl_core::{MediaKind, ProviderRecord};

use crate::metadata::cache::MetadataCache;
use crate::metadata::provider::{EpisodeDetail, MetadataProvider};
use crate::metadata::urlencoded;

const DOUBAN_BASE_URL: &str = "https://movie.douban.com";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

// ---------------------------------------------------------------------------
// Suggest response (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
struct SuggestItem {
    title: Option<String>,
    original_title: Option<String>,
    year: Option<String>,
    #[serde(rename = "type")]
    item_type: Option<String>,
    id: Option<String>,
    img: Option<String>,
}

// ---------------------------------------------------------------------------
// Provider implementation
// ---------------------------------------------------------------------------

/// Douban metadata provider.
pub struct DoubanProvider {
    client: reqwest::Client,
    base_url: String,
    cookies: Option<String>,
    cache: MetadataCache,
}

impl DoubanProvider {
    /// Create a new Douban provider. Cookies are optional; the suggest
    /// endpoint answers anonymous requests as well.
    pub fn new(cookies: Option<String>, cache: MetadataCache, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build reqwest client");

        Self {
            client,
            base_url: DOUBAN_BASE_URL.to_string(),
            cookies,
            cache,
        }
    }

    /// Point the provider at a different API root (tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn suggest(&self, title: &str) -> anyhow::Result<Vec<SuggestItem>> {
        let url = format!(
            "{}/j/subject_suggest?q={}",
            self.base_url,
            urlencoded(title)
        );
        debug!(url = %url, "Douban suggest");

        let mut request = self
            .client
            .get(&url)
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/json, text/plain, */*")
            .header("Referer", "https://movie.douban.com/");
        if let Some(ref cookies) = self.cookies {
            request = request.header("Cookie", cookies.clone());
        }

        let resp = request
            .send()
            .await
            .with_context(|| format!("Douban request failed: {url}"))?
            .error_for_status()
            .with_context(|| format!("Douban request returned error: {url}"))?;

        resp.json::<Vec<SuggestItem>>()
            .await
            .with_context(|| format!("failed to parse Douban response: {url}"))
    }
}

/// Pick the first item matching the requested kind, else the first overall.
fn pick(items: &[SuggestItem], kind: MediaKind) -> Option<&SuggestItem> {
    let wanted = kind.to_string();
    items
        .iter()
        .find(|item| item.item_type.as_deref() == Some(wanted.as_str()))
        .or_else(|| items.first())
}

fn to_record(item: &SuggestItem, fallback_title: &str) -> ProviderRecord {
    ProviderRecord {
        title: item
            .title
            .clone()
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| fallback_title.to_string()),
        original_title: item.original_title.clone().filter(|t| !t.is_empty()),
        year: item.year.clone().filter(|y| !y.is_empty()),
        kind: if item.item_type.as_deref() == Some("movie") {
            MediaKind::Movie
        } else {
            MediaKind::Tv
        },
        external_id: item.id.clone().unwrap_or_default(),
        overview: None,
        poster_url: item.img.clone().filter(|i| !i.is_empty()),
        provider: "douban".to_string(),
    }
}

#[async_trait]
impl MetadataProvider for DoubanProvider {
    fn name(&self) -> &'static str {
        "douban"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn search(
        &self,
        title: &str,
        kind: MediaKind,
        // The suggest endpoint has no year filter; the key is kind + title.
        _year: Option<&str>,
    ) -> anyhow::Result<Option<ProviderRecord>> {
        let key = format!("{kind}_{title}");
        if let Some(record) = self.cache.load::<ProviderRecord>(&key) {
            debug!(key = %key, "Douban cache hit");
            return Ok(Some(record));
        }

        let items = self.suggest(title).await?;
        let Some(item) = pick(&items, kind) else {
            return Ok(None);
        };

        let record = to_record(item, title);
        self.cache.store(&key, &record);
        Ok(Some(record))
    }

    async fn episode_detail(
        &self,
        _series_id: &str,
        _season: u32,
        _episode: u32,
    ) -> anyhow::Result<Option<EpisodeDetail>> {
        // Search-only API.
        Ok(None)
    }
}
