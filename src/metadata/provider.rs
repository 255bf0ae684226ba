//! Trait definition and types for metadata providers.
//!
//! Every external metadata backend (TMDB, Douban) implements
//! [`MetadataProvider`], normalizing its own response schema into the
//! canonical [`pl_core::ProviderRecord`] shape before anything downstream
//! sees it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use pl_core::{MediaKind, ProviderRecord};

/// Per-episode metadata returned by [`MetadataProvider::episode_detail`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeDetail {
    pub title: String,
    pub season: u32,
    pub episode: u32,
    pub overview: Option<String>,
    pub air_date: Option<String>,
}

/// Async trait that all metadata providers implement.
///
/// Providers own their on-disk cache: every call checks the cache by the
/// provider's own query key first, and every successful network response is
/// written back. Providers are wrapped in an `Arc` and shared across tasks.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Short, lowercase identifier for this provider (e.g. `"tmdb"`).
    fn name(&self) -> &'static str;

    /// Returns `true` when the provider is configured well enough to serve
    /// requests.
    fn is_available(&self) -> bool;

    /// Search for a record of the given kind.
    ///
    /// `kind` is always [`MediaKind::Tv`] or [`MediaKind::Movie`]; the
    /// resolver decides how to probe for unknown files. `Ok(None)` means the
    /// provider has no match — never an error.
    async fn search(
        &self,
        title: &str,
        kind: MediaKind,
        year: Option<&str>,
    ) -> anyhow::Result<Option<ProviderRecord>>;

    /// Fetch per-episode metadata for a series known to this provider.
    ///
    /// Search-only providers return `Ok(None)`.
    async fn episode_detail(
        &self,
        series_id: &str,
        season: u32,
        episode: u32,
    ) -> anyhow::Result<Option<EpisodeDetail>>;
}
