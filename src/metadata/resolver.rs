//! Metadata resolution with a deterministic fallback chain.
//!
//! Providers are registered in chain order: the first is the primary, the
//! rest are fallbacks consulted only when `fallback_enabled` is set. Files
//! of unknown kind are probed as movies first, then as TV.

use std::sync::Arc;

use tracing::{debug, warn};

use pl_core::{MediaKind, ProviderRecord};

use super::provider::{EpisodeDetail, MetadataProvider};

/// Resolves a classified title against the provider chain.
pub struct MetadataResolver {
    providers: Vec<Arc<dyn MetadataProvider>>,
    fallback_enabled: bool,
}

impl MetadataResolver {
    /// Create an empty resolver.
    pub fn new(fallback_enabled: bool) -> Self {
        Self {
            providers: Vec::new(),
            fallback_enabled,
        }
    }

    /// Register a provider. Registration order is chain order: the first
    /// registered provider is the primary.
    pub fn register(&mut self, provider: Arc<dyn MetadataProvider>) {
        self.providers.push(provider);
    }

    /// Resolve canonical metadata for a title.
    ///
    /// Absence of data from every provider yields `None`, never an error —
    /// the pipeline simply proceeds with the un-enriched descriptor.
    pub async fn resolve(
        &self,
        title: &str,
        kind: MediaKind,
        year: Option<&str>,
    ) -> Option<ProviderRecord> {
        if title.is_empty() {
            return None;
        }

        match kind {
            MediaKind::Tv | MediaKind::Movie => self.resolve_kind(title, kind, year).await,
            MediaKind::Unknown => {
                // Unknown files: probe as a movie first, then as TV.
                let record = self.resolve_kind(title, MediaKind::Movie, year).await;
                if record.is_some() || !self.fallback_enabled {
                    return record;
                }
                self.resolve_kind(title, MediaKind::Tv, year).await
            }
        }
    }

    async fn resolve_kind(
        &self,
        title: &str,
        kind: MediaKind,
        year: Option<&str>,
    ) -> Option<ProviderRecord> {
        for (idx, provider) in self.providers.iter().enumerate() {
            if idx > 0 && !self.fallback_enabled {
                break;
            }
            if !provider.is_available() {
                debug!(provider = provider.name(), "provider unavailable, skipping");
                continue;
            }

            match provider.search(title, kind, year).await {
                Ok(Some(record)) => {
                    debug!(provider = provider.name(), %title, "metadata resolved");
                    return Some(record);
                }
                Ok(None) => {
                    debug!(provider = provider.name(), %title, "no match");
                }
                Err(e) => {
                    // Network failures and timeouts are misses for this
                    // provider; the chain continues.
                    warn!(provider = provider.name(), %title, error = %e, "provider failed");
                }
            }
        }
        None
    }

    /// Fetch per-episode metadata through the chain, same miss discipline as
    /// [`resolve`](Self::resolve).
    pub async fn episode_detail(
        &self,
        series_id: &str,
        season: u32,
        episode: u32,
    ) -> Option<EpisodeDetail> {
        for (idx, provider) in self.providers.iter().enumerate() {
            if idx > 0 && !self.fallback_enabled {
                break;
            }
            if !provider.is_available() {
                continue;
            }
            match provider.episode_detail(series_id, season, episode).await {
                Ok(Some(detail)) => return Some(detail),
                Ok(None) => {}
                Err(e) => {
                    warn!(provider = provider.name(), error = %e, "episode lookup failed");
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// A stub provider counting how often it is consulted.
    struct StubProvider {
        provider_name: &'static str,
        available: bool,
        record: Option<ProviderRecord>,
        fail: bool,
        calls: AtomicUsize,
    }

    impl StubProvider {
        fn hit(name: &'static str, title: &str) -> Arc<Self> {
            Arc::new(Self {
                provider_name: name,
                available: true,
                record: Some(record(name, title)),
                fail: false,
                calls: AtomicUsize::new(0),
            })
        }

        fn miss(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                provider_name: name,
                available: true,
                record: None,
                fail: false,
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                provider_name: name,
                available: true,
                record: None,
                fail: true,
                calls: AtomicUsize::new(0),
            })
        }

        fn offline(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                provider_name: name,
                available: false,
                record: None,
                fail: false,
                calls: AtomicUsize::new(0),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    fn record(provider: &str, title: &str) -> ProviderRecord {
        ProviderRecord {
            title: title.to_string(),
            original_title: None,
            year: Some("2010".into()),
            kind: MediaKind::Movie,
            external_id: "1".into(),
            overview: None,
            poster_url: None,
            provider: provider.to_string(),
        }
    }

    #[async_trait]
    impl MetadataProvider for StubProvider {
        fn name(&self) -> &'static str {
            self.provider_name
        }

        fn is_available(&self) -> bool {
            self.available
        }

        async fn search(
            &self,
            _title: &str,
            _kind: MediaKind,
            _year: Option<&str>,
        ) -> anyhow::Result<Option<ProviderRecord>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("network down");
            }
            Ok(self.record.clone())
        }

        async fn episode_detail(
            &self,
            _series_id: &str,
            _season: u32,
            _episode: u32,
        ) -> anyhow::Result<Option<EpisodeDetail>> {
            Ok(None)
        }
    }

    fn resolver(fallback: bool, providers: Vec<Arc<StubProvider>>) -> MetadataResolver {
        let mut r = MetadataResolver::new(fallback);
        for p in providers {
            r.register(p);
        }
        r
    }

    #[tokio::test]
    async fn primary_hit_short_circuits() {
        let primary = StubProvider::hit("tmdb", "盗梦空间");
        let secondary = StubProvider::hit("douban", "盗梦空间");
        let r = resolver(true, vec![primary.clone(), secondary.clone()]);

        let rec = r.resolve("盗梦空间", MediaKind::Movie, None).await.unwrap();
        assert_eq!(rec.provider, "tmdb");
        assert_eq!(primary.call_count(), 1);
        assert_eq!(secondary.call_count(), 0);
    }

    #[tokio::test]
    async fn fallback_consulted_exactly_once_on_miss() {
        let primary = StubProvider::miss("tmdb");
        let secondary = StubProvider::miss("douban");
        let r = resolver(true, vec![primary.clone(), secondary.clone()]);

        let rec = r.resolve("nothing", MediaKind::Movie, None).await;
        assert!(rec.is_none());
        assert_eq!(primary.call_count(), 1);
        assert_eq!(secondary.call_count(), 1);
    }

    #[tokio::test]
    async fn fallback_disabled_stops_after_primary() {
        let primary = StubProvider::miss("tmdb");
        let secondary = StubProvider::hit("douban", "x");
        let r = resolver(false, vec![primary.clone(), secondary.clone()]);

        let rec = r.resolve("x", MediaKind::Movie, None).await;
        assert!(rec.is_none());
        assert_eq!(secondary.call_count(), 0);
    }

    #[tokio::test]
    async fn provider_error_falls_through() {
        let primary = StubProvider::failing("tmdb");
        let secondary = StubProvider::hit("douban", "x");
        let r = resolver(true, vec![primary.clone(), secondary.clone()]);

        let rec = r.resolve("x", MediaKind::Movie, None).await.unwrap();
        assert_eq!(rec.provider, "douban");
    }

    #[tokio::test]
    async fn unavailable_provider_skipped() {
        let primary = StubProvider::offline("tmdb");
        let secondary = StubProvider::hit("douban", "x");
        let r = resolver(true, vec![primary.clone(), secondary.clone()]);

        let rec = r.resolve("x", MediaKind::Tv, None).await.unwrap();
        assert_eq!(rec.provider, "douban");
        assert_eq!(primary.call_count(), 0);
    }

    #[tokio::test]
    async fn unknown_kind_probes_movie_then_tv() {
        let primary = StubProvider::miss("tmdb");
        let r = resolver(true, vec![primary.clone()]);

        let rec = r.resolve("mystery", MediaKind::Unknown, None).await;
        assert!(rec.is_none());
        // Once as movie, once as tv.
        assert_eq!(primary.call_count(), 2);
    }

    #[tokio::test]
    async fn unknown_kind_without_fallback_probes_movie_only() {
        let primary = StubProvider::miss("tmdb");
        let r = resolver(false, vec![primary.clone()]);

        let rec = r.resolve("mystery", MediaKind::Unknown, None).await;
        assert!(rec.is_none());
        assert_eq!(primary.call_count(), 1);
    }

    #[tokio::test]
    async fn empty_title_is_never_queried() {
        let primary = StubProvider::hit("tmdb", "x");
        let r = resolver(true, vec![primary.clone()]);

        assert!(r.resolve("", MediaKind::Movie, None).await.is_none());
        assert_eq!(primary.call_count(), 0);
    }

    #[tokio::test]
    async fn no_providers_resolves_to_none() {
        let r = MetadataResolver::new(true);
        assert!(r.resolve("anything", MediaKind::Movie, None).await.is_none());
    }
}
