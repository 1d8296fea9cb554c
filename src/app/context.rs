use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::app::error::{FeedSyncError, Result};
use crate::cache::OfflineCache;
use crate::config::Config;
use crate::connectivity::{ConnectivityMonitor, ManualConnectivity, ProbeConnectivity};
use crate::domain::FeedKind;
use crate::fetcher::http_fetcher::HttpFetcher;
use crate::fetcher::parallel::{ParallelFetcher, DEFAULT_WORKERS};
use crate::realtime::LocalHub;
use crate::store::{KvStore, SqliteStore};
use crate::sync::{EngineDeps, EngineSettings, FeedEngine};

pub struct AppContext {
    pub config: Config,
    pub cache: OfflineCache,
    pub fetcher: Arc<HttpFetcher>,
    pub parallel_fetcher: ParallelFetcher,
    pub realtime: Arc<LocalHub>,
}

impl AppContext {
    pub fn new(config: Config) -> Result<Self> {
        Self::with_workers(config, DEFAULT_WORKERS)
    }

    pub fn with_workers(config: Config, workers: usize) -> Result<Self> {
        let db_path = match config.cache.path.clone() {
            Some(p) => p,
            None => Self::default_db_path()?,
        };

        let store: Arc<dyn KvStore + Send + Sync> = Arc::new(SqliteStore::new(&db_path)?);
        Self::assemble(config, store, workers)
    }

    pub fn in_memory(config: Config) -> Result<Self> {
        let store: Arc<dyn KvStore + Send + Sync> = Arc::new(SqliteStore::in_memory()?);
        Self::assemble(config, store, DEFAULT_WORKERS)
    }

    fn assemble(config: Config, store: Arc<dyn KvStore + Send + Sync>, workers: usize) -> Result<Self> {
        let cache = OfflineCache::with_capacity(store, config.cache.capacity);
        let fetcher = Arc::new(HttpFetcher::new(&config.api)?);
        let parallel_fetcher = ParallelFetcher::with_workers(fetcher.clone(), workers);

        Ok(Self {
            config,
            cache,
            fetcher,
            parallel_fetcher,
            realtime: Arc::new(LocalHub::new()),
        })
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings::from(&self.config.sync)
    }

    /// Connectivity for this run: pinned offline, or probing the API host.
    pub async fn connectivity(&self, offline: bool) -> Result<Arc<dyn ConnectivityMonitor + Send + Sync>> {
        if offline {
            return Ok(Arc::new(ManualConnectivity::new(false)));
        }

        let probe = ProbeConnectivity::spawn(
            self.fetcher.base_url().clone(),
            Duration::from_secs(self.config.connectivity.probe_interval_secs.max(1)),
            Duration::from_secs(self.config.api.timeout_secs),
        )
        .await?;
        Ok(Arc::new(probe))
    }

    pub fn start_engine(
        &self,
        kind: &FeedKind,
        connectivity: Arc<dyn ConnectivityMonitor + Send + Sync>,
    ) -> FeedEngine {
        let deps = EngineDeps {
            fetcher: self.fetcher.clone(),
            mutator: self.fetcher.clone(),
            cache: self.cache.clone(),
            connectivity,
            realtime: self.realtime.clone(),
        };
        FeedEngine::start(kind.adapter(), deps, self.engine_settings())
    }

    pub fn default_db_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| FeedSyncError::Config("Could not find data directory".into()))?;
        let feedsync_dir = data_dir.join("feedsync");
        std::fs::create_dir_all(&feedsync_dir)?;
        Ok(feedsync_dir.join("feedsync.db"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FeedItem;

    #[tokio::test]
    async fn test_offline_engine_reads_shared_cache() {
        let ctx = AppContext::in_memory(Config::default()).unwrap();
        let kind = FeedKind::News;
        ctx.cache
            .save(&kind.adapter().cache_key(), &[FeedItem::new(1), FeedItem::new(2)]);

        let connectivity = ctx.connectivity(true).await.unwrap();
        let engine = ctx.start_engine(&kind, connectivity);
        let snapshot = engine.load_initial().await;

        assert_eq!(snapshot.items.len(), 2);
        assert!(snapshot.from_cache);
        engine.teardown();
    }

    #[test]
    fn test_cache_capacity_from_config() {
        let mut config = Config::default();
        config.cache.capacity = 5;
        let ctx = AppContext::in_memory(config).unwrap();
        assert_eq!(ctx.cache.capacity(), 5);
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let mut config = Config::default();
        config.api.base_url = "not a url".into();
        assert!(AppContext::in_memory(config).is_err());
    }
}
