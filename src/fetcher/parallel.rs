use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{error, info};

use crate::app::{FeedSyncError, Result};
use crate::cache::OfflineCache;
use crate::domain::FeedKind;
use crate::fetcher::PageFetcher;
use crate::sync::FeedList;

pub const DEFAULT_WORKERS: usize = 4;

/// Warms offline caches for several feeds at once.
pub struct ParallelFetcher {
    fetcher: Arc<dyn PageFetcher + Send + Sync>,
    semaphore: Arc<Semaphore>,
}

impl ParallelFetcher {
    pub fn new(fetcher: Arc<dyn PageFetcher + Send + Sync>) -> Self {
        Self::with_workers(fetcher, DEFAULT_WORKERS)
    }

    pub fn with_workers(fetcher: Arc<dyn PageFetcher + Send + Sync>, workers: usize) -> Self {
        Self {
            fetcher,
            semaphore: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    /// Fetch the first page of every feed and store it in the cache.
    ///
    /// Results come back in input order with the number of items cached.
    pub async fn prefetch_all(
        &self,
        kinds: Vec<FeedKind>,
        cache: &OfflineCache,
        page_size: usize,
    ) -> Vec<(FeedKind, Result<usize>)> {
        let mut handles = Vec::new();

        for kind in kinds {
            let fetcher = self.fetcher.clone();
            let semaphore = self.semaphore.clone();
            let cache = cache.clone();

            let handle = tokio::spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => prefetch_single_feed(&fetcher, &kind, &cache, page_size).await,
                    Err(_) => Err(FeedSyncError::Other("prefetch cancelled".into())),
                };
                (kind, result)
            });

            handles.push(handle);
        }

        let mut results = Vec::new();
        for handle in handles {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => {
                    error!("Task join error: {}", e);
                }
            }
        }

        results
    }
}

async fn prefetch_single_feed(
    fetcher: &Arc<dyn PageFetcher + Send + Sync>,
    kind: &FeedKind,
    cache: &OfflineCache,
    page_size: usize,
) -> Result<usize> {
    let adapter = kind.adapter();
    let page = fetcher.fetch_page(&adapter, 1, page_size).await?;

    let mut list = FeedList::new();
    list.restore(page.items);
    let head = list.head(cache.capacity());

    cache.save(&adapter.cache_key(), &head);
    info!("Cached {} items for {}", head.len(), kind);

    Ok(head.len())
}
