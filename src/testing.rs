//! Scripted collaborators shared by the unit tests.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{Notify, Semaphore};

use crate::app::{FeedSyncError, Result};
use crate::domain::{FeedAdapter, FeedItem, FeedPage, ItemId, ReactionUpdate};
use crate::fetcher::{Mutator, PageFetcher};

type Scripted<T> = std::result::Result<T, ()>;

/// Serves canned pages; a page with no script comes back empty.
#[derive(Default)]
pub struct ScriptedFetcher {
    pages: Mutex<HashMap<u32, Scripted<Vec<FeedItem>>>>,
    skipped: Mutex<HashMap<u32, usize>>,
    requested: Mutex<Vec<u32>>,
    calls: AtomicUsize,
    gate: Mutex<Option<Arc<Semaphore>>>,
    entered: Mutex<Arc<Notify>>,
    reaction: Mutex<Option<Scripted<ReactionUpdate>>>,
    comment: Mutex<Option<Scripted<Option<FeedItem>>>>,
    mutations: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(ids: Range<i64>) -> Vec<FeedItem> {
        ids.map(FeedItem::new).collect()
    }

    pub fn set_page(&self, page: u32, response: Scripted<Vec<FeedItem>>) {
        self.pages.lock().unwrap().insert(page, response);
    }

    /// Report `skipped` extra entries on a page that the normalizer dropped.
    pub fn set_skipped(&self, page: u32, skipped: usize) {
        self.skipped.lock().unwrap().insert(page, skipped);
    }

    /// Hold every fetch until [`ScriptedFetcher::release`] is called.
    ///
    /// The returned notify fires when a held fetch has started.
    pub fn hold(&self) -> Arc<Notify> {
        *self.gate.lock().unwrap() = Some(Arc::new(Semaphore::new(0)));
        let entered = Arc::new(Notify::new());
        *self.entered.lock().unwrap() = entered.clone();
        entered
    }

    pub fn release(&self, fetches: usize) {
        if let Some(gate) = self.gate.lock().unwrap().as_ref() {
            gate.add_permits(fetches);
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requested(&self) -> Vec<u32> {
        self.requested.lock().unwrap().clone()
    }

    pub fn set_reaction(&self, response: Scripted<ReactionUpdate>) {
        *self.reaction.lock().unwrap() = Some(response);
    }

    pub fn set_comment(&self, response: Scripted<Option<FeedItem>>) {
        *self.comment.lock().unwrap() = Some(response);
    }

    pub fn mutations(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch_page(&self, _adapter: &FeedAdapter, page: u32, page_size: usize) -> Result<FeedPage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requested.lock().unwrap().push(page);
        let entered = self.entered.lock().unwrap().clone();
        entered.notify_one();

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.acquire().await.unwrap().forget();
        }

        let scripted = self.pages.lock().unwrap().get(&page).cloned();
        let skipped = self.skipped.lock().unwrap().get(&page).copied().unwrap_or(0);
        match scripted.unwrap_or_else(|| Ok(Vec::new())) {
            Ok(items) => Ok(FeedPage {
                received: items.len() + skipped,
                items,
                requested_page: page,
                page_size,
            }),
            Err(()) => Err(FeedSyncError::Other(format!("scripted failure for page {}", page))),
        }
    }
}

#[async_trait]
impl Mutator for ScriptedFetcher {
    async fn post_reaction(
        &self,
        _adapter: &FeedAdapter,
        _item_id: &ItemId,
        _user_id: &str,
        _reaction: &str,
    ) -> Result<ReactionUpdate> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        match self.reaction.lock().unwrap().clone() {
            Some(Ok(update)) => Ok(update),
            _ => Err(FeedSyncError::Other("scripted reaction failure".into())),
        }
    }

    async fn post_comment(&self, _adapter: &FeedAdapter, _user_id: &str, _text: &str) -> Result<Option<FeedItem>> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        match self.comment.lock().unwrap().clone() {
            Some(Ok(item)) => Ok(item),
            _ => Err(FeedSyncError::Other("scripted comment failure".into())),
        }
    }
}
