use crate::domain::{FeedErrorKind, FeedSnapshot};
use crate::realtime::Subscription;
use crate::sync::{FeedList, PaginationController};

/// Mutable state behind one feed engine.
#[derive(Debug)]
pub struct FeedState {
    pub list: FeedList,
    pub pagination: PaginationController,
    pub is_connected: bool,
    pub last_error: Option<FeedErrorKind>,
    pub from_cache: bool,
    pub subscription: Subscription,
}

impl FeedState {
    pub fn new(page_size: usize, is_connected: bool) -> Self {
        Self {
            list: FeedList::new(),
            pagination: PaginationController::new(page_size),
            is_connected,
            last_error: None,
            from_cache: false,
            subscription: Subscription::Unsubscribed,
        }
    }

    /// Record an error, keeping the previous one if this kind stays hidden.
    pub fn record_error(&mut self, kind: FeedErrorKind) {
        if let Some(surfaced) = kind.surfaced() {
            self.last_error = Some(surfaced);
        }
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        FeedSnapshot {
            items: self.list.items().to_vec(),
            cursor: self.pagination.cursor(),
            has_more: self.pagination.has_more(),
            is_fetching: self.pagination.is_fetching(),
            is_connected: self.is_connected,
            last_error: self.last_error,
            from_cache: self.from_cache,
            subscription: self.subscription,
        }
    }
}
