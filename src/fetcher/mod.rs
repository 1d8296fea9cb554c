pub mod http_fetcher;
pub mod parallel;

use async_trait::async_trait;

use crate::app::Result;
use crate::domain::{FeedAdapter, FeedItem, FeedPage, ItemId, ReactionUpdate};

#[async_trait]
pub trait PageFetcher {
    async fn fetch_page(&self, adapter: &FeedAdapter, page: u32, page_size: usize) -> Result<FeedPage>;
}

/// Write side of the API: reactions and comments.
#[async_trait]
pub trait Mutator {
    async fn post_reaction(
        &self,
        adapter: &FeedAdapter,
        item_id: &ItemId,
        user_id: &str,
        reaction: &str,
    ) -> Result<ReactionUpdate>;

    /// Returns the created comment when the server echoes it back.
    async fn post_comment(&self, adapter: &FeedAdapter, user_id: &str, text: &str) -> Result<Option<FeedItem>>;
}
