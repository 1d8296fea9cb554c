use crate::domain::FeedItem;

/// One page as returned by the list endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedPage {
    pub items: Vec<FeedItem>,
    /// Entries the server sent, including any the normalizer skipped.
    pub received: usize,
    pub requested_page: u32,
    pub page_size: usize,
}

impl FeedPage {
    /// A page shorter than requested means the server has nothing further.
    pub fn is_last(&self) -> bool {
        self.received < self.page_size
    }
}
