use std::fmt;

use crate::domain::FeedItem;
use crate::realtime::Subscription;

/// Error conditions the engine tracks for a feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedErrorKind {
    /// An intent needed the network while offline.
    NoConnection,
    FetchFailed,
    /// The response parsed but lacked the expected shape.
    MalformedResponse,
    CacheUnavailable,
    MutationFailed,
}

impl FeedErrorKind {
    /// What the UI gets to see, if anything.
    pub fn surfaced(self) -> Option<FeedErrorKind> {
        match self {
            FeedErrorKind::MalformedResponse => Some(FeedErrorKind::FetchFailed),
            FeedErrorKind::CacheUnavailable => None,
            other => Some(other),
        }
    }
}

impl fmt::Display for FeedErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            FeedErrorKind::NoConnection => "No internet connection",
            FeedErrorKind::FetchFailed => "Could not load the feed",
            FeedErrorKind::MalformedResponse => "Unexpected response from server",
            FeedErrorKind::CacheUnavailable => "Offline cache unavailable",
            FeedErrorKind::MutationFailed => "Could not send your change",
        };
        f.write_str(msg)
    }
}

/// Read-only view of a feed handed to the UI.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedSnapshot {
    pub items: Vec<FeedItem>,
    pub cursor: u32,
    pub has_more: bool,
    pub is_fetching: bool,
    pub is_connected: bool,
    pub last_error: Option<FeedErrorKind>,
    /// Items came from the offline cache rather than a fetch.
    pub from_cache: bool,
    pub subscription: Subscription,
}
