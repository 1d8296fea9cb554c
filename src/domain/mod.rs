pub mod feed;
pub mod item;
pub mod page;
pub mod state;

pub use feed::{EventNames, FeedAdapter, FeedKind, FieldMap, ParentFilter};
pub use item::{FeedItem, ItemId, ReactionState, ReactionUpdate};
pub use page::FeedPage;
pub use state::{FeedErrorKind, FeedSnapshot};
