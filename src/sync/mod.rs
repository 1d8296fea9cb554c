pub mod engine;
pub mod merge;
pub mod pagination;
pub mod state;

pub use engine::{EngineDeps, EngineSettings, FeedEngine};
pub use merge::FeedList;
pub use pagination::PaginationController;
pub use state::FeedState;
