//! # feedsync
//!
//! Keeps a paginated, server-backed feed in sync on a client that may lose
//! its connection at any time.
//!
//! ## Architecture
//!
//! ```text
//! PageFetcher → Normalizer → FeedEngine ← RealtimeTransport
//!                               ↕
//!                         OfflineCache → KvStore
//! ```
//!
//! A [`FeedEngine`](sync::FeedEngine) owns one feed: it pages through the
//! server list, merges pushed events into the loaded items, falls back to
//! the offline cache when there is no network, and refetches once the
//! connection has been back for a settle delay.
//!
//! ## Quick Start
//!
//! ```bash
//! # Load two pages of the news feed
//! feedsync fetch news --pages 2
//!
//! # Warm the offline cache for several feeds
//! feedsync prefetch news posts:1
//!
//! # Read what is cached without touching the network
//! feedsync fetch news --offline
//! ```
//!
//! ## Modules
//!
//! - [`app`]: Application context and error types
//! - [`cache`]: Per-feed offline cache
//! - [`cli`]: Command-line interface definitions
//! - [`connectivity`]: Online/offline signal
//! - [`domain`]: Feed kinds, items and snapshots
//! - [`fetcher`]: HTTP page fetching and mutations
//! - [`normalizer`]: Backend JSON to domain types
//! - [`realtime`]: Room-scoped event transport
//! - [`store`]: Key-value persistence
//! - [`sync`]: Pagination, merging and the feed engine

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires together the cache,
/// HTTP fetcher and realtime hub, and starts engines from them.
pub mod app;

/// Offline copy of each feed's most recent items.
pub mod cache;

/// Command-line interface definitions using clap.
pub mod cli;

/// Configuration loaded from `~/.config/feedsync/config.toml`.
pub mod config;

/// Connectivity monitors.
pub mod connectivity;

/// Core domain models.
///
/// - [`FeedKind`](domain::FeedKind) / [`FeedAdapter`](domain::FeedAdapter): which feed and how its backend looks
/// - [`FeedItem`](domain::FeedItem): A normalized feed entry
/// - [`FeedSnapshot`](domain::FeedSnapshot): The state handed to the UI
pub mod domain;

/// Page fetching and mutations over HTTP.
///
/// Includes [`ParallelFetcher`](fetcher::parallel::ParallelFetcher) for
/// warming several caches at once.
pub mod fetcher;

/// Maps backend JSON onto domain types.
pub mod normalizer;

/// Realtime transport seam and the in-process hub.
pub mod realtime;

/// Key-value persistence.
///
/// Backed by SQLite with migrations via `rusqlite_migration`.
pub mod store;

/// Pagination, merging and the feed engine.
pub mod sync;

#[cfg(test)]
mod testing;
