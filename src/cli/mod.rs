pub mod commands;

use clap::{Parser, Subcommand};

use crate::domain::FeedKind;
use crate::fetcher::parallel::DEFAULT_WORKERS;

#[derive(Parser)]
#[command(name = "feedsync")]
#[command(about = "Paginated, offline-tolerant feed synchronization", long_about = None)]
pub struct Cli {
    /// Number of parallel workers for prefetching feeds
    #[arg(short, long, default_value_t = DEFAULT_WORKERS, global = true)]
    pub workers: usize,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load a feed and print its items
    Fetch {
        /// Feed to load: news, posts:<user>, post-comments:<post> or news-comments:<news>
        feed: FeedKind,

        /// Number of pages to load
        #[arg(short, long, default_value_t = 1)]
        pages: u32,

        /// Skip the network and serve the offline cache
        #[arg(long)]
        offline: bool,
    },
    /// Warm the offline cache of several feeds concurrently
    Prefetch {
        #[arg(required = true)]
        feeds: Vec<FeedKind>,
    },
    /// Inspect or clear the offline cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Print the config path and effective values
    Config,
}

#[derive(Subcommand)]
pub enum CacheAction {
    /// List cached feeds
    List,
    /// Print the cached items of a feed
    Show { feed: FeedKind },
    /// Clear one feed, or every feed when none is given
    Clear { feed: Option<FeedKind> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fetch() {
        let cli = Cli::try_parse_from(["feedsync", "fetch", "posts:4", "--pages", "3", "--offline"]).unwrap();
        match cli.command {
            Commands::Fetch { feed, pages, offline } => {
                assert_eq!(feed, FeedKind::Posts { user_id: 4 });
                assert_eq!(pages, 3);
                assert!(offline);
            }
            _ => panic!("expected fetch"),
        }
        assert_eq!(cli.workers, DEFAULT_WORKERS);
    }

    #[test]
    fn test_parse_prefetch_with_workers() {
        let cli = Cli::try_parse_from(["feedsync", "-w", "2", "prefetch", "news", "posts:1"]).unwrap();
        assert_eq!(cli.workers, 2);
        match cli.command {
            Commands::Prefetch { feeds } => assert_eq!(feeds.len(), 2),
            _ => panic!("expected prefetch"),
        }
    }

    #[test]
    fn test_parse_cache_clear_all() {
        let cli = Cli::try_parse_from(["feedsync", "cache", "clear"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Cache {
                action: CacheAction::Clear { feed: None }
            }
        ));
    }

    #[test]
    fn test_rejects_unknown_feed() {
        assert!(Cli::try_parse_from(["feedsync", "fetch", "weather"]).is_err());
        assert!(Cli::try_parse_from(["feedsync", "prefetch"]).is_err());
    }
}
