use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use feedsync::app::AppContext;
use feedsync::cli::{commands, CacheAction, Cli, Commands};
use feedsync::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    if let Commands::Config = cli.command {
        commands::show_config(&config)?;
        return Ok(());
    }

    let ctx = AppContext::with_workers(config, cli.workers)?;

    match cli.command {
        Commands::Fetch {
            feed,
            pages,
            offline,
        } => {
            commands::fetch_feed(&ctx, &feed, pages, offline).await?;
        }
        Commands::Prefetch { feeds } => {
            commands::prefetch_feeds(&ctx, feeds).await?;
        }
        Commands::Cache { action } => match action {
            CacheAction::List => commands::list_cached(&ctx)?,
            CacheAction::Show { feed } => commands::show_cached(&ctx, &feed)?,
            CacheAction::Clear { feed } => commands::clear_cache(&ctx, feed.as_ref())?,
        },
        Commands::Config => {}
    }

    Ok(())
}
