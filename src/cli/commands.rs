use crate::app::{AppContext, Result};
use crate::config::Config;
use crate::domain::{FeedItem, FeedKind, FeedSnapshot};

const TEXT_WIDTH: usize = 72;

pub async fn fetch_feed(ctx: &AppContext, kind: &FeedKind, pages: u32, offline: bool) -> Result<()> {
    let connectivity = ctx.connectivity(offline).await?;
    let engine = ctx.start_engine(kind, connectivity);

    let mut snapshot = engine.load_initial().await;
    for _ in 1..pages {
        if !snapshot.has_more || snapshot.last_error.is_some() {
            break;
        }
        snapshot = engine.load_more().await;
    }
    engine.teardown();

    print_snapshot(kind, &snapshot);
    Ok(())
}

pub async fn prefetch_feeds(ctx: &AppContext, kinds: Vec<FeedKind>) -> Result<()> {
    println!("Prefetching {} feeds...", kinds.len());

    let results = ctx
        .parallel_fetcher
        .prefetch_all(kinds, &ctx.cache, ctx.config.sync.page_size)
        .await;

    let mut total = 0;
    let mut errors = 0;

    for (kind, result) in results {
        match result {
            Ok(count) => {
                total += count;
                println!("  {} items cached for {}", count, kind);
            }
            Err(e) => {
                errors += 1;
                eprintln!("  Error prefetching {}: {}", kind, e);
            }
        }
    }

    println!("Prefetch complete: {} items cached, {} errors", total, errors);
    Ok(())
}

pub fn list_cached(ctx: &AppContext) -> Result<()> {
    let feeds = ctx.cache.feeds();

    if feeds.is_empty() {
        println!("No cached feeds");
        return Ok(());
    }

    for feed in feeds {
        println!(
            "{} ({} items)\n  updated {}",
            feed.feed_key,
            feed.item_count,
            feed.updated_at.format("%Y-%m-%d %H:%M")
        );
    }

    Ok(())
}

pub fn show_cached(ctx: &AppContext, kind: &FeedKind) -> Result<()> {
    let items = ctx.cache.load(&kind.adapter().cache_key());

    if items.is_empty() {
        println!("Nothing cached for {}", kind);
        return Ok(());
    }

    for item in &items {
        println!("{}", format_item(item));
    }
    Ok(())
}

pub fn clear_cache(ctx: &AppContext, kind: Option<&FeedKind>) -> Result<()> {
    match kind {
        Some(kind) => {
            if ctx.cache.clear(&kind.adapter().cache_key()) {
                println!("Cleared cache for {}", kind);
            } else {
                println!("Nothing cached for {}", kind);
            }
        }
        None => {
            let cleared = ctx.cache.clear_all();
            println!("Cleared {} cached feeds", cleared);
        }
    }
    Ok(())
}

pub fn show_config(config: &Config) -> Result<()> {
    match Config::default_config_path() {
        Ok(path) => println!("Config file: {}", path.display()),
        Err(e) => println!("Config file: unavailable ({})", e),
    }

    let db_path = match config.cache.path.clone() {
        Some(path) => path,
        None => AppContext::default_db_path()?,
    };

    println!("[api]");
    println!("  base_url = {}", config.api.base_url);
    println!("  timeout_secs = {}", config.api.timeout_secs);
    println!("  user_agent = {}", config.api.user_agent);
    println!("[sync]");
    println!("  page_size = {}", config.sync.page_size);
    println!("  settle_delay_ms = {}", config.sync.settle_delay_ms);
    println!("[cache]");
    println!("  capacity = {}", config.cache.capacity);
    println!("  path = {}", db_path.display());
    println!("[connectivity]");
    println!("  probe_interval_secs = {}", config.connectivity.probe_interval_secs);
    Ok(())
}

fn print_snapshot(kind: &FeedKind, snapshot: &FeedSnapshot) {
    if let Some(error) = snapshot.last_error {
        eprintln!("{}", error);
    }

    if snapshot.items.is_empty() {
        println!("No items in {}", kind);
        return;
    }

    for item in &snapshot.items {
        println!("{}", format_item(item));
    }

    let source = if snapshot.from_cache { "offline cache" } else { "server" };
    let more = if snapshot.has_more { ", more available" } else { "" };
    println!("{} items from {}{}", snapshot.items.len(), source, more);
}

fn format_item(item: &FeedItem) -> String {
    let date = item
        .created_at
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "          ".to_string());

    format!(
        "{} {:>6}  {}  [{} reactions, {} comments]",
        date,
        item.id,
        truncate(item.display_text(), TEXT_WIDTH),
        item.reaction_count,
        item.comment_count
    )
}

fn truncate(text: &str, width: usize) -> String {
    let line = text.lines().next().unwrap_or("");
    if line.chars().count() <= width {
        return line.to_string();
    }
    let cut: String = line.chars().take(width.saturating_sub(3)).collect();
    format!("{}...", cut)
}
