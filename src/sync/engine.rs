//! The feed engine: one instance per feed on screen.
//!
//! All state sits behind a synchronous mutex that is never held across an
//! await. Every intent resolves to the snapshot it left behind, and every
//! change is also published on a watch channel for observers. Background
//! tasks (connectivity, realtime, delayed resync) only hold weak references,
//! so dropping the last handle stops them.

use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::app::{FeedSyncError, Result};
use crate::cache::OfflineCache;
use crate::config::SyncConfig;
use crate::connectivity::ConnectivityMonitor;
use crate::domain::{FeedAdapter, FeedErrorKind, FeedItem, FeedPage, FeedSnapshot, ItemId, ReactionUpdate};
use crate::fetcher::{Mutator, PageFetcher};
use crate::normalizer::Normalizer;
use crate::realtime::{RealtimeEvent, RealtimeTransport, Subscription, TransportMessage};
use crate::sync::{FeedState, PaginationController};

pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub page_size: usize,
    /// How long connectivity must stay up before the first page is refetched.
    pub settle_delay: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

impl From<&SyncConfig> for EngineSettings {
    fn from(config: &SyncConfig) -> Self {
        Self {
            page_size: config.page_size.max(1),
            settle_delay: Duration::from_millis(config.settle_delay_ms),
        }
    }
}

/// Collaborators an engine is built from.
#[derive(Clone)]
pub struct EngineDeps {
    pub fetcher: Arc<dyn PageFetcher + Send + Sync>,
    pub mutator: Arc<dyn Mutator + Send + Sync>,
    pub cache: OfflineCache,
    pub connectivity: Arc<dyn ConnectivityMonitor + Send + Sync>,
    pub realtime: Arc<dyn RealtimeTransport + Send + Sync>,
}

/// Handle to a running feed engine. Clones share the same feed.
#[derive(Clone)]
pub struct FeedEngine {
    inner: Arc<Inner>,
}

struct Inner {
    adapter: FeedAdapter,
    cache_key: String,
    settings: EngineSettings,
    fetcher: Arc<dyn PageFetcher + Send + Sync>,
    mutator: Arc<dyn Mutator + Send + Sync>,
    cache: OfflineCache,
    connectivity: Arc<dyn ConnectivityMonitor + Send + Sync>,
    realtime: Arc<dyn RealtimeTransport + Send + Sync>,
    normalizer: Normalizer,
    state: Mutex<FeedState>,
    snapshots: watch::Sender<FeedSnapshot>,
    tasks: Mutex<EngineTasks>,
    torn_down: AtomicBool,
}

#[derive(Default)]
struct EngineTasks {
    connectivity: Option<JoinHandle<()>>,
    realtime: Option<JoinHandle<()>>,
    resync: Option<JoinHandle<()>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PageMode {
    Replace,
    Append,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FirstPageIntent {
    LoadInitial,
    Refresh,
}

#[derive(Debug, Clone)]
struct Ticket {
    page: u32,
    dispatched_at: u64,
    /// Pagination before a first page fetch reset it, put back if the fetch
    /// fails and the list it described is kept.
    previous: Option<PaginationController>,
}

enum Gate {
    Go(Ticket),
    Offline,
    Busy,
}

impl FeedEngine {
    /// Start an engine: read connectivity, join the feed's room and spawn
    /// the background listeners. Must be called inside a tokio runtime.
    ///
    /// The engine keeps the connectivity monitor alive until it is dropped.
    pub fn start(adapter: FeedAdapter, deps: EngineDeps, settings: EngineSettings) -> Self {
        let connected = *deps.connectivity.subscribe().borrow();
        // listen before joining so nothing broadcast to the room is missed
        let events = deps.realtime.listen();

        let state = FeedState::new(settings.page_size, connected);
        let (snapshots, _) = watch::channel(state.snapshot());

        let inner = Arc::new(Inner {
            cache_key: adapter.cache_key(),
            adapter,
            settings,
            fetcher: deps.fetcher,
            mutator: deps.mutator,
            cache: deps.cache,
            connectivity: deps.connectivity,
            realtime: deps.realtime,
            normalizer: Normalizer::new(),
            state: Mutex::new(state),
            snapshots,
            tasks: Mutex::new(EngineTasks::default()),
            torn_down: AtomicBool::new(false),
        });

        inner.join_room();

        let connectivity_task = tokio::spawn(watch_connectivity(
            Arc::downgrade(&inner),
            inner.connectivity.subscribe(),
        ));
        let realtime_task = tokio::spawn(listen_realtime(Arc::downgrade(&inner), events));
        {
            let mut tasks = inner.tasks();
            tasks.connectivity = Some(connectivity_task);
            tasks.realtime = Some(realtime_task);
        }

        info!(
            "Started {} feed (connected: {}, page size: {})",
            inner.adapter.kind, connected, settings.page_size
        );

        Self { inner }
    }

    pub fn adapter(&self) -> &FeedAdapter {
        &self.inner.adapter
    }

    /// Current snapshot.
    pub fn state(&self) -> FeedSnapshot {
        self.inner.snapshot()
    }

    /// Observe every published snapshot.
    pub fn subscribe_state(&self) -> watch::Receiver<FeedSnapshot> {
        self.inner.snapshots.subscribe()
    }

    /// Fetch the first page, or serve the offline cache when disconnected.
    pub async fn load_initial(&self) -> FeedSnapshot {
        self.inner.load_first_page(FirstPageIntent::LoadInitial).await
    }

    /// Refetch the first page and replace the list.
    pub async fn refresh(&self) -> FeedSnapshot {
        self.inner.load_first_page(FirstPageIntent::Refresh).await
    }

    /// Fetch the page at the cursor and append it.
    ///
    /// A no-op while a fetch is in flight or once the feed is exhausted.
    pub async fn load_more(&self) -> FeedSnapshot {
        let inner = &self.inner;
        if inner.is_torn_down() {
            return inner.snapshot();
        }

        let ticket = {
            let mut state = inner.state();
            if !state.is_connected {
                state.record_error(FeedErrorKind::NoConnection);
                return inner.publish(&state);
            }
            match state.pagination.request_next_page() {
                Some(page) => Ticket {
                    page,
                    dispatched_at: state.list.begin_fetch(),
                    previous: None,
                },
                None => {
                    debug!(
                        "Ignoring load_more for {} (fetching: {}, has more: {})",
                        inner.adapter.kind,
                        state.pagination.is_fetching(),
                        state.pagination.has_more()
                    );
                    return state.snapshot();
                }
            }
        };

        inner.dispatch(ticket, PageMode::Append).await
    }

    /// Send a reaction and apply the server's aggregate.
    pub async fn apply_reaction(&self, item_id: &ItemId, user_id: &str, reaction: &str) -> FeedSnapshot {
        let inner = &self.inner;
        if inner.is_torn_down() {
            return inner.snapshot();
        }
        if let Some(rejected) = inner.reject_if_offline() {
            return rejected;
        }

        match inner
            .mutator
            .post_reaction(&inner.adapter, item_id, user_id, reaction)
            .await
        {
            Ok(mut update) => {
                if update.viewer_reaction.is_none() {
                    update.viewer_reaction = Some(reaction.to_string());
                }
                inner.apply_event(RealtimeEvent::ReactionChanged {
                    item_id: item_id.clone(),
                    update,
                })
            }
            Err(e) => {
                warn!("Reaction on {} item {} failed: {}", inner.adapter.kind, item_id, e);
                inner.fail(FeedErrorKind::MutationFailed)
            }
        }
    }

    /// Post a comment to a comment feed.
    ///
    /// The created item is inserted when the server echoes it back; otherwise
    /// it shows up with the broadcast.
    pub async fn post_comment(&self, user_id: &str, text: &str) -> FeedSnapshot {
        let inner = &self.inner;
        if inner.is_torn_down() {
            return inner.snapshot();
        }
        if let Some(rejected) = inner.reject_if_offline() {
            return rejected;
        }

        match inner.mutator.post_comment(&inner.adapter, user_id, text).await {
            Ok(Some(item)) => inner.apply_event(RealtimeEvent::ItemCreated(item)),
            Ok(None) => inner.snapshot(),
            Err(e) => {
                warn!("Comment on {} failed: {}", inner.adapter.kind, e);
                inner.fail(FeedErrorKind::MutationFailed)
            }
        }
    }

    pub fn on_item_created(&self, item: FeedItem) -> FeedSnapshot {
        self.inner.apply_event(RealtimeEvent::ItemCreated(item))
    }

    pub fn on_reaction_changed(&self, item_id: ItemId, update: ReactionUpdate) -> FeedSnapshot {
        self.inner
            .apply_event(RealtimeEvent::ReactionChanged { item_id, update })
    }

    pub fn on_comment_count_changed(&self, item_id: ItemId, count: i64) -> FeedSnapshot {
        self.inner
            .apply_event(RealtimeEvent::CommentCountChanged { item_id, count })
    }

    /// Leave the room, stop the listeners and cancel any pending resync.
    ///
    /// Safe to call more than once. Fetches still in flight are discarded
    /// when they land.
    pub fn teardown(&self) {
        let inner = &self.inner;
        if inner.torn_down.swap(true, Ordering::SeqCst) {
            debug!("{} feed already torn down", inner.adapter.kind);
            return;
        }

        let tasks = mem::take(&mut *inner.tasks());
        for handle in [tasks.connectivity, tasks.realtime, tasks.resync]
            .into_iter()
            .flatten()
        {
            handle.abort();
        }

        inner.realtime.leave_room(&inner.adapter.room);
        {
            let mut state = inner.state();
            state.subscription = Subscription::Unsubscribed;
            inner.publish(&state);
        }

        info!("Tore down {} feed", inner.adapter.kind);
    }
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, FeedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn tasks(&self) -> MutexGuard<'_, EngineTasks> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::SeqCst)
    }

    fn snapshot(&self) -> FeedSnapshot {
        self.state().snapshot()
    }

    /// Publish the state to observers and hand the snapshot back.
    fn publish(&self, state: &FeedState) -> FeedSnapshot {
        let snapshot = state.snapshot();
        self.snapshots.send_replace(snapshot.clone());
        snapshot
    }

    fn fail(&self, kind: FeedErrorKind) -> FeedSnapshot {
        let mut state = self.state();
        state.record_error(kind);
        self.publish(&state)
    }

    fn reject_if_offline(&self) -> Option<FeedSnapshot> {
        let mut state = self.state();
        if state.is_connected {
            return None;
        }
        state.record_error(FeedErrorKind::NoConnection);
        Some(self.publish(&state))
    }

    fn join_room(&self) {
        self.realtime.join_room(&self.adapter.room);
        let mut state = self.state();
        state.subscription = Subscription::Subscribed;
        self.publish(&state);
        debug!("Joined room {}", self.adapter.room);
    }

    fn apply_event(&self, event: RealtimeEvent) -> FeedSnapshot {
        if self.is_torn_down() {
            return self.snapshot();
        }
        let mut state = self.state();
        if state.list.apply(event) {
            self.publish(&state)
        } else {
            state.snapshot()
        }
    }

    async fn load_first_page(&self, intent: FirstPageIntent) -> FeedSnapshot {
        if self.is_torn_down() {
            return self.snapshot();
        }

        let gate = {
            let mut state = self.state();
            if !state.is_connected {
                Gate::Offline
            } else if state.pagination.is_fetching() {
                Gate::Busy
            } else {
                let previous = state.pagination.clone();
                state.pagination.reset();
                match state.pagination.request_next_page() {
                    Some(page) => Gate::Go(Ticket {
                        page,
                        dispatched_at: state.list.begin_fetch(),
                        previous: Some(previous),
                    }),
                    None => Gate::Busy,
                }
            }
        };

        match gate {
            Gate::Go(ticket) => self.dispatch(ticket, PageMode::Replace).await,
            Gate::Busy => {
                debug!("Ignoring {:?} for {}, a fetch is in flight", intent, self.adapter.kind);
                self.snapshot()
            }
            Gate::Offline => match intent {
                FirstPageIntent::LoadInitial => self.serve_offline(),
                FirstPageIntent::Refresh => self.fail(FeedErrorKind::NoConnection),
            },
        }
    }

    fn serve_offline(&self) -> FeedSnapshot {
        let cached = self.cache.load(&self.cache_key);
        let mut state = self.state();
        if !cached.is_empty() {
            info!("Offline, serving {} cached items for {}", cached.len(), self.adapter.kind);
            state.list.restore(cached);
            state.from_cache = true;
        }
        state.record_error(FeedErrorKind::NoConnection);
        self.publish(&state)
    }

    async fn dispatch(&self, ticket: Ticket, mode: PageMode) -> FeedSnapshot {
        {
            let state = self.state();
            self.publish(&state);
        }
        debug!("Fetching page {} of {}", ticket.page, self.adapter.kind);

        let result = self
            .fetcher
            .fetch_page(&self.adapter, ticket.page, self.settings.page_size)
            .await;
        self.complete(ticket, mode, result)
    }

    fn complete(&self, ticket: Ticket, mode: PageMode, result: Result<FeedPage>) -> FeedSnapshot {
        if self.is_torn_down() {
            debug!("Dropping page {} of torn down {} feed", ticket.page, self.adapter.kind);
            return self.snapshot();
        }

        match result {
            Ok(page) => {
                let received = page.received;
                let last = page.is_last();
                let (snapshot, head) = {
                    let mut state = self.state();
                    // fetched data supersedes whatever the cache provided
                    if mode == PageMode::Replace || state.from_cache {
                        state.list.replace_with_page(page.items, ticket.dispatched_at);
                    } else {
                        state.list.append_page(page.items, ticket.dispatched_at);
                    }
                    state.pagination.on_page_received(received);
                    state.last_error = None;
                    state.from_cache = false;
                    (self.publish(&state), state.list.head(self.cache.capacity()))
                };

                info!(
                    "Fetched page {} of {} ({} entries{})",
                    ticket.page,
                    self.adapter.kind,
                    received,
                    if last { ", last page" } else { "" }
                );
                self.cache.save(&self.cache_key, &head);
                snapshot
            }
            Err(e) => {
                warn!("Fetching page {} of {} failed: {}", ticket.page, self.adapter.kind, e);
                let needs_fallback = {
                    let mut state = self.state();
                    state.pagination.on_error();
                    mode == PageMode::Replace && state.list.is_empty()
                };
                let cached = if needs_fallback {
                    self.cache.load(&self.cache_key)
                } else {
                    Vec::new()
                };

                let mut state = self.state();
                if !cached.is_empty() && state.list.is_empty() {
                    info!("Serving {} cached items for {}", cached.len(), self.adapter.kind);
                    state.list.restore(cached);
                    state.from_cache = true;
                    state.last_error = None;
                } else {
                    // the kept list still matches the cursor it was paged with
                    if let Some(previous) = ticket.previous {
                        if !state.list.is_empty() {
                            state.pagination = previous;
                        }
                    }
                    state.record_error(classify(&e));
                }
                self.publish(&state)
            }
        }
    }

    /// React to a connectivity transition.
    ///
    /// Going online schedules a first page refetch after the settle delay;
    /// any transition cancels a resync that has not started yet.
    fn on_connectivity(self: &Arc<Self>, online: bool) {
        if self.is_torn_down() {
            return;
        }
        {
            let mut state = self.state();
            if state.is_connected == online {
                return;
            }
            state.is_connected = online;
            if online && state.last_error == Some(FeedErrorKind::NoConnection) {
                state.last_error = None;
            }
            self.publish(&state);
        }

        let mut tasks = self.tasks();
        if let Some(pending) = tasks.resync.take() {
            pending.abort();
        }

        if online {
            info!(
                "{} back online, resyncing in {:?}",
                self.adapter.kind, self.settings.settle_delay
            );
            let weak = Arc::downgrade(self);
            let delay = self.settings.settle_delay;
            tasks.resync = Some(tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                // the fetch runs on its own task so a later transition cannot cut it short
                if let Some(inner) = weak.upgrade() {
                    tokio::spawn(async move {
                        inner.load_first_page(FirstPageIntent::LoadInitial).await;
                    });
                }
            }));
        } else {
            info!("{} went offline", self.adapter.kind);
        }
    }

    fn on_transport_reconnected(&self) {
        if self.is_torn_down() {
            return;
        }
        info!("Realtime transport reconnected, rejoining {}", self.adapter.room);
        self.join_room();
    }
}

fn classify(error: &FeedSyncError) -> FeedErrorKind {
    match error {
        FeedSyncError::MalformedResponse(_) => FeedErrorKind::MalformedResponse,
        _ => FeedErrorKind::FetchFailed,
    }
}

async fn watch_connectivity(weak: Weak<Inner>, mut connectivity: watch::Receiver<bool>) {
    loop {
        // the first pass catches a transition between start and subscribe
        let online = *connectivity.borrow_and_update();
        match weak.upgrade() {
            Some(inner) => inner.on_connectivity(online),
            None => break,
        }
        if connectivity.changed().await.is_err() {
            break;
        }
    }
    debug!("Connectivity watcher stopped");
}

async fn listen_realtime(weak: Weak<Inner>, mut events: broadcast::Receiver<TransportMessage>) {
    loop {
        let message = match events.recv().await {
            Ok(message) => message,
            Err(RecvError::Lagged(missed)) => {
                warn!("Realtime listener lagged, {} events dropped", missed);
                continue;
            }
            Err(RecvError::Closed) => break,
        };
        let Some(inner) = weak.upgrade() else {
            break;
        };

        match message {
            TransportMessage::Event(event) => {
                match inner.normalizer.decode_event(&inner.adapter, &event) {
                    Some(decoded) => {
                        inner.apply_event(decoded);
                    }
                    None => debug!("Ignoring {} event for {}", event.name, inner.adapter.kind),
                }
            }
            TransportMessage::Reconnected => inner.on_transport_reconnected(),
        }
    }
    debug!("Realtime listener stopped");
}
