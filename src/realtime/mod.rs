//! Realtime transport seam.
//!
//! The transport is a room-scoped broadcast channel shared by every feed
//! instance. Each engine joins its own room and owns its own receiver;
//! unsubscribing from an event is simply dropping that receiver.

pub mod hub;

use serde_json::Value;
use tokio::sync::broadcast;

use crate::domain::{FeedItem, ItemId, ReactionUpdate};

pub use hub::LocalHub;

/// A named event pushed by the server.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportEvent {
    pub name: String,
    /// Room the event was broadcast to, `None` for global broadcasts.
    pub room: Option<String>,
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransportMessage {
    Event(TransportEvent),
    /// The underlying connection dropped and came back.
    Reconnected,
}

/// A transport event decoded against a feed adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeEvent {
    ItemCreated(FeedItem),
    ReactionChanged { item_id: ItemId, update: ReactionUpdate },
    CommentCountChanged { item_id: ItemId, count: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Subscription {
    #[default]
    Unsubscribed,
    Subscribed,
}

pub trait RealtimeTransport {
    /// Joining a room that is already joined is a no-op on the server side.
    fn join_room(&self, room: &str);
    fn leave_room(&self, room: &str);
    fn listen(&self) -> broadcast::Receiver<TransportMessage>;
}
