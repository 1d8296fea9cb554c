use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use tokio::sync::broadcast;
use tracing::debug;

use crate::realtime::{RealtimeTransport, TransportEvent, TransportMessage};

/// Default capacity for the hub's broadcast channel.
pub const HUB_CHANNEL_CAPACITY: usize = 256;

/// In-process transport.
///
/// Room membership is reference counted so several feeds can share a room;
/// events addressed to a room nobody has joined are dropped, like a server
/// only fanning out to a room's members.
pub struct LocalHub {
    tx: broadcast::Sender<TransportMessage>,
    rooms: Mutex<HashMap<String, usize>>,
}

impl Default for LocalHub {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(HUB_CHANNEL_CAPACITY);
        Self {
            tx,
            rooms: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_joined(&self, room: &str) -> bool {
        self.rooms
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(room)
    }

    /// Returns how many listeners received the event.
    pub fn publish(&self, event: TransportEvent) -> usize {
        if let Some(ref room) = event.room {
            if !self.is_joined(room) {
                debug!("Dropping '{}' for unjoined room {}", event.name, room);
                return 0;
            }
        }
        self.tx.send(TransportMessage::Event(event)).unwrap_or(0)
    }

    /// Simulate a dropped and restored connection: the server forgets every
    /// room membership, and listeners are told to join again.
    pub fn signal_reconnected(&self) {
        self.rooms
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        let _ = self.tx.send(TransportMessage::Reconnected);
    }
}

impl RealtimeTransport for LocalHub {
    fn join_room(&self, room: &str) {
        let mut rooms = self.rooms.lock().unwrap_or_else(PoisonError::into_inner);
        *rooms.entry(room.to_string()).or_insert(0) += 1;
    }

    fn leave_room(&self, room: &str) {
        let mut rooms = self.rooms.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(count) = rooms.get_mut(room) {
            *count -= 1;
            if *count == 0 {
                rooms.remove(room);
            }
        }
    }

    fn listen(&self) -> broadcast::Receiver<TransportMessage> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(room: Option<&str>) -> TransportEvent {
        TransportEvent {
            name: "nuevoPost".into(),
            room: room.map(String::from),
            payload: json!({"id": 1}),
        }
    }

    #[test]
    fn test_room_membership_is_counted() {
        let hub = LocalHub::new();
        hub.join_room("posts");
        hub.join_room("posts");
        hub.leave_room("posts");
        assert!(hub.is_joined("posts"));
        hub.leave_room("posts");
        assert!(!hub.is_joined("posts"));
        // Leaving an unknown room is harmless
        hub.leave_room("posts");
    }

    #[tokio::test]
    async fn test_events_for_unjoined_rooms_are_dropped() {
        let hub = LocalHub::new();
        let mut rx = hub.listen();

        assert_eq!(hub.publish(event(Some("post:1"))), 0);
        hub.join_room("post:1");
        assert_eq!(hub.publish(event(Some("post:1"))), 1);
        assert_eq!(hub.publish(event(None)), 1);

        assert_eq!(
            rx.recv().await.unwrap(),
            TransportMessage::Event(event(Some("post:1")))
        );
        assert_eq!(rx.recv().await.unwrap(), TransportMessage::Event(event(None)));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_reconnected_signal() {
        let hub = LocalHub::new();
        let mut rx = hub.listen();
        hub.join_room("posts");
        hub.signal_reconnected();
        assert_eq!(rx.recv().await.unwrap(), TransportMessage::Reconnected);
        assert!(!hub.is_joined("posts"));
    }
}
