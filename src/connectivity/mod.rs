//! Connectivity signal consumed by the feed engine.
//!
//! A [`watch::Receiver`] always holds the latest state, which covers the
//! "report the current state on subscribe" contract without a callback.

pub mod probe;

use tokio::sync::watch;

pub use probe::ProbeConnectivity;

pub trait ConnectivityMonitor {
    fn subscribe(&self) -> watch::Receiver<bool>;
}

/// Connectivity driven by the host application (or a test).
pub struct ManualConnectivity {
    tx: watch::Sender<bool>,
}

impl ManualConnectivity {
    pub fn new(connected: bool) -> Self {
        let (tx, _) = watch::channel(connected);
        Self { tx }
    }

    pub fn set_connected(&self, connected: bool) {
        self.tx.send_replace(connected);
    }

    pub fn is_connected(&self) -> bool {
        *self.tx.borrow()
    }
}

impl ConnectivityMonitor for ManualConnectivity {
    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}
