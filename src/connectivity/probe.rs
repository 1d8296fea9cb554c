use std::time::Duration;

use reqwest::Client;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};
use url::Url;

use crate::app::Result;
use crate::connectivity::ConnectivityMonitor;

const MIN_PROBE_INTERVAL: Duration = Duration::from_millis(1);

/// Polls the API host and publishes connectivity transitions.
///
/// Any HTTP response counts as "online"; only transport failures
/// (DNS, refused, timeout) count as offline.
pub struct ProbeConnectivity {
    tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ProbeConnectivity {
    /// Probe once, then keep probing every `every` in the background.
    ///
    /// A zero interval is raised to one millisecond.
    pub async fn spawn(target: Url, every: Duration, timeout: Duration) -> Result<Self> {
        let every = every.max(MIN_PROBE_INTERVAL);
        let client = Client::builder().timeout(timeout).build()?;

        let initial = probe(&client, &target).await;
        info!(
            "Connectivity to {}: {}",
            target,
            if initial { "online" } else { "offline" }
        );
        let (tx, _) = watch::channel(initial);

        let task = tokio::spawn(run_probe_loop(client, target, every, tx.clone()));

        Ok(Self { tx, task })
    }

    pub fn is_connected(&self) -> bool {
        *self.tx.borrow()
    }
}

impl ConnectivityMonitor for ProbeConnectivity {
    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Drop for ProbeConnectivity {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn probe(client: &Client, target: &Url) -> bool {
    match client.head(target.clone()).send().await {
        Ok(_) => true,
        Err(e) => {
            debug!("Connectivity probe failed: {}", e);
            false
        }
    }
}

async fn run_probe_loop(client: Client, target: Url, every: Duration, tx: watch::Sender<bool>) {
    let mut timer = interval(every);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    timer.tick().await; // Skip the first immediate tick

    loop {
        timer.tick().await;
        let online = probe(&client, &target).await;
        let changed = tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            info!(
                "Connectivity to {} changed: {}",
                target,
                if online { "online" } else { "offline" }
            );
        }
    }
}
