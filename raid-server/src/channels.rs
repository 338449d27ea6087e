//! Per-raid broadcast hub.
//!
//! Every raid has one `tokio::sync::broadcast` channel carrying all of its
//! outgoing events. Subscribers filter by audience: raid-wide events go to
//! everyone, private events only to their player.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;

use raid_core::events::{Audience, Outgoing};
use raid_core::raid::PlayerId;

/// Buffered events per raid before slow subscribers start lagging
pub const CHANNEL_CAPACITY: usize = 1024;

pub struct EventHub {
    channels: RwLock<HashMap<String, broadcast::Sender<Arc<Outgoing>>>>,
    capacity: usize,
}

impl Default for EventHub {
    fn default() -> Self {
        Self::with_capacity(CHANNEL_CAPACITY)
    }
}

impl EventHub {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    fn sender(&self, raid_id: &str) -> broadcast::Sender<Arc<Outgoing>> {
        if let Some(tx) = self.channels.read().get(raid_id) {
            return tx.clone();
        }
        self.channels
            .write()
            .entry(raid_id.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Publish a drained outbox in order; events with no listener are dropped
    pub fn publish(&self, raid_id: &str, events: Vec<Outgoing>) {
        if events.is_empty() {
            return;
        }
        let Some(tx) = self.channels.read().get(raid_id).cloned() else {
            return;
        };
        for event in events {
            let _ = tx.send(Arc::new(event));
        }
    }

    /// Listen to a raid as `player`, or as a spectator when `None`
    pub fn subscribe(&self, raid_id: &str, player: Option<PlayerId>) -> Subscription {
        Subscription {
            rx: self.sender(raid_id).subscribe(),
            player,
        }
    }

    /// Close a raid's channel; subscribers see the end of the stream
    pub fn remove(&self, raid_id: &str) {
        self.channels.write().remove(raid_id);
    }
}

/// One listener's filtered view of a raid channel
pub struct Subscription {
    rx: broadcast::Receiver<Arc<Outgoing>>,
    player: Option<PlayerId>,
}

impl Subscription {
    fn wants(&self, out: &Outgoing) -> bool {
        match out.audience {
            Audience::Raid => true,
            Audience::Player(id) => self.player == Some(id),
        }
    }

    /// Next event for this listener, `None` once the channel is closed
    pub async fn recv(&mut self) -> Option<Arc<Outgoing>> {
        loop {
            match self.rx.recv().await {
                Ok(out) if self.wants(&out) => return Some(out),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, player = ?self.player, "Subscriber lagged, events dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`Subscription::recv`]
    pub fn try_recv(&mut self) -> Option<Arc<Outgoing>> {
        loop {
            match self.rx.try_recv() {
                Ok(out) if self.wants(&out) => return Some(out),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}
