use tokio::sync::broadcast;

use crate::backend::twitch::RewardRedemption;

/// Maximum number of redemptions buffered per subscriber
const CHANNEL_CAPACITY: usize = 100;

/// Bus that domain events are submitted to for downstream consumers
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<RewardRedemption>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Hand a redemption to every current subscriber
    pub fn submit(&self, event: RewardRedemption) {
        if let Err(e) = self.tx.send(event) {
            log::warn!("No subscriber for redemption of {}", e.0.reward.title);
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RewardRedemption> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
