use crate::backend::events::EventBus;
use crate::backend::twitch::{RewardRedemption, TwitchEventSubscriber};
use std::path::PathBuf;
use tokio::sync::broadcast;

pub mod backend;
use log::{error, info, warn};

/// Stand-in consumer for redemptions until something renders them
async fn log_redemptions(mut redemptions: broadcast::Receiver<RewardRedemption>) {
    loop {
        match redemptions.recv().await {
            Ok(redemption) => {
                info!(
                    "{} redeemed '{}' ({} points) {}",
                    redemption.nick,
                    redemption.reward.title,
                    redemption.reward.cost,
                    redemption.user_input
                );
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Redemption consumer lagged behind, skipped {}", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = match backend::config::load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let events = EventBus::new();
    tokio::spawn(log_redemptions(events.subscribe()));

    let subscriber = TwitchEventSubscriber::new(
        config.twitch.credentials(),
        config.twitch.client_config(),
        events,
    );

    info!("Starting Twitch event subscriber");
    if let Err(e) = subscriber.connect() {
        error!("{}", e);
        std::process::exit(1);
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }

    info!("Shutting down");
    subscriber.shutdown().await;
}
