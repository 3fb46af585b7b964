//! Twitch EventSub WebSocket integration module
//!
//! Keeps one EventSub WebSocket connection open, registers the channel points
//! reward redemption subscription as soon as the session is welcomed, and
//! forwards every redemption to the [`EventBus`](crate::backend::events::EventBus).
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use crate::backend::events::EventBus;
//! use crate::backend::twitch::{TwitchConfig, TwitchCredentials, TwitchEventSubscriber};
//!
//! #[tokio::main]
//! async fn main() {
//!     let events = EventBus::new();
//!     let mut redemptions = events.subscribe();
//!
//!     let credentials = TwitchCredentials::new("user_id", "user_token", "app_id");
//!     let subscriber = TwitchEventSubscriber::new(credentials, TwitchConfig::default(), events);
//!     subscriber.connect().unwrap();
//!
//!     while let Ok(redemption) = redemptions.recv().await {
//!         println!("{} redeemed {}", redemption.nick, redemption.reward.title);
//!     }
//!
//!     subscriber.shutdown().await;
//! }
//! ```

mod client;
mod credentials;
mod error;
mod eventsub;
mod messages;
mod websocket;

#[cfg(test)]
mod fixtures;

// Re-export public types
pub use client::{EventDispatcher, TwitchConfig, TwitchEventSubscriber, EVENTSUB_WS_URL};
pub use credentials::TwitchCredentials;
pub use error::{Result, TwitchError};
pub use eventsub::{SubscriptionRegistrar, SubscriptionRequest, EVENTSUB_API_URL};
pub use messages::{Reward, RewardRedemption, TwitchEvent};
pub use websocket::ConnectionState;
