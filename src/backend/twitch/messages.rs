use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::TwitchError;

/// `metadata.message_type` values of the EventSub WebSocket protocol
pub const SESSION_WELCOME: &str = "session_welcome";
pub const SESSION_KEEPALIVE: &str = "session_keepalive";
pub const NOTIFICATION: &str = "notification";

/// Subscription type of channel points reward redemptions
pub const REWARD_REDEMPTION_ADD: &str = "channel.channel_points_custom_reward_redemption.add";

/// Session welcome message payload
#[derive(Debug, Clone, Deserialize, Serialize)]
struct WelcomePayload {
    session: Session,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct Session {
    id: String,
    #[serde(default)]
    keepalive_timeout_seconds: Option<u64>,
}

/// Notification payload, the event is decoded once the subscription type is known
#[derive(Debug, Clone, Deserialize, Serialize)]
struct NotificationPayload {
    subscription: Subscription,
    event: Value,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct Subscription {
    #[serde(rename = "type")]
    subscription_type: String,
}

/// Channel points reward redemption from
/// `channel.channel_points_custom_reward_redemption.add`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RewardRedemption {
    pub id: String,
    pub broadcaster_user_id: String,
    pub user_id: String,
    pub user_login: String,
    /// Display name of the redeeming viewer
    #[serde(rename = "user_name")]
    pub nick: String,
    #[serde(default)]
    pub user_input: String,
    pub status: String,
    pub reward: Reward,
    pub redeemed_at: DateTime<Utc>,
    /// The event object as it arrived
    #[serde(skip)]
    pub raw: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Reward {
    pub id: String,
    pub title: String,
    pub cost: u32,
    #[serde(default)]
    pub prompt: String,
}

/// Classification of a single message received from Twitch EventSub
#[derive(Debug, Clone)]
pub enum TwitchEvent {
    /// Handshake completed, the connection now has a session id
    SessionWelcome {
        session_id: String,
        keepalive_timeout_seconds: Option<u64>,
    },

    /// Liveness message, no action required
    KeepAlive { raw: Value },

    /// A viewer redeemed a channel points reward
    RewardRedemption(RewardRedemption),

    /// Valid envelope with a message or subscription type we don't handle
    Unknown { message_type: String, raw: Value },

    /// The message could not be classified
    Error {
        cause: TwitchError,
        raw: Value,
        context: &'static str,
    },
}

/// Why a message could not be classified
struct Malformed {
    cause: TwitchError,
    context: &'static str,
}

impl Malformed {
    fn new(context: &'static str, cause: impl Into<TwitchError>) -> Self {
        Self {
            cause: cause.into(),
            context,
        }
    }
}

impl TwitchEvent {
    /// Classify a decoded EventSub message.
    ///
    /// Every document maps to exactly one variant; malformed input ends up as
    /// [`TwitchEvent::Error`] and never panics.
    pub fn classify(raw: Value) -> TwitchEvent {
        match Self::try_classify(&raw) {
            Ok(Classified::Event(event)) => event,
            Ok(Classified::Unhandled(message_type)) => TwitchEvent::Unknown { message_type, raw },
            Ok(Classified::KeepAlive) => TwitchEvent::KeepAlive { raw },
            Err(Malformed { cause, context }) => TwitchEvent::Error {
                cause,
                raw,
                context,
            },
        }
    }

    fn try_classify(raw: &Value) -> Result<Classified, Malformed> {
        let metadata = raw.get("metadata").ok_or_else(|| {
            Malformed::new(
                "reading metadata",
                TwitchError::JsonError("missing field `metadata`".to_string()),
            )
        })?;

        let message_type = match metadata.get("message_type") {
            Some(Value::String(message_type)) => message_type.as_str(),
            Some(other) => {
                return Err(Malformed::new(
                    "reading metadata",
                    TwitchError::JsonError(format!("`message_type` is not a string: {}", other)),
                ))
            }
            None => {
                return Err(Malformed::new(
                    "reading metadata",
                    TwitchError::JsonError("missing field `message_type`".to_string()),
                ))
            }
        };

        let payload = || {
            raw.get("payload").cloned().ok_or_else(|| {
                Malformed::new(
                    "reading payload",
                    TwitchError::JsonError("missing field `payload`".to_string()),
                )
            })
        };

        match message_type {
            SESSION_WELCOME => {
                let welcome: WelcomePayload = serde_json::from_value(payload()?)
                    .map_err(|e| Malformed::new("decoding session_welcome payload", e))?;
                Ok(Classified::Event(TwitchEvent::SessionWelcome {
                    session_id: welcome.session.id,
                    keepalive_timeout_seconds: welcome.session.keepalive_timeout_seconds,
                }))
            }
            SESSION_KEEPALIVE => Ok(Classified::KeepAlive),
            NOTIFICATION => {
                let notification: NotificationPayload = serde_json::from_value(payload()?)
                    .map_err(|e| Malformed::new("decoding notification payload", e))?;

                match notification.subscription.subscription_type.as_str() {
                    REWARD_REDEMPTION_ADD => {
                        let mut redemption: RewardRedemption =
                            serde_json::from_value(notification.event.clone())
                                .map_err(|e| Malformed::new("decoding reward redemption", e))?;
                        redemption.raw = notification.event;
                        Ok(Classified::Event(TwitchEvent::RewardRedemption(redemption)))
                    }
                    other => Ok(Classified::Unhandled(format!("{}/{}", NOTIFICATION, other))),
                }
            }
            other => Ok(Classified::Unhandled(other.to_string())),
        }
    }
}

enum Classified {
    Event(TwitchEvent),
    KeepAlive,
    Unhandled(String),
}
