use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use super::credentials::TwitchCredentials;
use super::error::{Result, TwitchError};
use super::messages::REWARD_REDEMPTION_ADD;

pub const EVENTSUB_API_URL: &str = "https://api.twitch.tv/helix/eventsub/subscriptions";

/// EventSub subscription request
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionRequest {
    #[serde(rename = "type")]
    pub subscription_type: String,
    pub version: String,
    pub condition: serde_json::Value,
    pub transport: Transport,
}

#[derive(Debug, Clone, Serialize)]
pub struct Transport {
    pub method: String,
    pub session_id: String,
}

impl SubscriptionRequest {
    /// Reward redemptions of `broadcaster_user_id`, delivered over the given WebSocket session
    pub fn reward_redemptions(broadcaster_user_id: &str, session_id: &str) -> Self {
        Self {
            subscription_type: REWARD_REDEMPTION_ADD.to_string(),
            version: "1".to_string(),
            condition: json!({
                "broadcaster_user_id": broadcaster_user_id
            }),
            transport: Transport {
                method: "websocket".to_string(),
                session_id: session_id.to_string(),
            },
        }
    }
}

/// Registers the reward redemption subscription for a WebSocket session.
///
/// Twitch only starts sending notifications over a session after a
/// subscription naming that session has been created through the Helix API.
pub struct SubscriptionRegistrar {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
    credentials: Arc<TwitchCredentials>,
}

impl SubscriptionRegistrar {
    pub fn new(url: String, timeout: Duration, credentials: Arc<TwitchCredentials>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
            timeout,
            credentials,
        }
    }

    /// Build the subscription request for `session_id` without sending it
    pub fn build_request(&self, session_id: &str) -> Result<reqwest::Request> {
        let request = SubscriptionRequest::reward_redemptions(self.credentials.user_id(), session_id);

        let request = self
            .client
            .post(&self.url)
            .header(
                "Authorization",
                format!("Bearer {}", self.credentials.user_token()),
            )
            .header("Client-Id", self.credentials.app_id())
            .header("Content-Type", "application/json")
            .timeout(self.timeout)
            .json(&request)
            .build()?;

        Ok(request)
    }

    /// Create the subscription for `session_id`.
    ///
    /// There is no retry: if this fails, no redemptions arrive on the session.
    pub async fn register(&self, session_id: &str) -> Result<()> {
        let request = self.build_request(session_id)?;
        log::debug!("Registering reward redemption subscription for session {}", session_id);

        let response = self.client.execute(request).await?;
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        if status.as_u16() >= 400 {
            return Err(TwitchError::SubscriptionError(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        log::info!("Subscription response: [{}] {}", status, body);
        Ok(())
    }
}
