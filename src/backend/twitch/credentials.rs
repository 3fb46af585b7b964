use std::fmt;

/// Credentials used to register EventSub subscriptions.
///
/// Loaded once at startup and never modified afterwards.
#[derive(Clone, PartialEq, Eq)]
pub struct TwitchCredentials {
    user_id: String,
    user_token: String,
    app_id: String,
}

impl TwitchCredentials {
    pub fn new(
        user_id: impl Into<String>,
        user_token: impl Into<String>,
        app_id: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            user_token: user_token.into(),
            app_id: app_id.into(),
        }
    }

    /// Broadcaster account whose rewards are watched
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// OAuth user access token of that account
    pub fn user_token(&self) -> &str {
        &self.user_token
    }

    /// Client id of the registered Twitch application
    pub fn app_id(&self) -> &str {
        &self.app_id
    }
}

impl fmt::Debug for TwitchCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwitchCredentials")
            .field("user_id", &self.user_id)
            .field("user_token", &"<redacted>")
            .field("app_id", &self.app_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_token() {
        let credentials = TwitchCredentials::new("42", "tkn", "app1");
        let debug = format!("{:?}", credentials);
        assert!(debug.contains("42"));
        assert!(debug.contains("app1"));
        assert!(!debug.contains("tkn"));
    }
}
