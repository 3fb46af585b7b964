use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;

use super::credentials::TwitchCredentials;
use super::error::{Result, TwitchError};
use super::eventsub::{SubscriptionRegistrar, EVENTSUB_API_URL};
use super::messages::TwitchEvent;
use super::websocket::{ConnectionHandle, ConnectionListener, ConnectionState};
use crate::backend::events::EventBus;

pub const EVENTSUB_WS_URL: &str = "wss://eventsub.wss.twitch.tv/ws";

/// Endpoints and timeouts of the Twitch client
#[derive(Debug, Clone)]
pub struct TwitchConfig {
    pub eventsub_url: String,
    pub subscriptions_url: String,
    /// Applies to connecting the WebSocket and to each registration request
    pub request_timeout: Duration,
    /// How long shutdown waits for the close handshake
    pub close_timeout: Duration,
}

impl Default for TwitchConfig {
    fn default() -> Self {
        Self {
            eventsub_url: EVENTSUB_WS_URL.to_string(),
            subscriptions_url: EVENTSUB_API_URL.to_string(),
            request_timeout: Duration::from_secs(10),
            close_timeout: Duration::from_secs(10),
        }
    }
}

/// Routes classified events to their consumers
pub struct EventDispatcher {
    registrar: SubscriptionRegistrar,
    events: EventBus,
}

impl EventDispatcher {
    pub fn new(registrar: SubscriptionRegistrar, events: EventBus) -> Self {
        Self { registrar, events }
    }

    pub async fn dispatch(&self, event: TwitchEvent) {
        match event {
            TwitchEvent::SessionWelcome {
                session_id,
                keepalive_timeout_seconds,
            } => {
                log::debug!(
                    "Processing welcome for session {} (keepalive timeout {:?}s)",
                    session_id,
                    keepalive_timeout_seconds
                );
                if let Err(e) = self.registrar.register(&session_id).await {
                    log::error!(
                        "Registering reward redemptions failed - there will probably not be any events: {}",
                        e
                    );
                }
            }
            TwitchEvent::KeepAlive { raw } => log::trace!("Keep alive: {}", raw),
            TwitchEvent::RewardRedemption(redemption) => {
                log::info!(
                    "Reward '{}' redeemed by {}",
                    redemption.reward.title,
                    redemption.nick
                );
                self.events.submit(redemption);
            }
            TwitchEvent::Unknown { message_type, raw } => {
                log::warn!("Unknown Twitch event '{}': {}", message_type, raw);
            }
            TwitchEvent::Error {
                cause,
                raw,
                context,
            } => {
                log::error!(
                    "Error while {} of Twitch event: {} - message: {}",
                    context,
                    cause,
                    raw
                );
            }
        }
    }
}

/// Keeps one EventSub connection open and forwards reward redemptions to the event bus
pub struct TwitchEventSubscriber {
    config: TwitchConfig,
    dispatcher: Arc<EventDispatcher>,
    connection: Arc<Mutex<Option<ConnectionHandle>>>,
    state: Arc<watch::Sender<ConnectionState>>,
}

impl TwitchEventSubscriber {
    pub fn new(credentials: TwitchCredentials, config: TwitchConfig, events: EventBus) -> Self {
        let registrar = SubscriptionRegistrar::new(
            config.subscriptions_url.clone(),
            config.request_timeout,
            Arc::new(credentials),
        );
        let (state, _) = watch::channel(ConnectionState::Disconnected);

        Self {
            config,
            dispatcher: Arc::new(EventDispatcher::new(registrar, events)),
            connection: Arc::new(Mutex::new(None)),
            state: Arc::new(state),
        }
    }

    /// Open the EventSub connection in the background.
    ///
    /// Returns as soon as the attempt is started; the outcome is logged. Fails
    /// if a connection is already open or another `connect`/`shutdown` holds
    /// the connection slot.
    pub fn connect(&self) -> Result<JoinHandle<()>> {
        let mut slot = self.connection.clone().try_lock_owned().map_err(|_| {
            TwitchError::WebSocketError("connect or shutdown already in progress".to_string())
        })?;

        match slot.as_ref().map(ConnectionHandle::is_finished) {
            Some(false) => {
                return Err(TwitchError::WebSocketError(
                    "already connected to Twitch EventSub".to_string(),
                ));
            }
            // Left behind by a connection the remote end closed
            Some(true) => *slot = None,
            None => {}
        }

        self.state.send_replace(ConnectionState::Connecting);

        let url = self.config.eventsub_url.clone();
        let timeout = self.config.request_timeout;
        let dispatcher = self.dispatcher.clone();
        let state = self.state.clone();

        // The slot stays locked until the attempt is over, so a shutdown
        // issued meanwhile waits for it and then closes the new connection
        let task = tokio::spawn(async move {
            let connected = match tokio::time::timeout(timeout, connect_async(url.as_str())).await {
                Ok(Ok((stream, _))) => Ok(stream),
                Ok(Err(e)) => Err(TwitchError::from(e)),
                Err(_) => Err(TwitchError::WebSocketError(format!(
                    "no connection after {:?}",
                    timeout
                ))),
            };

            match connected {
                Ok(stream) => {
                    log::info!("Successfully connected to Twitch EventSub");
                    state.send_replace(ConnectionState::Connected);
                    let listener = ConnectionListener::new(dispatcher);
                    *slot = Some(ConnectionHandle::spawn(stream, listener, state));
                }
                Err(e) => {
                    log::error!("Could not connect to Twitch EventSub: {}", e);
                    state.send_replace(ConnectionState::Disconnected);
                }
            }
        });

        Ok(task)
    }

    /// Close the connection, if any, and wait for the close handshake.
    ///
    /// Calling this without an open connection does nothing.
    pub async fn shutdown(&self) {
        let handle = self.connection.lock().await.take();

        if let Some(handle) = handle {
            handle.close(self.config.close_timeout).await;
            self.state.send_replace(ConnectionState::Disconnected);
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Receiver that observes every connection state change
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::twitch::fixtures::{keepalive, redemption_notification, welcome};
    use axum::{
        extract::{
            ws::{Message, WebSocket},
            State, WebSocketUpgrade,
        },
        http::{HeaderMap, StatusCode},
        response::Response,
        routing::{get, post},
        Json, Router,
    };
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Twitch stand-in serving the EventSub WebSocket and the Helix subscriptions endpoint
    #[derive(Clone)]
    struct MockTwitch {
        frames: Arc<Vec<Value>>,
        registrations: Arc<std::sync::Mutex<Vec<(HeaderMap, Value)>>>,
        close_frames: Arc<AtomicUsize>,
        connections: Arc<AtomicUsize>,
    }

    impl MockTwitch {
        async fn serve_socket(self, mut socket: WebSocket) {
            self.connections.fetch_add(1, Ordering::SeqCst);
            for frame in self.frames.iter() {
                if socket.send(Message::Text(frame.to_string())).await.is_err() {
                    return;
                }
            }

            while let Some(Ok(message)) = socket.recv().await {
                if let Message::Close(_) = message {
                    self.close_frames.fetch_add(1, Ordering::SeqCst);
                }
            }
        }

        fn registrations(&self) -> Vec<(HeaderMap, Value)> {
            self.registrations.lock().unwrap().clone()
        }
    }

    async fn eventsub_socket(ws: WebSocketUpgrade, State(mock): State<MockTwitch>) -> Response {
        ws.on_upgrade(move |socket| mock.serve_socket(socket))
    }

    async fn create_subscription(
        State(mock): State<MockTwitch>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> (StatusCode, Json<Value>) {
        mock.registrations.lock().unwrap().push((headers, body));
        (StatusCode::ACCEPTED, Json(json!({ "data": [], "total": 1 })))
    }

    async fn start_mock(frames: Vec<Value>) -> (MockTwitch, TwitchConfig) {
        let mock = MockTwitch {
            frames: Arc::new(frames),
            registrations: Arc::new(std::sync::Mutex::new(Vec::new())),
            close_frames: Arc::new(AtomicUsize::new(0)),
            connections: Arc::new(AtomicUsize::new(0)),
        };

        let app = Router::new()
            .route("/ws", get(eventsub_socket))
            .route("/helix/eventsub/subscriptions", post(create_subscription))
            .with_state(mock.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await });

        let config = TwitchConfig {
            eventsub_url: format!("ws://{}/ws", addr),
            subscriptions_url: format!("http://{}/helix/eventsub/subscriptions", addr),
            request_timeout: Duration::from_secs(5),
            close_timeout: Duration::from_secs(5),
        };

        (mock, config)
    }

    fn credentials() -> TwitchCredentials {
        TwitchCredentials::new("42", "tkn", "app1")
    }

    #[tokio::test]
    async fn test_welcome_registers_and_redemption_is_forwarded() {
        let (mock, config) = start_mock(vec![
            welcome("abc123"),
            keepalive(),
            redemption_notification("viewer1"),
        ])
        .await;
        let events = EventBus::new();
        let mut redemptions = events.subscribe();
        let subscriber = TwitchEventSubscriber::new(credentials(), config, events);

        subscriber.connect().unwrap().await.unwrap();
        assert_eq!(subscriber.state(), ConnectionState::Connected);

        let redemption = tokio::time::timeout(Duration::from_secs(5), redemptions.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(redemption.nick, "viewer1");
        assert_eq!(
            redemption.raw,
            redemption_notification("viewer1")["payload"]["event"]
        );
        assert!(redemptions.try_recv().is_err());

        let registrations = mock.registrations();
        assert_eq!(registrations.len(), 1);
        let (headers, body) = &registrations[0];
        assert_eq!(headers["authorization"], "Bearer tkn");
        assert_eq!(headers["client-id"], "app1");
        assert_eq!(headers["content-type"], "application/json");
        assert_eq!(
            body["type"],
            "channel.channel_points_custom_reward_redemption.add"
        );
        assert_eq!(body["condition"]["broadcaster_user_id"], "42");
        assert_eq!(body["transport"]["method"], "websocket");
        assert_eq!(body["transport"]["session_id"], "abc123");

        subscriber.shutdown().await;
        assert_eq!(subscriber.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_every_welcome_registers() {
        let (mock, config) = start_mock(vec![
            welcome("first"),
            welcome("second"),
            redemption_notification("viewer1"),
        ])
        .await;
        let events = EventBus::new();
        let mut redemptions = events.subscribe();
        let subscriber = TwitchEventSubscriber::new(credentials(), config, events);

        subscriber.connect().unwrap().await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), redemptions.recv())
            .await
            .unwrap()
            .unwrap();

        let sessions: Vec<Value> = mock
            .registrations()
            .into_iter()
            .map(|(_, body)| body["transport"]["session_id"].clone())
            .collect();
        assert_eq!(sessions, vec![json!("first"), json!("second")]);

        subscriber.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_sends_one_close_frame() {
        let (mock, config) = start_mock(vec![welcome("abc123")]).await;
        let subscriber = TwitchEventSubscriber::new(credentials(), config, EventBus::new());

        subscriber.connect().unwrap().await.unwrap();
        subscriber.shutdown().await;
        subscriber.shutdown().await;

        assert_eq!(mock.close_frames.load(Ordering::SeqCst), 1);
        assert_eq!(subscriber.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_shutdown_without_connection() {
        let subscriber =
            TwitchEventSubscriber::new(credentials(), TwitchConfig::default(), EventBus::new());

        subscriber.shutdown().await;
        assert_eq!(subscriber.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_connect_failure_leaves_slot_empty() {
        // Bind and drop to get a port nothing listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = TwitchConfig {
            eventsub_url: format!("ws://{}/ws", addr),
            ..TwitchConfig::default()
        };
        let subscriber = TwitchEventSubscriber::new(credentials(), config, EventBus::new());

        subscriber.connect().unwrap().await.unwrap();
        assert_eq!(subscriber.state(), ConnectionState::Disconnected);
        assert!(subscriber.connection.lock().await.is_none());

        subscriber.shutdown().await;
    }

    #[tokio::test]
    async fn test_second_connect_is_rejected() {
        let (mock, config) = start_mock(vec![welcome("abc123")]).await;
        let subscriber = TwitchEventSubscriber::new(credentials(), config, EventBus::new());

        subscriber.connect().unwrap().await.unwrap();
        assert!(matches!(
            subscriber.connect(),
            Err(TwitchError::WebSocketError(_))
        ));
        assert_eq!(subscriber.state(), ConnectionState::Connected);

        subscriber.shutdown().await;

        // The rejected call never opened a socket of its own
        assert_eq!(mock.connections.load(Ordering::SeqCst), 1);
        assert_eq!(mock.close_frames.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_connect_while_attempt_in_flight_is_rejected() {
        let (mock, config) = start_mock(vec![]).await;
        let subscriber = TwitchEventSubscriber::new(credentials(), config, EventBus::new());

        // The first attempt holds the slot until it finishes
        let task = subscriber.connect().unwrap();
        assert!(matches!(
            subscriber.connect(),
            Err(TwitchError::WebSocketError(_))
        ));

        task.await.unwrap();
        subscriber.shutdown().await;
        assert_eq!(mock.connections.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_state_transitions() {
        let (_mock, config) = start_mock(vec![]).await;
        let subscriber = TwitchEventSubscriber::new(credentials(), config, EventBus::new());
        let mut state = subscriber.watch_state();
        assert_eq!(*state.borrow_and_update(), ConnectionState::Disconnected);

        let task = subscriber.connect().unwrap();
        assert_eq!(subscriber.state(), ConnectionState::Connecting);

        task.await.unwrap();
        state
            .wait_for(|s| *s == ConnectionState::Connected)
            .await
            .unwrap();

        subscriber.shutdown().await;
        state
            .wait_for(|s| *s == ConnectionState::Disconnected)
            .await
            .unwrap();
    }
}
