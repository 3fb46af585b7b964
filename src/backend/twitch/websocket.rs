use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::WebSocketStream;

use super::client::EventDispatcher;
use super::error::TwitchError;
use super::messages::TwitchEvent;

/// WebSocket connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Reacts to the lifecycle and frames of one EventSub connection
pub struct ConnectionListener {
    dispatcher: Arc<EventDispatcher>,
}

impl ConnectionListener {
    pub fn new(dispatcher: Arc<EventDispatcher>) -> Self {
        Self { dispatcher }
    }

    fn on_open(&self) {
        log::info!("Opened WebSocket connection to Twitch EventSub");
    }

    fn on_ping(&self, payload: &[u8]) {
        log::trace!("Received ping {}", String::from_utf8_lossy(payload));
    }

    fn on_pong(&self, payload: &[u8]) {
        // Twitch never answers pings, we never send any
        log::warn!("Received pong (weird!) {}", String::from_utf8_lossy(payload));
    }

    /// Decode, classify and dispatch one text frame
    async fn on_text(&self, text: &str) {
        log::trace!("Received text message {}", text);

        let event = match serde_json::from_str::<Value>(text) {
            Ok(raw) => TwitchEvent::classify(raw),
            Err(e) => TwitchEvent::Error {
                cause: TwitchError::from(e),
                raw: Value::String(text.to_string()),
                context: "decoding text frame",
            },
        };

        self.dispatcher.dispatch(event).await;
    }

    fn on_close(&self, frame: Option<&CloseFrame>) {
        let (code, reason) = frame
            .map(|f| (u16::from(f.code), f.reason.to_string()))
            .unwrap_or((1005, String::new()));

        match code {
            // Twitch specific close codes
            4000..=4007 => log::error!(
                "Twitch EventSub closed the connection: {}",
                TwitchError::ConnectionClosed(code, reason)
            ),
            _ => log::info!(
                "Connection to Twitch EventSub closed with status code {}",
                code
            ),
        }
    }

    fn on_error(&self, error: &WsError) {
        log::error!(
            "Connection to Twitch EventSub closed with an error: {}",
            error
        );
    }
}

/// Read frames until the connection is gone.
///
/// Frames are handled one at a time in arrival order. A close request on
/// `close_rx` starts the close handshake; the loop keeps reading until the
/// remote end acknowledges it.
async fn run_connection<S>(
    mut stream: WebSocketStream<S>,
    listener: &ConnectionListener,
    mut close_rx: oneshot::Receiver<()>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    listener.on_open();
    let mut closing = false;

    loop {
        let message = tokio::select! {
            _ = &mut close_rx, if !closing => {
                closing = true;
                let frame = CloseFrame {
                    code: CloseCode::Normal,
                    reason: "".into(),
                };
                if let Err(e) = stream.close(Some(frame)).await {
                    listener.on_error(&e);
                    break;
                }
                continue;
            }
            message = stream.next() => message,
        };

        match message {
            Some(Ok(Message::Text(text))) => listener.on_text(text.as_str()).await,
            Some(Ok(Message::Ping(payload))) => {
                listener.on_ping(&payload);
                if let Err(e) = stream.send(Message::Pong(payload)).await {
                    listener.on_error(&e);
                    break;
                }
            }
            Some(Ok(Message::Pong(payload))) => listener.on_pong(&payload),
            Some(Ok(Message::Close(frame))) => listener.on_close(frame.as_ref()),
            Some(Ok(Message::Binary(data))) => {
                log::debug!("Ignoring binary message of {} bytes", data.len());
            }
            Some(Ok(Message::Frame(_))) => {}
            Some(Err(WsError::ConnectionClosed)) | Some(Err(WsError::AlreadyClosed)) | None => {
                break
            }
            Some(Err(e)) => {
                listener.on_error(&e);
                break;
            }
        }
    }
}

/// Handle to the reader task of a live connection
pub struct ConnectionHandle {
    close_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl ConnectionHandle {
    /// Start reading `stream` on its own task.
    ///
    /// `state` is set to `Disconnected` once the connection is gone.
    pub fn spawn<S>(
        stream: WebSocketStream<S>,
        listener: ConnectionListener,
        state: Arc<watch::Sender<ConnectionState>>,
    ) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (close_tx, close_rx) = oneshot::channel();
        let task = tokio::spawn(async move {
            run_connection(stream, &listener, close_rx).await;
            state.send_replace(ConnectionState::Disconnected);
        });

        Self { close_tx, task }
    }

    /// Whether the connection already ended on its own
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Send a normal closure and wait for the close handshake to finish
    pub async fn close(self, timeout: Duration) {
        let Self { close_tx, mut task } = self;

        // The reader is gone already if the remote end closed first
        let _ = close_tx.send(());

        match tokio::time::timeout(timeout, &mut task).await {
            Ok(Ok(())) => log::info!("Connection to Twitch EventSub shut down"),
            Ok(Err(e)) => log::error!("Twitch EventSub reader task failed: {}", e),
            Err(_) => {
                log::warn!(
                    "Close handshake with Twitch EventSub took longer than {:?}, dropping the connection",
                    timeout
                );
                task.abort();
            }
        }
    }
}
