//! Push notification listener
//!
//! Holds one STOMP subscription to the backend's message topic and fans
//! every "new message in conversation X" event out to all subscribers.
//! Events are hints to refetch; they never carry message content.

pub mod stomp;
pub mod websocket;

use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::Config;
use stomp::{Command, Frame, FrameError};
use websocket::StompSocket;

pub const MESSAGES_TOPIC: &str = "/topic/messages";
pub const SEND_DESTINATION: &str = "/app/send-message";
/// Heart-beat interval offered to the broker, both directions.
pub const HEARTBEAT_MS: u64 = 10_000;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum PushError {
    #[error("WebSocket error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("bad STOMP frame: {0}")]
    Frame(#[from] FrameError),
    #[error("broker error: {0}")]
    Broker(String),
    #[error("connection closed by server")]
    Closed,
    #[error("push channel is not connected")]
    NotConnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        })
    }
}

/// A new message landed in `chat_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushEvent {
    pub chat_id: String,
}

impl PushEvent {
    /// Parse a topic payload: a bare JSON string or number, or an object with `id` / `chatId`.
    pub fn from_body(body: &str) -> Option<Self> {
        let value: serde_json::Value = serde_json::from_str(body).ok()?;
        let id = match &value {
            serde_json::Value::Object(map) => map.get("chatId").or_else(|| map.get("id"))?,
            other => other,
        };
        let chat_id = match id {
            serde_json::Value::String(s) => s.trim().to_string(),
            serde_json::Value::Number(n) => n.to_string(),
            _ => return None,
        };
        if chat_id.is_empty() {
            return None;
        }
        Some(Self { chat_id })
    }
}

#[derive(Debug, Clone)]
pub struct PushConfig {
    pub url: String,
    pub token: Option<String>,
    pub reconnect_delay: Duration,
}

impl PushConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            url: config.ws_url.clone(),
            token: config.valid_token(),
            reconnect_delay: config.reconnect_delay(),
        }
    }
}

/// Handle to the background push task.
pub struct PushListener {
    events: broadcast::Sender<PushEvent>,
    state: watch::Receiver<ConnectionState>,
    outbound: mpsc::Sender<Frame>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PushListener {
    /// Start connecting in the background. Must be called inside a tokio runtime.
    pub fn spawn(config: PushConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (state_tx, state) = watch::channel(ConnectionState::Disconnected);
        let (outbound, outbound_rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run(
            config,
            events.clone(),
            state_tx,
            outbound_rx,
            cancel.clone(),
        ));

        Self {
            events,
            state,
            outbound,
            cancel,
            task: Some(task),
        }
    }

    /// A new independent receiver. Events sent before this call are not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<PushEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Publish `{"chatId": ..}` to the broker's send destination.
    pub async fn publish_send(&self, chat_id: &str) -> Result<(), PushError> {
        if self.state() != ConnectionState::Connected {
            return Err(PushError::NotConnected);
        }
        let body = serde_json::json!({ "chatId": chat_id }).to_string();
        self.outbound
            .send(Frame::send(SEND_DESTINATION, body))
            .await
            .map_err(|_| PushError::NotConnected)
    }

    /// Stop the listener, sending DISCONNECT if connected, and wait for the task to end.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!("Push task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for PushListener {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Connection loop with a fixed reconnect delay.
async fn run(
    config: PushConfig,
    events: broadcast::Sender<PushEvent>,
    state: watch::Sender<ConnectionState>,
    mut outbound: mpsc::Receiver<Frame>,
    cancel: CancellationToken,
) {
    loop {
        state.send_replace(ConnectionState::Connecting);

        match session(&config, &events, &state, &mut outbound, &cancel).await {
            Ok(()) => break,
            Err(e) => {
                state.send_replace(ConnectionState::Disconnected);
                tracing::warn!(
                    "Push channel disconnected: {}. Reconnecting in {}s...",
                    e,
                    config.reconnect_delay.as_secs()
                );
            }
        }

        tokio::select! {
            _ = time::sleep(config.reconnect_delay) => {}
            _ = cancel.cancelled() => break,
        }
    }

    state.send_replace(ConnectionState::Disconnected);
    tracing::info!("Push listener stopped");
}

/// One connection. Returns `Ok(())` only on cancellation.
async fn session(
    config: &PushConfig,
    events: &broadcast::Sender<PushEvent>,
    state: &watch::Sender<ConnectionState>,
    outbound: &mut mpsc::Receiver<Frame>,
    cancel: &CancellationToken,
) -> Result<(), PushError> {
    let mut socket = tokio::select! {
        socket = StompSocket::connect(&config.url) => socket?,
        _ = cancel.cancelled() => return Ok(()),
    };

    let host = host_header(&config.url);
    socket
        .send_frame(&Frame::connect(&host, config.token.as_deref(), HEARTBEAT_MS))
        .await?;

    let connected = tokio::select! {
        frame = await_connected(&mut socket) => frame?,
        _ = cancel.cancelled() => {
            socket.close().await;
            return Ok(());
        }
    };

    let subscription = format!("sub-{}", Uuid::new_v4());
    socket
        .send_frame(&Frame::subscribe(MESSAGES_TOPIC, &subscription))
        .await?;
    state.send_replace(ConnectionState::Connected);
    tracing::info!("Push channel connected, subscribed to {}", MESSAGES_TOPIC);

    let mut ticker = heartbeat_interval(HEARTBEAT_MS, connected.header("heart-beat"))
        .map(|every| time::interval_at(time::Instant::now() + every, every));

    loop {
        tokio::select! {
            frame = socket.recv_frame() => match frame? {
                Some(frame) => handle_frame(&frame, events)?,
                None => return Err(PushError::Closed),
            },
            Some(frame) = outbound.recv() => socket.send_frame(&frame).await?,
            _ = next_tick(&mut ticker) => socket.send_heartbeat().await?,
            _ = cancel.cancelled() => {
                if let Err(e) = socket.send_frame(&Frame::disconnect("bye")).await {
                    tracing::debug!("DISCONNECT not sent: {}", e);
                }
                socket.close().await;
                return Ok(());
            }
        }
    }
}

async fn await_connected(socket: &mut StompSocket) -> Result<Frame, PushError> {
    loop {
        match socket.recv_frame().await? {
            Some(frame) if frame.command == Command::Connected => return Ok(frame),
            Some(frame) if frame.command == Command::Error => return Err(broker_error(&frame)),
            Some(frame) => tracing::debug!("Ignoring {} before CONNECTED", frame.command),
            None => return Err(PushError::Closed),
        }
    }
}

fn handle_frame(frame: &Frame, events: &broadcast::Sender<PushEvent>) -> Result<(), PushError> {
    match frame.command {
        Command::Message => match PushEvent::from_body(&frame.body) {
            Some(event) => {
                tracing::debug!("New message in conversation {}", event.chat_id);
                if events.send(event).is_err() {
                    tracing::trace!("No push subscribers");
                }
            }
            None => tracing::warn!("Ignoring unrecognized push payload: {}", frame.body),
        },
        Command::Error => return Err(broker_error(frame)),
        other => tracing::debug!("Ignoring {} frame", other),
    }
    Ok(())
}

fn broker_error(frame: &Frame) -> PushError {
    let message = frame
        .header("message")
        .map(String::from)
        .unwrap_or_else(|| frame.body.trim().to_string());
    PushError::Broker(message)
}

/// How often the client must send heart-beats, given the broker's `heart-beat` header.
fn heartbeat_interval(client_ms: u64, server: Option<&str>) -> Option<Duration> {
    let wanted_by_server = server
        .and_then(|h| h.split(',').nth(1))
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(0);
    if client_ms == 0 || wanted_by_server == 0 {
        return None;
    }
    Some(Duration::from_millis(client_ms.max(wanted_by_server)))
}

async fn next_tick(ticker: &mut Option<time::Interval>) {
    match ticker {
        Some(t) => {
            t.tick().await;
        }
        None => std::future::pending().await,
    }
}

fn host_header(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(String::from))
        .unwrap_or_else(|| "localhost".to_string())
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Print push events until Ctrl-C.
pub async fn listen() -> Result<()> {
    let config = Config::load()?;
    let push = PushConfig::from_config(&config);
    println!("Listening on {} (Ctrl-C to stop)", push.url);

    let listener = PushListener::spawn(push);
    let mut events = listener.subscribe();
    let mut state = listener.connection_state();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => println!("[MSG] New message in conversation {}", event.chat_id),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("Missed {} push events", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let now = *state.borrow();
                println!("Push channel {}", now);
            }
            _ = tokio::signal::ctrl_c() => {
                println!("Shutting down...");
                break;
            }
        }
    }

    listener.shutdown().await;
    Ok(())
}

/// Announce a new message in `chat_id` over the push channel.
pub async fn announce(chat_id: &str) -> Result<()> {
    let config = Config::load()?;
    let listener = PushListener::spawn(PushConfig::from_config(&config));
    let mut state = listener.connection_state();

    let connected = time::timeout(
        Duration::from_secs(10),
        state.wait_for(|s| *s == ConnectionState::Connected),
    )
    .await
    .map(|r| r.is_ok())
    .unwrap_or(false);

    let result = if connected {
        listener
            .publish_send(chat_id)
            .await
            .context("Failed to publish")
    } else {
        Err(PushError::NotConnected).context("Push channel did not connect")
    };

    listener.shutdown().await;
    result?;
    println!("Announced new message in conversation {}.", chat_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{SinkExt, StreamExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::WebSocketStream;

    type ServerWs = WebSocketStream<TcpStream>;

    async fn next_frame(ws: &mut ServerWs) -> Option<Frame> {
        while let Some(msg) = ws.next().await {
            if let Ok(Message::Text(text)) = msg {
                if let Ok(Some(frame)) = Frame::decode(&text) {
                    return Some(frame);
                }
            }
        }
        None
    }

    async fn send(ws: &mut ServerWs, frame: Frame) {
        ws.send(Message::Text(frame.encode())).await.unwrap();
    }

    /// Accept one client and complete the STOMP handshake.
    async fn accept(listener: &TcpListener) -> ServerWs {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
        let connect = next_frame(&mut ws).await.unwrap();
        assert_eq!(connect.command, Command::Connect);
        send(
            &mut ws,
            Frame::new(Command::Connected)
                .with_header("version", "1.2")
                .with_header("heart-beat", "0,0"),
        )
        .await;
        ws
    }

    fn config_for(addr: std::net::SocketAddr) -> PushConfig {
        PushConfig {
            url: format!("ws://{}/t2r-websocket/websocket", addr),
            token: Some("tok".to_string()),
            reconnect_delay: Duration::from_millis(50),
        }
    }

    #[test]
    fn test_push_event_payloads() {
        assert_eq!(PushEvent::from_body("\"42\"").unwrap().chat_id, "42");
        assert_eq!(PushEvent::from_body("42").unwrap().chat_id, "42");
        assert_eq!(PushEvent::from_body(r#"{"id":"1"}"#).unwrap().chat_id, "1");
        assert_eq!(PushEvent::from_body(r#"{"chatId":7}"#).unwrap().chat_id, "7");
        assert!(PushEvent::from_body(r#"{"other":1}"#).is_none());
        assert!(PushEvent::from_body("\"\"").is_none());
        assert!(PushEvent::from_body("not json").is_none());
    }

    #[test]
    fn test_heartbeat_negotiation() {
        assert_eq!(heartbeat_interval(10_000, Some("0,0")), None);
        assert_eq!(heartbeat_interval(10_000, None), None);
        assert_eq!(
            heartbeat_interval(10_000, Some("10000,20000")),
            Some(Duration::from_secs(20))
        );
        assert_eq!(heartbeat_interval(0, Some("0,5000")), None);
    }

    #[test]
    fn test_host_header() {
        assert_eq!(host_header("ws://localhost:8080/t2r-websocket/websocket"), "localhost");
        assert_eq!(host_header("wss://chat.example.org/ws"), "chat.example.org");
        assert_eq!(host_header("nonsense"), "localhost");
    }

    #[tokio::test]
    async fn test_publish_requires_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let push = PushListener::spawn(config_for(addr));
        assert!(matches!(
            push.publish_send("1").await,
            Err(PushError::NotConnected)
        ));
        push.shutdown().await;
    }

    #[tokio::test]
    async fn test_events_fan_out_and_shutdown_disconnects() {
        let server = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap();

        let broker = tokio::spawn(async move {
            let mut ws = accept(&server).await;
            let sub = next_frame(&mut ws).await.unwrap();
            assert_eq!(sub.command, Command::Subscribe);
            assert_eq!(sub.header("destination"), Some(MESSAGES_TOPIC));
            send(
                &mut ws,
                Frame::new(Command::Message)
                    .with_header("destination", MESSAGES_TOPIC)
                    .with_body("\"42\""),
            )
            .await;

            let mut seen = Vec::new();
            while let Some(frame) = next_frame(&mut ws).await {
                let done = frame.command == Command::Disconnect;
                seen.push(frame);
                if done {
                    break;
                }
            }
            seen
        });

        let push = PushListener::spawn(config_for(addr));
        let mut first = push.subscribe();
        let mut second = push.subscribe();

        let event = time::timeout(Duration::from_secs(5), first.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.chat_id, "42");
        assert_eq!(second.recv().await.unwrap().chat_id, "42");

        let mut state = push.connection_state();
        state
            .wait_for(|s| *s == ConnectionState::Connected)
            .await
            .unwrap();
        push.publish_send("9").await.unwrap();

        push.shutdown().await;
        assert_eq!(*state.borrow(), ConnectionState::Disconnected);

        let seen = time::timeout(Duration::from_secs(5), broker)
            .await
            .unwrap()
            .unwrap();
        let sent = seen
            .iter()
            .find(|f| f.command == Command::Send)
            .expect("SEND frame");
        assert_eq!(sent.header("destination"), Some(SEND_DESTINATION));
        assert_eq!(sent.body, r#"{"chatId":"9"}"#);
        assert_eq!(seen.last().map(|f| f.command), Some(Command::Disconnect));
    }

    #[tokio::test]
    async fn test_reconnects_after_server_close() {
        let server = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap();

        tokio::spawn(async move {
            let mut ws = accept(&server).await;
            next_frame(&mut ws).await;
            ws.close(None).await.ok();

            let mut ws = accept(&server).await;
            next_frame(&mut ws).await;
            send(
                &mut ws,
                Frame::new(Command::Message)
                    .with_header("destination", MESSAGES_TOPIC)
                    .with_body(r#"{"id":"5"}"#),
            )
            .await;
            while next_frame(&mut ws).await.is_some() {}
        });

        let push = PushListener::spawn(config_for(addr));
        let mut events = push.subscribe();
        let event = time::timeout(Duration::from_secs(5), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.chat_id, "5");
        push.shutdown().await;
    }
}
