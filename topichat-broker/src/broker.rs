//! Broker core: shared state, WebSocket handler, session registry, and
//! topic-pattern routing.
//!
//! The broker accepts WebSocket connections, registers sessions by client
//! id, records their subscription patterns, and fans published payloads out
//! to every session with a matching pattern — the publisher included. It
//! never interprets payloads; routing uses the topic alone.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{RwLock, mpsc};
use topichat_proto::frame::{self, BrokerFrame};
use topichat_proto::topic::pattern_matches;

/// Default maximum allowed publish payload size in bytes (256 KB; data-URI
/// encoded media runs well past plain-text sizes).
pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = 256 * 1024;

/// One live connection in the registry.
struct Session {
    /// Token distinguishing this connection from a replacement under the
    /// same client id.
    conn: u64,
    /// Channel sender feeding the connection's WebSocket writer task.
    sender: mpsc::UnboundedSender<Message>,
}

/// Shared broker state holding the session registry and subscription table.
pub struct BrokerState {
    /// Live connections by client id.
    sessions: RwLock<HashMap<String, Session>>,
    /// Subscription patterns per client id. Entries outlive the connection
    /// unless the client connects with `clean_session`.
    subscriptions: RwLock<HashMap<String, Vec<String>>>,
    /// Maximum allowed publish payload size in bytes.
    max_payload_size: usize,
    /// Source of connection tokens.
    next_conn: AtomicU64,
}

impl Default for BrokerState {
    fn default() -> Self {
        Self::new()
    }
}

impl BrokerState {
    /// Creates broker state with empty registries and the default payload
    /// size limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(DEFAULT_MAX_PAYLOAD_SIZE)
    }

    /// Creates broker state with a custom payload size limit.
    #[must_use]
    pub fn with_config(max_payload_size: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            subscriptions: RwLock::new(HashMap::new()),
            max_payload_size,
            next_conn: AtomicU64::new(0),
        }
    }

    /// Registers a connection, storing the sender half of its message
    /// channel, and returns its connection token.
    ///
    /// If the client id was already connected the old entry is replaced,
    /// which closes the previous connection's writer channel. The second
    /// element reports whether a replacement happened.
    pub async fn register(
        &self,
        client_id: &str,
        sender: mpsc::UnboundedSender<Message>,
    ) -> (u64, bool) {
        let conn = self.next_conn.fetch_add(1, Ordering::Relaxed);
        let mut sessions = self.sessions.write().await;
        let replaced = sessions
            .insert(client_id.to_string(), Session { conn, sender })
            .is_some();
        (conn, replaced)
    }

    /// Removes a connection only if `conn` is still the registered one.
    ///
    /// A duplicate `Connect` replaces the registry entry; the replaced
    /// connection's teardown must not tear down its successor. Returns
    /// whether the entry was removed.
    pub async fn unregister(&self, client_id: &str, conn: u64) -> bool {
        let mut sessions = self.sessions.write().await;
        if sessions.get(client_id).is_some_and(|s| s.conn == conn) {
            sessions.remove(client_id);
            true
        } else {
            false
        }
    }

    /// Drops any stored subscription patterns for a client id.
    pub async fn clear_subscriptions(&self, client_id: &str) -> bool {
        let mut subs = self.subscriptions.write().await;
        subs.remove(client_id).is_some()
    }

    /// Records a subscription pattern for a client id (no duplicates).
    pub async fn add_subscription(&self, client_id: &str, pattern: &str) {
        let mut subs = self.subscriptions.write().await;
        let patterns = subs.entry(client_id.to_string()).or_default();
        if !patterns.iter().any(|p| p == pattern) {
            patterns.push(pattern.to_string());
        }
    }

    /// Returns whether stored subscription state exists for a client id.
    pub async fn has_session_state(&self, client_id: &str) -> bool {
        let subs = self.subscriptions.read().await;
        subs.get(client_id).is_some_and(|p| !p.is_empty())
    }

    /// Fans a published payload out to every connected session with a
    /// matching subscription pattern, the publisher included.
    ///
    /// Returns the number of sessions the payload was delivered to.
    pub async fn route_publish(&self, topic: &str, payload: &[u8]) -> usize {
        let Ok(bytes) = frame::encode(&BrokerFrame::Publish {
            topic: topic.to_string(),
            payload: payload.to_vec(),
        }) else {
            tracing::error!(topic = %topic, "failed to encode publish frame for routing");
            return 0;
        };

        let subs = self.subscriptions.read().await;
        let sessions = self.sessions.read().await;
        let mut delivered = 0;
        for (client_id, patterns) in subs.iter() {
            if !patterns.iter().any(|p| pattern_matches(p, topic)) {
                continue;
            }
            if let Some(session) = sessions.get(client_id) {
                if session
                    .sender
                    .send(Message::Binary(bytes.clone().into()))
                    .is_ok()
                {
                    delivered += 1;
                } else {
                    tracing::warn!(client_id = %client_id, "delivery channel closed, skipping");
                }
            }
        }
        delivered
    }
}

/// Handles an upgraded WebSocket connection for a single session.
///
/// Connection lifecycle:
/// 1. Wait for a `Connect` frame (first frame on the socket).
/// 2. Apply `clean_session`, register the session, send `ConnAck`.
/// 3. Enter the frame loop: `Subscribe` and `Publish` requests.
/// 4. On disconnect, unregister; subscription state survives unless the
///    connection was opened with `clean_session`.
pub async fn handle_socket(socket: WebSocket, state: Arc<BrokerState>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let Some((client_id, clean_session)) = wait_for_connect(&mut ws_receiver).await else {
        tracing::warn!("connection closed before Connect");
        return;
    };

    tracing::info!(client_id = %client_id, clean_session, "session connecting");

    if clean_session {
        state.clear_subscriptions(&client_id).await;
    }
    let session_present = state.has_session_state(&client_id).await;

    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let (conn, replaced) = state.register(&client_id, tx).await;
    if replaced {
        tracing::info!(client_id = %client_id, "replaced existing connection (duplicate connect)");
    }

    let ack = BrokerFrame::ConnAck { session_present };
    if let Err(e) = send_frame(&mut ws_sender, &ack).await {
        tracing::error!(client_id = %client_id, error = %e, "failed to send ConnAck");
        state.unregister(&client_id, conn).await;
        return;
    }

    tracing::info!(client_id = %client_id, session_present, "session connected");

    // Writer task: forward routed frames from the channel to the WebSocket.
    let writer_client_id = client_id.clone();
    let mut write_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_sender.send(msg).await.is_err() {
                tracing::warn!(client_id = %writer_client_id, "WebSocket write failed");
                break;
            }
        }
    });

    // Reader task: process frames from this session.
    let reader_client_id = client_id.clone();
    let reader_state = Arc::clone(&state);
    let mut read_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            match msg {
                Message::Binary(data) => {
                    handle_frame(&reader_client_id, &data, &reader_state).await;
                }
                Message::Close(_) => {
                    tracing::info!(client_id = %reader_client_id, "received close frame");
                    break;
                }
                _ => {
                    // Ignore text, ping, pong frames.
                }
            }
        }
    });

    tokio::select! {
        _ = &mut read_task => {
            write_task.abort();
        }
        _ = &mut write_task => {
            read_task.abort();
        }
    }

    // A replaced connection must leave its successor's registration alone.
    if state.unregister(&client_id, conn).await && clean_session {
        state.clear_subscriptions(&client_id).await;
    }
    tracing::info!(client_id = %client_id, "session disconnected");
}

/// Waits for the first frame on the WebSocket, expecting `Connect`.
///
/// Returns the client id and clean-session flag, or `None` if the
/// connection closes or an invalid frame arrives first.
async fn wait_for_connect(
    receiver: &mut (impl StreamExt<Item = Result<Message, axum::Error>> + Unpin),
) -> Option<(String, bool)> {
    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Binary(data) => match frame::decode(&data) {
                Ok(BrokerFrame::Connect {
                    client_id,
                    clean_session,
                }) => {
                    if client_id.is_empty() {
                        tracing::warn!("received Connect with empty client_id");
                        return None;
                    }
                    return Some((client_id, clean_session));
                }
                Ok(other) => {
                    tracing::warn!(frame = ?other, "expected Connect, got different frame");
                    return None;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to decode Connect frame");
                    return None;
                }
            },
            Message::Close(_) => return None,
            _ => {
                // Skip non-binary frames during the handshake.
            }
        }
    }
    None
}

/// Handles one binary frame from a connected session.
async fn handle_frame(client_id: &str, data: &[u8], state: &Arc<BrokerState>) {
    let frame = match frame::decode(data) {
        Ok(f) => f,
        Err(e) => {
            tracing::warn!(client_id = %client_id, error = %e, "failed to decode frame");
            return;
        }
    };

    match frame {
        BrokerFrame::Subscribe { pattern } => {
            state.add_subscription(client_id, &pattern).await;
            tracing::debug!(client_id = %client_id, pattern = %pattern, "subscription added");
            send_to_session(state, client_id, &BrokerFrame::SubAck { pattern }).await;
        }
        BrokerFrame::Publish { topic, payload } => {
            if payload.len() > state.max_payload_size {
                tracing::warn!(
                    client_id = %client_id,
                    size = payload.len(),
                    max = state.max_payload_size,
                    "publish payload exceeds size limit"
                );
                let err = BrokerFrame::Error {
                    reason: format!(
                        "payload too large: {} bytes (max {})",
                        payload.len(),
                        state.max_payload_size
                    ),
                };
                send_to_session(state, client_id, &err).await;
                return;
            }

            let delivered = state.route_publish(&topic, &payload).await;
            tracing::debug!(
                client_id = %client_id,
                topic = %topic,
                payload_len = payload.len(),
                delivered,
                "publish routed"
            );
        }
        BrokerFrame::Connect { client_id: new_id, .. } => {
            tracing::warn!(
                client_id = %client_id,
                new_id = %new_id,
                "received duplicate Connect on established session"
            );
        }
        other => {
            tracing::warn!(client_id = %client_id, frame = ?other, "unexpected frame from client");
        }
    }
}

/// Sends a frame to a registered session via its writer channel.
async fn send_to_session(state: &Arc<BrokerState>, client_id: &str, frame_msg: &BrokerFrame) {
    let sessions = state.sessions.read().await;
    if let Some(session) = sessions.get(client_id)
        && let Ok(bytes) = frame::encode(frame_msg)
    {
        let _ = session.sender.send(Message::Binary(bytes.into()));
    }
}

/// Encodes and sends a frame directly on a WebSocket sender.
async fn send_frame(
    ws_sender: &mut (impl SinkExt<Message, Error = axum::Error> + Unpin),
    frame_msg: &BrokerFrame,
) -> Result<(), String> {
    let bytes = frame::encode(frame_msg).map_err(|e| e.to_string())?;
    ws_sender
        .send(Message::Binary(bytes.into()))
        .await
        .map_err(|e| format!("WebSocket send error: {e}"))
}

/// Starts the broker on the given address and returns the bound address and
/// a join handle.
///
/// This is the primary entry point used by both `main.rs` and test code.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server(
    addr: impl tokio::net::ToSocketAddrs,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    start_server_with_state(addr, Arc::new(BrokerState::new())).await
}

/// Starts the broker with a pre-configured [`BrokerState`].
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server_with_state(
    addr: impl tokio::net::ToSocketAddrs,
    state: Arc<BrokerState>,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let app = axum::Router::new()
        .route("/ws", axum::routing::get(ws_handler))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "broker server error");
        }
    });

    Ok((bound_addr, handle))
}

/// axum handler that upgrades an HTTP request to a WebSocket connection.
async fn ws_handler(
    ws: axum::extract::ws::WebSocketUpgrade,
    axum::extract::State(state): axum::extract::State<Arc<BrokerState>>,
) -> impl axum::response::IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}
