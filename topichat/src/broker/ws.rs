//! WebSocket broker client.
//!
//! Implements the [`BrokerConnection`] trait over a WebSocket connection
//! to a running `topichat-broker`. Frames are postcard-encoded
//! [`BrokerFrame`] values carried as binary WebSocket messages.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use topichat_proto::frame::{self, BrokerFrame};

use super::{BrokerConnection, BrokerError, ConnectOptions, Delivery};

/// Type alias for the write half of a WebSocket connection.
type WsSender = futures_util::stream::SplitSink<
    WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
    Message,
>;

/// Type alias for the read half of a WebSocket connection.
type WsReader =
    futures_util::stream::SplitStream<WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>>;

/// Timeout for waiting for a `SubAck` after sending a `Subscribe`.
const SUBSCRIBE_TIMEOUT: Duration = Duration::from_secs(5);

/// WebSocket broker client implementing the [`BrokerConnection`] trait.
///
/// Created via [`WsBroker::connect`], which establishes the WebSocket
/// connection, performs the `Connect`/`ConnAck` handshake, and spawns a
/// background reader task that feeds deliveries into an internal channel.
pub struct WsBroker {
    /// Whether the broker resumed stored subscription state for this
    /// client id.
    session_present: bool,
    /// Write half of the WebSocket connection (shared for concurrent sends).
    ws_sender: Arc<Mutex<WsSender>>,
    /// Channel of deliveries pushed by the background reader task.
    incoming: Mutex<mpsc::Receiver<Delivery>>,
    /// Channel of acknowledged subscription patterns from the reader task.
    sub_acks: Mutex<mpsc::Receiver<String>>,
    /// Whether the WebSocket connection to the broker is active.
    connected: Arc<AtomicBool>,
    /// Handle to the background reader task.
    reader_handle: tokio::task::JoinHandle<()>,
}

impl WsBroker {
    /// Connect to a broker and establish a session.
    ///
    /// Performs the following steps:
    /// 1. Establishes a WebSocket connection to `broker_url`
    /// 2. Sends a `Connect` frame with the client id and clean-session flag
    /// 3. Waits for the `ConnAck`
    /// 4. Spawns a background task to read incoming frames
    ///
    /// All of steps 1-3 run under `options.connect_timeout`.
    ///
    /// # Errors
    ///
    /// - [`BrokerError::Timeout`] if the connection or handshake times out.
    /// - [`BrokerError::ConnectionFailed`] if the URL cannot be resolved or
    ///   connected, or the handshake fails.
    pub async fn connect(broker_url: &str, options: &ConnectOptions) -> Result<Self, BrokerError> {
        let handshake = Self::connect_inner(broker_url, options);
        tokio::time::timeout(options.connect_timeout, handshake)
            .await
            .map_err(|_| {
                tracing::warn!(url = broker_url, "broker connect timed out");
                BrokerError::Timeout
            })?
    }

    /// Connection and handshake without the outer timeout.
    async fn connect_inner(
        broker_url: &str,
        options: &ConnectOptions,
    ) -> Result<Self, BrokerError> {
        let (ws_stream, _response) = connect_async(broker_url).await.map_err(|e| {
            tracing::warn!(url = broker_url, err = %e, "broker WebSocket connect failed");
            BrokerError::ConnectionFailed(e.to_string())
        })?;

        let (mut ws_sender, mut ws_reader) = ws_stream.split();

        let connect = BrokerFrame::Connect {
            client_id: options.client_id.clone(),
            clean_session: options.clean_session,
        };
        let bytes =
            frame::encode(&connect).map_err(|e| BrokerError::ConnectionFailed(e.to_string()))?;
        ws_sender
            .send(Message::Binary(bytes.into()))
            .await
            .map_err(|e| {
                tracing::warn!(err = %e, "failed to send Connect frame");
                BrokerError::ConnectionFailed(format!("failed to send Connect: {e}"))
            })?;

        let session_present = wait_for_connack(&mut ws_reader).await?;
        tracing::info!(
            url = broker_url,
            client_id = %options.client_id,
            session_present,
            "connected to broker"
        );

        let (delivery_tx, delivery_rx) = mpsc::channel(256);
        let (suback_tx, suback_rx) = mpsc::channel(16);
        let connected = Arc::new(AtomicBool::new(true));
        let reader_connected = Arc::clone(&connected);

        let reader_handle =
            tokio::spawn(reader_loop(ws_reader, delivery_tx, suback_tx, reader_connected));

        Ok(Self {
            session_present,
            ws_sender: Arc::new(Mutex::new(ws_sender)),
            incoming: Mutex::new(delivery_rx),
            sub_acks: Mutex::new(suback_rx),
            connected,
            reader_handle,
        })
    }

    /// Whether the broker resumed stored subscription state at connect.
    #[must_use]
    pub fn session_present(&self) -> bool {
        self.session_present
    }

    /// Encode and send one frame on the shared WebSocket sender.
    async fn send_frame(&self, frame_msg: &BrokerFrame) -> Result<(), BrokerError> {
        if !self.connected.load(Ordering::Relaxed) {
            return Err(BrokerError::ConnectionClosed);
        }
        let bytes =
            frame::encode(frame_msg).map_err(|e| BrokerError::Io(std::io::Error::other(e)))?;
        let mut sender = self.ws_sender.lock().await;
        sender
            .send(Message::Binary(bytes.into()))
            .await
            .map_err(|e| {
                tracing::warn!(err = %e, "broker send failed");
                self.connected.store(false, Ordering::Relaxed);
                BrokerError::ConnectionClosed
            })
    }
}

impl BrokerConnection for WsBroker {
    /// Register a subscription pattern, waiting for the broker's `SubAck`.
    ///
    /// # Errors
    ///
    /// - [`BrokerError::ConnectionClosed`] if the connection is down.
    /// - [`BrokerError::Timeout`] if no acknowledgment arrives in time.
    async fn subscribe(&self, pattern: &str) -> Result<(), BrokerError> {
        self.send_frame(&BrokerFrame::Subscribe {
            pattern: pattern.to_string(),
        })
        .await?;

        let mut acks = self.sub_acks.lock().await;
        loop {
            let ack = tokio::time::timeout(SUBSCRIBE_TIMEOUT, acks.recv())
                .await
                .map_err(|_| {
                    tracing::warn!(pattern = %pattern, "subscribe acknowledgment timed out");
                    BrokerError::Timeout
                })?;
            match ack {
                Some(acked) if acked == pattern => return Ok(()),
                Some(other) => {
                    tracing::debug!(acked = %other, "ack for a different pattern, skipping");
                }
                None => return Err(BrokerError::ConnectionClosed),
            }
        }
    }

    /// Publish a payload as an opaque binary blob on the given topic.
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), BrokerError> {
        self.send_frame(&BrokerFrame::Publish {
            topic: topic.to_string(),
            payload: payload.to_vec(),
        })
        .await
    }

    /// Receive the next delivery from the background reader task.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::ConnectionClosed`] if the connection has been
    /// lost (the background reader task has exited).
    async fn recv(&self) -> Result<Delivery, BrokerError> {
        let mut rx = self.incoming.lock().await;
        rx.recv().await.ok_or(BrokerError::ConnectionClosed)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Close the connection and stop the reader task. Idempotent.
    async fn disconnect(&self) {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return;
        }
        let mut sender = self.ws_sender.lock().await;
        if let Err(e) = sender.send(Message::Close(None)).await {
            tracing::debug!(err = %e, "close frame send failed");
        }
        self.reader_handle.abort();
        tracing::info!("disconnected from broker");
    }
}

/// Wait for the `ConnAck` frame that answers our `Connect`.
async fn wait_for_connack(ws_reader: &mut WsReader) -> Result<bool, BrokerError> {
    while let Some(msg) = ws_reader.next().await {
        match msg {
            Ok(Message::Binary(data)) => match frame::decode(&data) {
                Ok(BrokerFrame::ConnAck { session_present }) => return Ok(session_present),
                Ok(BrokerFrame::Error { reason }) => {
                    tracing::warn!(reason = %reason, "broker rejected connect");
                    return Err(BrokerError::Rejected(reason));
                }
                Ok(other) => {
                    tracing::warn!(?other, "unexpected frame during handshake");
                    return Err(BrokerError::ConnectionFailed(
                        "unexpected frame during handshake".to_string(),
                    ));
                }
                Err(e) => {
                    tracing::warn!(err = %e, "malformed handshake frame");
                    return Err(BrokerError::ConnectionFailed(format!(
                        "malformed handshake frame: {e}"
                    )));
                }
            },
            Ok(Message::Close(_)) => return Err(BrokerError::ConnectionClosed),
            Ok(_) => {
                // Ignore ping/pong/text during the handshake.
            }
            Err(e) => {
                return Err(BrokerError::ConnectionFailed(format!(
                    "WebSocket error during handshake: {e}"
                )));
            }
        }
    }
    Err(BrokerError::ConnectionClosed)
}

/// Background task that reads WebSocket frames and dispatches them.
///
/// `Publish` frames become deliveries, `SubAck` frames feed the subscribe
/// waiters, `Error` frames are logged. Malformed frames are logged and
/// skipped — the task does not disconnect on bad data.
///
/// Sets `connected` to `false` when the WebSocket closes or errors out.
async fn reader_loop(
    mut ws_reader: WsReader,
    delivery_tx: mpsc::Sender<Delivery>,
    suback_tx: mpsc::Sender<String>,
    connected: Arc<AtomicBool>,
) {
    while let Some(msg_result) = ws_reader.next().await {
        match msg_result {
            Ok(Message::Binary(data)) => match frame::decode(&data) {
                Ok(BrokerFrame::Publish { topic, payload }) => {
                    if delivery_tx.send(Delivery { topic, payload }).await.is_err() {
                        // Receiver dropped, the client is gone.
                        break;
                    }
                }
                Ok(BrokerFrame::SubAck { pattern }) => {
                    if suback_tx.send(pattern).await.is_err() {
                        break;
                    }
                }
                Ok(BrokerFrame::Error { reason }) => {
                    tracing::warn!(reason = %reason, "broker reported error");
                }
                Ok(other) => {
                    tracing::debug!(?other, "unexpected frame from broker");
                }
                Err(e) => {
                    tracing::warn!(err = %e, "malformed broker frame, skipping");
                }
            },
            Ok(Message::Close(_)) => {
                tracing::info!("broker closed the WebSocket");
                break;
            }
            Ok(_) => {
                // Ignore ping/pong/text frames.
            }
            Err(e) => {
                tracing::warn!(err = %e, "broker WebSocket read error");
                break;
            }
        }
    }
    connected.store(false, Ordering::Relaxed);
    tracing::debug!("broker reader task exiting");
}
