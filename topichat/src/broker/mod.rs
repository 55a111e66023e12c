//! Broker connection abstraction for `topichat`.
//!
//! Defines the [`BrokerConnection`] trait that all broker client
//! implementations must satisfy. Concrete implementations include:
//! - [`loopback::LoopbackBroker`] — in-process hub-based broker for testing
//! - [`ws::WsBroker`] — WebSocket connection to a running `topichat-broker`

pub mod loopback;
pub mod ws;

use std::time::Duration;

/// A payload delivered by the broker for a matching subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Full topic the payload was published on.
    pub topic: String,
    /// Raw published bytes.
    pub payload: Vec<u8>,
}

/// Options controlling how a broker connection is established.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Client identifier presented to the broker. Reconnecting with the
    /// same id resumes any stored subscription state.
    pub client_id: String,
    /// When true, the broker discards any subscription state stored for
    /// this client id before the session starts.
    pub clean_session: bool,
    /// How long to wait for the connection and handshake to complete.
    pub connect_timeout: Duration,
}

impl ConnectOptions {
    /// Creates options for a fresh session with a 10 second timeout.
    pub fn clean(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            clean_session: true,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Errors that can occur during broker operations.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// Failed to establish the connection.
    #[error("broker connection failed: {0}")]
    ConnectionFailed(String),

    /// The connection to the broker has been closed.
    #[error("broker connection closed")]
    ConnectionClosed,

    /// The operation timed out before completing.
    #[error("broker operation timed out")]
    Timeout,

    /// The broker rejected a request.
    #[error("broker rejected request: {0}")]
    Rejected(String),

    /// An underlying I/O error occurred.
    #[error("broker I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Async pub/sub broker client trait.
///
/// Implementations carry opaque byte payloads between topics. The broker
/// layer never inspects payload contents — classification and rendering
/// happen at higher layers.
///
/// # Invariant
///
/// A subscription whose pattern matches the client's own publish topic
/// delivers the client's own messages back through [`BrokerConnection::recv`].
/// Suppressing that echo is the caller's responsibility.
pub trait BrokerConnection: Send + Sync {
    /// Register a subscription pattern with the broker.
    ///
    /// Returns once the broker has acknowledged the subscription. All
    /// payloads subsequently published to matching topics are delivered
    /// through [`BrokerConnection::recv`].
    fn subscribe(
        &self,
        pattern: &str,
    ) -> impl std::future::Future<Output = Result<(), BrokerError>> + Send;

    /// Publish a payload to the given topic.
    ///
    /// Returns `Ok(())` when the payload has been handed off to the
    /// broker. This does NOT guarantee delivery to any subscriber.
    fn publish(
        &self,
        topic: &str,
        payload: &[u8],
    ) -> impl std::future::Future<Output = Result<(), BrokerError>> + Send;

    /// Receive the next delivery for any of this client's subscriptions.
    ///
    /// Blocks asynchronously until a payload arrives or the connection
    /// closes.
    fn recv(&self) -> impl std::future::Future<Output = Result<Delivery, BrokerError>> + Send;

    /// Check whether this connection is currently usable.
    fn is_connected(&self) -> bool;

    /// Close the connection. Safe to call more than once.
    fn disconnect(&self) -> impl std::future::Future<Output = ()> + Send;
}
