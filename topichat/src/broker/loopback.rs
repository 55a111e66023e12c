//! Loopback broker for testing.
//!
//! A [`LoopbackHub`] routes publishes between in-process endpoints using
//! the same topic-pattern matching a real broker applies. Endpoints are
//! created via [`LoopbackHub::connect`] — a publish is delivered to every
//! endpoint with a matching subscription, the publisher included, which
//! makes self-echo behavior observable without a network.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::{Mutex, mpsc};
use topichat_proto::topic::pattern_matches;

use super::{BrokerConnection, BrokerError, Delivery};

/// Per-endpoint routing state held by the hub.
struct EndpointState {
    patterns: Vec<String>,
    sender: mpsc::UnboundedSender<Delivery>,
}

/// In-process pub/sub hub shared by a set of [`LoopbackBroker`] endpoints.
#[derive(Clone, Default)]
pub struct LoopbackHub {
    endpoints: Arc<std::sync::Mutex<HashMap<u64, EndpointState>>>,
    next_id: Arc<AtomicU64>,
}

impl LoopbackHub {
    /// Creates an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new endpoint and returns its broker handle.
    #[must_use]
    pub fn connect(&self) -> LoopbackBroker {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut endpoints) = self.endpoints.lock() {
            endpoints.insert(
                id,
                EndpointState {
                    patterns: Vec::new(),
                    sender: tx,
                },
            );
        }
        LoopbackBroker {
            hub: self.clone(),
            id,
            rx: Mutex::new(rx),
            connected: AtomicBool::new(true),
        }
    }

    /// Delivers a payload to every endpoint with a matching pattern.
    fn route(&self, topic: &str, payload: &[u8]) {
        let Ok(endpoints) = self.endpoints.lock() else {
            return;
        };
        for state in endpoints.values() {
            if state.patterns.iter().any(|p| pattern_matches(p, topic)) {
                let _ = state.sender.send(Delivery {
                    topic: topic.to_string(),
                    payload: payload.to_vec(),
                });
            }
        }
    }
}

/// One endpoint of a [`LoopbackHub`].
pub struct LoopbackBroker {
    hub: LoopbackHub,
    id: u64,
    rx: Mutex<mpsc::UnboundedReceiver<Delivery>>,
    connected: AtomicBool,
}

impl BrokerConnection for LoopbackBroker {
    async fn subscribe(&self, pattern: &str) -> Result<(), BrokerError> {
        if !self.is_connected() {
            return Err(BrokerError::ConnectionClosed);
        }
        let Ok(mut endpoints) = self.hub.endpoints.lock() else {
            return Err(BrokerError::ConnectionClosed);
        };
        let Some(state) = endpoints.get_mut(&self.id) else {
            return Err(BrokerError::ConnectionClosed);
        };
        if !state.patterns.iter().any(|p| p == pattern) {
            state.patterns.push(pattern.to_string());
        }
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), BrokerError> {
        if !self.is_connected() {
            return Err(BrokerError::ConnectionClosed);
        }
        self.hub.route(topic, payload);
        Ok(())
    }

    async fn recv(&self) -> Result<Delivery, BrokerError> {
        let mut rx = self.rx.lock().await;
        rx.recv().await.ok_or(BrokerError::ConnectionClosed)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn disconnect(&self) {
        if self.connected.swap(false, Ordering::SeqCst)
            && let Ok(mut endpoints) = self.hub.endpoints.lock()
        {
            endpoints.remove(&self.id);
        }
    }
}
