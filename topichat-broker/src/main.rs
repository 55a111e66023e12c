//! `topichat` broker -- lightweight topic pub/sub broker.
//!
//! An axum WebSocket server that routes published payloads between
//! `topichat` clients by topic pattern. The broker never interprets
//! payloads -- it only fans opaque bytes out to matching subscribers.
//!
//! # Usage
//!
//! ```bash
//! # Run on default address 0.0.0.0:8000
//! cargo run --bin topichat-broker
//!
//! # Run on custom address
//! cargo run --bin topichat-broker -- --bind 127.0.0.1:8080
//!
//! # Or via environment variable
//! TOPICHAT_BROKER_ADDR=127.0.0.1:8080 cargo run --bin topichat-broker
//! ```

use std::sync::Arc;

use clap::Parser;
use topichat_broker::broker::{self, BrokerState};
use topichat_broker::config::{BrokerCliArgs, BrokerConfig};

#[tokio::main]
async fn main() {
    let cli = BrokerCliArgs::parse();

    // Load config from CLI args + config file + env vars + defaults.
    let config = match BrokerConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    // Initialize tracing with the resolved log level.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::info!(addr = %config.bind_addr, "starting topichat broker");

    let state = Arc::new(BrokerState::with_config(config.max_payload_size));

    match broker::start_server_with_state(config.bind_addr, state).await {
        Ok((bound_addr, handle)) => {
            tracing::info!(addr = %bound_addr, "broker listening");
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "broker server task failed");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to start broker");
            std::process::exit(1);
        }
    }
}
