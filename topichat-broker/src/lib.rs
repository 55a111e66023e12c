//! `topichat` broker library.
//!
//! Exposes the broker server for use in tests and embedding.
//! The broker accepts WebSocket connections, registers sessions by
//! client id, and routes published payloads to matching subscribers.

pub mod broker;
pub mod config;
