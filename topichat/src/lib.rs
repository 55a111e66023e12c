//! `topichat` — chat client over a topic pub/sub broker.

pub mod broker;
pub mod capture;
pub mod compose;
pub mod config;
pub mod identity;
pub mod log;
pub mod record;
pub mod session;
