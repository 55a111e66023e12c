//! Shared protocol definitions for the `TopiChat` wire format.

pub mod frame;
pub mod identity;
pub mod payload;
pub mod topic;
