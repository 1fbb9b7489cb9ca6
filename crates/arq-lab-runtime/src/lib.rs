//! Runs a protocol pair as two tokio tasks, one mailbox each.
//!
//! Every entity owns its protocol instance and handles one event at a time,
//! so handlers never observe concurrent mutation. Timers and channel delay
//! are real `tokio::time` sleeps.

mod actor;
mod link;

pub use link::{LinkHandle, spawn_link};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("link is closed")]
    Closed,
    #[error("entity task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
