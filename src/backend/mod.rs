//! Backing-Store Seam
//!
//! The gateway issues logical commands and receives typed replies; the exact wire
//! protocol lives behind these traits. `redis` provides the production
//! implementation, tests script their own.

pub mod redis;

#[cfg(test)]
pub(crate) mod mock;

use async_trait::async_trait;
use thiserror::Error;

use crate::cluster::types::ShardEndpoint;
use crate::dispatch::command::{CommandSpec, ReplyValue};

/// How a backend call failed, from the connection's point of view.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The backend rejected the command but the connection is still usable.
    #[error("backend protocol error: {0}")]
    Protocol(String),

    /// The connection is dead; everything outstanding against it is lost.
    #[error("connection lost: {0}")]
    Io(String),
}

/// Establishes connections to shards. One connector serves the whole process.
#[async_trait]
pub trait ShardConnector: Send + Sync {
    async fn connect(&self, endpoint: &ShardEndpoint) -> Result<Box<dyn ShardChannel>, ChannelError>;
}

/// One live connection to one shard, exclusively owned by its connection task.
#[async_trait]
pub trait ShardChannel: Send {
    async fn execute(&mut self, spec: &CommandSpec) -> Result<ReplyValue, ChannelError>;
}
