use std::sync::Arc;

use super::command::{CommandSpec, PendingCommand, PendingReply};
use crate::cluster::registry::ShardRegistry;
use crate::cluster::types::ShardId;
use crate::error::GatewayError;

/// Issues asynchronous commands against shard connections.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<ShardRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ShardRegistry>) -> Dispatcher {
        Dispatcher { registry }
    }

    pub fn registry(&self) -> &Arc<ShardRegistry> {
        &self.registry
    }

    /// Hands a command to the shard's connection task.
    ///
    /// Fails fast with `ShardUnavailable` when the shard is not connected or
    /// its queue is full; nothing is queued and no retry is attempted here.
    /// On success the returned `PendingReply` resolves exactly once with the
    /// command's outcome.
    pub fn dispatch(
        &self,
        shard: ShardId,
        spec: CommandSpec,
    ) -> Result<PendingReply, GatewayError> {
        let slot = self.registry.slot(shard);

        if !slot.state().is_available() {
            tracing::debug!("[shard {}] dispatch refused: {}", shard, slot.state().as_str());
            return Err(GatewayError::ShardUnavailable);
        }

        let (command, reply) = PendingCommand::new(spec, slot.gauge());
        if let Err(refused) = slot.sender().try_send(command) {
            // Backpressure reads the same as an unhealthy shard. Dropping the
            // refused command releases its gauge slot.
            tracing::warn!("[shard {}] command queue full, refusing dispatch", shard);
            drop(refused);
            return Err(GatewayError::ShardUnavailable);
        }

        Ok(reply)
    }
}
