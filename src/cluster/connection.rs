use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use super::registry::ShardSlot;
use super::types::ConnectionState;
use crate::backend::{ChannelError, ShardChannel, ShardConnector};
use crate::dispatch::command::{CommandOutcome, PendingCommand};

const INITIAL_RECONNECT_DELAY: Duration = Duration::from_millis(150);
const MAX_RECONNECT_DELAY: Duration = Duration::from_millis(1200);

enum ServeEnd {
    /// The connection died under us; reconnect.
    ConnectionLost,
    /// Every sender is gone, the process is shutting down.
    ChannelClosed,
}

/// Drives one shard connection for the life of the process.
///
/// The channel handle never leaves this task. State transitions are published
/// through the slot so the router can gate dispatches; on any loss of a live
/// connection, everything queued against the shard is resolved as unavailable
/// so no aggregation is left hanging.
pub(crate) async fn run(
    slot: Arc<ShardSlot>,
    connector: Arc<dyn ShardConnector>,
    mut commands: mpsc::Receiver<PendingCommand>,
) {
    let mut delay = INITIAL_RECONNECT_DELAY;

    loop {
        slot.set_state(ConnectionState::Connecting);

        match connector.connect(&slot.endpoint).await {
            Ok(mut channel) => {
                tracing::info!(
                    "[shard {}] connected to {}:{}",
                    slot.endpoint.id,
                    slot.endpoint.address,
                    slot.endpoint.port
                );
                slot.set_state(ConnectionState::Connected);
                delay = INITIAL_RECONNECT_DELAY;

                match serve(&slot, channel.as_mut(), &mut commands).await {
                    ServeEnd::ConnectionLost => {
                        slot.set_state(ConnectionState::Disconnected);
                    }
                    ServeEnd::ChannelClosed => {
                        slot.set_state(ConnectionState::Disconnected);
                        return;
                    }
                }
            }
            Err(e) => {
                tracing::warn!(
                    "[shard {}] could not connect to {}:{}: {}",
                    slot.endpoint.id,
                    slot.endpoint.address,
                    slot.endpoint.port,
                    e
                );
                slot.set_state(ConnectionState::Disconnected);
            }
        }

        fail_queued(&slot, &mut commands);

        let jitter = Duration::from_millis(rand::random::<u64>() % 50);
        tokio::time::sleep(delay + jitter).await;
        delay = (delay * 2).min(MAX_RECONNECT_DELAY);
    }
}

/// Executes commands against a live channel until it breaks or the process
/// stops handing us work.
async fn serve(
    slot: &ShardSlot,
    channel: &mut dyn ShardChannel,
    commands: &mut mpsc::Receiver<PendingCommand>,
) -> ServeEnd {
    while let Some(pending) = commands.recv().await {
        match channel.execute(pending.spec()).await {
            Ok(reply) => pending.resolve(CommandOutcome::Reply(reply)),
            Err(ChannelError::Protocol(detail)) => {
                // The connection itself is still usable.
                tracing::debug!("[shard {}] backend error: {}", slot.endpoint.id, detail);
                pending.resolve(CommandOutcome::Backend(detail));
            }
            Err(ChannelError::Io(detail)) => {
                tracing::warn!("[shard {}] connection lost: {}", slot.endpoint.id, detail);
                pending.resolve(CommandOutcome::Unavailable);
                return ServeEnd::ConnectionLost;
            }
        }
    }

    ServeEnd::ChannelClosed
}

/// Resolves every command still queued against a dead shard.
fn fail_queued(slot: &ShardSlot, commands: &mut mpsc::Receiver<PendingCommand>) {
    let mut failed = 0usize;
    while let Ok(pending) = commands.try_recv() {
        pending.resolve(CommandOutcome::Unavailable);
        failed += 1;
    }
    if failed > 0 {
        tracing::warn!(
            "[shard {}] resolved {} queued commands as unavailable",
            slot.endpoint.id,
            failed
        );
    }
}
