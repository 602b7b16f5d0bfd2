use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use tokio::sync::mpsc;

use super::connection;
use super::types::{ConnectionState, ShardEndpoint, ShardId};
use crate::backend::ShardConnector;
use crate::dispatch::command::PendingCommand;

/// Commands queued per shard before backpressure kicks in. A full queue is
/// treated the same as an unavailable shard.
const COMMAND_QUEUE_DEPTH: usize = 1024;

/// Live state of one configured shard: identity, published connection state,
/// the in-flight command gauge, and the hand-off channel into the connection
/// task that exclusively owns the socket.
pub struct ShardSlot {
    pub endpoint: ShardEndpoint,
    state: AtomicU8,
    in_flight: Arc<AtomicUsize>,
    sender: mpsc::Sender<PendingCommand>,
}

impl ShardSlot {
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn set_state(&self, state: ConnectionState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    /// Number of commands dispatched to this shard and not yet resolved.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    pub(crate) fn gauge(&self) -> Arc<AtomicUsize> {
        self.in_flight.clone()
    }

    pub(crate) fn sender(&self) -> &mpsc::Sender<PendingCommand> {
        &self.sender
    }
}

/// Static registry of shard identities and their live connection state.
///
/// Built once from the parsed `--shard-hosts` list; the ordered shard list
/// never changes afterwards, which is what keeps `resolve` stable.
pub struct ShardRegistry {
    shards: Vec<Arc<ShardSlot>>,
}

impl ShardRegistry {
    /// Builds the registry and spawns one connection task per shard.
    pub fn start(
        endpoints: Vec<ShardEndpoint>,
        connector: Arc<dyn ShardConnector>,
    ) -> Arc<ShardRegistry> {
        let (registry, receivers) = ShardRegistry::with_channels(endpoints);

        for (slot, commands) in registry.shards.iter().zip(receivers) {
            tokio::spawn(connection::run(slot.clone(), connector.clone(), commands));
        }

        registry
    }

    /// Builds slots and their command channels without spawning connection
    /// tasks. The caller owns the receivers; `start` wires them up for real,
    /// tests drive them by hand.
    pub(crate) fn with_channels(
        endpoints: Vec<ShardEndpoint>,
    ) -> (Arc<ShardRegistry>, Vec<mpsc::Receiver<PendingCommand>>) {
        let mut shards = Vec::with_capacity(endpoints.len());
        let mut receivers = Vec::with_capacity(endpoints.len());

        for endpoint in endpoints {
            let (sender, receiver) = mpsc::channel(COMMAND_QUEUE_DEPTH);
            shards.push(Arc::new(ShardSlot {
                endpoint,
                state: AtomicU8::new(ConnectionState::Disconnected.as_u8()),
                in_flight: Arc::new(AtomicUsize::new(0)),
                sender,
            }));
            receivers.push(receiver);
        }

        (Arc::new(ShardRegistry { shards }), receivers)
    }

    /// Maps a distribution key to a shard index.
    ///
    /// CRC-32 (IEEE polynomial) of the key's UTF-8 bytes, reduced modulo the
    /// shard count. Never fails and ignores health; callers gate on state
    /// before dispatching.
    pub fn resolve(&self, key: &str) -> ShardId {
        let checksum = crc32fast::hash(key.as_bytes());
        ShardId(checksum as usize % self.shards.len())
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    pub fn slot(&self, id: ShardId) -> &Arc<ShardSlot> {
        &self.shards[id.0]
    }

    pub fn slots(&self) -> &[Arc<ShardSlot>] {
        &self.shards
    }
}
