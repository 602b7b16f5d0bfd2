//! Scripted backend for unit tests: programmable replies, connect refusal,
//! connection-loss injection, and a record of every executed command.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::{ChannelError, ShardChannel, ShardConnector};
use crate::cluster::types::{ShardEndpoint, ShardId};
use crate::dispatch::command::{CommandSpec, ReplyValue};

type Script = dyn Fn(ShardId, &CommandSpec) -> MockReply + Send + Sync;

/// What the scripted backend does with one command.
pub(crate) enum MockReply {
    Reply(ReplyValue),
    Protocol(String),
    /// Fail the command and drop the connection.
    Lost,
    /// Never answer; the caller's aggregation window has to expire.
    Hang,
}

pub(crate) struct MockConnector {
    refuse: Mutex<HashSet<usize>>,
    connects: AtomicUsize,
    executed: Arc<Mutex<Vec<(ShardId, CommandSpec)>>>,
    script: Arc<Mutex<Arc<Script>>>,
}

impl MockConnector {
    pub(crate) fn new() -> Arc<MockConnector> {
        Arc::new(MockConnector {
            refuse: Mutex::new(HashSet::new()),
            connects: AtomicUsize::new(0),
            executed: Arc::new(Mutex::new(Vec::new())),
            script: Arc::new(Mutex::new(Arc::new(|_, _| MockReply::Reply(ReplyValue::Nil)))),
        })
    }

    /// Replaces the reply script for subsequent commands.
    pub(crate) fn script(
        &self,
        script: impl Fn(ShardId, &CommandSpec) -> MockReply + Send + Sync + 'static,
    ) {
        *self.script.lock().unwrap() = Arc::new(script);
    }

    /// Makes connection attempts to the given shard fail until re-allowed.
    pub(crate) fn refuse_connects(&self, shard: ShardId) {
        self.refuse.lock().unwrap().insert(shard.0);
    }

    pub(crate) fn connect_attempts(&self) -> usize {
        self.connects.load(Ordering::Relaxed)
    }

    /// Every command executed so far, in execution order.
    pub(crate) fn executed(&self) -> Vec<(ShardId, CommandSpec)> {
        self.executed.lock().unwrap().clone()
    }

    pub(crate) fn executed_count(&self) -> usize {
        self.executed.lock().unwrap().len()
    }
}

#[async_trait]
impl ShardConnector for MockConnector {
    async fn connect(
        &self,
        endpoint: &ShardEndpoint,
    ) -> Result<Box<dyn ShardChannel>, ChannelError> {
        self.connects.fetch_add(1, Ordering::Relaxed);
        if self.refuse.lock().unwrap().contains(&endpoint.id.0) {
            return Err(ChannelError::Io("connection refused".to_string()));
        }

        Ok(Box::new(MockChannel {
            shard: endpoint.id,
            executed: Arc::clone(&self.executed),
            script: Arc::clone(&self.script),
        }))
    }
}

struct MockChannel {
    shard: ShardId,
    executed: Arc<Mutex<Vec<(ShardId, CommandSpec)>>>,
    script: Arc<Mutex<Arc<Script>>>,
}

#[async_trait]
impl ShardChannel for MockChannel {
    async fn execute(&mut self, spec: &CommandSpec) -> Result<ReplyValue, ChannelError> {
        self.executed
            .lock()
            .unwrap()
            .push((self.shard, spec.clone()));

        let script = self.script.lock().unwrap().clone();
        match (*script)(self.shard, spec) {
            MockReply::Reply(value) => Ok(value),
            MockReply::Protocol(detail) => Err(ChannelError::Protocol(detail)),
            MockReply::Lost => Err(ChannelError::Io("scripted connection loss".to_string())),
            MockReply::Hang => {
                futures::future::pending::<()>().await;
                unreachable!()
            }
        }
    }
}
