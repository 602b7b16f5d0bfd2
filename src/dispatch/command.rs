use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::error::GatewayError;

/// A logical backend operation, independent of the wire encoding.
///
/// Each variant documents the reply shape the channel implementation must
/// produce, so the service layer can parse replies without knowing the
/// protocol.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandSpec {
    /// Per-bin counts plus the distribution's bookkeeping.
    ///
    /// Reply: sequence of one count-or-nil per requested field, then the bin
    /// cardinality (integer), the normalizer `_Z` (text or nil), and the last
    /// write time `_T` (text or nil).
    FieldCounts {
        distribution: String,
        fields: Vec<String>,
    },

    /// The full ordered `(bin, count)` range of a distribution.
    ///
    /// Reply: sequence of the last write time `_T` (text or nil), then a flat
    /// `bin, count, bin, count, ...` sequence.
    RangeWithScores { distribution: String },

    /// The top `limit` bins by count, descending.
    ///
    /// Reply: sequence of a flat `bin, count, ...` sequence, then cardinality,
    /// `_Z`, and `_T` as in `FieldCounts`.
    TopScores { distribution: String, limit: usize },

    /// Increment each named bin and the normalizer by `amount`, stamping `t`
    /// as the write time if none is set yet.
    ///
    /// Reply: sequence of per-operation acknowledgments; only success matters.
    Increment {
        distribution: String,
        fields: Vec<String>,
        amount: i64,
        t: i64,
    },

    /// Write back a decayed distribution: zero-count bins are removed, the
    /// rest re-scored, bookkeeping keys updated, and everything re-expired.
    ///
    /// Reply: sequence of per-operation acknowledgments.
    WriteCounts {
        distribution: String,
        entries: Vec<(String, i64)>,
        z: i64,
        t: i64,
        expire_secs: i64,
    },

    /// Refresh the expiry of an unchanged distribution.
    ///
    /// Reply: sequence of per-operation acknowledgments.
    Expire {
        distribution: String,
        expire_secs: i64,
    },

    /// Number of keys held by the shard.
    ///
    /// Reply: a single integer.
    KeyspaceSize,
}

impl CommandSpec {
    /// The distribution the command addresses, when there is one.
    pub fn distribution(&self) -> Option<&str> {
        match self {
            CommandSpec::FieldCounts { distribution, .. }
            | CommandSpec::RangeWithScores { distribution }
            | CommandSpec::TopScores { distribution, .. }
            | CommandSpec::Increment { distribution, .. }
            | CommandSpec::WriteCounts { distribution, .. }
            | CommandSpec::Expire { distribution, .. } => Some(distribution),
            CommandSpec::KeyspaceSize => None,
        }
    }
}

/// A typed backend reply, already lifted out of the wire encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyValue {
    Nil,
    Integer(i64),
    Text(String),
    Sequence(Vec<ReplyValue>),
}

impl ReplyValue {
    pub fn is_nil(&self) -> bool {
        matches!(self, ReplyValue::Nil)
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            ReplyValue::Integer(value) => Some(*value),
            ReplyValue::Text(text) => text.parse().ok(),
            _ => None,
        }
    }

    /// Reads a count. Sorted-set scores come back as text floats ("3" or
    /// "3.0") depending on the backend, so both encodings are accepted.
    pub fn as_count(&self) -> Option<i64> {
        match self {
            ReplyValue::Integer(value) => Some(*value),
            ReplyValue::Text(text) => text.parse::<f64>().ok().map(|f| f.round() as i64),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ReplyValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[ReplyValue]> {
        match self {
            ReplyValue::Sequence(items) => Some(items),
            _ => None,
        }
    }
}

/// How one outstanding backend operation ended.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    /// The backend replied.
    Reply(ReplyValue),
    /// The backend reported a protocol-level error; the connection survived.
    Backend(String),
    /// The shard connection was lost (or never available) before a reply.
    Unavailable,
}

impl CommandOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CommandOutcome::Reply(_))
    }

    /// The request-level error this outcome implies, if any.
    pub fn as_error(&self) -> Option<GatewayError> {
        match self {
            CommandOutcome::Reply(_) => None,
            CommandOutcome::Backend(detail) => Some(GatewayError::Backend(detail.clone())),
            CommandOutcome::Unavailable => Some(GatewayError::ShardUnavailable),
        }
    }
}

/// Correlation record for one outstanding backend operation.
///
/// Created by the dispatcher, consumed by the shard's connection task, and
/// resolved exactly once. Dropping it unresolved counts as a resolution too:
/// the paired `PendingReply` then observes `Unavailable`, so nothing waiting
/// on it can hang. The in-flight gauge is held for exactly the lifetime of
/// this record.
pub struct PendingCommand {
    id: Uuid,
    spec: CommandSpec,
    reply: Option<oneshot::Sender<CommandOutcome>>,
    gauge: Arc<AtomicUsize>,
}

impl PendingCommand {
    pub(crate) fn new(spec: CommandSpec, gauge: Arc<AtomicUsize>) -> (PendingCommand, PendingReply) {
        let (tx, rx) = oneshot::channel();
        let id = Uuid::new_v4();
        gauge.fetch_add(1, Ordering::Relaxed);

        let command = PendingCommand {
            id,
            spec,
            reply: Some(tx),
            gauge,
        };
        (command, PendingReply { id, rx })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    /// Delivers the outcome to whoever is waiting. A requester that already
    /// gave up (timeout) simply discards the late reply.
    pub fn resolve(mut self, outcome: CommandOutcome) {
        if let Some(tx) = self.reply.take()
            && tx.send(outcome).is_err()
        {
            tracing::debug!("command {} resolved after the requester gave up", self.id);
        }
    }
}

impl Drop for PendingCommand {
    fn drop(&mut self) {
        self.gauge.fetch_sub(1, Ordering::Relaxed);
    }
}

/// The requester's half of a `PendingCommand`: resolves exactly once.
#[derive(Debug)]
pub struct PendingReply {
    id: Uuid,
    rx: oneshot::Receiver<CommandOutcome>,
}

impl PendingReply {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Waits for the outcome. A command dropped without resolution reads as
    /// a lost shard.
    pub async fn outcome(self) -> CommandOutcome {
        self.rx.await.unwrap_or(CommandOutcome::Unavailable)
    }
}
