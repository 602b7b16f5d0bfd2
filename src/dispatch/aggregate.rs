use futures::StreamExt;
use futures::stream::FuturesUnordered;
use std::time::Duration;

use super::command::{CommandOutcome, PendingReply, ReplyValue};
use crate::error::GatewayError;

/// Tracks an in-flight client request that depends on one or more outstanding
/// backend commands.
///
/// Partial results are stored by fan-out position, never by arrival order, so
/// multi-shard responses are deterministic regardless of backend latency.
/// Single-shard requests are the degenerate case with one expected partial.
pub struct AggregationContext {
    expected: usize,
    received: usize,
    partials: Vec<Option<CommandOutcome>>,
    first_error: Option<GatewayError>,
}

impl AggregationContext {
    pub fn new(expected: usize) -> AggregationContext {
        AggregationContext {
            expected,
            received: 0,
            partials: (0..expected).map(|_| None).collect(),
            first_error: None,
        }
    }

    /// Records the outcome for one fan-out position.
    ///
    /// A duplicate or out-of-range position is a correlation bug in the
    /// dispatch layer, not a user-facing condition; it is reported as an
    /// internal violation and leaves already-recorded positions untouched.
    pub fn record_partial(
        &mut self,
        position: usize,
        outcome: CommandOutcome,
    ) -> Result<(), GatewayError> {
        if position >= self.expected {
            return Err(GatewayError::Internal(format!(
                "partial position {} out of range (expected {})",
                position, self.expected
            )));
        }
        if self.partials[position].is_some() {
            return Err(GatewayError::Internal(format!(
                "duplicate partial recorded at position {}",
                position
            )));
        }

        if self.first_error.is_none() {
            self.first_error = outcome.as_error();
        }
        self.partials[position] = Some(outcome);
        self.received += 1;
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.received == self.expected
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    pub fn received(&self) -> usize {
        self.received
    }

    /// Number of partials that carried a backend reply.
    pub fn succeeded(&self) -> usize {
        self.partials
            .iter()
            .flatten()
            .filter(|outcome| outcome.is_success())
            .count()
    }

    pub fn first_error(&self) -> Option<&GatewayError> {
        self.first_error.as_ref()
    }

    /// Assembles the ordered partial outcomes into the final result set.
    ///
    /// Partial-failure policy: if nothing succeeded, the whole aggregation
    /// reports the first error encountered; otherwise the caller receives the
    /// full positional set, failed positions included, and decides how to
    /// mark them.
    pub fn finalize(self) -> Result<Vec<CommandOutcome>, GatewayError> {
        if !self.is_complete() {
            return Err(GatewayError::Internal(format!(
                "finalized after {} of {} partials",
                self.received, self.expected
            )));
        }

        if self.expected > 0 && self.succeeded() == 0 {
            return Err(self
                .first_error
                .unwrap_or_else(|| GatewayError::Internal("empty aggregation".to_string())));
        }

        let outcomes: Option<Vec<CommandOutcome>> = self.partials.into_iter().collect();
        outcomes.ok_or_else(|| GatewayError::Internal("missing partial after completion".to_string()))
    }
}

/// Drains pending replies into the context as they arrive, bounded by the
/// request window.
///
/// On timeout the remaining replies are dropped, which marks their commands
/// cancelled-on-arrival: late resolutions are discarded at the channel, never
/// double-delivered.
pub async fn drive(
    ctx: &mut AggregationContext,
    replies: Vec<(usize, PendingReply)>,
    window: Duration,
) -> Result<(), GatewayError> {
    let mut arriving: FuturesUnordered<_> = replies
        .into_iter()
        .map(|(position, reply)| async move { (position, reply.outcome().await) })
        .collect();

    let outcome = tokio::time::timeout(window, async {
        while let Some((position, outcome)) = arriving.next().await {
            ctx.record_partial(position, outcome)?;
        }
        Ok::<(), GatewayError>(())
    })
    .await;

    match outcome {
        Ok(result) => result,
        Err(_) => Err(GatewayError::Timeout),
    }
}

/// Runs a single-shard command through the same aggregation machinery and
/// unwraps its reply.
pub async fn collect_single(
    reply: PendingReply,
    window: Duration,
) -> Result<ReplyValue, GatewayError> {
    let mut ctx = AggregationContext::new(1);
    drive(&mut ctx, vec![(0, reply)], window).await?;

    let mut outcomes = ctx.finalize()?;
    match outcomes.pop() {
        Some(CommandOutcome::Reply(value)) => Ok(value),
        Some(other) => Err(other
            .as_error()
            .unwrap_or_else(|| GatewayError::Internal("errorless failed outcome".to_string()))),
        None => Err(GatewayError::Internal("empty single aggregation".to_string())),
    }
}
