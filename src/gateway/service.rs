use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use super::parse;
use super::writeback::WritebackQueue;
use crate::cluster::registry::ShardRegistry;
use crate::dispatch::aggregate::{self, AggregationContext};
use crate::dispatch::command::{CommandOutcome, CommandSpec};
use crate::dispatch::dispatcher::Dispatcher;
use crate::error::GatewayError;
use crate::model::distribution::Distribution;

/// Tunables shared by the service and the write-back workers.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    /// Decay rate applied when a request does not name one.
    pub default_rate: f64,
    /// Whether fully decayed bins are dropped (true) or floored at one.
    pub prune: bool,
    /// Aggregation window for every request.
    pub timeout: Duration,
    /// Safety factor in the expiry horizon written back to shards.
    pub expire_sigma: f64,
}

impl Default for GatewaySettings {
    fn default() -> GatewaySettings {
        GatewaySettings {
            default_rate: 0.5,
            prune: true,
            timeout: Duration::from_millis(2000),
            expire_sigma: 2.0,
        }
    }
}

/// Per-shard entry of the status broadcast.
#[derive(Debug, Serialize)]
pub struct ShardStatus {
    pub shard: usize,
    pub host: String,
    pub state: String,
    pub in_flight: usize,
    /// Keys held by the shard; absent when the shard did not answer.
    pub keys: Option<i64>,
    /// Error marker for shards that failed the broadcast.
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GatewayStatus {
    pub uptime_secs: u64,
    pub shard_count: usize,
    pub shards: Vec<ShardStatus>,
}

/// The operations the HTTP layer exposes, one instance per process.
pub struct GatewayService {
    registry: Arc<ShardRegistry>,
    dispatcher: Dispatcher,
    writeback: WritebackQueue,
    settings: GatewaySettings,
    started_at: Instant,
}

impl GatewayService {
    pub fn new(
        registry: Arc<ShardRegistry>,
        dispatcher: Dispatcher,
        writeback: WritebackQueue,
        settings: GatewaySettings,
    ) -> GatewayService {
        GatewayService {
            registry,
            dispatcher,
            writeback,
            settings,
            started_at: Instant::now(),
        }
    }

    pub fn settings(&self) -> &GatewaySettings {
        &self.settings
    }

    /// Point lookup of named bins within the distribution's shard.
    pub async fn field(
        &self,
        name: &str,
        fields: Vec<String>,
        rate: f64,
    ) -> Result<Distribution, GatewayError> {
        let shard = self.registry.resolve(name);
        let reply = self.dispatcher.dispatch(
            shard,
            CommandSpec::FieldCounts {
                distribution: name.to_string(),
                fields: fields.clone(),
            },
        )?;
        let value = aggregate::collect_single(reply, self.settings.timeout).await?;

        let now = now_secs();
        let mut dist =
            parse::field_counts(name, &fields, &value, rate, self.settings.prune, now)?;
        dist.decay(now);

        self.writeback.enqueue(dist.clone());
        Ok(dist)
    }

    /// The full distribution, or its top `top` bins by count.
    pub async fn distribution(
        &self,
        name: &str,
        rate: f64,
        top: Option<usize>,
        prune: bool,
    ) -> Result<Distribution, GatewayError> {
        let shard = self.registry.resolve(name);
        let spec = match top {
            Some(limit) => CommandSpec::TopScores {
                distribution: name.to_string(),
                limit,
            },
            None => CommandSpec::RangeWithScores {
                distribution: name.to_string(),
            },
        };
        let reply = self.dispatcher.dispatch(shard, spec)?;
        let value = aggregate::collect_single(reply, self.settings.timeout).await?;

        let now = now_secs();
        let mut dist = match top {
            Some(_) => parse::top_scores(name, &value, rate, prune, now)?,
            None => parse::full_range(name, &value, rate, prune, now)?,
        };
        dist.decay(now);

        self.writeback.enqueue(dist.clone());
        Ok(dist)
    }

    /// Increments the named bins and schedules a refresh of the distribution.
    pub async fn increment(
        &self,
        name: &str,
        fields: Vec<String>,
        amount: i64,
    ) -> Result<(), GatewayError> {
        let shard = self.registry.resolve(name);
        let reply = self.dispatcher.dispatch(
            shard,
            CommandSpec::Increment {
                distribution: name.to_string(),
                fields,
                amount,
                t: now_secs(),
            },
        )?;
        aggregate::collect_single(reply, self.settings.timeout).await?;

        // Empty shell: the refresh worker re-reads the full distribution and
        // applies any decay that is due.
        self.writeback.enqueue(Distribution::new(
            name,
            self.settings.default_rate,
            self.settings.prune,
        ));
        Ok(())
    }

    /// Broadcast fan-out: keyspace size of every configured shard, assembled
    /// in shard order with per-shard error markers for the ones that failed.
    pub async fn status(&self) -> Result<GatewayStatus, GatewayError> {
        let mut ctx = AggregationContext::new(self.registry.shard_count());
        let mut pending = Vec::new();

        for slot in self.registry.slots() {
            let shard = slot.endpoint.id;
            match self.dispatcher.dispatch(shard, CommandSpec::KeyspaceSize) {
                Ok(reply) => pending.push((shard.0, reply)),
                Err(_) => ctx.record_partial(shard.0, CommandOutcome::Unavailable)?,
            }
        }

        aggregate::drive(&mut ctx, pending, self.settings.timeout).await?;
        let outcomes = ctx.finalize()?;

        let shards = self
            .registry
            .slots()
            .iter()
            .zip(outcomes)
            .map(|(slot, outcome)| {
                let (keys, error) = match outcome {
                    CommandOutcome::Reply(value) => (value.as_integer(), None),
                    CommandOutcome::Backend(detail) => (None, Some(detail)),
                    CommandOutcome::Unavailable => {
                        (None, Some("SHARD_UNAVAILABLE".to_string()))
                    }
                };
                ShardStatus {
                    shard: slot.endpoint.id.0,
                    host: format!("{}:{}", slot.endpoint.address, slot.endpoint.port),
                    state: slot.state().as_str().to_string(),
                    in_flight: slot.in_flight(),
                    keys,
                    error,
                }
            })
            .collect();

        Ok(GatewayStatus {
            uptime_secs: self.started_at.elapsed().as_secs(),
            shard_count: self.registry.shard_count(),
            shards,
        })
    }
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
