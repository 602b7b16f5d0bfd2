//! Background persistence of decayed distributions.
//!
//! Serving a read decays counts in memory only; these workers make the fade
//! durable. Every served distribution is queued here, and each worker re-reads
//! the ones it picks up when they are partial, decays them, and writes the
//! result back with an expiry far enough out that an untouched distribution
//! eventually evicts itself.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::{Mutex, mpsc};

use super::parse;
use super::service::GatewaySettings;
use crate::dispatch::aggregate;
use crate::dispatch::command::CommandSpec;
use crate::dispatch::dispatcher::Dispatcher;
use crate::error::GatewayError;
use crate::model::distribution::Distribution;

const REFRESH_QUEUE_DEPTH: usize = 256;
/// Re-enqueueing the same distribution inside this window is a no-op.
const DEDUPE_WINDOW_MS: u64 = 1000;
const DEDUPE_TABLE_CAP: usize = 10_000;

/// Producer half of the refresh pipeline. Deduplicates bursts so a hot
/// distribution does not occupy the whole queue.
pub struct WritebackQueue {
    sender: mpsc::Sender<Distribution>,
    recent: DashMap<String, u64>,
}

impl WritebackQueue {
    pub fn new() -> (WritebackQueue, mpsc::Receiver<Distribution>) {
        let (sender, receiver) = mpsc::channel(REFRESH_QUEUE_DEPTH);
        let queue = WritebackQueue {
            sender,
            recent: DashMap::new(),
        };
        (queue, receiver)
    }

    pub fn enqueue(&self, dist: Distribution) {
        if !self.should_enqueue(&dist.name) {
            return;
        }
        if let Err(refused) = self.sender.try_send(dist) {
            tracing::warn!(
                "refresh queue full, dropping update for {}",
                refused.into_inner().name
            );
        }
    }

    fn should_enqueue(&self, name: &str) -> bool {
        let now = now_ms();
        if let Some(last) = self.recent.get(name)
            && now.saturating_sub(*last) < DEDUPE_WINDOW_MS
        {
            return false;
        }
        if self.recent.len() > DEDUPE_TABLE_CAP {
            self.recent.clear();
        }
        self.recent.insert(name.to_string(), now);
        true
    }
}

/// The worker pool draining the refresh queue.
pub struct RefreshWorkers {
    dispatcher: Dispatcher,
    settings: GatewaySettings,
    worker_count: usize,
    queue: Arc<Mutex<mpsc::Receiver<Distribution>>>,
}

impl RefreshWorkers {
    pub fn new(
        dispatcher: Dispatcher,
        settings: GatewaySettings,
        worker_count: usize,
        queue: mpsc::Receiver<Distribution>,
    ) -> Arc<RefreshWorkers> {
        Arc::new(RefreshWorkers {
            dispatcher,
            settings,
            worker_count,
            queue: Arc::new(Mutex::new(queue)),
        })
    }

    /// Spawns the workers and returns immediately.
    pub fn start(self: Arc<Self>) {
        tracing::info!("Starting {} refresh workers", self.worker_count);

        for worker_id in 0..self.worker_count {
            let workers = self.clone();
            tokio::spawn(async move {
                workers.worker_loop(worker_id).await;
            });
        }
    }

    async fn worker_loop(&self, worker_id: usize) {
        loop {
            let dist = { self.queue.lock().await.recv().await };
            let Some(dist) = dist else {
                tracing::info!("Refresh worker {} shutting down", worker_id);
                return;
            };

            let name = dist.name.clone();
            match self.refresh(dist).await {
                Ok(()) => {}
                Err(GatewayError::NotFound) => {
                    // Expired between the read and the refresh; nothing to do.
                }
                Err(e) => {
                    tracing::warn!("[worker {}] could not refresh {}: {}", worker_id, name, e);
                }
            }
        }
    }

    async fn refresh(&self, mut dist: Distribution) -> Result<(), GatewayError> {
        let now = now_secs();
        if !dist.refresh_due(now) {
            return Ok(());
        }

        let shard = self.dispatcher.registry().resolve(&dist.name);

        if !dist.is_full() {
            let reply = self.dispatcher.dispatch(
                shard,
                CommandSpec::RangeWithScores {
                    distribution: dist.name.clone(),
                },
            )?;
            let value = aggregate::collect_single(reply, self.settings.timeout).await?;
            dist = parse::full_range(&dist.name, &value, dist.rate, dist.prune, now)?;
            dist.decay(now);
        }

        if dist.z == 0 && dist.has_decayed() {
            // Fully faded; let the shard-side expiry reap it.
            return Ok(());
        }

        let max_count = dist.data.iter().map(|value| value.count).max().unwrap_or(0);
        let expire_secs = expiry_secs(max_count, dist.rate, self.settings.expire_sigma);

        let spec = if dist.has_decayed() {
            CommandSpec::WriteCounts {
                distribution: dist.name.clone(),
                entries: dist
                    .data
                    .iter()
                    .map(|value| (value.bin.clone(), value.count))
                    .collect(),
                z: dist.z,
                t: dist.t,
                expire_secs,
            }
        } else {
            CommandSpec::Expire {
                distribution: dist.name.clone(),
                expire_secs,
            }
        };

        let reply = self.dispatcher.dispatch(shard, spec)?;
        aggregate::collect_single(reply, self.settings.timeout).await?;
        tracing::debug!("Refreshed distribution {}", dist.name);
        Ok(())
    }
}

/// Horizon after which an untouched distribution has almost surely decayed to
/// nothing: `eta = sqrt(max_count / rate)` seconds puts the expected decay at
/// `max_count`, and the sigma factor pads the variance.
fn expiry_secs(max_count: i64, rate: f64, sigma: f64) -> i64 {
    if rate <= 0.0 || max_count <= 0 {
        return 1;
    }
    let eta = (max_count as f64 / rate).sqrt();
    (((sigma + eta) * eta) as i64).max(1)
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
