use rand::Rng;
use serde::Serialize;

use super::decay::decay_amount;

/// One bin of a distribution: its count and its probability under the
/// distribution's normalizer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinValue {
    pub bin: String,
    pub count: i64,
    pub p: f64,
}

/// A categorical distribution as served to clients.
///
/// `data` keeps the order the bins were read in, so responses are stable. A
/// distribution may be *partial* (a field lookup or a top-N slice); in that
/// case `num_entries` still reflects the full bin cardinality on the shard
/// and decay extrapolates accordingly.
#[derive(Debug, Clone, Serialize)]
pub struct Distribution {
    #[serde(rename = "distribution")]
    pub name: String,
    #[serde(rename = "Z")]
    pub z: i64,
    #[serde(rename = "T")]
    pub t: i64,
    pub rate: f64,
    pub prune: bool,
    pub data: Vec<BinValue>,

    #[serde(skip)]
    pub last_sync_t: i64,
    #[serde(skip)]
    num_entries: usize,
    #[serde(skip)]
    is_full: bool,
    #[serde(skip)]
    has_decayed: bool,
}

impl Distribution {
    pub fn new(name: &str, rate: f64, prune: bool) -> Distribution {
        Distribution {
            name: name.to_string(),
            z: 0,
            t: 0,
            rate,
            prune,
            data: Vec::new(),
            last_sync_t: 0,
            num_entries: 0,
            is_full: false,
            has_decayed: false,
        }
    }

    /// Populates the observed bins. `num_entries` is the shard-side bin
    /// cardinality; when it equals the observed set the distribution is full
    /// and `Z` is recomputed from the data rather than trusted.
    pub fn with_counts(
        mut self,
        entries: Vec<(String, i64)>,
        z: i64,
        t: i64,
        num_entries: usize,
    ) -> Distribution {
        self.data = entries
            .into_iter()
            .map(|(bin, count)| BinValue { bin, count, p: 0.0 })
            .collect();
        self.z = z;
        self.t = t;
        self.last_sync_t = t;
        self.num_entries = num_entries;
        self.is_full = self.num_entries == self.data.len();

        if self.is_full {
            self.normalize();
        } else {
            self.calc_probabilities();
        }
        self
    }

    pub fn is_full(&self) -> bool {
        self.is_full
    }

    pub fn has_decayed(&self) -> bool {
        self.has_decayed
    }

    pub fn num_entries(&self) -> usize {
        self.num_entries
    }

    /// Whether the write-back worker should bother: either we hold the whole
    /// distribution, or enough time has passed that a decay event is likely.
    pub fn refresh_due(&self, now: i64) -> bool {
        self.is_full || (now - self.last_sync_t) as f64 * self.rate > 0.75
    }

    /// Recomputes `Z` from the observed counts, then the probabilities.
    pub fn normalize(&mut self) {
        self.z = self.data.iter().map(|value| value.count).sum();
        self.calc_probabilities();
    }

    pub fn calc_probabilities(&mut self) {
        let z = self.z as f64;
        for value in &mut self.data {
            value.p = if z == 0.0 { 0.0 } else { value.count as f64 / z };
        }
    }

    /// Applies time decay to every observed bin.
    ///
    /// Each bin loses an independent `Poisson(rate * dt)` sample, clamped so
    /// a bin never goes negative: with pruning it may reach zero, without it
    /// the count floors at one. For a partial view, the unobserved remainder
    /// of `Z` is decayed by extrapolating the observed average.
    pub fn decay_with<R: Rng>(&mut self, now: i64, rng: &mut R) {
        if self.data.is_empty() {
            return;
        }

        let starting_z = self.z;
        let mut observed_z: i64 = 0;
        let mut sum_decay: i64 = 0;

        for value in &mut self.data {
            let mut loss = decay_amount(self.t, self.rate, now, rng);
            if loss >= value.count {
                loss = if self.prune {
                    value.count
                } else {
                    (value.count - 1).max(0)
                };
            }
            sum_decay += loss;
            value.count -= loss;
            observed_z += value.count;
        }

        if self.is_full {
            self.z = observed_z;
        } else {
            self.z -= sum_decay / self.data.len() as i64 * self.num_entries as i64;
            if self.z < 0 {
                self.z = 0;
            }
        }

        if !self.has_decayed && starting_z != self.z {
            self.has_decayed = true;
        }

        self.t = now;
        self.calc_probabilities();
    }

    pub fn decay(&mut self, now: i64) {
        self.decay_with(now, &mut rand::thread_rng());
    }
}
