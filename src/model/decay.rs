use rand::Rng;

/// Draws one sample from a Poisson distribution by inverting the CDF.
///
/// A zero lambda means no decay. A lambda so large that `exp(-lambda)`
/// underflows to zero saturates instead: callers clamp the sample against the
/// bin count, and a distribution that old is fully decayed either way.
pub fn poisson<R: Rng>(lambda: f64, rng: &mut R) -> i64 {
    if lambda <= 0.0 {
        return 0;
    }

    let mut term = (-lambda).exp();
    if term == 0.0 {
        return i64::MAX;
    }

    let mut cumulative = term;
    let r: f64 = rng.r#gen();

    let mut k: i64 = 0;
    while cumulative < r {
        k += 1;
        term *= lambda / k as f64;
        cumulative += term;
        if term <= f64::MIN_POSITIVE && cumulative < r {
            // Far-tail underflow; the remaining mass is unreachable.
            break;
        }
    }
    k
}

/// Number of decay events for one bin since its last write.
pub fn decay_amount<R: Rng>(t: i64, rate: f64, now: i64, rng: &mut R) -> i64 {
    let dt = (now - t).max(0);
    poisson(rate * dt as f64, rng)
}
