//! Translation of typed backend replies into distributions, following the
//! reply-shape contracts documented on `CommandSpec`.

use crate::dispatch::command::ReplyValue;
use crate::error::GatewayError;
use crate::model::distribution::Distribution;

fn unexpected(what: &str) -> GatewayError {
    GatewayError::Backend(format!("unexpected reply shape for {}", what))
}

/// Reply of `CommandSpec::FieldCounts`.
pub(crate) fn field_counts(
    name: &str,
    fields: &[String],
    value: &ReplyValue,
    rate: f64,
    prune: bool,
    now: i64,
) -> Result<Distribution, GatewayError> {
    let items = value.as_sequence().ok_or_else(|| unexpected("field counts"))?;
    if items.len() != fields.len() + 3 {
        return Err(unexpected("field counts"));
    }

    let cardinality = items[fields.len()]
        .as_integer()
        .ok_or_else(|| unexpected("bin cardinality"))?;
    if cardinality == 0 {
        return Err(GatewayError::NotFound);
    }

    let z = items[fields.len() + 1].as_integer().unwrap_or(0);
    let t = items[fields.len() + 2].as_integer().unwrap_or(now);

    let entries = fields
        .iter()
        .zip(items)
        .map(|(field, item)| (field.clone(), item.as_count().unwrap_or(0)))
        .collect();

    Ok(Distribution::new(name, rate, prune).with_counts(entries, z, t, cardinality as usize))
}

/// Reply of `CommandSpec::RangeWithScores`.
pub(crate) fn full_range(
    name: &str,
    value: &ReplyValue,
    rate: f64,
    prune: bool,
    now: i64,
) -> Result<Distribution, GatewayError> {
    let items = value.as_sequence().ok_or_else(|| unexpected("range"))?;
    if items.len() != 2 {
        return Err(unexpected("range"));
    }

    let t = items[0].as_integer().unwrap_or(now);
    let entries = score_pairs(&items[1])?;
    if entries.is_empty() {
        return Err(GatewayError::NotFound);
    }

    let cardinality = entries.len();
    Ok(Distribution::new(name, rate, prune).with_counts(entries, 0, t, cardinality))
}

/// Reply of `CommandSpec::TopScores`.
pub(crate) fn top_scores(
    name: &str,
    value: &ReplyValue,
    rate: f64,
    prune: bool,
    now: i64,
) -> Result<Distribution, GatewayError> {
    let items = value.as_sequence().ok_or_else(|| unexpected("top scores"))?;
    if items.len() != 4 {
        return Err(unexpected("top scores"));
    }

    let cardinality = items[1]
        .as_integer()
        .ok_or_else(|| unexpected("bin cardinality"))?;
    if cardinality == 0 {
        return Err(GatewayError::NotFound);
    }

    let z = items[2].as_integer().unwrap_or(0);
    let t = items[3].as_integer().unwrap_or(now);
    let entries = score_pairs(&items[0])?;

    Ok(Distribution::new(name, rate, prune).with_counts(entries, z, t, cardinality as usize))
}

/// Flat `bin, count, bin, count, ...` sequence from a WITHSCORES range.
fn score_pairs(value: &ReplyValue) -> Result<Vec<(String, i64)>, GatewayError> {
    let items = value.as_sequence().ok_or_else(|| unexpected("score pairs"))?;
    if items.len() % 2 != 0 {
        return Err(unexpected("score pairs"));
    }

    let mut entries = Vec::with_capacity(items.len() / 2);
    for pair in items.chunks(2) {
        let bin = pair[0]
            .as_text()
            .ok_or_else(|| unexpected("bin name"))?
            .to_string();
        let count = pair[1].as_count().ok_or_else(|| unexpected("bin count"))?;
        entries.push((bin, count));
    }
    Ok(entries)
}
