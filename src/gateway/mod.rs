//! Gateway Service Module
//!
//! Composes routing, dispatch, and decay into the operations the HTTP API exposes.
//!
//! ## Responsibilities
//! - **Operations**: point lookups, full/top-N distribution reads, increments, and
//!   the all-shard status broadcast.
//! - **Read-time decay**: counts are decayed in memory before they are served, so
//!   clients always see the faded view regardless of when the shard was last written.
//! - **Write-back**: served distributions are queued for background workers that
//!   persist the decayed counts (and a freshness-derived expiry) to the owning shard.

mod parse;
pub mod service;
pub mod writeback;
