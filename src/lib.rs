//! Sharded Decaying-Counter Gateway Library
//!
//! This library crate defines the core modules of the gateway daemon.
//! It serves as the foundation for the binary executable (`main.rs`).
//!
//! ## Architecture Modules
//! The system is composed of six loosely coupled subsystems:
//!
//! - **`cluster`**: The shard topology layer. Holds the static registry of backing-store
//!   shards, routes distribution keys to shards via CRC-32, and manages the lifecycle
//!   of one asynchronous connection per shard (connect, health, reconnect).
//! - **`dispatch`**: The command plumbing. Issues asynchronous commands against a shard
//!   connection, correlates outstanding replies with the HTTP request that spawned them,
//!   and aggregates partial per-shard results into one response.
//! - **`backend`**: The backing-store seam. Logical commands and typed replies on one
//!   side, the Redis wire client on the other.
//! - **`model`**: The domain logic. Categorical distributions whose counts decay over
//!   time through Poisson sampling.
//! - **`gateway`**: The service layer. Composes routing, dispatch, and decay into the
//!   operations the HTTP API exposes, plus the background write-back workers.
//! - **`api`**: HTTP request handlers for the Axum web server.

pub mod api;
pub mod backend;
pub mod cluster;
pub mod dispatch;
pub mod error;
pub mod gateway;
pub mod model;

pub use error::GatewayError;
