//! Shard Topology Module
//!
//! Holds the static registry of backing-store shards and their live connection state.
//!
//! ## Core Concepts
//! - **Routing**: A distribution key is assigned to exactly one shard by CRC-32 of its
//!   bytes, reduced modulo the shard count. The mapping is stable across restarts and
//!   across languages as long as the shard list is unchanged.
//! - **Static topology**: The ordered shard list is fixed at startup. Changing it
//!   invalidates every existing key assignment, so there is no runtime membership.
//! - **Connection ownership**: Each shard's connection handle lives in exactly one
//!   background task; every other component only reads the published state.

pub mod connection;
pub mod registry;
pub mod types;
