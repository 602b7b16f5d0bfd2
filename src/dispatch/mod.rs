//! Command Dispatch Module
//!
//! The asynchronous plumbing between the HTTP layer and the shard connections.
//!
//! ## Core Concepts
//! - **Pending commands**: every outstanding backend operation is represented by
//!   exactly one `PendingCommand`/`PendingReply` pair. The command side travels to
//!   the connection task and is resolved exactly once; the reply side is awaited by
//!   the request that issued it.
//! - **Fast failure**: dispatching to a shard that is not connected fails
//!   synchronously, before anything is queued. Retry policy belongs to callers.
//! - **Aggregation**: a request that fans out to several shards tracks its partial
//!   results positionally, so the assembled response does not depend on reply
//!   arrival order, and finalizes exactly once — on completion or on timeout.

pub mod aggregate;
pub mod command;
pub mod dispatcher;
