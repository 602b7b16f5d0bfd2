use thiserror::Error;

/// Failure taxonomy for every request the gateway serves.
///
/// Each variant maps to exactly one HTTP outcome (see `api::response`), so a
/// request can never terminate without a well-defined client-visible status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// A required request field is missing or empty. Rejected before any
    /// shard is touched.
    #[error("missing required argument: {0}")]
    MissingArgument(&'static str),

    /// A request field is present but unparsable.
    #[error("could not parse argument: {0}")]
    BadArgument(&'static str),

    /// The target shard connection is not in the `Connected` state. Fails
    /// fast, no backend round-trip is attempted.
    #[error("shard unavailable")]
    ShardUnavailable,

    /// Well-formed backend response indicating the distribution is absent.
    #[error("distribution not found")]
    NotFound,

    /// The shard responded with a protocol-level error, or replied with a
    /// shape the gateway cannot interpret.
    #[error("backend error: {0}")]
    Backend(String),

    /// The aggregation did not complete within the configured window.
    #[error("aggregation timed out")]
    Timeout,

    /// A correlation or bookkeeping bug inside the gateway itself. Logged
    /// and surfaced as a generic 500, never silently ignored.
    #[error("internal invariant violated: {0}")]
    Internal(String),
}
