use anyhow::Result;
use std::fmt;

/// Ordinal of a shard in the configured list. Stable for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShardId(pub usize);

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of one backing-store shard, parsed from the startup configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardEndpoint {
    pub id: ShardId,
    pub address: String,
    pub port: u16,
}

/// Lifecycle state of a shard connection.
///
/// `ReadOnly` and `WriteOnly` are reserved for degraded backend topologies
/// (e.g. replica reads); no transition produces them today.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    ReadOnly,
    WriteOnly,
}

impl ConnectionState {
    /// Whether commands may be dispatched to the shard right now.
    pub fn is_available(self) -> bool {
        self == ConnectionState::Connected
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::ReadOnly => "read_only",
            ConnectionState::WriteOnly => "write_only",
        }
    }

    pub(crate) fn as_u8(self) -> u8 {
        match self {
            ConnectionState::Disconnected => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Connected => 2,
            ConnectionState::ReadOnly => 3,
            ConnectionState::WriteOnly => 4,
        }
    }

    pub(crate) fn from_u8(raw: u8) -> ConnectionState {
        match raw {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            3 => ConnectionState::ReadOnly,
            4 => ConnectionState::WriteOnly,
            _ => ConnectionState::Disconnected,
        }
    }
}

/// Parses the `--shard-hosts` setting: a comma-separated list of `host:port`
/// pairs. Shard count and ordering are derived from this list and fixed for
/// the process lifetime.
pub fn parse_shard_hosts(raw: &str) -> Result<Vec<ShardEndpoint>> {
    let mut endpoints = Vec::new();

    for (index, entry) in raw.split(',').enumerate() {
        let entry = entry.trim();
        let (address, port) = entry
            .rsplit_once(':')
            .ok_or_else(|| anyhow::anyhow!("shard host '{}' is not in host:port form", entry))?;
        if address.is_empty() {
            anyhow::bail!("shard host '{}' has an empty host part", entry);
        }
        let port: u16 = port
            .parse()
            .map_err(|_| anyhow::anyhow!("shard host '{}' has an invalid port", entry))?;

        endpoints.push(ShardEndpoint {
            id: ShardId(index),
            address: address.to_string(),
            port,
        });
    }

    if endpoints.is_empty() {
        anyhow::bail!("at least one shard host is required");
    }

    Ok(endpoints)
}
