use std::fmt;

/// Peers are identified by the `serverId` they are given in the shared configuration.
pub type PeerId = u64;

/// A single entry of the peer directory. Every node in the cluster is given the same list of
/// records and finds itself in it by id.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct PeerRecord {
    #[serde(rename = "serverId", alias = "serverid")]
    pub id: PeerId,
    /// A hostname or IP literal.
    pub host: String,
    pub port: u16,
}

impl PeerRecord {
    pub fn new(id: PeerId, host: &str, port: u16) -> Self {
        PeerRecord { id, host: host.to_owned(), port }
    }

    /// The `host:port` form used for dialing and binding. IPv6 literals are bracketed.
    pub fn address(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Display for PeerRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.address())
    }
}
