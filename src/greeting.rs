//! The greeting exchanged once between every pair of peers.
//!
//! On the wire a greeting is unframed UTF-8 text: the dialing side writes it once, the
//! listening side reads once into a buffer of [GREETING_CAPACITY] bytes and closes the
//! connection.

use crate::p2p::PeerId;

use std::fmt;

/// The largest greeting the listening side will read. Longer payloads are truncated.
pub const GREETING_CAPACITY: usize = 100;

const PREFIX: &str = "Greetings from server ";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Greeting(String);

impl Greeting {
    /// The greeting sent by the node `id`.
    pub fn from_peer(id: PeerId) -> Self {
        Greeting(format!("{}{}", PREFIX, id))
    }

    /// Decodes bytes read off a connection. Invalid UTF-8 (including a character split at
    /// the capacity boundary) is replaced rather than rejected.
    pub fn decode(bytes: &[u8]) -> Self {
        Greeting(String::from_utf8_lossy(bytes).into_owned())
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The id of the sending node, if the payload is a well formed greeting.
    pub fn sender_id(&self) -> Option<PeerId> {
        self.0.strip_prefix(PREFIX).and_then(|id| id.trim().parse().ok())
    }
}

impl fmt::Display for Greeting {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Greeting {
    fn from(text: String) -> Self {
        Greeting(text)
    }
}
