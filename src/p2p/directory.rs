//! The peer directory: the ordered, immutable list of every node taking part in the handshake.

use super::peer_record::{PeerId, PeerRecord};
use crate::server::Settings;
use crate::{Error, Result};

use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerDirectory {
    records: Vec<PeerRecord>,
}

impl PeerDirectory {
    /// Loads the `servers` list of a configuration file. See [Settings] for the format.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<PeerDirectory> {
        Settings::load(path)?.directory()
    }

    /// Builds a directory from records in configuration order. Ids must be unique and the
    /// list must not be empty.
    pub fn from_records(records: Vec<PeerRecord>) -> Result<PeerDirectory> {
        if records.is_empty() {
            return Err(Error::EmptyDirectory);
        }
        let mut seen = HashSet::new();
        for record in records.iter() {
            if !seen.insert(record.id) {
                return Err(Error::DuplicatePeer(record.id));
            }
        }
        Ok(PeerDirectory { records })
    }

    pub fn all(&self) -> &[PeerRecord] {
        &self.records
    }

    pub fn self_record(&self, id: PeerId) -> Result<&PeerRecord> {
        self.records.iter().find(|record| record.id == id).ok_or(Error::PeerNotFound(id))
    }

    /// Every record except the one with `id`, in directory order.
    pub fn others(&self, id: PeerId) -> impl Iterator<Item = &PeerRecord> {
        self.records.iter().filter(move |record| record.id != id)
    }

    pub fn ids(&self) -> impl Iterator<Item = PeerId> + '_ {
        self.records.iter().map(|record| record.id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
