#[macro_use]
extern crate serde_derive;
extern crate colored;

pub mod barrier;
pub mod greeting;
pub mod integration_test;
pub mod p2p;
pub mod server;

use p2p::PeerId;

/// Coarse classification of a fatal failure, used when reporting why a node stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cause {
    Config,
    Bind,
    Dial,
    IO,
    Cancelled,
}

/// Every failure in this crate is fatal to the node which observes it. Tasks report an
/// `Error` to the barrier coordinator, which stops the run and hands it back to the caller.
#[derive(Debug)]
pub enum Error {
    IO(std::io::Error),

    // configuration errors
    Config(config::ConfigError),
    EmptyDirectory,
    DuplicatePeer(PeerId),
    PeerNotFound(PeerId),

    // listener errors
    Bind { address: String, source: std::io::Error },

    // dialer errors
    DialExhausted { peer: PeerId, attempts: u32, source: std::io::Error },

    // connection errors
    Read(std::io::Error),
    Write { peer: PeerId, source: std::io::Error },

    // coordination errors
    ChannelClosed,
    Cancelled,
}

impl Error {
    pub fn cause(&self) -> Cause {
        match self {
            Error::Config(_)
            | Error::EmptyDirectory
            | Error::DuplicatePeer(_)
            | Error::PeerNotFound(_) => Cause::Config,
            Error::Bind { .. } => Cause::Bind,
            Error::DialExhausted { .. } => Cause::Dial,
            Error::IO(_) | Error::Read(_) | Error::Write { .. } | Error::ChannelClosed => {
                Cause::IO
            }
            Error::Cancelled => Cause::Cancelled,
        }
    }
}

impl std::error::Error for Error {}

impl std::convert::From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::IO(error)
    }
}

impl std::convert::From<config::ConfigError> for Error {
    fn from(error: config::ConfigError) -> Self {
        Error::Config(error)
    }
}

impl<T> std::convert::From<tokio::sync::mpsc::error::SendError<T>> for Error {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        Error::ChannelClosed
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
