//! Inbound side of the handshake: accept greetings from the other peers.

use crate::greeting::{Greeting, GREETING_CAPACITY};
use crate::p2p::PeerRecord;
use crate::{Error, Result};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use std::net::SocketAddr;

/// Listens on the local peer's address and surfaces every greeting it receives.
pub struct Collector {
    listener: TcpListener,
    ip: SocketAddr,
}

impl Collector {
    /// Binds the address of the local record. A node cannot take part in the handshake
    /// without its listening port, so failing here is fatal.
    pub async fn bind(local: &PeerRecord) -> Result<Collector> {
        match TcpListener::bind((local.host.as_str(), local.port)).await {
            Ok(listener) => Collector::from_listener(listener),
            Err(source) => Err(Error::Bind { address: local.address(), source }),
        }
    }

    /// Adopts a listener which has already been bound.
    pub fn from_listener(listener: TcpListener) -> Result<Collector> {
        let ip = listener.local_addr()?;
        info!("listening on {:?}", ip);
        Ok(Collector { listener, ip })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.ip
    }

    /// Accepts connections until `cancel` fires. Each connection is read in its own task and
    /// yields exactly one greeting on `greetings`. Read and accept errors are reported on
    /// `failures`; an accept error also ends the loop.
    pub async fn run(
        self,
        greetings: UnboundedSender<Greeting>,
        failures: UnboundedSender<Error>,
        cancel: CancellationToken,
    ) {
        loop {
            let accepted = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("collector on {:?} stopped", self.ip);
                    return;
                }
                accepted = self.listener.accept() => accepted,
            };
            match accepted {
                Ok((stream, remote)) => {
                    info!("client {} connected", remote);
                    let greetings = greetings.clone();
                    let failures = failures.clone();
                    let cancel = cancel.clone();
                    tokio::spawn(async move {
                        tokio::select! {
                            _ = cancel.cancelled() => (),
                            _ = handle_connection(stream, greetings, failures) => (),
                        }
                    });
                }
                Err(err) => {
                    error!("accept on {:?} failed: {}", self.ip, err);
                    let _ = failures.send(Error::IO(err));
                    return;
                }
            }
        }
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    greetings: UnboundedSender<Greeting>,
    failures: UnboundedSender<Error>,
) {
    match read_greeting(&mut stream).await {
        Ok(greeting) => {
            if greetings.send(greeting).is_err() {
                debug!("greeting dropped, the barrier is no longer listening");
            }
        }
        Err(err) => {
            error!("read failed: {}", err);
            let _ = failures.send(err);
        }
    }
}

/// Reads a single greeting with one read of at most [GREETING_CAPACITY] bytes. The sender
/// is not required to close its side first; anything beyond the buffer is discarded.
pub async fn read_greeting<R: AsyncRead + Unpin>(mut reader: R) -> Result<Greeting> {
    let mut buf = [0u8; GREETING_CAPACITY];
    let n = reader.read(&mut buf).await.map_err(Error::Read)?;
    Ok(Greeting::decode(&buf[..n]))
}
