//! Outbound side of the handshake: deliver this node's greeting to every other peer.

use super::prelude::*;

use super::directory::PeerDirectory;
use super::peer_record::{PeerId, PeerRecord};
use super::retry::RetryPolicy;

use crate::greeting::Greeting;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use std::collections::BTreeSet;

pub struct Dispatcher {
    targets: Vec<PeerRecord>,
    greeting: Greeting,
    policy: RetryPolicy,
}

impl Dispatcher {
    /// A dispatcher greeting every peer of `directory` except `self_id`.
    pub fn new(directory: &PeerDirectory, self_id: PeerId, policy: RetryPolicy) -> Self {
        Dispatcher {
            targets: directory.others(self_id).cloned().collect(),
            greeting: Greeting::from_peer(self_id),
            policy,
        }
    }

    pub fn targets(&self) -> &[PeerRecord] {
        &self.targets
    }

    /// Sends the greeting to every target concurrently, one task per peer, and returns once
    /// every send has been confirmed. The first failure cancels the remaining sends and is
    /// returned as is.
    pub async fn send_all(self, cancel: CancellationToken) -> Result<BTreeSet<PeerId>> {
        let cancel = cancel.child_token();
        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<Result<PeerId>>();
        for peer in self.targets.iter().cloned() {
            let done = done_tx.clone();
            let greeting = self.greeting.clone();
            let policy = self.policy;
            let cancel = cancel.clone();
            tokio::spawn(async move {
                let result = deliver(&peer, &greeting, &policy, &cancel).await;
                // the receiver is gone only if another send already failed
                let _ = done.send(result);
            });
        }
        drop(done_tx);

        let mut confirmed = BTreeSet::new();
        while confirmed.len() < self.targets.len() {
            match done_rx.recv().await {
                Some(Ok(peer)) => {
                    confirmed.insert(peer);
                    debug!("confirmed {}/{} sends", confirmed.len(), self.targets.len());
                }
                Some(Err(err)) => {
                    cancel.cancel();
                    return Err(err);
                }
                None => return Err(Error::ChannelClosed),
            }
        }
        info!("[{}] greeted {} peers {}", "dispatcher".yellow(), confirmed.len(), "✓".green());
        Ok(confirmed)
    }
}

/// Connects to `peer`, retrying according to `policy` while the peer is unreachable.
pub async fn dial(
    peer: &PeerRecord,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> Result<TcpStream> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        let connected = tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            connected = TcpStream::connect((peer.host.as_str(), peer.port)) => connected,
        };
        match connected {
            Ok(stream) => {
                debug!("connected to peer {} after {} attempt(s)", peer, attempt);
                return Ok(stream);
            }
            Err(err) if attempt >= policy.max_attempts => {
                error!(
                    "peer {} unreachable after {} attempts ({:?} budget): {}",
                    peer,
                    attempt,
                    policy.budget(),
                    err
                );
                return Err(Error::DialExhausted { peer: peer.id, attempts: attempt, source: err });
            }
            Err(err) => {
                debug!("dial {} attempt {} failed: {}", peer, attempt, err);
                tokio::select! {
                    _ = cancel.cancelled() => return Err(Error::Cancelled),
                    _ = sleep(policy.delay(attempt)) => (),
                }
            }
        }
    }
}

/// Dials `peer`, writes the greeting once and closes the connection.
pub async fn deliver(
    peer: &PeerRecord,
    greeting: &Greeting,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> Result<PeerId> {
    let stream = dial(peer, policy, cancel).await?;
    write_greeting(stream, peer, greeting).await?;
    info!("sent {:?} to peer {}", greeting.as_str(), peer);
    Ok(peer.id)
}

/// Writes `greeting` and shuts the writer down. A failure is fatal and never retried.
pub async fn write_greeting<W: AsyncWrite + Unpin>(
    mut writer: W,
    peer: &PeerRecord,
    greeting: &Greeting,
) -> Result<()> {
    let write_error = |source| Error::Write { peer: peer.id, source };
    writer.write_all(greeting.as_bytes()).await.map_err(write_error)?;
    writer.shutdown().await.map_err(write_error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    const GREETING_BUFFER: usize = 64;

    async fn listen() -> (TcpListener, u16) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, port)
    }

    // A port nothing listens on
    async fn dead_port() -> u16 {
        let (_, port) = listen().await;
        port
    }

    async fn read_one(listener: &TcpListener) -> String {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut text = String::new();
        stream.read_to_string(&mut text).await.unwrap();
        text
    }

    #[actix_rt::test]
    async fn test_deliver() {
        let (listener, port) = listen().await;
        let peer = PeerRecord::new(1, "127.0.0.1", port);
        let reader = tokio::spawn(async move { read_one(&listener).await });

        let policy = RetryPolicy::fixed(3, Duration::from_millis(10));
        let sent = deliver(&peer, &Greeting::from_peer(0), &policy, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(sent, 1);
        assert_eq!(reader.await.unwrap(), "Greetings from server 0");
    }

    #[actix_rt::test]
    async fn test_write_to_closed_peer_is_fatal() {
        let peer = PeerRecord::new(1, "127.0.0.1", 1);
        let (writer, remote) = tokio::io::duplex(GREETING_BUFFER);
        // the remote end is gone before anything is written
        drop(remote);
        match write_greeting(writer, &peer, &Greeting::from_peer(0)).await {
            Err(err @ Error::Write { peer: 1, .. }) => assert_eq!(err.cause(), crate::Cause::IO),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[actix_rt::test]
    async fn test_dial_exhausted() {
        let peer = PeerRecord::new(1, "127.0.0.1", dead_port().await);
        let policy = RetryPolicy::fixed(3, Duration::from_millis(10));
        match dial(&peer, &policy, &CancellationToken::new()).await {
            Err(Error::DialExhausted { peer: 1, attempts: 3, .. }) => (),
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
    }

    #[actix_rt::test]
    async fn test_dial_late_listener() {
        let port = dead_port().await;
        let interval = Duration::from_millis(10);
        let policy = RetryPolicy::fixed(100, interval);
        let reader = tokio::spawn(async move {
            sleep(interval * 50).await;
            let listener = TcpListener::bind(("127.0.0.1", port)).await.unwrap();
            read_one(&listener).await
        });

        let peer = PeerRecord::new(1, "127.0.0.1", port);
        deliver(&peer, &Greeting::from_peer(0), &policy, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(reader.await.unwrap(), "Greetings from server 0");
    }

    #[actix_rt::test]
    async fn test_dial_cancelled() {
        let peer = PeerRecord::new(1, "127.0.0.1", dead_port().await);
        let policy = RetryPolicy::fixed(1000, Duration::from_millis(10));
        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(30)).await;
            canceller.cancel();
        });
        match dial(&peer, &policy, &cancel).await {
            Err(Error::Cancelled) => (),
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
    }

    #[actix_rt::test]
    async fn test_send_all_skips_self() {
        let (own, own_port) = listen().await;
        let (first, first_port) = listen().await;
        let (second, second_port) = listen().await;
        let directory = PeerDirectory::from_records(vec![
            PeerRecord::new(0, "127.0.0.1", own_port),
            PeerRecord::new(1, "127.0.0.1", first_port),
            PeerRecord::new(2, "127.0.0.1", second_port),
        ])
        .unwrap();
        let first = tokio::spawn(async move { read_one(&first).await });
        let second = tokio::spawn(async move { read_one(&second).await });

        let dispatcher =
            Dispatcher::new(&directory, 0, RetryPolicy::fixed(3, Duration::from_millis(10)));
        assert_eq!(dispatcher.targets().len(), 2);
        let confirmed = dispatcher.send_all(CancellationToken::new()).await.unwrap();
        assert_eq!(confirmed.into_iter().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(first.await.unwrap(), "Greetings from server 0");
        assert_eq!(second.await.unwrap(), "Greetings from server 0");
        assert!(timeout(Duration::from_millis(50), own.accept()).await.is_err());
    }

    #[actix_rt::test]
    async fn test_send_all_fails_on_unreachable_peer() {
        let (reachable, reachable_port) = listen().await;
        let directory = PeerDirectory::from_records(vec![
            PeerRecord::new(0, "127.0.0.1", dead_port().await),
            PeerRecord::new(1, "127.0.0.1", reachable_port),
            PeerRecord::new(2, "127.0.0.1", dead_port().await),
        ])
        .unwrap();
        tokio::spawn(async move { read_one(&reachable).await });

        let dispatcher =
            Dispatcher::new(&directory, 0, RetryPolicy::fixed(3, Duration::from_millis(10)));
        match dispatcher.send_all(CancellationToken::new()).await {
            Err(err) => assert_eq!(err.cause(), crate::Cause::Dial),
            Ok(confirmed) => panic!("unexpected {:?}", confirmed),
        }
    }
}
