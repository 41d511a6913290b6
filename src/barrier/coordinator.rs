//! The two-phase barrier: first every other peer's greeting must arrive, then every one of
//! our own greetings must have been delivered.

use crate::greeting::Greeting;
use crate::p2p::prelude::*;
use crate::p2p::{Dispatcher, PeerDirectory, PeerId, RetryPolicy};
use crate::server::Collector;

use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};

use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Starting,
    AwaitingGreetings,
    AwaitingSendConfirmation,
    Done,
}

/// What a node observed by the time the barrier was passed.
#[derive(Debug, Clone)]
pub struct BarrierReport {
    pub self_id: PeerId,
    /// Accepted greetings, in arrival order.
    pub greetings: Vec<Greeting>,
    /// Peers our own greeting was delivered to.
    pub confirmed: BTreeSet<PeerId>,
}

impl BarrierReport {
    pub fn senders(&self) -> BTreeSet<PeerId> {
        self.greetings.iter().filter_map(Greeting::sender_id).collect()
    }
}

pub struct Coordinator {
    directory: PeerDirectory,
    self_id: PeerId,
    policy: RetryPolicy,
    cancel: CancellationToken,
    listener: Option<TcpListener>,
    state: State,
}

impl Coordinator {
    pub fn new(
        directory: PeerDirectory,
        self_id: PeerId,
        policy: RetryPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Coordinator { directory, self_id, policy, cancel, listener: None, state: State::Starting }
    }

    /// Uses `listener` instead of binding the address of the local record.
    pub fn with_listener(mut self, listener: TcpListener) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn state(&self) -> State {
        self.state
    }

    fn transition(&mut self, next: State) {
        info!("[{}] node {}: {:?} -> {:?}", "barrier".cyan(), self.self_id, self.state, next);
        self.state = next;
    }

    /// Runs the handshake to completion. The collector and dispatcher run as separate tasks
    /// and are stopped before this returns, whatever the outcome.
    pub async fn run(&mut self) -> Result<BarrierReport> {
        let local = self.directory.self_record(self.self_id)?.clone();
        let expected: BTreeSet<PeerId> =
            self.directory.others(self.self_id).map(|peer| peer.id).collect();

        let collector = match self.listener.take() {
            Some(listener) => Collector::from_listener(listener)?,
            None => Collector::bind(&local).await?,
        };
        let (greeting_tx, greeting_rx) = mpsc::unbounded_channel();
        let (failure_tx, failure_rx) = mpsc::unbounded_channel();
        let (sent_tx, sent_rx) = oneshot::channel();

        let tasks = self.cancel.child_token();
        tokio::spawn(collector.run(greeting_tx, failure_tx.clone(), tasks.clone()));

        let dispatcher = Dispatcher::new(&self.directory, self.self_id, self.policy);
        let dispatch_cancel = tasks.clone();
        tokio::spawn(async move {
            match dispatcher.send_all(dispatch_cancel).await {
                Ok(confirmed) => {
                    let _ = sent_tx.send(confirmed);
                }
                Err(err) => {
                    let _ = failure_tx.send(err);
                }
            }
        });

        let result = self.await_barrier(expected, greeting_rx, sent_rx, failure_rx).await;
        tasks.cancel();
        match &result {
            Ok(_) => info!("[{}] node {} done {}", "barrier".cyan(), self.self_id, "✓".green()),
            Err(err) => error!("[{}] node {} failed: {}", "barrier".cyan(), self.self_id, err),
        }
        result
    }

    async fn await_barrier(
        &mut self,
        expected: BTreeSet<PeerId>,
        mut greeting_rx: mpsc::UnboundedReceiver<Greeting>,
        mut sent_rx: oneshot::Receiver<BTreeSet<PeerId>>,
        mut failure_rx: mpsc::UnboundedReceiver<Error>,
    ) -> Result<BarrierReport> {
        self.transition(State::AwaitingGreetings);
        let mut heard = BTreeSet::new();
        let mut greetings = vec![];
        while heard.len() < expected.len() {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(Error::Cancelled),
                Some(err) = failure_rx.recv() => return Err(err),
                greeting = greeting_rx.recv() => match greeting {
                    Some(greeting) => {
                        if self.accept(&expected, &mut heard, &greeting) {
                            greetings.push(greeting);
                        }
                    }
                    None => return Err(Error::ChannelClosed),
                },
            }
        }

        self.transition(State::AwaitingSendConfirmation);
        let confirmed = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(Error::Cancelled),
            Some(err) = failure_rx.recv() => return Err(err),
            confirmed = &mut sent_rx => confirmed.map_err(|_| Error::ChannelClosed)?,
        };

        self.transition(State::Done);
        Ok(BarrierReport { self_id: self.self_id, greetings, confirmed })
    }

    /// Counts a greeting towards the barrier if it comes from a peer we are still waiting
    /// for. Duplicates, self greetings, unknown senders and malformed payloads are ignored.
    fn accept(
        &self,
        expected: &BTreeSet<PeerId>,
        heard: &mut BTreeSet<PeerId>,
        greeting: &Greeting,
    ) -> bool {
        match greeting.sender_id() {
            Some(id) if expected.contains(&id) => {
                if heard.insert(id) {
                    info!("{}", greeting);
                    true
                } else {
                    warn!("ignoring duplicate greeting from peer {}", id);
                    false
                }
            }
            Some(id) => {
                warn!("ignoring greeting from peer {} which is not expected here", id);
                false
            }
            None => {
                warn!("ignoring malformed greeting {:?}", greeting.as_str());
                false
            }
        }
    }
}
