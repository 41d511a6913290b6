use crate::barrier::{BarrierReport, Coordinator};
use crate::p2p::{PeerDirectory, PeerId, PeerRecord, RetryPolicy};
use crate::Result;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const NODE_HOST: &str = "127.0.0.1";

pub struct TestNode {
    pub id: PeerId,
    pub port: u16,
    /// Pre-bound listener, taken when the node is started.
    pub listener: Option<TcpListener>,
}

/// A cluster of nodes on the loopback interface, each with its own ephemeral port.
pub struct TestCluster {
    pub nodes: Vec<TestNode>,
    pub cancel: CancellationToken,
}

impl TestCluster {
    pub async fn bind(size: usize) -> TestCluster {
        let mut nodes = vec![];
        for id in 0..size {
            let listener = TcpListener::bind((NODE_HOST, 0)).await.unwrap();
            let port = listener.local_addr().unwrap().port();
            nodes.push(TestNode { id: id as PeerId, port, listener: Some(listener) });
        }
        TestCluster { nodes, cancel: CancellationToken::new() }
    }

    pub fn directory(&self) -> PeerDirectory {
        let records =
            self.nodes.iter().map(|node| PeerRecord::new(node.id, NODE_HOST, node.port)).collect();
        PeerDirectory::from_records(records).unwrap()
    }

    pub fn others(&self, id: PeerId) -> BTreeSet<PeerId> {
        self.nodes.iter().map(|node| node.id).filter(|other| *other != id).collect()
    }

    /// Frees the port of node `id` so that nothing listens on it until the node starts and
    /// binds it again.
    pub fn release(&mut self, id: PeerId) {
        self.node_mut(id).listener.take();
    }

    /// Runs the barrier for node `id` in its own task.
    pub fn start(&mut self, id: PeerId, policy: RetryPolicy) -> JoinHandle<Result<BarrierReport>> {
        let directory = self.directory();
        let cancel = self.cancel.clone();
        let listener = self.node_mut(id).listener.take();
        tokio::spawn(async move {
            let mut coordinator = Coordinator::new(directory, id, policy, cancel);
            if let Some(listener) = listener {
                coordinator = coordinator.with_listener(listener);
            }
            coordinator.run().await
        })
    }

    pub fn start_all(&mut self, policy: RetryPolicy) -> Vec<JoinHandle<Result<BarrierReport>>> {
        let ids: Vec<PeerId> = self.nodes.iter().map(|node| node.id).collect();
        ids.into_iter().map(|id| self.start(id, policy)).collect()
    }

    /// Writes the directory as a YAML configuration file in `dir`.
    pub fn write_config(&self, dir: &Path, retry: &str) -> PathBuf {
        let mut contents = String::from("servers:\n");
        for node in self.nodes.iter() {
            contents.push_str(&format!(
                "  - serverId: {}\n    host: {}\n    port: \"{}\"\n",
                node.id, NODE_HOST, node.port
            ));
        }
        contents.push_str(retry);
        let path = dir.join("cluster.yaml");
        std::fs::File::create(&path).unwrap().write_all(contents.as_bytes()).unwrap();
        path
    }

    fn node_mut(&mut self, id: PeerId) -> &mut TestNode {
        self.nodes.iter_mut().find(|node| node.id == id).unwrap()
    }
}

/// Asserts that a node heard from and greeted exactly the other members of the cluster.
pub fn assert_complete(cluster: &TestCluster, report: &BarrierReport) {
    let others = cluster.others(report.self_id);
    assert_eq!(report.greetings.len(), others.len());
    assert_eq!(report.senders(), others);
    assert_eq!(report.confirmed, others);
}
