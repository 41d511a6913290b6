use crate::barrier::{BarrierReport, Coordinator};
use crate::p2p::PeerId;
use crate::server::Settings;
use crate::Result;

use tokio_util::sync::CancellationToken;
use tracing::info;

use std::path::Path;

/// Loads the cluster configuration at `config_path` and runs the greeting barrier as node
/// `self_id`. Returns once every other peer has greeted us and been greeted, or on the
/// first fatal failure.
pub async fn run(
    self_id: PeerId,
    config_path: &Path,
    cancel: CancellationToken,
) -> Result<BarrierReport> {
    let settings = Settings::load(config_path)?;
    let directory = settings.directory()?;
    let policy = settings.retry_policy();
    info!("Node {} is starting ({} peers, {:?})", self_id, directory.len(), policy);

    let mut coordinator = Coordinator::new(directory, self_id, policy, cancel);
    coordinator.run().await
}
