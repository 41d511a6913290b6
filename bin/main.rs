use tracing::{error, info};
use tracing_subscriber;

use clap::{value_t, App, Arg};

use tokio_util::sync::CancellationToken;

use cluster_greet::server::node;
use cluster_greet::Result;

use std::path::Path;

#[cfg(unix)]
async fn shutdown_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    Ok(tokio::select! {
        _ = sigint.recv() => "SIGINT",
        _ = sigterm.recv() => "SIGTERM"
    })
}

#[cfg(not(unix))]
async fn shutdown_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("Ctrl+C")
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_level(false)
        .with_target(false)
        .without_time()
        .compact()
        .with_max_level(tracing::Level::INFO)
        .init();

    let matches = App::new("cluster-greet")
        .version("0.1")
        .author("zero.fx labs ltd.")
        .about("Greets every peer of a static cluster and waits to be greeted back")
        .arg(
            Arg::with_name("self-id")
                .value_name("SELF_SERVER_ID")
                .help("The serverId of this node in the configuration")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::with_name("config")
                .value_name("CONFIG_PATH")
                .help("YAML or JSON file listing every server")
                .required(true)
                .index(2),
        )
        .get_matches();

    let self_id = value_t!(matches, "self-id", u64).unwrap_or_else(|e| e.exit());
    let config_path = value_t!(matches, "config", String).unwrap_or_else(|e| e.exit());

    let sys = actix_rt::System::new();
    let result = sys.block_on(async move {
        let cancel = CancellationToken::new();
        let signal_cancel = cancel.clone();
        actix_rt::spawn(async move {
            match shutdown_signal().await {
                Ok(sig) => {
                    info!(target: "cluster_greet", "Got {}, stopping...", sig);
                    signal_cancel.cancel();
                }
                Err(err) => error!("cannot listen for signals: {}", err),
            }
        });
        node::run(self_id, Path::new(&config_path), cancel).await
    });

    match result {
        Ok(report) => {
            info!(
                "node {} received {} greetings and delivered {}",
                report.self_id,
                report.greetings.len(),
                report.confirmed.len()
            );
            Ok(())
        }
        Err(err) => {
            error!("node {} stopped on a fatal {:?} failure: {}", self_id, err.cause(), err);
            Err(err)
        }
    }
}
