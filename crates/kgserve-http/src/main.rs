use clap::Parser;
use kgserve_collab::{RemoteCollaborator, StubCollaborator};
use kgserve_core::TaskRegistry;
use kgserve_http::{routes, Collaborators, Dispatcher, FailurePolicy, ServerConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Asynchronous knowledge-graph construction gateway.
#[derive(Debug, Parser)]
#[command(name = "kgserve", version, about)]
struct Cli {
    /// Address to bind the HTTP server to.
    #[arg(long, default_value = "127.0.0.1:5000")]
    bind: SocketAddr,

    /// Base URL of the GraphRAG sidecar carrying out detection and
    /// extraction.
    #[arg(long, default_value = "http://127.0.0.1:8700")]
    sidecar_url: String,

    /// Run against in-process stub collaborators instead of the sidecar
    /// (local development).
    #[arg(long)]
    stub_collaborators: bool,

    /// Reproduce the legacy behavior of stalling silently when a
    /// collaborator fails, instead of marking sources errored.
    #[arg(long)]
    legacy_stall: bool,

    /// Abort a task's outstanding work after this many seconds.
    #[arg(long)]
    task_timeout_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = ServerConfig::new().with_bind(cli.bind);
    if cli.legacy_stall {
        config = config.with_failure_policy(FailurePolicy::LegacyStall);
    }
    if let Some(secs) = cli.task_timeout_secs {
        config = config.with_task_timeout(Duration::from_secs(secs));
    }

    let collaborators = if cli.stub_collaborators {
        tracing::warn!("running with in-process stub collaborators");
        Collaborators::from_single(Arc::new(StubCollaborator::new()))
    } else {
        tracing::info!(sidecar = %cli.sidecar_url, "using GraphRAG sidecar");
        Collaborators::from_single(Arc::new(RemoteCollaborator::new(cli.sidecar_url)))
    };

    let mut dispatcher = Dispatcher::new(Arc::new(TaskRegistry::new()), collaborators)
        .with_policy(config.failure_policy);
    if let Some(timeout) = config.task_timeout {
        dispatcher = dispatcher.with_timeout(timeout);
    }

    tracing::info!("kgserve listening on http://{}", config.bind);
    warp::serve(routes(Arc::new(dispatcher)))
        .run(config.bind)
        .await;

    Ok(())
}
