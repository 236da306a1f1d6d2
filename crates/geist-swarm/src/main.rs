use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use coordination::{DialogueOrchestrator, ExecutionBackend, StateStore};
use tracing::{info, warn};

use geist_swarm::cli::Cli;
use geist_swarm::config::{resolve_credential, SwarmConfig};
use geist_swarm::console::ConsoleObserver;
use geist_swarm::docker_bridge::DockerBridge;
use geist_swarm::render::MarkdownRenderer;
use geist_swarm::{commands, dry_run};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    // .env must be loaded before config and credential lookup
    dotenvy::dotenv().ok();

    let mut config = SwarmConfig::load(cli.config.as_deref())?;
    if let Some(dir) = cli.state_dir {
        config.state_dir = dir;
    }

    let lookup = |key: &str| std::env::var(key).ok();
    // held until exit; dropping it removes the dry-run state
    let scratch = cli
        .dry_run
        .then(dry_run::scratch_dir)
        .transpose()
        .context("Failed to create dry-run directory")?;

    let backend: Arc<dyn ExecutionBackend>;
    let credential = if let Some(scratch) = &scratch {
        let dir = scratch.path();
        warn!(dir = %dir.display(), "Dry run: using in-memory backend and scratch state");
        config.state_dir = dir.to_path_buf();
        config.conversations_dir = dir.join("conversations");
        backend = Arc::new(dry_run::backend());
        resolve_credential(&config.credential_var, lookup)
            .unwrap_or_else(|_| dry_run::placeholder_credential())
    } else {
        backend = Arc::new(DockerBridge::new());
        resolve_credential(&config.credential_var, lookup)?
    };

    info!(
        backend = backend.name(),
        image = %config.image,
        state_dir = %config.state_dir.display(),
        "geist starting"
    );

    let store = StateStore::open(&config.state_dir)
        .with_context(|| format!("Failed to open state in {}", config.state_dir.display()))?
        .shared();

    let orchestrator = DialogueOrchestrator::init(config.settings(credential), backend, store)
        .await
        .context("Docker is not available. Start Docker and try again.")?
        .with_renderer(Box::new(MarkdownRenderer::new(&config.conversations_dir)))
        .with_observer(Arc::new(ConsoleObserver));

    // scratch state starts empty on every dry run
    if cli.dry_run {
        commands::seed(&orchestrator, &config.personas_dir).await?;
    }

    let result = commands::dispatch(cli.command, &orchestrator, &config).await;
    orchestrator.shutdown();
    result
}
