//! Command dispatch for the `geist` binary.

use std::path::Path;

use anyhow::{Context, Result};
use coordination::{AgentName, DialogueOrchestrator, DialogueOutcome, Release};
use tracing::info;

use crate::cli::Command;
use crate::config::SwarmConfig;
use crate::console;

/// Run one command against an initialized orchestrator.
pub async fn dispatch(
    command: Command,
    orchestrator: &DialogueOrchestrator,
    config: &SwarmConfig,
) -> Result<()> {
    if command.seeds_personas() {
        seed(orchestrator, &config.personas_dir).await?;
    }

    match command {
        Command::Create { name, persona } => {
            let record = orchestrator
                .registry()
                .create(&name, &persona)
                .await
                .with_context(|| format!("Failed to create geist {name}"))?;
            println!("✓ Created {} ({})", record.name, record.handle);
        }
        Command::List => {
            let entries = orchestrator.registry().list().await?;
            if entries.is_empty() {
                println!("No geists found. Create one with `geist create <name> <persona-file>`.");
            } else {
                print!("{}", console::agent_table(&entries));
            }
        }
        Command::Ask { question, geists } => {
            let outcome = orchestrator.ask(&question, &geists).await?;
            report_saved(&outcome);
        }
        Command::Converse {
            topic,
            rounds,
            geists,
        } => {
            let outcome = orchestrator.converse(&topic, rounds, &geists).await?;
            report_saved(&outcome);
        }
        Command::Debate {
            topic,
            affirmative,
            negative,
            rounds,
        } => {
            let outcome = orchestrator
                .debate(&topic, &affirmative, &negative, rounds)
                .await?;
            report_saved(&outcome);
        }
        Command::Remove { name } => {
            let name = AgentName::parse(&name)?;
            match orchestrator.registry().remove(&name).await? {
                Release::Removed => println!("✓ Removed {name}"),
                Release::AlreadyGone => {
                    println!("⚠ Container for {name} not found, removed from registry")
                }
            }
        }
        Command::Stop { name } => {
            let name = AgentName::parse(&name)?;
            if orchestrator.registry().stop(&name).await? {
                println!("✓ Stopped {name}");
            } else {
                println!("{name} is already stopped");
            }
        }
        Command::Reset => {
            let report = orchestrator.registry().reset_all().await?;
            print!("{}", console::reset_summary(&report));
        }
        Command::History => {
            let entries = orchestrator.history()?;
            print!("{}", console::history(&entries));
        }
    }
    Ok(())
}

/// Create agents from the persona directory when the registry is empty.
pub async fn seed(orchestrator: &DialogueOrchestrator, dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }
    let created = orchestrator.registry().seed_from_dir(dir).await?;
    for name in &created {
        println!("✓ Created {name} from {}", dir.display());
    }
    if !created.is_empty() {
        info!(count = created.len(), "Seeded geists from personas");
    }
    Ok(())
}

fn report_saved(outcome: &DialogueOutcome) {
    match &outcome.rendered {
        Some(path) => println!("\n✓ Transcript saved to {}", path.display()),
        None => println!("\n✓ Dialogue saved ({} in log)", outcome.log_len),
    }
}
