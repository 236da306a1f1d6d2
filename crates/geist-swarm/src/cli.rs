use std::path::PathBuf;

use clap::{Parser, Subcommand};
use coordination::dialogue::converse::DEFAULT_CONVERSE_ROUNDS;
use coordination::dialogue::debate::DEFAULT_DEBATE_ROUNDS;

/// Persona-driven agents in Docker containers that ask, converse and debate.
#[derive(Debug, Parser)]
#[command(name = "geist", version, about)]
pub struct Cli {
    /// Config file (defaults to ./geist.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding the registry and conversation log
    #[arg(long, global = true)]
    pub state_dir: Option<PathBuf>,

    /// Run against an in-memory backend instead of Docker
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum Command {
    /// Create a geist from a persona file
    Create {
        name: String,
        persona: PathBuf,
    },

    /// List geists and their container status
    List,

    /// Ask a question: everyone answers, then everyone rebuts
    Ask {
        question: String,
        /// Participating geists (default: all)
        #[arg(long = "geist", value_delimiter = ',')]
        geists: Vec<String>,
    },

    /// Round-robin conversation on a topic
    Converse {
        topic: String,
        #[arg(long, default_value_t = DEFAULT_CONVERSE_ROUNDS)]
        rounds: u32,
        /// Participating geists (default: all)
        #[arg(long, value_delimiter = ',')]
        geists: Vec<String>,
    },

    /// Formal debate between two geists
    Debate {
        topic: String,
        /// Affirmative side
        #[arg(long = "for")]
        affirmative: String,
        /// Negative side
        #[arg(long = "against")]
        negative: String,
        #[arg(long, default_value_t = DEFAULT_DEBATE_ROUNDS)]
        rounds: u32,
    },

    /// Stop and remove a geist's container and forget it
    Remove { name: String },

    /// Stop a geist's container; it restarts on its next turn
    Stop { name: String },

    /// Remove every geist and the registry file
    Reset,

    /// Print every saved dialogue
    History,
}

impl Command {
    /// Whether the command should seed agents from the persona directory
    /// when none exist yet.
    pub fn seeds_personas(&self) -> bool {
        matches!(self, Self::List | Self::Ask { .. })
    }
}
