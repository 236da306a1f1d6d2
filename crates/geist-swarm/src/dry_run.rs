//! `--dry-run`: the whole CLI against an in-memory backend.
//!
//! State and transcripts go to a throwaway directory so a dry run never
//! touches the real registry. The directory is removed when the returned
//! [`TempDir`] is dropped.

use coordination::turn::PROMPT_ENV_VAR;
use coordination::{InMemoryBackend, Invocation, RunOutput};
use secrecy::SecretString;
use tempfile::TempDir;

/// Credential used when none is configured during a dry run.
pub const PLACEHOLDER_CREDENTIAL: &str = "dry-run";

/// Backend whose agents echo the size of the prompt they were given.
pub fn backend() -> InMemoryBackend {
    InMemoryBackend::with_responder(respond)
}

fn respond(inv: &Invocation) -> RunOutput {
    match inv.env.get(PROMPT_ENV_VAR) {
        Some(prompt) => {
            let question = prompt
                .lines()
                .rev()
                .find(|line| !line.trim().is_empty())
                .unwrap_or_default();
            RunOutput::success(format!(
                "[dry run] {} received a {}-character prompt ending in: {}",
                inv.environment,
                prompt.chars().count(),
                question.trim()
            ))
        }
        None => RunOutput::success(""),
    }
}

/// Scratch directory for dry-run state; hold it for the process lifetime.
pub fn scratch_dir() -> std::io::Result<TempDir> {
    tempfile::Builder::new().prefix("geist-dry-run-").tempdir()
}

pub fn placeholder_credential() -> SecretString {
    SecretString::from(PLACEHOLDER_CREDENTIAL)
}
