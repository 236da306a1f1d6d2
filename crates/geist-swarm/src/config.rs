use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use coordination::config::{
    DEFAULT_AGENT_COMMAND, DEFAULT_CREDENTIAL_VAR, DEFAULT_ENVIRONMENT_PREFIX, DEFAULT_IMAGE,
    DEFAULT_PERSONA_PATH, DEFAULT_SHARED_MOUNT, DEFAULT_SHARED_VOLUME, DEFAULT_WORKSPACE_DIR,
};
use coordination::SwarmSettings;
use secrecy::SecretString;
use serde::Deserialize;

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "geist.toml";

/// Top-level CLI configuration.
///
/// Layered as: built-in defaults, then `geist.toml`, then `GEIST_*`
/// environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SwarmConfig {
    /// Image every agent container is created from.
    pub image: String,
    /// Container name = `<container_prefix>-<name>`.
    pub container_prefix: String,
    pub shared_volume: String,
    pub shared_mount: String,
    pub workspace_dir: String,
    /// Persona location inside each container.
    pub persona_path: String,
    /// Command inside the container that answers a prompt read on stdin.
    pub agent_command: String,
    /// Variable holding the agent credential.
    pub credential_var: String,
    /// Persona files used to seed an empty registry.
    pub personas_dir: PathBuf,
    /// Where Markdown transcripts are written.
    pub conversations_dir: PathBuf,
    /// Where `.geist_swarm.json` and `.geist_conversations.json` live.
    pub state_dir: PathBuf,
    /// Pause after reviving a stopped container.
    pub revive_grace_ms: u64,
    /// Base seed for `ask` speaker order, advanced on every invocation.
    pub shuffle_seed: Option<u64>,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            image: DEFAULT_IMAGE.into(),
            container_prefix: DEFAULT_ENVIRONMENT_PREFIX.into(),
            shared_volume: DEFAULT_SHARED_VOLUME.into(),
            shared_mount: DEFAULT_SHARED_MOUNT.into(),
            workspace_dir: DEFAULT_WORKSPACE_DIR.into(),
            persona_path: DEFAULT_PERSONA_PATH.into(),
            agent_command: DEFAULT_AGENT_COMMAND.into(),
            credential_var: DEFAULT_CREDENTIAL_VAR.into(),
            personas_dir: PathBuf::from("personas"),
            conversations_dir: PathBuf::from("conversations"),
            state_dir: PathBuf::from("."),
            revive_grace_ms: 1000,
            shuffle_seed: None,
        }
    }
}

impl SwarmConfig {
    /// Load from `path` (must exist), or from `geist.toml` if present, then
    /// apply `GEIST_*` overrides from the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML")
    }

    /// Override fields from `GEIST_*` variables resolved through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str, field: &mut String| {
            if let Some(value) = lookup(key) {
                *field = value;
            }
        };
        text("GEIST_IMAGE", &mut self.image);
        text("GEIST_CONTAINER_PREFIX", &mut self.container_prefix);
        text("GEIST_SHARED_VOLUME", &mut self.shared_volume);
        text("GEIST_AGENT_COMMAND", &mut self.agent_command);
        text("GEIST_CREDENTIAL_VAR", &mut self.credential_var);

        if let Some(dir) = lookup("GEIST_PERSONAS_DIR") {
            self.personas_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("GEIST_CONVERSATIONS_DIR") {
            self.conversations_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("GEIST_STATE_DIR") {
            self.state_dir = PathBuf::from(dir);
        }
        if let Some(ms) = lookup("GEIST_REVIVE_GRACE_MS") {
            self.revive_grace_ms = ms.trim().parse().with_context(|| {
                format!("GEIST_REVIVE_GRACE_MS must be milliseconds, got {ms:?}")
            })?;
        }
        if let Some(seed) = lookup("GEIST_SHUFFLE_SEED") {
            let seed = seed
                .trim()
                .parse()
                .with_context(|| format!("GEIST_SHUFFLE_SEED must be an integer, got {seed:?}"))?;
            self.shuffle_seed = Some(seed);
        }
        Ok(())
    }

    /// Orchestrator settings carrying `credential`.
    pub fn settings(&self, credential: SecretString) -> SwarmSettings {
        let mut settings = SwarmSettings::new(credential);
        settings.image = self.image.clone();
        settings.environment_prefix = self.container_prefix.clone();
        settings.shared_volume = self.shared_volume.clone();
        settings.shared_mount = self.shared_mount.clone();
        settings.workspace_dir = self.workspace_dir.clone();
        settings.persona_path = self.persona_path.clone();
        settings.agent_command = self.agent_command.clone();
        settings.credential_var = self.credential_var.clone();
        settings.revive_grace = Duration::from_millis(self.revive_grace_ms);
        settings.shuffle_seed = self.shuffle_seed;
        settings
    }
}

/// Resolve the credential through `lookup`; missing or blank is fatal.
///
/// Callers load `.env` (via `dotenvy`) before this so that `lookup` sees it.
pub fn resolve_credential<F>(var: &str, lookup: F) -> Result<SecretString>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        Some(value) if !value.trim().is_empty() => Ok(SecretString::from(value)),
        _ => bail!(
            "{var} is not set. Add `{var}=...` to a .env file in this directory \
             or export it in your shell."
        ),
    }
}
