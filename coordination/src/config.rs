//! Orchestrator configuration.
//!
//! [`SwarmSettings`] is built once by the outer command layer and handed to
//! the orchestrator constructor; nothing in this crate reads process-wide
//! state on its own.

use std::collections::BTreeMap;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::backend::{EnvironmentSpec, VolumeMount};
use crate::registry::AgentName;

pub const DEFAULT_IMAGE: &str = "geist-runner";
pub const DEFAULT_ENVIRONMENT_PREFIX: &str = "geist-swarm";
pub const DEFAULT_SHARED_VOLUME: &str = "geist-shared";
pub const DEFAULT_SHARED_MOUNT: &str = "/shared";
pub const DEFAULT_WORKSPACE_DIR: &str = "/workspace";
pub const DEFAULT_PERSONA_PATH: &str = "/workspace/personality.txt";
pub const DEFAULT_AGENT_COMMAND: &str = "~/.local/bin/claude --print";
pub const DEFAULT_CREDENTIAL_VAR: &str = "ANTHROPIC_API_KEY";

/// Everything the registry and turn engine need to talk to environments.
#[derive(Debug)]
pub struct SwarmSettings {
    /// Image every agent environment is created from.
    pub image: String,
    /// Environment name = `<prefix>-<bare agent name>`.
    pub environment_prefix: String,
    /// Volume shared read-write by every agent.
    pub shared_volume: String,
    pub shared_mount: String,
    pub workspace_dir: String,
    /// Where the persona payload lives inside each environment.
    pub persona_path: String,
    /// Shell command that reads a prompt on stdin and prints the reply.
    pub agent_command: String,
    /// Name of the variable carrying the credential into environments.
    pub credential_var: String,
    credential: SecretString,
    /// Pause after lazily starting a stopped environment.
    pub revive_grace: Duration,
    /// Base seed for `ask` speaker shuffling, advanced on every invocation;
    /// `None` draws from entropy.
    pub shuffle_seed: Option<u64>,
}

impl SwarmSettings {
    /// Settings with every default and the given credential.
    pub fn new(credential: SecretString) -> Self {
        Self {
            image: DEFAULT_IMAGE.to_string(),
            environment_prefix: DEFAULT_ENVIRONMENT_PREFIX.to_string(),
            shared_volume: DEFAULT_SHARED_VOLUME.to_string(),
            shared_mount: DEFAULT_SHARED_MOUNT.to_string(),
            workspace_dir: DEFAULT_WORKSPACE_DIR.to_string(),
            persona_path: DEFAULT_PERSONA_PATH.to_string(),
            agent_command: DEFAULT_AGENT_COMMAND.to_string(),
            credential_var: DEFAULT_CREDENTIAL_VAR.to_string(),
            credential,
            revive_grace: Duration::from_secs(1),
            shuffle_seed: None,
        }
    }

    /// Settings suitable for the in-memory backend: no revival pause, fixed seed.
    pub fn for_tests() -> Self {
        let mut settings = Self::new(SecretString::from("test-credential".to_string()));
        settings.revive_grace = Duration::ZERO;
        settings.shuffle_seed = Some(7);
        settings
    }

    /// Backend-side name of an agent's environment.
    pub fn environment_name(&self, agent: &AgentName) -> String {
        format!("{}-{}", self.environment_prefix, agent.bare())
    }

    /// Environment variables every invocation carries.
    pub fn credential_env(&self) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();
        env.insert(
            self.credential_var.clone(),
            self.credential.expose_secret().to_string(),
        );
        env
    }

    /// Full creation spec for an agent's environment.
    pub fn environment_spec(&self, agent: &AgentName) -> EnvironmentSpec {
        EnvironmentSpec {
            name: self.environment_name(agent),
            image: self.image.clone(),
            env: self.credential_env(),
            mounts: vec![VolumeMount::read_write(
                &self.shared_volume,
                &self.shared_mount,
            )],
            working_dir: self.workspace_dir.clone(),
            command: vec!["tail".into(), "-f".into(), "/dev/null".into()],
        }
    }
}
