//! Turn Engine: one request/response exchange with one agent
//!
//! ```text
//!   Prompt ──► instruction payload ──► resolve(name) ──► run(bash -c ...)
//!                                                          │
//!                        exit 0 ──► Turn { content: trimmed output }
//!                        exit n ──► Turn { content: diagnostic, error: NonZeroExit }
//! ```
//!
//! A failing invocation is returned as a degraded [`Turn`], never as an
//! error, so one misbehaving agent cannot abort a multi-party dialogue.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::backend::{BackendError, EnvironmentHandle, ExecutionBackend, RunOutput};
use crate::config::SwarmSettings;
use crate::error::SwarmResult;
use crate::registry::{AgentName, AgentRegistry};

/// Variable carrying the instruction payload into the agent command.
pub const PROMPT_ENV_VAR: &str = "GEIST_PROMPT";

/// Origin of a turn's content.
///
/// Dialogues record agent replies only; the question or topic lives on the
/// dialogue itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// Where in a protocol a turn was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TurnPhase {
    /// `ask` round 1.
    Initial,
    /// `ask` round 2, or a debate rebuttal round (2..=R).
    Rebuttal { round: u32 },
    /// `converse` round, 1-indexed.
    Round { number: u32 },
    Opening,
    Closing,
}

impl fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initial => write!(f, "initial"),
            Self::Rebuttal { round } => write!(f, "rebuttal {round}"),
            Self::Round { number } => write!(f, "round {number}"),
            Self::Opening => write!(f, "opening"),
            Self::Closing => write!(f, "closing"),
        }
    }
}

/// Why a turn's content is a diagnostic instead of a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TurnFailure {
    /// The agent command exited non-zero.
    NonZeroExit { exit_code: i64 },
    /// The environment disappeared while the dialogue was running.
    EnvironmentMissing,
    /// The backend refused to run the agent command.
    Rejected,
}

impl fmt::Display for TurnFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonZeroExit { exit_code } => write!(f, "exit code {exit_code}"),
            Self::EnvironmentMissing => write!(f, "environment missing"),
            Self::Rejected => write!(f, "rejected by backend"),
        }
    }
}

/// One immutable request/response record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: AgentName,
    pub role: Role,
    pub phase: TurnPhase,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TurnFailure>,
}

impl Turn {
    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }

    /// Turn recorded when the speaker's environment vanished mid-dialogue.
    pub fn environment_missing(
        speaker: AgentName,
        phase: TurnPhase,
        handle: &EnvironmentHandle,
    ) -> Self {
        Self {
            content: format!("[Error environment {handle} not found]"),
            speaker,
            role: Role::Assistant,
            phase,
            timestamp: Utc::now(),
            error: Some(TurnFailure::EnvironmentMissing),
        }
    }

    /// Turn recorded when the backend refused the speaker's invocation.
    pub fn rejected(speaker: AgentName, phase: TurnPhase, reason: &BackendError) -> Self {
        Self {
            content: format!("[Error {reason}]"),
            speaker,
            role: Role::Assistant,
            phase,
            timestamp: Utc::now(),
            error: Some(TurnFailure::Rejected),
        }
    }
}

/// Question plus free-text context for one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub phase: TurnPhase,
    pub question: String,
    pub context: String,
}

impl Prompt {
    pub fn new(phase: TurnPhase, question: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            phase,
            question: question.into(),
            context: context.into(),
        }
    }
}

/// Produces one [`Turn`] per call; stateless between calls.
pub struct TurnEngine {
    registry: Arc<AgentRegistry>,
    backend: Arc<dyn ExecutionBackend>,
    settings: Arc<SwarmSettings>,
}

impl TurnEngine {
    pub fn new(
        registry: Arc<AgentRegistry>,
        backend: Arc<dyn ExecutionBackend>,
        settings: Arc<SwarmSettings>,
    ) -> Self {
        Self {
            registry,
            backend,
            settings,
        }
    }

    /// Instruction payload handed to the agent command.
    pub fn instruction(&self, speaker: &AgentName, prompt: &Prompt) -> String {
        format!(
            "You are {speaker}, embodying the personality and perspective described in your \
             personality file at {persona}.\n\n\
             {context}\n\n\
             Question: {question}\n\n\
             Respond as {speaker} would, staying true to their philosophy and communication style.",
            persona = self.settings.persona_path,
            context = prompt.context,
            question = prompt.question,
        )
    }

    /// Shell command that pipes the payload variable into the agent command.
    pub fn command(&self) -> Vec<String> {
        vec![
            "bash".to_string(),
            "-c".to_string(),
            format!(
                "printf '%s' \"${PROMPT_ENV_VAR}\" | {}",
                self.settings.agent_command
            ),
        ]
    }

    /// Resolve `speaker` (reviving it if stopped) and run one exchange.
    ///
    /// Registry and backend failures are errors; a non-zero exit is not.
    pub async fn ask(&self, speaker: &AgentName, prompt: &Prompt) -> SwarmResult<Turn> {
        let handle = self.registry.resolve(speaker).await?;

        let mut env = self.settings.credential_env();
        env.insert(
            PROMPT_ENV_VAR.to_string(),
            self.instruction(speaker, prompt),
        );

        let output = self.backend.run(&handle, &self.command(), &env).await?;
        debug!(
            agent = %speaker,
            phase = %prompt.phase,
            exit_code = output.exit_code,
            output_len = output.output.len(),
            "Turn completed"
        );

        Ok(Self::turn_from_output(speaker.clone(), prompt.phase, output))
    }

    fn turn_from_output(speaker: AgentName, phase: TurnPhase, output: RunOutput) -> Turn {
        let text = output.output.trim();
        let (content, error) = if output.is_success() {
            (text.to_string(), None)
        } else {
            warn!(agent = %speaker, exit_code = output.exit_code, "Agent invocation failed");
            (
                format!("[Error exit code {}]\n{}", output.exit_code, text),
                Some(TurnFailure::NonZeroExit {
                    exit_code: output.exit_code,
                }),
            )
        };

        Turn {
            speaker,
            role: Role::Assistant,
            phase,
            content,
            timestamp: Utc::now(),
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;
    use crate::state::StateStore;

    async fn engine_with(
        backend: Arc<InMemoryBackend>,
    ) -> (tempfile::TempDir, TurnEngine, AgentName) {
        let dir = tempfile::tempdir().unwrap();
        let persona = dir.path().join("p.txt");
        std::fs::write(&persona, "Ancient.").unwrap();

        let settings = Arc::new(SwarmSettings::for_tests());
        let store = StateStore::open(dir.path()).unwrap().shared();
        let registry = Arc::new(AgentRegistry::new(store, backend.clone(), settings.clone()));
        let record = registry.create("thales", &persona).await.unwrap();
        (dir, TurnEngine::new(registry, backend, settings), record.name)
    }

    #[tokio::test]
    async fn test_successful_turn_is_trimmed() {
        let backend = Arc::new(InMemoryBackend::with_responder(|_| {
            RunOutput::success("\n  Water is the principle.  \n")
        }));
        let (_dir, engine, name) = engine_with(backend.clone()).await;

        let prompt = Prompt::new(TurnPhase::Initial, "What is everything?", "");
        let turn = engine.ask(&name, &prompt).await.unwrap();

        assert_eq!(turn.content, "Water is the principle.");
        assert_eq!(turn.role, Role::Assistant);
        assert!(!turn.is_degraded());

        let last = backend.invocations().pop().unwrap();
        let payload = last.env.get(PROMPT_ENV_VAR).unwrap();
        assert!(payload.starts_with("You are @thales, embodying"));
        assert!(payload.contains("Question: What is everything?"));
        assert!(last.env.contains_key("ANTHROPIC_API_KEY"));
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_data() {
        let backend = Arc::new(InMemoryBackend::new());
        let (_dir, engine, name) = engine_with(backend.clone()).await;
        backend.fail_environment("geist-swarm-thales", RunOutput::failure(3, "rate limited\n"));

        let prompt = Prompt::new(TurnPhase::Opening, "q", "c");
        let turn = engine.ask(&name, &prompt).await.unwrap();

        assert_eq!(turn.content, "[Error exit code 3]\nrate limited");
        assert_eq!(turn.error, Some(TurnFailure::NonZeroExit { exit_code: 3 }));
    }

    #[tokio::test]
    async fn test_ask_revives_stopped_agent() {
        let backend = Arc::new(InMemoryBackend::new());
        let (_dir, engine, name) = engine_with(backend.clone()).await;
        let handle = backend.invocations()[0].handle.clone();
        backend.stop_externally(&handle);

        let turn = engine
            .ask(&name, &Prompt::new(TurnPhase::Closing, "q", ""))
            .await
            .unwrap();
        assert!(turn.content.starts_with("geist-swarm-thales reply"));
    }

    #[tokio::test]
    async fn test_command_pipes_payload_variable() {
        let (_dir, engine, _) = engine_with(Arc::new(InMemoryBackend::new())).await;
        assert_eq!(
            engine.command(),
            vec![
                "bash".to_string(),
                "-c".to_string(),
                "printf '%s' \"$GEIST_PROMPT\" | ~/.local/bin/claude --print".to_string(),
            ]
        );
    }

    #[test]
    fn test_turn_serialization_omits_absent_error() {
        let turn = Turn {
            speaker: AgentName::parse("a").unwrap(),
            role: Role::Assistant,
            phase: TurnPhase::Rebuttal { round: 2 },
            content: "x".to_string(),
            timestamp: Utc::now(),
            error: None,
        };
        let json = serde_json::to_value(&turn).unwrap();
        assert!(json.get("error").is_none());
        assert_eq!(json["phase"]["kind"], "rebuttal");
        assert_eq!(json["phase"]["round"], 2);
        assert_eq!(json["role"], "assistant");
    }

    #[test]
    fn test_unknown_role_is_rejected_on_load() {
        let json = serde_json::json!({
            "speaker": "@a",
            "role": "user",
            "phase": { "kind": "initial" },
            "content": "x",
            "timestamp": "2026-01-01T00:00:00Z",
        });
        assert!(serde_json::from_value::<Turn>(json).is_err());
    }
}
