//! Dialogue Orchestrator: owns the registry, turn engine and transcript sink
//!
//! Every protocol follows the same path:
//!
//! 1. validate preconditions (round count, participants registered);
//!    nothing touches the backend before this passes
//! 2. drive the protocol, one turn at a time
//! 3. hand the finished dialogue to the transcript sink

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

use super::ask::{self, ASK_ROUNDS};
use super::converse::{self, MIN_CONVERSE_PARTICIPANTS, MIN_CONVERSE_ROUNDS};
use super::debate::{self, Sides, MIN_DEBATE_ROUNDS};
use super::observer::{DialogueObserver, NoopObserver};
use super::types::{Dialogue, DialogueKind};
use crate::backend::{BackendError, EnvironmentHandle, ExecutionBackend};
use crate::config::SwarmSettings;
use crate::error::{SwarmError, SwarmResult};
use crate::registry::{parse_names, AgentName, AgentRegistry};
use crate::state::{PersistedDialogue, SharedStateStore};
use crate::transcript::{TranscriptReceipt, TranscriptRenderer, TranscriptSink};
use crate::turn::{Prompt, Turn, TurnEngine};

/// Result of one completed protocol run.
pub type DialogueOutcome = TranscriptReceipt;

/// Runs turns for a protocol: phase notifications, degraded-turn handling.
pub(crate) struct Conductor<'a> {
    engine: &'a TurnEngine,
    observer: &'a dyn DialogueObserver,
}

impl Conductor<'_> {
    /// Produce one turn for `speaker` and append it to `dialogue`.
    ///
    /// A vanished environment or a refused invocation yields a degraded
    /// turn; an unreachable backend and registry failures abort the run.
    pub(crate) async fn turn(
        &self,
        dialogue: &mut Dialogue,
        speaker: &AgentName,
        prompt: Prompt,
    ) -> SwarmResult<()> {
        if dialogue.turns().last().map(|t| t.phase) != Some(prompt.phase) {
            self.observer.on_phase(dialogue, prompt.phase);
        }

        let turn = match self.engine.ask(speaker, &prompt).await {
            Ok(turn) => turn,
            Err(SwarmError::EnvironmentNotFound { name, handle }) => {
                warn!(
                    agent = %name,
                    handle = %handle,
                    "Environment missing, recording degraded turn"
                );
                Turn::environment_missing(name, prompt.phase, &handle)
            }
            Err(SwarmError::Backend(BackendError::NotFound { handle })) => {
                warn!(agent = %speaker, handle = %handle, "Environment vanished during turn");
                let handle = EnvironmentHandle::new(handle);
                Turn::environment_missing(speaker.clone(), prompt.phase, &handle)
            }
            Err(SwarmError::Backend(err @ BackendError::Rejected { .. })) => {
                warn!(
                    agent = %speaker,
                    error = %err,
                    "Backend rejected turn, recording degraded turn"
                );
                Turn::rejected(speaker.clone(), prompt.phase, &err)
            }
            Err(e) => return Err(e),
        };

        dialogue.push(turn);
        if let Some(turn) = dialogue.turns().last() {
            self.observer.on_turn(dialogue, turn);
        }
        Ok(())
    }
}

/// Entry point for running dialogues against a set of registered agents.
pub struct DialogueOrchestrator {
    settings: Arc<SwarmSettings>,
    backend: Arc<dyn ExecutionBackend>,
    registry: Arc<AgentRegistry>,
    engine: TurnEngine,
    sink: TranscriptSink,
    observer: Arc<dyn DialogueObserver>,
    asks: AtomicU64,
}

impl DialogueOrchestrator {
    /// Build the orchestrator and probe the backend once.
    ///
    /// Fails with `BackendError::Unavailable` when the backend is down.
    pub async fn init(
        settings: SwarmSettings,
        backend: Arc<dyn ExecutionBackend>,
        store: SharedStateStore,
    ) -> SwarmResult<Self> {
        backend.ping().await?;

        let settings = Arc::new(settings);
        let registry = Arc::new(AgentRegistry::new(
            store.clone(),
            backend.clone(),
            settings.clone(),
        ));
        let engine = TurnEngine::new(registry.clone(), backend.clone(), settings.clone());

        info!(backend = backend.name(), image = %settings.image, "Orchestrator initialized");

        Ok(Self {
            settings,
            backend,
            registry,
            engine,
            sink: TranscriptSink::new(store),
            observer: Arc::new(NoopObserver),
            asks: AtomicU64::new(0),
        })
    }

    pub fn with_renderer(mut self, renderer: Box<dyn TranscriptRenderer>) -> Self {
        self.sink.set_renderer(renderer);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn DialogueObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &SwarmSettings {
        &self.settings
    }

    /// Every persisted dialogue in append order.
    pub fn history(&self) -> SwarmResult<Vec<PersistedDialogue>> {
        self.sink.history()
    }

    /// Structured poll. An empty `participants` means every registered agent.
    pub async fn ask(
        &self,
        question: &str,
        participants: &[String],
    ) -> SwarmResult<DialogueOutcome> {
        let names = self.participants_or_all(participants)?;
        if names.is_empty() {
            return Err(SwarmError::NoParticipants);
        }
        self.ensure_registered(&names)?;

        let invocation = self.asks.fetch_add(1, Ordering::Relaxed);
        let seed = self
            .settings
            .shuffle_seed
            .map(|base| ask::invocation_seed(base, invocation));
        let order = ask::speaking_order(names, seed);
        let mut dialogue = Dialogue::new(DialogueKind::Ask, question, order, ASK_ROUNDS);
        self.begin(&dialogue);

        ask::run(&self.conductor(), &mut dialogue).await?;
        self.finish(dialogue)
    }

    /// Round-robin conversation over `rounds` rounds.
    pub async fn converse(
        &self,
        topic: &str,
        rounds: u32,
        participants: &[String],
    ) -> SwarmResult<DialogueOutcome> {
        if rounds < MIN_CONVERSE_ROUNDS {
            return Err(SwarmError::InvalidRounds {
                protocol: "converse",
                minimum: MIN_CONVERSE_ROUNDS,
                requested: rounds,
            });
        }
        let names = self.participants_or_all(participants)?;
        if names.len() < MIN_CONVERSE_PARTICIPANTS {
            return Err(SwarmError::InsufficientParticipants {
                required: MIN_CONVERSE_PARTICIPANTS,
                found: names.len(),
            });
        }
        self.ensure_registered(&names)?;

        let mut dialogue = Dialogue::new(DialogueKind::Converse, topic, names, rounds);
        self.begin(&dialogue);

        converse::run(&self.conductor(), &mut dialogue).await?;
        self.finish(dialogue)
    }

    /// Formal debate between two distinct registered agents.
    pub async fn debate(
        &self,
        topic: &str,
        affirmative: &str,
        negative: &str,
        rounds: u32,
    ) -> SwarmResult<DialogueOutcome> {
        if rounds < MIN_DEBATE_ROUNDS {
            return Err(SwarmError::InvalidRounds {
                protocol: "debate",
                minimum: MIN_DEBATE_ROUNDS,
                requested: rounds,
            });
        }
        let sides = Sides {
            affirmative: AgentName::parse(affirmative)?,
            negative: AgentName::parse(negative)?,
        };
        if sides.affirmative == sides.negative {
            return Err(SwarmError::InsufficientParticipants {
                required: 2,
                found: 1,
            });
        }
        self.ensure_registered(&[sides.affirmative.clone(), sides.negative.clone()])?;

        let participants = vec![sides.affirmative.clone(), sides.negative.clone()];
        let mut dialogue = Dialogue::new(DialogueKind::Debate, topic, participants, rounds);
        self.begin(&dialogue);

        debate::run(&self.conductor(), &mut dialogue, &sides).await?;
        self.finish(dialogue)
    }

    /// Explicit teardown. Durable state is already flushed after every
    /// mutation, so this only releases the backend connection.
    pub fn shutdown(self) {
        info!(backend = self.backend.name(), "Orchestrator shut down");
    }

    /// Canonical, de-duplicated names; all registered agents when empty.
    fn participants_or_all(&self, raw: &[String]) -> SwarmResult<Vec<AgentName>> {
        let names = parse_names(raw)?;
        if !names.is_empty() {
            return Ok(names);
        }
        Ok(self
            .registry
            .records()?
            .into_iter()
            .map(|r| r.name)
            .collect())
    }

    /// Fails on the first unregistered name, before any turn runs.
    fn ensure_registered(&self, names: &[AgentName]) -> SwarmResult<()> {
        for name in names {
            if !self.registry.is_registered(name)? {
                return Err(SwarmError::agent_not_found(name));
            }
        }
        Ok(())
    }

    fn conductor(&self) -> Conductor<'_> {
        Conductor {
            engine: &self.engine,
            observer: self.observer.as_ref(),
        }
    }

    fn begin(&self, dialogue: &Dialogue) {
        info!(
            dialogue = %dialogue.id,
            kind = %dialogue.kind,
            participants = dialogue.participants.len(),
            rounds = dialogue.rounds,
            "Dialogue started"
        );
        self.observer.on_start(dialogue);
    }

    fn finish(&self, dialogue: Dialogue) -> SwarmResult<DialogueOutcome> {
        let degraded = dialogue.degraded_turns();
        if degraded > 0 {
            warn!(dialogue = %dialogue.id, degraded, "Dialogue completed with degraded turns");
        }
        self.observer.on_complete(&dialogue);
        self.sink.persist(dialogue)
    }
}
