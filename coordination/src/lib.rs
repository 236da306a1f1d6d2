//! Geist swarm coordination library
//!
//! This library provides:
//! - an execution backend contract for isolated, long-running agent
//!   environments, plus a deterministic in-memory backend
//! - the agent registry: create / list / resolve / stop / remove / reset
//! - the turn engine: one request/response exchange with one agent
//! - three dialogue protocols driven by the orchestrator: `ask`, `converse`
//!   and `debate`
//! - durable state: the agent registry file and the append-only
//!   conversation log
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use coordination::{DialogueOrchestrator, InMemoryBackend, StateStore, SwarmSettings};
//!
//! let store = StateStore::open(".")?.shared();
//! let orchestrator = DialogueOrchestrator::init(
//!     SwarmSettings::for_tests(),
//!     Arc::new(InMemoryBackend::new()),
//!     store,
//! )
//! .await?;
//! orchestrator.registry().create("socrates", "personas/socrates.txt".as_ref()).await?;
//! orchestrator.registry().create("dogen", "personas/dogen.txt".as_ref()).await?;
//! let outcome = orchestrator.converse("What is time?", 2, &[]).await?;
//! ```

pub mod backend;
pub mod config;
pub mod dialogue;
pub mod error;
pub mod registry;
pub mod state;
pub mod transcript;
pub mod turn;

// Re-export key backend types
pub use backend::{
    BackendError, BackendResult, EnvironmentHandle, EnvironmentSpec, EnvironmentStatus,
    ExecutionBackend, InMemoryBackend, Invocation, RunOutput, VolumeMount,
};

// Re-export configuration and errors
pub use config::SwarmSettings;
pub use error::{SwarmError, SwarmResult};

// Re-export registry types
pub use registry::{AgentEntry, AgentName, AgentRegistry, Release, ResetReport};

// Re-export dialogue types
pub use dialogue::{
    DebateStage, Dialogue, DialogueKind, DialogueObserver, DialogueOrchestrator, DialogueOutcome,
    NoopObserver, Side,
};

// Re-export turn and transcript types
pub use transcript::{TranscriptReceipt, TranscriptRenderer, TranscriptSink};
pub use turn::{Prompt, Role, Turn, TurnEngine, TurnFailure, TurnPhase};

// Re-export key state types
pub use state::{
    AgentRecord, PersistedDialogue, RegistrySnapshot, SharedStateStore, StateStore, StoreError,
};
