//! Error taxonomy for registry, turn and dialogue operations.
//!
//! Structural and precondition failures are values of [`SwarmError`] and
//! abort a command before any side effect. A failing agent invocation is
//! *not* an error: it is carried as [`crate::turn::TurnFailure`] data on the
//! Turn it produced.

use std::path::PathBuf;

use thiserror::Error;

use crate::backend::{BackendError, EnvironmentHandle};
use crate::registry::AgentName;
use crate::state::StoreError;

/// Result type alias for coordination operations
pub type SwarmResult<T> = Result<T, SwarmError>;

/// Errors surfaced by the registry, the turn engine and the orchestrator
#[derive(Error, Debug)]
pub enum SwarmError {
    /// The name is not present in the agent registry
    #[error("Agent {name} not found")]
    AgentNotFound { name: AgentName },

    /// The registry entry exists but the backend no longer knows its environment
    #[error("Environment {handle} for agent {name} not found")]
    EnvironmentNotFound {
        name: AgentName,
        handle: EnvironmentHandle,
    },

    /// Duplicate agent name on create
    #[error("Agent {name} already exists")]
    AlreadyExists { name: AgentName },

    /// A raw name could not be turned into a canonical agent name
    #[error("Invalid agent name {raw:?}: {reason}")]
    InvalidName { raw: String, reason: String },

    /// Persona source missing or not valid UTF-8
    #[error("Persona file {} is unreadable: {source}", path.display())]
    PersonaUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing the persona into a freshly created environment failed
    #[error("Failed to install persona for {name} (exit code {exit_code}): {output}")]
    PersonaInjectionFailed {
        name: AgentName,
        exit_code: i64,
        output: String,
    },

    /// `ask` resolved an empty participant set
    #[error("No agents available. Create some first.")]
    NoParticipants,

    /// Protocol needs more distinct participants than were supplied
    #[error("Need at least {required} distinct agents, found {found}")]
    InsufficientParticipants { required: usize, found: usize },

    /// Round count below the protocol minimum
    #[error("{protocol} needs at least {minimum} rounds, got {requested}")]
    InvalidRounds {
        protocol: &'static str,
        minimum: u32,
        requested: u32,
    },

    /// Execution backend failure
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Durable state failure
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SwarmError {
    /// Whether this is a recoverable "named thing is absent" condition.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::AgentNotFound { .. }
                | Self::EnvironmentNotFound { .. }
                | Self::Backend(BackendError::NotFound { .. })
        )
    }

    /// Whether the execution backend itself could not be reached.
    pub fn is_backend_unavailable(&self) -> bool {
        matches!(self, Self::Backend(BackendError::Unavailable { .. }))
    }

    pub(crate) fn agent_not_found(name: &AgentName) -> Self {
        Self::AgentNotFound { name: name.clone() }
    }
}
