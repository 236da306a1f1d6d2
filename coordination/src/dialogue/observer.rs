//! Progress notifications from a running dialogue.

use super::types::Dialogue;
use crate::turn::{Turn, TurnPhase};

/// Receives progress as a dialogue runs. Every method defaults to a no-op.
///
/// Calls happen on the orchestrating task, between turns; an observer must
/// not block for long.
pub trait DialogueObserver: Send + Sync {
    /// Preconditions passed; no turn has been produced yet.
    fn on_start(&self, _dialogue: &Dialogue) {}

    /// The next turn opens a new phase.
    fn on_phase(&self, _dialogue: &Dialogue, _phase: TurnPhase) {}

    /// `turn` was just appended to `dialogue`.
    fn on_turn(&self, _dialogue: &Dialogue, _turn: &Turn) {}

    /// The dialogue reached its terminal state.
    fn on_complete(&self, _dialogue: &Dialogue) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl DialogueObserver for NoopObserver {}
