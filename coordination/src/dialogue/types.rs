//! Dialogue records.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::registry::AgentName;
use crate::turn::Turn;

/// Protocol that produced a dialogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogueKind {
    /// Two-round poll: initial answers, then rebuttals.
    Ask,
    /// Round-robin over a topic.
    Converse,
    /// Affirmative vs negative.
    Debate,
}

impl fmt::Display for DialogueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ask => write!(f, "ask"),
            Self::Converse => write!(f, "converse"),
            Self::Debate => write!(f, "debate"),
        }
    }
}

/// Ordered turns of one orchestration run.
///
/// Append-only while the run is in progress; turns can only be added
/// through the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dialogue {
    pub id: Uuid,
    pub kind: DialogueKind,
    /// Originating question or topic.
    pub topic: String,
    /// Participants in invocation order. For debates: `[affirmative, negative]`.
    pub participants: Vec<AgentName>,
    /// Round count the run was scheduled with.
    pub rounds: u32,
    pub started_at: DateTime<Utc>,
    turns: Vec<Turn>,
}

impl Dialogue {
    pub fn new(kind: DialogueKind, topic: &str, participants: Vec<AgentName>, rounds: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            topic: topic.to_string(),
            participants,
            rounds,
            started_at: Utc::now(),
            turns: Vec::new(),
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub(crate) fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Turn count at the protocol's terminal state.
    pub fn expected_turns(&self) -> usize {
        let n = self.participants.len();
        let rounds = self.rounds as usize;
        match self.kind {
            DialogueKind::Ask => 2 * n,
            DialogueKind::Converse => rounds * n,
            DialogueKind::Debate => 2 * rounds + 2,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.turns.len() == self.expected_turns()
    }

    /// Turns carrying a failure marker.
    pub fn degraded_turns(&self) -> usize {
        self.turns.iter().filter(|t| t.is_degraded()).count()
    }

    /// Most recent turn by `speaker`.
    pub fn last_by(&self, speaker: &AgentName) -> Option<&Turn> {
        self.turns.iter().rev().find(|t| &t.speaker == speaker)
    }
}
