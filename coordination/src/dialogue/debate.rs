//! `debate`: formal two-sided debate.
//!
//! ```text
//!   Opening ──► Rebuttal{2} ──► ... ──► Rebuttal{R} ──► Closing ──► Concluded
//! ```
//!
//! Every stage is one affirmative turn followed by one negative turn.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::context::{
    preview, recent_exchanges, DEBATE_WINDOW, OPPONENT_PREVIEW_CHARS, PREVIEW_CHARS,
};
use super::orchestrator::Conductor;
use super::types::Dialogue;
use crate::error::SwarmResult;
use crate::registry::AgentName;
use crate::turn::{Prompt, Turn, TurnPhase};

pub const DEFAULT_DEBATE_ROUNDS: u32 = 3;
pub const MIN_DEBATE_ROUNDS: u32 = 2;

/// Side a debater argues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Affirmative,
    Negative,
}

impl Side {
    /// Speaking order within every stage.
    pub const ORDER: [Side; 2] = [Side::Affirmative, Side::Negative];

    pub fn opponent(self) -> Self {
        match self {
            Self::Affirmative => Self::Negative,
            Self::Negative => Self::Affirmative,
        }
    }

    /// Short stance label for console and transcript headings.
    pub fn label(self) -> &'static str {
        match self {
            Self::Affirmative => "PRO",
            Self::Negative => "CON",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Affirmative => write!(f, "affirmative"),
            Self::Negative => write!(f, "negative"),
        }
    }
}

/// Stage of a debate run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DebateStage {
    Opening,
    Rebuttal { round: u32 },
    Closing,
    Concluded,
}

impl DebateStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Concluded)
    }

    /// Successor stage for a debate of `rounds` rounds.
    pub fn next(self, rounds: u32) -> Self {
        match self {
            Self::Opening if rounds >= MIN_DEBATE_ROUNDS => Self::Rebuttal { round: 2 },
            Self::Opening => Self::Closing,
            Self::Rebuttal { round } if round < rounds => Self::Rebuttal { round: round + 1 },
            Self::Rebuttal { .. } => Self::Closing,
            Self::Closing | Self::Concluded => Self::Concluded,
        }
    }

    /// Label carried by turns produced in this stage.
    pub fn turn_phase(self) -> Option<TurnPhase> {
        match self {
            Self::Opening => Some(TurnPhase::Opening),
            Self::Rebuttal { round } => Some(TurnPhase::Rebuttal { round }),
            Self::Closing => Some(TurnPhase::Closing),
            Self::Concluded => None,
        }
    }
}

impl fmt::Display for DebateStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Opening => write!(f, "opening"),
            Self::Rebuttal { round } => write!(f, "rebuttal_{round}"),
            Self::Closing => write!(f, "closing"),
            Self::Concluded => write!(f, "concluded"),
        }
    }
}

/// The two debaters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sides {
    pub affirmative: AgentName,
    pub negative: AgentName,
}

impl Sides {
    pub fn speaker(&self, side: Side) -> &AgentName {
        match side {
            Side::Affirmative => &self.affirmative,
            Side::Negative => &self.negative,
        }
    }
}

fn stance(side: Side) -> &'static str {
    match side {
        Side::Affirmative => "FOR",
        Side::Negative => "AGAINST",
    }
}

pub fn opening_prompt(topic: &str, side: Side) -> Prompt {
    let (position, question) = match side {
        Side::Affirmative => (
            "You are arguing FOR the affirmative position (supporting the proposition).",
            format!("Present your opening statement arguing that: {topic}"),
        ),
        Side::Negative => (
            "You are arguing AGAINST the affirmative position (opposing the proposition).",
            format!("Present your opening statement arguing that: {topic} is FALSE or MISGUIDED"),
        ),
    };
    let context =
        format!("You are participating in a formal debate.\n\nTopic: {topic}\n\n{position}");
    Prompt::new(TurnPhase::Opening, question, context)
}

/// Rebuttal for `round`: the opponent's latest statement, and once the log
/// holds more than the two openings, the last [`DEBATE_WINDOW`] turns.
pub fn rebuttal_prompt(
    topic: &str,
    side: Side,
    round: u32,
    opponent: &AgentName,
    opponent_latest: Option<&Turn>,
    log: &[Turn],
) -> Prompt {
    let mut context = format!(
        "You are participating in a formal debate.\n\nTopic: {topic}\n\n\
         You are arguing {} the affirmative position.\n\n",
        stance(side)
    );
    if let Some(turn) = opponent_latest {
        context.push_str(&format!(
            "Your opponent {opponent} argued:\n{}\n\n",
            preview(&turn.content, OPPONENT_PREVIEW_CHARS)
        ));
    }
    if log.len() > 2 {
        context.push_str("Previous exchanges:\n");
        context.push_str(&recent_exchanges(log, DEBATE_WINDOW, PREVIEW_CHARS));
    }

    let question = match side {
        Side::Affirmative => {
            format!("Rebut your opponent's arguments and strengthen your position that: {topic}")
        }
        Side::Negative => {
            format!("Rebut your opponent's arguments and strengthen your position against: {topic}")
        }
    };
    Prompt::new(TurnPhase::Rebuttal { round }, question, context)
}

pub fn closing_prompt(topic: &str, side: Side) -> Prompt {
    let question = match side {
        Side::Affirmative => {
            "Present your closing statement, summarizing why your position is correct."
        }
        Side::Negative => {
            "Present your closing statement, summarizing why your opponent's position is wrong."
        }
    };
    let context = format!(
        "You are giving your FINAL closing statement in this debate.\n\n\
         Topic: {topic}\n\n\
         Summarize your strongest arguments {} the proposition.",
        stance(side)
    );
    Prompt::new(TurnPhase::Closing, question, context)
}

/// Walk the stages until `Concluded`, alternating affirmative → negative.
pub(crate) async fn run(
    conductor: &Conductor<'_>,
    dialogue: &mut Dialogue,
    sides: &Sides,
) -> SwarmResult<()> {
    let topic = dialogue.topic.clone();
    let rounds = dialogue.rounds;
    let mut stage = DebateStage::Opening;

    while !stage.is_terminal() {
        for side in Side::ORDER {
            let speaker = sides.speaker(side);
            let prompt = match stage {
                DebateStage::Opening => opening_prompt(&topic, side),
                DebateStage::Rebuttal { round } => {
                    let opponent = sides.speaker(side.opponent());
                    rebuttal_prompt(
                        &topic,
                        side,
                        round,
                        opponent,
                        dialogue.last_by(opponent),
                        dialogue.turns(),
                    )
                }
                DebateStage::Closing => closing_prompt(&topic, side),
                DebateStage::Concluded => break,
            };
            conductor.turn(dialogue, speaker, prompt).await?;
        }
        stage = stage.next(rounds);
    }
    Ok(())
}
