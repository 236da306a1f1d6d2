//! `converse`: round-robin conversation over a topic.

use super::context::{recent_exchanges, CONVERSE_WINDOW, PREVIEW_CHARS};
use super::orchestrator::Conductor;
use super::types::Dialogue;
use crate::error::SwarmResult;
use crate::turn::{Prompt, Turn, TurnPhase};

pub const DEFAULT_CONVERSE_ROUNDS: u32 = 2;
pub const MIN_CONVERSE_ROUNDS: u32 = 1;
pub const MIN_CONVERSE_PARTICIPANTS: usize = 2;

/// Prompt for round `round` (1-indexed) given every turn so far.
///
/// Round 1 sees only the topic; later rounds see the last
/// [`CONVERSE_WINDOW`] turns of the whole dialogue, previewed.
pub fn round_prompt(topic: &str, round: u32, log: &[Turn]) -> Prompt {
    let phase = TurnPhase::Round { number: round };
    if round <= 1 {
        return Prompt::new(
            phase,
            format!("Share your perspective on: {topic}"),
            format!("Topic: {topic}"),
        );
    }

    let context = format!(
        "Topic: {topic}\n\nPrevious exchanges:\n{}",
        recent_exchanges(log, CONVERSE_WINDOW, PREVIEW_CHARS)
    );
    Prompt::new(
        phase,
        format!("Respond to the ongoing conversation about: {topic}"),
        context,
    )
}

pub(crate) async fn run(conductor: &Conductor<'_>, dialogue: &mut Dialogue) -> SwarmResult<()> {
    let order = dialogue.participants.clone();
    let topic = dialogue.topic.clone();

    for round in 1..=dialogue.rounds {
        for speaker in &order {
            let prompt = round_prompt(&topic, round, dialogue.turns());
            conductor.turn(dialogue, speaker, prompt).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::AgentName;
    use crate::turn::Role;
    use chrono::Utc;

    fn turn(speaker: &str, content: &str) -> Turn {
        Turn {
            speaker: AgentName::parse(speaker).unwrap(),
            role: Role::Assistant,
            phase: TurnPhase::Round { number: 1 },
            content: content.to_string(),
            timestamp: Utc::now(),
            error: None,
        }
    }

    #[test]
    fn test_first_round_uses_topic_only() {
        let log = vec![turn("a", "earlier")];
        let prompt = round_prompt("free will", 1, &log);
        assert_eq!(prompt.context, "Topic: free will");
        assert_eq!(prompt.question, "Share your perspective on: free will");
    }

    #[test]
    fn test_later_rounds_window_and_truncate() {
        let long = "y".repeat(250);
        let mut log: Vec<Turn> = (0..5).map(|i| turn("a", &format!("old{i}"))).collect();
        log.push(turn("b", &long));

        let prompt = round_prompt("free will", 2, &log);
        assert_eq!(
            prompt.question,
            "Respond to the ongoing conversation about: free will"
        );
        assert!(!prompt.context.contains("old0"));
        assert!(prompt.context.contains("old1"));
        assert!(prompt.context.contains(&format!("@b: {}...", "y".repeat(200))));
        assert!(!prompt.context.contains(&"y".repeat(201)));
        assert_eq!(prompt.phase, TurnPhase::Round { number: 2 });
    }
}
