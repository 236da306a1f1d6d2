//! `ask` is a structured poll: everyone answers, then everyone rebuts.
//!
//! Speaking order is shuffled once per invocation and kept for both rounds.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::orchestrator::Conductor;
use super::types::Dialogue;
use crate::error::SwarmResult;
use crate::registry::AgentName;
use crate::turn::{Prompt, Turn, TurnPhase};

/// Rounds in every `ask` dialogue.
pub const ASK_ROUNDS: u32 = 2;

/// Seed for the `invocation`-th `ask` under a configured base seed.
///
/// Each invocation gets its own order; the sequence of orders is
/// reproducible for a given base.
pub fn invocation_seed(base: u64, invocation: u64) -> u64 {
    base.wrapping_add(invocation)
}

/// Shuffle the speaking order; a fixed seed makes it reproducible.
pub fn speaking_order(mut participants: Vec<AgentName>, seed: Option<u64>) -> Vec<AgentName> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    participants.shuffle(&mut rng);
    participants
}

/// Round 1: the bare question, with the speaker's place in the order.
pub fn initial_prompt(question: &str, position: usize, total: usize) -> Prompt {
    let context = format!(
        "You are participating in a discussion with other geists.\n\n\
         Question: {question}\n\n\
         You are speaking {position} of {total} in the order. Provide your perspective."
    );
    Prompt::new(TurnPhase::Initial, question, context)
}

/// Round 2: every *other* participant's full round-1 answer, in round-1 order.
pub fn rebuttal_prompt(question: &str, speaker: &AgentName, initial: &[Turn]) -> Prompt {
    let mut context = format!(
        "You are participating in a discussion.\n\n\
         Original question: {question}\n\n\
         Other participants have responded:\n\n"
    );
    for turn in initial.iter().filter(|t| &t.speaker != speaker) {
        context.push_str(&format!("{}:\n{}\n\n", turn.speaker, turn.content));
    }
    context.push_str(
        "\nNow provide your rebuttal. Address specific points made by others, \
         challenge or build on their arguments.",
    );

    Prompt::new(
        TurnPhase::Rebuttal { round: 2 },
        format!("Respond to the other geists' perspectives on: {question}"),
        context,
    )
}

/// Drive both rounds. `dialogue.participants` is already in speaking order.
pub(crate) async fn run(conductor: &Conductor<'_>, dialogue: &mut Dialogue) -> SwarmResult<()> {
    let order = dialogue.participants.clone();
    let question = dialogue.topic.clone();
    let total = order.len();

    for (idx, speaker) in order.iter().enumerate() {
        conductor
            .turn(dialogue, speaker, initial_prompt(&question, idx + 1, total))
            .await?;
    }

    let initial: Vec<Turn> = dialogue.turns().to_vec();
    for speaker in &order {
        conductor
            .turn(dialogue, speaker, rebuttal_prompt(&question, speaker, &initial))
            .await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::turn::Role;
    use chrono::Utc;

    fn name(raw: &str) -> AgentName {
        AgentName::parse(raw).unwrap()
    }

    fn answer(speaker: &str, content: &str) -> Turn {
        Turn {
            speaker: name(speaker),
            role: Role::Assistant,
            phase: TurnPhase::Initial,
            content: content.to_string(),
            timestamp: Utc::now(),
            error: None,
        }
    }

    #[test]
    fn test_seeded_order_is_reproducible_permutation() {
        let names: Vec<AgentName> = ["a", "b", "c", "d"].iter().map(|r| name(r)).collect();
        let first = speaking_order(names.clone(), Some(42));
        let second = speaking_order(names.clone(), Some(42));
        assert_eq!(first, second);

        let mut sorted = first.clone();
        sorted.sort();
        assert_eq!(sorted, names);
    }

    #[test]
    fn test_invocation_seed_advances_and_wraps() {
        assert_eq!(invocation_seed(7, 0), 7);
        assert_ne!(invocation_seed(7, 0), invocation_seed(7, 1));
        assert_eq!(invocation_seed(u64::MAX, 1), 0);
    }

    #[test]
    fn test_rebuttal_excludes_own_answer() {
        let initial = vec![
            answer("a", "Answer from A"),
            answer("b", "Answer from B"),
            answer("c", "Answer from C"),
        ];
        let prompt = rebuttal_prompt("Why?", &name("a"), &initial);

        assert!(!prompt.context.contains("Answer from A"));
        let b = prompt.context.find("@b:\nAnswer from B").unwrap();
        let c = prompt.context.find("@c:\nAnswer from C").unwrap();
        assert!(b < c);
        assert_eq!(prompt.phase, TurnPhase::Rebuttal { round: 2 });
        assert_eq!(prompt.question, "Respond to the other geists' perspectives on: Why?");
    }

    #[test]
    fn test_rebuttal_quotes_full_content() {
        let long = "x".repeat(900);
        let initial = vec![answer("a", "short"), answer("b", &long)];
        let prompt = rebuttal_prompt("q", &name("a"), &initial);
        assert!(prompt.context.contains(&long));
    }

    #[test]
    fn test_initial_prompt_names_position() {
        let prompt = initial_prompt("What is virtue?", 2, 3);
        assert_eq!(prompt.question, "What is virtue?");
        assert!(prompt.context.contains("speaking 2 of 3"));
    }
}
