//! Textual context assembly from completed turns.
//!
//! Context is always rebuilt from the in-memory dialogue, never fetched
//! back from an agent.

use crate::turn::Turn;

/// Preview length for turns quoted from the running log.
pub const PREVIEW_CHARS: usize = 200;

/// Preview length for the opponent's statement in a debate rebuttal.
pub const OPPONENT_PREVIEW_CHARS: usize = 500;

/// Turns quoted in a `converse` context window.
pub const CONVERSE_WINDOW: usize = 5;

/// Turns quoted in a debate rebuttal context window.
pub const DEBATE_WINDOW: usize = 4;

/// First `limit` characters of `text`, with `...` appended when cut.
pub fn preview(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}

/// Last `count` turns as `speaker: preview` paragraphs.
pub fn recent_exchanges(turns: &[Turn], count: usize, limit: usize) -> String {
    let start = turns.len().saturating_sub(count);
    turns[start..]
        .iter()
        .map(|t| format!("{}: {}\n\n", t.speaker, preview(&t.content, limit)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::AgentName;
    use crate::turn::{Role, TurnPhase};
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
    fn test_preview_only_marks_truncation() {
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("exactly10!", 10), "exactly10!");
        assert_eq!(preview("abcdefghijk", 10), "abcdefghij...");
    }

    #[test]
    fn test_preview_counts_characters_not_bytes() {
        let text = "ééééé";
        assert_eq!(preview(text, 3), "ééé...");
    }

    #[test]
    fn test_recent_exchanges_is_a_global_window() {
        let turns: Vec<Turn> = (1..=7)
            .map(|i| turn(if i % 2 == 0 { "b" } else { "a" }, &format!("t{i}")))
            .collect();
        let window = recent_exchanges(&turns, 5, 200);
        assert!(!window.contains("t2"));
        assert!(window.starts_with("@a: t3\n\n"));
        assert!(window.ends_with("@a: t7\n\n"));
    }

    #[test]
    fn test_recent_exchanges_with_short_log() {
        let turns = vec![turn("a", "only")];
        assert_eq!(recent_exchanges(&turns, 4, 200), "@a: only\n\n");
        assert_eq!(recent_exchanges(&[], 4, 200), "");
    }
}
