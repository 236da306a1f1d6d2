//! Markdown transcripts for completed dialogues.
//!
//! One file per dialogue in the conversations directory, named
//! `<YYYYmmdd_HHMMSS>.<names>.<topic-slug>.md`.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::Local;
use coordination::{DialogueKind, PersistedDialogue, TranscriptRenderer, Turn, TurnPhase};

/// Characters of the topic kept in the file name.
pub const SLUG_CHARS: usize = 50;

pub struct MarkdownRenderer {
    dir: PathBuf,
}

impl MarkdownRenderer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl TranscriptRenderer for MarkdownRenderer {
    fn render(&self, entry: &PersistedDialogue) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(file_name(entry));
        std::fs::write(&path, render_markdown(entry))?;
        Ok(path)
    }
}

/// Topic reduced to a file-name-safe slug.
pub fn slug(topic: &str) -> String {
    topic
        .chars()
        .take(SLUG_CHARS)
        .map(|c| if c == ' ' || c == '/' { '-' } else { c })
        .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
        .collect()
}

pub fn file_name(entry: &PersistedDialogue) -> String {
    let dialogue = &entry.dialogue;
    let stamp = entry
        .completed_at
        .with_timezone(&Local)
        .format("%Y%m%d_%H%M%S");
    let names: Vec<&str> = dialogue.participants.iter().map(|n| n.bare()).collect();
    format!("{stamp}.{}.{}.md", names.join("-"), slug(&dialogue.topic))
}

fn title(kind: DialogueKind) -> &'static str {
    match kind {
        DialogueKind::Ask => "Socratic Dialog",
        DialogueKind::Converse => "Conversation",
        DialogueKind::Debate => "Debate",
    }
}

fn section_heading(kind: DialogueKind, phase: TurnPhase) -> String {
    match (kind, phase) {
        (_, TurnPhase::Initial) => "Round 1: Initial Responses".to_string(),
        (DialogueKind::Ask, TurnPhase::Rebuttal { .. }) => "Round 2: Rebuttals".to_string(),
        (_, TurnPhase::Rebuttal { round }) => format!("Round {round}: Rebuttals"),
        (_, TurnPhase::Round { number }) => format!("Round {number}"),
        (_, TurnPhase::Opening) => "Opening Statements".to_string(),
        (_, TurnPhase::Closing) => "Closing Statements".to_string(),
    }
}

fn turn_heading(entry: &PersistedDialogue, turn: &Turn) -> String {
    let dialogue = &entry.dialogue;
    match (dialogue.kind, turn.phase) {
        (DialogueKind::Ask, TurnPhase::Rebuttal { .. }) => format!("{} - Rebuttal", turn.speaker),
        (DialogueKind::Debate, _) => {
            let stance = if dialogue.participants.first() == Some(&turn.speaker) {
                "PRO"
            } else {
                "CON"
            };
            format!("{} ({stance})", turn.speaker)
        }
        _ => turn.speaker.to_string(),
    }
}

/// `> ` on every line so multi-paragraph replies stay quoted.
fn blockquote(text: &str) -> String {
    text.trim()
        .lines()
        .map(|line| {
            if line.is_empty() {
                ">".to_string()
            } else {
                format!("> {line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_markdown(entry: &PersistedDialogue) -> String {
    let dialogue = &entry.dialogue;
    let participants: Vec<String> = dialogue.participants.iter().map(|n| n.to_string()).collect();
    let mut md = String::new();

    let _ = writeln!(md, "# {}: {}\n", title(dialogue.kind), dialogue.topic);
    let _ = writeln!(
        md,
        "**Date:** {}  ",
        entry.completed_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
    );
    let _ = writeln!(md, "**Participants:** {}\n", participants.join(", "));
    md.push_str("---\n\n");

    let mut current: Option<TurnPhase> = None;
    for turn in dialogue.turns() {
        if current != Some(turn.phase) {
            let _ = writeln!(md, "## {}\n", section_heading(dialogue.kind, turn.phase));
            current = Some(turn.phase);
        }
        let _ = writeln!(md, "### {}\n", turn_heading(entry, turn));
        if dialogue.kind == DialogueKind::Ask && matches!(turn.phase, TurnPhase::Rebuttal { .. }) {
            md.push_str("*In response to the previous perspectives:*\n\n");
        }
        let _ = writeln!(md, "{}\n", blockquote(&turn.content));
        md.push_str("---\n\n");
    }

    md
}
