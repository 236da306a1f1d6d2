//! Console output for commands and running dialogues.

use std::io::Write;

use coordination::dialogue::{Dialogue, DialogueKind, DialogueObserver, Side};
use coordination::{AgentEntry, PersistedDialogue, ResetReport, Turn, TurnPhase};

const RULE_WIDTH: usize = 80;

fn rule(c: char) -> String {
    c.to_string().repeat(RULE_WIDTH)
}

/// Streams each turn to stdout as soon as it completes.
#[derive(Debug, Default)]
pub struct ConsoleObserver;

impl ConsoleObserver {
    fn print(&self, text: &str) {
        let mut out = std::io::stdout().lock();
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }
}

impl DialogueObserver for ConsoleObserver {
    fn on_start(&self, dialogue: &Dialogue) {
        self.print(&banner(dialogue));
    }

    fn on_phase(&self, dialogue: &Dialogue, phase: TurnPhase) {
        self.print(&format!("\n=== {} ===\n\n", phase_title(dialogue.kind, phase)));
    }

    fn on_turn(&self, dialogue: &Dialogue, turn: &Turn) {
        self.print(&format!(
            "{}:\n{}\n{}\n\n",
            speaker_label(dialogue, turn),
            rule('-'),
            turn.content
        ));
    }

    fn on_complete(&self, dialogue: &Dialogue) {
        self.print(&format!(
            "{}\n{} concluded.\n",
            rule('='),
            kind_label(dialogue.kind)
        ));
    }
}

fn kind_label(kind: DialogueKind) -> &'static str {
    match kind {
        DialogueKind::Ask => "Discussion",
        DialogueKind::Converse => "Conversation",
        DialogueKind::Debate => "Debate",
    }
}

pub fn banner(dialogue: &Dialogue) -> String {
    let names: Vec<String> = dialogue.participants.iter().map(|n| n.to_string()).collect();
    let mut out = format!("\n{}\n", rule('='));
    match dialogue.kind {
        DialogueKind::Ask => {
            out.push_str(&format!("QUESTION: {}\n", dialogue.topic));
            out.push_str(&format!("Participants: {}\n", names.join(", ")));
            out.push_str(&format!("Speaking order: {}\n", names.join(" → ")));
        }
        DialogueKind::Converse => {
            out.push_str(&format!("TOPIC: {}\n", dialogue.topic));
            out.push_str(&format!("Participants: {}\n", names.join(", ")));
            out.push_str(&format!("Rounds: {}\n", dialogue.rounds));
        }
        DialogueKind::Debate => {
            out.push_str(&format!("DEBATE: {}\n", dialogue.topic));
            if let [pro, con] = names.as_slice() {
                let pro_label = Side::Affirmative.label();
                let con_label = Side::Negative.label();
                out.push_str(&format!("AFFIRMATIVE ({pro_label}): {pro}\n"));
                out.push_str(&format!("NEGATIVE ({con_label}): {con}\n"));
            }
            out.push_str(&format!("Rounds: {}\n", dialogue.rounds));
        }
    }
    out.push_str(&rule('='));
    out.push('\n');
    out
}

fn phase_title(kind: DialogueKind, phase: TurnPhase) -> String {
    match (kind, phase) {
        (_, TurnPhase::Initial) => "ROUND 1: Initial Responses".to_string(),
        (DialogueKind::Ask, TurnPhase::Rebuttal { .. }) => "ROUND 2: Rebuttals".to_string(),
        (_, TurnPhase::Rebuttal { round }) => format!("ROUND {round}: Rebuttals"),
        (_, TurnPhase::Round { number }) => format!("Round {number}"),
        (_, TurnPhase::Opening) => "OPENING STATEMENTS".to_string(),
        (_, TurnPhase::Closing) => "CLOSING STATEMENTS".to_string(),
    }
}

fn speaker_label(dialogue: &Dialogue, turn: &Turn) -> String {
    if dialogue.kind != DialogueKind::Debate {
        return turn.speaker.to_string();
    }
    let side = if dialogue.participants.first() == Some(&turn.speaker) {
        Side::Affirmative
    } else {
        Side::Negative
    };
    format!("{} ({})", turn.speaker, side.label())
}

/// `NAME / CONTAINER ID / STATUS` table.
pub fn agent_table(entries: &[AgentEntry]) -> String {
    let mut out = format!(
        "\n{:<20} {:<15} {:<15}\n{}\n",
        "NAME",
        "CONTAINER ID",
        "STATUS",
        "-".repeat(50)
    );
    for entry in entries {
        out.push_str(&format!(
            "{:<20} {:<15} {:<15}\n",
            entry.record.name.as_str(),
            entry.record.handle.as_str(),
            entry.status.to_string()
        ));
    }
    out
}

pub fn history(entries: &[PersistedDialogue]) -> String {
    if entries.is_empty() {
        return "No conversation history found.\n".to_string();
    }

    let mut out = format!("\nFound {} conversations:\n\n", entries.len());
    for (idx, entry) in entries.iter().enumerate() {
        let dialogue = &entry.dialogue;
        out.push_str(&format!(
            "Conversation {} - {} ({})\n{}\n",
            idx + 1,
            entry.completed_at.to_rfc3339(),
            dialogue.kind,
            rule('=')
        ));
        let label = if dialogue.kind == DialogueKind::Ask {
            "QUESTION"
        } else {
            "TOPIC"
        };
        out.push_str(&format!("\n{label}: {}\n\n", dialogue.topic));
        for turn in dialogue.turns() {
            out.push_str(&format!("{}:\n{}\n{}\n\n", turn.speaker, rule('-'), turn.content));
        }
        out.push('\n');
    }
    out
}

pub fn reset_summary(report: &ResetReport) -> String {
    let mut out = String::new();
    for name in &report.removed {
        out.push_str(&format!("✓ Removed container for {name}\n"));
    }
    for name in &report.already_gone {
        out.push_str(&format!("⚠ Container for {name} not found (already removed)\n"));
    }
    out.push_str(&format!(
        "\nReset complete. Removed {} containers.\n",
        report.removed.len()
    ));
    out
}
