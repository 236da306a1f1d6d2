//! Transcript Sink: persistence of completed dialogues
//!
//! The conversation log append is the durable step. Rendering (Markdown,
//! HTML, ...) is delegated to an optional [`TranscriptRenderer`]; a render
//! failure is logged and does not undo the append.

use std::path::PathBuf;

use chrono::Utc;
use tracing::{info, warn};

use crate::dialogue::Dialogue;
use crate::error::SwarmResult;
use crate::state::{PersistedDialogue, SharedStateStore};

/// Formats a persisted dialogue somewhere and reports where.
#[cfg_attr(test, mockall::automock)]
pub trait TranscriptRenderer: Send + Sync {
    fn render(&self, entry: &PersistedDialogue) -> std::io::Result<PathBuf>;
}

/// What [`TranscriptSink::persist`] did.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptReceipt {
    pub entry: PersistedDialogue,
    /// Length of the conversation log after the append.
    pub log_len: usize,
    /// Rendered location, if a renderer is attached and succeeded.
    pub rendered: Option<PathBuf>,
}

pub struct TranscriptSink {
    store: SharedStateStore,
    renderer: Option<Box<dyn TranscriptRenderer>>,
}

impl TranscriptSink {
    pub fn new(store: SharedStateStore) -> Self {
        Self {
            store,
            renderer: None,
        }
    }

    pub fn with_renderer(mut self, renderer: Box<dyn TranscriptRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn set_renderer(&mut self, renderer: Box<dyn TranscriptRenderer>) {
        self.renderer = Some(renderer);
    }

    /// Append `dialogue` to the conversation log, then render it.
    pub fn persist(&self, dialogue: Dialogue) -> SwarmResult<TranscriptReceipt> {
        let entry = PersistedDialogue {
            completed_at: Utc::now(),
            dialogue,
        };
        let log_len = self.store.append_dialogue(&entry)?;
        info!(
            dialogue = %entry.dialogue.id,
            kind = %entry.dialogue.kind,
            turns = entry.dialogue.turns().len(),
            log_len,
            "Dialogue persisted"
        );

        let rendered = self.renderer.as_ref().and_then(|renderer| {
            match renderer.render(&entry) {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!(dialogue = %entry.dialogue.id, error = %e, "Failed to render transcript");
                    None
                }
            }
        });

        Ok(TranscriptReceipt {
            entry,
            log_len,
            rendered,
        })
    }

    /// Every persisted dialogue in append order.
    pub fn history(&self) -> SwarmResult<Vec<PersistedDialogue>> {
        Ok(self.store.load_conversations()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialogue::DialogueKind;
    use crate::state::StateStore;

    fn sink() -> (tempfile::TempDir, TranscriptSink) {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::open(dir.path()).unwrap().shared();
        (dir, TranscriptSink::new(store))
    }

    #[test]
    fn test_renderer_receives_persisted_entry() {
        let (_dir, sink) = sink();
        let mut renderer = MockTranscriptRenderer::new();
        renderer
            .expect_render()
            .withf(|entry| entry.dialogue.topic == "What is justice?")
            .times(1)
            .returning(|_| Ok(PathBuf::from("conversations/out.md")));
        let sink = sink.with_renderer(Box::new(renderer));

        let receipt = sink
            .persist(Dialogue::new(DialogueKind::Ask, "What is justice?", Vec::new(), 2))
            .unwrap();
        assert_eq!(receipt.log_len, 1);
        assert_eq!(receipt.rendered, Some(PathBuf::from("conversations/out.md")));
    }

    #[test]
    fn test_render_failure_keeps_log_entry() {
        let (_dir, sink) = sink();
        let mut renderer = MockTranscriptRenderer::new();
        renderer
            .expect_render()
            .returning(|_| Err(std::io::Error::other("read-only filesystem")));
        let sink = sink.with_renderer(Box::new(renderer));

        let receipt = sink
            .persist(Dialogue::new(DialogueKind::Converse, "t", Vec::new(), 1))
            .unwrap();
        assert!(receipt.rendered.is_none());
        assert_eq!(sink.history().unwrap().len(), 1);
    }

    #[test]
    fn test_appends_preserve_earlier_entries() {
        let (_dir, sink) = sink();
        let first = sink
            .persist(Dialogue::new(DialogueKind::Ask, "first", Vec::new(), 2))
            .unwrap();
        let before = serde_json::to_string(&first.entry).unwrap();

        sink.persist(Dialogue::new(DialogueKind::Debate, "second", Vec::new(), 2))
            .unwrap();

        let history = sink.history().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(serde_json::to_string(&history[0]).unwrap(), before);
        assert_eq!(history[1].dialogue.topic, "second");
    }
}
