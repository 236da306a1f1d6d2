//! On-disk layout of the swarm state directory
//!
//! Two independent collections, each rewritten whole on every mutation:
//! the agent registry and the conversation log.

use std::path::Path;

use super::types::RegistrySnapshot;

/// File holding `{version, agents: {name -> record}}`
pub const AGENTS_FILE: &str = ".geist_swarm.json";

/// File holding the append-only array of persisted dialogues
pub const CONVERSATIONS_FILE: &str = ".geist_conversations.json";

/// Current registry schema version
pub const REGISTRY_VERSION: u32 = 1;

/// Suffix of the scratch file written before the atomic rename
pub const TEMP_SUFFIX: &str = ".tmp";

/// Check invariants serde cannot express.
///
/// Returns a description of the first violation, if any.
pub fn check_registry(snapshot: &RegistrySnapshot) -> Option<String> {
    for (key, record) in &snapshot.agents {
        if key != &record.name {
            return Some(format!("entry {} carries record for {}", key, record.name));
        }
        if record.handle.as_str().trim().is_empty() {
            return Some(format!("entry {} has an empty environment handle", key));
        }
    }
    None
}

/// Scratch path used while rewriting `path`.
pub fn temp_path(path: &Path) -> std::path::PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(TEMP_SUFFIX);
    path.with_file_name(name)
}
