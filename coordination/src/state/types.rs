//! Durable record types
//!
//! Both collections are tagged records with required fields; a file
//! missing a field fails to load instead of being patched up.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::schema::REGISTRY_VERSION;
use crate::backend::EnvironmentHandle;
use crate::dialogue::Dialogue;
use crate::registry::AgentName;

/// Registry entry for one agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub name: AgentName,
    /// Assigned once at creation, never rewritten.
    pub handle: EnvironmentHandle,
    /// Backend-side environment name
    pub environment_name: String,
    /// Where the persona payload was read from at creation time
    pub persona_source: PathBuf,
    pub created_at: DateTime<Utc>,
}

/// Whole content of the agent registry file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    pub version: u32,
    pub agents: BTreeMap<AgentName, AgentRecord>,
}

impl Default for RegistrySnapshot {
    fn default() -> Self {
        Self {
            version: REGISTRY_VERSION,
            agents: BTreeMap::new(),
        }
    }
}

impl RegistrySnapshot {
    /// Records in registration order (creation time, then name).
    pub fn in_registration_order(&self) -> Vec<&AgentRecord> {
        let mut records: Vec<&AgentRecord> = self.agents.values().collect();
        records.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.name.cmp(&b.name))
        });
        records
    }
}

/// One completed dialogue as stored in the conversation log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedDialogue {
    pub completed_at: DateTime<Utc>,
    pub dialogue: Dialogue,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(name: &str, secs: i64) -> AgentRecord {
        let name = AgentName::parse(name).unwrap();
        AgentRecord {
            environment_name: format!("geist-swarm-{}", name.bare()),
            name,
            handle: EnvironmentHandle::new(format!("{secs:012}")),
            persona_source: PathBuf::from("persona.txt"),
            created_at: Utc.timestamp_opt(secs, 0).unwrap(),
        }
    }

    #[test]
    fn test_registration_order_follows_creation_time() {
        let mut snapshot = RegistrySnapshot::default();
        for (name, secs) in [("zeno", 1), ("aristotle", 3), ("kant", 2)] {
            let r = record(name, secs);
            snapshot.agents.insert(r.name.clone(), r);
        }
        let order: Vec<&str> = snapshot
            .in_registration_order()
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(order, vec!["@zeno", "@kant", "@aristotle"]);
    }

    #[test]
    fn test_missing_field_is_rejected() {
        let json = r#"{"version":1,"agents":{"@a":{"name":"@a","handle":"abc"}}}"#;
        assert!(serde_json::from_str::<RegistrySnapshot>(json).is_err());
    }
}
