//! Agent Registry: agent lifecycle over the execution backend
//!
//! Every agent is one registry record plus one backend environment. The
//! registry is the only component that creates, starts, stops or removes
//! environments; everything else asks it to [`AgentRegistry::resolve`] a
//! name into a running handle.
//!
//! `resolve` has a deliberate side effect: a stopped environment is started
//! before the handle is returned (lazy revival).

pub mod name;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::backend::{BackendError, EnvironmentHandle, EnvironmentStatus, ExecutionBackend};
use crate::config::SwarmSettings;
use crate::error::{SwarmError, SwarmResult};
use crate::state::{AgentRecord, SharedStateStore};

pub use name::{parse_names, AgentName, NAME_PREFIX};

/// Variable carrying the persona payload into the injection command.
pub const PERSONA_ENV_VAR: &str = "GEIST_PERSONA";

/// Extension of persona files picked up by [`AgentRegistry::seed_from_dir`].
pub const PERSONA_EXTENSION: &str = "txt";

/// A registry record joined with the live environment status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentEntry {
    pub record: AgentRecord,
    pub status: EnvironmentStatus,
}

/// Outcome of releasing one agent's environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    /// Environment stopped and removed.
    Removed,
    /// The backend no longer knew the environment.
    AlreadyGone,
}

/// Summary of [`AgentRegistry::reset_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResetReport {
    pub removed: Vec<AgentName>,
    pub already_gone: Vec<AgentName>,
}

impl ResetReport {
    pub fn total(&self) -> usize {
        self.removed.len() + self.already_gone.len()
    }
}

/// CRUD over agents, backed by the state store and the execution backend.
pub struct AgentRegistry {
    store: SharedStateStore,
    backend: Arc<dyn ExecutionBackend>,
    settings: Arc<SwarmSettings>,
}

impl AgentRegistry {
    pub fn new(
        store: SharedStateStore,
        backend: Arc<dyn ExecutionBackend>,
        settings: Arc<SwarmSettings>,
    ) -> Self {
        Self {
            store,
            backend,
            settings,
        }
    }

    pub fn backend(&self) -> &Arc<dyn ExecutionBackend> {
        &self.backend
    }

    pub fn settings(&self) -> &SwarmSettings {
        &self.settings
    }

    /// Create an agent from a persona file.
    ///
    /// On success exactly one new, running environment exists and the record
    /// is persisted. Any failure after the environment was created removes
    /// it again.
    pub async fn create(&self, raw_name: &str, persona_source: &Path) -> SwarmResult<AgentRecord> {
        let name = AgentName::parse(raw_name)?;

        if self.store.load_registry()?.agents.contains_key(&name) {
            return Err(SwarmError::AlreadyExists { name });
        }

        let persona = tokio::fs::read_to_string(persona_source)
            .await
            .map_err(|source| SwarmError::PersonaUnreadable {
                path: persona_source.to_path_buf(),
                source,
            })?;

        let spec = self.settings.environment_spec(&name);
        let handle = self.backend.create_environment(&spec).await?;
        debug!(agent = %name, handle = %handle, environment = %spec.name, "Environment created");

        if let Err(e) = self.start_and_inject(&name, &handle, &persona).await {
            self.discard_environment(&name, &handle).await;
            return Err(e);
        }

        let record = AgentRecord {
            name: name.clone(),
            handle: handle.clone(),
            environment_name: spec.name,
            persona_source: persona_source.to_path_buf(),
            created_at: Utc::now(),
        };

        let persisted = self.store.update_registry(|snapshot| {
            if snapshot.agents.contains_key(&name) {
                return Err(SwarmError::AlreadyExists { name: name.clone() });
            }
            snapshot.agents.insert(name.clone(), record.clone());
            Ok(())
        });
        if let Err(e) = persisted {
            self.discard_environment(&name, &handle).await;
            return Err(e);
        }

        info!(agent = %name, handle = %handle, "Agent created");
        Ok(record)
    }

    async fn start_and_inject(
        &self,
        name: &AgentName,
        handle: &EnvironmentHandle,
        persona: &str,
    ) -> SwarmResult<()> {
        self.backend.start_environment(handle).await?;

        let command = vec![
            "bash".to_string(),
            "-c".to_string(),
            format!(
                "printf '%s' \"${PERSONA_ENV_VAR}\" > '{}'",
                self.settings.persona_path
            ),
        ];
        let mut env = BTreeMap::new();
        env.insert(PERSONA_ENV_VAR.to_string(), persona.to_string());

        let output = self.backend.run(handle, &command, &env).await?;
        if !output.is_success() {
            return Err(SwarmError::PersonaInjectionFailed {
                name: name.clone(),
                exit_code: output.exit_code,
                output: output.output.trim().to_string(),
            });
        }
        Ok(())
    }

    /// Best-effort rollback of a half-created agent.
    async fn discard_environment(&self, name: &AgentName, handle: &EnvironmentHandle) {
        if let Err(e) = self.release(handle).await {
            warn!(agent = %name, handle = %handle, error = %e, "Failed to roll back environment");
        }
    }

    /// All agents in registration order with their live status.
    ///
    /// A record whose environment is gone is listed as `Missing`; it is
    /// never deregistered here.
    pub async fn list(&self) -> SwarmResult<Vec<AgentEntry>> {
        let snapshot = self.store.load_registry()?;
        let mut entries = Vec::with_capacity(snapshot.agents.len());
        for record in snapshot.in_registration_order() {
            let status = self.backend.status(&record.handle).await?;
            entries.push(AgentEntry {
                record: record.clone(),
                status,
            });
        }
        Ok(entries)
    }

    /// Registered records in registration order, without touching the backend.
    pub fn records(&self) -> SwarmResult<Vec<AgentRecord>> {
        let snapshot = self.store.load_registry()?;
        Ok(snapshot
            .in_registration_order()
            .into_iter()
            .cloned()
            .collect())
    }

    /// Look a canonical name up in the registry.
    pub fn record(&self, name: &AgentName) -> SwarmResult<AgentRecord> {
        self.store
            .load_registry()?
            .agents
            .remove(name)
            .ok_or_else(|| SwarmError::agent_not_found(name))
    }

    pub fn is_registered(&self, name: &AgentName) -> SwarmResult<bool> {
        Ok(self.store.load_registry()?.agents.contains_key(name))
    }

    /// Resolve a name into the handle of a *running* environment.
    ///
    /// Starts a stopped environment and waits `revive_grace` before
    /// returning. Fails with `AgentNotFound` for unregistered names and
    /// `EnvironmentNotFound` when the backend lost the environment.
    pub async fn resolve(&self, name: &AgentName) -> SwarmResult<EnvironmentHandle> {
        let record = self.record(name)?;
        let handle = record.handle;
        let missing = || SwarmError::EnvironmentNotFound {
            name: name.clone(),
            handle: handle.clone(),
        };

        match self.backend.status(&handle).await? {
            EnvironmentStatus::Running => {}
            EnvironmentStatus::Missing => return Err(missing()),
            EnvironmentStatus::Stopped => {
                info!(agent = %name, handle = %handle, "Reviving stopped environment");
                match self.backend.start_environment(&handle).await {
                    Ok(()) => {}
                    Err(BackendError::NotFound { .. }) => return Err(missing()),
                    Err(e) => return Err(e.into()),
                }
                if !self.settings.revive_grace.is_zero() {
                    tokio::time::sleep(self.settings.revive_grace).await;
                }
            }
        }

        Ok(handle)
    }

    /// Stop an agent's environment, keeping it registered.
    ///
    /// Returns whether the environment was running.
    pub async fn stop(&self, name: &AgentName) -> SwarmResult<bool> {
        let record = self.record(name)?;
        match self.backend.status(&record.handle).await? {
            EnvironmentStatus::Running => {
                self.backend.stop_environment(&record.handle).await?;
                info!(agent = %name, "Environment stopped");
                Ok(true)
            }
            EnvironmentStatus::Stopped => Ok(false),
            EnvironmentStatus::Missing => Err(SwarmError::EnvironmentNotFound {
                name: name.clone(),
                handle: record.handle,
            }),
        }
    }

    /// Release the environment and delete the registry entry.
    ///
    /// A backend that no longer knows the environment is only a warning;
    /// the entry is deleted regardless.
    pub async fn remove(&self, name: &AgentName) -> SwarmResult<Release> {
        let record = self.record(name)?;
        let release = self.release(&record.handle).await?;
        if release == Release::AlreadyGone {
            warn!(
                agent = %name,
                handle = %record.handle,
                "Environment not found, removing from registry anyway"
            );
        }

        self.store.update_registry(|snapshot| {
            snapshot.agents.remove(name);
            Ok::<_, SwarmError>(())
        })?;

        info!(agent = %name, "Agent removed");
        Ok(release)
    }

    /// Remove every agent, then clear the registry file.
    pub async fn reset_all(&self) -> SwarmResult<ResetReport> {
        let mut report = ResetReport::default();
        for record in self.records()? {
            match self.release(&record.handle).await? {
                Release::Removed => report.removed.push(record.name),
                Release::AlreadyGone => {
                    warn!(agent = %record.name, "Environment already removed");
                    report.already_gone.push(record.name);
                }
            }
        }
        self.store.clear_registry()?;
        info!(agents = report.total(), "Registry reset");
        Ok(report)
    }

    /// When the registry is empty, create one agent per persona file in `dir`.
    ///
    /// The agent name is the file stem. Individual failures are logged and
    /// skipped; an unreachable backend still aborts.
    pub async fn seed_from_dir(&self, dir: &Path) -> SwarmResult<Vec<AgentName>> {
        if !self.store.load_registry()?.agents.is_empty() {
            return Ok(Vec::new());
        }

        let personas = persona_files(dir);
        if personas.is_empty() {
            debug!(dir = %dir.display(), "No persona files to seed from");
            return Ok(Vec::new());
        }

        info!(
            count = personas.len(),
            dir = %dir.display(),
            "Seeding agents from persona directory"
        );
        let mut created = Vec::new();
        for (stem, path) in personas {
            match self.create(&stem, &path).await {
                Ok(record) => created.push(record.name),
                Err(e) if e.is_backend_unavailable() => return Err(e),
                Err(e) => warn!(persona = %path.display(), error = %e, "Failed to seed agent"),
            }
        }
        Ok(created)
    }

    /// Stop then remove; `NotFound` from either step means already gone.
    async fn release(&self, handle: &EnvironmentHandle) -> SwarmResult<Release> {
        match self.backend.stop_environment(handle).await {
            Ok(()) => {}
            Err(BackendError::NotFound { .. }) => return Ok(Release::AlreadyGone),
            Err(e) => return Err(e.into()),
        }
        match self.backend.remove_environment(handle).await {
            Ok(()) => Ok(Release::Removed),
            Err(BackendError::NotFound { .. }) => Ok(Release::AlreadyGone),
            Err(e) => Err(e.into()),
        }
    }
}

/// `*.txt` files in `dir` as `(stem, path)`, sorted by stem.
fn persona_files(dir: &Path) -> Vec<(String, PathBuf)> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut files: Vec<(String, PathBuf)> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext == PERSONA_EXTENSION)
        })
        .filter_map(|path| {
            let stem = path.file_stem()?.to_str()?.to_string();
            Some((stem, path))
        })
        .collect();
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{InMemoryBackend, RunOutput};
    use crate::state::StateStore;

    struct Fixture {
        _dir: tempfile::TempDir,
        personas: PathBuf,
        backend: Arc<InMemoryBackend>,
        registry: AgentRegistry,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let personas = dir.path().join("personas");
        std::fs::create_dir_all(&personas).unwrap();
        let store = StateStore::open(dir.path().join("state")).unwrap().shared();
        let backend = Arc::new(InMemoryBackend::new());
        let registry = AgentRegistry::new(
            store,
            backend.clone(),
            Arc::new(SwarmSettings::for_tests()),
        );
        Fixture {
            _dir: dir,
            personas,
            backend,
            registry,
        }
    }

    fn persona(fx: &Fixture, stem: &str, body: &str) -> PathBuf {
        let path = fx.personas.join(format!("{stem}.txt"));
        std::fs::write(&path, body).unwrap();
        path
    }

    #[tokio::test]
    async fn test_create_starts_environment_and_injects_persona() {
        let fx = fixture();
        let path = persona(&fx, "dogen", "Zen master. Says 'it's' a lot.");

        let record = fx.registry.create("dogen", &path).await.unwrap();
        assert_eq!(record.name.as_str(), "@dogen");
        assert_eq!(record.environment_name, "geist-swarm-dogen");

        let status = fx.backend.status(&record.handle).await.unwrap();
        assert_eq!(status, EnvironmentStatus::Running);

        let runs = fx.backend.invocations();
        assert_eq!(runs.len(), 1);
        assert_eq!(
            runs[0].env.get(PERSONA_ENV_VAR).map(String::as_str),
            Some("Zen master. Says 'it's' a lot.")
        );
        assert!(runs[0].command[2].contains("/workspace/personality.txt"));
    }

    #[tokio::test]
    async fn test_duplicate_create_leaves_registry_unchanged() {
        let fx = fixture();
        let path = persona(&fx, "kant", "Categorical.");
        fx.registry.create("kant", &path).await.unwrap();
        let before = fx.registry.records().unwrap();

        let err = fx.registry.create("@kant", &path).await.unwrap_err();
        assert!(matches!(err, SwarmError::AlreadyExists { .. }));
        assert_eq!(fx.registry.records().unwrap(), before);
        assert_eq!(fx.backend.environment_names(), vec!["geist-swarm-kant"]);
    }

    #[tokio::test]
    async fn test_unreadable_persona_creates_nothing() {
        let fx = fixture();
        let err = fx
            .registry
            .create("ghost", &fx.personas.join("missing.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, SwarmError::PersonaUnreadable { .. }));
        assert!(fx.backend.environment_names().is_empty());
    }

    #[tokio::test]
    async fn test_failed_injection_rolls_back_environment() {
        let fx = fixture();
        fx.backend
            .fail_environment("geist-swarm-hume", RunOutput::failure(1, "disk full"));
        let path = persona(&fx, "hume", "Skeptic.");

        let err = fx.registry.create("hume", &path).await.unwrap_err();
        assert!(matches!(
            err,
            SwarmError::PersonaInjectionFailed { exit_code: 1, .. }
        ));
        assert!(fx.backend.environment_names().is_empty());
        assert!(fx.registry.records().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_revives_stopped_environment() {
        let fx = fixture();
        let path = persona(&fx, "zeno", "Paradoxes.");
        let record = fx.registry.create("zeno", &path).await.unwrap();

        fx.backend.stop_externally(&record.handle);
        let handle = fx.registry.resolve(&record.name).await.unwrap();

        assert_eq!(handle, record.handle);
        assert!(fx.backend.status(&handle).await.unwrap().is_running());
    }

    #[tokio::test]
    async fn test_resolve_unregistered_and_vanished() {
        let fx = fixture();
        let unknown = AgentName::parse("nobody").unwrap();
        let err = fx.registry.resolve(&unknown).await.unwrap_err();
        assert!(matches!(err, SwarmError::AgentNotFound { .. }));

        let path = persona(&fx, "plato", "Forms.");
        let record = fx.registry.create("plato", &path).await.unwrap();
        fx.backend.vanish(&record.handle);
        let err = fx.registry.resolve(&record.name).await.unwrap_err();
        assert!(matches!(err, SwarmError::EnvironmentNotFound { .. }));
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_list_reports_stale_entries_without_healing() {
        let fx = fixture();
        let a = fx.registry.create("a", &persona(&fx, "a", "A")).await.unwrap();
        let b = fx.registry.create("b", &persona(&fx, "b", "B")).await.unwrap();
        fx.backend.vanish(&a.handle);
        fx.backend.stop_externally(&b.handle);

        let entries = fx.registry.list().await.unwrap();
        let statuses: Vec<(String, EnvironmentStatus)> = entries
            .iter()
            .map(|e| (e.record.name.to_string(), e.status))
            .collect();
        assert_eq!(
            statuses,
            vec![
                ("@a".to_string(), EnvironmentStatus::Missing),
                ("@b".to_string(), EnvironmentStatus::Stopped),
            ]
        );
        assert_eq!(fx.registry.records().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_remove_tolerates_missing_environment() {
        let fx = fixture();
        let record = fx.registry.create("x", &persona(&fx, "x", "X")).await.unwrap();
        fx.backend.vanish(&record.handle);

        let release = fx.registry.remove(&record.name).await.unwrap();
        assert_eq!(release, Release::AlreadyGone);
        assert!(fx.registry.records().unwrap().is_empty());

        let err = fx.registry.remove(&record.name).await.unwrap_err();
        assert!(matches!(err, SwarmError::AgentNotFound { .. }));
    }

    #[tokio::test]
    async fn test_remove_propagates_unavailable_backend() {
        let fx = fixture();
        let record = fx.registry.create("y", &persona(&fx, "y", "Y")).await.unwrap();
        fx.backend.set_available(false);

        let err = fx.registry.remove(&record.name).await.unwrap_err();
        assert!(err.is_backend_unavailable());
        assert_eq!(fx.registry.records().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_stop_keeps_registration() {
        let fx = fixture();
        let record = fx.registry.create("s", &persona(&fx, "s", "S")).await.unwrap();

        assert!(fx.registry.stop(&record.name).await.unwrap());
        assert!(!fx.registry.stop(&record.name).await.unwrap());
        assert!(fx.registry.is_registered(&record.name).unwrap());
    }

    #[tokio::test]
    async fn test_reset_all_clears_everything() {
        let fx = fixture();
        let a = fx.registry.create("a", &persona(&fx, "a", "A")).await.unwrap();
        fx.registry.create("b", &persona(&fx, "b", "B")).await.unwrap();
        fx.backend.vanish(&a.handle);

        let report = fx.registry.reset_all().await.unwrap();
        assert_eq!(report.removed.len(), 1);
        assert_eq!(report.already_gone, vec![a.name]);
        assert!(fx.registry.records().unwrap().is_empty());
        assert!(fx.backend.environment_names().is_empty());
    }

    #[tokio::test]
    async fn test_seed_only_when_empty() {
        let fx = fixture();
        persona(&fx, "socrates", "Questions.");
        persona(&fx, "aristotle", "Categories.");
        std::fs::write(fx.personas.join("notes.md"), "ignored").unwrap();

        let created = fx.registry.seed_from_dir(&fx.personas).await.unwrap();
        let names: Vec<&str> = created.iter().map(AgentName::as_str).collect();
        assert_eq!(names, vec!["@aristotle", "@socrates"]);

        let again = fx.registry.seed_from_dir(&fx.personas).await.unwrap();
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn test_seed_skips_invalid_names() {
        let fx = fixture();
        persona(&fx, "good", "Fine.");
        persona(&fx, "bad name", "Rejected.");

        let created = fx.registry.seed_from_dir(&fx.personas).await.unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].as_str(), "@good");
    }
}
