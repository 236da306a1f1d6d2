//! In-memory execution backend.
//!
//! Deterministic stand-in for a container runtime: environments are plain
//! records, `run` answers through a scriptable responder, and every
//! invocation is journaled. Used by the test suites and by the CLI's
//! dry-run mode.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::{
    BackendError, BackendResult, EnvironmentHandle, EnvironmentSpec, EnvironmentStatus,
    ExecutionBackend, RunOutput,
};

/// Produces the output of a `run` call.
pub type Responder = Arc<dyn Fn(&Invocation) -> RunOutput + Send + Sync>;

/// One recorded `run` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Sequence number across the whole backend, starting at 1.
    pub seq: u64,
    pub handle: EnvironmentHandle,
    /// Name the environment was created with.
    pub environment: String,
    pub command: Vec<String>,
    pub env: BTreeMap<String, String>,
}

struct Environment {
    spec: EnvironmentSpec,
    running: bool,
}

struct Inner {
    next_id: u64,
    next_seq: u64,
    available: bool,
    environments: HashMap<EnvironmentHandle, Environment>,
    failures: HashMap<String, RunOutput>,
    journal: Vec<Invocation>,
    responder: Responder,
}

/// Backend keeping every environment in process memory.
pub struct InMemoryBackend {
    inner: Mutex<Inner>,
}

impl InMemoryBackend {
    /// Backend whose agents answer `"<environment> reply #<seq>"`.
    pub fn new() -> Self {
        Self::with_responder(|inv: &Invocation| {
            RunOutput::success(format!("{} reply #{}\n", inv.environment, inv.seq))
        })
    }

    /// Backend answering every `run` through `responder`.
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&Invocation) -> RunOutput + Send + Sync + 'static,
    {
        Self {
            inner: Mutex::new(Inner {
                next_id: 1,
                next_seq: 1,
                available: true,
                environments: HashMap::new(),
                failures: HashMap::new(),
                journal: Vec::new(),
                responder: Arc::new(responder),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make every later `run` in the named environment return `output`.
    pub fn fail_environment(&self, environment: &str, output: RunOutput) {
        self.lock().failures.insert(environment.to_string(), output);
    }

    pub fn clear_failure(&self, environment: &str) {
        self.lock().failures.remove(environment);
    }

    /// Toggle reachability; while unavailable every call fails.
    pub fn set_available(&self, available: bool) {
        self.lock().available = available;
    }

    /// Stop an environment behind the registry's back.
    pub fn stop_externally(&self, handle: &EnvironmentHandle) {
        if let Some(env) = self.lock().environments.get_mut(handle) {
            env.running = false;
        }
    }

    /// Drop an environment behind the registry's back.
    pub fn vanish(&self, handle: &EnvironmentHandle) {
        self.lock().environments.remove(handle);
    }

    /// Every `run` call so far, in order.
    pub fn invocations(&self) -> Vec<Invocation> {
        self.lock().journal.clone()
    }

    /// Names of the environments that currently exist, sorted.
    pub fn environment_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .lock()
            .environments
            .values()
            .map(|e| e.spec.name.clone())
            .collect();
        names.sort();
        names
    }

    /// Spec an environment was created with.
    pub fn spec_of(&self, handle: &EnvironmentHandle) -> Option<EnvironmentSpec> {
        self.lock().environments.get(handle).map(|e| e.spec.clone())
    }

    fn ensure_available(inner: &Inner) -> BackendResult<()> {
        if inner.available {
            Ok(())
        } else {
            Err(BackendError::unavailable("in-memory backend switched off"))
        }
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExecutionBackend for InMemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn ping(&self) -> BackendResult<()> {
        Self::ensure_available(&self.lock())
    }

    async fn create_environment(&self, spec: &EnvironmentSpec) -> BackendResult<EnvironmentHandle> {
        let mut inner = self.lock();
        Self::ensure_available(&inner)?;

        if inner.environments.values().any(|e| e.spec.name == spec.name) {
            return Err(BackendError::rejected(
                "create",
                format!("name {} already in use", spec.name),
            ));
        }

        let handle = EnvironmentHandle::new(format!("{:012x}", inner.next_id));
        inner.next_id += 1;
        inner.environments.insert(
            handle.clone(),
            Environment {
                spec: spec.clone(),
                running: false,
            },
        );
        Ok(handle)
    }

    async fn start_environment(&self, handle: &EnvironmentHandle) -> BackendResult<()> {
        let mut inner = self.lock();
        Self::ensure_available(&inner)?;
        let env = inner
            .environments
            .get_mut(handle)
            .ok_or_else(|| BackendError::not_found(handle.as_str()))?;
        env.running = true;
        Ok(())
    }

    async fn stop_environment(&self, handle: &EnvironmentHandle) -> BackendResult<()> {
        let mut inner = self.lock();
        Self::ensure_available(&inner)?;
        let env = inner
            .environments
            .get_mut(handle)
            .ok_or_else(|| BackendError::not_found(handle.as_str()))?;
        env.running = false;
        Ok(())
    }

    async fn remove_environment(&self, handle: &EnvironmentHandle) -> BackendResult<()> {
        let mut inner = self.lock();
        Self::ensure_available(&inner)?;
        inner
            .environments
            .remove(handle)
            .map(|_| ())
            .ok_or_else(|| BackendError::not_found(handle.as_str()))
    }

    async fn run(
        &self,
        handle: &EnvironmentHandle,
        command: &[String],
        env: &BTreeMap<String, String>,
    ) -> BackendResult<RunOutput> {
        let mut inner = self.lock();
        Self::ensure_available(&inner)?;

        let environment = match inner.environments.get(handle) {
            Some(e) if e.running => e.spec.name.clone(),
            Some(e) => {
                return Err(BackendError::rejected(
                    "run",
                    format!("environment {} is not running", e.spec.name),
                ))
            }
            None => return Err(BackendError::not_found(handle.as_str())),
        };

        let invocation = Invocation {
            seq: inner.next_seq,
            handle: handle.clone(),
            environment: environment.clone(),
            command: command.to_vec(),
            env: env.clone(),
        };
        inner.next_seq += 1;
        inner.journal.push(invocation.clone());

        let failure = inner.failures.get(&environment).cloned();
        let responder = Arc::clone(&inner.responder);
        drop(inner);

        Ok(failure.unwrap_or_else(|| responder(&invocation)))
    }

    async fn status(&self, handle: &EnvironmentHandle) -> BackendResult<EnvironmentStatus> {
        let inner = self.lock();
        Self::ensure_available(&inner)?;
        Ok(match inner.environments.get(handle) {
            Some(e) if e.running => EnvironmentStatus::Running,
            Some(_) => EnvironmentStatus::Stopped,
            None => EnvironmentStatus::Missing,
        })
    }
}
