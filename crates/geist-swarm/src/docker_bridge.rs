//! Execution backend over the `docker` CLI.
//!
//! Every operation shells out to `docker`. Environment variable *values*
//! are passed through the CLI process environment and only their names
//! appear on the command line (`-e NAME`), so credentials and prompts never
//! show up in process listings.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};

use async_trait::async_trait;
use coordination::backend::{
    BackendError, BackendResult, EnvironmentHandle, EnvironmentSpec, EnvironmentStatus,
    ExecutionBackend, RunOutput,
};
use tokio::process::Command;
use tracing::{debug, info};

/// Characters of the container id used as the environment handle.
pub const SHORT_ID_LEN: usize = 12;

/// Docker Desktop socket, relative to the home directory.
const DESKTOP_SOCKET: &str = ".docker/run/docker.sock";

/// Bridge to the `docker` CLI binary.
pub struct DockerBridge {
    bin: String,
    host: Option<String>,
}

impl DockerBridge {
    /// Bridge using `docker` from `PATH`, honouring Docker Desktop's socket.
    pub fn new() -> Self {
        let host_set = std::env::var_os("DOCKER_HOST").is_some();
        let host = desktop_socket(dirs::home_dir().as_deref(), host_set);
        if let Some(host) = &host {
            debug!(host = %host, "Using Docker Desktop socket");
        }
        Self {
            bin: "docker".to_string(),
            host,
        }
    }

    pub fn with_binary(bin: impl Into<String>) -> Self {
        Self {
            bin: bin.into(),
            host: None,
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.bin);
        if let Some(host) = &self.host {
            cmd.env("DOCKER_HOST", host);
        }
        cmd.stdin(Stdio::null());
        cmd
    }

    /// Run `docker <args>` with `env` exported to the CLI process.
    async fn docker(
        &self,
        args: &[String],
        env: &BTreeMap<String, String>,
    ) -> BackendResult<Output> {
        debug!(args = ?args, "Running docker");
        let operation = args.first().map(String::as_str).unwrap_or("docker");
        self.command()
            .args(args)
            .envs(env)
            .output()
            .await
            .map_err(|e| classify_spawn_error(&self.bin, operation, &e))
    }

    /// Run a docker subcommand that must succeed; returns trimmed stdout.
    async fn checked(
        &self,
        operation: &str,
        target: &str,
        args: &[String],
    ) -> BackendResult<String> {
        let output = self.docker(args, &BTreeMap::new()).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure(operation, target, &stderr));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Full container id for `handle`: exact lookup first, then a prefix
    /// match over every container (id prefix or name suffix).
    async fn resolve_id(&self, handle: &EnvironmentHandle) -> BackendResult<String> {
        let args = strings(&[
            "inspect",
            "--type",
            "container",
            "--format",
            "{{.Id}}",
            handle.as_str(),
        ]);
        match self.checked("inspect", handle.as_str(), &args).await {
            Ok(id) => return Ok(id),
            Err(BackendError::NotFound { .. }) => {}
            Err(e) => return Err(e),
        }

        let args = strings(&["ps", "-a", "--no-trunc", "--format", "{{.ID}}\t{{.Names}}"]);
        let listing = self.checked("ps", handle.as_str(), &args).await?;
        match match_prefix(&parse_ps(&listing), handle.as_str()) {
            Some(id) => {
                debug!(handle = %handle, id = %id, "Resolved environment by prefix");
                Ok(id)
            }
            None => Err(BackendError::not_found(handle.as_str())),
        }
    }
}

impl Default for DockerBridge {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExecutionBackend for DockerBridge {
    fn name(&self) -> &str {
        "docker"
    }

    async fn ping(&self) -> BackendResult<()> {
        let output = self
            .docker(&strings(&["info", "--format", "{{.ServerVersion}}"]), &BTreeMap::new())
            .await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BackendError::unavailable(format!(
                "Could not connect to Docker. Is Docker running? {}",
                stderr.trim()
            )));
        }
        Ok(())
    }

    async fn create_environment(&self, spec: &EnvironmentSpec) -> BackendResult<EnvironmentHandle> {
        let output = self.docker(&create_args(spec), &spec.env).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure("create", &spec.name, &stderr));
        }

        let id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        info!(container = %spec.name, id = %short_id(&id), "Container created");
        Ok(EnvironmentHandle::new(short_id(&id)))
    }

    async fn start_environment(&self, handle: &EnvironmentHandle) -> BackendResult<()> {
        let id = self.resolve_id(handle).await?;
        self.checked("start", handle.as_str(), &strings(&["start", id.as_str()]))
            .await
            .map(|_| ())
    }

    async fn stop_environment(&self, handle: &EnvironmentHandle) -> BackendResult<()> {
        let id = self.resolve_id(handle).await?;
        self.checked("stop", handle.as_str(), &strings(&["stop", id.as_str()]))
            .await
            .map(|_| ())
    }

    async fn remove_environment(&self, handle: &EnvironmentHandle) -> BackendResult<()> {
        let id = self.resolve_id(handle).await?;
        self.checked("rm", handle.as_str(), &strings(&["rm", id.as_str()]))
            .await
            .map(|_| ())
    }

    async fn run(
        &self,
        handle: &EnvironmentHandle,
        command: &[String],
        env: &BTreeMap<String, String>,
    ) -> BackendResult<RunOutput> {
        let id = self.resolve_id(handle).await?;
        let output = self.docker(&exec_args(&id, command, env), env).await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() && is_daemon_error(&stderr) {
            return Err(classify_failure("exec", handle.as_str(), &stderr));
        }

        Ok(RunOutput {
            exit_code: output.status.code().map(i64::from).unwrap_or(-1),
            output: format!("{stdout}{stderr}"),
        })
    }

    async fn status(&self, handle: &EnvironmentHandle) -> BackendResult<EnvironmentStatus> {
        let id = match self.resolve_id(handle).await {
            Ok(id) => id,
            Err(BackendError::NotFound { .. }) => return Ok(EnvironmentStatus::Missing),
            Err(e) => return Err(e),
        };

        let args = strings(&[
            "inspect",
            "--type",
            "container",
            "--format",
            "{{.State.Running}}",
            id.as_str(),
        ]);
        match self.checked("inspect", handle.as_str(), &args).await {
            Ok(running) if running == "true" => Ok(EnvironmentStatus::Running),
            Ok(_) => Ok(EnvironmentStatus::Stopped),
            Err(BackendError::NotFound { .. }) => Ok(EnvironmentStatus::Missing),
            Err(e) => Err(e),
        }
    }
}

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|a| a.to_string()).collect()
}

/// `docker create` arguments for `spec`.
pub fn create_args(spec: &EnvironmentSpec) -> Vec<String> {
    let mut args = strings(&[
        "create",
        "--name",
        spec.name.as_str(),
        "--workdir",
        spec.working_dir.as_str(),
    ]);
    for mount in &spec.mounts {
        let mut volume = format!("{}:{}", mount.volume, mount.target);
        if mount.read_only {
            volume.push_str(":ro");
        }
        args.push("--volume".to_string());
        args.push(volume);
    }
    for key in spec.env.keys() {
        args.push("--env".to_string());
        args.push(key.clone());
    }
    args.push(spec.image.clone());
    args.extend(spec.command.iter().cloned());
    args
}

/// `docker exec` arguments; values of `env` travel in the CLI environment.
pub fn exec_args(id: &str, command: &[String], env: &BTreeMap<String, String>) -> Vec<String> {
    let mut args = vec!["exec".to_string()];
    for key in env.keys() {
        args.push("--env".to_string());
        args.push(key.clone());
    }
    args.push(id.to_string());
    args.extend(command.iter().cloned());
    args
}

pub fn short_id(id: &str) -> String {
    id.chars().take(SHORT_ID_LEN).collect()
}

/// `(id, name)` pairs from `docker ps --format '{{.ID}}\t{{.Names}}'`.
pub fn parse_ps(stdout: &str) -> Vec<(String, String)> {
    stdout
        .lines()
        .filter_map(|line| {
            let (id, name) = line.trim().split_once('\t')?;
            Some((id.to_string(), name.to_string()))
        })
        .collect()
}

/// First container whose id starts with, or whose name ends with, `handle`.
pub fn match_prefix(containers: &[(String, String)], handle: &str) -> Option<String> {
    if handle.is_empty() {
        return None;
    }
    containers
        .iter()
        .find(|(id, name)| id.starts_with(handle) || name.ends_with(handle))
        .map(|(id, _)| id.clone())
}

fn is_daemon_error(stderr: &str) -> bool {
    stderr.contains("Error response from daemon")
        || stderr.contains("Cannot connect to the Docker daemon")
}

/// Map a failed docker invocation to the backend taxonomy.
pub fn classify_failure(operation: &str, target: &str, stderr: &str) -> BackendError {
    let lower = stderr.to_lowercase();
    if lower.contains("no such container") || lower.contains("no such object") {
        BackendError::not_found(target)
    } else if lower.contains("cannot connect to the docker daemon")
        || lower.contains("is the docker daemon running")
        || lower.contains("error during connect")
    {
        BackendError::unavailable(stderr.trim())
    } else {
        BackendError::rejected(operation, stderr.trim())
    }
}

/// Map a failure to start the docker CLI itself.
///
/// A missing or non-executable binary means there is no backend; anything
/// else (for example an environment too large for `exec`) only affects this
/// request.
pub fn classify_spawn_error(bin: &str, operation: &str, err: &std::io::Error) -> BackendError {
    match err.kind() {
        ErrorKind::NotFound | ErrorKind::PermissionDenied => {
            BackendError::unavailable(format!("failed to run `{bin}`: {err}"))
        }
        _ => BackendError::rejected(operation, format!("failed to run `{bin}`: {err}")),
    }
}

/// `unix://` URL of Docker Desktop's socket when `DOCKER_HOST` is unset.
pub fn desktop_socket(home: Option<&Path>, docker_host_set: bool) -> Option<String> {
    if docker_host_set {
        return None;
    }
    let socket: PathBuf = home?.join(DESKTOP_SOCKET);
    socket
        .exists()
        .then(|| format!("unix://{}", socket.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use coordination::backend::VolumeMount;
    use std::io;

    fn spec() -> EnvironmentSpec {
        let mut env = BTreeMap::new();
        env.insert("ANTHROPIC_API_KEY".to_string(), "sk-secret".to_string());
        EnvironmentSpec {
            name: "geist-swarm-dogen".to_string(),
            image: "geist-runner".to_string(),
            env,
            mounts: vec![VolumeMount::read_write("geist-shared", "/shared")],
            working_dir: "/workspace".to_string(),
            command: strings(&["tail", "-f", "/dev/null"]),
        }
    }

    #[test]
    fn test_create_args_keep_secret_values_off_the_command_line() {
        let args = create_args(&spec());
        assert_eq!(
            args,
            strings(&[
                "create",
                "--name",
                "geist-swarm-dogen",
                "--workdir",
                "/workspace",
                "--volume",
                "geist-shared:/shared",
                "--env",
                "ANTHROPIC_API_KEY",
                "geist-runner",
                "tail",
                "-f",
                "/dev/null",
            ])
        );
        assert!(!args.iter().any(|a| a.contains("sk-secret")));
    }

    #[test]
    fn test_exec_args_name_variables_only() {
        let mut env = BTreeMap::new();
        env.insert("GEIST_PROMPT".to_string(), "You are @dogen".to_string());
        let args = exec_args("abc123", &strings(&["bash", "-c", "true"]), &env);
        assert_eq!(
            args,
            strings(&["exec", "--env", "GEIST_PROMPT", "abc123", "bash", "-c", "true"])
        );
    }

    #[test]
    fn test_prefix_match_by_id_or_name_suffix() {
        let listing = "0123456789abcdef\tgeist-swarm-dogen\nfedcba9876543210\tgeist-swarm-kant\n";
        let containers = parse_ps(listing);
        assert_eq!(containers.len(), 2);

        assert_eq!(
            match_prefix(&containers, "0123456789ab").as_deref(),
            Some("0123456789abcdef")
        );
        assert_eq!(
            match_prefix(&containers, "kant").as_deref(),
            Some("fedcba9876543210")
        );
        assert!(match_prefix(&containers, "hume").is_none());
        assert!(match_prefix(&containers, "").is_none());
    }

    #[test]
    fn test_failure_classification() {
        assert!(classify_failure("start", "abc", "Error: No such container: abc").is_not_found());
        assert!(matches!(
            classify_failure(
                "ps",
                "abc",
                "Cannot connect to the Docker daemon at unix:///var/run/docker.sock. \
                 Is the docker daemon running?"
            ),
            BackendError::Unavailable { .. }
        ));
        assert!(matches!(
            classify_failure(
                "create",
                "geist-swarm-a",
                "Conflict. The container name is already in use"
            ),
            BackendError::Rejected { .. }
        ));
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("0123456789abcdef0123"), "0123456789ab");
        assert_eq!(short_id("abc"), "abc");
    }

    #[test]
    fn test_desktop_socket_detection() {
        let home = tempfile::tempdir().unwrap();
        assert!(desktop_socket(Some(home.path()), false).is_none());

        let socket = home.path().join(DESKTOP_SOCKET);
        std::fs::create_dir_all(socket.parent().unwrap()).unwrap();
        std::fs::write(&socket, "").unwrap();

        let found = desktop_socket(Some(home.path()), false).unwrap();
        assert!(found.starts_with("unix://"));
        assert!(found.ends_with("docker.sock"));
        assert!(desktop_socket(Some(home.path()), true).is_none());
        assert!(desktop_socket(None, false).is_none());
    }

    #[test]
    fn test_missing_binary_means_unavailable() {
        let err = io::Error::new(ErrorKind::NotFound, "No such file or directory");
        let mapped = classify_spawn_error("docker", "exec", &err);
        assert!(matches!(mapped, BackendError::Unavailable { .. }));
    }

    #[test]
    fn test_oversized_environment_rejects_only_the_request() {
        let err = io::Error::new(ErrorKind::Other, "Argument list too long");
        match classify_spawn_error("docker", "exec", &err) {
            BackendError::Rejected { operation, message } => {
                assert_eq!(operation, "exec");
                assert!(message.contains("Argument list too long"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
