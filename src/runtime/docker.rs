use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, trace};

use super::{ContainerRuntime, ContainerSpec, RuntimeError};

/// Container runtime backed by the local `docker` CLI.
#[derive(Debug, Clone, Copy, Default)]
pub struct DockerRuntime;

impl DockerRuntime {
    /// Create a new runtime handle. The docker daemon is not contacted until
    /// the first operation.
    pub fn new() -> Self {
        Self
    }

    /// Run `docker` with the given arguments and capture its stdout.
    async fn docker(&self, args: &[&str]) -> Result<String, RuntimeError> {
        let command = format!("docker {}", args.join(" "));
        trace!(%command, "Invoking runtime");

        let output = Command::new("docker")
            .args(args)
            .output()
            .await
            .map_err(|err| RuntimeError::Spawn { command: command.clone(), err })?;

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }

        let status = output.status.code().unwrap_or(-1);
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Err(classify(command, status, stderr))
    }
}

/// Map a failed docker invocation onto the runtime error taxonomy, so callers
/// can tell "nothing to act on" and "not allowed" apart from real failures.
fn classify(command: String, status: i32, stderr: String) -> RuntimeError {
    let lowered = stderr.to_ascii_lowercase();

    if lowered.contains("permission denied") || lowered.contains("connect: permission") {
        return RuntimeError::PermissionDenied(stderr);
    }

    if lowered.contains("no such container") ||
        lowered.contains("no such image") ||
        lowered.contains("no such network") ||
        lowered.contains("not found")
    {
        return RuntimeError::NotFound(stderr);
    }

    RuntimeError::CommandFailed { command, status, stderr }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn ping(&self) -> Result<(), RuntimeError> {
        let version = self.docker(&["version", "--format", "{{.Server.Version}}"]).await?;
        debug!(version = version.trim(), "Runtime reachable");
        Ok(())
    }

    async fn image_pull(&self, image: &str) -> Result<(), RuntimeError> {
        self.docker(&["pull", image]).await.map(drop)
    }

    async fn image_remove(&self, image: &str) -> Result<(), RuntimeError> {
        self.docker(&["rmi", image]).await.map(drop)
    }

    async fn network_exists(&self, name: &str) -> Result<bool, RuntimeError> {
        match self.docker(&["network", "inspect", name, "--format", "{{.Name}}"]).await {
            Ok(_) => Ok(true),
            Err(RuntimeError::NotFound(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn network_create(&self, name: &str) -> Result<(), RuntimeError> {
        self.docker(&["network", "create", name]).await.map(drop)
    }

    async fn container_run(&self, spec: ContainerSpec) -> Result<(), RuntimeError> {
        let env_file = spec.env_file.display().to_string();
        let mut args: Vec<String> = vec![
            "run".into(),
            "-d".into(),
            "--name".into(),
            spec.name,
            "--env-file".into(),
            env_file,
        ];

        if let Some(network) = spec.network {
            args.push("--network".into());
            args.push(network);
        }

        if let Some((host, container)) = spec.published_port {
            args.push("-p".into());
            args.push(format!("{host}:{container}"));
        }

        if let Some(policy) = spec.restart_policy {
            args.push("--restart".into());
            args.push(policy);
        }

        for (key, value) in &spec.env_vars {
            args.push("-e".into());
            args.push(format!("{key}={value}"));
        }

        args.push(spec.image);

        let argv: Vec<&str> = args.iter().map(String::as_str).collect();
        self.docker(&argv).await.map(drop)
    }

    async fn container_stop(&self, name: &str) -> Result<(), RuntimeError> {
        self.docker(&["stop", name]).await.map(drop)
    }

    async fn container_remove(&self, name: &str) -> Result<(), RuntimeError> {
        self.docker(&["rm", name]).await.map(drop)
    }

    async fn container_list(&self, name_prefix: &str) -> Result<Vec<String>, RuntimeError> {
        let filter = format!("name={name_prefix}");
        let output =
            self.docker(&["ps", "-a", "--filter", &filter, "--format", "{{.Names}}"]).await?;

        // The name filter matches substrings; keep prefix matches only.
        let mut names: Vec<String> = output
            .lines()
            .map(str::trim)
            .filter(|name| name.starts_with(name_prefix))
            .map(str::to_string)
            .collect();
        names.sort();

        Ok(names)
    }

    async fn container_logs(&self, name: &str, tail: usize) -> Result<String, RuntimeError> {
        let tail = tail.to_string();
        self.docker(&["logs", "--tail", &tail, name]).await
    }
}
