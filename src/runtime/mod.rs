use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

mod docker;
pub use docker::DockerRuntime;

mod memory;
pub use memory::InMemoryRuntime;

/// The container runtime capabilities the provisioner relies on.
///
/// The real implementation shells out to the `docker` CLI; the in-memory
/// implementation backs the test suite. All calls are blocking from the
/// provisioner's point of view: it awaits each one before moving to the next
/// instance.
#[async_trait]
pub trait ContainerRuntime {
    /// Verify the runtime daemon is reachable with the current privileges.
    async fn ping(&self) -> Result<(), RuntimeError>;

    /// Pull the given image reference.
    async fn image_pull(&self, image: &str) -> Result<(), RuntimeError>;

    /// Remove the given image reference.
    async fn image_remove(&self, image: &str) -> Result<(), RuntimeError>;

    /// Whether a network with the given name exists.
    async fn network_exists(&self, name: &str) -> Result<bool, RuntimeError>;

    /// Create a network with the given name.
    async fn network_create(&self, name: &str) -> Result<(), RuntimeError>;

    /// Start a detached container according to the given spec.
    async fn container_run(&self, spec: ContainerSpec) -> Result<(), RuntimeError>;

    /// Stop the named container.
    async fn container_stop(&self, name: &str) -> Result<(), RuntimeError>;

    /// Remove the named container.
    async fn container_remove(&self, name: &str) -> Result<(), RuntimeError>;

    /// Names of all containers (running or not) whose name starts with the
    /// given prefix, sorted.
    async fn container_list(&self, name_prefix: &str) -> Result<Vec<String>, RuntimeError>;

    /// Recent log output of the named container.
    async fn container_logs(&self, name: &str, tail: usize) -> Result<String, RuntimeError>;
}

/// Everything needed to start one instance container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    /// Unique container name derived from the instance index.
    pub name: String,
    /// Image reference shared by the batch.
    pub image: String,
    /// Path to the persisted env file bound into the container.
    pub env_file: PathBuf,
    /// `(host, container)` port pair to publish, if the variant is networked.
    pub published_port: Option<(u16, u16)>,
    /// Named virtual network shared by the batch.
    pub network: Option<String>,
    /// Docker-style restart policy, e.g. `unless-stopped`.
    pub restart_policy: Option<String>,
    /// Extra environment passed on top of the env file.
    pub env_vars: Vec<(String, String)>,
}

/// An error that can occur when driving the container runtime.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum RuntimeError {
    #[error("Runtime unreachable with current privileges: {0}")]
    PermissionDenied(String),
    #[error("No such object: {0}")]
    NotFound(String),
    #[error("`{command}` exited with status {status}: {stderr}")]
    CommandFailed { command: String, status: i32, stderr: String },
    #[error("Failed to spawn `{command}`: {err}")]
    Spawn { command: String, err: std::io::Error },
}
