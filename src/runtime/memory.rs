use std::sync::Mutex;

use async_trait::async_trait;
use hashbrown::{HashMap, HashSet};

use super::{ContainerRuntime, ContainerSpec, RuntimeError};

/// An in-memory container runtime.
///
/// Tracks images, networks and containers in plain maps and records every
/// image pull, so fleet operations can be exercised end to end without a
/// daemon and their side effects asserted on afterwards.
#[derive(Debug, Default)]
pub struct InMemoryRuntime {
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    images: HashSet<String>,
    pulls: usize,
    networks: HashSet<String>,
    containers: HashMap<String, ContainerSpec>,
}

impl InMemoryRuntime {
    /// Create an empty runtime.
    pub fn new() -> Self {
        Self::default()
    }

    /// How many image pulls have been requested so far.
    pub fn pull_count(&self) -> usize {
        self.lock().pulls
    }

    /// Whether the given image is present.
    pub fn has_image(&self, image: &str) -> bool {
        self.lock().images.contains(image)
    }

    /// Names of all containers, sorted.
    pub fn containers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().containers.keys().cloned().collect();
        names.sort();
        names
    }

    /// The spec the named container was started with.
    pub fn container(&self, name: &str) -> Option<ContainerSpec> {
        self.lock().containers.get(name).cloned()
    }

    /// Drop a container behind the provisioner's back, as an external
    /// `docker rm` would.
    pub fn forget(&self, name: &str) {
        self.lock().containers.remove(name);
    }

    /// Pre-create a container with the given name, occupying it.
    pub fn occupy(&self, name: &str) {
        let spec = ContainerSpec {
            name: name.to_string(),
            image: String::new(),
            env_file: Default::default(),
            published_port: None,
            network: None,
            restart_policy: None,
            env_vars: Vec::new(),
        };
        self.lock().containers.insert(name.to_string(), spec);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("runtime state lock poisoned")
    }
}

#[async_trait]
impl ContainerRuntime for InMemoryRuntime {
    async fn ping(&self) -> Result<(), RuntimeError> {
        Ok(())
    }

    async fn image_pull(&self, image: &str) -> Result<(), RuntimeError> {
        let mut state = self.lock();
        state.pulls += 1;
        state.images.insert(image.to_string());
        Ok(())
    }

    async fn image_remove(&self, image: &str) -> Result<(), RuntimeError> {
        if self.lock().images.remove(image) {
            Ok(())
        } else {
            Err(RuntimeError::NotFound(format!("no such image: {image}")))
        }
    }

    async fn network_exists(&self, name: &str) -> Result<bool, RuntimeError> {
        Ok(self.lock().networks.contains(name))
    }

    async fn network_create(&self, name: &str) -> Result<(), RuntimeError> {
        self.lock().networks.insert(name.to_string());
        Ok(())
    }

    async fn container_run(&self, spec: ContainerSpec) -> Result<(), RuntimeError> {
        let mut state = self.lock();
        if state.containers.contains_key(&spec.name) {
            return Err(RuntimeError::CommandFailed {
                command: format!("run {}", spec.name),
                status: 125,
                stderr: format!("container name {:?} is already in use", spec.name),
            });
        }

        state.containers.insert(spec.name.clone(), spec);
        Ok(())
    }

    async fn container_stop(&self, name: &str) -> Result<(), RuntimeError> {
        if self.lock().containers.contains_key(name) {
            Ok(())
        } else {
            Err(RuntimeError::NotFound(format!("no such container: {name}")))
        }
    }

    async fn container_remove(&self, name: &str) -> Result<(), RuntimeError> {
        if self.lock().containers.remove(name).is_some() {
            Ok(())
        } else {
            Err(RuntimeError::NotFound(format!("no such container: {name}")))
        }
    }

    async fn container_list(&self, name_prefix: &str) -> Result<Vec<String>, RuntimeError> {
        let mut names: Vec<String> = self
            .lock()
            .containers
            .keys()
            .filter(|name| name.starts_with(name_prefix))
            .cloned()
            .collect();
        names.sort();
        Ok(names)
    }

    async fn container_logs(&self, name: &str, tail: usize) -> Result<String, RuntimeError> {
        let state = self.lock();
        let spec = state
            .containers
            .get(name)
            .ok_or_else(|| RuntimeError::NotFound(format!("no such container: {name}")))?;

        Ok(format!("{} lines from {} ({})\n", tail, spec.name, spec.image))
    }
}
