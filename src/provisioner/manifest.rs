use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{common::FleetError, config::FleetConfig, provisioner::envfile};

/// On-disk record of the working set: every instance created by the last
/// launch, with enough metadata to update or delete it later without
/// re-specifying anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Image shared by all tracked instances.
    pub image: String,
    /// Network shared by all tracked instances.
    pub network: String,
    /// Tracked instances in index order.
    pub instances: Vec<ManifestEntry>,
}

/// One tracked instance inside the [`Manifest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// The instance incremental index.
    pub index: u32,
    /// Derived container name.
    pub container: String,
    /// Display name the instance was provisioned with.
    pub display_name: String,
    /// Path to the persisted env-file artifact.
    pub env_file: PathBuf,
    /// Host port the instance publishes.
    pub host_port: u16,
}

impl Manifest {
    /// An empty manifest for the configured fleet.
    pub fn new(config: &FleetConfig) -> Self {
        Self { image: config.image.clone(), network: config.network.clone(), instances: Vec::new() }
    }

    /// Load the manifest from disk. `None` when no manifest has been written.
    pub fn load(path: &Path) -> Result<Option<Self>, FleetError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path)?;
        let manifest = serde_json::from_str(&content)?;
        debug!(path = %path.display(), "Loaded fleet manifest");
        Ok(Some(manifest))
    }

    /// Persist the manifest, creating the state directory if needed.
    pub fn save(&self, path: &Path) -> Result<(), FleetError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        debug!(path = %path.display(), instances = self.instances.len(), "Saved fleet manifest");
        Ok(())
    }

    /// Delete the manifest file, tolerating its absence.
    pub fn remove(path: &Path) -> Result<(), FleetError> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Rebuild the working set from the generated env files, for when the
    /// manifest itself has been lost. Indices are recovered from the
    /// `<prefix>-<index>.env` file names.
    pub fn discover(config: &FleetConfig) -> Result<Self, FleetError> {
        let mut manifest = Self::new(config);
        if !config.state_dir.exists() {
            return Ok(manifest);
        }

        let prefix = format!("{}-", config.container_prefix);
        let mut indices = Vec::new();
        for entry in fs::read_dir(&config.state_dir)? {
            let name = entry?.file_name().to_string_lossy().into_owned();
            let index = name
                .strip_suffix(".env")
                .and_then(|stem| stem.strip_prefix(&prefix))
                .and_then(|raw| raw.parse::<u32>().ok());
            if let Some(index) = index {
                indices.push(index);
            }
        }
        indices.sort_unstable();

        for index in indices {
            let env_file = config.env_file_path(index);
            let display_name = envfile::read(&env_file)
                .ok()
                .and_then(|pairs| {
                    envfile::lookup(&pairs, envfile::DISPLAY_NAME_KEY).map(str::to_string)
                })
                .unwrap_or_default();

            manifest.instances.push(ManifestEntry {
                index,
                container: config.container_name(index),
                display_name,
                env_file,
                host_port: config.host_port(index),
            });
        }

        if !manifest.instances.is_empty() {
            info!(instances = manifest.instances.len(), "Recovered working set from env files");
        }

        Ok(manifest)
    }
}
