use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::common::EnvironmentMode;

/// Fleet-wide provisioning configuration.
///
/// Loaded from a JSON file; every field has a default so a partial file (or
/// none at all) is enough to get a local fleet going.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    /// Directory holding the manifest and the generated env files.
    pub state_dir: PathBuf,
    /// File with one display name per line.
    pub names_file: PathBuf,
    /// File with one beneficiary address per line.
    pub beneficiaries_file: PathBuf,
    /// File with one signing key per line.
    pub keys_file: PathBuf,
    /// Optional file with one `user:pass@host:port` descriptor per line.
    /// The list may be shorter than the fleet; it is reused cyclically.
    pub proxies_file: Option<PathBuf>,
    /// Container image shared by every instance of the fleet.
    pub image: String,
    /// Container name prefix; the instance index is appended.
    pub container_prefix: String,
    /// Named virtual network shared by all instances.
    pub network: String,
    /// First published host port. Instance `i` publishes `base_port + i - 1`.
    pub base_port: u16,
    /// Port the executor listens on inside the container.
    pub container_port: u16,
    /// Deployment environment written into every env file.
    pub environment: EnvironmentMode,
    /// Docker-style restart policy applied to every container.
    pub restart_policy: String,
    /// How to treat instances whose proxy fails the reachability probe.
    pub proxy_policy: ProxyPolicy,
    /// Whether a failing instance aborts the rest of a launch batch.
    pub failure_policy: FailurePolicy,
    /// Where per-instance display names come from.
    pub identity_source: IdentitySource,
    /// URL probed through each proxy when proxy gating is enabled.
    pub probe_url: Url,
    /// Extra environment passed verbatim to every container.
    pub extra_env: Vec<(String, String)>,
    /// Remove the shared image once the last tracked instance is deleted.
    pub remove_image: bool,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from("fleet"),
            names_file: PathBuf::from("names.txt"),
            beneficiaries_file: PathBuf::from("beneficiaries.txt"),
            keys_file: PathBuf::from("keys.txt"),
            proxies_file: None,
            image: "ghcr.io/example/strategy-executor:latest".to_string(),
            container_prefix: "executor".to_string(),
            network: "executor-net".to_string(),
            base_port: 18550,
            container_port: 8080,
            environment: EnvironmentMode::default(),
            restart_policy: "unless-stopped".to_string(),
            proxy_policy: ProxyPolicy::default(),
            failure_policy: FailurePolicy::default(),
            identity_source: IdentitySource::default(),
            probe_url: Url::parse("https://api.ipify.org").expect("static url"),
            extra_env: Vec::new(),
            remove_image: true,
        }
    }
}

impl FleetConfig {
    /// Load the configuration from the given JSON file, falling back to the
    /// defaults when the file does not exist.
    pub fn load(path: &Path) -> eyre::Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let config = serde_json::from_str(&content)?;
        debug!(path = %path.display(), "Loaded fleet config");
        Ok(config)
    }

    /// The container name derived from an instance index.
    pub fn container_name(&self, index: u32) -> String {
        format!("{}-{}", self.container_prefix, index)
    }

    /// On-disk location of the env-file artifact for an instance index.
    pub fn env_file_path(&self, index: u32) -> PathBuf {
        self.state_dir.join(format!("{}-{}.env", self.container_prefix, index))
    }

    /// On-disk location of the fleet manifest.
    pub fn manifest_path(&self) -> PathBuf {
        self.state_dir.join("manifest.json")
    }

    /// The host port published for an instance index.
    pub fn host_port(&self, index: u32) -> u16 {
        self.base_port + (index as u16) - 1
    }
}

/// How instances whose proxy fails the reachability probe are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyPolicy {
    /// Do not probe; configure the proxy as given.
    #[default]
    Ignore,
    /// Probe and log the outcome, but configure the proxy either way.
    Warn,
    /// Probe and skip the instance when the proxy is unreachable.
    Require,
}

/// Whether a failing instance aborts the remainder of a launch batch.
///
/// Update and delete are always best-effort per instance; this knob only
/// affects launch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Abort the batch on the first per-instance failure. Instances already
    /// started stay up; they are tracked in the manifest for later cleanup.
    #[default]
    FailFast,
    /// Isolate failures per instance and keep going.
    Continue,
}

/// Where per-instance display names come from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum IdentitySource {
    /// Take `names[index - 1]` from the loaded names file.
    #[default]
    List,
    /// Fetch a fresh display name per instance from this endpoint.
    Remote {
        /// Endpoint answering with a name (bare text, a JSON string, or an
        /// object with a `name` field).
        url: Url,
    },
}
