use std::{fmt, path::PathBuf, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{proxy::ProxyDescriptor, runtime::RuntimeError};

/// A single provisioned unit: one container together with its persisted
/// configuration artifact and credential set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceRecord {
    /// The instance incremental index, contiguous from 1 within a batch.
    pub index: u32,
    /// Display name advertised by the executor.
    pub display_name: String,
    /// Beneficiary address credited by the executor. Treated as opaque.
    pub beneficiary: String,
    /// Private key the executor signs with. Treated as opaque.
    pub signing_key: String,
    /// Outbound proxy assigned to this instance, if any.
    pub proxy: Option<ProxyDescriptor>,
    /// Deployment environment the instance runs against.
    pub environment: EnvironmentMode,
}

/// The deployment environment a fleet runs against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentMode {
    /// Live deployment.
    #[default]
    Production,
    /// Test deployment.
    Testnet,
}

impl EnvironmentMode {
    /// The value written into the `ENV` field of the instance env file.
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvironmentMode::Production => "production",
            EnvironmentMode::Testnet => "testnet",
        }
    }
}

impl fmt::Display for EnvironmentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnvironmentMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "production" => Ok(EnvironmentMode::Production),
            "testnet" => Ok(EnvironmentMode::Testnet),
            other => Err(format!("unknown environment: {other}")),
        }
    }
}

/// Per-run outcome counts for a fleet-wide operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpReport {
    /// Instances fully processed.
    pub succeeded: usize,
    /// Instances that hit an error.
    pub failed: usize,
    /// Instances deliberately left out, e.g. because their proxy was
    /// unreachable under the `require` policy.
    pub skipped: usize,
}

impl OpReport {
    /// Total number of instances this run looked at.
    pub fn total(&self) -> usize {
        self.succeeded + self.failed + self.skipped
    }
}

impl fmt::Display for OpReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} succeeded, {} failed, {} skipped", self.succeeded, self.failed, self.skipped)
    }
}

/// An error that can occur while loading credential source files.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum SourceError {
    #[error("Missing source file: {}", .0.display())]
    MissingSource(PathBuf),
    #[error("Source {src} has {have} entries, but {need} were requested")]
    InsufficientEntries { src: String, have: usize, need: usize },
    #[error("Failed to read {}: {err}", path.display())]
    Io { path: PathBuf, err: std::io::Error },
}

/// An error that can occur while handling proxy descriptors.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum ProxyError {
    #[error("Malformed proxy descriptor: {0:?} (expected user:pass@host:port)")]
    Malformed(String),
    #[error("Failed to build proxied client: {0}")]
    Client(#[from] reqwest::Error),
}

/// An error that can occur while fetching a display name from the remote
/// identity endpoint.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum IdentityError {
    #[error("Identity request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Identity endpoint answered with status {0}")]
    BadStatus(u16),
    #[error("Identity endpoint returned an empty name")]
    EmptyName,
}

/// An error that can occur during a fleet-wide operation.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum FleetError {
    #[error("Source error: {0}")]
    Source(#[from] SourceError),
    #[error("Proxy error: {0}")]
    Proxy(#[from] ProxyError),
    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),
    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),
    #[error("Malformed manifest: {0}")]
    Manifest(#[from] serde_json::Error),
    #[error("No tracked instance with index {0}")]
    UnknownInstance(u32),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FleetError {
    /// Whether this error is a failed precondition (missing privilege,
    /// missing source file, under-populated list) that should terminate the
    /// process rather than return control to the menu.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            FleetError::Source(_) | FleetError::Runtime(RuntimeError::PermissionDenied(_))
        )
    }
}
