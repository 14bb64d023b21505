use async_trait::async_trait;

use crate::common::{FleetError, OpReport};

/// The fleet-wide operations offered by the provisioner.
#[async_trait]
pub trait ProvisionerSpec {
    /// Provision `count` new instances: persist one env-file artifact and
    /// start one container per index in `1..=count`.
    ///
    /// Preconditions (runtime reachable, source files present and long
    /// enough) are checked before any side effect. The shared image is
    /// pulled exactly once for the whole batch.
    async fn launch(&self, count: u32) -> Result<OpReport, FleetError>;

    /// Refresh the shared image once, then stop, remove and relaunch every
    /// tracked instance with its already-persisted configuration. A missing
    /// container is logged and tolerated.
    async fn update_all(&self) -> Result<OpReport, FleetError>;

    /// Stop and remove every tracked instance and its configuration
    /// artifact, tolerating already-absent containers and files. An empty
    /// working set is a reported no-op.
    async fn delete_all(&self) -> Result<OpReport, FleetError>;

    /// Recent log output for one tracked instance, or all of them when
    /// `index` is `None`.
    async fn logs(&self, index: Option<u32>, tail: usize) -> Result<String, FleetError>;
}
