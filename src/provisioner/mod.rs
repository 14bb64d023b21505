use std::{fmt::Write as _, fs};

use async_trait::async_trait;
use tracing::{info, warn};

pub mod envfile;

mod manifest;
pub use manifest::{Manifest, ManifestEntry};

mod spec;
pub use spec::ProvisionerSpec;

use crate::{
    common::{FleetError, InstanceRecord, OpReport},
    config::{FailurePolicy, FleetConfig, IdentitySource, ProxyPolicy},
    identity::IdentityResolver,
    proxy::{ProxyDescriptor, ProxyProber},
    runtime::{ContainerRuntime, ContainerSpec, RuntimeError},
    sources::CredentialSources,
};

/// Drives the full lifecycle of a fleet of executor containers: launch from
/// flat credential files, fleet-wide update, fleet-wide delete, and log
/// retrieval.
///
/// Instances are processed strictly sequentially in index order; every
/// runtime call completes before the next one starts.
#[derive(Debug)]
pub struct Provisioner<R> {
    config: FleetConfig,
    runtime: R,
    identities: IdentityResolver,
    prober: ProxyProber,
}

impl<R: ContainerRuntime + Send + Sync> Provisioner<R> {
    /// Create a provisioner over the given runtime.
    pub fn new(config: FleetConfig, runtime: R) -> Self {
        let prober = ProxyProber::new(config.probe_url.clone());
        Self { config, runtime, identities: IdentityResolver::new(), prober }
    }

    /// The fleet configuration this provisioner operates with.
    pub fn config(&self) -> &FleetConfig {
        &self.config
    }

    /// The underlying container runtime.
    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    /// Tracked instances next to the live container list, one line each.
    pub async fn status(&self) -> Result<String, FleetError> {
        let manifest = self.working_set()?;
        let live = self.runtime.container_list(&self.config.container_prefix).await?;

        let mut out = String::new();
        if manifest.instances.is_empty() {
            out.push_str("no tracked instances\n");
        }
        for entry in &manifest.instances {
            let state = if live.contains(&entry.container) { "up" } else { "missing" };
            let _ = writeln!(
                out,
                "{:>3}  {:<24} {:<20} :{}  {}",
                entry.index, entry.container, entry.display_name, entry.host_port, state
            );
        }

        // containers matching the prefix that the manifest does not know about
        for name in &live {
            if !manifest.instances.iter().any(|entry| &entry.container == name) {
                let _ = writeln!(out, "  ?  {name:<24} (untracked)");
            }
        }

        Ok(out)
    }

    /// The working set of tracked instances: the persisted manifest when one
    /// exists, otherwise rediscovered from the generated env files.
    fn working_set(&self) -> Result<Manifest, FleetError> {
        match Manifest::load(&self.config.manifest_path())? {
            Some(manifest) => Ok(manifest),
            None => Manifest::discover(&self.config),
        }
    }

    /// Resolve the display name for one instance index.
    async fn resolve_identity(
        &self,
        sources: &CredentialSources,
        index: u32,
    ) -> Result<String, FleetError> {
        match &self.config.identity_source {
            IdentitySource::List => Ok(sources.names[index as usize - 1].clone()),
            IdentitySource::Remote { url } => Ok(self.identities.fetch(url).await?),
        }
    }

    /// Resolve and, depending on policy, gate the proxy for one instance
    /// index. `Err` on a malformed descriptor.
    async fn resolve_proxy(
        &self,
        sources: &CredentialSources,
        index: u32,
    ) -> Result<ProxyOutcome, FleetError> {
        let Some(raw) = sources.proxy_for(index) else {
            return Ok(ProxyOutcome::None);
        };

        let descriptor: ProxyDescriptor = raw.parse()?;

        match self.config.proxy_policy {
            ProxyPolicy::Ignore => Ok(ProxyOutcome::Use(descriptor)),
            ProxyPolicy::Warn => {
                if !self.prober.reachable(&descriptor).await? {
                    warn!(index, proxy = %descriptor.authority(), "Proxy unreachable, proceeding anyway");
                }
                Ok(ProxyOutcome::Use(descriptor))
            }
            ProxyPolicy::Require => {
                if self.prober.reachable(&descriptor).await? {
                    Ok(ProxyOutcome::Use(descriptor))
                } else {
                    warn!(index, proxy = %descriptor.authority(), "Proxy unreachable, skipping instance");
                    Ok(ProxyOutcome::Skip)
                }
            }
        }
    }

    /// Provision a single instance: resolve identity and proxy, persist the
    /// env file, start the container. `Ok(None)` when the instance was
    /// skipped by proxy gating.
    async fn launch_one(
        &self,
        sources: &CredentialSources,
        index: u32,
    ) -> Result<Option<ManifestEntry>, FleetError> {
        let display_name = self.resolve_identity(sources, index).await?;
        let proxy = match self.resolve_proxy(sources, index).await? {
            ProxyOutcome::Use(descriptor) => Some(descriptor),
            ProxyOutcome::None => None,
            ProxyOutcome::Skip => return Ok(None),
        };

        let record = InstanceRecord {
            index,
            display_name: display_name.clone(),
            beneficiary: sources.beneficiaries[index as usize - 1].clone(),
            signing_key: sources.keys[index as usize - 1].clone(),
            proxy,
            environment: self.config.environment,
        };

        let env_file = self.config.env_file_path(index);
        envfile::write(&env_file, &record)?;

        let container = self.config.container_name(index);
        let host_port = self.config.host_port(index);
        info!(index, container = %container, port = host_port, "Starting instance");

        self.runtime
            .container_run(ContainerSpec {
                name: container.clone(),
                image: self.config.image.clone(),
                env_file: env_file.clone(),
                published_port: Some((host_port, self.config.container_port)),
                network: Some(self.config.network.clone()),
                restart_policy: Some(self.config.restart_policy.clone()),
                env_vars: self.config.extra_env.clone(),
            })
            .await?;

        Ok(Some(ManifestEntry { index, container, display_name, env_file, host_port }))
    }

    /// Stop and remove one container, tolerating its absence at either step.
    async fn stop_and_remove(&self, container: &str) -> Result<(), FleetError> {
        match self.runtime.container_stop(container).await {
            Ok(()) => {}
            Err(RuntimeError::NotFound(_)) => {
                warn!(container, "No container to stop, continuing");
            }
            Err(err) => return Err(err.into()),
        }

        match self.runtime.container_remove(container).await {
            Ok(()) => {}
            Err(RuntimeError::NotFound(_)) => {
                warn!(container, "No container to remove, continuing");
            }
            Err(err) => return Err(err.into()),
        }

        Ok(())
    }

    /// Stop, remove and relaunch one tracked instance with its persisted
    /// configuration.
    async fn replace_one(
        &self,
        manifest: &Manifest,
        entry: &ManifestEntry,
    ) -> Result<(), FleetError> {
        self.stop_and_remove(&entry.container).await?;

        info!(index = entry.index, container = %entry.container, "Relaunching instance");
        self.runtime
            .container_run(ContainerSpec {
                name: entry.container.clone(),
                image: manifest.image.clone(),
                env_file: entry.env_file.clone(),
                published_port: Some((entry.host_port, self.config.container_port)),
                network: Some(manifest.network.clone()),
                restart_policy: Some(self.config.restart_policy.clone()),
                env_vars: self.config.extra_env.clone(),
            })
            .await?;

        Ok(())
    }

    /// Tear down one tracked instance and its configuration artifact.
    async fn delete_one(&self, entry: &ManifestEntry) -> Result<(), FleetError> {
        self.stop_and_remove(&entry.container).await?;

        match fs::remove_file(&entry.env_file) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %entry.env_file.display(), "No env file to remove, continuing");
            }
            Err(err) => return Err(err.into()),
        }

        Ok(())
    }
}

#[async_trait]
impl<R: ContainerRuntime + Send + Sync> ProvisionerSpec for Provisioner<R> {
    async fn launch(&self, count: u32) -> Result<OpReport, FleetError> {
        self.runtime.ping().await?;

        let sources = CredentialSources::load(&self.config)?;
        let names_required = matches!(self.config.identity_source, IdentitySource::List);
        sources.ensure_counts(count as usize, names_required)?;

        fs::create_dir_all(&self.config.state_dir)?;

        info!(image = %self.config.image, "Pulling shared image");
        self.runtime.image_pull(&self.config.image).await?;

        if !self.runtime.network_exists(&self.config.network).await? {
            info!(network = %self.config.network, "Creating fleet network");
            self.runtime.network_create(&self.config.network).await?;
        }

        let mut manifest = Manifest::new(&self.config);
        let mut report = OpReport::default();

        for index in 1..=count {
            match self.launch_one(&sources, index).await {
                Ok(Some(entry)) => {
                    manifest.instances.push(entry);
                    report.succeeded += 1;
                }
                Ok(None) => report.skipped += 1,
                Err(err) => {
                    report.failed += 1;
                    if self.config.failure_policy == FailurePolicy::FailFast {
                        // Track what already started so delete can clean up.
                        manifest.save(&self.config.manifest_path())?;
                        return Err(err);
                    }
                    warn!(index, error = %err, "Instance failed, continuing with next index");
                }
            }
        }

        manifest.save(&self.config.manifest_path())?;
        info!(%report, "Launch finished");

        Ok(report)
    }

    async fn update_all(&self) -> Result<OpReport, FleetError> {
        self.runtime.ping().await?;

        let manifest = self.working_set()?;
        if manifest.instances.is_empty() {
            info!("Nothing to update");
            return Ok(OpReport::default());
        }

        info!(image = %manifest.image, "Refreshing shared image");
        self.runtime.image_pull(&manifest.image).await?;

        let mut report = OpReport::default();
        for entry in &manifest.instances {
            match self.replace_one(&manifest, entry).await {
                Ok(()) => report.succeeded += 1,
                Err(err) => {
                    report.failed += 1;
                    warn!(index = entry.index, error = %err, "Update failed, continuing with next index");
                }
            }
        }

        info!(%report, "Update finished");
        Ok(report)
    }

    async fn delete_all(&self) -> Result<OpReport, FleetError> {
        let manifest = self.working_set()?;
        if manifest.instances.is_empty() {
            info!("Nothing to delete");
            return Ok(OpReport::default());
        }

        self.runtime.ping().await?;

        let mut report = OpReport::default();
        for entry in &manifest.instances {
            match self.delete_one(entry).await {
                Ok(()) => report.succeeded += 1,
                Err(err) => {
                    report.failed += 1;
                    warn!(index = entry.index, error = %err, "Delete failed, continuing with next index");
                }
            }
        }

        Manifest::remove(&self.config.manifest_path())?;

        if self.config.remove_image && report.failed == 0 {
            match self.runtime.image_remove(&manifest.image).await {
                Ok(()) => info!(image = %manifest.image, "Removed shared image"),
                Err(RuntimeError::NotFound(_)) => {}
                Err(err) => warn!(error = %err, "Could not remove shared image"),
            }
        }

        info!(%report, "Delete finished");
        Ok(report)
    }

    async fn logs(&self, index: Option<u32>, tail: usize) -> Result<String, FleetError> {
        let manifest = self.working_set()?;

        let selected: Vec<&ManifestEntry> = match index {
            Some(wanted) => {
                let entry = manifest
                    .instances
                    .iter()
                    .find(|entry| entry.index == wanted)
                    .ok_or(FleetError::UnknownInstance(wanted))?;
                vec![entry]
            }
            None => manifest.instances.iter().collect(),
        };

        let mut out = String::new();
        for entry in selected {
            match self.runtime.container_logs(&entry.container, tail).await {
                Ok(text) => {
                    let _ = writeln!(out, "=== {} ===", entry.container);
                    out.push_str(&text);
                }
                Err(RuntimeError::NotFound(_)) => {
                    warn!(container = %entry.container, "No container to read logs from");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Ok(out)
    }
}

/// Outcome of proxy resolution for one instance.
enum ProxyOutcome {
    /// No proxies configured for the fleet.
    None,
    /// Configure this proxy for the instance.
    Use(ProxyDescriptor),
    /// Proxy unreachable under the `require` policy; do not provision.
    Skip,
}
