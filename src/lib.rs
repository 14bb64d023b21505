#![doc = include_str!("../README.md")]
#![warn(missing_debug_implementations, missing_docs, rustdoc::all)]
#![deny(unused_must_use, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

mod common;
pub use common::{
    EnvironmentMode, FleetError, IdentityError, InstanceRecord, OpReport, ProxyError, SourceError,
};

mod config;
pub use config::{FailurePolicy, FleetConfig, IdentitySource, ProxyPolicy};

mod sources;
pub use sources::CredentialSources;

mod proxy;
pub use proxy::{ProxyDescriptor, ProxyProber};

mod identity;
pub use identity::IdentityResolver;

mod runtime;
pub use runtime::{ContainerRuntime, ContainerSpec, DockerRuntime, InMemoryRuntime, RuntimeError};

mod provisioner;
pub use provisioner::{envfile, Manifest, ManifestEntry, Provisioner, ProvisionerSpec};
