/*!

This library provides the Kubernetes custom resource definitions of a cluster and its providers,
models of the Cluster API objects generated for it, and the machinery that turns one into the
other: the YAML object parser, the CAPI aggregates and the naming of immutable objects.

!*/

#![deny(
    clippy::expect_used,
    clippy::get_unwrap,
    clippy::panic,
    clippy::panic_in_result_fn,
    clippy::panicking_unwrap,
    clippy::unwrap_in_result,
    clippy::unwrap_used
)]

pub use cluster::{
    CidrBlocks, Cluster, ClusterNetwork, ClusterSpec, ClusterStatus, ControlPlaneConfiguration,
    Endpoint, ExternalEtcdConfiguration, ManagementCluster, Ref, Taint,
    WorkerNodeGroupConfiguration,
};
pub use crd_ext::CrdExt;
pub use error::{Error, Result};
pub use provider_config::{
    CloudStackAvailabilityZone, CloudStackDatacenterConfig, CloudStackDatacenterConfigSpec,
    CloudStackMachineConfig, CloudStackMachineConfigSpec, DockerDatacenterConfig,
    DockerDatacenterConfigSpec, VSphereDatacenterConfig, VSphereDatacenterConfigSpec,
    VSphereMachineConfig, VSphereMachineConfigSpec,
};

pub mod capi;
pub mod clients;
mod cluster;
pub mod clusterapi;
pub mod constants;
mod crd_ext;
mod error;
mod provider_config;
pub mod providers;
pub mod yaml;
