//! Provider specific inputs of a [`Cluster`](crate::Cluster). A cluster points at one datacenter
//! config, whose kind selects the provider, and at machine configs for each group of machines.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    derive = "Default",
    derive = "PartialEq",
    group = "anywhere.eks.amazonaws.com",
    kind = "DockerDatacenterConfig",
    namespaced,
    plural = "dockerdatacenterconfigs",
    singular = "dockerdatacenterconfig",
    version = "v1alpha1"
)]
#[serde(rename_all = "camelCase")]
pub struct DockerDatacenterConfigSpec {
    /// Overrides the repository of the kind node image, e.g. for air-gapped environments.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_image_repository: Option<String>,
}

#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    derive = "Default",
    derive = "PartialEq",
    group = "anywhere.eks.amazonaws.com",
    kind = "VSphereDatacenterConfig",
    namespaced,
    plural = "vspheredatacenterconfigs",
    singular = "vspheredatacenterconfig",
    version = "v1alpha1"
)]
#[serde(rename_all = "camelCase")]
pub struct VSphereDatacenterConfigSpec {
    pub datacenter: String,
    pub network: String,
    pub server: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbprint: Option<String>,
    #[serde(default)]
    pub insecure: bool,
}

#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    derive = "Default",
    derive = "PartialEq",
    group = "anywhere.eks.amazonaws.com",
    kind = "VSphereMachineConfig",
    namespaced,
    plural = "vspheremachineconfigs",
    singular = "vspheremachineconfig",
    version = "v1alpha1"
)]
#[serde(rename_all = "camelCase")]
pub struct VSphereMachineConfigSpec {
    pub datastore: String,
    pub folder: String,
    pub resource_pool: String,
    pub template: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clone_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_policy_name: Option<String>,
    #[serde(rename = "numCPUs")]
    pub num_cpus: i32,
    #[serde(rename = "memoryMiB")]
    pub memory_mib: i64,
    #[serde(rename = "diskGiB")]
    pub disk_gib: i32,
}

#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    derive = "Default",
    derive = "PartialEq",
    group = "anywhere.eks.amazonaws.com",
    kind = "CloudStackDatacenterConfig",
    namespaced,
    plural = "cloudstackdatacenterconfigs",
    singular = "cloudstackdatacenterconfig",
    version = "v1alpha1"
)]
#[serde(rename_all = "camelCase")]
pub struct CloudStackDatacenterConfigSpec {
    pub availability_zones: Vec<CloudStackAvailabilityZone>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudStackAvailabilityZone {
    pub name: String,
    pub zone_name: String,
    pub network_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    /// Name of the secret holding the CloudStack API credentials for this zone.
    pub credentials_ref: String,
}

#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    derive = "Default",
    derive = "PartialEq",
    group = "anywhere.eks.amazonaws.com",
    kind = "CloudStackMachineConfig",
    namespaced,
    plural = "cloudstackmachineconfigs",
    singular = "cloudstackmachineconfig",
    version = "v1alpha1"
)]
#[serde(rename_all = "camelCase")]
pub struct CloudStackMachineConfigSpec {
    pub compute_offering: String,
    pub template: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affinity_group_ids: Option<Vec<String>>,
}
