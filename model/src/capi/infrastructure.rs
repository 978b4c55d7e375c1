//! Provider infrastructure kinds. Each provider has a `*Cluster` that is referenced by the CAPI
//! `Cluster` and a `*MachineTemplate` that is referenced by control plane, etcd and worker
//! machines. Machine templates are immutable once created.

use super::ApiEndpoint;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// Docker

#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    derive = "Default",
    derive = "PartialEq",
    group = "infrastructure.cluster.x-k8s.io",
    kind = "DockerCluster",
    namespaced,
    plural = "dockerclusters",
    singular = "dockercluster",
    version = "v1beta1"
)]
#[serde(rename_all = "camelCase")]
pub struct DockerClusterSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub control_plane_endpoint: Option<ApiEndpoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_balancer: Option<DockerLoadBalancer>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerLoadBalancer {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_repository: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_tag: Option<String>,
}

#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    derive = "Default",
    derive = "PartialEq",
    group = "infrastructure.cluster.x-k8s.io",
    kind = "DockerMachineTemplate",
    namespaced,
    plural = "dockermachinetemplates",
    singular = "dockermachinetemplate",
    version = "v1beta1"
)]
#[serde(rename_all = "camelCase")]
pub struct DockerMachineTemplateSpec {
    pub template: DockerMachineTemplateResource,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerMachineTemplateResource {
    pub spec: DockerMachineSpec,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerMachineSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_mounts: Option<Vec<DockerMount>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bootstrapped: Option<bool>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerMount {
    pub container_path: String,
    pub host_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,
}

// vSphere

#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    derive = "Default",
    derive = "PartialEq",
    group = "infrastructure.cluster.x-k8s.io",
    kind = "VSphereCluster",
    namespaced,
    plural = "vsphereclusters",
    singular = "vspherecluster",
    version = "v1beta1"
)]
#[serde(rename_all = "camelCase")]
pub struct VSphereClusterSpec {
    pub server: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbprint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub control_plane_endpoint: Option<ApiEndpoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_ref: Option<VSphereIdentityReference>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VSphereIdentityReference {
    pub kind: String,
    pub name: String,
}

#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    derive = "Default",
    derive = "PartialEq",
    group = "infrastructure.cluster.x-k8s.io",
    kind = "VSphereMachineTemplate",
    namespaced,
    plural = "vspheremachinetemplates",
    singular = "vspheremachinetemplate",
    version = "v1beta1"
)]
#[serde(rename_all = "camelCase")]
pub struct VSphereMachineTemplateSpec {
    pub template: VSphereMachineTemplateResource,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VSphereMachineTemplateResource {
    pub spec: VSphereMachineSpec,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VSphereMachineSpec {
    pub datacenter: String,
    pub datastore: String,
    pub folder: String,
    pub resource_pool: String,
    pub server: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbprint: Option<String>,
    pub template: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clone_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_policy_name: Option<String>,
    pub network: VSphereNetworkSpec,
    #[serde(rename = "numCPUs")]
    pub num_cpus: i32,
    #[serde(rename = "memoryMiB")]
    pub memory_mib: i64,
    #[serde(rename = "diskGiB")]
    pub disk_gib: i32,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VSphereNetworkSpec {
    pub devices: Vec<VSphereNetworkDevice>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VSphereNetworkDevice {
    pub network_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dhcp4: Option<bool>,
}

// CloudStack

#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    derive = "Default",
    derive = "PartialEq",
    group = "infrastructure.cluster.x-k8s.io",
    kind = "CloudStackCluster",
    namespaced,
    plural = "cloudstackclusters",
    singular = "cloudstackcluster",
    version = "v1beta2"
)]
#[serde(rename_all = "camelCase")]
pub struct CloudStackClusterSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub control_plane_endpoint: Option<ApiEndpoint>,
    pub failure_domains: Vec<CloudStackFailureDomainSpec>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudStackFailureDomainSpec {
    pub name: String,
    pub zone: CloudStackZoneSpec,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    pub acs_endpoint: SecretReference,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudStackZoneSpec {
    pub name: String,
    pub network: CloudStackResourceIdentifier,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretReference {
    pub name: String,
    pub namespace: String,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudStackResourceIdentifier {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl CloudStackResourceIdentifier {
    pub fn named<S: Into<String>>(name: S) -> Self {
        Self {
            id: None,
            name: Some(name.into()),
        }
    }
}

#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    derive = "Default",
    derive = "PartialEq",
    group = "infrastructure.cluster.x-k8s.io",
    kind = "CloudStackMachineTemplate",
    namespaced,
    plural = "cloudstackmachinetemplates",
    singular = "cloudstackmachinetemplate",
    version = "v1beta2"
)]
#[serde(rename_all = "camelCase")]
pub struct CloudStackMachineTemplateSpec {
    pub template: CloudStackMachineTemplateResource,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudStackMachineTemplateResource {
    pub spec: CloudStackMachineSpec,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudStackMachineSpec {
    pub offering: CloudStackResourceIdentifier,
    pub template: CloudStackResourceIdentifier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_offering: Option<CloudStackResourceDiskOffering>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affinity_group_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<BTreeMap<String, String>>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudStackResourceDiskOffering {
    #[serde(flatten)]
    pub offering: CloudStackResourceIdentifier,
    pub mount_path: String,
    pub device: String,
    pub filesystem: String,
    pub label: String,
}
