use super::{Condition, ObjectReference};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// An etcd cluster running on machines separate from the control plane.
#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    derive = "Default",
    derive = "PartialEq",
    group = "etcdcluster.cluster.x-k8s.io",
    kind = "EtcdadmCluster",
    namespaced,
    plural = "etcdadmclusters",
    singular = "etcdadmcluster",
    status = "EtcdadmClusterStatus",
    version = "v1beta1"
)]
#[serde(rename_all = "camelCase")]
pub struct EtcdadmClusterSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    pub etcdadm_config_spec: EtcdadmConfigSpec,
    pub infrastructure_template: ObjectReference,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EtcdadmConfigSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etcdadm_builtin: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cipher_suites: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EtcdadmClusterStatus {
    #[serde(default)]
    pub ready: bool,
    #[serde(default)]
    pub initialized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Vec<Condition>>,
}
