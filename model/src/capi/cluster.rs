use super::{ApiEndpoint, Condition, ObjectMetaTemplate, ObjectReference};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The CAPI `Cluster`. The `CustomResource` derive produces a struct named `Cluster` which
/// represents the object in the k8s API.
#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    derive = "Default",
    derive = "PartialEq",
    group = "cluster.x-k8s.io",
    kind = "Cluster",
    namespaced,
    plural = "clusters",
    singular = "cluster",
    status = "ClusterStatus",
    version = "v1beta1"
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paused: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_network: Option<ClusterNetwork>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub control_plane_endpoint: Option<ApiEndpoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub control_plane_ref: Option<ObjectReference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub infrastructure_ref: Option<ObjectReference>,
    /// Points at the `EtcdadmCluster` when etcd runs on its own machines.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub managed_external_etcd_ref: Option<ObjectReference>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterNetwork {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pods: Option<NetworkRanges>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub services: Option<NetworkRanges>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkRanges {
    pub cidr_blocks: Vec<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(default)]
    pub infrastructure_ready: bool,
    #[serde(default)]
    pub control_plane_ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Vec<Condition>>,
}

impl Cluster {
    pub fn conditions(&self) -> &[Condition] {
        self.status
            .as_ref()
            .and_then(|s| s.conditions.as_deref())
            .unwrap_or(&[])
    }
}

/// The CAPI `MachineDeployment`, one per worker node group.
#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    derive = "Default",
    derive = "PartialEq",
    group = "cluster.x-k8s.io",
    kind = "MachineDeployment",
    namespaced,
    plural = "machinedeployments",
    singular = "machinedeployment",
    status = "MachineDeploymentStatus",
    version = "v1beta1"
)]
#[serde(rename_all = "camelCase")]
pub struct MachineDeploymentSpec {
    pub cluster_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<LabelSelector>,
    pub template: MachineTemplateSpec,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_labels: Option<BTreeMap<String, String>>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineTemplateSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ObjectMetaTemplate>,
    pub spec: MachineSpec,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineSpec {
    pub cluster_name: String,
    pub bootstrap: Bootstrap,
    pub infrastructure_ref: ObjectReference,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bootstrap {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_ref: Option<ObjectReference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_secret_name: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineDeploymentStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ready_replicas: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_replicas: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unavailable_replicas: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Vec<Condition>>,
}

impl MachineDeployment {
    /// A machine deployment is ready when it is running and every desired replica is ready and
    /// available.
    pub fn is_ready(&self) -> bool {
        let status = match &self.status {
            None => return false,
            Some(status) => status,
        };
        let desired = self.spec.replicas.unwrap_or(1);
        status.phase.as_deref() == Some(crate::constants::MACHINE_DEPLOYMENT_PHASE_RUNNING)
            && status.unavailable_replicas.unwrap_or(0) == 0
            && status.ready_replicas.unwrap_or(0) == desired
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn machine_deployment(replicas: i32, status: MachineDeploymentStatus) -> MachineDeployment {
        let mut md = MachineDeployment::new(
            "md",
            MachineDeploymentSpec {
                replicas: Some(replicas),
                ..MachineDeploymentSpec::default()
            },
        );
        md.status = Some(status);
        md
    }

    #[test]
    fn machine_deployment_readiness() {
        let ready = machine_deployment(
            3,
            MachineDeploymentStatus {
                phase: Some("Running".to_string()),
                ready_replicas: Some(3),
                unavailable_replicas: Some(0),
                ..MachineDeploymentStatus::default()
            },
        );
        assert!(ready.is_ready());

        let scaling = machine_deployment(
            3,
            MachineDeploymentStatus {
                phase: Some("ScalingUp".to_string()),
                ready_replicas: Some(3),
                ..MachineDeploymentStatus::default()
            },
        );
        assert!(!scaling.is_ready());

        let unavailable = machine_deployment(
            3,
            MachineDeploymentStatus {
                phase: Some("Running".to_string()),
                ready_replicas: Some(3),
                unavailable_replicas: Some(1),
                ..MachineDeploymentStatus::default()
            },
        );
        assert!(!unavailable.is_ready());

        let mut no_status = ready.clone();
        no_status.status = None;
        assert!(!no_status.is_ready());
    }
}
