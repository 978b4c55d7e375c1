use crate::capi::{self, Condition};
use crate::constants::ANNOTATION_PAUSED;
use crate::CrdExt;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The desired state of a Kubernetes cluster. The `CustomResource` derive also produces a struct
/// named `Cluster` which represents a cluster CRD object in the k8s API. The controller turns it
/// into CAPI objects and drives those until the cluster is ready.
#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    derive = "Default",
    derive = "PartialEq",
    group = "anywhere.eks.amazonaws.com",
    kind = "Cluster",
    namespaced,
    plural = "clusters",
    singular = "cluster",
    status = "ClusterStatus",
    version = "v1alpha1",
    printcolumn = r#"{"name":"KubernetesVersion", "type":"string", "jsonPath":".spec.kubernetesVersion"}"#,
    printcolumn = r#"{"name":"Datacenter", "type":"string", "jsonPath":".spec.datacenterRef.kind"}"#,
    printcolumn = r#"{"name":"FailureMessage", "type":"string", "jsonPath":".status.failureMessage"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    /// The Kubernetes minor version, e.g. `1.24`.
    pub kubernetes_version: String,
    pub control_plane_configuration: ControlPlaneConfiguration,
    #[serde(default)]
    pub worker_node_group_configurations: Vec<WorkerNodeGroupConfiguration>,
    /// Points at the provider datacenter config, its kind selects the provider.
    pub datacenter_ref: Ref,
    #[serde(default)]
    pub cluster_network: ClusterNetwork,
    /// When present, etcd runs on its own machines instead of stacked on the control plane.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_etcd_configuration: Option<ExternalEtcdConfiguration>,
    /// The cluster that manages this one. Empty or missing means the cluster manages itself.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub management_cluster: Option<ManagementCluster>,
}

/// A reference to another object in the same namespace.
#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ref {
    pub kind: String,
    pub name: String,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlPlaneConfiguration {
    pub count: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<Endpoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub machine_group_ref: Option<Ref>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taints: Option<Vec<Taint>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub host: String,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerNodeGroupConfiguration {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub machine_group_ref: Option<Ref>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taints: Option<Vec<Taint>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Taint {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub effect: String,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterNetwork {
    #[serde(default)]
    pub pods: CidrBlocks,
    #[serde(default)]
    pub services: CidrBlocks,
    /// The CNI plugin installed on the workload cluster.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cni: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CidrBlocks {
    #[serde(default)]
    pub cidr_blocks: Vec<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalEtcdConfiguration {
    pub count: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub machine_group_ref: Option<Ref>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagementCluster {
    #[serde(default)]
    pub name: String,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStatus {
    /// Set when the last reconciliation failed, cleared once the cluster settles.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

impl Cluster {
    /// A cluster is self-managed when no management cluster is named, or when it names itself.
    pub fn is_self_managed(&self) -> bool {
        match &self.spec.management_cluster {
            None => true,
            Some(management) => {
                management.name.is_empty() || management.name == self.object_name()
            }
        }
    }

    /// Reconciliation is paused with the `paused` annotation set to `true`.
    pub fn is_reconcile_paused(&self) -> bool {
        self.annotation(ANNOTATION_PAUSED) == Some("true")
    }

    pub fn has_external_etcd(&self) -> bool {
        self.spec.external_etcd_configuration.is_some()
    }

    /// The machine config referenced by the control plane, the external etcd and every worker
    /// node group, without duplicates.
    pub fn machine_config_refs(&self) -> Vec<&Ref> {
        let mut refs: Vec<&Ref> = Vec::new();
        let candidates = self
            .spec
            .control_plane_configuration
            .machine_group_ref
            .iter()
            .chain(
                self.spec
                    .external_etcd_configuration
                    .iter()
                    .flat_map(|etcd| etcd.machine_group_ref.iter()),
            )
            .chain(
                self.spec
                    .worker_node_group_configurations
                    .iter()
                    .flat_map(|group| group.machine_group_ref.iter()),
            );
        for candidate in candidates {
            if !refs.contains(&candidate) {
                refs.push(candidate);
            }
        }
        refs
    }

    pub fn conditions(&self) -> &[Condition] {
        self.status
            .as_ref()
            .map(|s| s.conditions.as_slice())
            .unwrap_or(&[])
    }

    pub fn set_condition(&mut self, condition: Condition) {
        let status = self.status.get_or_insert_with(ClusterStatus::default);
        capi::set_condition(&mut status.conditions, condition);
    }

    pub fn failure_message(&self) -> Option<&str> {
        self.status
            .as_ref()
            .and_then(|s| s.failure_message.as_deref())
    }

    pub fn set_failure_message(&mut self, message: Option<String>) {
        let status = self.status.get_or_insert_with(ClusterStatus::default);
        status.failure_reason = message.as_ref().map(|_| "ReconcileError".to_string());
        status.failure_message = message;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use maplit::btreemap;

    fn cluster() -> Cluster {
        let mut cluster = Cluster::new(
            "my-cluster",
            ClusterSpec {
                kubernetes_version: "1.24".to_string(),
                control_plane_configuration: ControlPlaneConfiguration {
                    count: 1,
                    machine_group_ref: Some(Ref {
                        kind: "VSphereMachineConfig".to_string(),
                        name: "cp".to_string(),
                    }),
                    ..ControlPlaneConfiguration::default()
                },
                worker_node_group_configurations: vec![
                    WorkerNodeGroupConfiguration {
                        name: "md-0".to_string(),
                        machine_group_ref: Some(Ref {
                            kind: "VSphereMachineConfig".to_string(),
                            name: "workers".to_string(),
                        }),
                        ..WorkerNodeGroupConfiguration::default()
                    },
                    WorkerNodeGroupConfiguration {
                        name: "md-1".to_string(),
                        machine_group_ref: Some(Ref {
                            kind: "VSphereMachineConfig".to_string(),
                            name: "workers".to_string(),
                        }),
                        ..WorkerNodeGroupConfiguration::default()
                    },
                ],
                ..ClusterSpec::default()
            },
        );
        cluster.metadata.namespace = Some("default".to_string());
        cluster
    }

    #[test]
    fn self_managed() {
        let mut c = cluster();
        assert!(c.is_self_managed());

        c.spec.management_cluster = Some(ManagementCluster {
            name: "my-cluster".to_string(),
        });
        assert!(c.is_self_managed());

        c.spec.management_cluster = Some(ManagementCluster {
            name: "mgmt".to_string(),
        });
        assert!(!c.is_self_managed());
    }

    #[test]
    fn paused() {
        let mut c = cluster();
        assert!(!c.is_reconcile_paused());
        c.metadata.annotations = Some(btreemap! {
            ANNOTATION_PAUSED.to_string() => "false".to_string()
        });
        assert!(!c.is_reconcile_paused());
        c.metadata.annotations = Some(btreemap! {
            ANNOTATION_PAUSED.to_string() => "true".to_string()
        });
        assert!(c.is_reconcile_paused());
    }

    #[test]
    fn machine_config_refs_are_unique() {
        let c = cluster();
        let names: Vec<&str> = c
            .machine_config_refs()
            .into_iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(names, vec!["cp", "workers"]);
    }

    #[test]
    fn failure_message() {
        let mut c = cluster();
        assert!(c.failure_message().is_none());
        c.set_failure_message(Some("boom".to_string()));
        assert_eq!(c.failure_message(), Some("boom"));
        c.set_failure_message(None);
        assert!(c.failure_message().is_none());
        assert!(c.status.as_ref().unwrap().failure_reason.is_none());
    }
}
