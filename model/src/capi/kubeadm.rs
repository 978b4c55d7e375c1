use super::{Condition, ObjectMetaTemplate, ObjectReference};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The kubeadm-based control plane of a cluster.
#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    derive = "Default",
    derive = "PartialEq",
    group = "controlplane.cluster.x-k8s.io",
    kind = "KubeadmControlPlane",
    namespaced,
    plural = "kubeadmcontrolplanes",
    singular = "kubeadmcontrolplane",
    status = "KubeadmControlPlaneStatus",
    version = "v1beta1"
)]
#[serde(rename_all = "camelCase")]
pub struct KubeadmControlPlaneSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    pub version: String,
    pub machine_template: KubeadmControlPlaneMachineTemplate,
    pub kubeadm_config_spec: KubeadmConfigSpec,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KubeadmControlPlaneMachineTemplate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ObjectMetaTemplate>,
    pub infrastructure_ref: ObjectReference,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KubeadmControlPlaneStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ready_replicas: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_replicas: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unavailable_replicas: Option<i32>,
    #[serde(default)]
    pub initialized: bool,
    #[serde(default)]
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Vec<Condition>>,
}

impl KubeadmControlPlane {
    /// All desired replicas are ready and none are unavailable.
    pub fn replicas_ready(&self) -> bool {
        let status = match &self.status {
            None => return false,
            Some(status) => status,
        };
        let desired = self.spec.replicas.unwrap_or(1);
        status.unavailable_replicas.unwrap_or(0) == 0
            && status.ready_replicas.unwrap_or(0) == desired
    }
}

/// The bootstrap configuration passed to kubeadm. The kubeadm configuration documents are kept
/// as free-form JSON since we only generate them.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KubeadmConfigSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_configuration: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub init_configuration: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join_configuration: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_kubeadm_commands: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_kubeadm_commands: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub users: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

/// Bootstrap configuration for the machines of a `MachineDeployment`. Immutable once created.
#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    derive = "Default",
    derive = "PartialEq",
    group = "bootstrap.cluster.x-k8s.io",
    kind = "KubeadmConfigTemplate",
    namespaced,
    plural = "kubeadmconfigtemplates",
    singular = "kubeadmconfigtemplate",
    version = "v1beta1"
)]
#[serde(rename_all = "camelCase")]
pub struct KubeadmConfigTemplateSpec {
    pub template: KubeadmConfigTemplateResource,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KubeadmConfigTemplateResource {
    pub spec: KubeadmConfigSpec,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn replicas_ready() {
        let mut kcp = KubeadmControlPlane::new(
            "cp",
            KubeadmControlPlaneSpec {
                replicas: Some(3),
                ..KubeadmControlPlaneSpec::default()
            },
        );
        assert!(!kcp.replicas_ready());

        kcp.status = Some(KubeadmControlPlaneStatus {
            ready_replicas: Some(2),
            unavailable_replicas: Some(0),
            ..KubeadmControlPlaneStatus::default()
        });
        assert!(!kcp.replicas_ready());

        kcp.status = Some(KubeadmControlPlaneStatus {
            ready_replicas: Some(3),
            unavailable_replicas: Some(1),
            ..KubeadmControlPlaneStatus::default()
        });
        assert!(!kcp.replicas_ready());

        kcp.status = Some(KubeadmControlPlaneStatus {
            ready_replicas: Some(3),
            unavailable_replicas: Some(0),
            ..KubeadmControlPlaneStatus::default()
        });
        assert!(kcp.replicas_ready());
    }
}
