/*!

Models of the Cluster API (CAPI) objects that are generated for a cluster. These are not our CRDs,
we only model the fields that we generate or that we read back to decide whether a cluster is
ready.

!*/

mod cluster;
mod etcd;
pub mod infrastructure;
mod kubeadm;

pub use cluster::{
    Bootstrap, Cluster, ClusterNetwork, ClusterSpec, ClusterStatus, LabelSelector,
    MachineDeployment, MachineDeploymentSpec, MachineDeploymentStatus, MachineSpec,
    MachineTemplateSpec, NetworkRanges,
};
pub use etcd::{EtcdadmCluster, EtcdadmClusterSpec, EtcdadmClusterStatus, EtcdadmConfigSpec};
pub use kubeadm::{
    KubeadmConfigSpec, KubeadmConfigTemplate, KubeadmConfigTemplateResource,
    KubeadmConfigTemplateSpec, KubeadmControlPlane, KubeadmControlPlaneMachineTemplate,
    KubeadmControlPlaneSpec, KubeadmControlPlaneStatus,
};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A reference from one CAPI object to another. CAPI uses the core `ObjectReference` for these,
/// but only these fields are ever set.
#[derive(Clone, Debug, Default, Deserialize, Eq, Hash, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectReference {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl ObjectReference {
    pub fn new<S1, S2, S3>(api_version: S1, kind: S2, name: S3) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
            name: name.into(),
            namespace: None,
        }
    }

    pub fn within<S: Into<String>>(mut self, namespace: S) -> Self {
        self.namespace = Some(namespace.into());
        self
    }
}

/// The address of a cluster's API server.
#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEndpoint {
    pub host: String,
    pub port: i32,
}

/// The subset of object metadata that CAPI copies onto the objects it stamps out of a template.
#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMetaTemplate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,
}

/// A status condition in the CAPI format. `status` is one of `True`, `False` or `Unknown`.
#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub const CONDITION_TRUE: &str = "True";
pub const CONDITION_FALSE: &str = "False";

impl Condition {
    pub fn new_true<S: Into<String>>(condition_type: S) -> Self {
        Self {
            condition_type: condition_type.into(),
            status: CONDITION_TRUE.to_string(),
            ..Self::default()
        }
    }

    pub fn new_false<S1, S2>(condition_type: S1, reason: S2, message: Option<String>) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        Self {
            condition_type: condition_type.into(),
            status: CONDITION_FALSE.to_string(),
            severity: Some("Info".to_string()),
            reason: Some(reason.into()),
            message,
            ..Self::default()
        }
    }

    pub fn is_true(&self) -> bool {
        self.status == CONDITION_TRUE
    }
}

/// Is the condition `condition_type` present and `True`.
pub fn is_condition_true(conditions: &[Condition], condition_type: &str) -> bool {
    find_condition(conditions, condition_type)
        .map(Condition::is_true)
        .unwrap_or(false)
}

pub fn find_condition<'a>(
    conditions: &'a [Condition],
    condition_type: &str,
) -> Option<&'a Condition> {
    conditions
        .iter()
        .find(|condition| condition.condition_type == condition_type)
}

/// Adds or replaces the condition with the same type. The transition time only moves when the
/// status flips.
pub fn set_condition(conditions: &mut Vec<Condition>, mut condition: Condition) {
    match conditions
        .iter_mut()
        .find(|existing| existing.condition_type == condition.condition_type)
    {
        Some(existing) => {
            if existing.status == condition.status {
                condition.last_transition_time = existing.last_transition_time.take();
            } else {
                condition.last_transition_time = Some(now());
            }
            *existing = condition;
        }
        None => {
            condition.last_transition_time = Some(now());
            conditions.push(condition);
        }
    }
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn set_condition_keeps_transition_time_when_status_is_unchanged() {
        let mut conditions = Vec::new();
        set_condition(&mut conditions, Condition::new_true("Ready"));
        let first_time = conditions[0].last_transition_time.clone();
        assert!(first_time.is_some());

        conditions[0].last_transition_time = Some("2022-01-01T00:00:00Z".to_string());
        set_condition(&mut conditions, Condition::new_true("Ready"));
        assert_eq!(conditions.len(), 1);
        assert_eq!(
            conditions[0].last_transition_time.as_deref(),
            Some("2022-01-01T00:00:00Z")
        );

        set_condition(
            &mut conditions,
            Condition::new_false("Ready", "Waiting", None),
        );
        assert_eq!(conditions.len(), 1);
        assert!(!is_condition_true(&conditions, "Ready"));
        assert_ne!(
            conditions[0].last_transition_time.as_deref(),
            Some("2022-01-01T00:00:00Z")
        );
    }

    #[test]
    fn missing_condition_is_not_true() {
        assert!(!is_condition_true(&[], "ControlPlaneReady"));
    }
}
