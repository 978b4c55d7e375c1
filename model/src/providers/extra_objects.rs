use super::{error, Result};
use crate::yaml::parse_unstructured;
use crate::Cluster;
use kube::api::DynamicObject;
use snafu::ResultExt;

/// CoreDNS 1.8.4 and later watch endpointslices, the RBAC shipped by kubeadm for older
/// Kubernetes versions does not allow it.
const COREDNS_RBAC: &str = r#"
apiVersion: rbac.authorization.k8s.io/v1
kind: ClusterRole
metadata:
  name: system:coredns
rules:
  - apiGroups: [""]
    resources: ["endpoints", "services", "pods", "namespaces"]
    verbs: ["list", "watch"]
  - apiGroups: ["discovery.k8s.io"]
    resources: ["endpointslices"]
    verbs: ["list", "watch"]
---
apiVersion: rbac.authorization.k8s.io/v1
kind: ClusterRoleBinding
metadata:
  name: system:coredns
roleRef:
  apiGroup: rbac.authorization.k8s.io
  kind: ClusterRole
  name: system:coredns
subjects:
  - kind: ServiceAccount
    name: coredns
    namespace: kube-system
"#;

/// The first minor version of Kubernetes shipping a CoreDNS that needs the extra RBAC.
const COREDNS_RBAC_MINOR_VERSION: u32 = 22;

/// Objects applied to the workload cluster once its workers are up. They are not tied to the
/// lifecycle of the control plane or the workers.
pub fn extra_objects(cluster: &Cluster) -> Result<Vec<DynamicObject>> {
    if !needs_coredns_rbac(&cluster.spec.kubernetes_version) {
        return Ok(Vec::new());
    }
    Ok(parse_unstructured(COREDNS_RBAC.as_bytes()).context(error::ParseSnafu {
        what: "extra objects",
    })?)
}

/// Versions that cannot be parsed get the RBAC, it is harmless on older clusters.
fn needs_coredns_rbac(kubernetes_version: &str) -> bool {
    let mut parts = kubernetes_version.trim_start_matches('v').split('.');
    match (parts.next(), parts.next()) {
        (Some("1"), Some(minor)) => minor
            .parse::<u32>()
            .map(|minor| minor >= COREDNS_RBAC_MINOR_VERSION)
            .unwrap_or(true),
        _ => true,
    }
}
