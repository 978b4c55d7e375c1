/// Helper macro to avoid retyping the base domain-like name of our system when creating further
/// string constants from it. When given no parameters, this returns the base domain-like name of
/// the system. When given a string literal parameter it adds `/parameter` to the end.
macro_rules! anywhere {
    () => {
        "anywhere.eks.amazonaws.com"
    };
    ($s:literal) => {
        concat!(anywhere!(), "/", $s)
    };
}

/// Like `anywhere!` but for the `cluster.` subdomain that carries the ownership labels stamped on
/// generated CAPI objects.
macro_rules! cluster_anywhere {
    ($s:literal) => {
        concat!("cluster.", anywhere!(), "/", $s)
    };
}

// System identifiers
pub const GROUP: &str = anywhere!();
pub const VERSION: &str = "v1alpha1";
pub const API_VERSION: &str = anywhere!("v1alpha1");

/// The namespace where generated CAPI objects live.
pub const NAMESPACE: &str = "eksa-system";

// CAPI groups and versions
pub const CAPI_GROUP: &str = "cluster.x-k8s.io";
pub const CAPI_API_VERSION: &str = "cluster.x-k8s.io/v1beta1";
pub const CONTROL_PLANE_API_VERSION: &str = "controlplane.cluster.x-k8s.io/v1beta1";
pub const BOOTSTRAP_API_VERSION: &str = "bootstrap.cluster.x-k8s.io/v1beta1";
pub const ETCD_API_VERSION: &str = "etcdcluster.cluster.x-k8s.io/v1beta1";
pub const DOCKER_API_VERSION: &str = "infrastructure.cluster.x-k8s.io/v1beta1";
pub const VSPHERE_API_VERSION: &str = "infrastructure.cluster.x-k8s.io/v1beta1";
pub const CLOUDSTACK_API_VERSION: &str = "infrastructure.cluster.x-k8s.io/v1beta2";

// Label keys
pub const LABEL_CLUSTER_NAME: &str = cluster_anywhere!("cluster-name");
pub const LABEL_CLUSTER_NAMESPACE: &str = cluster_anywhere!("cluster-namespace");
pub const LABEL_MACHINE_GROUP_NAME: &str = cluster_anywhere!("machine-group-name");
pub const LABEL_MACHINE_DEPLOYMENT_TYPE: &str = cluster_anywhere!("machine-deployment-type");
pub const LABEL_CAPI_CLUSTER_NAME: &str = "cluster.x-k8s.io/cluster-name";

// Label values
pub const MACHINE_DEPLOYMENT_TYPE_WORKERS: &str = "workers";

// Annotations
pub const ANNOTATION_PAUSED: &str = anywhere!("paused");

// Names of finalizers used by the controller
pub const FINALIZER_CLUSTER: &str = "clusters.anywhere.eks.amazonaws.com/finalizer";

// Condition types
pub const CONDITION_READY: &str = "Ready";
pub const CONDITION_CONTROL_PLANE_READY: &str = "ControlPlaneReady";
pub const CONDITION_CONTROL_PLANE_INITIALIZED: &str = "ControlPlaneInitialized";
pub const CONDITION_MANAGED_ETCD_READY: &str = "ManagedEtcdReady";
pub const CONDITION_DEFAULT_CNI_CONFIGURED: &str = "DefaultCNIConfigured";
pub const CONDITION_WORKERS_READY: &str = "WorkersReady";

// Machine deployment phases
pub const MACHINE_DEPLOYMENT_PHASE_RUNNING: &str = "Running";

// Secrets
pub const KUBECONFIG_SECRET_KEY: &str = "value";

#[test]
fn anywhere_constants_macro_test() {
    assert_eq!("anywhere.eks.amazonaws.com", anywhere!());
    assert_eq!("anywhere.eks.amazonaws.com/v1alpha1", API_VERSION);
    assert_eq!("anywhere.eks.amazonaws.com/paused", ANNOTATION_PAUSED);
    assert_eq!(
        "cluster.anywhere.eks.amazonaws.com/cluster-name",
        LABEL_CLUSTER_NAME
    );
}
