/*!

Builds the provider independent CAPI objects of a cluster. Every object is stamped with the
ownership labels so that watch events on it can be traced back to the cluster it belongs to.

!*/

use super::name;
use crate::capi::{
    Bootstrap, Cluster as CapiCluster, ClusterNetwork, ClusterSpec as CapiClusterSpec,
    EtcdadmCluster, EtcdadmClusterSpec, EtcdadmConfigSpec, KubeadmConfigSpec,
    KubeadmConfigTemplate, KubeadmConfigTemplateResource, KubeadmConfigTemplateSpec,
    KubeadmControlPlane, KubeadmControlPlaneMachineTemplate, KubeadmControlPlaneSpec,
    LabelSelector, MachineDeployment, MachineDeploymentSpec, MachineSpec, MachineTemplateSpec,
    NetworkRanges, ObjectMetaTemplate, ObjectReference,
};
use crate::cluster::{Taint, WorkerNodeGroupConfiguration};
use crate::constants::{
    BOOTSTRAP_API_VERSION, CONTROL_PLANE_API_VERSION, ETCD_API_VERSION, LABEL_CAPI_CLUSTER_NAME,
    LABEL_CLUSTER_NAME, LABEL_CLUSTER_NAMESPACE, LABEL_MACHINE_DEPLOYMENT_TYPE,
    LABEL_MACHINE_GROUP_NAME, MACHINE_DEPLOYMENT_TYPE_WORKERS,
};
use crate::yaml::ApiObject;
use crate::{Cluster, CrdExt};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde_json::{json, Value};
use std::collections::BTreeMap;

const ETCD_PKI_DIR: &str = "/etc/kubernetes/pki/etcd";

/// The labels that tie an object to the cluster it was generated for.
pub fn ownership_labels(cluster: &Cluster) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(
        LABEL_CLUSTER_NAME.to_string(),
        cluster.object_name().to_string(),
    );
    labels.insert(
        LABEL_CLUSTER_NAMESPACE.to_string(),
        cluster.object_namespace().to_string(),
    );
    labels.insert(
        LABEL_CAPI_CLUSTER_NAME.to_string(),
        cluster.object_name().to_string(),
    );
    labels
}

/// The labels of the machines of a worker node group.
pub fn worker_labels(
    cluster: &Cluster,
    group: &WorkerNodeGroupConfiguration,
) -> BTreeMap<String, String> {
    let mut labels = ownership_labels(cluster);
    labels.insert(
        LABEL_MACHINE_GROUP_NAME.to_string(),
        group.name.clone(),
    );
    labels.insert(
        LABEL_MACHINE_DEPLOYMENT_TYPE.to_string(),
        MACHINE_DEPLOYMENT_TYPE_WORKERS.to_string(),
    );
    labels
}

/// Metadata for an object named `name` in `namespace` that belongs to `cluster`.
pub fn object_meta<S: Into<String>>(cluster: &Cluster, namespace: &str, name: S) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.into()),
        namespace: Some(namespace.to_string()),
        labels: Some(ownership_labels(cluster)),
        ..ObjectMeta::default()
    }
}

/// A reference to `object`, in the form CAPI objects use to point at each other.
pub fn object_reference(object: &dyn ApiObject) -> ObjectReference {
    ObjectReference::new(
        object.api_version().into_owned(),
        object.kind().into_owned(),
        object.name(),
    )
}

pub fn kubernetes_version(cluster: &Cluster) -> String {
    let version = cluster.spec.kubernetes_version.trim_start_matches('v');
    format!("v{}", version)
}

/// The CAPI cluster, pointing at the provider's infrastructure cluster.
pub fn capi_cluster(
    cluster: &Cluster,
    namespace: &str,
    infrastructure_ref: ObjectReference,
) -> CapiCluster {
    let network = &cluster.spec.cluster_network;
    let managed_external_etcd_ref = if cluster.has_external_etcd() {
        Some(ObjectReference::new(
            ETCD_API_VERSION,
            "EtcdadmCluster",
            name::etcdadm_cluster_name(cluster),
        ))
    } else {
        None
    };
    CapiCluster {
        metadata: object_meta(cluster, namespace, cluster.object_name()),
        spec: CapiClusterSpec {
            paused: None,
            cluster_network: Some(ClusterNetwork {
                pods: Some(NetworkRanges {
                    cidr_blocks: network.pods.cidr_blocks.clone(),
                }),
                services: Some(NetworkRanges {
                    cidr_blocks: network.services.cidr_blocks.clone(),
                }),
            }),
            control_plane_endpoint: None,
            control_plane_ref: Some(ObjectReference::new(
                CONTROL_PLANE_API_VERSION,
                "KubeadmControlPlane",
                name::kubeadm_control_plane_name(cluster),
            )),
            infrastructure_ref: Some(infrastructure_ref),
            managed_external_etcd_ref,
        },
        status: None,
    }
}

/// The kubeadm control plane, using `machine_template_ref` for its machines.
pub fn kubeadm_control_plane(
    cluster: &Cluster,
    namespace: &str,
    machine_template_ref: ObjectReference,
) -> KubeadmControlPlane {
    let config = &cluster.spec.control_plane_configuration;
    let node_registration = node_registration(config.labels.as_ref(), config.taints.as_deref());

    let mut cluster_configuration = json!({
        "clusterName": cluster.object_name(),
        "networking": {
            "podSubnet": cluster.spec.cluster_network.pods.cidr_blocks.join(","),
            "serviceSubnet": cluster.spec.cluster_network.services.cidr_blocks.join(","),
        },
    });
    if let Some(endpoint) = &config.endpoint {
        cluster_configuration["apiServer"] = json!({ "certSANs": [endpoint.host] });
    }
    if cluster.has_external_etcd() {
        cluster_configuration["etcd"] = json!({
            "external": {
                "endpoints": [],
                "caFile": format!("{}/ca.crt", ETCD_PKI_DIR),
                "certFile": "/etc/kubernetes/pki/apiserver-etcd-client.crt",
                "keyFile": "/etc/kubernetes/pki/apiserver-etcd-client.key",
            }
        });
    }

    KubeadmControlPlane {
        metadata: object_meta(cluster, namespace, name::kubeadm_control_plane_name(cluster)),
        spec: KubeadmControlPlaneSpec {
            replicas: Some(config.count),
            version: kubernetes_version(cluster),
            machine_template: KubeadmControlPlaneMachineTemplate {
                metadata: None,
                infrastructure_ref: machine_template_ref,
            },
            kubeadm_config_spec: KubeadmConfigSpec {
                cluster_configuration: Some(cluster_configuration),
                init_configuration: Some(json!({ "nodeRegistration": node_registration })),
                join_configuration: Some(json!({ "nodeRegistration": node_registration })),
                ..KubeadmConfigSpec::default()
            },
        },
        status: None,
    }
}

/// The etcdadm cluster, only for clusters with an external etcd.
pub fn etcdadm_cluster(
    cluster: &Cluster,
    namespace: &str,
    machine_template_ref: ObjectReference,
) -> Option<EtcdadmCluster> {
    let etcd = cluster.spec.external_etcd_configuration.as_ref()?;
    Some(EtcdadmCluster {
        metadata: object_meta(cluster, namespace, name::etcdadm_cluster_name(cluster)),
        spec: EtcdadmClusterSpec {
            replicas: Some(etcd.count),
            etcdadm_config_spec: EtcdadmConfigSpec {
                etcdadm_builtin: Some(true),
                cipher_suites: None,
                format: None,
            },
            infrastructure_template: machine_template_ref,
        },
        status: None,
    })
}

/// The kubeadm config template that the machines of a worker node group join the cluster with.
pub fn kubeadm_config_template(
    cluster: &Cluster,
    namespace: &str,
    group: &WorkerNodeGroupConfiguration,
    template_name: &str,
) -> KubeadmConfigTemplate {
    let node_registration = node_registration(group.labels.as_ref(), group.taints.as_deref());
    KubeadmConfigTemplate {
        metadata: object_meta(cluster, namespace, template_name),
        spec: KubeadmConfigTemplateSpec {
            template: KubeadmConfigTemplateResource {
                spec: KubeadmConfigSpec {
                    join_configuration: Some(json!({ "nodeRegistration": node_registration })),
                    ..KubeadmConfigSpec::default()
                },
            },
        },
    }
}

/// The machine deployment of a worker node group.
pub fn machine_deployment(
    cluster: &Cluster,
    namespace: &str,
    group: &WorkerNodeGroupConfiguration,
    kubeadm_config_template: &KubeadmConfigTemplate,
    machine_template_ref: ObjectReference,
) -> MachineDeployment {
    let mut metadata = object_meta(
        cluster,
        namespace,
        name::machine_deployment_name(cluster, group),
    );
    metadata.labels = Some(worker_labels(cluster, group));
    let cluster_name = cluster.object_name().to_string();
    let mut selector = BTreeMap::new();
    selector.insert(LABEL_CAPI_CLUSTER_NAME.to_string(), cluster_name.clone());

    MachineDeployment {
        metadata,
        spec: MachineDeploymentSpec {
            cluster_name: cluster_name.clone(),
            replicas: Some(group.count.unwrap_or(1)),
            selector: Some(LabelSelector {
                match_labels: Some(selector),
            }),
            template: MachineTemplateSpec {
                metadata: Some(ObjectMetaTemplate {
                    labels: Some(worker_labels(cluster, group)),
                    annotations: None,
                }),
                spec: MachineSpec {
                    cluster_name,
                    bootstrap: Bootstrap {
                        config_ref: Some(ObjectReference::new(
                            BOOTSTRAP_API_VERSION,
                            "KubeadmConfigTemplate",
                            kubeadm_config_template.name(),
                        )),
                        data_secret_name: None,
                    },
                    infrastructure_ref: machine_template_ref,
                    version: Some(kubernetes_version(cluster)),
                },
            },
        },
        status: None,
    }
}

fn node_registration(
    labels: Option<&BTreeMap<String, String>>,
    taints: Option<&[Taint]>,
) -> Value {
    let mut kubelet_extra_args = serde_json::Map::new();
    if let Some(labels) = labels.filter(|labels| !labels.is_empty()) {
        let node_labels = labels
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect::<Vec<_>>()
            .join(",");
        kubelet_extra_args.insert("node-labels".to_string(), Value::String(node_labels));
    }
    let taints: Vec<Value> = taints
        .unwrap_or_default()
        .iter()
        .map(|taint| {
            let mut value = json!({ "key": taint.key, "effect": taint.effect });
            if let Some(v) = &taint.value {
                value["value"] = Value::String(v.clone());
            }
            value
        })
        .collect();
    json!({
        "kubeletExtraArgs": kubelet_extra_args,
        "taints": taints,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cluster::{
        CidrBlocks, ClusterNetwork as DesiredNetwork, ControlPlaneConfiguration,
        ExternalEtcdConfiguration,
    };
    use crate::constants::{DOCKER_API_VERSION, NAMESPACE};
    use crate::ClusterSpec;
    use maplit::btreemap;

    fn cluster() -> Cluster {
        let mut cluster = Cluster::new(
            "my-cluster",
            ClusterSpec {
                kubernetes_version: "1.24.9".to_string(),
                control_plane_configuration: ControlPlaneConfiguration {
                    count: 3,
                    taints: Some(vec![Taint {
                        key: "node-role.kubernetes.io/control-plane".to_string(),
                        value: None,
                        effect: "NoSchedule".to_string(),
                    }]),
                    ..Default::default()
                },
                worker_node_group_configurations: vec![WorkerNodeGroupConfiguration {
                    name: "md-0".to_string(),
                    count: Some(2),
                    labels: Some(btreemap! {"tier".to_string() => "web".to_string()}),
                    ..Default::default()
                }],
                cluster_network: DesiredNetwork {
                    pods: CidrBlocks {
                        cidr_blocks: vec!["192.168.0.0/16".to_string()],
                    },
                    services: CidrBlocks {
                        cidr_blocks: vec!["10.96.0.0/12".to_string()],
                    },
                    cni: None,
                },
                ..Default::default()
            },
        );
        cluster.metadata.namespace = Some("default".to_string());
        cluster
    }

    fn template_ref(name: &str) -> ObjectReference {
        ObjectReference::new(DOCKER_API_VERSION, "DockerMachineTemplate", name)
    }

    #[test]
    fn ownership_labels_are_stamped() {
        let cluster = cluster();
        let capi = capi_cluster(
            &cluster,
            NAMESPACE,
            ObjectReference::new(DOCKER_API_VERSION, "DockerCluster", "my-cluster"),
        );
        let labels = capi.metadata.labels.as_ref().unwrap();
        assert_eq!(labels[LABEL_CLUSTER_NAME], "my-cluster");
        assert_eq!(labels[LABEL_CLUSTER_NAMESPACE], "default");
        assert_eq!(labels[LABEL_CAPI_CLUSTER_NAME], "my-cluster");
        assert_eq!(capi.metadata.namespace.as_deref(), Some(NAMESPACE));
        assert_eq!(
            capi.spec.control_plane_ref.as_ref().unwrap().name,
            "my-cluster"
        );
        assert!(capi.spec.managed_external_etcd_ref.is_none());
    }

    #[test]
    fn control_plane_follows_configuration() {
        let cluster = cluster();
        let kcp = kubeadm_control_plane(
            &cluster,
            NAMESPACE,
            template_ref("my-cluster-control-plane-1"),
        );
        assert_eq!(kcp.spec.replicas, Some(3));
        assert_eq!(kcp.spec.version, "v1.24.9");
        let init = kcp.spec.kubeadm_config_spec.init_configuration.unwrap();
        assert_eq!(
            init["nodeRegistration"]["taints"][0]["effect"],
            "NoSchedule"
        );
        assert!(init["nodeRegistration"]["taints"][0].get("value").is_none());
    }

    #[test]
    fn external_etcd() {
        let mut cluster = cluster();
        assert!(etcdadm_cluster(&cluster, NAMESPACE, template_ref("my-cluster-etcd-1")).is_none());

        cluster.spec.external_etcd_configuration = Some(ExternalEtcdConfiguration {
            count: 3,
            machine_group_ref: None,
        });
        let etcd = etcdadm_cluster(&cluster, NAMESPACE, template_ref("my-cluster-etcd-1")).unwrap();
        assert_eq!(etcd.name(), "my-cluster-etcd");
        assert_eq!(etcd.spec.infrastructure_template.name, "my-cluster-etcd-1");
        let capi = capi_cluster(
            &cluster,
            NAMESPACE,
            ObjectReference::new(DOCKER_API_VERSION, "DockerCluster", "my-cluster"),
        );
        assert_eq!(
            capi.spec.managed_external_etcd_ref.unwrap().name,
            "my-cluster-etcd"
        );
    }

    #[test]
    fn worker_objects() {
        let cluster = cluster();
        let group = &cluster.spec.worker_node_group_configurations[0];
        let kct = kubeadm_config_template(&cluster, NAMESPACE, group, "my-cluster-md-0-1");
        let md = machine_deployment(
            &cluster,
            NAMESPACE,
            group,
            &kct,
            template_ref("my-cluster-md-0-1"),
        );
        assert_eq!(md.name(), "my-cluster-md-0");
        assert_eq!(md.spec.replicas, Some(2));
        let labels = md.metadata.labels.as_ref().unwrap();
        assert_eq!(labels[LABEL_MACHINE_GROUP_NAME], "md-0");
        assert_eq!(labels[LABEL_MACHINE_DEPLOYMENT_TYPE], "workers");
        assert_eq!(
            md.spec.template.spec.bootstrap.config_ref.unwrap().name,
            "my-cluster-md-0-1"
        );
        let join = kct.spec.template.spec.join_configuration.unwrap();
        assert_eq!(
            join["nodeRegistration"]["kubeletExtraArgs"]["node-labels"],
            "tier=web"
        );
    }
}
