use super::{control_plane_yaml, read_config, workers_yaml, Result, TemplateBuilder};
use crate::capi::infrastructure::{
    DockerCluster, DockerClusterSpec, DockerMachineSpec, DockerMachineTemplate,
    DockerMachineTemplateResource, DockerMachineTemplateSpec, DockerMount,
};
use crate::clients::KubeClient;
use crate::clusterapi::apibuilder::{kubernetes_version, object_meta};
use crate::clusterapi::equality::semantic_derivative;
use crate::clusterapi::name::{
    control_plane_machine_template_name, etcd_machine_template_name, WorkerTemplateNames,
};
use crate::provider_config::DockerDatacenterConfig;
use crate::{Cluster, CrdExt};

const DEFAULT_NODE_IMAGE_REPOSITORY: &str = "kindest";
const DOCKER_SOCKET: &str = "/var/run/docker.sock";

/// Clusters of containers on the local Docker daemon. Used for development and tests, machine
/// configs are not needed.
#[derive(Debug, Clone, Copy, Default)]
pub struct DockerTemplateBuilder;

#[derive(Debug, Clone)]
pub struct DockerSpec {
    pub cluster: Cluster,
    pub namespace: String,
    pub datacenter: DockerDatacenterConfig,
}

impl DockerSpec {
    fn node_image(&self) -> String {
        let repository = self
            .datacenter
            .spec
            .node_image_repository
            .as_deref()
            .unwrap_or(DEFAULT_NODE_IMAGE_REPOSITORY);
        format!("{}/node:{}", repository, kubernetes_version(&self.cluster))
    }

    fn machine_template(&self, name: String) -> DockerMachineTemplate {
        DockerMachineTemplate {
            metadata: object_meta(&self.cluster, &self.namespace, name),
            spec: DockerMachineTemplateSpec {
                template: DockerMachineTemplateResource {
                    spec: DockerMachineSpec {
                        custom_image: Some(self.node_image()),
                        extra_mounts: Some(vec![DockerMount {
                            container_path: DOCKER_SOCKET.to_string(),
                            host_path: DOCKER_SOCKET.to_string(),
                            read_only: None,
                        }]),
                        bootstrapped: None,
                    },
                },
            },
        }
    }
}

#[async_trait::async_trait]
impl TemplateBuilder for DockerTemplateBuilder {
    type ProviderCluster = DockerCluster;
    type MachineTemplate = DockerMachineTemplate;
    type Spec = DockerSpec;

    fn datacenter_kind(&self) -> &'static str {
        "DockerDatacenterConfig"
    }

    async fn build_cluster_spec(
        &self,
        client: &dyn KubeClient,
        cluster: &Cluster,
        namespace: &str,
    ) -> Result<DockerSpec> {
        let datacenter = read_config(client, cluster, &cluster.spec.datacenter_ref.name).await?;
        Ok(DockerSpec {
            cluster: cluster.clone(),
            namespace: namespace.to_string(),
            datacenter,
        })
    }

    fn generate_capi_spec_control_plane(&self, spec: &DockerSpec) -> Result<Vec<u8>> {
        let cluster = &spec.cluster;
        let provider_cluster = DockerCluster {
            metadata: object_meta(cluster, &spec.namespace, cluster.object_name()),
            spec: DockerClusterSpec::default(),
        };
        let etcd_template = if cluster.has_external_etcd() {
            Some(spec.machine_template(etcd_machine_template_name(cluster)))
        } else {
            None
        };
        control_plane_yaml(
            cluster,
            &spec.namespace,
            provider_cluster,
            spec.machine_template(control_plane_machine_template_name(cluster)),
            etcd_template,
        )
    }

    fn generate_capi_spec_workers(
        &self,
        spec: &DockerSpec,
        names: &WorkerTemplateNames,
    ) -> Result<Vec<u8>> {
        workers_yaml(&spec.cluster, &spec.namespace, names, |_, name| {
            Ok(spec.machine_template(name))
        })
    }

    fn machine_template_equal(new: &DockerMachineTemplate, old: &DockerMachineTemplate) -> bool {
        semantic_derivative(&new.spec, &old.spec)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::capi::{Cluster as CapiCluster, KubeadmControlPlane, ObjectReference};
    use crate::clients::fake::{FakeClient, Method};
    use crate::cluster::ExternalEtcdConfiguration;
    use crate::clusterapi::apibuilder::{self, object_reference};
    use crate::clusterapi::name::initial_template_names_for_workers;
    use crate::clusterapi::{new_control_plane_parser_and_builder, new_workers_parser_and_builder};
    use crate::constants::NAMESPACE;
    use crate::providers::test::cluster;
    use crate::providers::{CapiProvider, Provider};
    use crate::yaml::{ApiObject, Mapping};
    use crate::DockerDatacenterConfigSpec;

    fn spec() -> DockerSpec {
        let mut datacenter =
            DockerDatacenterConfig::new("my-datacenter", DockerDatacenterConfigSpec::default());
        datacenter.metadata.namespace = Some("default".to_string());
        DockerSpec {
            cluster: cluster("DockerDatacenterConfig", ""),
            namespace: NAMESPACE.to_string(),
            datacenter,
        }
    }

    #[test]
    fn control_plane_round_trip() {
        let spec = spec();
        let cluster = &spec.cluster;
        let yaml = DockerTemplateBuilder
            .generate_capi_spec_control_plane(&spec)
            .unwrap();

        let (parser, mut builder) = new_control_plane_parser_and_builder::<
            DockerCluster,
            DockerMachineTemplate,
        >(
            Mapping::new::<DockerCluster>("DockerCluster"),
            Mapping::new::<DockerMachineTemplate>("DockerMachineTemplate"),
        )
        .unwrap();
        parser.parse(&yaml, &mut builder).unwrap();
        let cp = builder.control_plane;

        let template = spec.machine_template(control_plane_machine_template_name(cluster));
        let provider_cluster = DockerCluster {
            metadata: object_meta(cluster, NAMESPACE, "my-cluster"),
            spec: DockerClusterSpec::default(),
        };
        let expected_cluster: CapiCluster =
            apibuilder::capi_cluster(cluster, NAMESPACE, object_reference(&provider_cluster));
        let expected_kcp: KubeadmControlPlane =
            apibuilder::kubeadm_control_plane(cluster, NAMESPACE, object_reference(&template));

        assert_eq!(cp.cluster, Some(expected_cluster));
        assert_eq!(cp.provider_cluster, Some(provider_cluster));
        assert_eq!(cp.kubeadm_control_plane, Some(expected_kcp));
        assert_eq!(cp.control_plane_machine_template, Some(template));
        assert!(cp.etcd_cluster.is_none());
    }

    #[test]
    fn external_etcd_template() {
        let mut spec = spec();
        spec.cluster.spec.external_etcd_configuration = Some(ExternalEtcdConfiguration {
            count: 3,
            machine_group_ref: None,
        });
        let yaml = DockerTemplateBuilder
            .generate_capi_spec_control_plane(&spec)
            .unwrap();
        let (parser, mut builder) = new_control_plane_parser_and_builder::<
            DockerCluster,
            DockerMachineTemplate,
        >(
            Mapping::new::<DockerCluster>("DockerCluster"),
            Mapping::new::<DockerMachineTemplate>("DockerMachineTemplate"),
        )
        .unwrap();
        parser.parse(&yaml, &mut builder).unwrap();
        let cp = builder.control_plane;
        assert_eq!(cp.etcd_cluster.as_ref().unwrap().name(), "my-cluster-etcd");
        assert_eq!(
            cp.etcd_machine_template.as_ref().unwrap().name(),
            "my-cluster-etcd-1"
        );
    }

    #[test]
    fn workers_are_generated_per_group() {
        let spec = spec();
        let names = initial_template_names_for_workers(&spec.cluster);
        let yaml = DockerTemplateBuilder
            .generate_capi_spec_workers(&spec, &names)
            .unwrap();
        let (parser, mut builder) = new_workers_parser_and_builder::<DockerMachineTemplate>(
            Mapping::new::<DockerMachineTemplate>("DockerMachineTemplate"),
        )
        .unwrap();
        parser.parse(&yaml, &mut builder).unwrap();
        let mut groups = builder.workers.groups;
        groups.sort_by(|a, b| a.machine_deployment.name().cmp(b.machine_deployment.name()));
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].machine_deployment.name(), "my-cluster-md-0");
        assert_eq!(
            groups[0].provider_machine_template.as_ref().unwrap().name(),
            "my-cluster-md-0-1"
        );
        assert_eq!(
            groups[1].kubeadm_config_template.as_ref().unwrap().name(),
            "my-cluster-md-1-1"
        );
        assert_eq!(
            groups[1]
                .provider_machine_template
                .as_ref()
                .unwrap()
                .spec
                .template
                .spec
                .custom_image
                .as_deref(),
            Some("kindest/node:v1.24.9")
        );
    }

    #[tokio::test]
    async fn provider_reads_datacenter_and_reuses_live_names() {
        let client = FakeClient::new("management");
        client.add(&spec().datacenter).unwrap();

        let provider = CapiProvider::new(DockerTemplateBuilder, NAMESPACE);
        let cluster = cluster("DockerDatacenterConfig", "");
        let objects = provider.control_plane_objects(&client, &cluster).await.unwrap();
        let kinds: Vec<_> = objects.iter().map(|o| o.kind().into_owned()).collect();
        assert_eq!(
            kinds,
            vec![
                "Cluster",
                "DockerCluster",
                "KubeadmControlPlane",
                "DockerMachineTemplate"
            ]
        );

        // Once the control plane exists with an older template, an unchanged spec keeps that
        // template's name.
        let template = spec().machine_template("my-cluster-control-plane-3".to_string());
        let kcp = apibuilder::kubeadm_control_plane(
            &cluster,
            NAMESPACE,
            ObjectReference::new(
                crate::constants::DOCKER_API_VERSION,
                "DockerMachineTemplate",
                "my-cluster-control-plane-3",
            ),
        );
        client.add(&template).unwrap();
        client.add(&kcp).unwrap();
        let cp = provider.control_plane(&client, &cluster).await.unwrap();
        assert_eq!(
            cp.kubeadm_control_plane
                .unwrap()
                .spec
                .machine_template
                .infrastructure_ref
                .name,
            "my-cluster-control-plane-3"
        );
        assert!(client.calls_of(Method::Create).is_empty());
    }

    #[tokio::test]
    async fn missing_datacenter_is_an_error() {
        let client = FakeClient::new("management");
        let provider = CapiProvider::new(DockerTemplateBuilder, NAMESPACE);
        let error = provider
            .control_plane_objects(&client, &cluster("DockerDatacenterConfig", ""))
            .await
            .err()
            .unwrap();
        assert_eq!(
            error.to_string(),
            "DockerDatacenterConfig 'my-datacenter' not found in namespace 'default'"
        );
    }
}
