use super::{
    control_plane_yaml, machine_config, read_config, read_machine_configs, workers_yaml, Result,
    TemplateBuilder,
};
use crate::capi::infrastructure::{
    VSphereCluster, VSphereClusterSpec, VSphereIdentityReference, VSphereMachineSpec,
    VSphereMachineTemplate, VSphereMachineTemplateResource, VSphereMachineTemplateSpec,
    VSphereNetworkDevice, VSphereNetworkSpec,
};
use crate::capi::ApiEndpoint;
use crate::clients::KubeClient;
use crate::clusterapi::apibuilder::object_meta;
use crate::clusterapi::equality::semantic_derivative;
use crate::clusterapi::name::{
    control_plane_machine_template_name, etcd_machine_template_name, WorkerTemplateNames,
};
use crate::provider_config::{VSphereDatacenterConfig, VSphereMachineConfig};
use crate::{Cluster, CrdExt};
use std::collections::BTreeMap;

const API_SERVER_PORT: i32 = 6443;

#[derive(Debug, Clone, Copy, Default)]
pub struct VSphereTemplateBuilder;

#[derive(Debug, Clone)]
pub struct VSphereSpec {
    pub cluster: Cluster,
    pub namespace: String,
    pub datacenter: VSphereDatacenterConfig,
    /// Machine configs by name.
    pub machine_configs: BTreeMap<String, VSphereMachineConfig>,
}

impl VSphereSpec {
    fn machine_template(
        &self,
        config: &VSphereMachineConfig,
        name: String,
    ) -> VSphereMachineTemplate {
        let datacenter = &self.datacenter.spec;
        let machine = &config.spec;
        VSphereMachineTemplate {
            metadata: object_meta(&self.cluster, &self.namespace, name),
            spec: VSphereMachineTemplateSpec {
                template: VSphereMachineTemplateResource {
                    spec: VSphereMachineSpec {
                        datacenter: datacenter.datacenter.clone(),
                        datastore: machine.datastore.clone(),
                        folder: machine.folder.clone(),
                        resource_pool: machine.resource_pool.clone(),
                        server: datacenter.server.clone(),
                        thumbprint: datacenter.thumbprint.clone(),
                        template: machine.template.clone(),
                        clone_mode: machine.clone_mode.clone(),
                        storage_policy_name: machine.storage_policy_name.clone(),
                        network: VSphereNetworkSpec {
                            devices: vec![VSphereNetworkDevice {
                                network_name: datacenter.network.clone(),
                                dhcp4: Some(true),
                            }],
                        },
                        num_cpus: machine.num_cpus,
                        memory_mib: machine.memory_mib,
                        disk_gib: machine.disk_gib,
                    },
                },
            },
        }
    }

    fn provider_cluster(&self) -> VSphereCluster {
        let cluster = &self.cluster;
        let control_plane_endpoint = cluster
            .spec
            .control_plane_configuration
            .endpoint
            .as_ref()
            .map(|endpoint| ApiEndpoint {
                host: endpoint.host.clone(),
                port: API_SERVER_PORT,
            });
        VSphereCluster {
            metadata: object_meta(cluster, &self.namespace, cluster.object_name()),
            spec: VSphereClusterSpec {
                server: self.datacenter.spec.server.clone(),
                thumbprint: self.datacenter.spec.thumbprint.clone(),
                control_plane_endpoint,
                identity_ref: Some(VSphereIdentityReference {
                    kind: "Secret".to_string(),
                    name: format!("{}-vsphere-credentials", cluster.object_name()),
                }),
            },
        }
    }
}

#[async_trait::async_trait]
impl TemplateBuilder for VSphereTemplateBuilder {
    type ProviderCluster = VSphereCluster;
    type MachineTemplate = VSphereMachineTemplate;
    type Spec = VSphereSpec;

    fn datacenter_kind(&self) -> &'static str {
        "VSphereDatacenterConfig"
    }

    async fn build_cluster_spec(
        &self,
        client: &dyn KubeClient,
        cluster: &Cluster,
        namespace: &str,
    ) -> Result<VSphereSpec> {
        let datacenter = read_config(client, cluster, &cluster.spec.datacenter_ref.name).await?;
        let machine_configs = read_machine_configs(client, cluster).await?;
        Ok(VSphereSpec {
            cluster: cluster.clone(),
            namespace: namespace.to_string(),
            datacenter,
            machine_configs,
        })
    }

    fn generate_capi_spec_control_plane(&self, spec: &VSphereSpec) -> Result<Vec<u8>> {
        let cluster = &spec.cluster;
        let control_plane_config = machine_config(
            cluster,
            &spec.machine_configs,
            cluster
                .spec
                .control_plane_configuration
                .machine_group_ref
                .as_ref(),
            "control plane",
        )?;
        let etcd_template = match &cluster.spec.external_etcd_configuration {
            Some(etcd) => {
                let config = machine_config(
                    cluster,
                    &spec.machine_configs,
                    etcd.machine_group_ref.as_ref(),
                    "external etcd",
                )?;
                Some(spec.machine_template(config, etcd_machine_template_name(cluster)))
            }
            None => None,
        };
        control_plane_yaml(
            cluster,
            &spec.namespace,
            spec.provider_cluster(),
            spec.machine_template(
                control_plane_config,
                control_plane_machine_template_name(cluster),
            ),
            etcd_template,
        )
    }

    fn generate_capi_spec_workers(
        &self,
        spec: &VSphereSpec,
        names: &WorkerTemplateNames,
    ) -> Result<Vec<u8>> {
        workers_yaml(&spec.cluster, &spec.namespace, names, |group, name| {
            let config = machine_config(
                &spec.cluster,
                &spec.machine_configs,
                group.machine_group_ref.as_ref(),
                &format!("worker node group '{}'", group.name),
            )?;
            Ok(spec.machine_template(config, name))
        })
    }

    fn machine_template_equal(new: &VSphereMachineTemplate, old: &VSphereMachineTemplate) -> bool {
        semantic_derivative(&new.spec, &old.spec)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::clients::fake::FakeClient;
    use crate::constants::NAMESPACE;
    use crate::providers::test::cluster;
    use crate::providers::CapiProvider;
    use crate::yaml::ApiObject;
    use crate::{VSphereDatacenterConfigSpec, VSphereMachineConfigSpec};

    fn datacenter() -> VSphereDatacenterConfig {
        let mut datacenter = VSphereDatacenterConfig::new(
            "my-datacenter",
            VSphereDatacenterConfigSpec {
                datacenter: "SDDC-Datacenter".to_string(),
                network: "/SDDC-Datacenter/network/sddc-cgw-network-1".to_string(),
                server: "vcenter.example.com".to_string(),
                thumbprint: None,
                insecure: false,
            },
        );
        datacenter.metadata.namespace = Some("default".to_string());
        datacenter
    }

    fn machine_config(name: &str, num_cpus: i32) -> VSphereMachineConfig {
        let mut config = VSphereMachineConfig::new(
            name,
            VSphereMachineConfigSpec {
                datastore: "/SDDC-Datacenter/datastore/WorkloadDatastore".to_string(),
                folder: "/SDDC-Datacenter/vm".to_string(),
                resource_pool: "*/Resources".to_string(),
                template: "/SDDC-Datacenter/vm/Templates/ubuntu-2004-kube-v1.24".to_string(),
                clone_mode: None,
                storage_policy_name: None,
                num_cpus,
                memory_mib: 8192,
                disk_gib: 25,
            },
        );
        config.metadata.namespace = Some("default".to_string());
        config
    }

    #[tokio::test]
    async fn machine_configs_are_resolved_per_group() {
        let client = FakeClient::new("management");
        client.add(&datacenter()).unwrap();
        client.add(&machine_config("cp-machines", 2)).unwrap();
        client.add(&machine_config("worker-machines", 4)).unwrap();

        let provider = CapiProvider::new(VSphereTemplateBuilder, NAMESPACE);
        let cluster = cluster("VSphereDatacenterConfig", "VSphereMachineConfig");

        let control_plane = provider.control_plane(&client, &cluster).await.unwrap();
        let template = control_plane.control_plane_machine_template.unwrap();
        assert_eq!(template.name(), "my-cluster-control-plane-1");
        assert_eq!(template.spec.template.spec.num_cpus, 2);
        assert_eq!(template.spec.template.spec.server, "vcenter.example.com");
        let endpoint = control_plane
            .provider_cluster
            .unwrap()
            .spec
            .control_plane_endpoint
            .unwrap();
        assert_eq!(endpoint.host, "10.0.0.10");

        let workers = provider.workers(&client, &cluster).await.unwrap();
        assert_eq!(workers.groups.len(), 2);
        for group in &workers.groups {
            let template = group.provider_machine_template.as_ref().unwrap();
            assert_eq!(template.spec.template.spec.num_cpus, 4);
        }
    }

    #[tokio::test]
    async fn missing_machine_config_is_an_error() {
        let client = FakeClient::new("management");
        client.add(&datacenter()).unwrap();
        client.add(&machine_config("cp-machines", 2)).unwrap();

        let provider = CapiProvider::new(VSphereTemplateBuilder, NAMESPACE);
        let cluster = cluster("VSphereDatacenterConfig", "VSphereMachineConfig");
        let error = provider.workers(&client, &cluster).await.unwrap_err();
        assert_eq!(
            error.to_string(),
            "VSphereMachineConfig 'worker-machines' not found in namespace 'default'"
        );
    }

    #[test]
    fn cpu_change_is_not_equal() {
        let spec = VSphereSpec {
            cluster: cluster("VSphereDatacenterConfig", "VSphereMachineConfig"),
            namespace: NAMESPACE.to_string(),
            datacenter: datacenter(),
            machine_configs: BTreeMap::new(),
        };
        let old = spec.machine_template(&machine_config("m", 2), "t-1".to_string());
        let new = spec.machine_template(&machine_config("m", 4), "t-1".to_string());
        assert!(VSphereTemplateBuilder::machine_template_equal(&old, &old));
        assert!(!VSphereTemplateBuilder::machine_template_equal(&new, &old));
    }
}
