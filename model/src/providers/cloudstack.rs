use super::{
    control_plane_yaml, machine_config, read_config, read_machine_configs, workers_yaml, Result,
    TemplateBuilder,
};
use crate::capi::infrastructure::{
    CloudStackCluster, CloudStackClusterSpec, CloudStackFailureDomainSpec, CloudStackMachineSpec,
    CloudStackMachineTemplate, CloudStackMachineTemplateResource, CloudStackMachineTemplateSpec,
    CloudStackResourceIdentifier, CloudStackZoneSpec, SecretReference,
};
use crate::capi::ApiEndpoint;
use crate::clients::KubeClient;
use crate::clusterapi::apibuilder::object_meta;
use crate::clusterapi::equality::semantic_derivative;
use crate::clusterapi::name::{
    control_plane_machine_template_name, etcd_machine_template_name, WorkerTemplateNames,
};
use crate::provider_config::{CloudStackDatacenterConfig, CloudStackMachineConfig};
use crate::{Cluster, CrdExt};
use std::collections::BTreeMap;

const API_SERVER_PORT: i32 = 6443;

#[derive(Debug, Clone, Copy, Default)]
pub struct CloudStackTemplateBuilder;

#[derive(Debug, Clone)]
pub struct CloudStackSpec {
    pub cluster: Cluster,
    pub namespace: String,
    pub datacenter: CloudStackDatacenterConfig,
    pub machine_configs: BTreeMap<String, CloudStackMachineConfig>,
}

impl CloudStackSpec {
    fn machine_template(
        &self,
        config: &CloudStackMachineConfig,
        name: String,
    ) -> CloudStackMachineTemplate {
        CloudStackMachineTemplate {
            metadata: object_meta(&self.cluster, &self.namespace, name),
            spec: CloudStackMachineTemplateSpec {
                template: CloudStackMachineTemplateResource {
                    spec: CloudStackMachineSpec {
                        offering: CloudStackResourceIdentifier::named(
                            &config.spec.compute_offering,
                        ),
                        template: CloudStackResourceIdentifier::named(&config.spec.template),
                        disk_offering: None,
                        affinity_group_ids: config.spec.affinity_group_ids.clone(),
                        details: None,
                    },
                },
            },
        }
    }

    /// One failure domain per availability zone. The credentials of a zone are read by CAPC
    /// from a secret in the namespace of the generated objects.
    fn provider_cluster(&self) -> CloudStackCluster {
        let cluster = &self.cluster;
        let failure_domains = self
            .datacenter
            .spec
            .availability_zones
            .iter()
            .map(|zone| CloudStackFailureDomainSpec {
                name: zone.name.clone(),
                zone: CloudStackZoneSpec {
                    name: zone.zone_name.clone(),
                    network: CloudStackResourceIdentifier::named(&zone.network_name),
                },
                account: zone.account.clone(),
                domain: zone.domain.clone(),
                acs_endpoint: SecretReference {
                    name: zone.credentials_ref.clone(),
                    namespace: self.namespace.clone(),
                },
            })
            .collect();
        CloudStackCluster {
            metadata: object_meta(cluster, &self.namespace, cluster.object_name()),
            spec: CloudStackClusterSpec {
                control_plane_endpoint: cluster
                    .spec
                    .control_plane_configuration
                    .endpoint
                    .as_ref()
                    .map(|endpoint| ApiEndpoint {
                        host: endpoint.host.clone(),
                        port: API_SERVER_PORT,
                    }),
                failure_domains,
            },
        }
    }
}

#[async_trait::async_trait]
impl TemplateBuilder for CloudStackTemplateBuilder {
    type ProviderCluster = CloudStackCluster;
    type MachineTemplate = CloudStackMachineTemplate;
    type Spec = CloudStackSpec;

    fn datacenter_kind(&self) -> &'static str {
        "CloudStackDatacenterConfig"
    }

    async fn build_cluster_spec(
        &self,
        client: &dyn KubeClient,
        cluster: &Cluster,
        namespace: &str,
    ) -> Result<CloudStackSpec> {
        let datacenter = read_config(client, cluster, &cluster.spec.datacenter_ref.name).await?;
        let machine_configs = read_machine_configs(client, cluster).await?;
        Ok(CloudStackSpec {
            cluster: cluster.clone(),
            namespace: namespace.to_string(),
            datacenter,
            machine_configs,
        })
    }

    fn generate_capi_spec_control_plane(&self, spec: &CloudStackSpec) -> Result<Vec<u8>> {
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
        spec: &CloudStackSpec,
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

    fn machine_template_equal(
        new: &CloudStackMachineTemplate,
        old: &CloudStackMachineTemplate,
    ) -> bool {
        semantic_derivative(&new.spec, &old.spec)
    }
}
