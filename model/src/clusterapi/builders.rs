use super::error::{self, Result};
use super::{ControlPlane, WorkerGroup, Workers};
use crate::capi::{
    Cluster as CapiCluster, EtcdadmCluster, KubeadmConfigTemplate, KubeadmControlPlane,
    MachineDeployment,
};
use crate::yaml::{self, ApiObject, Builder, Mapping, ObjectLookup, Parser};
use snafu::ResultExt;

/// Assembles a [`ControlPlane`] by following the references between the parsed objects, starting
/// at the CAPI cluster.
#[derive(Debug)]
pub struct ControlPlaneBuilder<C, M> {
    pub control_plane: ControlPlane<C, M>,
}

impl<C, M> Default for ControlPlaneBuilder<C, M> {
    fn default() -> Self {
        Self {
            control_plane: ControlPlane::default(),
        }
    }
}

impl<C, M> Builder for ControlPlaneBuilder<C, M>
where
    C: ApiObject + Clone,
    M: ApiObject + Clone,
{
    fn build_from_parsed(&mut self, lookup: ObjectLookup) {
        let cluster = match lookup.objects_of::<CapiCluster>().next() {
            Some(cluster) => cluster.clone(),
            None => return,
        };
        let cp = &mut self.control_plane;

        cp.provider_cluster = cluster
            .spec
            .infrastructure_ref
            .as_ref()
            .and_then(|r| lookup.get_from_ref::<C>(r))
            .cloned();
        cp.kubeadm_control_plane = cluster
            .spec
            .control_plane_ref
            .as_ref()
            .and_then(|r| lookup.get_from_ref::<KubeadmControlPlane>(r))
            .cloned();
        cp.control_plane_machine_template = cp.kubeadm_control_plane.as_ref().and_then(|kcp| {
            lookup
                .get_from_ref::<M>(&kcp.spec.machine_template.infrastructure_ref)
                .cloned()
        });

        if let Some(etcd_ref) = &cluster.spec.managed_external_etcd_ref {
            cp.etcd_cluster = lookup.get_from_ref::<EtcdadmCluster>(etcd_ref).cloned();
            cp.etcd_machine_template = cp.etcd_cluster.as_ref().and_then(|etcd| {
                lookup
                    .get_from_ref::<M>(&etcd.spec.infrastructure_template)
                    .cloned()
            });
        }
        cp.cluster = Some(cluster);
    }
}

/// Assembles [`Workers`] with one group per parsed machine deployment.
#[derive(Debug)]
pub struct WorkersBuilder<M> {
    pub workers: Workers<M>,
}

impl<M> Default for WorkersBuilder<M> {
    fn default() -> Self {
        Self {
            workers: Workers::default(),
        }
    }
}

impl<M> Builder for WorkersBuilder<M>
where
    M: ApiObject + Clone,
{
    fn build_from_parsed(&mut self, lookup: ObjectLookup) {
        for md in lookup.objects_of::<MachineDeployment>() {
            let machine = &md.spec.template.spec;
            let kubeadm_config_template = machine
                .bootstrap
                .config_ref
                .as_ref()
                .and_then(|r| lookup.get_from_ref::<KubeadmConfigTemplate>(r))
                .cloned();
            let provider_machine_template = lookup
                .get_from_ref::<M>(&machine.infrastructure_ref)
                .cloned();
            self.workers.groups.push(WorkerGroup {
                machine_deployment: md.clone(),
                kubeadm_config_template,
                provider_machine_template,
            });
        }
    }
}

/// Registers the provider independent control plane kinds.
pub fn register_control_plane_mappings(parser: &mut Parser) -> yaml::Result<()> {
    parser.register_mappings(vec![
        Mapping::new::<CapiCluster>("Cluster"),
        Mapping::new::<KubeadmControlPlane>("KubeadmControlPlane"),
        Mapping::new::<EtcdadmCluster>("EtcdadmCluster"),
    ])
}

/// Registers the provider independent worker kinds.
pub fn register_worker_mappings(parser: &mut Parser) -> yaml::Result<()> {
    parser.register_mappings(vec![
        Mapping::new::<MachineDeployment>("MachineDeployment"),
        Mapping::new::<KubeadmConfigTemplate>("KubeadmConfigTemplate"),
    ])
}

/// A parser that understands the control plane kinds of a provider whose infrastructure cluster
/// and machine template are decoded with the given mappings, and a builder to go with it.
pub fn new_control_plane_parser_and_builder<C, M>(
    provider_cluster_mapping: Mapping,
    machine_template_mapping: Mapping,
) -> Result<(Parser, ControlPlaneBuilder<C, M>)> {
    let mut parser = Parser::new();
    register_control_plane_mappings(&mut parser).context(error::RegisterMappingsSnafu {
        what: "base control plane",
    })?;
    parser
        .register_mappings(vec![provider_cluster_mapping, machine_template_mapping])
        .context(error::RegisterMappingsSnafu {
            what: "provider control plane",
        })?;
    Ok((parser, ControlPlaneBuilder::default()))
}

/// A parser that understands the worker kinds of a provider whose machine template is decoded with
/// the given mapping, and a builder to go with it.
pub fn new_workers_parser_and_builder<M>(
    machine_template_mapping: Mapping,
) -> Result<(Parser, WorkersBuilder<M>)> {
    let mut parser = Parser::new();
    register_worker_mappings(&mut parser).context(error::RegisterMappingsSnafu {
        what: "base workers",
    })?;
    parser
        .register_mapping(machine_template_mapping)
        .context(error::RegisterMappingsSnafu {
            what: "provider workers",
        })?;
    Ok((parser, WorkersBuilder::default()))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::capi::infrastructure::{DockerCluster, DockerMachineTemplate};
    use crate::yaml::ObjectLookupBuilder;

    const CONTROL_PLANE: &str = r#"
apiVersion: cluster.x-k8s.io/v1beta1
kind: Cluster
metadata:
  name: cluster
  namespace: eksa-system
spec:
  controlPlaneRef:
    apiVersion: controlplane.cluster.x-k8s.io/v1beta1
    kind: KubeadmControlPlane
    name: cp
  infrastructureRef:
    apiVersion: infrastructure.cluster.x-k8s.io/v1beta1
    kind: DockerCluster
    name: cluster
---
apiVersion: infrastructure.cluster.x-k8s.io/v1beta1
kind: DockerCluster
metadata:
  name: cluster
  namespace: eksa-system
spec: {}
---
apiVersion: controlplane.cluster.x-k8s.io/v1beta1
kind: KubeadmControlPlane
metadata:
  name: cp
  namespace: eksa-system
spec:
  replicas: 3
  version: v1.24.9
  machineTemplate:
    infrastructureRef:
      apiVersion: infrastructure.cluster.x-k8s.io/v1beta1
      kind: DockerMachineTemplate
      name: cp-mt
  kubeadmConfigSpec: {}
---
apiVersion: infrastructure.cluster.x-k8s.io/v1beta1
kind: DockerMachineTemplate
metadata:
  name: cp-mt
  namespace: eksa-system
spec:
  template:
    spec:
      customImage: kindest/node:v1.24.9
"#;

    const EXTERNAL_ETCD: &str = r#"
apiVersion: cluster.x-k8s.io/v1beta1
kind: Cluster
metadata:
  name: cluster
  namespace: eksa-system
spec:
  controlPlaneRef:
    apiVersion: controlplane.cluster.x-k8s.io/v1beta1
    kind: KubeadmControlPlane
    name: cp
  infrastructureRef:
    apiVersion: infrastructure.cluster.x-k8s.io/v1beta1
    kind: DockerCluster
    name: cluster
  managedExternalEtcdRef:
    apiVersion: etcdcluster.cluster.x-k8s.io/v1beta1
    kind: EtcdadmCluster
    name: etcd
---
apiVersion: etcdcluster.cluster.x-k8s.io/v1beta1
kind: EtcdadmCluster
metadata:
  name: etcd
  namespace: eksa-system
spec:
  replicas: 3
  etcdadmConfigSpec: {}
  infrastructureTemplate:
    apiVersion: infrastructure.cluster.x-k8s.io/v1beta1
    kind: DockerMachineTemplate
    name: etcd-mt
---
apiVersion: infrastructure.cluster.x-k8s.io/v1beta1
kind: DockerMachineTemplate
metadata:
  name: etcd-mt
  namespace: eksa-system
spec:
  template:
    spec: {}
"#;

    const WORKERS: &str = r#"
apiVersion: cluster.x-k8s.io/v1beta1
kind: MachineDeployment
metadata:
  name: md-a
  namespace: eksa-system
spec:
  clusterName: cluster
  replicas: 1
  template:
    spec:
      clusterName: cluster
      bootstrap:
        configRef:
          apiVersion: bootstrap.cluster.x-k8s.io/v1beta1
          kind: KubeadmConfigTemplate
          name: kct-a
      infrastructureRef:
        apiVersion: infrastructure.cluster.x-k8s.io/v1beta1
        kind: DockerMachineTemplate
        name: mt-a
---
apiVersion: bootstrap.cluster.x-k8s.io/v1beta1
kind: KubeadmConfigTemplate
metadata:
  name: kct-a
  namespace: eksa-system
spec:
  template:
    spec: {}
---
apiVersion: infrastructure.cluster.x-k8s.io/v1beta1
kind: DockerMachineTemplate
metadata:
  name: mt-a
  namespace: eksa-system
spec:
  template:
    spec: {}
---
apiVersion: cluster.x-k8s.io/v1beta1
kind: MachineDeployment
metadata:
  name: md-b
  namespace: eksa-system
spec:
  clusterName: cluster
  replicas: 2
  template:
    spec:
      clusterName: cluster
      bootstrap:
        configRef:
          apiVersion: bootstrap.cluster.x-k8s.io/v1beta1
          kind: KubeadmConfigTemplate
          name: kct-b
      infrastructureRef:
        apiVersion: infrastructure.cluster.x-k8s.io/v1beta1
        kind: DockerMachineTemplate
        name: mt-b
---
apiVersion: bootstrap.cluster.x-k8s.io/v1beta1
kind: KubeadmConfigTemplate
metadata:
  name: kct-b
  namespace: eksa-system
spec:
  template:
    spec: {}
---
apiVersion: infrastructure.cluster.x-k8s.io/v1beta1
kind: DockerMachineTemplate
metadata:
  name: mt-b
  namespace: eksa-system
spec:
  template:
    spec: {}
"#;

    fn docker_control_plane(
        yaml: &str,
    ) -> ControlPlane<DockerCluster, DockerMachineTemplate> {
        let (parser, mut builder) = new_control_plane_parser_and_builder::<
            DockerCluster,
            DockerMachineTemplate,
        >(
            Mapping::new::<DockerCluster>("DockerCluster"),
            Mapping::new::<DockerMachineTemplate>("DockerMachineTemplate"),
        )
        .unwrap();
        parser.parse(yaml.as_bytes(), &mut builder).unwrap();
        builder.control_plane
    }

    #[test]
    fn control_plane_without_etcd() {
        let cp = docker_control_plane(CONTROL_PLANE);
        assert_eq!(cp.cluster.as_ref().unwrap().name(), "cluster");
        assert_eq!(cp.provider_cluster.as_ref().unwrap().name(), "cluster");
        assert_eq!(cp.kubeadm_control_plane.as_ref().unwrap().name(), "cp");
        let template = cp.control_plane_machine_template.as_ref().unwrap();
        assert_eq!(template.name(), "cp-mt");
        assert_eq!(
            template.spec.template.spec.custom_image.as_deref(),
            Some("kindest/node:v1.24.9")
        );
        assert!(cp.etcd_cluster.is_none());
        assert!(cp.etcd_machine_template.is_none());
    }

    #[test]
    fn control_plane_with_external_etcd() {
        let yaml = format!(
            "{}\n---\n{}",
            CONTROL_PLANE.split("---").skip(1).collect::<Vec<_>>().join("---"),
            EXTERNAL_ETCD
        );
        let cp = docker_control_plane(&yaml);
        assert_eq!(cp.etcd_cluster.as_ref().unwrap().name(), "etcd");
        assert_eq!(cp.etcd_machine_template.as_ref().unwrap().name(), "etcd-mt");
        assert_eq!(
            cp.control_plane_machine_template.as_ref().unwrap().name(),
            "cp-mt"
        );
    }

    #[test]
    fn missing_cluster_leaves_control_plane_empty() {
        let mut builder = ControlPlaneBuilder::<DockerCluster, DockerMachineTemplate>::default();
        builder.build_from_parsed(ObjectLookup::new());
        assert!(builder.control_plane.objects().is_empty());
    }

    #[test]
    fn missing_links_are_skipped() {
        let (parser, mut builder) = new_control_plane_parser_and_builder::<
            DockerCluster,
            DockerMachineTemplate,
        >(
            Mapping::new::<DockerCluster>("DockerCluster"),
            Mapping::new::<DockerMachineTemplate>("DockerMachineTemplate"),
        )
        .unwrap();
        // Only the first document, the cluster.
        let cluster_only = CONTROL_PLANE.split("---").next().unwrap();
        parser.parse(cluster_only.as_bytes(), &mut builder).unwrap();
        let cp = builder.control_plane;
        assert!(cp.cluster.is_some());
        assert!(cp.provider_cluster.is_none());
        assert!(cp.kubeadm_control_plane.is_none());
        assert!(cp.control_plane_machine_template.is_none());
    }

    #[test]
    fn workers_are_paired_per_deployment() {
        let (parser, mut builder) = new_workers_parser_and_builder::<DockerMachineTemplate>(
            Mapping::new::<DockerMachineTemplate>("DockerMachineTemplate"),
        )
        .unwrap();
        parser.parse(WORKERS.as_bytes(), &mut builder).unwrap();
        let groups = builder.workers.groups;
        assert_eq!(groups.len(), 2);
        for group in &groups {
            let suffix = group
                .machine_deployment
                .name()
                .trim_start_matches("md-")
                .to_string();
            assert_eq!(
                group.kubeadm_config_template.as_ref().unwrap().name(),
                format!("kct-{}", suffix)
            );
            assert_eq!(
                group.provider_machine_template.as_ref().unwrap().name(),
                format!("mt-{}", suffix)
            );
        }
    }

    #[test]
    fn duplicate_provider_mapping_is_rejected() {
        let mapping = Mapping::new::<MachineDeployment>("MachineDeployment");
        let error = new_workers_parser_and_builder::<DockerMachineTemplate>(mapping).unwrap_err();
        assert!(error
            .to_string()
            .starts_with("registering provider workers mappings"));
    }

    #[test]
    fn lookup_built_by_hand() {
        let lookup = ObjectLookupBuilder::new()
            .add(MachineDeployment::new("md", Default::default()))
            .build();
        let mut builder = WorkersBuilder::<DockerMachineTemplate>::default();
        builder.build_from_parsed(lookup);
        let group = &builder.workers.groups[0];
        assert!(group.kubeadm_config_template.is_none());
        assert!(group.provider_machine_template.is_none());
    }
}
