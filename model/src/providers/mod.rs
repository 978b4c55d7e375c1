/*!

Generates the CAPI objects of a cluster for each infrastructure provider.

A [`TemplateBuilder`] knows one provider: which config objects it reads, which infrastructure
kinds it generates and how two of its machine templates are compared. It renders the objects as
a YAML stream, the same way they would be written to disk. [`CapiProvider`] parses that stream
back into a [`ControlPlane`] or [`Workers`], fixes up the names of the immutable objects against
the live cluster and hands the result to the controller behind the object safe [`Provider`]
trait.

!*/

mod cloudstack;
mod docker;
mod error;
mod extra_objects;
mod vsphere;

pub use cloudstack::{CloudStackSpec, CloudStackTemplateBuilder};
pub use docker::{DockerSpec, DockerTemplateBuilder};
pub use error::{Error, Result};
pub use extra_objects::extra_objects;
pub use vsphere::{VSphereSpec, VSphereTemplateBuilder};

use crate::cluster::{Ref, WorkerNodeGroupConfiguration};
use crate::clients::{get_object, KubeClient};
use crate::clusterapi::apibuilder::{self, object_reference};
use crate::clusterapi::name::{
    initial_template_names_for_workers, ApiRetriever, WorkerTemplateNames,
};
use crate::clusterapi::{
    new_control_plane_parser_and_builder, new_workers_parser_and_builder, ControlPlane, Workers,
};
use crate::yaml::{self, ApiObject, Mapping};
use crate::Cluster;
use kube::Resource;
use log::debug;
use serde::de::DeserializeOwned;
use snafu::{OptionExt, ResultExt};
use std::collections::BTreeMap;

/// Knows how to generate the CAPI objects of one infrastructure provider.
#[async_trait::async_trait]
pub trait TemplateBuilder: Send + Sync + 'static {
    type ProviderCluster: ApiObject + Clone + DeserializeOwned + Resource<DynamicType = ()>;
    type MachineTemplate: ApiObject + Clone + DeserializeOwned + Resource<DynamicType = ()>;
    /// Everything needed to generate the objects of a cluster.
    type Spec: Send + Sync;

    /// The kind of datacenter config that selects this provider.
    fn datacenter_kind(&self) -> &'static str;

    /// Reads the provider configs that `cluster` points at. Generated objects go in `namespace`.
    async fn build_cluster_spec(
        &self,
        client: &dyn KubeClient,
        cluster: &Cluster,
        namespace: &str,
    ) -> Result<Self::Spec>;

    fn generate_capi_spec_control_plane(&self, spec: &Self::Spec) -> Result<Vec<u8>>;

    fn generate_capi_spec_workers(
        &self,
        spec: &Self::Spec,
        names: &WorkerTemplateNames,
    ) -> Result<Vec<u8>>;

    /// Whether a live machine template (second) can be kept for a desired one (first).
    fn machine_template_equal(new: &Self::MachineTemplate, old: &Self::MachineTemplate) -> bool;
}

/// The desired CAPI objects of a cluster, with the names of immutable objects already reconciled
/// against the live cluster.
#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    fn datacenter_kind(&self) -> &'static str;

    async fn control_plane_objects(
        &self,
        client: &dyn KubeClient,
        cluster: &Cluster,
    ) -> Result<Vec<Box<dyn ApiObject>>>;

    async fn worker_objects(
        &self,
        client: &dyn KubeClient,
        cluster: &Cluster,
    ) -> Result<Vec<Box<dyn ApiObject>>>;
}

/// A [`Provider`] for any [`TemplateBuilder`].
#[derive(Debug, Clone)]
pub struct CapiProvider<B> {
    builder: B,
    namespace: String,
}

impl<B> CapiProvider<B>
where
    B: TemplateBuilder,
{
    pub fn new<S: Into<String>>(builder: B, namespace: S) -> Self {
        Self {
            builder,
            namespace: namespace.into(),
        }
    }

    fn provider_cluster_mapping() -> Mapping {
        Mapping::new::<B::ProviderCluster>(<B::ProviderCluster as Resource>::kind(&()).into_owned())
    }

    fn machine_template_mapping() -> Mapping {
        Mapping::new::<B::MachineTemplate>(<B::MachineTemplate as Resource>::kind(&()).into_owned())
    }

    pub async fn control_plane(
        &self,
        client: &dyn KubeClient,
        cluster: &Cluster,
    ) -> Result<ControlPlane<B::ProviderCluster, B::MachineTemplate>> {
        let spec = self
            .builder
            .build_cluster_spec(client, cluster, &self.namespace)
            .await?;
        let yaml = self.builder.generate_capi_spec_control_plane(&spec)?;
        let (parser, mut builder) = new_control_plane_parser_and_builder::<
            B::ProviderCluster,
            B::MachineTemplate,
        >(
            Self::provider_cluster_mapping(),
            Self::machine_template_mapping(),
        )
        .context(error::CreateParserSnafu {
            what: "control plane",
        })?;
        parser.parse(&yaml, &mut builder).context(error::ParseSnafu {
            what: "control plane",
        })?;

        let mut control_plane = builder.control_plane;
        control_plane
            .update_immutable_object_names(client, &ApiRetriever, B::machine_template_equal)
            .await
            .context(error::UpdateNamesSnafu {
                what: "control plane",
            })?;
        Ok(control_plane)
    }

    pub async fn workers(
        &self,
        client: &dyn KubeClient,
        cluster: &Cluster,
    ) -> Result<Workers<B::MachineTemplate>> {
        let spec = self
            .builder
            .build_cluster_spec(client, cluster, &self.namespace)
            .await?;
        let names = initial_template_names_for_workers(cluster);
        let yaml = self.builder.generate_capi_spec_workers(&spec, &names)?;
        let (parser, mut builder) = new_workers_parser_and_builder::<B::MachineTemplate>(
            Self::machine_template_mapping(),
        )
        .context(error::CreateParserSnafu { what: "workers" })?;
        parser
            .parse(&yaml, &mut builder)
            .context(error::ParseSnafu { what: "workers" })?;

        let mut workers = builder.workers;
        workers
            .update_immutable_object_names(client, &ApiRetriever, B::machine_template_equal)
            .await
            .context(error::UpdateNamesSnafu { what: "workers" })?;
        Ok(workers)
    }
}

#[async_trait::async_trait]
impl<B> Provider for CapiProvider<B>
where
    B: TemplateBuilder,
{
    fn datacenter_kind(&self) -> &'static str {
        self.builder.datacenter_kind()
    }

    async fn control_plane_objects(
        &self,
        client: &dyn KubeClient,
        cluster: &Cluster,
    ) -> Result<Vec<Box<dyn ApiObject>>> {
        let control_plane = self.control_plane(client, cluster).await?;
        Ok(control_plane
            .objects()
            .into_iter()
            .map(|object| object.clone_object())
            .collect())
    }

    async fn worker_objects(
        &self,
        client: &dyn KubeClient,
        cluster: &Cluster,
    ) -> Result<Vec<Box<dyn ApiObject>>> {
        let workers = self.workers(client, cluster).await?;
        Ok(workers
            .worker_objects()
            .into_iter()
            .map(|object| object.clone_object())
            .collect())
    }
}

/// The providers the controller knows about, selected by the kind of a cluster's datacenter
/// config.
pub struct Providers {
    providers: Vec<Box<dyn Provider>>,
}

impl Providers {
    /// Docker, vSphere and CloudStack, generating their objects in `namespace`.
    pub fn new(namespace: &str) -> Self {
        Self::with_providers(vec![
            Box::new(CapiProvider::new(DockerTemplateBuilder, namespace)),
            Box::new(CapiProvider::new(VSphereTemplateBuilder, namespace)),
            Box::new(CapiProvider::new(CloudStackTemplateBuilder, namespace)),
        ])
    }

    pub fn with_providers(providers: Vec<Box<dyn Provider>>) -> Self {
        Self { providers }
    }

    pub fn for_cluster(&self, cluster: &Cluster) -> Result<&dyn Provider> {
        let kind = &cluster.spec.datacenter_ref.kind;
        Ok(self
            .providers
            .iter()
            .find(|provider| provider.datacenter_kind() == kind)
            .map(|provider| provider.as_ref())
            .context(error::UnsupportedDatacenterSnafu { kind })?)
    }
}

impl std::fmt::Debug for Providers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.providers.iter().map(|p| p.datacenter_kind()))
            .finish()
    }
}

/// Reads a provider config that a cluster points at. Configs live next to the cluster.
async fn read_config<K>(client: &dyn KubeClient, cluster: &Cluster, name: &str) -> Result<K>
where
    K: Resource<DynamicType = ()> + DeserializeOwned,
{
    let kind = K::kind(&()).into_owned();
    let namespace = cluster.metadata.namespace.as_deref().unwrap_or("default");
    debug!("Reading {} '{}/{}'", kind, namespace, name);
    Ok(get_object::<K>(client, Some(namespace), name)
        .await
        .context(error::ReadConfigSnafu {
            kind: &kind,
            name,
        })?
        .context(error::MissingConfigSnafu {
            kind: &kind,
            name,
            namespace,
        })?)
}

/// Reads the machine configs of kind `K` that the control plane, etcd and worker node groups
/// point at, by name.
async fn read_machine_configs<K>(
    client: &dyn KubeClient,
    cluster: &Cluster,
) -> Result<BTreeMap<String, K>>
where
    K: Resource<DynamicType = ()> + DeserializeOwned,
{
    let kind = K::kind(&()).into_owned();
    let mut configs = BTreeMap::new();
    for machine_ref in cluster.machine_config_refs() {
        if machine_ref.kind == kind {
            let config = read_config::<K>(client, cluster, &machine_ref.name).await?;
            configs.insert(machine_ref.name.clone(), config);
        }
    }
    Ok(configs)
}

/// The machine config that `machine_ref` points at, out of those returned by
/// [`read_machine_configs`]. `what` names the part of the cluster the reference belongs to.
fn machine_config<'a, K>(
    cluster: &Cluster,
    configs: &'a BTreeMap<String, K>,
    machine_ref: Option<&Ref>,
    what: &str,
) -> Result<&'a K>
where
    K: Resource<DynamicType = ()>,
{
    let machine_ref = machine_ref.context(error::MissingMachineGroupRefSnafu { what })?;
    Ok(configs
        .get(&machine_ref.name)
        .context(error::MissingConfigSnafu {
            kind: K::kind(&()),
            name: &machine_ref.name,
            namespace: cluster.metadata.namespace.as_deref().unwrap_or("default"),
        })?)
}

/// Renders the control plane objects shared by every provider around the provider's cluster and
/// machine templates. `etcd_template` is only used for clusters with an external etcd.
fn control_plane_yaml<C, M>(
    cluster: &Cluster,
    namespace: &str,
    provider_cluster: C,
    control_plane_template: M,
    etcd_template: Option<M>,
) -> Result<Vec<u8>>
where
    C: ApiObject,
    M: ApiObject,
{
    let capi_cluster =
        apibuilder::capi_cluster(cluster, namespace, object_reference(&provider_cluster));
    let kcp = apibuilder::kubeadm_control_plane(
        cluster,
        namespace,
        object_reference(&control_plane_template),
    );
    let etcd = etcd_template.as_ref().and_then(|template| {
        apibuilder::etcdadm_cluster(cluster, namespace, object_reference(template))
    });

    let mut objects: Vec<&dyn ApiObject> =
        vec![&capi_cluster, &provider_cluster, &kcp, &control_plane_template];
    if let (Some(etcd), Some(template)) = (&etcd, &etcd_template) {
        objects.push(etcd);
        objects.push(template);
    }
    Ok(yaml::to_yaml(&objects).context(error::GenerateSnafu {
        what: "control plane",
    })?)
}

/// Renders a kubeadm config template, a machine template and a machine deployment for every
/// worker node group.
fn workers_yaml<M, F>(
    cluster: &Cluster,
    namespace: &str,
    names: &WorkerTemplateNames,
    mut machine_template: F,
) -> Result<Vec<u8>>
where
    M: ApiObject,
    F: FnMut(&WorkerNodeGroupConfiguration, String) -> Result<M>,
{
    let mut objects: Vec<Box<dyn ApiObject>> = Vec::new();
    for group in &cluster.spec.worker_node_group_configurations {
        let kct = apibuilder::kubeadm_config_template(
            cluster,
            namespace,
            group,
            &names.kubeadm_config_template(cluster, &group.name),
        );
        let template = machine_template(group, names.machine_template(cluster, &group.name))?;
        let md = apibuilder::machine_deployment(
            cluster,
            namespace,
            group,
            &kct,
            object_reference(&template),
        );
        objects.push(Box::new(kct));
        objects.push(Box::new(template));
        objects.push(Box::new(md));
    }
    let objects: Vec<&dyn ApiObject> = objects.iter().map(|object| object.as_ref()).collect();
    Ok(yaml::to_yaml(&objects).context(error::GenerateSnafu { what: "workers" })?)
}
