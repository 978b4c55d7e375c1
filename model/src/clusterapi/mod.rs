/*!

The CAPI objects that make up a cluster, grouped into a [`ControlPlane`] and [`Workers`]. The
aggregates are generic over the provider's infrastructure cluster kind (`C`) and machine template
kind (`M`), so the same code serves every provider.

!*/

pub mod apibuilder;
mod builders;
pub mod equality;
mod error;
pub mod name;

pub use builders::{
    new_control_plane_parser_and_builder, new_workers_parser_and_builder,
    register_control_plane_mappings, register_worker_mappings, ControlPlaneBuilder,
    WorkersBuilder,
};
pub use error::{Error, Result};

use crate::capi::{
    Cluster as CapiCluster, EtcdadmCluster, KubeadmConfigTemplate, KubeadmControlPlane,
    MachineDeployment,
};
use crate::clients::{get_object, KubeClient};
use crate::yaml::ApiObject;
use equality::semantic_derivative;
use name::{ensure_new_name_if_changed, ApiRetriever, ObjectComparator, ObjectRetriever};
use snafu::ResultExt;

/// The objects that make up a control plane. `provider_cluster`, the kubeadm control plane and the
/// machine templates are only set if `cluster` is, the etcd fields only if the cluster has an
/// external etcd.
#[derive(Clone, Debug)]
pub struct ControlPlane<C, M> {
    pub cluster: Option<CapiCluster>,
    pub provider_cluster: Option<C>,
    pub kubeadm_control_plane: Option<KubeadmControlPlane>,
    pub control_plane_machine_template: Option<M>,
    pub etcd_cluster: Option<EtcdadmCluster>,
    pub etcd_machine_template: Option<M>,
}

impl<C, M> Default for ControlPlane<C, M> {
    fn default() -> Self {
        Self {
            cluster: None,
            provider_cluster: None,
            kubeadm_control_plane: None,
            control_plane_machine_template: None,
            etcd_cluster: None,
            etcd_machine_template: None,
        }
    }
}

impl<C, M> ControlPlane<C, M>
where
    C: ApiObject,
    M: ApiObject,
{
    /// Every object that is set, in creation order.
    pub fn objects(&self) -> Vec<&dyn ApiObject> {
        let mut objects: Vec<&dyn ApiObject> = Vec::new();
        push(&mut objects, &self.cluster);
        push(&mut objects, &self.provider_cluster);
        push(&mut objects, &self.kubeadm_control_plane);
        push(&mut objects, &self.control_plane_machine_template);
        push(&mut objects, &self.etcd_cluster);
        push(&mut objects, &self.etcd_machine_template);
        objects
    }

    /// Points the kubeadm control plane and the etcd cluster at the machine templates they use
    /// today, and gives the templates new names where their spec changed.
    pub async fn update_immutable_object_names(
        &mut self,
        client: &dyn KubeClient,
        machine_template_retriever: &dyn ObjectRetriever<M>,
        machine_template_comparator: ObjectComparator<M>,
    ) -> Result<()> {
        let kcp = match &mut self.kubeadm_control_plane {
            Some(kcp) => kcp,
            None => return Ok(()),
        };
        let current: Option<KubeadmControlPlane> =
            get_object(client, Some(kcp.namespace()), kcp.name())
                .await
                .context(error::ReadCurrentSnafu {
                    what: "kubeadm control plane",
                })?;
        let current = match current {
            Some(current) => current,
            None => return Ok(()),
        };
        if let Some(template) = &mut self.control_plane_machine_template {
            template.metadata_mut().name =
                Some(current.spec.machine_template.infrastructure_ref.name);
            ensure_new_name_if_changed(
                client,
                machine_template_retriever,
                machine_template_comparator,
                template,
            )
            .await
            .context(error::UpdateNameSnafu {
                what: "control plane machine template",
            })?;
            kcp.spec.machine_template.infrastructure_ref.name = template.name().to_string();
        }

        let etcd = match &mut self.etcd_cluster {
            Some(etcd) => etcd,
            None => return Ok(()),
        };
        let current: Option<EtcdadmCluster> =
            get_object(client, Some(etcd.namespace()), etcd.name())
                .await
                .context(error::ReadCurrentSnafu {
                    what: "etcdadm cluster",
                })?;
        let current = match current {
            Some(current) => current,
            None => return Ok(()),
        };
        if let Some(template) = &mut self.etcd_machine_template {
            template.metadata_mut().name = Some(current.spec.infrastructure_template.name);
            ensure_new_name_if_changed(
                client,
                machine_template_retriever,
                machine_template_comparator,
                template,
            )
            .await
            .context(error::UpdateNameSnafu {
                what: "etcd machine template",
            })?;
            etcd.spec.infrastructure_template.name = template.name().to_string();
        }
        Ok(())
    }
}

/// The objects of a single worker node group.
#[derive(Clone, Debug)]
pub struct WorkerGroup<M> {
    pub machine_deployment: MachineDeployment,
    pub kubeadm_config_template: Option<KubeadmConfigTemplate>,
    pub provider_machine_template: Option<M>,
}

impl<M> WorkerGroup<M>
where
    M: ApiObject,
{
    pub fn objects(&self) -> Vec<&dyn ApiObject> {
        let mut objects: Vec<&dyn ApiObject> = Vec::new();
        push(&mut objects, &self.kubeadm_config_template);
        push(&mut objects, &self.provider_machine_template);
        objects.push(&self.machine_deployment);
        objects
    }

    /// Points the machine deployment at the templates it uses today, and gives the templates new
    /// names where their spec changed.
    pub async fn update_immutable_object_names(
        &mut self,
        client: &dyn KubeClient,
        machine_template_retriever: &dyn ObjectRetriever<M>,
        machine_template_comparator: ObjectComparator<M>,
    ) -> Result<()> {
        let md = &mut self.machine_deployment;
        let current: Option<MachineDeployment> =
            get_object(client, Some(md.namespace()), md.name())
                .await
                .context(error::ReadCurrentSnafu {
                    what: "machine deployment",
                })?;
        let current = match current {
            Some(current) => current,
            None => return Ok(()),
        };

        if let Some(template) = &mut self.provider_machine_template {
            template.metadata_mut().name =
                Some(current.spec.template.spec.infrastructure_ref.name.clone());
            ensure_new_name_if_changed(
                client,
                machine_template_retriever,
                machine_template_comparator,
                template,
            )
            .await
            .context(error::UpdateNameSnafu {
                what: "worker machine template",
            })?;
            md.spec.template.spec.infrastructure_ref.name = template.name().to_string();
        }

        let current_config_ref = current.spec.template.spec.bootstrap.config_ref;
        if let (Some(template), Some(current_config_ref)) =
            (&mut self.kubeadm_config_template, current_config_ref)
        {
            template.metadata_mut().name = Some(current_config_ref.name);
            ensure_new_name_if_changed(
                client,
                &ApiRetriever,
                kubeadm_config_template_equal,
                template,
            )
            .await
            .context(error::UpdateNameSnafu {
                what: "kubeadm config template",
            })?;
            if let Some(config_ref) = &mut md.spec.template.spec.bootstrap.config_ref {
                config_ref.name = template.name().to_string();
            }
        }
        Ok(())
    }
}

/// The worker node groups of a cluster. Group order is not meaningful.
#[derive(Clone, Debug)]
pub struct Workers<M> {
    pub groups: Vec<WorkerGroup<M>>,
}

impl<M> Default for Workers<M> {
    fn default() -> Self {
        Self { groups: Vec::new() }
    }
}

impl<M> Workers<M>
where
    M: ApiObject,
{
    pub fn worker_objects(&self) -> Vec<&dyn ApiObject> {
        self.groups.iter().flat_map(WorkerGroup::objects).collect()
    }

    pub async fn update_immutable_object_names(
        &mut self,
        client: &dyn KubeClient,
        machine_template_retriever: &dyn ObjectRetriever<M>,
        machine_template_comparator: ObjectComparator<M>,
    ) -> Result<()> {
        for group in &mut self.groups {
            group
                .update_immutable_object_names(
                    client,
                    machine_template_retriever,
                    machine_template_comparator,
                )
                .await?;
        }
        Ok(())
    }
}

/// Kubeadm config templates are equal when the live spec derives from the desired one.
pub fn kubeadm_config_template_equal(
    new: &KubeadmConfigTemplate,
    old: &KubeadmConfigTemplate,
) -> bool {
    semantic_derivative(&new.spec, &old.spec)
}

fn push<'a, T: ApiObject>(objects: &mut Vec<&'a dyn ApiObject>, object: &'a Option<T>) {
    if let Some(object) = object {
        objects.push(object);
    }
}
