/*!

Names of the generated CAPI objects, and the rename-or-reuse rule for the kinds that cannot be
changed after they are created.

Immutable objects (machine templates, kubeadm config templates) are named `<base>-<n>`. When the
desired spec of such an object differs from the one currently referenced, a new object named
`<base>-<n+1>` is created and the referencing object is pointed at it. The old object is left for
someone else to clean up.

!*/

use super::error::{self, Result};
use crate::clients::{self, get_object, KubeClient};
use crate::cluster::WorkerNodeGroupConfiguration;
use crate::yaml::ApiObject;
use crate::{Cluster, CrdExt};
use kube::Resource;
use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use serde::de::DeserializeOwned;
use snafu::{OptionExt, ResultExt};
use std::collections::BTreeMap;

lazy_static! {
    static ref NAME_REGEX: Regex = {
        #[allow(clippy::unwrap_used)]
        Regex::new(r"^(.*)-(\d+)$").unwrap()
    };
}

/// `<base>-<version>`
pub fn object_name(base: &str, version: u64) -> String {
    format!("{}-{}", base, version)
}

/// The name of the first version of an immutable object.
pub fn default_object_name(base: &str) -> String {
    object_name(base, 1)
}

/// Turns `<base>-<n>` into `<base>-<n+1>`.
pub fn increment_name(name: &str) -> Result<String> {
    let captures = NAME_REGEX
        .captures(name)
        .context(error::InvalidNameSnafu { name })?;
    let base = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
    let version = captures
        .get(2)
        .and_then(|m| m.as_str().parse::<u64>().ok())
        .and_then(|v| v.checked_add(1))
        .context(error::InvalidNameSnafu { name })?;
    Ok(object_name(base, version))
}

/// Like [`increment_name`], but falls back to `default_name` when `name` is empty or has no
/// version suffix.
pub fn increment_name_with_fallback_default(name: &str, default_name: &str) -> String {
    if name.is_empty() {
        return default_name.to_string();
    }
    increment_name(name).unwrap_or_else(|_| default_name.to_string())
}

pub fn kubeadm_control_plane_name(cluster: &Cluster) -> String {
    cluster_name(cluster).to_string()
}

pub fn machine_deployment_name(cluster: &Cluster, group: &WorkerNodeGroupConfiguration) -> String {
    format!("{}-{}", cluster_name(cluster), group.name)
}

pub fn default_kubeadm_config_template_name(
    cluster: &Cluster,
    group: &WorkerNodeGroupConfiguration,
) -> String {
    default_object_name(&machine_deployment_name(cluster, group))
}

pub fn worker_machine_template_name(
    cluster: &Cluster,
    group: &WorkerNodeGroupConfiguration,
) -> String {
    default_object_name(&machine_deployment_name(cluster, group))
}

pub fn control_plane_machine_template_name(cluster: &Cluster) -> String {
    default_object_name(&format!("{}-control-plane", cluster_name(cluster)))
}

pub fn etcd_machine_template_name(cluster: &Cluster) -> String {
    default_object_name(&format!("{}-etcd", cluster_name(cluster)))
}

pub fn etcdadm_cluster_name(cluster: &Cluster) -> String {
    format!("{}-etcd", cluster_name(cluster))
}

pub fn cluster_ca_secret_name(cluster_name: &str) -> String {
    format!("{}-ca", cluster_name)
}

pub fn cluster_kubeconfig_secret_name(cluster_name: &str) -> String {
    format!("{}-kubeconfig", cluster_name)
}

/// The names that the templates of each worker node group get when they are first created.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct WorkerTemplateNames {
    /// Kubeadm config template names by worker node group name.
    pub kubeadm_config_templates: BTreeMap<String, String>,
    /// Provider machine template names by worker node group name.
    pub machine_templates: BTreeMap<String, String>,
}

impl WorkerTemplateNames {
    pub fn kubeadm_config_template(&self, cluster: &Cluster, group: &str) -> String {
        self.kubeadm_config_templates
            .get(group)
            .cloned()
            .unwrap_or_else(|| default_object_name(&format!("{}-{}", cluster_name(cluster), group)))
    }

    pub fn machine_template(&self, cluster: &Cluster, group: &str) -> String {
        self.machine_templates
            .get(group)
            .cloned()
            .unwrap_or_else(|| default_object_name(&format!("{}-{}", cluster_name(cluster), group)))
    }
}

pub fn initial_template_names_for_workers(cluster: &Cluster) -> WorkerTemplateNames {
    let mut names = WorkerTemplateNames::default();
    for group in &cluster.spec.worker_node_group_configurations {
        names.kubeadm_config_templates.insert(
            group.name.clone(),
            default_kubeadm_config_template_name(cluster, group),
        );
        names.machine_templates.insert(
            group.name.clone(),
            worker_machine_template_name(cluster, group),
        );
    }
    names
}

fn cluster_name(cluster: &Cluster) -> &str {
    cluster.object_name()
}

/// Fetches the live version of an immutable object.
#[async_trait::async_trait]
pub trait ObjectRetriever<T>: Send + Sync
where
    T: ApiObject,
{
    /// `Ok(None)` if the object does not exist.
    async fn retrieve(
        &self,
        client: &dyn KubeClient,
        name: &str,
        namespace: &str,
    ) -> clients::Result<Option<T>>;
}

/// Retrieves objects from the API server with a plain get.
#[derive(Clone, Copy, Debug, Default)]
pub struct ApiRetriever;

#[async_trait::async_trait]
impl<T> ObjectRetriever<T> for ApiRetriever
where
    T: ApiObject + Resource<DynamicType = ()> + DeserializeOwned,
{
    async fn retrieve(
        &self,
        client: &dyn KubeClient,
        name: &str,
        namespace: &str,
    ) -> clients::Result<Option<T>> {
        get_object::<T>(client, Some(namespace), name).await
    }
}

/// Decides whether a desired object (first) is equivalent to a live one (second).
pub type ObjectComparator<T> = fn(&T, &T) -> bool;

/// Gives `object` a new name if a live object with its current name exists and is not equal to
/// it. If no such object exists, or it is equal, the name is left as is.
pub async fn ensure_new_name_if_changed<T>(
    client: &dyn KubeClient,
    retriever: &dyn ObjectRetriever<T>,
    equal: ObjectComparator<T>,
    object: &mut T,
) -> Result<()>
where
    T: ApiObject,
{
    let kind = object.kind().into_owned();
    let name = object.name().to_string();
    let namespace = object.namespace().to_string();

    let current = retriever
        .retrieve(client, &name, &namespace)
        .await
        .context(error::ReadObjectSnafu {
            kind: &kind,
            namespace: &namespace,
            name: &name,
        })?;
    let current = match current {
        Some(current) => current,
        None => return Ok(()),
    };
    if equal(object, &current) {
        return Ok(());
    }

    let new_name = increment_name(&name).context(error::IncrementNameSnafu {
        kind: &kind,
        namespace: &namespace,
        name: &name,
    })?;
    debug!(
        "{} {}/{} changed, renaming it to '{}'",
        kind, namespace, name, new_name
    );
    object.metadata_mut().name = Some(new_name);
    Ok(())
}
