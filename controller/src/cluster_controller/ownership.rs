//! The ownership labels stamped on generated CAPI objects are the index from a CAPI object back to
//! the cluster it was generated for. CAPI objects are watched, and their events are turned into
//! reconciliations of the owning cluster. The same labels are used to find the CAPI objects of a
//! cluster.

use crate::error::{self, Result};
use kube::Resource;
use kube_runtime::reflector::ObjectRef;
use log::debug;
use model::capi::MachineDeployment;
use model::clients::{label_selector, list_objects, KubeClient};
use model::constants::{
    LABEL_CLUSTER_NAME, LABEL_CLUSTER_NAMESPACE, LABEL_MACHINE_DEPLOYMENT_TYPE,
    MACHINE_DEPLOYMENT_TYPE_WORKERS,
};
use model::{Cluster, CrdExt};
use serde::de::DeserializeOwned;
use snafu::{ensure, ResultExt};

/// The cluster that owns `object`, if any. Objects without the ownership label are not managed by
/// this controller.
pub(crate) fn owning_cluster<K>(object: &K) -> Option<ObjectRef<Cluster>>
where
    K: Resource<DynamicType = ()>,
{
    let cluster_name = match object.label(LABEL_CLUSTER_NAME) {
        Some(name) => name,
        None => {
            debug!(
                "Ignoring {} '{}', it is not managed by a cluster",
                K::kind(&()),
                object.object_name()
            );
            return None;
        }
    };
    let namespace = object
        .label(LABEL_CLUSTER_NAMESPACE)
        .unwrap_or_else(|| object.object_namespace());
    Some(ObjectRef::new(cluster_name).within(namespace))
}

fn ownership_selector(cluster: &Cluster) -> Vec<(&str, &str)> {
    vec![
        (LABEL_CLUSTER_NAME, cluster.object_name()),
        (LABEL_CLUSTER_NAMESPACE, cluster.object_namespace()),
    ]
}

/// Finds the one object of kind `K` generated for `cluster`. More than one match is an error, the
/// object is never picked at random.
pub(crate) async fn find_owned<K>(
    client: &dyn KubeClient,
    namespace: &str,
    cluster: &Cluster,
) -> Result<Option<K>>
where
    K: Resource<DynamicType = ()> + DeserializeOwned,
{
    let kind = K::kind(&()).into_owned();
    let mut objects: Vec<K> = list_objects(
        client,
        Some(namespace),
        Some(&label_selector(ownership_selector(cluster))),
    )
    .await
    .context(error::ReadSnafu {
        what: &kind,
        name: cluster.object_name(),
    })?;
    ensure!(
        objects.len() < 2,
        error::AmbiguousSnafu {
            kind,
            cluster_name: cluster.object_name(),
            count: objects.len(),
        }
    );
    Ok(objects.pop())
}

/// The machine deployments of the worker node groups of `cluster`.
pub(crate) async fn worker_machine_deployments(
    client: &dyn KubeClient,
    namespace: &str,
    cluster: &Cluster,
) -> Result<Vec<MachineDeployment>> {
    let mut selector = ownership_selector(cluster);
    selector.push((
        LABEL_MACHINE_DEPLOYMENT_TYPE,
        MACHINE_DEPLOYMENT_TYPE_WORKERS,
    ));
    list_objects(client, Some(namespace), Some(&label_selector(selector)))
        .await
        .context(error::ReadSnafu {
            what: "worker machine deployments",
            name: cluster.object_name(),
        })
}
