use super::apply::{apply_objects, create_tolerating_existing};
use super::cni::reconcile_cni;
use super::context::{ClusterInterface, Context};
use super::ownership::{find_owned, worker_machine_deployments};
use super::patch::ClusterPatch;
use crate::constants::{no_requeue, requeue};
use crate::error::{self, aggregate, Result};
use futures::FutureExt;
use kube_runtime::controller::Action;
use log::{debug, error, info, trace};
use model::capi::{is_condition_true, Cluster as CapiCluster, KubeadmControlPlane};
use model::clients::{gvk_of, HttpStatusCode};
use model::clusterapi::name::machine_deployment_name;
use model::constants::{
    CONDITION_CONTROL_PLANE_INITIALIZED, CONDITION_CONTROL_PLANE_READY,
    CONDITION_DEFAULT_CNI_CONFIGURED, CONDITION_MANAGED_ETCD_READY, CONDITION_READY,
    CONDITION_WORKERS_READY, FINALIZER_CLUSTER,
};
use model::providers::extra_objects;
use model::{Cluster, CrdExt};
use snafu::ResultExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// `reconcile` is called when a `Cluster` changes, when one of its CAPI objects changes or when a
/// `Cluster` has been re-queued. This is the entrypoint to the controller logic.
///
/// Finalizer and status changes made along the way are written back on every exit path, and an
/// error while writing them is reported together with the error of the reconciliation itself.
pub(crate) async fn reconcile(cluster: Arc<Cluster>, context: Context) -> Result<Action> {
    let mut c = ClusterInterface::new(cluster.as_ref().clone(), context);
    trace!("Reconciling cluster '{}'", c.name());
    let patch = ClusterPatch::new(c.cluster());

    let outcome = AssertUnwindSafe(reconcile_cluster(&mut c))
        .catch_unwind()
        .await;
    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(_) => error::PanickedSnafu { name: c.name() }.fail(),
    };
    if let Err(e) = &outcome {
        error!("Failed to reconcile cluster '{}': {}", c.name(), e);
        c.cluster_mut().set_failure_message(Some(e.to_string()));
    }

    let patched = patch.apply(c.client(), c.cluster()).await;
    aggregate(c.name(), outcome, patched)
}

async fn reconcile_cluster(c: &mut ClusterInterface) -> Result<Action> {
    if c.cluster().is_delete_requested() {
        return reconcile_delete(c).await;
    }
    if c.cluster().is_reconcile_paused() {
        info!("Reconciliation of cluster '{}' is paused", c.name());
        return Ok(no_requeue());
    }
    if c.cluster().is_self_managed() {
        info!("Ignoring self managed cluster '{}'", c.name());
        return Ok(no_requeue());
    }

    c.add_finalizer(FINALIZER_CLUSTER);
    let action = reconcile_phases(c).await?;
    let generation = c.cluster().metadata.generation;
    let status = c.cluster_mut().status.get_or_insert_with(Default::default);
    status.observed_generation = generation;
    c.cluster_mut().set_failure_message(None);
    Ok(action)
}

/// Deletes the CAPI cluster, which takes the rest of the CAPI objects with it, then lets the
/// cluster go once the CAPI cluster is gone.
async fn reconcile_delete(c: &mut ClusterInterface) -> Result<Action> {
    if !c.cluster().has_finalizer(FINALIZER_CLUSTER) {
        trace!("Cluster '{}' is being deleted", c.name());
        return Ok(no_requeue());
    }
    if !c.cluster().is_self_managed() {
        let capi_cluster: Option<CapiCluster> =
            find_owned(c.client(), c.capi_namespace(), c.cluster()).await?;
        if let Some(capi_cluster) = capi_cluster {
            info!(
                "Deleting CAPI cluster '{}' of cluster '{}'",
                capi_cluster.object_name(),
                c.name()
            );
            match c
                .client()
                .delete(
                    &gvk_of::<CapiCluster>(),
                    capi_cluster.metadata.namespace.as_deref(),
                    capi_cluster.object_name(),
                )
                .await
            {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    return Err(e).context(error::DeleteSnafu {
                        kind: "Cluster",
                        name: capi_cluster.object_name(),
                    })
                }
            }
            // The deletion of the CAPI cluster triggers the next reconciliation.
            return Ok(no_requeue());
        }
    }
    info!("Removing finalizer from cluster '{}'", c.name());
    c.remove_finalizer(FINALIZER_CLUSTER);
    Ok(no_requeue())
}

/// Moves the cluster through its lifecycle: control plane, CNI, workers and auxiliary objects.
/// Each phase waits for the previous one to be ready. Waiting is a successful outcome, the
/// CAPI objects being watched, their next change triggers the next reconciliation.
async fn reconcile_phases(c: &mut ClusterInterface) -> Result<Action> {
    let context = c.context();
    let provider = context
        .providers()
        .for_cluster(c.cluster())
        .context(error::UnsupportedProviderSnafu)?;

    // Control plane objects.
    let capi_cluster: Option<CapiCluster> =
        find_owned(c.client(), c.capi_namespace(), c.cluster()).await?;
    let objects = provider
        .control_plane_objects(c.client(), c.cluster())
        .await
        .context(error::GenerateSnafu {
            what: "control plane",
            name: c.name(),
        })?;
    apply_objects(c.client(), &objects).await?;
    let capi_cluster = match capi_cluster {
        Some(capi_cluster) => capi_cluster,
        None => {
            info!("CAPI cluster of '{}' not found, requeuing", c.name());
            return Ok(requeue());
        }
    };

    if c.cluster().has_external_etcd() {
        if !is_condition_true(capi_cluster.conditions(), CONDITION_MANAGED_ETCD_READY) {
            info!("External etcd of cluster '{}' not ready", c.name());
            c.mark_waiting(
                CONDITION_MANAGED_ETCD_READY,
                "WaitingForExternalEtcd",
                format!("CAPI cluster '{}' etcd is not ready", capi_cluster.object_name()),
            );
            return Ok(no_requeue());
        }
        c.mark_true(CONDITION_MANAGED_ETCD_READY);
    }
    if !is_condition_true(capi_cluster.conditions(), CONDITION_CONTROL_PLANE_READY) {
        info!("Control plane of cluster '{}' not ready", c.name());
        c.mark_waiting(
            CONDITION_CONTROL_PLANE_READY,
            "WaitingForControlPlane",
            format!("CAPI cluster '{}' is not ready", capi_cluster.object_name()),
        );
        return Ok(no_requeue());
    }
    c.mark_true(CONDITION_CONTROL_PLANE_INITIALIZED);

    // CNI.
    let workload = c.workload_client().await?;
    reconcile_cni(workload.as_ref(), c.name(), c.config()).await?;
    c.mark_true(CONDITION_DEFAULT_CNI_CONFIGURED);

    // The control plane has to still be ready once the CNI is in.
    let capi_cluster: Option<CapiCluster> =
        find_owned(c.client(), c.capi_namespace(), c.cluster()).await?;
    let capi_cluster_ready = capi_cluster
        .as_ref()
        .map(|capi_cluster| {
            is_condition_true(capi_cluster.conditions(), CONDITION_CONTROL_PLANE_READY)
        })
        .unwrap_or(false);
    if !capi_cluster_ready {
        info!("Control plane of cluster '{}' not ready", c.name());
        return Ok(no_requeue());
    }

    let kcp: Option<KubeadmControlPlane> =
        find_owned(c.client(), c.capi_namespace(), c.cluster()).await?;
    let kcp = match kcp {
        Some(kcp) => kcp,
        None => {
            info!("Kubeadm control plane of '{}' not found, requeuing", c.name());
            return Ok(requeue());
        }
    };
    if !kcp.replicas_ready() {
        info!(
            "Kubeadm control plane replicas of cluster '{}' not ready",
            c.name()
        );
        c.mark_waiting(
            CONDITION_CONTROL_PLANE_READY,
            "WaitingForControlPlaneReplicas",
            format!(
                "kubeadm control plane '{}' replicas are not ready",
                kcp.object_name()
            ),
        );
        return Ok(no_requeue());
    }
    c.mark_true(CONDITION_CONTROL_PLANE_READY);

    // Workers.
    let machine_deployments =
        worker_machine_deployments(c.client(), c.capi_namespace(), c.cluster()).await?;
    let missing: Vec<String> = c
        .cluster()
        .spec
        .worker_node_group_configurations
        .iter()
        .map(|group| machine_deployment_name(c.cluster(), group))
        .filter(|name| {
            !machine_deployments
                .iter()
                .any(|md| md.object_name() == name.as_str())
        })
        .collect();
    let objects = provider
        .worker_objects(c.client(), c.cluster())
        .await
        .context(error::GenerateSnafu {
            what: "worker",
            name: c.name(),
        })?;
    apply_objects(c.client(), &objects).await?;
    if !missing.is_empty() {
        info!(
            "Machine deployments {:?} of cluster '{}' created, requeuing",
            missing,
            c.name()
        );
        return Ok(requeue());
    }
    if let Some(md) = machine_deployments.iter().find(|md| !md.is_ready()) {
        info!(
            "Worker machine deployment '{}' of cluster '{}' not ready",
            md.object_name(),
            c.name()
        );
        c.mark_waiting(
            CONDITION_WORKERS_READY,
            "WaitingForWorkers",
            format!("machine deployment '{}' is not ready", md.object_name()),
        );
        return Ok(no_requeue());
    }
    c.mark_true(CONDITION_WORKERS_READY);

    // Auxiliary objects.
    let objects = extra_objects(c.cluster()).context(error::GenerateSnafu {
        what: "extra",
        name: c.name(),
    })?;
    create_tolerating_existing(workload.as_ref(), &objects).await?;

    c.mark_true(CONDITION_READY);
    debug!("Cluster '{}' reconciled", c.name());
    Ok(no_requeue())
}
