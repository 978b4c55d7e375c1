use crate::cluster_controller::context::{new_context, Context};
use crate::cluster_controller::ownership::owning_cluster;
use crate::cluster_controller::reconcile::reconcile;
use crate::cluster_controller::remote::KubeconfigSecretClients;
use crate::config::ControllerConfig;
use crate::constants::requeue;
use crate::error::Error;
use futures::StreamExt;
use kube::api::ListParams;
use kube::Api;
use kube_runtime::controller::Action;
use kube_runtime::{controller, Controller};
use log::{debug, error, info};
use model::capi::{Cluster as CapiCluster, KubeadmControlPlane, MachineDeployment};
use model::clients::KubeApiClient;
use model::providers::Providers;
use model::{Cluster, CrdExt};
use std::sync::Arc;

mod apply;
mod cni;
mod context;
mod ownership;
mod patch;
mod reconcile;
mod remote;

/// Watches `Cluster` objects everywhere, and the CAPI objects generated for them in the CAPI
/// namespace. Events on CAPI objects are mapped to the cluster named by their ownership label.
pub(super) async fn run_cluster_controller(client: kube::Client, config: ControllerConfig) {
    let capi_namespace = config.capi_namespace.clone();
    info!("Watching CAPI objects in namespace '{}'", capi_namespace);
    let context = new_context(
        Arc::new(KubeApiClient::new(client.clone())),
        Providers::new(&capi_namespace),
        Box::new(KubeconfigSecretClients),
        config,
    );

    Controller::new(Api::<Cluster>::all(client.clone()), ListParams::default())
        .watches(
            Api::<CapiCluster>::namespaced(client.clone(), &capi_namespace),
            ListParams::default(),
            |object| owning_cluster(&object),
        )
        .watches(
            Api::<KubeadmControlPlane>::namespaced(client.clone(), &capi_namespace),
            ListParams::default(),
            |object| owning_cluster(&object),
        )
        .watches(
            Api::<MachineDeployment>::namespaced(client, &capi_namespace),
            ListParams::default(),
            |object| owning_cluster(&object),
        )
        .run(reconcile, handle_reconciliation_error, context)
        .for_each(|reconciliation_result| async move {
            if let Err(reconciliation_err) = reconciliation_result {
                match &reconciliation_err {
                    controller::Error::ObjectNotFound { .. } => {
                        debug!("Object is gone: {}", reconciliation_err)
                    }
                    _ => error!("Error during reconciliation: {}", reconciliation_err),
                }
            }
        })
        .await;
}

/// `handle_reconciliation_error` is called when `reconcile` returns an error.
fn handle_reconciliation_error(cluster: Arc<Cluster>, e: &Error, _: Context) -> Action {
    error!(
        "Reconciliation error for cluster '{}': {}",
        cluster.object_name(),
        e
    );
    requeue()
}
