use super::remote::WorkloadClients;
use crate::config::ControllerConfig;
use crate::error::Result;
use model::capi::Condition;
use model::clients::KubeClient;
use model::constants::CONDITION_READY;
use model::providers::Providers;
use model::{Cluster, CrdExt};
use std::sync::Arc;

/// This is used by `kube-runtime` to pass any custom information we need when [`reconcile`] is
/// called.
///
/// [`reconcile`]: super::reconcile::reconcile
pub(crate) type Context = Arc<ContextData>;

pub(crate) fn new_context(
    client: Arc<dyn KubeClient>,
    providers: Providers,
    workload_clients: Box<dyn WorkloadClients>,
    config: ControllerConfig,
) -> Context {
    Arc::new(ContextData {
        client,
        providers,
        workload_clients,
        config,
    })
}

/// Contains the information we need during [`reconcile`].
///
/// [`reconcile`]: super::reconcile::reconcile
pub(crate) struct ContextData {
    /// The management cluster, where the `Cluster` objects and their CAPI objects live.
    client: Arc<dyn KubeClient>,
    providers: Providers,
    workload_clients: Box<dyn WorkloadClients>,
    config: ControllerConfig,
}

impl ContextData {
    pub(crate) fn providers(&self) -> &Providers {
        &self.providers
    }
}

/// The [`reconcile`] function has a [`Cluster`] and [`Context`] as its inputs. For convenience, we
/// combine these and provide accessor and helper functions. Changes made to the cluster's
/// finalizers and status are written back once reconciliation is over.
///
/// [`reconcile`]: super::reconcile::reconcile
pub(crate) struct ClusterInterface {
    cluster: Cluster,
    context: Context,
}

impl ClusterInterface {
    pub(crate) fn new(cluster: Cluster, context: Context) -> Self {
        Self { cluster, context }
    }

    pub(crate) fn name(&self) -> &str {
        self.cluster.object_name()
    }

    pub(crate) fn cluster(&self) -> &Cluster {
        &self.cluster
    }

    pub(crate) fn cluster_mut(&mut self) -> &mut Cluster {
        &mut self.cluster
    }

    pub(crate) fn client(&self) -> &dyn KubeClient {
        self.context.client.as_ref()
    }

    /// The shared context. Borrows taken from it do not hold on to the cluster.
    pub(crate) fn context(&self) -> Context {
        Arc::clone(&self.context)
    }

    pub(crate) fn config(&self) -> &ControllerConfig {
        &self.context.config
    }

    /// The namespace of the generated CAPI objects.
    pub(crate) fn capi_namespace(&self) -> &str {
        &self.context.config.capi_namespace
    }

    /// A client for the cluster being reconciled.
    pub(crate) async fn workload_client(&self) -> Result<Arc<dyn KubeClient>> {
        self.context
            .workload_clients
            .client_for(self.client(), &self.cluster, self.capi_namespace())
            .await
    }

    pub(crate) fn add_finalizer(&mut self, finalizer: &str) {
        if !self.cluster.has_finalizer(finalizer) {
            self.cluster
                .metadata
                .finalizers
                .get_or_insert_with(Vec::new)
                .push(finalizer.to_string());
        }
    }

    pub(crate) fn remove_finalizer(&mut self, finalizer: &str) {
        if let Some(finalizers) = self.cluster.metadata.finalizers.as_mut() {
            finalizers.retain(|item| item != finalizer);
        }
    }

    pub(crate) fn mark_true(&mut self, condition_type: &str) {
        self.cluster.set_condition(Condition::new_true(condition_type));
    }

    /// Marks `condition_type` and the overall readiness of the cluster as false.
    pub(crate) fn mark_waiting(&mut self, condition_type: &str, reason: &str, message: String) {
        self.cluster.set_condition(Condition::new_false(
            condition_type,
            reason,
            Some(message.clone()),
        ));
        if condition_type != CONDITION_READY {
            self.cluster
                .set_condition(Condition::new_false(CONDITION_READY, reason, Some(message)));
        }
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::cluster_controller::remote::test::FakeWorkloadClients;
    use model::clients::fake::FakeClient;
    use model::constants::FINALIZER_CLUSTER;
    use model::ClusterSpec;

    /// A context around a fake management cluster whose workload clusters are all `workload`.
    pub(crate) fn fake_context(management: Arc<FakeClient>, workload: Arc<FakeClient>) -> Context {
        new_context(
            management,
            Providers::new(model::constants::NAMESPACE),
            Box::new(FakeWorkloadClients::new(workload)),
            ControllerConfig::default(),
        )
    }

    #[test]
    fn finalizers_are_added_once() {
        let management = Arc::new(FakeClient::new("management"));
        let workload = Arc::new(FakeClient::new("workload"));
        let mut c = ClusterInterface::new(
            Cluster::new("c", ClusterSpec::default()),
            fake_context(management, workload),
        );
        c.add_finalizer(FINALIZER_CLUSTER);
        c.add_finalizer(FINALIZER_CLUSTER);
        assert_eq!(
            c.cluster().metadata.finalizers,
            Some(vec![FINALIZER_CLUSTER.to_string()])
        );
        c.remove_finalizer(FINALIZER_CLUSTER);
        assert!(!c.cluster().has_finalizer(FINALIZER_CLUSTER));
    }

    #[test]
    fn waiting_also_marks_the_cluster_not_ready() {
        let management = Arc::new(FakeClient::new("management"));
        let workload = Arc::new(FakeClient::new("workload"));
        let mut c = ClusterInterface::new(
            Cluster::new("c", ClusterSpec::default()),
            fake_context(management, workload),
        );
        c.mark_waiting(
            model::constants::CONDITION_WORKERS_READY,
            "WaitingForWorkers",
            "md-0 is not ready".to_string(),
        );
        let conditions = c.cluster().conditions();
        assert_eq!(conditions.len(), 2);
        assert!(conditions.iter().all(|condition| !condition.is_true()));
        c.mark_true(CONDITION_READY);
        assert!(model::capi::is_condition_true(
            c.cluster().conditions(),
            CONDITION_READY
        ));
    }
}
