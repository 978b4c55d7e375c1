use crate::error::{self, Result};
use log::trace;
use model::clients::{gvk_of, HttpStatusCode, KubeClient};
use model::{Cluster, CrdExt};
use serde_json::{json, Map, Value};
use snafu::ResultExt;

/// Remembers the finalizers and status of a cluster as they were read so that only what
/// reconciliation changed is written back.
#[derive(Debug, Clone)]
pub(crate) struct ClusterPatch {
    finalizers: Option<Vec<String>>,
    status: Value,
}

impl ClusterPatch {
    pub(crate) fn new(cluster: &Cluster) -> Self {
        Self {
            finalizers: cluster.metadata.finalizers.clone(),
            status: status_value(cluster),
        }
    }

    /// Writes the changes made to `cluster` since it was read. The status goes first: once the
    /// last finalizer is removed the cluster may be gone.
    pub(crate) async fn apply(&self, client: &dyn KubeClient, cluster: &Cluster) -> Result<()> {
        let gvk = gvk_of::<Cluster>();
        let name = cluster.object_name();
        let namespace = cluster.metadata.namespace.as_deref();

        if let Some(status) = merge_diff(&self.status, &status_value(cluster)) {
            trace!("Patching status of cluster '{}': {}", name, status);
            match client
                .merge_patch_status(&gvk, namespace, name, &json!({ "status": status }))
                .await
            {
                Ok(_) => {}
                Err(e) if e.is_not_found() && cluster.is_delete_requested() => {
                    trace!("Cluster '{}' is already gone", name);
                    return Ok(());
                }
                Err(e) => return Err(e).context(error::PatchSnafu { name }),
            }
        }

        if self.finalizers != cluster.metadata.finalizers {
            trace!("Patching finalizers of cluster '{}'", name);
            let finalizers = cluster.metadata.finalizers.clone().unwrap_or_default();
            client
                .merge_patch(
                    &gvk,
                    namespace,
                    name,
                    &json!({ "metadata": { "finalizers": finalizers } }),
                )
                .await
                .context(error::PatchSnafu { name })?;
        }
        Ok(())
    }
}

fn status_value(cluster: &Cluster) -> Value {
    serde_json::to_value(&cluster.status).unwrap_or(Value::Null)
}

/// A JSON merge patch (RFC 7386) that turns `old` into `new`, `None` if they are equal. Fields
/// missing from `new` are removed with `null`.
fn merge_diff(old: &Value, new: &Value) -> Option<Value> {
    if old == new {
        return None;
    }
    let (old_fields, new_fields) = match (old, new) {
        (Value::Object(old_fields), Value::Object(new_fields)) => (old_fields, new_fields),
        _ => return Some(new.clone()),
    };
    let mut patch = Map::new();
    for (key, new_value) in new_fields {
        match old_fields.get(key) {
            None => {
                patch.insert(key.clone(), new_value.clone());
            }
            Some(old_value) => {
                if let Some(diff) = merge_diff(old_value, new_value) {
                    patch.insert(key.clone(), diff);
                }
            }
        }
    }
    for key in old_fields.keys() {
        if !new_fields.contains_key(key) {
            patch.insert(key.clone(), Value::Null);
        }
    }
    Some(Value::Object(patch))
}

#[cfg(test)]
mod test {
    use super::*;
    use model::capi::Condition;
    use model::clients::fake::{FakeClient, Method};
    use model::constants::{CONDITION_READY, FINALIZER_CLUSTER};
    use model::ClusterSpec;

    fn cluster() -> Cluster {
        let mut cluster = Cluster::new("my-cluster", ClusterSpec::default());
        cluster.metadata.namespace = Some("default".to_string());
        cluster
    }

    #[test]
    fn diff_of_nested_objects() {
        let old = json!({"a": 1, "b": {"c": 2, "d": 3}, "e": [1]});
        let new = json!({"a": 1, "b": {"c": 4}, "e": [1, 2], "f": "x"});
        assert_eq!(
            merge_diff(&old, &new).unwrap(),
            json!({"b": {"c": 4, "d": null}, "e": [1, 2], "f": "x"})
        );
        assert!(merge_diff(&old, &old).is_none());
        assert_eq!(merge_diff(&json!(null), &json!({"a": 1})).unwrap(), json!({"a": 1}));
    }

    #[tokio::test]
    async fn only_changes_are_written() {
        let client = FakeClient::new("management");
        let mut cluster = cluster();
        client.add(&cluster).unwrap();

        let patch = ClusterPatch::new(&cluster);
        patch.apply(&client, &cluster).await.unwrap();
        assert!(client.calls().is_empty());

        cluster.set_failure_message(Some("boom".to_string()));
        cluster.set_condition(Condition::new_true(CONDITION_READY));
        cluster
            .metadata
            .finalizers
            .get_or_insert_with(Vec::new)
            .push(FINALIZER_CLUSTER.to_string());
        patch.apply(&client, &cluster).await.unwrap();
        let methods: Vec<Method> = client.calls().into_iter().map(|c| c.method).collect();
        assert_eq!(methods, vec![Method::PatchStatus, Method::Patch]);

        let live: Cluster = client
            .object(&gvk_of::<Cluster>(), "default", "my-cluster")
            .unwrap();
        assert_eq!(live.failure_message(), Some("boom"));
        assert!(live.has_finalizer(FINALIZER_CLUSTER));

        // Clearing the failure message removes it from the live status.
        let patch = ClusterPatch::new(&live);
        let mut cleared = live.clone();
        cleared.set_failure_message(None);
        patch.apply(&client, &cleared).await.unwrap();
        let live: Cluster = client
            .object(&gvk_of::<Cluster>(), "default", "my-cluster")
            .unwrap();
        assert!(live.failure_message().is_none());
        assert_eq!(live.conditions().len(), 1);
    }

    #[tokio::test]
    async fn patch_failures_are_reported() {
        let client = FakeClient::new("management");
        let mut cluster = cluster();
        client.add(&cluster).unwrap();
        let patch = ClusterPatch::new(&cluster);
        client.fail_on(Method::PatchStatus);
        cluster.set_failure_message(Some("boom".to_string()));
        let error = patch.apply(&client, &cluster).await.unwrap_err();
        assert!(matches!(error, crate::error::Error::Patch { .. }));
    }
}
