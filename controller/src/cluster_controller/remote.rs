use crate::error::{self, Result};
use k8s_openapi::api::core::v1::Secret;
use kube::config::{KubeConfigOptions, Kubeconfig};
use log::debug;
use model::clients::{get_object, KubeApiClient, KubeClient};
use model::clusterapi::name::cluster_kubeconfig_secret_name;
use model::constants::KUBECONFIG_SECRET_KEY;
use model::{Cluster, CrdExt};
use snafu::{OptionExt, ResultExt};
use std::sync::Arc;

/// Creates clients for the clusters managed by the controller.
#[async_trait::async_trait]
pub(crate) trait WorkloadClients: Send + Sync {
    /// A client for `cluster`, whose CAPI objects live in `namespace` of the `management` cluster.
    async fn client_for(
        &self,
        management: &dyn KubeClient,
        cluster: &Cluster,
        namespace: &str,
    ) -> Result<Arc<dyn KubeClient>>;
}

/// Connects to a workload cluster with the admin kubeconfig that CAPI writes to the
/// `<cluster>-kubeconfig` secret.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct KubeconfigSecretClients;

#[async_trait::async_trait]
impl WorkloadClients for KubeconfigSecretClients {
    async fn client_for(
        &self,
        management: &dyn KubeClient,
        cluster: &Cluster,
        namespace: &str,
    ) -> Result<Arc<dyn KubeClient>> {
        let kubeconfig = read_kubeconfig(management, cluster, namespace).await?;
        let config =
            kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .context(error::KubeconfigParseSnafu {
                    name: cluster.object_name(),
                })?;
        let client = kube::Client::try_from(config).context(error::KubeClientSnafu {
            name: cluster.object_name(),
        })?;
        let client: Arc<dyn KubeClient> = Arc::new(KubeApiClient::new(client));
        Ok(client)
    }
}

async fn read_kubeconfig(
    management: &dyn KubeClient,
    cluster: &Cluster,
    namespace: &str,
) -> Result<Kubeconfig> {
    let secret_name = cluster_kubeconfig_secret_name(cluster.object_name());
    debug!("Reading kubeconfig secret '{}/{}'", namespace, secret_name);
    let secret: Secret = get_object(management, Some(namespace), &secret_name)
        .await
        .context(error::ReadSnafu {
            what: "kubeconfig secret",
            name: cluster.object_name(),
        })?
        .context(error::KubeconfigSecretMissingSnafu {
            secret: &secret_name,
            namespace,
        })?;
    let value = secret
        .data
        .as_ref()
        .and_then(|data| data.get(KUBECONFIG_SECRET_KEY))
        .context(error::KubeconfigMissingSnafu {
            secret: &secret_name,
            key: KUBECONFIG_SECRET_KEY,
        })?;
    Kubeconfig::from_yaml(&String::from_utf8_lossy(&value.0)).context(
        error::KubeconfigParseSnafu {
            name: cluster.object_name(),
        },
    )
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use k8s_openapi::ByteString;
    use maplit::btreemap;
    use model::clients::fake::FakeClient;
    use model::ClusterSpec;

    /// Hands out the same fake for every cluster.
    pub(crate) struct FakeWorkloadClients {
        workload: Arc<FakeClient>,
    }

    impl FakeWorkloadClients {
        pub(crate) fn new(workload: Arc<FakeClient>) -> Self {
            Self { workload }
        }
    }

    #[async_trait::async_trait]
    impl WorkloadClients for FakeWorkloadClients {
        async fn client_for(
            &self,
            _: &dyn KubeClient,
            _: &Cluster,
            _: &str,
        ) -> Result<Arc<dyn KubeClient>> {
            let client: Arc<dyn KubeClient> = self.workload.clone();
            Ok(client)
        }
    }

    const KUBECONFIG: &str = r#"
apiVersion: v1
kind: Config
clusters:
  - name: my-cluster
    cluster:
      server: https://10.0.0.10:6443
contexts:
  - name: my-cluster-admin@my-cluster
    context:
      cluster: my-cluster
      user: my-cluster-admin
current-context: my-cluster-admin@my-cluster
users:
  - name: my-cluster-admin
    user:
      token: abc
"#;

    fn secret(data: Option<&str>) -> Secret {
        Secret {
            metadata: kube::core::ObjectMeta {
                name: Some("my-cluster-kubeconfig".to_string()),
                namespace: Some("eksa-system".to_string()),
                ..Default::default()
            },
            data: data.map(|value| {
                btreemap! {
                    KUBECONFIG_SECRET_KEY.to_string() => ByteString(value.as_bytes().to_vec())
                }
            }),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn kubeconfig_is_read_from_the_secret() {
        let management = FakeClient::new("management");
        management.add(&secret(Some(KUBECONFIG))).unwrap();
        let cluster = Cluster::new("my-cluster", ClusterSpec::default());
        let kubeconfig = read_kubeconfig(&management, &cluster, "eksa-system")
            .await
            .unwrap();
        assert_eq!(
            kubeconfig.current_context.as_deref(),
            Some("my-cluster-admin@my-cluster")
        );
    }

    #[tokio::test]
    async fn missing_secret_or_key_is_an_error() {
        let management = FakeClient::new("management");
        let cluster = Cluster::new("my-cluster", ClusterSpec::default());
        let error = read_kubeconfig(&management, &cluster, "eksa-system")
            .await
            .unwrap_err();
        assert_eq!(
            error.to_string(),
            "Kubeconfig secret 'my-cluster-kubeconfig' not found in namespace 'eksa-system'"
        );

        management.add(&secret(None)).unwrap();
        let error = read_kubeconfig(&management, &cluster, "eksa-system")
            .await
            .unwrap_err();
        assert_eq!(
            error.to_string(),
            "Kubeconfig secret 'my-cluster-kubeconfig' has no 'value' key"
        );
    }
}
