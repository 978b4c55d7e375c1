use super::apply::create_tolerating_existing;
use crate::config::ControllerConfig;
use crate::error::{self, Result};
use k8s_openapi::api::apps::v1::DaemonSet;
use log::info;
use model::clients::{get_object, KubeClient};
use model::yaml::parse_unstructured;
use snafu::ResultExt;

/// Installs the default CNI in a workload cluster unless its daemonset is already there. An
/// existing installation is never modified, it may have been customized or upgraded by the user.
pub(crate) async fn reconcile_cni(
    workload: &dyn KubeClient,
    cluster_name: &str,
    config: &ControllerConfig,
) -> Result<()> {
    let daemonset: Option<DaemonSet> = get_object(
        workload,
        Some(&config.cni_daemonset_namespace),
        &config.cni_daemonset_name,
    )
    .await
    .context(error::ReadSnafu {
        what: "CNI daemonset",
        name: cluster_name,
    })?;
    if daemonset.is_some() {
        info!(
            "CNI already installed in cluster '{}', skipping",
            cluster_name
        );
        return Ok(());
    }

    let path = &config.cni_manifest_path;
    info!("Installing CNI in cluster '{}' from '{}'", cluster_name, path);
    let manifest = tokio::fs::read(path)
        .await
        .context(error::ManifestReadSnafu { path })?;
    let objects = parse_unstructured(&manifest).context(error::ManifestParseSnafu { path })?;
    create_tolerating_existing(workload, &objects).await
}

#[cfg(test)]
mod test {
    use super::*;
    use model::clients::fake::{FakeClient, Method};
    use std::path::{Path, PathBuf};

    const MANIFEST: &str = r#"
apiVersion: v1
kind: ServiceAccount
metadata:
  name: cilium
  namespace: kube-system
---
apiVersion: apps/v1
kind: DaemonSet
metadata:
  name: cilium
  namespace: kube-system
spec:
  selector:
    matchLabels:
      k8s-app: cilium
  template:
    metadata:
      labels:
        k8s-app: cilium
    spec:
      containers:
        - name: cilium-agent
          image: quay.io/cilium/cilium:v1.11.10
"#;

    fn write_manifest(test_name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "cni-{}-{}.yaml",
            test_name,
            std::process::id()
        ));
        std::fs::write(&path, content).unwrap();
        path
    }

    fn config(path: &Path) -> ControllerConfig {
        ControllerConfig {
            cni_manifest_path: path.display().to_string(),
            ..ControllerConfig::default()
        }
    }

    #[tokio::test]
    async fn installs_once() {
        let path = write_manifest("installs-once", MANIFEST);
        let workload = FakeClient::new("workload");
        reconcile_cni(&workload, "my-cluster", &config(&path))
            .await
            .unwrap();
        let created: Vec<String> = workload
            .calls_of(Method::Create)
            .into_iter()
            .map(|call| call.kind)
            .collect();
        assert_eq!(created, vec!["ServiceAccount", "DaemonSet"]);

        // The daemonset now exists.
        reconcile_cni(&workload, "my-cluster", &config(&path))
            .await
            .unwrap();
        assert_eq!(workload.calls_of(Method::Create).len(), 2);
        std::fs::remove_file(path).unwrap();
    }

    #[tokio::test]
    async fn missing_or_broken_manifest_is_an_error() {
        let workload = FakeClient::new("workload");
        let missing = std::env::temp_dir().join("cni-does-not-exist.yaml");
        let error = reconcile_cni(&workload, "my-cluster", &config(&missing))
            .await
            .unwrap_err();
        assert!(matches!(error, crate::error::Error::ManifestRead { .. }));

        let path = write_manifest("broken", "kind: DaemonSet\nmetadata:\n  name: cilium\n");
        let error = reconcile_cni(&workload, "my-cluster", &config(&path))
            .await
            .unwrap_err();
        assert!(matches!(error, crate::error::Error::ManifestParse { .. }));
        assert!(workload.calls_of(Method::Create).is_empty());
        std::fs::remove_file(path).unwrap();
    }
}
