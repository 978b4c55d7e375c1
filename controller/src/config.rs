use crate::error::{self, Result};
use model::constants::NAMESPACE;
use serde::Deserialize;
use snafu::ResultExt;

/// Environment variables read by the controller start with this prefix, e.g.
/// `CLUSTER_CONTROLLER_CAPI_NAMESPACE`.
const ENV_PREFIX: &str = "CLUSTER_CONTROLLER_";

/// Settings of the controller, read from the environment.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub(crate) struct ControllerConfig {
    /// Where generated CAPI objects are created.
    #[serde(default = "default_capi_namespace")]
    pub(crate) capi_namespace: String,
    #[serde(default = "default_cni_manifest_path")]
    pub(crate) cni_manifest_path: String,
    /// The daemonset whose presence tells that the CNI is installed.
    #[serde(default = "default_cni_daemonset_name")]
    pub(crate) cni_daemonset_name: String,
    #[serde(default = "default_cni_daemonset_namespace")]
    pub(crate) cni_daemonset_namespace: String,
}

fn default_capi_namespace() -> String {
    NAMESPACE.to_string()
}

fn default_cni_manifest_path() -> String {
    "/config/cni/cilium.yaml".to_string()
}

fn default_cni_daemonset_name() -> String {
    "cilium".to_string()
}

fn default_cni_daemonset_namespace() -> String {
    "kube-system".to_string()
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            capi_namespace: default_capi_namespace(),
            cni_manifest_path: default_cni_manifest_path(),
            cni_daemonset_name: default_cni_daemonset_name(),
            cni_daemonset_namespace: default_cni_daemonset_namespace(),
        }
    }
}

impl ControllerConfig {
    pub(crate) fn from_env() -> Result<Self> {
        Self::from_iter(std::env::vars())
    }

    fn from_iter<I>(vars: I) -> Result<Self>
    where
        I: Iterator<Item = (String, String)>,
    {
        envy::prefixed(ENV_PREFIX)
            .from_iter(vars)
            .context(error::ConfigSnafu)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_when_unset() {
        let config = ControllerConfig::from_iter(std::iter::empty()).unwrap();
        assert_eq!(config, ControllerConfig::default());
        assert_eq!(config.capi_namespace, "eksa-system");
    }

    #[test]
    fn prefixed_variables_override_defaults() {
        let vars = vec![
            (
                "CLUSTER_CONTROLLER_CNI_DAEMONSET_NAME".to_string(),
                "kindnet".to_string(),
            ),
            ("CNI_DAEMONSET_NAMESPACE".to_string(), "ignored".to_string()),
        ];
        let config = ControllerConfig::from_iter(vars.into_iter()).unwrap();
        assert_eq!(config.cni_daemonset_name, "kindnet");
        assert_eq!(config.cni_daemonset_namespace, "kube-system");
    }
}
