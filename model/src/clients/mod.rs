/*!

Access to the Kubernetes API. Everything that talks to a cluster does so through the object safe
[`KubeClient`] trait, which works on untyped [`DynamicObject`]s. The free functions in this module
convert to and from typed objects.

!*/

mod error;
#[cfg(any(test, feature = "test-util"))]
pub mod fake;
mod http_status_code;
mod kube_client;

pub use error::{Error, Result};
pub use http_status_code::{HttpStatusCode, StatusCode};
pub use kube::api::DynamicObject;
pub use kube::core::GroupVersionKind;
pub use kube_client::KubeApiClient;

use crate::yaml::ApiObject;
use kube::Resource;
use serde::de::DeserializeOwned;
use serde_json::Value;
use snafu::{OptionExt, ResultExt};

/// The operations the reconcilers need from a cluster's API server. Errors can be classified with
/// [`HttpStatusCode`], e.g. `is_not_found` and `is_already_exists`.
#[async_trait::async_trait]
pub trait KubeClient: Send + Sync {
    async fn get(
        &self,
        gvk: &GroupVersionKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<DynamicObject>;

    /// Lists objects, optionally filtered with a label selector such as `a=b,c=d`.
    async fn list(
        &self,
        gvk: &GroupVersionKind,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<Vec<DynamicObject>>;

    async fn create(&self, object: &DynamicObject) -> Result<DynamicObject>;

    /// Replaces the object. The object's resource version must match the live one.
    async fn update(&self, object: &DynamicObject) -> Result<DynamicObject>;

    async fn delete(
        &self,
        gvk: &GroupVersionKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<()>;

    /// Applies a JSON merge patch to the object.
    async fn merge_patch(
        &self,
        gvk: &GroupVersionKind,
        namespace: Option<&str>,
        name: &str,
        patch: &Value,
    ) -> Result<DynamicObject>;

    /// Applies a JSON merge patch to the object's status subresource.
    async fn merge_patch_status(
        &self,
        gvk: &GroupVersionKind,
        namespace: Option<&str>,
        name: &str,
        patch: &Value,
    ) -> Result<DynamicObject>;
}

/// The group, version and kind of a typed object.
pub fn gvk_of<K>() -> GroupVersionKind
where
    K: Resource<DynamicType = ()>,
{
    GroupVersionKind::gvk(&K::group(&()), &K::version(&()), &K::kind(&()))
}

/// Splits an `apiVersion` such as `apps/v1` or `v1` into group and version.
pub fn gvk_from_api_version(api_version: &str, kind: &str) -> GroupVersionKind {
    match api_version.split_once('/') {
        Some((group, version)) => GroupVersionKind::gvk(group, version, kind),
        None => GroupVersionKind::gvk("", api_version, kind),
    }
}

/// The `apiVersion` string of `gvk`.
pub fn api_version_of(gvk: &GroupVersionKind) -> String {
    if gvk.group.is_empty() {
        gvk.version.clone()
    } else {
        format!("{}/{}", gvk.group, gvk.version)
    }
}

/// The group, version and kind of an untyped object.
pub fn gvk_of_dynamic(object: &DynamicObject) -> Result<GroupVersionKind> {
    let types = object
        .types
        .as_ref()
        .context(error::MissingTypeMetaSnafu {
            name: object.metadata.name.clone().unwrap_or_default(),
        })?;
    Ok(gvk_from_api_version(&types.api_version, &types.kind))
}

/// Converts an untyped object into `K`.
pub fn from_dynamic<K>(object: DynamicObject) -> Result<K>
where
    K: DeserializeOwned,
{
    let what = object.metadata.name.clone().unwrap_or_default();
    serde_json::to_value(object)
        .and_then(serde_json::from_value)
        .context(error::SerdeSnafu { what })
        .map_err(Into::into)
}

/// Gets a typed object, `None` if it does not exist.
pub async fn get_object<K>(
    client: &dyn KubeClient,
    namespace: Option<&str>,
    name: &str,
) -> Result<Option<K>>
where
    K: Resource<DynamicType = ()> + DeserializeOwned,
{
    match client.get(&gvk_of::<K>(), namespace, name).await {
        Ok(object) => Ok(Some(from_dynamic(object)?)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Lists typed objects matching `label_selector`.
pub async fn list_objects<K>(
    client: &dyn KubeClient,
    namespace: Option<&str>,
    label_selector: Option<&str>,
) -> Result<Vec<K>>
where
    K: Resource<DynamicType = ()> + DeserializeOwned,
{
    client
        .list(&gvk_of::<K>(), namespace, label_selector)
        .await?
        .into_iter()
        .map(from_dynamic)
        .collect()
}

/// Creates a typed object.
pub async fn create_object(client: &dyn KubeClient, object: &dyn ApiObject) -> Result<()> {
    client.create(&object.to_dynamic()?).await?;
    Ok(())
}

/// Builds a label selector that matches all of `labels`.
pub fn label_selector<'a, I>(labels: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    labels
        .into_iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::capi::KubeadmControlPlane;

    #[test]
    fn gvk_parsing() {
        let gvk = gvk_from_api_version("apps/v1", "DaemonSet");
        assert_eq!(gvk.group, "apps");
        assert_eq!(gvk.version, "v1");
        assert_eq!(api_version_of(&gvk), "apps/v1");

        let core = gvk_from_api_version("v1", "Secret");
        assert_eq!(core.group, "");
        assert_eq!(api_version_of(&core), "v1");
    }

    #[test]
    fn typed_gvk() {
        let gvk = gvk_of::<KubeadmControlPlane>();
        assert_eq!(gvk.group, "controlplane.cluster.x-k8s.io");
        assert_eq!(gvk.version, "v1beta1");
        assert_eq!(gvk.kind, "KubeadmControlPlane");
    }

    #[test]
    fn selector() {
        assert_eq!(label_selector(vec![("a", "b"), ("c", "d")]), "a=b,c=d");
    }
}
