use super::error::{self, Result};
use super::{gvk_of_dynamic, GroupVersionKind, KubeClient};
use kube::api::{
    ApiResource, DeleteParams, DynamicObject, ListParams, Patch, PatchParams, PostParams,
};
use kube::Api;
use log::trace;
use serde_json::Value;
use snafu::{OptionExt, ResultExt};

/// A [`KubeClient`] backed by a `kube-rs` client.
#[derive(Clone)]
pub struct KubeApiClient {
    client: kube::Client,
}

impl KubeApiClient {
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }

    fn api(&self, gvk: &GroupVersionKind, namespace: Option<&str>) -> Api<DynamicObject> {
        let resource = ApiResource::from_gvk(gvk);
        match namespace {
            Some(namespace) if !namespace.is_empty() => {
                Api::namespaced_with(self.client.clone(), namespace, &resource)
            }
            _ => Api::all_with(self.client.clone(), &resource),
        }
    }

    fn api_for(&self, object: &DynamicObject) -> Result<(Api<DynamicObject>, String)> {
        let gvk = gvk_of_dynamic(object)?;
        let name = object
            .metadata
            .name
            .clone()
            .context(error::MissingNameSnafu {
                kind: gvk.kind.clone(),
            })?;
        Ok((self.api(&gvk, object.metadata.namespace.as_deref()), name))
    }
}

fn describe(gvk: &GroupVersionKind, namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some(namespace) => format!("{} {}/{}", gvk.kind, namespace, name),
        None => format!("{} {}", gvk.kind, name),
    }
}

fn describe_object(object: &DynamicObject) -> String {
    format!(
        "{} {}/{}",
        object.types.as_ref().map(|t| t.kind.as_str()).unwrap_or(""),
        object.metadata.namespace.as_deref().unwrap_or(""),
        object.metadata.name.as_deref().unwrap_or("")
    )
}

#[async_trait::async_trait]
impl KubeClient for KubeApiClient {
    async fn get(
        &self,
        gvk: &GroupVersionKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<DynamicObject> {
        trace!("get {}", describe(gvk, namespace, name));
        Ok(self
            .api(gvk, namespace)
            .get(name)
            .await
            .context(error::KubeApiCallSnafu {
                method: "get",
                what: describe(gvk, namespace, name),
            })?)
    }

    async fn list(
        &self,
        gvk: &GroupVersionKind,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<Vec<DynamicObject>> {
        let mut params = ListParams::default();
        if let Some(selector) = label_selector {
            params = params.labels(selector);
        }
        Ok(self
            .api(gvk, namespace)
            .list(&params)
            .await
            .context(error::KubeApiCallSnafu {
                method: "list",
                what: format!("{}s", gvk.kind),
            })?
            .items)
    }

    async fn create(&self, object: &DynamicObject) -> Result<DynamicObject> {
        trace!("create {}", describe_object(object));
        let (api, _) = self.api_for(object)?;
        Ok(api
            .create(&PostParams::default(), object)
            .await
            .context(error::KubeApiCallSnafu {
                method: "create",
                what: describe_object(object),
            })?)
    }

    async fn update(&self, object: &DynamicObject) -> Result<DynamicObject> {
        trace!("update {}", describe_object(object));
        let (api, name) = self.api_for(object)?;
        Ok(api
            .replace(&name, &PostParams::default(), object)
            .await
            .context(error::KubeApiCallSnafu {
                method: "update",
                what: describe_object(object),
            })?)
    }

    async fn delete(
        &self,
        gvk: &GroupVersionKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<()> {
        trace!("delete {}", describe(gvk, namespace, name));
        self.api(gvk, namespace)
            .delete(name, &DeleteParams::default())
            .await
            .context(error::KubeApiCallSnafu {
                method: "delete",
                what: describe(gvk, namespace, name),
            })?;
        Ok(())
    }

    async fn merge_patch(
        &self,
        gvk: &GroupVersionKind,
        namespace: Option<&str>,
        name: &str,
        patch: &Value,
    ) -> Result<DynamicObject> {
        Ok(self
            .api(gvk, namespace)
            .patch(name, &PatchParams::default(), &Patch::Merge(patch))
            .await
            .context(error::KubeApiCallSnafu {
                method: "patch",
                what: describe(gvk, namespace, name),
            })?)
    }

    async fn merge_patch_status(
        &self,
        gvk: &GroupVersionKind,
        namespace: Option<&str>,
        name: &str,
        patch: &Value,
    ) -> Result<DynamicObject> {
        Ok(self
            .api(gvk, namespace)
            .patch_status(name, &PatchParams::default(), &Patch::Merge(patch))
            .await
            .context(error::KubeApiCallSnafu {
                method: "patch status",
                what: describe(gvk, namespace, name),
            })?)
    }
}
