use crate::capi::infrastructure::{
    CloudStackCluster, CloudStackMachineTemplate, DockerCluster, DockerMachineTemplate,
    VSphereCluster, VSphereMachineTemplate,
};
use crate::capi::{
    Cluster as CapiCluster, EtcdadmCluster, KubeadmConfigTemplate, KubeadmControlPlane,
    MachineDeployment,
};
use crate::error::{self, Result};
use crate::provider_config::{
    CloudStackDatacenterConfig, CloudStackMachineConfig, DockerDatacenterConfig,
    VSphereDatacenterConfig, VSphereMachineConfig,
};
use crate::Cluster;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::DynamicObject;
use snafu::ResultExt;
use std::any::Any;
use std::borrow::Cow;
use std::fmt::Debug;

/// The capabilities every Kubernetes object handled by the parser and the aggregates shares: it
/// knows its type, it has a name and namespace and it can be copied. Typed objects are recovered
/// from a `dyn ApiObject` with [`downcast_ref`].
pub trait ApiObject: Any + Debug + Send + Sync {
    fn api_version(&self) -> Cow<'_, str>;

    fn kind(&self) -> Cow<'_, str>;

    fn metadata(&self) -> &ObjectMeta;

    fn metadata_mut(&mut self) -> &mut ObjectMeta;

    fn clone_object(&self) -> Box<dyn ApiObject>;

    fn as_any(&self) -> &dyn Any;

    /// Serializes the object into its untyped form so that it can be sent through a
    /// [`KubeClient`](crate::clients::KubeClient).
    fn to_dynamic(&self) -> Result<DynamicObject>;

    fn name(&self) -> &str {
        self.metadata().name.as_deref().unwrap_or("")
    }

    fn namespace(&self) -> &str {
        self.metadata().namespace.as_deref().unwrap_or("")
    }
}

/// Returns the concrete object behind a `dyn ApiObject` if it is a `T`.
pub fn downcast_ref<T: ApiObject>(object: &dyn ApiObject) -> Option<&T> {
    object.as_any().downcast_ref::<T>()
}

/// Serializes `objects` into a single YAML stream with one document per object.
pub fn to_yaml(objects: &[&dyn ApiObject]) -> Result<Vec<u8>> {
    let mut documents = Vec::with_capacity(objects.len());
    for object in objects {
        let document = serde_yaml::to_string(&object.to_dynamic()?).context(error::ToYamlSnafu {
            kind: object.kind(),
            name: object.name(),
        })?;
        documents.push(document.trim_start_matches("---\n").to_string());
    }
    Ok(documents.join("---\n").into_bytes())
}

impl Clone for Box<dyn ApiObject> {
    fn clone(&self) -> Self {
        self.clone_object()
    }
}

/// Implements [`ApiObject`] for types with static type information.
macro_rules! impl_api_object {
    ($($t:ty),* $(,)?) => {
        $(
            impl ApiObject for $t {
                fn api_version(&self) -> Cow<'_, str> {
                    <$t as kube::Resource>::api_version(&())
                }

                fn kind(&self) -> Cow<'_, str> {
                    <$t as kube::Resource>::kind(&())
                }

                fn metadata(&self) -> &ObjectMeta {
                    &self.metadata
                }

                fn metadata_mut(&mut self) -> &mut ObjectMeta {
                    &mut self.metadata
                }

                fn clone_object(&self) -> Box<dyn ApiObject> {
                    Box::new(self.clone())
                }

                fn as_any(&self) -> &dyn Any {
                    self
                }

                fn to_dynamic(&self) -> Result<DynamicObject> {
                    serde_json::to_value(self)
                        .and_then(serde_json::from_value)
                        .context(error::ToDynamicSnafu {
                            kind: self.kind(),
                            name: self.name(),
                        })
                        .map_err(Into::into)
                }
            }
        )*
    };
}

impl_api_object!(
    Cluster,
    CapiCluster,
    KubeadmControlPlane,
    KubeadmConfigTemplate,
    MachineDeployment,
    EtcdadmCluster,
    DockerCluster,
    DockerMachineTemplate,
    VSphereCluster,
    VSphereMachineTemplate,
    CloudStackCluster,
    CloudStackMachineTemplate,
    DockerDatacenterConfig,
    VSphereDatacenterConfig,
    VSphereMachineConfig,
    CloudStackDatacenterConfig,
    CloudStackMachineConfig,
    Secret,
    ConfigMap,
);

/// Untyped objects carry their type in `types`. Objects without it report empty strings.
impl ApiObject for DynamicObject {
    fn api_version(&self) -> Cow<'_, str> {
        Cow::Borrowed(
            self.types
                .as_ref()
                .map(|t| t.api_version.as_str())
                .unwrap_or(""),
        )
    }

    fn kind(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.types.as_ref().map(|t| t.kind.as_str()).unwrap_or(""))
    }

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }

    fn clone_object(&self) -> Box<dyn ApiObject> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn to_dynamic(&self) -> Result<DynamicObject> {
        Ok(self.clone())
    }
}
