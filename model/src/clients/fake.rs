//! An in-memory [`KubeClient`] for tests. Every call is recorded in a [`Journal`], which can be
//! shared between several fakes so that tests can assert on the order of calls made to different
//! clusters.

use super::error::{InnerError, Result};
use super::{api_version_of, from_dynamic, gvk_of_dynamic, GroupVersionKind, KubeClient};
use crate::yaml::ApiObject;
use kube::api::DynamicObject;
use kube::error::ErrorResponse;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// The calls made to one or more fakes, in order.
pub type Journal = Arc<Mutex<Vec<Call>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    List,
    Create,
    Update,
    Delete,
    Patch,
    PatchStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    /// The id of the fake that received the call.
    pub client: String,
    pub method: Method,
    pub kind: String,
    /// Empty for `List`.
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct ObjectKey {
    api_version: String,
    kind: String,
    namespace: String,
    name: String,
}

impl ObjectKey {
    fn new(gvk: &GroupVersionKind, namespace: Option<&str>, name: &str) -> Self {
        Self {
            api_version: api_version_of(gvk),
            kind: gvk.kind.clone(),
            namespace: namespace.unwrap_or_default().to_string(),
            name: name.to_string(),
        }
    }

    fn of(object: &DynamicObject) -> Result<Self> {
        let gvk = gvk_of_dynamic(object)?;
        Ok(Self::new(
            &gvk,
            object.metadata.namespace.as_deref(),
            object.metadata.name.as_deref().unwrap_or_default(),
        ))
    }
}

#[derive(Debug, Default)]
struct Store {
    objects: BTreeMap<ObjectKey, DynamicObject>,
    resource_version: u64,
}

impl Store {
    fn next_resource_version(&mut self) -> String {
        self.resource_version += 1;
        self.resource_version.to_string()
    }
}

/// An in-memory API server.
#[derive(Debug)]
pub struct FakeClient {
    id: String,
    store: Mutex<Store>,
    journal: Journal,
    failures: Mutex<HashSet<Method>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn api_error(method: Method, what: String, code: u16, reason: &str) -> super::Error {
    InnerError::KubeApiCall {
        method: format!("{:?}", method).to_lowercase(),
        what,
        source: kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: format!("{} ({})", reason, code),
            reason: reason.to_string(),
            code,
        }),
    }
    .into()
}

impl FakeClient {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self::with_journal(id, Journal::default())
    }

    /// A fake that records its calls in `journal`.
    pub fn with_journal<S: Into<String>>(id: S, journal: Journal) -> Self {
        Self {
            id: id.into(),
            store: Mutex::default(),
            journal,
            failures: Mutex::default(),
        }
    }

    pub fn journal(&self) -> Journal {
        Arc::clone(&self.journal)
    }

    /// The calls received by this fake.
    pub fn calls(&self) -> Vec<Call> {
        lock(&self.journal)
            .iter()
            .filter(|call| call.client == self.id)
            .cloned()
            .collect()
    }

    /// The calls of `method` received by this fake.
    pub fn calls_of(&self, method: Method) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| call.method == method)
            .collect()
    }

    /// Stores `object` without recording a call.
    pub fn add(&self, object: &dyn ApiObject) -> Result<()> {
        let object = object.to_dynamic()?;
        let key = ObjectKey::of(&object)?;
        let mut store = lock(&self.store);
        let mut object = object;
        object.metadata.resource_version = Some(store.next_resource_version());
        store.objects.insert(key, object);
        Ok(())
    }

    /// Reads an object without recording a call.
    pub fn object<K>(&self, gvk: &GroupVersionKind, namespace: &str, name: &str) -> Option<K>
    where
        K: DeserializeOwned,
    {
        let object = lock(&self.store)
            .objects
            .get(&ObjectKey::new(gvk, Some(namespace), name))
            .cloned()?;
        from_dynamic(object).ok()
    }

    /// Every stored object of the given kind.
    pub fn objects_of_kind(&self, kind: &str) -> Vec<DynamicObject> {
        lock(&self.store)
            .objects
            .iter()
            .filter(|(key, _)| key.kind == kind)
            .map(|(_, object)| object.clone())
            .collect()
    }

    /// Makes every future call of `method` fail with an internal server error.
    pub fn fail_on(&self, method: Method) {
        lock(&self.failures).insert(method);
    }

    fn record(&self, method: Method, kind: &str, name: &str) -> Result<()> {
        lock(&self.journal).push(Call {
            client: self.id.clone(),
            method,
            kind: kind.to_string(),
            name: name.to_string(),
        });
        if lock(&self.failures).contains(&method) {
            return Err(api_error(
                method,
                format!("{} {}", kind, name),
                500,
                "InternalError",
            ));
        }
        Ok(())
    }

    fn patch(
        &self,
        method: Method,
        gvk: &GroupVersionKind,
        namespace: Option<&str>,
        name: &str,
        patch: &Value,
    ) -> Result<DynamicObject> {
        self.record(method, &gvk.kind, name)?;
        let key = ObjectKey::new(gvk, namespace, name);
        let mut store = lock(&self.store);
        let current = store
            .objects
            .get(&key)
            .cloned()
            .ok_or_else(|| api_error(method, format!("{:?}", key), 404, "NotFound"))?;
        let mut document = serde_json::to_value(&current)
            .map_err(|source| InnerError::Serde {
                what: name.to_string(),
                source,
            })
            .map_err(super::Error::from)?;
        let mut patch = patch.clone();
        match method {
            Method::PatchStatus => {
                let status = patch.get("status").cloned().unwrap_or(Value::Null);
                patch = serde_json::json!({ "status": status });
            }
            _ => {
                if let Some(fields) = patch.as_object_mut() {
                    fields.remove("status");
                }
            }
        }
        json_patch::merge(&mut document, &patch);
        let mut patched: DynamicObject = from_dynamic_value(name, document)?;
        patched.metadata.resource_version = Some(store.next_resource_version());
        store.objects.insert(key, patched.clone());
        Ok(patched)
    }
}

fn from_dynamic_value(name: &str, value: Value) -> Result<DynamicObject> {
    serde_json::from_value(value)
        .map_err(|source| InnerError::Serde {
            what: name.to_string(),
            source,
        })
        .map_err(Into::into)
}

/// Matches selectors of the form `a=b,c` against `labels`.
fn matches_selector(object: &DynamicObject, selector: &str) -> bool {
    let empty = BTreeMap::new();
    let labels = object.metadata.labels.as_ref().unwrap_or(&empty);
    selector
        .split(',')
        .filter(|requirement| !requirement.is_empty())
        .all(|requirement| match requirement.split_once('=') {
            Some((key, value)) => labels.get(key).map(String::as_str) == Some(value),
            None => labels.contains_key(requirement),
        })
}

#[async_trait::async_trait]
impl KubeClient for FakeClient {
    async fn get(
        &self,
        gvk: &GroupVersionKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<DynamicObject> {
        self.record(Method::Get, &gvk.kind, name)?;
        let key = ObjectKey::new(gvk, namespace, name);
        lock(&self.store)
            .objects
            .get(&key)
            .cloned()
            .ok_or_else(|| api_error(Method::Get, format!("{:?}", key), 404, "NotFound"))
    }

    async fn list(
        &self,
        gvk: &GroupVersionKind,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<Vec<DynamicObject>> {
        self.record(Method::List, &gvk.kind, "")?;
        let api_version = api_version_of(gvk);
        Ok(lock(&self.store)
            .objects
            .iter()
            .filter(|(key, _)| key.api_version == api_version && key.kind == gvk.kind)
            .filter(|(key, _)| namespace.map(|ns| key.namespace == ns).unwrap_or(true))
            .filter(|(_, object)| {
                label_selector
                    .map(|selector| matches_selector(object, selector))
                    .unwrap_or(true)
            })
            .map(|(_, object)| object.clone())
            .collect())
    }

    async fn create(&self, object: &DynamicObject) -> Result<DynamicObject> {
        let key = ObjectKey::of(object)?;
        self.record(Method::Create, &key.kind, &key.name)?;
        let mut store = lock(&self.store);
        if store.objects.contains_key(&key) {
            return Err(api_error(
                Method::Create,
                format!("{:?}", key),
                409,
                "AlreadyExists",
            ));
        }
        let mut object = object.clone();
        object.metadata.resource_version = Some(store.next_resource_version());
        store.objects.insert(key, object.clone());
        Ok(object)
    }

    async fn update(&self, object: &DynamicObject) -> Result<DynamicObject> {
        let key = ObjectKey::of(object)?;
        self.record(Method::Update, &key.kind, &key.name)?;
        let mut store = lock(&self.store);
        let current_version = match store.objects.get(&key) {
            None => {
                return Err(api_error(
                    Method::Update,
                    format!("{:?}", key),
                    404,
                    "NotFound",
                ))
            }
            Some(current) => current.metadata.resource_version.clone(),
        };
        if object.metadata.resource_version.is_some()
            && object.metadata.resource_version != current_version
        {
            return Err(api_error(
                Method::Update,
                format!("{:?}", key),
                409,
                "Conflict",
            ));
        }
        let mut object = object.clone();
        object.metadata.resource_version = Some(store.next_resource_version());
        store.objects.insert(key, object.clone());
        Ok(object)
    }

    async fn delete(
        &self,
        gvk: &GroupVersionKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<()> {
        self.record(Method::Delete, &gvk.kind, name)?;
        let key = ObjectKey::new(gvk, namespace, name);
        match lock(&self.store).objects.remove(&key) {
            Some(_) => Ok(()),
            None => Err(api_error(
                Method::Delete,
                format!("{:?}", key),
                404,
                "NotFound",
            )),
        }
    }

    async fn merge_patch(
        &self,
        gvk: &GroupVersionKind,
        namespace: Option<&str>,
        name: &str,
        patch: &Value,
    ) -> Result<DynamicObject> {
        self.patch(Method::Patch, gvk, namespace, name, patch)
    }

    async fn merge_patch_status(
        &self,
        gvk: &GroupVersionKind,
        namespace: Option<&str>,
        name: &str,
        patch: &Value,
    ) -> Result<DynamicObject> {
        self.patch(Method::PatchStatus, gvk, namespace, name, patch)
    }
}
