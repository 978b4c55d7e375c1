use super::object::{downcast_ref, ApiObject};
use crate::capi::ObjectReference;
use std::collections::HashMap;

/// Identifies an object in an [`ObjectLookup`]. Namespace is not part of the key, a lookup is
/// always built from the objects of a single namespace.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
struct LookupKey {
    api_version: String,
    kind: String,
    name: String,
}

impl LookupKey {
    fn new(api_version: &str, kind: &str, name: &str) -> Self {
        Self {
            api_version: api_version.to_string(),
            kind: kind.to_string(),
            name: name.to_string(),
        }
    }
}

/// Objects keyed by api version, kind and name. Inserting an object with a key that is already
/// present replaces the previous object.
#[derive(Debug, Default)]
pub struct ObjectLookup {
    objects: HashMap<LookupKey, Box<dyn ApiObject>>,
}

impl ObjectLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, object: Box<dyn ApiObject>) {
        let key = LookupKey::new(&object.api_version(), &object.kind(), object.name());
        self.objects.insert(key, object);
    }

    pub fn get(&self, api_version: &str, kind: &str, name: &str) -> Option<&dyn ApiObject> {
        self.objects
            .get(&LookupKey::new(api_version, kind, name))
            .map(|object| object.as_ref())
    }

    /// Resolves `reference` to a `T`. Returns `None` if nothing with that api version, kind and
    /// name was parsed, or if it was parsed into a different type.
    pub fn get_from_ref<T: ApiObject>(&self, reference: &ObjectReference) -> Option<&T> {
        self.get(&reference.api_version, &reference.kind, &reference.name)
            .and_then(downcast_ref::<T>)
    }

    /// Every object of type `T`, in no particular order.
    pub fn objects_of<T: ApiObject>(&self) -> impl Iterator<Item = &T> {
        self.objects
            .values()
            .filter_map(|object| downcast_ref::<T>(object.as_ref()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn ApiObject> {
        self.objects.values().map(|object| object.as_ref())
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

/// Builds an [`ObjectLookup`] from objects that are already decoded.
#[derive(Debug, Default)]
pub struct ObjectLookupBuilder {
    lookup: ObjectLookup,
}

impl ObjectLookupBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<T: ApiObject>(mut self, object: T) -> Self {
        self.lookup.insert(Box::new(object));
        self
    }

    pub fn build(self) -> ObjectLookup {
        self.lookup
    }
}
