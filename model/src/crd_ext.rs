use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// Provides some conveniences for querying a `kube-rs` object.
pub trait CrdExt {
    /// Returns this objects `ObjectMeta` information (i.e. the `metadata` field). This allows the
    /// rest of this trait's functions to be implemented for you.
    fn object_meta(&self) -> &ObjectMeta;

    /// Returns the object.metadata.name field, unwrapping a potential `None` with `""`. In
    /// practice, an object's name cannot be missing since this is how we `GET` an object in the
    /// first place, so we do away with the `Option` for convenience. This is named `object_name`
    /// to avoid confusion with `ResourceExt`.
    fn object_name(&self) -> &str {
        self.object_meta().name.as_deref().unwrap_or("")
    }

    /// Returns the object.metadata.namespace field, unwrapping a potential `None` with `""`.
    fn object_namespace(&self) -> &str {
        self.object_meta().namespace.as_deref().unwrap_or("")
    }

    /// Returns the value of the label `key` if the object carries it.
    fn label(&self, key: &str) -> Option<&str> {
        self.object_meta()
            .labels
            .as_ref()
            .and_then(|labels| labels.get(key))
            .map(String::as_str)
    }

    /// Returns the value of the annotation `key` if the object carries it.
    fn annotation(&self, key: &str) -> Option<&str> {
        self.object_meta()
            .annotations
            .as_ref()
            .and_then(|annotations| annotations.get(key))
            .map(String::as_str)
    }

    /// Does the object have the given `finalizer`.
    fn has_finalizer(&self, finalizer: &str) -> bool {
        let mut finalizers = match &self.object_meta().finalizers {
            None => return false,
            Some(value) => value.iter(),
        };
        finalizers.any(|item| item == finalizer)
    }

    /// Has someone requested that the object be deleted.
    fn is_delete_requested(&self) -> bool {
        self.object_meta().deletion_timestamp.is_some()
    }
}

impl<K> CrdExt for K
where
    K: kube::Resource,
{
    fn object_meta(&self) -> &ObjectMeta {
        self.meta()
    }
}
