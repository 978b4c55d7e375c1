/*!

Turns a multi-document YAML stream into typed Kubernetes objects. A [`Parser`] knows which kinds it
understands through the [`Mapping`]s registered with it, collects every document it understands
into an [`ObjectLookup`] and hands that to a [`Builder`], which assembles whatever aggregate it is
responsible for.

!*/

mod error;
mod lookup;
mod object;

pub use error::{Error, Result};
pub use lookup::{ObjectLookup, ObjectLookupBuilder};
pub use object::{downcast_ref, to_yaml, ApiObject};

use kube::api::DynamicObject;
use log::debug;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use snafu::{ensure, OptionExt, ResultExt};
use std::collections::HashMap;

type DecodeFn = fn(serde_yaml::Value) -> serde_yaml::Result<Box<dyn ApiObject>>;

fn decode<T>(value: serde_yaml::Value) -> serde_yaml::Result<Box<dyn ApiObject>>
where
    T: ApiObject + DeserializeOwned,
{
    Ok(Box::new(serde_yaml::from_value::<T>(value)?))
}

/// Binds a kind to the type its documents are decoded into.
#[derive(Clone)]
pub struct Mapping {
    kind: String,
    decode: DecodeFn,
}

impl Mapping {
    pub fn new<T>(kind: impl Into<String>) -> Self
    where
        T: ApiObject + DeserializeOwned,
    {
        Self {
            kind: kind.into(),
            decode: decode::<T>,
        }
    }

    /// A mapping that decodes any kind into a [`DynamicObject`].
    pub fn unstructured() -> Self {
        Self::new::<DynamicObject>("*")
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }
}

impl std::fmt::Debug for Mapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mapping").field("kind", &self.kind).finish()
    }
}

/// Receives the objects of a parse operation.
pub trait Builder {
    /// Called exactly once per successful [`Parser::parse`] with everything that was decoded.
    /// Missing objects are not an error, the builder leaves the corresponding fields empty.
    fn build_from_parsed(&mut self, lookup: ObjectLookup);
}

/// Decodes YAML documents into typed objects based on their kind.
#[derive(Debug, Default)]
pub struct Parser {
    mappings: HashMap<String, Mapping>,
    fallback: Option<Mapping>,
}

/// The part of every document that is needed to pick a mapping.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    api_version: Option<String>,
    kind: Option<String>,
    #[serde(default)]
    metadata: EnvelopeMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct EnvelopeMetadata {
    name: Option<String>,
}

impl Parser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `mapping`. Each kind can only be registered once.
    pub fn register_mapping(&mut self, mapping: Mapping) -> Result<()> {
        ensure!(
            !self.mappings.contains_key(mapping.kind()),
            error::DuplicateMappingSnafu {
                kind: mapping.kind()
            }
        );
        self.mappings.insert(mapping.kind().to_string(), mapping);
        Ok(())
    }

    pub fn register_mappings<I>(&mut self, mappings: I) -> Result<()>
    where
        I: IntoIterator<Item = Mapping>,
    {
        for mapping in mappings {
            self.register_mapping(mapping)?;
        }
        Ok(())
    }

    /// Documents with a kind that has no mapping of its own are decoded with `mapping` instead of
    /// being skipped.
    pub fn register_fallback_mapping(&mut self, mapping: Mapping) {
        self.fallback = Some(mapping);
    }

    /// Decodes every document of `yaml` that has a mapping and passes the result to `builder`.
    /// Nothing reaches the builder if any document fails to decode.
    pub fn parse<B>(&self, yaml: &[u8], builder: &mut B) -> Result<()>
    where
        B: Builder + ?Sized,
    {
        let mut lookup = ObjectLookup::new();
        for (index, value) in documents(yaml)? {
            let envelope = read_envelope(index, &value)?;
            let mapping = match self.mappings.get(&envelope.kind).or(self.fallback.as_ref()) {
                Some(mapping) => mapping,
                None => {
                    debug!(
                        "Skipping '{}' '{}', no mapping registered for its kind",
                        envelope.kind, envelope.name
                    );
                    continue;
                }
            };
            let object = (mapping.decode)(value).context(error::DecodeSnafu {
                kind: &envelope.kind,
                name: &envelope.name,
            })?;
            ensure!(
                object.kind() == envelope.kind,
                error::KindMismatchSnafu {
                    expected: &envelope.kind,
                    actual: object.kind(),
                    name: &envelope.name,
                }
            );
            lookup.insert(object);
        }
        builder.build_from_parsed(lookup);
        Ok(())
    }
}

/// Decodes every document of `yaml` into a [`DynamicObject`], keeping the order of the
/// documents. Used for manifests that are applied as they are.
pub fn parse_unstructured(yaml: &[u8]) -> Result<Vec<DynamicObject>> {
    let mut objects = Vec::new();
    for (index, value) in documents(yaml)? {
        read_envelope(index, &value)?;
        let object: DynamicObject =
            serde_yaml::from_value(value).context(error::UnstructuredSnafu { index })?;
        objects.push(object);
    }
    Ok(objects)
}

struct ParsedEnvelope {
    kind: String,
    name: String,
}

fn read_envelope(index: usize, value: &serde_yaml::Value) -> Result<ParsedEnvelope> {
    let envelope: Envelope =
        serde_yaml::from_value(value.clone()).context(error::EnvelopeSnafu { index })?;
    envelope.api_version.context(error::MissingFieldSnafu {
        index,
        field: "apiVersion",
    })?;
    let kind = envelope.kind.context(error::MissingFieldSnafu {
        index,
        field: "kind",
    })?;
    Ok(ParsedEnvelope {
        kind,
        name: envelope.metadata.name.unwrap_or_default(),
    })
}

/// Splits `yaml` into its documents, dropping empty ones.
fn documents(yaml: &[u8]) -> Result<Vec<(usize, serde_yaml::Value)>> {
    let mut values = Vec::new();
    for (index, document) in serde_yaml::Deserializer::from_slice(yaml).enumerate() {
        let value =
            serde_yaml::Value::deserialize(document).context(error::YamlSnafu { index })?;
        if !value.is_null() {
            values.push((index, value));
        }
    }
    Ok(values)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::capi::infrastructure::DockerMachineTemplate;
    use crate::capi::{Cluster, KubeadmControlPlane};

    #[derive(Default)]
    struct CountingBuilder {
        calls: usize,
        objects: usize,
    }

    impl Builder for CountingBuilder {
        fn build_from_parsed(&mut self, lookup: ObjectLookup) {
            self.calls += 1;
            self.objects = lookup.len();
        }
    }

    const TWO_OBJECTS: &str = r#"
apiVersion: cluster.x-k8s.io/v1beta1
kind: Cluster
metadata:
  name: cluster
  namespace: eksa-system
spec: {}
---
apiVersion: infrastructure.cluster.x-k8s.io/v1beta1
kind: DockerMachineTemplate
metadata:
  name: cp-mt
  namespace: eksa-system
spec:
  template:
    spec:
      customImage: kindest/node:v1.24
---
apiVersion: v1
kind: ConfigMap
metadata:
  name: unknown
data:
  a: b
"#;

    fn parser() -> Parser {
        let mut parser = Parser::new();
        parser
            .register_mappings(vec![
                Mapping::new::<Cluster>("Cluster"),
                Mapping::new::<DockerMachineTemplate>("DockerMachineTemplate"),
            ])
            .unwrap();
        parser
    }

    #[test]
    fn register_duplicate_mapping() {
        let mut parser = parser();
        let err = parser
            .register_mapping(Mapping::new::<Cluster>("Cluster"))
            .unwrap_err();
        assert!(err.to_string().contains("duplicate mapping"));
    }

    #[test]
    fn parse_skips_unknown_kinds() {
        let mut builder = CountingBuilder::default();
        parser()
            .parse(TWO_OBJECTS.as_bytes(), &mut builder)
            .unwrap();
        assert_eq!(builder.calls, 1);
        assert_eq!(builder.objects, 2);
    }

    #[test]
    fn parse_with_fallback_mapping() {
        let mut parser = parser();
        parser.register_fallback_mapping(Mapping::unstructured());
        let mut lookup = None;
        struct Keep<'a>(&'a mut Option<ObjectLookup>);
        impl Builder for Keep<'_> {
            fn build_from_parsed(&mut self, lookup: ObjectLookup) {
                *self.0 = Some(lookup);
            }
        }
        parser
            .parse(TWO_OBJECTS.as_bytes(), &mut Keep(&mut lookup))
            .unwrap();
        let lookup = lookup.unwrap();
        assert_eq!(lookup.len(), 3);
        assert!(lookup.get("v1", "ConfigMap", "unknown").is_some());
        assert_eq!(lookup.objects_of::<Cluster>().count(), 1);
    }

    #[test]
    fn malformed_document_aborts_parse() {
        let yaml = format!("{}---\nkind: [unterminated\n", TWO_OBJECTS);
        let mut builder = CountingBuilder::default();
        assert!(parser().parse(yaml.as_bytes(), &mut builder).is_err());
        assert_eq!(builder.calls, 0);
    }

    #[test]
    fn decode_failure_aborts_parse() {
        let yaml = r#"
apiVersion: cluster.x-k8s.io/v1beta1
kind: Cluster
metadata:
  name: cluster
spec:
  paused: "not a bool"
"#;
        let mut builder = CountingBuilder::default();
        let err = parser()
            .parse(yaml.as_bytes(), &mut builder)
            .unwrap_err();
        assert!(err.to_string().contains("unable to decode Cluster 'cluster'"));
        assert_eq!(builder.calls, 0);
    }

    #[test]
    fn kind_mismatch_aborts_parse() {
        let mut parser = Parser::new();
        parser
            .register_mapping(Mapping::new::<KubeadmControlPlane>("Cluster"))
            .unwrap();
        let yaml = r#"
apiVersion: cluster.x-k8s.io/v1beta1
kind: Cluster
metadata:
  name: cluster
spec:
  version: v1.24
  machineTemplate:
    infrastructureRef:
      apiVersion: infrastructure.cluster.x-k8s.io/v1beta1
      kind: DockerMachineTemplate
      name: cp-mt
  kubeadmConfigSpec: {}
"#;
        let mut builder = CountingBuilder::default();
        assert!(parser.parse(yaml.as_bytes(), &mut builder).is_err());
        assert_eq!(builder.calls, 0);
    }

    #[test]
    fn missing_kind_is_an_error() {
        let yaml = "apiVersion: v1\nmetadata:\n  name: x\n";
        let mut builder = CountingBuilder::default();
        let err = parser()
            .parse(yaml.as_bytes(), &mut builder)
            .unwrap_err();
        assert!(err.to_string().contains("missing 'kind'"));
    }

    #[test]
    fn unstructured_keeps_document_order() {
        let objects = parse_unstructured(TWO_OBJECTS.as_bytes()).unwrap();
        let kinds: Vec<String> = objects
            .iter()
            .map(|o| o.types.as_ref().unwrap().kind.clone())
            .collect();
        assert_eq!(kinds, vec!["Cluster", "DockerMachineTemplate", "ConfigMap"]);
    }
}
