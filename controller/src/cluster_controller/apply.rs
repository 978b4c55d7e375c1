use crate::error::{self, Result};
use log::{debug, trace};
use model::clients::{gvk_of_dynamic, DynamicObject, HttpStatusCode, KubeClient};
use model::clusterapi::equality::is_semantic_derivative;
use model::yaml::ApiObject;
use serde_json::Value;
use snafu::ResultExt;

/// Machine templates and kubeadm config templates cannot be changed once created. A changed
/// template gets a new name instead, so an existing template is always left alone.
pub(crate) fn is_immutable_kind(kind: &str) -> bool {
    kind.ends_with("MachineTemplate") || kind == "KubeadmConfigTemplate"
}

/// Brings the live objects in line with `objects`. Missing objects are created, mutable objects
/// whose desired fields differ from the live ones are updated.
pub(crate) async fn apply_objects(
    client: &dyn KubeClient,
    objects: &[Box<dyn ApiObject>],
) -> Result<()> {
    for object in objects {
        let desired = object.to_dynamic().context(error::ConvertSnafu {
            kind: object.kind(),
            name: object.name(),
        })?;
        apply_object(client, desired).await?;
    }
    Ok(())
}

async fn apply_object(client: &dyn KubeClient, desired: DynamicObject) -> Result<()> {
    let kind = desired.kind().into_owned();
    let name = desired.name().to_string();
    let gvk = gvk_of_dynamic(&desired).context(error::ApplySnafu {
        kind: &kind,
        name: &name,
    })?;
    let live = match client
        .get(&gvk, desired.metadata.namespace.as_deref(), &name)
        .await
    {
        Ok(live) => live,
        Err(e) if e.is_not_found() => {
            debug!("Creating {} '{}'", kind, name);
            client
                .create(&desired)
                .await
                .context(error::CreateSnafu { kind, name })?;
            return Ok(());
        }
        Err(e) => return Err(e).context(error::ApplySnafu { kind, name }),
    };

    if is_immutable_kind(&kind) {
        trace!("{} '{}' exists and cannot be changed", kind, name);
        return Ok(());
    }
    if is_up_to_date(&desired, &live) {
        trace!("{} '{}' is up to date", kind, name);
        return Ok(());
    }

    debug!("Updating {} '{}'", kind, name);
    client
        .update(&merged(desired, live))
        .await
        .context(error::ApplySnafu { kind, name })?;
    Ok(())
}

fn labels_value(object: &DynamicObject) -> Value {
    serde_json::to_value(&object.metadata.labels).unwrap_or(Value::Null)
}

fn is_up_to_date(desired: &DynamicObject, live: &DynamicObject) -> bool {
    is_semantic_derivative(&without_status(&desired.data), &live.data)
        && is_semantic_derivative(&labels_value(desired), &labels_value(live))
}

/// Status belongs to the object's controller and is never applied.
fn without_status(data: &Value) -> Value {
    let mut data = data.clone();
    if let Some(fields) = data.as_object_mut() {
        fields.remove("status");
    }
    data
}

/// The live object with the desired fields and labels written over it. The live resource version
/// is kept so that concurrent changes are detected.
fn merged(desired: DynamicObject, mut live: DynamicObject) -> DynamicObject {
    merge_fields(&mut live.data, without_status(&desired.data));
    if let Some(labels) = desired.metadata.labels {
        live.metadata
            .labels
            .get_or_insert_with(Default::default)
            .extend(labels);
    }
    live
}

/// Writes the leaves set in `desired` over `live`. Fields that `desired` leaves unset keep their
/// live value, so whatever CAPI or the API server filled in survives an update. Unset means the
/// same as in `is_semantic_derivative`.
fn merge_fields(live: &mut Value, desired: Value) {
    match (live, desired) {
        (_, Value::Null) => {}
        (_, Value::String(s)) if s.is_empty() => {}
        (_, Value::Array(items)) if items.is_empty() => {}
        (Value::Object(live_fields), Value::Object(desired_fields)) => {
            for (key, value) in desired_fields {
                match live_fields.get_mut(&key) {
                    Some(live_value) => merge_fields(live_value, value),
                    None => {
                        live_fields.insert(key, value);
                    }
                }
            }
        }
        (Value::Array(live_items), Value::Array(desired_items))
            if live_items.len() == desired_items.len() =>
        {
            for (live_item, desired_item) in live_items.iter_mut().zip(desired_items) {
                merge_fields(live_item, desired_item);
            }
        }
        (live, desired) => *live = desired,
    }
}

/// Creates each of `objects`, leaving objects that already exist as they are.
pub(crate) async fn create_tolerating_existing(
    client: &dyn KubeClient,
    objects: &[DynamicObject],
) -> Result<()> {
    for object in objects {
        match client.create(object).await {
            Ok(_) => debug!("Created {} '{}'", object.kind(), object.name()),
            Err(e) if e.is_already_exists() => {
                trace!("{} '{}' already exists", object.kind(), object.name())
            }
            Err(e) => {
                return Err(e).context(error::CreateSnafu {
                    kind: object.kind(),
                    name: object.name(),
                })
            }
        }
    }
    Ok(())
}
