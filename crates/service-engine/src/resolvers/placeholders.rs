//! Fields deferred to data loaders are left null in the response, then filled in
//! by passes that alternate between flushing the loaders and resolving the fields.

use crate::dataloader::DataLoader;
use crate::operation::FieldSelection;
use crate::resolvers::execution::execute_field;
use crate::resolvers::path_to_vec;
use crate::resolvers::ExecutionContext;
use crate::resolvers::ExecutionMode;
use crate::resolvers::LinkedPath;
use crate::resolvers::ObjectValue;
use crate::resolvers::PropagateNull;
use crate::response::JsonMap;
use crate::response::JsonValue;
use crate::response::ResponseDataPathSegment;
use crate::service::ServiceObject;
use futures::future::join_all;
use indexmap::IndexMap;
use service_schema::Name;
use std::sync::Arc;

/// A field whose load method ran, waiting for its loaders to be flushed
pub(crate) struct Placeholder {
    pub(crate) path: LinkedPath,
    pub(crate) object: Arc<dyn ServiceObject>,
    pub(crate) parent_type: Name,
    pub(crate) field_name: Name,
    pub(crate) fields: Vec<FieldSelection>,
    pub(crate) loaders: IndexMap<String, DataLoader>,
}

pub(crate) async fn resolve_placeholders(ctx: &ExecutionContext<'_>, data: &mut Option<JsonMap>) {
    let max_passes = ctx.engine.config.max_placeholder_passes;
    for pass in 1..=max_passes {
        let pending = ctx.take_placeholders();
        if pending.is_empty() || data.is_none() {
            return;
        }
        let flushed = ctx.loaders.flush().await;
        tracing::debug!(pass, fields = pending.len(), loaders = flushed, "resolving deferred fields");
        // Fields deferred while resolving these wait for the next pass
        let results = join_all(pending.iter().map(|placeholder| resolve_placeholder(ctx, placeholder))).await;
        for (placeholder, result) in pending.iter().zip(results) {
            write_result(data, &placeholder.path, result)
        }
    }
    let unresolved = ctx.take_placeholders();
    for placeholder in unresolved {
        ctx.field_error(
            format!("field was still waiting for data loaders after {max_passes} passes"),
            &placeholder.path,
            placeholder.fields.first().and_then(|field| field.location),
        );
        let result = if placeholder.path.as_ref().is_some_and(|node| node.non_null) {
            Err(PropagateNull)
        } else {
            Ok(Some(JsonValue::Null))
        };
        write_result(data, &placeholder.path, result)
    }
}

async fn resolve_placeholder(
    ctx: &ExecutionContext<'_>,
    placeholder: &Placeholder,
) -> Result<Option<JsonValue>, PropagateNull> {
    let Some(object_type) = ctx.engine.schema.get_type(&placeholder.parent_type) else {
        return Ok(None);
    };
    let Some(field_def) = object_type.fields.get(placeholder.field_name.as_str()) else {
        return Ok(None);
    };
    let fields: Vec<&FieldSelection> = placeholder.fields.iter().collect();
    let object_value = ObjectValue::Service {
        object: placeholder.object.clone(),
        prefix: Vec::new(),
    };
    Box::pin(execute_field(
        ctx,
        &placeholder.path,
        ExecutionMode::Normal,
        object_type,
        &object_value,
        field_def,
        &fields,
        Some(placeholder.loaders.clone()),
    ))
    .await
}

/// Writes the value of a deferred field, or nulls its nearest nullable ancestor.
fn write_result(
    data: &mut Option<JsonMap>,
    path: &LinkedPath,
    result: Result<Option<JsonValue>, PropagateNull>,
) {
    match result {
        Ok(Some(value)) => set_at(data, &path_to_vec(path), value),
        Ok(None) => {}
        Err(PropagateNull) => match nullable_ancestor(path) {
            Some(target) => set_at(data, &path_to_vec(&target), JsonValue::Null),
            None => *data = None,
        },
    }
}

/// The innermost segment of `path` that can hold null. `None` when null reaches `data` itself.
fn nullable_ancestor(path: &LinkedPath) -> Option<LinkedPath> {
    let mut link = path.as_ref();
    while let Some(node) = link {
        if !node.non_null {
            return Some(Some(Arc::clone(node)));
        }
        link = node.next.as_ref();
    }
    None
}

fn set_at(data: &mut Option<JsonMap>, segments: &[ResponseDataPathSegment], value: JsonValue) {
    let Some(map) = data else { return };
    let Some((ResponseDataPathSegment::Field(first), rest)) = segments.split_first() else {
        return;
    };
    let Some(mut slot) = map.get_mut(first.as_str()) else {
        return;
    };
    for segment in rest {
        let next = match (segment, slot) {
            (ResponseDataPathSegment::Field(key), JsonValue::Object(object)) => object.get_mut(key.as_str()),
            (ResponseDataPathSegment::ListIndex(index), JsonValue::Array(items)) => items.get_mut(*index),
            // An ancestor was nulled by a propagated error
            _ => None,
        };
        let Some(next) = next else { return };
        slot = next;
    }
    *slot = value;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolvers::push_path;
    use pretty_assertions::assert_eq;
    use service_schema::name;

    fn data(json: serde_json::Value) -> Option<JsonMap> {
        match JsonValue::from(json) {
            JsonValue::Object(map) => Some(map),
            _ => None,
        }
    }

    fn path(segments: &[(ResponseDataPathSegment, bool)]) -> LinkedPath {
        segments
            .iter()
            .fold(None, |path, (segment, non_null)| push_path(&path, segment.clone(), *non_null))
    }

    #[test]
    fn values_are_written_at_their_path() {
        let mut response = data(serde_json::json!({"books": [{"author": null}, {"author": null}]}));
        let author = path(&[
            (ResponseDataPathSegment::Field(name!("books")), false),
            (ResponseDataPathSegment::ListIndex(1), false),
            (ResponseDataPathSegment::Field(name!("author")), false),
        ]);
        write_result(&mut response, &author, Ok(Some(JsonValue::from("Ann"))));
        assert_eq!(
            response,
            data(serde_json::json!({"books": [{"author": null}, {"author": "Ann"}]}))
        );
    }

    #[test]
    fn null_propagates_to_the_nearest_nullable_ancestor() {
        let mut response = data(serde_json::json!({"books": [{"author": null}], "count": 1}));
        let author = path(&[
            (ResponseDataPathSegment::Field(name!("books")), false),
            (ResponseDataPathSegment::ListIndex(0), true),
            (ResponseDataPathSegment::Field(name!("author")), true),
        ]);
        write_result(&mut response, &author, Err(PropagateNull));
        assert_eq!(response, data(serde_json::json!({"books": null, "count": 1})));

        let count = path(&[(ResponseDataPathSegment::Field(name!("count")), true)]);
        write_result(&mut response, &count, Err(PropagateNull));
        assert_eq!(response, None);
    }
}
