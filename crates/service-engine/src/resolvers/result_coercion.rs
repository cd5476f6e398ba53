use crate::operation::FieldSelection;
use crate::operation::Selection;
use crate::resolvers::execution::execute_selection_set;
use crate::resolvers::execution::try_nullify;
use crate::resolvers::push_path;
use crate::resolvers::ExecutionContext;
use crate::resolvers::ExecutionMode;
use crate::resolvers::FieldValue;
use crate::resolvers::LinkedPath;
use crate::resolvers::ObjectValue;
use crate::resolvers::PropagateNull;
use crate::response::JsonMap;
use crate::response::JsonValue;
use crate::response::ResponseDataPathSegment;
use crate::service::ResolvedValue;
use futures::future::join_all;
use futures::future::BoxFuture;
use futures::FutureExt as _;
use service_schema::schema::Type;
use service_schema::schema::TypeKind;
use service_schema::schema::TypeRef;
use service_schema::sources::LineColumn;
use service_schema::Name;

/// <https://spec.graphql.org/October2021/#CompleteValue()>
///
/// Returns `Err` for a field error being propagated upwards to find a nullable place
pub(crate) async fn complete_value(
    ctx: &ExecutionContext<'_>,
    path: &LinkedPath,
    mode: ExecutionMode,
    ty: &TypeRef,
    value: FieldValue,
    fields: &[&FieldSelection],
) -> Result<Option<JsonValue>, PropagateNull> {
    let location = fields[0].location;
    macro_rules! field_error {
        ($($arg: tt)+) => {
            {
                ctx.field_error(format!($($arg)+), path, location);
                return Err(PropagateNull);
            }
        };
    }
    let resolved = match value {
        FieldValue::Object(object_value) => Ok(object_value),
        FieldValue::Resolved(ResolvedValue::Leaf(JsonValue::Null)) => {
            if ty.is_non_null() {
                field_error!("non-null type {ty} resolved to null")
            } else {
                return Ok(Some(JsonValue::Null));
            }
        }
        FieldValue::Resolved(ResolvedValue::List(items)) => {
            return Box::pin(complete_list_value(ctx, path, mode, ty, fields, items)).await;
        }
        FieldValue::Resolved(ResolvedValue::Leaf(JsonValue::Array(items))) if ty.is_list() => {
            let items = items.into_iter().map(ResolvedValue::Leaf).collect();
            return Box::pin(complete_list_value(ctx, path, mode, ty, fields, items)).await;
        }
        FieldValue::Resolved(ResolvedValue::Stream(_)) => {
            field_error!("resolver returned a stream for a field of type {ty} outside of a subscription")
        }
        FieldValue::Resolved(ResolvedValue::Object(object)) => Ok(ObjectValue::Service {
            object,
            prefix: Vec::new(),
        }),
        FieldValue::Resolved(ResolvedValue::Record { type_name, fields }) => {
            Ok(ObjectValue::Record { type_name, fields })
        }
        FieldValue::Resolved(ResolvedValue::Leaf(leaf)) => Err(leaf),
    };

    let ty_name = match ty {
        TypeRef::Named(name) => name,
        TypeRef::NonNull(inner) => match &**inner {
            TypeRef::Named(name) => name,
            _ => field_error!("list type {ty} resolved to a non-list value"),
        },
        TypeRef::List(_) => field_error!("list type {ty} resolved to a non-list value"),
    };
    let schema = &*ctx.engine.schema;
    let Some(ty_def) = schema.get_type(ty_name) else {
        field_error!("undefined type {ty_name}")
    };
    let object_value = match resolved {
        Ok(object_value) => object_value,
        // A JSON object where an object is expected is read like a record
        Err(JsonValue::Object(map)) if !ty_def.is_leaf() => ObjectValue::Record {
            type_name: None,
            fields: map
                .into_iter()
                .map(|(key, value)| (key.as_str().to_owned(), ResolvedValue::Leaf(value)))
                .collect(),
        },
        Err(json_value) => {
            return complete_leaf_value(ctx, path, location, ty_name, ty_def, json_value);
        }
    };
    let resolved_type_name = match &object_value {
        ObjectValue::Service { object, prefix } if prefix.is_empty() => object.type_name(),
        // Intermediate segments of resource paths are typed by the schema
        ObjectValue::Service { .. } => ty_name.as_str(),
        ObjectValue::Record {
            type_name: Some(type_name),
            ..
        } => type_name.as_str(),
        ObjectValue::Record { type_name: None, .. } if ty_def.kind == TypeKind::Object => ty_name.as_str(),
        ObjectValue::Record { type_name: None, .. } => {
            field_error!("resolver returned a record without a type name for abstract type {ty_name}")
        }
    };
    let object_type = match ty_def.kind {
        TypeKind::Enum | TypeKind::Scalar => {
            field_error!("resolver returned an object of type {resolved_type_name}, expected {ty_name}")
        }
        TypeKind::Interface | TypeKind::Union => {
            let Some(object_def) = schema
                .get_type(resolved_type_name)
                .filter(|def| def.kind == TypeKind::Object)
            else {
                field_error!(
                    "resolver returned an object of type {resolved_type_name} \
                     not defined in the schema"
                )
            };
            if ty_def.kind == TypeKind::Union {
                if !ty_def.possible_types.contains(resolved_type_name) {
                    field_error!(
                        "resolver returned an object of type {resolved_type_name}, \
                         expected a member of union type {ty_name}"
                    )
                }
            } else if !(object_def.interfaces.contains(ty_name)
                || schema.is_subtype(ty_name, resolved_type_name))
            {
                field_error!(
                    "resolver returned an object of type {resolved_type_name} \
                     which does not implement interface {ty_name}"
                )
            }
            object_def
        }
        TypeKind::Object => {
            if resolved_type_name == ty_name.as_str() {
                ty_def
            } else {
                field_error!("resolver returned an object of type {resolved_type_name}, expected {ty_name}")
            }
        }
        TypeKind::InputObject | TypeKind::List | TypeKind::NonNull => {
            field_error!("field with input or wrapper type {ty_name}")
        }
    };
    let selections: Vec<&Selection> = fields.iter().flat_map(|field| &field.selection_set).collect();
    execute_sub_selection_set(ctx, path, mode, object_type, &object_value, selections)
        .await
        .map(|map| Some(JsonValue::Object(map)))
}

/// The selection set of a nested object, behind a named `Send` future type.
///
/// Nested objects recurse through this type so that field chains can box their futures as `Send`.
fn execute_sub_selection_set<'a>(
    ctx: &'a ExecutionContext<'_>,
    path: &'a LinkedPath,
    mode: ExecutionMode,
    object_type: &'a Type,
    object_value: &'a ObjectValue,
    selections: Vec<&'a Selection>,
) -> BoxFuture<'a, Result<JsonMap, PropagateNull>> {
    execute_selection_set(ctx, path, mode, object_type, object_value, selections).boxed()
}

async fn complete_list_value(
    ctx: &ExecutionContext<'_>,
    path: &LinkedPath,
    mode: ExecutionMode,
    ty: &TypeRef,
    fields: &[&FieldSelection],
    items: Vec<ResolvedValue>,
) -> Result<Option<JsonValue>, PropagateNull> {
    let inner_ty = match ty {
        TypeRef::List(inner_ty) => inner_ty,
        TypeRef::NonNull(inner) => match &**inner {
            TypeRef::List(inner_ty) => inner_ty,
            _ => return non_list_error(ctx, path, ty, fields),
        },
        TypeRef::Named(_) => return non_list_error(ctx, path, ty, fields),
    };
    let item_futures = items.into_iter().enumerate().map(move |(index, item)| {
        let inner_path = push_path(path, ResponseDataPathSegment::ListIndex(index), inner_ty.is_non_null());
        async move {
            complete_value(ctx, &inner_path, mode, inner_ty, FieldValue::Resolved(item), fields).await
        }
    });
    let results = match mode {
        ExecutionMode::Normal => join_all(item_futures).await,
        ExecutionMode::Sequential => {
            let mut results = Vec::new();
            for item_future in item_futures {
                results.push(item_future.await)
            }
            results
        }
    };
    let mut completed_list = Vec::with_capacity(results.len());
    for inner_result in results {
        // On field error, try to nullify that item
        match try_nullify(inner_ty, inner_result) {
            Ok(None) => {}
            Ok(Some(inner_value)) => completed_list.push(inner_value),
            // If the item is non-null, try to nullify the list
            Err(PropagateNull) => return try_nullify(ty, Err(PropagateNull)),
        }
    }
    Ok(Some(completed_list.into()))
}

fn non_list_error(
    ctx: &ExecutionContext<'_>,
    path: &LinkedPath,
    ty: &TypeRef,
    fields: &[&FieldSelection],
) -> Result<Option<JsonValue>, PropagateNull> {
    ctx.field_error(
        format!("Non-list type {ty} resolved to a list"),
        path,
        fields[0].location,
    );
    Err(PropagateNull)
}

fn complete_leaf_value(
    ctx: &ExecutionContext<'_>,
    path: &LinkedPath,
    location: Option<LineColumn>,
    ty_name: &Name,
    ty_def: &Type,
    json_value: JsonValue,
) -> Result<Option<JsonValue>, PropagateNull> {
    macro_rules! field_error {
        ($($arg: tt)+) => {
            {
                ctx.field_error(format!($($arg)+), path, location);
                return Err(PropagateNull);
            }
        };
    }
    match ty_def.kind {
        TypeKind::Enum => {
            // https://spec.graphql.org/October2021/#sec-Enums.Result-Coercion
            if !json_value
                .as_str()
                .is_some_and(|str| ty_def.enum_values.contains_key(str))
            {
                field_error!("resolver returned {json_value}, expected enum {ty_name}")
            }
        }
        TypeKind::Scalar => match ty_name.as_str() {
            "Int" => {
                // https://spec.graphql.org/October2021/#sec-Int.Result-Coercion
                if let Some(int) = json_value.as_i64() {
                    if i32::try_from(int).is_err() {
                        field_error!("resolver returned {json_value} which overflows Int")
                    }
                } else {
                    field_error!("resolver returned {json_value}, expected Int")
                }
            }
            "Float" => {
                // https://spec.graphql.org/October2021/#sec-Float.Result-Coercion
                if !json_value.is_number() {
                    field_error!("resolver returned {json_value}, expected Float")
                }
            }
            "Decimal" => {
                let is_decimal = match &json_value {
                    JsonValue::Number(_) => true,
                    JsonValue::String(text) => text.as_str().parse::<f64>().is_ok(),
                    _ => false,
                };
                if !is_decimal {
                    field_error!("resolver returned {json_value}, expected Decimal")
                }
            }
            "String" => {
                // https://spec.graphql.org/October2021/#sec-String.Result-Coercion
                if !json_value.is_string() {
                    field_error!("resolver returned {json_value}, expected String")
                }
            }
            "Boolean" => {
                // https://spec.graphql.org/October2021/#sec-Boolean.Result-Coercion
                if !json_value.is_boolean() {
                    field_error!("resolver returned {json_value}, expected Boolean")
                }
            }
            "ID" => {
                // https://spec.graphql.org/October2021/#sec-ID.Result-Coercion
                if !(json_value.is_string() || json_value.is_i64()) {
                    field_error!("resolver returned {json_value}, expected ID")
                }
            }
            _ => {
                // Custom scalars like `Upload` accept any JSON value
            }
        },
        TypeKind::Object | TypeKind::Interface | TypeKind::Union => {
            field_error!("resolver returned a leaf value but expected an object for type {ty_name}")
        }
        TypeKind::InputObject | TypeKind::List | TypeKind::NonNull => {
            field_error!("field with input or wrapper type {ty_name}")
        }
    }
    Ok(Some(json_value))
}
