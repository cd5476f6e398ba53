use crate::context::Field;
use crate::dataloader::DataLoader;
use crate::directives::ExecutableDirective;
use crate::directives::ExtensionPoint;
use crate::directives::Interceptor;
use crate::directives::Next;
use crate::error::ResolveError;
use crate::lanes::Lane;
use crate::operation::DirectiveApplication;
use crate::operation::FieldSelection;
use crate::operation::Selection;
use crate::resolvers::is_top_level;
use crate::resolvers::lane_of;
use crate::resolvers::path_to_vec;
use crate::resolvers::push_path;
use crate::resolvers::resolve_service_field;
use crate::resolvers::result_coercion::complete_value;
use crate::resolvers::Dispatch;
use crate::resolvers::ExecutionContext;
use crate::resolvers::ExecutionMode;
use crate::resolvers::FieldValue;
use crate::resolvers::LinkedPath;
use crate::resolvers::ObjectValue;
use crate::resolvers::Placeholder;
use crate::resolvers::PropagateNull;
use crate::response::JsonMap;
use crate::response::JsonValue;
use crate::response::ResponseDataPathSegment;
use crate::service::find_load_method;
use crate::service::ResolvedValue;
use crate::service::ServiceObject;
use futures::future::join_all;
use futures::future::BoxFuture;
use futures::FutureExt as _;
use indexmap::IndexMap;
use service_schema::schema;
use service_schema::schema::Type;
use service_schema::schema::TypeKind;
use service_schema::schema::TypeRef;
use service_schema::Name;
use service_schema::Schema;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// <https://spec.graphql.org/October2021/#ExecuteSelectionSet()>
pub(crate) async fn execute_selection_set<'a>(
    ctx: &ExecutionContext<'_>,
    path: &LinkedPath,
    mode: ExecutionMode,
    object_type: &Type,
    object_value: &ObjectValue,
    selections: impl IntoIterator<Item = &'a Selection>,
) -> Result<JsonMap, PropagateNull> {
    let schema = &*ctx.engine.schema;
    let mut grouped_field_set = IndexMap::new();
    collect_fields_into(schema, object_type, selections, &mut grouped_field_set);

    let mut field_futures = Vec::with_capacity(grouped_field_set.len());
    for (response_key, fields) in &grouped_field_set {
        // Indexing should not panic: `collect_fields` only creates a `Vec` to push to it
        let field_name = &fields[0].name;
        let field_def = if field_name == "__typename" && ctx.engine.config.introspection_typename {
            None
        } else if let Some(field_def) = object_type.fields.get(field_name.as_str()) {
            Some(field_def)
        } else {
            tracing::debug!(r#type = %object_type.name, field = %field_name, "field not defined, skipped");
            continue;
        };
        let field_path = push_path(
            path,
            ResponseDataPathSegment::Field(response_key.clone()),
            field_def.is_some_and(|def| def.ty.is_non_null()),
        );
        field_futures.push(async move {
            let result = match field_def {
                None => Ok(Some(JsonValue::from(object_type.name.as_str()))),
                Some(field_def) => {
                    execute_field(ctx, &field_path, mode, object_type, object_value, field_def, fields, None)
                        .await
                }
            };
            (response_key, result)
        });
    }

    let results = match mode {
        ExecutionMode::Normal => join_all(field_futures).await,
        ExecutionMode::Sequential => {
            let mut results = Vec::with_capacity(field_futures.len());
            for field_future in field_futures {
                results.push(field_future.await)
            }
            results
        }
    };
    let mut response_map = JsonMap::with_capacity(results.len());
    for (response_key, result) in results {
        if let Some(value) = result? {
            response_map.insert(response_key.as_str(), value);
        }
    }
    Ok(response_map)
}

/// <https://spec.graphql.org/October2021/#CollectFields()>
pub(crate) fn collect_fields<'a>(
    schema: &Schema,
    object_type: &Type,
    selections: impl IntoIterator<Item = &'a Selection>,
) -> IndexMap<Name, Vec<&'a FieldSelection>> {
    let mut grouped_fields = IndexMap::new();
    collect_fields_into(schema, object_type, selections, &mut grouped_fields);
    grouped_fields
}

fn collect_fields_into<'a>(
    schema: &Schema,
    object_type: &Type,
    selections: impl IntoIterator<Item = &'a Selection>,
    grouped_fields: &mut IndexMap<Name, Vec<&'a FieldSelection>>,
) {
    for selection in selections {
        if eval_if_arg(selection.directives(), "skip").unwrap_or(false)
            || !eval_if_arg(selection.directives(), "include").unwrap_or(true)
        {
            continue;
        }
        match selection {
            Selection::Field(field) => grouped_fields
                .entry(field.response_key().clone())
                .or_default()
                .push(field),
            Selection::InlineFragment(inline) => {
                if let Some(condition) = &inline.type_condition {
                    if !does_fragment_type_apply(schema, object_type, condition) {
                        continue;
                    }
                }
                collect_fields_into(schema, object_type, &inline.selection_set, grouped_fields)
            }
        }
    }
}

/// <https://spec.graphql.org/October2021/#DoesFragmentTypeApply()>
fn does_fragment_type_apply(schema: &Schema, object_type: &Type, fragment_type: &Name) -> bool {
    match schema.get_type(fragment_type) {
        Some(def) if def.kind == TypeKind::Object => *fragment_type == object_type.name,
        Some(def) if def.kind == TypeKind::Interface => object_type.interfaces.contains(fragment_type),
        Some(def) if def.kind == TypeKind::Union => def.possible_types.contains(&object_type.name),
        // Undefined or not an output type
        _ => false,
    }
}

fn eval_if_arg(directives: &[DirectiveApplication], directive_name: &str) -> Option<bool> {
    directives
        .iter()
        .find(|directive| directive.name == directive_name)?
        .arguments
        .get("if")?
        .as_bool()
}

/// <https://spec.graphql.org/October2021/#ExecuteField()>
///
/// `loaders` is `Some` when resolving a field deferred to data loaders.
///
/// Return `Ok(None)` for silently skipping that field.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn execute_field(
    ctx: &ExecutionContext<'_>,
    path: &LinkedPath,
    mode: ExecutionMode,
    object_type: &Type,
    object_value: &ObjectValue,
    field_def: &schema::Field,
    fields: &[&FieldSelection],
    loaders: Option<IndexMap<String, DataLoader>>,
) -> Result<Option<JsonValue>, PropagateNull> {
    let field = fields[0];
    if loaders.is_none() {
        if let ObjectValue::Service { object, prefix } = object_value {
            if prefix.is_empty() {
                if let Some(load_method) = find_load_method(&**object, &field.name) {
                    return defer_field(ctx, path, object, load_method, object_type, field_def, fields).await;
                }
            }
        }
    }
    let info = Field::new(field, field_def.ty.clone(), path_to_vec(path));
    let links = match chain_links(ctx, path, field) {
        Ok(links) => links,
        Err(error) => {
            ctx.field_error(error.message, path, field.location);
            return try_nullify(&field_def.ty, Err(PropagateNull));
        }
    };
    if links.is_empty() {
        let result = resolve_field_value(ctx, path, mode, object_value, field_def, fields, &info, loaders).await;
        return try_nullify(&field_def.ty, result);
    }

    // Built inside-out: each link receives the rest of the chain as `Next`
    let propagated = AtomicBool::new(false);
    let accepted_null = AtomicBool::new(false);
    let (info, propagated_ref, accepted_null_ref) = (&info, &propagated, &accepted_null);
    let mut next = Next::new(move || {
        async move {
            match resolve_field_value(ctx, path, mode, object_value, field_def, fields, info, loaders).await {
                Ok(value) => {
                    let value = value.unwrap_or(JsonValue::Null);
                    accepted_null_ref.store(value.is_null(), Ordering::Relaxed);
                    value
                }
                Err(PropagateNull) => {
                    propagated_ref.store(true, Ordering::Relaxed);
                    JsonValue::Null
                }
            }
        }
        .boxed()
    });
    for link in links.iter().rev() {
        let inner = next;
        next = Next::new(move || {
            async move {
                let lane = ctx.engine.lanes.acquire(Lane::Interceptor, link.isolated()).await;
                tracing::trace!(link = link.name(), field = %field.name, "running chain link");
                match link.call(ctx.context, info, inner.holding(lane)).await {
                    Ok(value) => value,
                    Err(error) => {
                        tracing::debug!(link = link.name(), field = %field.name, error = %error.message, "chain link failed");
                        ctx.field_error(error.message, path, field.location);
                        propagated_ref.store(true, Ordering::Relaxed);
                        JsonValue::Null
                    }
                }
            }
            .boxed()
        });
    }
    let value = next.run().await;
    if value.is_null() && field_def.ty.is_non_null() {
        if propagated.load(Ordering::Relaxed) {
            return Err(PropagateNull);
        }
        if !accepted_null.load(Ordering::Relaxed) {
            ctx.field_error(
                format!("non-null type {} resolved to null", field_def.ty),
                path,
                field.location,
            );
            return Err(PropagateNull);
        }
    }
    Ok(Some(value))
}

/// Resolves a field without its interceptors and directives, then completes the value.
#[allow(clippy::too_many_arguments)]
async fn resolve_field_value(
    ctx: &ExecutionContext<'_>,
    path: &LinkedPath,
    mode: ExecutionMode,
    object_value: &ObjectValue,
    field_def: &schema::Field,
    fields: &[&FieldSelection],
    info: &Field,
    loaders: Option<IndexMap<String, DataLoader>>,
) -> Result<Option<JsonValue>, PropagateNull> {
    let field = fields[0];
    let resolved = match object_value {
        ObjectValue::Record { fields: record, .. } => {
            record_field(record, field_def, field).map(FieldValue::Resolved)
        }
        ObjectValue::Service { object, prefix } => {
            match resolve_service_field(ctx, path, object, prefix, field, info, loaders.unwrap_or_default()).await {
                Dispatch::Value(value) => Ok(value),
                Dispatch::Null => return Ok(Some(JsonValue::Null)),
                Dispatch::Failed(error) => Err(error),
            }
        }
    };
    match resolved {
        Ok(value) => Box::pin(complete_value(ctx, path, mode, &field_def.ty, value, fields)).await,
        Err(ResolveError { message }) => {
            ctx.field_error(message, path, field.location);
            Err(PropagateNull)
        }
    }
}

/// Reads a sub-field of a record. Fields with a `key` argument index into a map.
fn record_field(
    record: &IndexMap<String, ResolvedValue>,
    field_def: &schema::Field,
    field: &FieldSelection,
) -> Result<ResolvedValue, ResolveError> {
    let Some(value) = record.get(field.name.as_str()) else {
        return Ok(ResolvedValue::null());
    };
    if field_def.arg("key").is_none() {
        return value.share();
    }
    let Some(key) = field.arguments.get("key").and_then(JsonValue::as_str) else {
        return Err(ResolveError::new(format!(
            "field `{}` requires a string `key` argument",
            field.name
        )));
    };
    match value {
        ResolvedValue::Record { fields, .. } => fields
            .get(key)
            .map_or(Ok(ResolvedValue::null()), ResolvedValue::share),
        ResolvedValue::Leaf(JsonValue::Object(map)) => {
            Ok(map.get(key).cloned().map_or(ResolvedValue::null(), ResolvedValue::Leaf))
        }
        ResolvedValue::Leaf(JsonValue::Null) => Ok(ResolvedValue::null()),
        _ => Err(ResolveError::new(format!("field `{}` is not a map", field.name))),
    }
}

/// First phase of a field with a load method: the load method schedules keys
/// and the field is resolved later, once the loaders have been flushed.
async fn defer_field(
    ctx: &ExecutionContext<'_>,
    path: &LinkedPath,
    object: &Arc<dyn ServiceObject>,
    load_method: &crate::service::MethodInfo,
    object_type: &Type,
    field_def: &schema::Field,
    fields: &[&FieldSelection],
) -> Result<Option<JsonValue>, PropagateNull> {
    let field = fields[0];
    let Some(annotation) = &load_method.loader else {
        return Ok(Some(JsonValue::Null));
    };
    let loaders = ctx.loaders.scope(object.loader_key(), annotation);
    let info = Field::new(field, field_def.ty.clone(), path_to_vec(path));
    let lane = lane_of(load_method);
    match super::invoke(ctx, object, load_method, lane, &field.arguments, &info, loaders.clone()).await {
        Ok(_) => {}
        Err(super::InvokeError::Constraint(violations)) => {
            super::report_violations(ctx, path, field, &violations);
            return Ok(Some(JsonValue::Null));
        }
        Err(super::InvokeError::Resolver(error)) => {
            ctx.field_error(error.message, path, field.location);
            return try_nullify(&field_def.ty, Err(PropagateNull));
        }
    }
    tracing::trace!(field = %field.name, "field deferred to data loaders");
    ctx.defer(Placeholder {
        path: path.clone(),
        object: object.clone(),
        parent_type: object_type.name.clone(),
        field_name: field_def.name.clone(),
        fields: fields.iter().map(|field| (*field).clone()).collect(),
        loaders,
    });
    Ok(Some(JsonValue::Null))
}

/// A link of the chain wrapped around the resolver of a field
enum Link {
    Directive(Arc<dyn ExecutableDirective>, ExtensionPoint),
    Interceptor(Arc<dyn Interceptor>),
}

impl Link {
    fn name(&self) -> &str {
        match self {
            Self::Directive(_, point) => point.method_name(),
            Self::Interceptor(interceptor) => interceptor.name(),
        }
    }

    fn isolated(&self) -> bool {
        match self {
            Self::Directive(directive, _) => directive.isolated(),
            Self::Interceptor(interceptor) => interceptor.isolated(),
        }
    }

    fn call<'a>(
        &'a self,
        context: &'a crate::context::Context,
        field: &'a Field,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<JsonValue, ResolveError>> {
        match self {
            Self::Directive(directive, point) => directive.apply(*point, context, field, next),
            Self::Interceptor(interceptor) => interceptor.execute(context, field, next),
        }
    }
}

/// Operation directives (top-level fields only), then field directives in declared order,
/// then interceptors. The first link is the outermost.
fn chain_links(
    ctx: &ExecutionContext<'_>,
    path: &LinkedPath,
    field: &FieldSelection,
) -> Result<Vec<Link>, ResolveError> {
    let mut links = Vec::new();
    if is_top_level(path) {
        let point = ExtensionPoint::for_operation(ctx.kind);
        links.extend(
            ctx.operation_directives
                .iter()
                .map(|directive| Link::Directive(directive.clone(), point)),
        );
    }
    for application in &field.directives {
        if matches!(application.name.as_str(), "skip" | "include") {
            continue;
        }
        let Some(factory) = ctx.engine.directives.get(application.name.as_str()) else {
            tracing::warn!(directive = %application.name, "no executable directive registered, skipped");
            continue;
        };
        let directive = factory(&application.arguments)?;
        if directive.extension_points().contains(&ExtensionPoint::Field) {
            links.push(Link::Directive(directive, ExtensionPoint::Field))
        } else {
            tracing::warn!(
                directive = %application.name,
                extension_point = %ExtensionPoint::Field,
                "directive has no method for this extension point, skipped"
            );
        }
    }
    links.extend(ctx.engine.interceptors.iter().cloned().map(Link::Interceptor));
    Ok(links)
}

/// Try to insert a propagated null if possible, or keep propagating it.
///
/// <https://spec.graphql.org/October2021/#sec-Handling-Field-Errors>
pub(crate) fn try_nullify(
    ty: &TypeRef,
    result: Result<Option<JsonValue>, PropagateNull>,
) -> Result<Option<JsonValue>, PropagateNull> {
    match result {
        Ok(json) => Ok(json),
        Err(PropagateNull) => {
            if ty.is_non_null() {
                Err(PropagateNull)
            } else {
                Ok(Some(JsonValue::Null))
            }
        }
    }
}
