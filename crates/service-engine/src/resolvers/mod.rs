//! Execution of operations, one field at a time, against service objects.
//!
//! Fields of a query run in [`ExecutionMode::Normal`]: their resolvers may be in flight
//! concurrently. Top-level fields of a mutation run in [`ExecutionMode::Sequential`].
//! Independently of the mode, a call to a non-isolated method waits for its
//! [lane][crate::lanes].

use crate::arguments::build_arguments;
use crate::arguments::validate_constraints;
use crate::arguments::ConstraintViolation;
use crate::context::Context;
use crate::context::Field;
use crate::dataloader::DataLoader;
use crate::dataloader::LoaderRegistry;
use crate::directives::ExecutableDirective;
use crate::directives::ExtensionPoint;
use crate::error::ResolveError;
use crate::lanes::Lane;
use crate::operation::FieldSelection;
use crate::operation::Operation;
use crate::operation::OperationKind;
use crate::operation::Selection;
use crate::response::ExecutionResponse;
use crate::response::GraphQLError;
use crate::response::JsonMap;
use crate::response::JsonValue;
use crate::response::ResponseDataPathSegment;
use crate::service::find_remote_method;
use crate::service::find_resource_method;
use crate::service::has_resource_below;
use crate::service::Completion;
use crate::service::Invocation;
use crate::service::MethodInfo;
use crate::service::ResolvedValue;
use crate::service::ServiceObject;
use crate::Engine;
use futures::stream;
use futures::stream::BoxStream;
use futures::StreamExt as _;
use indexmap::IndexMap;
use service_schema::descriptor::GET_ACCESSOR;
use service_schema::descriptor::SUBSCRIBE_ACCESSOR;
use service_schema::schema::Type;
use service_schema::sources::LineColumn;
use service_schema::Name;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

mod execution;
mod placeholders;
mod result_coercion;

use self::execution::collect_fields;
use self::execution::execute_selection_set;
use self::placeholders::resolve_placeholders;
pub(crate) use self::placeholders::Placeholder;

/// <https://spec.graphql.org/October2021/#sec-Normal-and-Serial-Execution>
#[derive(Debug, Copy, Clone)]
pub(crate) enum ExecutionMode {
    /// Allowed to resolve fields in any order, including concurrently
    Normal,
    /// Top-level fields of a mutation operation must be executed in order
    Sequential,
}

/// Return in `Err` when a field error occurred at some non-nullable place
///
/// <https://spec.graphql.org/October2021/#sec-Handling-Field-Errors>
pub(crate) struct PropagateNull;

/// Persistent linked list of response path segments, innermost first.
///
/// Shared tails make it cheap to keep the path of a deferred field around.
pub(crate) type LinkedPath = Option<Arc<LinkedPathElement>>;

pub(crate) struct LinkedPathElement {
    pub(crate) element: ResponseDataPathSegment,
    /// Whether the value at this segment is non-null, which makes nulls propagate past it
    pub(crate) non_null: bool,
    pub(crate) next: LinkedPath,
}

pub(crate) fn push_path(path: &LinkedPath, element: ResponseDataPathSegment, non_null: bool) -> LinkedPath {
    Some(Arc::new(LinkedPathElement {
        element,
        non_null,
        next: path.clone(),
    }))
}

pub(crate) fn path_to_vec(path: &LinkedPath) -> Vec<ResponseDataPathSegment> {
    let mut segments = Vec::new();
    let mut link = path.as_deref();
    while let Some(node) = link {
        segments.push(node.element.clone());
        link = node.next.as_deref();
    }
    segments.reverse();
    segments
}

fn is_top_level(path: &LinkedPath) -> bool {
    path.as_ref().is_some_and(|node| node.next.is_none())
}

pub(crate) struct ExecutionContext<'a> {
    pub(crate) engine: &'a Engine,
    pub(crate) kind: OperationKind,
    pub(crate) context: &'a Context,
    /// Directives of the operation itself, wrapping its top-level fields
    pub(crate) operation_directives: Vec<Arc<dyn ExecutableDirective>>,
    pub(crate) errors: Mutex<Vec<GraphQLError>>,
    pub(crate) loaders: LoaderRegistry,
    pub(crate) placeholders: Mutex<Vec<Placeholder>>,
}

/// An object whose selection set is being executed
pub(crate) enum ObjectValue {
    /// Sub-fields are resolved by methods. A non-empty `prefix` stands for
    /// an intermediate segment of hierarchical resource paths.
    Service {
        object: Arc<dyn ServiceObject>,
        prefix: Vec<String>,
    },
    /// Sub-fields are read by name
    Record {
        type_name: Option<Name>,
        fields: IndexMap<String, ResolvedValue>,
    },
}

/// A resolved field value about to be completed against the field type
pub(crate) enum FieldValue {
    Resolved(ResolvedValue),
    Object(ObjectValue),
}

enum Dispatch {
    Value(FieldValue),
    /// No resolver applies, or the arguments were rejected: the field is null without propagation
    Null,
    Failed(ResolveError),
}

enum InvokeError {
    Constraint(Vec<ConstraintViolation>),
    Resolver(ResolveError),
}

impl<'a> ExecutionContext<'a> {
    fn new(
        engine: &'a Engine,
        kind: OperationKind,
        context: &'a Context,
        operation_directives: Vec<Arc<dyn ExecutableDirective>>,
    ) -> Self {
        Self {
            engine,
            kind,
            context,
            operation_directives,
            errors: Mutex::new(Vec::new()),
            loaders: LoaderRegistry::default(),
            placeholders: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn field_error(
        &self,
        message: impl Into<String>,
        path: &LinkedPath,
        location: Option<LineColumn>,
    ) {
        let mut error = GraphQLError::new(message, location);
        error.path = path_to_vec(path);
        self.errors.lock().unwrap_or_else(PoisonError::into_inner).push(error);
    }

    pub(crate) fn defer(&self, placeholder: Placeholder) {
        self.placeholders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(placeholder);
    }

    /// Takes the fields deferred so far
    pub(crate) fn take_placeholders(&self) -> Vec<Placeholder> {
        std::mem::take(&mut *self.placeholders.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn into_errors(self) -> Vec<GraphQLError> {
        self.errors.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Builds the directives applied to the operation itself, keeping those with a method
/// for the operation's extension point.
fn operation_directives(
    engine: &Engine,
    operation: &Operation,
) -> Result<Vec<Arc<dyn ExecutableDirective>>, ResolveError> {
    let point = ExtensionPoint::for_operation(operation.kind);
    let mut directives = Vec::new();
    for application in &operation.directives {
        let Some(factory) = engine.directives.get(application.name.as_str()) else {
            tracing::warn!(directive = %application.name, "no executable directive registered, skipped");
            continue;
        };
        let directive = factory(&application.arguments)?;
        if directive.extension_points().contains(&point) {
            directives.push(directive)
        } else {
            tracing::warn!(
                directive = %application.name,
                extension_point = %point,
                "directive has no method for this extension point, skipped"
            );
        }
    }
    Ok(directives)
}

pub(crate) async fn execute_operation(
    engine: &Engine,
    operation: &Operation,
    context: &Context,
) -> ExecutionResponse {
    let schema = &*engine.schema;
    let (root_type, mode) = match operation.kind {
        OperationKind::Query => (schema.query_type(), ExecutionMode::Normal),
        OperationKind::Mutation => (schema.mutation_type(), ExecutionMode::Sequential),
        OperationKind::Subscription => {
            return ExecutionResponse::request_error(
                "subscription operations are executed with `Engine::subscribe`",
            )
        }
    };
    let Some(root_type) = root_type else {
        return ExecutionResponse::request_error(format!(
            "the schema does not support {} operations",
            operation.kind
        ));
    };
    let directives = match operation_directives(engine, operation) {
        Ok(directives) => directives,
        Err(error) => return ExecutionResponse::request_error(error.message),
    };
    tracing::debug!(kind = %operation.kind, name = ?operation.name, "executing operation");
    let ctx = ExecutionContext::new(engine, operation.kind, context, directives);
    let root = ObjectValue::Service {
        object: engine.root.clone(),
        prefix: Vec::new(),
    };
    let data = run_selection_set(&ctx, mode, root_type, &root, &operation.selection_set).await;
    ExecutionResponse {
        errors: ctx.into_errors(),
        data,
    }
}

/// Executes a root selection set, then every field deferred to a data loader.
async fn run_selection_set(
    ctx: &ExecutionContext<'_>,
    mode: ExecutionMode,
    root_type: &Type,
    root: &ObjectValue,
    selections: &[Selection],
) -> Option<JsonMap> {
    let mut data = execute_selection_set(ctx, &None, mode, root_type, root, selections)
        .await
        .ok();
    resolve_placeholders(ctx, &mut data).await;
    data
}

/// Resolves the source stream of a subscription, then executes the selection set once per event.
pub(crate) async fn subscribe<'a>(
    engine: &'a Engine,
    operation: &'a Operation,
    context: Context,
) -> BoxStream<'a, ExecutionResponse> {
    let single = |response: ExecutionResponse| stream::once(async { response }).boxed();
    if operation.kind != OperationKind::Subscription {
        return single(ExecutionResponse::request_error(format!(
            "expected a subscription operation, found a {} operation",
            operation.kind
        )));
    }
    let Some(subscription_type) = engine.schema.subscription_type() else {
        return single(ExecutionResponse::request_error(
            "the schema does not support subscription operations",
        ));
    };
    let grouped = collect_fields(&engine.schema, subscription_type, &operation.selection_set);
    let mut grouped = grouped.into_iter();
    let (Some((response_key, fields)), None) = (grouped.next(), grouped.next()) else {
        return single(ExecutionResponse::request_error(
            "a subscription operation must select exactly one top-level field",
        ));
    };
    let field = fields[0];
    let ctx = ExecutionContext::new(engine, operation.kind, &context, Vec::new());
    let Some(field_def) = subscription_type.fields.get(field.name.as_str()) else {
        return single(ExecutionResponse::request_error(format!(
            "no field `{}` on type `{}`",
            field.name, subscription_type.name
        )));
    };
    let path = push_path(&None, ResponseDataPathSegment::Field(response_key.clone()), false);
    let info = Field::new(field, field_def.ty.clone(), path_to_vec(&path));
    let root = &engine.root;
    let source = match find_resource_method(&**root, SUBSCRIBE_ACCESSOR, &[field.name.as_str()]) {
        None => Ok(None),
        Some(method) => invoke(&ctx, root, method, Lane::Resource, &field.arguments, &info, IndexMap::new())
            .await
            .map(Some),
    };
    let source = match source {
        Ok(Some(ResolvedValue::Stream(source))) => source.into_inner(),
        Ok(Some(_)) => {
            ctx.field_error("subscription resolver did not return a stream", &path, field.location);
            return single(event_error(ctx, &response_key, field_def.ty.is_non_null()));
        }
        Ok(None) => {
            tracing::debug!(field = %field.name, "no subscribe resolver");
            let mut data = JsonMap::new();
            data.insert(response_key.as_str(), JsonValue::Null);
            return single(ExecutionResponse {
                errors: ctx.into_errors(),
                data: Some(data),
            });
        }
        Err(InvokeError::Constraint(violations)) => {
            report_violations(&ctx, &path, field, &violations);
            let mut data = JsonMap::new();
            data.insert(response_key.as_str(), JsonValue::Null);
            return single(ExecutionResponse {
                errors: ctx.into_errors(),
                data: Some(data),
            });
        }
        Err(InvokeError::Resolver(error)) => {
            ctx.field_error(error.message, &path, field.location);
            return single(event_error(ctx, &response_key, field_def.ty.is_non_null()));
        }
    };
    drop(ctx);
    let field_name = field.name.clone();
    let non_null = field_def.ty.is_non_null();
    source
        .then(move |event| {
            let context = context.clone();
            let response_key = response_key.clone();
            let field_name = field_name.clone();
            async move {
                match event {
                    Ok(value) => execute_event(engine, operation, &context, &field_name, value).await,
                    Err(error) => {
                        let ctx = ExecutionContext::new(engine, operation.kind, &context, Vec::new());
                        let path = push_path(&None, ResponseDataPathSegment::Field(response_key.clone()), false);
                        ctx.field_error(error.message, &path, None);
                        event_error(ctx, &response_key, non_null)
                    }
                }
            }
        })
        .boxed()
}

fn event_error(ctx: ExecutionContext<'_>, response_key: &Name, non_null: bool) -> ExecutionResponse {
    let data = (!non_null).then(|| {
        let mut data = JsonMap::new();
        data.insert(response_key.as_str(), JsonValue::Null);
        data
    });
    ExecutionResponse {
        errors: ctx.into_errors(),
        data,
    }
}

/// Executes the selection set of a subscription against one event of its source stream.
async fn execute_event(
    engine: &Engine,
    operation: &Operation,
    context: &Context,
    field_name: &Name,
    value: ResolvedValue,
) -> ExecutionResponse {
    let Some(subscription_type) = engine.schema.subscription_type() else {
        return ExecutionResponse::request_error("the schema does not support subscription operations");
    };
    let directives = match operation_directives(engine, operation) {
        Ok(directives) => directives,
        Err(error) => return ExecutionResponse::request_error(error.message),
    };
    let ctx = ExecutionContext::new(engine, operation.kind, context, directives);
    let event = ObjectValue::Record {
        type_name: Some(subscription_type.name.clone()),
        fields: [(field_name.to_string(), value)].into_iter().collect(),
    };
    let data = run_selection_set(
        &ctx,
        ExecutionMode::Normal,
        subscription_type,
        &event,
        &operation.selection_set,
    )
    .await;
    ExecutionResponse {
        errors: ctx.into_errors(),
        data,
    }
}

/// Finds and calls the method resolving `field` on a service object.
async fn resolve_service_field(
    ctx: &ExecutionContext<'_>,
    path: &LinkedPath,
    object: &Arc<dyn ServiceObject>,
    prefix: &[String],
    field: &FieldSelection,
    info: &Field,
    loaders: IndexMap<String, DataLoader>,
) -> Dispatch {
    let is_mutation_field = ctx.kind == OperationKind::Mutation && prefix.is_empty() && is_top_level(path);
    let (method, lane) = if is_mutation_field {
        match find_remote_method(&**object, &field.name) {
            Some(method) => (method, Lane::Remote),
            None => {
                tracing::debug!(field = %field.name, "no remote method");
                return Dispatch::Null;
            }
        }
    } else {
        let mut full_path: Vec<&str> = prefix.iter().map(String::as_str).collect();
        full_path.push(field.name.as_str());
        match find_resource_method(&**object, GET_ACCESSOR, &full_path) {
            Some(method) => (method, Lane::Resource),
            None if has_resource_below(&**object, &full_path) => {
                return Dispatch::Value(FieldValue::Object(ObjectValue::Service {
                    object: object.clone(),
                    prefix: full_path.into_iter().map(str::to_owned).collect(),
                }))
            }
            None => {
                tracing::debug!(path = ?full_path, "no resource method");
                return Dispatch::Null;
            }
        }
    };
    match invoke(ctx, object, method, lane, &field.arguments, info, loaders).await {
        Ok(value) => Dispatch::Value(FieldValue::Resolved(value)),
        Err(InvokeError::Constraint(violations)) => {
            report_violations(ctx, path, field, &violations);
            Dispatch::Null
        }
        Err(InvokeError::Resolver(error)) => Dispatch::Failed(error),
    }
}

fn lane_of(method: &MethodInfo) -> Lane {
    if method.is_remote() {
        Lane::Remote
    } else {
        Lane::Resource
    }
}

/// Calls `method` and waits for its completion.
///
/// The call holds `lane` until it completes unless both the object and the method are isolated.
async fn invoke(
    ctx: &ExecutionContext<'_>,
    object: &Arc<dyn ServiceObject>,
    method: &MethodInfo,
    lane: Lane,
    arguments: &JsonMap,
    field: &Field,
    loaders: IndexMap<String, DataLoader>,
) -> Result<ResolvedValue, InvokeError> {
    let arguments = build_arguments(method, arguments, ctx.context, field);
    if ctx.engine.config.validation {
        validate_constraints(method, &arguments).map_err(InvokeError::Constraint)?;
    }
    let concurrent = object.isolated() && method.isolated;
    let guard = ctx.engine.lanes.acquire(lane, concurrent).await;
    let (completion, receiver) = Completion::channel();
    tracing::debug!(
        object = object.type_name(),
        method = %method.name,
        concurrent,
        "invoking resolver"
    );
    let call = Invocation::new(method, arguments, ctx.context.clone(), field.clone(), loaders);
    object.invoke(call, completion);
    let received = match ctx.engine.config.resolver_timeout() {
        Some(limit) => match tokio::time::timeout(limit, receiver).await {
            Ok(received) => received,
            Err(_) => {
                let millis = ctx.engine.config.resolver_timeout_ms.unwrap_or_default();
                tracing::warn!(method = %method.name, millis, "resolver timed out");
                return Err(InvokeError::Resolver(ResolveError::timed_out(&method.name, millis)));
            }
        },
        None => receiver.await,
    };
    drop(guard);
    match received {
        Ok(result) => result.map_err(InvokeError::Resolver),
        Err(_) => {
            tracing::warn!(method = %method.name, "resolver dropped its completion");
            Err(InvokeError::Resolver(ResolveError::dropped_completion(&method.name)))
        }
    }
}

fn report_violations(
    ctx: &ExecutionContext<'_>,
    path: &LinkedPath,
    field: &FieldSelection,
    violations: &[ConstraintViolation],
) {
    let details: Vec<String> = violations.iter().map(ToString::to_string).collect();
    ctx.field_error(
        format!(
            "Input validation failed in the field \"{}\": {}",
            field.name,
            details.join(", ")
        ),
        path,
        field.location,
    );
}
