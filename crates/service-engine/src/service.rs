//! The boundary between the engine and the objects hosting resolvers.
//!
//! A [`ServiceObject`] describes its methods with [`MethodInfo`] and is invoked
//! through [`ServiceObject::invoke`]. Every invocation gets a [`Completion`]
//! which the object must complete exactly once, possibly from another task.

use crate::arguments::Constraint;
use crate::context::Context;
use crate::context::Field;
use crate::dataloader::DataLoader;
use crate::dataloader::LoaderAnnotation;
use crate::error::ResolveError;
use crate::response::JsonValue;
use futures::stream::BoxStream;
use indexmap::IndexMap;
use service_schema::descriptor::GET_ACCESSOR;
use service_schema::descriptor::SUBSCRIBE_ACCESSOR;
use service_schema::Name;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::Hash;
use std::hash::Hasher;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use tokio::sync::oneshot;

/// An object whose methods resolve GraphQL fields: the root service,
/// or any service object returned by a resolver.
pub trait ServiceObject: Send + Sync {
    /// Name of the object type in the schema
    fn type_name(&self) -> &str;

    /// Whether the object type itself is safe to call concurrently.
    ///
    /// Calls are dispatched concurrently only when both the type and the method are isolated.
    fn isolated(&self) -> bool {
        true
    }

    fn methods(&self) -> &[MethodInfo];

    /// Runs `call`. The result must eventually be passed to `completion`.
    fn invoke(&self, call: Invocation, completion: Completion);

    /// Identifies the data loaders this object shares.
    ///
    /// Objects returning the same key share the loaders of a load method within one
    /// operation, so keys added by any of them are dispatched in the same batch.
    /// The default hashes the type name: every object of one type shares its loaders.
    /// Override it to hash the object's own identity when objects of one type must
    /// keep separate loaders, for example when their batch functions capture
    /// per-object state.
    fn loader_key(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.type_name().hash(&mut hasher);
        hasher.finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodKind {
    /// `accessor` is `get` for query fields and `subscribe` for subscription fields
    Resource { accessor: String, path: Vec<String> },
    /// A mutation field, or a directive extension point
    Remote,
}

/// The runtime description of one method of a [`ServiceObject`].
#[derive(Clone)]
pub struct MethodInfo {
    pub name: String,
    pub kind: MethodKind,
    pub isolated: bool,
    pub params: Vec<ParamInfo>,
    /// Set on the companion `load` method of a batched field
    pub loader: Option<LoaderAnnotation>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamInfo {
    pub name: String,
    pub kind: ParamKind,
    /// The parameter has a default value, so an absent argument is left out
    pub defaultable: bool,
    pub constraints: Vec<Constraint>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ParamKind {
    /// Taken from the field arguments
    Input,
    /// Receives the request [`Context`]
    Context,
    /// Receives the [`Field`] being resolved
    Field,
}

/// What a resolver produces.
pub enum ResolvedValue {
    /// JSON null is GraphQL null, an enum value is a JSON string
    Leaf(JsonValue),
    /// A service object whose methods resolve the selected sub-fields
    Object(Arc<dyn ServiceObject>),
    /// A plain record: sub-fields are read by name.
    ///
    /// `type_name` is only needed where the field type is an interface or a union.
    Record {
        type_name: Option<Name>,
        fields: IndexMap<String, ResolvedValue>,
    },
    List(Vec<ResolvedValue>),
    /// The source of events of a subscription field
    Stream(EventStream),
}

/// The events of a subscription, consumed once.
///
/// Kept behind a mutex so that resolved values are `Sync`.
pub struct EventStream(Mutex<BoxStream<'static, Result<ResolvedValue, ResolveError>>>);

/// One call to a [`ServiceObject`] method.
pub struct Invocation {
    method: String,
    arguments: Vec<Argument>,
    context: Context,
    field: Field,
    loaders: IndexMap<String, DataLoader>,
}

/// One positional argument, in the declared order of the method parameters
#[derive(Debug, Clone)]
pub enum Argument {
    Context(Context),
    Field(Field),
    /// A field argument, `None` when absent and defaultable
    Value {
        name: String,
        value: Option<JsonValue>,
    },
}

/// The sink of one invocation's result.
///
/// Consuming `self` makes a second completion impossible. Dropping it without
/// completing turns the field into a field error.
#[derive(Debug)]
pub struct Completion {
    sender: oneshot::Sender<Result<ResolvedValue, ResolveError>>,
}

pub(crate) type CompletionReceiver = oneshot::Receiver<Result<ResolvedValue, ResolveError>>;

impl MethodInfo {
    pub fn new(name: impl Into<String>, kind: MethodKind) -> Self {
        Self {
            name: name.into(),
            kind,
            isolated: true,
            params: Vec::new(),
            loader: None,
        }
    }

    /// A `get` resource method answering the query field at `path`
    pub fn resource<I, S>(accessor: &str, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let path: Vec<String> = path.into_iter().map(Into::into).collect();
        let name = format!("{accessor} {}", path.join("/"));
        Self::new(
            name,
            MethodKind::Resource {
                accessor: accessor.to_owned(),
                path,
            },
        )
    }

    pub fn get<I, S>(path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::resource(GET_ACCESSOR, path)
    }

    pub fn subscribe(field: impl Into<String>) -> Self {
        let field: String = field.into();
        Self::resource(SUBSCRIBE_ACCESSOR, [field])
    }

    pub fn remote(name: impl Into<String>) -> Self {
        Self::new(name, MethodKind::Remote)
    }

    pub fn param(mut self, param: ParamInfo) -> Self {
        self.params.push(param);
        self
    }

    /// Marks the method as unsafe to call concurrently
    pub fn non_isolated(mut self) -> Self {
        self.isolated = false;
        self
    }

    pub fn loader(mut self, loader: LoaderAnnotation) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn accessor(&self) -> Option<&str> {
        match &self.kind {
            MethodKind::Resource { accessor, .. } => Some(accessor),
            MethodKind::Remote => None,
        }
    }

    pub fn path(&self) -> &[String] {
        match &self.kind {
            MethodKind::Resource { path, .. } => path,
            MethodKind::Remote => &[],
        }
    }

    pub fn is_remote(&self) -> bool {
        self.kind == MethodKind::Remote
    }

    /// The name of the field this method answers
    pub fn field_name(&self) -> &str {
        match &self.kind {
            MethodKind::Resource { path, .. } => path.first().map_or("", String::as_str),
            MethodKind::Remote => &self.name,
        }
    }
}

impl fmt::Debug for MethodInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodInfo")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("isolated", &self.isolated)
            .field("params", &self.params)
            .field("loader", &self.loader.is_some())
            .finish()
    }
}

impl ParamInfo {
    pub fn input(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::Input,
            defaultable: false,
            constraints: Vec::new(),
        }
    }

    pub fn context() -> Self {
        Self {
            kind: ParamKind::Context,
            ..Self::input("context")
        }
    }

    pub fn field() -> Self {
        Self {
            kind: ParamKind::Field,
            ..Self::input("field")
        }
    }

    pub fn defaultable(mut self) -> Self {
        self.defaultable = true;
        self
    }

    pub fn constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }
}

impl ResolvedValue {
    pub fn leaf(value: impl Into<JsonValue>) -> Self {
        Self::Leaf(value.into())
    }

    pub fn null() -> Self {
        Self::Leaf(JsonValue::Null)
    }

    pub fn object(object: impl ServiceObject + 'static) -> Self {
        Self::Object(Arc::new(object))
    }

    pub fn record<I, K>(type_name: Option<Name>, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, ResolvedValue)>,
        K: Into<String>,
    {
        Self::Record {
            type_name,
            fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn list(items: impl IntoIterator<Item = ResolvedValue>) -> Self {
        Self::List(items.into_iter().collect())
    }

    pub fn stream(
        stream: impl futures::Stream<Item = Result<ResolvedValue, ResolveError>> + Send + 'static,
    ) -> Self {
        Self::Stream(EventStream::new(stream))
    }

    /// A copy sharing service objects. Fails on streams, which can only be consumed once.
    pub(crate) fn share(&self) -> Result<Self, ResolveError> {
        Ok(match self {
            Self::Leaf(value) => Self::Leaf(value.clone()),
            Self::Object(object) => Self::Object(object.clone()),
            Self::Record { type_name, fields } => Self::Record {
                type_name: type_name.clone(),
                fields: fields
                    .iter()
                    .map(|(name, value)| Ok((name.clone(), value.share()?)))
                    .collect::<Result<_, ResolveError>>()?,
            },
            Self::List(items) => Self::List(items.iter().map(Self::share).collect::<Result<_, _>>()?),
            Self::Stream(_) => return Err(ResolveError::new("a stream can only be consumed once")),
        })
    }
}

impl EventStream {
    pub fn new(stream: impl futures::Stream<Item = Result<ResolvedValue, ResolveError>> + Send + 'static) -> Self {
        Self(Mutex::new(Box::pin(stream)))
    }

    pub fn into_inner(self) -> BoxStream<'static, Result<ResolvedValue, ResolveError>> {
        self.0.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl From<JsonValue> for ResolvedValue {
    fn from(value: JsonValue) -> Self {
        Self::Leaf(value)
    }
}

impl fmt::Debug for ResolvedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Leaf(value) => f.debug_tuple("Leaf").field(value).finish(),
            Self::Object(object) => f.debug_tuple("Object").field(&object.type_name()).finish(),
            Self::Record { type_name, fields } => f
                .debug_struct("Record")
                .field("type_name", type_name)
                .field("fields", fields)
                .finish(),
            Self::List(items) => f.debug_tuple("List").field(items).finish(),
            Self::Stream(_) => f.write_str("Stream"),
        }
    }
}

impl Invocation {
    pub(crate) fn new(
        method: &MethodInfo,
        arguments: Vec<Argument>,
        context: Context,
        field: Field,
        loaders: IndexMap<String, DataLoader>,
    ) -> Self {
        Self {
            method: method.name.clone(),
            arguments,
            context,
            field,
            loaders,
        }
    }

    /// Name of the invoked method
    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }

    /// The value of an input argument, `None` when it was left to its default
    pub fn arg(&self, name: &str) -> Option<&JsonValue> {
        self.arguments.iter().find_map(|argument| match argument {
            Argument::Value {
                name: arg_name,
                value,
            } if arg_name == name => value.as_ref(),
            _ => None,
        })
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn field(&self) -> &Field {
        &self.field
    }

    /// The data loader registered under `name` for the invoked object
    pub fn data_loader(&self, name: &str) -> Option<&DataLoader> {
        self.loaders.get(name)
    }
}

impl Completion {
    pub(crate) fn channel() -> (Self, CompletionReceiver) {
        let (sender, receiver) = oneshot::channel();
        (Self { sender }, receiver)
    }

    pub fn complete(self, result: Result<ResolvedValue, ResolveError>) {
        // The receiver is gone only when the operation itself was dropped
        let _ = self.sender.send(result);
    }

    pub fn success(self, value: impl Into<ResolvedValue>) {
        self.complete(Ok(value.into()))
    }

    pub fn failure(self, error: impl Into<ResolveError>) {
        self.complete(Err(error.into()))
    }
}

/// The `get` (or `subscribe`) resource method of `object` whose path is exactly `path`
pub fn find_resource_method<'a>(
    object: &'a dyn ServiceObject,
    accessor: &str,
    path: &[&str],
) -> Option<&'a MethodInfo> {
    object
        .methods()
        .iter()
        .find(|method| method.accessor() == Some(accessor) && method.path() == path)
}

/// Whether some `get` resource method of `object` lies below `prefix`
pub fn has_resource_below(object: &dyn ServiceObject, prefix: &[&str]) -> bool {
    object.methods().iter().any(|method| {
        method.accessor() == Some(GET_ACCESSOR)
            && method.path().len() > prefix.len()
            && method.path().iter().zip(prefix).all(|(a, b)| a == b)
    })
}

pub fn find_remote_method<'a>(object: &'a dyn ServiceObject, name: &str) -> Option<&'a MethodInfo> {
    object
        .methods()
        .iter()
        .find(|method| method.is_remote() && method.name == name)
}

/// The companion method batching the loads of `field_name`: `loadX` for field `x`,
/// carrying a loader annotation
pub fn find_load_method<'a>(object: &'a dyn ServiceObject, field_name: &str) -> Option<&'a MethodInfo> {
    let load_name = load_method_name(field_name);
    object.methods().iter().find(|method| {
        method.loader.is_some() && (method.name == load_name || method.field_name() == load_name)
    })
}

fn load_method_name(field_name: &str) -> String {
    let mut chars = field_name.chars();
    match chars.next() {
        Some(first) => format!("load{}{}", first.to_uppercase(), chars.as_str()),
        None => "load".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataloader::LoaderAnnotation;
    use pretty_assertions::assert_eq;

    struct Books {
        methods: Vec<MethodInfo>,
    }

    impl ServiceObject for Books {
        fn type_name(&self) -> &str {
            "Query"
        }

        fn methods(&self) -> &[MethodInfo] {
            &self.methods
        }

        fn invoke(&self, _call: Invocation, completion: Completion) {
            completion.success(ResolvedValue::null())
        }
    }

    fn books() -> Books {
        Books {
            methods: vec![
                MethodInfo::get(["shelf", "count"]),
                MethodInfo::get(["author"]),
                MethodInfo::get(["loadAuthor"]).loader(LoaderAnnotation::new()),
                MethodInfo::remote("addBook"),
                MethodInfo::subscribe("newBooks"),
            ],
        }
    }

    #[test]
    fn resource_methods_match_the_full_path() {
        let books = books();
        let found = find_resource_method(&books, GET_ACCESSOR, &["shelf", "count"]);
        assert_eq!(found.map(|m| m.name.as_str()), Some("get shelf/count"));
        assert!(find_resource_method(&books, GET_ACCESSOR, &["shelf"]).is_none());
        assert!(has_resource_below(&books, &["shelf"]));
        assert!(!has_resource_below(&books, &["shelf", "count"]));
        assert!(find_resource_method(&books, SUBSCRIBE_ACCESSOR, &["newBooks"]).is_some());
    }

    #[test]
    fn objects_of_one_type_share_loaders_by_default() {
        struct Shelf;

        impl ServiceObject for Shelf {
            fn type_name(&self) -> &str {
                "Shelf"
            }

            fn methods(&self) -> &[MethodInfo] {
                &[]
            }

            fn invoke(&self, _call: Invocation, completion: Completion) {
                completion.success(ResolvedValue::null())
            }
        }

        assert_eq!(books().loader_key(), books().loader_key());
        assert_ne!(books().loader_key(), Shelf.loader_key());
    }

    #[test]
    fn remote_and_load_methods() {
        let books = books();
        assert!(find_remote_method(&books, "addBook").is_some());
        assert!(find_remote_method(&books, "author").is_none());
        let load = find_load_method(&books, "author").unwrap();
        assert_eq!(load.field_name(), "loadAuthor");
        assert!(find_load_method(&books, "addBook").is_none());
    }
}
