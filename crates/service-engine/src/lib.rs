#![doc = include_str!("../README.md")]

pub mod arguments;
pub mod config;
pub mod context;
pub mod dataloader;
pub mod directives;
pub mod error;
mod lanes;
pub mod operation;
mod resolvers;
pub mod response;
pub mod service;

pub use self::config::EngineConfig;
pub use self::context::Context;
pub use self::context::Field;
pub use self::error::EngineError;
pub use self::error::ResolveError;
pub use self::lanes::Lane;
pub use self::operation::Operation;
pub use self::response::ExecutionResponse;
pub use self::service::ResolvedValue;
pub use self::service::ServiceObject;

use self::directives::DirectiveFactory;
use self::directives::ExecutableDirective;
use self::directives::Interceptor;
use self::lanes::Lanes;
use self::response::JsonMap;
use futures::stream::BoxStream;
use indexmap::IndexMap;
use service_schema::schema::codec::decode_schema;
use service_schema::sdl::KeyDirectives;
use service_schema::DecodeError;
use service_schema::Schema;
use std::sync::Arc;

/// Executes operations against one generated schema and its root service object.
///
/// The schema comes from the encoded form embedded at build time. Failing to decode
/// it is fatal: [`Engine::new`] returns the error instead of an engine.
pub struct Engine {
    pub(crate) schema: Arc<Schema>,
    pub(crate) root: Arc<dyn ServiceObject>,
    pub(crate) config: EngineConfig,
    pub(crate) lanes: Lanes,
    pub(crate) interceptors: Vec<Arc<dyn Interceptor>>,
    pub(crate) directives: IndexMap<String, DirectiveFactory>,
}

impl Engine {
    pub fn new(encoded_schema: Option<&str>, root: Arc<dyn ServiceObject>) -> Result<Self, EngineError> {
        let schema = decode_schema(encoded_schema)?;
        tracing::debug!(types = schema.types.len(), "decoded schema");
        Ok(Self::from_schema(schema, root))
    }

    pub fn from_schema(schema: Schema, root: Arc<dyn ServiceObject>) -> Self {
        Self {
            schema: Arc::new(schema),
            root,
            config: EngineConfig::default(),
            lanes: Lanes::default(),
            interceptors: Vec::new(),
            directives: IndexMap::new(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    /// Adds an interceptor. Interceptors run in the order they are added, the first outermost.
    pub fn interceptor(mut self, interceptor: impl Interceptor + 'static) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    /// Registers how to build the executable directive `@name` from its arguments.
    pub fn directive<F>(mut self, name: &str, factory: F) -> Result<Self, EngineError>
    where
        F: Fn(&JsonMap) -> Result<Arc<dyn ExecutableDirective>, ResolveError> + Send + Sync + 'static,
    {
        if self.directives.contains_key(name) {
            return Err(EngineError::DuplicateDirective(name.to_owned()));
        }
        if self.schema.get_directive(name).is_none() {
            tracing::warn!(directive = name, "directive is not defined by the schema");
        }
        self.directives.insert(name.to_owned(), Arc::new(factory));
        Ok(self)
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Executes a query or mutation operation.
    ///
    /// Field errors are collected in the response next to partial data.
    pub async fn execute(&self, operation: &Operation, context: Context) -> ExecutionResponse {
        resolvers::execute_operation(self, operation, &context).await
    }

    /// Executes a subscription operation: one response per event of the source stream.
    ///
    /// Errors before the stream exists end the stream after a single response.
    pub async fn subscribe<'a>(
        &'a self,
        operation: &'a Operation,
        context: Context,
    ) -> BoxStream<'a, ExecutionResponse> {
        resolvers::subscribe(self, operation, context).await
    }
}

/// Prints the SDL of an encoded schema, with `@key` directives on federation entities.
pub fn sdl(encoded_schema: Option<&str>, key_directives: &KeyDirectives) -> Result<String, DecodeError> {
    let schema = decode_schema(encoded_schema)?;
    Ok(service_schema::print_sdl(&schema, key_directives))
}
