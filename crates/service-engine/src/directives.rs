//! Interceptors and executable directives: code wrapped around field resolution.
//!
//! Both receive the request [`Context`], the [`Field`] being resolved and a [`Next`]
//! handle running the rest of the chain. The chain of a field is: operation directives
//! (root fields only), field directives in declared order, service interceptors,
//! and finally the resolver itself.

use crate::context::Context;
use crate::context::Field;
use crate::error::ResolveError;
use crate::lanes::LaneGuard;
use crate::operation::OperationKind;
use crate::response::JsonMap;
use crate::response::JsonValue;
use futures::future::BoxFuture;
use service_schema::validation::EXTENSION_POINTS;
use std::fmt;
use std::sync::Arc;

/// Wraps the resolution of every field of a service.
pub trait Interceptor: Send + Sync {
    /// Name of the interceptor, used in logs
    fn name(&self) -> &str;

    fn isolated(&self) -> bool {
        true
    }

    /// Runs around the resolution of `field`. Call [`Next::run`] to resolve it.
    fn execute<'a>(
        &'a self,
        context: &'a Context,
        field: &'a Field,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<JsonValue, ResolveError>>;
}

/// One application of an executable directive, built from its arguments by a [`DirectiveFactory`].
pub trait ExecutableDirective: Send + Sync {
    fn isolated(&self) -> bool {
        true
    }

    /// Extension points this directive has a method for
    fn extension_points(&self) -> &[ExtensionPoint];

    /// Runs at `point` around the resolution of `field`. Call [`Next::run`] to resolve it.
    fn apply<'a>(
        &'a self,
        point: ExtensionPoint,
        context: &'a Context,
        field: &'a Field,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<JsonValue, ResolveError>>;
}

/// Builds a directive instance from the arguments of one directive application,
/// the same way an initializer takes its parameters.
pub type DirectiveFactory =
    Arc<dyn Fn(&JsonMap) -> Result<Arc<dyn ExecutableDirective>, ResolveError> + Send + Sync>;

/// Where in an operation a directive runs
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ExtensionPoint {
    Query,
    Mutation,
    Subscription,
    Field,
}

impl ExtensionPoint {
    pub fn for_operation(kind: OperationKind) -> Self {
        match kind {
            OperationKind::Query => Self::Query,
            OperationKind::Mutation => Self::Mutation,
            OperationKind::Subscription => Self::Subscription,
        }
    }

    /// The `on` location of a directive configuration
    pub fn location(self) -> &'static str {
        match self {
            Self::Query => "QUERY",
            Self::Mutation => "MUTATION",
            Self::Subscription => "SUBSCRIPTION",
            Self::Field => "FIELD",
        }
    }

    /// The remote method of a directive class handling this point, like `applyOnField`
    pub fn method_name(self) -> &'static str {
        EXTENSION_POINTS
            .iter()
            .find(|(location, _)| *location == self.location())
            .map_or("", |(_, method)| *method)
    }
}

impl fmt::Display for ExtensionPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method_name())
    }
}

/// The rest of the chain of one field.
///
/// Running it releases the execution lane held by the caller, so that nested
/// fields resolved inside can use the same lane.
pub struct Next<'a> {
    run: Box<dyn FnOnce() -> BoxFuture<'a, JsonValue> + Send + 'a>,
    lane: Option<LaneGuard>,
}

impl<'a> Next<'a> {
    pub(crate) fn new(run: impl FnOnce() -> BoxFuture<'a, JsonValue> + Send + 'a) -> Self {
        Self {
            run: Box::new(run),
            lane: None,
        }
    }

    pub(crate) fn holding(mut self, lane: Option<LaneGuard>) -> Self {
        self.lane = lane;
        self
    }

    /// Resolves the field through the remaining interceptors and directives.
    ///
    /// Errors along the way are already recorded in the response: they show up here as null.
    pub async fn run(self) -> JsonValue {
        let Self { run, lane } = self;
        drop(lane);
        run().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt as _;

    #[test]
    fn extension_point_methods() {
        assert_eq!(ExtensionPoint::Field.method_name(), "applyOnField");
        assert_eq!(
            ExtensionPoint::for_operation(OperationKind::Mutation).to_string(),
            "applyOnMutation"
        );
    }

    #[tokio::test]
    async fn next_runs_the_rest_of_the_chain() {
        let next = Next::new(|| async { JsonValue::from("resolved") }.boxed());
        assert_eq!(next.run().await, JsonValue::from("resolved"));
    }
}
