use crate::config::ConfigError;
use service_schema::DecodeError;
use std::fmt;

/// Failure to set up an [`Engine`][crate::Engine].
///
/// None of these can be recovered from per operation: without a schema nothing executes.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("directive `@{0}` is registered more than once")]
    DuplicateDirective(String),
}

/// The error a resolver, interceptor, directive or batch function completes with.
///
/// It becomes a field error in the response, and the field becomes null.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveError {
    pub message: String,
}

impl ResolveError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub(crate) fn dropped_completion(method: &str) -> Self {
        Self::new(format!(
            "resolver `{method}` dropped its completion without a result"
        ))
    }

    pub(crate) fn timed_out(method: &str, millis: u64) -> Self {
        Self::new(format!("resolver `{method}` timed out after {millis} ms"))
    }
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ResolveError {}

impl From<String> for ResolveError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for ResolveError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}
