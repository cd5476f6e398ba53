//! Execution lanes for calls that are not safe to run concurrently.
//!
//! A call to a non-isolated method (or a method of a non-isolated object) holds the
//! lane of its category until it completes, so such calls run one at a time per
//! category. Isolated calls bypass the lanes entirely.

use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::sync::OwnedMutexGuard;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Lane {
    /// Query and subscription resource methods, and load methods
    Resource,
    /// Mutation remote methods
    Remote,
    /// Interceptors and executable directives
    Interceptor,
}

/// Held while a sequential call runs on its lane
pub(crate) type LaneGuard = OwnedMutexGuard<()>;

#[derive(Debug, Default)]
pub(crate) struct Lanes {
    resource: Arc<Mutex<()>>,
    remote: Arc<Mutex<()>>,
    interceptor: Arc<Mutex<()>>,
}

impl Lanes {
    /// Waits for `lane` unless the call may run concurrently
    pub(crate) async fn acquire(&self, lane: Lane, concurrent: bool) -> Option<LaneGuard> {
        if concurrent {
            return None;
        }
        let mutex = match lane {
            Lane::Resource => &self.resource,
            Lane::Remote => &self.remote,
            Lane::Interceptor => &self.interceptor,
        };
        tracing::trace!(%lane, "waiting for execution lane");
        let guard = mutex.clone().lock_owned().await;
        tracing::trace!(%lane, "acquired execution lane");
        Some(guard)
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Resource => "resource",
            Self::Remote => "remote",
            Self::Interceptor => "interceptor",
        })
    }
}
