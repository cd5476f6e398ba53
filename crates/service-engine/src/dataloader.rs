//! Batched loading of field values.
//!
//! A field `author` with a companion `loadAuthor` method carrying a [`LoaderAnnotation`]
//! is resolved in two phases. `loadAuthor` only [`add`][DataLoader::add]s keys to the
//! loaders of its object. Once the current pass of the operation is done, every loader
//! with pending keys calls its batch function once with all of them. Then `author`
//! runs and reads its value with [`get`][DataLoader::get].

use crate::error::ResolveError;
use crate::response::JsonValue;
use futures::future::BoxFuture;
use futures::future::join_all;
use futures::FutureExt as _;
use indexmap::IndexMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

/// Loads the values of many keys at once, in key order
pub type BatchFunction =
    Arc<dyn Fn(Vec<JsonValue>) -> BoxFuture<'static, Result<Vec<JsonValue>, ResolveError>> + Send + Sync>;

/// Marks a load method and names the batch functions of its loaders.
#[derive(Clone, Default)]
pub struct LoaderAnnotation {
    pub batch_functions: IndexMap<String, BatchFunction>,
}

impl LoaderAnnotation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batch<F, Fut>(mut self, name: impl Into<String>, function: F) -> Self
    where
        F: Fn(Vec<JsonValue>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<JsonValue>, ResolveError>> + Send + 'static,
    {
        let function: BatchFunction = Arc::new(move |keys| function(keys).boxed());
        self.batch_functions.insert(name.into(), function);
        self
    }
}

impl fmt::Debug for LoaderAnnotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.batch_functions.keys()).finish()
    }
}

/// Collects keys, then loads them all with a single call of its batch function.
///
/// Cloning is cheap and clones share their keys and results.
#[derive(Clone)]
pub struct DataLoader {
    name: Arc<str>,
    batch: BatchFunction,
    state: Arc<Mutex<LoaderState>>,
}

#[derive(Default)]
struct LoaderState {
    /// Keys by their JSON text
    pending: IndexMap<String, JsonValue>,
    loaded: IndexMap<String, Result<JsonValue, ResolveError>>,
}

impl DataLoader {
    pub fn new(name: &str, batch: BatchFunction) -> Self {
        Self {
            name: name.into(),
            batch,
            state: Default::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Schedules `key` for the next batch, unless it is already loaded or pending
    pub fn add(&self, key: impl Into<JsonValue>) {
        let key = key.into();
        let text = key.to_string();
        let mut state = self.lock();
        if !state.loaded.contains_key(&text) {
            state.pending.entry(text).or_insert(key);
        }
    }

    /// The value loaded for `key`
    pub fn get(&self, key: impl Into<JsonValue>) -> Result<JsonValue, ResolveError> {
        let key = key.into();
        match self.lock().loaded.get(&key.to_string()) {
            Some(result) => result.clone(),
            None => Err(ResolveError::new(format!(
                "key {key} was never loaded by data loader `{}`",
                self.name
            ))),
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.lock().pending.is_empty()
    }

    /// Calls the batch function once with every pending key. Returns how many keys were loaded.
    pub(crate) async fn dispatch(&self) -> usize {
        let pending = std::mem::take(&mut self.lock().pending);
        if pending.is_empty() {
            return 0;
        }
        let (texts, keys): (Vec<String>, Vec<JsonValue>) = pending.into_iter().unzip();
        let count = keys.len();
        tracing::trace!(loader = %self.name, keys = count, "flushing data loader");
        let results = match (self.batch)(keys).await {
            Ok(values) if values.len() == count => values.into_iter().map(Ok).collect(),
            Ok(values) => {
                let error = ResolveError::new(format!(
                    "batch function of data loader `{}` returned {} values for {} keys",
                    self.name,
                    values.len(),
                    count
                ));
                vec![Err(error); count]
            }
            Err(error) => vec![Err(error); count],
        };
        let mut state = self.lock();
        for (text, result) in texts.into_iter().zip(results) {
            state.loaded.insert(text, result);
        }
        count
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LoaderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for DataLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataLoader").field("name", &self.name).finish()
    }
}

/// The data loaders of one operation, keyed by the owning object's loader key and loader name.
#[derive(Default)]
pub(crate) struct LoaderRegistry {
    loaders: Mutex<IndexMap<(u64, String), DataLoader>>,
}

impl LoaderRegistry {
    /// The loaders of `annotation` for the object identified by `object_key`, created on first use
    pub(crate) fn scope(&self, object_key: u64, annotation: &LoaderAnnotation) -> IndexMap<String, DataLoader> {
        let mut loaders = self.loaders.lock().unwrap_or_else(PoisonError::into_inner);
        annotation
            .batch_functions
            .iter()
            .map(|(name, batch)| {
                let loader = loaders
                    .entry((object_key, name.clone()))
                    .or_insert_with(|| DataLoader::new(name, batch.clone()))
                    .clone();
                (name.clone(), loader)
            })
            .collect()
    }

    /// Dispatches every loader with pending keys, concurrently. Returns how many loaders ran.
    pub(crate) async fn flush(&self) -> usize {
        let pending: Vec<DataLoader> = self
            .loaders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|loader| loader.has_pending())
            .cloned()
            .collect();
        join_all(pending.iter().map(DataLoader::dispatch)).await;
        pending.len()
    }
}
