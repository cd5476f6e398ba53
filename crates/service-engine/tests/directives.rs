use crate::fixtures::book;
use crate::fixtures::engine;
use crate::fixtures::json;
use crate::fixtures::TestObject;
use futures::future::BoxFuture;
use futures::FutureExt as _;
use pretty_assertions::assert_eq;
use serde_json::json;
use service_engine::directives::ExecutableDirective;
use service_engine::directives::ExtensionPoint;
use service_engine::directives::Interceptor;
use service_engine::directives::Next;
use service_engine::operation::DirectiveApplication;
use service_engine::operation::FieldSelection;
use service_engine::response::JsonMap;
use service_engine::response::JsonValue;
use service_engine::service::MethodInfo;
use service_engine::Context;
use service_engine::Engine;
use service_engine::EngineError;
use service_engine::Field;
use service_engine::Operation;
use service_engine::ResolveError;
use service_engine::ResolvedValue;
use service_schema::name;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;

type Log = Arc<Mutex<Vec<String>>>;

struct Recorder {
    name: &'static str,
    log: Log,
}

impl Interceptor for Recorder {
    fn name(&self) -> &str {
        self.name
    }

    fn execute<'a>(
        &'a self,
        _context: &'a Context,
        field: &'a Field,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<JsonValue, ResolveError>> {
        self.log.lock().unwrap().push(format!("{}:{}", self.name, field.name()));
        async move { Ok(next.run().await) }.boxed()
    }
}

/// Prefixes string results, and logs with its own name
struct Traced {
    label: String,
    prefix: String,
    points: Vec<ExtensionPoint>,
    log: Log,
}

impl ExecutableDirective for Traced {
    fn extension_points(&self) -> &[ExtensionPoint] {
        &self.points
    }

    fn apply<'a>(
        &'a self,
        _point: ExtensionPoint,
        _context: &'a Context,
        field: &'a Field,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<JsonValue, ResolveError>> {
        self.log.lock().unwrap().push(format!("{}:{}", self.label, field.name()));
        async move {
            let value = next.run().await;
            Ok(match value.as_str() {
                Some(text) => JsonValue::from(format!("{}{text}", self.prefix)),
                None => value,
            })
        }
        .boxed()
    }
}

fn traced_engine(root: TestObject, log: &Log) -> Engine {
    let (trace_log, op_log) = (log.clone(), log.clone());
    engine(root)
        .directive("trace", move |arguments: &JsonMap| {
            let prefix = arguments.get("prefix").and_then(JsonValue::as_str).unwrap_or_default();
            let directive: Arc<dyn ExecutableDirective> = Arc::new(Traced {
                label: "trace".to_owned(),
                prefix: prefix.to_owned(),
                points: vec![ExtensionPoint::Field],
                log: trace_log.clone(),
            });
            Ok(directive)
        })
        .unwrap()
        .directive("op", move |_: &JsonMap| {
            let directive: Arc<dyn ExecutableDirective> = Arc::new(Traced {
                label: "op".to_owned(),
                prefix: String::new(),
                points: vec![ExtensionPoint::Query],
                log: op_log.clone(),
            });
            Ok(directive)
        })
        .unwrap()
}

fn root() -> TestObject {
    TestObject::new("Query")
        .value(MethodInfo::get(["greeting"]), || ResolvedValue::leaf("Hello"))
        .value(MethodInfo::get(["book"]), || ResolvedValue::object(book("Dune", 1965)))
}

#[tokio::test]
async fn chain_runs_operation_then_field_directives_then_interceptors() {
    let log = Log::default();
    let engine = traced_engine(root(), &log)
        .interceptor(Recorder { name: "A", log: log.clone() })
        .interceptor(Recorder { name: "B", log: log.clone() });
    let operation = Operation::query()
        .directive(DirectiveApplication::new(name!("op")))
        .field(
            FieldSelection::new(name!("greeting"))
                .directive(DirectiveApplication::new(name!("trace")).argument("prefix", "> ")),
        );
    let response = engine.execute(&operation, Context::new()).await;
    assert_eq!(json(&response), json!({"data": {"greeting": "> Hello"}}));
    assert_eq!(
        *log.lock().unwrap(),
        ["op:greeting", "trace:greeting", "A:greeting", "B:greeting"]
    );
}

#[tokio::test]
async fn operation_directives_wrap_top_level_fields_only() {
    let log = Log::default();
    let engine = traced_engine(root(), &log).interceptor(Recorder { name: "A", log: log.clone() });
    let operation = Operation::query()
        .directive(DirectiveApplication::new(name!("op")))
        .field(FieldSelection::new(name!("book")).argument("id", 1).field(FieldSelection::new(name!("title"))));
    let response = engine.execute(&operation, Context::new()).await;
    assert_eq!(json(&response), json!({"data": {"book": {"title": "Dune"}}}));
    assert_eq!(*log.lock().unwrap(), ["op:book", "A:book", "A:title"]);
}

#[tokio::test]
async fn directives_without_a_field_method_are_skipped() {
    let log = Log::default();
    let engine = traced_engine(root(), &log);
    let operation = Operation::query().field(
        FieldSelection::new(name!("greeting"))
            .directive(DirectiveApplication::new(name!("op")))
            .directive(DirectiveApplication::new(name!("unknown"))),
    );
    let response = engine.execute(&operation, Context::new()).await;
    assert_eq!(json(&response), json!({"data": {"greeting": "Hello"}}));
    assert!(log.lock().unwrap().is_empty());
}

struct Guard;

impl Interceptor for Guard {
    fn name(&self) -> &str {
        "Guard"
    }

    fn execute<'a>(
        &'a self,
        _context: &'a Context,
        field: &'a Field,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<JsonValue, ResolveError>> {
        async move {
            match field.name().as_str() {
                "book" => Err(ResolveError::new("books are off limits")),
                "greeting" => Ok(JsonValue::from("Cached hello")),
                _ => Ok(next.run().await),
            }
        }
        .boxed()
    }
}

#[tokio::test]
async fn interceptors_can_fail_or_short_circuit() {
    let called = Arc::new(AtomicBool::new(false));
    let root = {
        let called = called.clone();
        TestObject::new("Query")
            .method(MethodInfo::get(["greeting"]), move |_, completion| {
                called.store(true, Ordering::SeqCst);
                completion.success(ResolvedValue::leaf("Hello"))
            })
            .value(MethodInfo::get(["book"]), || ResolvedValue::object(book("Dune", 1965)))
            .value(MethodInfo::get(["count"]), || ResolvedValue::leaf(7))
    };
    let engine = engine(root).interceptor(Guard);
    let operation = Operation::query()
        .field(FieldSelection::new(name!("greeting")))
        .field(FieldSelection::new(name!("book")).argument("id", 1).field(FieldSelection::new(name!("title"))))
        .field(FieldSelection::new(name!("count")));
    let response = engine.execute(&operation, Context::new()).await;
    assert_eq!(
        json(&response),
        json!({
            "errors": [{"message": "books are off limits", "path": ["book"]}],
            "data": {"greeting": "Cached hello", "book": null, "count": 7},
        })
    );
    assert!(!called.load(Ordering::SeqCst));
}

#[test]
fn directives_are_registered_once() {
    let directive = |_: &JsonMap| -> Result<Arc<dyn ExecutableDirective>, ResolveError> {
        Err(ResolveError::new("unused"))
    };
    let result = engine(root())
        .directive("trace", directive)
        .and_then(|engine| engine.directive("trace", directive));
    assert!(matches!(result, Err(EngineError::DuplicateDirective(name)) if name == "trace"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn operations_with_a_chain_run_on_worker_threads() {
    let log = Log::default();
    let engine = Arc::new(traced_engine(root(), &log).interceptor(Recorder { name: "A", log: log.clone() }));
    let operation = Operation::query().field(
        FieldSelection::new(name!("greeting"))
            .directive(DirectiveApplication::new(name!("trace")).argument("prefix", "> ")),
    );
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let (engine, operation) = (engine.clone(), operation.clone());
            tokio::spawn(async move { json(&engine.execute(&operation, Context::new()).await) })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.await.unwrap(), json!({"data": {"greeting": "> Hello"}}));
    }
    assert_eq!(log.lock().unwrap().len(), 8);
}
