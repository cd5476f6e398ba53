use crate::fixtures::book;
use crate::fixtures::json;
use crate::fixtures::library_schema;
use crate::fixtures::TestObject;
use pretty_assertions::assert_eq;
use serde_json::json;
use service_engine::operation::FieldSelection;
use service_engine::service::MethodInfo;
use service_engine::service::ParamInfo;
use service_engine::Context;
use service_engine::Engine;
use service_engine::Operation;
use service_engine::ResolvedValue;
use service_schema::name;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

fn logging_root(log: Arc<Mutex<Vec<&'static str>>>) -> TestObject {
    let slow_log = log.clone();
    TestObject::new("Query")
        .method(MethodInfo::remote("first"), move |_, completion| {
            let log = slow_log.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                log.lock().unwrap().push("first");
                completion.success(ResolvedValue::leaf(1))
            });
        })
        .method(MethodInfo::remote("second"), move |_, completion| {
            log.lock().unwrap().push("second");
            completion.success(ResolvedValue::leaf(2))
        })
        .method(
            MethodInfo::remote("addBook").param(ParamInfo::input("title")),
            |call, completion| match call.arg("title").and_then(|title| title.as_str().map(str::to_owned)) {
                Some(title) => completion.success(ResolvedValue::object(book(title, 2026))),
                None => completion.failure("a title is required"),
            },
        )
}

#[tokio::test]
async fn mutation_fields_run_one_after_the_other() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let engine = Engine::from_schema(library_schema(), Arc::new(logging_root(log.clone())));
    let operation = Operation::mutation()
        .field(FieldSelection::new(name!("first")))
        .field(FieldSelection::new(name!("second")));
    let response = engine.execute(&operation, Context::new()).await;
    assert_eq!(json(&response), json!({"data": {"first": 1, "second": 2}}));
    assert_eq!(*log.lock().unwrap(), ["first", "second"]);
}

#[tokio::test]
async fn mutation_results_complete_like_query_results() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let engine = Engine::from_schema(library_schema(), Arc::new(logging_root(log)));
    let operation = Operation::mutation().field(
        FieldSelection::new(name!("addBook"))
            .argument("title", "Beloved")
            .field(FieldSelection::new(name!("title")))
            .field(FieldSelection::new(name!("year"))),
    );
    let response = engine.execute(&operation, Context::new()).await;
    assert_eq!(
        json(&response),
        json!({"data": {"addBook": {"title": "Beloved", "year": 2026}}})
    );
}

#[tokio::test]
async fn schemas_without_mutations_reject_them() {
    let mut schema = library_schema();
    schema.mutation_type = None;
    let engine = Engine::from_schema(schema, Arc::new(TestObject::new("Query")));
    let operation = Operation::mutation().field(FieldSelection::new(name!("first")));
    let response = engine.execute(&operation, Context::new()).await;
    assert_eq!(
        json(&response),
        json!({
            "errors": [{"message": "the schema does not support mutation operations"}],
            "data": null,
        })
    );
}
