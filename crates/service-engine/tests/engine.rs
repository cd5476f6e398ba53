use crate::fixtures::json;
use crate::fixtures::TestObject;
use pretty_assertions::assert_eq;
use serde_json::json;
use service_engine::operation::FieldSelection;
use service_engine::service::MethodInfo;
use service_engine::Context;
use service_engine::Engine;
use service_engine::EngineConfig;
use service_engine::EngineError;
use service_engine::Operation;
use service_engine::ResolvedValue;
use service_schema::descriptor::MethodDescriptor;
use service_schema::descriptor::TypeDescriptor;
use service_schema::generate_schema;
use service_schema::name;
use service_schema::sdl::KeyDirectives;
use service_schema::DecodeError;
use service_schema::ServiceDescriptor;
use std::sync::Arc;

fn encoded_schema() -> String {
    let service = ServiceDescriptor::new()
        .method(MethodDescriptor::resource("get", ["greeting"], TypeDescriptor::String));
    generate_schema(&service).unwrap().encode().unwrap()
}

fn greeter() -> Arc<TestObject> {
    Arc::new(TestObject::new("Query").value(MethodInfo::get(["greeting"]), || ResolvedValue::leaf("Hello")))
}

fn decode_error(encoded: Option<&str>) -> String {
    match Engine::new(encoded, greeter()) {
        Ok(_) => panic!("expected {encoded:?} to be rejected"),
        Err(error) => error.to_string(),
    }
}

#[test]
fn engines_need_a_valid_schema() {
    assert_eq!(decode_error(None), "Schema generation failed due to null schema string");
    assert_eq!(decode_error(Some("")), "Schema generation failed due to empty schema string");
    assert!(decode_error(Some("not base64!")).starts_with("schema string is not valid base64"));
    assert!(matches!(
        Engine::new(None, greeter()),
        Err(EngineError::Decode(DecodeError::MissingSchema))
    ));
}

#[tokio::test]
async fn engines_execute_against_the_decoded_schema() {
    let engine = Engine::new(Some(&encoded_schema()), greeter()).unwrap();
    assert!(engine.schema().get_type("Query").is_some());
    let operation = Operation::query().field(FieldSelection::new(name!("greeting")));
    let response = engine.execute(&operation, Context::new()).await;
    assert_eq!(json(&response), json!({"data": {"greeting": "Hello"}}));
}

#[test]
fn invalid_configurations_are_rejected() {
    let engine = Engine::new(Some(&encoded_schema()), greeter()).unwrap();
    let config = EngineConfig {
        max_placeholder_passes: 0,
        ..EngineConfig::default()
    };
    let Err(error) = engine.with_config(config) else {
        panic!("a configuration without placeholder passes was accepted")
    };
    assert_eq!(
        error.to_string(),
        "invalid engine configuration: max_placeholder_passes must be > 0"
    );
    assert!(EngineConfig::from_toml_str("retries = 3").is_err());
}

#[test]
fn sdl_of_an_encoded_schema() {
    let sdl = service_engine::sdl(Some(&encoded_schema()), &KeyDirectives::new()).unwrap();
    assert!(sdl.contains("type Query {"), "{sdl}");
    assert!(sdl.contains("  greeting: String!"), "{sdl}");
    assert!(matches!(
        service_engine::sdl(None, &KeyDirectives::new()),
        Err(DecodeError::MissingSchema)
    ));
}

fn assert_send<T: Send>(_: &T) {}

#[test]
fn operation_futures_are_send() {
    let engine = Engine::new(Some(&encoded_schema()), greeter()).unwrap();
    let query = Operation::query().field(FieldSelection::new(name!("greeting")));
    let subscription = Operation::subscription().field(FieldSelection::new(name!("greeting")));
    assert_send(&engine.execute(&query, Context::new()));
    assert_send(&engine.subscribe(&subscription, Context::new()));
}
