use expect_test::expect;
use indoc::indoc;
use pretty_assertions::assert_eq;
use service_schema::descriptor::MethodDescriptor;
use service_schema::descriptor::ObjectDescriptor;
use service_schema::descriptor::Parameter;
use service_schema::descriptor::RecordField;
use service_schema::descriptor::TypeDefinition;
use service_schema::descriptor::TypeDescriptor;
use service_schema::generate_schema;
use service_schema::print_sdl;
use service_schema::sdl::KeyDirective;
use service_schema::sdl::KeyDirectives;
use service_schema::ServiceDescriptor;

#[test]
fn greeting_sdl() {
    let service = ServiceDescriptor::new()
        .method(
            MethodDescriptor::resource("get", ["greeting"], TypeDescriptor::String)
                .param(Parameter::new("name", TypeDescriptor::String).defaultable())
                .describe("Says hello"),
        )
        .method(MethodDescriptor::remote("setName", TypeDescriptor::String));
    let schema = generate_schema(&service).unwrap();
    let expected = indoc! {r#"
        type Query {
          "Says hello"
          greeting(name: String! = ""): String!
        }

        type Mutation {
          setName: String!
        }
    "#};
    assert_eq!(print_sdl(&schema, &KeyDirectives::new()), expected);
}

#[test]
fn subgraph_sdl_hides_federation_machinery() {
    let service = ServiceDescriptor::new()
        .subgraph()
        .method(MethodDescriptor::resource("get", ["me"], TypeDescriptor::reference("User")))
        .definition(
            TypeDefinition::record(
                "User",
                [
                    RecordField::new("id", TypeDescriptor::Int),
                    RecordField::new("name", TypeDescriptor::optional(TypeDescriptor::String)),
                ],
            )
            .describe("A registered user")
            .entity(["id"], true),
        );
    let schema = generate_schema(&service).unwrap();
    let mut keys = KeyDirectives::new();
    keys.insert("User".into(), KeyDirective::new(["id"], true));
    expect![[r#"
        extend schema @link(url: "https://specs.apollo.dev/federation/v2.0", import: ["@external", "@requires", "@provides", "@key", "@shareable", "@inaccessible", "@tag", "@override", "@composeDirective", "@extends"])

        type Query {
          me: User!
        }

        "A registered user"
        type User @key(fields: "id") {
          id: Int!
          name: String
        }
    "#]]
    .assert_eq(&print_sdl(&schema, &keys));
}

#[test]
fn interfaces_and_implementations() {
    let service = ServiceDescriptor::new()
        .method(MethodDescriptor::resource("get", ["pet"], TypeDescriptor::reference("Pet")))
        .definition(TypeDefinition::service_object(
            "Pet",
            ObjectDescriptor::new().method(MethodDescriptor::resource(
                "get",
                ["name"],
                TypeDescriptor::String,
            )),
        ))
        .definition(TypeDefinition::class(
            "Dog",
            ObjectDescriptor::new()
                .includes("Pet")
                .method(MethodDescriptor::resource("get", ["name"], TypeDescriptor::String))
                .method(MethodDescriptor::resource("get", ["barks"], TypeDescriptor::Boolean)),
        ));
    let schema = generate_schema(&service).unwrap();
    let sdl = print_sdl(&schema, &KeyDirectives::new());
    assert!(sdl.contains("interface Pet {\n  name: String!\n}\n"), "{sdl}");
    assert!(
        sdl.contains("type Dog implements Pet {\n  name: String!\n  barks: Boolean!\n}\n"),
        "{sdl}"
    );
}
