use pretty_assertions::assert_eq;
use service_schema::descriptor::MethodDescriptor;
use service_schema::descriptor::ObjectDescriptor;
use service_schema::descriptor::Parameter;
use service_schema::descriptor::RecordField;
use service_schema::descriptor::TypeDefinition;
use service_schema::descriptor::TypeDescriptor;
use service_schema::generate_schema;
use service_schema::schema::TypeKind;
use service_schema::schema::TypeRef;
use service_schema::Schema;
use service_schema::ServiceDescriptor;

fn class(name: &str) -> TypeDefinition {
    TypeDefinition::class(
        name,
        ObjectDescriptor::new().method(MethodDescriptor::resource(
            "get",
            ["name"],
            TypeDescriptor::String,
        )),
    )
}

fn query_field_type(schema: &Schema, field: &str) -> String {
    schema.type_field("Query", field).unwrap().ty.to_string()
}

#[test]
fn greeting_service() {
    let service = ServiceDescriptor::new().method(MethodDescriptor::resource(
        "get",
        ["greeting"],
        TypeDescriptor::String,
    ));
    let schema = generate_schema(&service).unwrap();

    let query = schema.query_type().unwrap();
    assert_eq!(query.fields.len(), 1);
    assert_eq!(
        query.fields["greeting"].ty,
        TypeRef::named(service_schema::name!("String")).non_null()
    );
    assert!(schema.mutation_type.is_none());
    assert!(schema.subscription_type.is_none());
    let directives: Vec<&str> = schema.directives.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(directives, ["include", "skip", "deprecated"]);
}

#[test]
fn hierarchical_path_generates_nested_types() {
    let service = ServiceDescriptor::new()
        .method(MethodDescriptor::resource("get", ["lift", "status"], TypeDescriptor::String))
        .method(MethodDescriptor::resource("get", ["lift", "name"], TypeDescriptor::String));
    let schema = generate_schema(&service).unwrap();

    assert_eq!(query_field_type(&schema, "lift"), "Lift!");
    let lift = schema.get_type("Lift").unwrap();
    assert_eq!(lift.kind, TypeKind::Object);
    assert_eq!(lift.description.as_deref(), Some("generated type"));
    let fields: Vec<&str> = lift.fields.keys().map(|name| name.as_str()).collect();
    assert_eq!(fields, ["status", "name"]);
    assert_eq!(schema.type_field("Lift", "status").unwrap().ty.to_string(), "String!");
}

#[test]
fn nilable_unions_flatten() {
    let service = ServiceDescriptor::new()
        .method(MethodDescriptor::resource(
            "get",
            ["pet"],
            TypeDescriptor::union([
                TypeDescriptor::reference("Cat"),
                TypeDescriptor::reference("Dog"),
                TypeDescriptor::Nil,
            ]),
        ))
        .method(MethodDescriptor::resource(
            "get",
            ["cat"],
            TypeDescriptor::optional(TypeDescriptor::reference("Cat")),
        ))
        .definition(class("Cat"))
        .definition(class("Dog"));
    let schema = generate_schema(&service).unwrap();

    assert_eq!(query_field_type(&schema, "pet"), "Cat_Dog");
    let union = schema.get_type("Cat_Dog").unwrap();
    assert_eq!(union.kind, TypeKind::Union);
    let members: Vec<&str> = union.possible_types.iter().map(|name| name.as_str()).collect();
    assert_eq!(members, ["Cat", "Dog"]);
    assert_eq!(query_field_type(&schema, "cat"), "Cat");
}

#[test]
fn interface_implementations_are_transitive() {
    let service = ServiceDescriptor::new()
        .method(MethodDescriptor::resource("get", ["node"], TypeDescriptor::reference("Node")))
        .definition(TypeDefinition::service_object(
            "Node",
            ObjectDescriptor::new().method(MethodDescriptor::resource(
                "get",
                ["id"],
                TypeDescriptor::Int,
            )),
        ))
        .definition(TypeDefinition::service_object(
            "Named",
            ObjectDescriptor::new()
                .includes("Node")
                .method(MethodDescriptor::resource("get", ["name"], TypeDescriptor::String)),
        ))
        .definition(TypeDefinition::class(
            "Person",
            ObjectDescriptor::new()
                .includes("Named")
                .method(MethodDescriptor::resource("get", ["name"], TypeDescriptor::String)),
        ));
    let schema = generate_schema(&service).unwrap();

    let node = schema.get_type("Node").unwrap();
    assert_eq!(node.kind, TypeKind::Interface);
    assert!(node.possible_types.contains("Person"));
    let person = schema.get_type("Person").unwrap();
    let interfaces: Vec<&str> = person.interfaces.iter().map(|name| name.as_str()).collect();
    assert_eq!(interfaces, ["Node", "Named"]);
}

#[test]
fn no_nested_non_null_anywhere() {
    let service = ServiceDescriptor::new()
        .method(
            MethodDescriptor::resource(
                "get",
                ["people"],
                TypeDescriptor::array(TypeDescriptor::reference("Person")),
            )
            .param(Parameter::new(
                "ids",
                TypeDescriptor::optional(TypeDescriptor::array(TypeDescriptor::Int)),
            )),
        )
        .method(MethodDescriptor::resource(
            "get",
            ["rows"],
            TypeDescriptor::table(TypeDescriptor::reference("Person")),
        ))
        .method(MethodDescriptor::resource(
            "get",
            ["current"],
            TypeDescriptor::readonly(TypeDescriptor::reference("Person")),
        ))
        .method(
            MethodDescriptor::remote("addPerson", TypeDescriptor::reference("Person"))
                .param(Parameter::new("input", TypeDescriptor::reference("NewPerson"))),
        )
        .definition(TypeDefinition::record(
            "Person",
            [
                RecordField::new("name", TypeDescriptor::String),
                RecordField::new("scores", TypeDescriptor::map(TypeDescriptor::Float)),
                RecordField::new("friends", TypeDescriptor::array(TypeDescriptor::reference("Person"))),
                RecordField::new("balance", TypeDescriptor::optional(TypeDescriptor::Decimal)),
            ],
        ))
        .definition(TypeDefinition::record(
            "NewPerson",
            [
                RecordField::new("name", TypeDescriptor::String),
                RecordField::new("tags", TypeDescriptor::array(TypeDescriptor::String)).with_default(),
            ],
        ));
    let schema = generate_schema(&service).unwrap();

    assert_eq!(query_field_type(&schema, "people"), "[Person!]!");
    assert_eq!(query_field_type(&schema, "rows"), "[Person!]!");
    assert_eq!(query_field_type(&schema, "current"), "Person!");
    for ty in schema.types.values() {
        for field in ty.fields.values() {
            assert!(!field.ty.has_nested_non_null(), "{}.{}", ty.name, field.name);
            for arg in &field.args {
                assert!(!arg.ty.has_nested_non_null(), "{}.{}({})", ty.name, field.name, arg.name);
            }
        }
        for input in ty.input_fields.values() {
            assert!(!input.ty.has_nested_non_null(), "{}.{}", ty.name, input.name);
        }
    }
}
