//! Federation subgraph support: the `_Entity` union, the `_service` / `_entities`
//! root fields, and the federation directive definitions.

use super::Directive;
use super::DirectiveLocation;
use super::EnumValue;
use super::Field;
use super::InputValue;
use super::ScalarType;
use super::Schema;
use super::TypeKind;
use super::TypeRef;
use crate::name;
use crate::Name;

/// Directives added to a subgraph schema, in definition order
pub const FEDERATION_DIRECTIVES: [&str; 11] = [
    "external",
    "requires",
    "provides",
    "key",
    "link",
    "shareable",
    "inaccessible",
    "tag",
    "override",
    "composeDirective",
    "extends",
];

/// Types added to a subgraph schema
pub const FEDERATION_TYPES: [&str; 6] = [
    "_Entity",
    "_Any",
    "FieldSet",
    "link__Import",
    "link__Purpose",
    "_Service",
];

/// Root query fields added to a subgraph schema
pub const FEDERATION_QUERY_FIELDS: [&str; 2] = ["_entities", "_service"];

const TYPE_SYSTEM_LOCATIONS: [DirectiveLocation; 10] = [
    DirectiveLocation::FieldDefinition,
    DirectiveLocation::Object,
    DirectiveLocation::Interface,
    DirectiveLocation::Union,
    DirectiveLocation::ArgumentDefinition,
    DirectiveLocation::Scalar,
    DirectiveLocation::Enum,
    DirectiveLocation::EnumValue,
    DirectiveLocation::InputObject,
    DirectiveLocation::InputFieldDefinition,
];

fn directive(name: Name, locations: impl IntoIterator<Item = DirectiveLocation>) -> Directive {
    Directive {
        name,
        description: None,
        locations: locations.into_iter().collect(),
        args: Vec::new(),
    }
}

impl Schema {
    /// Turns this schema into a federation subgraph schema exposing `entities`.
    ///
    /// Must be called once, after every other type is registered and the query type is set.
    pub fn add_entities(&mut self, entities: impl IntoIterator<Item = Name>) {
        self.entities.extend(entities);
        tracing::debug!(entities = ?self.entities, "adding federation entities");

        let members = self.entities.clone();
        let entity_union = self.add_type(name!("_Entity"), TypeKind::Union, None);
        for member in members {
            entity_union.add_possible_type(member);
        }

        self.add_type(name!("_Any"), TypeKind::Scalar, None);
        self.add_type(name!("FieldSet"), TypeKind::Scalar, None);
        self.add_type(name!("link__Import"), TypeKind::Scalar, None);

        let purpose = self.add_type(name!("link__Purpose"), TypeKind::Enum, None);
        let mut security = EnumValue::new(name!("SECURITY"));
        security.description = Some(
            "`SECURITY` features provide metadata necessary to securely resolve fields.".into(),
        );
        purpose.add_enum_value(security);
        let mut execution = EnumValue::new(name!("EXECUTION"));
        execution.description =
            Some("`EXECUTION` features provide metadata necessary for operation execution.".into());
        purpose.add_enum_value(execution);

        self.add_scalar(ScalarType::String);
        self.add_scalar(ScalarType::Boolean);
        let string = TypeRef::scalar(ScalarType::String);
        let non_null_string = string.clone().non_null();

        self.add_type(name!("_Service"), TypeKind::Object, None)
            .add_field(Field::new(name!("sdl"), non_null_string.clone()));

        let entities_field = Field::new(
            name!("_entities"),
            TypeRef::list(TypeRef::named(name!("_Entity"))).non_null(),
        )
        .argument(InputValue::new(
            name!("representations"),
            TypeRef::list(TypeRef::named(name!("_Any")).non_null()).non_null(),
        ));
        let service_field = Field::new(
            name!("_service"),
            TypeRef::named(name!("_Service")).non_null(),
        );
        if let Some(query_name) = self.query_type.clone() {
            if let Some(query) = self.type_mut(&query_name) {
                query.add_field(entities_field);
                query.add_field(service_field);
            }
        }

        let fields = InputValue::new(
            name!("fields"),
            TypeRef::named(name!("FieldSet")).non_null(),
        );
        let name_arg = InputValue::new(name!("name"), non_null_string.clone());

        use DirectiveLocation as L;
        self.add_directive(directive(name!("external"), [L::FieldDefinition, L::Object]));
        self.add_directive(directive(name!("requires"), [L::FieldDefinition]).argument(fields.clone()));
        self.add_directive(directive(name!("provides"), [L::FieldDefinition]).argument(fields.clone()));
        self.add_directive(
            directive(name!("key"), [L::Object, L::Interface])
                .argument(fields)
                .argument(
                    InputValue::new(name!("resolvable"), TypeRef::scalar(ScalarType::Boolean))
                        .default_value(Some("true".into())),
                ),
        );
        self.add_directive(
            directive(name!("link"), [L::Schema])
                .argument(InputValue::new(name!("url"), non_null_string))
                .argument(InputValue::new(name!("as"), string))
                .argument(InputValue::new(
                    name!("for"),
                    TypeRef::named(name!("link__Purpose")),
                ))
                .argument(InputValue::new(
                    name!("import"),
                    TypeRef::list(TypeRef::named(name!("link__Import"))),
                )),
        );
        self.add_directive(directive(name!("shareable"), [L::Object, L::FieldDefinition]));
        self.add_directive(directive(name!("inaccessible"), TYPE_SYSTEM_LOCATIONS));
        self.add_directive(directive(name!("tag"), TYPE_SYSTEM_LOCATIONS).argument(name_arg.clone()));
        self.add_directive(directive(name!("override"), [L::FieldDefinition]).argument(name_arg.clone()));
        self.add_directive(directive(name!("composeDirective"), [L::Schema]).argument(name_arg));
        self.add_directive(directive(name!("extends"), [L::Object, L::Interface]));
    }
}
