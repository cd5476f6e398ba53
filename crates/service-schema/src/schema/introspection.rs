//! Introspection meta-types registered in every generated schema.

use super::DirectiveLocation;
use super::EnumValue;
use super::Field;
use super::InputValue;
use super::ScalarType;
use super::Schema;
use super::TypeKind;
use super::TypeRef;
use crate::Name;

const TYPE_KINDS: [&str; 8] = [
    "SCALAR",
    "OBJECT",
    "INTERFACE",
    "UNION",
    "ENUM",
    "INPUT_OBJECT",
    "LIST",
    "NON_NULL",
];

/// `(type name, [(field name, field type, [(argument name, argument type, default)])])`
type ObjectSpec = (
    &'static str,
    &'static [(&'static str, &'static str, &'static [(&'static str, &'static str, Option<&'static str>)])],
);

const INCLUDE_DEPRECATED: &[(&str, &str, Option<&str>)] =
    &[("includeDeprecated", "Boolean", Some("false"))];

const OBJECTS: [ObjectSpec; 6] = [
    (
        "__Schema",
        &[
            ("description", "String", &[]),
            ("types", "[__Type!]!", &[]),
            ("queryType", "__Type!", &[]),
            ("mutationType", "__Type", &[]),
            ("subscriptionType", "__Type", &[]),
            ("directives", "[__Directive!]!", &[]),
        ],
    ),
    (
        "__Type",
        &[
            ("kind", "__TypeKind!", &[]),
            ("name", "String", &[]),
            ("description", "String", &[]),
            ("fields", "[__Field!]", INCLUDE_DEPRECATED),
            ("interfaces", "[__Type!]", &[]),
            ("possibleTypes", "[__Type!]", &[]),
            ("enumValues", "[__EnumValue!]", INCLUDE_DEPRECATED),
            ("inputFields", "[__InputValue!]", &[]),
            ("ofType", "__Type", &[]),
        ],
    ),
    (
        "__Field",
        &[
            ("name", "String!", &[]),
            ("description", "String", &[]),
            ("args", "[__InputValue!]!", &[]),
            ("type", "__Type!", &[]),
            ("isDeprecated", "Boolean!", &[]),
            ("deprecationReason", "String", &[]),
        ],
    ),
    (
        "__InputValue",
        &[
            ("name", "String!", &[]),
            ("description", "String", &[]),
            ("type", "__Type!", &[]),
            ("defaultValue", "String", &[]),
        ],
    ),
    (
        "__EnumValue",
        &[
            ("name", "String!", &[]),
            ("description", "String", &[]),
            ("isDeprecated", "Boolean!", &[]),
            ("deprecationReason", "String", &[]),
        ],
    ),
    (
        "__Directive",
        &[
            ("name", "String!", &[]),
            ("description", "String", &[]),
            ("locations", "[__DirectiveLocation!]!", &[]),
            ("args", "[__InputValue!]!", &[]),
        ],
    ),
];

/// Parses a type reference such as `[__Type!]!`
fn type_ref(source: &str) -> TypeRef {
    if let Some(inner) = source.strip_suffix('!') {
        return type_ref(inner).non_null();
    }
    if let Some(inner) = source
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
    {
        return TypeRef::list(type_ref(inner));
    }
    TypeRef::named(Name::new_unchecked(source))
}

pub(crate) fn add_introspection_types(schema: &mut Schema) {
    schema.add_scalar(ScalarType::String);
    schema.add_scalar(ScalarType::Boolean);

    let type_kind = schema.add_type(Name::new_unchecked("__TypeKind"), TypeKind::Enum, None);
    for kind in TYPE_KINDS {
        type_kind.add_enum_value(EnumValue::new(Name::new_unchecked(kind)));
    }
    let locations = schema.add_type(
        Name::new_unchecked("__DirectiveLocation"),
        TypeKind::Enum,
        None,
    );
    for location in DirectiveLocation::ALL {
        locations.add_enum_value(EnumValue::new(Name::new_unchecked(location.name())));
    }

    for (type_name, fields) in OBJECTS {
        let ty = schema.add_type(Name::new_unchecked(type_name), TypeKind::Object, None);
        for &(field_name, field_type, args) in fields {
            let mut field = Field::new(Name::new_unchecked(field_name), type_ref(field_type));
            for &(arg_name, arg_type, default) in args {
                field.add_arg(
                    InputValue::new(Name::new_unchecked(arg_name), type_ref(arg_type))
                        .default_value(default.map(str::to_owned)),
                );
            }
            ty.add_field(field);
        }
    }
}
