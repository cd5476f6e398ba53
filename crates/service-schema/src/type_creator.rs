//! Translation of descriptor types into schema types.
//!
//! There are two paths: output types ([`TypeCreator::get_type`]) for field and return
//! types, and input types ([`TypeCreator::input_type`]) for arguments. The same record
//! definition becomes an `OBJECT` on the first and an `INPUT_OBJECT` on the second.
//!
//! The schema doubles as the memo table: a named type is registered before its fields
//! are resolved, so self-referential and mutually recursive definitions terminate.

use crate::descriptor::intersection_member;
use crate::descriptor::union_members;
use crate::descriptor::DefinitionKind;
use crate::descriptor::DirectiveClass;
use crate::descriptor::EnumMember;
use crate::descriptor::MethodDescriptor;
use crate::descriptor::ObjectDescriptor;
use crate::descriptor::Parameter;
use crate::descriptor::ParameterKind;
use crate::descriptor::PathSegment;
use crate::descriptor::RecordField;
use crate::descriptor::ServiceDescriptor;
use crate::descriptor::TypeDefinition;
use crate::descriptor::TypeDescriptor;
use crate::finder::InterfaceEntityFinder;
use crate::schema::Directive;
use crate::schema::DirectiveLocation;
use crate::schema::EnumValue;
use crate::schema::Field;
use crate::schema::InputValue;
use crate::schema::ObjectKind;
use crate::schema::Position;
use crate::schema::ScalarType;
use crate::schema::Schema;
use crate::schema::TypeKind;
use crate::schema::TypeRef;
use crate::sources::NodeLocation;
use crate::Name;

/// Placeholder recorded for parameters and input fields that declare a default value.
pub const DEFAULT_VALUE: &str = "\"\"";

pub const GENERATED_TYPE_DESCRIPTION: &str = "generated type";
pub const GENERATED_UNION_TYPE_DESCRIPTION: &str = "generated union type";

const MAP_KEY_ARGUMENT: &str = "key";
const MAP_KEY_ARGUMENT_DESCRIPTION: &str = "The key of the map value";

pub struct TypeCreator<'a, 's> {
    service: &'a ServiceDescriptor,
    finder: &'a InterfaceEntityFinder<'a>,
    schema: &'s mut Schema,
}

/// Names of a GraphQL field or type from a source identifier, without the quoted
/// identifier prefix (`'type` becomes `type`).
pub fn graphql_name(identifier: &str) -> Name {
    Name::new_unchecked(identifier.strip_prefix('\'').unwrap_or(identifier))
}

/// Name of the object type generated for one segment of a hierarchical resource path
pub fn synthetic_type_name(segment: &str) -> Name {
    let segment = segment.strip_prefix('\'').unwrap_or(segment);
    let mut chars = segment.chars();
    let name = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
        None => String::new(),
    };
    Name::new_unchecked(&name)
}

/// The registry name a descriptor type is memoized under, if it has one
fn registry_name(ty: &TypeDescriptor) -> Option<Name> {
    match ty {
        TypeDescriptor::String | TypeDescriptor::Char => Some(ScalarType::String.name()),
        TypeDescriptor::Int => Some(ScalarType::Int.name()),
        TypeDescriptor::Float => Some(ScalarType::Float.name()),
        TypeDescriptor::Boolean => Some(ScalarType::Boolean.name()),
        TypeDescriptor::Decimal => Some(ScalarType::Decimal.name()),
        TypeDescriptor::Upload => Some(ScalarType::Upload.name()),
        TypeDescriptor::Reference { name, .. } => Some(graphql_name(name)),
        _ => None,
    }
}

fn scalar_of(ty: &TypeDescriptor) -> Option<ScalarType> {
    match ty {
        TypeDescriptor::String | TypeDescriptor::Char => Some(ScalarType::String),
        TypeDescriptor::Int => Some(ScalarType::Int),
        TypeDescriptor::Float => Some(ScalarType::Float),
        TypeDescriptor::Boolean => Some(ScalarType::Boolean),
        TypeDescriptor::Decimal => Some(ScalarType::Decimal),
        _ => None,
    }
}

impl<'a, 's> TypeCreator<'a, 's> {
    pub fn new(
        service: &'a ServiceDescriptor,
        finder: &'a InterfaceEntityFinder<'a>,
        schema: &'s mut Schema,
    ) -> Self {
        Self {
            service,
            finder,
            schema,
        }
    }

    pub fn schema(&mut self) -> &mut Schema {
        &mut *self.schema
    }

    pub fn add_scalar(&mut self, scalar: ScalarType) -> TypeRef {
        self.schema.add_scalar(scalar);
        TypeRef::scalar(scalar)
    }

    /// Registers `name` with position and object kind, leaving an existing type untouched.
    fn register(
        &mut self,
        name: &Name,
        kind: TypeKind,
        description: Option<String>,
        location: Option<NodeLocation>,
        object_kind: Option<ObjectKind>,
    ) {
        if self.schema.contains_type(name) {
            return;
        }
        let position = self.position(location);
        let ty = self.schema.add_type(name.clone(), kind, description);
        ty.position = position;
        ty.object_kind = object_kind;
    }

    fn add_field_to(&mut self, type_name: &str, field: Field) {
        if let Some(ty) = self.schema.type_mut(type_name) {
            ty.add_field(field)
        }
    }

    pub fn position(&self, location: Option<NodeLocation>) -> Option<Position> {
        let location = location?;
        let file = self.service.sources.get(&location.file_id)?;
        let start = file.line_column(location.start)?;
        let end = file.line_column(location.end)?;
        Some(Position {
            file_path: file.path().display().to_string(),
            start_line: start.line,
            start_column: start.column,
            end_line: end.line,
            end_column: end.column,
        })
    }

    /// The field for a root resolver method: a resource method's path, or a remote method's name.
    pub fn root_field(&mut self, method: &'a MethodDescriptor) -> Option<Field> {
        if method.is_resource() {
            self.resource_field(method, method.path())
        } else {
            let name = graphql_name(&method.name);
            self.method_field(method, name)
        }
    }

    /// A resource method field. Every path segment but the last becomes a generated object type.
    pub fn resource_field(
        &mut self,
        method: &'a MethodDescriptor,
        path: &'a [PathSegment],
    ) -> Option<Field> {
        let (first, rest) = path.split_first()?;
        let segment = match first {
            PathSegment::Name(name) | PathSegment::Parameter(name) => name.as_str(),
            PathSegment::Rest => return None,
        };
        if rest.is_empty() {
            return self.method_field(method, graphql_name(segment));
        }
        let type_name = synthetic_type_name(segment);
        self.register(
            &type_name,
            TypeKind::Object,
            Some(GENERATED_TYPE_DESCRIPTION.to_owned()),
            None,
            None,
        );
        let child = self.resource_field(method, rest)?;
        self.add_field_to(&type_name, child);
        Some(Field::new(
            graphql_name(segment),
            TypeRef::named(type_name).non_null(),
        ))
    }

    fn method_field(&mut self, method: &'a MethodDescriptor, name: Name) -> Option<Field> {
        let Some(ty) = method
            .return_type
            .as_ref()
            .and_then(|ty| self.field_type(ty))
        else {
            tracing::debug!(method = %method.name, "no GraphQL type for return type, skipping field");
            return None;
        };
        let mut field = Field::new(name, ty).description(method.description.clone());
        if let Some(deprecation) = &method.deprecation {
            field = field.deprecated(deprecation.reason.clone());
        }
        field.position = self.position(method.location);
        for param in method.graphql_params() {
            if let Some(arg) = self.arg(param) {
                field.add_arg(arg);
            }
        }
        Some(field)
    }

    /// An argument built from a method parameter
    pub fn arg(&mut self, param: &'a Parameter) -> Option<InputValue> {
        let ty = self.input_field_type(&param.ty)?;
        let default_value = match param.kind {
            ParameterKind::Defaultable => Some(DEFAULT_VALUE.to_owned()),
            ParameterKind::Required => None,
        };
        Some(
            InputValue::new(graphql_name(&param.name), ty)
                .description(param.description.clone())
                .default_value(default_value),
        )
    }

    /// Output type, wrapped in `NON_NULL` unless `ty` is a union with `nil`
    pub fn field_type(&mut self, ty: &'a TypeDescriptor) -> Option<TypeRef> {
        let resolved = self.get_type(ty)?;
        if ty.is_nilable() {
            Some(resolved)
        } else {
            Some(resolved.non_null())
        }
    }

    /// Input type, wrapped in `NON_NULL` unless `ty` is a union with `nil`
    pub fn input_field_type(&mut self, ty: &'a TypeDescriptor) -> Option<TypeRef> {
        let resolved = self.input_type(ty)?;
        if ty.is_nilable() {
            Some(resolved)
        } else {
            Some(resolved.non_null())
        }
    }

    pub fn get_type(&mut self, ty: &'a TypeDescriptor) -> Option<TypeRef> {
        if let Some(name) = registry_name(ty) {
            if self.schema.contains_type(&name) {
                return Some(TypeRef::named(name));
            }
        }
        if let Some(scalar) = scalar_of(ty) {
            return Some(self.add_scalar(scalar));
        }
        match ty {
            TypeDescriptor::Reference { name, .. } => {
                let service = self.service;
                let definition = service.get_definition(name)?;
                self.definition_type(definition)
            }
            TypeDescriptor::Array { member } => Some(TypeRef::list(self.field_type(member)?)),
            TypeDescriptor::Union { members } => self.union_type(None, None, None, members),
            TypeDescriptor::Intersection { .. } => {
                self.get_type(ty.effective_intersection_member()?)
            }
            TypeDescriptor::Stream { item } => self.get_type(item),
            TypeDescriptor::Table { row } => self.table_type(row),
            _ => None,
        }
    }

    /// Output type of a named definition
    pub fn definition_type(&mut self, definition: &'a TypeDefinition) -> Option<TypeRef> {
        let name = graphql_name(&definition.name);
        let description = definition.description.clone();
        match &definition.kind {
            DefinitionKind::Record { fields } => {
                self.record_type(&name, description, definition.location, fields)
            }
            DefinitionKind::Union { members } => {
                self.union_type(Some(name), description, definition.location, members)
            }
            DefinitionKind::Intersection { members } => {
                let effective = intersection_member(members)?;
                match effective {
                    TypeDescriptor::Record { fields } => {
                        self.record_type(&name, description, definition.location, fields)
                    }
                    other => self.get_type(other),
                }
            }
            DefinitionKind::Table { row } => self.table_type(row),
            DefinitionKind::ServiceObject(object) => {
                let mut visiting = Vec::new();
                Some(self.interface_type(&name, definition, object, &mut visiting))
            }
            DefinitionKind::Class(object) => Some(self.class_type(&name, definition, object)),
            DefinitionKind::Enum { members } => {
                Some(self.enum_type(&name, description, definition.location, members))
            }
            DefinitionKind::Alias { .. } => None,
        }
    }

    fn record_type(
        &mut self,
        name: &Name,
        description: Option<String>,
        location: Option<NodeLocation>,
        fields: &'a [RecordField],
    ) -> Option<TypeRef> {
        self.register(
            name,
            TypeKind::Object,
            description,
            location,
            Some(ObjectKind::Record),
        );
        for record_field in fields {
            if let Some(field) = self.record_field(record_field) {
                self.add_field_to(name, field);
            }
        }
        Some(TypeRef::named(name.clone()))
    }

    fn record_field(&mut self, record_field: &'a RecordField) -> Option<Field> {
        let name = graphql_name(&record_field.name);
        let mut args = Vec::new();
        let mut ty = match &record_field.ty {
            TypeDescriptor::Map { value } => {
                let key = self.add_scalar(ScalarType::String).non_null();
                args.push(
                    InputValue::new(Name::new_unchecked(MAP_KEY_ARGUMENT), key)
                        .description(Some(MAP_KEY_ARGUMENT_DESCRIPTION.to_owned())),
                );
                self.get_type(value)?
            }
            other => self.get_type(other)?,
        };
        if !record_field.ty.is_nilable() && !record_field.optional {
            ty = ty.non_null();
        }
        let mut field = Field::new(name, ty).description(record_field.description.clone());
        field.args = args;
        field.position = self.position(record_field.location);
        Some(field)
    }

    fn union_type(
        &mut self,
        name: Option<Name>,
        description: Option<String>,
        location: Option<NodeLocation>,
        members: &'a [TypeDescriptor],
    ) -> Option<TypeRef> {
        let effective = union_members(members);
        if let [single] = effective.as_slice() {
            return self.get_type(*single);
        }
        let name = match name {
            Some(name) => name,
            None => Name::new_unchecked(
                &effective
                    .iter()
                    .map(|member| match registry_name(member) {
                        Some(name) => name.to_string(),
                        None => member.kind_name().to_owned(),
                    })
                    .collect::<Vec<_>>()
                    .join("_"),
            ),
        };
        let description =
            description.or_else(|| Some(GENERATED_UNION_TYPE_DESCRIPTION.to_owned()));
        self.register(&name, TypeKind::Union, description, location, None);
        for member in effective {
            let resolved = self.get_type(member);
            if registry_name(member).is_none() {
                continue;
            }
            if let Some(resolved) = resolved {
                let member_name = resolved.inner_named().clone();
                if let Some(union) = self.schema.type_mut(&name) {
                    union.add_possible_type(member_name);
                }
            }
        }
        Some(TypeRef::named(name))
    }

    fn table_type(&mut self, row: &'a TypeDescriptor) -> Option<TypeRef> {
        Some(TypeRef::list(self.get_type(row)?.non_null()))
    }

    fn class_type(
        &mut self,
        name: &Name,
        definition: &'a TypeDefinition,
        object: &'a ObjectDescriptor,
    ) -> TypeRef {
        self.register(
            name,
            TypeKind::Object,
            definition.description.clone(),
            definition.location,
            Some(ObjectKind::Class),
        );
        self.add_resource_fields(name, object);
        TypeRef::named(name.clone())
    }

    /// An interface from a service object type. `visiting` holds the interfaces currently
    /// under construction along the implementor chain that led here.
    fn interface_type(
        &mut self,
        name: &Name,
        definition: &'a TypeDefinition,
        object: &'a ObjectDescriptor,
        visiting: &mut Vec<Name>,
    ) -> TypeRef {
        if visiting.contains(name) {
            return TypeRef::named(name.clone());
        }
        self.register(
            name,
            TypeKind::Interface,
            definition.description.clone(),
            definition.location,
            None,
        );
        self.types_from_interface(name, visiting);
        self.add_resource_fields(name, object);
        TypeRef::named(name.clone())
    }

    fn add_resource_fields(&mut self, type_name: &Name, object: &'a ObjectDescriptor) {
        for method in object.resource_methods() {
            if let Some(field) = self.resource_field(method, method.path()) {
                self.add_field_to(type_name, field);
            }
        }
    }

    fn types_from_interface(&mut self, interface: &Name, visiting: &mut Vec<Name>) {
        let service = self.service;
        let finder = self.finder;
        visiting.push(interface.clone());
        for implementation in finder.implementations(interface) {
            let Some(definition) = service.get_definition(implementation) else {
                continue;
            };
            let implementation_name = graphql_name(implementation);
            match &definition.kind {
                DefinitionKind::Class(object) => {
                    self.class_type(&implementation_name, definition, object);
                }
                DefinitionKind::ServiceObject(object) => {
                    self.interface_type(&implementation_name, definition, object, visiting);
                }
                _ => continue,
            }

            let transitive = self
                .schema
                .get_type(&implementation_name)
                .map(|ty| ty.possible_types.clone())
                .unwrap_or_default();
            if let Some(interface_type) = self.schema.type_mut(interface) {
                interface_type.add_possible_type(implementation_name.clone());
                for name in transitive {
                    interface_type.add_possible_type(name);
                }
            }
            if let Some(implemented) = self.schema.type_mut(&implementation_name) {
                for super_interface in visiting.iter() {
                    implemented.add_interface(super_interface.clone());
                }
            }
        }
        visiting.pop();
    }

    fn enum_type(
        &mut self,
        name: &Name,
        description: Option<String>,
        location: Option<NodeLocation>,
        members: &'a [EnumMember],
    ) -> TypeRef {
        self.register(name, TypeKind::Enum, description, location, None);
        if let Some(ty) = self.schema.type_mut(name) {
            for member in members {
                let mut value = EnumValue::new(graphql_name(&member.name));
                value.description = member.description.clone();
                if let Some(deprecation) = &member.deprecation {
                    value.is_deprecated = true;
                    value.deprecation_reason = deprecation.reason.clone();
                }
                ty.add_enum_value(value);
            }
        }
        TypeRef::named(name.clone())
    }

    pub fn input_type(&mut self, ty: &'a TypeDescriptor) -> Option<TypeRef> {
        if let Some(name) = registry_name(ty) {
            if self.schema.contains_type(&name) {
                return Some(TypeRef::named(name));
            }
        }
        if let Some(scalar) = scalar_of(ty) {
            return Some(self.add_scalar(scalar));
        }
        match ty {
            TypeDescriptor::Upload => Some(self.add_scalar(ScalarType::Upload)),
            TypeDescriptor::Reference { name, .. } => {
                let service = self.service;
                let definition = service.get_definition(name)?;
                self.input_definition_type(definition)
            }
            TypeDescriptor::Array { member } => {
                Some(TypeRef::list(self.input_field_type(member)?))
            }
            TypeDescriptor::Union { .. } => {
                let first = ty.effective_members().into_iter().next()?;
                self.input_type(first)
            }
            TypeDescriptor::Intersection { .. } => {
                self.input_type(ty.effective_intersection_member()?)
            }
            _ => None,
        }
    }

    fn input_definition_type(&mut self, definition: &'a TypeDefinition) -> Option<TypeRef> {
        let name = graphql_name(&definition.name);
        let description = definition.description.clone();
        match &definition.kind {
            DefinitionKind::Record { fields } => {
                Some(self.input_object_type(&name, description, definition.location, fields))
            }
            DefinitionKind::Union { members } => {
                let first = union_members(members).into_iter().next()?;
                self.input_type(first)
            }
            DefinitionKind::Intersection { members } => match intersection_member(members)? {
                TypeDescriptor::Record { fields } => {
                    Some(self.input_object_type(&name, description, definition.location, fields))
                }
                other => self.input_type(other),
            },
            DefinitionKind::Enum { members } => {
                Some(self.enum_type(&name, description, definition.location, members))
            }
            _ => None,
        }
    }

    fn input_object_type(
        &mut self,
        name: &Name,
        description: Option<String>,
        location: Option<NodeLocation>,
        fields: &'a [RecordField],
    ) -> TypeRef {
        self.register(name, TypeKind::InputObject, description, location, None);
        for record_field in fields {
            let Some(mut ty) = self.input_type(&record_field.ty) else {
                continue;
            };
            if !record_field.ty.is_nilable() && !record_field.optional {
                ty = ty.non_null();
            }
            let default_value = record_field.has_default.then(|| DEFAULT_VALUE.to_owned());
            let input = InputValue::new(graphql_name(&record_field.name), ty)
                .description(record_field.description.clone())
                .default_value(default_value);
            if let Some(input_object) = self.schema.type_mut(name) {
                input_object.add_input_field(input);
            }
        }
        TypeRef::named(name.clone())
    }

    /// The directive defined by an executable directive class
    pub fn directive(&mut self, name: &str, class: &'a DirectiveClass) -> Directive {
        let locations = class
            .config
            .iter()
            .flat_map(|config| config.on.iter())
            .filter_map(|on| on.parse::<DirectiveLocation>().ok());
        let mut directive = Directive::new(graphql_name(name), "", locations);
        if let Some(init) = class.init_method() {
            for param in init.graphql_params() {
                if let Some(arg) = self.arg(param) {
                    directive.args.push(arg);
                }
            }
        }
        directive
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::RecordField;
    use pretty_assertions::assert_eq;

    #[test]
    fn self_referential_record_terminates() {
        let service = ServiceDescriptor::new().definition(TypeDefinition::record(
            "Person",
            [
                RecordField::new("name", TypeDescriptor::String),
                RecordField::new(
                    "friend",
                    TypeDescriptor::optional(TypeDescriptor::reference("Person")),
                ),
            ],
        ));
        let ty = TypeDescriptor::reference("Person");
        let finder = InterfaceEntityFinder::new(&service);
        let mut schema = Schema::new(None, false);
        let resolved = TypeCreator::new(&service, &finder, &mut schema).field_type(&ty);
        assert_eq!(resolved.unwrap().to_string(), "Person!");
        let person = schema.get_type("Person").unwrap();
        assert_eq!(person.object_kind, Some(ObjectKind::Record));
        assert_eq!(person.fields["friend"].ty.to_string(), "Person");
        assert_eq!(person.fields["name"].ty.to_string(), "String!");
    }

    #[test]
    fn map_fields_take_a_key_argument() {
        let service = ServiceDescriptor::new().definition(TypeDefinition::record(
            "Scores",
            [RecordField::new("byName", TypeDescriptor::map(TypeDescriptor::Int))],
        ));
        let ty = TypeDescriptor::reference("Scores");
        let finder = InterfaceEntityFinder::new(&service);
        let mut schema = Schema::new(None, false);
        TypeCreator::new(&service, &finder, &mut schema).get_type(&ty);
        let field = &schema.get_type("Scores").unwrap().fields["byName"];
        assert_eq!(field.ty.to_string(), "Int!");
        assert_eq!(field.args[0].name, "key");
        assert_eq!(field.args[0].ty.to_string(), "String!");
    }

    #[test]
    fn table_is_a_list_of_non_null_rows() {
        let service = ServiceDescriptor::new().definition(TypeDefinition::record(
            "Row",
            [RecordField::new("id", TypeDescriptor::Int)],
        ));
        let ty = TypeDescriptor::table(TypeDescriptor::reference("Row"));
        let finder = InterfaceEntityFinder::new(&service);
        let mut schema = Schema::new(None, false);
        let resolved = TypeCreator::new(&service, &finder, &mut schema).field_type(&ty);
        assert_eq!(resolved.unwrap().to_string(), "[Row!]!");
    }

    #[test]
    fn input_records_become_input_objects() {
        let service = ServiceDescriptor::new().definition(TypeDefinition::record(
            "NewPerson",
            [
                RecordField::new("name", TypeDescriptor::String),
                RecordField::new("age", TypeDescriptor::Int).with_default(),
                RecordField::new("nick", TypeDescriptor::String).optional(),
            ],
        ));
        let ty = TypeDescriptor::reference("NewPerson");
        let finder = InterfaceEntityFinder::new(&service);
        let mut schema = Schema::new(None, false);
        let resolved = TypeCreator::new(&service, &finder, &mut schema).input_field_type(&ty);
        assert_eq!(resolved.unwrap().to_string(), "NewPerson!");
        let input = schema.get_type("NewPerson").unwrap();
        assert_eq!(input.kind, TypeKind::InputObject);
        assert_eq!(input.input_fields["age"].default_value.as_deref(), Some(DEFAULT_VALUE));
        assert_eq!(input.input_fields["nick"].ty.to_string(), "String");
    }

    #[test]
    fn synthetic_names_are_capitalized() {
        assert_eq!(synthetic_type_name("lift"), "Lift");
        assert_eq!(synthetic_type_name("'type"), "Type");
        assert_eq!(graphql_name("'type"), "type");
    }
}
