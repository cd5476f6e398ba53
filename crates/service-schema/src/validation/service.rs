//! Output-side checks: resolver names and paths, accessors, return types and the
//! object graph reachable from them.

use super::field_path;
use super::is_reserved_field_name;
use super::is_reserved_type_name;
use super::Validator;
use super::RESERVED_RESOLVER_NAMES;
use crate::descriptor::has_error_member;
use crate::descriptor::intersection_member;
use crate::descriptor::DefinitionKind;
use crate::descriptor::MethodDescriptor;
use crate::descriptor::MethodKind;
use crate::descriptor::ObjectDescriptor;
use crate::descriptor::PathSegment;
use crate::descriptor::RecordField;
use crate::descriptor::TypeDefinition;
use crate::descriptor::TypeDescriptor;
use crate::descriptor::GET_ACCESSOR;
use crate::descriptor::SUBSCRIBE_ACCESSOR;
use crate::diagnostic::DiagnosticCode;
use crate::sources::NodeLocation;
use indexmap::IndexSet;

impl<'a> Validator<'a> {
    pub(super) fn validate_service_methods(&mut self) {
        let service = self.service;
        let has_query = service
            .methods
            .iter()
            .any(|method| method.accessor() == Some(GET_ACCESSOR));
        if !has_query {
            self.error(
                DiagnosticCode::MissingResourceFunctions,
                service.location,
                "a GraphQL service must have at least one resource function with the `get` accessor"
                    .to_owned(),
            );
        }
        self.validate_hierarchical_paths(service.resource_methods());

        for method in &service.methods {
            match &method.kind {
                MethodKind::Resource { accessor, .. } => self.validate_root_resource(method, accessor),
                MethodKind::Remote => self.validate_root_remote(method),
                MethodKind::Init | MethodKind::Plain => {}
            }
        }
    }

    fn validate_root_resource(&mut self, method: &'a MethodDescriptor, accessor: &str) {
        let root = match accessor {
            GET_ACCESSOR => "Query",
            SUBSCRIBE_ACCESSOR => "Subscription",
            other => {
                self.error(
                    DiagnosticCode::InvalidRootResourceAccessor,
                    method.location,
                    format!(
                        "invalid resource accessor `{}` for `{}`: only `get` and `subscribe` are allowed in a service",
                        other,
                        method.field_name()
                    ),
                );
                return;
            }
        };
        if self.service.is_subgraph && RESERVED_RESOLVER_NAMES.contains(&method.field_name()) {
            self.error(
                DiagnosticCode::InvalidUseOfReservedResourcePath,
                method.location,
                format!(
                    "resource path `{}` is reserved for federation in a subgraph",
                    method.field_name()
                ),
            );
        }
        let Some(path) = self.resource_path(method, root) else {
            return;
        };
        if accessor == SUBSCRIBE_ACCESSOR {
            match &method.return_type {
                Some(TypeDescriptor::Stream { item }) => {
                    self.validate_output_type(item, &path, method.location)
                }
                other => {
                    let found = other
                        .as_ref()
                        .map_or_else(|| "nil".to_owned(), ToString::to_string);
                    self.error(
                        DiagnosticCode::InvalidSubscribeResourceReturnType,
                        method.location,
                        format!(
                            "subscription `{}` must return a stream, found `{}`",
                            method.field_name(),
                            found
                        ),
                    );
                }
            }
        } else {
            self.validate_return_type(method, &path);
        }
        self.validate_params(method, &path);
    }

    fn validate_root_remote(&mut self, method: &'a MethodDescriptor) {
        let name = method.name.trim_start_matches('\'');
        let path = field_path("Mutation", name);
        if is_reserved_field_name(name) {
            self.reserved_field_name(&path, name, method.location);
        }
        if self.service.is_subgraph && RESERVED_RESOLVER_NAMES.contains(&name) {
            self.error(
                DiagnosticCode::InvalidUseOfReservedRemoteMethodName,
                method.location,
                format!("remote method name `{name}` is reserved for federation in a subgraph"),
            );
        }
        self.validate_return_type(method, &path);
        self.validate_params(method, &path);
    }

    /// Checks the path segments of a resource method and returns its field path under `parent`.
    fn resource_path(&mut self, method: &MethodDescriptor, parent: &str) -> Option<String> {
        if method.path().is_empty() {
            self.error(
                DiagnosticCode::InvalidResourcePath,
                method.location,
                "invalid resource path `.`: a GraphQL resource must have a named path".to_owned(),
            );
            return None;
        }
        let mut path = parent.to_owned();
        let mut valid = true;
        for segment in method.path() {
            match segment {
                PathSegment::Name(name) => {
                    path = field_path(&path, name);
                    if is_reserved_field_name(name) {
                        self.reserved_field_name(&path, name, method.location);
                    }
                }
                PathSegment::Parameter(_) | PathSegment::Rest => {
                    let shown = match segment {
                        PathSegment::Parameter(name) => format!("[{name}]"),
                        _ => "[...]".to_owned(),
                    };
                    self.error(
                        DiagnosticCode::InvalidResourcePath,
                        method.location,
                        format!("invalid resource path segment `{shown}`: path parameters are not supported"),
                    );
                    valid = false;
                }
            }
        }
        valid.then_some(path)
    }

    /// A path may not be both a field and the prefix of a longer path.
    fn validate_hierarchical_paths(&mut self, methods: impl Iterator<Item = &'a MethodDescriptor>) {
        let paths: Vec<(&MethodDescriptor, Vec<&str>)> = methods
            .filter(|method| method.accessor() == Some(GET_ACCESSOR))
            .filter_map(|method| Some((method, method.path_names()?)))
            .collect();
        for (method, path) in &paths {
            let shadowed = paths
                .iter()
                .any(|(_, other)| other.len() < path.len() && path.starts_with(other));
            if shadowed {
                self.error(
                    DiagnosticCode::InvalidHierarchicalResourcePath,
                    method.location,
                    format!(
                        "invalid hierarchical resource path `{}`: a prefix of it is already a field",
                        path.join("/")
                    ),
                );
            }
        }
    }

    fn reserved_field_name(&mut self, path: &str, name: &str, location: Option<NodeLocation>) {
        self.error(
            DiagnosticCode::InvalidFieldName,
            location,
            format!(
                "invalid field name `{name}` at `{path}`: names starting with `__` are reserved for introspection"
            ),
        );
    }

    fn validate_return_type(&mut self, method: &'a MethodDescriptor, path: &str) {
        match &method.return_type {
            Some(ty) => self.validate_output_type(ty, path, method.location),
            None => self.error(
                DiagnosticCode::InvalidReturnTypeNil,
                method.location,
                format!("`{path}` must return a value"),
            ),
        }
    }

    pub(super) fn validate_output_type(
        &mut self,
        ty: &'a TypeDescriptor,
        path: &str,
        location: Option<NodeLocation>,
    ) {
        match ty {
            TypeDescriptor::String
            | TypeDescriptor::Char
            | TypeDescriptor::Int
            | TypeDescriptor::Float
            | TypeDescriptor::Boolean
            | TypeDescriptor::Decimal => {}
            TypeDescriptor::Nil => self.error(
                DiagnosticCode::InvalidReturnTypeNil,
                location,
                format!("`{path}` returns only `nil`"),
            ),
            TypeDescriptor::Error => self.error(
                DiagnosticCode::InvalidReturnTypeError,
                location,
                format!("`{path}` returns only `error`"),
            ),
            TypeDescriptor::Any | TypeDescriptor::Anydata => self.error(
                DiagnosticCode::InvalidReturnTypeAny,
                location,
                format!("`{path}` returns `{ty}`, which has no GraphQL output type"),
            ),
            TypeDescriptor::Json
            | TypeDescriptor::Byte
            | TypeDescriptor::Readonly
            | TypeDescriptor::Upload
            | TypeDescriptor::Context
            | TypeDescriptor::Field
            | TypeDescriptor::Map { .. }
            | TypeDescriptor::Stream { .. }
            | TypeDescriptor::Singleton { .. } => self.invalid_return_type(ty, path, location),
            TypeDescriptor::Record { .. } => self.error(
                DiagnosticCode::InvalidAnonymousFieldType,
                location,
                format!("anonymous record `{ty}` returned at `{path}`: use a named record type"),
            ),
            TypeDescriptor::Array { member } => self.validate_output_type(member, path, location),
            TypeDescriptor::Table { row } => self.validate_output_type(row, path, location),
            TypeDescriptor::Union { members } => self.validate_output_union(ty, members, path, location),
            TypeDescriptor::Intersection { members } => match intersection_member(members) {
                Some(member) => self.validate_output_type(member, path, location),
                None => self.invalid_return_type(ty, path, location),
            },
            TypeDescriptor::Reference {
                name,
                location: reference_location,
            } => self.validate_output_reference(name, path, reference_location.or(location)),
        }
    }

    fn invalid_return_type(&mut self, ty: &TypeDescriptor, path: &str, location: Option<NodeLocation>) {
        let shown = match ty {
            TypeDescriptor::Map { .. } | TypeDescriptor::Stream { .. } => ty.kind_name().to_owned(),
            other => other.to_string(),
        };
        self.error(
            DiagnosticCode::InvalidReturnType,
            location,
            format!("invalid return type `{shown}` at `{path}`"),
        );
    }

    fn validate_output_union(
        &mut self,
        ty: &'a TypeDescriptor,
        members: &'a [TypeDescriptor],
        path: &str,
        location: Option<NodeLocation>,
    ) {
        let effective = ty.effective_members();
        match effective.as_slice() {
            [] => {
                let (code, only) = match (has_error_member(members), ty.is_nilable()) {
                    (true, true) => (DiagnosticCode::InvalidReturnTypeErrorOrNil, "`error` or `nil`"),
                    (true, false) => (DiagnosticCode::InvalidReturnTypeError, "`error`"),
                    _ => (DiagnosticCode::InvalidReturnTypeNil, "`nil`"),
                };
                self.error(code, location, format!("`{path}` returns only {only}"));
            }
            [single] => self.validate_output_type(*single, path, location),
            many => {
                for member in many {
                    self.validate_union_member(*member, path, location);
                }
            }
        }
    }

    /// Members of a GraphQL union must be service classes.
    fn validate_union_member(
        &mut self,
        member: &'a TypeDescriptor,
        path: &str,
        location: Option<NodeLocation>,
    ) {
        let service = self.service;
        let is_class = match member {
            TypeDescriptor::Reference { name, .. } => service
                .get_definition(name)
                .is_some_and(|definition| matches!(definition.kind, DefinitionKind::Class(_))),
            _ => false,
        };
        if is_class {
            self.validate_output_type(member, path, location);
        } else {
            self.error(
                DiagnosticCode::InvalidUnionMemberType,
                location,
                format!("invalid union member type `{member}`: union members must be service classes"),
            );
        }
    }

    fn validate_output_reference(&mut self, name: &str, path: &str, location: Option<NodeLocation>) {
        if is_reserved_type_name(name) {
            self.error(
                DiagnosticCode::InvalidUseOfReservedTypeAsOutputType,
                location,
                format!("type `{name}` returned at `{path}` is reserved for federation"),
            );
            return;
        }
        let service = self.service;
        let Some(definition) = service.get_definition(name) else {
            return;
        };
        match &definition.kind {
            DefinitionKind::Record { fields } => self.validate_output_record(definition, fields, path),
            DefinitionKind::Class(object) if !object.is_service => self.error(
                DiagnosticCode::InvalidReturnTypeClass,
                location,
                format!("class `{name}` returned at `{path}` must be a service class"),
            ),
            DefinitionKind::Class(object) => self.validate_object(definition, object, path),
            DefinitionKind::ServiceObject(object) => {
                self.validate_object(definition, object, path);
                let implementations = service.definitions.values().filter(|implementation| {
                    implementation
                        .object()
                        .is_some_and(|object| object.inclusions.iter().any(|i| i == name))
                });
                for implementation in implementations {
                    if let Some(object) = implementation.object() {
                        self.validate_object(implementation, object, path);
                    }
                }
            }
            DefinitionKind::Enum { .. } => {}
            DefinitionKind::Union { members } => {
                if !self.visited.insert(definition.name.as_str()) {
                    return;
                }
                for member in members {
                    if matches!(member, TypeDescriptor::Nil | TypeDescriptor::Error) {
                        continue;
                    }
                    self.validate_union_member(member, path, definition.location.or(location));
                }
            }
            DefinitionKind::Intersection { members } => match intersection_member(members) {
                Some(TypeDescriptor::Record { fields }) => {
                    self.validate_output_record(definition, fields, path)
                }
                Some(member) => self.validate_output_type(member, path, location),
                None => self.error(
                    DiagnosticCode::InvalidReturnType,
                    location,
                    format!("invalid return type `{name}` at `{path}`"),
                ),
            },
            DefinitionKind::Table { row } => self.validate_output_type(row, path, location),
            DefinitionKind::Alias { target } if target.is_primitive() => {
                self.unsupported_alias(definition, target)
            }
            DefinitionKind::Alias { target } => self.validate_output_type(target, path, location),
        }
    }

    pub(super) fn unsupported_alias(&mut self, definition: &TypeDefinition, target: &TypeDescriptor) {
        self.error(
            DiagnosticCode::UnsupportedPrimitiveTypeAlias,
            definition.location,
            format!(
                "type alias `{}` of primitive `{}` is not supported, use `{}` directly",
                definition.name, target, target
            ),
        );
    }

    fn validate_output_record(
        &mut self,
        definition: &'a TypeDefinition,
        fields: &'a [RecordField],
        path: &str,
    ) {
        let name = definition.name.as_str();
        if self.input_objects.contains(name) {
            self.error(
                DiagnosticCode::InvalidReturnTypeInputObject,
                definition.location,
                format!("`{path}` returns `{name}`, which is already used as an input object"),
            );
            return;
        }
        if !self.output_records.insert(name) {
            return;
        }
        for field in fields {
            let field_path = field_path(path, &field.name);
            if is_reserved_field_name(&field.name) {
                self.reserved_field_name(&field_path, &field.name, field.location);
            }
            let ty = match &field.ty {
                TypeDescriptor::Map { value } => value,
                other => other,
            };
            self.validate_output_type(ty, &field_path, field.location.or(definition.location));
        }
    }

    fn validate_object(&mut self, definition: &'a TypeDefinition, object: &'a ObjectDescriptor, path: &str) {
        if !self.visited.insert(definition.name.as_str()) {
            return;
        }
        self.validate_hierarchical_paths(object.resource_methods());
        for method in &object.methods {
            match &method.kind {
                MethodKind::Resource { accessor, .. } if accessor != GET_ACCESSOR => self.error(
                    DiagnosticCode::InvalidResourceFunctionAccessor,
                    method.location,
                    format!(
                        "invalid accessor `{}` for `{}` in `{}`: only `get` is allowed",
                        accessor,
                        method.field_name(),
                        definition.name
                    ),
                ),
                MethodKind::Resource { .. } => {
                    if let Some(method_path) = self.resource_path(method, path) {
                        self.validate_return_type(method, &method_path);
                        self.validate_params(method, &method_path);
                    }
                }
                MethodKind::Remote => self.error(
                    DiagnosticCode::InvalidFunction,
                    method.location,
                    format!(
                        "remote method `{}` is not allowed in `{}`, which is returned as an output type",
                        method.name, definition.name
                    ),
                ),
                MethodKind::Init | MethodKind::Plain => {}
            }
        }
    }

    /// Interfaces and their implementations must be distinct object types.
    pub(super) fn validate_interfaces(&mut self) {
        let service = self.service;
        let mut interfaces: IndexSet<&str> = IndexSet::new();
        let mut implementations: IndexSet<&str> = IndexSet::new();
        for definition in service.definitions.values() {
            let Some(object) = definition.object() else {
                continue;
            };
            for inclusion in &object.inclusions {
                let Some(included) = service.get_definition(inclusion) else {
                    continue;
                };
                let DefinitionKind::ServiceObject(interface) = &included.kind else {
                    continue;
                };
                if !interface.distinct && interfaces.insert(inclusion) {
                    self.error(
                        DiagnosticCode::NonDistinctInterface,
                        included.location,
                        format!("interface `{inclusion}` must be a distinct service object type"),
                    );
                }
                if !object.distinct && implementations.insert(&definition.name) {
                    self.error(
                        DiagnosticCode::NonDistinctInterfaceImplementation,
                        definition.location,
                        format!(
                            "`{}` implements interface `{}` and must be distinct",
                            definition.name, inclusion
                        ),
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::descriptor::MethodDescriptor;
    use crate::descriptor::MethodKind;
    use crate::descriptor::ObjectDescriptor;
    use crate::descriptor::PathSegment;
    use crate::descriptor::RecordField;
    use crate::descriptor::ServiceDescriptor;
    use crate::descriptor::TypeDefinition;
    use crate::descriptor::TypeDescriptor;
    use crate::diagnostic::DiagnosticCode;
    use crate::validation::validate_service;
    use pretty_assertions::assert_eq;

    fn query(path: &[&str], ty: TypeDescriptor) -> MethodDescriptor {
        MethodDescriptor::resource("get", path.iter().copied(), ty)
    }

    #[test]
    fn reports_every_defect_in_one_pass() {
        let service = ServiceDescriptor::new()
            .method(query(&["__count"], TypeDescriptor::Int))
            .method(query(&["data"], TypeDescriptor::Json))
            .method(query(&["nothing"], TypeDescriptor::Nil))
            .method(MethodDescriptor::resource("post", ["greeting"], TypeDescriptor::String));
        let codes = validate_service(&service).codes();
        assert_eq!(
            codes,
            [
                DiagnosticCode::InvalidFieldName,
                DiagnosticCode::InvalidReturnType,
                DiagnosticCode::InvalidReturnTypeNil,
                DiagnosticCode::InvalidRootResourceAccessor,
            ]
        );
    }

    #[test]
    fn nested_field_names_use_the_full_path() {
        let service = ServiceDescriptor::new()
            .method(query(&["lift"], TypeDescriptor::reference("Lift")))
            .definition(TypeDefinition::record(
                "Lift",
                [RecordField::new("__id", TypeDescriptor::String)],
            ));
        let diagnostics = validate_service(&service);
        assert_eq!(diagnostics.codes(), [DiagnosticCode::InvalidFieldName]);
        assert!(diagnostics.data()[0].message.contains("`Query.lift.__id`"));
    }

    #[test]
    fn union_members_must_be_service_classes() {
        let service = ServiceDescriptor::new()
            .method(query(
                &["profile"],
                TypeDescriptor::union([
                    TypeDescriptor::reference("Student"),
                    TypeDescriptor::reference("Person"),
                ]),
            ))
            .definition(TypeDefinition::class("Student", ObjectDescriptor::new().method(query(&["name"], TypeDescriptor::String))))
            .definition(TypeDefinition::record("Person", []));
        assert_eq!(
            validate_service(&service).codes(),
            [DiagnosticCode::InvalidUnionMemberType]
        );
    }

    #[test]
    fn error_or_nil_only_unions() {
        let service = ServiceDescriptor::new().method(query(
            &["greeting"],
            TypeDescriptor::union([TypeDescriptor::Error, TypeDescriptor::Nil]),
        ));
        assert_eq!(
            validate_service(&service).codes(),
            [DiagnosticCode::InvalidReturnTypeErrorOrNil]
        );
    }

    #[test]
    fn subscriptions_must_return_streams() {
        let service = ServiceDescriptor::new()
            .method(query(&["name"], TypeDescriptor::String))
            .method(MethodDescriptor::resource("subscribe", ["foo"], TypeDescriptor::Int));
        assert_eq!(
            validate_service(&service).codes(),
            [DiagnosticCode::InvalidSubscribeResourceReturnType]
        );
    }

    #[test]
    fn hierarchical_prefix_cannot_be_a_field() {
        let service = ServiceDescriptor::new()
            .method(query(&["profile"], TypeDescriptor::String))
            .method(query(&["profile", "names"], TypeDescriptor::String));
        let diagnostics = validate_service(&service);
        assert_eq!(diagnostics.codes(), [DiagnosticCode::InvalidHierarchicalResourcePath]);
        assert!(diagnostics.data()[0].message.contains("`profile/names`"));
    }

    #[test]
    fn non_distinct_interfaces() {
        let mut person = ObjectDescriptor::new().method(query(&["name"], TypeDescriptor::String));
        person.distinct = false;
        let mut author = ObjectDescriptor::new().includes("Person");
        author.distinct = false;
        let service = ServiceDescriptor::new()
            .method(query(&["person"], TypeDescriptor::reference("Person")))
            .definition(TypeDefinition::service_object("Person", person))
            .definition(TypeDefinition::class("Author", author));
        assert_eq!(
            validate_service(&service).codes(),
            [
                DiagnosticCode::NonDistinctInterface,
                DiagnosticCode::NonDistinctInterfaceImplementation
            ]
        );
    }

    #[test]
    fn reserved_names_in_a_subgraph() {
        let service = ServiceDescriptor::new()
            .subgraph()
            .method(query(&["_service"], TypeDescriptor::String))
            .method(MethodDescriptor::remote("_entities", TypeDescriptor::String))
            .method(query(&["any"], TypeDescriptor::reference("_Any")))
            .definition(TypeDefinition::record("_Any", []));
        assert_eq!(
            validate_service(&service).codes(),
            [
                DiagnosticCode::InvalidUseOfReservedResourcePath,
                DiagnosticCode::InvalidUseOfReservedRemoteMethodName,
                DiagnosticCode::InvalidUseOfReservedTypeAsOutputType,
            ]
        );
    }

    #[test]
    fn anonymous_records_are_not_output_types() {
        let service = ServiceDescriptor::new().method(query(
            &["profile"],
            TypeDescriptor::Record {
                fields: vec![RecordField::new("name", TypeDescriptor::String)],
            },
        ));
        let diagnostics = validate_service(&service);
        assert_eq!(diagnostics.codes(), [DiagnosticCode::InvalidAnonymousFieldType]);
        assert!(diagnostics.data()[0].message.contains("`Query.profile`"));
    }

    #[test]
    fn path_parameters_are_not_supported() {
        let mut book = query(&["book"], TypeDescriptor::String);
        book.kind = MethodKind::Resource {
            accessor: "get".to_owned(),
            path: vec![
                PathSegment::Name("book".to_owned()),
                PathSegment::Parameter("id".to_owned()),
            ],
        };
        let diagnostics = validate_service(&ServiceDescriptor::new().method(book));
        assert_eq!(diagnostics.codes(), [DiagnosticCode::InvalidResourcePath]);
        assert!(diagnostics.data()[0].message.contains("`[id]`"));
    }

    #[test]
    fn any_and_error_return_types() {
        let service = ServiceDescriptor::new()
            .method(query(&["value"], TypeDescriptor::Anydata))
            .method(query(&["failure"], TypeDescriptor::Error))
            .method(query(&["mood"], TypeDescriptor::Singleton { value: "happy".to_owned() }));
        assert_eq!(
            validate_service(&service).codes(),
            [
                DiagnosticCode::InvalidReturnTypeAny,
                DiagnosticCode::InvalidReturnTypeError,
                DiagnosticCode::InvalidReturnType,
            ]
        );
    }

    #[test]
    fn returned_classes_must_be_service_classes() {
        let mut plain = ObjectDescriptor::new().method(query(&["name"], TypeDescriptor::String));
        plain.is_service = false;
        let service = ServiceDescriptor::new()
            .method(query(&["author"], TypeDescriptor::reference("Author")))
            .definition(TypeDefinition::class("Author", plain));
        let diagnostics = validate_service(&service);
        assert_eq!(diagnostics.codes(), [DiagnosticCode::InvalidReturnTypeClass]);
        assert!(diagnostics.data()[0].message.contains("`Query.author`"));
    }

    #[test]
    fn returned_service_classes_only_have_get_resources() {
        let author = ObjectDescriptor::new()
            .method(query(&["name"], TypeDescriptor::String))
            .method(MethodDescriptor::resource("post", ["name"], TypeDescriptor::String));
        let service = ServiceDescriptor::new()
            .method(query(&["author"], TypeDescriptor::reference("Author")))
            .definition(TypeDefinition::class("Author", author));
        assert_eq!(
            validate_service(&service).codes(),
            [DiagnosticCode::InvalidResourceFunctionAccessor]
        );
    }

    #[test]
    fn returned_service_classes_have_no_remote_methods() {
        let author = ObjectDescriptor::new()
            .method(query(&["name"], TypeDescriptor::String))
            .method(MethodDescriptor::remote("rename", TypeDescriptor::String));
        let service = ServiceDescriptor::new()
            .method(query(&["author"], TypeDescriptor::reference("Author")))
            .definition(TypeDefinition::class("Author", author));
        let diagnostics = validate_service(&service);
        assert_eq!(diagnostics.codes(), [DiagnosticCode::InvalidFunction]);
        assert!(diagnostics.data()[0].message.contains("`rename`"));
    }
}
