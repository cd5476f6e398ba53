//! Input-side checks: parameters of resolvers and of directive initializers, and the
//! input objects reachable from them.

use super::field_path;
use super::is_reserved_type_name;
use super::Validator;
use crate::descriptor::has_error_member;
use crate::descriptor::intersection_member;
use crate::descriptor::union_members;
use crate::descriptor::DefinitionKind;
use crate::descriptor::MethodDescriptor;
use crate::descriptor::RecordField;
use crate::descriptor::TypeDescriptor;
use crate::diagnostic::DiagnosticCode;
use crate::sources::NodeLocation;

/// Where the parameter being checked is declared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum InputSite {
    Resource,
    Remote,
    Directive,
}

/// State of one parameter check
pub(super) struct InputContext<'a> {
    site: InputSite,
    /// Field path of the input value being checked
    path: String,
    /// The parameter or input field type errors are reported against
    root: &'a TypeDescriptor,
    location: Option<NodeLocation>,
    array_dimension: usize,
}

impl<'a> InputContext<'a> {
    pub(super) fn new(
        site: InputSite,
        path: String,
        root: &'a TypeDescriptor,
        location: Option<NodeLocation>,
    ) -> Self {
        Self {
            site,
            path,
            root,
            location,
            array_dimension: 0,
        }
    }

    /// `plain` for resolver parameters, `directive` for directive parameters
    fn code(&self, plain: DiagnosticCode, directive: DiagnosticCode) -> DiagnosticCode {
        match self.site {
            InputSite::Directive => directive,
            InputSite::Resource | InputSite::Remote => plain,
        }
    }
}

impl<'a> Validator<'a> {
    pub(super) fn validate_params(&mut self, method: &'a MethodDescriptor, path: &str) {
        let site = if method.is_resource() {
            InputSite::Resource
        } else {
            InputSite::Remote
        };
        for param in method.graphql_params() {
            let location = param.location.or(method.location);
            let mut cx = InputContext::new(site, path.to_owned(), &param.ty, location);
            self.validate_input_parameter_type(&param.ty, &mut cx);
        }
    }

    /// Entry for parameter-level types: the only place `Upload` is allowed.
    pub(super) fn validate_input_parameter_type(
        &mut self,
        ty: &'a TypeDescriptor,
        cx: &mut InputContext<'a>,
    ) {
        if !matches!(ty, TypeDescriptor::Upload) {
            return self.validate_input_type(ty, cx);
        }
        if cx.array_dimension > 1 {
            self.error(
                DiagnosticCode::MultiDimensionalUploadArray,
                cx.location,
                format!("`{}` uses a multi-dimensional array of file uploads", cx.path),
            );
        }
        match cx.site {
            InputSite::Resource => self.error(
                DiagnosticCode::InvalidFileUploadInResourceFunction,
                cx.location,
                format!("file uploads are only allowed in remote methods, found one in `{}`", cx.path),
            ),
            InputSite::Directive => self.error(
                DiagnosticCode::InvalidFileUploadInDirective,
                cx.location,
                format!("file uploads are not allowed in directive `{}`", cx.path),
            ),
            InputSite::Remote => {}
        }
    }

    fn validate_input_type(&mut self, ty: &'a TypeDescriptor, cx: &mut InputContext<'a>) {
        match ty {
            TypeDescriptor::String
            | TypeDescriptor::Char
            | TypeDescriptor::Int
            | TypeDescriptor::Float
            | TypeDescriptor::Boolean
            | TypeDescriptor::Decimal => {}
            TypeDescriptor::Reference { name, .. } => self.validate_input_reference(name, cx),
            TypeDescriptor::Union { members } => self.validate_input_union(members, cx),
            TypeDescriptor::Array { member } => {
                cx.array_dimension += 1;
                self.validate_input_parameter_type(member, cx);
                cx.array_dimension -= 1;
            }
            TypeDescriptor::Intersection { members } => match intersection_member(members) {
                Some(TypeDescriptor::Record { .. }) => self.anonymous_input_type(ty, cx),
                Some(member) => self.validate_input_type(member, cx),
                None => self.invalid_input_parameter_type(cx),
            },
            TypeDescriptor::Record { .. } => self.anonymous_input_type(ty, cx),
            _ => self.invalid_input_parameter_type(cx),
        }
    }

    fn validate_input_reference(&mut self, name: &'a str, cx: &mut InputContext<'a>) {
        if is_reserved_type_name(name) {
            self.error(
                DiagnosticCode::InvalidUseOfReservedTypeAsInputType,
                cx.location,
                format!("type `{name}` used as an input at `{}` is reserved for federation", cx.path),
            );
            return;
        }
        let service = self.service;
        let Some(definition) = service.get_definition(name) else {
            return;
        };
        match &definition.kind {
            DefinitionKind::Enum { .. } => {}
            DefinitionKind::Record { fields } => {
                self.validate_input_record(&definition.name, fields, definition.location, cx)
            }
            DefinitionKind::Alias { target } if target.is_primitive() => {
                self.unsupported_alias(definition, target)
            }
            DefinitionKind::Alias { target } => self.validate_input_type(target, cx),
            DefinitionKind::Union { members } => self.validate_input_union(members, cx),
            DefinitionKind::Intersection { members } => match intersection_member(members) {
                Some(TypeDescriptor::Record { fields }) => {
                    self.validate_input_record(&definition.name, fields, definition.location, cx)
                }
                Some(member) => self.validate_input_type(member, cx),
                None => self.invalid_input_parameter_type(cx),
            },
            DefinitionKind::Class(_) | DefinitionKind::ServiceObject(_) | DefinitionKind::Table { .. } => {
                self.invalid_input_parameter_type(cx)
            }
        }
    }

    /// A union input must carry exactly one data type besides `nil`.
    fn validate_input_union(&mut self, members: &'a [TypeDescriptor], cx: &mut InputContext<'a>) {
        if has_error_member(members) {
            return self.invalid_input_parameter_type(cx);
        }
        let data_types: Vec<&'a TypeDescriptor> = union_members(members)
            .into_iter()
            .filter(|member| !matches!(member, TypeDescriptor::Singleton { .. }))
            .collect();
        match data_types.as_slice() {
            [] => self.error(
                cx.code(
                    DiagnosticCode::InvalidInputType,
                    DiagnosticCode::InvalidInputTypeInDirective,
                ),
                cx.location,
                format!("`{}` at `{}` has no GraphQL input type", cx.root, cx.path),
            ),
            [single] => self.validate_input_parameter_type(*single, cx),
            _ => self.error(
                cx.code(
                    DiagnosticCode::InvalidInputTypeUnion,
                    DiagnosticCode::InvalidInputTypeUnionInDirective,
                ),
                cx.location,
                format!(
                    "`{}` at `{}`: GraphQL input types cannot be unions",
                    cx.root, cx.path
                ),
            ),
        }
    }

    fn validate_input_record(
        &mut self,
        name: &'a str,
        fields: &'a [RecordField],
        location: Option<NodeLocation>,
        cx: &mut InputContext<'a>,
    ) {
        if self.output_records.contains(name) {
            let code = cx.code(
                DiagnosticCode::InvalidResourceInputObjectParam,
                DiagnosticCode::InvalidDirectiveInputObjectParam,
            );
            self.error(
                code,
                cx.location,
                format!(
                    "`{}` takes `{}` as input, which is already used as an output object",
                    cx.path, name
                ),
            );
            return;
        }
        if !self.input_objects.insert(name) {
            return;
        }
        let outer_path = std::mem::take(&mut cx.path);
        let outer_root = cx.root;
        let outer_location = cx.location;
        for field in fields {
            cx.path = field_path(&outer_path, &field.name);
            cx.root = &field.ty;
            cx.location = field.location.or(location).or(outer_location);
            self.validate_input_type(&field.ty, cx);
        }
        cx.path = outer_path;
        cx.root = outer_root;
        cx.location = outer_location;
    }

    fn anonymous_input_type(&mut self, ty: &TypeDescriptor, cx: &InputContext<'a>) {
        self.error(
            cx.code(
                DiagnosticCode::InvalidAnonymousInputType,
                DiagnosticCode::InvalidAnonymousInputTypeInDirective,
            ),
            cx.location,
            format!("anonymous record `{ty}` used as an input at `{}`: use a named record type", cx.path),
        );
    }

    fn invalid_input_parameter_type(&mut self, cx: &InputContext<'a>) {
        self.error(
            cx.code(
                DiagnosticCode::InvalidInputParameterType,
                DiagnosticCode::InvalidInputParameterTypeInDirective,
            ),
            cx.location,
            format!("invalid input parameter type `{}` at `{}`", cx.root, cx.path),
        );
    }
}

#[cfg(test)]
mod tests {
    use crate::descriptor::MethodDescriptor;
    use crate::descriptor::Parameter;
    use crate::descriptor::RecordField;
    use crate::descriptor::ServiceDescriptor;
    use crate::descriptor::TypeDefinition;
    use crate::descriptor::TypeDescriptor;
    use crate::diagnostic::DiagnosticCode;
    use crate::validation::validate_service;
    use pretty_assertions::assert_eq;

    fn greet(param: TypeDescriptor) -> ServiceDescriptor {
        ServiceDescriptor::new().method(
            MethodDescriptor::resource("get", ["greet"], TypeDescriptor::String)
                .param(Parameter::new("input", param)),
        )
    }

    #[test]
    fn unsupported_parameter_types() {
        for ty in [
            TypeDescriptor::Json,
            TypeDescriptor::Any,
            TypeDescriptor::map(TypeDescriptor::String),
            TypeDescriptor::array(TypeDescriptor::Byte),
            TypeDescriptor::optional(TypeDescriptor::Json),
        ] {
            let diagnostics = validate_service(&greet(ty.clone()));
            assert_eq!(diagnostics.codes(), [DiagnosticCode::InvalidInputParameterType], "{ty}");
            let expected = format!("`{ty}` at `Query.greet`");
            assert!(diagnostics.data()[0].message.contains(&expected), "{}", diagnostics.data()[0].message);
        }
    }

    #[test]
    fn nilable_scalars_and_enums_are_fine() {
        assert!(validate_service(&greet(TypeDescriptor::optional(TypeDescriptor::Int))).is_empty());
        assert!(validate_service(&greet(TypeDescriptor::array(TypeDescriptor::String))).is_empty());
    }

    #[test]
    fn unions_of_data_types() {
        let diagnostics = validate_service(&greet(TypeDescriptor::union([
            TypeDescriptor::Int,
            TypeDescriptor::String,
        ])));
        assert_eq!(diagnostics.codes(), [DiagnosticCode::InvalidInputTypeUnion]);
    }

    #[test]
    fn records_as_input_and_output() {
        let service = ServiceDescriptor::new()
            .method(
                MethodDescriptor::resource("get", ["profile"], TypeDescriptor::reference("Person"))
                    .param(Parameter::new("person", TypeDescriptor::reference("Person"))),
            )
            .definition(TypeDefinition::record(
                "Person",
                [RecordField::new("name", TypeDescriptor::String)],
            ));
        let diagnostics = validate_service(&service);
        assert_eq!(diagnostics.codes(), [DiagnosticCode::InvalidResourceInputObjectParam]);
        assert!(diagnostics.data()[0].message.contains("`Query.profile`"));
    }

    #[test]
    fn input_then_output_is_an_invalid_return_type() {
        let service = ServiceDescriptor::new()
            .method(
                MethodDescriptor::resource("get", ["name"], TypeDescriptor::String)
                    .param(Parameter::new("location", TypeDescriptor::reference("Location"))),
            )
            .method(MethodDescriptor::resource(
                "get",
                ["location"],
                TypeDescriptor::reference("Location"),
            ))
            .definition(TypeDefinition::record("Location", []));
        assert_eq!(
            validate_service(&service).codes(),
            [DiagnosticCode::InvalidReturnTypeInputObject]
        );
    }

    #[test]
    fn nested_input_fields_report_their_path() {
        let service = greet(TypeDescriptor::reference("Greeting")).definition(TypeDefinition::record(
            "Greeting",
            [
                RecordField::new("generalGreeting", TypeDescriptor::Json),
                RecordField::new("author", TypeDescriptor::String),
            ],
        ));
        let diagnostics = validate_service(&service);
        assert_eq!(diagnostics.codes(), [DiagnosticCode::InvalidInputParameterType]);
        assert!(diagnostics.data()[0]
            .message
            .contains("`json` at `Query.greet.generalGreeting`"));
    }

    #[test]
    fn file_uploads() {
        let upload = |ty: TypeDescriptor| {
            ServiceDescriptor::new()
                .method(MethodDescriptor::resource("get", ["name"], TypeDescriptor::String))
                .method(
                    MethodDescriptor::remote("upload", TypeDescriptor::String)
                        .param(Parameter::new("file", ty)),
                )
        };
        assert!(validate_service(&upload(TypeDescriptor::Upload)).is_empty());
        assert!(validate_service(&upload(TypeDescriptor::array(TypeDescriptor::Upload))).is_empty());
        assert_eq!(
            validate_service(&upload(TypeDescriptor::array(TypeDescriptor::array(
                TypeDescriptor::Upload
            ))))
            .codes(),
            [DiagnosticCode::MultiDimensionalUploadArray]
        );
        assert_eq!(
            validate_service(&greet(TypeDescriptor::Upload)).codes(),
            [DiagnosticCode::InvalidFileUploadInResourceFunction]
        );
    }

    #[test]
    fn anonymous_and_reserved_input_types() {
        let anonymous = TypeDescriptor::Record {
            fields: vec![RecordField::new("name", TypeDescriptor::String)],
        };
        assert_eq!(
            validate_service(&greet(anonymous)).codes(),
            [DiagnosticCode::InvalidAnonymousInputType]
        );
        let reserved = greet(TypeDescriptor::reference("FieldSet"))
            .definition(TypeDefinition::record("FieldSet", []));
        assert_eq!(
            validate_service(&reserved).codes(),
            [DiagnosticCode::InvalidUseOfReservedTypeAsInputType]
        );
    }

    #[test]
    fn primitive_aliases_are_rejected() {
        let service = greet(TypeDescriptor::reference("Id")).definition(TypeDefinition::new(
            "Id",
            crate::descriptor::DefinitionKind::Alias {
                target: TypeDescriptor::Int,
            },
        ));
        assert_eq!(
            validate_service(&service).codes(),
            [DiagnosticCode::UnsupportedPrimitiveTypeAlias]
        );
    }

    #[test]
    fn unions_of_singletons_have_no_input_type() {
        let singleton = |value: &str| TypeDescriptor::Singleton {
            value: value.to_owned(),
        };
        let diagnostics = validate_service(&greet(TypeDescriptor::union([singleton("a"), singleton("b")])));
        assert_eq!(diagnostics.codes(), [DiagnosticCode::InvalidInputType]);
        assert!(diagnostics.data()[0].message.contains("at `Query.greet`"));
    }
}
