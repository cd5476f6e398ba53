//! Checks of executable directive classes: configuration, extension point methods
//! and initializer parameters.

use super::input::InputContext;
use super::input::InputSite;
use super::Validator;
use crate::descriptor::DirectiveClass;
use crate::descriptor::MethodDescriptor;
use crate::descriptor::MethodKind;
use crate::descriptor::TypeDescriptor;
use crate::diagnostic::DiagnosticCode;
use crate::Name;
use indexmap::IndexSet;

/// `on` values a directive class may declare, with the remote method handling each
pub const EXTENSION_POINTS: [(&str, &str); 4] = [
    ("QUERY", "applyOnQuery"),
    ("MUTATION", "applyOnMutation"),
    ("SUBSCRIPTION", "applyOnSubscription"),
    ("FIELD", "applyOnField"),
];

fn method_for_location(location: &str) -> Option<&'static str> {
    EXTENSION_POINTS
        .iter()
        .find(|(on, _)| *on == location)
        .map(|(_, method)| *method)
}

fn location_for_method(method: &str) -> Option<&'static str> {
    EXTENSION_POINTS
        .iter()
        .find(|(_, name)| *name == method)
        .map(|(on, _)| *on)
}

impl<'a> Validator<'a> {
    pub(super) fn validate_directive_classes(&mut self) {
        let service = self.service;
        let mut names = IndexSet::new();
        for class in &service.directives {
            self.validate_directive_class(class, &mut names);
        }
    }

    fn validate_directive_class(&mut self, class: &'a DirectiveClass, names: &mut IndexSet<&'a str>) {
        let location = class.location;
        if !class.includes_directive {
            self.error(
                DiagnosticCode::DirectiveTypeInclusionNotFound,
                location,
                format!(
                    "directive class `{}` must include the `Directive` object type",
                    class.class_name
                ),
            );
        }

        let mut on: IndexSet<&str> = IndexSet::new();
        match &class.config {
            None => self.error(
                DiagnosticCode::DirectiveConfigNotFound,
                location,
                format!(
                    "directive class `{}` must have a directive configuration",
                    class.class_name
                ),
            ),
            Some(config) => {
                let config_location = config.location.or(location);
                let name = class.directive_name();
                if !Name::valid_syntax(name) {
                    self.error(
                        DiagnosticCode::InvalidDirectiveName,
                        config_location,
                        format!("invalid directive name `{name}`"),
                    );
                }
                on.extend(config.on.iter().map(String::as_str));
                if on.is_empty() {
                    self.error(
                        DiagnosticCode::OnFieldMustContainValue,
                        config_location,
                        "the `on` field of a directive configuration must contain at least one location"
                            .to_owned(),
                    );
                }
                for value in &on {
                    if method_for_location(value).is_none() {
                        self.warning(
                            DiagnosticCode::DirectiveLocationNotSupported,
                            config_location,
                            format!("directive location `{value}` is not supported yet"),
                        );
                    }
                }
                if !names.insert(name) {
                    self.error(
                        DiagnosticCode::DirectiveNameAlreadyInUse,
                        config_location,
                        format!("directive name `{name}` is already in use"),
                    );
                }
            }
        }

        let mut remote_methods = IndexSet::new();
        for method in &class.methods {
            match &method.kind {
                MethodKind::Remote => {
                    if let Some(name) = self.validate_directive_remote_method(method, &on) {
                        remote_methods.insert(name);
                    }
                }
                MethodKind::Init => {
                    self.validate_directive_init(class, method);
                }
                MethodKind::Resource { .. } => self.error(
                    DiagnosticCode::InvalidResourceMethodInsideDirective,
                    method.location.or(location),
                    format!(
                        "resource methods are not allowed in directive classes, found `{}`",
                        method.signature()
                    ),
                ),
                MethodKind::Plain => {}
            }
        }

        for value in &on {
            let Some(method) = method_for_location(value) else {
                continue;
            };
            if !remote_methods.contains(method) {
                self.error(
                    DiagnosticCode::NoRemoteMethodForOnFieldValue,
                    location,
                    format!(
                        "directive class `{}` declares `{}` but has no `{}` remote method",
                        class.class_name, value, method
                    ),
                );
            }
        }
    }

    /// Returns the method name when it is a known extension point.
    fn validate_directive_remote_method(
        &mut self,
        method: &'a MethodDescriptor,
        on: &IndexSet<&str>,
    ) -> Option<&'a str> {
        let name = method.name.as_str();
        let Some(location) = location_for_method(name) else {
            self.error(
                DiagnosticCode::InvalidRemoteMethodInsideDirective,
                method.location,
                format!("remote method `{name}` is not an extension point of a directive"),
            );
            return None;
        };

        let valid_params = matches!(
            method.params.as_slice(),
            [context, field] if context.ty == TypeDescriptor::Context && field.ty == TypeDescriptor::Field
        );
        if !valid_params {
            self.error(
                DiagnosticCode::RemoteMethodWithInvalidParameters,
                method.location,
                format!("remote method `{name}` must take exactly a `Context` and a `Field`"),
            );
        }

        let valid_return = match &method.return_type {
            Some(TypeDescriptor::Anydata | TypeDescriptor::Error) => true,
            Some(TypeDescriptor::Union { members }) => members
                .iter()
                .all(|member| matches!(member, TypeDescriptor::Anydata | TypeDescriptor::Error)),
            _ => false,
        };
        if !valid_return {
            self.error(
                DiagnosticCode::RemoteMethodWithInvalidReturnType,
                method.location,
                format!("remote method `{name}` must return `anydata|error`"),
            );
        }

        if !on.contains(location) {
            self.error(
                DiagnosticCode::NoOnFieldForRemoteMethod,
                method.location,
                format!("remote method `{name}` requires `{location}` in the `on` field of the directive configuration"),
            );
        }
        Some(name)
    }

    fn validate_directive_init(&mut self, class: &'a DirectiveClass, init: &'a MethodDescriptor) {
        if let Some(ty) = &init.return_type {
            if *ty != TypeDescriptor::Nil {
                self.error(
                    DiagnosticCode::InvalidInitMethodReturnType,
                    init.location.or(class.location),
                    format!("the `init` method of a directive must not return a value, found `{ty}`"),
                );
            }
        }
        for param in &init.params {
            let location = param.location.or(init.location).or(class.location);
            let mut cx = InputContext::new(
                InputSite::Directive,
                class.directive_name().to_owned(),
                &param.ty,
                location,
            );
            self.validate_input_parameter_type(&param.ty, &mut cx);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::descriptor::DirectiveClass;
    use crate::descriptor::MethodDescriptor;
    use crate::descriptor::Parameter;
    use crate::descriptor::RecordField;
    use crate::descriptor::ServiceDescriptor;
    use crate::descriptor::TypeDefinition;
    use crate::descriptor::TypeDescriptor;
    use crate::diagnostic::DiagnosticCode;
    use crate::diagnostic::Severity;
    use crate::validation::validate_service;
    use pretty_assertions::assert_eq;

    fn apply_on(name: &str) -> MethodDescriptor {
        MethodDescriptor::remote(
            name,
            TypeDescriptor::union([TypeDescriptor::Anydata, TypeDescriptor::Error]),
        )
        .param(Parameter::new("context", TypeDescriptor::Context))
        .param(Parameter::new("field", TypeDescriptor::Field))
    }

    fn with_directive(class: DirectiveClass) -> ServiceDescriptor {
        ServiceDescriptor::new()
            .method(MethodDescriptor::resource("get", ["name"], TypeDescriptor::String))
            .directive(class)
    }

    #[test]
    fn well_formed_directive() {
        let class = DirectiveClass::new("Sort")
            .config(Some("sort"), ["FIELD"])
            .method(MethodDescriptor::init().param(Parameter::new("ascending", TypeDescriptor::Boolean)))
            .method(apply_on("applyOnField"));
        assert!(validate_service(&with_directive(class)).is_empty());
    }

    #[test]
    fn missing_inclusion_and_config() {
        let mut class = DirectiveClass::new("Sort");
        class.includes_directive = false;
        assert_eq!(
            validate_service(&with_directive(class)).codes(),
            [
                DiagnosticCode::DirectiveTypeInclusionNotFound,
                DiagnosticCode::DirectiveConfigNotFound
            ]
        );
    }

    #[test]
    fn on_values_and_remote_methods_must_match() {
        let class = DirectiveClass::new("Sort")
            .config(None, ["QUERY", "FIELD"])
            .method(apply_on("applyOnField"))
            .method(apply_on("applyOnMutation"));
        assert_eq!(
            validate_service(&with_directive(class)).codes(),
            [
                DiagnosticCode::NoOnFieldForRemoteMethod,
                DiagnosticCode::NoRemoteMethodForOnFieldValue
            ]
        );
    }

    #[test]
    fn unsupported_locations_only_warn() {
        let class = DirectiveClass::new("Sort")
            .config(None, ["FIELD", "FRAGMENT_SPREAD"])
            .method(apply_on("applyOnField"));
        let diagnostics = validate_service(&with_directive(class));
        assert_eq!(diagnostics.codes(), [DiagnosticCode::DirectiveLocationNotSupported]);
        assert_eq!(diagnostics.data()[0].severity, Severity::Warning);
        assert!(!diagnostics.has_errors());
    }

    #[test]
    fn names_and_signatures() {
        let first = DirectiveClass::new("Sort")
            .config(Some("sort"), ["FIELD"])
            .method(apply_on("applyOnField"));
        let duplicate = DirectiveClass::new("Order")
            .config(Some("sort"), ["FIELD"])
            .method(
                MethodDescriptor::remote("applyOnField", TypeDescriptor::String)
                    .param(Parameter::new("context", TypeDescriptor::Context)),
            )
            .method(apply_on("execute"));
        let invalid = DirectiveClass::new("Invalid")
            .config(Some("-invalid-name-"), ["FIELD"])
            .method(apply_on("applyOnField"))
            .method(MethodDescriptor::init().returns(Some(TypeDescriptor::optional(TypeDescriptor::Error))));
        let service = with_directive(first).directive(duplicate).directive(invalid);
        assert_eq!(
            validate_service(&service).codes(),
            [
                DiagnosticCode::DirectiveNameAlreadyInUse,
                DiagnosticCode::RemoteMethodWithInvalidParameters,
                DiagnosticCode::RemoteMethodWithInvalidReturnType,
                DiagnosticCode::InvalidRemoteMethodInsideDirective,
                DiagnosticCode::InvalidDirectiveName,
                DiagnosticCode::InvalidInitMethodReturnType,
            ]
        );
    }

    #[test]
    fn directive_arguments_are_input_values() {
        let class = DirectiveClass::new("Sort")
            .config(None, ["FIELD"])
            .method(MethodDescriptor::init().param(Parameter::new("file", TypeDescriptor::Upload)))
            .method(apply_on("applyOnField"));
        assert_eq!(
            validate_service(&with_directive(class)).codes(),
            [DiagnosticCode::InvalidFileUploadInDirective]
        );
    }

    fn with_argument(ty: TypeDescriptor) -> ServiceDescriptor {
        with_directive(
            DirectiveClass::new("Sort")
                .config(None, ["FIELD"])
                .method(MethodDescriptor::init().param(Parameter::new("by", ty)))
                .method(apply_on("applyOnField")),
        )
    }

    #[test]
    fn invalid_directive_argument_types() {
        let singleton = |value: &str| TypeDescriptor::Singleton {
            value: value.to_owned(),
        };
        let cases = [
            (
                TypeDescriptor::union([singleton("asc"), singleton("desc")]),
                DiagnosticCode::InvalidInputTypeInDirective,
            ),
            (
                TypeDescriptor::union([TypeDescriptor::Int, TypeDescriptor::String]),
                DiagnosticCode::InvalidInputTypeUnionInDirective,
            ),
            (TypeDescriptor::Json, DiagnosticCode::InvalidInputParameterTypeInDirective),
            (
                TypeDescriptor::Record {
                    fields: vec![RecordField::new("field", TypeDescriptor::String)],
                },
                DiagnosticCode::InvalidAnonymousInputTypeInDirective,
            ),
        ];
        for (ty, code) in cases {
            let diagnostics = validate_service(&with_argument(ty.clone()));
            assert_eq!(diagnostics.codes(), [code], "{ty}");
            assert!(diagnostics.data()[0].message.contains("`Sort`"), "{}", diagnostics.data()[0].message);
        }
    }

    #[test]
    fn output_records_are_not_directive_arguments() {
        let service = with_argument(TypeDescriptor::reference("Order"))
            .method(MethodDescriptor::resource("get", ["order"], TypeDescriptor::reference("Order")))
            .definition(TypeDefinition::record(
                "Order",
                [RecordField::new("field", TypeDescriptor::String)],
            ));
        assert_eq!(
            validate_service(&service).codes(),
            [DiagnosticCode::InvalidDirectiveInputObjectParam]
        );
    }

    #[test]
    fn directives_have_no_resource_methods() {
        let class = DirectiveClass::new("Sort")
            .config(None, ["FIELD"])
            .method(apply_on("applyOnField"))
            .method(MethodDescriptor::resource("get", ["order"], TypeDescriptor::String));
        assert_eq!(
            validate_service(&with_directive(class)).codes(),
            [DiagnosticCode::InvalidResourceMethodInsideDirective]
        );
    }

    #[test]
    fn on_field_needs_a_location() {
        let class = DirectiveClass::new("Sort").config(None, Vec::<&'static str>::new());
        assert_eq!(
            validate_service(&with_directive(class)).codes(),
            [DiagnosticCode::OnFieldMustContainValue]
        );
    }
}
