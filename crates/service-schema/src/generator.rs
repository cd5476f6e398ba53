//! Schema generation from a validated service descriptor.

use crate::descriptor::ServiceDescriptor;
use crate::descriptor::GET_ACCESSOR;
use crate::diagnostic::DiagnosticList;
use crate::finder::InterfaceEntityFinder;
use crate::name;
use crate::schema::introspection::add_introspection_types;
use crate::schema::Directive;
use crate::schema::DirectiveLocation;
use crate::schema::InputValue;
use crate::schema::ScalarType;
use crate::schema::Schema;
use crate::schema::TypeKind;
use crate::schema::TypeRef;
use crate::type_creator::TypeCreator;
use crate::validation;
use serde::Deserialize;
use serde::Serialize;

/// Settings of one generation pass that are not part of the descriptor itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Schema description, taking precedence over the service's own
    #[serde(default)]
    pub description: Option<String>,
    /// Overrides [`ServiceDescriptor::is_subgraph`]
    #[serde(default)]
    pub is_subgraph: Option<bool>,
}

/// Validates `service`, then generates its schema.
///
/// Returns every error found when validation fails. Warnings alone do not block generation.
pub fn generate_schema(service: &ServiceDescriptor) -> Result<Schema, DiagnosticList> {
    SchemaGenerator::new(service).generate()
}

pub struct SchemaGenerator<'a> {
    service: &'a ServiceDescriptor,
    config: GeneratorConfig,
}

impl<'a> SchemaGenerator<'a> {
    pub fn new(service: &'a ServiceDescriptor) -> Self {
        Self {
            service,
            config: GeneratorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: GeneratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Runs every validator over the service
    pub fn validate(&self) -> DiagnosticList {
        validation::validate_service(self.service)
    }

    pub fn generate(&self) -> Result<Schema, DiagnosticList> {
        let diagnostics = self.validate();
        if diagnostics.has_errors() {
            tracing::debug!(errors = diagnostics.len(), "service validation failed");
            return Err(diagnostics);
        }
        Ok(self.generate_unchecked())
    }

    /// Generates without validating first. Invalid parts of the descriptor are skipped.
    pub fn generate_unchecked(&self) -> Schema {
        let description = self
            .config
            .description
            .clone()
            .or_else(|| self.service.description.clone());
        let is_subgraph = self.config.is_subgraph.unwrap_or(self.service.is_subgraph);
        let mut schema = Schema::new(description, is_subgraph);
        let finder = InterfaceEntityFinder::new(self.service);
        let mut creator = TypeCreator::new(self.service, &finder, &mut schema);

        tracing::debug!("generating root types");
        find_root_types(self.service, &mut creator);
        tracing::debug!("adding introspection types");
        add_introspection_types(creator.schema());
        add_default_directives(creator.schema());
        add_executable_directives(&finder, &mut creator);
        if is_subgraph {
            add_entity_types(&finder, &mut creator);
        }
        tracing::debug!(types = schema.types.len(), "schema generated");
        schema
    }
}

fn find_root_types<'a>(service: &'a ServiceDescriptor, creator: &mut TypeCreator<'a, '_>) {
    let query = name!("Query");
    let mutation = name!("Mutation");
    let subscription = name!("Subscription");
    creator.schema().add_type(query.clone(), TypeKind::Object, None);
    for method in &service.methods {
        let root = match method.accessor() {
            Some(GET_ACCESSOR) => &query,
            Some(_) => &subscription,
            None if method.is_remote() => &mutation,
            None => continue,
        };
        creator.schema().add_type(root.clone(), TypeKind::Object, None);
        if let Some(field) = creator.root_field(method) {
            if let Some(root_type) = creator.schema().type_mut(root) {
                root_type.add_field(field);
            }
        }
    }
    let schema = creator.schema();
    schema.query_type = Some(query);
    if schema.contains_type(&mutation) {
        schema.mutation_type = Some(mutation);
    }
    if schema.contains_type(&subscription) {
        schema.subscription_type = Some(subscription);
    }
}

fn add_default_directives(schema: &mut Schema) {
    schema.add_scalar(ScalarType::Boolean);
    schema.add_scalar(ScalarType::String);
    let non_null_boolean = TypeRef::scalar(ScalarType::Boolean).non_null();
    let field_locations = [
        DirectiveLocation::Field,
        DirectiveLocation::FragmentSpread,
        DirectiveLocation::InlineFragment,
    ];
    schema.add_directive(
        Directive::new(
            name!("include"),
            "Directs the executor to include this field or fragment only when the `if` argument is true",
            field_locations,
        )
        .argument(
            InputValue::new(name!("if"), non_null_boolean.clone())
                .description(Some("Included when true.".into())),
        ),
    );
    schema.add_directive(
        Directive::new(
            name!("skip"),
            "Directs the executor to skip this field or fragment when the `if` argument is true.",
            field_locations,
        )
        .argument(
            InputValue::new(name!("if"), non_null_boolean)
                .description(Some("Skipped when true.".into())),
        ),
    );
    schema.add_directive(
        Directive::new(
            name!("deprecated"),
            "Marks an element of a GraphQL schema as no longer supported.",
            [DirectiveLocation::FieldDefinition, DirectiveLocation::EnumValue],
        )
        .argument(
            InputValue::new(name!("reason"), TypeRef::scalar(ScalarType::String)).description(
                Some(
                    "Explains why this element was deprecated, usually also including a \
                     suggestion for how to access supported similar data. Formatted using \
                     the Markdown syntax, as specified by [CommonMark](https://commonmark.org/)."
                        .into(),
                ),
            ),
        ),
    );
}

fn add_executable_directives<'a>(
    finder: &InterfaceEntityFinder<'a>,
    creator: &mut TypeCreator<'a, '_>,
) {
    for (name, class) in finder.executable_directives() {
        tracing::debug!(directive = name, class = %class.class_name, "adding executable directive");
        let directive = creator.directive(name, class);
        creator.schema().add_directive(directive);
    }
}

fn add_entity_types<'a>(finder: &InterfaceEntityFinder<'a>, creator: &mut TypeCreator<'a, '_>) {
    let mut entities = Vec::new();
    for (_, definition) in finder.entities() {
        if let Some(ty) = creator.definition_type(definition) {
            entities.push(ty.inner_named().clone());
        }
    }
    creator.schema().add_entities(entities);
}
