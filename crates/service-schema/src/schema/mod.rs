//! The GraphQL type system produced by schema generation.
//!
//! A [`Schema`] is the registry of named types: every named type is stored exactly once,
//! keyed by name, in insertion order. Field and argument types refer to named types
//! through [`TypeRef`], which adds the `LIST` and `NON_NULL` wrappers.

use crate::name;
use crate::Name;
use indexmap::IndexMap;
use indexmap::IndexSet;
use serde::Deserialize;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

pub mod codec;
pub(crate) mod federation;
pub(crate) mod introspection;

pub use self::federation::FEDERATION_DIRECTIVES;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub description: Option<String>,
    pub types: IndexMap<Name, Type>,
    pub directives: Vec<Directive>,
    /// Federation entities, in discovery order
    #[serde(default)]
    pub entities: Vec<Name>,
    pub query_type: Option<Name>,
    #[serde(default)]
    pub mutation_type: Option<Name>,
    #[serde(default)]
    pub subscription_type: Option<Name>,
    #[serde(default)]
    pub is_subgraph: bool,
}

/// A named type definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Type {
    pub name: Name,
    pub kind: TypeKind,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub fields: IndexMap<Name, Field>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub input_fields: IndexMap<Name, InputValue>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub enum_values: IndexMap<Name, EnumValue>,
    /// Implementors of an interface or members of a union
    #[serde(default, skip_serializing_if = "IndexSet::is_empty")]
    pub possible_types: IndexSet<Name>,
    /// Interfaces implemented by an object or interface
    #[serde(default, skip_serializing_if = "IndexSet::is_empty")]
    pub interfaces: IndexSet<Name>,
    #[serde(default)]
    pub position: Option<Position>,
    #[serde(default)]
    pub object_kind: Option<ObjectKind>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TypeKind {
    Scalar,
    Object,
    Interface,
    Union,
    Enum,
    InputObject,
    List,
    NonNull,
}

/// What an object type was generated from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObjectKind {
    Record,
    Class,
}

/// A reference to a type, with `LIST` and `NON_NULL` wrappers.
///
/// [`TypeRef::non_null`] never wraps a type that is already non-null.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TypeRef {
    Named(Name),
    List(Box<TypeRef>),
    NonNull(Box<TypeRef>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: Name,
    #[serde(default)]
    pub description: Option<String>,
    pub ty: TypeRef,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<InputValue>,
    #[serde(default)]
    pub is_deprecated: bool,
    #[serde(default)]
    pub deprecation_reason: Option<String>,
    #[serde(default)]
    pub position: Option<Position>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputValue {
    pub name: Name,
    pub ty: TypeRef,
    #[serde(default)]
    pub description: Option<String>,
    /// Unparsed default value literal
    #[serde(default)]
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumValue {
    pub name: Name,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_deprecated: bool,
    #[serde(default)]
    pub deprecation_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Directive {
    pub name: Name,
    #[serde(default)]
    pub description: Option<String>,
    pub locations: Vec<DirectiveLocation>,
    #[serde(default)]
    pub args: Vec<InputValue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DirectiveLocation {
    Query,
    Mutation,
    Subscription,
    Field,
    FragmentDefinition,
    FragmentSpread,
    InlineFragment,
    VariableDefinition,
    Schema,
    Scalar,
    Object,
    FieldDefinition,
    ArgumentDefinition,
    Interface,
    Union,
    Enum,
    EnumValue,
    InputObject,
    InputFieldDefinition,
}

/// Source position of a generated type or field, 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub file_path: String,
    pub start_line: usize,
    pub start_column: usize,
    pub end_line: usize,
    pub end_column: usize,
}

/// Scalars known to the generator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    String,
    Int,
    Float,
    Boolean,
    Decimal,
    Upload,
}

impl ScalarType {
    pub const ALL: [ScalarType; 6] = [
        Self::String,
        Self::Int,
        Self::Float,
        Self::Boolean,
        Self::Decimal,
        Self::Upload,
    ];

    pub fn name(self) -> Name {
        match self {
            Self::String => name!("String"),
            Self::Int => name!("Int"),
            Self::Float => name!("Float"),
            Self::Boolean => name!("Boolean"),
            Self::Decimal => name!("Decimal"),
            Self::Upload => name!("Upload"),
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::String => "Built-in String",
            Self::Int => "Built-in Int",
            Self::Float => "Built-in Float",
            Self::Boolean => "Built-in Boolean",
            Self::Decimal => "Built-in decimal",
            Self::Upload => "The `Upload` scalar type represents a file upload.",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|scalar| scalar.name() == name)
    }
}

impl Schema {
    pub fn new(description: Option<String>, is_subgraph: bool) -> Self {
        Self {
            description,
            types: IndexMap::new(),
            directives: Vec::new(),
            entities: Vec::new(),
            query_type: None,
            mutation_type: None,
            subscription_type: None,
            is_subgraph,
        }
    }

    /// Registers a named type, or returns the already registered type of that name.
    ///
    /// When a type of that name exists, `kind` and `description` are ignored.
    pub fn add_type(&mut self, name: Name, kind: TypeKind, description: Option<String>) -> &mut Type {
        self.types
            .entry(name.clone())
            .or_insert_with(|| Type::new(name, kind, description))
    }

    /// Registers a built-in or custom scalar
    pub fn add_scalar(&mut self, scalar: ScalarType) -> &mut Type {
        self.add_type(
            scalar.name(),
            TypeKind::Scalar,
            Some(scalar.description().to_owned()),
        )
    }

    pub fn get_type(&self, name: &str) -> Option<&Type> {
        self.types.get(name)
    }

    pub fn type_mut(&mut self, name: &str) -> Option<&mut Type> {
        self.types.get_mut(name)
    }

    pub fn contains_type(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Appends a directive definition. Duplicate names are not detected here.
    pub fn add_directive(&mut self, directive: Directive) {
        self.directives.push(directive)
    }

    pub fn get_directive(&self, name: &str) -> Option<&Directive> {
        self.directives.iter().find(|d| d.name == name)
    }

    pub fn query_type(&self) -> Option<&Type> {
        self.get_type(self.query_type.as_deref()?)
    }

    pub fn mutation_type(&self) -> Option<&Type> {
        self.get_type(self.mutation_type.as_deref()?)
    }

    pub fn subscription_type(&self) -> Option<&Type> {
        self.get_type(self.subscription_type.as_deref()?)
    }

    /// Returns the definition of a field of a named type
    pub fn type_field(&self, type_name: &str, field_name: &str) -> Option<&Field> {
        self.get_type(type_name)?.fields.get(field_name)
    }

    /// Whether `object` is `abstract_type` itself or one of its possible types
    pub fn is_subtype(&self, abstract_type: &str, object: &str) -> bool {
        abstract_type == object
            || self
                .get_type(abstract_type)
                .is_some_and(|ty| ty.possible_types.contains(object))
    }

    pub fn is_entity(&self, name: &str) -> bool {
        self.entities.iter().any(|entity| entity == name)
    }
}

impl Type {
    pub fn new(name: Name, kind: TypeKind, description: Option<String>) -> Self {
        Self {
            name,
            kind,
            description,
            fields: IndexMap::new(),
            input_fields: IndexMap::new(),
            enum_values: IndexMap::new(),
            possible_types: IndexSet::new(),
            interfaces: IndexSet::new(),
            position: None,
            object_kind: None,
        }
    }

    /// Adds a field, replacing a previous field of the same name in place.
    pub fn add_field(&mut self, field: Field) {
        self.fields.insert(field.name.clone(), field);
    }

    pub fn add_input_field(&mut self, input: InputValue) {
        self.input_fields.insert(input.name.clone(), input);
    }

    pub fn add_enum_value(&mut self, value: EnumValue) {
        self.enum_values.insert(value.name.clone(), value);
    }

    pub fn add_possible_type(&mut self, name: Name) {
        if name != self.name {
            self.possible_types.insert(name);
        }
    }

    pub fn add_interface(&mut self, name: Name) {
        if name != self.name {
            self.interfaces.insert(name);
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, TypeKind::Scalar | TypeKind::Enum)
    }

    pub fn is_abstract(&self) -> bool {
        matches!(self.kind, TypeKind::Interface | TypeKind::Union)
    }

    pub fn is_built_in(&self) -> bool {
        self.name.is_reserved()
            || matches!(
                self.name.as_str(),
                "String" | "Int" | "Float" | "Boolean" | "ID"
            )
    }
}

impl TypeRef {
    pub fn named(name: Name) -> Self {
        Self::Named(name)
    }

    pub fn scalar(scalar: ScalarType) -> Self {
        Self::Named(scalar.name())
    }

    pub fn list(inner: TypeRef) -> Self {
        Self::List(Box::new(inner))
    }

    /// Wraps in `NON_NULL` unless already non-null
    pub fn non_null(self) -> Self {
        match self {
            Self::NonNull(_) => self,
            other => Self::NonNull(Box::new(other)),
        }
    }

    /// Removes an outer `NON_NULL` wrapper, if any
    pub fn nullable(self) -> Self {
        match self {
            Self::NonNull(inner) => *inner,
            other => other,
        }
    }

    pub fn kind(&self) -> Option<TypeKind> {
        match self {
            Self::Named(_) => None,
            Self::List(_) => Some(TypeKind::List),
            Self::NonNull(_) => Some(TypeKind::NonNull),
        }
    }

    pub fn is_non_null(&self) -> bool {
        matches!(self, Self::NonNull(_))
    }

    pub fn is_list(&self) -> bool {
        match self {
            Self::List(_) => true,
            Self::NonNull(inner) => inner.is_list(),
            Self::Named(_) => false,
        }
    }

    /// The type wrapped by a `LIST` or `NON_NULL`
    pub fn of_type(&self) -> Option<&TypeRef> {
        match self {
            Self::Named(_) => None,
            Self::List(inner) | Self::NonNull(inner) => Some(inner),
        }
    }

    /// The named type inside any wrappers
    pub fn inner_named(&self) -> &Name {
        match self {
            Self::Named(name) => name,
            Self::List(inner) | Self::NonNull(inner) => inner.inner_named(),
        }
    }

    /// Whether a `NON_NULL` directly wraps another `NON_NULL` anywhere in this reference
    pub fn has_nested_non_null(&self) -> bool {
        match self {
            Self::Named(_) => false,
            Self::NonNull(inner) => inner.is_non_null() || inner.has_nested_non_null(),
            Self::List(inner) => inner.has_nested_non_null(),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => write!(f, "{name}"),
            Self::List(inner) => write!(f, "[{inner}]"),
            Self::NonNull(inner) => write!(f, "{inner}!"),
        }
    }
}

impl Field {
    pub fn new(name: Name, ty: TypeRef) -> Self {
        Self {
            name,
            description: None,
            ty,
            args: Vec::new(),
            is_deprecated: false,
            deprecation_reason: None,
            position: None,
        }
    }

    pub fn description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    pub fn argument(mut self, arg: InputValue) -> Self {
        self.args.push(arg);
        self
    }

    pub fn deprecated(mut self, reason: Option<String>) -> Self {
        self.is_deprecated = true;
        self.deprecation_reason = reason;
        self
    }

    pub fn add_arg(&mut self, arg: InputValue) {
        self.args.push(arg)
    }

    pub fn arg(&self, name: &str) -> Option<&InputValue> {
        self.args.iter().find(|arg| arg.name == name)
    }
}

impl InputValue {
    pub fn new(name: Name, ty: TypeRef) -> Self {
        Self {
            name,
            ty,
            description: None,
            default_value: None,
        }
    }

    pub fn description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    pub fn default_value(mut self, default_value: Option<String>) -> Self {
        self.default_value = default_value;
        self
    }
}

impl EnumValue {
    pub fn new(name: Name) -> Self {
        Self {
            name,
            description: None,
            is_deprecated: false,
            deprecation_reason: None,
        }
    }
}

impl Directive {
    pub fn new(
        name: Name,
        description: impl Into<String>,
        locations: impl IntoIterator<Item = DirectiveLocation>,
    ) -> Self {
        Self {
            name,
            description: Some(description.into()),
            locations: locations.into_iter().collect(),
            args: Vec::new(),
        }
    }

    pub fn argument(mut self, arg: InputValue) -> Self {
        self.args.push(arg);
        self
    }

    pub fn is_executable(&self) -> bool {
        self.locations.iter().all(|location| location.is_executable())
    }

    pub fn is_built_in(&self) -> bool {
        matches!(
            self.name.as_str(),
            "include" | "skip" | "deprecated" | "specifiedBy"
        )
    }
}

impl DirectiveLocation {
    pub fn name(self) -> &'static str {
        match self {
            Self::Query => "QUERY",
            Self::Mutation => "MUTATION",
            Self::Subscription => "SUBSCRIPTION",
            Self::Field => "FIELD",
            Self::FragmentDefinition => "FRAGMENT_DEFINITION",
            Self::FragmentSpread => "FRAGMENT_SPREAD",
            Self::InlineFragment => "INLINE_FRAGMENT",
            Self::VariableDefinition => "VARIABLE_DEFINITION",
            Self::Schema => "SCHEMA",
            Self::Scalar => "SCALAR",
            Self::Object => "OBJECT",
            Self::FieldDefinition => "FIELD_DEFINITION",
            Self::ArgumentDefinition => "ARGUMENT_DEFINITION",
            Self::Interface => "INTERFACE",
            Self::Union => "UNION",
            Self::Enum => "ENUM",
            Self::EnumValue => "ENUM_VALUE",
            Self::InputObject => "INPUT_OBJECT",
            Self::InputFieldDefinition => "INPUT_FIELD_DEFINITION",
        }
    }

    pub const ALL: [DirectiveLocation; 19] = [
        Self::Query,
        Self::Mutation,
        Self::Subscription,
        Self::Field,
        Self::FragmentDefinition,
        Self::FragmentSpread,
        Self::InlineFragment,
        Self::VariableDefinition,
        Self::Schema,
        Self::Scalar,
        Self::Object,
        Self::FieldDefinition,
        Self::ArgumentDefinition,
        Self::Interface,
        Self::Union,
        Self::Enum,
        Self::EnumValue,
        Self::InputObject,
        Self::InputFieldDefinition,
    ];

    /// Locations in executable documents, as opposed to type system locations
    pub fn is_executable(self) -> bool {
        matches!(
            self,
            Self::Query
                | Self::Mutation
                | Self::Subscription
                | Self::Field
                | Self::FragmentDefinition
                | Self::FragmentSpread
                | Self::InlineFragment
                | Self::VariableDefinition
        )
    }
}

impl FromStr for DirectiveLocation {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|location| location.name() == s)
            .ok_or(())
    }
}

impl fmt::Display for DirectiveLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
