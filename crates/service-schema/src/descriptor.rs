//! The service descriptor: an explicit, serializable description of a GraphQL service
//! as seen by a host-language front end.
//!
//! The front end lists the service's resolver methods, the named type definitions they
//! reach (records, service classes, service object types, enums, unions, ...), and the
//! executable directive classes of the module. Schema generation and validation only
//! read this model: they never query a live compiler.
//!
//! ```
//! use service_schema::descriptor::{MethodDescriptor, ServiceDescriptor, TypeDescriptor};
//!
//! let service = ServiceDescriptor::new()
//!     .method(MethodDescriptor::resource("get", ["greeting"], TypeDescriptor::String));
//! assert_eq!(service.methods.len(), 1);
//! ```

use crate::sources::NodeLocation;
use crate::sources::SourceMap;
use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;
use std::fmt;

/// Resource accessor for query fields
pub const GET_ACCESSOR: &str = "get";
/// Resource accessor for subscription fields
pub const SUBSCRIBE_ACCESSOR: &str = "subscribe";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    #[serde(default)]
    pub description: Option<String>,
    /// Whether the service is a federation subgraph
    #[serde(default)]
    pub is_subgraph: bool,
    /// Resolver methods declared directly on the service
    #[serde(default)]
    pub methods: Vec<MethodDescriptor>,
    /// Named type definitions of the module, by name
    #[serde(default)]
    pub definitions: IndexMap<String, TypeDefinition>,
    /// Classes of the module that may define executable directives
    #[serde(default)]
    pub directives: Vec<DirectiveClass>,
    #[serde(default)]
    pub location: Option<NodeLocation>,
    #[serde(skip)]
    pub sources: SourceMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDescriptor {
    pub name: String,
    pub kind: MethodKind,
    #[serde(default)]
    pub params: Vec<Parameter>,
    /// `None` when the method declares no return type
    #[serde(default)]
    pub return_type: Option<TypeDescriptor>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub deprecation: Option<Deprecation>,
    #[serde(default)]
    pub location: Option<NodeLocation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MethodKind {
    Resource {
        accessor: String,
        path: Vec<PathSegment>,
    },
    Remote,
    Init,
    Plain,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathSegment {
    Name(String),
    /// `[string id]`
    Parameter(String),
    /// `[string... rest]`
    Rest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub ty: TypeDescriptor,
    #[serde(default)]
    pub kind: ParameterKind,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<NodeLocation>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    #[default]
    Required,
    /// Declares a default value expression
    Defaultable,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deprecation {
    #[serde(default)]
    pub reason: Option<String>,
}

/// A type as written at a use site (return type, parameter type, record field type).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeDescriptor {
    String,
    Char,
    Int,
    Float,
    Boolean,
    Decimal,
    Nil,
    Error,
    Json,
    Byte,
    Any,
    Anydata,
    Readonly,
    /// The file upload type of the GraphQL module
    Upload,
    /// The request context type of the GraphQL module
    Context,
    /// The field type of the GraphQL module
    Field,
    /// A reference to a named definition
    Reference {
        name: String,
        #[serde(default)]
        location: Option<NodeLocation>,
    },
    Array {
        member: Box<TypeDescriptor>,
    },
    Map {
        value: Box<TypeDescriptor>,
    },
    Union {
        members: Vec<TypeDescriptor>,
    },
    Intersection {
        members: Vec<TypeDescriptor>,
    },
    Stream {
        item: Box<TypeDescriptor>,
    },
    Table {
        row: Box<TypeDescriptor>,
    },
    /// An anonymous record
    Record {
        fields: Vec<RecordField>,
    },
    Singleton {
        value: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDefinition {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<NodeLocation>,
    /// Set when annotated as a federation entity
    #[serde(default)]
    pub entity: Option<EntityAnnotation>,
    pub kind: DefinitionKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DefinitionKind {
    Record { fields: Vec<RecordField> },
    /// A class, whose resource methods become fields
    Class(ObjectDescriptor),
    /// An object type, which becomes an interface when distinct
    ServiceObject(ObjectDescriptor),
    Enum { members: Vec<EnumMember> },
    Union { members: Vec<TypeDescriptor> },
    Intersection { members: Vec<TypeDescriptor> },
    Table { row: TypeDescriptor },
    /// Any other type definition, such as `type Id string;`
    Alias { target: TypeDescriptor },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectDescriptor {
    #[serde(default)]
    pub methods: Vec<MethodDescriptor>,
    /// Names of included object types
    #[serde(default)]
    pub inclusions: Vec<String>,
    #[serde(default = "default_true")]
    pub is_service: bool,
    #[serde(default = "default_true")]
    pub distinct: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordField {
    pub name: String,
    pub ty: TypeDescriptor,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub has_default: bool,
    #[serde(default)]
    pub location: Option<NodeLocation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumMember {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub deprecation: Option<Deprecation>,
    #[serde(default)]
    pub location: Option<NodeLocation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityAnnotation {
    pub key: Vec<String>,
    #[serde(default = "default_true")]
    pub resolvable: bool,
}

/// A class that may define an executable directive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectiveClass {
    pub class_name: String,
    /// Whether the class includes the directive object type of the GraphQL module
    #[serde(default)]
    pub includes_directive: bool,
    #[serde(default)]
    pub config: Option<DirectiveConfig>,
    #[serde(default)]
    pub methods: Vec<MethodDescriptor>,
    #[serde(default)]
    pub location: Option<NodeLocation>,
}

/// The directive configuration annotation of a directive class
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectiveConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub on: Vec<String>,
    #[serde(default)]
    pub location: Option<NodeLocation>,
}

fn default_true() -> bool {
    true
}

impl ServiceDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn subgraph(mut self) -> Self {
        self.is_subgraph = true;
        self
    }

    pub fn method(mut self, method: MethodDescriptor) -> Self {
        self.methods.push(method);
        self
    }

    pub fn definition(mut self, definition: TypeDefinition) -> Self {
        self.definitions.insert(definition.name.clone(), definition);
        self
    }

    pub fn directive(mut self, directive: DirectiveClass) -> Self {
        self.directives.push(directive);
        self
    }

    pub fn sources(mut self, sources: SourceMap) -> Self {
        self.sources = sources;
        self
    }

    pub fn get_definition(&self, name: &str) -> Option<&TypeDefinition> {
        self.definitions.get(name)
    }

    /// Follows type references until reaching a non-reference definition kind.
    pub fn resolve_reference<'a>(&'a self, ty: &'a TypeDescriptor) -> Option<&'a TypeDefinition> {
        match ty {
            TypeDescriptor::Reference { name, .. } => self.definitions.get(name),
            _ => None,
        }
    }

    pub fn resource_methods(&self) -> impl Iterator<Item = &MethodDescriptor> {
        self.methods.iter().filter(|m| m.is_resource())
    }

    pub fn remote_methods(&self) -> impl Iterator<Item = &MethodDescriptor> {
        self.methods.iter().filter(|m| m.is_remote())
    }
}

impl MethodDescriptor {
    pub fn new(name: impl Into<String>, kind: MethodKind) -> Self {
        Self {
            name: name.into(),
            kind,
            params: Vec::new(),
            return_type: None,
            description: None,
            deprecation: None,
            location: None,
        }
    }

    /// A resource method such as `resource function get lift/status() returns string`
    pub fn resource<I, S>(accessor: &str, path: I, return_type: TypeDescriptor) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let path: Vec<PathSegment> = path
            .into_iter()
            .map(|segment| PathSegment::Name(segment.into()))
            .collect();
        let name = format!("${}${}", accessor, path_signature(&path));
        let mut method = Self::new(
            name,
            MethodKind::Resource {
                accessor: accessor.to_owned(),
                path,
            },
        );
        method.return_type = Some(return_type);
        method
    }

    pub fn remote(name: impl Into<String>, return_type: TypeDescriptor) -> Self {
        let mut method = Self::new(name, MethodKind::Remote);
        method.return_type = Some(return_type);
        method
    }

    pub fn init() -> Self {
        Self::new("init", MethodKind::Init)
    }

    pub fn param(mut self, param: Parameter) -> Self {
        self.params.push(param);
        self
    }

    pub fn returns(mut self, return_type: Option<TypeDescriptor>) -> Self {
        self.return_type = return_type;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn deprecated(mut self, reason: Option<&str>) -> Self {
        self.deprecation = Some(Deprecation {
            reason: reason.map(str::to_owned),
        });
        self
    }

    pub fn at(mut self, location: NodeLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn is_resource(&self) -> bool {
        matches!(self.kind, MethodKind::Resource { .. })
    }

    pub fn is_remote(&self) -> bool {
        matches!(self.kind, MethodKind::Remote)
    }

    pub fn is_init(&self) -> bool {
        matches!(self.kind, MethodKind::Init)
    }

    pub fn accessor(&self) -> Option<&str> {
        match &self.kind {
            MethodKind::Resource { accessor, .. } => Some(accessor),
            _ => None,
        }
    }

    pub fn path(&self) -> &[PathSegment] {
        match &self.kind {
            MethodKind::Resource { path, .. } => path,
            _ => &[],
        }
    }

    /// Path segment names, when every segment is a plain name
    pub fn path_names(&self) -> Option<Vec<&str>> {
        self.path()
            .iter()
            .map(|segment| match segment {
                PathSegment::Name(name) => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    /// The name of the GraphQL field this method resolves:
    /// the first path segment of a resource method, or the method name.
    pub fn field_name(&self) -> &str {
        match self.path().first() {
            Some(PathSegment::Name(name)) => name,
            Some(PathSegment::Parameter(name)) => name,
            Some(PathSegment::Rest) => "",
            None => &self.name,
        }
    }

    /// Parameters that become GraphQL arguments
    pub fn graphql_params(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter().filter(|p| !p.ty.is_implicit())
    }

    /// Human-readable signature used in diagnostics
    pub fn signature(&self) -> String {
        let params = self
            .params
            .iter()
            .map(|p| format!("{} {}", p.ty, p.name))
            .collect::<Vec<_>>()
            .join(", ");
        let head = match &self.kind {
            MethodKind::Resource { accessor, path } => format!(
                "resource function {} {}({})",
                accessor,
                path_signature(path),
                params
            ),
            MethodKind::Remote => format!("remote function {}({})", self.name, params),
            MethodKind::Init | MethodKind::Plain => format!("function {}({})", self.name, params),
        };
        match &self.return_type {
            Some(ty) => format!("{head} returns {ty}"),
            None => head,
        }
    }
}

fn path_signature(path: &[PathSegment]) -> String {
    path.iter()
        .map(|segment| match segment {
            PathSegment::Name(name) => name.clone(),
            PathSegment::Parameter(name) => format!("[{name}]"),
            PathSegment::Rest => "[...]".to_owned(),
        })
        .collect::<Vec<_>>()
        .join("/")
}

impl Parameter {
    pub fn new(name: impl Into<String>, ty: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            ty,
            kind: ParameterKind::Required,
            description: None,
            location: None,
        }
    }

    pub fn defaultable(mut self) -> Self {
        self.kind = ParameterKind::Defaultable;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn at(mut self, location: NodeLocation) -> Self {
        self.location = Some(location);
        self
    }
}

impl TypeDescriptor {
    pub fn reference(name: impl Into<String>) -> Self {
        Self::Reference {
            name: name.into(),
            location: None,
        }
    }

    pub fn array(member: TypeDescriptor) -> Self {
        Self::Array {
            member: Box::new(member),
        }
    }

    pub fn map(value: TypeDescriptor) -> Self {
        Self::Map {
            value: Box::new(value),
        }
    }

    pub fn union(members: impl IntoIterator<Item = TypeDescriptor>) -> Self {
        Self::Union {
            members: members.into_iter().collect(),
        }
    }

    /// `T?`
    pub fn optional(ty: TypeDescriptor) -> Self {
        Self::union([ty, Self::Nil])
    }

    pub fn stream(item: TypeDescriptor) -> Self {
        Self::Stream {
            item: Box::new(item),
        }
    }

    pub fn table(row: TypeDescriptor) -> Self {
        Self::Table { row: Box::new(row) }
    }

    /// `readonly & T`
    pub fn readonly(ty: TypeDescriptor) -> Self {
        Self::Intersection {
            members: vec![Self::Readonly, ty],
        }
    }

    /// Whether this is a union with a `nil` member
    pub fn is_nilable(&self) -> bool {
        match self {
            Self::Union { members } => members
                .iter()
                .any(|m| matches!(m, Self::Nil) || (matches!(m, Self::Union { .. }) && m.is_nilable())),
            _ => false,
        }
    }

    /// Parameter types supplied by the engine rather than by GraphQL arguments
    pub fn is_implicit(&self) -> bool {
        matches!(self, Self::Context | Self::Field)
    }

    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Self::String | Self::Char | Self::Int | Self::Float | Self::Boolean | Self::Decimal
        )
    }

    /// Union members with nested unions flattened and `error`/`nil` dropped
    pub fn effective_members(&self) -> Vec<&TypeDescriptor> {
        match self {
            Self::Union { members } => union_members(members),
            _ => Vec::new(),
        }
    }

    /// The single non-`readonly` member of an intersection, if there is exactly one
    pub fn effective_intersection_member(&self) -> Option<&TypeDescriptor> {
        match self {
            Self::Intersection { members } => intersection_member(members),
            _ => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Char => "string:Char",
            Self::Int => "int",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Decimal => "decimal",
            Self::Nil => "nil",
            Self::Error => "error",
            Self::Json => "json",
            Self::Byte => "byte",
            Self::Any => "any",
            Self::Anydata => "anydata",
            Self::Readonly => "readonly",
            Self::Upload => "Upload",
            Self::Context => "Context",
            Self::Field => "Field",
            Self::Reference { .. } => "type reference",
            Self::Array { .. } => "array",
            Self::Map { .. } => "map",
            Self::Union { .. } => "union",
            Self::Intersection { .. } => "intersection",
            Self::Stream { .. } => "stream",
            Self::Table { .. } => "table",
            Self::Record { .. } => "record",
            Self::Singleton { .. } => "singleton",
        }
    }
}

/// Members of a union, nested unions flattened, without `error` and `nil`
pub fn union_members(members: &[TypeDescriptor]) -> Vec<&TypeDescriptor> {
    fn collect<'a>(members: &'a [TypeDescriptor], out: &mut Vec<&'a TypeDescriptor>) {
        for member in members {
            match member {
                TypeDescriptor::Union { members } => collect(members, out),
                TypeDescriptor::Error | TypeDescriptor::Nil => {}
                other => out.push(other),
            }
        }
    }
    let mut out = Vec::new();
    collect(members, &mut out);
    out
}

/// The single non-`readonly` member of an intersection
pub fn intersection_member(members: &[TypeDescriptor]) -> Option<&TypeDescriptor> {
    let mut effective = members
        .iter()
        .filter(|member| !matches!(member, TypeDescriptor::Readonly));
    let first = effective.next()?;
    effective.next().is_none().then_some(first)
}

/// Whether a union has an `error` member at any nesting depth
pub fn has_error_member(members: &[TypeDescriptor]) -> bool {
    members.iter().any(|member| match member {
        TypeDescriptor::Error => true,
        TypeDescriptor::Union { members } => has_error_member(members),
        _ => false,
    })
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reference { name, .. } => f.write_str(name),
            Self::Array { member } => write!(f, "{member}[]"),
            Self::Map { value } => write!(f, "map<{value}>"),
            Self::Union { members } => {
                if let [single, Self::Nil] = members.as_slice() {
                    return write!(f, "{single}?");
                }
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        f.write_str("|")?;
                    }
                    write!(f, "{member}")?;
                }
                Ok(())
            }
            Self::Intersection { members } => {
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" & ")?;
                    }
                    write!(f, "{member}")?;
                }
                Ok(())
            }
            Self::Stream { item } => write!(f, "stream<{item}>"),
            Self::Table { row } => write!(f, "table<{row}>"),
            Self::Record { fields } => {
                f.write_str("record {|")?;
                for field in fields {
                    write!(f, " {} {};", field.ty, field.name)?;
                }
                f.write_str(" |}")
            }
            Self::Singleton { value } => f.write_str(value),
            other => f.write_str(other.kind_name()),
        }
    }
}

impl TypeDefinition {
    pub fn new(name: impl Into<String>, kind: DefinitionKind) -> Self {
        Self {
            name: name.into(),
            description: None,
            location: None,
            entity: None,
            kind,
        }
    }

    pub fn record(name: impl Into<String>, fields: impl IntoIterator<Item = RecordField>) -> Self {
        Self::new(
            name,
            DefinitionKind::Record {
                fields: fields.into_iter().collect(),
            },
        )
    }

    pub fn class(name: impl Into<String>, object: ObjectDescriptor) -> Self {
        Self::new(name, DefinitionKind::Class(object))
    }

    pub fn service_object(name: impl Into<String>, object: ObjectDescriptor) -> Self {
        Self::new(name, DefinitionKind::ServiceObject(object))
    }

    pub fn enumeration(name: impl Into<String>, members: impl IntoIterator<Item = EnumMember>) -> Self {
        Self::new(
            name,
            DefinitionKind::Enum {
                members: members.into_iter().collect(),
            },
        )
    }

    pub fn union(name: impl Into<String>, members: impl IntoIterator<Item = TypeDescriptor>) -> Self {
        Self::new(
            name,
            DefinitionKind::Union {
                members: members.into_iter().collect(),
            },
        )
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn entity<I, S>(mut self, key: I, resolvable: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entity = Some(EntityAnnotation {
            key: key.into_iter().map(Into::into).collect(),
            resolvable,
        });
        self
    }

    pub fn at(mut self, location: NodeLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn object(&self) -> Option<&ObjectDescriptor> {
        match &self.kind {
            DefinitionKind::Class(object) | DefinitionKind::ServiceObject(object) => Some(object),
            _ => None,
        }
    }

    pub fn is_record(&self) -> bool {
        matches!(self.kind, DefinitionKind::Record { .. })
    }
}

impl ObjectDescriptor {
    pub fn new() -> Self {
        Self {
            methods: Vec::new(),
            inclusions: Vec::new(),
            is_service: true,
            distinct: true,
        }
    }

    pub fn method(mut self, method: MethodDescriptor) -> Self {
        self.methods.push(method);
        self
    }

    pub fn includes(mut self, name: impl Into<String>) -> Self {
        self.inclusions.push(name.into());
        self
    }

    pub fn resource_methods(&self) -> impl Iterator<Item = &MethodDescriptor> {
        self.methods.iter().filter(|m| m.is_resource())
    }
}

impl Default for ObjectDescriptor {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordField {
    pub fn new(name: impl Into<String>, ty: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            ty,
            description: None,
            optional: false,
            has_default: false,
            location: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn with_default(mut self) -> Self {
        self.has_default = true;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl EnumMember {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            deprecation: None,
            location: None,
        }
    }

    pub fn deprecated(mut self, reason: Option<&str>) -> Self {
        self.deprecation = Some(Deprecation {
            reason: reason.map(str::to_owned),
        });
        self
    }
}

impl DirectiveClass {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            includes_directive: true,
            config: None,
            methods: Vec::new(),
            location: None,
        }
    }

    pub fn config(mut self, name: Option<&str>, on: impl IntoIterator<Item = &'static str>) -> Self {
        self.config = Some(DirectiveConfig {
            name: name.map(str::to_owned),
            on: on.into_iter().map(str::to_owned).collect(),
            location: None,
        });
        self
    }

    pub fn method(mut self, method: MethodDescriptor) -> Self {
        self.methods.push(method);
        self
    }

    /// The directive name: the configured name if any, else the class name
    pub fn directive_name(&self) -> &str {
        self.config
            .as_ref()
            .and_then(|config| config.name.as_deref())
            .unwrap_or(&self.class_name)
    }

    pub fn init_method(&self) -> Option<&MethodDescriptor> {
        self.methods.iter().find(|m| m.is_init())
    }
}
