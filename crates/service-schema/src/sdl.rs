//! SDL projection of a generated schema.
//!
//! The output is what a subgraph reports through `_service { sdl }`: the service's own
//! types and directives, without built-in scalars, introspection types, built-in
//! directives or the federation machinery itself.
//!
//! ```
//! use service_schema::descriptor::{MethodDescriptor, ServiceDescriptor, TypeDescriptor};
//! use service_schema::sdl::print_sdl;
//!
//! let service = ServiceDescriptor::new()
//!     .method(MethodDescriptor::resource("get", ["greeting"], TypeDescriptor::String));
//! let schema = service_schema::generate_schema(&service).unwrap();
//! assert_eq!(print_sdl(&schema, &Default::default()), "type Query {\n  greeting: String!\n}\n");
//! ```

use crate::schema::federation::FEDERATION_QUERY_FIELDS;
use crate::schema::federation::FEDERATION_TYPES;
use crate::schema::Directive;
use crate::schema::EnumValue;
use crate::schema::Field;
use crate::schema::InputValue;
use crate::schema::Schema;
use crate::schema::Type;
use crate::schema::TypeKind;
use crate::schema::FEDERATION_DIRECTIVES;
use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;
use std::fmt;
use std::fmt::Write;

pub const FEDERATION_SPEC_URL: &str = "https://specs.apollo.dev/federation/v2.0";

/// `@key` arguments of one entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyDirective {
    /// One `@key` is printed per field set
    pub fields: Vec<String>,
    #[serde(default = "default_resolvable")]
    pub resolvable: bool,
}

fn default_resolvable() -> bool {
    true
}

/// Entity name -> key directive arguments
pub type KeyDirectives = IndexMap<String, KeyDirective>;

impl KeyDirective {
    pub fn new<I, S>(fields: I, resolvable: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            resolvable,
        }
    }
}

/// Prints `schema` as GraphQL SDL.
pub fn print_sdl(schema: &Schema, key_directives: &KeyDirectives) -> String {
    Sdl {
        schema,
        key_directives,
    }
    .to_string()
}

struct Sdl<'a> {
    schema: &'a Schema,
    key_directives: &'a KeyDirectives,
}

impl Sdl<'_> {
    fn is_printed_type(&self, ty: &Type) -> bool {
        !ty.is_built_in()
            && !(self.schema.is_subgraph && FEDERATION_TYPES.contains(&ty.name.as_str()))
    }

    fn is_printed_directive(&self, directive: &Directive) -> bool {
        !directive.is_built_in()
            && !(self.schema.is_subgraph && FEDERATION_DIRECTIVES.contains(&directive.name.as_str()))
    }

    fn is_printed_field(&self, ty: &Type, field: &Field) -> bool {
        let is_query = self.schema.query_type.as_ref() == Some(&ty.name);
        !(is_query
            && self.schema.is_subgraph
            && FEDERATION_QUERY_FIELDS.contains(&field.name.as_str()))
    }

    fn write_link(&self, out: &mut String) -> fmt::Result {
        write!(out, "extend schema @link(url: \"{FEDERATION_SPEC_URL}\", import: [")?;
        let imports = FEDERATION_DIRECTIVES.iter().filter(|name| **name != "link");
        for (i, name) in imports.enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            write!(out, "\"@{name}\"")?;
        }
        out.push_str("])\n");
        Ok(())
    }

    fn write_schema_definition(&self, out: &mut String, description: &str) -> fmt::Result {
        writeln!(out, "{}", Description::top(description))?;
        out.push_str("schema {");
        let roots = [
            ("query", &self.schema.query_type),
            ("mutation", &self.schema.mutation_type),
            ("subscription", &self.schema.subscription_type),
        ];
        for (operation, root) in roots {
            if let Some(root) = root {
                write!(out, "\n  {operation}: {root}")?;
            }
        }
        out.push_str("\n}\n");
        Ok(())
    }

    fn write_keys(&self, out: &mut String, ty: &Type) -> fmt::Result {
        let Some(key) = self.key_directives.get(ty.name.as_str()) else {
            return Ok(());
        };
        for fields in &key.fields {
            write!(out, " @key(fields: {}", StringFormatter(fields))?;
            if !key.resolvable {
                out.push_str(", resolvable: false");
            }
            out.push(')');
        }
        Ok(())
    }

    fn write_type(&self, out: &mut String, ty: &Type) -> fmt::Result {
        if let Some(description) = &ty.description {
            writeln!(out, "{}", Description::top(description))?;
        }
        match ty.kind {
            TypeKind::Scalar => writeln!(out, "scalar {}", ty.name),
            TypeKind::Object | TypeKind::Interface => {
                let keyword = if ty.kind == TypeKind::Object {
                    "type"
                } else {
                    "interface"
                };
                write!(out, "{} {}", keyword, ty.name)?;
                for (i, interface) in ty.interfaces.iter().enumerate() {
                    let separator = if i == 0 { " implements " } else { " & " };
                    write!(out, "{separator}{interface}")?;
                }
                self.write_keys(out, ty)?;
                out.push_str(" {");
                for field in ty.fields.values() {
                    if self.is_printed_field(ty, field) {
                        write!(out, "\n{}", FieldDefinition(field))?;
                    }
                }
                out.push_str("\n}\n");
                Ok(())
            }
            TypeKind::Union => {
                write!(out, "union {}", ty.name)?;
                for (i, member) in ty.possible_types.iter().enumerate() {
                    let separator = if i == 0 { " = " } else { " | " };
                    write!(out, "{separator}{member}")?;
                }
                out.push('\n');
                Ok(())
            }
            TypeKind::Enum => {
                write!(out, "enum {} {{", ty.name)?;
                for value in ty.enum_values.values() {
                    write!(out, "\n{}", EnumValueDefinition(value))?;
                }
                out.push_str("\n}\n");
                Ok(())
            }
            TypeKind::InputObject => {
                write!(out, "input {} {{", ty.name)?;
                for input in ty.input_fields.values() {
                    if let Some(description) = &input.description {
                        write!(out, "\n{}", Description::field(description))?;
                    }
                    write!(out, "\n  {}: {}", input.name, input.ty)?;
                    if let Some(default) = &input.default_value {
                        write!(out, " = {default}")?;
                    }
                }
                out.push_str("\n}\n");
                Ok(())
            }
            // Wrapping kinds never name a registry entry
            TypeKind::List | TypeKind::NonNull => Ok(()),
        }
    }
}

impl fmt::Display for Sdl<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut blocks: Vec<String> = Vec::new();
        if self.schema.is_subgraph {
            let mut out = String::new();
            self.write_link(&mut out)?;
            blocks.push(out);
        }
        if let Some(description) = &self.schema.description {
            let mut out = String::new();
            self.write_schema_definition(&mut out, description)?;
            blocks.push(out);
        }
        for directive in &self.schema.directives {
            if self.is_printed_directive(directive) {
                blocks.push(DirectiveDefinition(directive).to_string());
            }
        }
        for ty in self.schema.types.values() {
            if self.is_printed_type(ty) {
                let mut out = String::new();
                self.write_type(&mut out, ty)?;
                blocks.push(out);
            }
        }
        for (i, block) in blocks.iter().enumerate() {
            if i > 0 {
                f.write_char('\n')?;
            }
            f.write_str(block)?;
        }
        Ok(())
    }
}

struct DirectiveDefinition<'a>(&'a Directive);

impl fmt::Display for DirectiveDefinition<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let directive = self.0;
        if let Some(description) = directive.description.as_deref().filter(|d| !d.is_empty()) {
            writeln!(f, "{}", Description::top(description))?;
        }
        write!(f, "directive @{}", directive.name)?;
        write_arguments(f, &directive.args)?;
        for (i, location) in directive.locations.iter().enumerate() {
            match i {
                0 => write!(f, " on {location}")?,
                _ => write!(f, " | {location}")?,
            }
        }
        f.write_char('\n')
    }
}

struct FieldDefinition<'a>(&'a Field);

impl fmt::Display for FieldDefinition<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let field = self.0;
        if let Some(description) = &field.description {
            writeln!(f, "{}", Description::field(description))?;
        }
        write!(f, "  {}", field.name)?;
        write_arguments(f, &field.args)?;
        write!(f, ": {}", field.ty)?;
        if field.is_deprecated {
            write_deprecated(f, field.deprecation_reason.as_deref())?;
        }
        Ok(())
    }
}

struct EnumValueDefinition<'a>(&'a EnumValue);

impl fmt::Display for EnumValueDefinition<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = self.0;
        if let Some(description) = &value.description {
            writeln!(f, "{}", Description::field(description))?;
        }
        write!(f, "  {}", value.name)?;
        if value.is_deprecated {
            write_deprecated(f, value.deprecation_reason.as_deref())?;
        }
        Ok(())
    }
}

fn write_arguments<W: Write>(f: &mut W, args: &[InputValue]) -> fmt::Result {
    for (i, arg) in args.iter().enumerate() {
        f.write_str(if i == 0 { "(" } else { ", " })?;
        if let Some(description) = &arg.description {
            write!(f, "{} ", StringFormatter(description))?;
        }
        write!(f, "{}: {}", arg.name, arg.ty)?;
        if let Some(default) = &arg.default_value {
            write!(f, " = {default}")?;
        }
    }
    if !args.is_empty() {
        f.write_char(')')?;
    }
    Ok(())
}

fn write_deprecated<W: Write>(f: &mut W, reason: Option<&str>) -> fmt::Result {
    f.write_str(" @deprecated")?;
    if let Some(reason) = reason {
        write!(f, "(reason: {})", StringFormatter(reason))?;
    }
    Ok(())
}

/// A description, printed as a block string when it contains quotes or newlines
struct Description<'a> {
    source: &'a str,
    indent: usize,
}

impl<'a> Description<'a> {
    fn top(source: &'a str) -> Self {
        Self { source, indent: 0 }
    }

    fn field(source: &'a str) -> Self {
        Self { source, indent: 2 }
    }
}

impl fmt::Display for Description<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let indent = " ".repeat(self.indent);
        let use_block = self.source.contains(['"', '\n'])
            && self.source.lines().all(|line| !line.contains(char::is_control));
        if !use_block {
            return write!(f, "{indent}{}", StringFormatter(self.source));
        }
        write!(f, "{indent}\"\"\"")?;
        for line in self.source.lines() {
            write!(f, "\n{indent}")?;
            f.write_str(&line.replace("\"\"\"", "\\\"\"\""))?;
        }
        write!(f, "\n{indent}\"\"\"")
    }
}

/// A quoted string value, escaped
struct StringFormatter<'a>(&'a str);

impl fmt::Display for StringFormatter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_char('"')?;
        for c in self.0.chars() {
            match c {
                '"' => f.write_str(r#"\""#)?,
                '\u{0008}' => f.write_str(r#"\b"#)?,
                '\u{000c}' => f.write_str(r#"\f"#)?,
                '\n' => f.write_str(r#"\n"#)?,
                '\r' => f.write_str(r#"\r"#)?,
                '\t' => f.write_str(r#"\t"#)?,
                '\\' => f.write_str(r#"\\"#)?,
                c if c.is_control() => write!(f, "\\u{:04x}", c as u32)?,
                c => f.write_char(c)?,
            }
        }
        f.write_char('"')
    }
}
