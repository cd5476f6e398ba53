//! Executable operations, as handed over by the request parser.
//!
//! Variables are already substituted and fragment spreads already inlined:
//! argument values are plain JSON and a selection is either a field or an inline fragment.

use crate::response::JsonMap;
use crate::response::JsonValue;
use serde::Deserialize;
use serde::Serialize;
use service_schema::sources::LineColumn;
use service_schema::Name;
use std::fmt;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub kind: OperationKind,
    #[serde(default)]
    pub name: Option<Name>,
    #[serde(default)]
    pub directives: Vec<DirectiveApplication>,
    pub selection_set: Vec<Selection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection {
    Field(FieldSelection),
    InlineFragment(InlineFragment),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSelection {
    pub name: Name,
    #[serde(default)]
    pub alias: Option<Name>,
    #[serde(default)]
    pub arguments: JsonMap,
    #[serde(default)]
    pub directives: Vec<DirectiveApplication>,
    #[serde(default)]
    pub selection_set: Vec<Selection>,
    #[serde(default)]
    pub location: Option<LineColumn>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineFragment {
    #[serde(default)]
    pub type_condition: Option<Name>,
    #[serde(default)]
    pub directives: Vec<DirectiveApplication>,
    pub selection_set: Vec<Selection>,
}

/// `@name(arguments)` on an operation, field or inline fragment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectiveApplication {
    pub name: Name,
    #[serde(default)]
    pub arguments: JsonMap,
}

impl Operation {
    pub fn new(kind: OperationKind) -> Self {
        Self {
            kind,
            name: None,
            directives: Vec::new(),
            selection_set: Vec::new(),
        }
    }

    pub fn query() -> Self {
        Self::new(OperationKind::Query)
    }

    pub fn mutation() -> Self {
        Self::new(OperationKind::Mutation)
    }

    pub fn subscription() -> Self {
        Self::new(OperationKind::Subscription)
    }

    pub fn named(mut self, name: Name) -> Self {
        self.name = Some(name);
        self
    }

    pub fn directive(mut self, directive: DirectiveApplication) -> Self {
        self.directives.push(directive);
        self
    }

    pub fn field(mut self, field: FieldSelection) -> Self {
        self.selection_set.push(Selection::Field(field));
        self
    }

    pub fn fragment(mut self, fragment: InlineFragment) -> Self {
        self.selection_set.push(Selection::InlineFragment(fragment));
        self
    }
}

impl FieldSelection {
    pub fn new(name: Name) -> Self {
        Self {
            name,
            alias: None,
            arguments: JsonMap::new(),
            directives: Vec::new(),
            selection_set: Vec::new(),
            location: None,
        }
    }

    pub fn alias(mut self, alias: Name) -> Self {
        self.alias = Some(alias);
        self
    }

    pub fn argument(mut self, name: &str, value: impl Into<JsonValue>) -> Self {
        self.arguments.insert(name, value.into());
        self
    }

    pub fn directive(mut self, directive: DirectiveApplication) -> Self {
        self.directives.push(directive);
        self
    }

    pub fn field(mut self, field: FieldSelection) -> Self {
        self.selection_set.push(Selection::Field(field));
        self
    }

    pub fn fragment(mut self, fragment: InlineFragment) -> Self {
        self.selection_set.push(Selection::InlineFragment(fragment));
        self
    }

    pub fn at(mut self, line: usize, column: usize) -> Self {
        self.location = Some(LineColumn { line, column });
        self
    }

    /// The key of this field in the response: its alias if any, its name otherwise
    pub fn response_key(&self) -> &Name {
        self.alias.as_ref().unwrap_or(&self.name)
    }
}

impl InlineFragment {
    pub fn new(type_condition: Option<Name>) -> Self {
        Self {
            type_condition,
            directives: Vec::new(),
            selection_set: Vec::new(),
        }
    }

    pub fn directive(mut self, directive: DirectiveApplication) -> Self {
        self.directives.push(directive);
        self
    }

    pub fn field(mut self, field: FieldSelection) -> Self {
        self.selection_set.push(Selection::Field(field));
        self
    }
}

impl DirectiveApplication {
    pub fn new(name: Name) -> Self {
        Self {
            name,
            arguments: JsonMap::new(),
        }
    }

    pub fn argument(mut self, name: &str, value: impl Into<JsonValue>) -> Self {
        self.arguments.insert(name, value.into());
        self
    }
}

impl Selection {
    pub fn directives(&self) -> &[DirectiveApplication] {
        match self {
            Self::Field(field) => &field.directives,
            Self::InlineFragment(fragment) => &fragment.directives,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Query => "query",
            Self::Mutation => "mutation",
            Self::Subscription => "subscription",
        })
    }
}
