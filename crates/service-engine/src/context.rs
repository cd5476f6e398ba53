use crate::operation::FieldSelection;
use crate::operation::Selection;
use crate::response::JsonMap;
use crate::response::JsonValue;
use crate::response::ResponseDataPathSegment;
use indexmap::IndexMap;
use service_schema::schema::TypeRef;
use service_schema::sources::LineColumn;
use service_schema::Name;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

/// Request-scoped values shared by every resolver, interceptor and directive of one operation.
///
/// Cloning is cheap and clones share the same attributes.
#[derive(Debug, Clone, Default)]
pub struct Context {
    attributes: Arc<Mutex<IndexMap<String, JsonValue>>>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<JsonValue>) {
        self.attributes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<JsonValue> {
        self.attributes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn remove(&self, key: &str) -> Option<JsonValue> {
        self.attributes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .shift_remove(key)
    }
}

/// The field being resolved, as seen by resolvers, interceptors and directives.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    name: Name,
    alias: Option<Name>,
    arguments: JsonMap,
    path: Vec<ResponseDataPathSegment>,
    ty: TypeRef,
    subfield_names: Vec<Name>,
    location: Option<LineColumn>,
}

impl Field {
    pub(crate) fn new(selection: &FieldSelection, ty: TypeRef, path: Vec<ResponseDataPathSegment>) -> Self {
        let mut subfield_names = Vec::new();
        collect_subfield_names(&selection.selection_set, &mut subfield_names);
        Self {
            name: selection.name.clone(),
            alias: selection.alias.clone(),
            arguments: selection.arguments.clone(),
            path,
            ty,
            subfield_names,
            location: selection.location,
        }
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn alias(&self) -> &Name {
        self.alias.as_ref().unwrap_or(&self.name)
    }

    pub fn arguments(&self) -> &JsonMap {
        &self.arguments
    }

    pub fn argument(&self, name: &str) -> Option<&JsonValue> {
        self.arguments.get(name)
    }

    pub fn path(&self) -> &[ResponseDataPathSegment] {
        &self.path
    }

    /// The output type of the field in the schema
    pub fn ty(&self) -> &TypeRef {
        &self.ty
    }

    /// Names of the fields selected on this one, including through inline fragments
    pub fn subfield_names(&self) -> &[Name] {
        &self.subfield_names
    }

    pub fn location(&self) -> Option<LineColumn> {
        self.location
    }
}

fn collect_subfield_names(selections: &[Selection], names: &mut Vec<Name>) {
    for selection in selections {
        match selection {
            Selection::Field(field) => {
                if !names.contains(&field.name) {
                    names.push(field.name.clone())
                }
            }
            Selection::InlineFragment(fragment) => {
                collect_subfield_names(&fragment.selection_set, names)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::InlineFragment;
    use pretty_assertions::assert_eq;
    use service_schema::name;

    #[test]
    fn attributes_are_shared_between_clones() {
        let context = Context::new().with("user", "alice");
        let clone = context.clone();
        clone.set("role", "admin");
        assert_eq!(context.get("role"), Some(JsonValue::from("admin")));
        assert_eq!(context.remove("user"), Some(JsonValue::from("alice")));
        assert_eq!(clone.get("user"), None);
    }

    #[test]
    fn subfield_names_include_fragments() {
        let selection = FieldSelection::new(name!("profile"))
            .field(FieldSelection::new(name!("name")))
            .fragment(
                InlineFragment::new(Some(name!("Admin")))
                    .field(FieldSelection::new(name!("level")))
                    .field(FieldSelection::new(name!("name"))),
            );
        let field = Field::new(
            &selection,
            TypeRef::named(name!("Profile")),
            vec![ResponseDataPathSegment::Field(name!("profile"))],
        );
        assert_eq!(field.subfield_names(), [name!("name"), name!("level")]);
        assert_eq!(field.alias(), "profile");
    }
}
