//! Static checks over a [`ServiceDescriptor`], run before schema generation.
//!
//! Every check pushes into one [`DiagnosticList`] so that a single pass reports every
//! defect of the service. Generation assumes a service without error diagnostics.

mod directive;
mod input;
mod service;

pub use self::directive::EXTENSION_POINTS;

use crate::descriptor::ServiceDescriptor;
use crate::diagnostic::DiagnosticCode;
use crate::diagnostic::DiagnosticList;
use crate::sources::NodeLocation;
use indexmap::IndexSet;

/// Resolver names taken by the federation query fields
pub const RESERVED_RESOLVER_NAMES: [&str; 2] = ["_entities", "_service"];

/// Type names defined by the federation machinery
pub const RESERVED_TYPE_NAMES: [&str; 5] =
    ["_Any", "FieldSet", "link__Import", "link__Purpose", "_Service"];

/// Runs every validator over `service`.
pub fn validate_service(service: &ServiceDescriptor) -> DiagnosticList {
    let mut validator = Validator::new(service);
    validator.validate();
    validator.diagnostics
}

pub(crate) struct Validator<'a> {
    service: &'a ServiceDescriptor,
    diagnostics: DiagnosticList,
    /// Records already checked as input objects
    input_objects: IndexSet<&'a str>,
    /// Records already checked as output objects
    output_records: IndexSet<&'a str>,
    /// Other definitions already walked on the output side
    visited: IndexSet<&'a str>,
}

impl<'a> Validator<'a> {
    fn new(service: &'a ServiceDescriptor) -> Self {
        Self {
            service,
            diagnostics: DiagnosticList::new(service.sources.clone()),
            input_objects: IndexSet::new(),
            output_records: IndexSet::new(),
            visited: IndexSet::new(),
        }
    }

    fn validate(&mut self) {
        self.validate_service_methods();
        self.validate_interfaces();
        self.validate_directive_classes();
        tracing::debug!(
            diagnostics = self.diagnostics.len(),
            errors = self.diagnostics.has_errors(),
            "service validated"
        );
    }

    fn error(&mut self, code: DiagnosticCode, location: Option<NodeLocation>, message: String) {
        self.diagnostics.push(code, location, message)
    }

    fn warning(&mut self, code: DiagnosticCode, location: Option<NodeLocation>, message: String) {
        self.diagnostics.push_warning(code, location, message)
    }
}

/// Names starting with `__` are reserved for introspection
fn is_reserved_field_name(name: &str) -> bool {
    name.trim_start_matches('\'').starts_with("__")
}

fn is_reserved_type_name(name: &str) -> bool {
    RESERVED_TYPE_NAMES.contains(&name)
}

/// `parent.child`
fn field_path(parent: &str, child: &str) -> String {
    format!("{}.{}", parent, child.trim_start_matches('\''))
}
