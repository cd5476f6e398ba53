//! Pretty-printable diagnostic reports for defects found in a service description.
//!
//! Validators push [`DiagnosticData`] into a [`DiagnosticList`]. Each entry has a stable
//! [`DiagnosticCode`], a severity, a message and an optional source location.
//! Formatting a list with `Display` prints every report without colors;
//! `Debug` uses colors when stderr is a terminal.
//!
//! Custom errors can reuse the same rendering by implementing [`ToDiagnostic`]:
//!
//! ```rust
//! use service_schema::diagnostic::CliReport;
//! use service_schema::diagnostic::ToDiagnostic;
//! use service_schema::sources::NodeLocation;
//!
//! struct UnusedType {
//!     location: Option<NodeLocation>,
//! }
//!
//! impl ToDiagnostic for UnusedType {
//!     fn location(&self) -> Option<NodeLocation> {
//!         self.location
//!     }
//!
//!     fn report(&self, report: &mut CliReport) {
//!         report.with_message("type is never reachable from a root type");
//!         report.with_label_opt(self.location, "defined here");
//!     }
//! }
//! ```
use crate::sources::FileId;
use crate::sources::LineColumn;
use crate::sources::NodeLocation;
use crate::sources::SourceFile;
use crate::sources::SourceMap;
use ariadne::ColorGenerator;
use ariadne::ReportKind;
use std::fmt;
use std::io;
use std::ops::Range;
use std::sync::Arc;
use std::sync::OnceLock;

/// A pretty-printable diagnostic.
pub struct Diagnostic<T> {
    pub sources: SourceMap,
    pub error: T,
}

/// A diagnostic report that can be printed to a CLI with pretty colors and labeled lines of
/// source code.
pub struct CliReport {
    sources: SourceMap,
    colors: ColorGenerator,
    report: ariadne::ReportBuilder<'static, MappedSpan>,
}

/// Indicate when to use ANSI colors for printing.
#[derive(Debug, Clone, Copy)]
pub enum Color {
    /// Do not use colors.
    Never,
    /// Use colors if stderr is a terminal.
    StderrIsTerminal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Error,
    Warning,
}

/// Trait for pretty-printing custom error types.
pub trait ToDiagnostic {
    /// Return the main location for this error, if any.
    fn location(&self) -> Option<NodeLocation>;

    /// Fill in the report with messages and source code labels.
    fn report(&self, report: &mut CliReport);

    fn severity(&self) -> Severity {
        Severity::Error
    }

    /// Returns a pretty-printable diagnostic.
    ///
    /// Provide a source map containing files that may be referenced by the diagnostic,
    /// normally [`ServiceDescriptor::sources`][crate::ServiceDescriptor::sources].
    fn to_diagnostic(self, sources: &SourceMap) -> Diagnostic<Self>
    where
        Self: Sized,
    {
        Diagnostic {
            sources: sources.clone(),
            error: self,
        }
    }
}

type MappedSpan = (FileId, Range<usize>);

/// Translate a byte-offset location into a char-offset location for use with ariadne.
fn map_span(sources: &SourceMap, location: NodeLocation) -> Option<MappedSpan> {
    let source = sources.get(&location.file_id)?;
    let mapped_source = source.mapped_source();
    let start = mapped_source.map_index(location.start);
    let end = mapped_source.map_index(location.end);
    Some((location.file_id, start..end))
}

/// Provide a [`std::io::Write`] API for a [`std::fmt::Formatter`].
struct WriteToFormatter<'a, 'b> {
    f: &'a mut fmt::Formatter<'b>,
}

impl io::Write for WriteToFormatter<'_, '_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = std::str::from_utf8(buf).map_err(|_| io::ErrorKind::Other)?;
        self.f.write_str(s).map_err(|_| io::ErrorKind::Other)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl CliReport {
    /// Returns a builder for creating diagnostic reports.
    pub fn builder(sources: SourceMap, location: Option<NodeLocation>, severity: Severity) -> Self {
        let (file_id, range) = location
            .and_then(|location| map_span(&sources, location))
            .unwrap_or((FileId::NONE, 0..0));
        let kind = match severity {
            Severity::Error => ReportKind::Error,
            Severity::Warning => ReportKind::Warning,
        };
        Self {
            sources,
            colors: ColorGenerator::new(),
            report: ariadne::Report::build(kind, file_id, range.start),
        }
    }

    fn with_color(self, color: Color) -> Self {
        let enable_color = match color {
            Color::Never => false,
            // ariadne's `auto-color` feature only enables colors if stderr is a terminal
            Color::StderrIsTerminal => true,
        };
        let config = ariadne::Config::default().with_color(enable_color);
        Self {
            report: self.report.with_config(config),
            ..self
        }
    }

    /// Set the main message for the report.
    pub fn with_message(&mut self, message: impl ToString) {
        self.report.set_message(message);
    }

    /// Set the help message for the report, usually a suggestion on how to fix the error.
    pub fn with_help(&mut self, help: impl ToString) {
        self.report.set_help(help);
    }

    /// Add a label at a given location. If the location is `None`, the message is discarded.
    pub fn with_label_opt(&mut self, location: Option<NodeLocation>, message: impl ToString) {
        if let Some(mapped_span) = location.and_then(|location| map_span(&self.sources, location)) {
            self.report.add_label(
                ariadne::Label::new(mapped_span)
                    .with_message(message)
                    .with_color(self.colors.next()),
            );
        }
    }

    /// Write the report to a [`Write`].
    ///
    /// [`Write`]: std::io::Write
    pub fn write(self, w: impl std::io::Write) -> std::io::Result<()> {
        let report = self.report.finish();
        report.write(Cache(&self.sources), w)
    }

    /// Write the report to a [`fmt::Formatter`].
    pub fn fmt(self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write(WriteToFormatter { f }).map_err(|_| fmt::Error)
    }
}

struct Cache<'a>(&'a SourceMap);

impl ariadne::Cache<FileId> for Cache<'_> {
    fn fetch(&mut self, file_id: &FileId) -> Result<&ariadne::Source, Box<dyn fmt::Debug + '_>> {
        struct NotFound(FileId);
        impl fmt::Debug for NotFound {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "source file not found: {:?}", self.0)
            }
        }
        if let Some(source_file) = self.0.get(file_id) {
            Ok(source_file.ariadne())
        } else if *file_id == FileId::NONE {
            static EMPTY: OnceLock<ariadne::Source> = OnceLock::new();
            Ok(EMPTY.get_or_init(|| ariadne::Source::from("")))
        } else {
            Err(Box::new(NotFound(*file_id)))
        }
    }

    fn display<'a>(&self, file_id: &'a FileId) -> Option<Box<dyn fmt::Display + 'a>> {
        if *file_id != FileId::NONE {
            struct Path(Arc<SourceFile>);
            impl fmt::Display for Path {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    self.0.path().display().fmt(f)
                }
            }
            let source_file = self.0.get(file_id)?;
            Some(Box::new(Path(source_file.clone())))
        } else {
            struct NoSourceFile;
            impl fmt::Display for NoSourceFile {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str("(no source file)")
                }
            }
            Some(Box::new(NoSourceFile))
        }
    }
}

impl<T> std::ops::Deref for Diagnostic<T> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        &self.error
    }
}

impl<T: ToDiagnostic> Diagnostic<T> {
    /// Get the line and column number where this diagnostic was raised.
    pub fn get_line_column(&self) -> Option<LineColumn> {
        self.error.location()?.line_column(&self.sources)
    }

    fn report(&self, color: Color) -> CliReport {
        let mut report = CliReport::builder(
            self.sources.clone(),
            self.error.location(),
            self.error.severity(),
        )
        .with_color(color);
        self.error.report(&mut report);
        report
    }

    /// Pretty-print the diagnostic to a [`Write`].
    ///
    /// [`Write`]: std::io::Write
    pub fn write(&self, color: Color, w: impl std::io::Write) -> std::io::Result<()> {
        self.report(color).write(w)
    }
}

impl<T: ToDiagnostic> fmt::Debug for Diagnostic<T> {
    /// Pretty-format the diagnostic, with colors for the CLI.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.report(Color::StderrIsTerminal).fmt(f)
    }
}

impl<T: ToDiagnostic> fmt::Display for Diagnostic<T> {
    /// Pretty-format the diagnostic without colors.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.report(Color::Never).fmt(f)
    }
}

macro_rules! diagnostic_codes {
    ($($variant: ident => $code: literal,)*) => {
        /// Stable identifier of a validation defect.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum DiagnosticCode {
            $($variant,)*
        }

        impl DiagnosticCode {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $code,)*
                }
            }
        }
    };
}

diagnostic_codes! {
    // output side
    InvalidFieldName => "INVALID_FIELD_NAME",
    InvalidUseOfReservedResourcePath => "INVALID_USE_OF_RESERVED_RESOURCE_PATH",
    InvalidUseOfReservedRemoteMethodName => "INVALID_USE_OF_RESERVED_REMOTE_METHOD_NAME",
    InvalidRootResourceAccessor => "INVALID_ROOT_RESOURCE_ACCESSOR",
    InvalidResourceFunctionAccessor => "INVALID_RESOURCE_FUNCTION_ACCESSOR",
    InvalidFunction => "INVALID_FUNCTION",
    MissingResourceFunctions => "MISSING_RESOURCE_FUNCTIONS",
    InvalidReturnType => "INVALID_RETURN_TYPE",
    InvalidReturnTypeNil => "INVALID_RETURN_TYPE_NIL",
    InvalidReturnTypeError => "INVALID_RETURN_TYPE_ERROR",
    InvalidReturnTypeErrorOrNil => "INVALID_RETURN_TYPE_ERROR_OR_NIL",
    InvalidReturnTypeAny => "INVALID_RETURN_TYPE_ANY",
    InvalidReturnTypeInputObject => "INVALID_RETURN_TYPE_INPUT_OBJECT",
    InvalidReturnTypeClass => "INVALID_RETURN_TYPE_CLASS",
    InvalidSubscribeResourceReturnType => "INVALID_SUBSCRIBE_RESOURCE_RETURN_TYPE",
    InvalidAnonymousFieldType => "INVALID_ANONYMOUS_FIELD_TYPE",
    InvalidUnionMemberType => "INVALID_UNION_MEMBER_TYPE",
    InvalidUseOfReservedTypeAsOutputType => "INVALID_USE_OF_RESERVED_TYPE_AS_OUTPUT_TYPE",
    NonDistinctInterface => "NON_DISTINCT_INTERFACE",
    NonDistinctInterfaceImplementation => "NON_DISTINCT_INTERFACE_IMPLEMENTATION",
    InvalidHierarchicalResourcePath => "INVALID_HIERARCHICAL_RESOURCE_PATH",
    InvalidResourcePath => "INVALID_RESOURCE_PATH",
    UnsupportedPrimitiveTypeAlias => "UNSUPPORTED_PRIMITIVE_TYPE_ALIAS",
    // input side
    InvalidAnonymousInputType => "INVALID_ANONYMOUS_INPUT_TYPE",
    InvalidInputParameterType => "INVALID_INPUT_PARAMETER_TYPE",
    InvalidInputType => "INVALID_INPUT_TYPE",
    InvalidInputTypeUnion => "INVALID_INPUT_TYPE_UNION",
    InvalidResourceInputObjectParam => "INVALID_RESOURCE_INPUT_OBJECT_PARAM",
    InvalidDirectiveInputObjectParam => "INVALID_DIRECTIVE_INPUT_OBJECT_PARAM",
    InvalidUseOfReservedTypeAsInputType => "INVALID_USE_OF_RESERVED_TYPE_AS_INPUT_TYPE",
    InvalidFileUploadInResourceFunction => "INVALID_FILE_UPLOAD_IN_RESOURCE_FUNCTION",
    MultiDimensionalUploadArray => "MULTI_DIMENSIONAL_UPLOAD_ARRAY",
    InvalidFileUploadInDirective => "INVALID_FILE_UPLOAD_IN_DIRECTIVE",
    InvalidAnonymousInputTypeInDirective => "INVALID_ANONYMOUS_INPUT_TYPE_IN_DIRECTIVE",
    InvalidInputParameterTypeInDirective => "INVALID_INPUT_PARAMETER_TYPE_IN_DIRECTIVE",
    InvalidInputTypeInDirective => "INVALID_INPUT_TYPE_IN_DIRECTIVE",
    InvalidInputTypeUnionInDirective => "INVALID_INPUT_TYPE_UNION_IN_DIRECTIVE",
    // directives
    DirectiveTypeInclusionNotFound => "DIRECTIVE_TYPE_INCLUSION_NOT_FOUND_IN_DIRECTIVE_SERVICE_CLASS",
    DirectiveConfigNotFound => "DIRECTIVE_CONFIG_NOT_FOUND_IN_DIRECTIVE_SERVICE_CLASS",
    InvalidDirectiveName => "INVALID_DIRECTIVE_NAME",
    DirectiveNameAlreadyInUse => "DIRECTIVE_NAME_ALREADY_IN_USE",
    InvalidResourceMethodInsideDirective => "INVALID_RESOURCE_METHOD_INSIDE_DIRECTIVE",
    InvalidRemoteMethodInsideDirective => "INVALID_REMOTE_METHOD_INSIDE_DIRECTIVE",
    RemoteMethodWithInvalidParameters => "REMOTE_METHOD_WITH_INVALID_PARAMETERS_FOUND_IN_DIRECTIVE",
    RemoteMethodWithInvalidReturnType => "REMOTE_METHOD_WITH_INVALID_RETURN_TYPE_FOUND_IN_DIRECTIVE",
    InvalidInitMethodReturnType => "INVALID_INIT_METHOD_RETURN_TYPE_FOUND_IN_DIRECTIVE",
    OnFieldMustContainValue => "ON_FIELD_MUST_CONTAIN_LEAST_ONE_VALUE_IN_DIRECTIVE_CONFIG",
    DirectiveLocationNotSupported => "DIRECTIVE_LOCATION_NOT_SUPPORTED",
    NoRemoteMethodForOnFieldValue => "NO_REMOTE_METHOD_FOUND_FOR_ON_FIELD_VALUE",
    NoOnFieldForRemoteMethod => "NO_ON_FIELD_FOUND_FOR_DIRECTIVE_REMOTE_METHOD",
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One defect found by a validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticData {
    pub code: DiagnosticCode,
    pub severity: Severity,
    pub message: String,
    pub location: Option<NodeLocation>,
    pub help: Option<String>,
}

impl ToDiagnostic for DiagnosticData {
    fn location(&self) -> Option<NodeLocation> {
        self.location
    }

    fn report(&self, report: &mut CliReport) {
        report.with_message(format_args!("[{}] {}", self.code, self.message));
        report.with_label_opt(self.location, &self.message);
        if let Some(help) = &self.help {
            report.with_help(help);
        }
    }

    fn severity(&self) -> Severity {
        self.severity
    }
}

/// Every defect found in one validation pass.
#[derive(Clone)]
pub struct DiagnosticList {
    pub sources: SourceMap,
    diagnostics: Vec<DiagnosticData>,
}

impl DiagnosticList {
    pub fn new(sources: SourceMap) -> Self {
        Self {
            sources,
            diagnostics: Vec::new(),
        }
    }

    pub fn push(&mut self, code: DiagnosticCode, location: Option<NodeLocation>, message: impl Into<String>) {
        self.push_data(DiagnosticData {
            code,
            severity: Severity::Error,
            message: message.into(),
            location,
            help: None,
        })
    }

    pub fn push_warning(
        &mut self,
        code: DiagnosticCode,
        location: Option<NodeLocation>,
        message: impl Into<String>,
    ) {
        self.push_data(DiagnosticData {
            code,
            severity: Severity::Warning,
            message: message.into(),
            location,
            help: None,
        })
    }

    pub fn push_data(&mut self, data: DiagnosticData) {
        tracing::trace!(code = %data.code, "{}", data.message);
        self.diagnostics.push(data)
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    pub fn iter(&self) -> impl Iterator<Item = Diagnostic<&DiagnosticData>> + '_ {
        self.diagnostics
            .iter()
            .map(|data| data.to_diagnostic(&self.sources))
    }

    pub fn data(&self) -> &[DiagnosticData] {
        &self.diagnostics
    }

    /// Codes of all diagnostics, in the order they were found
    pub fn codes(&self) -> Vec<DiagnosticCode> {
        self.diagnostics.iter().map(|d| d.code).collect()
    }

    pub fn merge(&mut self, other: DiagnosticList) {
        self.diagnostics.extend(other.diagnostics)
    }
}

impl<T: ToDiagnostic> ToDiagnostic for &T {
    fn location(&self) -> Option<NodeLocation> {
        ToDiagnostic::location(*self)
    }

    fn report(&self, report: &mut CliReport) {
        ToDiagnostic::report(*self, report)
    }

    fn severity(&self) -> Severity {
        ToDiagnostic::severity(*self)
    }
}

impl fmt::Display for DiagnosticList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for diagnostic in self.iter() {
            fmt::Display::fmt(&diagnostic, f)?
        }
        Ok(())
    }
}

impl fmt::Debug for DiagnosticList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for diagnostic in self.iter() {
            fmt::Debug::fmt(&diagnostic, f)?
        }
        Ok(())
    }
}

impl std::error::Error for DiagnosticList {}
