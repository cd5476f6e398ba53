#![doc = include_str!("../README.md")]

pub mod descriptor;
pub mod diagnostic;
pub mod finder;
pub mod generator;
mod name;
pub mod schema;
pub mod sdl;
pub mod sources;
pub mod type_creator;
pub mod validation;

pub use self::descriptor::ServiceDescriptor;
pub use self::diagnostic::DiagnosticList;
pub use self::generator::generate_schema;
pub use self::generator::GeneratorConfig;
pub use self::generator::SchemaGenerator;
pub use self::name::InvalidNameError;
pub use self::name::Name;
pub use self::schema::codec::DecodeError;
pub use self::schema::codec::EncodeError;
pub use self::schema::Schema;
pub use self::sdl::print_sdl;
pub use self::sources::NodeLocation;
pub use self::sources::SourceMap;
