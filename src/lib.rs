//! Interpreter for CSV and RW route description files.
//!
//! A load runs in three stages: the preprocessor expands includes and
//! conditionals, the lexer turns lines into expressions, and every expression
//! is resolved against the command registry and applied to a [`RouteData`]
//! accumulator. [`builder::build_world`] then walks the accumulated blocks to
//! produce track geometry, placed objects and events.

pub mod builder;
pub mod diagnostics;
pub mod dsl;
pub mod error;
pub mod import;
pub mod loader;
pub mod model;
pub mod paths;
pub mod registry;
pub mod settings;

pub use builder::{build_world, World};
pub use diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink, Diagnostics};
pub use dsl::{load_route, parse_route_text, preview_route, LoadedRoute, RouteSummary};
pub use error::RouteError;
pub use loader::{FsLoader, ResourceLoader};
pub use model::RouteData;
pub use settings::RouteSettings;
