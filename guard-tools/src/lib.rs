//! Tool catalog, schema validation, and reference checking.
//!
//! The modules exposed here load tool definitions into an immutable,
//! atomically reloadable registry, validate proposed argument maps against a
//! tool's declared interface, and flag references to tools that do not exist.

#![warn(missing_docs, clippy::pedantic)]

pub mod catalog;
pub mod definition;
pub mod reference;
pub mod registry;
pub mod scanner;
pub mod validator;

pub use definition::{ParameterSpec, ToolDefinition, TypeTag, ValuePattern};
pub use reference::{ReferenceChecker, UnknownTool};
pub use registry::{Catalog, ToolError, ToolRegistry, ToolResult};
pub use scanner::{CallSite, ScanDialect, ScanError};
pub use validator::{SchemaViolation, ValidationResult, validate, validate_all};
