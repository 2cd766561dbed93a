//! Keel Lua Definitions
//!
//! Stage definitions for Keel are written in Lua. This crate provides:
//! - A restricted sandbox with the `pipeline` helper module
//! - Module trait and registry for the optional `project`, `log` and `env` modules
//! - Parsing of definition files into validated stage descriptors
//! - LuaLS stub generation for editor support

pub mod module;
pub mod modules;
pub mod parser;
pub mod sandbox;

pub use module::{KeelModule, ModuleMetadata, ModuleRegistry};
pub use modules::{EnvModule, LogModule, LogSink, ProjectModule, TracingSink, VarProvider};
pub use parser::{definition_registry, load_pipeline, parse_stages, parse_stages_with};
pub use sandbox::{PIPELINE_STUBS, create_definition_sandbox};
