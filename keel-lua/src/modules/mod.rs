//! Modules available to definition files
//!
//! Each module is generic over where its data comes from, so the CLI and
//! tests can plug in their own sources.

pub mod env;
pub mod log;
pub mod project;

pub use env::{EnvModule, VarProvider};
pub use log::{LogLevel, LogModule, LogSink, TracingSink};
pub use project::ProjectModule;
