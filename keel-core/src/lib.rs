//! Keel Core
//!
//! Core types for describing CI build stages.
//!
//! This crate contains:
//! - Domain types: stage and step descriptors, dependencies, failure policies
//! - Project settings applied to every stage of a project
//! - Pipeline-level validation (unique ids, resolvable upstreams, no cycles)
//!
//! Nothing here schedules or executes anything. Descriptors are assembled
//! once, validated, and handed read-only to whatever engine runs them.

pub mod domain;
pub mod error;
pub mod pipeline;
pub mod settings;

pub use domain::arguments::BuildToolArgs;
pub use domain::dependency::{DependencySpec, FailurePolicy};
pub use domain::stage::{StageDescriptor, StageParams};
pub use domain::step::{ExecutionMode, StepDescriptor, StepKind};
pub use error::{PipelineError, ValidationError};
pub use pipeline::Pipeline;
pub use settings::ProjectSettings;
