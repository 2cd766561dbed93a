//! Error types for stage and pipeline definitions

use thiserror::Error;

/// A stage definition that cannot be turned into a descriptor.
///
/// Raised while a single stage is assembled; only covers conditions that can
/// be checked without knowing the rest of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("stage name must not be empty")]
    EmptyName,

    #[error("stage id '{id}' does not end with its name '{name}'")]
    IdMismatch { id: String, name: String },

    #[error("stage '{stage}' must have at least one step")]
    NoSteps { stage: String },

    #[error("step #{index} of stage '{stage}' has an empty name")]
    EmptyStepName { stage: String, index: usize },

    #[error("build tool step '{step}' of stage '{stage}' has no tasks")]
    NoTasks { stage: String, step: String },

    #[error("script step '{step}' of stage '{stage}' has an empty body")]
    EmptyScript { stage: String, step: String },

    #[error("stage '{stage}' declares a parameter with an empty name")]
    EmptyParameterName { stage: String },

    #[error("stage '{stage}' declares a dependency with an empty upstream id")]
    EmptyUpstream { stage: String },

    #[error("stage '{stage}' cannot depend on itself")]
    SelfDependency { stage: String },

    #[error("unknown failure policy '{0}' (expected continue, cancel, stop or add_problem)")]
    UnknownPolicy(String),

    #[error("unknown execution mode '{0}' (expected default or always)")]
    UnknownExecutionMode(String),
}

/// A set of stages that does not form a valid pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("pipeline has no stages")]
    Empty,

    #[error("stage id '{id}' is defined more than once")]
    DuplicateStage { id: String },

    #[error("stage '{stage}' depends on unknown stage '{upstream}'")]
    UnknownUpstream { stage: String, upstream: String },

    #[error("dependency cycle between stages: {}", stages.join(", "))]
    Cycle { stages: Vec<String> },

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

impl PipelineError {
    /// Check if this error concerns the dependency graph rather than a single stage
    pub fn is_graph_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownUpstream { .. } | Self::Cycle { .. } | Self::DuplicateStage { .. }
        )
    }
}
