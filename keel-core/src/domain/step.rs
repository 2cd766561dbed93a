//! Step domain types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::arguments::BuildToolArgs;
use crate::error::ValidationError;

/// When a step runs relative to the outcome of the steps before it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Run only if every prior step of the stage succeeded
    #[default]
    NormalIfPriorStepsSucceeded,
    /// Run regardless of prior step outcomes (cleanup, checks)
    Always,
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::NormalIfPriorStepsSucceeded => "default",
            ExecutionMode::Always => "always",
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" | "normal" | "normal_if_prior_steps_succeeded" => {
                Ok(ExecutionMode::NormalIfPriorStepsSucceeded)
            }
            "always" => Ok(ExecutionMode::Always),
            _ => Err(ValidationError::UnknownExecutionMode(s.to_string())),
        }
    }
}

/// Variant-specific payload of a step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepKind {
    /// Invoke the build tool with a task list
    RunBuildTool {
        tasks: Vec<String>,
        #[serde(default)]
        arguments: BuildToolArgs,
        /// Argument sequences stripped from the effective arguments,
        /// including project-wide defaults
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        excluded_arguments: Vec<BuildToolArgs>,
        #[serde(default)]
        use_wrapper: bool,
    },
    /// Run a script body in the target shell
    RunScript { body: String },
}

/// One executable action within a stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDescriptor {
    pub name: String,
    #[serde(default)]
    pub mode: ExecutionMode,
    #[serde(flatten)]
    pub kind: StepKind,
}

impl StepDescriptor {
    /// Build tool step running whitespace-separated `tasks`
    pub fn build_tool(name: impl Into<String>, tasks: &str) -> Self {
        Self {
            name: name.into(),
            mode: ExecutionMode::default(),
            kind: StepKind::RunBuildTool {
                tasks: tasks.split_whitespace().map(str::to_string).collect(),
                arguments: BuildToolArgs::new(),
                excluded_arguments: Vec::new(),
                use_wrapper: false,
            },
        }
    }

    pub fn script(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mode: ExecutionMode::default(),
            kind: StepKind::RunScript { body: body.into() },
        }
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set extra arguments; ignored for script steps
    pub fn with_arguments(mut self, args: impl Into<BuildToolArgs>) -> Self {
        if let StepKind::RunBuildTool { arguments, .. } = &mut self.kind {
            *arguments = args.into();
        }
        self
    }

    /// Strip `sequence` from the effective arguments; ignored for script steps
    pub fn excluding_arguments(mut self, sequence: impl Into<BuildToolArgs>) -> Self {
        if let StepKind::RunBuildTool {
            excluded_arguments, ..
        } = &mut self.kind
        {
            excluded_arguments.push(sequence.into());
        }
        self
    }

    /// Run through the build tool's wrapper script; ignored for script steps
    pub fn with_wrapper(mut self, wrapper: bool) -> Self {
        if let StepKind::RunBuildTool { use_wrapper, .. } = &mut self.kind {
            *use_wrapper = wrapper;
        }
        self
    }

    /// Whether the engine should run this step given the outcome so far
    pub fn should_run(&self, prior_failed: bool) -> bool {
        match self.mode {
            ExecutionMode::Always => true,
            ExecutionMode::NormalIfPriorStepsSucceeded => !prior_failed,
        }
    }

    pub fn is_build_tool(&self) -> bool {
        matches!(self.kind, StepKind::RunBuildTool { .. })
    }

    /// Task list of a build tool step
    pub fn tasks(&self) -> Option<&[String]> {
        match &self.kind {
            StepKind::RunBuildTool { tasks, .. } => Some(tasks),
            StepKind::RunScript { .. } => None,
        }
    }

    /// Extra arguments of a build tool step
    pub fn arguments(&self) -> Option<&BuildToolArgs> {
        match &self.kind {
            StepKind::RunBuildTool { arguments, .. } => Some(arguments),
            StepKind::RunScript { .. } => None,
        }
    }

    pub(crate) fn validate(&self, stage: &str, index: usize) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyStepName {
                stage: stage.to_string(),
                index,
            });
        }

        match &self.kind {
            StepKind::RunBuildTool { tasks, .. } if tasks.is_empty() => {
                Err(ValidationError::NoTasks {
                    stage: stage.to_string(),
                    step: self.name.clone(),
                })
            }
            StepKind::RunScript { body } if body.trim().is_empty() => {
                Err(ValidationError::EmptyScript {
                    stage: stage.to_string(),
                    step: self.name.clone(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Fold project-wide default arguments in and apply exclusions
    pub(crate) fn resolve_arguments(&mut self, defaults: &BuildToolArgs) {
        if let StepKind::RunBuildTool {
            arguments,
            excluded_arguments,
            ..
        } = &mut self.kind
        {
            let mut effective = defaults.concat(arguments);
            for excluded in excluded_arguments.iter() {
                effective = effective.without(excluded);
            }
            *arguments = effective;
        }
    }
}
