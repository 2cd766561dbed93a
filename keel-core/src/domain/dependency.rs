//! Stage dependency types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// What a downstream stage does when an upstream stage fails or is cancelled
///
/// Interpreted by the pipeline engine before it starts the downstream stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Run the downstream stage as if nothing happened
    Continue,
    /// Cancel the downstream stage
    Cancel,
    /// Stop the downstream stage and mark it failed
    Stop,
    /// Run the downstream stage, but report a problem on it
    #[default]
    AddProblem,
}

impl FailurePolicy {
    pub const ALL: [FailurePolicy; 4] = [
        FailurePolicy::Continue,
        FailurePolicy::Cancel,
        FailurePolicy::Stop,
        FailurePolicy::AddProblem,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FailurePolicy::Continue => "continue",
            FailurePolicy::Cancel => "cancel",
            FailurePolicy::Stop => "stop",
            FailurePolicy::AddProblem => "add_problem",
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailurePolicy {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "continue" => Ok(FailurePolicy::Continue),
            "cancel" => Ok(FailurePolicy::Cancel),
            "stop" => Ok(FailurePolicy::Stop),
            "add_problem" | "addproblem" => Ok(FailurePolicy::AddProblem),
            _ => Err(ValidationError::UnknownPolicy(s.to_string())),
        }
    }
}

/// Dependency of a stage on an upstream stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencySpec {
    pub upstream_id: String,
    #[serde(default)]
    pub on_failure: FailurePolicy,
    #[serde(default)]
    pub on_cancel: FailurePolicy,
}

impl DependencySpec {
    pub fn new(
        upstream_id: impl Into<String>,
        on_failure: FailurePolicy,
        on_cancel: FailurePolicy,
    ) -> Self {
        Self {
            upstream_id: upstream_id.into().trim().to_string(),
            on_failure,
            on_cancel,
        }
    }
}

/// Trim upstream ids and collapse duplicates, last write wins
pub(crate) fn merge(dependencies: Vec<DependencySpec>) -> Vec<DependencySpec> {
    let mut merged = Vec::with_capacity(dependencies.len());
    for mut dependency in dependencies {
        dependency.upstream_id = dependency.upstream_id.trim().to_string();
        upsert(&mut merged, dependency);
    }
    merged
}

/// Insert a dependency, replacing the policies of an existing entry for the
/// same upstream id in place.
pub(crate) fn upsert(dependencies: &mut Vec<DependencySpec>, dependency: DependencySpec) {
    match dependencies
        .iter_mut()
        .find(|d| d.upstream_id == dependency.upstream_id)
    {
        Some(existing) => *existing = dependency,
        None => dependencies.push(dependency),
    }
}
