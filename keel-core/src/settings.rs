//! Project-wide settings
//!
//! Defaults every stage of a project shares: the id prefix, the VCS root,
//! default build tool arguments and default environment parameters. Passed
//! explicitly into stage assembly instead of being applied as ambient state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::arguments::BuildToolArgs;
use crate::domain::stage::{StageDescriptor, StageParams};
use crate::error::ValidationError;

/// Settings applied to every stage of a project
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSettings {
    pub project_prefix: String,
    pub vcs_root: Option<String>,
    #[serde(default)]
    pub build_tool_args: BuildToolArgs,
    #[serde(default)]
    pub default_params: BTreeMap<String, String>,
}

impl ProjectSettings {
    pub fn new(project_prefix: impl Into<String>) -> Self {
        Self {
            project_prefix: project_prefix.into(),
            ..Default::default()
        }
    }

    pub fn with_vcs_root(mut self, vcs_root: impl Into<String>) -> Self {
        self.vcs_root = Some(vcs_root.into());
        self
    }

    pub fn with_build_tool_args(mut self, args: impl Into<BuildToolArgs>) -> Self {
        self.build_tool_args = args.into();
        self
    }

    pub fn with_default_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_params.insert(name.into(), value.into());
        self
    }

    /// Stable id of the stage named `name` in this project
    pub fn stage_id(&self, name: &str) -> String {
        format!("{}{}", self.project_prefix, name.trim())
    }

    /// Assemble a stage with the project defaults applied
    ///
    /// - default parameters are added unless the stage sets the same name
    /// - default build tool arguments come before each step's own arguments,
    ///   then the step's exclusions are applied
    /// - the VCS root is attached to the descriptor
    pub fn stage(&self, mut params: StageParams) -> Result<StageDescriptor, ValidationError> {
        for (name, value) in &self.default_params {
            params
                .environment_params
                .entry(name.clone())
                .or_insert_with(|| value.clone());
        }

        StageDescriptor::assemble(
            &self.project_prefix,
            params,
            self.vcs_root.clone(),
            &self.build_tool_args,
        )
    }
}
