//! Stage domain types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::domain::arguments::BuildToolArgs;
use crate::domain::dependency::{self, DependencySpec, FailurePolicy};
use crate::domain::parameter;
use crate::domain::step::StepDescriptor;
use crate::error::ValidationError;

/// Input for assembling a stage
///
/// Mutable while the definition is being put together; sealed into a
/// [`StageDescriptor`] by [`StageDescriptor::build`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageParams {
    pub name: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub environment_params: BTreeMap<String, String>,
    pub steps: Vec<StepDescriptor>,
    pub dependencies: Vec<DependencySpec>,
}

impl StageParams {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment_params.insert(name.into(), value.into());
        self
    }

    pub fn step(mut self, step: StepDescriptor) -> Self {
        self.steps.push(step);
        self
    }

    pub fn dependency(
        mut self,
        upstream_id: impl Into<String>,
        on_failure: FailurePolicy,
        on_cancel: FailurePolicy,
    ) -> Self {
        self.add_dependency(upstream_id, on_failure, on_cancel);
        self
    }

    /// Append a dependency triple
    ///
    /// Adding the same upstream id again replaces the earlier policies and
    /// keeps the original position.
    pub fn add_dependency(
        &mut self,
        upstream_id: impl Into<String>,
        on_failure: FailurePolicy,
        on_cancel: FailurePolicy,
    ) -> &mut Self {
        dependency::upsert(
            &mut self.dependencies,
            DependencySpec::new(upstream_id, on_failure, on_cancel),
        );
        self
    }
}

/// Immutable description of one build stage
///
/// Structure consumed by the pipeline engine: the engine applies
/// `parameters` to the environment of every step, runs `steps` in order and
/// honours the policies of each dependency before starting the stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StageRecord")]
pub struct StageDescriptor {
    id: String,
    name: String,
    display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    vcs_root: Option<String>,
    parameters: BTreeMap<String, String>,
    steps: Vec<StepDescriptor>,
    dependencies: Vec<DependencySpec>,
}

impl StageDescriptor {
    /// Assemble and validate a stage
    ///
    /// The id is `project_prefix` followed by the stage name. Upstream ids
    /// are not resolved here; see [`crate::Pipeline`].
    ///
    /// # Errors
    /// Returns a [`ValidationError`] if:
    /// - the name is empty
    /// - there are no steps, or a step is malformed
    /// - a parameter name is empty
    /// - a dependency has an empty upstream id or points at this stage
    pub fn build(project_prefix: &str, params: StageParams) -> Result<Self, ValidationError> {
        Self::assemble(project_prefix, params, None, &BuildToolArgs::new())
    }

    pub(crate) fn assemble(
        project_prefix: &str,
        params: StageParams,
        vcs_root: Option<String>,
        default_arguments: &BuildToolArgs,
    ) -> Result<Self, ValidationError> {
        let name = params.name.trim().to_string();
        if name.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        let id = format!("{}{}", project_prefix, name);

        let mut steps = params.steps;
        for step in steps.iter_mut() {
            step.resolve_arguments(default_arguments);
        }

        let stage = Self {
            display_name: params.display_name.unwrap_or_else(|| name.clone()),
            id,
            name,
            description: params.description,
            vcs_root,
            parameters: params.environment_params,
            steps,
            dependencies: dependency::merge(params.dependencies),
        };
        stage.check()?;

        debug!(
            stage = %stage.id,
            steps = stage.steps.len(),
            dependencies = stage.dependencies.len(),
            "Built stage descriptor"
        );
        Ok(stage)
    }

    /// Invariants shared by [`StageDescriptor::build`] and JSON reload
    fn check(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() || self.id.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if !self.id.ends_with(&self.name) {
            return Err(ValidationError::IdMismatch {
                id: self.id.clone(),
                name: self.name.clone(),
            });
        }

        if self.steps.is_empty() {
            return Err(ValidationError::NoSteps {
                stage: self.id.clone(),
            });
        }
        for (index, step) in self.steps.iter().enumerate() {
            step.validate(&self.id, index)?;
        }

        if self.parameters.keys().any(|k| k.trim().is_empty()) {
            return Err(ValidationError::EmptyParameterName {
                stage: self.id.clone(),
            });
        }

        for dep in &self.dependencies {
            if dep.upstream_id.is_empty() {
                return Err(ValidationError::EmptyUpstream {
                    stage: self.id.clone(),
                });
            }
            if dep.upstream_id == self.id {
                return Err(ValidationError::SelfDependency {
                    stage: self.id.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn vcs_root(&self) -> Option<&str> {
        self.vcs_root.as_deref()
    }

    pub fn parameters(&self) -> &BTreeMap<String, String> {
        &self.parameters
    }

    pub fn steps(&self) -> &[StepDescriptor] {
        &self.steps
    }

    pub fn dependencies(&self) -> &[DependencySpec] {
        &self.dependencies
    }

    pub fn dependency(&self, upstream_id: &str) -> Option<&DependencySpec> {
        self.dependencies
            .iter()
            .find(|d| d.upstream_id == upstream_id)
    }

    /// Every `%name%` referenced by a parameter value, deduplicated
    pub fn parameter_references(&self) -> Vec<&str> {
        let mut refs: Vec<&str> = self
            .parameters
            .values()
            .flat_map(|v| parameter::references(v))
            .collect();
        refs.sort_unstable();
        refs.dedup();
        refs
    }
}

/// Serialized form of a descriptor, re-validated on load
#[derive(Deserialize)]
struct StageRecord {
    id: String,
    name: String,
    display_name: Option<String>,
    description: Option<String>,
    vcs_root: Option<String>,
    #[serde(default)]
    parameters: BTreeMap<String, String>,
    steps: Vec<StepDescriptor>,
    #[serde(default)]
    dependencies: Vec<DependencySpec>,
}

impl TryFrom<StageRecord> for StageDescriptor {
    type Error = ValidationError;

    fn try_from(record: StageRecord) -> Result<Self, Self::Error> {
        let stage = Self {
            display_name: record.display_name.unwrap_or_else(|| record.name.clone()),
            id: record.id.trim().to_string(),
            name: record.name,
            description: record.description,
            vcs_root: record.vcs_root,
            parameters: record.parameters,
            steps: record.steps,
            dependencies: dependency::merge(record.dependencies),
        };
        stage.check()?;
        Ok(stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::step::{ExecutionMode, StepKind};

    fn colony_params() -> StageParams {
        StageParams::new("ColonyCompatibility")
            .display_name("Colony Compatibility")
            .description("Check Gradle against latest development version of Colony")
            .param("env.JAVA_HOME", "%linux.java8.oracle.64bit%")
            .step(StepDescriptor::build_tool("GRADLE_RUNNER", "clean test").with_wrapper(true))
            .step(
                StepDescriptor::script("CHECK_CLEAN_M2", "test ! -d ~/.m2")
                    .with_mode(ExecutionMode::Always),
            )
            .dependency(
                "Check_Stage3_Passes",
                FailurePolicy::Cancel,
                FailurePolicy::Cancel,
            )
    }

    #[test]
    fn test_colony_compatibility_stage() {
        let stage = StageDescriptor::build("Check_", colony_params()).unwrap();

        assert_eq!(stage.id(), "Check_ColonyCompatibility");
        assert_eq!(stage.name(), "ColonyCompatibility");
        assert_eq!(stage.display_name(), "Colony Compatibility");
        assert_eq!(stage.steps().len(), 2);
        assert_eq!(stage.steps()[1].mode, ExecutionMode::Always);
        assert_eq!(
            stage.dependencies(),
            &[DependencySpec::new(
                "Check_Stage3_Passes",
                FailurePolicy::Cancel,
                FailurePolicy::Cancel
            )]
        );
        assert_eq!(
            stage.parameters().get("env.JAVA_HOME").map(String::as_str),
            Some("%linux.java8.oracle.64bit%")
        );
    }

    #[test]
    fn test_id_is_prefix_plus_name() {
        for prefix in ["", "Check_", "Gradle_Check_", "x"] {
            let stage = StageDescriptor::build(prefix, colony_params()).unwrap();
            assert_eq!(stage.id(), format!("{}ColonyCompatibility", prefix));
        }
    }

    #[test]
    fn test_steps_keep_input_order() {
        let names = ["one", "two", "three", "four"];
        let mut params = StageParams::new("Ordered");
        for name in names {
            params = params.step(StepDescriptor::script(name, "true"));
        }

        let stage = StageDescriptor::build("P_", params).unwrap();
        let built: Vec<&str> = stage.steps().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(built, names);
    }

    #[test]
    fn test_empty_steps_rejected() {
        let params = StageParams::new("Empty").description("no steps");
        assert_eq!(
            StageDescriptor::build("P_", params),
            Err(ValidationError::NoSteps {
                stage: "P_Empty".to_string()
            })
        );
    }

    #[test]
    fn test_empty_name_rejected() {
        let params = StageParams::new("  ").step(StepDescriptor::script("s", "true"));
        assert_eq!(
            StageDescriptor::build("P_", params),
            Err(ValidationError::EmptyName)
        );
    }

    #[test]
    fn test_empty_parameter_name_rejected() {
        let params = StageParams::new("S")
            .param("", "value")
            .step(StepDescriptor::script("s", "true"));
        assert!(matches!(
            StageDescriptor::build("P_", params),
            Err(ValidationError::EmptyParameterName { .. })
        ));
    }

    #[test]
    fn test_self_dependency_rejected() {
        let params = StageParams::new("S")
            .step(StepDescriptor::script("s", "true"))
            .dependency("P_S", FailurePolicy::Cancel, FailurePolicy::Cancel);
        assert_eq!(
            StageDescriptor::build("P_", params),
            Err(ValidationError::SelfDependency {
                stage: "P_S".to_string()
            })
        );
    }

    #[test]
    fn test_duplicate_dependency_last_write_wins() {
        let mut params = colony_params();
        params.add_dependency("Check_Other", FailurePolicy::Stop, FailurePolicy::Stop);
        params.add_dependency(
            "Check_Stage3_Passes",
            FailurePolicy::Continue,
            FailurePolicy::AddProblem,
        );

        let stage = StageDescriptor::build("Check_", params).unwrap();
        assert_eq!(stage.dependencies().len(), 2);
        assert_eq!(stage.dependencies()[0].upstream_id, "Check_Stage3_Passes");
        let dep = stage.dependency("Check_Stage3_Passes").unwrap();
        assert_eq!(dep.on_failure, FailurePolicy::Continue);
        assert_eq!(dep.on_cancel, FailurePolicy::AddProblem);
    }

    #[test]
    fn test_duplicates_pushed_directly_are_merged() {
        let mut params = colony_params();
        params.dependencies.push(DependencySpec::new(
            "Check_Stage3_Passes",
            FailurePolicy::Stop,
            FailurePolicy::Continue,
        ));

        let stage = StageDescriptor::build("Check_", params).unwrap();
        assert_eq!(stage.dependencies().len(), 1);
        assert_eq!(stage.dependencies()[0].on_failure, FailurePolicy::Stop);
    }

    #[test]
    fn test_parameter_references() {
        let params = colony_params()
            .param("env.GRADLE_OPTS", "-Xmx%heap% -Djava.home=%linux.java8.oracle.64bit%");
        let stage = StageDescriptor::build("Check_", params).unwrap();
        assert_eq!(
            stage.parameter_references(),
            vec!["heap", "linux.java8.oracle.64bit"]
        );
    }

    #[test]
    fn test_display_name_defaults_to_name() {
        let params = StageParams::new("Quick").step(StepDescriptor::script("s", "true"));
        let stage = StageDescriptor::build("P_", params).unwrap();
        assert_eq!(stage.display_name(), "Quick");
        assert_eq!(stage.description(), None);
    }

    #[test]
    fn test_json_reload_is_validated() {
        let stage = StageDescriptor::build("Check_", colony_params()).unwrap();
        let json = serde_json::to_value(&stage).unwrap();
        let reloaded: StageDescriptor = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(reloaded, stage);

        let reject = |field: &str, value: serde_json::Value, message: &str| {
            let mut broken = json.clone();
            broken[field] = value;
            let err = serde_json::from_value::<StageDescriptor>(broken).unwrap_err();
            assert!(err.to_string().contains(message), "{}: {}", field, err);
        };

        reject("steps", serde_json::json!([]), "at least one step");
        reject(
            "parameters",
            serde_json::json!({ "": "x" }),
            "parameter with an empty name",
        );
        reject(
            "dependencies",
            serde_json::json!([{ "upstream_id": " " }]),
            "empty upstream id",
        );
        reject(
            "dependencies",
            serde_json::json!([{ "upstream_id": "Check_ColonyCompatibility" }]),
            "cannot depend on itself",
        );
        reject("id", serde_json::json!("Check_Other"), "does not end with");
    }

    #[test]
    fn test_padded_upstream_ids_are_trimmed() {
        let mut params = colony_params();
        params.add_dependency(
            " Check_Stage3_Passes ",
            FailurePolicy::Stop,
            FailurePolicy::Stop,
        );
        params.dependencies.push(DependencySpec {
            upstream_id: "Check_Other\t".to_string(),
            on_failure: FailurePolicy::Cancel,
            on_cancel: FailurePolicy::Cancel,
        });

        let stage = StageDescriptor::build("Check_", params).unwrap();
        let ids: Vec<&str> = stage
            .dependencies()
            .iter()
            .map(|d| d.upstream_id.as_str())
            .collect();
        assert_eq!(ids, vec!["Check_Stage3_Passes", "Check_Other"]);
        assert_eq!(stage.dependencies()[0].on_failure, FailurePolicy::Stop);

        let padded_self = StageParams::new("S")
            .step(StepDescriptor::script("s", "true"))
            .dependency(" P_S", FailurePolicy::Cancel, FailurePolicy::Cancel);
        assert_eq!(
            StageDescriptor::build("P_", padded_self),
            Err(ValidationError::SelfDependency {
                stage: "P_S".to_string()
            })
        );
    }

    #[test]
    fn test_build_tool_payload_survives() {
        let stage = StageDescriptor::build("Check_", colony_params()).unwrap();
        match &stage.steps()[0].kind {
            StepKind::RunBuildTool {
                tasks, use_wrapper, ..
            } => {
                assert_eq!(tasks, &["clean", "test"]);
                assert!(*use_wrapper);
            }
            other => panic!("unexpected step kind: {:?}", other),
        }
    }
}
