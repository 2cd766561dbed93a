//! Stage definition parser
//!
//! Evaluates a Lua definition file and turns the returned table into
//! validated [`StageDescriptor`]s. The file is expected to return
//!
//! ```lua
//! return pipeline.define({
//!     stages = {
//!         {
//!             name = "ColonyCompatibility",
//!             display_name = "Colony Compatibility",
//!             description = "...",
//!             params = { ["env.JAVA_HOME"] = "%linux.java8.oracle.64bit%" },
//!             steps = {
//!                 pipeline.build_tool({ name = "GRADLE_RUNNER", tasks = "clean test" }),
//!                 pipeline.script({ name = "CHECK", mode = "always", body = "..." }),
//!             },
//!             dependencies = {
//!                 pipeline.dependency(project.id("Stage3_Passes"), "cancel", "cancel"),
//!             },
//!         },
//!     },
//! })
//! ```

use anyhow::{Context, Result, anyhow};
use keel_core::{
    BuildToolArgs, DependencySpec, ExecutionMode, FailurePolicy, Pipeline, ProjectSettings,
    StageDescriptor, StageParams, StepDescriptor,
};
use mlua::{FromLua, Lua, Table, Value};
use std::collections::BTreeMap;
use tracing::debug;

use crate::module::ModuleRegistry;
use crate::modules::{EnvModule, LogModule, ProjectModule, TracingSink, VarProvider};
use crate::sandbox::create_definition_sandbox;

const DEFINITION_KEYS: &[&str] = &["stages"];
const STAGE_KEYS: &[&str] = &[
    "name",
    "display_name",
    "description",
    "params",
    "steps",
    "dependencies",
];
const BUILD_TOOL_KEYS: &[&str] = &[
    "name",
    "kind",
    "mode",
    "tasks",
    "args",
    "exclude_args",
    "use_wrapper",
];
const SCRIPT_KEYS: &[&str] = &["name", "kind", "mode", "body"];
const DEPENDENCY_KEYS: &[&str] = &["stage", "on_failure", "on_cancel"];

/// Modules available to definition files: `project`, `log` and `env`
pub fn definition_registry<V: VarProvider + 'static>(
    settings: &ProjectSettings,
    variables: V,
) -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    registry.register(ProjectModule::new(settings.clone()));
    registry.register(LogModule::new(TracingSink));
    registry.register(EnvModule::new(variables));
    registry
}

/// Parse stage descriptors from Lua source with the default modules
///
/// The sandbox gets every module of [`definition_registry`]; `env` has no
/// variables set.
///
/// # Errors
/// Returns an error if:
/// - The Lua source is invalid or does not return a table
/// - Required fields are missing (stages, stage name, steps, step kind)
/// - A table has unknown keys, or an array has holes
/// - Field types or policy/mode names are incorrect
/// - A stage fails validation
pub fn parse_stages(source: &str, settings: &ProjectSettings) -> Result<Vec<StageDescriptor>> {
    let lua = create_definition_sandbox().context("Failed to create definition sandbox")?;

    definition_registry(settings, BTreeMap::new())
        .register_all(&lua)
        .context("Failed to register definition modules")?;

    parse_stages_with(&lua, "=definition", source, settings)
}

/// Parse stage descriptors in a sandbox prepared by the caller
///
/// `chunk_name` is what Lua error messages point at; use `@<path>` for a
/// file so errors read `<path>:<line>:`.
pub fn parse_stages_with(
    lua: &Lua,
    chunk_name: &str,
    source: &str,
    settings: &ProjectSettings,
) -> Result<Vec<StageDescriptor>> {
    let definition: Table = lua
        .load(source)
        .set_name(chunk_name)
        .eval()
        .context("Failed to evaluate stage definition")?;
    reject_unknown_keys(&definition, DEFINITION_KEYS, "Definition")?;

    let stages_table: Table = definition
        .get("stages")
        .context("Definition must have a 'stages' field")?;

    let mut stages = Vec::new();
    for (position, entry) in array_items::<Value>(&stages_table, "Stage")?
        .into_iter()
        .enumerate()
    {
        let Value::Table(stage_table) = entry else {
            return Err(anyhow!("Stage #{} must be a table", position + 1));
        };
        let params = parse_stage_params(&stage_table, position)?;
        let name = params.name.clone();
        let stage = settings
            .stage(params)
            .with_context(|| format!("Invalid stage '{}'", name))?;
        stages.push(stage);
    }

    if stages.is_empty() {
        return Err(anyhow!("Definition must have at least one stage"));
    }

    debug!(stages = stages.len(), prefix = %settings.project_prefix, "Parsed stage definition");
    Ok(stages)
}

/// Parse stages and validate them as one pipeline
pub fn load_pipeline(source: &str, settings: &ProjectSettings) -> Result<Pipeline> {
    let stages = parse_stages(source, settings)?;
    Pipeline::new(stages).context("Invalid pipeline")
}

/// Items of an array table, in order
///
/// Unlike `sequence_values`, a nil hole is an error instead of the end of
/// the array, so nothing after a typo is dropped.
fn array_items<T: FromLua>(table: &Table, item: &str) -> Result<Vec<T>> {
    let mut len = 0usize;
    for pair in table.pairs::<Value, Value>() {
        let (key, _) = pair?;
        match key {
            Value::Integer(index) if index >= 1 => len = len.max(index as usize),
            other => {
                return Err(anyhow!(
                    "{} list has non-array key '{}'",
                    item,
                    key_name(&other)
                ));
            }
        }
    }

    let mut items = Vec::with_capacity(len);
    for index in 1..=len {
        if table.raw_get::<Value>(index)?.is_nil() {
            return Err(anyhow!("{} #{} is nil", item, index));
        }
        let value = table
            .raw_get::<T>(index)
            .with_context(|| format!("{} #{} has the wrong type", item, index))?;
        items.push(value);
    }
    Ok(items)
}

fn reject_unknown_keys(table: &Table, allowed: &[&str], what: &str) -> Result<()> {
    for pair in table.pairs::<Value, Value>() {
        let (key, _) = pair?;
        let known = match &key {
            Value::String(s) => allowed.iter().any(|a| s.as_bytes() == a.as_bytes()),
            _ => false,
        };
        if !known {
            return Err(anyhow!(
                "{} has unknown field '{}' (expected one of: {})",
                what,
                key_name(&key),
                allowed.join(", ")
            ));
        }
    }
    Ok(())
}

fn key_name(key: &Value) -> String {
    match key {
        Value::String(s) => s.to_string_lossy(),
        Value::Integer(i) => i.to_string(),
        other => other.type_name().to_string(),
    }
}

fn parse_stage_params(stage: &Table, position: usize) -> Result<StageParams> {
    let name: String = stage
        .get("name")
        .with_context(|| format!("Stage #{} must have a 'name' field", position + 1))?;
    reject_unknown_keys(stage, STAGE_KEYS, &format!("Stage '{}'", name))?;

    let display_name: Option<String> = stage
        .get("display_name")
        .with_context(|| format!("Stage '{}': 'display_name' must be a string", name))?;
    let description: Option<String> = stage
        .get("description")
        .with_context(|| format!("Stage '{}': 'description' must be a string", name))?;

    let environment_params = parse_params(stage, &name)?;
    let steps = parse_steps(stage, &name)?;
    let dependencies = parse_dependencies(stage, &name)?;

    Ok(StageParams {
        name,
        display_name,
        description,
        environment_params,
        steps,
        dependencies,
    })
}

fn parse_params(stage: &Table, name: &str) -> Result<BTreeMap<String, String>> {
    match stage.get::<Value>("params")? {
        Value::Nil => Ok(BTreeMap::new()),
        Value::Table(table) => {
            let mut params = BTreeMap::new();
            for pair in table.pairs::<String, String>() {
                let (key, value) = pair
                    .with_context(|| format!("Stage '{}': params must map strings to strings", name))?;
                params.insert(key, value);
            }
            Ok(params)
        }
        _ => Err(anyhow!(
            "Stage '{}': field 'params' must be a table of strings",
            name
        )),
    }
}

fn parse_steps(stage: &Table, name: &str) -> Result<Vec<StepDescriptor>> {
    let steps_table: Table = stage
        .get("steps")
        .with_context(|| format!("Stage '{}' must have a 'steps' field", name))?;

    let entries = array_items::<Value>(&steps_table, &format!("Stage '{}': step", name))?;
    let mut steps = Vec::with_capacity(entries.len());
    for (position, entry) in entries.into_iter().enumerate() {
        let Value::Table(step_table) = entry else {
            return Err(anyhow!(
                "Stage '{}': step #{} must be a table",
                name,
                position + 1
            ));
        };
        let step = parse_step(&step_table)
            .with_context(|| format!("Stage '{}': invalid step #{}", name, position + 1))?;
        steps.push(step);
    }
    Ok(steps)
}

fn parse_step(step: &Table) -> Result<StepDescriptor> {
    let name: String = step.get("name").context("Step must have a 'name' field")?;
    let kind: String = step
        .get("kind")
        .with_context(|| format!("Step '{}' must have a 'kind' field", name))?;

    let mode = match step.get::<Option<String>>("mode")? {
        Some(mode) => mode.parse::<ExecutionMode>()?,
        None => ExecutionMode::default(),
    };

    let what = format!("Step '{}'", name);
    let descriptor = match kind.as_str() {
        "build_tool" => {
            reject_unknown_keys(step, BUILD_TOOL_KEYS, &what)?;
            let tasks = tokens(step, "tasks")?.join(" ");
            let use_wrapper: bool = step
                .get::<Option<bool>>("use_wrapper")
                .with_context(|| format!("Step '{}': 'use_wrapper' must be a boolean", name))?
                .unwrap_or(false);

            let mut descriptor = StepDescriptor::build_tool(name, &tasks)
                .with_arguments(BuildToolArgs::from_tokens(tokens(step, "args")?))
                .with_wrapper(use_wrapper);
            for excluded in exclusions(step)? {
                descriptor = descriptor.excluding_arguments(excluded);
            }
            descriptor
        }
        "script" => {
            reject_unknown_keys(step, SCRIPT_KEYS, &what)?;
            let body: String = step
                .get("body")
                .with_context(|| format!("Script step '{}' must have a 'body' field", name))?;
            StepDescriptor::script(name, body)
        }
        other => {
            return Err(anyhow!(
                "Step '{}' has unknown kind '{}' (expected build_tool or script)",
                name,
                other
            ));
        }
    };

    Ok(descriptor.with_mode(mode))
}

/// Read a field given either as a whitespace-separated string or an array
/// of strings, and flatten it into tokens
fn tokens(table: &Table, field: &str) -> Result<Vec<String>> {
    match table.get::<Value>(field)? {
        Value::Nil => Ok(Vec::new()),
        Value::String(s) => Ok(s
            .to_str()?
            .split_whitespace()
            .map(str::to_string)
            .collect()),
        Value::Table(items) => {
            let items = array_items::<String>(&items, &format!("Field '{}' item", field))?;
            Ok(items
                .iter()
                .flat_map(|item| item.split_whitespace().map(str::to_string))
                .collect())
        }
        _ => Err(anyhow!(
            "Field '{}' must be a string or an array of strings",
            field
        )),
    }
}

/// `exclude_args` is one argument sequence, or an array of sequences
fn exclusions(step: &Table) -> Result<Vec<BuildToolArgs>> {
    match step.get::<Value>("exclude_args")? {
        Value::Nil => Ok(Vec::new()),
        Value::String(s) => Ok(vec![BuildToolArgs::parse(&s.to_str()?)]),
        Value::Table(items) => Ok(array_items::<String>(&items, "Field 'exclude_args' item")?
            .iter()
            .map(|s| BuildToolArgs::parse(s))
            .collect()),
        _ => Err(anyhow!(
            "Field 'exclude_args' must be a string or an array of strings"
        )),
    }
}

fn parse_dependencies(stage: &Table, name: &str) -> Result<Vec<DependencySpec>> {
    let deps_table: Table = match stage.get::<Value>("dependencies")? {
        Value::Nil => return Ok(Vec::new()),
        Value::Table(table) => table,
        _ => {
            return Err(anyhow!(
                "Stage '{}': field 'dependencies' must be an array",
                name
            ));
        }
    };

    let entries = array_items::<Value>(&deps_table, &format!("Stage '{}': dependency", name))?;
    let mut dependencies = Vec::with_capacity(entries.len());
    for entry in entries {
        let Value::Table(dep) = entry else {
            return Err(anyhow!("Stage '{}': dependency must be a table", name));
        };

        let upstream_id: String = dep
            .get("stage")
            .with_context(|| format!("Stage '{}': dependency must have a 'stage' field", name))?;
        let what = format!("Stage '{}': dependency on '{}'", name, upstream_id);
        reject_unknown_keys(&dep, DEPENDENCY_KEYS, &what)?;
        let on_failure = policy(&dep, "on_failure").with_context(|| what.clone())?;
        let on_cancel = policy(&dep, "on_cancel").with_context(|| what.clone())?;

        dependencies.push(DependencySpec::new(upstream_id, on_failure, on_cancel));
    }
    Ok(dependencies)
}

fn policy(dep: &Table, field: &str) -> Result<FailurePolicy> {
    match dep.get::<Option<String>>(field)? {
        Some(value) => Ok(value.parse::<FailurePolicy>()?),
        None => Ok(FailurePolicy::default()),
    }
}
