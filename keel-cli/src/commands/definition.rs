//! Definition command handlers
//!
//! Validation, inspection and export of a definition file.

use anyhow::{Context, Result, anyhow};
use colored::*;
use keel_core::{DependencySpec, ExecutionMode, Pipeline, StageDescriptor, StepDescriptor, StepKind};
use std::path::Path;

use crate::config::Config;
use crate::loader::load_definition;

pub fn validate(file: &Path, config: &Config) -> Result<()> {
    let pipeline = load_definition(file, config)?;

    let steps: usize = pipeline.stages().iter().map(|s| s.steps().len()).sum();
    let dependencies: usize = pipeline
        .stages()
        .iter()
        .map(|s| s.dependencies().len())
        .sum();

    println!("{}", "✓ Definition is valid".green().bold());
    println!("  Stages:       {}", pipeline.len().to_string().cyan());
    println!("  Steps:        {}", steps.to_string().dimmed());
    println!("  Dependencies: {}", dependencies.to_string().dimmed());

    Ok(())
}

pub fn show(file: &Path, stage_id: Option<&str>, config: &Config) -> Result<()> {
    let pipeline = load_definition(file, config)?;

    match stage_id {
        Some(id) => {
            let stage = pipeline
                .stage(id)
                .ok_or_else(|| anyhow!("No stage with id '{}' in {}", id, file.display()))?;
            print_stage_details(stage);
        }
        None => {
            for stage in pipeline.stages() {
                print_stage_details(stage);
                println!();
            }
        }
    }

    Ok(())
}

pub fn plan(file: &Path, config: &Config) -> Result<()> {
    let pipeline = load_definition(file, config)?;

    println!(
        "{}",
        format!("Dependency order ({} stage(s)):", pipeline.len()).bold()
    );
    for (position, stage) in pipeline.dependency_order().into_iter().enumerate() {
        println!(
            "  {}. {} {}",
            position + 1,
            stage.id().cyan(),
            format!("({} step(s))", stage.steps().len()).dimmed()
        );
        for dep in stage.dependencies() {
            println!("       {} {}", "←".dimmed(), format_dependency(dep));
        }
    }

    Ok(())
}

pub fn export(file: &Path, pretty: bool, output: Option<&Path>, config: &Config) -> Result<()> {
    let pipeline = load_definition(file, config)?;
    let json = render_export(&pipeline, pretty)?;

    match output {
        Some(path) => {
            std::fs::write(path, json + "\n")
                .with_context(|| format!("Failed to write export to {}", path.display()))?;
            eprintln!(
                "{}",
                format!("✓ Exported {} stage(s) to {}", pipeline.len(), path.display())
                    .green()
                    .bold()
            );
        }
        None => println!("{}", json),
    }

    Ok(())
}

/// JSON document handed to the pipeline engine
fn render_export(pipeline: &Pipeline, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(pipeline)
    } else {
        serde_json::to_string(pipeline)
    };
    json.context("Failed to serialize stage descriptors")
}

fn print_stage_details(stage: &StageDescriptor) {
    println!("{} {}", "▸".cyan(), stage.display_name().bold());
    println!("  ID:          {}", stage.id().cyan());
    if let Some(desc) = stage.description() {
        println!("  Description: {}", desc);
    }
    if let Some(vcs) = stage.vcs_root() {
        println!("  VCS root:    {}", vcs);
    }

    if !stage.parameters().is_empty() {
        println!("  Parameters:");
        for (name, value) in stage.parameters() {
            println!("    {} = {}", name.cyan(), value);
        }
        let refs = stage.parameter_references();
        if !refs.is_empty() {
            println!(
                "    {}",
                format!("resolved by the engine: {}", refs.join(", ")).dimmed()
            );
        }
    }

    println!("  Steps:");
    for (position, step) in stage.steps().iter().enumerate() {
        println!("    {}. {}", position + 1, step_summary(step));
    }

    if !stage.dependencies().is_empty() {
        println!("  Dependencies:");
        for dep in stage.dependencies() {
            println!("    - {}", format_dependency(dep));
        }
    }
}

fn step_summary(step: &StepDescriptor) -> String {
    let mode = match step.mode {
        ExecutionMode::Always => " [always]",
        ExecutionMode::NormalIfPriorStepsSucceeded => "",
    };

    let detail = match &step.kind {
        StepKind::RunBuildTool {
            tasks,
            arguments,
            use_wrapper,
            ..
        } => {
            let mut detail = format!("build tool: {}", tasks.join(" "));
            if !arguments.is_empty() {
                detail.push_str(&format!(" ({})", arguments));
            }
            if *use_wrapper {
                detail.push_str(" via wrapper");
            }
            detail
        }
        StepKind::RunScript { body } => {
            format!("script: {} line(s)", body.lines().count())
        }
    };

    format!("{}{} - {}", step.name, mode, detail)
}

fn format_dependency(dep: &DependencySpec) -> String {
    format!(
        "{} (on failure: {}, on cancel: {})",
        dep.upstream_id, dep.on_failure, dep.on_cancel
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_core::{FailurePolicy, StageParams};

    fn pipeline() -> Pipeline {
        let upstream = StageDescriptor::build(
            "Check_",
            StageParams::new("Stage3_Passes").step(StepDescriptor::script("run", "true")),
        )
        .unwrap();
        let colony = StageDescriptor::build(
            "Check_",
            StageParams::new("ColonyCompatibility")
                .step(
                    StepDescriptor::build_tool("GRADLE_RUNNER", "clean test")
                        .with_arguments("--continue")
                        .with_wrapper(true),
                )
                .step(
                    StepDescriptor::script("CHECK_CLEAN_M2", "echo one\necho two")
                        .with_mode(ExecutionMode::Always),
                )
                .dependency(
                    "Check_Stage3_Passes",
                    FailurePolicy::Cancel,
                    FailurePolicy::Cancel,
                ),
        )
        .unwrap();
        Pipeline::new(vec![upstream, colony]).unwrap()
    }

    #[test]
    fn test_step_summary() {
        let pipeline = pipeline();
        let colony = pipeline.stage("Check_ColonyCompatibility").unwrap();

        assert_eq!(
            step_summary(&colony.steps()[0]),
            "GRADLE_RUNNER - build tool: clean test (--continue) via wrapper"
        );
        assert_eq!(
            step_summary(&colony.steps()[1]),
            "CHECK_CLEAN_M2 [always] - script: 2 line(s)"
        );
    }

    #[test]
    fn test_format_dependency() {
        let dep = DependencySpec::new("Check_Stage3_Passes", FailurePolicy::Cancel, FailurePolicy::AddProblem);
        assert_eq!(
            format_dependency(&dep),
            "Check_Stage3_Passes (on failure: cancel, on cancel: add_problem)"
        );
    }

    #[test]
    fn test_render_export() {
        let json = render_export(&pipeline(), false).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        let stages = value["stages"].as_array().unwrap();
        assert_eq!(stages.len(), 2);
        assert_eq!(stages[1]["id"], "Check_ColonyCompatibility");
        assert_eq!(stages[1]["steps"][1]["mode"], "always");
        assert_eq!(stages[1]["dependencies"][0]["on_failure"], "cancel");
    }

    #[test]
    fn test_render_export_pretty() {
        let json = render_export(&pipeline(), true).unwrap();
        assert!(json.contains("\n  \"stages\""));
    }
}
