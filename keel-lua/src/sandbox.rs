//! Lua sandbox creation
//!
//! Definition files are evaluated in a restricted Lua state: no filesystem,
//! no OS access, no loading of external code. A definition can only build
//! and return tables.
//!
//! The `pipeline` helper module is always injected. Other modules (project,
//! log, env) are registered by the caller through a
//! [`ModuleRegistry`](crate::module::ModuleRegistry).

use keel_core::FailurePolicy;
use mlua::{Lua, LuaOptions, Result as LuaResult, StdLib, Table, Value};

/// LuaLS stubs for the `pipeline` helper module
pub const PIPELINE_STUBS: &str = r#"---@meta

---Helpers for writing Keel stage definitions
---@class pipeline
pipeline = {}

---@alias keel.policy "continue"|"cancel"|"stop"|"add_problem"
---@alias keel.mode "default"|"always"

---Failure policy names
---@class pipeline.policy
---@field CONTINUE keel.policy
---@field CANCEL keel.policy
---@field STOP keel.policy
---@field ADD_PROBLEM keel.policy
pipeline.policy = {}

---Step execution modes
---@class pipeline.mode
---@field DEFAULT keel.mode
---@field ALWAYS keel.mode
pipeline.mode = {}

---Returns the definition table as-is
---@param definition table
---@return table
function pipeline.define(definition) end

---Returns the stage table as-is
---@param stage table
---@return table
function pipeline.stage(stage) end

---Marks a step table as a build tool step
---@param step {name: string, tasks: string|string[], args?: string|string[], exclude_args?: string|string[], use_wrapper?: boolean, mode?: keel.mode}
---@return table
function pipeline.build_tool(step) end

---Marks a step table as a script step
---@param step {name: string, body: string, mode?: keel.mode}
---@return table
function pipeline.script(step) end

---Dependency on an upstream stage id
---@param stage string
---@param on_failure? keel.policy
---@param on_cancel? keel.policy
---@return table
function pipeline.dependency(stage, on_failure, on_cancel) end
"#;

/// Create a restricted Lua sandbox for evaluating definition files
///
/// # Security
/// This sandbox prevents:
/// - File system access (`io`, `dofile`, `loadfile`)
/// - Process and OS access (`os`)
/// - Loading external modules via `require()`
///
/// # Example
/// ```no_run
/// use keel_lua::sandbox::create_definition_sandbox;
///
/// let lua = create_definition_sandbox()?;
/// let definition: mlua::Table = lua
///     .load(r#"return pipeline.define({ stages = {} })"#)
///     .eval()?;
/// # Ok::<(), mlua::Error>(())
/// ```
pub fn create_definition_sandbox() -> LuaResult<Lua> {
    // Only TABLE, STRING, MATH; IO, OS, PACKAGE and DEBUG stay out
    let lua = Lua::new_with(
        StdLib::TABLE | StdLib::STRING | StdLib::MATH,
        LuaOptions::default(),
    )?;

    lua.globals().set("require", mlua::Nil)?;
    lua.globals().set("dofile", mlua::Nil)?;
    lua.globals().set("loadfile", mlua::Nil)?;

    register_pipeline_module(&lua)?;

    Ok(lua)
}

fn register_pipeline_module(lua: &Lua) -> LuaResult<()> {
    let pipeline = lua.create_table()?;

    let passthrough = lua.create_function(|_, definition: Table| Ok(definition))?;
    pipeline.set("define", passthrough.clone())?;
    pipeline.set("stage", passthrough)?;

    pipeline.set("build_tool", step_marker(lua, "build_tool")?)?;
    pipeline.set("script", step_marker(lua, "script")?)?;

    let dependency_fn = lua.create_function(
        |lua, (stage, on_failure, on_cancel): (String, Option<String>, Option<String>)| {
            let dependency = lua.create_table()?;
            dependency.set("stage", stage)?;
            dependency.set("on_failure", on_failure)?;
            dependency.set("on_cancel", on_cancel)?;
            Ok(dependency)
        },
    )?;
    pipeline.set("dependency", dependency_fn)?;

    let policy = lua.create_table()?;
    for p in FailurePolicy::ALL {
        policy.set(p.as_str().to_ascii_uppercase(), p.as_str())?;
    }
    pipeline.set("policy", policy)?;

    let mode = lua.create_table()?;
    mode.set("DEFAULT", "default")?;
    mode.set("ALWAYS", "always")?;
    pipeline.set("mode", mode)?;

    lua.globals().set("pipeline", pipeline)?;

    Ok(())
}

/// Function that tags a step table with `kind` and returns it
fn step_marker(lua: &Lua, kind: &'static str) -> LuaResult<mlua::Function> {
    lua.create_function(move |_, step: Table| {
        if !matches!(step.get::<Value>("kind")?, Value::Nil) {
            let existing: String = step.get("kind")?;
            if existing != kind {
                return Err(mlua::Error::RuntimeError(format!(
                    "step is already a '{}' step, cannot mark it as '{}'",
                    existing, kind
                )));
            }
        }
        step.set("kind", kind)?;
        Ok(step)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sandbox_basic_lua() {
        let lua = create_definition_sandbox().unwrap();

        let result: i32 = lua
            .load(
                r#"
                local t = {a = 1, b = 2}
                return t.a + t.b
            "#,
            )
            .eval()
            .unwrap();
        assert_eq!(result, 3);

        let result: String = lua
            .load(r#"return string.format("%sColony", "Check_")"#)
            .eval()
            .unwrap();
        assert_eq!(result, "Check_Colony");
    }

    #[test]
    fn test_sandbox_no_io() {
        let lua = create_definition_sandbox().unwrap();

        let has_io: bool = lua.load(r#"return io ~= nil"#).eval().unwrap();
        assert!(!has_io);

        let has_os: bool = lua.load(r#"return os ~= nil"#).eval().unwrap();
        assert!(!has_os);
    }

    #[test]
    fn test_sandbox_no_code_loading() {
        let lua = create_definition_sandbox().unwrap();

        assert!(lua.load(r#"require("os")"#).exec().is_err());
        assert!(lua.load(r#"dofile("/etc/passwd")"#).exec().is_err());
        assert!(lua.load(r#"loadfile("/etc/passwd")"#).exec().is_err());
    }

    #[test]
    fn test_sandbox_no_optional_modules_by_default() {
        let lua = create_definition_sandbox().unwrap();

        for name in ["log", "env", "project"] {
            let present: bool = lua
                .load(format!("return {} ~= nil", name))
                .eval()
                .unwrap();
            assert!(!present, "{} should not be registered", name);
        }
    }

    #[test]
    fn test_pipeline_helpers() {
        let lua = create_definition_sandbox().unwrap();

        let kind: String = lua
            .load(r#"return pipeline.build_tool({ name = "GRADLE_RUNNER" }).kind"#)
            .eval()
            .unwrap();
        assert_eq!(kind, "build_tool");

        let kind: String = lua
            .load(r#"return pipeline.script({ name = "CHECK" }).kind"#)
            .eval()
            .unwrap();
        assert_eq!(kind, "script");

        let (stage, on_failure, on_cancel): (String, String, Option<String>) = lua
            .load(
                r#"
                local d = pipeline.dependency("Check_Stage3_Passes", pipeline.policy.CANCEL)
                return d.stage, d.on_failure, d.on_cancel
            "#,
            )
            .eval()
            .unwrap();
        assert_eq!(stage, "Check_Stage3_Passes");
        assert_eq!(on_failure, "cancel");
        assert_eq!(on_cancel, None);
    }

    #[test]
    fn test_policy_and_mode_constants() {
        let lua = create_definition_sandbox().unwrap();

        let add_problem: String = lua
            .load("return pipeline.policy.ADD_PROBLEM")
            .eval()
            .unwrap();
        assert_eq!(add_problem, "add_problem");

        let always: String = lua.load("return pipeline.mode.ALWAYS").eval().unwrap();
        assert_eq!(always, "always");
    }

    #[test]
    fn test_step_marker_rejects_conflicting_kind() {
        let lua = create_definition_sandbox().unwrap();

        let result = lua
            .load(r#"return pipeline.script(pipeline.build_tool({ name = "x" }))"#)
            .exec();
        assert!(result.is_err());
    }
}
