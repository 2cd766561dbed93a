//! Project module
//!
//! Exposes the project settings to definition files so stage ids of
//! upstream dependencies can be spelled the same way the loader derives
//! them: `project.id("Stage3_Passes")` is `project.prefix .. "Stage3_Passes"`.

use crate::module::KeelModule;
use keel_core::ProjectSettings;
use mlua::prelude::*;

pub struct ProjectModule {
    settings: ProjectSettings,
}

impl ProjectModule {
    pub fn new(settings: ProjectSettings) -> Self {
        Self { settings }
    }
}

impl KeelModule for ProjectModule {
    fn id(&self) -> &'static str {
        "project"
    }

    fn register(&self, lua: &Lua) -> LuaResult<()> {
        let table = lua.create_table()?;
        table.set("prefix", self.settings.project_prefix.as_str())?;
        table.set("vcs_root", self.settings.vcs_root.as_deref())?;
        table.set("build_args", self.settings.build_tool_args.to_string())?;

        let settings = self.settings.clone();
        table.set(
            "id",
            lua.create_function(move |_, name: String| Ok(settings.stage_id(&name)))?,
        )?;

        lua.globals().set(self.id(), table)?;
        Ok(())
    }

    fn stubs(&self) -> String {
        r#"---@meta

---Settings of the project the definition belongs to
---@class project
---@field prefix string Prefix prepended to every stage name
---@field vcs_root string|nil VCS root attached to every stage
---@field build_args string Default build tool arguments
project = {}

---Stable id of a stage of this project
---@param name string
---@return string
function project.id(name) end
"#
        .to_string()
    }

    fn metadata(&self) -> crate::module::ModuleMetadata {
        crate::module::ModuleMetadata {
            id: self.id(),
            version: "1.0.0",
            description: "Project settings for definition files",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_values() {
        let settings = ProjectSettings::new("Check_")
            .with_vcs_root("Colony_ColonyMaster")
            .with_build_tool_args("--daemon -s");
        let lua = Lua::new();
        ProjectModule::new(settings).register(&lua).unwrap();

        let prefix: String = lua.load("return project.prefix").eval().unwrap();
        assert_eq!(prefix, "Check_");

        let vcs: Option<String> = lua.load("return project.vcs_root").eval().unwrap();
        assert_eq!(vcs.as_deref(), Some("Colony_ColonyMaster"));

        let args: String = lua.load("return project.build_args").eval().unwrap();
        assert_eq!(args, "--daemon -s");

        let id: String = lua
            .load(r#"return project.id("Stage3_Passes")"#)
            .eval()
            .unwrap();
        assert_eq!(id, "Check_Stage3_Passes");
    }

    #[test]
    fn test_missing_vcs_root_is_nil() {
        let lua = Lua::new();
        ProjectModule::new(ProjectSettings::new("P_"))
            .register(&lua)
            .unwrap();

        let is_nil: bool = lua.load("return project.vcs_root == nil").eval().unwrap();
        assert!(is_nil);
    }
}
