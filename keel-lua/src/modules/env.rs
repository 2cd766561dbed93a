//! Definition variables
//!
//! Values handed to a definition file from outside (CLI `--var`, tests) so a
//! single file can describe slightly different pipelines, e.g. a release
//! branch that skips compatibility stages.

use crate::module::KeelModule;
use mlua::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Source of definition variables
pub trait VarProvider: Send + Sync {
    fn get(&self, name: &str) -> Option<String>;

    fn keys(&self) -> Vec<String>;
}

impl VarProvider for BTreeMap<String, String> {
    fn get(&self, name: &str) -> Option<String> {
        BTreeMap::get(self, name).cloned()
    }

    fn keys(&self) -> Vec<String> {
        BTreeMap::keys(self).cloned().collect()
    }
}

impl VarProvider for HashMap<String, String> {
    fn get(&self, name: &str) -> Option<String> {
        HashMap::get(self, name).cloned()
    }

    fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = HashMap::keys(self).cloned().collect();
        keys.sort();
        keys
    }
}

/// `env` module: read-only access to definition variables
pub struct EnvModule<V: VarProvider> {
    provider: Arc<V>,
}

impl<V: VarProvider> EnvModule<V> {
    pub fn new(provider: V) -> Self {
        Self {
            provider: Arc::new(provider),
        }
    }
}

impl<V: VarProvider + 'static> KeelModule for EnvModule<V> {
    fn id(&self) -> &'static str {
        "env"
    }

    fn register(&self, lua: &Lua) -> LuaResult<()> {
        let env_table = lua.create_table()?;

        // env.get(name, default?)
        {
            let provider = self.provider.clone();
            env_table.set(
                "get",
                lua.create_function(move |_, (name, default): (String, Option<String>)| {
                    Ok(provider.get(&name).or(default))
                })?,
            )?;
        }

        // env.require(name) - errors if missing
        {
            let provider = self.provider.clone();
            env_table.set(
                "require",
                lua.create_function(move |_, name: String| {
                    provider.get(&name).ok_or_else(|| {
                        LuaError::RuntimeError(format!(
                            "Required definition variable '{}' is not set",
                            name
                        ))
                    })
                })?,
            )?;
        }

        // env.has(name)
        {
            let provider = self.provider.clone();
            env_table.set(
                "has",
                lua.create_function(move |_, name: String| Ok(provider.get(&name).is_some()))?,
            )?;
        }

        // env.all()
        {
            let provider = self.provider.clone();
            env_table.set(
                "all",
                lua.create_function(move |lua, ()| {
                    let table = lua.create_table()?;
                    for key in provider.keys() {
                        if let Some(value) = provider.get(&key) {
                            table.set(key, value)?;
                        }
                    }
                    Ok(table)
                })?,
            )?;
        }

        lua.globals().set(self.id(), env_table)?;
        Ok(())
    }

    fn stubs(&self) -> String {
        r#"---@meta

---Variables passed to the definition file (keel --var NAME=VALUE)
---@class env
env = {}

---Get a variable, or `default` when it is not set
---@param name string
---@param default? string
---@return string|nil
function env.get(name, default) end

---Get a variable, failing the definition when it is not set
---@param name string
---@return string
function env.require(name) end

---@param name string
---@return boolean
function env.has(name) end

---@return table<string, string>
function env.all() end
"#
        .to_string()
    }

    fn metadata(&self) -> crate::module::ModuleMetadata {
        crate::module::ModuleMetadata {
            id: self.id(),
            version: "1.0.0",
            description: "Variables passed to definition files",
        }
    }
}
