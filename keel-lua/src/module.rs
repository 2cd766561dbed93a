use mlua::prelude::*;

/// Trait for modules exposed to Keel definition files.
///
/// A module owns one Lua global. Definition files are evaluated once to
/// produce stage descriptors, so modules only provide data and helpers;
/// nothing they register runs during a build.
///
/// # Example
///
/// ```rust
/// use keel_lua::module::KeelModule;
/// use mlua::prelude::*;
///
/// struct BranchModule;
///
/// impl KeelModule for BranchModule {
///     fn id(&self) -> &'static str {
///         "branch"
///     }
///
///     fn register(&self, lua: &Lua) -> LuaResult<()> {
///         let table = lua.create_table()?;
///         table.set("default", "master")?;
///         lua.globals().set(self.id(), table)?;
///         Ok(())
///     }
///
///     fn stubs(&self) -> String {
///         "---@meta\n---@class branch\n---@field default string\nbranch = {}\n".to_string()
///     }
/// }
/// ```
pub trait KeelModule: Send + Sync {
    /// Returns the unique identifier for this module.
    ///
    /// Used as the global variable name in Lua, so it must be a valid Lua
    /// identifier and unique across the registry.
    fn id(&self) -> &'static str;

    /// Registers this module's table into the Lua context under `id()`.
    ///
    /// # Errors
    /// Returns `LuaError` if a value cannot be created or set
    fn register(&self, lua: &Lua) -> LuaResult<()>;

    /// Generates Lua Language Server stubs for this module.
    ///
    /// The stub should start with `---@meta` to mark it as a definition file.
    fn stubs(&self) -> String;

    fn metadata(&self) -> ModuleMetadata {
        ModuleMetadata {
            id: self.id(),
            version: "0.1.0",
            description: "",
        }
    }
}

/// Metadata about a Keel module
#[derive(Debug, Clone)]
pub struct ModuleMetadata {
    pub id: &'static str,
    pub version: &'static str,
    pub description: &'static str,
}

/// Set of modules registered into a definition sandbox
pub struct ModuleRegistry {
    modules: Vec<Box<dyn KeelModule>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self {
            modules: Vec::new(),
        }
    }

    /// Registers a module
    ///
    /// # Panics
    /// Panics if a module with the same ID is already registered
    pub fn register<M: KeelModule + 'static>(&mut self, module: M) {
        let id = module.id();
        if self.modules.iter().any(|m| m.id() == id) {
            panic!("Module with id '{}' is already registered", id);
        }
        self.modules.push(Box::new(module));
    }

    pub fn get(&self, id: &str) -> Option<&dyn KeelModule> {
        self.modules
            .iter()
            .find(|m| m.id() == id)
            .map(|m| m.as_ref())
    }

    pub fn modules(&self) -> &[Box<dyn KeelModule>] {
        &self.modules
    }

    /// Registers all modules into a Lua context
    ///
    /// # Errors
    /// Returns the first error encountered during registration
    pub fn register_all(&self, lua: &Lua) -> LuaResult<()> {
        for module in &self.modules {
            tracing::trace!(module = module.id(), "Registering Lua module");
            module.register(lua)?;
        }
        Ok(())
    }

    /// Metadata of every registered module, in registration order
    pub fn metadata(&self) -> Vec<ModuleMetadata> {
        self.modules.iter().map(|m| m.metadata()).collect()
    }

    /// Combined stub file for all registered modules
    pub fn generate_stubs(&self) -> String {
        let mut stubs = String::new();
        for module in &self.modules {
            stubs.push_str(&module.stubs());
            stubs.push_str("\n\n");
        }
        stubs
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}
