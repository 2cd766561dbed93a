//! Logging module for definition files
//!
//! Lets a definition file report what it is doing while it is evaluated,
//! e.g. which optional stages it skipped. Where the messages end up is up to
//! the sink: the CLI forwards them to `tracing`, tests collect them.

use crate::module::KeelModule;
use mlua::prelude::*;
use std::sync::{Arc, Mutex};

/// Severity of a message logged from a definition file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    const ALL: [LogLevel; 4] = [
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Warning,
        LogLevel::Error,
    ];

    /// Name of the Lua function for this level
    fn function_name(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
        }
    }
}

/// Destination for messages logged from definition files
pub trait LogSink: Send + Sync {
    fn write(&mut self, level: LogLevel, message: &str);
}

/// Sink forwarding to `tracing` under the `keel_lua::definition` target
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn write(&mut self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => tracing::debug!(target: "keel_lua::definition", "{}", message),
            LogLevel::Info => tracing::info!(target: "keel_lua::definition", "{}", message),
            LogLevel::Warning => tracing::warn!(target: "keel_lua::definition", "{}", message),
            LogLevel::Error => tracing::error!(target: "keel_lua::definition", "{}", message),
        }
    }
}

/// `log` module, generic over where messages go
pub struct LogModule<S: LogSink> {
    sink: Arc<Mutex<S>>,
}

impl<S: LogSink> LogModule<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink: Arc::new(Mutex::new(sink)),
        }
    }
}

impl<S: LogSink + 'static> KeelModule for LogModule<S> {
    fn id(&self) -> &'static str {
        "log"
    }

    fn register(&self, lua: &Lua) -> LuaResult<()> {
        let log_table = lua.create_table()?;

        for level in LogLevel::ALL {
            let sink = self.sink.clone();
            log_table.set(
                level.function_name(),
                lua.create_function(move |_, msg: String| {
                    sink.lock()
                        .map_err(|e| LuaError::RuntimeError(format!("Failed to lock sink: {}", e)))?
                        .write(level, &msg);
                    Ok(())
                })?,
            )?;
        }

        lua.globals().set(self.id(), log_table)?;
        Ok(())
    }

    fn stubs(&self) -> String {
        r#"---@meta

---Logging from Keel definition files
---@class log
log = {}

---@param msg string
function log.debug(msg) end

---@param msg string
function log.info(msg) end

---@param msg string
function log.warning(msg) end

---@param msg string
function log.error(msg) end
"#
        .to_string()
    }

    fn metadata(&self) -> crate::module::ModuleMetadata {
        crate::module::ModuleMetadata {
            id: self.id(),
            version: "1.0.0",
            description: "Logging while a definition file is evaluated",
        }
    }
}
