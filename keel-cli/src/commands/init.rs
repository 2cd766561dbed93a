//! Init command handlers
//!
//! Generates editor support for definition files: a `.luarc.json` for the
//! Lua Language Server and stubs for every module a definition can use.

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;
use keel_lua::PIPELINE_STUBS;
use std::fs;
use std::path::Path;

use crate::config::Config;
use crate::loader::definition_registry;

const STUBS_DIR: &str = ".keel/stubs";

/// Init subcommands
#[derive(Subcommand)]
pub enum InitCommands {
    /// Generate Lua development files (.luarc.json and stubs)
    Lua {
        /// Output directory for generated files
        #[arg(short, long, default_value = ".")]
        output: String,

        /// Generate only .luarc.json
        #[arg(long, conflicts_with = "stubs_only")]
        config_only: bool,

        /// Generate only stub files
        #[arg(long)]
        stubs_only: bool,
    },
}

pub fn handle_init_command(command: InitCommands, config: &Config) -> Result<()> {
    match command {
        InitCommands::Lua {
            output,
            config_only,
            stubs_only,
        } => {
            let output_path = Path::new(&output);
            fs::create_dir_all(output_path)
                .with_context(|| format!("Failed to create output directory {:?}", output_path))?;
            if !stubs_only {
                generate_luarc_json(output_path, config)?;
            }
            if !config_only {
                generate_stub_files(output_path, config)?;
            }

            println!("{}", "✓ Lua development files generated!".green().bold());
            println!();
            println!("{}", "Definition modules:".bold());
            for line in module_listing(config) {
                println!("  {}", line);
            }
            println!();
            println!("{}", "Next steps:".bold());
            println!("  1. Install Lua Language Server in your editor");
            println!("  2. Open your definition file to see autocomplete and type hints");
            println!("  3. Use {} to check it", "keel validate <file>".cyan());
            Ok(())
        }
    }
}

/// One line per module available to definition files
fn module_listing(config: &Config) -> Vec<String> {
    definition_registry(config)
        .metadata()
        .into_iter()
        .map(|m| format!("{} {} - {}", m.id.cyan(), m.version.dimmed(), m.description))
        .collect()
}

fn luarc_content(config: &Config) -> String {
    let globals: Vec<String> = std::iter::once("pipeline")
        .chain(
            definition_registry(config)
                .modules()
                .iter()
                .map(|m| m.id()),
        )
        .map(|id| format!("\"{}\"", id))
        .collect();

    format!(
        r#"{{
  "$schema": "https://raw.githubusercontent.com/sumneko/vscode-lua/master/setting/schema.json",
  "runtime": {{
    "version": "Lua 5.4"
  }},
  "diagnostics": {{
    "globals": [{}]
  }},
  "workspace": {{
    "library": ["{}"],
    "checkThirdParty": false
  }},
  "completion": {{
    "callSnippet": "Both"
  }}
}}
"#,
        globals.join(", "),
        STUBS_DIR
    )
}

fn generate_luarc_json(output_path: &Path, config: &Config) -> Result<()> {
    let luarc_path = output_path.join(".luarc.json");

    fs::write(&luarc_path, luarc_content(config))
        .with_context(|| format!("Failed to write .luarc.json to {:?}", luarc_path))?;

    println!("  {} .luarc.json", "Created".green());
    Ok(())
}

/// Write one stub file per module
///
/// Stubs come from the module implementations themselves, so they stay in
/// sync with what definition files can actually call.
fn generate_stub_files(output_path: &Path, config: &Config) -> Result<()> {
    let stubs_path = output_path.join(STUBS_DIR);
    fs::create_dir_all(&stubs_path)
        .with_context(|| format!("Failed to create stubs directory {:?}", stubs_path))?;

    let pipeline_stub = stubs_path.join("pipeline.lua");
    fs::write(&pipeline_stub, PIPELINE_STUBS)
        .with_context(|| format!("Failed to write {:?}", pipeline_stub))?;
    println!("  {} {}/pipeline.lua", "Created".green(), STUBS_DIR);

    for module in definition_registry(config).modules() {
        let file_name = format!("{}.lua", module.id());
        let stub_path = stubs_path.join(&file_name);
        fs::write(&stub_path, module.stubs())
            .with_context(|| format!("Failed to write {:?}", stub_path))?;
        println!("  {} {}/{}", "Created".green(), STUBS_DIR, file_name);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_luarc_declares_all_globals() {
        let content = luarc_content(&Config::default());
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();

        let globals: Vec<&str> = value["diagnostics"]["globals"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|g| g.as_str())
            .collect();
        assert_eq!(globals, vec!["pipeline", "project", "log", "env"]);
        assert_eq!(value["workspace"]["library"][0], STUBS_DIR);
    }

    #[test]
    fn test_module_listing() {
        colored::control::set_override(false);
        let listing = module_listing(&Config::default());
        assert_eq!(
            listing,
            vec![
                "project 1.0.0 - Project settings for definition files",
                "log 1.0.0 - Logging while a definition file is evaluated",
                "env 1.0.0 - Variables passed to definition files",
            ]
        );
    }

    #[test]
    fn test_config_only_conflicts_with_stubs_only() {
        use clap::Parser;

        #[derive(Parser)]
        struct Harness {
            #[command(subcommand)]
            command: InitCommands,
        }

        assert!(Harness::try_parse_from(["keel", "lua", "--config-only", "--stubs-only"]).is_err());
        assert!(Harness::try_parse_from(["keel", "lua", "--config-only"]).is_ok());
    }

    #[test]
    fn test_generates_files() {
        let dir = std::env::temp_dir().join(format!("keel-init-test-{}", std::process::id()));
        let config = Config::default();

        handle_init_command(
            InitCommands::Lua {
                output: dir.to_string_lossy().into_owned(),
                config_only: false,
                stubs_only: false,
            },
            &config,
        )
        .unwrap();

        assert!(dir.join(".luarc.json").is_file());
        for stub in ["pipeline", "project", "log", "env"] {
            let path = dir.join(STUBS_DIR).join(format!("{}.lua", stub));
            let content = fs::read_to_string(&path).unwrap();
            assert!(content.starts_with("---@meta"), "{:?}", path);
        }

        fs::remove_dir_all(&dir).unwrap();
    }
}
