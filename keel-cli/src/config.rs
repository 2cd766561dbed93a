//! Configuration module
//!
//! Turns command-line options into the project settings handed to the
//! definition loader.

use anyhow::{Result, anyhow};
use keel_core::{BuildToolArgs, ProjectSettings};
use std::collections::BTreeMap;
use tracing::debug;

/// CLI configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Settings applied to every stage
    pub settings: ProjectSettings,
    /// Variables exposed to definition files through `env`
    pub variables: BTreeMap<String, String>,
}

impl Config {
    pub fn new(
        prefix: String,
        vcs_root: Option<String>,
        build_args: &[String],
        params: Vec<(String, String)>,
        vars: Vec<(String, String)>,
    ) -> Self {
        let build_tool_args = build_args
            .iter()
            .map(|a| BuildToolArgs::parse(a))
            .fold(BuildToolArgs::new(), |acc, a| acc.concat(&a));

        let settings = ProjectSettings {
            project_prefix: prefix,
            vcs_root: vcs_root.filter(|v| !v.trim().is_empty()),
            build_tool_args,
            default_params: params.into_iter().collect(),
        };

        debug!(
            prefix = %settings.project_prefix,
            build_args = %settings.build_tool_args,
            "Loaded configuration"
        );

        Self {
            settings,
            variables: vars.into_iter().collect(),
        }
    }

    /// Check the settings can produce usable stage ids
    pub fn validate(&self) -> Result<()> {
        if self
            .settings
            .project_prefix
            .chars()
            .any(char::is_whitespace)
        {
            return Err(anyhow!(
                "Project prefix '{}' must not contain whitespace",
                self.settings.project_prefix
            ));
        }
        if self.settings.default_params.keys().any(|k| k.is_empty()) {
            return Err(anyhow!("Default parameter names must not be empty"));
        }
        Ok(())
    }
}

/// Parse a single key=value pair
pub fn parse_key_val(s: &str) -> Result<(String, String)> {
    let pos = s
        .find('=')
        .ok_or_else(|| anyhow!("invalid NAME=value: no `=` found in `{}`", s))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_val() {
        assert_eq!(
            parse_key_val("env.JAVA_HOME=/opt/jdk8").unwrap(),
            ("env.JAVA_HOME".to_string(), "/opt/jdk8".to_string())
        );
        assert_eq!(
            parse_key_val("opts=-Da=b").unwrap(),
            ("opts".to_string(), "-Da=b".to_string())
        );
        assert!(parse_key_val("no-equals").is_err());
    }

    #[test]
    fn test_build_args_are_combined() {
        let config = Config::new(
            "Check_".to_string(),
            Some("Colony_ColonyMaster".to_string()),
            &["-PmaxParallelForks=4 -s".to_string(), "--daemon".to_string()],
            vec![("env.LANG".to_string(), "C.UTF-8".to_string())],
            vec![("skip_colony".to_string(), "true".to_string())],
        );

        assert_eq!(
            config.settings.build_tool_args.to_string(),
            "-PmaxParallelForks=4 -s --daemon"
        );
        assert_eq!(config.settings.vcs_root.as_deref(), Some("Colony_ColonyMaster"));
        assert_eq!(
            config.settings.default_params.get("env.LANG").map(String::as_str),
            Some("C.UTF-8")
        );
        assert_eq!(
            config.variables.get("skip_colony").map(String::as_str),
            Some("true")
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_blank_vcs_root_is_dropped() {
        let config = Config::new(String::new(), Some("  ".to_string()), &[], vec![], vec![]);
        assert_eq!(config.settings.vcs_root, None);
    }

    #[test]
    fn test_prefix_with_whitespace_rejected() {
        let config = Config::new("Check ".to_string(), None, &[], vec![], vec![]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_param_name_rejected() {
        let config = Config::new(
            "P_".to_string(),
            None,
            &[],
            vec![(String::new(), "x".to_string())],
            vec![],
        );
        assert!(config.validate().is_err());
    }
}
