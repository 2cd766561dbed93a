//! Keel CLI
//!
//! Command-line interface for validating, inspecting and exporting Keel
//! stage definitions.

mod commands;
mod config;
mod loader;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::{Config, parse_key_val};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "keel")]
#[command(about = "Keel CI stage definition tool", long_about = None)]
struct Cli {
    /// Prefix prepended to every stage name to form its id
    #[arg(long, env = "KEEL_PROJECT_PREFIX", default_value = "")]
    prefix: String,

    /// VCS root attached to every stage
    #[arg(long, env = "KEEL_VCS_ROOT")]
    vcs_root: Option<String>,

    /// Default build tool arguments, prepended to every build tool step
    #[arg(long = "build-arg", env = "KEEL_BUILD_ARGS", allow_hyphen_values = true)]
    build_args: Vec<String>,

    /// Default stage parameter as NAME=VALUE (repeatable)
    #[arg(long = "param", value_parser = parse_key_val)]
    params: Vec<(String, String)>,

    /// Definition variable as NAME=VALUE, readable through `env` (repeatable)
    #[arg(long = "var", value_parser = parse_key_val)]
    vars: Vec<(String, String)>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, env = "KEEL_LOG", default_value = "keel_cli=info,keel_lua=info,keel_core=warn")]
    log_filter: String,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_filter.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::new(
        cli.prefix,
        cli.vcs_root,
        &cli.build_args,
        cli.params,
        cli.vars,
    );
    config.validate()?;

    handle_command(cli.command, &config)
}
