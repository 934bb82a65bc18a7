//! Forge CLI
//!
//! Loads the stack definition and either renders it or submits it to a
//! deployment service.

mod commands;
mod config;
mod output;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use forge_stack::{ForgeStack, LoggingConfig, StackConfig};
use output::OutputFormat;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Stack configuration file (default: FORGE_CONFIG, ./forge.toml, /etc/forge/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output format (table, json, yaml)
    #[arg(short, long, global = true)]
    output: Option<String>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the stack template without submitting it
    Synth {
        /// Write a cloud assembly to this directory instead of printing
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Submit the stack template to the deployment service
    Deploy {
        /// Deployment service endpoint
        #[arg(long, env = "FORGE_ENDPOINT")]
        endpoint: Option<String>,
        /// Render only, submit nothing
        #[arg(long)]
        dry_run: bool,
    },
    /// Show resources in deployment order
    Plan,
    /// Show stack outputs
    Outputs,
    /// Show permission grants per workload identity
    Grants,
    /// Stack configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Generate shell completions
    Completions {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Write a sample configuration file
    Init {
        /// Destination
        #[arg(long, default_value = "forge.toml")]
        path: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let prefs = config::CliConfig::load().unwrap_or_default();
    let format = OutputFormat::parse(cli.output.as_deref().unwrap_or(&prefs.default_output));

    // Commands that need no stack configuration
    match &cli.command {
        Commands::Completions { shell } => {
            clap_complete::generate(*shell, &mut Cli::command(), "forge", &mut std::io::stdout());
            return Ok(());
        }
        Commands::Config {
            command: ConfigCommands::Init { path, force },
        } => return commands::config::init(path, *force),
        _ => {}
    }

    let stack_config = StackConfig::load(cli.config.as_deref()).context("Failed to load stack configuration")?;

    let logging = if cli.verbose {
        LoggingConfig {
            level: "debug".to_string(),
            ..stack_config.logging.clone()
        }
    } else {
        stack_config.logging.clone()
    };
    let _guard = logging
        .init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    if let Commands::Config {
        command: ConfigCommands::Show,
    } = cli.command
    {
        return commands::config::show(&stack_config, format);
    }

    let stack = ForgeStack::build(&stack_config).context("Failed to build stack")?;
    tracing::debug!(resources = stack.context.len(), "Stack ready");

    match cli.command {
        Commands::Synth { out } => commands::synth::handle_synth(&stack, out.as_deref(), format)?,
        Commands::Deploy { endpoint, dry_run } => {
            let endpoint = endpoint.or_else(|| prefs.endpoint.clone());
            commands::deploy::handle_deploy(&stack, endpoint.as_deref(), prefs.token.as_deref(), dry_run, format)
                .await?
        }
        Commands::Plan => commands::inspect::handle_plan(&stack, format)?,
        Commands::Outputs => commands::inspect::handle_outputs(&stack, format)?,
        Commands::Grants => commands::inspect::handle_grants(&stack, format)?,
        Commands::Config { .. } | Commands::Completions { .. } => {}
    }

    Ok(())
}
