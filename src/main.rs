use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use herald::controller::AgentController;
use std::path::PathBuf;

mod cmd;

#[derive(Parser)]
#[command(name = "herald")]
#[command(version, about = "Chat-driven AI coding agent runner")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Start with task intake switched off; run and exec requests are
    /// rejected.
    #[arg(long, global = true)]
    pub disabled: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a full agent task: clone, implement, and open a pull request
    Run {
        /// The task description forwarded to the agent
        #[arg(required = true)]
        prompt: Vec<String>,
    },
    /// Supervise an arbitrary command through the streaming pipeline
    Exec {
        command: String,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    herald::logging::init(cli.verbose);

    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };
    let controller = AgentController::new(!cli.disabled);

    match &cli.command {
        Commands::Run { prompt } => {
            cmd::cmd_run(&project_dir, &controller, &prompt.join(" ")).await?;
        }
        Commands::Exec { command, args } => {
            cmd::cmd_exec(&project_dir, &controller, command, args).await?;
        }
        Commands::Config => cmd::cmd_config(&project_dir)?,
    }

    Ok(())
}
