use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod cmd;

#[derive(Parser)]
#[command(name = "buildsmith")]
#[command(version, about = "Plan, generate, and review a project with AI agents")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create .buildsmith/ with template spec, rules, and config
    Init,
    /// Plan and build the project (resumes an unfinished build)
    Build {
        /// Describe a feature to add to an existing project
        #[arg(long)]
        feature: Option<String>,

        /// Skip the review phase
        #[arg(long)]
        no_review: bool,

        /// Generation backend (anthropic, openai, together, groq, ollama, ...)
        #[arg(long)]
        provider: Option<String>,

        /// Model name for the backend
        #[arg(long)]
        model: Option<String>,
    },
    /// Show the persisted build state
    Status,
    /// Delete build progress (spec, rules, and config are kept)
    Reset {
        #[arg(long)]
        force: bool,
    },
    /// Print the effective firewall policy as JSON
    Policy,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "buildsmith=info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    match &cli.command {
        Commands::Init => cmd::cmd_init(&project_dir)?,
        Commands::Build {
            feature,
            no_review,
            provider,
            model,
        } => {
            let options = cmd::BuildOptions {
                feature: feature.clone(),
                no_review: *no_review,
                provider: provider.clone(),
                model: model.clone(),
            };
            cmd::cmd_build(&project_dir, &cli, options).await?;
        }
        Commands::Status => cmd::cmd_status(&project_dir)?,
        Commands::Reset { force } => cmd::cmd_reset(&project_dir, *force)?,
        Commands::Policy => cmd::cmd_policy(&project_dir)?,
    }

    Ok(())
}
