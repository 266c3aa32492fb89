use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use packforge_lib::executor::OutdatedAction;
use packforge_lib::step::Step;

mod cmd;

/// packforge - assemble parts into a distributable package
#[derive(Parser)]
#[command(name = "packforge")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Project directory containing packforge.yaml
  #[arg(long, global = true, default_value = ".")]
  project_dir: PathBuf,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Pull parts' sources
  Pull {
    /// Parts to pull (all parts when omitted)
    parts: Vec<String>,

    /// What to do when recorded steps need a silent re-run: clean | error
    #[arg(long, default_value = "clean")]
    on_outdated: OutdatedAction,
  },

  /// Build parts from their pulled sources
  Build {
    parts: Vec<String>,

    #[arg(long, default_value = "clean")]
    on_outdated: OutdatedAction,
  },

  /// Stage parts' build output into the shared staging area
  Stage {
    parts: Vec<String>,

    #[arg(long, default_value = "clean")]
    on_outdated: OutdatedAction,
  },

  /// Prime the final package layout (and write package metadata)
  Prime {
    parts: Vec<String>,

    #[arg(long, default_value = "clean")]
    on_outdated: OutdatedAction,
  },

  /// Remove recorded state and artifacts for parts
  Clean {
    /// Parts to clean (all parts when omitted)
    parts: Vec<String>,

    /// Clean from this step onward instead of the whole part
    #[arg(long)]
    step: Option<Step>,
  },

  /// Show each part's recorded lifecycle state
  Status,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .without_time()
    .init();

  let cli = Cli::parse();

  match cli.command {
    Commands::Pull { parts, on_outdated } => cmd::cmd_lifecycle(&cli.project_dir, Step::Pull, &parts, on_outdated),
    Commands::Build { parts, on_outdated } => cmd::cmd_lifecycle(&cli.project_dir, Step::Build, &parts, on_outdated),
    Commands::Stage { parts, on_outdated } => cmd::cmd_lifecycle(&cli.project_dir, Step::Stage, &parts, on_outdated),
    Commands::Prime { parts, on_outdated } => cmd::cmd_lifecycle(&cli.project_dir, Step::Prime, &parts, on_outdated),
    Commands::Clean { parts, step } => cmd::cmd_clean(&cli.project_dir, &parts, step),
    Commands::Status => cmd::cmd_status(&cli.project_dir),
  }
}
