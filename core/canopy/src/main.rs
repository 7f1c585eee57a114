//! canopy: headless front-end for the worktree enrichment pipeline.
//!
//! ## Subcommands
//!
//! - `status`: discover worktrees, enrich them concurrently, print summaries
//! - `watch`: follow the active worktree, re-analyzing on file changes
//! - `issue`: resolve the issue number referenced by a branch name
//! - `cache clear`: drop every cached AI status

mod logging;
mod status;
mod watch;

use canopy_core::{CanopyEngine, IssueResolution, StorageConfig};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "canopy")]
#[command(about = "Live AI summaries for every git worktree")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize every worktree of a repository
    Status {
        /// Any path inside the repository (defaults to the current directory)
        #[arg(long, value_name = "PATH")]
        repo: Option<PathBuf>,

        /// Branch to diff against instead of HEAD
        #[arg(long, value_name = "BRANCH")]
        base: Option<String>,
    },

    /// Watch the worktree containing PATH and keep its status fresh
    Watch {
        #[arg(value_name = "PATH")]
        path: Option<PathBuf>,
    },

    /// Resolve the issue number referenced by a branch name
    Issue {
        #[arg(value_name = "BRANCH")]
        branch: String,
    },

    /// Status cache administration
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
}

#[derive(Subcommand)]
enum CacheCommands {
    /// Remove every cached status
    Clear,
}

fn current_dir_or(path: Option<PathBuf>) -> PathBuf {
    path.unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let storage = match StorageConfig::from_home() {
        Ok(storage) => storage,
        Err(e) => {
            eprintln!("canopy: {}", e);
            std::process::exit(1);
        }
    };
    let _logging_guard = logging::init(&storage.logs_dir());

    let engine = match CanopyEngine::with_storage(storage) {
        Ok(engine) => engine,
        Err(e) => {
            tracing::error!(error = %e, "canopy failed to start");
            eprintln!("canopy: {}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Status { repo, base } => status::run(engine, current_dir_or(repo), base).await,
        Commands::Watch { path } => watch::run(engine, current_dir_or(path)).await,
        Commands::Issue { branch } => {
            match engine.issues().resolve(&branch).await {
                IssueResolution::Issue(n) => println!("#{}", n),
                IssueResolution::NoIssue => println!("none"),
            }
            Ok(())
        }
        Commands::Cache {
            command: CacheCommands::Clear,
        } => {
            let removed = engine.cache().len();
            engine.cache().clear();
            println!("Cleared {} cached status(es)", removed);
            Ok(())
        }
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "canopy command failed");
        eprintln!("canopy: {}", e);
        std::process::exit(1);
    }
}
