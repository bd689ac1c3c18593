//! bit - save and restore snapshots of a working tree

use anyhow::{Context, Result};
use bitsave::{IgnoreRules, OsFileSystem, Repository, RepositoryConfig, SaveId};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Save and restore snapshots of a working tree
#[derive(Parser)]
#[command(name = "bit")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Working-tree root
    #[arg(long, global = true, env = "BIT_ROOT", default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the metadata area in the working tree
    Init,
    /// Save every tracked file under a new save
    Save {
        /// Save label (words are joined with spaces)
        #[arg(required = true, num_args = 1..)]
        label: Vec<String>,
    },
    /// List saves, oldest first
    List,
    /// Restore the working tree to a save
    Checkout {
        /// Save ID
        id: String,
    },
    /// Restore the working tree to the latest save
    Now,
    /// Show what a save changed
    Show {
        /// Save ID
        id: String,
    },
    /// Report which paths the ignore file excludes
    CheckIgnore {
        #[arg(required = true, num_args = 1..)]
        paths: Vec<String>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let fs = Arc::new(OsFileSystem::new(&cli.root));
    let config = RepositoryConfig::default();

    match cli.command {
        Commands::Init => {
            Repository::init(fs, config)
                .with_context(|| format!("cannot initialize {}", cli.root.display()))?;
            println!("Initialized empty repository in {}", cli.root.display());
        }
        Commands::Save { label } => {
            let label = label.join(" ");
            let mut repo = open(fs, config, &cli.root)?;
            let id = repo.save(&label).context("save failed")?;
            println!("[{}] {}", id, label);
        }
        Commands::List => {
            let repo = open(fs, config, &cli.root)?;
            let saves = repo.list_saves();
            if saves.is_empty() {
                println!("No saves yet");
            }
            for save in saves {
                println!(
                    "{}  {}  {:>4} files  {}",
                    save.id,
                    save.created_at.format("%Y-%m-%d %H:%M:%S"),
                    save.file_count,
                    save.label
                );
            }
        }
        Commands::Checkout { id } => {
            let repo = open(fs, config, &cli.root)?;
            let report = repo
                .checkout(&SaveId::from(id.as_str()))
                .with_context(|| format!("checkout of {} failed", id))?;
            println!(
                "Checked out {}: {} written, {} deleted, {} ignored kept",
                report.save_id, report.written, report.deleted, report.preserved
            );
        }
        Commands::Now => {
            let repo = open(fs, config, &cli.root)?;
            let report = repo.checkout_latest().context("checkout failed")?;
            println!(
                "Checked out {}: {} written, {} deleted, {} ignored kept",
                report.save_id, report.written, report.deleted, report.preserved
            );
        }
        Commands::Show { id } => {
            let repo = open(fs, config, &cli.root)?;
            let id = SaveId::from(id.as_str());
            let save = repo.catalog().find(&id)?;
            println!("{}  {}", save.id, save.label);
            for change in repo.changes(&id)? {
                println!("  {:<9} {}", change.kind, change.path);
            }
        }
        Commands::CheckIgnore { paths } => {
            let rules = IgnoreRules::load(fs.as_ref(), Path::new(&config.ignore_file))?;
            if rules.is_empty() {
                eprintln!("{} has no rules", config.ignore_file);
            }
            for path in paths {
                let verdict = if rules.is_ignored(&path) { "ignored" } else { "tracked" };
                println!("{}: {}", path, verdict);
            }
        }
    }

    Ok(())
}

fn open(fs: Arc<OsFileSystem>, config: RepositoryConfig, root: &Path) -> Result<Repository> {
    Repository::open(fs, config)
        .with_context(|| format!("no repository at {} (run `bit init`)", root.display()))
}
