use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pwf_core::check::{parse_check_list, CheckKind, CheckOptions, Checker, Selection};
use pwf_core::paths::{resolve, resolve_new};
use pwf_core::protect::ProtectionController;
use pwf_core::stats::{format_size, statistics};
use pwf_core::workflow::{ImportOptions, InitOptions, LabOptions, Workflow};
use pwf_core::ArchiveConfig;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "pwf", version, about = "Photo workflow archive tooling", long_about = None)]
struct Cli {
    /// Log level (error, warn, info, debug, trace); RUST_LOG wins if set
    #[arg(short, long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate names, duplicates, protection, locations and checksums
    Check {
        #[arg(default_value = ".")]
        path: PathBuf,
        /// Comma-separated checks to skip (cs,dup,miss,name,path,prot,raw)
        #[arg(short, long)]
        ignore: Option<String>,
        /// Comma-separated checks to run exclusively
        #[arg(short, long)]
        only: Option<String>,
        /// Auto-fix illegal names where possible
        #[arg(short, long)]
        fix: bool,
        /// With --fix, only print what would be renamed
        #[arg(short = 'n', long)]
        dry_run: bool,
    },
    /// Extend the checksum manifest and write-protect PATH
    Protect {
        #[arg(default_value = ".")]
        path: PathBuf,
        /// Remove protection instead (folders only unless --all)
        #[arg(short, long)]
        unprotect: bool,
        /// With --unprotect, unlock files too
        #[arg(short, long)]
        all: bool,
        /// Skip the checks before protecting
        #[arg(short, long)]
        forced: bool,
    },
    /// Create a new event folder in 0_new with its media subfolders
    Stage { path: PathBuf },
    /// Move an event from 0_new into 1_original/YEAR and protect it
    Import {
        #[arg(default_value = ".")]
        path: PathBuf,
        /// Checks to skip; only "raw" is allowed
        #[arg(short, long)]
        ignore: Option<String>,
        /// Year for events without a date prefix
        #[arg(short, long)]
        year: Option<i32>,
        /// Leave the year folder unprotected after the move
        #[arg(short, long)]
        keep_unprotected: bool,
        #[arg(short = 'n', long)]
        dry_run: bool,
    },
    /// Link an archived event into its 2_lab folder
    Lab {
        #[arg(default_value = ".")]
        path: PathBuf,
        /// Link all images, with or without preview
        #[arg(short, long)]
        all: bool,
        /// Checks to skip; only "raw" is allowed
        #[arg(short, long)]
        ignore: Option<String>,
        #[arg(short = 'n', long)]
        dry_run: bool,
    },
    /// Remove the archive links from a 2_lab event folder
    Cleanup {
        #[arg(default_value = ".")]
        path: PathBuf,
        #[arg(short = 'n', long)]
        dry_run: bool,
    },
    /// Create an empty archive skeleton at PATH
    Init {
        path: PathBuf,
        /// Add an example event to 0_new
        #[arg(short, long)]
        example: bool,
    },
    /// Count and size media files below PATH
    Stats {
        #[arg(default_value = ".")]
        path: PathBuf,
    },
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

fn ignore_list(list: Option<&str>) -> Result<BTreeSet<CheckKind>> {
    Ok(list.map(parse_check_list).transpose()?.unwrap_or_default())
}

fn run(command: Commands) -> Result<()> {
    let config = ArchiveConfig::load().context("loading configuration")?;
    debug!(?config, "configuration");
    let workflow = Workflow::new(&config);

    match command {
        Commands::Check {
            path,
            ignore,
            only,
            fix,
            dry_run,
        } => {
            let options = CheckOptions {
                selection: Selection::from_lists(only.as_deref(), ignore.as_deref())?,
                fix_names: fix,
                dry_run,
            };
            Checker::new(&config).run(&resolve(&config, &path), &options)?;
        }
        Commands::Protect {
            path,
            unprotect,
            all,
            forced,
        } => {
            let controller = ProtectionController::new(&config);
            let path = resolve(&config, &path);
            if unprotect {
                controller.unprotect(&path, all)?;
            } else {
                let report = controller.protect(&path, forced)?;
                info!(
                    "{} new manifest entries in {}",
                    report.added.len(),
                    report.manifest.display()
                );
            }
        }
        Commands::Stage { path } => {
            let event = workflow.stage_new_archive(&resolve_new(&config, &path))?;
            println!("{}", event.display());
        }
        Commands::Import {
            path,
            ignore,
            year,
            keep_unprotected,
            dry_run,
        } => {
            let options = ImportOptions {
                year,
                ignore: ignore_list(ignore.as_deref())?,
                keep_unprotected,
                dry_run,
            };
            workflow.import_to_original(&resolve(&config, &path), &options)?;
        }
        Commands::Lab {
            path,
            all,
            ignore,
            dry_run,
        } => {
            let options = LabOptions {
                all,
                ignore: ignore_list(ignore.as_deref())?,
                dry_run,
            };
            let report = workflow.prepare_lab(&resolve(&config, &path), options)?;
            info!(
                "{} linked, {} without preview",
                report.linked.len(),
                report.skipped.len()
            );
        }
        Commands::Cleanup { path, dry_run } => {
            let report = workflow.cleanup_lab(&resolve(&config, &path), dry_run)?;
            info!("{} links removed", report.removed.len());
        }
        Commands::Init { path, example } => {
            workflow.init(&path, InitOptions { example })?;
        }
        Commands::Stats { path } => {
            let path = resolve(&config, &path);
            let stats = statistics(&path, &config)?;
            let width = stats.iter().map(|s| s.label().len()).max().unwrap_or(0) + 1;
            println!("{:width$} {}", "Folder:", path.display());
            for entry in &stats {
                println!(
                    "{:width$} {} ({})",
                    format!("{}:", entry.label()),
                    entry.count,
                    format_size(entry.bytes)
                );
            }
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level);
    debug!(?cli, "arguments");

    match run(cli.command) {
        Ok(()) => {
            println!("OK");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("ERROR: {err:#}");
            ExitCode::FAILURE
        }
    }
}
