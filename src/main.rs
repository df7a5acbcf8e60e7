// src/main.rs

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use serde::Serialize;
use sysdescribe::config::InspectConfig;
use sysdescribe::diagnostics::LogDiagnostics;
use sysdescribe::filesystem::MountPoints;
use sysdescribe::filter::build_filter;
use sysdescribe::reconcile::PackageFileReconciler;
use sysdescribe::system::LocalSystem;
use tracing::info;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = InspectConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(store_path) = cli.store_path {
        config.store_path = store_path;
    }

    let system = LocalSystem::new();
    let diagnostics = LogDiagnostics;

    match cli.command {
        Commands::ChangedFiles { config_files } => {
            let filter = build_filter(&config.filters.default, None, cli.exclude.as_deref())?;
            let reconciler = PackageFileReconciler::new(&system, &diagnostics, config);
            let files = if config_files {
                reconciler.changed_config_files(&filter)?
            } else {
                reconciler.changed_managed_files(&filter)?
            };
            info!("Found {} changed files", files.len());
            print_json(&files)?;
        }
        Commands::UnmanagedFiles { extract, skip_files } => {
            let filter = build_filter(
                &config.filters.default,
                skip_files.as_deref(),
                cli.exclude.as_deref(),
            )?;
            let reconciler = PackageFileReconciler::new(&system, &diagnostics, config);
            let report = reconciler.unmanaged_files(&filter, extract)?;
            print_json(&report)?;
        }
        Commands::Mounts => {
            let mounts = MountPoints::load(&system, &config.mounts.classifier())?;
            print_json(mounts.mounts())?;
        }
        Commands::Owner { path } => {
            let reconciler = PackageFileReconciler::new(&system, &diagnostics, config);
            match reconciler.package_for_file_path(&path)? {
                Some(package) => print_json(&package)?,
                None => println!("{} is not owned by any package", path),
            }
        }
    }

    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
