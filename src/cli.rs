// src/cli.rs
//! Command line definitions for sysdescribe

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sysdescribe")]
#[command(version)]
#[command(about = "Describe a system by reconciling its package database with its filesystem", long_about = None)]
pub struct Cli {
    /// Configuration file (default: $XDG_CONFIG_HOME/sysdescribe/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Description directory archives are written to
    #[arg(long, global = true)]
    pub store_path: Option<PathBuf>,

    /// Filter definitions, e.g. "/unmanaged_files/files/name=/opt,/srv"
    #[arg(long, global = true)]
    pub exclude: Option<String>,

    /// Log debug messages
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List package files that differ from their package
    ChangedFiles {
        /// List changed config files instead of other package files
        #[arg(long)]
        config_files: bool,
    },

    /// List files not owned by any package
    UnmanagedFiles {
        /// Archive unmanaged files and trees into the description directory
        #[arg(long)]
        extract: bool,

        /// Comma separated paths to leave out; @FILE reads them from a file
        #[arg(long)]
        skip_files: Option<String>,
    },

    /// Show mounted filesystems and their classification
    Mounts,

    /// Show the package owning a path
    Owner {
        /// Absolute path on the inspected system
        path: String,
    },
}
