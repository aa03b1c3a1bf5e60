//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand};

/// Verify command arguments.
#[derive(Debug, Args)]
pub struct VerifyCommand {
    /// Officer ID to sign in with
    #[arg(long, env = "IDVERIFY_OFFICER_ID")]
    pub officer_id: String,

    /// Officer password
    #[arg(long, env = "IDVERIFY_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Image file standing in for the camera; repeat to verify several faces
    #[arg(short, long = "image", value_name = "FILE", required = true)]
    pub images: Vec<PathBuf>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Shell command arguments.
#[derive(Debug, Args)]
pub struct ShellCommand {
    /// Image file standing in for the camera
    #[arg(long, value_name = "FILE")]
    pub camera: PathBuf,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}
