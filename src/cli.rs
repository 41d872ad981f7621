//! Command-line interface definition for junban.
//!
//! This module defines the CLI structure using clap derive macros,
//! including all subcommands and their arguments.

use crate::config::LogLevel;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// junban - Dependency-ordered startup and shutdown of local services
///
/// Resolves the dependency graph of the configured services, starts them
/// in order while waiting on each dependency's readiness, and stops them
/// in reverse.
#[derive(Debug, Parser)]
#[command(name = "junban")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, env = "JUNBAN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Returns the log level forced by the verbose/quiet flags, if any.
    pub fn log_level(&self) -> Option<LogLevel> {
        if self.quiet {
            return Some(LogLevel::Error);
        }

        match self.verbose {
            0 => None,
            1 => Some(LogLevel::Debug),
            _ => Some(LogLevel::Trace),
        }
    }
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the control API server
    Serve(ServeArgs),

    /// Print the resolved startup order
    Plan(PlanArgs),

    /// Start every enabled service in dependency order
    Up(ProfileArgs),

    /// Stop every enabled service in reverse dependency order
    Down(ProfileArgs),

    /// Start one service, waiting on its dependencies
    Start(ServiceArgs),

    /// Stop one service
    Stop(ServiceArgs),

    /// Stop then start one service
    Restart(ServiceArgs),

    /// Probe the readiness of every enabled service once
    Status(ProfileArgs),

    /// Configuration file operations
    #[command(subcommand)]
    Config(ConfigCommands),
}

/// Arguments for the `serve` subcommand.
#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Bind address (overrides server.bind)
    #[arg(long)]
    pub bind: Option<String>,

    /// Listen port (overrides server.port)
    #[arg(long)]
    pub port: Option<u16>,
}

/// Profile selection shared by graph-wide subcommands.
#[derive(Debug, Args)]
pub struct ProfileArgs {
    /// Profile to resolve for (defaults to active_profile)
    #[arg(short, long)]
    pub profile: Option<String>,
}

/// Arguments for the `plan` subcommand.
#[derive(Debug, Args)]
pub struct PlanArgs {
    #[command(flatten)]
    pub profile: ProfileArgs,

    /// Print the resolved order as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for single-service subcommands.
#[derive(Debug, Args)]
pub struct ServiceArgs {
    /// Service id
    pub service: String,

    #[command(flatten)]
    pub profile: ProfileArgs,
}

/// Configuration subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Validate the configuration file
    Validate,

    /// Show the current configuration
    Show,
}
