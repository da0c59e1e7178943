//! Command-line argument parsing for tunekit
//!
//! Provides clap-based CLI with subcommands and verbosity control.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// tunekit - profile a machine, run tune-up pipelines, measure the connection
#[derive(Parser, Debug)]
#[command(name = "tunekit")]
#[command(version)]
#[command(about = "Profile hardware, run gated tune-up tasks and diagnose network quality", long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level: -q (quiet), default (normal), -v (verbose), -vv (very verbose)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress all output except final result)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Print the final result as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Probe hardware and print the performance profile
    Profile,

    /// Run the tune-up pipeline
    Optimize {
        /// Also run tasks marked unsafe
        #[arg(long)]
        aggressive: bool,

        /// Create a restore point before the first task
        #[arg(long)]
        restore_point: bool,

        /// Walk the pipeline without performing any action
        #[arg(long)]
        dry_run: bool,

        /// Only run tasks in these phases (repeatable)
        #[arg(long = "phase", value_name = "PHASE")]
        phases: Vec<String>,
    },

    /// Measure latency, jitter, loss and download speed
    Network {
        /// Apply the network safe reset between the two rounds
        #[arg(long)]
        optimize: bool,

        /// Echo target address, replaces the configured targets (repeatable)
        #[arg(long = "target", value_name = "ADDRESS")]
        targets: Vec<String>,
    },

    /// List the task catalog
    Tasks,

    /// Display current configuration
    Config {
        /// Write the default configuration to the config path
        #[arg(long)]
        init: bool,

        /// Overwrite an existing file with --init
        #[arg(long)]
        force: bool,
    },
}

/// Verbosity level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    VeryVerbose,
}

impl Args {
    /// Get verbosity level based on flags
    pub fn verbosity(&self) -> Verbosity {
        self.verbosity_or(Verbosity::Normal)
    }

    /// Verbosity from flags, `default` when none were given
    pub fn verbosity_or(&self, default: Verbosity) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => default,
                1 => Verbosity::Verbose,
                _ => Verbosity::VeryVerbose,
            }
        }
    }
}

impl Verbosity {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "quiet",
            Verbosity::Normal => "normal",
            Verbosity::Verbose => "verbose",
            Verbosity::VeryVerbose => "very_verbose",
        }
    }

    /// Parse the configuration spelling
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "quiet" => Some(Verbosity::Quiet),
            "normal" => Some(Verbosity::Normal),
            "verbose" => Some(Verbosity::Verbose),
            "very_verbose" => Some(Verbosity::VeryVerbose),
            _ => None,
        }
    }

    /// Default tracing filter directive
    pub fn tracing_level(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "warn",
            Verbosity::Normal => "info",
            Verbosity::Verbose => "debug",
            Verbosity::VeryVerbose => "trace",
        }
    }

    /// Check if should show progress bars
    pub fn show_progress(&self) -> bool {
        !matches!(self, Verbosity::Quiet)
    }

    /// Check if should show per-task log lines
    pub fn show_events(&self) -> bool {
        matches!(self, Verbosity::Verbose | Verbosity::VeryVerbose)
    }
}
