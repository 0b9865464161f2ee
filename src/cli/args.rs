//! CLI argument structures

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Cross-validated evaluation over grouped columnar stores
#[derive(Parser)]
#[command(name = "evalgrid")]
#[command(about = "evalgrid - build grouped stores and inspect cross-validation splits", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build or inspect grouped column stores
    Store {
        #[command(subcommand)]
        command: StoreCommands,
    },

    /// Print the cross-validation splits of one group
    Splits {
        /// Store directory
        #[arg(long)]
        store: PathBuf,

        /// Group key to split
        #[arg(long)]
        group: String,

        /// rolling_window or expanding_window
        #[arg(long, default_value = "rolling_window")]
        scheme: String,

        #[arg(long)]
        train_window: usize,

        #[arg(long)]
        test_window: usize,
    },

    /// Work with evaluation configuration files
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum StoreCommands {
    /// Build a file store from a CSV file
    Build {
        /// CSV file with a header row
        #[arg(short, long)]
        input: PathBuf,

        /// Directory to write the store into
        #[arg(short, long)]
        output: PathBuf,

        /// Column the rows are grouped by
        #[arg(short, long)]
        group_key: String,

        /// Numeric or datetime column that orders rows within a group
        #[arg(long)]
        orderby: Option<String>,

        /// Columns to parse as datetimes (repeatable)
        #[arg(long = "datetime", value_name = "COLUMN")]
        datetime_columns: Vec<String>,

        /// float64 or float32
        #[arg(long, default_value = "float64")]
        numeric_dtype: String,
    },

    /// Show the groups, columns and arrays of a store
    Inspect {
        /// Store directory
        store: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Load and validate an evaluation configuration
    Check {
        /// YAML, TOML or JSON configuration file
        path: PathBuf,
    },
}
