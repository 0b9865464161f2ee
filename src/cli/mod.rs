//! Command-line interface
//!
//! Argument structures live in [`args`], one handler module per command
//! family in [`commands`], and [`router`] dispatches between them.

pub mod args;
pub mod commands;
pub mod router;

pub use args::{Cli, Commands};
pub use router::execute_command;

/// Log filter for a `-v` count
pub fn get_log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}
