//! Command implementations

pub mod config;
pub mod splits;
pub mod store;

pub use config::run_config_check;
pub use splits::{run_splits_command, SplitsParams};
pub use store::run_store_command;
