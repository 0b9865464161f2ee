//! Command routing

use anyhow::Result;

use crate::cli::args::{Commands, ConfigCommands};
use crate::cli::commands::*;

/// Execute a parsed command
pub async fn execute_command(command: Commands) -> Result<()> {
    match command {
        Commands::Store { command } => run_store_command(command).await,
        Commands::Splits {
            store,
            group,
            scheme,
            train_window,
            test_window,
        } => {
            run_splits_command(SplitsParams {
                store,
                group,
                scheme,
                train_window,
                test_window,
            })
            .await
        }
        Commands::Config {
            command: ConfigCommands::Check { path },
        } => run_config_check(&path).await,
    }
}
