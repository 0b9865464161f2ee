//! Run workspace handling

use std::path::Path;
use tokio::fs;
use tracing::{info, warn};

use crate::error::{EvalError, EvalResult};

/// Create an empty workspace at `path`, removing any previous run's content
///
/// Returns whether an existing workspace was replaced.
pub async fn recreate(path: &Path) -> EvalResult<bool> {
    let workspace_err = |source| EvalError::Workspace {
        path: path.to_path_buf(),
        source,
    };

    let existed = fs::try_exists(path).await.map_err(workspace_err)?;
    if existed {
        warn!(
            "Workspace {} already exists; removing it before the run",
            path.display()
        );
        fs::remove_dir_all(path).await.map_err(workspace_err)?;
    }

    fs::create_dir_all(path).await.map_err(workspace_err)?;
    info!("Workspace ready at {}", path.display());
    Ok(existed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_recreate_clears_previous_content() {
        let tmp = TempDir::new().unwrap();
        let workspace = tmp.path().join("run-1");

        assert!(!recreate(&workspace).await.unwrap());
        std::fs::write(workspace.join("stale.bin"), b"old").unwrap();

        assert!(recreate(&workspace).await.unwrap());
        assert!(workspace.is_dir());
        assert_eq!(std::fs::read_dir(&workspace).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_recreate_over_a_file_fails() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();

        let err = recreate(&blocker.join("run")).await.unwrap_err();
        assert!(matches!(err, EvalError::Workspace { .. }));
    }
}
