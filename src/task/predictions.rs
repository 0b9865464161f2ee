//! Prediction artifacts
//!
//! One artifact per task, named `<group>__<split>.f32`, holding row-major
//! little-endian `f32` pairs `(identity, prediction)`.

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use super::types::TaskId;
use crate::error::{EvalError, EvalResult};
use crate::table::{count_unmatched, inner_join_on, Table};

/// Extension of prediction artifacts
pub const ARTIFACT_EXTENSION: &str = "f32";

/// A written prediction artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictionArtifact {
    pub path: PathBuf,
    pub rows: usize,
    /// Test rows whose identity had no prediction
    pub unmatched: usize,
}

/// File-system safe form of a group key
pub fn sanitize_group_key(group_key: &str) -> String {
    group_key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Artifact file name for a task
pub fn artifact_file_name(task: &TaskId) -> String {
    format!(
        "{}__{}.{}",
        sanitize_group_key(&task.group_key),
        task.split_index,
        ARTIFACT_EXTENSION
    )
}

/// Join predictions onto the test rows and persist them
///
/// Identities present only in `test` are dropped. The file is written to
/// a temporary name and renamed into place.
pub async fn record_predictions(
    dir: &Path,
    task: &TaskId,
    test: &Table,
    predictions: &Table,
    identity_column: &str,
    prediction_column: &str,
) -> EvalResult<PredictionArtifact> {
    for (table, role) in [(predictions, "predictions"), (test, "test data")] {
        if let Err(e) = table.numeric(identity_column) {
            return Err(EvalError::PredictionFormat(format!("{}: {}", role, e)));
        }
    }
    if let Err(e) = predictions.numeric(prediction_column) {
        return Err(EvalError::PredictionFormat(format!("predictions: {}", e)));
    }

    let joined = inner_join_on(test, predictions, identity_column, prediction_column)?;
    let unmatched = count_unmatched(test, predictions, identity_column)?;
    if unmatched > 0 {
        debug!(
            "Task {}: {} test rows without a matching prediction were dropped",
            task, unmatched
        );
    }

    let identities = joined.numeric(identity_column)?;
    let values = joined.numeric(prediction_column)?;
    let mut bytes = Vec::with_capacity(identities.len() * 8);
    for (identity, value) in identities.iter().zip(values) {
        bytes.extend_from_slice(&(*identity as f32).to_le_bytes());
        bytes.extend_from_slice(&(*value as f32).to_le_bytes());
    }

    let path = dir.join(artifact_file_name(task));
    let persist = |source| EvalError::Persistence {
        path: path.clone(),
        source,
    };
    fs::create_dir_all(dir).await.map_err(persist)?;
    let tmp = dir.join(format!(".{}.{}", artifact_file_name(task), Uuid::new_v4()));
    fs::write(&tmp, &bytes).await.map_err(persist)?;
    if let Err(e) = fs::rename(&tmp, &path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(persist(e));
    }

    debug!("Recorded {} predictions to {}", joined.num_rows(), path.display());
    Ok(PredictionArtifact {
        rows: joined.num_rows(),
        unmatched,
        path,
    })
}

/// Decode an artifact into `(identity, prediction)` pairs
pub async fn read_prediction_artifact(path: &Path) -> EvalResult<Vec<(f32, f32)>> {
    let bytes = fs::read(path).await?;
    if bytes.len() % 8 != 0 {
        return Err(EvalError::PredictionFormat(format!(
            "{}: {} bytes is not a whole number of (identity, prediction) pairs",
            path.display(),
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(8)
        .map(|pair| {
            let identity = f32::from_le_bytes([pair[0], pair[1], pair[2], pair[3]]);
            let value = f32::from_le_bytes([pair[4], pair[5], pair[6], pair[7]]);
            (identity, value)
        })
        .collect())
}
