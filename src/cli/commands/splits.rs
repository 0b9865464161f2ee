//! `evalgrid splits`

use anyhow::{Context, Result};
use std::ops::Range;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cv::{CrossValidationScheme, CrossValidationSplitter};
use crate::store::{FileBackend, GroupedColumnStore};

pub struct SplitsParams {
    pub store: PathBuf,
    pub group: String,
    pub scheme: String,
    pub train_window: usize,
    pub test_window: usize,
}

/// Print every split of a group as ranges over the sorted rows
pub async fn run_splits_command(params: SplitsParams) -> Result<()> {
    let scheme: CrossValidationScheme = params.scheme.parse()?;
    let backend = FileBackend::open(&params.store)
        .await
        .with_context(|| format!("No store at {}", params.store.display()))?;
    let store = GroupedColumnStore::open(Arc::new(backend)).await?;
    let ordering = store.read_ordering(&params.group).await?;

    let splitter =
        CrossValidationSplitter::new(scheme, params.train_window, params.test_window, &ordering)
            .with_context(|| format!("Cannot split group '{}'", params.group))?;

    // rank[position] = place of that row in sorted order
    let mut rank = vec![0; ordering.len()];
    for (place, position) in ordering.argsort().into_iter().enumerate() {
        rank[position] = place;
    }

    println!(
        "Group '{}': {} rows, {} {} splits",
        params.group,
        ordering.len(),
        splitter.n_splits(),
        splitter.scheme()
    );
    for split in splitter.split() {
        println!(
            "split {}: train {} test {}",
            split.index,
            format_range(sorted_range(&split.train, &rank)),
            format_range(sorted_range(&split.test, &rank)),
        );
    }
    Ok(())
}

fn sorted_range(positions: &[usize], rank: &[usize]) -> Range<usize> {
    let places = positions.iter().map(|&p| rank[p]);
    let start = places.clone().min().unwrap_or(0);
    let end = places.max().map_or(start, |last| last + 1);
    start..end
}

fn format_range(range: Range<usize>) -> String {
    format!("[{}, {}) ({} rows)", range.start, range.end, range.len())
}
