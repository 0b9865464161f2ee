//! Identity joins between tables

use super::{Column, Table, TableResult};
use std::collections::HashMap;

/// Normalised hash key for a numeric identity; NaN never matches
fn identity_key(value: f64) -> Option<u64> {
    if value.is_nan() {
        None
    } else if value == 0.0 {
        Some(0.0f64.to_bits())
    } else {
        Some(value.to_bits())
    }
}

/// Inner join `right` onto `left` by a numeric key column
///
/// For every row of `left` (in order) and every row of `right` with an
/// equal key (in `right` order) one output row `(key, right_value)` is
/// emitted. Keys present on only one side are dropped.
pub fn inner_join_on(
    left: &Table,
    right: &Table,
    key: &str,
    right_value: &str,
) -> TableResult<Table> {
    let left_keys = left.numeric(key)?;
    let right_values = right.numeric(right_value)?;
    let index = key_index(right.numeric(key)?);

    let mut keys = Vec::new();
    let mut values = Vec::new();
    for &value in left_keys {
        let Some(matches) = identity_key(value).and_then(|k| index.get(&k)) else {
            continue;
        };
        for &row in matches {
            keys.push(value);
            values.push(right_values[row]);
        }
    }

    Table::new(vec![
        Column::numeric(key, keys),
        Column::numeric(right_value, values),
    ])
}

/// Number of `left` rows whose key has no match in `right`
pub fn count_unmatched(left: &Table, right: &Table, key: &str) -> TableResult<usize> {
    let index = key_index(right.numeric(key)?);
    Ok(left
        .numeric(key)?
        .iter()
        .filter(|&&value| identity_key(value).map_or(true, |k| !index.contains_key(&k)))
        .count())
}

/// Rows of `keys` grouped by identity
fn key_index(keys: &[f64]) -> HashMap<u64, Vec<usize>> {
    let mut index: HashMap<u64, Vec<usize>> = HashMap::new();
    for (row, &value) in keys.iter().enumerate() {
        if let Some(k) = identity_key(value) {
            index.entry(k).or_default().push(row);
        }
    }
    index
}
