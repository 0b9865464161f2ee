//! Per-row ordering values used for windowed splitting

use serde::{Deserialize, Serialize};

/// Ordering values of one group, in storage row order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OrderingArray {
    Float64(Vec<f64>),
    /// Integer keys, including datetimes as epoch nanoseconds
    Int64(Vec<i64>),
}

impl OrderingArray {
    /// Storage order as the ordering (row `i` has key `i`)
    pub fn row_index(rows: usize) -> Self {
        Self::Int64((0..rows as i64).collect())
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Float64(values) => values.len(),
            Self::Int64(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Row positions sorted by ordering value
    ///
    /// The sort is stable, so equal keys keep storage order. Floats use the
    /// IEEE total order (NaN sorts last).
    pub fn argsort(&self) -> Vec<usize> {
        let mut positions: Vec<usize> = (0..self.len()).collect();
        match self {
            Self::Float64(values) => positions.sort_by(|&a, &b| values[a].total_cmp(&values[b])),
            Self::Int64(values) => positions.sort_by_key(|&p| values[p]),
        }
        positions
    }

    /// Compare the keys of two rows
    pub fn cmp_rows(&self, a: usize, b: usize) -> std::cmp::Ordering {
        match self {
            Self::Float64(values) => values[a].total_cmp(&values[b]),
            Self::Int64(values) => values[a].cmp(&values[b]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argsort_is_stable() {
        let ordering = OrderingArray::Int64(vec![3, 1, 3, 0]);
        assert_eq!(ordering.argsort(), vec![3, 1, 0, 2]);
    }

    #[test]
    fn test_argsort_floats_with_nan_last() {
        let ordering = OrderingArray::Float64(vec![2.0, f64::NAN, -1.0]);
        assert_eq!(ordering.argsort(), vec![2, 0, 1]);
    }

    #[test]
    fn test_row_index() {
        let ordering = OrderingArray::row_index(4);
        assert_eq!(ordering.argsort(), vec![0, 1, 2, 3]);
    }
}
