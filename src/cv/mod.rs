//! Windowed cross-validation splitting
//!
//! A [`CrossValidationSplitter`] turns a group's ordering array into a
//! finite, restartable sequence of `(train, test)` row-position sets.
//! Positions index the group's storage rows; they are recomputed on every
//! call and never persisted.
//!
//! ```text
//! sorted rows:  0 ........................................... n
//! rolling   #0: [ train (T) ][ test (W) ]
//! rolling   #1:       [ train (T) ][ test (W) ]
//! expanding #1: [ train (T + W)   ][ test (W) ]
//! ```

mod ordering;

pub use ordering::OrderingArray;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while constructing a splitter
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemeError {
    #[error("train_window and test_window must be positive (got {train_window} and {test_window})")]
    ZeroWindow {
        train_window: usize,
        test_window: usize,
    },

    #[error("windows of {train_window} + {test_window} rows exceed the {rows} available rows")]
    WindowsExceedRows {
        train_window: usize,
        test_window: usize,
        rows: usize,
    },

    #[error("unknown cross-validation scheme '{0}'")]
    UnknownScheme(String),
}

/// Requested split beyond the available splits
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("split index {requested} out of range ({available} splits available)")]
pub struct SplitIndexError {
    pub requested: usize,
    pub available: usize,
}

/// How the train window moves between splits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossValidationScheme {
    /// Fixed-size train window trailing the test window
    #[serde(alias = "rolling")]
    RollingWindow,
    /// Train window grows from the first row
    #[serde(alias = "expanding")]
    ExpandingWindow,
}

impl fmt::Display for CrossValidationScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RollingWindow => write!(f, "rolling_window"),
            Self::ExpandingWindow => write!(f, "expanding_window"),
        }
    }
}

impl FromStr for CrossValidationScheme {
    type Err = SchemeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rolling_window" | "rolling" => Ok(Self::RollingWindow),
            "expanding_window" | "expanding" => Ok(Self::ExpandingWindow),
            other => Err(SchemeError::UnknownScheme(other.to_string())),
        }
    }
}

/// One train/test pair of row positions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub index: usize,
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Deterministic generator of windowed train/test splits
#[derive(Debug, Clone)]
pub struct CrossValidationSplitter {
    scheme: CrossValidationScheme,
    train_window: usize,
    test_window: usize,
    sorted_positions: Vec<usize>,
}

impl CrossValidationSplitter {
    /// Build a splitter over a group's ordering array
    pub fn new(
        scheme: CrossValidationScheme,
        train_window: usize,
        test_window: usize,
        ordering: &OrderingArray,
    ) -> Result<Self, SchemeError> {
        if train_window == 0 || test_window == 0 {
            return Err(SchemeError::ZeroWindow {
                train_window,
                test_window,
            });
        }
        let rows = ordering.len();
        if train_window
            .checked_add(test_window)
            .map_or(true, |needed| needed > rows)
        {
            return Err(SchemeError::WindowsExceedRows {
                train_window,
                test_window,
                rows,
            });
        }

        Ok(Self {
            scheme,
            train_window,
            test_window,
            sorted_positions: ordering.argsort(),
        })
    }

    pub fn scheme(&self) -> CrossValidationScheme {
        self.scheme
    }

    /// Number of windows that fit without truncation
    pub fn n_splits(&self) -> usize {
        (self.sorted_positions.len() - self.train_window) / self.test_window
    }

    /// Lazy sequence of every split; call again to restart
    pub fn split(&self) -> Splits<'_> {
        Splits {
            splitter: self,
            next: 0,
        }
    }

    /// Compute split `index`
    pub fn nth_split(&self, index: usize) -> Result<Split, SplitIndexError> {
        let available = self.n_splits();
        if index >= available {
            return Err(SplitIndexError {
                requested: index,
                available,
            });
        }
        Ok(self.build(index))
    }

    fn build(&self, index: usize) -> Split {
        let test_start = self.train_window + index * self.test_window;
        let train_start = match self.scheme {
            CrossValidationScheme::RollingWindow => index * self.test_window,
            CrossValidationScheme::ExpandingWindow => 0,
        };
        Split {
            index,
            train: self.sorted_positions[train_start..test_start].to_vec(),
            test: self.sorted_positions[test_start..test_start + self.test_window].to_vec(),
        }
    }
}

/// Iterator over the splits of a [`CrossValidationSplitter`]
#[derive(Debug, Clone)]
pub struct Splits<'a> {
    splitter: &'a CrossValidationSplitter,
    next: usize,
}

impl Iterator for Splits<'_> {
    type Item = Split;

    fn next(&mut self) -> Option<Split> {
        if self.next >= self.splitter.n_splits() {
            return None;
        }
        let split = self.splitter.build(self.next);
        self.next += 1;
        Some(split)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.splitter.n_splits().saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Splits<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn ordered(rows: usize) -> OrderingArray {
        OrderingArray::row_index(rows)
    }

    #[test]
    fn test_rolling_scenario_100_60_20() {
        let cv = CrossValidationSplitter::new(
            CrossValidationScheme::RollingWindow,
            60,
            20,
            &ordered(100),
        )
        .unwrap();
        assert_eq!(cv.n_splits(), 2);

        let splits: Vec<_> = cv.split().collect();
        assert_eq!(splits[0].train, (0..60).collect::<Vec<_>>());
        assert_eq!(splits[0].test, (60..80).collect::<Vec<_>>());
        assert_eq!(splits[1].train, (20..80).collect::<Vec<_>>());
        assert_eq!(splits[1].test, (80..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_expanding_scenario_100_60_20() {
        let cv = CrossValidationSplitter::new(
            CrossValidationScheme::ExpandingWindow,
            60,
            20,
            &ordered(100),
        )
        .unwrap();
        let split = cv.nth_split(1).unwrap();
        assert_eq!(split.train, (0..80).collect::<Vec<_>>());
        assert_eq!(split.test, (80..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_positions_follow_ordering_not_storage() {
        let ordering = OrderingArray::Float64(vec![4.0, 3.0, 2.0, 1.0, 0.0]);
        let cv = CrossValidationSplitter::new(
            CrossValidationScheme::RollingWindow,
            3,
            1,
            &ordering,
        )
        .unwrap();
        let split = cv.nth_split(0).unwrap();
        assert_eq!(split.train, vec![4, 3, 2]);
        assert_eq!(split.test, vec![1]);
    }

    #[test]
    fn test_windows_exceeding_rows_rejected() {
        let err = CrossValidationSplitter::new(
            CrossValidationScheme::RollingWindow,
            60,
            50,
            &ordered(100),
        )
        .unwrap_err();
        assert_eq!(
            err,
            SchemeError::WindowsExceedRows {
                train_window: 60,
                test_window: 50,
                rows: 100
            }
        );
    }

    #[test]
    fn test_huge_windows_rejected_without_overflow() {
        let err = CrossValidationSplitter::new(
            CrossValidationScheme::ExpandingWindow,
            usize::MAX,
            2,
            &ordered(10),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SchemeError::WindowsExceedRows {
                train_window: usize::MAX,
                rows: 10,
                ..
            }
        ));
    }

    #[test]
    fn test_zero_window_rejected() {
        let err = CrossValidationSplitter::new(
            CrossValidationScheme::RollingWindow,
            0,
            5,
            &ordered(10),
        )
        .unwrap_err();
        assert!(matches!(err, SchemeError::ZeroWindow { .. }));
    }

    #[test]
    fn test_nth_split_out_of_range() {
        let cv = CrossValidationSplitter::new(
            CrossValidationScheme::RollingWindow,
            5,
            5,
            &ordered(10),
        )
        .unwrap();
        assert_eq!(
            cv.nth_split(1).unwrap_err(),
            SplitIndexError {
                requested: 1,
                available: 1
            }
        );
    }

    #[test]
    fn test_split_is_restartable_and_exact_size() {
        let cv = CrossValidationSplitter::new(
            CrossValidationScheme::RollingWindow,
            4,
            2,
            &ordered(12),
        )
        .unwrap();
        let first: Vec<_> = cv.split().collect();
        let second: Vec<_> = cv.split().collect();
        assert_eq!(first, second);
        assert_eq!(cv.split().len(), 4);
    }

    #[test]
    fn test_scheme_parsing() {
        assert_eq!(
            "rolling".parse::<CrossValidationScheme>().unwrap(),
            CrossValidationScheme::RollingWindow
        );
        assert_eq!(
            "expanding_window".parse::<CrossValidationScheme>().unwrap(),
            CrossValidationScheme::ExpandingWindow
        );
        assert!("kfold".parse::<CrossValidationScheme>().is_err());
        let yaml: CrossValidationScheme = serde_yaml::from_str("expanding").unwrap();
        assert_eq!(yaml, CrossValidationScheme::ExpandingWindow);
    }

    proptest! {
        #[test]
        fn test_splits_disjoint_and_advancing(
            keys in prop::collection::vec(-1_000_000i64..1_000_000i64, 2..200),
            train_window in 1usize..50,
            test_window in 1usize..20,
            expanding in any::<bool>(),
        ) {
            let ordering = OrderingArray::Int64(keys);
            let scheme = if expanding {
                CrossValidationScheme::ExpandingWindow
            } else {
                CrossValidationScheme::RollingWindow
            };
            let Ok(cv) = CrossValidationSplitter::new(scheme, train_window, test_window, &ordering) else {
                prop_assert!(train_window + test_window > ordering.len());
                return Ok(());
            };

            let rows = ordering.len();
            prop_assert_eq!(cv.n_splits(), (rows - train_window) / test_window);

            let splits: Vec<_> = cv.split().collect();
            for split in &splits {
                let train: HashSet<_> = split.train.iter().collect();
                prop_assert!(split.test.iter().all(|p| !train.contains(p)));
                prop_assert_eq!(split.test.len(), test_window);
                // every train row sorts at or before every test row
                for &t in &split.test {
                    for &r in &split.train {
                        prop_assert!(ordering.cmp_rows(r, t) != std::cmp::Ordering::Greater);
                    }
                }
            }
            for pair in splits.windows(2) {
                let last_prev = *pair[0].test.last().unwrap();
                let first_next = pair[1].test[0];
                prop_assert!(ordering.cmp_rows(last_prev, first_next) != std::cmp::Ordering::Greater);
            }
        }
    }
}
