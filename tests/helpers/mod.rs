//! Shared fixtures for integration tests: toy pipelines and datasets
#![allow(dead_code)]

use anyhow::{bail, ensure};
use chrono::{Duration, TimeZone, Utc};
use evalgrid::config::EvaluationConfig;
use evalgrid::table::{Column, Table};
use evalgrid::task::{FeatureNames, Pipeline};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};

/// Predicts the mean training target for every test row
///
/// With `predict_every > 1` only every n-th test row gets a prediction.
/// A non-zero `fit_delay` blocks the worker inside `model_fit`.
#[derive(Debug, Clone)]
pub struct MeanPipeline {
    pub predict_every: usize,
    pub fit_delay: std::time::Duration,
}

impl Default for MeanPipeline {
    fn default() -> Self {
        Self {
            predict_every: 1,
            fit_delay: std::time::Duration::ZERO,
        }
    }
}

impl MeanPipeline {
    pub fn sparse(predict_every: usize) -> Self {
        Self {
            predict_every,
            ..Self::default()
        }
    }

    pub fn slow(fit_delay: std::time::Duration) -> Self {
        Self {
            fit_delay,
            ..Self::default()
        }
    }
}

impl Pipeline for MeanPipeline {
    type Model = f64;

    fn preprocess_train_data(&self, train: &Table, _user_configs: &Value) -> anyhow::Result<Table> {
        Ok(train.clone())
    }

    fn model_fit(
        &self,
        prepared_train: &Table,
        _hyperparameters: &Value,
        _estimator: &Value,
        feature_names: &[String],
        target_name: &str,
    ) -> anyhow::Result<f64> {
        if !self.fit_delay.is_zero() {
            std::thread::sleep(self.fit_delay);
        }
        for feature in feature_names {
            prepared_train.numeric(feature)?;
        }
        let target = prepared_train.numeric(target_name)?;
        ensure!(!target.is_empty(), "empty training set");
        Ok(target.iter().sum::<f64>() / target.len() as f64)
    }

    fn preprocess_test_data(
        &self,
        test: &Table,
        _prepared_train: &Table,
        _user_configs: &Value,
    ) -> anyhow::Result<Table> {
        Ok(test.clone())
    }

    fn model_predict(
        &self,
        prepared_test: &Table,
        model: &f64,
        _feature_names: &[String],
        _target_name: &str,
    ) -> anyhow::Result<Table> {
        let ids: Vec<f64> = prepared_test
            .numeric("id")?
            .iter()
            .step_by(self.predict_every.max(1))
            .copied()
            .collect();
        let predictions = vec![*model; ids.len()];
        Ok(Table::new(vec![
            Column::numeric("id", ids),
            Column::numeric("prediction", predictions),
        ])?)
    }

    fn evaluate_prediction(&self, prepared_test: &Table, predictions: &Table) -> anyhow::Result<Value> {
        let predicted = predictions.numeric("prediction")?;
        let target = prepared_test.numeric("target")?;
        let mae = target
            .iter()
            .step_by(self.predict_every.max(1))
            .zip(predicted)
            .map(|(y, p)| (y - p).abs())
            .sum::<f64>()
            / predicted.len().max(1) as f64;
        Ok(json!({ "mae": mae }))
    }
}

/// Fails the first `failures` fits across all tasks, then behaves like [`MeanPipeline`]
#[derive(Debug)]
pub struct FlakyPipeline {
    inner: MeanPipeline,
    failures_left: AtomicU32,
    fits: AtomicU32,
}

impl FlakyPipeline {
    pub fn failing(failures: u32) -> Self {
        Self {
            inner: MeanPipeline::default(),
            failures_left: AtomicU32::new(failures),
            fits: AtomicU32::new(0),
        }
    }

    pub fn fit_calls(&self) -> u32 {
        self.fits.load(Ordering::SeqCst)
    }
}

impl Pipeline for FlakyPipeline {
    type Model = f64;

    fn preprocess_train_data(&self, train: &Table, user_configs: &Value) -> anyhow::Result<Table> {
        self.inner.preprocess_train_data(train, user_configs)
    }

    fn model_fit(
        &self,
        prepared_train: &Table,
        hyperparameters: &Value,
        estimator: &Value,
        feature_names: &[String],
        target_name: &str,
    ) -> anyhow::Result<f64> {
        self.fits.fetch_add(1, Ordering::SeqCst);
        let took_failure = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if took_failure {
            bail!("simulated worker failure");
        }
        self.inner
            .model_fit(prepared_train, hyperparameters, estimator, feature_names, target_name)
    }

    fn preprocess_test_data(
        &self,
        test: &Table,
        prepared_train: &Table,
        user_configs: &Value,
    ) -> anyhow::Result<Table> {
        self.inner.preprocess_test_data(test, prepared_train, user_configs)
    }

    fn model_predict(
        &self,
        prepared_test: &Table,
        model: &f64,
        feature_names: &[String],
        target_name: &str,
    ) -> anyhow::Result<Table> {
        self.inner
            .model_predict(prepared_test, model, feature_names, target_name)
    }

    fn evaluate_prediction(&self, prepared_test: &Table, predictions: &Table) -> anyhow::Result<Value> {
        self.inner.evaluate_prediction(prepared_test, predictions)
    }
}

/// Rows for each `(group, rows)` pair
///
/// Columns: `group` (text), `id` (unique across groups), `date` (one day
/// apart, stored newest first), `x` and `target = 3x + 1`.
pub fn dataset(groups: &[(&str, usize)]) -> Table {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let mut group = Vec::new();
    let mut id = Vec::new();
    let mut date = Vec::new();
    let mut x = Vec::new();
    let mut target = Vec::new();

    let mut next_id = 0.0;
    for (key, rows) in groups {
        for i in 0..*rows {
            let day = (rows - 1 - i) as f64;
            group.push(key.to_string());
            id.push(next_id);
            date.push(start + Duration::days(day as i64));
            x.push(day);
            target.push(3.0 * day + 1.0);
            next_id += 1.0;
        }
    }

    Table::new(vec![
        Column::text("group", group),
        Column::numeric("id", id),
        Column::datetime("date", date),
        Column::numeric("x", x),
        Column::numeric("target", target),
    ])
    .unwrap()
}

/// Write a small CSV with two groups in shuffled time order
pub fn write_csv(path: &Path, rows_per_group: usize) {
    let mut out = String::from("group,id,date,x,target\n");
    let mut id = 0;
    for key in ["north", "south"] {
        for i in 0..rows_per_group {
            let day = (i * 7) % rows_per_group;
            out.push_str(&format!(
                "{},{},2024-01-{:02},{},{}\n",
                key,
                id,
                day + 1,
                day,
                3 * day + 1
            ));
            id += 1;
        }
    }
    std::fs::write(path, out).unwrap();
}

/// Configuration for the `dataset` columns with 60/20 windows ordered by date
pub fn config(workspace_root: &Path) -> EvaluationConfig {
    let mut config = EvaluationConfig::default();
    config.run_id = "test-run".to_string();
    config.workspace_root = workspace_root.to_path_buf();
    config.group_key = "group".to_string();
    config.feature_names = FeatureNames::Shared(vec!["x".to_string()]);
    config.cross_validation.train_window = 60;
    config.cross_validation.test_window = 20;
    config.cross_validation.orderby = Some("date".to_string());
    config.resources.local_workers = 2;
    config
}
