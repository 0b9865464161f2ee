//! User-supplied modeling pipeline
//!
//! The engine never looks inside these operations; it only sequences them,
//! threads their outputs and reports their failures. Each operation is
//! synchronous and runs on a blocking thread of the worker that owns the
//! task attempt.

use serde_json::Value;

use crate::table::Table;

/// The five operations evaluated for every (group, split) task
pub trait Pipeline: Send + Sync + 'static {
    /// Fitted model handed from `model_fit` to `model_predict`
    type Model: Send;

    /// Prepare the raw train rows
    fn preprocess_train_data(&self, train: &Table, user_configs: &Value) -> anyhow::Result<Table>;

    /// Fit a model on the prepared train rows
    fn model_fit(
        &self,
        prepared_train: &Table,
        hyperparameters: &Value,
        estimator: &Value,
        feature_names: &[String],
        target_name: &str,
    ) -> anyhow::Result<Self::Model>;

    /// Prepare the raw test rows; may use the prepared train rows
    fn preprocess_test_data(
        &self,
        test: &Table,
        prepared_train: &Table,
        user_configs: &Value,
    ) -> anyhow::Result<Table>;

    /// Predict the prepared test rows
    ///
    /// The output must carry the identity column and the prediction column
    /// when predictions are recorded.
    fn model_predict(
        &self,
        prepared_test: &Table,
        model: &Self::Model,
        feature_names: &[String],
        target_name: &str,
    ) -> anyhow::Result<Table>;

    /// Score the predictions
    fn evaluate_prediction(&self, prepared_test: &Table, predictions: &Table)
        -> anyhow::Result<Value>;
}
