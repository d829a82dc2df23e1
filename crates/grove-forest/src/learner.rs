//! The narrow capability the ensemble engine needs from a single-tree learner.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::config::EnsembleKind;

/// A single decision-tree learner driven by the ensemble engine.
///
/// The engine treats [`TreeLearner::Model`] as an opaque value: it trains
/// one per tree on a resampled, column-reduced set, asks it for
/// predictions on rows projected onto the same columns, and moves it
/// across the training channel through [`TreeLearner::serialize`] and
/// [`TreeLearner::deserialize`].
pub trait TreeLearner: Send + Sync + 'static {
    /// A fitted tree.
    type Model: Send + Sync + 'static;
    /// Learner options passed through the ensemble configuration untouched.
    type Options: Clone + Send + Sync + Serialize + DeserializeOwned + 'static;
    /// The learner's own failure type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fit one tree.
    ///
    /// Implementations must fail when `features.len() != labels.len()` or
    /// when there are no rows.
    fn train(
        &self,
        kind: EnsembleKind,
        features: &[Vec<f64>],
        labels: &[f64],
        options: &Self::Options,
    ) -> Result<Self::Model, Self::Error>;

    /// Predict one value per row. Must accept any positive row count.
    fn predict(&self, model: &Self::Model, features: &[Vec<f64>]) -> Result<Vec<f64>, Self::Error>;

    /// Convert a fitted tree into a JSON-representable value.
    fn serialize(&self, model: &Self::Model) -> Result<serde_json::Value, Self::Error>;

    /// Rebuild a fitted tree from [`TreeLearner::serialize`] output.
    fn deserialize(&self, value: serde_json::Value) -> Result<Self::Model, Self::Error>;
}
