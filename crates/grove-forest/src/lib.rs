//! Bagged decision-tree ensembles: train, predict, encode.
//!
//! Trains random forest classifiers and regressors on top of a pluggable
//! single-tree learner ([`TreeLearner`], with [`cart::CartLearner`] as the
//! built-in one). Bootstrap resampling and per-tree feature subsampling draw
//! from one explicitly seeded source, trees are fit in parallel via rayon,
//! and fitted ensembles travel as versioned JSON payloads. A
//! [`TrainingChannel`] runs training off the caller's task and lets a newer
//! request supersede an older one.

mod bagging;
pub mod cart;
mod channel;
mod codec;
mod config;
mod dataset;
mod error;
mod features;
mod forest;
mod grid;
mod learner;
mod metrics;
mod predict;
mod random;

pub use bagging::{bag, draw_bootstrap_indices};
pub use channel::{Completed, RunId, TrainingChannel, TrainingRequest};
pub use codec::{EnsemblePayload, FORMAT_VERSION, TreePayload};
pub use config::{
    Aggregation, EnsembleKind, ForestConfig, HyperparameterSpec, ResolvedSizes, SampleSize,
};
pub use dataset::{TrainingSet, train_test_split};
pub use error::{ErrorCategory, ForestError};
pub use features::{draw_feature_indices, select_features};
pub use forest::{Ensemble, TreeEntry, train};
pub use grid::{Curve, DecisionBoundary, GridSpec, evaluate_curve, evaluate_grid};
pub use learner::TreeLearner;
pub use metrics::{ClassificationMetrics, RegressionMetrics};
pub use predict::{PredictionResult, VoteCount, VoteTally, aggregate, mean, mode, tally_votes};
pub use random::{Seed, SeededRandomSource};
