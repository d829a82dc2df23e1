use std::path::PathBuf;

/// Broad class of a [`ForestError`], used by callers that only need to know
/// which kind of failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Hyperparameters or a model payload are invalid.
    Configuration,
    /// Data dimensions do not line up.
    Shape,
    /// A vote tally saw a prediction outside `{-1, +1}`.
    LabelDomain,
    /// The tree learner failed.
    Learner,
    /// Encoding, file I/O, or the training channel failed.
    Transport,
}

/// Errors from ensemble training, prediction, encoding, and the training channel.
#[derive(Debug, thiserror::Error)]
pub enum ForestError {
    /// Returned when tree_count is zero.
    #[error("tree_count must be at least 1, got {tree_count}")]
    InvalidTreeCount {
        /// The invalid tree_count value provided.
        tree_count: usize,
    },

    /// Returned when a size is neither a fraction in (0.0, 1.0] nor a whole count.
    #[error("{parameter} must be a fraction in (0.0, 1.0] or a whole count, got {fraction}")]
    InvalidFraction {
        /// Name of the hyperparameter.
        parameter: &'static str,
        /// The invalid fraction.
        fraction: f64,
    },

    /// Returned when a size resolves to 0 or exceeds what the data provides.
    #[error("{parameter} resolved to {resolved}, but must be in [1, {available}]")]
    InvalidSampleSize {
        /// Name of the hyperparameter.
        parameter: &'static str,
        /// The resolved count.
        resolved: usize,
        /// Rows or columns available in the training set.
        available: usize,
    },

    /// Returned when the aggregation name is not recognized.
    #[error("unsupported aggregation \"{name}\" (expected mean or mode)")]
    UnknownAggregation {
        /// The unrecognized name.
        name: String,
    },

    /// Returned when the ensemble kind discriminator is not recognized.
    #[error("unsupported ensemble kind \"{name}\" (expected classifier or regressor)")]
    UnknownKind {
        /// The unrecognized discriminator.
        name: String,
    },

    /// Returned when a model payload carries no kind discriminator.
    #[error("model payload has no kind discriminator")]
    MissingKind,

    /// Returned when a payload of one kind is decoded as another.
    #[error("expected a {expected} payload, found {found}")]
    KindMismatch {
        /// Kind the caller asked for.
        expected: String,
        /// Kind recorded in the payload.
        found: String,
    },

    /// Returned when decoding a payload with an incompatible format version.
    #[error("incompatible model format version: expected {expected}, found {found}")]
    IncompatibleModelVersion {
        /// The format version this build expects.
        expected: u32,
        /// The format version found in the payload.
        found: u32,
    },

    /// Returned when a payload is structurally valid JSON but inconsistent.
    #[error("corrupt model payload: {reason}")]
    CorruptPayload {
        /// What was inconsistent.
        reason: String,
    },

    /// Returned when a boundary grid request cannot be evaluated.
    #[error("invalid grid: {reason}")]
    InvalidGrid {
        /// Why the grid was rejected.
        reason: String,
    },

    /// Returned when the number of labels differs from the number of rows.
    #[error("training set has {rows} rows but {labels} labels")]
    LabelCountMismatch {
        /// Number of feature rows.
        rows: usize,
        /// Number of labels.
        labels: usize,
    },

    /// Returned when the training set has zero rows.
    #[error("training dataset has zero samples")]
    EmptyDataset,

    /// Returned when the training set has zero feature columns.
    #[error("training dataset has zero feature columns")]
    ZeroFeatures,

    /// Returned when a row has a different number of features than the first row.
    #[error("sample {sample_index} has {got} features, expected {expected}")]
    FeatureCountMismatch {
        /// The expected number of features.
        expected: usize,
        /// The actual number of features in the row.
        got: usize,
        /// The zero-based index of the offending row.
        sample_index: usize,
    },

    /// Returned when a training value is NaN or infinite.
    #[error("non-finite value at sample {sample_index}, feature {feature_index}")]
    NonFiniteValue {
        /// The zero-based index of the offending row.
        sample_index: usize,
        /// The zero-based index of the offending column.
        feature_index: usize,
    },

    /// Returned when a prediction row has the wrong width.
    #[error("prediction row {row_index} has {got} features, expected {expected}")]
    PredictionFeatureMismatch {
        /// The number of columns the ensemble was trained on.
        expected: usize,
        /// The width of the offending row.
        got: usize,
        /// The zero-based index of the offending row.
        row_index: usize,
    },

    /// Returned when a tree returns the wrong number of predictions.
    #[error("tree {tree_index} returned {got} predictions for {expected} rows")]
    PredictionCountMismatch {
        /// The zero-based tree index.
        tree_index: usize,
        /// The number of rows queried.
        expected: usize,
        /// The number of predictions returned.
        got: usize,
    },

    /// Returned when a vote tally sees a value other than -1 or +1.
    #[error("tree {tree_index} voted {value} for row {row_index}; votes must be -1 or +1")]
    LabelOutsideVoteDomain {
        /// The zero-based row index.
        row_index: usize,
        /// The zero-based tree index.
        tree_index: usize,
        /// The offending prediction.
        value: f64,
    },

    /// Returned when the tree learner fails for one tree.
    #[error("tree learner failed on tree {tree_index}")]
    Learner {
        /// The zero-based tree index.
        tree_index: usize,
        /// The learner's own error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Returned when JSON encoding or decoding fails.
    #[error("failed to encode or decode model payload")]
    Codec {
        /// The underlying serde_json error.
        #[from]
        source: serde_json::Error,
    },

    /// Returned when writing the model file fails.
    #[error("failed to write model to {path}")]
    WriteModel {
        /// Path to the file that could not be written.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when reading the model file fails.
    #[error("failed to read model from {path}")]
    ReadModel {
        /// Path to the file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when a training run is stopped because a newer run superseded it.
    #[error("training run was cancelled")]
    Cancelled,

    /// Returned when waiting for a model while no run is in flight.
    #[error("no training run is in flight")]
    NoActiveRun,

    /// Returned when the background training task panicked.
    #[error("training worker failed: {reason}")]
    WorkerFailed {
        /// Description of the failure.
        reason: String,
    },
}

impl ForestError {
    /// Map this error onto its broad category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidTreeCount { .. }
            | Self::InvalidFraction { .. }
            | Self::InvalidSampleSize { .. }
            | Self::UnknownAggregation { .. }
            | Self::UnknownKind { .. }
            | Self::MissingKind
            | Self::KindMismatch { .. }
            | Self::IncompatibleModelVersion { .. }
            | Self::CorruptPayload { .. }
            | Self::InvalidGrid { .. } => ErrorCategory::Configuration,
            Self::LabelCountMismatch { .. }
            | Self::EmptyDataset
            | Self::ZeroFeatures
            | Self::FeatureCountMismatch { .. }
            | Self::NonFiniteValue { .. }
            | Self::PredictionFeatureMismatch { .. }
            | Self::PredictionCountMismatch { .. } => ErrorCategory::Shape,
            Self::LabelOutsideVoteDomain { .. } => ErrorCategory::LabelDomain,
            Self::Learner { .. } => ErrorCategory::Learner,
            Self::Codec { .. }
            | Self::WriteModel { .. }
            | Self::ReadModel { .. }
            | Self::Cancelled
            | Self::NoActiveRun
            | Self::WorkerFailed { .. } => ErrorCategory::Transport,
        }
    }
}
