/// Errors from the CART tree learner.
#[derive(Debug, thiserror::Error)]
pub enum CartError {
    /// Returned when the training input has zero rows.
    #[error("cannot fit a tree on zero samples")]
    EmptyDataset,

    /// Returned when the number of labels differs from the number of rows.
    #[error("{rows} feature rows but {labels} labels")]
    LabelCountMismatch {
        /// Number of feature rows.
        rows: usize,
        /// Number of labels.
        labels: usize,
    },

    /// Returned when rows have zero columns.
    #[error("training rows have zero feature columns")]
    ZeroFeatures,

    /// Returned when a row has a different width than the first row.
    #[error("sample {sample_index} has {got} features, expected {expected}")]
    FeatureCountMismatch {
        /// Width of the first row.
        expected: usize,
        /// Width of the offending row.
        got: usize,
        /// The zero-based index of the offending row.
        sample_index: usize,
    },

    /// Returned when a feature or label is NaN or infinite.
    #[error("non-finite value at sample {sample_index}, feature {feature_index}")]
    NonFiniteValue {
        /// The zero-based index of the offending row.
        sample_index: usize,
        /// The offending column; equal to the row width for a label.
        feature_index: usize,
    },

    /// Returned when max_depth is `Some(0)`.
    #[error("max_depth must be at least 1, got {max_depth}")]
    InvalidMaxDepth {
        /// The invalid max_depth value provided.
        max_depth: usize,
    },

    /// Returned when min_samples_split is less than 2.
    #[error("min_samples_split must be at least 2, got {min_samples_split}")]
    InvalidMinSamplesSplit {
        /// The invalid min_samples_split value provided.
        min_samples_split: usize,
    },

    /// Returned when min_samples_leaf is zero.
    #[error("min_samples_leaf must be at least 1, got {min_samples_leaf}")]
    InvalidMinSamplesLeaf {
        /// The invalid min_samples_leaf value provided.
        min_samples_leaf: usize,
    },

    /// Returned when a prediction row has the wrong width.
    #[error("expected {expected} features, got {got}")]
    PredictionFeatureMismatch {
        /// Width the tree was trained on.
        expected: usize,
        /// Width of the offending row.
        got: usize,
    },

    /// Returned when a tree cannot be converted to JSON.
    #[error("failed to encode tree")]
    Encode {
        /// The underlying serde_json error.
        source: serde_json::Error,
    },

    /// Returned when a JSON value is not a serialized tree.
    #[error("failed to decode tree")]
    InvalidModel {
        /// The underlying serde_json error.
        source: serde_json::Error,
    },

    /// Returned when a decoded tree's arena is not walkable.
    #[error("malformed tree: {reason}")]
    MalformedTree {
        /// What was wrong with the arena.
        reason: String,
    },
}
