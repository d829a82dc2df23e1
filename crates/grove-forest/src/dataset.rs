//! Validated row-major training data.

use crate::error::ForestError;

/// Unvalidated wire form of a [`TrainingSet`].
#[derive(serde::Deserialize)]
struct RawTrainingSet {
    features: Vec<Vec<f64>>,
    labels: Vec<f64>,
}

/// Feature rows paired positionally with numeric labels.
///
/// Every row has the same width, there is at least one row and one column,
/// and every value is finite. The engine borrows a training set per call and
/// never retains it.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "RawTrainingSet")]
pub struct TrainingSet {
    features: Vec<Vec<f64>>,
    labels: Vec<f64>,
}

impl TrainingSet {
    /// Build a training set from row-major features and labels.
    ///
    /// # Errors
    ///
    /// | Variant | When |
    /// |---|---|
    /// | [`ForestError::LabelCountMismatch`] | `features.len() != labels.len()` |
    /// | [`ForestError::EmptyDataset`] | no rows |
    /// | [`ForestError::ZeroFeatures`] | rows have zero columns |
    /// | [`ForestError::FeatureCountMismatch`] | rows have inconsistent widths |
    /// | [`ForestError::NonFiniteValue`] | a feature or label is NaN or infinite |
    pub fn new(features: Vec<Vec<f64>>, labels: Vec<f64>) -> Result<Self, ForestError> {
        if features.len() != labels.len() {
            return Err(ForestError::LabelCountMismatch {
                rows: features.len(),
                labels: labels.len(),
            });
        }
        if features.is_empty() {
            return Err(ForestError::EmptyDataset);
        }
        let n_columns = features[0].len();
        if n_columns == 0 {
            return Err(ForestError::ZeroFeatures);
        }
        for (sample_index, row) in features.iter().enumerate() {
            if row.len() != n_columns {
                return Err(ForestError::FeatureCountMismatch {
                    expected: n_columns,
                    got: row.len(),
                    sample_index,
                });
            }
            if let Some(feature_index) = row.iter().position(|v| !v.is_finite()) {
                return Err(ForestError::NonFiniteValue {
                    sample_index,
                    feature_index,
                });
            }
        }
        if let Some(sample_index) = labels.iter().position(|v| !v.is_finite()) {
            return Err(ForestError::NonFiniteValue {
                sample_index,
                feature_index: n_columns,
            });
        }
        Ok(Self { features, labels })
    }

    /// Return the number of rows.
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.features.len()
    }

    /// Return the number of feature columns.
    #[must_use]
    pub fn n_columns(&self) -> usize {
        self.features[0].len()
    }

    /// Borrow the feature rows.
    #[must_use]
    pub fn features(&self) -> &[Vec<f64>] {
        &self.features
    }

    /// Borrow the labels.
    #[must_use]
    pub fn labels(&self) -> &[f64] {
        &self.labels
    }

    /// Copy the given rows, in the given order, together with their labels.
    ///
    /// Indices must be in `[0, n_rows)`.
    pub(crate) fn select_rows(&self, indices: &[usize]) -> TrainingSet {
        TrainingSet {
            features: indices.iter().map(|&i| self.features[i].clone()).collect(),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }

    /// Copy the given columns, in the given order, for every row.
    ///
    /// Indices must be in `[0, n_columns)`; duplicates are allowed.
    pub(crate) fn select_columns(&self, indices: &[usize]) -> TrainingSet {
        TrainingSet {
            features: project_rows(&self.features, indices),
            labels: self.labels.clone(),
        }
    }

    /// Materialize an optional row selection followed by a column selection
    /// without building the intermediate set.
    pub(crate) fn project(
        &self,
        rows: Option<&[usize]>,
        columns: &[usize],
    ) -> (Vec<Vec<f64>>, Vec<f64>) {
        match rows {
            Some(rows) => (
                rows.iter()
                    .map(|&r| columns.iter().map(|&c| self.features[r][c]).collect())
                    .collect(),
                rows.iter().map(|&r| self.labels[r]).collect(),
            ),
            None => (project_rows(&self.features, columns), self.labels.clone()),
        }
    }

    /// Consume the set and return its parts.
    #[must_use]
    pub fn into_parts(self) -> (Vec<Vec<f64>>, Vec<f64>) {
        (self.features, self.labels)
    }
}

impl TryFrom<RawTrainingSet> for TrainingSet {
    type Error = ForestError;

    fn try_from(raw: RawTrainingSet) -> Result<Self, Self::Error> {
        TrainingSet::new(raw.features, raw.labels)
    }
}

/// Re-express rows in terms of the given original column indices.
pub(crate) fn project_rows(rows: &[Vec<f64>], columns: &[usize]) -> Vec<Vec<f64>> {
    rows.iter()
        .map(|row| columns.iter().map(|&c| row[c]).collect())
        .collect()
}

/// Split items into a leading train slice and a trailing test slice.
///
/// The split index is `floor(len * train_percent / 100)`, clamped to
/// `[0, len]`.
#[must_use]
pub fn train_test_split<T>(items: &[T], train_percent: f64) -> (&[T], &[T]) {
    let split = ((items.len() as f64) * train_percent / 100.0).floor();
    let split = if split.is_nan() || split < 0.0 {
        0
    } else {
        (split as usize).min(items.len())
    };
    items.split_at(split)
}
