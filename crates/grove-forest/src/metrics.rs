//! Held-out evaluation metrics.

use crate::error::ForestError;

fn check_lengths(predicted: &[f64], actual: &[f64]) -> Result<(), ForestError> {
    if predicted.len() != actual.len() {
        return Err(ForestError::LabelCountMismatch {
            rows: predicted.len(),
            labels: actual.len(),
        });
    }
    if actual.is_empty() {
        return Err(ForestError::EmptyDataset);
    }
    Ok(())
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Binary classification scores from a 2×2 confusion count.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ClassificationMetrics {
    /// (TP + TN) / total.
    pub accuracy: f64,
    /// TP / (TP + FP). 0.0 if nothing was predicted positive.
    pub precision: f64,
    /// TP / (TP + FN). 0.0 if nothing is actually positive.
    pub recall: f64,
}

impl ClassificationMetrics {
    /// Score `predicted` against `actual`, treating `positive_label` as the
    /// positive class and every other value as negative.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ForestError::LabelCountMismatch`] | lengths differ |
    /// | [`ForestError::EmptyDataset`] | zero labels provided |
    pub fn from_labels(
        predicted: &[f64],
        actual: &[f64],
        positive_label: f64,
    ) -> Result<Self, ForestError> {
        check_lengths(predicted, actual)?;
        let (mut tp, mut tn, mut fp, mut fn_) = (0usize, 0usize, 0usize, 0usize);
        for (&p, &a) in predicted.iter().zip(actual) {
            match (p == positive_label, a == positive_label) {
                (true, true) => tp += 1,
                (false, false) => tn += 1,
                (true, false) => fp += 1,
                (false, true) => fn_ += 1,
            }
        }
        Ok(Self {
            accuracy: ratio(tp + tn, actual.len()),
            precision: ratio(tp, tp + fp),
            recall: ratio(tp, tp + fn_),
        })
    }
}

/// Regression scores.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RegressionMetrics {
    /// Coefficient of determination, 1 - SS_res / SS_tot. 0.0 when the
    /// actual values are constant.
    pub r2: f64,
    /// Mean squared error.
    pub mse: f64,
}

impl RegressionMetrics {
    /// Score `predicted` against `actual`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ForestError::LabelCountMismatch`] | lengths differ |
    /// | [`ForestError::EmptyDataset`] | zero values provided |
    pub fn from_values(predicted: &[f64], actual: &[f64]) -> Result<Self, ForestError> {
        check_lengths(predicted, actual)?;
        let n = actual.len() as f64;
        let mean = actual.iter().sum::<f64>() / n;
        let ss_res: f64 = predicted
            .iter()
            .zip(actual)
            .map(|(p, a)| (a - p) * (a - p))
            .sum();
        let ss_tot: f64 = actual.iter().map(|a| (a - mean) * (a - mean)).sum();
        let r2 = if ss_tot == 0.0 { 0.0 } else { 1.0 - ss_res / ss_tot };
        Ok(Self {
            r2,
            mse: ss_res / n,
        })
    }
}
