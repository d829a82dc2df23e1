//! Prediction and aggregation for fitted ensembles.

use rayon::iter::{IndexedParallelIterator, IntoParallelRefIterator, ParallelIterator};

use crate::config::{Aggregation, EnsembleKind};
use crate::dataset::project_rows;
use crate::error::ForestError;
use crate::forest::Ensemble;
use crate::learner::TreeLearner;

/// Per-row count of trees voting for each class of a binary classifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct VoteCount {
    /// Trees that predicted `-1`.
    pub negative: usize,
    /// Trees that predicted `+1`.
    pub positive: usize,
}

/// Vote counts for every predicted row.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteTally {
    /// One entry per row, in input order.
    pub per_row: Vec<VoteCount>,
}

/// Output of [`Ensemble::predict`].
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResult {
    /// Aggregated prediction per row.
    pub final_prediction: Vec<f64>,
    /// `per_tree[row][tree]`: every tree's prediction for every row.
    pub per_tree: Vec<Vec<f64>>,
    /// Present for classifiers only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vote_tally: Option<VoteTally>,
}

/// Arithmetic mean. Empty input yields NaN.
#[must_use]
pub fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Most frequent value; ties go to the value encountered first.
/// Empty input yields NaN.
#[must_use]
pub fn mode(values: &[f64]) -> f64 {
    // (value, count) in first-seen order.
    let mut counts: Vec<(f64, usize)> = Vec::new();
    for &v in values {
        match counts.iter_mut().find(|(seen, _)| *seen == v) {
            Some((_, count)) => *count += 1,
            None => counts.push((v, 1)),
        }
    }
    let mut best: Option<(f64, usize)> = None;
    for &(value, count) in &counts {
        if best.is_none_or(|(_, best_count)| count > best_count) {
            best = Some((value, count));
        }
    }
    best.map_or(f64::NAN, |(value, _)| value)
}

/// Combine one row's per-tree predictions.
#[must_use]
pub fn aggregate(aggregation: Aggregation, values: &[f64]) -> f64 {
    match aggregation {
        Aggregation::Mean => mean(values),
        Aggregation::Mode => mode(values),
    }
}

/// Count `-1` and `+1` votes per row of a `per_tree[row][tree]` matrix.
///
/// # Errors
///
/// Returns [`ForestError::LabelOutsideVoteDomain`] at the first value that is
/// neither `-1` nor `+1`.
pub fn tally_votes(per_tree: &[Vec<f64>]) -> Result<VoteTally, ForestError> {
    let per_row = per_tree
        .iter()
        .enumerate()
        .map(|(row_index, votes)| {
            let mut count = VoteCount::default();
            for (tree_index, &value) in votes.iter().enumerate() {
                if value == 1.0 {
                    count.positive += 1;
                } else if value == -1.0 {
                    count.negative += 1;
                } else {
                    return Err(ForestError::LabelOutsideVoteDomain {
                        row_index,
                        tree_index,
                        value,
                    });
                }
            }
            Ok(count)
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(VoteTally { per_row })
}

impl<L: TreeLearner> Ensemble<L> {
    /// Predict every row with every tree and aggregate.
    ///
    /// Each tree sees the rows projected onto its own feature indices. Row
    /// widths are checked for all rows before any tree is queried.
    ///
    /// # Errors
    ///
    /// | Variant | When |
    /// |---|---|
    /// | [`ForestError::PredictionFeatureMismatch`] | a row's width differs from `n_features` |
    /// | [`ForestError::Learner`] | a tree failed to predict |
    /// | [`ForestError::PredictionCountMismatch`] | a tree returned the wrong number of values |
    /// | [`ForestError::LabelOutsideVoteDomain`] | a classifier tree voted neither `-1` nor `+1` |
    pub fn predict(&self, rows: &[Vec<f64>]) -> Result<PredictionResult, ForestError> {
        let by_tree = self.query_trees(rows, self.trees.len())?;
        let per_tree: Vec<Vec<f64>> = (0..rows.len())
            .map(|r| by_tree.iter().map(|tree| tree[r]).collect())
            .collect();
        let aggregation = self.config.aggregation;
        let final_prediction = per_tree.iter().map(|v| aggregate(aggregation, v)).collect();
        let vote_tally = match self.config.kind {
            EnsembleKind::Classifier => Some(tally_votes(&per_tree)?),
            EnsembleKind::Regressor => None,
        };
        Ok(PredictionResult {
            final_prediction,
            per_tree,
            vote_tally,
        })
    }

    /// Per-tree predictions `[tree][row]` for the first `visible` trees.
    ///
    /// An empty batch yields empty vectors without querying the learner.
    pub(crate) fn query_trees(
        &self,
        rows: &[Vec<f64>],
        visible: usize,
    ) -> Result<Vec<Vec<f64>>, ForestError> {
        self.check_widths(rows)?;
        let visible = visible.min(self.trees.len());
        if rows.is_empty() {
            return Ok(vec![Vec::new(); visible]);
        }
        self.trees[..visible]
            .par_iter()
            .enumerate()
            .map(|(tree_index, entry)| {
                let projected = project_rows(rows, &entry.used_features);
                let values = self
                    .learner
                    .predict(&entry.model, &projected)
                    .map_err(|e| ForestError::Learner {
                        tree_index,
                        source: Box::new(e),
                    })?;
                if values.len() != rows.len() {
                    return Err(ForestError::PredictionCountMismatch {
                        tree_index,
                        expected: rows.len(),
                        got: values.len(),
                    });
                }
                Ok(values)
            })
            .collect()
    }

    fn check_widths(&self, rows: &[Vec<f64>]) -> Result<(), ForestError> {
        if let Some((row_index, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != self.n_features)
        {
            return Err(ForestError::PredictionFeatureMismatch {
                expected: self.n_features,
                got: row.len(),
                row_index,
            });
        }
        Ok(())
    }
}
