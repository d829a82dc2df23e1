//! Per-tree random feature subsampling.

use crate::dataset::TrainingSet;
use crate::error::ForestError;
use crate::random::SeededRandomSource;

/// Draw `feature_count` column indices from `[0, n_columns)`.
///
/// With replacement every draw is kept, duplicates included. Without
/// replacement a draw that collides with an already chosen column is
/// retried until `feature_count` distinct columns exist; the result keeps
/// the order in which columns were first drawn.
///
/// `feature_count` must not exceed `n_columns` when `allow_replacement` is
/// false.
pub fn draw_feature_indices(
    n_columns: usize,
    feature_count: usize,
    allow_replacement: bool,
    rng: &mut SeededRandomSource,
) -> Vec<usize> {
    if allow_replacement {
        return (0..feature_count).map(|_| rng.next_index(n_columns)).collect();
    }

    debug_assert!(feature_count <= n_columns);
    let mut chosen = vec![false; n_columns];
    let mut used = Vec::with_capacity(feature_count);
    while used.len() < feature_count {
        let index = rng.next_index(n_columns);
        if !chosen[index] {
            chosen[index] = true;
            used.push(index);
        }
    }
    used
}

/// Select a subset of columns for one tree.
///
/// Returns the column-reduced training set and the original column indices
/// it was built from, in the order the columns appear in the reduced set.
///
/// # Errors
///
/// Returns [`ForestError::InvalidSampleSize`] if `feature_count` is zero or
/// exceeds the number of columns.
pub fn select_features(
    training_set: &TrainingSet,
    feature_count: usize,
    allow_replacement: bool,
    rng: &mut SeededRandomSource,
) -> Result<(TrainingSet, Vec<usize>), ForestError> {
    let n_columns = training_set.n_columns();
    if feature_count == 0 || feature_count > n_columns {
        return Err(ForestError::InvalidSampleSize {
            parameter: "max_features",
            resolved: feature_count,
            available: n_columns,
        });
    }
    let used = draw_feature_indices(n_columns, feature_count, allow_replacement, rng);
    Ok((training_set.select_columns(&used), used))
}
