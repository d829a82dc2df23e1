//! Bootstrap resampling of training rows.

use crate::dataset::TrainingSet;
use crate::error::ForestError;
use crate::random::SeededRandomSource;

/// Draw `sample_count` row indices uniformly from `[0, n_rows)` with replacement.
pub fn draw_bootstrap_indices(
    n_rows: usize,
    sample_count: usize,
    rng: &mut SeededRandomSource,
) -> Vec<usize> {
    (0..sample_count).map(|_| rng.next_index(n_rows)).collect()
}

/// Draw a bootstrap sample of the training set.
///
/// Rows and their labels are copied in draw order.
///
/// # Errors
///
/// Returns [`ForestError::InvalidSampleSize`] if `sample_count` is zero or
/// exceeds the number of rows.
pub fn bag(
    training_set: &TrainingSet,
    sample_count: usize,
    rng: &mut SeededRandomSource,
) -> Result<TrainingSet, ForestError> {
    let n_rows = training_set.n_rows();
    if sample_count == 0 || sample_count > n_rows {
        return Err(ForestError::InvalidSampleSize {
            parameter: "max_samples",
            resolved: sample_count,
            available: n_rows,
        });
    }
    let indices = draw_bootstrap_indices(n_rows, sample_count, rng);
    Ok(training_set.select_rows(&indices))
}

#[cfg(test)]
mod tests {
    use super::{bag, draw_bootstrap_indices};
    use crate::dataset::TrainingSet;
    use crate::random::SeededRandomSource;
    use crate::ForestError;

    fn numbered_set(n: usize) -> TrainingSet {
        TrainingSet::new(
            (0..n).map(|i| vec![i as f64]).collect(),
            (0..n).map(|i| i as f64 * 10.0).collect(),
        )
        .unwrap()
    }

    #[test]
    fn indices_in_range_with_exact_count() {
        let mut rng = SeededRandomSource::from_u64(11);
        let idx = draw_bootstrap_indices(20, 15, &mut rng);
        assert_eq!(idx.len(), 15);
        assert!(idx.iter().all(|&i| i < 20));
    }

    #[test]
    fn bagged_rows_keep_their_labels() {
        let set = numbered_set(30);
        let mut rng = SeededRandomSource::from_u64(4);
        let bagged = bag(&set, 30, &mut rng).unwrap();
        assert_eq!(bagged.n_rows(), 30);
        for (row, label) in bagged.features().iter().zip(bagged.labels()) {
            assert_eq!(row[0] * 10.0, *label);
        }
    }

    #[test]
    fn sampling_with_replacement_repeats_rows() {
        // 200 draws from 200 rows without a single repeat is vanishingly unlikely.
        let mut rng = SeededRandomSource::from_u64(9);
        let mut idx = draw_bootstrap_indices(200, 200, &mut rng);
        idx.sort_unstable();
        idx.dedup();
        assert!(idx.len() < 200);
    }

    #[test]
    fn oversized_sample_rejected() {
        let set = numbered_set(5);
        let mut rng = SeededRandomSource::from_u64(1);
        let err = bag(&set, 6, &mut rng).unwrap_err();
        assert!(matches!(err, ForestError::InvalidSampleSize { resolved: 6, available: 5, .. }));
    }

    #[test]
    fn same_seed_same_bag() {
        let set = numbered_set(50);
        let a = bag(&set, 25, &mut SeededRandomSource::from_u64(77)).unwrap();
        let b = bag(&set, 25, &mut SeededRandomSource::from_u64(77)).unwrap();
        assert_eq!(a, b);
    }
}
