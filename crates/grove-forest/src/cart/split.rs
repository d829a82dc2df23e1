use crate::cart::node::{FeatureIndex, Impurity};

/// Gain function for classification splits. Regression always uses variance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitCriterion {
    /// Gini impurity: 1 - Σ(p_i²)
    #[default]
    Gini,
    /// Information entropy: -Σ(p_i · ln(p_i))
    Entropy,
}

impl SplitCriterion {
    /// Compute the impurity of a node from its class counts.
    ///
    /// Zero samples count as pure.
    #[must_use]
    pub fn impurity(&self, class_counts: &[usize], n_samples: usize) -> Impurity {
        if n_samples == 0 {
            return Impurity::new(0.0);
        }
        let n = n_samples as f64;
        let value = match self {
            SplitCriterion::Gini => {
                1.0 - class_counts
                    .iter()
                    .map(|&c| {
                        let p = c as f64 / n;
                        p * p
                    })
                    .sum::<f64>()
            }
            SplitCriterion::Entropy => -class_counts
                .iter()
                .filter(|&&c| c > 0)
                .map(|&c| {
                    let p = c as f64 / n;
                    p * p.ln()
                })
                .sum::<f64>(),
        };
        Impurity::new(value)
    }
}

/// Training targets in the form the split search works on.
#[derive(Debug, Clone)]
pub(crate) enum Target {
    /// Class index per row into `classes`, the sorted distinct label values.
    Classes {
        indices: Vec<usize>,
        classes: Vec<f64>,
    },
    /// Raw regression targets.
    Continuous(Vec<f64>),
}

impl Target {
    /// Map classifier labels onto indices of their sorted distinct values.
    pub(crate) fn classes(labels: &[f64]) -> Self {
        let mut classes = labels.to_vec();
        classes.sort_unstable_by(f64::total_cmp);
        classes.dedup();
        let indices = labels
            .iter()
            .map(|v| {
                classes
                    .binary_search_by(|c| c.total_cmp(v))
                    .unwrap_or_default()
            })
            .collect();
        Target::Classes { indices, classes }
    }

    /// Whether every row in `rows` has the same target.
    pub(crate) fn is_pure(&self, rows: &[usize]) -> bool {
        match self {
            Target::Classes { indices, .. } => rows.windows(2).all(|w| indices[w[0]] == indices[w[1]]),
            Target::Continuous(values) => rows.windows(2).all(|w| values[w[0]] == values[w[1]]),
        }
    }

    /// Leaf value for `rows`: majority class (ties to the smaller label) or mean.
    pub(crate) fn leaf_value(&self, rows: &[usize]) -> f64 {
        match self {
            Target::Classes { indices, classes } => {
                let mut counts = vec![0usize; classes.len()];
                for &r in rows {
                    counts[indices[r]] += 1;
                }
                let mut best = 0;
                for (class, &count) in counts.iter().enumerate() {
                    if count > counts[best] {
                        best = class;
                    }
                }
                classes[best]
            }
            Target::Continuous(values) => {
                rows.iter().map(|&r| values[r]).sum::<f64>() / rows.len() as f64
            }
        }
    }

    fn empty_tally(&self) -> Tally {
        match self {
            Target::Classes { classes, .. } => Tally::Counts(vec![0; classes.len()]),
            Target::Continuous(_) => Tally::Moments { sum: 0.0, sum_sq: 0.0 },
        }
    }

    pub(crate) fn tally(&self, rows: &[usize]) -> Tally {
        let mut tally = self.empty_tally();
        for &r in rows {
            tally.add(self, r);
        }
        tally
    }
}

/// Running sufficient statistics for the rows on one side of a split.
#[derive(Debug, Clone)]
pub(crate) enum Tally {
    Counts(Vec<usize>),
    Moments { sum: f64, sum_sq: f64 },
}

impl Tally {
    fn add(&mut self, target: &Target, row: usize) {
        match (self, target) {
            (Tally::Counts(counts), Target::Classes { indices, .. }) => counts[indices[row]] += 1,
            (Tally::Moments { sum, sum_sq }, Target::Continuous(values)) => {
                *sum += values[row];
                *sum_sq += values[row] * values[row];
            }
            _ => unreachable!("tally built from a different target"),
        }
    }

    fn remove(&mut self, target: &Target, row: usize) {
        match (self, target) {
            (Tally::Counts(counts), Target::Classes { indices, .. }) => counts[indices[row]] -= 1,
            (Tally::Moments { sum, sum_sq }, Target::Continuous(values)) => {
                *sum -= values[row];
                *sum_sq -= values[row] * values[row];
            }
            _ => unreachable!("tally built from a different target"),
        }
    }

    /// Impurity of `n` rows: the criterion for class counts, variance otherwise.
    pub(crate) fn impurity(&self, criterion: SplitCriterion, n: usize) -> Impurity {
        match self {
            Tally::Counts(counts) => criterion.impurity(counts, n),
            Tally::Moments { sum, sum_sq } => {
                if n == 0 {
                    return Impurity::new(0.0);
                }
                let n = n as f64;
                let mean = sum / n;
                Impurity::new((sum_sq / n - mean * mean).max(0.0))
            }
        }
    }
}

/// Best split found for a node.
#[derive(Debug, Clone)]
pub(crate) struct SplitResult {
    pub(crate) feature: FeatureIndex,
    pub(crate) threshold: f64,
    pub(crate) left_indices: Vec<usize>,
    pub(crate) right_indices: Vec<usize>,
}

/// Find the split of `rows` with the largest weighted impurity decrease.
///
/// Every column is scanned in order; ties keep the earliest column and
/// threshold, so the result depends only on the data. Returns `None` when
/// all columns are constant over `rows` or every boundary would leave a
/// child with fewer than `min_samples_leaf` rows.
///
/// `col_features` is column-major: `col_features[column][row]`.
pub(crate) fn find_best_split(
    col_features: &[Vec<f64>],
    target: &Target,
    rows: &[usize],
    criterion: SplitCriterion,
    min_samples_leaf: usize,
) -> Option<SplitResult> {
    let n_samples = rows.len();
    if n_samples < 2 {
        return None;
    }

    let parent = target.tally(rows);
    let parent_impurity = parent.impurity(criterion, n_samples).value();

    let mut best_decrease = f64::NEG_INFINITY;
    let mut best: Option<(FeatureIndex, f64)> = None;

    for (column, values) in col_features.iter().enumerate() {
        let mut sorted: Vec<(f64, usize)> = rows.iter().map(|&r| (values[r], r)).collect();
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut left = target.empty_tally();
        let mut right = parent.clone();

        for i in 0..(n_samples - 1) {
            let (value, row) = sorted[i];
            left.add(target, row);
            right.remove(target, row);

            let next = sorted[i + 1].0;
            if value == next {
                continue;
            }
            let n_left = i + 1;
            let n_right = n_samples - n_left;
            if n_left < min_samples_leaf || n_right < min_samples_leaf {
                continue;
            }

            let decrease = (n_samples as f64) * parent_impurity
                - (n_left as f64) * left.impurity(criterion, n_left).value()
                - (n_right as f64) * right.impurity(criterion, n_right).value();

            if decrease > best_decrease {
                best_decrease = decrease;
                best = Some((FeatureIndex::new(column), (value + next) / 2.0));
            }
        }
    }

    let (feature, threshold) = best?;
    let values = &col_features[feature.index()];
    let (left_indices, right_indices): (Vec<usize>, Vec<usize>) =
        rows.iter().partition(|&&r| values[r] <= threshold);

    Some(SplitResult {
        feature,
        threshold,
        left_indices,
        right_indices,
    })
}

#[cfg(test)]
mod tests {
    use super::{SplitCriterion, Target, find_best_split};

    #[test]
    fn gini_and_entropy_of_balanced_binary() {
        assert!((SplitCriterion::Gini.impurity(&[5, 5], 10).value() - 0.5).abs() < 1e-12);
        assert!((SplitCriterion::Entropy.impurity(&[5, 5], 10).value() - 2.0_f64.ln()).abs() < 1e-12);
        assert_eq!(SplitCriterion::Gini.impurity(&[7, 0], 7).value(), 0.0);
    }

    #[test]
    fn criterion_json_names() {
        let c: SplitCriterion = serde_json::from_str("\"entropy\"").unwrap();
        assert_eq!(c, SplitCriterion::Entropy);
        assert_eq!(serde_json::to_string(&SplitCriterion::Gini).unwrap(), "\"gini\"");
    }

    #[test]
    fn classes_are_sorted_distinct_labels() {
        let Target::Classes { indices, classes } = Target::classes(&[1.0, -1.0, 1.0, 3.0]) else {
            panic!("expected class targets");
        };
        assert_eq!(classes, vec![-1.0, 1.0, 3.0]);
        assert_eq!(indices, vec![1, 0, 1, 2]);
    }

    #[test]
    fn majority_tie_goes_to_smaller_label() {
        let target = Target::classes(&[1.0, -1.0, 1.0, -1.0]);
        assert_eq!(target.leaf_value(&[0, 1, 2, 3]), -1.0);
        assert_eq!(target.leaf_value(&[0, 2, 3]), 1.0);
    }

    #[test]
    fn separable_classes_split_between_groups() {
        let cols = vec![vec![1.0, 2.0, 3.0, 10.0, 11.0, 12.0]];
        let target = Target::classes(&[-1.0, -1.0, -1.0, 1.0, 1.0, 1.0]);
        let rows: Vec<usize> = (0..6).collect();
        let split = find_best_split(&cols, &target, &rows, SplitCriterion::Gini, 1).unwrap();
        assert_eq!(split.feature.index(), 0);
        assert_eq!(split.threshold, 6.5);
        assert_eq!(split.left_indices, vec![0, 1, 2]);
        assert_eq!(split.right_indices, vec![3, 4, 5]);
    }

    #[test]
    fn regression_split_uses_variance() {
        // Column 0 is noise; column 1 separates the two target levels.
        let cols = vec![vec![3.0, 1.0, 4.0, 2.0], vec![0.0, 0.0, 1.0, 1.0]];
        let target = Target::Continuous(vec![5.0, 5.0, 20.0, 20.0]);
        let rows: Vec<usize> = (0..4).collect();
        let split = find_best_split(&cols, &target, &rows, SplitCriterion::Gini, 1).unwrap();
        assert_eq!(split.feature.index(), 1);
        assert_eq!(split.left_indices, vec![0, 1]);
    }

    #[test]
    fn constant_column_has_no_split() {
        let cols = vec![vec![5.0; 4]];
        let target = Target::classes(&[-1.0, -1.0, 1.0, 1.0]);
        assert!(find_best_split(&cols, &target, &[0, 1, 2, 3], SplitCriterion::Gini, 1).is_none());
    }

    #[test]
    fn min_samples_leaf_enforced() {
        let cols = vec![vec![1.0, 10.0]];
        let target = Target::classes(&[-1.0, 1.0]);
        assert!(find_best_split(&cols, &target, &[0, 1], SplitCriterion::Gini, 2).is_none());
    }
}
