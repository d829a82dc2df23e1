use tracing::debug;

use crate::cart::error::CartError;
use crate::cart::node::{Node, NodeIndex};
use crate::cart::split::{SplitCriterion, Target, find_best_split};
use crate::config::EnsembleKind;

/// Options for a single CART tree, carried as `treeLearnerOptions`.
///
/// Construct via [`CartOptions::new`], then chain `with_*` methods. Every
/// field may be omitted in JSON.
///
/// # Defaults
///
/// | Parameter           | JSON key         | Default            |
/// |---------------------|------------------|--------------------|
/// | `max_depth`         | `maxDepth`       | `None` (unlimited) |
/// | `min_samples_split` | `minNumSamples`  | 2                  |
/// | `min_samples_leaf`  | `minSamplesLeaf` | 1                  |
/// | `criterion`         | `gainFunction`   | `Gini`             |
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CartOptions {
    max_depth: Option<usize>,
    #[serde(rename = "minNumSamples")]
    min_samples_split: usize,
    min_samples_leaf: usize,
    #[serde(rename = "gainFunction")]
    criterion: SplitCriterion,
}

impl CartOptions {
    /// Create options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            criterion: SplitCriterion::Gini,
        }
    }

    /// Set the maximum tree depth (root is depth 0). `None` is unlimited.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the minimum number of rows required to attempt a split.
    #[must_use]
    pub fn with_min_samples_split(mut self, min_samples_split: usize) -> Self {
        self.min_samples_split = min_samples_split;
        self
    }

    /// Set the minimum number of rows in each child of a split.
    #[must_use]
    pub fn with_min_samples_leaf(mut self, min_samples_leaf: usize) -> Self {
        self.min_samples_leaf = min_samples_leaf;
        self
    }

    /// Set the classification gain function.
    #[must_use]
    pub fn with_criterion(mut self, criterion: SplitCriterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Return the maximum depth, if any.
    #[must_use]
    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    /// Return the minimum rows required to split.
    #[must_use]
    pub fn min_samples_split(&self) -> usize {
        self.min_samples_split
    }

    /// Return the minimum rows per child.
    #[must_use]
    pub fn min_samples_leaf(&self) -> usize {
        self.min_samples_leaf
    }

    /// Return the classification gain function.
    #[must_use]
    pub fn criterion(&self) -> SplitCriterion {
        self.criterion
    }

    fn validate(&self) -> Result<(), CartError> {
        if let Some(d) = self.max_depth
            && d == 0
        {
            return Err(CartError::InvalidMaxDepth { max_depth: 0 });
        }
        if self.min_samples_split < 2 {
            return Err(CartError::InvalidMinSamplesSplit {
                min_samples_split: self.min_samples_split,
            });
        }
        if self.min_samples_leaf < 1 {
            return Err(CartError::InvalidMinSamplesLeaf {
                min_samples_leaf: self.min_samples_leaf,
            });
        }
        Ok(())
    }
}

impl Default for CartOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// A fitted CART tree stored as a `Vec<Node>` arena rooted at index 0.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartTree {
    pub(crate) nodes: Vec<Node>,
    pub(crate) n_features: usize,
}

impl CartTree {
    /// Fit a tree on row-major `features`.
    ///
    /// Classifier labels may be any finite values; each leaf predicts the
    /// majority label of its rows. Regressor leaves predict the mean target.
    ///
    /// # Errors
    ///
    /// | Variant | When |
    /// |---|---|
    /// | [`CartError::LabelCountMismatch`] | `features.len() != labels.len()` |
    /// | [`CartError::EmptyDataset`] | no rows |
    /// | [`CartError::ZeroFeatures`] | rows have zero columns |
    /// | [`CartError::FeatureCountMismatch`] | rows have inconsistent widths |
    /// | [`CartError::NonFiniteValue`] | a value is NaN or infinite |
    /// | [`CartError::InvalidMaxDepth`] | `max_depth` is `Some(0)` |
    /// | [`CartError::InvalidMinSamplesSplit`] | `min_samples_split` < 2 |
    /// | [`CartError::InvalidMinSamplesLeaf`] | `min_samples_leaf` < 1 |
    pub fn fit(
        kind: EnsembleKind,
        features: &[Vec<f64>],
        labels: &[f64],
        options: &CartOptions,
    ) -> Result<Self, CartError> {
        if features.len() != labels.len() {
            return Err(CartError::LabelCountMismatch {
                rows: features.len(),
                labels: labels.len(),
            });
        }
        if features.is_empty() {
            return Err(CartError::EmptyDataset);
        }
        let n_features = features[0].len();
        if n_features == 0 {
            return Err(CartError::ZeroFeatures);
        }
        for (sample_index, row) in features.iter().enumerate() {
            if row.len() != n_features {
                return Err(CartError::FeatureCountMismatch {
                    expected: n_features,
                    got: row.len(),
                    sample_index,
                });
            }
            if let Some(feature_index) = row.iter().position(|v| !v.is_finite()) {
                return Err(CartError::NonFiniteValue {
                    sample_index,
                    feature_index,
                });
            }
        }
        if let Some(sample_index) = labels.iter().position(|v| !v.is_finite()) {
            return Err(CartError::NonFiniteValue {
                sample_index,
                feature_index: n_features,
            });
        }
        options.validate()?;

        let target = match kind {
            EnsembleKind::Classifier => Target::classes(labels),
            EnsembleKind::Regressor => Target::Continuous(labels.to_vec()),
        };
        let col_features: Vec<Vec<f64>> = (0..n_features)
            .map(|c| features.iter().map(|row| row[c]).collect())
            .collect();
        let rows: Vec<usize> = (0..features.len()).collect();

        let mut arena = Vec::new();
        build_tree(&col_features, &target, &rows, options, 0, &mut arena);

        debug!(n_rows = rows.len(), n_features, n_nodes = arena.len(), "cart tree built");

        Ok(Self {
            nodes: arena,
            n_features,
        })
    }

    /// Predict one value per row.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::PredictionFeatureMismatch`] when a row's width
    /// differs from the training width.
    pub fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<f64>, CartError> {
        features
            .iter()
            .map(|row| {
                if row.len() != self.n_features {
                    return Err(CartError::PredictionFeatureMismatch {
                        expected: self.n_features,
                        got: row.len(),
                    });
                }
                Ok(self.leaf_value(row))
            })
            .collect()
    }

    /// Return the number of columns the tree was trained on.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Return the total number of nodes.
    #[must_use]
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Return the number of leaves.
    #[must_use]
    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Return the depth of the deepest leaf; a lone root leaf has depth 0.
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut max_depth = 0;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((idx, d)) = stack.pop() {
            match &self.nodes[idx] {
                Node::Leaf { .. } => max_depth = max_depth.max(d),
                Node::Split { left, right, .. } => {
                    stack.push((left.index(), d + 1));
                    stack.push((right.index(), d + 1));
                }
            }
        }
        max_depth
    }

    /// Check that the arena is non-empty, every split tests a known column,
    /// and children point forward within bounds.
    pub(crate) fn check_arena(&self) -> Result<(), CartError> {
        let malformed = |reason: String| CartError::MalformedTree { reason };
        if self.nodes.is_empty() {
            return Err(malformed("no nodes".to_string()));
        }
        if self.n_features == 0 {
            return Err(malformed("zero features".to_string()));
        }
        let len = self.nodes.len();
        for (i, node) in self.nodes.iter().enumerate() {
            if let Node::Split {
                feature,
                left,
                right,
                ..
            } = node
            {
                if feature.index() >= self.n_features {
                    return Err(malformed(format!("node {i} tests column {}", feature.index())));
                }
                for child in [left.index(), right.index()] {
                    if child <= i || child >= len {
                        return Err(malformed(format!("node {i} has child {child}")));
                    }
                }
            }
        }
        Ok(())
    }

    fn leaf_value(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value, .. } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    idx = if row[feature.index()] <= *threshold {
                        left.index()
                    } else {
                        right.index()
                    };
                }
            }
        }
    }
}

/// Recursively grow the arena; returns the index of the node just created.
fn build_tree(
    col_features: &[Vec<f64>],
    target: &Target,
    rows: &[usize],
    options: &CartOptions,
    depth: usize,
    arena: &mut Vec<Node>,
) -> NodeIndex {
    let n_samples = rows.len();
    let impurity = target.tally(rows).impurity(options.criterion, n_samples);

    let make_leaf = |arena: &mut Vec<Node>| {
        arena.push(Node::Leaf {
            value: target.leaf_value(rows),
            impurity,
            n_samples,
        });
        NodeIndex::new(arena.len() - 1)
    };

    let depth_exceeded = options.max_depth.is_some_and(|max_d| depth >= max_d);
    if n_samples < options.min_samples_split || depth_exceeded || target.is_pure(rows) {
        return make_leaf(arena);
    }

    let Some(split) = find_best_split(
        col_features,
        target,
        rows,
        options.criterion,
        options.min_samples_leaf,
    ) else {
        return make_leaf(arena);
    };

    // Reserve this node's slot so children land at higher indices.
    let node_idx = arena.len();
    arena.push(Node::Leaf {
        value: 0.0,
        impurity,
        n_samples,
    });
    let left = build_tree(col_features, target, &split.left_indices, options, depth + 1, arena);
    let right = build_tree(col_features, target, &split.right_indices, options, depth + 1, arena);

    arena[node_idx] = Node::Split {
        feature: split.feature,
        threshold: split.threshold,
        left,
        right,
        impurity,
        n_samples,
    };
    NodeIndex::new(node_idx)
}

#[cfg(test)]
mod tests {
    use super::{CartOptions, CartTree};
    use crate::cart::CartError;
    use crate::cart::split::SplitCriterion;
    use crate::config::EnsembleKind;

    fn separable() -> (Vec<Vec<f64>>, Vec<f64>) {
        let features = vec![
            vec![1.0, 0.0],
            vec![2.0, 0.0],
            vec![3.0, 0.0],
            vec![10.0, 0.0],
            vec![11.0, 0.0],
            vec![12.0, 0.0],
        ];
        (features, vec![-1.0, -1.0, -1.0, 1.0, 1.0, 1.0])
    }

    #[test]
    fn empty_dataset_error() {
        let err = CartTree::fit(EnsembleKind::Classifier, &[], &[], &CartOptions::new()).unwrap_err();
        assert!(matches!(err, CartError::EmptyDataset));
    }

    #[test]
    fn label_count_mismatch_error() {
        let err = CartTree::fit(EnsembleKind::Regressor, &[vec![1.0]], &[1.0, 2.0], &CartOptions::new())
            .unwrap_err();
        assert!(matches!(err, CartError::LabelCountMismatch { rows: 1, labels: 2 }));
    }

    #[test]
    fn pure_labels_give_single_leaf() {
        let features = vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]];
        let tree = CartTree::fit(EnsembleKind::Classifier, &features, &[1.0; 3], &CartOptions::new())
            .unwrap();
        assert_eq!(tree.n_nodes(), 1);
        assert_eq!(tree.predict(&[vec![9.0, 9.0]]).unwrap(), vec![1.0]);
    }

    #[test]
    fn separable_classes_predicted() {
        let (features, labels) = separable();
        let tree = CartTree::fit(EnsembleKind::Classifier, &features, &labels, &CartOptions::new())
            .unwrap();
        assert_eq!(
            tree.predict(&[vec![2.0, 0.0], vec![11.0, 0.0]]).unwrap(),
            vec![-1.0, 1.0]
        );
        assert_eq!(tree.depth(), 1);
    }

    #[test]
    fn entropy_also_separates() {
        let (features, labels) = separable();
        let options = CartOptions::new().with_criterion(SplitCriterion::Entropy);
        let tree = CartTree::fit(EnsembleKind::Classifier, &features, &labels, &options).unwrap();
        assert_eq!(tree.predict(&features).unwrap(), labels);
    }

    #[test]
    fn xor_needs_depth_two() {
        let features = vec![vec![0.0, 0.0], vec![0.0, 1.0], vec![1.0, 0.0], vec![1.0, 1.0]];
        let labels = vec![-1.0, 1.0, 1.0, -1.0];
        let tree = CartTree::fit(EnsembleKind::Classifier, &features, &labels, &CartOptions::new())
            .unwrap();
        assert!(tree.depth() >= 2);
        assert_eq!(tree.predict(&features).unwrap(), labels);

        let shallow = CartOptions::new().with_max_depth(Some(1));
        let tree = CartTree::fit(EnsembleKind::Classifier, &features, &labels, &shallow).unwrap();
        assert!(tree.depth() <= 1);
    }

    #[test]
    fn regression_leaves_are_means() {
        let features = vec![vec![1.0], vec![2.0], vec![10.0], vec![11.0]];
        let labels = vec![4.0, 6.0, 30.0, 50.0];
        let options = CartOptions::new().with_min_samples_leaf(2);
        let tree = CartTree::fit(EnsembleKind::Regressor, &features, &labels, &options).unwrap();
        assert_eq!(tree.predict(&[vec![0.0], vec![20.0]]).unwrap(), vec![5.0, 40.0]);
    }

    #[test]
    fn min_samples_split_stops_growth() {
        let (features, labels) = separable();
        let options = CartOptions::new().with_min_samples_split(10);
        let tree = CartTree::fit(EnsembleKind::Classifier, &features, &labels, &options).unwrap();
        assert_eq!(tree.n_leaves(), 1);
    }

    #[test]
    fn invalid_options_rejected() {
        let (features, labels) = separable();
        let err = CartTree::fit(
            EnsembleKind::Classifier,
            &features,
            &labels,
            &CartOptions::new().with_max_depth(Some(0)),
        )
        .unwrap_err();
        assert!(matches!(err, CartError::InvalidMaxDepth { .. }));
        let err = CartTree::fit(
            EnsembleKind::Classifier,
            &features,
            &labels,
            &CartOptions::new().with_min_samples_split(1),
        )
        .unwrap_err();
        assert!(matches!(err, CartError::InvalidMinSamplesSplit { .. }));
    }

    #[test]
    fn prediction_width_checked() {
        let (features, labels) = separable();
        let tree = CartTree::fit(EnsembleKind::Classifier, &features, &labels, &CartOptions::new())
            .unwrap();
        let err = tree.predict(&[vec![1.0]]).unwrap_err();
        assert!(matches!(err, CartError::PredictionFeatureMismatch { expected: 2, got: 1 }));
    }

    #[test]
    fn options_json_keys() {
        let options: CartOptions = serde_json::from_value(serde_json::json!({
            "maxDepth": 3,
            "minNumSamples": 4,
            "gainFunction": "entropy"
        }))
        .unwrap();
        assert_eq!(options.max_depth(), Some(3));
        assert_eq!(options.min_samples_split(), 4);
        assert_eq!(options.min_samples_leaf(), 1);
        assert_eq!(options.criterion(), SplitCriterion::Entropy);
        let empty: CartOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, CartOptions::default());
    }
}
