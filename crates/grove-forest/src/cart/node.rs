//! Arena nodes of a CART tree and the index types that address them.

/// Column of the tree's own (already projected) input rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct FeatureIndex(usize);

impl FeatureIndex {
    pub(crate) fn new(column: usize) -> Self {
        Self(column)
    }

    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Slot in a tree's node arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct NodeIndex(usize);

impl NodeIndex {
    pub(crate) fn new(slot: usize) -> Self {
        Self(slot)
    }

    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Gini or entropy of the class counts at a node, or the variance of its
/// targets for regression trees.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Impurity(f64);

impl Impurity {
    pub(crate) fn new(value: f64) -> Self {
        Self(value)
    }

    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }
}

/// One arena entry. Child slots are always greater than the parent's.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Node {
    #[serde(rename_all = "camelCase")]
    Split {
        feature: FeatureIndex,
        /// `row[feature] <= threshold` descends left.
        threshold: f64,
        left: NodeIndex,
        right: NodeIndex,
        impurity: Impurity,
        n_samples: usize,
    },
    #[serde(rename_all = "camelCase")]
    Leaf {
        /// Majority label, or mean target for regression.
        value: f64,
        impurity: Impurity,
        n_samples: usize,
    },
}

impl Node {
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }
}
