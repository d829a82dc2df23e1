//! Deterministic CART trees for classification and regression, the
//! default [`TreeLearner`] behind the ensemble.
//!
//! Every column of the (already subsampled) input is considered at every
//! split, so a tree depends only on the rows and columns it is given.

mod error;
mod node;
mod split;
mod tree;

pub use error::CartError;
pub use node::{FeatureIndex, Impurity, Node, NodeIndex};
pub use split::SplitCriterion;
pub use tree::{CartOptions, CartTree};

use crate::config::EnsembleKind;
use crate::learner::TreeLearner;

/// [`TreeLearner`] that grows one [`CartTree`] per call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CartLearner;

impl TreeLearner for CartLearner {
    type Model = CartTree;
    type Options = CartOptions;
    type Error = CartError;

    fn train(
        &self,
        kind: EnsembleKind,
        features: &[Vec<f64>],
        labels: &[f64],
        options: &CartOptions,
    ) -> Result<CartTree, CartError> {
        CartTree::fit(kind, features, labels, options)
    }

    fn predict(&self, model: &CartTree, features: &[Vec<f64>]) -> Result<Vec<f64>, CartError> {
        model.predict(features)
    }

    fn serialize(&self, model: &CartTree) -> Result<serde_json::Value, CartError> {
        serde_json::to_value(model).map_err(|source| CartError::Encode { source })
    }

    fn deserialize(&self, value: serde_json::Value) -> Result<CartTree, CartError> {
        let tree: CartTree =
            serde_json::from_value(value).map_err(|source| CartError::InvalidModel { source })?;
        tree.check_arena()?;
        Ok(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::{CartError, CartLearner, CartOptions};
    use crate::config::EnsembleKind;
    use crate::learner::TreeLearner;

    #[test]
    fn serialized_tree_round_trips() {
        let features = vec![vec![0.0], vec![1.0], vec![2.0], vec![3.0]];
        let labels = vec![1.0, 1.0, 9.0, 9.0];
        let model = CartLearner
            .train(EnsembleKind::Regressor, &features, &labels, &CartOptions::new())
            .unwrap();
        let value = CartLearner.serialize(&model).unwrap();
        let restored = CartLearner.deserialize(value).unwrap();
        assert_eq!(restored, model);
        assert_eq!(
            CartLearner.predict(&restored, &features).unwrap(),
            labels
        );
    }

    #[test]
    fn cyclic_arena_rejected() {
        let value = serde_json::json!({
            "nodes": [
                {"split": {"feature": 0, "threshold": 0.5, "left": 0, "right": 1, "impurity": 0.5, "nSamples": 2}},
                {"leaf": {"value": 1.0, "impurity": 0.0, "nSamples": 1}}
            ],
            "nFeatures": 1
        });
        let err = CartLearner.deserialize(value).unwrap_err();
        assert!(matches!(err, CartError::MalformedTree { .. }));
    }

    #[test]
    fn garbage_rejected() {
        let err = CartLearner.deserialize(serde_json::json!({"nodes": 3})).unwrap_err();
        assert!(matches!(err, CartError::InvalidModel { .. }));
    }
}
