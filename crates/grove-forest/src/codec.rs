//! JSON model payloads, and saving and loading them.

use std::path::Path;

use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::config::{EnsembleKind, ForestConfig, HyperparameterSpec};
use crate::error::ForestError;
use crate::forest::{Ensemble, TreeEntry};
use crate::learner::TreeLearner;

/// Current payload format version.
pub const FORMAT_VERSION: u32 = 1;

/// One tree inside an [`EnsemblePayload`].
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreePayload {
    /// The learner's own serialized form of the tree.
    pub model: Value,
    /// Original column indices the tree was trained on.
    pub used_features: Vec<usize>,
}

/// Versioned, kind-tagged wire form of an [`Ensemble`].
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnsemblePayload<O> {
    /// `"classifier"` or `"regressor"`.
    pub kind: String,
    /// Format version for compatibility checking.
    pub format_version: u32,
    /// Number of columns the ensemble was trained on.
    pub n_features: usize,
    /// Hyperparameters the ensemble was trained with.
    pub hyperparameters: HyperparameterSpec<O>,
    /// Trees in training order.
    pub trees: Vec<TreePayload>,
}

fn corrupt(reason: impl Into<String>) -> ForestError {
    ForestError::CorruptPayload {
        reason: reason.into(),
    }
}

/// Read and check the `kind` discriminator of a raw payload.
fn check_kind(value: &Value, expected: EnsembleKind) -> Result<(), ForestError> {
    let name = value
        .get("kind")
        .and_then(Value::as_str)
        .ok_or(ForestError::MissingKind)?;
    let found: EnsembleKind = name.parse()?;
    if found != expected {
        return Err(ForestError::KindMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        });
    }
    Ok(())
}

fn check_version(found: u32) -> Result<(), ForestError> {
    if found != FORMAT_VERSION {
        return Err(ForestError::IncompatibleModelVersion {
            expected: FORMAT_VERSION,
            found,
        });
    }
    Ok(())
}

impl<L: TreeLearner> Ensemble<L> {
    /// Build the wire payload for this ensemble.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::Learner`] if a tree cannot be serialized.
    pub fn to_payload(&self) -> Result<EnsemblePayload<L::Options>, ForestError> {
        let trees = self
            .trees
            .iter()
            .enumerate()
            .map(|(tree_index, entry)| {
                let model = self
                    .learner
                    .serialize(&entry.model)
                    .map_err(|e| ForestError::Learner {
                        tree_index,
                        source: Box::new(e),
                    })?;
                Ok(TreePayload {
                    model,
                    used_features: entry.used_features.clone(),
                })
            })
            .collect::<Result<Vec<_>, ForestError>>()?;
        Ok(EnsemblePayload {
            kind: self.kind().as_str().to_string(),
            format_version: FORMAT_VERSION,
            n_features: self.n_features,
            hyperparameters: HyperparameterSpec::from(&self.config),
            trees,
        })
    }

    /// Encode this ensemble as a JSON value.
    ///
    /// # Errors
    ///
    /// [`ForestError::Learner`] or [`ForestError::Codec`].
    pub fn to_json(&self) -> Result<Value, ForestError> {
        Ok(serde_json::to_value(self.to_payload()?)?)
    }

    /// Rebuild an ensemble from a typed payload.
    ///
    /// # Errors
    ///
    /// | Variant | When |
    /// |---|---|
    /// | [`ForestError::UnknownKind`] / [`ForestError::KindMismatch`] | `kind` is unrecognized or not `expected_kind` |
    /// | [`ForestError::IncompatibleModelVersion`] | `format_version` differs from [`FORMAT_VERSION`] |
    /// | [`ForestError::CorruptPayload`] | trees or feature indices are inconsistent |
    /// | configuration variants | the embedded hyperparameters are invalid |
    /// | [`ForestError::Learner`] | a tree cannot be deserialized |
    pub fn from_payload(
        learner: L,
        payload: EnsemblePayload<L::Options>,
        expected_kind: EnsembleKind,
    ) -> Result<Self, ForestError> {
        let found: EnsembleKind = payload.kind.parse()?;
        if found != expected_kind {
            return Err(ForestError::KindMismatch {
                expected: expected_kind.to_string(),
                found: found.to_string(),
            });
        }
        check_version(payload.format_version)?;

        let config = ForestConfig::try_from(payload.hyperparameters)?;
        if config.kind() != found {
            return Err(corrupt(format!(
                "payload kind {found} disagrees with hyperparameter kind {}",
                config.kind()
            )));
        }
        let n_features = payload.n_features;
        if n_features == 0 {
            return Err(corrupt("nFeatures is zero"));
        }
        if payload.trees.len() != config.tree_count() {
            return Err(corrupt(format!(
                "{} trees present but treeCount is {}",
                payload.trees.len(),
                config.tree_count()
            )));
        }

        let trees = payload
            .trees
            .into_iter()
            .enumerate()
            .map(|(tree_index, tree)| {
                if tree.used_features.is_empty() {
                    return Err(corrupt(format!("tree {tree_index} uses no features")));
                }
                if let Some(&bad) = tree.used_features.iter().find(|&&c| c >= n_features) {
                    return Err(corrupt(format!(
                        "tree {tree_index} uses feature {bad} but the model has {n_features}"
                    )));
                }
                let model = learner
                    .deserialize(tree.model)
                    .map_err(|e| ForestError::Learner {
                        tree_index,
                        source: Box::new(e),
                    })?;
                Ok(TreeEntry {
                    model,
                    used_features: tree.used_features,
                })
            })
            .collect::<Result<Vec<_>, ForestError>>()?;

        debug!(kind = %found, n_features, tree_count = trees.len(), "ensemble decoded");

        Ok(Self {
            learner,
            config,
            n_features,
            trees,
        })
    }

    /// Rebuild an ensemble from a JSON value produced by [`Ensemble::to_json`].
    ///
    /// The `kind` discriminator and format version are checked before the rest
    /// of the payload is parsed.
    ///
    /// # Errors
    ///
    /// [`ForestError::MissingKind`] when there is no string `kind`, then any
    /// error from [`Ensemble::from_payload`], or [`ForestError::Codec`] if the
    /// value does not have the payload's shape.
    pub fn from_json(learner: L, value: Value, expected_kind: EnsembleKind) -> Result<Self, ForestError> {
        check_kind(&value, expected_kind)?;
        if let Some(version) = value.get("formatVersion").and_then(Value::as_u64) {
            check_version(u32::try_from(version).unwrap_or(u32::MAX))?;
        }
        let payload: EnsemblePayload<L::Options> = serde_json::from_value(value)?;
        Self::from_payload(learner, payload, expected_kind)
    }

    /// Save the ensemble as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ForestError::Learner`] | a tree cannot be serialized |
    /// | [`ForestError::Codec`] | JSON encoding failed |
    /// | [`ForestError::WriteModel`] | file write failed |
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ForestError> {
        let path = path.as_ref();
        let bytes = serde_json::to_vec_pretty(&self.to_payload()?)?;
        std::fs::write(path, &bytes).map_err(|e| ForestError::WriteModel {
            path: path.to_path_buf(),
            source: e,
        })?;

        info!(
            size_bytes = bytes.len(),
            tree_count = self.trees.len(),
            "model saved"
        );
        Ok(())
    }

    /// Load an ensemble saved by [`Ensemble::save`].
    ///
    /// # Errors
    ///
    /// [`ForestError::ReadModel`] if the file cannot be read,
    /// [`ForestError::Codec`] if it is not JSON, then any error from
    /// [`Ensemble::from_json`].
    #[instrument(skip_all, fields(path = %path.as_ref().display(), kind = %expected_kind))]
    pub fn load(learner: L, path: impl AsRef<Path>, expected_kind: EnsembleKind) -> Result<Self, ForestError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| ForestError::ReadModel {
            path: path.to_path_buf(),
            source: e,
        })?;
        let value: Value = serde_json::from_slice(&bytes)?;
        let ensemble = Self::from_json(learner, value, expected_kind)?;
        debug!(tree_count = ensemble.tree_count(), "model loaded");
        Ok(ensemble)
    }
}
