//! Ensemble training with parallel tree construction.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::iter::{IndexedParallelIterator, IntoParallelIterator, ParallelIterator};
use tracing::{debug, info, instrument};

use crate::bagging::draw_bootstrap_indices;
use crate::config::{EnsembleKind, ForestConfig};
use crate::dataset::TrainingSet;
use crate::error::ForestError;
use crate::features::draw_feature_indices;
use crate::learner::TreeLearner;
use crate::random::SeededRandomSource;

/// One fitted tree together with the original column indices it was trained on.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeEntry<M> {
    pub(crate) model: M,
    pub(crate) used_features: Vec<usize>,
}

impl<M> TreeEntry<M> {
    /// Return the fitted tree.
    #[must_use]
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Return the original column indices, in the order the tree sees them.
    #[must_use]
    pub fn used_features(&self) -> &[usize] {
        &self.used_features
    }
}

/// A fitted, immutable ensemble of trees.
///
/// Prediction takes `&self`, so a finished ensemble can be shared across
/// threads and queried concurrently.
pub struct Ensemble<L: TreeLearner> {
    pub(crate) learner: L,
    pub(crate) config: ForestConfig<L::Options>,
    pub(crate) n_features: usize,
    pub(crate) trees: Vec<TreeEntry<L::Model>>,
}

impl<L: TreeLearner> Ensemble<L> {
    /// Return the ensemble kind.
    #[must_use]
    pub fn kind(&self) -> EnsembleKind {
        self.config.kind
    }

    /// Return the configuration the ensemble was trained with.
    #[must_use]
    pub fn config(&self) -> &ForestConfig<L::Options> {
        &self.config
    }

    /// Return the number of columns every prediction row must have.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Return the number of trees.
    #[must_use]
    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    /// Return the fitted trees in training order.
    #[must_use]
    pub fn trees(&self) -> &[TreeEntry<L::Model>] {
        &self.trees
    }

    /// Return the learner used to query the trees.
    #[must_use]
    pub fn learner(&self) -> &L {
        &self.learner
    }
}

impl<L: TreeLearner> fmt::Debug for Ensemble<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ensemble")
            .field("kind", &self.config.kind)
            .field("n_features", &self.n_features)
            .field("tree_count", &self.trees.len())
            .finish_non_exhaustive()
    }
}

/// Rows and columns one tree is trained on, drawn before dispatch.
#[derive(Debug)]
struct TreePlan {
    rows: Option<Vec<usize>>,
    columns: Vec<usize>,
}

/// Draw every tree's bootstrap and feature indices from one source, in tree order.
///
/// Bagging draws come before feature draws for each tree. Without bagging no
/// row draws are consumed.
fn draw_plans(
    config: &ForestConfig<impl Sized>,
    n_rows: usize,
    n_columns: usize,
    sample_count: usize,
    feature_count: usize,
) -> Vec<TreePlan> {
    let mut rng = SeededRandomSource::new(&config.seed);
    (0..config.tree_count)
        .map(|_| {
            let rows = config
                .use_bagging
                .then(|| draw_bootstrap_indices(n_rows, sample_count, &mut rng));
            let columns = draw_feature_indices(
                n_columns,
                feature_count,
                config.allow_feature_replacement,
                &mut rng,
            );
            TreePlan { rows, columns }
        })
        .collect()
}

/// Train an ensemble.
///
/// All configuration errors surface before any tree is trained. A learner
/// failure on any tree fails the whole call.
///
/// # Errors
///
/// | Variant | When |
/// |---|---|
/// | [`ForestError::InvalidTreeCount`] | `tree_count` is zero |
/// | [`ForestError::InvalidFraction`] | a size fraction is outside (0.0, 1.0] |
/// | [`ForestError::InvalidSampleSize`] | a size resolves to 0 or exceeds the data |
/// | [`ForestError::Learner`] | the tree learner failed |
pub fn train<L>(
    learner: &L,
    training_set: &TrainingSet,
    config: &ForestConfig<L::Options>,
) -> Result<Ensemble<L>, ForestError>
where
    L: TreeLearner + Clone,
{
    train_cancellable(learner, training_set, config, &AtomicBool::new(false))
}

/// [`train`], stopping with [`ForestError::Cancelled`] once `cancel` is raised.
///
/// The flag is checked before each tree starts.
#[instrument(skip_all, fields(kind = %config.kind, tree_count = config.tree_count, n_rows = training_set.n_rows()))]
pub(crate) fn train_cancellable<L>(
    learner: &L,
    training_set: &TrainingSet,
    config: &ForestConfig<L::Options>,
    cancel: &AtomicBool,
) -> Result<Ensemble<L>, ForestError>
where
    L: TreeLearner + Clone,
{
    let n_rows = training_set.n_rows();
    let n_columns = training_set.n_columns();
    let sizes = config.resolve(n_rows, n_columns)?;

    info!(
        kind = %config.kind,
        tree_count = config.tree_count,
        n_rows,
        n_columns,
        sample_count = sizes.sample_count,
        feature_count = sizes.feature_count,
        use_bagging = config.use_bagging,
        "training ensemble"
    );

    let plans = draw_plans(config, n_rows, n_columns, sizes.sample_count, sizes.feature_count);
    debug!(n_plans = plans.len(), "resampling plans drawn");

    let kind = config.kind;
    let options = &config.tree_options;

    let trees: Vec<TreeEntry<L::Model>> = plans
        .into_par_iter()
        .enumerate()
        .map(|(tree_index, plan)| {
            if cancel.load(Ordering::Relaxed) {
                return Err(ForestError::Cancelled);
            }
            let (features, labels) = training_set.project(plan.rows.as_deref(), &plan.columns);
            let model = learner
                .train(kind, &features, &labels, options)
                .map_err(|e| ForestError::Learner {
                    tree_index,
                    source: Box::new(e),
                })?;
            debug!(tree_index, "tree built");
            Ok(TreeEntry {
                model,
                used_features: plan.columns,
            })
        })
        .collect::<Result<_, _>>()?;

    info!(tree_count = trees.len(), "ensemble training complete");

    Ok(Ensemble {
        learner: learner.clone(),
        config: config.clone(),
        n_features: n_columns,
        trees,
    })
}
