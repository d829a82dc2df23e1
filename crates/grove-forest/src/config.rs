//! Configuration builder for ensemble training, and its wire form.

use std::fmt;
use std::str::FromStr;

use crate::dataset::TrainingSet;
use crate::error::ForestError;
use crate::forest::{self, Ensemble};
use crate::learner::TreeLearner;
use crate::random::Seed;

/// How many rows or columns each tree receives.
///
/// In JSON any number in (0, 1] is a [`SampleSize::Fraction`], so both `1`
/// and `1.0` mean "everything". Any larger whole number (`2`, `2.0`) is a
/// [`SampleSize::Count`]. See [`SampleSize::from_number`].
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum SampleSize {
    /// An absolute count (must be at least 1 and at most what is available).
    Count(usize),
    /// A fraction of what is available (must be in (0.0, 1.0]).
    Fraction(f64),
}

impl SampleSize {
    /// Interpret a plain number the way training requests encode sizes.
    ///
    /// The fraction range is checked before integrality.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::InvalidFraction`] for a number that is neither
    /// in (0, 1] nor a whole number greater than 1.
    pub fn from_number(value: f64) -> Result<Self, ForestError> {
        if value > 0.0 && value <= 1.0 {
            return Ok(SampleSize::Fraction(value));
        }
        if value > 1.0 && value.fract() == 0.0 && value <= usize::MAX as f64 {
            return Ok(SampleSize::Count(value as usize));
        }
        Err(ForestError::InvalidFraction {
            parameter: "sample size",
            fraction: value,
        })
    }

    fn validate(self, parameter: &'static str) -> Result<(), ForestError> {
        match self {
            SampleSize::Fraction(f) if !(f > 0.0 && f <= 1.0) => {
                Err(ForestError::InvalidFraction {
                    parameter,
                    fraction: f,
                })
            }
            SampleSize::Count(0) => Err(ForestError::InvalidSampleSize {
                parameter,
                resolved: 0,
                available: 0,
            }),
            _ => Ok(()),
        }
    }

    /// Resolve to a concrete count against `available` rows or columns.
    ///
    /// Fractions are floored.
    ///
    /// # Errors
    ///
    /// | Variant | When |
    /// |---|---|
    /// | [`ForestError::InvalidFraction`] | fraction outside (0.0, 1.0] |
    /// | [`ForestError::InvalidSampleSize`] | resolved count is 0 or exceeds `available` |
    pub fn resolve(self, parameter: &'static str, available: usize) -> Result<usize, ForestError> {
        self.validate(parameter)?;
        let resolved = match self {
            SampleSize::Fraction(f) => ((available as f64) * f).floor() as usize,
            SampleSize::Count(n) => n,
        };
        if resolved == 0 || resolved > available {
            return Err(ForestError::InvalidSampleSize {
                parameter,
                resolved,
                available,
            });
        }
        Ok(resolved)
    }
}

impl<'de> serde::Deserialize<'de> for SampleSize {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        SampleSize::from_number(value).map_err(serde::de::Error::custom)
    }
}

/// How per-tree predictions are combined into one ensemble prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Aggregation {
    /// Arithmetic mean (regression).
    Mean,
    /// Most frequent value, ties to the first seen in tree order (classification).
    Mode,
}

impl Aggregation {
    /// Return the wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Aggregation::Mean => "mean",
            Aggregation::Mode => "mode",
        }
    }
}

impl FromStr for Aggregation {
    type Err = ForestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mean" => Ok(Aggregation::Mean),
            "mode" => Ok(Aggregation::Mode),
            other => Err(ForestError::UnknownAggregation {
                name: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether an ensemble classifies or regresses.
///
/// Classifiers additionally produce a vote tally at prediction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnsembleKind {
    /// Discrete labels; trees vote.
    Classifier,
    /// Continuous targets.
    Regressor,
}

impl EnsembleKind {
    /// Return the wire discriminator.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EnsembleKind::Classifier => "classifier",
            EnsembleKind::Regressor => "regressor",
        }
    }

    /// The aggregation conventionally paired with this kind.
    #[must_use]
    pub fn default_aggregation(self) -> Aggregation {
        match self {
            EnsembleKind::Classifier => Aggregation::Mode,
            EnsembleKind::Regressor => Aggregation::Mean,
        }
    }
}

impl FromStr for EnsembleKind {
    type Err = ForestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "classifier" => Ok(EnsembleKind::Classifier),
            "regressor" => Ok(EnsembleKind::Regressor),
            other => Err(ForestError::UnknownKind {
                name: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for EnsembleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Row and column counts resolved against a concrete training set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedSizes {
    /// Rows drawn per tree when bagging (equals the row count otherwise).
    pub sample_count: usize,
    /// Columns drawn per tree.
    pub feature_count: usize,
}

/// Configuration for ensemble training.
///
/// Construct via [`ForestConfig::new`], then chain `with_*` methods.
/// `O` is the tree learner's option type, passed through untouched.
///
/// # Defaults
///
/// | Parameter                   | Default                              |
/// |-----------------------------|--------------------------------------|
/// | `max_samples`               | `Fraction(1.0)`                      |
/// | `max_features`              | `Fraction(1.0)`                      |
/// | `use_bagging`               | `true`                               |
/// | `allow_feature_replacement` | `false`                              |
/// | `aggregation`               | `Mode` for classifiers, `Mean` for regressors |
/// | `seed`                      | `42`                                 |
#[derive(Debug, Clone, PartialEq)]
pub struct ForestConfig<O> {
    pub(crate) kind: EnsembleKind,
    pub(crate) tree_count: usize,
    pub(crate) max_samples: SampleSize,
    pub(crate) max_features: SampleSize,
    pub(crate) use_bagging: bool,
    pub(crate) allow_feature_replacement: bool,
    pub(crate) aggregation: Aggregation,
    pub(crate) seed: Seed,
    pub(crate) tree_options: O,
}

impl<O> ForestConfig<O> {
    /// Create a new config for `tree_count` trees of the given kind.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::InvalidTreeCount`] if `tree_count` is zero.
    pub fn new(kind: EnsembleKind, tree_count: usize, tree_options: O) -> Result<Self, ForestError> {
        if tree_count == 0 {
            return Err(ForestError::InvalidTreeCount { tree_count });
        }
        Ok(Self {
            kind,
            tree_count,
            max_samples: SampleSize::Fraction(1.0),
            max_features: SampleSize::Fraction(1.0),
            use_bagging: true,
            allow_feature_replacement: false,
            aggregation: kind.default_aggregation(),
            seed: Seed::default(),
            tree_options,
        })
    }

    // --- Setters ---

    /// Set how many rows each bagged tree draws.
    #[must_use]
    pub fn with_max_samples(mut self, max_samples: SampleSize) -> Self {
        self.max_samples = max_samples;
        self
    }

    /// Set how many columns each tree receives.
    #[must_use]
    pub fn with_max_features(mut self, max_features: SampleSize) -> Self {
        self.max_features = max_features;
        self
    }

    /// Enable or disable bootstrap resampling of rows.
    #[must_use]
    pub fn with_bagging(mut self, use_bagging: bool) -> Self {
        self.use_bagging = use_bagging;
        self
    }

    /// Allow the same column to be drawn more than once for a tree.
    #[must_use]
    pub fn with_feature_replacement(mut self, allow: bool) -> Self {
        self.allow_feature_replacement = allow;
        self
    }

    /// Set the aggregation method.
    #[must_use]
    pub fn with_aggregation(mut self, aggregation: Aggregation) -> Self {
        self.aggregation = aggregation;
        self
    }

    /// Set the random seed for reproducibility.
    #[must_use]
    pub fn with_seed(mut self, seed: impl Into<Seed>) -> Self {
        self.seed = seed.into();
        self
    }

    /// Replace the tree learner options.
    #[must_use]
    pub fn with_tree_options(mut self, tree_options: O) -> Self {
        self.tree_options = tree_options;
        self
    }

    // --- Getters ---

    /// Return the ensemble kind.
    #[must_use]
    pub fn kind(&self) -> EnsembleKind {
        self.kind
    }

    /// Return the number of trees.
    #[must_use]
    pub fn tree_count(&self) -> usize {
        self.tree_count
    }

    /// Return the per-tree row size.
    #[must_use]
    pub fn max_samples(&self) -> SampleSize {
        self.max_samples
    }

    /// Return the per-tree column size.
    #[must_use]
    pub fn max_features(&self) -> SampleSize {
        self.max_features
    }

    /// Return whether rows are bootstrap-resampled.
    #[must_use]
    pub fn use_bagging(&self) -> bool {
        self.use_bagging
    }

    /// Return whether columns may repeat within a tree.
    #[must_use]
    pub fn allow_feature_replacement(&self) -> bool {
        self.allow_feature_replacement
    }

    /// Return the aggregation method.
    #[must_use]
    pub fn aggregation(&self) -> Aggregation {
        self.aggregation
    }

    /// Return the random seed.
    #[must_use]
    pub fn seed(&self) -> &Seed {
        &self.seed
    }

    /// Return the tree learner options.
    #[must_use]
    pub fn tree_options(&self) -> &O {
        &self.tree_options
    }

    /// Check the parameters that do not depend on the data.
    ///
    /// # Errors
    ///
    /// | Variant | When |
    /// |---|---|
    /// | [`ForestError::InvalidTreeCount`] | `tree_count` is zero |
    /// | [`ForestError::InvalidFraction`] | a fraction is outside (0.0, 1.0] |
    /// | [`ForestError::InvalidSampleSize`] | a count is zero |
    pub fn validate(&self) -> Result<(), ForestError> {
        if self.tree_count == 0 {
            return Err(ForestError::InvalidTreeCount {
                tree_count: self.tree_count,
            });
        }
        self.max_samples.validate("max_samples")?;
        self.max_features.validate("max_features")?;
        Ok(())
    }

    /// Resolve row and column counts against a training set of the given shape.
    ///
    /// When bagging is disabled `max_samples` is ignored and every tree sees
    /// all `n_rows` rows.
    ///
    /// # Errors
    ///
    /// Any error from [`ForestConfig::validate`] or [`SampleSize::resolve`].
    pub fn resolve(&self, n_rows: usize, n_columns: usize) -> Result<ResolvedSizes, ForestError> {
        self.validate()?;
        let sample_count = if self.use_bagging {
            self.max_samples.resolve("max_samples", n_rows)?
        } else {
            n_rows
        };
        let feature_count = self.max_features.resolve("max_features", n_columns)?;
        Ok(ResolvedSizes {
            sample_count,
            feature_count,
        })
    }
}

impl<O: Clone + Send + Sync> ForestConfig<O> {
    /// Train an ensemble on the provided training set.
    ///
    /// # Errors
    ///
    /// See [`forest::train`].
    pub fn fit<L>(&self, learner: &L, training_set: &TrainingSet) -> Result<Ensemble<L>, ForestError>
    where
        L: TreeLearner<Options = O> + Clone,
    {
        forest::train(learner, training_set, self)
    }
}

/// Wire form of [`ForestConfig`], as carried in training requests and model
/// payloads. `aggregation` and `kind` stay strings here so that an
/// unrecognized value is reported as a configuration error when converting.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HyperparameterSpec<O> {
    /// Number of trees.
    pub tree_count: usize,
    /// Per-tree row size.
    #[serde(alias = "maxSamples")]
    pub max_samples_fraction: SampleSize,
    /// Per-tree column size.
    pub max_features: SampleSize,
    /// Whether rows are bootstrap-resampled.
    pub use_bagging: bool,
    /// Whether columns may repeat within a tree.
    pub allow_feature_replacement: bool,
    /// `"mean"` or `"mode"`.
    pub aggregation: String,
    /// Opaque options for the tree learner.
    pub tree_learner_options: O,
    /// `"classifier"` or `"regressor"`.
    pub kind: String,
    /// Random seed.
    #[serde(default)]
    pub seed: Seed,
}

impl<O> TryFrom<HyperparameterSpec<O>> for ForestConfig<O> {
    type Error = ForestError;

    fn try_from(spec: HyperparameterSpec<O>) -> Result<Self, Self::Error> {
        let kind: EnsembleKind = spec.kind.parse()?;
        let aggregation: Aggregation = spec.aggregation.parse()?;
        let config = ForestConfig::new(kind, spec.tree_count, spec.tree_learner_options)?
            .with_max_samples(spec.max_samples_fraction)
            .with_max_features(spec.max_features)
            .with_bagging(spec.use_bagging)
            .with_feature_replacement(spec.allow_feature_replacement)
            .with_aggregation(aggregation)
            .with_seed(spec.seed);
        config.validate()?;
        Ok(config)
    }
}

impl<O: Clone> From<&ForestConfig<O>> for HyperparameterSpec<O> {
    fn from(config: &ForestConfig<O>) -> Self {
        Self {
            tree_count: config.tree_count,
            max_samples_fraction: config.max_samples,
            max_features: config.max_features,
            use_bagging: config.use_bagging,
            allow_feature_replacement: config.allow_feature_replacement,
            aggregation: config.aggregation.as_str().to_string(),
            tree_learner_options: config.tree_options.clone(),
            kind: config.kind.as_str().to_string(),
            seed: config.seed.clone(),
        }
    }
}
