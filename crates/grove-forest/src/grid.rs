//! Dense evaluation of an ensemble over a regular grid, for decision-boundary
//! heat maps and regression curves.

use crate::error::ForestError;
use crate::forest::Ensemble;
use crate::learner::TreeLearner;
use crate::predict::aggregate;

/// A square grid over two feature domains.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridSpec {
    /// `(start, end)` of the first feature.
    pub x_domain: (f64, f64),
    /// `(start, end)` of the second feature.
    pub y_domain: (f64, f64),
    /// Points per axis; at least 2.
    pub density: usize,
}

impl GridSpec {
    /// A grid with the same domain on both axes.
    #[must_use]
    pub fn square(domain: (f64, f64), density: usize) -> Self {
        Self {
            x_domain: domain,
            y_domain: domain,
            density,
        }
    }
}

/// Aggregated and per-tree predictions over a grid.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DecisionBoundary {
    /// `main[i][j]`: ensemble prediction at `(x_i, y_j)`.
    pub main: Vec<Vec<f64>>,
    /// `trees[k][i][j]`: prediction of tree `k` at `(x_i, y_j)`.
    pub trees: Vec<Vec<Vec<f64>>>,
}

/// Aggregated and per-tree predictions along one axis.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Curve {
    /// The sampled inputs.
    pub xs: Vec<f64>,
    /// `main[i]`: ensemble prediction at `xs[i]`.
    pub main: Vec<f64>,
    /// `trees[k][i]`: prediction of tree `k` at `xs[i]`.
    pub trees: Vec<Vec<f64>>,
}

/// `density` evenly spaced points from `start` to `end`, both included.
fn linspace((start, end): (f64, f64), density: usize) -> Vec<f64> {
    let last = (density - 1) as f64;
    (0..density)
        .map(|i| start + (end - start) * (i as f64 / last))
        .collect()
}

/// Reshape a row-major flat grid into `density` rows.
fn to_square(flat: &[f64], density: usize) -> Vec<Vec<f64>> {
    flat.chunks(density).map(<[f64]>::to_vec).collect()
}

fn check_grid(domains: &[(f64, f64)], density: usize) -> Result<(), ForestError> {
    if density < 2 {
        return Err(ForestError::InvalidGrid {
            reason: format!("density must be at least 2, got {density}"),
        });
    }
    if let Some((start, end)) = domains
        .iter()
        .find(|(start, end)| !start.is_finite() || !end.is_finite())
    {
        return Err(ForestError::InvalidGrid {
            reason: format!("domain ({start}, {end}) is not finite"),
        });
    }
    Ok(())
}

fn check_width<L: TreeLearner>(ensemble: &Ensemble<L>, width: usize) -> Result<(), ForestError> {
    if ensemble.n_features() != width {
        return Err(ForestError::PredictionFeatureMismatch {
            expected: ensemble.n_features(),
            got: width,
            row_index: 0,
        });
    }
    Ok(())
}

/// Evaluate all points of `rows`, returning the aggregate per row and the
/// first `visible_trees` trees' predictions `[tree][row]`.
fn evaluate_rows<L: TreeLearner>(
    ensemble: &Ensemble<L>,
    rows: &[Vec<f64>],
    visible_trees: usize,
) -> Result<(Vec<f64>, Vec<Vec<f64>>), ForestError> {
    let mut by_tree = ensemble.query_trees(rows, ensemble.tree_count())?;
    let aggregation = ensemble.config().aggregation();
    let main = (0..rows.len())
        .map(|r| {
            let votes: Vec<f64> = by_tree.iter().map(|tree| tree[r]).collect();
            aggregate(aggregation, &votes)
        })
        .collect();
    by_tree.truncate(visible_trees);
    Ok((main, by_tree))
}

/// Evaluate a two-feature ensemble over a `density × density` grid.
///
/// Per-tree boundaries are returned for the first
/// `min(visible_trees, tree_count)` trees.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`ForestError::InvalidGrid`] | `density < 2` or a domain bound is not finite |
/// | [`ForestError::PredictionFeatureMismatch`] | the ensemble does not take exactly 2 features |
/// | [`ForestError::Learner`] | a tree failed to predict |
pub fn evaluate_grid<L: TreeLearner>(
    ensemble: &Ensemble<L>,
    spec: &GridSpec,
    visible_trees: usize,
) -> Result<DecisionBoundary, ForestError> {
    check_grid(&[spec.x_domain, spec.y_domain], spec.density)?;
    check_width(ensemble, 2)?;

    let xs = linspace(spec.x_domain, spec.density);
    let ys = linspace(spec.y_domain, spec.density);
    let points: Vec<Vec<f64>> = xs
        .iter()
        .flat_map(|&x| ys.iter().map(move |&y| vec![x, y]))
        .collect();

    let (main, by_tree) = evaluate_rows(ensemble, &points, visible_trees)?;
    let d = spec.density;
    Ok(DecisionBoundary {
        main: to_square(&main, d),
        trees: by_tree.iter().map(|t| to_square(t, d)).collect(),
    })
}

/// Evaluate a one-feature ensemble at `density` points across `domain`.
///
/// # Errors
///
/// As [`evaluate_grid`], with the ensemble required to take exactly 1 feature.
pub fn evaluate_curve<L: TreeLearner>(
    ensemble: &Ensemble<L>,
    domain: (f64, f64),
    density: usize,
    visible_trees: usize,
) -> Result<Curve, ForestError> {
    check_grid(&[domain], density)?;
    check_width(ensemble, 1)?;

    let xs = linspace(domain, density);
    let rows: Vec<Vec<f64>> = xs.iter().map(|&x| vec![x]).collect();
    let (main, trees) = evaluate_rows(ensemble, &rows, visible_trees)?;
    Ok(Curve { xs, main, trees })
}

#[cfg(test)]
mod tests {
    use super::{GridSpec, evaluate_curve, evaluate_grid, linspace};
    use crate::cart::{CartLearner, CartOptions};
    use crate::config::{EnsembleKind, ForestConfig};
    use crate::dataset::TrainingSet;
    use crate::ForestError;

    fn quadrant_classifier() -> crate::Ensemble<CartLearner> {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for i in 0..10 {
            let v = i as f64 * 0.5;
            features.push(vec![-1.0 - v, 0.0]);
            labels.push(-1.0);
            features.push(vec![1.0 + v, 0.0]);
            labels.push(1.0);
        }
        let set = TrainingSet::new(features, labels).unwrap();
        ForestConfig::new(EnsembleKind::Classifier, 6, CartOptions::new())
            .unwrap()
            .with_seed(3)
            .fit(&CartLearner, &set)
            .unwrap()
    }

    #[test]
    fn linspace_includes_both_ends() {
        assert_eq!(linspace((-6.0, 6.0), 5), vec![-6.0, -3.0, 0.0, 3.0, 6.0]);
    }

    #[test]
    fn grid_dimensions_and_consistency_with_predict() {
        let ensemble = quadrant_classifier();
        let spec = GridSpec::square((-6.0, 6.0), 7);
        let boundary = evaluate_grid(&ensemble, &spec, 4).unwrap();
        assert_eq!(boundary.main.len(), 7);
        assert!(boundary.main.iter().all(|row| row.len() == 7));
        assert_eq!(boundary.trees.len(), 4);

        let xs = linspace(spec.x_domain, 7);
        let ys = linspace(spec.y_domain, 7);
        let probe = vec![vec![xs[1], ys[5]]];
        let expected = ensemble.predict(&probe).unwrap();
        assert_eq!(boundary.main[1][5], expected.final_prediction[0]);
        assert_eq!(boundary.trees[2][1][5], expected.per_tree[0][2]);
    }

    #[test]
    fn visible_trees_capped_at_tree_count() {
        let ensemble = quadrant_classifier();
        let boundary = evaluate_grid(&ensemble, &GridSpec::square((0.0, 1.0), 2), 100).unwrap();
        assert_eq!(boundary.trees.len(), ensemble.tree_count());
    }

    #[test]
    fn density_below_two_rejected() {
        let ensemble = quadrant_classifier();
        let err = evaluate_grid(&ensemble, &GridSpec::square((0.0, 1.0), 1), 1).unwrap_err();
        assert!(matches!(err, ForestError::InvalidGrid { .. }));
    }

    #[test]
    fn curve_requires_one_feature() {
        let ensemble = quadrant_classifier();
        let err = evaluate_curve(&ensemble, (0.0, 1.0), 10, 1).unwrap_err();
        assert!(matches!(err, ForestError::PredictionFeatureMismatch { expected: 2, got: 1, .. }));
    }
}
