//! End-to-end behaviour of ensemble training, prediction, and encoding.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use grove_forest::cart::{CartLearner, CartOptions};
use grove_forest::{
    Aggregation, ClassificationMetrics, Ensemble, EnsembleKind, ErrorCategory, ForestConfig,
    ForestError, HyperparameterSpec, RegressionMetrics, SampleSize, TrainingSet, train_test_split,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// 100 rows, one column: `y = 3x + noise`.
fn make_regression() -> TrainingSet {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let features: Vec<Vec<f64>> = (0..100).map(|i| vec![i as f64 / 10.0]).collect();
    let labels = features
        .iter()
        .map(|row| 3.0 * row[0] + rng.r#gen::<f64>() * 0.5)
        .collect();
    TrainingSet::new(features, labels).unwrap()
}

/// Two Gaussian-ish blobs labelled -1 / +1 plus three noise columns.
fn make_classification(n_rows: usize, seed: u64) -> TrainingSet {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut features = Vec::with_capacity(n_rows);
    let mut labels = Vec::with_capacity(n_rows);
    for i in 0..n_rows {
        let positive = i % 2 == 0;
        let centre = if positive { 2.0 } else { -2.0 };
        let mut row = vec![
            centre + rng.r#gen::<f64>() - 0.5,
            centre + rng.r#gen::<f64>() - 0.5,
        ];
        row.extend((0..3).map(|_| rng.r#gen::<f64>()));
        features.push(row);
        labels.push(if positive { 1.0 } else { -1.0 });
    }
    TrainingSet::new(features, labels).unwrap()
}

fn classifier_config(tree_count: usize) -> ForestConfig<CartOptions> {
    ForestConfig::new(EnsembleKind::Classifier, tree_count, CartOptions::new())
        .unwrap()
        .with_max_samples(SampleSize::Fraction(0.8))
        .with_max_features(SampleSize::Count(3))
        .with_seed(7)
}

// ---------------------------------------------------------------------------
// Training
// ---------------------------------------------------------------------------

#[test]
fn regression_scenario_pairs_and_predictions() {
    let set = make_regression();
    let config = ForestConfig::new(EnsembleKind::Regressor, 10, CartOptions::new())
        .unwrap()
        .with_max_samples(SampleSize::Fraction(1.0))
        .with_max_features(SampleSize::Count(1));
    let ensemble = config.fit(&CartLearner, &set).unwrap();

    assert_eq!(ensemble.tree_count(), 10);
    for entry in ensemble.trees() {
        assert_eq!(entry.used_features(), &[0]);
    }

    let result = ensemble.predict(set.features()).unwrap();
    assert_eq!(result.final_prediction.len(), 100);
    assert!(result.vote_tally.is_none());
    let metrics = RegressionMetrics::from_values(&result.final_prediction, set.labels()).unwrap();
    assert!(metrics.r2 > 0.95, "r2 = {}", metrics.r2);
}

#[test]
fn same_seed_same_ensemble() {
    let set = make_classification(80, 1);
    let config = classifier_config(12);
    let a = config.fit(&CartLearner, &set).unwrap();
    let b = config.fit(&CartLearner, &set).unwrap();
    for (x, y) in a.trees().iter().zip(b.trees()) {
        assert_eq!(x.used_features(), y.used_features());
        assert_eq!(x.model(), y.model());
    }
    let probe = make_classification(20, 99);
    assert_eq!(a.predict(probe.features()).unwrap(), b.predict(probe.features()).unwrap());
}

#[test]
fn different_seeds_draw_different_features() {
    let set = make_classification(80, 1);
    let a = classifier_config(12).with_seed(1).fit(&CartLearner, &set).unwrap();
    let b = classifier_config(12).with_seed(2).fit(&CartLearner, &set).unwrap();
    let used = |e: &Ensemble<CartLearner>| -> Vec<Vec<usize>> {
        e.trees().iter().map(|t| t.used_features().to_vec()).collect()
    };
    assert_ne!(used(&a), used(&b));
}

#[test]
fn feature_subsets_are_distinct_without_replacement() {
    let set = make_classification(40, 3);
    let ensemble = classifier_config(25).fit(&CartLearner, &set).unwrap();
    for entry in ensemble.trees() {
        let mut cols = entry.used_features().to_vec();
        assert_eq!(cols.len(), 3);
        cols.sort_unstable();
        cols.dedup();
        assert_eq!(cols.len(), 3);
        assert!(cols.iter().all(|&c| c < 5));
    }
}

#[test]
fn feature_subsets_may_repeat_with_replacement() {
    let set = make_classification(40, 3);
    let config = classifier_config(40)
        .with_max_features(SampleSize::Count(5))
        .with_feature_replacement(true);
    let ensemble = config.fit(&CartLearner, &set).unwrap();
    let any_repeat = ensemble.trees().iter().any(|entry| {
        let mut cols = entry.used_features().to_vec();
        cols.sort_unstable();
        cols.dedup();
        cols.len() < 5
    });
    assert!(any_repeat);
}

#[test]
fn oversized_max_features_fails_before_training() {
    let set = TrainingSet::new(vec![vec![0.0, 1.0], vec![1.0, 0.0]], vec![-1.0, 1.0]).unwrap();
    let config = ForestConfig::new(EnsembleKind::Classifier, 3, CartOptions::new())
        .unwrap()
        .with_max_features(SampleSize::Count(5));
    let err = config.fit(&CartLearner, &set).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Configuration);
    assert!(matches!(err, ForestError::InvalidSampleSize { resolved: 5, available: 2, .. }));
}

#[test]
fn learner_option_error_is_wrapped() {
    let set = make_classification(10, 5);
    let config = classifier_config(2).with_tree_options(CartOptions::new().with_max_depth(Some(0)));
    let err = config.fit(&CartLearner, &set).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Learner);
}

// ---------------------------------------------------------------------------
// Prediction
// ---------------------------------------------------------------------------

#[test]
fn classifier_accuracy_on_held_out_rows() {
    let set = make_classification(200, 11);
    let (features, labels) = set.into_parts();
    let (train_x, test_x) = train_test_split(&features, 70.0);
    let (train_y, test_y) = train_test_split(&labels, 70.0);
    let train_set = TrainingSet::new(train_x.to_vec(), train_y.to_vec()).unwrap();

    let ensemble = classifier_config(30).fit(&CartLearner, &train_set).unwrap();
    let result = ensemble.predict(test_x).unwrap();
    let metrics = ClassificationMetrics::from_labels(&result.final_prediction, test_y, 1.0).unwrap();
    assert!(metrics.accuracy > 0.9, "accuracy = {}", metrics.accuracy);

    let tally = result.vote_tally.unwrap();
    assert_eq!(tally.per_row.len(), test_x.len());
    for count in &tally.per_row {
        assert_eq!(count.negative + count.positive, 30);
    }
}

#[test]
fn tally_agrees_with_mode() {
    let set = make_classification(60, 4);
    let ensemble = classifier_config(9).fit(&CartLearner, &set).unwrap();
    let result = ensemble.predict(set.features()).unwrap();
    let tally = result.vote_tally.unwrap();
    // 9 trees cannot tie, so the majority decides.
    for (count, prediction) in tally.per_row.iter().zip(&result.final_prediction) {
        let majority = if count.positive > count.negative { 1.0 } else { -1.0 };
        assert_eq!(majority, *prediction);
    }
}

#[test]
fn mean_aggregation_on_classifier_labels_averages_votes() {
    let set = make_classification(30, 8);
    let ensemble = classifier_config(5)
        .with_aggregation(Aggregation::Mean)
        .fit(&CartLearner, &set)
        .unwrap();
    let result = ensemble.predict(&set.features()[..3]).unwrap();
    for (row, value) in result.per_tree.iter().zip(&result.final_prediction) {
        assert_eq!(row.iter().sum::<f64>() / 5.0, *value);
    }
}

#[test]
fn non_binary_labels_fail_vote_tally() {
    let set = TrainingSet::new(
        vec![vec![0.0], vec![1.0], vec![2.0], vec![3.0]],
        vec![0.0, 0.0, 1.0, 1.0],
    )
    .unwrap();
    let ensemble = ForestConfig::new(EnsembleKind::Classifier, 3, CartOptions::new())
        .unwrap()
        .with_bagging(false)
        .fit(&CartLearner, &set)
        .unwrap();
    let err = ensemble.predict(&[vec![0.0]]).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::LabelDomain);
}

#[test]
fn wrong_width_rejected_before_querying() {
    let set = make_classification(20, 2);
    let ensemble = classifier_config(3).fit(&CartLearner, &set).unwrap();
    let rows = vec![vec![0.0; 5], vec![0.0; 4]];
    let err = ensemble.predict(&rows).unwrap_err();
    assert!(matches!(
        err,
        ForestError::PredictionFeatureMismatch { expected: 5, got: 4, row_index: 1 }
    ));
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

#[test]
fn json_round_trip_preserves_predictions() {
    let set = make_classification(50, 6);
    let ensemble = classifier_config(8).fit(&CartLearner, &set).unwrap();
    let value = ensemble.to_json().unwrap();
    let text = serde_json::to_string(&value).unwrap();
    let restored = Ensemble::from_json(
        CartLearner,
        serde_json::from_str(&text).unwrap(),
        EnsembleKind::Classifier,
    )
    .unwrap();

    assert_eq!(restored.tree_count(), ensemble.tree_count());
    for (a, b) in restored.trees().iter().zip(ensemble.trees()) {
        assert_eq!(a.used_features(), b.used_features());
    }
    let probe = make_classification(25, 77);
    assert_eq!(
        restored.predict(probe.features()).unwrap(),
        ensemble.predict(probe.features()).unwrap()
    );
}

#[test]
fn hyperparameters_travel_with_payload() {
    let set = make_regression();
    let config = ForestConfig::new(EnsembleKind::Regressor, 3, CartOptions::new().with_max_depth(Some(4)))
        .unwrap()
        .with_seed("0.41872");
    let ensemble = config.fit(&CartLearner, &set).unwrap();
    let payload = ensemble.to_payload().unwrap();
    assert_eq!(payload.hyperparameters, HyperparameterSpec::from(&config));
    assert_eq!(payload.hyperparameters.tree_learner_options.max_depth(), Some(4));
}
