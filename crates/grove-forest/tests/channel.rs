//! Restart-on-submit behaviour of the training channel.

use std::time::Duration;

use grove_forest::cart::{CartLearner, CartOptions};
use grove_forest::{
    EnsembleKind, ForestConfig, ForestError, HyperparameterSpec, TrainingChannel, TrainingRequest,
    TrainingSet,
};

fn request(n_rows: usize, tree_count: usize) -> TrainingRequest<CartOptions> {
    let config = ForestConfig::new(EnsembleKind::Regressor, tree_count, CartOptions::new())
        .unwrap()
        .with_seed(5);
    TrainingRequest {
        hyperparameters: HyperparameterSpec::from(&config),
        training_set: TrainingSet::new(
            (0..n_rows)
                .map(|i| vec![i as f64, ((i * 7) % 13) as f64, ((i * 3) % 5) as f64])
                .collect(),
            (0..n_rows).map(|i| ((i * 31) % 97) as f64).collect(),
        )
        .unwrap(),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn newer_request_supersedes_running_one() {
    let mut channel = TrainingChannel::new(CartLearner);
    let first = channel.submit(request(3_000, 400));
    let second = channel.submit(request(30, 3));
    assert!(second > first);

    let done = channel.next_model().await.unwrap();
    assert_eq!(done.run_id, second);
    assert_eq!(done.ensemble.tree_count(), 3);

    // Nothing else is ever delivered.
    assert!(matches!(channel.next_model().await, Err(ForestError::NoActiveRun)));
}

#[tokio::test]
async fn finished_but_superseded_result_is_discarded() {
    let mut channel = TrainingChannel::new(CartLearner);
    let first = channel.submit(request(20, 2));
    // Give the first run time to finish and queue its completion.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let second = channel.submit(request(25, 4));

    let done = channel.next_model().await.unwrap();
    assert_ne!(done.run_id, first);
    assert_eq!(done.run_id, second);
    assert_eq!(done.ensemble.tree_count(), 4);
}

#[tokio::test]
async fn resubmitting_after_completion_starts_fresh() {
    let mut channel = TrainingChannel::new(CartLearner);
    let a = channel.submit(request(20, 2));
    assert_eq!(channel.next_model().await.unwrap().run_id, a);
    let b = channel.submit(request(20, 3));
    let done = channel.next_model().await.unwrap();
    assert_eq!(done.run_id, b);
    assert_eq!(done.ensemble.kind(), EnsembleKind::Regressor);
}

#[tokio::test]
async fn unknown_kind_reported_as_error() {
    let mut channel = TrainingChannel::new(CartLearner);
    let mut bad = request(10, 2);
    bad.hyperparameters.kind = "ranker".to_string();
    channel.submit(bad);
    let err = channel.next_model().await.unwrap_err();
    assert!(matches!(err, ForestError::UnknownKind { .. }));
}
