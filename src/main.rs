use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::info;

use grove_forest::cart::{CartLearner, CartOptions};
use grove_forest::{
    ClassificationMetrics, Curve, DecisionBoundary, Ensemble, EnsembleKind, ForestConfig,
    GridSpec, PredictionResult, RegressionMetrics, Seed, TrainingChannel, TrainingRequest,
    TrainingSet, evaluate_curve, evaluate_grid, train_test_split,
};

#[derive(Parser)]
#[command(name = "grove")]
#[command(about = "Train, query, and visualise bagged decision-tree ensembles")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// RNG seed; overrides the seed in the request file
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Enable verbose (debug-level) logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Number of threads for parallel computation (defaults to all cores)
    #[arg(long, global = true)]
    threads: Option<usize>,
}

#[derive(Subcommand)]
enum Command {
    /// Train an ensemble from a request file on a background run and save it
    Train {
        /// Path to the training request JSON ({hyperparameters, trainingSet})
        #[arg(long)]
        request: PathBuf,

        /// Where to write the model JSON
        #[arg(long)]
        output: PathBuf,
    },

    /// Predict rows with a saved ensemble
    Predict {
        /// Path to the model JSON
        #[arg(long)]
        model: PathBuf,

        /// Path to a JSON array of feature rows
        #[arg(long)]
        rows: PathBuf,

        /// Expected ensemble kind: classifier or regressor
        #[arg(long)]
        kind: EnsembleKind,
    },

    /// Train on the leading rows of a request and score the trailing rows
    Evaluate {
        /// Path to the training request JSON
        #[arg(long)]
        request: PathBuf,

        /// Percentage of rows used for training
        #[arg(long, default_value_t = 70.0)]
        train_percent: f64,

        /// Label treated as the positive class when scoring classifiers
        #[arg(long, default_value_t = 1.0, allow_negative_numbers = true)]
        positive_label: f64,
    },

    /// Evaluate a saved ensemble over a grid (2 features) or a curve (1 feature)
    Boundary {
        /// Path to the model JSON
        #[arg(long)]
        model: PathBuf,

        /// Expected ensemble kind: classifier or regressor
        #[arg(long)]
        kind: EnsembleKind,

        /// Points per axis
        #[arg(long, default_value_t = 50)]
        density: usize,

        /// Domain start and end, shared by both axes
        #[arg(
            long,
            num_args = 2,
            value_names = ["START", "END"],
            allow_negative_numbers = true,
            default_values_t = [-6.0, 6.0]
        )]
        domain: Vec<f64>,

        /// Number of per-tree boundaries to include
        #[arg(long, default_value_t = 16)]
        visible_trees: usize,
    },
}

// --- JSON stdout output structs ---

#[derive(Serialize)]
struct TrainOutput {
    run_id: u64,
    kind: String,
    tree_count: usize,
    n_features: usize,
    model: PathBuf,
}

#[derive(Serialize)]
struct PredictOutput {
    n_rows: usize,
    tree_count: usize,
    #[serde(flatten)]
    result: PredictionResult,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Scores {
    Classification(ClassificationMetrics),
    Regression(RegressionMetrics),
}

#[derive(Serialize)]
struct EvaluateOutput {
    kind: String,
    n_train: usize,
    n_test: usize,
    tree_count: usize,
    metrics: Scores,
}

#[derive(Serialize)]
#[serde(untagged)]
enum BoundaryOutput {
    Grid(DecisionBoundary),
    Curve(Curve),
}

fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read {what} from {}", path.display()))?;
    serde_json::from_slice(&bytes)
        .with_context(|| format!("failed to parse {what} in {}", path.display()))
}

fn read_request(path: &Path, seed: Option<u64>) -> Result<TrainingRequest<CartOptions>> {
    let mut request: TrainingRequest<CartOptions> = read_json(path, "training request")?;
    if let Some(seed) = seed {
        request.hyperparameters.seed = Seed::Number(seed);
    }
    info!(
        n_rows = request.training_set.n_rows(),
        n_columns = request.training_set.n_columns(),
        tree_count = request.hyperparameters.tree_count,
        "loaded training request"
    );
    Ok(request)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match (cli.verbose, cli.quiet) {
        (true, _) => "debug",
        (_, true) => "error",
        _ => "info",
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Configure Rayon thread pool
    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure thread pool")?;
        info!(threads, "thread pool configured");
    }

    match cli.command {
        Command::Train { request, output } => {
            let request = read_request(&request, cli.seed)?;

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("failed to start async runtime")?;
            let completed = runtime.block_on(async {
                let mut channel = TrainingChannel::new(CartLearner);
                channel.submit(request);
                channel.next_model().await
            })
            .context("training failed")?;

            let ensemble = completed.ensemble;
            ensemble
                .save(&output)
                .with_context(|| format!("failed to save model to {}", output.display()))?;

            let summary = TrainOutput {
                run_id: completed.run_id.get(),
                kind: ensemble.kind().to_string(),
                tree_count: ensemble.tree_count(),
                n_features: ensemble.n_features(),
                model: output,
            };
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }

        Command::Predict { model, rows, kind } => {
            let ensemble = Ensemble::load(CartLearner, &model, kind)
                .with_context(|| format!("failed to load model from {}", model.display()))?;
            let rows: Vec<Vec<f64>> = read_json(&rows, "feature rows")?;
            let result = ensemble.predict(&rows).context("prediction failed")?;

            let output = PredictOutput {
                n_rows: rows.len(),
                tree_count: ensemble.tree_count(),
                result,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Evaluate {
            request,
            train_percent,
            positive_label,
        } => {
            let request = read_request(&request, cli.seed)?;
            let config = ForestConfig::try_from(request.hyperparameters)
                .context("invalid hyperparameters")?;
            let (features, labels) = request.training_set.into_parts();
            let (train_x, test_x) = train_test_split(&features, train_percent);
            let (train_y, test_y) = train_test_split(&labels, train_percent);
            anyhow::ensure!(
                !test_x.is_empty(),
                "train percentage {train_percent} leaves no rows to evaluate"
            );
            let train_set = TrainingSet::new(train_x.to_vec(), train_y.to_vec())
                .context("training split is not a valid training set")?;

            let ensemble = config
                .fit(&CartLearner, &train_set)
                .context("training failed")?;
            let predicted = ensemble.predict(test_x).context("prediction failed")?;

            let metrics = match ensemble.kind() {
                EnsembleKind::Classifier => Scores::Classification(
                    ClassificationMetrics::from_labels(
                        &predicted.final_prediction,
                        test_y,
                        positive_label,
                    )
                    .context("scoring failed")?,
                ),
                EnsembleKind::Regressor => Scores::Regression(
                    RegressionMetrics::from_values(&predicted.final_prediction, test_y)
                        .context("scoring failed")?,
                ),
            };
            info!(n_train = train_x.len(), n_test = test_x.len(), "evaluation complete");

            let output = EvaluateOutput {
                kind: ensemble.kind().to_string(),
                n_train: train_x.len(),
                n_test: test_x.len(),
                tree_count: ensemble.tree_count(),
                metrics,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Boundary {
            model,
            kind,
            density,
            domain,
            visible_trees,
        } => {
            let ensemble = Ensemble::load(CartLearner, &model, kind)
                .with_context(|| format!("failed to load model from {}", model.display()))?;
            let domain = (domain[0], domain[1]);

            let output = match ensemble.n_features() {
                1 => BoundaryOutput::Curve(
                    evaluate_curve(&ensemble, domain, density, visible_trees)
                        .context("curve evaluation failed")?,
                ),
                2 => BoundaryOutput::Grid(
                    evaluate_grid(&ensemble, &GridSpec::square(domain, density), visible_trees)
                        .context("grid evaluation failed")?,
                ),
                n => anyhow::bail!("boundary needs a model with 1 or 2 features, this one has {n}"),
            };
            info!(density, visible_trees, "boundary evaluated");
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
