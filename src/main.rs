use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};

use canopy_io::{FeatureName, FeatureTable, FeatureTableReader, ResultWriter, SplitScores};
use canopy_model::{ConfigLayout, DataSplits, LabeledSplit, RandomForestModel, RunMode};
use canopy_rf::{RandomForest, accuracy_score};

#[derive(Parser)]
#[command(name = "canopy")]
#[command(about = "Random forest tuning, training and evaluation for feature-level classification")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// RNG seed for reproducibility
    #[arg(long, default_value_t = 42, global = true)]
    seed: u64,

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
    /// Resolve or tune hyperparameters, train, and evaluate on train and dev
    Run {
        /// Feature name used in parameter and output file names (must match [a-zA-Z0-9_-]+)
        #[arg(long)]
        feature: String,

        /// Labeled training CSV (id,label,features...)
        #[arg(long)]
        train: PathBuf,

        /// Labeled development CSV (id,label,features...)
        #[arg(long)]
        dev: PathBuf,

        /// Use the baseline parameter file and cross-validated grid search
        #[arg(long, default_value_t = false)]
        baseline: bool,

        /// Start from fixed placeholder hyperparameters instead of tuning
        #[arg(long, default_value_t = false)]
        test_mode: bool,

        /// Directory holding model.json and tuned parameter files
        #[arg(long, default_value = "config")]
        config_dir: PathBuf,

        /// Output directory for result files
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,

        /// Also save the trained forest as {feature}_model.bin
        #[arg(long, default_value_t = false)]
        save_model: bool,
    },

    /// Write class probabilities for a CSV using a saved forest
    Predict {
        /// Path to the trained model binary
        #[arg(long)]
        model: PathBuf,

        /// CSV to score (id[,label],features...)
        #[arg(long)]
        data: PathBuf,

        /// Feature name for output files
        #[arg(long)]
        feature: String,

        /// Output directory for result files
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },
}

// --- JSON stdout output structs ---

#[derive(Serialize)]
struct RunOutput {
    feature: String,
    model: &'static str,
    params_path: PathBuf,
    hyperparameters: serde_json::Value,
    train: SplitScores,
    dev: SplitScores,
    n_features: usize,
    model_path: Option<PathBuf>,
}

#[derive(Serialize)]
struct PredictOutput {
    feature: String,
    n_samples: usize,
    model_n_trees: usize,
    model_n_features: usize,
    model_n_classes: usize,
    accuracy: Option<f64>,
}

fn labeled_split(name: &'static str, table: FeatureTable) -> Result<LabeledSplit> {
    table
        .require_labels()
        .with_context(|| format!("{name} data must be labeled"))?;
    let (features, labels) = table.into_parts();
    let labels = labels.unwrap_or_default();
    Ok(LabeledSplit::new(name, features, labels)?)
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
        Command::Run {
            feature,
            train,
            dev,
            baseline,
            test_mode,
            config_dir,
            output_dir,
            save_model,
        } => {
            let feature_name = FeatureName::new(feature.clone())?;

            // 1. Read both splits
            let train_table = FeatureTableReader::new(&train)
                .read()
                .context("failed to read training CSV")?;
            let dev_table = FeatureTableReader::new(&dev)
                .read()
                .context("failed to read development CSV")?;
            if train_table.feature_names() != dev_table.feature_names() {
                warn!("train and dev feature columns are named differently");
            }
            let dev_ids = dev_table.sample_ids().to_vec();
            let n_features = train_table.n_features();
            let splits = DataSplits::new(
                labeled_split("train", train_table)?,
                labeled_split("dev", dev_table)?,
            )?;

            // 2. Resolve or tune hyperparameters, then train
            let layout = ConfigLayout::new(config_dir);
            let mode = RunMode::default()
                .with_test(test_mode)
                .with_baseline(baseline);
            let mut model = RandomForestModel::new(feature_name.as_str(), splits, mode, &layout)
                .context("failed to load model config")?
                .with_seed(cli.seed);
            model.run().context("training failed")?;

            // 3. Evaluate and collect dev probabilities
            let report = model.evaluate()?;
            let probabilities = model.session_probability()?;

            let train_scores = SplitScores {
                n_samples: report.train_predictions.len(),
                accuracy: report.train_accuracy,
                macro_recall: report.train_recall,
            };
            let dev_scores = SplitScores {
                n_samples: report.dev_predictions.len(),
                accuracy: report.dev_accuracy,
                macro_recall: report.dev_recall,
            };
            let hyperparameters = serde_json::to_value(model.hyperparameters())?;

            // 4. Write artifacts
            let writer = ResultWriter::new(&output_dir, feature_name)?;
            writer.write_evaluation(
                model.model_name(),
                &hyperparameters,
                train_scores,
                dev_scores,
                report.dev_confusion.as_rows(),
            )?;
            writer.write_probabilities(&dev_ids, &report.dev_predictions, &probabilities)?;

            let model_path = if save_model {
                let path = writer.model_path();
                model
                    .forest()
                    .context("forest missing after training")?
                    .save(&path)
                    .context("failed to save model")?;
                Some(path)
            } else {
                None
            };

            // 5. Print summary
            let output = RunOutput {
                feature,
                model: model.model_name(),
                params_path: model.params_path().to_path_buf(),
                hyperparameters,
                train: train_scores,
                dev: dev_scores,
                n_features,
                model_path,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Predict {
            model,
            data,
            feature,
            output_dir,
        } => {
            let feature_name = FeatureName::new(feature.clone())?;

            // 1. Load model
            let forest = RandomForest::load(&model).context("failed to load model")?;
            info!(
                n_trees = forest.n_trees(),
                n_features = forest.n_features(),
                n_classes = forest.n_classes(),
                "model loaded"
            );

            // 2. Read data
            let table = FeatureTableReader::new(&data)
                .read()
                .context("failed to read input CSV")?;

            // 3. Predict
            let distributions = forest
                .predict_proba_batch(table.features())
                .context("prediction failed")?;
            let predicted: Vec<usize> = distributions.iter().map(|d| d.predicted_class()).collect();
            let probabilities: Vec<Vec<f64>> =
                distributions.into_iter().map(|d| d.into_vec()).collect();

            // 4. Score when labels are present
            let accuracy = match table.labels() {
                Some(labels) => {
                    let accuracy = accuracy_score(labels, &predicted)?;
                    info!(accuracy = %format!("{accuracy:.3}"), "accuracy on input set");
                    Some(accuracy)
                }
                None => None,
            };

            // 5. Write probabilities JSON
            let writer = ResultWriter::new(&output_dir, feature_name)?;
            writer.write_probabilities(table.sample_ids(), &predicted, &probabilities)?;

            // 6. Print summary
            let output = PredictOutput {
                feature,
                n_samples: table.n_samples(),
                model_n_trees: forest.n_trees(),
                model_n_features: forest.n_features(),
                model_n_classes: forest.n_classes(),
                accuracy,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
