//! End-to-end integration tests: CSV -> forest -> JSON -> deserialize.

use std::fs;
use std::path::{Path, PathBuf};

use canopy_io::{FeatureName, FeatureTableReader, IoError, ResultWriter, SplitScores};
use canopy_rf::{ClassWeight, ConfusionMatrix, RandomForest, RandomForestConfig, SplitCriterion};
use tempfile::TempDir;

fn fixture_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn fit(train_path: &Path) -> RandomForest {
    let train = FeatureTableReader::new(train_path).read().unwrap();
    RandomForestConfig::new(25)
        .unwrap()
        .with_criterion(SplitCriterion::Entropy)
        .with_class_weight(ClassWeight::Balanced)
        .with_seed(42)
        .fit(train.features(), train.require_labels().unwrap(), train.feature_names())
        .unwrap()
        .into_forest()
}

#[test]
fn evaluation_round_trip() {
    let train = FeatureTableReader::new(&fixture_path("train_3class.csv"))
        .read()
        .expect("fixture should parse");
    let dev = FeatureTableReader::new(&fixture_path("dev_3class.csv"))
        .read()
        .expect("fixture should parse");
    assert_eq!(train.n_samples(), 30);
    assert_eq!(dev.n_samples(), 9);
    assert_eq!(train.feature_names(), dev.feature_names());

    let forest = fit(train.path());
    let mut scores = Vec::new();
    let mut dev_matrix = None;
    for table in [&train, &dev] {
        let labels = table.require_labels().unwrap();
        let predictions = forest.predict_batch(table.features()).unwrap();
        let matrix = ConfusionMatrix::from_labels(labels, &predictions, forest.n_classes()).unwrap();
        scores.push(SplitScores {
            n_samples: table.n_samples(),
            accuracy: matrix.accuracy(),
            macro_recall: matrix.macro_recall(),
        });
        dev_matrix = Some(matrix);
    }
    let dev_matrix = dev_matrix.unwrap();

    let dir = TempDir::new().unwrap();
    let writer = ResultWriter::new(dir.path(), FeatureName::new("FAU".into()).unwrap()).unwrap();
    let params = serde_json::json!({
        "n_estimators": 25,
        "max_features": "sqrt",
        "max_depth": null,
        "criterion": "entropy"
    });
    let path = writer
        .write_evaluation("RF", &params, scores[0], scores[1], dev_matrix.as_rows())
        .unwrap();

    let content: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(content["feature"], "FAU");
    assert_eq!(content["hyperparameters"]["criterion"], "entropy");
    assert_eq!(content["dev"]["n_samples"], 9);
    // The informative columns separate the classes by a wide margin.
    assert!(content["dev"]["accuracy"].as_f64().unwrap() > 0.99);

    let rows = content["dev_confusion_matrix"].as_array().unwrap();
    assert_eq!(rows.len(), 3);
    let total: u64 = rows
        .iter()
        .flat_map(|r| r.as_array().unwrap())
        .map(|v| v.as_u64().unwrap())
        .sum();
    assert_eq!(total, 9);
}

#[test]
fn unlabeled_probabilities_round_trip() {
    let forest = fit(&fixture_path("train_3class.csv"));
    let table = FeatureTableReader::new(&fixture_path("unlabeled_3class.csv"))
        .read()
        .unwrap();
    assert!(table.labels().is_none());

    let probabilities = forest.predict_proba_batch(table.features()).unwrap();
    let classes: Vec<usize> = probabilities.iter().map(|d| d.predicted_class()).collect();
    let rows: Vec<Vec<f64>> = probabilities.into_iter().map(|d| d.into_vec()).collect();

    let dir = TempDir::new().unwrap();
    let writer = ResultWriter::new(dir.path(), FeatureName::new("FAU".into()).unwrap()).unwrap();
    let path = writer
        .write_probabilities(table.sample_ids(), &classes, &rows)
        .unwrap();

    let content: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(content["n_samples"], 6);
    assert_eq!(content["n_classes"], 3);
    let samples = content["samples"].as_array().unwrap();
    for (entry, id) in samples.iter().zip(table.sample_ids()) {
        assert_eq!(entry["id"], id.as_str());
        let sum: f64 = entry["probabilities"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p.as_f64().unwrap())
            .sum();
        assert!((sum - 1.0).abs() < 1e-9, "probabilities sum to {sum}");
    }
    // Rows are written in class order 0, 0, 1, 1, 2, 2.
    let predicted: Vec<u64> = samples
        .iter()
        .map(|s| s["predicted_class"].as_u64().unwrap())
        .collect();
    assert_eq!(predicted, vec![0, 0, 1, 1, 2, 2]);
}

#[test]
fn saved_model_beside_artifacts() {
    let forest = fit(&fixture_path("train_3class.csv"));
    let dir = TempDir::new().unwrap();
    let writer = ResultWriter::new(dir.path(), FeatureName::new("FAU".into()).unwrap()).unwrap();

    let model_path = writer.model_path();
    forest.save(&model_path).unwrap();
    let loaded = RandomForest::load(&model_path).unwrap();
    assert_eq!(loaded.n_trees(), 25);
    assert_eq!(loaded.feature_names().len(), 4);
}

#[test]
fn unlabeled_table_cannot_train() {
    let table = FeatureTableReader::new(&fixture_path("unlabeled_3class.csv"))
        .read()
        .unwrap();
    assert!(matches!(
        table.require_labels(),
        Err(IoError::MissingLabels { .. })
    ));
}
