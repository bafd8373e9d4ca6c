use std::fs;

use serde_json::{Value, json};

use super::run::evaluate_corpus;
use super::*;
use crate::commands::corpus::PREDICTION_FILE;
use crate::util::read_json;

const CONFIG: &str = r#"
fields:
  tenant_name:
    type: string
    matcher: StringMatcher
    json_ref: "STATIC::Gen Info 1::Tenant Name"
    params: { threshold: 0.85 }
  base_rent:
    type: number
    matcher: NumericMatcher
    json_ref: "STATIC::Rent::Base Rent"
    params: { tolerance: 0.01 }
"#;

struct Corpus {
    _root: tempfile::TempDir,
    ground_truth: std::path::PathBuf,
    predictions: std::path::PathBuf,
    config: std::path::PathBuf,
    output: std::path::PathBuf,
}

fn write_json(path: &Path, value: &Value) {
    fs::create_dir_all(path.parent().expect("fixture path has a parent")).expect("create dir");
    fs::write(path, serde_json::to_vec(value).expect("serialize fixture")).expect("write fixture");
}

fn corpus() -> Corpus {
    let root = tempfile::tempdir().expect("tempdir");
    let ground_truth = root.path().join("interim");
    let predictions = root.path().join("predictions");
    let config = root.path().join("fields_config.yaml");
    let output = root.path().join("results").join("evaluation.csv");
    fs::write(&config, CONFIG).expect("write config");

    write_json(
        &ground_truth.join("lease-001").join("abstract_2024-01-05.json"),
        &json!({
            "Gen Info 1": { "static_fields": { "Tenant Name": "Acme Corp" } },
            "Rent": { "static_fields": { "Base Rent": 5000.00 } }
        }),
    );
    write_json(
        &predictions.join("lease-001").join(PREDICTION_FILE),
        &json!({
            "Gen Info 1": { "static_fields": { "Tenant Name": "ACME Corp." } },
            "Rent": { "static_fields": { "Base Rent": null } }
        }),
    );
    write_json(
        &ground_truth.join("lease-002").join("abstract.json"),
        &json!({ "Rent": { "static_fields": { "Base Rent": 1200 } } }),
    );

    Corpus {
        _root: root,
        ground_truth,
        predictions,
        config,
        output,
    }
}

fn args(corpus: &Corpus) -> EvaluateArgs {
    EvaluateArgs {
        ground_truth: corpus.ground_truth.clone(),
        predictions: corpus.predictions.clone(),
        config: corpus.config.clone(),
        output: corpus.output.clone(),
        summary: None,
        manifest: None,
        top_n: 10,
        threads: Some(2),
        dry_run: false,
    }
}

#[test]
fn evaluate_writes_report_summary_and_manifest() {
    let corpus = corpus();
    run(args(&corpus)).expect("evaluation should succeed");

    let mut reader = csv::Reader::from_path(&corpus.output).expect("report should exist");
    let headers = reader.headers().expect("report has headers").clone();
    assert_eq!(
        headers.iter().collect::<Vec<_>>(),
        vec!["field_name", "accuracy", "correct_docs", "total_docs", "json_ref", "matcher"]
    );
    let rows = reader
        .records()
        .collect::<Result<Vec<_>, _>>()
        .expect("report rows parse");
    assert_eq!(rows.len(), 2);
    assert_eq!(&rows[0][0], "base_rent");
    assert_eq!(&rows[0][1], "0.0000");
    assert_eq!(&rows[0][5], "NumericMatcher");
    assert_eq!(&rows[1][0], "tenant_name");
    assert_eq!(&rows[1][1], "1.0000");
    assert_eq!(&rows[1][4], "STATIC::Gen Info 1::Tenant Name");

    let summary = fs::read_to_string(corpus.output.with_extension("txt")).expect("summary exists");
    assert!(summary.contains("Total documents processed:  1"));
    assert!(summary.contains("Documents skipped:          1"));
    assert!(summary.contains("Overall accuracy:           0.5000 (50.00%)"));

    let manifest: Value =
        read_json(&corpus.output.with_extension("manifest.json")).expect("manifest exists");
    assert_eq!(manifest["status"], "completed");
    assert_eq!(manifest["summary"]["total_correct"], 1);
    assert_eq!(manifest["skipped"][0]["document_id"], "lease-002");
    assert_eq!(manifest["skipped"][0]["reason"], "no prediction json");
    assert_eq!(
        manifest["config_sha256"].as_str().map(str::len),
        Some(64),
        "config hash should be hex sha256"
    );
}

#[test]
fn unreadable_records_are_skipped_not_fatal() {
    let corpus = corpus();
    fs::write(
        corpus.predictions.join("lease-001").join(PREDICTION_FILE),
        "{ not json",
    )
    .expect("overwrite prediction");

    let config = FieldsConfig::load(&corpus.config).expect("config loads");
    let documents =
        discover_documents(&corpus.ground_truth, &corpus.predictions).expect("discovery works");
    let evaluation = evaluate_corpus(&config, &documents, None).expect("evaluation runs");

    assert_eq!(evaluation.accumulator.documents_processed, 0);
    assert_eq!(evaluation.accumulator.documents_skipped, 2);
    assert!(evaluation.skipped[0].reason.contains("invalid record json"));
}

#[test]
fn non_scalar_prediction_leaf_scores_as_miss_not_skip() {
    let corpus = corpus();
    write_json(
        &corpus.predictions.join("lease-001").join(PREDICTION_FILE),
        &json!({
            "Gen Info 1": { "static_fields": { "Tenant Name": "ACME Corp." } },
            "Rent": { "static_fields": { "Base Rent": [5000, 6000] } }
        }),
    );

    let config = FieldsConfig::load(&corpus.config).expect("config loads");
    let documents =
        discover_documents(&corpus.ground_truth, &corpus.predictions).expect("discovery works");
    let evaluation = evaluate_corpus(&config, &documents, None).expect("evaluation runs");

    assert_eq!(evaluation.accumulator.documents_processed, 1);
    assert_eq!(evaluation.accumulator.documents_skipped, 1);
    assert_eq!(evaluation.skipped[0].document_id, "lease-002");

    let summary = evaluation.accumulator.finish(&config);
    assert_eq!(summary.total_evaluations, 2);
    assert_eq!(summary.total_correct, 1);
}

#[test]
fn malformed_config_stops_before_any_output() {
    let corpus = corpus();
    fs::write(
        &corpus.config,
        "fields:\n  broken:\n    json_ref: \"STATIC::Only Sheet\"\n",
    )
    .expect("overwrite config");

    let err = run(args(&corpus)).expect_err("malformed config should abort");
    assert!(format!("{err:#}").contains("field `broken`"), "{err:#}");
    assert!(!corpus.output.exists());
}

#[test]
fn dry_run_writes_nothing() {
    let corpus = corpus();
    let mut dry = args(&corpus);
    dry.dry_run = true;
    run(dry).expect("dry run should succeed");
    assert!(!corpus.output.exists());
}

#[test]
fn empty_summary_still_writes_header() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("empty.csv");
    let summary = EvaluationSummary {
        documents_processed: 0,
        documents_skipped: 0,
        fields_evaluated: 0,
        total_evaluations: 0,
        total_correct: 0,
        overall_accuracy: 0.0,
        fields: Vec::new(),
    };
    write_report_csv(&path, &summary).expect("write should succeed");
    let raw = fs::read_to_string(&path).expect("report exists");
    assert_eq!(raw.trim(), "field_name,accuracy,correct_docs,total_docs,json_ref,matcher");
}
