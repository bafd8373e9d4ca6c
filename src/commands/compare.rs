use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::{info, warn};

use crate::cli::CompareArgs;
use crate::commands::corpus::{DocumentPaths, discover_documents, load_record};
use crate::config::FieldsConfig;
use crate::evaluation::evaluate_field;
use crate::record::Record;
use crate::util::{ensure_directory, sanitize_file_stem};

#[derive(Debug, Serialize)]
struct ComparisonRow<'a> {
    field_name: &'a str,
    #[serde(rename = "type")]
    field_type: &'a str,
    matcher: &'a str,
    json_ref: String,
    ground_truth: String,
    prediction: String,
    score: String,
    tag: &'a str,
    detail: String,
}

pub fn run(args: CompareArgs) -> Result<()> {
    let config = FieldsConfig::load(&args.config)?;
    if !args.predictions.is_dir() {
        bail!(
            "predictions directory does not exist: {}",
            args.predictions.display()
        );
    }

    let wanted = args.documents.iter().cloned().collect::<BTreeSet<_>>();
    let documents = discover_documents(&args.ground_truth, &args.predictions)?
        .into_iter()
        .filter(|document| wanted.is_empty() || wanted.contains(&document.document_id))
        .collect::<Vec<_>>();
    for missing in wanted
        .iter()
        .filter(|id| !documents.iter().any(|document| &document.document_id == *id))
    {
        warn!(document = %missing, "requested document not found under ground truth");
    }

    ensure_directory(&args.output)?;
    info!(
        output = %args.output.display(),
        documents = documents.len(),
        fields = config.len(),
        "starting comparison"
    );

    let mut written = 0_usize;
    let mut skipped = 0_usize;
    for document in &documents {
        match compare_document(&config, document, &args.output) {
            Ok(Some(path)) => {
                written += 1;
                info!(document = %document.document_id, path = %path.display(), "wrote comparison");
            }
            Ok(None) => {
                skipped += 1;
                warn!(
                    document = %document.document_id,
                    reason = document.skip_reason().unwrap_or_default(),
                    "skipping document"
                );
            }
            Err(err) => {
                skipped += 1;
                warn!(document = %document.document_id, error = %format!("{err:#}"), "skipping document");
            }
        }
    }

    info!(written, skipped, "comparison completed");
    Ok(())
}

/// Writes `<output>/<document>.csv`; `None` when the document lacks one side.
fn compare_document(
    config: &FieldsConfig,
    document: &DocumentPaths,
    output: &Path,
) -> Result<Option<PathBuf>> {
    let (Some(gold_path), Some(predicted_path)) = (&document.ground_truth, &document.prediction)
    else {
        return Ok(None);
    };
    let gold = load_record(gold_path)?;
    let predicted = load_record(predicted_path)?;

    let path = output.join(format!("{}.csv", sanitize_file_stem(&document.document_id)));
    write_comparison(&path, config, &document.document_id, &gold, &predicted)?;
    Ok(Some(path))
}

fn write_comparison(
    path: &Path,
    config: &FieldsConfig,
    document_id: &str,
    gold: &Record,
    predicted: &Record,
) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create comparison csv: {}", path.display()))?;

    for field in &config.fields {
        let outcome = evaluate_field(field, document_id, gold, predicted);
        let row = ComparisonRow {
            field_name: &field.name,
            field_type: field.field_type.as_str(),
            matcher: field.matcher_name(),
            json_ref: field.json_ref.to_string(),
            ground_truth: outcome.ground_truth,
            prediction: outcome.prediction,
            score: format!("{:.4}", outcome.score),
            tag: outcome.tag.as_str(),
            detail: outcome.detail,
        };
        writer
            .serialize(&row)
            .with_context(|| format!("failed to write comparison row: {}", field.name))?;
    }

    writer
        .flush()
        .with_context(|| format!("failed to flush comparison csv: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serde_json::json;

    use super::run;
    use crate::cli::CompareArgs;
    use crate::commands::corpus::PREDICTION_FILE;

    #[test]
    fn compare_writes_one_csv_per_paired_document() {
        let root = tempfile::tempdir().expect("tempdir");
        let gt = root.path().join("gt");
        let pred = root.path().join("pred");
        let output = root.path().join("out");
        let config = root.path().join("fields.json");

        fs::write(
            &config,
            json!({
                "fields": {
                    "units": {
                        "type": "string",
                        "matcher": "ExactMatcher",
                        "json_ref": "TABLE::Gen Info 1::Premises::Unit"
                    },
                    "tenant": {
                        "type": "string",
                        "matcher": "StringMatcher",
                        "json_ref": "STATIC::Gen Info 1::Tenant"
                    }
                }
            })
            .to_string(),
        )
        .expect("write config");

        fs::create_dir_all(gt.join("Lease: A")).expect("create gt");
        fs::write(
            gt.join("Lease: A").join("abstract.json"),
            json!({
                "Gen Info 1": {
                    "static_fields": { "Tenant": "Acme Corp" },
                    "tables": { "Premises": [{ "Unit": "400" }, { "Unit": "500" }] }
                }
            })
            .to_string(),
        )
        .expect("write gt");
        fs::create_dir_all(pred.join("Lease: A")).expect("create pred");
        fs::write(
            pred.join("Lease: A").join(PREDICTION_FILE),
            json!({
                "Gen Info 1": {
                    "static_fields": { "Tenant": null },
                    "tables": { "Premises": [{ "Unit": "500" }, { "Unit": "400" }] }
                }
            })
            .to_string(),
        )
        .expect("write pred");
        fs::create_dir_all(gt.join("lease-b")).expect("create unpaired gt");

        run(CompareArgs {
            ground_truth: gt,
            predictions: pred,
            config,
            output: output.clone(),
            documents: Vec::new(),
        })
        .expect("compare should succeed");

        let written = output.join("Lease_ A.csv");
        let mut reader = csv::Reader::from_path(&written).expect("comparison csv exists");
        let rows = reader
            .records()
            .collect::<Result<Vec<_>, _>>()
            .expect("rows parse");
        assert_eq!(rows.len(), 2);

        assert_eq!(&rows[0][0], "tenant");
        assert_eq!(&rows[0][4], "Acme Corp");
        assert_eq!(&rows[0][5], "");
        assert_eq!(&rows[0][7], "missing");

        assert_eq!(&rows[1][0], "units");
        assert_eq!(&rows[1][4], r#"["400","500"]"#);
        assert_eq!(&rows[1][6], "1.0000");
        assert_eq!(&rows[1][7], "match");

        assert!(!output.join("lease-b.csv").exists());
    }
}
