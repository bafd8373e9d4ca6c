use serde::Serialize;

use super::*;
use crate::util::ensure_parent;

const REPORT_HEADER: [&str; 6] = [
    "field_name",
    "accuracy",
    "correct_docs",
    "total_docs",
    "json_ref",
    "matcher",
];

#[derive(Debug, Serialize)]
pub(super) struct ReportRow<'a> {
    field_name: &'a str,
    accuracy: String,
    correct_docs: usize,
    total_docs: usize,
    json_ref: &'a str,
    matcher: &'a str,
}

pub(super) fn report_rows(summary: &EvaluationSummary) -> Vec<ReportRow<'_>> {
    let mut rows = summary
        .fields
        .iter()
        .map(|field| ReportRow {
            field_name: &field.field_name,
            accuracy: format!("{:.4}", field.accuracy),
            correct_docs: field.correct,
            total_docs: field.total,
            json_ref: &field.json_ref,
            matcher: &field.matcher,
        })
        .collect::<Vec<_>>();
    rows.sort_by(|left, right| left.field_name.cmp(right.field_name));
    rows
}

/// One row per field: `field_name, accuracy, correct_docs, total_docs, json_ref, matcher`.
pub(super) fn write_report_csv(path: &Path, summary: &EvaluationSummary) -> Result<()> {
    ensure_parent(path)?;
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create report csv: {}", path.display()))?;
    let rows = report_rows(summary);
    if rows.is_empty() {
        writer
            .write_record(REPORT_HEADER)
            .with_context(|| format!("failed to write report header: {}", path.display()))?;
    }
    for row in rows {
        writer
            .serialize(&row)
            .with_context(|| format!("failed to write report row: {}", row.field_name))?;
    }
    writer
        .flush()
        .with_context(|| format!("failed to flush report csv: {}", path.display()))?;
    Ok(())
}
