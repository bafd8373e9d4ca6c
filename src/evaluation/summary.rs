use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::Serialize;

use super::ranking::rank_fields;
use crate::matchers::Classification;

const RULE_WIDTH: usize = 80;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldStatistic {
    pub field_name: String,
    pub json_ref: String,
    pub matcher: String,
    pub correct: usize,
    pub total: usize,
    pub accuracy: f64,
    pub mean_score: f64,
    pub tags: BTreeMap<Classification, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationSummary {
    pub documents_processed: usize,
    pub documents_skipped: usize,
    pub fields_evaluated: usize,
    pub total_evaluations: usize,
    pub total_correct: usize,
    pub overall_accuracy: f64,
    pub fields: Vec<FieldStatistic>,
}

/// Human-readable report: overall statistics followed by the best and worst `top_n` fields.
pub fn render_summary(summary: &EvaluationSummary, generated_at: &str, top_n: usize) -> String {
    let heavy = "=".repeat(RULE_WIDTH);
    let light = "-".repeat(RULE_WIDTH);
    let ranking = rank_fields(&summary.fields, top_n);
    let mut out = String::new();

    let _ = writeln!(out, "{heavy}");
    let _ = writeln!(out, "FIELD EXTRACTION EVALUATION SUMMARY");
    let _ = writeln!(out, "{heavy}");
    let _ = writeln!(out, "Generated: {generated_at}");
    let _ = writeln!(out);

    let _ = writeln!(out, "OVERALL STATISTICS");
    let _ = writeln!(out, "{light}");
    let _ = writeln!(out, "Total documents processed:  {}", summary.documents_processed);
    let _ = writeln!(out, "Documents skipped:          {}", summary.documents_skipped);
    let _ = writeln!(out, "Total fields evaluated:     {}", summary.fields_evaluated);
    let _ = writeln!(out, "Total field evaluations:    {}", summary.total_evaluations);
    let _ = writeln!(out, "Total correct:              {}", summary.total_correct);
    let _ = writeln!(
        out,
        "Overall accuracy:           {:.4} ({:.2}%)",
        summary.overall_accuracy,
        summary.overall_accuracy * 100.0
    );
    let _ = writeln!(out);

    for (title, fields) in [
        (format!("TOP {top_n} BEST PERFORMING FIELDS"), &ranking.best),
        (format!("BOTTOM {top_n} WORST PERFORMING FIELDS"), &ranking.worst),
    ] {
        let _ = writeln!(out, "{title}");
        let _ = writeln!(out, "{light}");
        let _ = writeln!(out, "{:<40} {:>10} {:>15}", "Field", "Accuracy", "Correct/Total");
        let _ = writeln!(out, "{light}");
        for field in fields {
            let ratio = format!("{}/{}", field.correct, field.total);
            let _ = writeln!(
                out,
                "{:<40} {:>10.4} {:>15}",
                field.field_name, field.accuracy, ratio
            );
        }
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "{heavy}");
    out
}
