//! Per-document scoring and cross-document aggregation.

use serde::Serialize;
use tracing::debug;

use crate::config::{FieldConfig, FieldsConfig};
use crate::json_ref::FieldValue;
use crate::matchers::{CORRECT_THRESHOLD, Classification, MatcherKind, Scored};
use crate::record::Record;

mod accumulator;
mod ranking;
mod summary;

pub use accumulator::EvaluationAccumulator;
pub use ranking::DEFAULT_TOP_N;
pub use summary::{EvaluationSummary, render_summary};

/// Score of one field on one document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationOutcome {
    pub field_name: String,
    pub document_id: String,
    pub score: f64,
    pub tag: Classification,
    pub detail: String,
    pub ground_truth: String,
    pub prediction: String,
}

impl EvaluationOutcome {
    pub fn is_correct(&self) -> bool {
        self.score >= CORRECT_THRESHOLD
    }
}

fn resolve<'a>(field: &FieldConfig, record: &'a Record) -> FieldValue<'a> {
    if field.matcher.kind() == MatcherKind::Table {
        field.json_ref.resolve_rows(record)
    } else {
        field.json_ref.resolve(record)
    }
}

pub fn evaluate_field(
    field: &FieldConfig,
    document_id: &str,
    ground_truth: &Record,
    prediction: &Record,
) -> EvaluationOutcome {
    let gold = resolve(field, ground_truth);
    let predicted = resolve(field, prediction);
    let Scored { score, tag, detail } = field.matcher.score(&gold, &predicted);

    debug!(
        document = document_id,
        field = %field.name,
        score,
        tag = %tag,
        "scored field"
    );

    EvaluationOutcome {
        field_name: field.name.clone(),
        document_id: document_id.to_string(),
        score,
        tag,
        detail,
        ground_truth: gold.render(),
        prediction: predicted.render(),
    }
}

/// Scores every configured field of one document, in configuration order.
pub fn evaluate_document(
    config: &FieldsConfig,
    document_id: &str,
    ground_truth: &Record,
    prediction: &Record,
) -> Vec<EvaluationOutcome> {
    config
        .fields
        .iter()
        .map(|field| evaluate_field(field, document_id, ground_truth, prediction))
        .collect()
}
