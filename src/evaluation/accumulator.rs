use std::collections::BTreeMap;

use super::summary::{EvaluationSummary, FieldStatistic};
use super::EvaluationOutcome;
use crate::config::FieldsConfig;
use crate::matchers::{CORRECT_THRESHOLD, Classification};

/// Running tallies for one field; merging two tallies is order-free.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldAccumulator {
    pub correct: usize,
    pub total: usize,
    pub score_sum: f64,
    pub tags: BTreeMap<Classification, usize>,
}

impl FieldAccumulator {
    pub fn add(&mut self, score: f64, tag: Classification) {
        self.total += 1;
        if score >= CORRECT_THRESHOLD {
            self.correct += 1;
        }
        self.score_sum += score;
        *self.tags.entry(tag).or_default() += 1;
    }

    pub fn merge(&mut self, other: &FieldAccumulator) {
        self.correct += other.correct;
        self.total += other.total;
        self.score_sum += other.score_sum;
        for (tag, count) in &other.tags {
            *self.tags.entry(*tag).or_default() += count;
        }
    }

    /// Zero when nothing was evaluated.
    pub fn accuracy(&self) -> f64 {
        ratio(self.correct, self.total)
    }

    pub fn mean_score(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.score_sum / self.total as f64
        }
    }
}

fn ratio(correct: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        correct as f64 / total as f64
    }
}

/// Partial evaluation state; one per worker, combined with [`EvaluationAccumulator::merge`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluationAccumulator {
    pub documents_processed: usize,
    pub documents_skipped: usize,
    pub fields: BTreeMap<String, FieldAccumulator>,
}

impl EvaluationAccumulator {
    pub fn record_document(&mut self, outcomes: &[EvaluationOutcome]) {
        self.documents_processed += 1;
        for outcome in outcomes {
            self.fields
                .entry(outcome.field_name.clone())
                .or_default()
                .add(outcome.score, outcome.tag);
        }
    }

    pub fn record_skipped(&mut self) {
        self.documents_skipped += 1;
    }

    pub fn merge(mut self, other: EvaluationAccumulator) -> Self {
        self.documents_processed += other.documents_processed;
        self.documents_skipped += other.documents_skipped;
        for (name, field) in &other.fields {
            self.fields.entry(name.clone()).or_default().merge(field);
        }
        self
    }

    /// Freezes the tallies into per-field statistics.
    ///
    /// Fields with no evaluation at all (every document skipped) are omitted; field metadata
    /// comes from `config`.
    pub fn finish(self, config: &FieldsConfig) -> EvaluationSummary {
        let fields = config
            .fields
            .iter()
            .filter_map(|field| {
                let tally = self.fields.get(&field.name)?;
                Some(FieldStatistic {
                    field_name: field.name.clone(),
                    json_ref: field.json_ref.to_string(),
                    matcher: field.matcher_name().to_string(),
                    correct: tally.correct,
                    total: tally.total,
                    accuracy: tally.accuracy(),
                    mean_score: tally.mean_score(),
                    tags: Classification::ALL
                        .iter()
                        .map(|tag| (*tag, tally.tags.get(tag).copied().unwrap_or(0)))
                        .collect(),
                })
            })
            .collect::<Vec<_>>();

        let total_evaluations = fields.iter().map(|field| field.total).sum::<usize>();
        let total_correct = fields.iter().map(|field| field.correct).sum::<usize>();

        EvaluationSummary {
            documents_processed: self.documents_processed,
            documents_skipped: self.documents_skipped,
            fields_evaluated: fields.len(),
            total_evaluations,
            total_correct,
            overall_accuracy: ratio(total_correct, total_evaluations),
            fields,
        }
    }
}
