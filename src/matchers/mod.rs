//! Field matchers: one closed set of scorers behind a single entry point.
//!
//! Every scorer goes through the same absence policy before its own comparison runs, and a
//! value that the scorer cannot interpret (a date in no accepted format, a number that does not
//! parse) is downgraded to absence and sent back through that policy.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::alignment::{self, AlignmentOptions};
use crate::json_ref::FieldValue;
use crate::record::{Row, Scalar};

mod address;
mod boolean;
mod date;
mod enumeration;
mod exact;
mod numeric;
mod phone;
mod string;
mod table;

pub use address::AddressMatcher;
pub use boolean::BooleanMatcher;
pub use date::DateMatcher;
pub use enumeration::EnumMatcher;
pub use exact::ExactMatcher;
pub use numeric::NumericMatcher;
pub use phone::PhoneMatcher;
pub use string::StringMatcher;
pub use table::TableMatcher;

/// Score at or above which an outcome counts as correct.
pub const CORRECT_THRESHOLD: f64 = 0.95;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Match,
    Mismatch,
    BothAbsent,
    Hallucination,
    Missing,
}

impl Classification {
    pub const ALL: [Classification; 5] = [
        Self::Match,
        Self::Mismatch,
        Self::BothAbsent,
        Self::Hallucination,
        Self::Missing,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Match => "match",
            Self::Mismatch => "mismatch",
            Self::BothAbsent => "both_absent",
            Self::Hallucination => "hallucination",
            Self::Missing => "missing",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scored {
    pub score: f64,
    pub tag: Classification,
    pub detail: String,
}

impl Scored {
    fn new(score: f64, tag: Classification, detail: impl Into<String>) -> Self {
        Self {
            score,
            tag,
            detail: detail.into(),
        }
    }

    fn graded(score: f64, threshold: f64, detail: String) -> Self {
        let score = score.clamp(0.0, 1.0);
        let tag = if score >= threshold {
            Classification::Match
        } else {
            Classification::Mismatch
        };
        Self::new(score, tag, detail)
    }

    #[cfg(test)]
    pub fn is_correct(&self) -> bool {
        self.score >= CORRECT_THRESHOLD
    }
}

/// Outcome of a type-specific comparison of two present values.
#[derive(Debug, Clone, PartialEq)]
pub enum Comparison {
    Scored { score: f64, detail: String },
    Unparseable { gold: bool, predicted: bool },
}

impl Comparison {
    fn scored(score: f64, detail: impl Into<String>) -> Self {
        Self::Scored {
            score,
            detail: detail.into(),
        }
    }
}

/// Policy for null ground truth or prediction; `None` when both values are present.
pub fn absence_outcome(gold_absent: bool, predicted_absent: bool) -> Option<Scored> {
    match (gold_absent, predicted_absent) {
        (true, true) => Some(Scored::new(
            1.0,
            Classification::BothAbsent,
            "both absent",
        )),
        (true, false) => Some(Scored::new(
            0.0,
            Classification::Hallucination,
            "hallucination: ground truth is absent",
        )),
        (false, true) => Some(Scored::new(
            0.0,
            Classification::Missing,
            "missing: prediction is absent",
        )),
        (false, false) => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatcherKind {
    Exact,
    String,
    Date,
    Enum,
    Numeric,
    Table,
    Boolean,
    Phone,
    Address,
}

impl MatcherKind {
    /// Accepts canonical names and the aliases used by older configurations.
    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name.trim() {
            "ExactMatcher" => Self::Exact,
            "StringMatcher" => Self::String,
            "DateMatcher" => Self::Date,
            "EnumMatcher" => Self::Enum,
            "NumericMatcher" | "NumberMatcher" | "FloatMatcher" => Self::Numeric,
            "TableMatcher" | "JSONMatcher" => Self::Table,
            "BooleanMatcher" => Self::Boolean,
            "PhoneMatcher" => Self::Phone,
            "AddressMatcher" => Self::Address,
            _ => return None,
        };
        Some(kind)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Exact => "ExactMatcher",
            Self::String => "StringMatcher",
            Self::Date => "DateMatcher",
            Self::Enum => "EnumMatcher",
            Self::Numeric => "NumericMatcher",
            Self::Table => "TableMatcher",
            Self::Boolean => "BooleanMatcher",
            Self::Phone => "PhoneMatcher",
            Self::Address => "AddressMatcher",
        }
    }
}

impl fmt::Display for MatcherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone)]
pub enum Matcher {
    Exact(ExactMatcher),
    String(StringMatcher),
    Date(DateMatcher),
    Enum(EnumMatcher),
    Numeric(NumericMatcher),
    Table(TableMatcher),
    Boolean(BooleanMatcher),
    Phone(PhoneMatcher),
    Address(AddressMatcher),
}

/// Deserializes matcher params, treating a missing params block as an empty one.
pub(crate) fn parse_params<T: for<'de> Deserialize<'de>>(params: &Value) -> Result<T, String> {
    let params = match params {
        Value::Null => Value::Object(Default::default()),
        other => other.clone(),
    };
    serde_json::from_value(params).map_err(|err| err.to_string())
}

impl Matcher {
    /// Builds a matcher from its kind and untyped params; the error is a human-readable reason.
    pub fn build(kind: MatcherKind, params: &Value) -> Result<Self, String> {
        let matcher = match kind {
            MatcherKind::Exact => Self::Exact(parse_params(params)?),
            MatcherKind::String => Self::String(StringMatcher::from_params(params)?),
            MatcherKind::Date => Self::Date(parse_params(params)?),
            MatcherKind::Enum => Self::Enum(EnumMatcher::from_params(params)?),
            MatcherKind::Numeric => Self::Numeric(NumericMatcher::from_params(params)?),
            MatcherKind::Table => Self::Table(TableMatcher::from_params(params)?),
            MatcherKind::Boolean => Self::Boolean(parse_params(params)?),
            MatcherKind::Phone => Self::Phone(parse_params(params)?),
            MatcherKind::Address => Self::Address(AddressMatcher::from_params(params)?),
        };
        Ok(matcher)
    }

    pub fn kind(&self) -> MatcherKind {
        match self {
            Self::Exact(_) => MatcherKind::Exact,
            Self::String(_) => MatcherKind::String,
            Self::Date(_) => MatcherKind::Date,
            Self::Enum(_) => MatcherKind::Enum,
            Self::Numeric(_) => MatcherKind::Numeric,
            Self::Table(_) => MatcherKind::Table,
            Self::Boolean(_) => MatcherKind::Boolean,
            Self::Phone(_) => MatcherKind::Phone,
            Self::Address(_) => MatcherKind::Address,
        }
    }

    fn tag_threshold(&self) -> f64 {
        match self {
            Self::String(matcher) => matcher.threshold.unwrap_or(CORRECT_THRESHOLD),
            _ => CORRECT_THRESHOLD,
        }
    }

    fn compare(&self, gold: &Scalar, predicted: &Scalar) -> Comparison {
        match self {
            Self::Exact(matcher) => matcher.compare(gold, predicted),
            Self::String(matcher) => matcher.compare(gold, predicted),
            Self::Date(matcher) => matcher.compare(gold, predicted),
            Self::Enum(matcher) => matcher.compare(gold, predicted),
            Self::Numeric(matcher) => matcher.compare(gold, predicted),
            Self::Boolean(matcher) => matcher.compare(gold, predicted),
            Self::Phone(matcher) => matcher.compare(gold, predicted),
            Self::Address(matcher) => matcher.compare(gold, predicted),
            Self::Table(_) => ExactMatcher::default().compare(gold, predicted),
        }
    }

    /// Scores two leaf values: absence policy, then the type-specific comparison.
    pub fn score_scalars(&self, gold: &Scalar, predicted: &Scalar) -> Scored {
        if let Some(outcome) = absence_outcome(gold.is_absent(), predicted.is_absent()) {
            return outcome;
        }

        match self.compare(gold, predicted) {
            Comparison::Scored { score, detail } => {
                Scored::graded(score, self.tag_threshold(), detail)
            }
            Comparison::Unparseable {
                gold: gold_unparseable,
                predicted: predicted_unparseable,
            } => {
                let mut outcome = absence_outcome(gold_unparseable, predicted_unparseable)
                    .unwrap_or_else(|| Scored::new(0.0, Classification::Mismatch, ""));
                outcome.detail = format!(
                    "{} (unparseable {}: '{}' vs '{}')",
                    outcome.detail,
                    self.kind(),
                    gold.display_value(),
                    predicted.display_value()
                );
                outcome
            }
        }
    }

    /// Scores a resolved ground-truth value against a resolved prediction.
    pub fn score(&self, gold: &FieldValue<'_>, predicted: &FieldValue<'_>) -> Scored {
        if let Some(outcome) = absence_outcome(gold.is_absent(), predicted.is_absent()) {
            return outcome;
        }

        match (self, gold, predicted) {
            (Self::Table(matcher), FieldValue::Rows(gold_rows), FieldValue::Rows(pred_rows)) => {
                let table = matcher.score_rows(gold_rows, pred_rows);
                Scored::graded(table.score, CORRECT_THRESHOLD, table.detail)
            }
            (Self::Table(_), _, _) => Scored::new(
                0.0,
                Classification::Mismatch,
                "table matcher needs row sets on both sides",
            ),
            (_, FieldValue::Rows(_), _) | (_, _, FieldValue::Rows(_)) => Scored::new(
                0.0,
                Classification::Mismatch,
                format!("{} cannot score a row set", self.kind()),
            ),
            (_, FieldValue::Scalar(gold), FieldValue::Scalar(predicted)) => {
                self.score_scalars(gold, predicted)
            }
            (_, gold, predicted) => self.score_lists(&as_list(gold), &as_list(predicted)),
        }
    }

    /// Scores two value lists by aligning them element-wise with this matcher.
    fn score_lists(&self, gold: &[&Scalar], predicted: &[&Scalar]) -> Scored {
        let options = AlignmentOptions::default();
        let aligned = alignment::align(
            gold.len(),
            predicted.len(),
            |g, p| self.score_scalars(gold[g], predicted[p]).score,
            &options,
        );

        match aligned {
            Ok(aligned) => {
                let detail = format!(
                    "values: {} expected, {} extracted, {} matched",
                    gold.len(),
                    predicted.len(),
                    aligned.pairs.len()
                );
                Scored::graded(aligned.score(), self.tag_threshold(), detail)
            }
            Err(overflow) => {
                tracing::warn!(error = %overflow, "value list alignment skipped");
                Scored::new(0.0, Classification::Mismatch, overflow.to_string())
            }
        }
    }
}

fn as_list<'a>(value: &FieldValue<'a>) -> Vec<&'a Scalar> {
    match value {
        FieldValue::Scalar(value) => vec![*value],
        FieldValue::Column(values) => values.clone(),
        FieldValue::Absent | FieldValue::Rows(_) => Vec::new(),
    }
}

/// Average cell score between two rows, one matcher per column.
pub(crate) fn row_similarity<'m>(
    gold: &Row,
    predicted: &Row,
    matcher_for: impl Fn(&str) -> &'m Matcher,
) -> f64 {
    let mut columns = gold.keys().chain(predicted.keys()).collect::<Vec<_>>();
    columns.sort();
    columns.dedup();

    if columns.is_empty() {
        return 1.0;
    }

    let total = columns
        .iter()
        .map(|column| {
            let gold_value = gold.get(*column).unwrap_or(&Scalar::Null);
            let predicted_value = predicted.get(*column).unwrap_or(&Scalar::Null);
            matcher_for(column)
                .score_scalars(gold_value, predicted_value)
                .score
        })
        .sum::<f64>();
    total / columns.len() as f64
}
