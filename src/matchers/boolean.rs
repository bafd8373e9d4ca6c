use serde::Deserialize;

use super::Comparison;
use crate::record::Scalar;

const TRUE_VALUES: &[&str] = &["yes", "true", "t", "y", "1"];
const FALSE_VALUES: &[&str] = &["no", "false", "f", "n", "0"];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BooleanMatcher {}

impl BooleanMatcher {
    pub fn compare(&self, gold: &Scalar, predicted: &Scalar) -> Comparison {
        match (to_bool(gold), to_bool(predicted)) {
            (Some(gold_value), Some(predicted_value)) if gold_value == predicted_value => {
                Comparison::scored(1.0, format!("{gold_value}"))
            }
            (Some(gold_value), Some(predicted_value)) => {
                Comparison::scored(0.0, format!("{gold_value} vs {predicted_value}"))
            }
            (gold_value, predicted_value) => Comparison::Unparseable {
                gold: gold_value.is_none(),
                predicted: predicted_value.is_none(),
            },
        }
    }
}

fn to_bool(value: &Scalar) -> Option<bool> {
    match value {
        Scalar::Bool(value) => Some(*value),
        Scalar::Null | Scalar::Date(_) => None,
        other => {
            let normalized = other.display_value().trim().to_lowercase();
            if TRUE_VALUES.contains(&normalized.as_str()) {
                Some(true)
            } else if FALSE_VALUES.contains(&normalized.as_str()) {
                Some(false)
            } else {
                None
            }
        }
    }
}
