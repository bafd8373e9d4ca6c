use serde::Deserialize;

use super::Comparison;
use crate::record::Scalar;

/// Equality after trimming and case folding.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExactMatcher {}

impl ExactMatcher {
    pub fn compare(&self, gold: &Scalar, predicted: &Scalar) -> Comparison {
        let gold_folded = fold(gold);
        let predicted_folded = fold(predicted);

        if gold_folded == predicted_folded {
            Comparison::scored(1.0, format!("exact '{}'", gold.display_value()))
        } else {
            Comparison::scored(
                0.0,
                format!(
                    "'{}' vs '{}'",
                    gold.display_value(),
                    predicted.display_value()
                ),
            )
        }
    }
}

fn fold(value: &Scalar) -> String {
    value.display_value().trim().to_lowercase()
}
