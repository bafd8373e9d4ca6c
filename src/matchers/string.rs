use serde::Deserialize;
use serde_json::Value;
use strsim::normalized_levenshtein;

use super::{Comparison, parse_params};
use crate::record::Scalar;

/// Fuzzy text similarity; the raw similarity is the score.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StringMatcher {
    /// Similarity at which the outcome is tagged a match.
    #[serde(default)]
    pub threshold: Option<f64>,
}

impl StringMatcher {
    pub fn from_params(params: &Value) -> Result<Self, String> {
        let matcher: Self = parse_params(params)?;
        if let Some(threshold) = matcher.threshold {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(format!("threshold must be within [0, 1], got {threshold}"));
            }
        }
        Ok(matcher)
    }

    pub fn compare(&self, gold: &Scalar, predicted: &Scalar) -> Comparison {
        let gold_text = gold.display_value();
        let predicted_text = predicted.display_value();
        let similarity = similarity(&gold_text, &predicted_text);

        if similarity >= 1.0 {
            Comparison::scored(1.0, format!("'{gold_text}'"))
        } else {
            Comparison::scored(
                similarity,
                format!("{similarity:.2} similarity | '{gold_text}' vs '{predicted_text}'"),
            )
        }
    }
}

/// Lower-cased, punctuation replaced by spaces, whitespace collapsed.
pub(crate) fn normalize_text(value: &str) -> String {
    let replaced = value
        .to_lowercase()
        .chars()
        .map(|ch| if ch.is_alphanumeric() { ch } else { ' ' })
        .collect::<String>();
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn token_set(value: &str) -> String {
    let mut tokens = value.split(' ').collect::<Vec<_>>();
    tokens.sort_unstable();
    tokens.dedup();
    tokens.join(" ")
}

/// Best of edit-distance ratio on the normalized text and on its sorted token set.
pub(crate) fn similarity(gold: &str, predicted: &str) -> f64 {
    let gold = normalize_text(gold);
    let predicted = normalize_text(predicted);
    if gold == predicted {
        return 1.0;
    }

    let direct = normalized_levenshtein(&gold, &predicted);
    let tokens = normalized_levenshtein(&token_set(&gold), &token_set(&predicted));
    direct.max(tokens)
}
