use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use strsim::normalized_levenshtein;

use super::{Comparison, parse_params};
use crate::record::Scalar;

const EMBEDDED_SCORE: f64 = 0.8;
const ZIP_WEIGHT: f64 = 0.3;
const STATE_WEIGHT: f64 = 0.2;
const SIMILARITY_WEIGHT: f64 = 0.5;

static ABBREVIATIONS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"\bst\b", "street"),
        (r"\bave\b", "avenue"),
        (r"\brd\b", "road"),
        (r"\bdr\b", "drive"),
        (r"\bblvd\b", "boulevard"),
        (r"\bln\b", "lane"),
        (r"\bpk(wy)?\b", "parkway"),
        (r"\bct\b", "court"),
        (r"\bterr\b", "terrace"),
    ]
    .into_iter()
    .map(|(pattern, replacement)| {
        (
            Regex::new(pattern).expect("valid abbreviation regex"),
            replacement,
        )
    })
    .collect()
});
static RE_PUNCTUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[.,#'"()\-]"#).expect("valid punctuation regex"));
static RE_CARE_OF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bc/o\b[^,]*(?:,|$)").expect("valid c/o regex"));
static RE_ATTENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)attn:.*").expect("valid attn regex"));
static RE_COMPANY_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(llc|inc|company|corp|corporation|ltd|limited)\b\.?")
        .expect("valid company suffix regex")
});
static RE_ZIP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{5}\b").expect("valid zip regex"));
static RE_STATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Z]{2})\b").expect("valid state regex"));

/// Postal address comparison: abbreviation-aware normalization plus zip/state components.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddressMatcher {
    /// Component scores below this are reported as 0.0.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

fn default_threshold() -> f64 {
    0.6
}

impl AddressMatcher {
    pub fn from_params(params: &Value) -> Result<Self, String> {
        let matcher: Self = parse_params(params)?;
        if !(0.0..=1.0).contains(&matcher.threshold) {
            return Err(format!(
                "threshold must be within [0, 1], got {}",
                matcher.threshold
            ));
        }
        Ok(matcher)
    }

    pub fn compare(&self, gold: &Scalar, predicted: &Scalar) -> Comparison {
        let gold_raw = gold.display_value();
        let predicted_raw = predicted.display_value();
        let gold_norm = normalize_address(&gold_raw);
        let predicted_norm = normalize_address(&predicted_raw);

        if gold_norm == predicted_norm {
            return Comparison::scored(1.0, "exact address");
        }

        let predicted_core = normalize_address(&strip_company_info(&predicted_raw));
        if !gold_norm.is_empty()
            && (predicted_core.contains(&gold_norm) || predicted_norm.contains(&gold_norm))
        {
            return Comparison::scored(EMBEDDED_SCORE, "ground truth embedded in prediction");
        }

        let mut score = 0.0;
        if let (Some(gold_zip), Some(predicted_zip)) =
            (RE_ZIP.find(&gold_raw), RE_ZIP.find(&predicted_raw))
        {
            if gold_zip.as_str() == predicted_zip.as_str() {
                score += ZIP_WEIGHT;
            }
        }
        if let (Some(gold_state), Some(predicted_state)) =
            (RE_STATE.find(&gold_raw), RE_STATE.find(&predicted_raw))
        {
            if gold_state.as_str() == predicted_state.as_str() {
                score += STATE_WEIGHT;
            }
        }
        score += SIMILARITY_WEIGHT * normalized_levenshtein(&gold_norm, &predicted_norm);

        let detail = format!("{score:.2} component score | '{gold_raw}' vs '{predicted_raw}'");
        if score >= self.threshold {
            Comparison::scored(score, detail)
        } else {
            Comparison::scored(0.0, format!("{detail} (below threshold)"))
        }
    }
}

fn normalize_address(address: &str) -> String {
    let mut normalized = address.trim().to_lowercase();
    for (pattern, replacement) in ABBREVIATIONS.iter() {
        normalized = pattern.replace_all(&normalized, *replacement).into_owned();
    }
    let stripped = RE_PUNCTUATION.replace_all(&normalized, " ");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn strip_company_info(address: &str) -> String {
    let without_care_of = RE_CARE_OF.replace_all(address, " ");
    let without_attention = RE_ATTENTION.replace_all(&without_care_of, "");
    let without_suffix = RE_COMPANY_SUFFIX.replace_all(&without_attention, "");
    without_suffix.split_whitespace().collect::<Vec<_>>().join(" ")
}
