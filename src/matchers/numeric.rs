use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use super::{Comparison, parse_params};
use crate::record::Scalar;

static RE_CURRENCY_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(USD|EUR|GBP|CAD|AUD|JPY|CNY|\$|€|£|¥)\s*").expect("valid currency regex")
});

const EXACT_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToleranceMode {
    /// Deviation is `|gold - predicted| / max(|gold|, 1e-9)`.
    #[default]
    Relative,
    Absolute,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NumericParams {
    tolerance: Option<f64>,
    #[serde(default)]
    mode: ToleranceMode,
    #[serde(default)]
    max_deviation: Option<f64>,
    #[serde(default)]
    percent_as_fraction: bool,
}

#[derive(Debug, Clone)]
pub struct NumericMatcher {
    pub tolerance: f64,
    pub mode: ToleranceMode,
    pub max_deviation: Option<f64>,
    pub percent_as_fraction: bool,
}

impl NumericMatcher {
    pub fn from_params(params: &Value) -> Result<Self, String> {
        let params: NumericParams = parse_params(params)?;
        let tolerance = params
            .tolerance
            .ok_or_else(|| "missing required `tolerance`".to_string())?;
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(format!("tolerance must be a non-negative number, got {tolerance}"));
        }
        if let Some(max_deviation) = params.max_deviation {
            if !max_deviation.is_finite() || max_deviation <= tolerance {
                return Err(format!(
                    "max_deviation must exceed tolerance ({tolerance}), got {max_deviation}"
                ));
            }
        }

        Ok(Self {
            tolerance,
            mode: params.mode,
            max_deviation: params.max_deviation,
            percent_as_fraction: params.percent_as_fraction,
        })
    }

    pub fn compare(&self, gold: &Scalar, predicted: &Scalar) -> Comparison {
        let gold_number = parse_number(gold, self.percent_as_fraction);
        let predicted_number = parse_number(predicted, self.percent_as_fraction);

        let (Some(gold_number), Some(predicted_number)) = (gold_number, predicted_number) else {
            return Comparison::Unparseable {
                gold: gold_number.is_none(),
                predicted: predicted_number.is_none(),
            };
        };

        let difference = (gold_number - predicted_number).abs();
        if difference < EXACT_EPSILON {
            return Comparison::scored(1.0, format!("{gold_number}"));
        }

        let deviation = match self.mode {
            ToleranceMode::Absolute => difference,
            ToleranceMode::Relative => difference / gold_number.abs().max(EXACT_EPSILON),
        };
        let score = self.score_deviation(deviation);
        Comparison::scored(
            score,
            format!("{gold_number} vs {predicted_number} (deviation {deviation:.4})"),
        )
    }

    fn score_deviation(&self, deviation: f64) -> f64 {
        if deviation <= self.tolerance {
            return 1.0;
        }
        match self.max_deviation {
            Some(max_deviation) if deviation < max_deviation => {
                1.0 - (deviation - self.tolerance) / (max_deviation - self.tolerance)
            }
            _ => 0.0,
        }
    }
}

/// Parses plain numbers and currency-formatted text such as `$1.2M`, `USD 50,000`, or `12.5%`.
pub fn parse_number(value: &Scalar, percent_as_fraction: bool) -> Option<f64> {
    let text = match value {
        Scalar::Number(number) => return number.is_finite().then_some(*number),
        Scalar::Text(text) => text.trim().to_uppercase(),
        Scalar::Null | Scalar::Bool(_) | Scalar::Date(_) => return None,
    };

    let (negative, text) = match text.strip_prefix('(').and_then(|inner| inner.strip_suffix(')')) {
        Some(inner) => (true, inner.trim().to_string()),
        None => (false, text),
    };

    let mut text = RE_CURRENCY_PREFIX.replace(&text, "").trim().to_string();
    let mut multiplier = 1.0_f64;

    if let Some(stripped) = text.strip_suffix('%') {
        if percent_as_fraction {
            multiplier = 0.01;
        }
        text = stripped.trim_end().to_string();
    } else if let Some((stripped, factor)) = strip_magnitude_suffix(&text) {
        multiplier = factor;
        text = stripped;
    }

    let cleaned = text.replace([',', ' '], "");
    let number = cleaned.parse::<f64>().ok()?;
    if !number.is_finite() {
        return None;
    }
    let signed = if negative { -number } else { number };
    Some(signed * multiplier)
}

fn strip_magnitude_suffix(text: &str) -> Option<(String, f64)> {
    [('K', 1e3), ('M', 1e6), ('B', 1e9), ('T', 1e12)]
        .iter()
        .find_map(|(suffix, factor)| {
            text.strip_suffix(*suffix)
                .map(|rest| (rest.trim_end().to_string(), *factor))
        })
}
