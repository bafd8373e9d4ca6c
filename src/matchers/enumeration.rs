use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;
use serde_json::Value;

use super::{Comparison, parse_params};
use crate::record::Scalar;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EnumParams {
    #[serde(default, alias = "valid_values")]
    enum_values: Vec<String>,
    #[serde(default)]
    preset: Option<String>,
    #[serde(default)]
    aliases: BTreeMap<String, String>,
    #[serde(default)]
    case_sensitive: bool,
}

fn preset_values(name: &str) -> Option<&'static [&'static str]> {
    match name {
        "yes_no" => Some(&["yes", "no"]),
        "yes_no_na" => Some(&["yes", "no", "n/a"]),
        "boolean" => Some(&["true", "false"]),
        _ => None,
    }
}

/// Exact comparison after mapping both values through a canonicalization table.
#[derive(Debug, Clone)]
pub struct EnumMatcher {
    values: BTreeSet<String>,
    aliases: BTreeMap<String, String>,
    case_sensitive: bool,
}

impl EnumMatcher {
    pub fn from_params(params: &Value) -> Result<Self, String> {
        let params: EnumParams = parse_params(params)?;

        let mut raw_values = params.enum_values;
        if let Some(preset) = params.preset.as_deref() {
            let values =
                preset_values(preset).ok_or_else(|| format!("unknown preset `{preset}`"))?;
            raw_values.extend(values.iter().map(|value| value.to_string()));
        }
        if raw_values.is_empty() {
            return Err("enum_values or preset is required".to_string());
        }

        let case_sensitive = params.case_sensitive;
        let fold = |value: &str| normalize(value, case_sensitive);
        let values = raw_values.iter().map(|value| fold(value)).collect();
        let aliases = params
            .aliases
            .iter()
            .map(|(alias, canonical)| (fold(alias), fold(canonical)))
            .collect();

        Ok(Self {
            values,
            aliases,
            case_sensitive,
        })
    }

    fn canonicalize(&self, value: &Scalar) -> String {
        let normalized = normalize(&value.display_value(), self.case_sensitive);
        self.aliases.get(&normalized).cloned().unwrap_or(normalized)
    }

    pub fn compare(&self, gold: &Scalar, predicted: &Scalar) -> Comparison {
        let gold_value = self.canonicalize(gold);
        let predicted_value = self.canonicalize(predicted);

        if gold_value == predicted_value {
            return Comparison::scored(1.0, format!("'{predicted_value}'"));
        }

        if self.values.contains(&gold_value) && self.values.contains(&predicted_value) {
            Comparison::scored(
                0.0,
                format!("wrong value: expected '{gold_value}', got '{predicted_value}'"),
            )
        } else {
            let valid = self.values.iter().cloned().collect::<Vec<_>>().join(", ");
            Comparison::scored(
                0.0,
                format!("invalid value '{predicted_value}' (valid: {valid})"),
            )
        }
    }
}

fn normalize(value: &str, case_sensitive: bool) -> String {
    let trimmed = value.trim();
    if case_sensitive {
        trimmed.to_string()
    } else {
        trimmed.to_lowercase()
    }
}
