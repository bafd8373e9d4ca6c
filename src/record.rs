use std::collections::BTreeMap;
use std::fmt;

use anyhow::{Result, bail};
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

/// Text values that carry no information and are scored as absence.
pub const NULL_TOKENS: &[&str] = &[
    "",
    "null",
    "none",
    "na",
    "n/a",
    "unknown",
    "missing",
    "tbd",
    "tba",
    "unk",
    "pending",
    "to be determined",
];

/// A leaf value inside a record.
///
/// Deserialization goes by shape: JSON `null` is [`Scalar::Null`], ISO `YYYY-MM-DD` strings become
/// [`Scalar::Date`], other strings stay [`Scalar::Text`]. Arrays and objects are not leaves; they
/// read as [`Scalar::Null`] so the rest of the document still loads.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(untagged)]
pub enum Scalar {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Date(NaiveDate),
    Text(String),
}

impl<'de> Deserialize<'de> for Scalar {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Null => Self::Null,
            Value::Bool(value) => Self::Bool(value),
            Value::Number(number) => number.as_f64().map_or(Self::Null, Self::Number),
            Value::String(text) => match text.parse::<NaiveDate>() {
                Ok(date) => Self::Date(date),
                Err(_) => Self::Text(text),
            },
            other => {
                let shape = if other.is_array() { "array" } else { "object" };
                warn!(shape, "non-scalar leaf value read as null");
                Self::Null
            }
        })
    }
}

impl Scalar {
    #[cfg(test)]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// True for null and for null-like text tokens.
    pub fn is_absent(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(value) => {
                let normalized = value.trim().to_lowercase();
                NULL_TOKENS.contains(&normalized.as_str())
            }
            _ => false,
        }
    }

    /// Canonical string rendering used by text-based matchers.
    pub fn display_value(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(value) => value.to_string(),
            Self::Number(value) => format_number(*value),
            Self::Date(value) => value.format("%Y-%m-%d").to_string(),
            Self::Text(value) => value.clone(),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            other => f.write_str(&other.display_value()),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

pub type Row = BTreeMap<String, Scalar>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SheetBlock {
    #[serde(default)]
    pub static_fields: BTreeMap<String, Scalar>,
    #[serde(default)]
    pub tables: BTreeMap<String, Vec<Row>>,
}

impl SheetBlock {
    fn colliding_keys(&self) -> Vec<&str> {
        self.tables
            .keys()
            .filter(|key| self.static_fields.contains_key(*key))
            .map(String::as_str)
            .collect()
    }
}

/// One document: sheet name to its static fields and tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    pub sheets: BTreeMap<String, SheetBlock>,
}

impl Record {
    pub fn sheet(&self, name: &str) -> Option<&SheetBlock> {
        self.sheets.get(name)
    }

    pub fn static_value(&self, sheet: &str, key: &str) -> Option<&Scalar> {
        self.sheet(sheet)?.static_fields.get(key)
    }

    pub fn table(&self, sheet: &str, table_key: &str) -> Option<&[Row]> {
        self.sheet(sheet)?
            .tables
            .get(table_key)
            .map(Vec::as_slice)
    }

    /// Rejects sheets where a table key shadows a static field key.
    pub fn validate(&self) -> Result<()> {
        for (name, block) in &self.sheets {
            let collisions = block.colliding_keys();
            if !collisions.is_empty() {
                bail!(
                    "sheet `{name}` uses the same key for a static field and a table: {}",
                    collisions.join(", ")
                );
            }
        }
        Ok(())
    }

    pub fn from_json_slice(raw: &[u8]) -> Result<Self> {
        let record: Record = serde_json::from_slice(raw)?;
        record.validate()?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::{Record, Scalar};
    use chrono::NaiveDate;
    use serde_json::json;

    #[test]
    fn scalars_deserialize_by_shape() {
        let raw = json!([null, true, 20610, "2024-02-01", "2024-02-01 00:00:00", "Suite 400"]);
        let values: Vec<Scalar> = serde_json::from_value(raw).expect("scalars should parse");

        assert_eq!(values[0], Scalar::Null);
        assert_eq!(values[1], Scalar::Bool(true));
        assert_eq!(values[2], Scalar::Number(20610.0));
        assert_eq!(
            values[3],
            Scalar::Date(NaiveDate::from_ymd_opt(2024, 2, 1).expect("valid date"))
        );
        assert_eq!(values[4], Scalar::text("2024-02-01 00:00:00"));
        assert_eq!(values[5], Scalar::text("Suite 400"));
    }

    #[test]
    fn non_scalar_leaves_read_as_null_without_losing_the_record() {
        let raw = br#"{"Gen Info 1":{"static_fields":{"Tenant":"Acme","Rent":[5000,6000],"Contact":{"name":"Lee"}},"tables":{}}}"#;
        let record = Record::from_json_slice(raw).expect("record with a list leaf should load");

        assert_eq!(
            record.static_value("Gen Info 1", "Tenant"),
            Some(&Scalar::text("Acme"))
        );
        assert_eq!(record.static_value("Gen Info 1", "Rent"), Some(&Scalar::Null));
        assert_eq!(record.static_value("Gen Info 1", "Contact"), Some(&Scalar::Null));
    }

    #[test]
    fn null_like_tokens_are_absent() {
        assert!(Scalar::Null.is_absent());
        assert!(Scalar::text("  N/A ").is_absent());
        assert!(Scalar::text("TBD").is_absent());
        assert!(!Scalar::text("0").is_absent());
        assert!(!Scalar::Number(0.0).is_absent());
    }

    #[test]
    fn integral_numbers_render_without_fraction() {
        assert_eq!(Scalar::Number(400.0).display_value(), "400");
        assert_eq!(Scalar::Number(0.084).display_value(), "0.084");
    }

    #[test]
    fn record_round_trips_sheet_shape() {
        let raw = json!({
            "Gen Info 1": {
                "static_fields": { "Property Name": "Community Corporate Center" },
                "tables": { "Premises": [ { "Floor": "4", "Rentable SF": 20610.5 } ] }
            }
        });
        let record: Record = serde_json::from_value(raw.clone()).expect("record should parse");
        assert_eq!(
            record.static_value("Gen Info 1", "Property Name"),
            Some(&Scalar::text("Community Corporate Center"))
        );
        assert_eq!(record.table("Gen Info 1", "Premises").map(<[_]>::len), Some(1));
        assert_eq!(serde_json::to_value(&record).expect("serialize"), raw);
    }

    #[test]
    fn validate_rejects_static_and_table_key_collision() {
        let raw = json!({
            "Sheet": {
                "static_fields": { "Premises": "x" },
                "tables": { "Premises": [] }
            }
        });
        let bytes = serde_json::to_vec(&raw).expect("serialize fixture");
        let error = Record::from_json_slice(&bytes).expect_err("collision should be rejected");
        assert!(error.to_string().contains("Premises"), "unexpected error: {error}");
    }
}
