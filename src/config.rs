//! Fields configuration: one entry per evaluated field, validated in full before any document
//! is touched.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::ConfigError;
use crate::json_ref::JsonRef;
use crate::matchers::{Matcher, MatcherKind};

const DEFAULT_FIELD_TYPE: &str = "string";
const DEFAULT_MATCHER: &str = "StringMatcher";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Date,
    Enum,
    Number,
    Table,
    Boolean,
    Phone,
    Address,
}

impl FieldType {
    pub fn from_name(name: &str) -> Option<Self> {
        let field_type = match name.trim().to_lowercase().as_str() {
            "string" => Self::String,
            "date" => Self::Date,
            "enum" => Self::Enum,
            "number" | "float" => Self::Number,
            "table" | "json" => Self::Table,
            "boolean" | "boolean_string" => Self::Boolean,
            "phone" => Self::Phone,
            "address" => Self::Address,
            _ => return None,
        };
        Some(field_type)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Date => "date",
            Self::Enum => "enum",
            Self::Number => "number",
            Self::Table => "table",
            Self::Boolean => "boolean",
            Self::Phone => "phone",
            Self::Address => "address",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Deserialize)]
struct RawFieldsConfig {
    #[serde(default)]
    fields: BTreeMap<String, RawField>,
}

/// Extra keys (descriptions, prompt text) are tolerated and ignored.
#[derive(Debug, Deserialize)]
struct RawField {
    #[serde(rename = "type", default = "default_field_type")]
    field_type: String,
    #[serde(default = "default_matcher")]
    matcher: String,
    #[serde(default)]
    json_ref: String,
    #[serde(default)]
    params: Value,
}

fn default_field_type() -> String {
    DEFAULT_FIELD_TYPE.to_string()
}

fn default_matcher() -> String {
    DEFAULT_MATCHER.to_string()
}

#[derive(Debug, Clone)]
pub struct FieldConfig {
    pub name: String,
    pub field_type: FieldType,
    pub matcher: Matcher,
    pub json_ref: JsonRef,
}

impl FieldConfig {
    pub fn matcher_name(&self) -> &'static str {
        self.matcher.kind().name()
    }
}

/// Validated fields configuration, ordered by field name.
#[derive(Debug, Clone, Default)]
pub struct FieldsConfig {
    pub fields: Vec<FieldConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Json,
}

impl ConfigFormat {
    /// `.json` is JSON; anything else is read as YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Yaml,
        }
    }
}

impl FieldsConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read fields config: {}", path.display()))?;
        Self::parse(&raw, ConfigFormat::from_path(path))
            .with_context(|| format!("invalid fields config: {}", path.display()))
    }

    pub fn parse(raw: &str, format: ConfigFormat) -> Result<Self> {
        let parsed: RawFieldsConfig = match format {
            ConfigFormat::Yaml => serde_yaml::from_str(raw).context("failed to parse YAML")?,
            ConfigFormat::Json => serde_json::from_str(raw).context("failed to parse JSON")?,
        };

        let fields = parsed
            .fields
            .into_iter()
            .map(|(name, raw)| validate_field(name, raw))
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Ok(Self { fields })
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    #[cfg(test)]
    pub fn field(&self, name: &str) -> Option<&FieldConfig> {
        self.fields.iter().find(|field| field.name == name)
    }
}

fn validate_field(name: String, raw: RawField) -> Result<FieldConfig, ConfigError> {
    let field_type =
        FieldType::from_name(&raw.field_type).ok_or_else(|| ConfigError::UnknownFieldType {
            field: name.clone(),
            name: raw.field_type.clone(),
        })?;

    let kind = MatcherKind::from_name(&raw.matcher).ok_or_else(|| ConfigError::UnknownMatcher {
        field: name.clone(),
        name: raw.matcher.clone(),
    })?;

    let json_ref = raw
        .json_ref
        .parse::<JsonRef>()
        .map_err(|err| ConfigError::from_path_error(&name, err))?;

    check_compatibility(&name, field_type, kind, &json_ref)?;

    let matcher = Matcher::build(kind, &raw.params).map_err(|reason| ConfigError::InvalidParams {
        field: name.clone(),
        matcher: kind.name().to_string(),
        reason,
    })?;

    if json_ref.is_unmapped() {
        warn!(field = %name, "field has no json_ref; it always resolves to absent");
    }

    Ok(FieldConfig {
        name,
        field_type,
        matcher,
        json_ref,
    })
}

fn check_compatibility(
    name: &str,
    field_type: FieldType,
    kind: MatcherKind,
    json_ref: &JsonRef,
) -> Result<(), ConfigError> {
    let incompatible = |reason: String| ConfigError::IncompatibleField {
        field: name.to_string(),
        reason,
    };

    match (field_type == FieldType::Table, kind == MatcherKind::Table) {
        (true, false) => {
            return Err(incompatible(format!(
                "table fields need TableMatcher, got {kind}"
            )));
        }
        (false, true) => {
            return Err(incompatible(format!(
                "TableMatcher is only valid for table fields, got type {field_type}"
            )));
        }
        _ => {}
    }

    if field_type == FieldType::Table {
        if !(json_ref.addresses_table() || json_ref.is_unmapped()) {
            return Err(incompatible(format!(
                "table fields need a TABLE path, got `{json_ref}`"
            )));
        }
    } else if json_ref.addresses_rows() {
        return Err(incompatible(format!(
            "`{json_ref}` addresses a whole table; add a column segment for {field_type} fields"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{ConfigFormat, FieldType, FieldsConfig};
    use crate::error::ConfigError;
    use crate::json_ref::JsonRef;
    use crate::matchers::MatcherKind;

    const SAMPLE: &str = r#"
fields:
  tenant_name:
    type: string
    matcher: StringMatcher
    json_ref: "STATIC::Gen Info 1::Tenant Name"
    params: { threshold: 0.85 }
    description: Legal name of the tenant
  lease_start:
    type: date
    matcher: DateMatcher
    json_ref: "STATIC::Gen Info 1::Lease Start"
  base_rent:
    type: float
    matcher: FloatMatcher
    json_ref: "STATIC::Rent::Base Rent"
    params:
      tolerance: 0.02
  premises:
    type: json
    matcher: JSONMatcher
    json_ref: "TABLE::Gen Info 1::Premise Information"
    params:
      columns:
        Rentable SF:
          matcher: NumericMatcher
          params: { tolerance: 0.0 }
  guarantor:
    json_ref: MISSING
"#;

    fn config_error(raw: &str) -> ConfigError {
        let err = FieldsConfig::parse(raw, ConfigFormat::Yaml)
            .expect_err("config should be rejected");
        err.downcast::<ConfigError>()
            .expect("rejection should carry a ConfigError")
    }

    #[test]
    fn yaml_config_loads_with_aliases_and_defaults() {
        let config = FieldsConfig::parse(SAMPLE, ConfigFormat::Yaml).expect("sample should load");
        assert_eq!(config.len(), 5);

        let names = config
            .fields
            .iter()
            .map(|field| field.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(
            names,
            vec!["base_rent", "guarantor", "lease_start", "premises", "tenant_name"]
        );

        let rent = config.field("base_rent").expect("base_rent should exist");
        assert_eq!(rent.field_type, FieldType::Number);
        assert_eq!(rent.matcher.kind(), MatcherKind::Numeric);

        let premises = config.field("premises").expect("premises should exist");
        assert_eq!(premises.field_type, FieldType::Table);
        assert_eq!(premises.matcher_name(), "TableMatcher");
        assert!(premises.json_ref.addresses_rows());

        let guarantor = config.field("guarantor").expect("guarantor should exist");
        assert_eq!(guarantor.field_type, FieldType::String);
        assert_eq!(guarantor.matcher.kind(), MatcherKind::String);
        assert_eq!(guarantor.json_ref, JsonRef::Unmapped);
    }

    #[test]
    fn json_config_is_accepted() {
        let raw = r#"{"fields": {"country": {"type": "enum", "matcher": "EnumMatcher",
            "json_ref": "STATIC::Gen Info 1::Country", "params": {"enum_values": ["US", "CA"]}}}}"#;
        let config = FieldsConfig::parse(raw, ConfigFormat::Json).expect("json config should load");
        assert_eq!(config.fields[0].field_type, FieldType::Enum);
    }

    #[test]
    fn malformed_path_names_the_field() {
        let err = config_error(
            "fields:\n  bad:\n    type: string\n    json_ref: \"STATIC::Only Sheet\"\n",
        );
        match &err {
            ConfigError::MalformedPath { field, path, .. } => {
                assert_eq!(field, "bad");
                assert_eq!(path, "STATIC::Only Sheet");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().starts_with("field `bad`"));
    }

    #[test]
    fn unknown_matcher_and_type_are_rejected() {
        let err = config_error("fields:\n  a:\n    matcher: FuzzyMatcher\n");
        assert!(matches!(err, ConfigError::UnknownMatcher { ref name, .. } if name == "FuzzyMatcher"));

        let err = config_error("fields:\n  a:\n    type: currency\n");
        assert!(matches!(err, ConfigError::UnknownFieldType { ref name, .. } if name == "currency"));
    }

    #[test]
    fn invalid_params_are_rejected_at_load() {
        let err = config_error(
            "fields:\n  rent:\n    type: number\n    matcher: NumericMatcher\n    json_ref: \"STATIC::Rent::Base\"\n",
        );
        assert!(matches!(err, ConfigError::InvalidParams { ref matcher, .. } if matcher == "NumericMatcher"));

        let err = config_error(
            "fields:\n  name:\n    matcher: StringMatcher\n    json_ref: \"STATIC::A::B\"\n    params: { treshold: 0.8 }\n",
        );
        assert!(matches!(err, ConfigError::InvalidParams { .. }));
    }

    #[test]
    fn table_shapes_must_agree() {
        let err = config_error(
            "fields:\n  units:\n    type: string\n    json_ref: \"TABLE::Gen Info 1::Premise Information\"\n",
        );
        assert!(matches!(err, ConfigError::IncompatibleField { .. }));

        let err = config_error(
            "fields:\n  units:\n    type: table\n    matcher: TableMatcher\n    json_ref: \"STATIC::Gen Info 1::Units\"\n",
        );
        assert!(matches!(err, ConfigError::IncompatibleField { .. }));

        let err = config_error(
            "fields:\n  units:\n    type: table\n    matcher: ExactMatcher\n    json_ref: \"TABLE::Gen Info 1::Premise Information\"\n",
        );
        assert!(matches!(err, ConfigError::IncompatibleField { .. }));

        let column = FieldsConfig::parse(
            "fields:\n  unit_numbers:\n    type: string\n    matcher: ExactMatcher\n    json_ref: \"TABLE::Gen Info 1::Premise Information::Unit Number\"\n",
            ConfigFormat::Yaml,
        )
        .expect("column path should load for scalar fields");
        assert!(!column.fields[0].json_ref.addresses_rows());
    }

    #[test]
    fn format_follows_extension() {
        use std::path::Path;
        assert_eq!(
            ConfigFormat::from_path(Path::new("configs/fields_config.JSON")),
            ConfigFormat::Json
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("configs/fields_config.yaml")),
            ConfigFormat::Yaml
        );
    }
}
