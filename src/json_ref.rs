use std::fmt;
use std::str::FromStr;

use crate::error::PathError;
use crate::record::{Record, Row, Scalar};

const SEPARATOR: &str = "::";
const UNMAPPED: &str = "MISSING";

/// Address of a value inside a [`Record`].
///
/// Grammars:
/// - `STATIC::<sheet>::<key>`
/// - `TABLE::<sheet>::<table_key>` (whole row set)
/// - `TABLE::<sheet>::<table_key>::<column>`
/// - `TABLE_FILTER::<sheet>::<table_key>::<row_field>::<row_value>::<column>`
/// - `MISSING` or empty, a field with no location in the record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsonRef {
    Unmapped,
    Static {
        sheet: String,
        key: String,
    },
    Table {
        sheet: String,
        table: String,
        column: Option<String>,
    },
    TableFilter {
        sheet: String,
        table: String,
        row_field: String,
        row_value: String,
        column: String,
    },
}

/// Result of resolving a [`JsonRef`]; borrowed from the record.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue<'a> {
    Absent,
    Scalar(&'a Scalar),
    Column(Vec<&'a Scalar>),
    Rows(&'a [Row]),
}

impl FieldValue<'_> {
    pub fn is_absent(&self) -> bool {
        match self {
            Self::Absent => true,
            Self::Scalar(value) => value.is_absent(),
            Self::Column(values) => values.iter().all(|value| value.is_absent()),
            Self::Rows(rows) => rows.is_empty(),
        }
    }

    /// Compact rendering for reports: scalars as text, lists and rows as JSON.
    pub fn render(&self) -> String {
        match self {
            Self::Absent => String::new(),
            Self::Scalar(value) => value.display_value(),
            Self::Column(values) => serde_json::to_string(values).unwrap_or_default(),
            Self::Rows(rows) => serde_json::to_string(rows).unwrap_or_default(),
        }
    }
}

impl JsonRef {
    pub fn is_unmapped(&self) -> bool {
        matches!(self, Self::Unmapped)
    }

    /// True when the path names a whole table rather than a column of it.
    pub fn addresses_rows(&self) -> bool {
        matches!(self, Self::Table { column: None, .. })
    }

    pub fn addresses_table(&self) -> bool {
        matches!(self, Self::Table { .. })
    }

    /// Resolves the path; a missing sheet, key, or table is [`FieldValue::Absent`].
    pub fn resolve<'a>(&self, record: &'a Record) -> FieldValue<'a> {
        let value = match self {
            Self::Unmapped => FieldValue::Absent,
            Self::Static { sheet, key } => record
                .static_value(sheet, key)
                .map_or(FieldValue::Absent, FieldValue::Scalar),
            Self::Table {
                sheet,
                table,
                column: None,
            } => record
                .table(sheet, table)
                .map_or(FieldValue::Absent, FieldValue::Rows),
            Self::Table {
                sheet,
                table,
                column: Some(column),
            } => match record.table(sheet, table) {
                Some(rows) => FieldValue::Column(
                    rows.iter()
                        .map(|row| row.get(column).unwrap_or(&Scalar::Null))
                        .collect(),
                ),
                None => FieldValue::Absent,
            },
            Self::TableFilter {
                sheet,
                table,
                row_field,
                row_value,
                column,
            } => match record.table(sheet, table) {
                Some(rows) => FieldValue::Column(
                    rows.iter()
                        .filter(|row| {
                            row.get(row_field)
                                .is_some_and(|value| value.display_value() == *row_value)
                        })
                        .filter_map(|row| row.get(column))
                        .filter(|value| !matches!(value, Scalar::Null))
                        .collect(),
                ),
                None => FieldValue::Absent,
            },
        };

        if value.is_absent() {
            FieldValue::Absent
        } else {
            value
        }
    }

    /// Resolves to the full row set of the addressed table, ignoring any column segment.
    pub fn resolve_rows<'a>(&self, record: &'a Record) -> FieldValue<'a> {
        match self {
            Self::Table { sheet, table, .. } | Self::TableFilter { sheet, table, .. } => {
                match record.table(sheet, table) {
                    Some(rows) if !rows.is_empty() => FieldValue::Rows(rows),
                    _ => FieldValue::Absent,
                }
            }
            Self::Unmapped | Self::Static { .. } => FieldValue::Absent,
        }
    }
}

impl FromStr for JsonRef {
    type Err = PathError;

    fn from_str(path: &str) -> Result<Self, Self::Err> {
        let trimmed = path.trim();
        if trimmed.is_empty() || trimmed == UNMAPPED {
            return Ok(Self::Unmapped);
        }

        let error = |reason: &str| PathError {
            path: path.to_string(),
            reason: reason.to_string(),
        };

        let parts = trimmed.split(SEPARATOR).collect::<Vec<_>>();
        if parts.iter().any(|part| part.trim().is_empty()) {
            return Err(error("empty path segment"));
        }
        let owned = |index: usize| parts[index].to_string();

        match (parts[0], parts.len()) {
            ("STATIC", 3) => Ok(Self::Static {
                sheet: owned(1),
                key: owned(2),
            }),
            ("STATIC", _) => Err(error("expected STATIC::<sheet>::<key>")),
            ("TABLE", 3) => Ok(Self::Table {
                sheet: owned(1),
                table: owned(2),
                column: None,
            }),
            ("TABLE", 4) => Ok(Self::Table {
                sheet: owned(1),
                table: owned(2),
                column: Some(owned(3)),
            }),
            ("TABLE", _) => Err(error(
                "expected TABLE::<sheet>::<table_key> or TABLE::<sheet>::<table_key>::<column>",
            )),
            ("TABLE_FILTER", 6) => Ok(Self::TableFilter {
                sheet: owned(1),
                table: owned(2),
                row_field: owned(3),
                row_value: owned(4),
                column: owned(5),
            }),
            ("TABLE_FILTER", _) => Err(error(
                "expected TABLE_FILTER::<sheet>::<table_key>::<row_field>::<row_value>::<column>",
            )),
            (prefix, _) => Err(error(&format!("unknown path type `{prefix}`"))),
        }
    }
}

impl fmt::Display for JsonRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unmapped => f.write_str(UNMAPPED),
            Self::Static { sheet, key } => write!(f, "STATIC::{sheet}::{key}"),
            Self::Table {
                sheet,
                table,
                column: None,
            } => write!(f, "TABLE::{sheet}::{table}"),
            Self::Table {
                sheet,
                table,
                column: Some(column),
            } => write!(f, "TABLE::{sheet}::{table}::{column}"),
            Self::TableFilter {
                sheet,
                table,
                row_field,
                row_value,
                column,
            } => write!(
                f,
                "TABLE_FILTER::{sheet}::{table}::{row_field}::{row_value}::{column}"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{FieldValue, JsonRef};
    use crate::record::{Record, Scalar};
    use serde_json::json;

    fn sample_record() -> Record {
        serde_json::from_value(json!({
            "Gen Info 1": {
                "static_fields": {
                    "Property Name": "Community Corporate Center",
                    "Country": null
                },
                "tables": {
                    "Premise Information": [
                        { "Floor Number": "4", "Unit Number": 400, "Rentable SF": 20610 },
                        { "Floor Number": "5", "Unit Number": 500, "Rentable SF": 15000 }
                    ],
                    "Empty": []
                }
            },
            "Opt - Misc": {
                "tables": {
                    "ROFO": [
                        { "Right": "ROFO", "In Lease?": "No", "Expiration Date": null },
                        { "Right": "ROFR", "In Lease?": "Yes", "Expiration Date": "2025-12-31" }
                    ]
                }
            }
        }))
        .expect("fixture record should parse")
    }

    fn parse(path: &str) -> JsonRef {
        path.parse().expect("path should parse")
    }

    #[test]
    fn static_path_resolves_value() {
        let record = sample_record();
        let value = parse("STATIC::Gen Info 1::Property Name").resolve(&record);
        assert_eq!(
            value,
            FieldValue::Scalar(&Scalar::text("Community Corporate Center"))
        );
    }

    #[test]
    fn missing_sheet_key_or_table_resolves_absent() {
        let record = sample_record();
        for path in [
            "STATIC::Nope::Property Name",
            "STATIC::Gen Info 1::Nope",
            "STATIC::Gen Info 1::Country",
            "TABLE::Gen Info 1::Nope::Floor Number",
            "TABLE::Nope::Premise Information",
            "TABLE::Gen Info 1::Empty",
            "TABLE_FILTER::Opt - Misc::Nope::Right::ROFO::In Lease?",
            "MISSING",
        ] {
            assert_eq!(parse(path).resolve(&record), FieldValue::Absent, "{path}");
        }
    }

    #[test]
    fn table_column_path_collects_every_row() {
        let record = sample_record();
        let value = parse("TABLE::Gen Info 1::Premise Information::Unit Number").resolve(&record);
        assert_eq!(
            value,
            FieldValue::Column(vec![&Scalar::Number(400.0), &Scalar::Number(500.0)])
        );
    }

    #[test]
    fn table_path_without_column_returns_rows() {
        let record = sample_record();
        let path = parse("TABLE::Gen Info 1::Premise Information");
        assert!(path.addresses_rows());
        match path.resolve(&record) {
            FieldValue::Rows(rows) => assert_eq!(rows.len(), 2),
            other => panic!("expected rows, got {other:?}"),
        }

        let with_column = parse("TABLE::Gen Info 1::Premise Information::Floor Number");
        assert!(matches!(with_column.resolve_rows(&record), FieldValue::Rows(rows) if rows.len() == 2));
    }

    #[test]
    fn table_filter_selects_matching_rows_and_drops_nulls() {
        let record = sample_record();
        let value =
            parse("TABLE_FILTER::Opt - Misc::ROFO::Right::ROFR::Expiration Date").resolve(&record);
        match value {
            FieldValue::Column(values) => {
                assert_eq!(values.len(), 1);
                assert_eq!(values[0].display_value(), "2025-12-31");
            }
            other => panic!("expected column, got {other:?}"),
        }

        let nulls_only =
            parse("TABLE_FILTER::Opt - Misc::ROFO::Right::ROFO::Expiration Date").resolve(&record);
        assert_eq!(nulls_only, FieldValue::Absent);
    }

    #[test]
    fn malformed_paths_are_rejected() {
        for path in [
            "STATIC::Gen Info 1",
            "STATIC::a::b::c",
            "TABLE::a",
            "TABLE::a::b::c::d",
            "TABLE_FILTER::a::b::c",
            "STATIC::::key",
            "CELL::a::b",
            "Gen Info 1|Property Name",
        ] {
            let error = path
                .parse::<JsonRef>()
                .expect_err("malformed path should be rejected");
            assert_eq!(error.path, path);
        }
    }

    #[test]
    fn display_round_trips_parsed_paths() {
        for path in [
            "STATIC::Gen Info 1::Property Name",
            "TABLE::Gen Info 1::Premise Information",
            "TABLE::Gen Info 1::Premise Information::Unit Number",
            "TABLE_FILTER::Opt - Misc::ROFO::Right::ROFR::In Lease?",
            "MISSING",
        ] {
            assert_eq!(parse(path).to_string(), path);
        }
        assert!(parse("").is_unmapped());
    }
}
