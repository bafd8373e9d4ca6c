use std::collections::BTreeMap;

use anyhow::{Result, anyhow, bail};
use serde::Deserialize;

use super::cells::{CellAddress, CellSource, column_index};
use crate::record::{Row, Scalar};

pub const DEFAULT_MAX_ROWS: usize = 10_000;

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawCells {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPredicate {
    check: String,
    #[serde(default)]
    contains: Option<String>,
    #[serde(default)]
    equals: Option<String>,
    #[serde(default)]
    not_empty: Option<bool>,
    #[serde(default, rename = "use")]
    use_cell: Option<RawCells>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRule {
    #[serde(default, rename = "if")]
    condition: Option<RawPredicate>,
    then: RawCells,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConditional {
    #[serde(default)]
    rules: Vec<RawRule>,
    #[serde(default, rename = "if")]
    condition: Option<RawPredicate>,
    #[serde(default, rename = "use")]
    use_cell: Option<RawCells>,
    #[serde(default)]
    cell: Option<RawCells>,
    #[serde(default)]
    cells: Option<RawCells>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawStaticSpec {
    Cells(RawCells),
    Conditional(RawConditional),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawTableStart {
    Cell(String),
    Rules(RawConditional),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTableSpec {
    #[serde(default)]
    start_row: Option<u32>,
    #[serde(default)]
    start: Option<RawTableStart>,
    #[serde(default)]
    columns: BTreeMap<String, String>,
    #[serde(default)]
    key_column: Option<String>,
    #[serde(default)]
    max_rows: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSheetMapping {
    #[serde(default)]
    static_fields: BTreeMap<String, RawStaticSpec>,
    #[serde(default)]
    tables: BTreeMap<String, RawTableSpec>,
}

/// One cell, or several cells whose renderings are joined by a space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellSelection {
    Single(CellAddress),
    Joined(Vec<CellAddress>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PredicateTest {
    Contains(String),
    Equals(String),
    NotEmpty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    pub check: CellAddress,
    pub test: PredicateTest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub when: Option<Predicate>,
    pub then: CellSelection,
}

/// Ordered rules; the first whose predicate holds selects the cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticSpec {
    pub rules: Vec<Rule>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableStart {
    Row(u32),
    Located(StaticSpec),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    pub start: TableStart,
    pub columns: BTreeMap<String, u32>,
    pub key_column: u32,
    pub max_rows: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SheetMapping {
    pub static_fields: BTreeMap<String, StaticSpec>,
    pub tables: BTreeMap<String, TableSpec>,
}

/// Sheet name to the cells and tables pulled from it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionMapping {
    pub sheets: BTreeMap<String, SheetMapping>,
}

impl ExtractionMapping {
    pub fn from_json_slice(raw: &[u8]) -> Result<Self> {
        let parsed: BTreeMap<String, RawSheetMapping> = serde_json::from_slice(raw)
            .map_err(|err| anyhow!("mapping is not a sheet map: {err}"))?;

        let mut sheets = BTreeMap::new();
        for (sheet, raw_sheet) in parsed {
            sheets.insert(sheet.clone(), compile_sheet(&sheet, raw_sheet)?);
        }
        Ok(Self { sheets })
    }

    pub fn field_count(&self) -> usize {
        self.sheets
            .values()
            .map(|sheet| sheet.static_fields.len() + sheet.tables.len())
            .sum()
    }
}

fn compile_sheet(sheet: &str, raw: RawSheetMapping) -> Result<SheetMapping> {
    let mut mapping = SheetMapping::default();
    for (field, spec) in raw.static_fields {
        let compiled = compile_static(spec)
            .map_err(|err| anyhow!("sheet `{sheet}` field `{field}`: {err}"))?;
        mapping.static_fields.insert(field, compiled);
    }
    for (table, spec) in raw.tables {
        if mapping.static_fields.contains_key(&table) {
            bail!("sheet `{sheet}` table `{table}`: key already used by a static field");
        }
        let compiled =
            compile_table(spec).map_err(|err| anyhow!("sheet `{sheet}` table `{table}`: {err}"))?;
        mapping.tables.insert(table, compiled);
    }
    Ok(mapping)
}

fn parse_address(raw: &str) -> Result<CellAddress, String> {
    raw.parse::<CellAddress>()
}

fn compile_cells(raw: RawCells) -> Result<CellSelection, String> {
    match raw {
        RawCells::One(cell) => parse_address(&cell).map(CellSelection::Single),
        RawCells::Many(cells) => {
            if cells.is_empty() {
                return Err("empty cell list".to_string());
            }
            cells
                .iter()
                .map(|cell| parse_address(cell))
                .collect::<Result<Vec<_>, _>>()
                .map(CellSelection::Joined)
        }
    }
}

fn compile_predicate(raw: RawPredicate) -> Result<Predicate, String> {
    let check = parse_address(&raw.check)?;
    let test = match (raw.contains, raw.equals, raw.not_empty) {
        (Some(text), None, None) => PredicateTest::Contains(text),
        (None, Some(text), None) => PredicateTest::Equals(text),
        (None, None, Some(true)) => PredicateTest::NotEmpty,
        (None, None, None) => return Err("condition needs `contains`, `equals` or `not_empty`".into()),
        _ => return Err("condition takes exactly one test".to_string()),
    };
    Ok(Predicate { check, test })
}

fn compile_static(raw: RawStaticSpec) -> Result<StaticSpec, String> {
    match raw {
        RawStaticSpec::Cells(cells) => Ok(StaticSpec {
            rules: vec![Rule {
                when: None,
                then: compile_cells(cells)?,
            }],
        }),
        RawStaticSpec::Conditional(conditional) => compile_conditional(conditional),
    }
}

/// Normalizes both the `rules` list and the single `if`/`use`/`cell` form.
fn compile_conditional(raw: RawConditional) -> Result<StaticSpec, String> {
    let RawConditional {
        rules,
        condition,
        use_cell,
        cell,
        cells,
    } = raw;

    if !rules.is_empty() {
        if condition.is_some() || use_cell.is_some() || cell.is_some() || cells.is_some() {
            return Err("`rules` cannot be combined with `if`, `use`, `cell` or `cells`".into());
        }
        let compiled = rules
            .into_iter()
            .map(|rule| {
                let when = match rule.condition {
                    Some(predicate) if predicate.use_cell.is_some() => {
                        return Err("`use` belongs to the single-condition form".to_string());
                    }
                    Some(predicate) => Some(compile_predicate(predicate)?),
                    None => None,
                };
                Ok(Rule {
                    when,
                    then: compile_cells(rule.then)?,
                })
            })
            .collect::<Result<Vec<_>, String>>()?;
        return Ok(StaticSpec { rules: compiled });
    }

    let mut compiled = Vec::new();
    if let Some(mut predicate) = condition {
        let chosen = predicate
            .use_cell
            .take()
            .or(use_cell)
            .ok_or_else(|| "`if` needs a `use` cell".to_string())?;
        compiled.push(Rule {
            when: Some(compile_predicate(predicate)?),
            then: compile_cells(chosen)?,
        });
    } else if use_cell.is_some() {
        return Err("`use` without `if`".to_string());
    }
    if let Some(fallback) = cell.or(cells) {
        compiled.push(Rule {
            when: None,
            then: compile_cells(fallback)?,
        });
    }
    if compiled.is_empty() {
        return Err("no cells or rules given".to_string());
    }
    Ok(StaticSpec { rules: compiled })
}

fn compile_table(raw: RawTableSpec) -> Result<TableSpec, String> {
    let start = match (raw.start_row, raw.start) {
        (Some(row), None) if row >= 1 => TableStart::Row(row),
        (Some(_), None) => return Err("`start_row` must be at least 1".to_string()),
        (None, Some(RawTableStart::Cell(cell))) => TableStart::Row(parse_address(&cell)?.row),
        (None, Some(RawTableStart::Rules(rules))) => {
            TableStart::Located(compile_conditional(rules)?)
        }
        (None, None) => return Err("missing `start_row` or `start`".to_string()),
        (Some(_), Some(_)) => return Err("give `start_row` or `start`, not both".to_string()),
    };

    if raw.columns.is_empty() {
        return Err("no columns mapped".to_string());
    }
    let mut columns = BTreeMap::new();
    for (name, letters) in raw.columns {
        let index = column_index(letters.trim())
            .ok_or_else(|| format!("column `{name}`: invalid column letter `{letters}`"))?;
        columns.insert(name, index);
    }

    let key_column = match raw.key_column {
        Some(name) => *columns
            .get(&name)
            .ok_or_else(|| format!("key column `{name}` is not mapped"))?,
        None => columns.values().copied().min().unwrap_or(1),
    };

    let max_rows = raw.max_rows.unwrap_or(DEFAULT_MAX_ROWS);
    if max_rows == 0 {
        return Err("`max_rows` must be positive".to_string());
    }

    Ok(TableSpec {
        start,
        columns,
        key_column,
        max_rows,
    })
}

fn is_blank(value: &Scalar) -> bool {
    matches!(value, Scalar::Null) || value.display_value().trim().is_empty()
}

impl Predicate {
    pub fn holds(&self, source: &impl CellSource, sheet: &str) -> bool {
        let value = source.cell(sheet, self.check);
        if matches!(value, Scalar::Null) {
            return false;
        }
        let rendered = value.display_value();
        match &self.test {
            PredicateTest::Contains(text) => rendered.contains(text.as_str()),
            PredicateTest::Equals(text) => rendered.trim() == text.trim(),
            PredicateTest::NotEmpty => !rendered.trim().is_empty(),
        }
    }
}

impl StaticSpec {
    /// The selection of the first rule whose predicate holds.
    pub fn select(&self, source: &impl CellSource, sheet: &str) -> Option<&CellSelection> {
        self.rules
            .iter()
            .find(|rule| {
                rule.when
                    .as_ref()
                    .is_none_or(|predicate| predicate.holds(source, sheet))
            })
            .map(|rule| &rule.then)
    }

    pub fn extract(&self, source: &impl CellSource, sheet: &str) -> Scalar {
        match self.select(source, sheet) {
            Some(CellSelection::Single(address)) => source.cell(sheet, *address).clone(),
            Some(CellSelection::Joined(addresses)) => {
                let parts = addresses
                    .iter()
                    .map(|address| source.cell(sheet, *address))
                    .filter(|value| !is_blank(value))
                    .map(|value| value.display_value().trim().to_string())
                    .collect::<Vec<_>>();
                if parts.is_empty() {
                    Scalar::Null
                } else {
                    Scalar::Text(parts.join(" "))
                }
            }
            None => Scalar::Null,
        }
    }
}

/// Rows read from a table region, and whether `max_rows` cut the scan short.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableScan {
    pub rows: Vec<Row>,
    pub truncated: bool,
}

impl TableSpec {
    fn start_row(&self, source: &impl CellSource, sheet: &str) -> Option<u32> {
        match &self.start {
            TableStart::Row(row) => Some(*row),
            TableStart::Located(spec) => match spec.select(source, sheet)? {
                CellSelection::Single(address) => Some(address.row),
                CellSelection::Joined(addresses) => addresses.first().map(|address| address.row),
            },
        }
    }

    /// `None` when the start row cannot be resolved.
    pub fn scan(&self, source: &impl CellSource, sheet: &str) -> Option<TableScan> {
        let start = self.start_row(source, sheet)?;
        let mut scan = TableScan::default();

        let mut row = start.saturating_add(1);
        loop {
            let key = source.cell(sheet, CellAddress::new(self.key_column, row));
            if is_blank(key) {
                break;
            }
            if scan.rows.len() == self.max_rows {
                scan.truncated = true;
                break;
            }
            let values = self
                .columns
                .iter()
                .map(|(name, column)| {
                    (
                        name.clone(),
                        source.cell(sheet, CellAddress::new(*column, row)).clone(),
                    )
                })
                .collect();
            scan.rows.push(values);
            row = match row.checked_add(1) {
                Some(next) => next,
                None => break,
            };
        }
        Some(scan)
    }
}
