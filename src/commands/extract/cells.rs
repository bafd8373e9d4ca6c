use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result};

use crate::record::Scalar;

const MAX_COLUMN: u32 = 16_384;
const MAX_ROW: u32 = 1_048_576;

/// A1-style cell address, 1-based on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellAddress {
    pub row: u32,
    pub column: u32,
}

impl CellAddress {
    pub fn new(column: u32, row: u32) -> Self {
        Self { row, column }
    }
}

/// Column letters to a 1-based index (`A` = 1, `AA` = 27).
pub fn column_index(letters: &str) -> Option<u32> {
    if letters.is_empty() || letters.len() > 3 {
        return None;
    }
    let mut index = 0_u32;
    for ch in letters.chars() {
        if !ch.is_ascii_alphabetic() {
            return None;
        }
        index = index * 26 + (ch.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
    }
    (index <= MAX_COLUMN).then_some(index)
}

fn column_letters(mut index: u32) -> String {
    let mut letters = Vec::new();
    while index > 0 {
        let rem = (index - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        index = (index - 1) / 26;
    }
    letters.iter().rev().collect()
}

impl FromStr for CellAddress {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let cleaned = raw.trim().replace('$', "");
        let split = cleaned
            .find(|ch: char| ch.is_ascii_digit())
            .ok_or_else(|| format!("invalid cell address `{raw}`"))?;
        let (letters, digits) = cleaned.split_at(split);

        let column = column_index(letters).ok_or_else(|| format!("invalid cell address `{raw}`"))?;
        let row = digits
            .parse::<u32>()
            .ok()
            .filter(|row| (1..=MAX_ROW).contains(row))
            .ok_or_else(|| format!("invalid cell address `{raw}`"))?;
        Ok(Self { row, column })
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_letters(self.column), self.row)
    }
}

/// Read access to workbook cells.
pub trait CellSource {
    fn has_sheet(&self, sheet: &str) -> bool;

    /// Value of one cell; empty cells read as [`Scalar::Null`].
    fn cell(&self, sheet: &str, address: CellAddress) -> &Scalar;
}

/// Workbook dumped as `{ "<sheet>": { "<A1>": <value>, ... } }`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JsonWorkbook {
    sheets: BTreeMap<String, BTreeMap<CellAddress, Scalar>>,
}

static EMPTY: Scalar = Scalar::Null;

impl JsonWorkbook {
    pub fn from_json_slice(raw: &[u8]) -> Result<Self> {
        let parsed: BTreeMap<String, BTreeMap<String, Scalar>> =
            serde_json::from_slice(raw).context("workbook dump is not a sheet/cell map")?;

        let mut sheets = BTreeMap::new();
        for (sheet, cells) in parsed {
            let mut addressed = BTreeMap::new();
            for (address, value) in cells {
                let address = address
                    .parse::<CellAddress>()
                    .map_err(anyhow::Error::msg)
                    .with_context(|| format!("sheet `{sheet}`"))?;
                addressed.insert(address, value);
            }
            sheets.insert(sheet, addressed);
        }
        Ok(Self { sheets })
    }

    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }
}

impl CellSource for JsonWorkbook {
    fn has_sheet(&self, sheet: &str) -> bool {
        self.sheets.contains_key(sheet)
    }

    fn cell(&self, sheet: &str, address: CellAddress) -> &Scalar {
        self.sheets
            .get(sheet)
            .and_then(|cells| cells.get(&address))
            .unwrap_or(&EMPTY)
    }
}
