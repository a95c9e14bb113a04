//! In-memory spreadsheet model populated by the tabular generator and
//! serialized by the XLSX writer.
//!
//! Rows and columns are zero-based.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;

use crate::error::{Error, Result};
use crate::options::ReportOptions;

/// Maximum sheet-name length accepted by spreadsheet applications.
pub const MAX_SHEET_NAME_LEN: usize = 31;

const FORBIDDEN_SHEET_CHARS: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];

/// Rows a worksheet can hold.
pub const MAX_ROWS: u32 = 1_048_576;

/// Columns a worksheet can hold (`A` to `XFD`).
pub const MAX_COLUMNS: u32 = 16_384;

/// Widest column spreadsheet applications allow, in characters.
const MAX_COLUMN_WIDTH: f64 = 255.0;

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Date(NaiveDateTime),
}

impl CellValue {
    /// Text as it would appear in a default-width cell, used for auto-fit.
    pub fn display_len(&self) -> usize {
        match self {
            CellValue::Text(s) => s.lines().map(|l| l.chars().count()).max().unwrap_or(0),
            CellValue::Number(n) => n.to_string().len(),
            CellValue::Date(_) => "dd.mm.yyyy".len(),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<NaiveDateTime> for CellValue {
    fn from(dt: NaiveDateTime) -> Self {
        CellValue::Date(dt)
    }
}

/// Display attributes of a cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct CellStyle {
    pub bold: bool,
    /// Solid fill colour as `AARRGGBB` hex.
    pub fill: Option<String>,
    /// Number format code, e.g. `dd.mm.yyyy`.
    pub number_format: Option<String>,
}

impl CellStyle {
    pub fn is_default(&self) -> bool {
        *self == CellStyle::default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub value: CellValue,
    pub style: CellStyle,
}

/// A named sheet of sparse cells.
#[derive(Debug, Clone)]
pub struct Worksheet {
    name: String,
    cells: BTreeMap<(u32, u32), Cell>,
    column_widths: BTreeMap<u32, f64>,
    print_options: Option<ReportOptions>,
}

impl Worksheet {
    pub fn new(name: &str) -> Result<Self> {
        validate_sheet_name(name)?;
        Ok(Self {
            name: name.to_string(),
            cells: BTreeMap::new(),
            column_widths: BTreeMap::new(),
            print_options: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Write a value, keeping any style already on the cell.
    pub fn set_value(&mut self, row: u32, col: u32, value: impl Into<CellValue>) {
        let value = value.into();
        match self.cells.get_mut(&(row, col)) {
            Some(cell) => cell.value = value,
            None => {
                self.cells.insert(
                    (row, col),
                    Cell {
                        value,
                        style: CellStyle::default(),
                    },
                );
            }
        }
    }

    pub fn set_cell(&mut self, row: u32, col: u32, cell: Cell) {
        self.cells.insert((row, col), cell);
    }

    /// Restyle an existing cell. Returns `false` if the cell is blank.
    pub fn set_style(&mut self, row: u32, col: u32, style: CellStyle) -> bool {
        match self.cells.get_mut(&(row, col)) {
            Some(cell) => {
                cell.style = style;
                true
            }
            None => false,
        }
    }

    pub fn cell(&self, row: u32, col: u32) -> Option<&Cell> {
        self.cells.get(&(row, col))
    }

    pub fn clear(&mut self, row: u32, col: u32) -> Option<Cell> {
        self.cells.remove(&(row, col))
    }

    /// Cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = ((u32, u32), &Cell)> {
        self.cells.iter().map(|(&pos, cell)| (pos, cell))
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Number of rows up to and including the last non-blank one.
    pub fn row_count(&self) -> u32 {
        self.cells
            .keys()
            .next_back()
            .map_or(0, |&(row, _)| row.saturating_add(1))
    }

    /// Number of columns up to and including the last non-blank one.
    pub fn column_count(&self) -> u32 {
        self.cells
            .keys()
            .map(|&(_, col)| col.saturating_add(1))
            .max()
            .unwrap_or(0)
    }

    /// Fail if any cell lies outside the worksheet grid.
    pub fn check_extent(&self) -> Result<()> {
        check_extent(self.row_count() as usize, self.column_count() as usize)
            .map_err(|e| Error::Argument(format!("sheet '{}': {e}", self.name)))
    }

    /// Set a column width in characters, clamped to the allowed range.
    pub fn set_column_width(&mut self, col: u32, width: f64) {
        self.column_widths
            .insert(col, width.clamp(0.0, MAX_COLUMN_WIDTH));
    }

    pub fn column_width(&self, col: u32) -> Option<f64> {
        self.column_widths.get(&col).copied()
    }

    pub fn column_widths(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.column_widths.iter().map(|(&c, &w)| (c, w))
    }

    /// Size every used column to its widest value.
    pub fn autofit_columns(&mut self) {
        let mut widest: BTreeMap<u32, usize> = BTreeMap::new();
        for (&(_, col), cell) in &self.cells {
            let len = cell.value.display_len();
            let entry = widest.entry(col).or_insert(0);
            *entry = (*entry).max(len);
        }
        for (col, len) in widest {
            self.set_column_width(col, len as f64 * 1.1 + 2.0);
        }
    }

    /// Paper size, orientation and margins for printing.
    pub fn set_print_options(&mut self, options: ReportOptions) {
        self.print_options = Some(options);
    }

    pub fn print_options(&self) -> Option<&ReportOptions> {
        self.print_options.as_ref()
    }
}

/// An ordered collection of uniquely named sheets.
#[derive(Debug, Clone, Default)]
pub struct Workbook {
    sheets: Vec<Worksheet>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sheet. Names are unique, compared case-insensitively.
    pub fn add_sheet(&mut self, name: &str) -> Result<&mut Worksheet> {
        if self.sheet(name).is_some() {
            return Err(Error::Argument(format!("sheet '{name}' already exists")));
        }
        let index = self.sheets.len();
        self.sheets.push(Worksheet::new(name)?);
        Ok(&mut self.sheets[index])
    }

    pub fn sheet(&self, name: &str) -> Option<&Worksheet> {
        self.sheets
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }

    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut Worksheet> {
        self.sheets
            .iter_mut()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }

    pub fn sheets(&self) -> &[Worksheet] {
        &self.sheets
    }

    pub fn sheets_mut(&mut self) -> &mut [Worksheet] {
        &mut self.sheets
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    /// Serialize to XLSX bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        super::xlsx::write_workbook(self)
    }
}

/// Reject a grid of `rows` x `columns` that a worksheet cannot hold.
pub fn check_extent(rows: usize, columns: usize) -> Result<()> {
    if rows > MAX_ROWS as usize {
        return Err(Error::Argument(format!(
            "{rows} rows exceed the worksheet limit of {MAX_ROWS}"
        )));
    }
    if columns > MAX_COLUMNS as usize {
        return Err(Error::Argument(format!(
            "{columns} columns exceed the worksheet limit of {MAX_COLUMNS}"
        )));
    }
    Ok(())
}

/// Reject names spreadsheet applications refuse to open.
pub fn validate_sheet_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::Argument("sheet name must not be empty".to_string()));
    }
    if name.chars().count() > MAX_SHEET_NAME_LEN {
        return Err(Error::Argument(format!(
            "sheet name '{name}' is longer than {MAX_SHEET_NAME_LEN} characters"
        )));
    }
    if let Some(c) = name.chars().find(|c| FORBIDDEN_SHEET_CHARS.contains(c)) {
        return Err(Error::Argument(format!(
            "sheet name '{name}' contains forbidden character '{c}'"
        )));
    }
    if let Some(c) = name.chars().find(|c| c.is_control()) {
        return Err(Error::Argument(format!(
            "sheet name {name:?} contains control character U+{:04X}",
            u32::from(c)
        )));
    }
    if name.starts_with('\'') || name.ends_with('\'') {
        return Err(Error::Argument(format!(
            "sheet name '{name}' must not begin or end with an apostrophe"
        )));
    }
    Ok(())
}
