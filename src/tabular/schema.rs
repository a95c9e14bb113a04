//! Column inference and value coercion.
//!
//! The column set is fixed once per call from a single representative record;
//! every later record is aligned against it.

use serde_json::Value;

use super::record::{FieldValue, Record};
use super::workbook::CellValue;
use crate::error::{Error, Result};

/// Broad type of a column, inferred from its first value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Numeric,
    Date,
    Text,
}

impl ValueKind {
    pub fn of(value: &FieldValue) -> Self {
        match value {
            FieldValue::Integer(_) | FieldValue::Unsigned(_) | FieldValue::Float(_) => {
                ValueKind::Numeric
            }
            FieldValue::DateTime(_) => ValueKind::Date,
            _ => ValueKind::Text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub kind: ValueKind,
}

/// How a record's fields are matched to the inferred columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordAlignment {
    /// Field `i` of every record goes to column `i`, whatever its name.
    #[default]
    Positional,
    /// Every record must carry exactly the header's names in the same order.
    Strict,
    /// Fields are looked up by column name; missing names leave the cell blank.
    ByName,
}

impl RecordAlignment {
    /// Parse `positional`, `strict` or `by-name` (case-insensitive).
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "positional" => Some(RecordAlignment::Positional),
            "strict" => Some(RecordAlignment::Strict),
            "by-name" | "byname" | "by_name" => Some(RecordAlignment::ByName),
            _ => None,
        }
    }
}

/// Ordered column set for one generation call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schema {
    columns: Vec<ColumnDescriptor>,
}

impl Schema {
    /// Infer columns from a representative record, in enumeration order.
    pub fn infer(record: &Record) -> Self {
        let columns = record
            .iter()
            .map(|(name, value)| ColumnDescriptor {
                name: name.to_string(),
                kind: ValueKind::of(value),
            })
            .collect();
        Self { columns }
    }

    /// Text columns for the given names.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns = names
            .into_iter()
            .map(|name| ColumnDescriptor {
                name: name.into(),
                kind: ValueKind::Text,
            })
            .collect();
        Self { columns }
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Match `record` (at zero-based `index` in the input) to the columns.
    ///
    /// The result always has one slot per column.
    pub fn align<'r>(
        &self,
        index: usize,
        record: &'r Record,
        alignment: RecordAlignment,
    ) -> Result<Vec<Option<&'r FieldValue>>> {
        match alignment {
            RecordAlignment::Positional => {
                if record.len() > self.len() {
                    log::warn!(
                        "Record {index} has {} fields but only {} columns; dropping the rest",
                        record.len(),
                        self.len()
                    );
                }
                let mut row: Vec<_> = record.values().take(self.len()).map(Some).collect();
                row.resize(self.len(), None);
                Ok(row)
            }
            RecordAlignment::Strict => {
                if !record.names().eq(self.names()) {
                    return Err(Error::ShapeMismatch {
                        record: index,
                        expected: self.names().map(str::to_string).collect(),
                        found: record.names().map(str::to_string).collect(),
                    });
                }
                Ok(record.values().map(Some).collect())
            }
            RecordAlignment::ByName => Ok(self.names().map(|name| record.get(name)).collect()),
        }
    }
}

/// Dynamic-mode coercion. `None` means the cell is left blank.
pub fn coerce(value: &FieldValue) -> Option<CellValue> {
    match value {
        FieldValue::Null => None,
        FieldValue::Integer(i) => Some(CellValue::Number(*i as f64)),
        FieldValue::Unsigned(u) => Some(CellValue::Number(*u as f64)),
        FieldValue::Float(f) if f.is_finite() => Some(CellValue::Number(*f)),
        FieldValue::Float(f) => Some(CellValue::Text(f.to_string())),
        FieldValue::DateTime(dt) => Some(CellValue::Date(*dt)),
        FieldValue::Bool(b) => Some(CellValue::Text(b.to_string())),
        FieldValue::Text(s) => Some(CellValue::Text(s.clone())),
    }
}

/// Typed-mode coercion: every value becomes its default text.
pub fn typed_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
