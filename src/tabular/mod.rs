//! Data-based generation – record collections straight to XLSX, no template.
//!
//! Two input shapes are supported:
//!
//! - **Typed** – a slice of one `Serialize` type. Columns are the type's
//!   serialized fields in declaration order and every value is written as
//!   text.
//! - **Dynamic** – a slice of [`Record`]s. Columns come from the first
//!   record; values are coerced per field (numbers, dates, text, blanks).
//!
//! In both modes an empty input produces a workbook holding only the empty
//! sheet, with no header row.

pub mod record;
pub mod schema;
pub mod workbook;
pub mod xlsx;

use std::path::Path;

use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::generator::{write_output, DocumentFormat};
use crate::options::ReportOptions;

pub use record::{FieldValue, Record};
pub use schema::{coerce, typed_text, ColumnDescriptor, RecordAlignment, Schema, ValueKind};
pub use workbook::{
    check_extent, Cell, CellStyle, CellValue, Workbook, Worksheet, MAX_COLUMNS, MAX_ROWS,
};

/// Sheet name used when the caller has no preference.
pub const DEFAULT_SHEET_NAME: &str = "Sheet1";

/// Header fill colour (light blue) as `AARRGGBB`.
pub const HEADER_FILL: &str = "FFADD8E6";

/// Display format for date cells.
pub const DATE_FORMAT: &str = "dd.mm.yyyy";

fn header_style() -> CellStyle {
    CellStyle {
        bold: true,
        fill: Some(HEADER_FILL.to_string()),
        number_format: None,
    }
}

fn date_style() -> CellStyle {
    CellStyle {
        number_format: Some(DATE_FORMAT.to_string()),
        ..CellStyle::default()
    }
}

/// Builds spreadsheets from record collections.
#[derive(Debug, Clone, Default)]
pub struct TabularGenerator {
    options: ReportOptions,
    alignment: RecordAlignment,
}

impl TabularGenerator {
    pub fn new(options: ReportOptions) -> Self {
        Self {
            options,
            alignment: RecordAlignment::default(),
        }
    }

    /// Choose how dynamic records are matched to the header.
    pub fn with_alignment(mut self, alignment: RecordAlignment) -> Self {
        self.alignment = alignment;
        self
    }

    pub fn alignment(&self) -> RecordAlignment {
        self.alignment
    }

    pub fn options(&self) -> &ReportOptions {
        &self.options
    }

    pub fn format(&self) -> DocumentFormat {
        DocumentFormat::Excel
    }

    /// Typed mode: one column per serialized field, all values as text.
    pub fn generate_table<T: Serialize>(&self, data: &[T], sheet_name: &str) -> Result<Vec<u8>> {
        self.build_table(data, sheet_name)?.to_bytes()
    }

    /// Dynamic mode: columns from the first record, values coerced by kind.
    pub fn generate_from_dynamic(&self, data: &[Record], sheet_name: &str) -> Result<Vec<u8>> {
        self.build_dynamic(data, sheet_name)?.to_bytes()
    }

    /// Hand a fresh workbook to `build` and serialize whatever it leaves behind.
    ///
    /// The workbook is only borrowed for the duration of the callback.
    #[deprecated(note = "use generate_table or generate_from_dynamic")]
    pub fn generate_custom<F>(&self, build: F) -> Result<Vec<u8>>
    where
        F: FnOnce(&mut Workbook) -> Result<()>,
    {
        self.options.validate()?;
        let mut workbook = Workbook::new();
        build(&mut workbook)?;
        for sheet in workbook.sheets_mut() {
            if sheet.print_options().is_none() {
                sheet.set_print_options(self.options.clone());
            }
        }
        workbook.to_bytes()
    }

    pub fn save_table<T: Serialize>(
        &self,
        data: &[T],
        sheet_name: &str,
        output_path: impl AsRef<Path>,
    ) -> Result<()> {
        let bytes = self.generate_table(data, sheet_name)?;
        write_output(output_path.as_ref(), &bytes)
    }

    pub fn save_from_dynamic(
        &self,
        data: &[Record],
        sheet_name: &str,
        output_path: impl AsRef<Path>,
    ) -> Result<()> {
        let bytes = self.generate_from_dynamic(data, sheet_name)?;
        write_output(output_path.as_ref(), &bytes)
    }

    #[deprecated(note = "use save_table or save_from_dynamic")]
    pub fn save_custom<F>(&self, build: F, output_path: impl AsRef<Path>) -> Result<()>
    where
        F: FnOnce(&mut Workbook) -> Result<()>,
    {
        #[allow(deprecated)]
        let bytes = self.generate_custom(build)?;
        write_output(output_path.as_ref(), &bytes)
    }

    /// Populate the typed-mode workbook without serializing it.
    pub fn build_table<T: Serialize>(&self, data: &[T], sheet_name: &str) -> Result<Workbook> {
        let rows = data
            .iter()
            .enumerate()
            .map(|(i, item)| match serde_json::to_value(item)? {
                Value::Object(map) => Ok(map),
                other => Err(Error::Argument(format!(
                    "row {i} must serialize to an object, got {}",
                    record::json_kind(&other)
                ))),
            })
            .collect::<Result<Vec<_>>>()?;

        let mut workbook = Workbook::new();
        let sheet = self.new_sheet(&mut workbook, sheet_name)?;
        let Some(first) = rows.first() else {
            return Ok(workbook);
        };

        let schema = Schema::from_names(first.keys().cloned());
        check_extent(rows.len() + 1, schema.len())?;
        write_header(sheet, &schema);
        for (i, row) in rows.iter().enumerate() {
            let r = i as u32 + 1;
            for (c, column) in schema.columns().iter().enumerate() {
                let text = row.get(&column.name).map(typed_text).unwrap_or_default();
                sheet.set_value(r, c as u32, text);
            }
        }
        sheet.autofit_columns();
        log::debug!(
            "Populated sheet '{}' with {} typed rows x {} columns",
            sheet.name(),
            rows.len(),
            schema.len()
        );
        Ok(workbook)
    }

    /// Populate the dynamic-mode workbook without serializing it.
    pub fn build_dynamic(&self, data: &[Record], sheet_name: &str) -> Result<Workbook> {
        let mut workbook = Workbook::new();
        let sheet = self.new_sheet(&mut workbook, sheet_name)?;
        let Some(first) = data.first() else {
            return Ok(workbook);
        };

        let schema = Schema::infer(first);
        check_extent(data.len() + 1, schema.len())?;
        write_header(sheet, &schema);
        for (i, record) in data.iter().enumerate() {
            let r = i as u32 + 1;
            let row = schema.align(i, record, self.alignment)?;
            for (c, value) in row.into_iter().enumerate() {
                match value.and_then(coerce) {
                    Some(value @ CellValue::Date(_)) => sheet.set_cell(
                        r,
                        c as u32,
                        Cell {
                            value,
                            style: date_style(),
                        },
                    ),
                    Some(value) => sheet.set_value(r, c as u32, value),
                    None => {}
                }
            }
        }
        sheet.autofit_columns();
        log::debug!(
            "Populated sheet '{}' with {} dynamic records x {} columns ({:?})",
            sheet.name(),
            data.len(),
            schema.len(),
            self.alignment
        );
        Ok(workbook)
    }

    fn new_sheet<'w>(&self, workbook: &'w mut Workbook, name: &str) -> Result<&'w mut Worksheet> {
        self.options.validate()?;
        let sheet = workbook.add_sheet(name)?;
        sheet.set_print_options(self.options.clone());
        Ok(sheet)
    }
}

fn write_header(sheet: &mut Worksheet, schema: &Schema) {
    for (c, name) in schema.names().enumerate() {
        sheet.set_cell(
            0,
            c as u32,
            Cell {
                value: CellValue::Text(name.to_string()),
                style: header_style(),
            },
        );
    }
}
