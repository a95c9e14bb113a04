//! SpreadsheetML writer for [`Workbook`].
//!
//! Strings are stored inline (`t="inlineStr"`), so no shared-string table is
//! emitted. Styles are collected from the cells into a deduplicated table
//! before any sheet is written.

use std::borrow::Cow;
use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};

use super::workbook::{Cell, CellStyle, CellValue, Workbook, Worksheet};
use crate::error::{Error, Result};
use crate::ooxml::{
    content_types_part, is_xml_char, relationships_part, Package, XmlPart, CT_RELATIONSHIPS,
    NS_OFFICE_RELATIONSHIPS, REL_OFFICE_DOCUMENT,
};
use crate::options::{PageOrientation, PageSize, ReportOptions};

const NS_SPREADSHEET: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const CT_WORKBOOK: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml";
const CT_WORKSHEET: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml";
const CT_STYLES: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml";
const REL_WORKSHEET: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";
const REL_STYLES: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";

/// First id available for custom number formats.
const FIRST_CUSTOM_NUM_FMT: u32 = 164;
const MM_PER_INCH: f32 = 25.4;

/// Serialize `workbook` to XLSX bytes.
pub fn write_workbook(workbook: &Workbook) -> Result<Vec<u8>> {
    if workbook.is_empty() {
        return Err(Error::Conversion("workbook has no sheets".to_string()));
    }
    let sheets = workbook.sheets();
    for sheet in sheets {
        sheet.check_extent()?;
    }
    let styles = StyleTable::collect(sheets);

    let sheet_parts: Vec<String> = (1..=sheets.len())
        .map(|n| format!("xl/worksheets/sheet{n}.xml"))
        .collect();
    let sheet_ids: Vec<String> = (1..=sheets.len()).map(|n| format!("rId{n}")).collect();
    let styles_id = format!("rId{}", sheets.len() + 1);

    let override_names: Vec<String> = sheet_parts.iter().map(|p| format!("/{p}")).collect();
    let mut overrides = vec![
        ("/xl/workbook.xml", CT_WORKBOOK),
        ("/xl/styles.xml", CT_STYLES),
    ];
    overrides.extend(override_names.iter().map(|p| (p.as_str(), CT_WORKSHEET)));

    let sheet_targets: Vec<String> = (1..=sheets.len())
        .map(|n| format!("worksheets/sheet{n}.xml"))
        .collect();
    let mut workbook_rels: Vec<_> = sheet_ids
        .iter()
        .zip(&sheet_targets)
        .map(|(id, target)| (id.as_str(), REL_WORKSHEET, target.as_str()))
        .collect();
    workbook_rels.push((styles_id.as_str(), REL_STYLES, "styles.xml"));

    let mut package = Package::new();
    package.add_part(
        "[Content_Types].xml",
        &content_types_part(
            &[("rels", CT_RELATIONSHIPS), ("xml", "application/xml")],
            &overrides,
        )?,
    )?;
    package.add_part(
        "_rels/.rels",
        &relationships_part(&[("rId1", REL_OFFICE_DOCUMENT, "xl/workbook.xml")])?,
    )?;
    package.add_part("xl/workbook.xml", &workbook_part(sheets, &sheet_ids)?)?;
    package.add_part(
        "xl/_rels/workbook.xml.rels",
        &relationships_part(&workbook_rels)?,
    )?;
    package.add_part("xl/styles.xml", &styles.to_xml()?)?;
    for (sheet, part) in sheets.iter().zip(&sheet_parts) {
        package.add_part(part, &worksheet_part(sheet, &styles)?)?;
    }

    let bytes = package.finish()?;
    log::debug!(
        "Packaged XLSX ({} sheets, {} bytes)",
        sheets.len(),
        bytes.len()
    );
    Ok(bytes)
}

fn workbook_part(sheets: &[Worksheet], ids: &[String]) -> Result<Vec<u8>> {
    let mut xml = XmlPart::new()?;
    xml.start(
        "workbook",
        &[("xmlns", NS_SPREADSHEET), ("xmlns:r", NS_OFFICE_RELATIONSHIPS)],
    )?;
    xml.start("sheets", &[])?;
    for (n, (sheet, id)) in sheets.iter().zip(ids).enumerate() {
        let sheet_id = (n + 1).to_string();
        xml.empty(
            "sheet",
            &[
                ("name", sheet.name()),
                ("sheetId", sheet_id.as_str()),
                ("r:id", id.as_str()),
            ],
        )?;
    }
    xml.end("sheets")?;
    xml.end("workbook")?;
    Ok(xml.into_bytes())
}

fn worksheet_part(sheet: &Worksheet, styles: &StyleTable) -> Result<Vec<u8>> {
    let mut xml = XmlPart::new()?;
    xml.start(
        "worksheet",
        &[("xmlns", NS_SPREADSHEET), ("xmlns:r", NS_OFFICE_RELATIONSHIPS)],
    )?;

    let dimension = match (sheet.row_count(), sheet.column_count()) {
        (0, _) | (_, 0) => "A1".to_string(),
        (rows, cols) => format!("A1:{}", cell_ref(rows - 1, cols - 1)),
    };
    xml.empty("dimension", &[("ref", dimension.as_str())])?;
    xml.empty("sheetFormatPr", &[("defaultRowHeight", "15")])?;

    let widths: Vec<(String, String)> = sheet
        .column_widths()
        .map(|(col, width)| ((col + 1).to_string(), format!("{width:.2}")))
        .collect();
    if !widths.is_empty() {
        xml.start("cols", &[])?;
        for (index, width) in &widths {
            xml.empty(
                "col",
                &[
                    ("min", index.as_str()),
                    ("max", index.as_str()),
                    ("width", width.as_str()),
                    ("customWidth", "1"),
                ],
            )?;
        }
        xml.end("cols")?;
    }

    xml.start("sheetData", &[])?;
    let mut open_row: Option<u32> = None;
    for ((row, col), cell) in sheet.cells() {
        if open_row != Some(row) {
            if open_row.is_some() {
                xml.end("row")?;
            }
            let r = (row + 1).to_string();
            xml.start("row", &[("r", r.as_str())])?;
            open_row = Some(row);
        }
        write_cell(&mut xml, row, col, cell, styles)?;
    }
    if open_row.is_some() {
        xml.end("row")?;
    }
    xml.end("sheetData")?;

    if let Some(options) = sheet.print_options() {
        write_print_setup(&mut xml, options)?;
    }
    xml.end("worksheet")?;
    Ok(xml.into_bytes())
}

fn write_cell(
    xml: &mut XmlPart,
    row: u32,
    col: u32,
    cell: &Cell,
    styles: &StyleTable,
) -> Result<()> {
    let reference = cell_ref(row, col);
    let style = styles.index_of(&cell.style).to_string();
    let mut attrs = vec![("r", reference.as_str())];
    if style != "0" {
        attrs.push(("s", style.as_str()));
    }

    let number = match &cell.value {
        CellValue::Number(n) => Some(*n),
        CellValue::Date(dt) => excel_serial(dt),
        CellValue::Text(_) => None,
    };
    match (number, &cell.value) {
        (Some(n), _) => {
            xml.start("c", &attrs)?;
            xml.leaf("v", &[], &n.to_string())?;
        }
        (None, value) => {
            let text = match value {
                CellValue::Text(s) => encode_cell_text(s).into_owned(),
                CellValue::Date(dt) => dt.format("%d.%m.%Y").to_string(),
                CellValue::Number(n) => n.to_string(),
            };
            attrs.push(("t", "inlineStr"));
            xml.start("c", &attrs)?;
            xml.start("is", &[])?;
            if text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace) {
                xml.leaf("t", &[("xml:space", "preserve")], &text)?;
            } else {
                xml.leaf("t", &[], &text)?;
            }
            xml.end("is")?;
        }
    }
    xml.end("c")
}

/// Encode characters XML cannot carry as SpreadsheetML `_xHHHH_` escapes.
/// Text that already looks like an escape gets its underscore escaped as
/// `_x005F_` so readers decode it back to the literal.
pub(crate) fn encode_cell_text(text: &str) -> Cow<'_, str> {
    if text.chars().all(is_xml_char) && !text.contains("_x") {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 8);
    for (i, c) in text.char_indices() {
        if c == '_' && looks_like_escape(&text[i..]) {
            out.push_str("_x005F_");
        } else if is_xml_char(c) {
            out.push(c);
        } else {
            out.push_str(&format!("_x{:04X}_", u32::from(c)));
        }
    }
    Cow::Owned(out)
}

fn looks_like_escape(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() >= 7 && b[1] == b'x' && b[2..6].iter().all(u8::is_ascii_hexdigit) && b[6] == b'_'
}

fn write_print_setup(xml: &mut XmlPart, options: &ReportOptions) -> Result<()> {
    let inches = |mm: f32| format!("{:.4}", mm / MM_PER_INCH);
    let m = &options.margins;
    let (left, right, top, bottom) = (inches(m.left), inches(m.right), inches(m.top), inches(m.bottom));
    xml.empty(
        "pageMargins",
        &[
            ("left", left.as_str()),
            ("right", right.as_str()),
            ("top", top.as_str()),
            ("bottom", bottom.as_str()),
            ("header", "0.3"),
            ("footer", "0.3"),
        ],
    )?;
    let paper = paper_size_code(options.page_size).to_string();
    let orientation = match options.orientation {
        PageOrientation::Portrait => "portrait",
        PageOrientation::Landscape => "landscape",
    };
    xml.empty(
        "pageSetup",
        &[("paperSize", paper.as_str()), ("orientation", orientation)],
    )
}

/// SpreadsheetML `paperSize` code.
pub fn paper_size_code(size: PageSize) -> u32 {
    match size {
        PageSize::Letter => 1,
        PageSize::Legal => 5,
        PageSize::A4 => 9,
        PageSize::A5 => 11,
    }
}

/// Zero-based column index to letters: 0 → `A`, 26 → `AA`.
pub fn column_name(col: u32) -> String {
    let mut n = col + 1;
    let mut name = Vec::new();
    while n > 0 {
        let rem = ((n - 1) % 26) as u8;
        name.push(b'A' + rem);
        n = (n - 1) / 26;
    }
    name.reverse();
    String::from_utf8_lossy(&name).into_owned()
}

/// Zero-based coordinates to an `A1` reference.
pub fn cell_ref(row: u32, col: u32) -> String {
    format!("{}{}", column_name(col), row + 1)
}

/// Serial day number in the 1900 date system, or `None` before 1900-01-01.
///
/// Serials below 61 follow the 1900 leap-year quirk: 1900-02-28 is 59 and
/// 1900-03-01 is 61.
pub fn excel_serial(dt: &NaiveDateTime) -> Option<f64> {
    let first = NaiveDate::from_ymd_opt(1900, 1, 1)?.and_hms_opt(0, 0, 0)?;
    let march = NaiveDate::from_ymd_opt(1900, 3, 1)?.and_hms_opt(0, 0, 0)?;
    if *dt < first {
        return None;
    }
    let epoch = if *dt < march {
        NaiveDate::from_ymd_opt(1899, 12, 31)?
    } else {
        NaiveDate::from_ymd_opt(1899, 12, 30)?
    };
    let elapsed = *dt - epoch.and_hms_opt(0, 0, 0)?;
    Some(elapsed.num_milliseconds() as f64 / 86_400_000.0)
}

/// Deduplicated fonts, fills, number formats and cell formats.
struct StyleTable {
    num_fmts: Vec<String>,
    fills: Vec<String>,
    xfs: Vec<CellStyle>,
    index: HashMap<CellStyle, usize>,
}

impl StyleTable {
    fn collect(sheets: &[Worksheet]) -> Self {
        let mut table = StyleTable {
            num_fmts: Vec::new(),
            fills: Vec::new(),
            xfs: vec![CellStyle::default()],
            index: HashMap::from([(CellStyle::default(), 0)]),
        };
        for (_, cell) in sheets.iter().flat_map(|s| s.cells()) {
            table.register(&cell.style);
        }
        table
    }

    fn register(&mut self, style: &CellStyle) {
        if self.index.contains_key(style) {
            return;
        }
        if let Some(fmt) = &style.number_format {
            if !self.num_fmts.contains(fmt) {
                self.num_fmts.push(fmt.clone());
            }
        }
        if let Some(fill) = &style.fill {
            if !self.fills.contains(fill) {
                self.fills.push(fill.clone());
            }
        }
        self.index.insert(style.clone(), self.xfs.len());
        self.xfs.push(style.clone());
    }

    fn index_of(&self, style: &CellStyle) -> usize {
        self.index.get(style).copied().unwrap_or(0)
    }

    fn num_fmt_id(&self, style: &CellStyle) -> u32 {
        style
            .number_format
            .as_ref()
            .and_then(|f| self.num_fmts.iter().position(|n| n == f))
            .map_or(0, |i| FIRST_CUSTOM_NUM_FMT + i as u32)
    }

    /// Ids 0 and 1 are the reserved `none` and `gray125` fills.
    fn fill_id(&self, style: &CellStyle) -> usize {
        style
            .fill
            .as_ref()
            .and_then(|f| self.fills.iter().position(|n| n == f))
            .map_or(0, |i| i + 2)
    }

    fn to_xml(&self) -> Result<Vec<u8>> {
        let mut xml = XmlPart::new()?;
        xml.start("styleSheet", &[("xmlns", NS_SPREADSHEET)])?;

        if !self.num_fmts.is_empty() {
            let count = self.num_fmts.len().to_string();
            xml.start("numFmts", &[("count", count.as_str())])?;
            for (i, code) in self.num_fmts.iter().enumerate() {
                let id = (FIRST_CUSTOM_NUM_FMT + i as u32).to_string();
                xml.empty(
                    "numFmt",
                    &[("numFmtId", id.as_str()), ("formatCode", code.as_str())],
                )?;
            }
            xml.end("numFmts")?;
        }

        xml.start("fonts", &[("count", "2")])?;
        for bold in [false, true] {
            xml.start("font", &[])?;
            if bold {
                xml.empty("b", &[])?;
            }
            xml.empty("sz", &[("val", "11")])?;
            xml.empty("name", &[("val", "Calibri")])?;
            xml.end("font")?;
        }
        xml.end("fonts")?;

        let fill_count = (self.fills.len() + 2).to_string();
        xml.start("fills", &[("count", fill_count.as_str())])?;
        for pattern in ["none", "gray125"] {
            xml.start("fill", &[])?;
            xml.empty("patternFill", &[("patternType", pattern)])?;
            xml.end("fill")?;
        }
        for rgb in &self.fills {
            xml.start("fill", &[])?;
            xml.start("patternFill", &[("patternType", "solid")])?;
            xml.empty("fgColor", &[("rgb", rgb.as_str())])?;
            xml.empty("bgColor", &[("indexed", "64")])?;
            xml.end("patternFill")?;
            xml.end("fill")?;
        }
        xml.end("fills")?;

        xml.start("borders", &[("count", "1")])?;
        xml.start("border", &[])?;
        for side in ["left", "right", "top", "bottom", "diagonal"] {
            xml.empty(side, &[])?;
        }
        xml.end("border")?;
        xml.end("borders")?;

        xml.start("cellStyleXfs", &[("count", "1")])?;
        xml.empty(
            "xf",
            &[("numFmtId", "0"), ("fontId", "0"), ("fillId", "0"), ("borderId", "0")],
        )?;
        xml.end("cellStyleXfs")?;

        let xf_count = self.xfs.len().to_string();
        xml.start("cellXfs", &[("count", xf_count.as_str())])?;
        for style in &self.xfs {
            let num_fmt = self.num_fmt_id(style).to_string();
            let font = if style.bold { "1" } else { "0" };
            let fill = self.fill_id(style).to_string();
            let mut attrs = vec![
                ("numFmtId", num_fmt.as_str()),
                ("fontId", font),
                ("fillId", fill.as_str()),
                ("borderId", "0"),
                ("xfId", "0"),
            ];
            if style.number_format.is_some() {
                attrs.push(("applyNumberFormat", "1"));
            }
            if style.bold {
                attrs.push(("applyFont", "1"));
            }
            if style.fill.is_some() {
                attrs.push(("applyFill", "1"));
            }
            xml.empty("xf", &attrs)?;
        }
        xml.end("cellXfs")?;

        xml.start("cellStyles", &[("count", "1")])?;
        xml.empty(
            "cellStyle",
            &[("name", "Normal"), ("xfId", "0"), ("builtinId", "0")],
        )?;
        xml.end("cellStyles")?;

        xml.end("styleSheet")?;
        Ok(xml.into_bytes())
    }
}
