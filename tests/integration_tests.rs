//! Integration tests for report_forge.
//!
//! These tests validate:
//! - Template → PDF / DOCX generation through the factory
//! - Spreadsheets read back with calamine (typed and dynamic modes)
//! - Argument errors are raised before any file is touched
//! - Saved files are byte-identical to generated buffers
//! - Page setup and metadata land in the DOCX package

use std::io::{Cursor, Read};

use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::json;
use sha2::{Digest, Sha256};

use report_forge::tabular::{DEFAULT_SHEET_NAME, MAX_COLUMNS};
use report_forge::{
    templates, DocumentMetadata, Error, PageMargins, PageSize, Record, RecordAlignment,
    ReportFactory, ReportOptions,
};

// =====================================================================
// Helpers
// =====================================================================

fn assert_valid_pdf(bytes: &[u8]) {
    assert!(bytes.len() > 100, "PDF too small: {} bytes", bytes.len());
    assert_eq!(&bytes[0..5], b"%PDF-", "Missing PDF header");
}

fn read_sheet(bytes: Vec<u8>, name: &str) -> Vec<Vec<Data>> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes)).unwrap();
    let range = workbook.worksheet_range(name).unwrap();
    range.rows().map(|row| row.to_vec()).collect()
}

fn zip_entry(bytes: &[u8], name: &str) -> Option<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut file = archive.by_name(name).ok()?;
    let mut text = String::new();
    file.read_to_string(&mut text).unwrap();
    Some(text)
}

fn digest(bytes: &[u8]) -> Vec<u8> {
    Sha256::digest(bytes).to_vec()
}

fn is_numeric(cell: &Data) -> bool {
    matches!(cell, Data::Float(_) | Data::Int(_))
}

fn number(cell: &Data) -> f64 {
    match cell {
        Data::Float(f) => *f,
        Data::Int(i) => *i as f64,
        other => panic!("expected a number, got {other:?}"),
    }
}

#[derive(Serialize)]
struct Sale {
    region: String,
    units: u32,
    price: f64,
    booked: NaiveDate,
}

fn sales() -> Vec<Sale> {
    vec![
        Sale {
            region: "North".into(),
            units: 12,
            price: 9.5,
            booked: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        },
        Sale {
            region: "South".into(),
            units: 7,
            price: 11.25,
            booked: NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(),
        },
    ]
}

// =====================================================================
// Template generation
// =====================================================================

#[test]
fn pdf_from_sample_templates() {
    let pdf = ReportFactory::default().create_pdf(None);
    assert_valid_pdf(
        &pdf.generate(templates::invoice_template(), &templates::invoice_model())
            .unwrap(),
    );
    assert_valid_pdf(
        &pdf.generate(
            templates::status_report_template(),
            &templates::status_report_model(),
        )
        .unwrap(),
    );
}

#[test]
fn pdf_with_metadata_and_landscape_letter() {
    let options = ReportOptions::new()
        .with_page_size(PageSize::Letter)
        .landscape();
    let meta = DocumentMetadata::new()
        .with_title("Invoice")
        .with_keywords("billing, q3");
    let bytes = ReportFactory::default()
        .create_pdf(Some(options))
        .generate_with_metadata(
            templates::invoice_template(),
            &templates::invoice_model(),
            Some(&meta),
        )
        .unwrap();
    assert_valid_pdf(&bytes);
}

#[test]
fn docx_embeds_rendered_markup() {
    let bytes = ReportFactory::default()
        .create_word(None)
        .generate(templates::minimal_template(), &json!({ "name": "Ada" }))
        .unwrap();
    assert_eq!(&bytes[0..2], b"PK");
    let chunk = zip_entry(&bytes, "word/afchunk1.html").unwrap();
    assert_eq!(chunk, "<p>Hello, Ada!</p>");
    let document = zip_entry(&bytes, "word/document.xml").unwrap();
    assert!(document.contains("w:altChunk"));
    assert!(!document.contains("w:sectPr"));
}

#[test]
fn docx_section_properties_in_twips() {
    let options = ReportOptions::new().landscape().with_margins(PageMargins {
        top: 10.0,
        right: 20.0,
        bottom: 30.0,
        left: 40.0,
    });
    let bytes = ReportFactory::default()
        .create_word(Some(options))
        .generate_with_metadata(templates::minimal_template(), &json!({ "name": "x" }), None)
        .unwrap();
    let document = zip_entry(&bytes, "word/document.xml").unwrap();
    assert!(document.contains(r#"w:w="16839""#));
    assert!(document.contains(r#"w:h="11907""#));
    assert!(document.contains(r#"w:orient="landscape""#));
    assert!(document.contains(r#"w:top="567""#));
    assert!(document.contains(r#"w:right="1134""#));
    assert!(document.contains(r#"w:bottom="1701""#));
    assert!(document.contains(r#"w:left="2268""#));
    assert!(zip_entry(&bytes, "docProps/core.xml").is_none());
}

#[test]
fn docx_metadata_fields_are_independent() {
    let word = ReportFactory::default().create_word(None);
    let meta = DocumentMetadata::new().with_author("Ada Lovelace");
    let bytes = word
        .generate_with_metadata(templates::minimal_template(), &json!({ "name": "x" }), Some(&meta))
        .unwrap();
    let core = zip_entry(&bytes, "docProps/core.xml").unwrap();
    assert!(core.contains("<dc:creator>Ada Lovelace</dc:creator>"));
    assert!(!core.contains("dc:title"));
    assert!(!core.contains("dc:subject"));
    assert!(!core.contains("cp:keywords"));
}

#[test]
fn docx_metadata_drops_control_characters() {
    let word = ReportFactory::default().create_word(None);
    let meta = DocumentMetadata::new().with_title("Q3\u{1}\u{8} report");
    let bytes = word
        .generate_with_metadata(templates::minimal_template(), &json!({ "name": "x" }), Some(&meta))
        .unwrap();
    let core = zip_entry(&bytes, "docProps/core.xml").unwrap();
    assert!(!core.contains('\u{1}'));
    assert!(core.contains("<dc:title>Q3 report</dc:title>"));
}

#[test]
fn argument_errors_precede_file_io() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("nested").join("report.pdf");
    let pdf = ReportFactory::default().create_pdf(None);

    let err = pdf.save("   ", &json!({ "a": 1 }), &out).unwrap_err();
    assert!(matches!(err, Error::Template(_)));
    let err = pdf
        .save(templates::minimal_template(), &serde_json::Value::Null, &out)
        .unwrap_err();
    assert!(matches!(err, Error::Model(_)));

    let docx_out = dir.path().join("nested").join("report.docx");
    let skewed = ReportOptions::new().with_margins(PageMargins {
        left: -20.0,
        ..PageMargins::default()
    });
    let err = ReportFactory::default()
        .create_word(Some(skewed))
        .save_with_metadata(templates::minimal_template(), &json!({ "name": "x" }), None, &docx_out)
        .unwrap_err();
    assert!(err.is_argument_error());

    assert!(!out.exists());
    assert!(!dir.path().join("nested").exists());
}

#[test]
fn render_errors_carry_diagnostics() {
    let err = ReportFactory::default()
        .create_word(None)
        .generate("{{#each items}}unclosed", &json!({ "items": [] }))
        .unwrap_err();
    match err {
        Error::Render { diagnostics } => assert!(!diagnostics.is_empty()),
        other => panic!("expected a render error, got {other:?}"),
    }
}

#[test]
fn saved_documents_match_generated_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("a").join("b").join("letter.docx");
    let word = ReportFactory::default().create_word(None);
    let model = json!({ "name": "Ada" });

    let generated = word.generate(templates::minimal_template(), &model).unwrap();
    word.save(templates::minimal_template(), &model, &out).unwrap();
    let saved = std::fs::read(&out).unwrap();
    assert_eq!(digest(&saved), digest(&generated));

    let pdf_out = dir.path().join("a").join("invoice.pdf");
    let pdf = ReportFactory::default().create_pdf(None);
    let invoice = templates::invoice_model();
    let generated = pdf.generate(templates::invoice_template(), &invoice).unwrap();
    pdf.save(templates::invoice_template(), &invoice, &pdf_out).unwrap();
    let saved = std::fs::read(&pdf_out).unwrap();
    assert_valid_pdf(&saved);
    assert_eq!(digest(&saved), digest(&generated));
}

#[test]
fn templates_load_from_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hello.hbs");
    std::fs::write(&path, templates::minimal_template()).unwrap();
    let bytes = ReportFactory::default()
        .create_word(None)
        .generate_from_file(&path, &json!({ "name": "File" }))
        .unwrap();
    assert_eq!(
        zip_entry(&bytes, "word/afchunk1.html").unwrap(),
        "<p>Hello, File!</p>"
    );

    let missing = ReportFactory::default()
        .create_word(None)
        .generate_from_file(dir.path().join("nope.hbs"), &json!({}));
    assert!(matches!(missing, Err(Error::Io(_))));
}

// =====================================================================
// Spreadsheets
// =====================================================================

#[test]
fn typed_mode_writes_header_and_text() {
    let bytes = ReportFactory::default()
        .create_excel(None)
        .generate_table(&sales(), "Sales")
        .unwrap();
    let rows = read_sheet(bytes, "Sales");
    assert_eq!(rows.len(), 3);
    assert_eq!(
        rows[0],
        vec![
            Data::String("region".into()),
            Data::String("units".into()),
            Data::String("price".into()),
            Data::String("booked".into()),
        ]
    );
    assert_eq!(rows[1][1], Data::String("12".into()));
    assert_eq!(rows[1][2], Data::String("9.5".into()));
    assert_eq!(rows[1][3], Data::String("2024-03-01".into()));
}

#[test]
fn typed_mode_empty_input_has_no_header() {
    let bytes = ReportFactory::default()
        .create_excel(None)
        .generate_table::<Sale>(&[], DEFAULT_SHEET_NAME)
        .unwrap();
    let rows = read_sheet(bytes, DEFAULT_SHEET_NAME);
    assert!(rows.iter().all(|r| r.iter().all(|c| *c == Data::Empty)));
}

#[test]
fn dynamic_mode_aligns_by_position() {
    let data = vec![
        Record::new().field("A", 1).field("B", 2),
        Record::new().field("B", 3).field("A", 4),
    ];
    let bytes = ReportFactory::default()
        .create_excel(None)
        .generate_from_dynamic(&data, DEFAULT_SHEET_NAME)
        .unwrap();
    let rows = read_sheet(bytes, DEFAULT_SHEET_NAME);
    assert_eq!(rows[0], vec![Data::String("A".into()), Data::String("B".into())]);
    assert_eq!([number(&rows[1][0]), number(&rows[2][0])], [1.0, 3.0]);
    assert_eq!([number(&rows[1][1]), number(&rows[2][1])], [2.0, 4.0]);
}

#[test]
fn dynamic_mode_by_name_alignment() {
    let data = vec![
        Record::new().field("A", 1).field("B", 2),
        Record::new().field("B", 3).field("A", 4),
    ];
    let bytes = ReportFactory::default()
        .create_excel(None)
        .with_alignment(RecordAlignment::ByName)
        .generate_from_dynamic(&data, DEFAULT_SHEET_NAME)
        .unwrap();
    let rows = read_sheet(bytes, DEFAULT_SHEET_NAME);
    assert_eq!([number(&rows[1][0]), number(&rows[2][0])], [1.0, 4.0]);
    assert_eq!([number(&rows[1][1]), number(&rows[2][1])], [2.0, 3.0]);
}

#[test]
fn dynamic_mode_strict_alignment_rejects_reordered_records() {
    let data = vec![
        Record::new().field("A", 1).field("B", 2),
        Record::new().field("B", 3).field("A", 4),
    ];
    let err = ReportFactory::default()
        .create_excel(None)
        .with_alignment(RecordAlignment::Strict)
        .generate_from_dynamic(&data, DEFAULT_SHEET_NAME)
        .unwrap_err();
    assert!(matches!(err, Error::ShapeMismatch { record: 1, .. }));
}

#[test]
fn dynamic_mode_coerces_values() {
    let data = vec![Record::new()
        .field("int", 42)
        .field("float", 42.5)
        .field("when", NaiveDate::from_ymd_opt(2024, 1, 5).unwrap())
        .field("name", "widget")
        .field("missing", Option::<i32>::None)
        .field("flag", true)];
    let bytes = ReportFactory::default()
        .create_excel(None)
        .generate_from_dynamic(&data, DEFAULT_SHEET_NAME)
        .unwrap();
    let rows = read_sheet(bytes, DEFAULT_SHEET_NAME);
    let row = &rows[1];
    assert!(is_numeric(&row[0]));
    assert!(is_numeric(&row[1]));
    assert_eq!(number(&row[0]), 42.0);
    assert_eq!(number(&row[1]), 42.5);
    assert!(matches!(row[2], Data::DateTime(_) | Data::Float(_)));
    assert_eq!(row[3], Data::String("widget".into()));
    assert_eq!(row[4], Data::Empty);
    assert_eq!(row[5], Data::String("true".into()));
}

#[test]
fn dynamic_records_from_json() {
    let json = json!([
        { "id": 1, "label": "one", "score": 0.5 },
        { "id": 2, "label": "two", "score": null }
    ]);
    let records: Vec<Record> = json
        .as_array()
        .unwrap()
        .iter()
        .cloned()
        .map(Record::try_from)
        .collect::<Result<_, _>>()
        .unwrap();
    let bytes = ReportFactory::default()
        .create_excel(None)
        .generate_from_dynamic(&records, "Scores")
        .unwrap();
    let rows = read_sheet(bytes, "Scores");
    assert_eq!(rows.len(), 3);
    assert_eq!(number(&rows[2][0]), 2.0);
    assert_eq!(rows[2][2], Data::Empty);
}

#[test]
fn invalid_sheet_names_are_argument_errors() {
    let excel = ReportFactory::default().create_excel(None);
    for name in [
        "",
        "a/b",
        "this name is definitely longer than 31",
        "line\nbreak",
        "nul\u{0}",
        "'Sales",
        "Sales'",
    ] {
        let err = excel.generate_table(&sales(), name).unwrap_err();
        assert!(err.is_argument_error(), "{name:?} should be rejected");
    }
}

#[test]
fn control_characters_are_escaped_in_cells() {
    let records = vec![
        Record::new().field("Note", "plain"),
        Record::new().field("Note", "a\u{1}b"),
    ];
    let bytes = ReportFactory::default()
        .create_excel(None)
        .generate_from_dynamic(&records, DEFAULT_SHEET_NAME)
        .unwrap();
    let sheet = zip_entry(&bytes, "xl/worksheets/sheet1.xml").unwrap();
    assert!(!sheet.contains('\u{1}'));
    assert!(sheet.contains("a_x0001_b"));

    let rows = read_sheet(bytes, DEFAULT_SHEET_NAME);
    assert_eq!(rows[2][0], Data::String("a_x0001_b".into()));
}

#[test]
fn sheet_column_limit_is_an_argument_error() {
    let row = |columns: u32| -> serde_json::Value {
        (0..columns)
            .map(|c| (format!("c{c}"), json!(c)))
            .collect::<serde_json::Map<_, _>>()
            .into()
    };
    let excel = ReportFactory::default().create_excel(None);

    let at_limit = excel.generate_table(&[row(MAX_COLUMNS)], "Wide").unwrap();
    let rows = read_sheet(at_limit, "Wide");
    assert_eq!(rows[0].len(), MAX_COLUMNS as usize);

    let err = excel
        .generate_table(&[row(MAX_COLUMNS + 1)], "Wide")
        .unwrap_err();
    assert!(err.is_argument_error());
}

#[test]
fn saved_xlsx_matches_generated_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out").join("sales.xlsx");
    let excel = ReportFactory::default().create_excel(None);

    let generated = excel.generate_table(&sales(), "Sales").unwrap();
    excel.save_table(&sales(), "Sales", &out).unwrap();
    assert_eq!(digest(&std::fs::read(&out).unwrap()), digest(&generated));
}

#[test]
fn xlsx_carries_print_setup() {
    let options = ReportOptions::new()
        .with_page_size(PageSize::Legal)
        .landscape();
    let bytes = ReportFactory::default()
        .create_excel(Some(options))
        .generate_table(&sales(), DEFAULT_SHEET_NAME)
        .unwrap();
    let sheet = zip_entry(&bytes, "xl/worksheets/sheet1.xml").unwrap();
    assert!(sheet.contains(r#"paperSize="5""#));
    assert!(sheet.contains(r#"orientation="landscape""#));
}

#[test]
#[allow(deprecated)]
fn custom_workbook_callback() {
    let bytes = ReportFactory::default()
        .create_excel(None)
        .generate_custom(|wb| {
            let sheet = wb.add_sheet("Manual")?;
            sheet.set_value(0, 0, "hand written");
            sheet.set_value(1, 0, 7.0);
            Ok(())
        })
        .unwrap();
    let rows = read_sheet(bytes, "Manual");
    assert_eq!(rows[0][0], Data::String("hand written".into()));
    assert_eq!(number(&rows[1][0]), 7.0);
}
