//! # report_forge – template- and data-driven report generation
//!
//! Two generation paths share one set of page options:
//!
//! 1. **Template** – a Handlebars template plus a serializable model is
//!    rendered to HTML, then converted by a [`DocumentConverter`]:
//!    - PDF: the markup is parsed ([`pdf::dom`]), styled ([`pdf::style`]),
//!      flowed onto pages ([`pdf::flow`]) and painted with printpdf
//!      ([`pdf::render`]).
//!    - DOCX: the markup is packaged as an HTML import chunk ([`word`]).
//! 2. **Data** – record collections are written straight to an XLSX
//!    workbook ([`tabular`]), either as text (typed mode) or with per-value
//!    coercion to numbers and dates (dynamic mode).
//!
//! [`ReportFactory`] hands out generators for each format.

pub mod error;
pub mod factory;
pub mod generator;
mod ooxml;
pub mod options;
pub mod pdf;
pub mod tabular;
pub mod template;
pub mod templates;
pub mod word;

#[cfg(feature = "async")]
pub mod asynchronous;

pub use error::{Error, Result};
pub use factory::ReportFactory;
pub use generator::{
    write_output, ConversionContext, DocumentConverter, DocumentFormat, TemplateGenerator,
};
pub use options::{
    derive_size, DocumentMetadata, PageDimensions, PageMargins, PageOrientation, PageSize,
    ReportOptions,
};
pub use pdf::PdfConverter;
pub use tabular::{FieldValue, Record, RecordAlignment, TabularGenerator, Workbook, Worksheet};
pub use template::{HandlebarsRenderer, TemplateRenderer};
pub use word::WordConverter;
