//! Error types for report_forge.

use std::io;
use thiserror::Error;

/// Result type alias for report_forge operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while generating or persisting a report.
///
/// Argument-style errors (`Template`, `Model`, `Argument`) are raised before any
/// rendering or file I/O takes place.
#[derive(Error, Debug)]
pub enum Error {
    /// The template text is missing or blank.
    #[error("Template must not be empty: {0}")]
    Template(String),

    /// The model is null or cannot be bound to a template.
    #[error("Invalid model: {0}")]
    Model(String),

    /// Any other rejected input (sheet names, record shapes, ...).
    #[error("Invalid argument: {0}")]
    Argument(String),

    /// Template parsing or execution failed.
    #[error("Template render error: {}", .diagnostics.join(", "))]
    Render {
        /// Messages collected from the template engine, outermost first.
        diagnostics: Vec<String>,
    },

    /// The document or spreadsheet engine failed to produce output.
    #[error("Document conversion error: {0}")]
    Conversion(String),

    /// A dynamic record does not match the header derived from the first record.
    #[error("Record {record} does not match the header: expected [{}], found [{}]", .expected.join(", "), .found.join(", "))]
    ShapeMismatch {
        /// Zero-based index of the offending record.
        record: usize,
        /// Column names derived from the first record.
        expected: Vec<String>,
        /// Field names of the offending record.
        found: Vec<String>,
    },

    /// I/O error when reading templates or writing output files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// True for errors that reject the caller's input before any work is done.
    pub fn is_argument_error(&self) -> bool {
        matches!(
            self,
            Error::Template(_) | Error::Model(_) | Error::Argument(_)
        )
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(e) => Error::Io(e),
            other => Error::Conversion(format!("package write failed: {other}")),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Argument(format!("invalid JSON value: {err}"))
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::Conversion(format!("XML write failed: {err}"))
    }
}
