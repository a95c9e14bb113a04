//! PDF output: HTML subset → DOM → styled flow layout → `printpdf` pages.

pub mod dom;
pub mod flow;
pub mod images;
pub mod layout;
pub mod render;
pub mod style;

use crate::error::Result;
use crate::generator::{ConversionContext, DocumentConverter, DocumentFormat};
use crate::options::ReportOptions;

pub use flow::{layout_document, PageGeometry};
pub use layout::{DocumentLayout, LayoutItem, PageLayout};
pub use render::{apply_metadata, render_pdf};

/// Parse and lay out `markup` on pages described by `options`, without
/// painting. Useful for inspecting pagination.
pub fn layout_markup(markup: &str, options: &ReportOptions) -> Result<DocumentLayout> {
    let nodes = dom::parse_html(markup);
    log::debug!("Parsed {} top-level node(s)", nodes.len());
    layout_document(&nodes, &PageGeometry::from_options(options))
}

/// Emits PDF documents with the builtin Helvetica family.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfConverter;

impl PdfConverter {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentConverter for PdfConverter {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Pdf
    }

    fn convert(&self, markup: &str, ctx: &ConversionContext<'_>) -> Result<Vec<u8>> {
        let layout = layout_markup(markup, ctx.options)?;
        let metadata = ctx.metadata.filter(|m| ctx.advanced && !m.is_empty());
        Ok(render_pdf(&layout, metadata))
    }
}
