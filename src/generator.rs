//! Template-based generation – ties rendering and conversion together.
//!
//! A single [`TemplateGenerator`] drives every template format. The
//! format-specific step is a [`DocumentConverter`] strategy:
//!
//! 1. **Render** – template + model → markup ([`TemplateRenderer`])
//! 2. **Convert** – markup → document bytes ([`DocumentConverter`])
//! 3. **Persist** (optional) – bytes → file ([`write_output`])

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use crate::error::Result;
use crate::options::{DocumentMetadata, ReportOptions};
use crate::template::{check_template, to_model, TemplateRenderer};

/// Output format produced by a converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentFormat {
    Pdf,
    Word,
    Excel,
}

impl DocumentFormat {
    /// Conventional file extension.
    pub fn extension(self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Word => "docx",
            DocumentFormat::Excel => "xlsx",
        }
    }

    /// MIME type of the produced bytes.
    pub fn mime_type(self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "application/pdf",
            DocumentFormat::Word => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            DocumentFormat::Excel => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
        }
    }
}

/// Everything a converter may consult besides the markup itself.
#[derive(Debug, Clone, Copy)]
pub struct ConversionContext<'a> {
    pub options: &'a ReportOptions,
    /// Properties to apply; only honoured by the advanced variant.
    pub metadata: Option<&'a DocumentMetadata>,
    /// Selects the advanced variant (explicit page setup, metadata).
    pub advanced: bool,
}

impl<'a> ConversionContext<'a> {
    pub fn basic(options: &'a ReportOptions) -> Self {
        Self {
            options,
            metadata: None,
            advanced: false,
        }
    }

    pub fn advanced(options: &'a ReportOptions, metadata: Option<&'a DocumentMetadata>) -> Self {
        Self {
            options,
            metadata,
            advanced: true,
        }
    }
}

/// Converts rendered markup into a finished document.
pub trait DocumentConverter: Send + Sync {
    /// The format this converter emits.
    fn format(&self) -> DocumentFormat;

    /// Convert `markup` into document bytes.
    fn convert(&self, markup: &str, ctx: &ConversionContext<'_>) -> Result<Vec<u8>>;
}

/// Renders a template and converts the markup with a bound converter.
///
/// Cheap to clone; clones share the renderer and converter.
#[derive(Clone)]
pub struct TemplateGenerator {
    renderer: Arc<dyn TemplateRenderer>,
    converter: Arc<dyn DocumentConverter>,
    options: ReportOptions,
}

impl TemplateGenerator {
    pub fn new(
        renderer: Arc<dyn TemplateRenderer>,
        converter: Arc<dyn DocumentConverter>,
        options: ReportOptions,
    ) -> Self {
        Self {
            renderer,
            converter,
            options,
        }
    }

    /// The options this generator is bound to.
    pub fn options(&self) -> &ReportOptions {
        &self.options
    }

    /// The format this generator produces.
    pub fn format(&self) -> DocumentFormat {
        self.converter.format()
    }

    /// Render `template` with `model` and convert the result.
    pub fn generate<M: Serialize + ?Sized>(&self, template: &str, model: &M) -> Result<Vec<u8>> {
        let markup = self.render(template, model)?;
        self.converter
            .convert(&markup, &ConversionContext::basic(&self.options))
    }

    /// Advanced variant: explicit page setup and optional document metadata.
    pub fn generate_with_metadata<M: Serialize + ?Sized>(
        &self,
        template: &str,
        model: &M,
        metadata: Option<&DocumentMetadata>,
    ) -> Result<Vec<u8>> {
        let markup = self.render(template, model)?;
        self.converter
            .convert(&markup, &ConversionContext::advanced(&self.options, metadata))
    }

    /// Read the template from `template_path`, then [`generate`](Self::generate).
    pub fn generate_from_file<M: Serialize + ?Sized>(
        &self,
        template_path: impl AsRef<Path>,
        model: &M,
    ) -> Result<Vec<u8>> {
        let template = fs::read_to_string(template_path.as_ref())?;
        self.generate(&template, model)
    }

    /// Advanced variant of [`generate_from_file`](Self::generate_from_file).
    pub fn generate_from_file_with_metadata<M: Serialize + ?Sized>(
        &self,
        template_path: impl AsRef<Path>,
        model: &M,
        metadata: Option<&DocumentMetadata>,
    ) -> Result<Vec<u8>> {
        let template = fs::read_to_string(template_path.as_ref())?;
        self.generate_with_metadata(&template, model, metadata)
    }

    /// Generate and write the document to `output_path`, creating parent
    /// directories as needed.
    pub fn save<M: Serialize + ?Sized>(
        &self,
        template: &str,
        model: &M,
        output_path: impl AsRef<Path>,
    ) -> Result<()> {
        let bytes = self.generate(template, model)?;
        write_output(output_path.as_ref(), &bytes)
    }

    /// Advanced variant of [`save`](Self::save).
    pub fn save_with_metadata<M: Serialize + ?Sized>(
        &self,
        template: &str,
        model: &M,
        metadata: Option<&DocumentMetadata>,
        output_path: impl AsRef<Path>,
    ) -> Result<()> {
        let bytes = self.generate_with_metadata(template, model, metadata)?;
        write_output(output_path.as_ref(), &bytes)
    }

    /// Validate inputs and run the render step only.
    pub fn render<M: Serialize + ?Sized>(&self, template: &str, model: &M) -> Result<String> {
        check_template(template)?;
        let model = to_model(model)?;
        self.options.validate()?;
        let markup = self.renderer.render(template, &model)?;
        log::debug!(
            "Rendered {} bytes of markup for {:?}",
            markup.len(),
            self.converter.format()
        );
        Ok(markup)
    }

    pub(crate) fn converter(&self) -> Arc<dyn DocumentConverter> {
        Arc::clone(&self.converter)
    }
}

/// Write `bytes` to `path`, creating missing parent directories first.
///
/// The file handle is scoped to this call and flushed before returning; a
/// failure at any step leaves no handle open.
pub fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.flush()?;
    log::info!("Wrote '{}' ({} bytes)", path.display(), bytes.len());
    Ok(())
}
