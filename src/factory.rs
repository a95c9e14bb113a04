//! Generator factory – hands out fresh generators that share one template
//! renderer.

use std::sync::Arc;

use crate::generator::TemplateGenerator;
use crate::options::ReportOptions;
use crate::pdf::PdfConverter;
use crate::tabular::TabularGenerator;
use crate::template::{HandlebarsRenderer, TemplateRenderer};
use crate::word::WordConverter;

/// Creates generators for each output format.
#[derive(Clone)]
pub struct ReportFactory {
    renderer: Arc<dyn TemplateRenderer>,
}

impl ReportFactory {
    pub fn new(renderer: Arc<dyn TemplateRenderer>) -> Self {
        Self { renderer }
    }

    /// A PDF generator. `None` selects default options.
    pub fn create_pdf(&self, options: Option<ReportOptions>) -> TemplateGenerator {
        TemplateGenerator::new(
            Arc::clone(&self.renderer),
            Arc::new(PdfConverter::new()),
            options.unwrap_or_default(),
        )
    }

    /// A DOCX generator. `None` selects default options.
    pub fn create_word(&self, options: Option<ReportOptions>) -> TemplateGenerator {
        TemplateGenerator::new(
            Arc::clone(&self.renderer),
            Arc::new(WordConverter::new()),
            options.unwrap_or_default(),
        )
    }

    /// An XLSX generator. `None` selects default options.
    pub fn create_excel(&self, options: Option<ReportOptions>) -> TabularGenerator {
        TabularGenerator::new(options.unwrap_or_default())
    }
}

impl Default for ReportFactory {
    fn default() -> Self {
        Self::new(Arc::new(HandlebarsRenderer::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::DocumentFormat;
    use crate::options::PageSize;

    #[test]
    fn each_generator_reports_its_format() {
        let factory = ReportFactory::default();
        assert_eq!(factory.create_pdf(None).format(), DocumentFormat::Pdf);
        assert_eq!(factory.create_word(None).format(), DocumentFormat::Word);
        assert_eq!(factory.create_excel(None).format(), DocumentFormat::Excel);
    }

    #[test]
    fn options_are_bound_per_generator() {
        let factory = ReportFactory::default();
        let letter = factory.create_word(Some(ReportOptions::new().with_page_size(PageSize::Letter)));
        let default = factory.create_word(None);
        assert_eq!(letter.options().page_size, PageSize::Letter);
        assert_eq!(default.options(), &ReportOptions::default());
    }

    #[test]
    fn custom_renderers_are_shared() {
        struct Upper;
        impl TemplateRenderer for Upper {
            fn render(&self, template: &str, _: &serde_json::Value) -> crate::Result<String> {
                Ok(template.to_uppercase())
            }
        }
        let factory = ReportFactory::new(Arc::new(Upper));
        let markup = factory
            .create_pdf(None)
            .render("<p>hi</p>", &serde_json::json!({}))
            .unwrap();
        assert_eq!(markup, "<P>HI</P>");
    }
}
