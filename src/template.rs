//! Template rendering – binds a data model into template text and produces
//! the markup handed to the document converters.

use handlebars::{Context, Handlebars, Helper, HelperDef, HelperResult, Output, RenderContext};
use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};

/// Renders template text against a model into markup.
///
/// Implementations must be reentrant: one renderer is shared by every
/// generator a factory hands out and may be called from many threads.
pub trait TemplateRenderer: Send + Sync {
    /// Render `template` with `model` bound as the root context.
    fn render(&self, template: &str, model: &Value) -> Result<String>;
}

/// Convert any serializable model into the value a renderer binds.
///
/// A model that serializes to `null` is rejected.
pub fn to_model<M: Serialize + ?Sized>(model: &M) -> Result<Value> {
    let value = serde_json::to_value(model).map_err(|e| Error::Model(e.to_string()))?;
    if value.is_null() {
        return Err(Error::Model("model must not be null".to_string()));
    }
    Ok(value)
}

/// Reject blank template text before any rendering is attempted.
pub fn check_template(template: &str) -> Result<()> {
    if template.trim().is_empty() {
        return Err(Error::Template("template text is blank".to_string()));
    }
    Ok(())
}

/// Handlebars-backed renderer. HTML escaping is on, as templates produce HTML.
pub struct HandlebarsRenderer {
    registry: Handlebars<'static>,
}

/// Most decimals `formatNumber` prints.
const MAX_DECIMALS: u64 = 15;

fn format_number_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let value = h.param(0).and_then(|v| v.value().as_f64()).unwrap_or(0.0);
    let decimals = h
        .param(1)
        .and_then(|v| v.value().as_u64())
        .unwrap_or(2)
        .min(MAX_DECIMALS) as usize;
    out.write(&format!("{value:.decimals$}"))?;
    Ok(())
}

impl HandlebarsRenderer {
    pub fn new() -> Self {
        let mut registry = Handlebars::new();
        registry.register_helper("formatNumber", Box::new(format_number_helper));
        Self { registry }
    }

    /// Missing fields become render errors instead of empty output.
    pub fn with_strict_mode(mut self, strict: bool) -> Self {
        self.registry.set_strict_mode(strict);
        self
    }

    /// Register an additional helper under `name`.
    pub fn with_helper(
        mut self,
        name: &str,
        helper: Box<dyn HelperDef + Send + Sync + 'static>,
    ) -> Self {
        self.registry.register_helper(name, helper);
        self
    }
}

impl Default for HandlebarsRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateRenderer for HandlebarsRenderer {
    fn render(&self, template: &str, model: &Value) -> Result<String> {
        check_template(template)?;
        if model.is_null() {
            return Err(Error::Model("model must not be null".to_string()));
        }

        // Compile first so syntax problems surface with the parser's messages.
        handlebars::Template::compile(template).map_err(|e| Error::Render {
            diagnostics: diagnostics(&e),
        })?;

        self.registry
            .render_template(template, model)
            .map_err(|e| Error::Render {
                diagnostics: diagnostics(&e),
            })
    }
}

/// Flatten an error and its sources into distinct messages, outermost first.
fn diagnostics(err: &(dyn std::error::Error + 'static)) -> Vec<String> {
    let mut messages = vec![err.to_string()];
    let mut source = err.source();
    while let Some(inner) = source {
        let msg = inner.to_string();
        if !messages.contains(&msg) {
            messages.push(msg);
        }
        source = inner.source();
    }
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_model_fields() {
        let renderer = HandlebarsRenderer::new();
        let html = renderer
            .render("<h1>{{title}}</h1>", &json!({"title": "Q4 Report"}))
            .unwrap();
        assert_eq!(html, "<h1>Q4 Report</h1>");
    }

    #[test]
    fn escapes_html_in_values() {
        let renderer = HandlebarsRenderer::new();
        let html = renderer
            .render("<p>{{name}}</p>", &json!({"name": "<b>x</b>"}))
            .unwrap();
        assert!(!html.contains("<b>"));
    }

    #[test]
    fn blank_template_is_template_error() {
        let renderer = HandlebarsRenderer::new();
        let err = renderer.render("   ", &json!({})).unwrap_err();
        assert!(matches!(err, Error::Template(_)));
    }

    #[test]
    fn null_model_is_model_error() {
        let renderer = HandlebarsRenderer::new();
        let err = renderer.render("<p>hi</p>", &Value::Null).unwrap_err();
        assert!(matches!(err, Error::Model(_)));
        assert!(matches!(to_model(&Option::<u32>::None), Err(Error::Model(_))));
    }

    #[test]
    fn parse_failure_is_render_error() {
        let renderer = HandlebarsRenderer::new();
        let err = renderer.render("{{#each items}}<li>", &json!({"items": []})).unwrap_err();
        match err {
            Error::Render { diagnostics } => assert!(!diagnostics.is_empty()),
            other => panic!("expected render error, got {other:?}"),
        }
    }

    #[test]
    fn strict_mode_rejects_missing_fields() {
        let renderer = HandlebarsRenderer::new().with_strict_mode(true);
        let err = renderer.render("{{missing}}", &json!({})).unwrap_err();
        assert!(matches!(err, Error::Render { .. }));
    }

    #[test]
    fn format_number_helper_rounds() {
        let renderer = HandlebarsRenderer::new();
        let out = renderer
            .render("{{formatNumber total 2}}", &json!({"total": 9000.456}))
            .unwrap();
        assert_eq!(out, "9000.46");
    }

    #[test]
    fn format_number_caps_decimals() {
        let renderer = HandlebarsRenderer::new();
        let out = renderer
            .render("{{formatNumber n 18446744073709551615}}", &json!({"n": 0.5}))
            .unwrap();
        assert_eq!(out, format!("{:.15}", 0.5));
        let out = renderer
            .render("{{formatNumber n 0}}", &json!({"n": 2.4}))
            .unwrap();
        assert_eq!(out, "2");
    }

    #[test]
    fn renderer_is_shareable_across_threads() {
        let renderer = std::sync::Arc::new(HandlebarsRenderer::new());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let r = renderer.clone();
                std::thread::spawn(move || r.render("{{n}}", &json!({"n": i})).unwrap())
            })
            .collect();
        let outputs: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(outputs, vec!["0", "1", "2", "3"]);
    }
}
