//! Sample Handlebars templates with matching models, for demos and tests.
//!
//! Each template sticks to the markup the PDF engine understands and renders
//! unchanged through the DOCX converter.

use serde_json::{json, Value};

/// Invoice with a line-item table and a computed total.
pub fn invoice_template() -> &'static str {
    r##"<html>
<head><title>Invoice {{number}}</title></head>
<body>
    <h1 style="color: #1a365d">Invoice {{number}}</h1>
    <p><b>From:</b> {{seller}}<br><b>To:</b> {{buyer}}</p>
    <table>
        <thead>
            <tr><th>Item</th><th>Qty</th><th>Price</th><th>Total</th></tr>
        </thead>
        <tbody>
        {{#each items}}
            <tr>
                <td>{{name}}</td>
                <td style="text-align: right">{{qty}}</td>
                <td style="text-align: right">{{formatNumber price 2}}</td>
                <td style="text-align: right">{{formatNumber total 2}}</td>
            </tr>
        {{/each}}
        </tbody>
    </table>
    <p style="text-align: right"><strong>Total due: {{formatNumber total 2}}</strong></p>
    <hr>
    <p style="font-size: 9pt; color: #666666">Payment within {{terms_days}} days.</p>
</body>
</html>"##
}

/// Model for [`invoice_template`].
pub fn invoice_model() -> Value {
    json!({
        "number": "2024-001",
        "seller": "Acme Corp",
        "buyer": "Client Inc",
        "terms_days": 30,
        "items": [
            { "name": "Web Development", "qty": 40, "price": 150.0, "total": 6000.0 },
            { "name": "Design Services", "qty": 20, "price": 125.0, "total": 2500.0 },
            { "name": "Hosting (Annual)", "qty": 1, "price": 500.0, "total": 500.0 }
        ],
        "total": 9000.0
    })
}

/// Status report with sections, lists and an optional appendix on its own page.
pub fn status_report_template() -> &'static str {
    r##"<html>
<head><title>{{title}}</title><style>body { margin: 0 }</style></head>
<body>
    <h1>{{title}}</h1>
    <p>Prepared by <em>{{author}}</em> for the period ending {{period_end}}.</p>
    {{#each sections}}
    <h2>{{heading}}</h2>
    <p>{{summary}}</p>
    {{#if points}}
    <ul>
        {{#each points}}<li>{{this}}</li>{{/each}}
    </ul>
    {{/if}}
    {{/each}}
    <h3>Next steps</h3>
    <ol>
        {{#each next_steps}}<li>{{this}}</li>{{/each}}
    </ol>
    {{#if appendix}}
    <div style="page-break-before: always">
        <h2>Appendix</h2>
        <p>{{appendix}}</p>
    </div>
    {{/if}}
</body>
</html>"##
}

/// Model for [`status_report_template`].
pub fn status_report_model() -> Value {
    json!({
        "title": "Quarterly Status",
        "author": "Operations",
        "period_end": "30.09.2024",
        "sections": [
            {
                "heading": "Delivery",
                "summary": "All milestones for the quarter shipped on schedule.",
                "points": ["Billing export", "Audit log", "Single sign-on"]
            },
            {
                "heading": "Risks",
                "summary": "Hiring for the platform team is behind plan."
            }
        ],
        "next_steps": ["Close open hiring loops", "Plan Q4 roadmap"],
        "appendix": "Detailed burn-down figures are available on request."
    })
}

/// The smallest useful template.
pub fn minimal_template() -> &'static str {
    "<p>Hello, {{name}}!</p>"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{HandlebarsRenderer, TemplateRenderer};

    #[test]
    fn samples_render_with_their_models() {
        let renderer = HandlebarsRenderer::default();
        let invoice = renderer.render(invoice_template(), &invoice_model()).unwrap();
        assert!(invoice.contains("Invoice 2024-001"));
        assert!(invoice.contains("6000.00"));
        assert!(invoice.contains("Hosting (Annual)"));

        let report = renderer
            .render(status_report_template(), &status_report_model())
            .unwrap();
        assert!(report.contains("<li>Audit log</li>"));
        assert!(report.contains("page-break-before"));

        let minimal = renderer
            .render(minimal_template(), &json!({ "name": "Ada" }))
            .unwrap();
        assert_eq!(minimal, "<p>Hello, Ada!</p>");
    }

    #[test]
    fn status_report_lays_out_on_two_pages() {
        let renderer = HandlebarsRenderer::default();
        let markup = renderer
            .render(status_report_template(), &status_report_model())
            .unwrap();
        let layout =
            crate::pdf::layout_markup(&markup, &crate::options::ReportOptions::default()).unwrap();
        assert_eq!(layout.page_count(), 2);
        assert_eq!(layout.title.as_deref(), Some("Quarterly Status"));
    }
}
