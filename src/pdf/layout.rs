//! Page layout – the frozen intermediate representation between the flow
//! engine and the PDF renderer. Every item is positioned in points from the
//! page's top-left corner.

use serde::{Deserialize, Serialize};

use super::style::Rgb;
use crate::error::{Error, Result};

/// A complete paginated document ready for rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentLayout {
    /// Text of the markup's `<title>`, if any.
    #[serde(default)]
    pub title: Option<String>,
    pub page_width_pt: f32,
    pub page_height_pt: f32,
    pub pages: Vec<PageLayout>,
}

/// One page of content, in paint order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PageLayout {
    pub items: Vec<LayoutItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayoutItem {
    /// A run of text on one line; `y` is the baseline.
    Text {
        x: f32,
        y: f32,
        text: String,
        font_size: f32,
        bold: bool,
        italic: bool,
        underline: bool,
        width: f32,
        color: Rgb,
    },
    Rect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        fill: Option<Rgb>,
        stroke: Option<Rgb>,
    },
    Rule {
        x1: f32,
        x2: f32,
        y: f32,
        thickness: f32,
        color: Rgb,
    },
    Image {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        src: String,
    },
}

impl DocumentLayout {
    pub fn new(page_width_pt: f32, page_height_pt: f32) -> Self {
        Self {
            title: None,
            page_width_pt,
            page_height_pt,
            pages: Vec::new(),
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// All text on all pages, one entry per item.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.pages.iter().flat_map(|p| p.items.iter()).filter_map(|item| match item {
            LayoutItem::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }

    /// Serialise to pretty JSON for inspection.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::Conversion(format!("layout serialization failed: {e}")))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Argument(format!("invalid layout: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trip_keeps_items() {
        let mut layout = DocumentLayout::new(595.0, 842.0);
        layout.pages.push(PageLayout {
            items: vec![LayoutItem::Rule {
                x1: 10.0,
                x2: 20.0,
                y: 5.0,
                thickness: 0.5,
                color: [0.0, 0.0, 0.0],
            }],
        });
        let json = layout.to_json().unwrap();
        assert!(json.contains("\"kind\": \"rule\""));
        assert_eq!(DocumentLayout::from_json(&json).unwrap(), layout);
    }

    #[test]
    fn malformed_json_is_argument_error() {
        assert!(DocumentLayout::from_json("{").unwrap_err().is_argument_error());
    }
}
