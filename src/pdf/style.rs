//! Style resolver – tag defaults plus the inline `style` attribute, flattened
//! into a [`ComputedStyle`] the flow engine consumes. Lengths are points.

use super::dom::{ElementNode, Tag};

/// RGB colour, components in 0.0 – 1.0.
pub type Rgb = [f32; 3];

pub const BLACK: Rgb = [0.0, 0.0, 0.0];
pub const HEADER_GRAY: Rgb = [0.93, 0.93, 0.93];
pub const RULE_GRAY: Rgb = [0.6, 0.6, 0.6];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

/// Fully resolved style for one element.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedStyle {
    pub font_size: f32,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub color: Rgb,
    pub background: Option<Rgb>,
    pub text_align: TextAlign,
    /// Multiple of the font size.
    pub line_height: f32,
    pub margin_top: f32,
    pub margin_bottom: f32,
    pub indent: f32,
    pub hidden: bool,
    pub page_break_before: bool,
    pub page_break_after: bool,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            font_size: 11.0,
            bold: false,
            italic: false,
            underline: false,
            color: BLACK,
            background: None,
            text_align: TextAlign::Left,
            line_height: 1.3,
            margin_top: 0.0,
            margin_bottom: 0.0,
            indent: 0.0,
            hidden: false,
            page_break_before: false,
            page_break_after: false,
        }
    }
}

/// Resolve the style for an element, inheriting text properties from its parent.
pub fn resolve_style(element: &ElementNode, parent: &ComputedStyle) -> ComputedStyle {
    let mut s = ComputedStyle {
        font_size: parent.font_size,
        bold: parent.bold,
        italic: parent.italic,
        underline: parent.underline,
        color: parent.color,
        text_align: parent.text_align,
        line_height: parent.line_height,
        ..ComputedStyle::default()
    };
    apply_tag_defaults(&mut s, &element.tag);
    if let Some(inline) = element.inline_style() {
        apply_inline_style(&mut s, inline);
    }
    s
}

fn apply_tag_defaults(s: &mut ComputedStyle, tag: &Tag) {
    let heading = |s: &mut ComputedStyle, size: f32| {
        s.font_size = size;
        s.bold = true;
        s.margin_top = size * 0.6;
        s.margin_bottom = size * 0.4;
    };
    match tag {
        Tag::H1 => heading(s, 22.0),
        Tag::H2 => heading(s, 18.0),
        Tag::H3 => heading(s, 15.0),
        Tag::H4 => heading(s, 13.0),
        Tag::H5 => heading(s, 11.0),
        Tag::H6 => heading(s, 10.0),
        Tag::P => s.margin_bottom = 8.0,
        Tag::Ul | Tag::Ol => {
            s.margin_bottom = 8.0;
            s.indent = 18.0;
        }
        Tag::Li => s.margin_bottom = 2.0,
        Tag::Table => s.margin_bottom = 10.0,
        Tag::Th => {
            s.bold = true;
            s.background = Some(HEADER_GRAY);
        }
        Tag::B | Tag::Strong => s.bold = true,
        Tag::I | Tag::Em => s.italic = true,
        Tag::U => s.underline = true,
        Tag::Hr => {
            s.margin_top = 6.0;
            s.margin_bottom = 6.0;
        }
        tag if tag.is_hidden() => s.hidden = true,
        _ => {}
    }
}

fn apply_inline_style(s: &mut ComputedStyle, style_str: &str) {
    for decl in style_str.split(';') {
        let Some((prop, val)) = decl.split_once(':') else {
            continue;
        };
        apply_css_property(s, &prop.trim().to_ascii_lowercase(), val.trim());
    }
}

fn apply_css_property(s: &mut ComputedStyle, prop: &str, val: &str) {
    match prop {
        "display" if val == "none" => s.hidden = true,
        "font-size" => {
            if let Some(pt) = parse_length(val, s.font_size) {
                s.font_size = pt;
            }
        }
        "font-weight" => {
            s.bold = matches!(val, "bold" | "bolder" | "600" | "700" | "800" | "900")
        }
        "font-style" => s.italic = matches!(val, "italic" | "oblique"),
        "text-decoration" | "text-decoration-line" => s.underline = val.contains("underline"),
        "color" => {
            if let Some(c) = parse_color(val) {
                s.color = c;
            }
        }
        "background-color" | "background" => s.background = parse_color(val),
        "text-align" => {
            s.text_align = match val {
                "center" => TextAlign::Center,
                "right" | "end" => TextAlign::Right,
                _ => TextAlign::Left,
            }
        }
        "line-height" => {
            if let Ok(v) = val.parse::<f32>() {
                s.line_height = v;
            } else if let Some(pt) = parse_length(val, s.font_size) {
                s.line_height = pt / s.font_size;
            }
        }
        "margin-top" => {
            if let Some(pt) = parse_length(val, s.font_size) {
                s.margin_top = pt;
            }
        }
        "margin-bottom" => {
            if let Some(pt) = parse_length(val, s.font_size) {
                s.margin_bottom = pt;
            }
        }
        "padding-left" | "margin-left" => {
            if let Some(pt) = parse_length(val, s.font_size) {
                s.indent = pt;
            }
        }
        "page-break-before" | "break-before" => {
            s.page_break_before = matches!(val, "always" | "page")
        }
        "page-break-after" | "break-after" => s.page_break_after = matches!(val, "always" | "page"),
        _ => {}
    }
}

/// Parse `12px`, `10pt`, `1.5em` or a bare number into points.
/// Pixels map to points one-to-one.
pub fn parse_length(val: &str, font_size: f32) -> Option<f32> {
    let val = val.trim();
    if let Some(em) = val.strip_suffix("em") {
        return em.trim().parse::<f32>().ok().map(|v| v * font_size);
    }
    let number = val
        .strip_suffix("px")
        .or_else(|| val.strip_suffix("pt"))
        .unwrap_or(val);
    number.trim().parse().ok()
}

/// Parse `#rgb`, `#rrggbb` or a handful of colour names.
pub fn parse_color(val: &str) -> Option<Rgb> {
    let val = val.trim();
    if let Some(hex) = val.strip_prefix('#').filter(|h| h.is_ascii()) {
        let channel = |s: &str| u8::from_str_radix(s, 16).ok().map(|v| v as f32 / 255.0);
        return match hex.len() {
            6 => Some([channel(&hex[0..2])?, channel(&hex[2..4])?, channel(&hex[4..6])?]),
            3 => Some([
                channel(&hex[0..1].repeat(2))?,
                channel(&hex[1..2].repeat(2))?,
                channel(&hex[2..3].repeat(2))?,
            ]),
            _ => None,
        };
    }
    match val.to_ascii_lowercase().as_str() {
        "black" => Some(BLACK),
        "white" => Some([1.0, 1.0, 1.0]),
        "red" => Some([1.0, 0.0, 0.0]),
        "green" => Some([0.0, 0.5, 0.0]),
        "blue" => Some([0.0, 0.0, 1.0]),
        "gray" | "grey" => Some([0.5, 0.5, 0.5]),
        "lightblue" => Some([0.678, 0.847, 0.902]),
        _ => None,
    }
}
