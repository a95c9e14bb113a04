//! PDF renderer – paints a [`DocumentLayout`] with `printpdf` (v0.8 ops API).
//!
//! Layout coordinates have their origin at the top-left corner; PDF user
//! space starts bottom-left, so every y is flipped against the page height.

use std::collections::HashMap;

use printpdf::*;
use sha2::{Digest, Sha256};

use super::images::decode_data_uri;
use super::layout::{DocumentLayout, LayoutItem};
use super::style::Rgb as Colour;
use crate::options::DocumentMetadata;

const MM_PER_PT: f32 = 25.4 / 72.0;
const FALLBACK_TITLE: &str = "Report";

struct ImageResource {
    xobj_id: XObjectId,
    px_width: u32,
    px_height: u32,
}

/// Paint `layout` and serialise the document. `metadata`, when given, fills
/// the PDF information dictionary.
pub fn render_pdf(layout: &DocumentLayout, metadata: Option<&DocumentMetadata>) -> Vec<u8> {
    let page_w = Mm(layout.page_width_pt * MM_PER_PT);
    let page_h = Mm(layout.page_height_pt * MM_PER_PT);

    let title = layout.title.as_deref().unwrap_or(FALLBACK_TITLE);
    let mut doc = PdfDocument::new(title);
    if let Some(meta) = metadata {
        apply_metadata(&mut doc.metadata.info, meta);
    }

    let images = register_images(&mut doc, layout);

    let mut pages: Vec<PdfPage> = layout
        .pages
        .iter()
        .map(|page| {
            let mut ops = Vec::new();
            for item in &page.items {
                paint_item(&mut ops, item, layout.page_height_pt, &images);
            }
            PdfPage::new(page_w, page_h, ops)
        })
        .collect();
    if pages.is_empty() {
        pages.push(PdfPage::new(page_w, page_h, Vec::new()));
    }

    doc.with_pages(pages);
    let mut bytes = doc.save(&PdfSaveOptions::default(), &mut Vec::new());
    stabilise_file_id(&mut bytes);
    log::debug!("Rendered {} page(s), {} bytes", layout.page_count().max(1), bytes.len());
    bytes
}

/// Copy non-empty metadata fields into the information dictionary.
/// Keywords are comma-separated.
pub fn apply_metadata(info: &mut PdfDocumentInfo, meta: &DocumentMetadata) {
    if let Some(title) = meta.title() {
        info.document_title = title.to_string();
    }
    if let Some(author) = meta.author() {
        info.author = author.to_string();
    }
    if let Some(subject) = meta.subject() {
        info.subject = subject.to_string();
    }
    if let Some(keywords) = meta.keywords() {
        info.keywords = keywords
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect();
    }
}

/// Overwrite the trailer `/ID` strings with content-derived hex of the same
/// length, so equal layouts serialise to equal bytes.
fn stabilise_file_id(bytes: &mut [u8]) {
    let Some(at) = bytes.windows(3).rposition(|w| w == b"/ID") else {
        return;
    };
    let Some(end) = bytes[at..].iter().position(|&b| b == b']').map(|i| at + i) else {
        return;
    };
    let hex: Vec<u8> = Sha256::digest(&bytes[..at])
        .iter()
        .flat_map(|b| format!("{b:02X}").into_bytes())
        .collect();
    let mut fill = hex.chunks(32);
    let mut pos = at;
    while let Some(open) = bytes[pos..end].iter().position(|&b| b == b'(').map(|i| pos + i) {
        let Some(close) = bytes[open..end].iter().position(|&b| b == b')').map(|i| open + i) else {
            return;
        };
        let Some(chunk) = fill.next() else {
            return;
        };
        for (dst, src) in bytes[open + 1..close].iter_mut().zip(chunk.iter().cycle()) {
            *dst = *src;
        }
        pos = close + 1;
    }
}

/// Decode each distinct image once and register it as an XObject.
fn register_images(doc: &mut PdfDocument, layout: &DocumentLayout) -> HashMap<String, ImageResource> {
    let mut resources = HashMap::new();
    let mut warnings: Vec<PdfWarnMsg> = Vec::new();
    let srcs = layout.pages.iter().flat_map(|p| p.items.iter()).filter_map(|item| match item {
        LayoutItem::Image { src, .. } => Some(src.as_str()),
        _ => None,
    });
    for src in srcs {
        if resources.contains_key(src) {
            continue;
        }
        let bytes = match decode_data_uri(src) {
            Ok(b) => b,
            Err(e) => {
                log::warn!("Skipping image: {e}");
                continue;
            }
        };
        let (px_width, px_height) = match ::image::load_from_memory(&bytes) {
            Ok(img) => (img.width(), img.height()),
            Err(e) => {
                log::warn!("Skipping image: decode error: {e}");
                continue;
            }
        };
        let raw = match RawImage::decode_from_bytes(&bytes, &mut warnings) {
            Ok(r) => r,
            Err(e) => {
                log::warn!("Skipping image: PDF encode error: {e}");
                continue;
            }
        };
        let xobj_id = XObjectId(format!("Im{}", resources.len() + 1));
        doc.resources
            .xobjects
            .map
            .insert(xobj_id.clone(), XObject::Image(raw));
        resources.insert(
            src.to_string(),
            ImageResource {
                xobj_id,
                px_width,
                px_height,
            },
        );
    }
    resources
}

fn rgb(c: Colour) -> Color {
    Color::Rgb(Rgb {
        r: c[0],
        g: c[1],
        b: c[2],
        icc_profile: None,
    })
}

fn point(x: f32, y: f32) -> LinePoint {
    LinePoint {
        p: Point { x: Pt(x), y: Pt(y) },
        bezier: false,
    }
}

fn rect_points(x: f32, bottom: f32, width: f32, height: f32) -> Vec<LinePoint> {
    vec![
        point(x, bottom),
        point(x + width, bottom),
        point(x + width, bottom + height),
        point(x, bottom + height),
    ]
}

/// Builtin Helvetica face for a bold/italic combination.
pub(crate) fn builtin_font(bold: bool, italic: bool) -> BuiltinFont {
    match (bold, italic) {
        (true, true) => BuiltinFont::HelveticaBoldOblique,
        (true, false) => BuiltinFont::HelveticaBold,
        (false, true) => BuiltinFont::HelveticaOblique,
        (false, false) => BuiltinFont::Helvetica,
    }
}

fn paint_item(
    ops: &mut Vec<Op>,
    item: &LayoutItem,
    page_height: f32,
    images: &HashMap<String, ImageResource>,
) {
    match item {
        LayoutItem::Text {
            x,
            y,
            text,
            font_size,
            bold,
            italic,
            underline,
            width,
            color,
        } => {
            let font = builtin_font(*bold, *italic);
            let baseline = page_height - y;
            ops.push(Op::StartTextSection);
            ops.push(Op::SetTextCursor {
                pos: Point {
                    x: Pt(*x),
                    y: Pt(baseline),
                },
            });
            ops.push(Op::SetFontSizeBuiltinFont {
                size: Pt(*font_size),
                font,
            });
            ops.push(Op::SetLineHeight {
                lh: Pt(font_size * 1.2),
            });
            ops.push(Op::SetFillColor { col: rgb(*color) });
            ops.push(Op::WriteTextBuiltinFont {
                items: vec![TextItem::Text(to_ascii(text))],
                font,
            });
            ops.push(Op::EndTextSection);

            if *underline {
                let uy = baseline - font_size * 0.12;
                ops.push(Op::SetOutlineThickness { pt: Pt(0.5) });
                ops.push(Op::SetOutlineColor { col: rgb(*color) });
                ops.push(Op::DrawLine {
                    line: Line {
                        points: vec![point(*x, uy), point(x + width, uy)],
                        is_closed: false,
                    },
                });
            }
        }
        LayoutItem::Rect {
            x,
            y,
            width,
            height,
            fill,
            stroke,
        } => {
            let bottom = page_height - y - height;
            if let Some(fill) = fill {
                ops.push(Op::SetFillColor { col: rgb(*fill) });
                ops.push(Op::DrawPolygon {
                    polygon: Polygon {
                        rings: vec![PolygonRing {
                            points: rect_points(*x, bottom, *width, *height),
                        }],
                        mode: PaintMode::Fill,
                        winding_order: WindingOrder::NonZero,
                    },
                });
            }
            if let Some(stroke) = stroke {
                ops.push(Op::SetOutlineColor { col: rgb(*stroke) });
                ops.push(Op::SetOutlineThickness { pt: Pt(0.5) });
                ops.push(Op::DrawLine {
                    line: Line {
                        points: rect_points(*x, bottom, *width, *height),
                        is_closed: true,
                    },
                });
            }
        }
        LayoutItem::Rule {
            x1,
            x2,
            y,
            thickness,
            color,
        } => {
            let py = page_height - y;
            ops.push(Op::SetOutlineColor { col: rgb(*color) });
            ops.push(Op::SetOutlineThickness { pt: Pt(*thickness) });
            ops.push(Op::DrawLine {
                line: Line {
                    points: vec![point(*x1, py), point(*x2, py)],
                    is_closed: false,
                },
            });
        }
        LayoutItem::Image {
            x,
            y,
            width,
            height,
            src,
        } => {
            let Some(res) = images.get(src) else {
                return;
            };
            // At 72 dpi one pixel maps to one point.
            ops.push(Op::UseXobject {
                id: res.xobj_id.clone(),
                transform: XObjectTransform {
                    translate_x: Some(Pt(*x)),
                    translate_y: Some(Pt(page_height - y - height)),
                    dpi: Some(72.0),
                    scale_x: Some(width / res.px_width.max(1) as f32),
                    scale_y: Some(height / res.px_height.max(1) as f32),
                    rotate: None,
                },
            });
        }
    }
}

/// Map text onto the printable ASCII range the builtin fonts encode safely.
/// Common typographic characters and Latin accents get an ASCII stand-in;
/// anything else becomes `?`.
pub fn to_ascii(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            ' '..='~' => out.push(c),
            '\t' | '\n' | '\r' | '\u{a0}' | '\u{2009}' | '\u{202f}' => out.push(' '),
            '\u{2018}' | '\u{2019}' | '\u{201a}' | '\u{2032}' => out.push('\''),
            '\u{201c}' | '\u{201d}' | '\u{201e}' | '\u{00ab}' | '\u{00bb}' => out.push('"'),
            '\u{2010}'..='\u{2015}' | '\u{2212}' => out.push('-'),
            '\u{2022}' | '\u{00b7}' => out.push('*'),
            '\u{2026}' => out.push_str("..."),
            '\u{20ac}' => out.push_str("EUR"),
            '\u{00a3}' => out.push_str("GBP"),
            '\u{00a9}' => out.push_str("(c)"),
            '\u{00ae}' => out.push_str("(R)"),
            '\u{2122}' => out.push_str("TM"),
            '\u{00df}' => out.push_str("ss"),
            '\u{00e6}' => out.push_str("ae"),
            '\u{00c6}' => out.push_str("AE"),
            '\u{0153}' => out.push_str("oe"),
            '\u{00d7}' => out.push('x'),
            c => out.push(strip_accent(c).unwrap_or('?')),
        }
    }
    out
}

fn strip_accent(c: char) -> Option<char> {
    let base = match c {
        'À'..='Å' => 'A',
        'à'..='å' => 'a',
        'Ç' => 'C',
        'ç' => 'c',
        'È'..='Ë' => 'E',
        'è'..='ë' => 'e',
        'Ì'..='Ï' => 'I',
        'ì'..='ï' => 'i',
        'Ñ' => 'N',
        'ñ' => 'n',
        'Ò'..='Ö' | 'Ø' => 'O',
        'ò'..='ö' | 'ø' => 'o',
        'Ù'..='Ü' => 'U',
        'ù'..='ü' => 'u',
        'Ý' => 'Y',
        'ý' | 'ÿ' => 'y',
        'Š' => 'S',
        'š' => 's',
        'Ž' => 'Z',
        'ž' => 'z',
        _ => return None,
    };
    Some(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::layout::PageLayout;

    fn blank_info() -> PdfDocumentInfo {
        PdfDocument::new("x").metadata.info
    }

    #[test]
    fn empty_layout_still_renders_a_page() {
        let layout = DocumentLayout::new(595.0, 842.0);
        let bytes = render_pdf(&layout, None);
        assert_eq!(&bytes[0..5], b"%PDF-");
    }

    #[test]
    fn renders_every_item_kind() {
        let mut layout = DocumentLayout::new(595.0, 842.0);
        layout.pages.push(PageLayout {
            items: vec![
                LayoutItem::Text {
                    x: 72.0,
                    y: 90.0,
                    text: "Total – 5 €".into(),
                    font_size: 11.0,
                    bold: true,
                    italic: false,
                    underline: true,
                    width: 60.0,
                    color: [0.0, 0.0, 0.0],
                },
                LayoutItem::Rect {
                    x: 72.0,
                    y: 100.0,
                    width: 100.0,
                    height: 20.0,
                    fill: Some([0.9, 0.9, 0.9]),
                    stroke: Some([0.2, 0.2, 0.2]),
                },
                LayoutItem::Rule {
                    x1: 72.0,
                    x2: 500.0,
                    y: 130.0,
                    thickness: 0.75,
                    color: [0.5, 0.5, 0.5],
                },
                LayoutItem::Image {
                    x: 72.0,
                    y: 140.0,
                    width: 20.0,
                    height: 10.0,
                    src: crate::pdf::images::tests::png_data_uri(),
                },
            ],
        });
        let bytes = render_pdf(&layout, None);
        assert_eq!(&bytes[0..5], b"%PDF-");
        assert!(bytes.len() > 500);
    }

    #[test]
    fn equal_layouts_render_equal_bytes() {
        let mut layout = DocumentLayout::new(595.0, 842.0);
        layout.pages.push(PageLayout {
            items: vec![
                LayoutItem::Text {
                    x: 72.0,
                    y: 90.0,
                    text: "Same input".into(),
                    font_size: 11.0,
                    bold: false,
                    italic: false,
                    underline: false,
                    width: 60.0,
                    color: [0.0, 0.0, 0.0],
                },
                LayoutItem::Image {
                    x: 72.0,
                    y: 140.0,
                    width: 20.0,
                    height: 10.0,
                    src: crate::pdf::images::tests::png_data_uri(),
                },
            ],
        });
        let first = render_pdf(&layout, None);
        let second = render_pdf(&layout, None);
        assert_eq!(first, second);
        assert!(first.windows(3).any(|w| w == b"/ID"));
    }

    #[test]
    fn file_id_follows_the_content() {
        let mut a = b"%PDF-1.3 body A trailer /ID [(AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA)(BBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB)]".to_vec();
        let mut b = a.clone();
        b[14] = b'B';
        let len = a.len();
        stabilise_file_id(&mut a);
        stabilise_file_id(&mut b);
        assert_eq!(a.len(), len);
        assert_ne!(a, b);
        let id = &a[a.len() - 68..a.len() - 36];
        assert!(id.iter().all(u8::is_ascii_hexdigit));
    }

    #[test]
    fn transliterates_to_ascii() {
        assert_eq!(to_ascii("“Café” – 10 €"), "\"Cafe\" - 10 EUR");
        assert_eq!(to_ascii("Straße • Ørsted"), "Strasse * Orsted");
        assert_eq!(to_ascii("日本"), "??");
    }

    #[test]
    fn metadata_fields_are_copied_independently() {
        let mut info = blank_info();
        let before_subject = info.subject.clone();
        apply_metadata(
            &mut info,
            &DocumentMetadata::new()
                .with_author("Ada")
                .with_keywords("sales, q3, ,report"),
        );
        assert_eq!(info.author, "Ada");
        assert_eq!(info.keywords, vec!["sales", "q3", "report"]);
        assert_eq!(info.subject, before_subject);
    }

    #[test]
    fn empty_metadata_strings_are_ignored() {
        let mut info = blank_info();
        let title = info.document_title.clone();
        apply_metadata(&mut info, &DocumentMetadata::new().with_title(""));
        assert_eq!(info.document_title, title);
    }
}
