//! Flow layout – walks the DOM top to bottom, wraps inline text into lines and
//! places blocks, lists, tables and images onto pages of a fixed geometry.
//!
//! Text is measured with the glyph advances of the builtin Helvetica faces the
//! renderer draws with, so wrapped lines stay within the margins.

use std::sync::OnceLock;

use printpdf::{BuiltinFont, ParsedFont};

use super::dom::{body_children, DomNode, ElementNode, Tag};
use super::images::intrinsic_size;
use super::layout::{DocumentLayout, LayoutItem, PageLayout};
use super::render::{builtin_font, to_ascii};
use super::style::{parse_length, resolve_style, ComputedStyle, Rgb, TextAlign, RULE_GRAY};
use crate::error::{Error, Result};
use crate::options::ReportOptions;

/// Points per millimetre.
pub const PT_PER_MM: f32 = 72.0 / 25.4;

const CELL_PADDING: f32 = 4.0;
const TABLE_BORDER: Rgb = [0.45, 0.45, 0.45];
const MARKER_GAP: f32 = 4.0;
/// Pixels to points for intrinsic image sizes (96 dpi).
const PX_TO_PT: f32 = 0.75;

/// Page size and margins in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
    pub margin_top: f32,
    pub margin_right: f32,
    pub margin_bottom: f32,
    pub margin_left: f32,
}

impl PageGeometry {
    pub fn from_options(options: &ReportOptions) -> Self {
        let page = options.page_dimensions();
        let m = &options.margins;
        Self {
            width: page.width * PT_PER_MM,
            height: page.height * PT_PER_MM,
            margin_top: m.top * PT_PER_MM,
            margin_right: m.right * PT_PER_MM,
            margin_bottom: m.bottom * PT_PER_MM,
            margin_left: m.left * PT_PER_MM,
        }
    }

    pub fn content_width(&self) -> f32 {
        self.width - self.margin_left - self.margin_right
    }

    pub fn content_height(&self) -> f32 {
        self.height - self.margin_top - self.margin_bottom
    }

    fn content_bottom(&self) -> f32 {
        self.height - self.margin_bottom
    }

    fn validate(&self) -> Result<()> {
        let margins = [
            self.margin_top,
            self.margin_right,
            self.margin_bottom,
            self.margin_left,
        ];
        if margins.iter().any(|m| !m.is_finite() || *m < 0.0) {
            return Err(Error::Conversion(
                "page margins must be finite and non-negative".to_string(),
            ));
        }
        if self.content_width() <= 0.0 || self.content_height() <= 0.0 {
            return Err(Error::Conversion(
                "page margins leave no room for content".to_string(),
            ));
        }
        Ok(())
    }
}

/// Lay out parsed markup onto pages.
pub fn layout_document(nodes: &[DomNode], geometry: &PageGeometry) -> Result<DocumentLayout> {
    geometry.validate()?;
    let mut flow = Flow::new(geometry);
    flow.layout.title = find_title(nodes);
    let root = ComputedStyle::default();
    flow.flow_nodes(
        body_children(nodes),
        &root,
        geometry.margin_left,
        geometry.content_width(),
    );
    let layout = flow.finish();
    log::debug!("Laid out {} page(s)", layout.page_count());
    Ok(layout)
}

fn find_title(nodes: &[DomNode]) -> Option<String> {
    nodes.iter().find_map(|node| match node {
        DomNode::Element(e) if e.tag == Tag::Title => {
            let text = collapse_whitespace(&e.text_content());
            (!text.is_empty()).then_some(text)
        }
        DomNode::Element(e) => find_title(&e.children),
        DomNode::Text(_) => None,
    })
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ---------------------------------------------------------------------------
// Text measurement
// ---------------------------------------------------------------------------

/// Em width used when a font program or glyph is unavailable.
const FALLBACK_EM: f32 = 0.556;

/// Advance widths of the printable ASCII range, in ems, read from the
/// builtin font program the renderer embeds.
struct AdvanceTable {
    ems: [f32; 95],
}

impl AdvanceTable {
    fn load(font: BuiltinFont) -> Option<Self> {
        let subset = font.get_subset_font();
        let mut warnings = Vec::new();
        let parsed = ParsedFont::from_bytes(&subset.bytes, 0, &mut warnings)?;
        let units = f32::from(parsed.font_metrics.units_per_em.max(1));
        let mut ems = [FALLBACK_EM; 95];
        for (slot, c) in ems.iter_mut().zip(' '..='~') {
            let advance = parsed
                .lookup_glyph_index(u32::from(c))
                .map(|gid| parsed.get_horizontal_advance(gid))
                .unwrap_or(0);
            if advance > 0 {
                *slot = f32::from(advance) / units;
            }
        }
        Some(Self { ems })
    }

    fn em_width(&self, c: char) -> f32 {
        (c as usize)
            .checked_sub(0x20)
            .and_then(|i| self.ems.get(i))
            .copied()
            .unwrap_or(FALLBACK_EM)
    }
}

fn advance_table(bold: bool, italic: bool) -> Option<&'static AdvanceTable> {
    static TABLES: OnceLock<[Option<AdvanceTable>; 4]> = OnceLock::new();
    let tables = TABLES.get_or_init(|| {
        [(false, false), (true, false), (false, true), (true, true)].map(|(bold, italic)| {
            let font = builtin_font(bold, italic);
            let table = AdvanceTable::load(font);
            if table.is_none() {
                log::warn!("No glyph metrics for {font:?}; using fallback widths");
            }
            table
        })
    });
    tables[usize::from(bold) + 2 * usize::from(italic)].as_ref()
}

/// Advance width of `text` in points, as the renderer will draw it.
pub fn text_width(text: &str, font_size: f32, bold: bool, italic: bool) -> f32 {
    let drawn = to_ascii(text);
    let ems: f32 = match advance_table(bold, italic) {
        Some(table) => drawn.chars().map(|c| table.em_width(c)).sum(),
        None => drawn.chars().count() as f32 * FALLBACK_EM,
    };
    ems * font_size
}

// ---------------------------------------------------------------------------
// Inline content and line breaking
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
struct TextStyle {
    font_size: f32,
    line_height: f32,
    bold: bool,
    italic: bool,
    underline: bool,
    color: Rgb,
}

impl From<&ComputedStyle> for TextStyle {
    fn from(s: &ComputedStyle) -> Self {
        Self {
            font_size: s.font_size,
            line_height: s.font_size * s.line_height,
            bold: s.bold,
            italic: s.italic,
            underline: s.underline,
            color: s.color,
        }
    }
}

impl TextStyle {
    fn width(&self, text: &str) -> f32 {
        text_width(text, self.font_size, self.bold, self.italic)
    }
}

enum InlineRun<'a> {
    Text(&'a str, TextStyle),
    Break,
    Image(&'a ElementNode),
}

#[derive(Debug)]
struct Piece {
    x: f32,
    text: String,
    width: f32,
    style: TextStyle,
}

#[derive(Debug, Default)]
struct Line {
    pieces: Vec<Piece>,
    width: f32,
    height: f32,
    max_font: f32,
}

impl Line {
    /// Baseline offset from the top of the line box.
    fn baseline(&self) -> f32 {
        (self.height - self.max_font) / 2.0 + self.max_font * 0.8
    }
}

/// Greedy line breaker over styled words.
struct LineBreaker {
    max_width: f32,
    min_height: f32,
    lines: Vec<Line>,
    current: Line,
    pending_space: bool,
}

impl LineBreaker {
    fn new(max_width: f32, block: &TextStyle) -> Self {
        Self {
            max_width: max_width.max(1.0),
            min_height: block.line_height,
            lines: Vec::new(),
            current: Line::default(),
            pending_space: false,
        }
    }

    fn push_text(&mut self, text: &str, style: &TextStyle) {
        if text.starts_with(char::is_whitespace) {
            self.pending_space = true;
        }
        let ends_with_space = text.ends_with(char::is_whitespace);
        let mut words = text.split_whitespace().peekable();
        while let Some(word) = words.next() {
            self.push_word(word, style);
            self.pending_space = words.peek().is_some() || ends_with_space;
        }
    }

    fn push_word(&mut self, word: &str, style: &TextStyle) {
        let width = style.width(word);
        let space = self.space_before(style);
        if !self.current.pieces.is_empty() && self.current.width + space + width > self.max_width {
            self.break_line();
        }
        if width <= self.max_width {
            let space = self.space_before(style);
            self.place(word, width, space, style);
            return;
        }
        // Longer than a whole line: split at character boundaries.
        let mut chunk = String::new();
        for c in word.chars() {
            let mut candidate = chunk.clone();
            candidate.push(c);
            if !chunk.is_empty() && style.width(&candidate) > self.max_width {
                let w = style.width(&chunk);
                self.place(&chunk, w, 0.0, style);
                self.break_line();
                chunk.clear();
            }
            chunk.push(c);
        }
        if !chunk.is_empty() {
            let w = style.width(&chunk);
            let space = self.space_before(style);
            self.place(&chunk, w, space, style);
        }
    }

    fn space_before(&self, style: &TextStyle) -> f32 {
        if self.pending_space && !self.current.pieces.is_empty() {
            style.width(" ")
        } else {
            0.0
        }
    }

    fn place(&mut self, word: &str, width: f32, space: f32, style: &TextStyle) {
        let line = &mut self.current;
        match line.pieces.last_mut() {
            Some(last) if last.style == *style => {
                if space > 0.0 {
                    last.text.push(' ');
                }
                last.text.push_str(word);
                last.width += space + width;
            }
            _ => line.pieces.push(Piece {
                x: line.width + space,
                text: word.to_string(),
                width,
                style: style.clone(),
            }),
        }
        line.width += space + width;
        line.height = line.height.max(style.line_height);
        line.max_font = line.max_font.max(style.font_size);
        self.pending_space = false;
    }

    fn break_line(&mut self) {
        let mut line = std::mem::take(&mut self.current);
        if line.pieces.is_empty() {
            line.height = self.min_height;
        }
        self.lines.push(line);
        self.pending_space = false;
    }

    fn hard_break(&mut self) {
        self.break_line();
    }

    fn finish(mut self) -> Vec<Line> {
        if !self.current.pieces.is_empty() {
            self.break_line();
        }
        self.lines
    }
}

/// Flatten the inline content of `nodes` into runs.
fn collect_inline<'a>(nodes: &'a [DomNode], style: &ComputedStyle, runs: &mut Vec<InlineRun<'a>>) {
    for node in nodes {
        match node {
            DomNode::Text(text) => runs.push(InlineRun::Text(text, TextStyle::from(style))),
            DomNode::Element(e) => {
                let s = resolve_style(e, style);
                if s.hidden {
                    continue;
                }
                match e.tag {
                    Tag::Br => runs.push(InlineRun::Break),
                    Tag::Img => runs.push(InlineRun::Image(e)),
                    _ if e.tag.is_block() => {
                        runs.push(InlineRun::Break);
                        collect_inline(&e.children, &s, runs);
                        runs.push(InlineRun::Break);
                    }
                    _ => collect_inline(&e.children, &s, runs),
                }
            }
        }
    }
}

fn has_visible_text(runs: &[InlineRun<'_>]) -> bool {
    runs.iter().any(|r| match r {
        InlineRun::Text(t, _) => !t.trim().is_empty(),
        InlineRun::Break | InlineRun::Image(_) => true,
    })
}

/// Wrap runs (images are ignored) into lines no wider than `width`.
fn wrap_runs(runs: &[InlineRun<'_>], block: &ComputedStyle, width: f32) -> Vec<Line> {
    let mut breaker = LineBreaker::new(width, &TextStyle::from(block));
    for run in runs {
        match run {
            InlineRun::Text(text, style) => breaker.push_text(text, style),
            InlineRun::Break => breaker.hard_break(),
            InlineRun::Image(_) => {}
        }
    }
    let mut lines = breaker.finish();
    // A break before any text (e.g. a leading block child) yields no line.
    while lines.first().is_some_and(|l| l.pieces.is_empty()) && matches!(runs.first(), Some(InlineRun::Break)) {
        lines.remove(0);
    }
    lines
}

fn align_offset(align: TextAlign, available: f32, used: f32) -> f32 {
    match align {
        TextAlign::Left => 0.0,
        TextAlign::Center => ((available - used) / 2.0).max(0.0),
        TextAlign::Right => (available - used).max(0.0),
    }
}

fn push_line(items: &mut Vec<LayoutItem>, line: &Line, x: f32, top: f32) {
    let baseline = top + line.baseline();
    for piece in &line.pieces {
        items.push(LayoutItem::Text {
            x: x + piece.x,
            y: baseline,
            text: piece.text.clone(),
            font_size: piece.style.font_size,
            bold: piece.style.bold,
            italic: piece.style.italic,
            underline: piece.style.underline,
            width: piece.width,
            color: piece.style.color,
        });
    }
}

// ---------------------------------------------------------------------------
// Block flow
// ---------------------------------------------------------------------------

struct Marker {
    text: String,
    x: f32,
    style: TextStyle,
}

struct PreparedRow {
    height: f32,
    cells: Vec<PreparedCell>,
}

struct PreparedCell {
    lines: Vec<Line>,
    align: TextAlign,
    background: Option<Rgb>,
}

struct Flow<'g> {
    geo: &'g PageGeometry,
    layout: DocumentLayout,
    page: PageLayout,
    y: f32,
    marker: Option<Marker>,
}

impl<'g> Flow<'g> {
    fn new(geo: &'g PageGeometry) -> Self {
        Self {
            geo,
            layout: DocumentLayout::new(geo.width, geo.height),
            page: PageLayout::default(),
            y: geo.margin_top,
            marker: None,
        }
    }

    fn at_page_top(&self) -> bool {
        self.y <= self.geo.margin_top + 0.01
    }

    fn new_page(&mut self) {
        let page = std::mem::take(&mut self.page);
        self.layout.pages.push(page);
        self.y = self.geo.margin_top;
    }

    /// Start a new page unless the current one is still blank.
    fn break_page(&mut self) {
        if !self.page.items.is_empty() {
            self.new_page();
        }
    }

    /// Move to a new page if `height` does not fit below the cursor.
    /// Content taller than a page is placed anyway and overflows.
    fn ensure_space(&mut self, height: f32) -> bool {
        if self.y + height > self.geo.content_bottom() && !self.at_page_top() {
            self.new_page();
            return true;
        }
        false
    }

    fn add_margin(&mut self, margin: f32) {
        if !self.at_page_top() {
            self.y += margin;
        }
    }

    fn finish(mut self) -> DocumentLayout {
        if !self.page.items.is_empty() || self.layout.pages.is_empty() {
            let page = std::mem::take(&mut self.page);
            self.layout.pages.push(page);
        }
        self.layout
    }

    fn flow_nodes(&mut self, nodes: &[DomNode], style: &ComputedStyle, x: f32, width: f32) {
        let mut runs = Vec::new();
        for node in nodes {
            match node {
                DomNode::Element(e) if e.tag.is_block() => {
                    self.flow_paragraph(&runs, style, x, width);
                    runs.clear();
                    self.flow_element(e, style, x, width);
                }
                other => collect_inline(std::slice::from_ref(other), style, &mut runs),
            }
        }
        self.flow_paragraph(&runs, style, x, width);
    }

    fn flow_paragraph(&mut self, runs: &[InlineRun<'_>], style: &ComputedStyle, x: f32, width: f32) {
        if !has_visible_text(runs) {
            return;
        }
        for segment in runs.split(|r| matches!(r, InlineRun::Image(_))) {
            if has_visible_text(segment) {
                for line in wrap_runs(segment, style, width) {
                    self.emit_line(&line, x, width, style.text_align);
                }
            }
        }
        for run in runs {
            if let InlineRun::Image(img) = run {
                self.flow_image(img, x, width);
            }
        }
    }

    fn emit_line(&mut self, line: &Line, x: f32, width: f32, align: TextAlign) {
        self.ensure_space(line.height);
        if let Some(marker) = self.marker.take() {
            let marker_line = Line {
                height: line.height,
                max_font: line.max_font.max(marker.style.font_size),
                width: 0.0,
                pieces: vec![Piece {
                    x: 0.0,
                    width: marker.style.width(&marker.text),
                    text: marker.text,
                    style: marker.style,
                }],
            };
            push_line(&mut self.page.items, &marker_line, marker.x, self.y);
        }
        let offset = align_offset(align, width, line.width);
        push_line(&mut self.page.items, line, x + offset, self.y);
        self.y += line.height;
    }

    fn flow_element(&mut self, elem: &ElementNode, parent: &ComputedStyle, x: f32, width: f32) {
        let style = resolve_style(elem, parent);
        if style.hidden {
            return;
        }
        if style.page_break_before {
            self.break_page();
        }
        self.add_margin(style.margin_top);

        match elem.tag {
            Tag::Hr => {
                self.ensure_space(1.0);
                self.page.items.push(LayoutItem::Rule {
                    x1: x,
                    x2: x + width,
                    y: self.y,
                    thickness: 0.75,
                    color: RULE_GRAY,
                });
                self.y += 1.0;
            }
            Tag::Ul | Tag::Ol => self.flow_list(elem, &style, x, width),
            Tag::Table => self.flow_table(elem, &style, x, width),
            _ => {
                let indent = style.indent.min(width / 2.0);
                self.flow_nodes(&elem.children, &style, x + indent, width - indent);
            }
        }

        self.add_margin(style.margin_bottom);
        if style.page_break_after {
            self.break_page();
        }
    }

    fn flow_list(&mut self, list: &ElementNode, style: &ComputedStyle, x: f32, width: f32) {
        let indent = style.indent.min(width / 2.0);
        let (x, width) = (x + indent, width - indent);
        let mut number = list
            .attr("start")
            .and_then(|s| s.trim().parse::<i64>().ok())
            .unwrap_or(1);

        for child in &list.children {
            match child {
                DomNode::Element(li) if li.tag == Tag::Li => {
                    let li_style = resolve_style(li, style);
                    if li_style.hidden {
                        continue;
                    }
                    let text = if list.tag == Tag::Ol {
                        format!("{number}.")
                    } else {
                        "\u{2022}".to_string()
                    };
                    let marker_style = TextStyle::from(&li_style);
                    let marker_x = x - marker_style.width(&text) - MARKER_GAP;
                    self.add_margin(li_style.margin_top);
                    self.marker = Some(Marker {
                        text,
                        x: marker_x,
                        style: marker_style,
                    });
                    self.flow_nodes(&li.children, &li_style, x, width);
                    self.marker = None;
                    self.add_margin(li_style.margin_bottom);
                    number = number.saturating_add(1);
                }
                DomNode::Element(other) => self.flow_element(other, style, x, width),
                DomNode::Text(_) => self.flow_nodes(std::slice::from_ref(child), style, x, width),
            }
        }
    }

    fn flow_table(&mut self, table: &ElementNode, style: &ComputedStyle, x: f32, width: f32) {
        let mut rows: Vec<(&ElementNode, ComputedStyle, bool)> = Vec::new();
        for child in &table.children {
            let DomNode::Element(e) = child else { continue };
            match e.tag {
                Tag::Tr => rows.push((e, style.clone(), false)),
                Tag::Thead | Tag::Tbody | Tag::Tfoot => {
                    let section = resolve_style(e, style);
                    for tr in e.children.iter().filter_map(as_row) {
                        rows.push((tr, section.clone(), e.tag == Tag::Thead));
                    }
                }
                _ => {}
            }
        }

        let columns = rows
            .iter()
            .map(|(tr, _, _)| tr.children.iter().filter_map(as_cell).count())
            .max()
            .unwrap_or(0);
        if columns == 0 {
            return;
        }
        let col_width = width / columns as f32;

        let mut header: Vec<PreparedRow> = Vec::new();
        for (tr, section_style, is_header) in rows {
            let row_style = resolve_style(tr, &section_style);
            if row_style.hidden {
                continue;
            }
            let row = prepare_row(tr, &row_style, columns, col_width);
            if self.ensure_space(row.height) && !is_header {
                for h in &header {
                    self.draw_row(h, x, col_width);
                }
            }
            self.draw_row(&row, x, col_width);
            if is_header {
                header.push(row);
            }
        }
    }

    fn draw_row(&mut self, row: &PreparedRow, x: f32, col_width: f32) {
        for (i, cell) in row.cells.iter().enumerate() {
            let cell_x = x + i as f32 * col_width;
            self.page.items.push(LayoutItem::Rect {
                x: cell_x,
                y: self.y,
                width: col_width,
                height: row.height,
                fill: cell.background,
                stroke: Some(TABLE_BORDER),
            });
            let inner = col_width - 2.0 * CELL_PADDING;
            let mut top = self.y + CELL_PADDING;
            for line in &cell.lines {
                let offset = align_offset(cell.align, inner, line.width);
                push_line(&mut self.page.items, line, cell_x + CELL_PADDING + offset, top);
                top += line.height;
            }
        }
        self.y += row.height;
    }

    fn flow_image(&mut self, img: &ElementNode, x: f32, width: f32) {
        let Some(src) = img.src() else {
            log::warn!("Skipping <img> without src");
            return;
        };
        let (px_w, px_h) = match intrinsic_size(src) {
            Ok(dims) => dims,
            Err(e) => {
                log::warn!("Skipping image: {e}");
                return;
            }
        };
        let ratio = px_h as f32 / px_w as f32;
        let attr = |name: &str| img.attr(name).and_then(|v| parse_length(v, 11.0));
        let (mut w, mut h) = match (attr("width"), attr("height")) {
            (Some(w), Some(h)) => (w, h),
            (Some(w), None) => (w, w * ratio),
            (None, Some(h)) => (h / ratio, h),
            (None, None) => (px_w as f32 * PX_TO_PT, px_h as f32 * PX_TO_PT),
        };
        if w > width {
            h *= width / w;
            w = width;
        }
        let max_h = self.geo.content_height();
        if h > max_h {
            w *= max_h / h;
            h = max_h;
        }
        self.ensure_space(h);
        self.page.items.push(LayoutItem::Image {
            x,
            y: self.y,
            width: w,
            height: h,
            src: src.to_string(),
        });
        self.y += h;
    }
}

fn as_row(node: &DomNode) -> Option<&ElementNode> {
    match node {
        DomNode::Element(e) if e.tag == Tag::Tr => Some(e),
        _ => None,
    }
}

fn as_cell(node: &DomNode) -> Option<&ElementNode> {
    match node {
        DomNode::Element(e) if matches!(e.tag, Tag::Td | Tag::Th) => Some(e),
        _ => None,
    }
}

fn prepare_row(tr: &ElementNode, row_style: &ComputedStyle, columns: usize, col_width: f32) -> PreparedRow {
    let inner = (col_width - 2.0 * CELL_PADDING).max(1.0);
    let mut cells: Vec<PreparedCell> = tr
        .children
        .iter()
        .filter_map(as_cell)
        .map(|cell| {
            let style = resolve_style(cell, row_style);
            let mut runs = Vec::new();
            collect_inline(&cell.children, &style, &mut runs);
            PreparedCell {
                lines: wrap_runs(&runs, &style, inner),
                align: style.text_align,
                background: style.background,
            }
        })
        .collect();
    cells.resize_with(columns, || PreparedCell {
        lines: Vec::new(),
        align: TextAlign::Left,
        background: None,
    });
    let min_line = TextStyle::from(row_style).line_height;
    let content = cells
        .iter()
        .map(|c| c.lines.iter().map(|l| l.height).sum::<f32>())
        .fold(min_line, f32::max);
    PreparedRow {
        height: content + 2.0 * CELL_PADDING,
        cells,
    }
}
