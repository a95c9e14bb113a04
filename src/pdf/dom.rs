//! HTML parser – converts rendered markup into a simple DOM tree.
//!
//! Handles the subset report templates produce:
//! - Block: html, body, div, p, h1-h6, ul, ol, li, table parts, hr
//! - Inline: span, b/strong, i/em, u, br, img
//! - Skipped: head, title, style, script (content is not parsed)

use std::collections::HashMap;

/// The tag name of a supported element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    Html,
    Head,
    Body,
    Title,
    Style,
    Script,
    Div,
    P,
    H1,
    H2,
    H3,
    H4,
    H5,
    H6,
    Ul,
    Ol,
    Li,
    Table,
    Thead,
    Tbody,
    Tfoot,
    Tr,
    Td,
    Th,
    Span,
    B,
    Strong,
    I,
    Em,
    U,
    Br,
    Hr,
    Img,
    /// Unrecognised tags keep their children and behave like spans.
    Unknown(String),
}

impl Tag {
    pub fn from_name(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "html" => Tag::Html,
            "head" => Tag::Head,
            "body" => Tag::Body,
            "title" => Tag::Title,
            "style" => Tag::Style,
            "script" => Tag::Script,
            "div" | "section" | "article" | "header" | "footer" | "main" => Tag::Div,
            "p" => Tag::P,
            "h1" => Tag::H1,
            "h2" => Tag::H2,
            "h3" => Tag::H3,
            "h4" => Tag::H4,
            "h5" => Tag::H5,
            "h6" => Tag::H6,
            "ul" => Tag::Ul,
            "ol" => Tag::Ol,
            "li" => Tag::Li,
            "table" => Tag::Table,
            "thead" => Tag::Thead,
            "tbody" => Tag::Tbody,
            "tfoot" => Tag::Tfoot,
            "tr" => Tag::Tr,
            "td" => Tag::Td,
            "th" => Tag::Th,
            "span" => Tag::Span,
            "b" => Tag::B,
            "strong" => Tag::Strong,
            "i" => Tag::I,
            "em" => Tag::Em,
            "u" => Tag::U,
            "br" => Tag::Br,
            "hr" => Tag::Hr,
            "img" => Tag::Img,
            other => Tag::Unknown(other.to_string()),
        }
    }

    /// Elements that never have children or a closing tag.
    pub fn is_void(&self) -> bool {
        matches!(self, Tag::Br | Tag::Hr | Tag::Img)
            || matches!(self, Tag::Unknown(n) if matches!(n.as_str(), "meta" | "link" | "input" | "col" | "wbr"))
    }

    /// Elements whose content is raw text, skipped up to the closing tag.
    pub fn is_raw_text(&self) -> bool {
        matches!(self, Tag::Style | Tag::Script)
    }

    pub fn is_block(&self) -> bool {
        matches!(
            self,
            Tag::Html
                | Tag::Body
                | Tag::Div
                | Tag::P
                | Tag::H1
                | Tag::H2
                | Tag::H3
                | Tag::H4
                | Tag::H5
                | Tag::H6
                | Tag::Ul
                | Tag::Ol
                | Tag::Li
                | Tag::Table
                | Tag::Thead
                | Tag::Tbody
                | Tag::Tfoot
                | Tag::Tr
                | Tag::Td
                | Tag::Th
                | Tag::Hr
        )
    }

    /// Elements that contribute nothing to the page.
    pub fn is_hidden(&self) -> bool {
        matches!(self, Tag::Head | Tag::Title | Tag::Style | Tag::Script)
    }
}

/// A node in the DOM tree.
#[derive(Debug, Clone, PartialEq)]
pub enum DomNode {
    Element(ElementNode),
    Text(String),
}

/// An element node carrying tag, attributes, and children.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementNode {
    pub tag: Tag,
    pub attributes: HashMap<String, String>,
    pub children: Vec<DomNode>,
}

impl ElementNode {
    pub fn new(tag: Tag) -> Self {
        Self {
            tag,
            attributes: HashMap::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|s| s.as_str())
    }

    pub fn inline_style(&self) -> Option<&str> {
        self.attr("style")
    }

    pub fn src(&self) -> Option<&str> {
        self.attr("src")
    }

    /// All descendant text, concatenated.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }
}

fn collect_text(nodes: &[DomNode], out: &mut String) {
    for node in nodes {
        match node {
            DomNode::Text(t) => out.push_str(t),
            DomNode::Element(e) => collect_text(&e.children, out),
        }
    }
}

/// Parse an HTML string into a list of DOM nodes.
///
/// Never fails: malformed markup yields a best-effort tree.
pub fn parse_html(html: &str) -> Vec<DomNode> {
    let mut parser = Parser::new(html);
    let mut nodes = Vec::new();
    while !parser.eof() {
        nodes.extend(parser.parse_nodes());
        // A stray closing tag at the top level ends `parse_nodes`; drop it.
        if parser.starts_with("</") {
            parser.skip_closing_tag();
        }
    }
    nodes
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn parse_nodes(&mut self) -> Vec<DomNode> {
        let mut nodes = Vec::new();
        loop {
            let skipped = self.skip_whitespace_between_tags();
            if self.eof() || self.starts_with("</") {
                break;
            }
            // Whitespace separating two inline elements still separates words.
            if skipped && !nodes.is_empty() && self.next_tag_is_inline() {
                nodes.push(DomNode::Text(" ".to_string()));
            }
            if let Some(node) = self.parse_node() {
                nodes.push(node);
            }
        }
        nodes
    }

    fn parse_node(&mut self) -> Option<DomNode> {
        if self.starts_with("<!--") {
            self.skip_past("-->");
            return None;
        }
        if self.starts_with("<!") || self.starts_with("<?") {
            self.skip_past(">");
            return None;
        }
        let opens_tag = self.starts_with("<")
            && self.input[self.pos + 1..].starts_with(|c: char| c.is_ascii_alphabetic());
        if opens_tag {
            Some(self.parse_element())
        } else {
            Some(self.parse_text())
        }
    }

    fn parse_text(&mut self) -> DomNode {
        let start = self.pos;
        // A lone '<' that does not open a tag is literal text.
        self.advance();
        while !self.eof() && !self.starts_with("<") {
            self.advance();
        }
        DomNode::Text(decode_entities(&self.input[start..self.pos]))
    }

    fn parse_element(&mut self) -> DomNode {
        self.advance(); // '<'
        let tag = Tag::from_name(&self.parse_name());
        let mut elem = ElementNode::new(tag);

        loop {
            self.skip_whitespace();
            if self.eof() || self.starts_with(">") || self.starts_with("/>") {
                break;
            }
            let (key, value) = self.parse_attribute();
            if key.is_empty() {
                // Unparseable attribute character; step over it.
                self.advance();
                continue;
            }
            elem.attributes.insert(key.to_ascii_lowercase(), value);
        }

        if self.starts_with("/>") {
            self.pos += 2;
            return DomNode::Element(elem);
        }
        if self.starts_with(">") {
            self.advance();
        }
        if elem.tag.is_void() {
            return DomNode::Element(elem);
        }

        if elem.tag.is_raw_text() {
            let closing = match &elem.tag {
                Tag::Style => "</style",
                _ => "</script",
            };
            self.skip_until_ci(closing);
        } else {
            elem.children = self.parse_nodes();
        }

        if self.starts_with("</") {
            self.skip_closing_tag();
        }
        DomNode::Element(elem)
    }

    fn skip_closing_tag(&mut self) {
        self.pos += 2;
        self.parse_name();
        self.skip_past(">");
    }

    fn parse_name(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.current_char() {
            if c.is_alphanumeric() || c == '-' || c == '_' || c == ':' {
                self.advance();
            } else {
                break;
            }
        }
        self.input[start..self.pos].to_string()
    }

    fn parse_attribute(&mut self) -> (String, String) {
        let key = self.parse_name();
        self.skip_whitespace();
        if !self.starts_with("=") {
            return (key, String::new());
        }
        self.advance();
        self.skip_whitespace();
        (key, self.parse_attr_value())
    }

    fn parse_attr_value(&mut self) -> String {
        for quote in ['"', '\''] {
            if self.current_char() == Some(quote) {
                self.advance();
                let start = self.pos;
                while self.current_char().is_some_and(|c| c != quote) {
                    self.advance();
                }
                let value = decode_entities(&self.input[start..self.pos]);
                self.advance();
                return value;
            }
        }
        let start = self.pos;
        while let Some(c) = self.current_char() {
            if c.is_whitespace() || c == '>' {
                break;
            }
            self.advance();
        }
        decode_entities(&self.input[start..self.pos])
    }

    fn skip_whitespace(&mut self) {
        while self.current_char().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    /// Skip a whitespace-only run that sits between tags. Returns whether
    /// anything was skipped.
    fn skip_whitespace_between_tags(&mut self) -> bool {
        let saved = self.pos;
        self.skip_whitespace();
        if !self.eof() && !self.starts_with("<") {
            self.pos = saved;
        }
        self.pos > saved
    }

    fn next_tag_is_inline(&self) -> bool {
        let Some(rest) = self.input[self.pos..].strip_prefix('<') else {
            return false;
        };
        let name: String = rest
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect();
        !name.is_empty() && !Tag::from_name(&name).is_block()
    }

    fn skip_past(&mut self, marker: &str) {
        match self.input[self.pos..].find(marker) {
            Some(offset) => self.pos += offset + marker.len(),
            None => self.pos = self.input.len(),
        }
    }

    /// Move to the next case-insensitive occurrence of `marker` (not past it).
    fn skip_until_ci(&mut self, marker: &str) {
        let haystack = self.input[self.pos..].to_ascii_lowercase();
        match haystack.find(marker) {
            Some(offset) => self.pos += offset,
            None => self.pos = self.input.len(),
        }
    }

    fn starts_with(&self, s: &str) -> bool {
        self.input[self.pos..].starts_with(s)
    }

    fn eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn current_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn advance(&mut self) {
        if let Some(c) = self.current_char() {
            self.pos += c.len_utf8();
        }
    }
}

/// Decode named and numeric character references.
pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest
            .find(';')
            .filter(|&end| end <= 10)
            .and_then(|end| decode_entity(&rest[1..end]).map(|c| (c, end)));
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse().ok()?,
        };
        return char::from_u32(code);
    }
    Some(match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{00A0}',
        "copy" => '\u{00A9}',
        "reg" => '\u{00AE}',
        "euro" => '\u{20AC}',
        "ndash" => '\u{2013}',
        "mdash" => '\u{2014}',
        "hellip" => '\u{2026}',
        "bull" => '\u{2022}',
        _ => return None,
    })
}

/// Children of `<body>`, or all nodes when there is no `<body>`.
pub fn body_children(nodes: &[DomNode]) -> &[DomNode] {
    find_body(nodes).unwrap_or(nodes)
}

fn find_body(nodes: &[DomNode]) -> Option<&[DomNode]> {
    nodes.iter().find_map(|node| match node {
        DomNode::Element(e) if e.tag == Tag::Body => Some(e.children.as_slice()),
        DomNode::Element(e) if e.tag == Tag::Html => find_body(&e.children),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(node: &DomNode) -> &ElementNode {
        match node {
            DomNode::Element(e) => e,
            other => panic!("expected element, got {other:?}"),
        }
    }

    #[test]
    fn parse_nested_inline() {
        let nodes = parse_html("<p>Hello <b>world</b>!</p>");
        assert_eq!(nodes.len(), 1);
        let p = element(&nodes[0]);
        assert_eq!(p.tag, Tag::P);
        assert_eq!(p.children.len(), 3);
        assert_eq!(p.text_content(), "Hello world!");
    }

    #[test]
    fn void_elements_take_no_children() {
        let nodes = parse_html("<p>a<br>b<img src=\"x.png\">c</p>");
        let p = element(&nodes[0]);
        assert_eq!(p.children.len(), 5);
        assert_eq!(element(&p.children[3]).src(), Some("x.png"));
    }

    #[test]
    fn style_and_script_content_is_not_parsed() {
        let html = "<style>p { color: red } <b></style><script>if (a < b) {}</script><p>x</p>";
        let nodes = parse_html(html);
        assert_eq!(nodes.len(), 3);
        assert!(element(&nodes[0]).children.is_empty());
        assert_eq!(element(&nodes[2]).tag, Tag::P);
    }

    #[test]
    fn body_children_unwraps_document() {
        let html = "<!DOCTYPE html><html><head><title>T</title></head><body><h1>A</h1><p>B</p></body></html>";
        let nodes = parse_html(html);
        let body = body_children(&nodes);
        assert_eq!(body.len(), 2);
        assert_eq!(element(&body[0]).tag, Tag::H1);
    }

    #[test]
    fn entities_are_decoded() {
        assert_eq!(decode_entities("a &amp; b &lt;c&gt;"), "a & b <c>");
        assert_eq!(decode_entities("&#65;&#x42;"), "AB");
        assert_eq!(decode_entities("fish & chips"), "fish & chips");
        assert_eq!(decode_entities("&unknown;"), "&unknown;");
    }

    #[test]
    fn table_sections() {
        let html = "<table><thead><tr><th>N</th></tr></thead><tbody><tr><td>1</td></tr></tbody></table>";
        let table = element(&parse_html(html)[0]).clone();
        assert_eq!(table.tag, Tag::Table);
        assert_eq!(table.children.len(), 2);
        assert_eq!(element(&table.children[0]).tag, Tag::Thead);
    }

    #[test]
    fn stray_closing_tags_are_ignored() {
        let nodes = parse_html("</div><p>ok</p>");
        assert_eq!(nodes.len(), 1);
        assert_eq!(element(&nodes[0]).text_content(), "ok");
    }

    #[test]
    fn whitespace_between_inline_elements_is_kept() {
        let p = element(&parse_html("<p><b>a</b> <i>b</i></p>")[0]).clone();
        assert_eq!(p.text_content(), "a b");
        let ul = element(&parse_html("<ul>\n  <li>x</li>\n  <li>y</li>\n</ul>")[0]).clone();
        assert_eq!(ul.children.len(), 2);
    }

    #[test]
    fn lone_angle_bracket_is_text() {
        let nodes = parse_html("<p>1 < 2</p>");
        assert_eq!(element(&nodes[0]).text_content(), "1 < 2");
    }
}
