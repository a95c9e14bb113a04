//! DOCX converter – packages rendered HTML as an alternative-format import
//! chunk. Word lays the HTML out when the document is opened; nothing is
//! flowed here.

use crate::error::Result;
use crate::generator::{ConversionContext, DocumentConverter, DocumentFormat};
use crate::ooxml::{
    content_types_part, relationships_part, Package, XmlPart, CT_CORE_PROPERTIES,
    CT_RELATIONSHIPS, NS_OFFICE_RELATIONSHIPS, REL_CORE_PROPERTIES, REL_OFFICE_DOCUMENT,
};
use crate::options::{derive_size, DocumentMetadata, PageOrientation, ReportOptions};

/// Twentieths of a point per millimetre used for page size and margins.
pub const TWIPS_PER_MM: f64 = 56.7;

const NS_WORDPROCESSING: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const CT_DOCUMENT: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml";
const CT_HTML: &str = "text/html";
const REL_AF_CHUNK: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/aFChunk";

const ALT_CHUNK_ID: &str = "AltChunkId1";
const ALT_CHUNK_PART: &str = "word/afchunk1.html";

/// Convert millimetres to twips, truncating toward zero.
pub fn to_twips(mm: f32) -> u32 {
    (f64::from(mm) * TWIPS_PER_MM) as u32
}

/// Section page setup in twips.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionLayout {
    pub width: u32,
    pub height: u32,
    pub landscape: bool,
    pub margin_top: u32,
    pub margin_right: u32,
    pub margin_bottom: u32,
    pub margin_left: u32,
}

impl SectionLayout {
    pub fn from_options(options: &ReportOptions) -> Self {
        let page = derive_size(options.page_size, options.orientation);
        let m = &options.margins;
        Self {
            width: to_twips(page.width),
            height: to_twips(page.height),
            landscape: options.orientation == PageOrientation::Landscape,
            margin_top: to_twips(m.top),
            margin_right: to_twips(m.right),
            margin_bottom: to_twips(m.bottom),
            margin_left: to_twips(m.left),
        }
    }
}

/// Emits `.docx` packages.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordConverter;

impl WordConverter {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentConverter for WordConverter {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Word
    }

    fn convert(&self, markup: &str, ctx: &ConversionContext<'_>) -> Result<Vec<u8>> {
        let section = ctx
            .advanced
            .then(|| SectionLayout::from_options(ctx.options));
        let metadata = ctx
            .metadata
            .filter(|m| ctx.advanced && !m.is_empty());

        let mut overrides = vec![
            ("/word/document.xml", CT_DOCUMENT),
            ("/word/afchunk1.html", CT_HTML),
        ];
        let mut package_rels = vec![("rId1", REL_OFFICE_DOCUMENT, "word/document.xml")];
        if metadata.is_some() {
            overrides.push(("/docProps/core.xml", CT_CORE_PROPERTIES));
            package_rels.push(("rId2", REL_CORE_PROPERTIES, "docProps/core.xml"));
        }

        let mut package = Package::new();
        package.add_part(
            "[Content_Types].xml",
            &content_types_part(
                &[("rels", CT_RELATIONSHIPS), ("xml", "application/xml")],
                &overrides,
            )?,
        )?;
        package.add_part("_rels/.rels", &relationships_part(&package_rels)?)?;
        package.add_part("word/document.xml", &document_part(section.as_ref())?)?;
        package.add_part(
            "word/_rels/document.xml.rels",
            &relationships_part(&[(ALT_CHUNK_ID, REL_AF_CHUNK, "afchunk1.html")])?,
        )?;
        package.add_part(ALT_CHUNK_PART, markup.as_bytes())?;
        if let Some(meta) = metadata {
            package.add_part("docProps/core.xml", &core_properties_part(meta)?)?;
        }

        let bytes = package.finish()?;
        log::debug!(
            "Packaged DOCX ({} bytes, section properties: {})",
            bytes.len(),
            section.is_some()
        );
        Ok(bytes)
    }
}

fn document_part(section: Option<&SectionLayout>) -> Result<Vec<u8>> {
    let mut xml = XmlPart::new()?;
    xml.start(
        "w:document",
        &[("xmlns:w", NS_WORDPROCESSING), ("xmlns:r", NS_OFFICE_RELATIONSHIPS)],
    )?;
    xml.start("w:body", &[])?;
    xml.empty("w:altChunk", &[("r:id", ALT_CHUNK_ID)])?;
    if let Some(section) = section {
        write_section(&mut xml, section)?;
    }
    xml.end("w:body")?;
    xml.end("w:document")?;
    Ok(xml.into_bytes())
}

/// `w:sectPr` must be the last child of `w:body`, so the imported chunk
/// precedes it.
fn write_section(xml: &mut XmlPart, s: &SectionLayout) -> Result<()> {
    let (w, h) = (s.width.to_string(), s.height.to_string());
    let (top, right, bottom, left) = (
        s.margin_top.to_string(),
        s.margin_right.to_string(),
        s.margin_bottom.to_string(),
        s.margin_left.to_string(),
    );

    xml.start("w:sectPr", &[])?;
    let mut size_attrs = vec![("w:w", w.as_str()), ("w:h", h.as_str())];
    if s.landscape {
        size_attrs.push(("w:orient", "landscape"));
    }
    xml.empty("w:pgSz", &size_attrs)?;
    xml.empty(
        "w:pgMar",
        &[
            ("w:top", top.as_str()),
            ("w:right", right.as_str()),
            ("w:bottom", bottom.as_str()),
            ("w:left", left.as_str()),
            ("w:header", "720"),
            ("w:footer", "720"),
            ("w:gutter", "0"),
        ],
    )?;
    xml.end("w:sectPr")
}

fn core_properties_part(meta: &DocumentMetadata) -> Result<Vec<u8>> {
    let mut xml = XmlPart::new()?;
    xml.start(
        "cp:coreProperties",
        &[
            (
                "xmlns:cp",
                "http://schemas.openxmlformats.org/package/2006/metadata/core-properties",
            ),
            ("xmlns:dc", "http://purl.org/dc/elements/1.1/"),
            ("xmlns:dcterms", "http://purl.org/dc/terms/"),
            ("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance"),
        ],
    )?;
    if let Some(title) = meta.title() {
        xml.leaf("dc:title", &[], title)?;
    }
    if let Some(subject) = meta.subject() {
        xml.leaf("dc:subject", &[], subject)?;
    }
    if let Some(author) = meta.author() {
        xml.leaf("dc:creator", &[], author)?;
    }
    if let Some(keywords) = meta.keywords() {
        xml.leaf("cp:keywords", &[], keywords)?;
    }
    xml.end("cp:coreProperties")?;
    Ok(xml.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{PageMargins, PageSize};
    use std::io::{Cursor, Read};

    fn part(bytes: &[u8], name: &str) -> Option<String> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
        let mut file = archive.by_name(name).ok()?;
        let mut content = String::new();
        file.read_to_string(&mut content).unwrap();
        Some(content)
    }

    #[test]
    fn margins_use_fixed_scale_factor() {
        assert_eq!(to_twips(25.0), 1417);
        assert_eq!(to_twips(10.0), 567);
        assert_eq!(to_twips(0.0), 0);
    }

    #[test]
    fn section_layout_for_a4_portrait() {
        let layout = SectionLayout::from_options(&ReportOptions::default());
        assert_eq!(layout.width, 11907);
        assert_eq!(layout.height, 16839);
        assert!(!layout.landscape);
        assert_eq!(layout.margin_top, 1417);
        assert_eq!(layout.margin_left, 1417);
    }

    #[test]
    fn section_layout_swaps_for_landscape() {
        for size in PageSize::ALL {
            let portrait = SectionLayout::from_options(&ReportOptions::new().with_page_size(size));
            let landscape =
                SectionLayout::from_options(&ReportOptions::new().with_page_size(size).landscape());
            assert_eq!(portrait.width, landscape.height);
            assert_eq!(portrait.height, landscape.width);
            assert!(landscape.landscape);
        }
    }

    #[test]
    fn margins_are_independent() {
        let options = ReportOptions::new().with_margins(PageMargins {
            top: 10.0,
            right: 20.0,
            bottom: 30.0,
            left: 40.0,
        });
        let layout = SectionLayout::from_options(&options);
        assert_eq!(
            (layout.margin_top, layout.margin_right, layout.margin_bottom, layout.margin_left),
            (567, 1134, 1701, 2268)
        );
    }

    #[test]
    fn basic_conversion_embeds_html_chunk_without_section() {
        let options = ReportOptions::default();
        let bytes = WordConverter::new()
            .convert("<h1>Hi</h1>", &ConversionContext::basic(&options))
            .unwrap();
        assert_eq!(&bytes[0..2], b"PK");

        let document = part(&bytes, "word/document.xml").unwrap();
        assert!(document.contains("<w:altChunk r:id=\"AltChunkId1\"/>"));
        assert!(!document.contains("w:sectPr"));
        assert_eq!(part(&bytes, "word/afchunk1.html").unwrap(), "<h1>Hi</h1>");
        assert!(part(&bytes, "docProps/core.xml").is_none());
    }

    #[test]
    fn advanced_conversion_places_section_after_chunk() {
        let options = ReportOptions::default();
        let bytes = WordConverter::new()
            .convert("<p/>", &ConversionContext::advanced(&options, None))
            .unwrap();
        let document = part(&bytes, "word/document.xml").unwrap();
        let chunk = document.find("w:altChunk").unwrap();
        let section = document.find("w:sectPr").unwrap();
        assert!(chunk < section);
        assert!(document.contains("w:w=\"11907\""));
        assert!(document.contains("w:top=\"1417\""));
    }

    #[test]
    fn metadata_fields_are_written_independently() {
        let options = ReportOptions::default();
        let meta = DocumentMetadata::new().with_author("Ada Lovelace");
        let bytes = WordConverter::new()
            .convert("<p/>", &ConversionContext::advanced(&options, Some(&meta)))
            .unwrap();
        let core = part(&bytes, "docProps/core.xml").unwrap();
        assert!(core.contains("<dc:creator>Ada Lovelace</dc:creator>"));
        assert!(!core.contains("dc:title"));
        assert!(!core.contains("dc:subject"));
        assert!(!core.contains("cp:keywords"));
    }

    #[test]
    fn metadata_ignored_by_basic_variant() {
        let options = ReportOptions::default();
        let meta = DocumentMetadata::new().with_title("T");
        let ctx = ConversionContext {
            options: &options,
            metadata: Some(&meta),
            advanced: false,
        };
        let bytes = WordConverter::new().convert("<p/>", &ctx).unwrap();
        assert!(part(&bytes, "docProps/core.xml").is_none());
    }
}
