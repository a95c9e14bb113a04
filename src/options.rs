//! Page-layout options shared by every generator, the page geometry table,
//! and optional document metadata.
//!
//! All lengths are millimetres.

use serde::{Deserialize, Serialize};

/// Paper size of the generated document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PageSize {
    /// 210 × 297 mm (default).
    #[default]
    A4,
    /// 148 × 210 mm.
    A5,
    /// 8.5 × 11 in.
    Letter,
    /// 8.5 × 14 in.
    Legal,
}

impl PageSize {
    /// All supported sizes, in declaration order.
    pub const ALL: [PageSize; 4] = [PageSize::A4, PageSize::A5, PageSize::Letter, PageSize::Legal];

    /// Portrait `(width, height)` in millimetres.
    pub fn portrait_mm(self) -> (f32, f32) {
        match self {
            PageSize::A4 => (210.0, 297.0),
            PageSize::A5 => (148.0, 210.0),
            PageSize::Letter => (215.9, 279.4),
            PageSize::Legal => (215.9, 355.6),
        }
    }

    /// Parse a case-insensitive size name such as `"a4"` or `"Letter"`.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "a4" => Some(PageSize::A4),
            "a5" => Some(PageSize::A5),
            "letter" => Some(PageSize::Letter),
            "legal" => Some(PageSize::Legal),
            _ => None,
        }
    }
}

/// Page orientation for the generated document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PageOrientation {
    /// Portrait mode: height > width (default).
    #[default]
    Portrait,
    /// Landscape mode: width > height.
    Landscape,
}

/// Four independent page margins.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageMargins {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl PageMargins {
    /// The same margin on all four sides.
    pub fn uniform(value: f32) -> Self {
        Self {
            top: value,
            right: value,
            bottom: value,
            left: value,
        }
    }

    /// Fail unless every margin is a finite, non-negative length.
    pub fn validate(&self) -> crate::Result<()> {
        let sides = [
            ("top", self.top),
            ("right", self.right),
            ("bottom", self.bottom),
            ("left", self.left),
        ];
        match sides.iter().find(|(_, mm)| !mm.is_finite() || *mm < 0.0) {
            Some((side, mm)) => Err(crate::Error::Argument(format!(
                "{side} margin must be a non-negative length, got {mm}"
            ))),
            None => Ok(()),
        }
    }
}

impl Default for PageMargins {
    fn default() -> Self {
        Self::uniform(25.0)
    }
}

/// Physical page dimensions after applying orientation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageDimensions {
    pub width: f32,
    pub height: f32,
}

/// Derive the physical page size for a paper size and orientation.
///
/// `Landscape` is `Portrait` with width and height swapped.
pub fn derive_size(page_size: PageSize, orientation: PageOrientation) -> PageDimensions {
    let (w, h) = page_size.portrait_mm();
    match orientation {
        PageOrientation::Portrait => PageDimensions {
            width: w,
            height: h,
        },
        PageOrientation::Landscape => PageDimensions {
            width: h,
            height: w,
        },
    }
}

/// Configuration for a single generation call.
///
/// Built once and never mutated afterwards; the `with_*` methods consume the
/// value and return a new one.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportOptions {
    pub page_size: PageSize,
    pub orientation: PageOrientation,
    pub margins: PageMargins,
}

impl ReportOptions {
    /// Create options with the defaults (A4, portrait, 25 mm margins).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the paper size.
    pub fn with_page_size(mut self, page_size: PageSize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Set the orientation.
    pub fn with_orientation(mut self, orientation: PageOrientation) -> Self {
        self.orientation = orientation;
        self
    }

    /// Shorthand for landscape orientation.
    pub fn landscape(self) -> Self {
        self.with_orientation(PageOrientation::Landscape)
    }

    /// Set all four margins.
    pub fn with_margins(mut self, margins: PageMargins) -> Self {
        self.margins = margins;
        self
    }

    /// Page dimensions for these options.
    pub fn page_dimensions(&self) -> PageDimensions {
        derive_size(self.page_size, self.orientation)
    }

    /// Check the values a converter cannot honour.
    pub fn validate(&self) -> crate::Result<()> {
        self.margins.validate()
    }

    /// Load options from a JSON document; missing keys take their defaults.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        let options: Self = serde_json::from_str(json)
            .map_err(|e| crate::Error::Argument(format!("invalid options: {e}")))?;
        options.validate()?;
        Ok(options)
    }
}

/// Optional document properties. Each field is applied on its own; absent
/// (or empty) fields leave the converter's default untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<String>,
}

impl DocumentMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_keywords(mut self, keywords: impl Into<String>) -> Self {
        self.keywords = Some(keywords.into());
        self
    }

    /// Title, if present and non-empty.
    pub fn title(&self) -> Option<&str> {
        present(&self.title)
    }

    /// Author, if present and non-empty.
    pub fn author(&self) -> Option<&str> {
        present(&self.author)
    }

    /// Subject, if present and non-empty.
    pub fn subject(&self) -> Option<&str> {
        present(&self.subject)
    }

    /// Keywords, if present and non-empty.
    pub fn keywords(&self) -> Option<&str> {
        present(&self.keywords)
    }

    /// True when no field would be applied.
    pub fn is_empty(&self) -> bool {
        self.title().is_none()
            && self.author().is_none()
            && self.subject().is_none()
            && self.keywords().is_none()
    }
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}
