//! In-memory EPUB package.
//!
//! [`Package`] is what the assembler produces and the packager consumes:
//! metadata, the ordered manifest items (each carrying its content or the
//! file it is copied from), the spine, the navigation tree and landmarks.

use std::path::PathBuf;

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

use crate::config::PageProgression;

pub const XHTML: &str = "application/xhtml+xml";
pub const CSS: &str = "text/css";
pub const NCX: &str = "application/x-dtbncx+xml";

/// Characters escaped when a package path becomes a URL reference. `/` is
/// kept as the segment separator.
const HREF_ESCAPE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// URL reference for a path inside the package.
pub fn encode_href(path: &str) -> String {
    utf8_percent_encode(path, HREF_ESCAPE).to_string()
}

/// True when an XHTML document embeds SVG markup inline.
pub fn has_inline_svg(content: &str) -> bool {
    content.contains("<svg")
}

/// An assembled EPUB package.
#[derive(Debug, Clone, Default)]
pub struct Package {
    pub metadata: Metadata,
    /// Manifest items in package order.
    pub items: Vec<ManifestItem>,
    pub spine: Vec<SpineItem>,
    pub toc: Vec<TocEntry>,
    pub landmarks: Vec<Landmark>,
    pub page_progression: Option<PageProgression>,
}

/// Package metadata (Dublin Core + EPUB3 refinements)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub title: String,
    /// Source-language title, written as an `alternate-script` refinement.
    pub original_title: Option<String>,
    pub authors: Vec<String>,
    pub language: String,
    pub original_language: Option<String>,
    pub identifier: String,
    pub publisher: Option<String>,
    pub series: Option<String>,
    pub modified: String,
    /// Manifest id of the item carrying `cover-image`.
    pub cover_id: Option<String>,
}

/// Where an item's bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemSource {
    /// Generated document.
    Inline(String),
    /// Copied from disk.
    File(PathBuf),
}

/// A manifest entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestItem {
    pub id: String,
    /// Path relative to `OEBPS/`, unencoded. See [`ManifestItem::url`].
    pub href: String,
    pub media_type: String,
    pub properties: Option<String>,
    pub source: ItemSource,
}

impl ManifestItem {
    pub fn has_property(&self, property: &str) -> bool {
        self.properties
            .as_deref()
            .is_some_and(|p| p.split_ascii_whitespace().any(|x| x == property))
    }

    pub fn add_property(&mut self, property: &str) {
        if self.has_property(property) {
            return;
        }
        self.properties = Some(match self.properties.take() {
            Some(existing) => format!("{existing} {property}"),
            None => property.to_string(),
        });
    }

    /// The href as written into the OPF.
    pub fn url(&self) -> String {
        encode_href(&self.href)
    }

    pub fn is_image(&self) -> bool {
        self.media_type.starts_with("image/")
    }
}

/// An item in the reading order (spine)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpineItem {
    pub idref: String,
    pub linear: bool,
}

/// A table of contents entry (hierarchical)
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TocEntry {
    pub title: String,
    /// Path relative to `OEBPS/`.
    pub href: String,
    pub children: Vec<TocEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandmarkType {
    Cover,
    Toc,
    BodyMatter,
}

impl LandmarkType {
    pub fn epub_type(self) -> &'static str {
        match self {
            LandmarkType::Cover => "cover",
            LandmarkType::Toc => "toc",
            LandmarkType::BodyMatter => "bodymatter",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Landmark {
    pub kind: LandmarkType,
    pub title: String,
    pub href: String,
}

impl Package {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a generated document to the manifest.
    pub fn add_document(
        &mut self,
        id: impl Into<String>,
        href: impl Into<String>,
        media_type: impl Into<String>,
        content: String,
    ) -> &mut ManifestItem {
        let media_type = media_type.into();
        let svg = media_type == XHTML && has_inline_svg(&content);
        let item = self.push_item(id.into(), href.into(), media_type, ItemSource::Inline(content));
        if svg {
            item.add_property("svg");
        }
        item
    }

    /// Add a file copied from disk to the manifest.
    pub fn add_file(
        &mut self,
        id: impl Into<String>,
        href: impl Into<String>,
        media_type: impl Into<String>,
        source: PathBuf,
    ) -> &mut ManifestItem {
        self.push_item(id.into(), href.into(), media_type.into(), ItemSource::File(source))
    }

    fn push_item(&mut self, id: String, href: String, media_type: String, source: ItemSource) -> &mut ManifestItem {
        self.items.push(ManifestItem {
            id,
            href,
            media_type,
            properties: None,
            source,
        });
        let last = self.items.len() - 1;
        &mut self.items[last]
    }

    /// Add a spine item
    pub fn add_spine_item(&mut self, idref: impl Into<String>, linear: bool) {
        self.spine.push(SpineItem {
            idref: idref.into(),
            linear,
        });
    }

    pub fn item(&self, id: &str) -> Option<&ManifestItem> {
        self.items.iter().find(|i| i.id == id)
    }

    pub fn item_mut(&mut self, id: &str) -> Option<&mut ManifestItem> {
        self.items.iter_mut().find(|i| i.id == id)
    }

    pub fn images(&self) -> impl Iterator<Item = &ManifestItem> {
        self.items.iter().filter(|i| i.is_image())
    }
}

impl Metadata {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.authors.push(author.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = identifier.into();
        self
    }
}

impl TocEntry {
    pub fn new(title: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            href: href.into(),
            children: Vec::new(),
        }
    }

    pub fn with_child(mut self, child: TocEntry) -> Self {
        self.children.push(child);
        self
    }

    /// This entry followed by all descendants, depth first.
    pub fn flatten(&self) -> Vec<&TocEntry> {
        let mut out = vec![self];
        for child in &self.children {
            out.extend(child.flatten());
        }
        out
    }
}

/// Deterministic `urn:uuid:` identifier derived from title and author, so
/// rebuilding the same volume yields the same package identity.
pub fn derive_identifier(title: &str, author: &str) -> String {
    let digest = sha1_smol::Sha1::from(format!("{title}\n{author}")).digest().bytes();
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    // Name-based UUID: version 5, RFC 4122 variant
    bytes[6] = (bytes[6] & 0x0f) | 0x50;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    format!(
        "urn:uuid:{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_builder() {
        let metadata = Metadata::new("Test Title")
            .with_author("Author One")
            .with_language("en")
            .with_identifier("urn:uuid:12345");

        assert_eq!(metadata.title, "Test Title");
        assert_eq!(metadata.authors, vec!["Author One"]);
        assert_eq!(metadata.language, "en");
        assert_eq!(metadata.identifier, "urn:uuid:12345");
    }

    #[test]
    fn test_items_and_properties() {
        let mut package = Package::new();
        package
            .add_document("nav", "Text/nav.xhtml", XHTML, String::new())
            .properties = Some("nav".into());
        package.add_file("cover-image", "Images/cover.jpg", "image/jpeg", PathBuf::from("/x/cover.jpg"));
        package.add_spine_item("nav", false);

        assert!(package.item("nav").unwrap().has_property("nav"));
        assert_eq!(package.images().count(), 1);
        assert!(!package.spine[0].linear);
    }

    #[test]
    fn test_inline_svg_documents_get_svg_property() {
        let mut package = Package::new();
        let item = package.add_document("cover", "Text/cover.xhtml", XHTML, "<body><svg/></body>".into());
        assert_eq!(item.properties.as_deref(), Some("svg"));
        item.add_property("svg");
        item.add_property("nav");
        assert_eq!(item.properties.as_deref(), Some("svg nav"));

        let plain = package.add_document("chapter-001", "Text/chapter-001.xhtml", XHTML, "<p/>".into());
        assert!(plain.properties.is_none());
    }

    #[test]
    fn test_href_encoding() {
        assert_eq!(encode_href("Images/k1.png"), "Images/k1.png");
        assert_eq!(encode_href("Images/口絵 01.png"), "Images/%E5%8F%A3%E7%B5%B5%2001.png");
        assert_eq!(encode_href("Images/a#b?.jpg"), "Images/a%23b%3F.jpg");
    }

    #[test]
    fn test_flatten() {
        let toc = TocEntry::new("Act 1", "a.xhtml")
            .with_child(TocEntry::new("One", "a.xhtml"))
            .with_child(TocEntry::new("Two", "b.xhtml"));
        let titles: Vec<_> = toc.flatten().iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, ["Act 1", "One", "Two"]);
    }

    #[test]
    fn test_identifier_is_stable() {
        let a = derive_identifier("Test Vol", "Author");
        assert_eq!(a, derive_identifier("Test Vol", "Author"));
        assert_ne!(a, derive_identifier("Test Vol 2", "Author"));
        assert!(a.starts_with("urn:uuid:"));
        assert_eq!(a.len(), "urn:uuid:".len() + 36);
        assert_eq!(&a[23..24], "5");
    }
}
