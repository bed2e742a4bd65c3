//! Post-hoc structural validation of a written EPUB.

use std::collections::HashSet;
use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};

use super::reader::{EpubPackage, read_epub};

/// Check the container invariants every build must satisfy:
///
/// - `mimetype` is the first entry, stored, with the EPUB media type
/// - every spine idref names a manifest item
/// - every manifest href exists in the archive
/// - manifest ids are unique and hrefs are URL-escaped
/// - at most one item carries `cover-image`, exactly one carries `nav`
/// - documents with inline SVG carry `svg`
///
/// Problems are collected and reported together.
pub fn validate(epub: &EpubPackage) -> Result<()> {
    let mut problems = Vec::new();

    if !epub.mimetype_ok {
        problems.push("mimetype must be the first entry, stored uncompressed".to_string());
    }

    let mut ids = HashSet::new();
    for item in &epub.items {
        if !ids.insert(item.id.as_str()) {
            problems.push(format!("duplicate manifest id `{}`", item.id));
        }
        if item.href.chars().any(needs_escape) {
            problems.push(format!("manifest item `{}` has unescaped href `{}`", item.id, item.href));
        }
        if !epub.has_entry(&epub.entry_path(&item.href)) {
            problems.push(format!("manifest item `{}` points at missing file `{}`", item.id, item.href));
        }
    }

    for spine_item in &epub.spine {
        if !ids.contains(spine_item.idref.as_str()) {
            problems.push(format!("spine references unknown item `{}`", spine_item.idref));
        }
    }

    let covers = epub.items.iter().filter(|i| i.has_property("cover-image")).count();
    if covers > 1 {
        problems.push(format!("{covers} items carry cover-image"));
    }

    let navs = epub.items.iter().filter(|i| i.has_property("nav")).count();
    if navs != 1 {
        problems.push(format!("expected exactly one nav item, found {navs}"));
    }

    for id in &epub.svg_documents {
        if epub.item(id).is_some_and(|item| !item.has_property("svg")) {
            problems.push(format!("item `{id}` embeds SVG but lacks the svg property"));
        }
    }

    if problems.is_empty() {
        debug!(items = epub.items.len(), spine = epub.spine.len(), "package valid");
        Ok(())
    } else {
        Err(Error::InvalidEpub(problems.join("; ")))
    }
}

/// ASCII characters that may not appear literally in a URL path.
fn needs_escape(c: char) -> bool {
    c.is_ascii_control() || matches!(c, ' ' | '"' | '<' | '>' | '\\' | '^' | '`' | '{' | '|' | '}')
}

/// Read and validate an EPUB on disk.
pub fn validate_epub<P: AsRef<Path>>(path: P) -> Result<EpubPackage> {
    let epub = read_epub(path)?;
    validate(&epub)?;
    Ok(epub)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epub::reader::PackageItem;
    use crate::package::SpineItem;

    fn item(id: &str, href: &str, properties: Option<&str>) -> PackageItem {
        PackageItem {
            id: id.into(),
            href: href.into(),
            media_type: "application/xhtml+xml".into(),
            properties: properties.map(str::to_string),
        }
    }

    fn valid() -> EpubPackage {
        EpubPackage {
            entries: vec![
                "mimetype".into(),
                "META-INF/container.xml".into(),
                "OEBPS/package.opf".into(),
                "OEBPS/Text/nav.xhtml".into(),
                "OEBPS/Text/chapter-001.xhtml".into(),
            ],
            mimetype_ok: true,
            opf_path: "OEBPS/package.opf".into(),
            items: vec![
                item("nav", "Text/nav.xhtml", Some("nav")),
                item("chapter-001", "Text/chapter-001.xhtml", None),
            ],
            spine: vec![SpineItem { idref: "chapter-001".into(), linear: true }],
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_package() {
        assert!(validate(&valid()).is_ok());
    }

    #[test]
    fn test_dangling_spine_and_missing_file() {
        let mut epub = valid();
        epub.spine.push(SpineItem { idref: "chapter-002".into(), linear: true });
        epub.items.push(item("chapter-003", "Text/chapter-003.xhtml", None));
        let err = validate(&epub).unwrap_err().to_string();
        assert!(err.contains("unknown item `chapter-002`"));
        assert!(err.contains("missing file `Text/chapter-003.xhtml`"));
    }

    #[test]
    fn test_property_counts() {
        let mut epub = valid();
        epub.items[0].properties = None;
        assert!(validate(&epub).unwrap_err().to_string().contains("exactly one nav"));

        let mut epub = valid();
        epub.entries.push("OEBPS/Images/a.jpg".into());
        epub.entries.push("OEBPS/Images/b.jpg".into());
        epub.items.push(item("a", "Images/a.jpg", Some("cover-image")));
        epub.items.push(item("b", "Images/b.jpg", Some("cover-image")));
        assert!(validate(&epub).unwrap_err().to_string().contains("2 items carry cover-image"));
    }

    #[test]
    fn test_svg_documents_need_svg_property() {
        let mut epub = valid();
        epub.svg_documents.push("chapter-001".into());
        let err = validate(&epub).unwrap_err().to_string();
        assert!(err.contains("`chapter-001` embeds SVG"));

        epub.items[1].properties = Some("svg".into());
        assert!(validate(&epub).is_ok());
    }

    #[test]
    fn test_unescaped_href() {
        let mut epub = valid();
        epub.entries.push("OEBPS/Images/口絵 01.png".into());
        epub.items.push(item("img-01", "Images/口絵 01.png", None));
        assert!(validate(&epub).unwrap_err().to_string().contains("unescaped href"));

        epub.items[2].href = "Images/%E5%8F%A3%E7%B5%B5%2001.png".into();
        assert!(validate(&epub).is_ok());
    }

    #[test]
    fn test_mimetype_flag() {
        let mut epub = valid();
        epub.mimetype_ok = false;
        assert!(validate(&epub).is_err());
    }
}
