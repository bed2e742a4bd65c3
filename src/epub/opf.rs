//! OPF package document generation.

use crate::package::Package;

use super::escape_xml;

/// Generate `package.opf` for an assembled package.
///
/// Manifest items and spine are written in package order, so the same
/// package always produces the same document.
pub fn generate_opf(package: &Package) -> String {
    let metadata = &package.metadata;
    let mut opf = String::new();

    opf.push_str(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="BookId">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:opf="http://www.idpf.org/2007/opf">
"#,
    );

    opf.push_str(&format!(
        "    <dc:identifier id=\"BookId\">{}</dc:identifier>\n",
        escape_xml(&metadata.identifier)
    ));

    opf.push_str(&format!(
        "    <dc:title id=\"title\">{}</dc:title>\n",
        escape_xml(&metadata.title)
    ));
    if let Some(ref original) = metadata.original_title
        && !original.is_empty()
        && original != &metadata.title
    {
        opf.push_str(&format!(
            "    <meta refines=\"#title\" property=\"alternate-script\"{}>{}</meta>\n",
            metadata
                .original_language
                .as_deref()
                .map(|lang| format!(" xml:lang=\"{}\"", escape_xml(lang)))
                .unwrap_or_default(),
            escape_xml(original)
        ));
    }

    for (i, author) in metadata.authors.iter().enumerate() {
        let creator_id = format!("creator{}", i + 1);
        opf.push_str(&format!(
            "    <dc:creator id=\"{}\">{}</dc:creator>\n",
            creator_id,
            escape_xml(author)
        ));
        opf.push_str(&format!(
            "    <meta refines=\"#{}\" property=\"role\" scheme=\"marc:relators\">aut</meta>\n",
            creator_id
        ));
    }

    let language = if metadata.language.is_empty() { "en" } else { &metadata.language };
    opf.push_str(&format!("    <dc:language>{}</dc:language>\n", escape_xml(language)));

    if let Some(ref publisher) = metadata.publisher {
        opf.push_str(&format!("    <dc:publisher>{}</dc:publisher>\n", escape_xml(publisher)));
    }

    if let Some(ref series) = metadata.series {
        opf.push_str(&format!(
            "    <meta property=\"belongs-to-collection\" id=\"series\">{}</meta>\n",
            escape_xml(series)
        ));
        opf.push_str("    <meta refines=\"#series\" property=\"collection-type\">series</meta>\n");
    }

    opf.push_str(&format!(
        "    <meta property=\"dcterms:modified\">{}</meta>\n",
        escape_xml(&metadata.modified)
    ));

    if let Some(ref cover_id) = metadata.cover_id {
        opf.push_str(&format!("    <meta name=\"cover\" content=\"{}\"/>\n", escape_xml(cover_id)));
    }

    opf.push_str("  </metadata>\n  <manifest>\n");

    for item in &package.items {
        let properties = item
            .properties
            .as_deref()
            .map(|p| format!(" properties=\"{}\"", escape_xml(p)))
            .unwrap_or_default();
        opf.push_str(&format!(
            "    <item id=\"{}\" href=\"{}\" media-type=\"{}\"{}/>\n",
            escape_xml(&item.id),
            escape_xml(&item.url()),
            escape_xml(&item.media_type),
            properties
        ));
    }

    opf.push_str("  </manifest>\n");

    match package.page_progression {
        Some(direction) => opf.push_str(&format!(
            "  <spine toc=\"ncx\" page-progression-direction=\"{}\">\n",
            direction.as_str()
        )),
        None => opf.push_str("  <spine toc=\"ncx\">\n"),
    }
    for item in &package.spine {
        let linear = if item.linear { "" } else { " linear=\"no\"" };
        opf.push_str(&format!("    <itemref idref=\"{}\"{}/>\n", escape_xml(&item.idref), linear));
    }
    opf.push_str("  </spine>\n</package>\n");
    opf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PageProgression;
    use crate::package::{Metadata, NCX, XHTML};

    fn sample() -> Package {
        let mut package = Package::new();
        package.metadata = Metadata::new("Test Vol")
            .with_author("Author & Co")
            .with_language("en")
            .with_identifier("urn:uuid:0");
        package.metadata.modified = "2026-01-01T00:00:00Z".into();
        package.metadata.series = Some("Series".into());
        package.add_document("ncx", "toc.ncx", NCX, String::new());
        package.add_document("cover", "Text/cover.xhtml", XHTML, String::new());
        package.add_document("chapter-001", "Text/chapter-001.xhtml", XHTML, String::new());
        package.add_spine_item("cover", false);
        package.add_spine_item("chapter-001", true);
        package
    }

    #[test]
    fn test_spine_linearity() {
        let opf = generate_opf(&sample());
        assert!(opf.contains("<itemref idref=\"cover\" linear=\"no\"/>"));
        assert!(opf.contains("<itemref idref=\"chapter-001\"/>"));
        assert!(opf.contains("<spine toc=\"ncx\">"));
    }

    #[test]
    fn test_metadata_fields() {
        let opf = generate_opf(&sample());
        assert!(opf.contains("<dc:creator id=\"creator1\">Author &amp; Co</dc:creator>"));
        assert!(opf.contains("property=\"belongs-to-collection\" id=\"series\">Series</meta>"));
        assert!(opf.contains("<meta property=\"dcterms:modified\">2026-01-01T00:00:00Z</meta>"));
        assert!(!opf.contains("name=\"cover\""));
        assert!(!opf.contains("<dc:publisher>"));
    }

    #[test]
    fn test_page_progression_and_cover_meta() {
        let mut package = sample();
        package.page_progression = Some(PageProgression::Rtl);
        package.metadata.cover_id = Some("cover-image".into());
        let opf = generate_opf(&package);
        assert!(opf.contains("page-progression-direction=\"rtl\""));
        assert!(opf.contains("<meta name=\"cover\" content=\"cover-image\"/>"));
    }

    #[test]
    fn test_alternate_script_title() {
        let mut package = sample();
        package.metadata.original_title = Some("テスト".into());
        package.metadata.original_language = Some("ja".into());
        let opf = generate_opf(&package);
        assert!(opf.contains("<meta refines=\"#title\" property=\"alternate-script\" xml:lang=\"ja\">テスト</meta>"));
    }

    #[test]
    fn test_svg_property_and_encoded_hrefs() {
        let mut package = sample();
        package.add_document("kuchie-001", "Text/kuchie-001.xhtml", XHTML, "<body>\n  <svg/>\n</body>".into());
        package.add_file("img-01", "Images/口絵 01.png", "image/png", std::path::PathBuf::from("/x.png"));
        let opf = generate_opf(&package);
        assert!(opf.contains(
            "<item id=\"kuchie-001\" href=\"Text/kuchie-001.xhtml\" media-type=\"application/xhtml+xml\" properties=\"svg\"/>"
        ));
        assert!(opf.contains("href=\"Images/%E5%8F%A3%E7%B5%B5%2001.png\""));
        assert!(!opf.contains("口絵"));
    }
}
