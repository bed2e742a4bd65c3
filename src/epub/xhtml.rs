//! XHTML page templates and the package stylesheet.

use crate::assets::Orientation;
use crate::package::TocEntry;

use super::escape_xml;

/// Href of the stylesheet as seen from `Text/`.
pub const STYLESHEET_HREF: &str = "../Styles/stylesheet.css";

pub const STYLESHEET: &str = r#"@charset "UTF-8";

body {
  margin: 0 5%;
  line-height: 1.6;
  text-align: justify;
}

h1, h2 {
  text-align: center;
  line-height: 1.3;
  margin: 2em 0 1.5em;
  page-break-after: avoid;
}

p {
  margin: 0;
  text-indent: 1em;
}

p + p {
  margin-top: 0.8em;
}

p.blank {
  text-indent: 0;
  margin: 0;
}

div.illustration {
  text-align: center;
  margin: 1em 0;
  page-break-inside: avoid;
}

div.illustration img {
  max-width: 100%;
  max-height: 95vh;
}

body.cover, body.kuchie {
  margin: 0;
  padding: 0;
  text-align: center;
}

div.cover img, div.kuchie img {
  max-width: 100%;
  max-height: 100vh;
}

svg.full-page {
  width: 100%;
  height: 100vh;
}

body.act {
  text-align: center;
}

body.act h1 {
  margin-top: 35%;
}

nav ol {
  list-style-type: none;
  padding-left: 0;
}

nav ol ol {
  padding-left: 1.5em;
}
"#;

/// Wrap a body fragment into a complete XHTML5 document.
pub fn document(title: &str, lang: &str, body_class: Option<&str>, epub_type: Option<&str>, body: &str) -> String {
    let mut attrs = String::new();
    if let Some(class) = body_class {
        attrs.push_str(&format!(" class=\"{}\"", class));
    }
    if let Some(ty) = epub_type {
        attrs.push_str(&format!(" epub:type=\"{}\"", ty));
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops" lang="{lang}" xml:lang="{lang}">
<head>
  <meta charset="UTF-8"/>
  <title>{title}</title>
  <link rel="stylesheet" type="text/css" href="{css}"/>
</head>
<body{attrs}>
{body}</body>
</html>
"#,
        lang = escape_xml(lang),
        title = escape_xml(title),
        css = STYLESHEET_HREF,
    )
}

/// Full-page image scaled inside an SVG viewport.
fn svg_image(href: &str, (width, height): (u32, u32)) -> String {
    format!(
        "  <svg xmlns=\"http://www.w3.org/2000/svg\" xmlns:xlink=\"http://www.w3.org/1999/xlink\" \
         class=\"full-page\" version=\"1.1\" viewBox=\"0 0 {width} {height}\" \
         preserveAspectRatio=\"xMidYMid meet\">\n    \
         <image width=\"{width}\" height=\"{height}\" xlink:href=\"{href}\"/>\n  </svg>\n",
        href = escape_xml(href),
    )
}

fn img_block(class: &str, href: &str, alt: &str, img_class: Option<&str>) -> String {
    let img_class = img_class.map(|c| format!(" class=\"{}\"", c)).unwrap_or_default();
    format!(
        "  <div class=\"{class}\"><img{img_class} src=\"{}\" alt=\"{}\"/></div>\n",
        escape_xml(href),
        escape_xml(alt)
    )
}

/// Cover page. `image_href` is relative to `Text/`.
pub fn cover_page(title: &str, lang: &str, image_href: &str, dimensions: Option<(u32, u32)>) -> String {
    let body = match dimensions {
        Some(dims) => svg_image(image_href, dims),
        None => img_block("cover", image_href, title, None),
    };
    document(title, lang, Some("cover"), Some("cover"), &body)
}

/// One kuchie plate. Landscape plates scale inside an SVG viewport so they
/// fill a rotated screen; portrait plates are a plain centered image.
pub fn kuchie_page(
    title: &str,
    lang: &str,
    image_href: &str,
    orientation: Orientation,
    dimensions: Option<(u32, u32)>,
) -> String {
    let body = match (orientation, dimensions) {
        (Orientation::Horizontal, Some(dims)) => svg_image(image_href, dims),
        (Orientation::Horizontal, None) => img_block("kuchie", image_href, "", Some("kuchie-horizontal")),
        (Orientation::Vertical, _) => img_block("kuchie", image_href, "", Some("kuchie-vertical")),
    };
    document(title, lang, Some("kuchie"), None, &body)
}

/// Separator page opening an act.
pub fn act_page(title: &str, lang: &str) -> String {
    let body = format!("  <h1>{}</h1>\n", escape_xml(title));
    document(title, lang, Some("act"), Some("part"), &body)
}

/// Chapter document. `heading` is omitted for pre-TOC content.
pub fn chapter_page(title: &str, lang: &str, heading: Option<&str>, body_html: &str) -> String {
    let mut body = String::from("  <section epub:type=\"chapter\">\n");
    if let Some(heading) = heading {
        body.push_str(&format!("    <h2>{}</h2>\n", escape_xml(heading)));
    }
    body.push_str(body_html);
    body.push_str("  </section>\n");
    document(title, lang, None, Some("bodymatter"), &body)
}

/// The in-book contents page. Entry hrefs are relative to `Text/`.
pub fn toc_page(title: &str, lang: &str, entries: &[TocEntry]) -> String {
    let mut body = format!("  <h1>{}</h1>\n", escape_xml(title));
    body.push_str("  <nav epub:type=\"toc\">\n");
    write_link_list(&mut body, entries, 2);
    body.push_str("  </nav>\n");
    document(title, lang, Some("toc"), Some("frontmatter"), &body)
}

/// Nested `<ol>` of links, shared by the contents page and the nav document.
pub fn write_link_list(out: &mut String, entries: &[TocEntry], indent: usize) {
    let pad = "  ".repeat(indent);
    out.push_str(&format!("{pad}<ol>\n"));
    for entry in entries {
        out.push_str(&format!(
            "{pad}  <li><a href=\"{}\">{}</a>",
            escape_xml(&entry.href),
            escape_xml(&entry.title)
        ));
        if entry.children.is_empty() {
            out.push_str("</li>\n");
        } else {
            out.push('\n');
            write_link_list(out, &entry.children, indent + 2);
            out.push_str(&format!("{pad}  </li>\n"));
        }
    }
    out.push_str(&format!("{pad}</ol>\n"));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_shell() {
        let doc = document("A & B", "en", Some("cover"), Some("cover"), "  <p>x</p>\n");
        assert!(doc.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(doc.contains("<title>A &amp; B</title>"));
        assert!(doc.contains("<body class=\"cover\" epub:type=\"cover\">"));
        assert!(doc.contains("href=\"../Styles/stylesheet.css\""));
    }

    #[test]
    fn test_kuchie_templates_differ_by_orientation() {
        let wide = kuchie_page("K", "en", "../Images/k1.jpg", Orientation::Horizontal, Some((2400, 1700)));
        let tall = kuchie_page("K", "en", "../Images/k2.jpg", Orientation::Vertical, Some((1200, 1700)));
        assert!(wide.contains("viewBox=\"0 0 2400 1700\""));
        assert!(wide.contains("xlink:href=\"../Images/k1.jpg\""));
        assert!(!tall.contains("<svg"));
        assert!(tall.contains("class=\"kuchie-vertical\" src=\"../Images/k2.jpg\""));
    }

    #[test]
    fn test_chapter_heading_optional() {
        let with = chapter_page("One", "en", Some("One"), "    <p>a</p>\n");
        let without = chapter_page("Prelude", "en", None, "    <p>a</p>\n");
        assert!(with.contains("<h2>One</h2>"));
        assert!(!without.contains("<h2>"));
    }

    #[test]
    fn test_nested_link_list() {
        let entries = vec![
            TocEntry::new("Act 1", "chapter-001.xhtml").with_child(TocEntry::new("One", "chapter-001.xhtml")),
            TocEntry::new("Act 2", "act-2.xhtml"),
        ];
        let mut out = String::new();
        write_link_list(&mut out, &entries, 0);
        assert_eq!(out.matches("<ol>").count(), 2);
        assert!(out.contains("<li><a href=\"act-2.xhtml\">Act 2</a></li>"));
    }
}
