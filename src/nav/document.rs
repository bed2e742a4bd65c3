use crate::epub::escape_xml;
use crate::epub::xhtml::{document, write_link_list};
use crate::package::{Landmark, TocEntry};

use super::{rebase_to_text, relative_to_text};

/// Render the EPUB3 navigation document (`Text/nav.xhtml`).
pub fn render_nav_document(title: &str, lang: &str, toc: &[TocEntry], landmarks: &[Landmark]) -> String {
    let mut body = String::from("  <nav epub:type=\"toc\" id=\"toc\">\n");
    body.push_str(&format!("    <h1>{}</h1>\n", escape_xml(title)));
    write_link_list(&mut body, &rebase_to_text(toc), 2);
    body.push_str("  </nav>\n");

    if !landmarks.is_empty() {
        body.push_str("  <nav epub:type=\"landmarks\" id=\"landmarks\" hidden=\"hidden\">\n    <ol>\n");
        for landmark in landmarks {
            body.push_str(&format!(
                "      <li><a epub:type=\"{}\" href=\"{}\">{}</a></li>\n",
                landmark.kind.epub_type(),
                escape_xml(&relative_to_text(&landmark.href)),
                escape_xml(&landmark.title)
            ));
        }
        body.push_str("    </ol>\n  </nav>\n");
    }

    document(title, lang, None, None, &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nav::build_landmarks;

    #[test]
    fn test_nav_document() {
        let toc = vec![TocEntry::new("One", "Text/chapter-001.xhtml")];
        let landmarks = build_landmarks(Some("Text/cover.xhtml"), "Text/toc.xhtml", Some("Text/chapter-001.xhtml"));
        let doc = render_nav_document("Contents", "en", &toc, &landmarks);
        assert!(doc.contains("<nav epub:type=\"toc\" id=\"toc\">"));
        assert!(doc.contains("<li><a href=\"chapter-001.xhtml\">One</a></li>"));
        assert!(doc.contains("<a epub:type=\"cover\" href=\"cover.xhtml\">Cover</a>"));
        assert!(doc.contains("epub:type=\"bodymatter\""));
    }
}
