//! Inline emphasis.

use std::sync::LazyLock;

use regex::Regex;

use crate::epub::escape_xml;

static STRONG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*([^*\n]+?)\*\*").expect("valid pattern"));
static EMPHASIS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*([^*\s][^*\n]*?)\*").expect("valid pattern"));

/// Escape a text line for XHTML and turn `**strong**` / `*em*` into markup.
///
/// Unpaired asterisks are left as literal text.
pub fn render_inline(text: &str) -> String {
    let escaped = escape_xml(text);
    let strong = STRONG.replace_all(&escaped, "<strong>$1</strong>");
    EMPHASIS.replace_all(&strong, "<em>$1</em>").into_owned()
}
