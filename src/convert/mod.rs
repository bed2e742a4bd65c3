//! Markdown body to paragraph units.
//!
//! Translated chapters arrive as line-oriented markdown: one paragraph per
//! line, blank lines for spacing. [`convert_body`] turns a (possibly
//! concatenated) body into [`ParagraphUnit`]s; [`render_units`] turns those
//! into the XHTML body fragment of a chapter document.

mod inline;

use std::sync::LazyLock;

use regex::Regex;

pub use inline::render_inline;

/// Longest run of consecutive blank units kept.
pub const MAX_BLANK_RUN: usize = 5;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(?:",
        r"\[(?i:illustration|image)(?::\s*(?P<named>[^\]]+?))?\s*\]",
        r"|!\[[^\]]*\]\((?P<linked>[^)\s]+)\)",
        r")$",
    ))
    .expect("placeholder pattern is valid")
});

/// One semantic unit of a chapter body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParagraphUnit {
    Text(String),
    Blank,
    /// An illustration placeholder kept in the body; the file name when given.
    Illustration(Option<String>),
}

/// Join the bodies of one batch with a blank-line separator, in order.
pub fn join_bodies<S: AsRef<str>>(bodies: &[S]) -> String {
    bodies
        .iter()
        .map(|b| b.as_ref().trim_end_matches(['\n', '\r']))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// If `line` is an illustration placeholder, its (optional) file name.
pub fn parse_placeholder(line: &str) -> Option<Option<String>> {
    let caps = PLACEHOLDER.captures(line.trim())?;
    let name = caps
        .name("named")
        .or_else(|| caps.name("linked"))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty());
    Some(name)
}

fn is_heading(line: &str) -> bool {
    line.trim_start().starts_with('#')
}

/// Convert a chapter body into paragraph units.
///
/// - heading lines are dropped (the title is rendered separately)
/// - placeholders before the first text line are decorative and dropped;
///   later ones are kept
/// - blank runs are capped at [`MAX_BLANK_RUN`]; leading and trailing
///   blanks are trimmed
pub fn convert_body(body: &str) -> Vec<ParagraphUnit> {
    let mut units = Vec::new();
    let mut seen_text = false;
    let mut blank_run = 0usize;

    for raw in body.lines() {
        let line = raw.trim();

        if line.is_empty() {
            if units.is_empty() {
                continue;
            }
            if blank_run < MAX_BLANK_RUN {
                units.push(ParagraphUnit::Blank);
            }
            blank_run += 1;
            continue;
        }

        if is_heading(line) {
            continue;
        }

        if let Some(name) = parse_placeholder(line) {
            if seen_text {
                units.push(ParagraphUnit::Illustration(name));
                blank_run = 0;
            }
            continue;
        }

        units.push(ParagraphUnit::Text(line.to_string()));
        seen_text = true;
        blank_run = 0;
    }

    while units.last() == Some(&ParagraphUnit::Blank) {
        units.pop();
    }
    units
}

/// File names of every kept illustration, in order.
pub fn illustration_refs(units: &[ParagraphUnit]) -> impl Iterator<Item = &str> {
    units.iter().filter_map(|u| match u {
        ParagraphUnit::Illustration(Some(name)) => Some(name.as_str()),
        _ => None,
    })
}

/// Render units as XHTML body markup.
///
/// A single blank between two blocks is the ordinary paragraph gap and
/// emits nothing; each further blank emits a spacer paragraph. Blanks before
/// the first block emit nothing.
/// `image_href` maps an illustration file name to its package-relative href;
/// unresolvable illustrations are skipped.
pub fn render_units<F>(units: &[ParagraphUnit], mut image_href: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    let mut out = String::new();
    let mut pending_blanks = 0usize;
    let mut at_start = true;

    for unit in units {
        match unit {
            ParagraphUnit::Blank => {
                pending_blanks += 1;
                continue;
            }
            ParagraphUnit::Text(text) => {
                flush_spacers(&mut out, pending_blanks, at_start);
                out.push_str("    <p>");
                out.push_str(&render_inline(text));
                out.push_str("</p>\n");
            }
            ParagraphUnit::Illustration(name) => {
                let Some(href) = name.as_deref().and_then(&mut image_href) else {
                    continue;
                };
                flush_spacers(&mut out, pending_blanks, at_start);
                out.push_str("    <div class=\"illustration\"><img src=\"");
                out.push_str(&crate::epub::escape_xml(&href));
                out.push_str("\" alt=\"\"/></div>\n");
            }
        }
        pending_blanks = 0;
        at_start = false;
    }
    out
}

fn flush_spacers(out: &mut String, blanks: usize, at_start: bool) {
    let spacers = if at_start { 0 } else { blanks.saturating_sub(1) };
    for _ in 0..spacers {
        out.push_str("    <p class=\"blank\">&#160;</p>\n");
    }
}
