//! Navigation builder.
//!
//! Turns the assembler's navigable targets into the human table of contents
//! (flat, or nested one level by act), the landmarks, and the two
//! navigation documents readers use: the EPUB3 nav document and the legacy
//! NCX, which is always flat.

mod document;
mod ncx;

use crate::package::{Landmark, LandmarkType, TocEntry};

pub use document::render_nav_document;
pub use ncx::generate_ncx;

/// A chapter that appears in navigation, in reading order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavTarget {
    pub title: String,
    /// Path relative to `OEBPS/`.
    pub href: String,
    pub act: u32,
}

/// An act as navigation sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActHeading {
    pub number: u32,
    pub title: String,
    /// Separator page, when the act has one (every act after the first).
    pub separator_href: Option<String>,
}

/// Build the table of contents.
///
/// Without acts the result is one entry per target. With acts, each act
/// becomes a parent whose link reuses its first chapter's target; an act
/// with no navigable chapters links to its separator page, or is left out
/// when it has none.
pub fn build_toc(targets: &[NavTarget], acts: Option<&[ActHeading]>) -> Vec<TocEntry> {
    let Some(acts) = acts else {
        return targets.iter().map(|t| TocEntry::new(&t.title, &t.href)).collect();
    };

    acts.iter()
        .filter_map(|act| {
            let children: Vec<TocEntry> = targets
                .iter()
                .filter(|t| t.act == act.number)
                .map(|t| TocEntry::new(&t.title, &t.href))
                .collect();
            let href = children
                .first()
                .map(|c| c.href.clone())
                .or_else(|| act.separator_href.clone())?;
            Some(TocEntry {
                title: act.title.clone(),
                href,
                children,
            })
        })
        .collect()
}

/// Landmarks for the cover, the contents page and the start of the body.
pub fn build_landmarks(cover: Option<&str>, toc: &str, body_start: Option<&str>) -> Vec<Landmark> {
    let mut landmarks = Vec::with_capacity(3);
    if let Some(href) = cover {
        landmarks.push(Landmark {
            kind: LandmarkType::Cover,
            title: "Cover".into(),
            href: href.into(),
        });
    }
    landmarks.push(Landmark {
        kind: LandmarkType::Toc,
        title: "Table of Contents".into(),
        href: toc.into(),
    });
    if let Some(href) = body_start {
        landmarks.push(Landmark {
            kind: LandmarkType::BodyMatter,
            title: "Start of Content".into(),
            href: href.into(),
        });
    }
    landmarks
}

/// The NCX view of a table of contents: leaf entries in reading order.
pub fn flatten_toc(toc: &[TocEntry]) -> Vec<TocEntry> {
    toc.iter()
        .flat_map(|entry| entry.flatten())
        .filter(|entry| entry.children.is_empty())
        .map(|entry| TocEntry::new(&entry.title, &entry.href))
        .collect()
}

/// Rewrite an `OEBPS/`-relative href for a document living in `Text/`.
pub fn relative_to_text(href: &str) -> String {
    match href.strip_prefix("Text/") {
        Some(rest) => rest.to_string(),
        None => format!("../{href}"),
    }
}

/// [`relative_to_text`] applied to a whole tree.
pub fn rebase_to_text(entries: &[TocEntry]) -> Vec<TocEntry> {
    entries
        .iter()
        .map(|e| TocEntry {
            title: e.title.clone(),
            href: relative_to_text(&e.href),
            children: rebase_to_text(&e.children),
        })
        .collect()
}
