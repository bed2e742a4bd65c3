//! Raw-structure inspection.
//!
//! Looks at the untouched extraction of the source document and reduces it
//! to a [`StructureFeatures`] record. The merge policy is a single predicate
//! over that record, kept apart from the file walking so it can be tested
//! with plain numbers.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::manifest::coerce::first_text;
use crate::util::{decode_text, extract_xml_encoding};

/// A TOC with this many entries or fewer cannot describe a real volume.
pub const MALFORMED_TOC_MAX_ENTRIES: usize = 3;
/// Text pages needed before a document counts as one continuous body.
pub const SINGLE_CONTENT_MIN_TEXT_PAGES: usize = 4;
/// More detected headings than this means the chapters were real.
pub const SINGLE_CONTENT_MAX_TITLES: usize = 1;
/// Non-whitespace characters a page needs to count as text-bearing.
pub const TEXT_PAGE_MIN_CHARS: usize = 20;
/// Leading text lines scanned for a heading.
const HEADING_SCAN_LINES: usize = 5;

static HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)^(?:",
        r"(?:chapter|ch\.)\s*(?:\d+|[ivxlc]+)\b",
        r"|(?:prologue|epilogue|interlude|afterword|intermission)\b",
        r"|第[0-9０-９一二三四五六七八九十百千〇零]+[章話幕部]",
        r"|プロローグ|エピローグ|あとがき|幕間|間章|序章|終章",
        r")",
    ))
    .expect("heading pattern is valid")
});

static SCRIPT_OR_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style)[^>]*>.*?</(script|style)>").expect("valid pattern")
});
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid pattern"));
static IMAGE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<(img|image|svg)\b").expect("valid pattern"));

/// Named features of a raw extraction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StructureFeatures {
    pub toc_entries: usize,
    pub text_page_count: usize,
    pub detected_title_count: usize,
    pub image_page_count: usize,
}

impl StructureFeatures {
    pub fn malformed_toc(&self) -> bool {
        self.toc_entries <= MALFORMED_TOC_MAX_ENTRIES
    }

    pub fn single_content(&self) -> bool {
        self.text_page_count >= SINGLE_CONTENT_MIN_TEXT_PAGES
            && self.detected_title_count <= SINGLE_CONTENT_MAX_TITLES
    }

    /// The merge policy: both signals must agree.
    pub fn should_merge(&self) -> bool {
        self.malformed_toc() && self.single_content()
    }
}

/// Per-page features.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageFeatures {
    pub has_text: bool,
    pub has_image: bool,
    pub has_heading: bool,
}

/// Anything that can report structure features for a volume.
pub trait StructureSource {
    /// `None` when the source cannot be inspected.
    fn features(&self) -> Option<StructureFeatures>;
}

impl StructureSource for StructureFeatures {
    fn features(&self) -> Option<StructureFeatures> {
        Some(*self)
    }
}

impl StructureSource for Option<StructureFeatures> {
    fn features(&self) -> Option<StructureFeatures> {
        *self
    }
}

/// True when `line` looks like a chapter heading.
pub fn is_heading_line(line: &str) -> bool {
    HEADING.is_match(line.trim())
}

/// Strip markup, returning the text content line by line.
pub fn strip_markup(html: &str) -> String {
    let without_code = SCRIPT_OR_STYLE.replace_all(html, "");
    TAG.replace_all(&without_code, "\n")
        .replace("&nbsp;", " ")
        .replace("&#160;", " ")
}

pub fn page_features(html: &str) -> PageFeatures {
    let text = strip_markup(html);
    let char_count = text.chars().filter(|c| !c.is_whitespace()).count();
    let has_heading = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .take(HEADING_SCAN_LINES)
        .any(is_heading_line);
    PageFeatures {
        has_text: char_count >= TEXT_PAGE_MIN_CHARS,
        has_image: IMAGE_TAG.is_match(html),
        has_heading,
    }
}

/// Fold page features in reading order into the volume record.
pub fn summarize(toc_entries: usize, pages: impl IntoIterator<Item = PageFeatures>) -> StructureFeatures {
    let mut features = StructureFeatures {
        toc_entries,
        ..Default::default()
    };
    for page in pages {
        if page.has_image && !page.has_text {
            features.image_page_count += 1;
        }
        if page.has_text {
            features.text_page_count += 1;
            if page.has_heading {
                features.detected_title_count += 1;
            }
        }
    }
    features
}

/// The raw extraction directory of one volume.
#[derive(Debug, Clone)]
pub struct RawExtraction {
    root: PathBuf,
}

impl RawExtraction {
    /// `None` when the directory does not exist.
    pub fn open(root: &Path) -> Option<Self> {
        root.is_dir().then(|| Self {
            root: root.to_path_buf(),
        })
    }

    /// Count entries in `toc.json`, including nested children.
    pub fn toc_entries(&self) -> Result<usize> {
        let path = self.root.join("toc.json");
        if !path.is_file() {
            return Err(Error::MissingElement(format!("{}", path.display())));
        }
        let toc: Value = serde_json::from_slice(&std::fs::read(&path)?)?;
        let entries = match &toc {
            Value::Array(items) => Some(items),
            Value::Object(_) => ["entries", "toc", "navigation"]
                .iter()
                .find_map(|k| toc.get(*k).and_then(Value::as_array)),
            _ => None,
        };
        Ok(entries.map(|items| count_entries(items)).unwrap_or(0))
    }

    /// Page files in reading order: `spine.json` if present, else the sorted
    /// markup files of the directory.
    pub fn pages(&self) -> Result<Vec<PathBuf>> {
        let spine_path = self.root.join("spine.json");
        if spine_path.is_file() {
            let spine: Value = serde_json::from_slice(&std::fs::read(&spine_path)?)?;
            let pages = spine
                .as_array()
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|item| match item {
                            Value::String(s) => Some(s.clone()),
                            other => first_text(other, &["href", "path", "file"]),
                        })
                        .map(|rel| self.root.join(rel))
                        .collect()
                })
                .unwrap_or_default();
            return Ok(pages);
        }

        let mut pages: Vec<PathBuf> = std::fs::read_dir(&self.root)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| matches!(e.to_lowercase().as_str(), "xhtml" | "html" | "htm"))
            })
            .collect();
        pages.sort();
        Ok(pages)
    }

    pub fn inspect(&self) -> Result<StructureFeatures> {
        let toc_entries = self.toc_entries()?;
        let mut page_list = Vec::new();
        for path in self.pages()? {
            let bytes = match std::fs::read(&path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    debug!(page = %path.display(), error = %e, "skipping unreadable raw page");
                    continue;
                }
            };
            let html = decode_text(&bytes, extract_xml_encoding(&bytes));
            page_list.push(page_features(&html));
        }
        Ok(summarize(toc_entries, page_list))
    }
}

impl StructureSource for RawExtraction {
    fn features(&self) -> Option<StructureFeatures> {
        match self.inspect() {
            Ok(features) => Some(features),
            Err(e) => {
                debug!(root = %self.root.display(), error = %e, "raw extraction not inspectable");
                None
            }
        }
    }
}

fn count_entries(items: &[Value]) -> usize {
    items
        .iter()
        .map(|item| {
            1 + item
                .get("children")
                .and_then(Value::as_array)
                .map(|c| count_entries(c))
                .unwrap_or(0)
        })
        .sum()
}
