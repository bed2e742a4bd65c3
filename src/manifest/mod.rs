//! Manifest normalization.
//!
//! Upstream stages have written the volume manifest in several schema
//! generations (v3.0 through v3.7). This module reads any of them and
//! produces one canonical [`VolumeManifest`]:
//!
//! - [`coerce`]: structural values (maps, lists) to display text
//! - [`resolve`]: ranked per-field fallback chains
//! - [`state`]: writing the builder's pipeline-state block back
//!
//! Chapters come from the top-level `chapters` sequence, else from
//! `structure.chapters`. A manifest with neither is fatal.

pub mod coerce;
pub mod resolve;
pub mod state;

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use coerce::{asset_file, bool_field, first_text, text_field, u32_field};
use resolve::{Field, ManifestView, SOURCE_RULES, TARGET_RULES, resolve};

pub use state::{BuilderState, record_build, write_manifest};

/// Split strategy tag the extractor writes when it cut a chapter at a page
/// boundary instead of a TOC entry.
pub const PAGE_BOUNDARY_SPLIT: &str = "text_page_boundary";

/// A text field in both languages. `target` is never empty for title/author.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LocalizedText {
    pub source: String,
    pub target: String,
}

/// Canonical view of one volume manifest.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VolumeManifest {
    pub schema_version: Option<String>,
    pub title: LocalizedText,
    pub author: LocalizedText,
    pub publisher: LocalizedText,
    pub series: LocalizedText,
    /// Chapters sorted by `toc_order` (stable).
    pub chapters: Vec<ChapterEntry>,
    pub assets: AssetSet,
    /// Present only when the volume has at least two acts.
    pub structure: Option<VolumeStructure>,
    pub state: PipelineState,
}

/// One chapter as the extraction stage recorded it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChapterEntry {
    pub id: String,
    /// Explicit `toc_order`, else the 1-based position in the manifest.
    pub toc_order: u32,
    pub source_file: Option<String>,
    pub target_file: Option<String>,
    pub title: String,
    pub source_title: String,
    pub raw_group: Option<u32>,
    /// Content that precedes the first TOC entry; rendered without heading.
    pub pre_toc: bool,
    pub split_strategy: Option<String>,
}

impl ChapterEntry {
    pub fn is_page_boundary_split(&self) -> bool {
        self.split_strategy.as_deref() == Some(PAGE_BOUNDARY_SPLIT)
    }
}

/// An image reference reduced from a bare file name or a metadata record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssetRef {
    pub file: String,
    pub act: Option<u32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl AssetRef {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            ..Default::default()
        }
    }

    /// File name without any directory prefix.
    pub fn file_name(&self) -> &str {
        self.file.rsplit(['/', '\\']).next().unwrap_or(&self.file)
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        Some((self.width?, self.height?))
    }

    fn from_value(value: &Value) -> Option<Self> {
        let file = asset_file(value)?;
        Some(Self {
            file,
            act: u32_field(value, "act").or_else(|| u32_field(value, "act_number")),
            width: u32_field(value, "width"),
            height: u32_field(value, "height"),
        })
    }
}

/// Every image the manifest knows about.
///
/// Kuchie order is final narrative order and is never reversed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssetSet {
    pub cover: Option<AssetRef>,
    pub kuchie: Vec<AssetRef>,
    pub illustrations: Vec<AssetRef>,
    pub ancillary: Vec<AssetRef>,
}

/// A publisher-defined part of a volume.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Act {
    pub number: u32,
    pub title: String,
    /// First chapter (1-based position in TOC order), inclusive.
    pub first_chapter: u32,
    /// Last chapter, inclusive.
    pub last_chapter: u32,
    /// Kuchie file names this act lists for itself.
    pub kuchie: Vec<String>,
}

impl Act {
    pub fn contains(&self, position: u32) -> bool {
        (self.first_chapter..=self.last_chapter).contains(&position)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VolumeStructure {
    /// Sorted by act number; always two or more.
    pub acts: Vec<Act>,
}

impl VolumeStructure {
    pub fn act(&self, number: u32) -> Option<&Act> {
        self.acts.iter().find(|a| a.number == number)
    }
}

/// Stage name to status, as recorded under `pipeline_state`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineState {
    pub stages: BTreeMap<String, String>,
}

impl PipelineState {
    pub fn status(&self, stage: &str) -> Option<&str> {
        self.stages.get(stage).map(String::as_str)
    }
}

/// Read `manifest.json` as raw JSON.
pub fn load_raw(path: &Path) -> Result<Value> {
    if !path.is_file() {
        return Err(Error::ManifestMissing(path.to_path_buf()));
    }
    let bytes = std::fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Normalize a raw manifest of any known schema.
pub fn normalize(raw: &Value, source_lang: &str, target_lang: &str) -> Result<VolumeManifest> {
    let view = ManifestView::new(raw, target_lang, source_lang);

    let title = resolve_text(&view, Field::Title);
    let author = resolve_text(&view, Field::Author);
    let publisher = resolve_text(&view, Field::Publisher);
    let series = resolve_text(&view, Field::Series);

    let chapters = parse_chapters(raw, source_lang, target_lang)?;
    let assets = parse_assets(raw);
    let structure = parse_structure(raw);

    Ok(VolumeManifest {
        schema_version: text_field(raw, "schema_version").or_else(|| text_field(raw, "version")),
        title,
        author,
        publisher,
        series,
        chapters,
        assets,
        structure,
        state: parse_state(raw),
    })
}

fn resolve_text(view: &ManifestView<'_>, field: Field) -> LocalizedText {
    let target = match resolve(view, field, TARGET_RULES) {
        Some((rule, text)) => {
            debug!(field = field.key(), rule, "resolved manifest field");
            text
        }
        None => field.default_text().to_string(),
    };
    let source = resolve(view, field, SOURCE_RULES)
        .map(|(_, text)| text)
        .unwrap_or_else(|| target.clone());
    LocalizedText { source, target }
}

fn parse_chapters(raw: &Value, source_lang: &str, target_lang: &str) -> Result<Vec<ChapterEntry>> {
    let records = raw
        .get("chapters")
        .and_then(Value::as_array)
        .or_else(|| raw.get("structure")?.get("chapters")?.as_array())
        .ok_or(Error::ChaptersMissing)?;

    let source_keys = [format!("{source_lang}_file"), "source_file".into(), "file".into()];
    let target_keys = [format!("{target_lang}_file"), "translated_file".into()];
    let title_keys = [
        format!("{target_lang}_title"),
        format!("title_{target_lang}"),
        "title_en".into(),
        "title".into(),
    ];
    let source_title_keys = [
        format!("{source_lang}_title"),
        format!("title_{source_lang}"),
        "title".into(),
    ];

    let mut chapters: Vec<ChapterEntry> = records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let position = i as u32 + 1;
            if let Value::String(file) = record {
                return ChapterEntry {
                    id: format!("chapter_{position:02}"),
                    toc_order: position,
                    source_file: Some(file.clone()),
                    ..Default::default()
                };
            }
            let keys = |ks: &[String]| ks.iter().find_map(|k| text_field(record, k));
            ChapterEntry {
                id: text_field(record, "id").unwrap_or_else(|| format!("chapter_{position:02}")),
                toc_order: u32_field(record, "toc_order").unwrap_or(position),
                source_file: keys(&source_keys[..]),
                target_file: keys(&target_keys[..]),
                title: keys(&title_keys[..]).unwrap_or_default(),
                source_title: keys(&source_title_keys[..]).unwrap_or_default(),
                raw_group: u32_field(record, "raw_group_index"),
                pre_toc: bool_field(record, "is_pre_toc_content"),
                split_strategy: text_field(record, "split_strategy"),
            }
        })
        .collect();

    chapters.sort_by_key(|c| c.toc_order);
    Ok(chapters)
}

fn parse_assets(raw: &Value) -> AssetSet {
    let container = raw.get("assets").filter(|v| v.is_object()).unwrap_or(raw);

    let list = |keys: &[&str]| -> Vec<AssetRef> {
        keys.iter()
            .find_map(|k| container.get(*k).and_then(Value::as_array))
            .map(|items| items.iter().filter_map(AssetRef::from_value).collect())
            .unwrap_or_default()
    };

    AssetSet {
        cover: ["cover", "cover_image"]
            .iter()
            .find_map(|k| container.get(*k).and_then(AssetRef::from_value)),
        kuchie: list(&["kuchie", "kuchie_images"]),
        illustrations: list(&["illustrations", "illustration_images"]),
        ancillary: list(&["ancillary", "other_images"]),
    }
}

fn parse_structure(raw: &Value) -> Option<VolumeStructure> {
    let records = raw
        .get("structure")
        .and_then(|s| s.get("acts"))
        .or_else(|| raw.get("acts"))
        .or_else(|| raw.get("volume_structure")?.get("acts"))
        .and_then(Value::as_array)?;

    let mut acts: Vec<Act> = records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let number = u32_field(record, "act_number")
                .or_else(|| u32_field(record, "number"))
                .unwrap_or(i as u32 + 1);
            Act {
                number,
                title: first_text(record, &["title_en", "title"])
                    .unwrap_or_else(|| format!("Act {number}")),
                first_chapter: u32_field(record, "start_chapter").unwrap_or(0),
                last_chapter: u32_field(record, "end_chapter").unwrap_or(0),
                kuchie: record
                    .get("kuchie")
                    .and_then(Value::as_array)
                    .map(|items| items.iter().filter_map(asset_file).collect())
                    .unwrap_or_default(),
            }
        })
        .collect();

    if acts.len() < 2 {
        if !acts.is_empty() {
            debug!("single act recorded, treating volume as single-part");
        }
        return None;
    }

    acts.sort_by_key(|a| a.number);
    for pair in acts.windows(2) {
        if pair[0].number == pair[1].number {
            warn!(act = pair[0].number, "duplicate act number in structure");
        }
    }
    Some(VolumeStructure { acts })
}

fn parse_state(raw: &Value) -> PipelineState {
    let stages = raw
        .get("pipeline_state")
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .filter_map(|(stage, block)| {
                    let status = match block {
                        Value::String(s) => s.clone(),
                        other => text_field(other, "status")?,
                    };
                    Some((stage.clone(), status))
                })
                .collect()
        })
        .unwrap_or_default();
    PipelineState { stages }
}
