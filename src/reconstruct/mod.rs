//! Chapter reconstruction.
//!
//! A malformed source TOC makes the extraction stage cut one real chapter
//! into several page-sized pieces, tagging each with the raw group it came
//! from. This module decides whether those pieces should be stitched back
//! together and produces the ordered [`RawGroupBatch`] list the converter
//! consumes.
//!
//! Both passes work over the chapter slice as an arena: the first assigns a
//! [`GroupKey`] to every index, the second folds runs of equal adjacent keys
//! into batches of indices. Neither pass mutates shared state.

pub mod inspect;

use serde::Serialize;
use tracing::info;

use crate::manifest::ChapterEntry;
pub use inspect::{RawExtraction, StructureFeatures, StructureSource};

/// Grouping key of one chapter entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupKey {
    /// Entry split from raw extraction group `n`.
    Raw(u32),
    /// Ungrouped entry at this arena index.
    Standalone(usize),
}

/// One or more chapter entries emitted as a single EPUB chapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawGroupBatch {
    /// Indices into the chapter arena, in original order. Never empty.
    pub entries: Vec<usize>,
}

impl RawGroupBatch {
    pub fn first(&self) -> usize {
        self.entries[0]
    }

    pub fn resolve<'a>(&'a self, arena: &'a [ChapterEntry]) -> impl Iterator<Item = &'a ChapterEntry> + 'a {
        self.entries.iter().filter_map(|&i| arena.get(i))
    }
}

/// Why reconstruction did or did not merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", content = "features", rename_all = "snake_case")]
pub enum MergeDecision {
    /// No page-boundary tags, or no group spans more than one entry.
    NotCandidate,
    /// Candidate, but the raw extraction could not be inspected.
    Uninspectable,
    /// Candidate, inspected, policy said keep the split.
    Declined(StructureFeatures),
    /// Candidate, inspected, policy said merge.
    Merged(StructureFeatures),
}

impl MergeDecision {
    pub fn merged(&self) -> bool {
        matches!(self, MergeDecision::Merged(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reconstruction {
    pub batches: Vec<RawGroupBatch>,
    pub decision: MergeDecision,
}

/// Pass one: the grouping key of every entry.
pub fn assign_group_keys(chapters: &[ChapterEntry]) -> Vec<GroupKey> {
    chapters
        .iter()
        .enumerate()
        .map(|(i, c)| match c.raw_group {
            Some(group) => GroupKey::Raw(group),
            None => GroupKey::Standalone(i),
        })
        .collect()
}

/// Pass two: fold runs of equal adjacent keys into batches.
pub fn fold_adjacent(keys: &[GroupKey]) -> Vec<RawGroupBatch> {
    keys.chunk_by(|a, b| a == b)
        .scan(0usize, |start, run| {
            let batch = RawGroupBatch {
                entries: (*start..*start + run.len()).collect(),
            };
            *start += run.len();
            Some(batch)
        })
        .collect()
}

/// One batch per entry, the shape used whenever no merge happens.
pub fn one_per_entry(len: usize) -> Vec<RawGroupBatch> {
    (0..len).map(|i| RawGroupBatch { entries: vec![i] }).collect()
}

/// Whether the chapter list looks over-split at all: at least one
/// page-boundary tag, and fewer distinct groups than entries.
pub fn is_merge_candidate(chapters: &[ChapterEntry]) -> bool {
    let tagged = chapters.iter().any(ChapterEntry::is_page_boundary_split);
    let group_count = fold_adjacent(&assign_group_keys(chapters)).len();
    tagged && group_count < chapters.len()
}

/// Decide and build the batch list for `chapters`.
///
/// The raw extraction is only consulted for candidates. The decision is
/// logged whichever way it goes.
pub fn reconstruct(chapters: &[ChapterEntry], source: &dyn StructureSource) -> Reconstruction {
    if !is_merge_candidate(chapters) {
        return Reconstruction {
            batches: one_per_entry(chapters.len()),
            decision: MergeDecision::NotCandidate,
        };
    }

    let Some(features) = source.features() else {
        info!(
            chapters = chapters.len(),
            "split tags present but raw extraction unavailable, keeping chapters as extracted"
        );
        return Reconstruction {
            batches: one_per_entry(chapters.len()),
            decision: MergeDecision::Uninspectable,
        };
    };

    if features.should_merge() {
        let batches = fold_adjacent(&assign_group_keys(chapters));
        info!(
            toc_entries = features.toc_entries,
            text_pages = features.text_page_count,
            detected_titles = features.detected_title_count,
            before = chapters.len(),
            after = batches.len(),
            "malformed TOC over single-content source, merging split chapters"
        );
        Reconstruction {
            batches,
            decision: MergeDecision::Merged(features),
        }
    } else {
        info!(
            toc_entries = features.toc_entries,
            text_pages = features.text_page_count,
            detected_titles = features.detected_title_count,
            malformed_toc = features.malformed_toc(),
            single_content = features.single_content(),
            "split tags present but source structure is sound, keeping chapters as extracted"
        );
        Reconstruction {
            batches: one_per_entry(chapters.len()),
            decision: MergeDecision::Declined(features),
        }
    }
}
