//! Volume build orchestration.
//!
//! [`build_volume`] runs the whole pipeline for one work directory:
//! normalize the manifest, reconstruct chapter batches, read and convert
//! their bodies, resolve assets, assemble, stage into a temporary
//! directory, zip, validate, and record the result in the manifest.
//! Nothing escapes as an error: the caller gets a [`BuildReport`].

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, error, info, info_span, warn};

use crate::assemble::{Assembler, ChapterDocument};
use crate::assets::AssetResolver;
use crate::config::BuildConfig;
use crate::convert::{convert_body, join_bodies};
use crate::epub::{WriterOptions, package_epub, validate_epub};
use crate::error::{Error, Result};
use crate::manifest::{self, BuilderState, ChapterEntry, VolumeManifest};
use crate::reconstruct::{RawExtraction, RawGroupBatch, Reconstruction, StructureFeatures, reconstruct};
use crate::util::decode_text;

/// Upstream stage whose completion a build requires.
pub const TRANSLATOR_STAGE: &str = "translator";
/// Stage this crate records itself as.
pub const BUILDER_STAGE: &str = "builder";

/// How a build ended.
#[derive(Debug)]
pub enum BuildOutcome {
    Succeeded {
        output: PathBuf,
        chapters: usize,
        images: usize,
        spine_items: usize,
        merged: bool,
    },
    Failed {
        error: Error,
    },
}

/// Structured result of [`build_volume`].
#[derive(Debug)]
pub struct BuildReport {
    pub work_dir: PathBuf,
    /// Resolved target title, when the manifest got that far.
    pub title: Option<String>,
    pub outcome: BuildOutcome,
}

impl BuildReport {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, BuildOutcome::Succeeded { .. })
    }

    pub fn output(&self) -> Option<&Path> {
        match &self.outcome {
            BuildOutcome::Succeeded { output, .. } => Some(output),
            BuildOutcome::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&Error> {
        match &self.outcome {
            BuildOutcome::Failed { error } => Some(error),
            BuildOutcome::Succeeded { .. } => None,
        }
    }
}

/// Build one volume. Fatal errors are logged and returned inside the report.
pub fn build_volume(config: &BuildConfig) -> BuildReport {
    let span = info_span!("build", work_dir = %config.work_dir.display());
    let _enter = span.enter();

    let mut title = None;
    let outcome = match run(config, &mut title) {
        Ok(outcome) => outcome,
        Err(error) => {
            error!(error = %error, details = ?error, "build failed");
            BuildOutcome::Failed { error }
        }
    };

    BuildReport {
        work_dir: config.work_dir.clone(),
        title,
        outcome,
    }
}

fn run(config: &BuildConfig, title: &mut Option<String>) -> Result<BuildOutcome> {
    let manifest_path = config.manifest_path();
    let mut raw = manifest::load_raw(&manifest_path)?;
    let volume = manifest::normalize(&raw, &config.source_lang, &config.target_lang)?;
    *title = Some(volume.title.target.clone());
    info!(
        schema = volume.schema_version.as_deref().unwrap_or("unknown"),
        title = %volume.title.target,
        chapters = volume.chapters.len(),
        acts = volume.structure.as_ref().map(|s| s.acts.len()).unwrap_or(1),
        "manifest loaded"
    );

    check_upstream(&volume, config.force)?;

    let reconstruction = reconstruct_chapters(config, &volume);
    let documents = load_documents(config, &volume.chapters, &reconstruction.batches);
    if documents.is_empty() {
        return Err(Error::NoContent);
    }

    let assets = AssetResolver::new(config.assets_path()).resolve(&volume.assets, volume.structure.as_ref());
    info!(
        cover = assets.cover.is_some(),
        kuchie = assets.kuchie.len(),
        illustrations = assets.illustrations.len(),
        "assets resolved"
    );

    let modified = config
        .modified
        .clone()
        .unwrap_or_else(|| chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string());
    let assembly = Assembler::new(&volume, &assets)
        .with_language(&config.target_lang)
        .with_source_language(&config.source_lang)
        .with_page_progression(config.page_progression)
        .with_modified(modified)
        .assemble(&documents);

    let output = config.output_path(&volume.title.target);
    let staging = tempfile::Builder::new().prefix("tsuzuri-").tempdir()?;
    package_epub(
        &assembly.package,
        staging.path(),
        &output,
        &WriterOptions {
            compression_level: config.compression_level,
        },
    )?;
    drop(staging);

    if let Err(e) = validate_epub(&output) {
        if let Err(remove) = std::fs::remove_file(&output) {
            debug!(error = %remove, "could not remove invalid output");
        }
        return Err(e);
    }

    if config.update_state {
        let file_name = output
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let state = BuilderState::completed(file_name, assembly.chapters, assembly.images);
        manifest::record_build(&mut raw, &state)?;
        manifest::write_manifest(&manifest_path, &raw)?;
    }

    info!(
        output = %output.display(),
        chapters = assembly.chapters,
        images = assembly.images,
        spine = assembly.package.spine.len(),
        "volume built"
    );

    Ok(BuildOutcome::Succeeded {
        output,
        chapters: assembly.chapters,
        images: assembly.images,
        spine_items: assembly.package.spine.len(),
        merged: reconstruction.decision.merged(),
    })
}

/// The translation stage must be complete unless forced. Manifests that
/// predate pipeline tracking carry no upstream stages and are accepted.
fn check_upstream(volume: &VolumeManifest, force: bool) -> Result<()> {
    if volume.state.stages.keys().all(|stage| stage == BUILDER_STAGE) {
        debug!("manifest carries no pipeline state, skipping upstream check");
        return Ok(());
    }
    match volume.state.status(TRANSLATOR_STAGE) {
        Some("completed") => Ok(()),
        status => {
            let status = status.unwrap_or("missing").to_string();
            if force {
                warn!(stage = TRANSLATOR_STAGE, %status, "upstream incomplete, building anyway");
                Ok(())
            } else {
                Err(Error::UpstreamIncomplete {
                    stage: TRANSLATOR_STAGE.to_string(),
                    status,
                })
            }
        }
    }
}

fn reconstruct_chapters(config: &BuildConfig, volume: &VolumeManifest) -> Reconstruction {
    match RawExtraction::open(&config.raw_path()) {
        Some(raw) => reconstruct(&volume.chapters, &raw),
        None => reconstruct(&volume.chapters, &None::<StructureFeatures>),
    }
}

/// Read and convert every batch. Batches whose files are all missing are
/// skipped.
fn load_documents(config: &BuildConfig, chapters: &[ChapterEntry], batches: &[RawGroupBatch]) -> Vec<ChapterDocument> {
    let mut documents = Vec::with_capacity(batches.len());
    for batch in batches {
        let entries: Vec<&ChapterEntry> = batch.resolve(chapters).collect();
        let Some(first) = entries.first() else {
            continue;
        };

        let bodies: Vec<String> = entries.iter().filter_map(|entry| read_body(config, entry)).collect();
        if bodies.is_empty() {
            warn!(chapter = %first.id, "no readable file for chapter, skipping");
            continue;
        }

        let title = if first.title.is_empty() {
            first.source_title.clone()
        } else {
            first.title.clone()
        };
        documents.push(ChapterDocument {
            title,
            navigable: !first.pre_toc,
            position: batch.first() as u32 + 1,
            units: convert_body(&join_bodies(&bodies)),
            sources: entries.iter().map(|e| e.id.clone()).collect(),
        });
    }
    documents
}

/// Body of one chapter: the target-language file, else the source file.
fn read_body(config: &BuildConfig, entry: &ChapterEntry) -> Option<String> {
    let target_dir = config.target_text_dir();
    let target = entry
        .target_file
        .as_deref()
        .or(entry.source_file.as_deref())
        .map(|file| target_dir.join(file));

    if let Some(path) = target.as_deref()
        && let Some(body) = read_text(path)
    {
        return Some(body);
    }

    let source = entry.source_file.as_deref().map(|file| config.source_text_dir().join(file));
    if let Some(path) = source.as_deref()
        && let Some(body) = read_text(path)
    {
        warn!(chapter = %entry.id, file = %path.display(), "target-language file missing, using source text");
        return Some(body);
    }

    warn!(
        chapter = %entry.id,
        target = ?entry.target_file,
        source = ?entry.source_file,
        "chapter file not found"
    );
    None
}

fn read_text(path: &Path) -> Option<String> {
    if !path.is_file() {
        return None;
    }
    match std::fs::read(path) {
        Ok(bytes) => Some(decode_text(&bytes, None).into_owned()),
        Err(e) => {
            warn!(file = %path.display(), error = %e, "chapter file unreadable");
            None
        }
    }
}

/// What a build would do, without writing anything.
#[derive(Debug, Serialize)]
pub struct Inspection {
    pub manifest: VolumeManifest,
    pub reconstruction: Reconstruction,
    pub raw_available: bool,
}

pub fn inspect_volume(config: &BuildConfig) -> Result<Inspection> {
    let raw = manifest::load_raw(&config.manifest_path())?;
    let volume = manifest::normalize(&raw, &config.source_lang, &config.target_lang)?;
    let reconstruction = reconstruct_chapters(config, &volume);
    Ok(Inspection {
        raw_available: config.raw_path().is_dir(),
        manifest: volume,
        reconstruction,
    })
}
