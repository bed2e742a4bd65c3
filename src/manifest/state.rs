//! Pipeline-state bookkeeping for the builder stage.

use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::Result;

/// The block written to `pipeline_state.builder` after a successful build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuilderState {
    pub status: String,
    pub timestamp: String,
    pub output_file: String,
    pub chapters_built: usize,
    pub images_included: usize,
}

impl BuilderState {
    pub fn completed(output_file: impl Into<String>, chapters: usize, images: usize) -> Self {
        Self {
            status: "completed".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            output_file: output_file.into(),
            chapters_built: chapters,
            images_included: images,
        }
    }
}

/// Insert `state` as `pipeline_state.builder`, leaving every other key of
/// the raw manifest untouched.
pub fn record_build(raw: &mut Value, state: &BuilderState) -> Result<()> {
    let block = serde_json::to_value(state)?;
    if !raw.is_object() {
        *raw = Value::Object(Map::new());
    }
    let Some(root) = raw.as_object_mut() else {
        return Ok(());
    };
    let pipeline = root
        .entry("pipeline_state")
        .or_insert_with(|| Value::Object(Map::new()));
    if !pipeline.is_object() {
        *pipeline = Value::Object(Map::new());
    }
    if let Value::Object(stages) = pipeline {
        stages.insert("builder".to_string(), block);
    }
    Ok(())
}

/// Write the raw manifest back as pretty-printed JSON.
///
/// The new content goes to a sibling temp file first and is renamed over
/// the original, so an interrupted write never truncates the manifest.
pub fn write_manifest(path: &Path, raw: &Value) -> Result<()> {
    let mut text = serde_json::to_string_pretty(raw)?;
    text.push('\n');
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, text)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
