//! Work-directory fixtures shared by the integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use serde_json::Value;
use tempfile::TempDir;
use tsuzuri::BuildConfig;

pub const MODIFIED: &str = "2026-01-01T00:00:00Z";

/// A volume work directory in a temp dir.
pub struct WorkDir {
    dir: TempDir,
}

impl WorkDir {
    pub fn new(manifest: Value) -> Self {
        let work = Self {
            dir: TempDir::new().expect("temp dir"),
        };
        work.write("manifest.json", serde_json::to_string_pretty(&manifest).unwrap().as_bytes());
        work
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, rel: &str, data: &[u8]) -> PathBuf {
        let path = self.dir.path().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, data).unwrap();
        path
    }

    /// Write a target-language chapter body.
    pub fn translated(&self, file: &str, body: &str) {
        self.write(&format!("EN/{file}"), body.as_bytes());
    }

    /// Write a PNG with the given dimensions below `assets/`.
    pub fn image(&self, rel: &str, width: u32, height: u32) {
        self.write(&format!("assets/{rel}"), &png(width, height));
    }

    pub fn config(&self) -> BuildConfig {
        BuildConfig::new(self.path()).with_modified(MODIFIED)
    }

    pub fn manifest(&self) -> Value {
        let text = std::fs::read_to_string(self.path().join("manifest.json")).unwrap();
        serde_json::from_str(&text).unwrap()
    }
}

/// Minimal PNG header with the given dimensions.
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let mut data = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13];
    data.extend_from_slice(b"IHDR");
    data.extend_from_slice(&width.to_be_bytes());
    data.extend_from_slice(&height.to_be_bytes());
    data.extend_from_slice(&[8, 2, 0, 0, 0]);
    data
}

/// A chapter record in the v3.0 shape.
pub fn chapter(n: u32, title: &str) -> Value {
    serde_json::json!({
        "id": format!("chapter_{n:02}"),
        "toc_order": n,
        "jp_file": format!("chapter_{n:02}.md"),
        "en_file": format!("chapter_{n:02}_en.md"),
        "title_en": title,
    })
}

/// Body text long enough to look like prose.
pub fn body(n: u32) -> String {
    format!("# Chapter {n}\n\nThe first paragraph of chapter {n}.\n\nThe second paragraph.\n")
}
