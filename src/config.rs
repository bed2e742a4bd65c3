//! Build configuration.
//!
//! [`BuildConfig`] follows a builder pattern: `new()` fills in the documented
//! work-directory layout, `with_*` setters override individual pieces.

use std::path::{Path, PathBuf};

/// Reading direction written to the spine's `page-progression-direction`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageProgression {
    Ltr,
    Rtl,
}

impl PageProgression {
    pub fn as_str(self) -> &'static str {
        match self {
            PageProgression::Ltr => "ltr",
            PageProgression::Rtl => "rtl",
        }
    }
}

/// Configuration for one volume build.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Volume work directory holding `manifest.json` and the input trees.
    pub work_dir: PathBuf,
    /// Explicit output path; defaults to `<work>/output/<title>.epub`.
    pub output: Option<PathBuf>,
    /// Source language code (directory name is its upper-case form).
    pub source_lang: String,
    /// Target language code.
    pub target_lang: String,
    /// Directory of raw images, relative to the work directory.
    pub assets_dir: String,
    /// Directory of the raw extraction, relative to the work directory.
    pub raw_dir: String,
    /// Build even when the translation stage is not complete.
    pub force: bool,
    /// Compression level for deflate (0-9, default 6).
    pub compression_level: Option<u32>,
    pub page_progression: Option<PageProgression>,
    /// Fixed `dcterms:modified` value; the current time is used when unset.
    pub modified: Option<String>,
    /// Write the builder block back into the manifest after success.
    pub update_state: bool,
}

impl BuildConfig {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            output: None,
            source_lang: "jp".to_string(),
            target_lang: "en".to_string(),
            assets_dir: "assets".to_string(),
            raw_dir: "_raw".to_string(),
            force: false,
            compression_level: None,
            page_progression: None,
            modified: None,
            update_state: true,
        }
    }

    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn with_languages(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.source_lang = source.into().to_lowercase();
        self.target_lang = target.into().to_lowercase();
        self
    }

    pub fn with_assets_dir(mut self, dir: impl Into<String>) -> Self {
        self.assets_dir = dir.into();
        self
    }

    pub fn with_raw_dir(mut self, dir: impl Into<String>) -> Self {
        self.raw_dir = dir.into();
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.compression_level = Some(level.min(9));
        self
    }

    pub fn with_page_progression(mut self, progression: PageProgression) -> Self {
        self.page_progression = Some(progression);
        self
    }

    pub fn with_modified(mut self, modified: impl Into<String>) -> Self {
        self.modified = Some(modified.into());
        self
    }

    pub fn with_update_state(mut self, update: bool) -> Self {
        self.update_state = update;
        self
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.work_dir.join("manifest.json")
    }

    pub fn source_text_dir(&self) -> PathBuf {
        self.work_dir.join(self.source_lang.to_uppercase())
    }

    pub fn target_text_dir(&self) -> PathBuf {
        self.work_dir.join(self.target_lang.to_uppercase())
    }

    pub fn assets_path(&self) -> PathBuf {
        self.work_dir.join(&self.assets_dir)
    }

    pub fn raw_path(&self) -> PathBuf {
        self.work_dir.join(&self.raw_dir)
    }

    /// Resolve the output path for a volume with the given display title.
    pub fn output_path(&self, title: &str) -> PathBuf {
        match &self.output {
            Some(path) => path.clone(),
            None => self
                .work_dir
                .join("output")
                .join(format!("{}.epub", crate::util::sanitize_filename(title))),
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self::new(Path::new("."))
    }
}
