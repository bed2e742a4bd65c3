//! # tsuzuri
//!
//! Assembles translated light-novel volumes into EPUB3 packages.
//!
//! A volume lives in a work directory: a `manifest.json` written by the
//! upstream pipeline, per-chapter markdown in the source and target
//! languages, raw images, and the raw extraction of the source book.
//! [`build_volume`] turns that directory into one validated `.epub`.
//!
//! ## Quick Start
//!
//! ```no_run
//! use tsuzuri::{BuildConfig, build_volume};
//!
//! let report = build_volume(&BuildConfig::new("work/volume-01"));
//! match report.output() {
//!     Some(path) => println!("wrote {}", path.display()),
//!     None => eprintln!("build failed: {:?}", report.error()),
//! }
//! ```
//!
//! ## Pipeline
//!
//! - [`manifest`] resolves one canonical [`VolumeManifest`] from any of the
//!   historical manifest schemas
//! - [`reconstruct`] decides whether over-split chapters are merged back
//! - [`convert`] turns markdown bodies into paragraph units
//! - [`assets`] locates the cover, kuchie plates and illustrations
//! - [`assemble`] and [`nav`] lay out the package and its navigation
//! - [`epub`] stages, zips and validates the result

pub mod assemble;
pub mod assets;
pub mod build;
pub mod config;
pub mod convert;
pub mod epub;
pub mod error;
pub mod manifest;
pub mod nav;
pub mod package;
pub mod reconstruct;
pub(crate) mod util;

pub use assemble::{Assembler, Assembly, ChapterDocument};
pub use assets::{AssetResolver, ResolvedAssets, ResolvedImage};
pub use build::{BuildOutcome, BuildReport, Inspection, build_volume, inspect_volume};
pub use config::{BuildConfig, PageProgression};
pub use epub::{read_epub, validate_epub};
pub use error::{Error, Result};
pub use manifest::{ChapterEntry, VolumeManifest, normalize};
pub use package::{Landmark, ManifestItem, Metadata, Package, SpineItem, TocEntry};
pub use reconstruct::{MergeDecision, RawGroupBatch, Reconstruction, reconstruct};
