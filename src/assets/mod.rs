//! Asset resolution.
//!
//! Finds the cover, kuchie (frontispiece plates), illustrations and
//! ancillary images of a volume on disk, assigns each a stable package id
//! and file name, and partitions kuchie by act for multi-act volumes.
//!
//! Lookup follows the directory conventions the extraction stage has used
//! over time: the assets root, then `kuchie/`, `illustrations/` and
//! `images/` below it.

mod patterns;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::manifest::{AssetRef, AssetSet, VolumeStructure};
use crate::package::encode_href;
use crate::util::{detect_media_format, extract_image_dimensions, has_image_extension, sanitize_id};

pub use patterns::{is_composite_cover, matches_publisher_pattern};

/// Subdirectories searched below the assets root, in order.
pub const LOOKUP_DIRS: &[&str] = &["", "kuchie", "illustrations", "images"];

/// Conventional names of the single front cover.
pub const COVER_CANDIDATES: &[&str] = &["cover.jpg", "cover.jpeg", "cover.png", "cover.webp"];

/// Manifest id reserved for the front cover image.
pub const COVER_IMAGE_ID: &str = "cover-image";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

impl Orientation {
    /// Landscape when wider than tall; portrait (the plate default) otherwise.
    pub fn from_dimensions(dims: Option<(u32, u32)>) -> Self {
        match dims {
            Some((w, h)) if w > h => Orientation::Horizontal,
            _ => Orientation::Vertical,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageRole {
    Cover,
    Kuchie,
    Illustration,
    Ancillary,
}

/// An image located on disk and ready to package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImage {
    pub id: String,
    /// File name inside `OEBPS/Images/`.
    pub package_name: String,
    /// Name as the manifest or directory listed it.
    pub original_name: String,
    pub source: PathBuf,
    pub media_type: &'static str,
    pub role: ImageRole,
    /// Act the image belongs to; always 1 for single-act volumes.
    pub act: u32,
    pub dimensions: Option<(u32, u32)>,
}

impl ResolvedImage {
    pub fn orientation(&self) -> Orientation {
        Orientation::from_dimensions(self.dimensions)
    }

    /// Package path, relative to `OEBPS/`.
    pub fn path(&self) -> String {
        format!("Images/{}", self.package_name)
    }

    /// URL reference to the image, relative to `OEBPS/`.
    pub fn href(&self) -> String {
        encode_href(&self.path())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedAssets {
    pub cover: Option<ResolvedImage>,
    /// Narrative order, never reversed.
    pub kuchie: Vec<ResolvedImage>,
    pub illustrations: Vec<ResolvedImage>,
    pub ancillary: Vec<ResolvedImage>,
}

impl ResolvedAssets {
    pub fn kuchie_for_act(&self, act: u32) -> impl Iterator<Item = &ResolvedImage> {
        self.kuchie.iter().filter(move |k| k.act == act)
    }

    /// Every image in package order: cover, kuchie, illustrations, ancillary.
    pub fn all(&self) -> impl Iterator<Item = &ResolvedImage> {
        self.cover
            .iter()
            .chain(&self.kuchie)
            .chain(&self.illustrations)
            .chain(&self.ancillary)
    }

    /// Look an image up by the name a chapter body used for it.
    pub fn find(&self, name: &str) -> Option<&ResolvedImage> {
        let base = base_name(name);
        self.all()
            .find(|img| img.original_name == name || base_name(&img.original_name) == base || img.package_name == base)
    }

    pub fn len(&self) -> usize {
        self.all().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Resolves manifest asset references against an assets directory.
#[derive(Debug, Clone)]
pub struct AssetResolver {
    root: PathBuf,
}

impl AssetResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Find `file` under the lookup directories.
    pub fn locate(&self, file: &str) -> Option<PathBuf> {
        let direct = self.root.join(file);
        if direct.is_file() {
            return Some(direct);
        }
        let base = base_name(file);
        LOOKUP_DIRS
            .iter()
            .map(|dir| self.root.join(dir).join(base))
            .find(|p| p.is_file())
    }

    pub fn resolve(&self, set: &AssetSet, structure: Option<&VolumeStructure>) -> ResolvedAssets {
        let mut ids = IdAllocator::default();
        let mut resolved = ResolvedAssets {
            cover: self.resolve_cover(set.cover.as_ref(), &mut ids),
            ..Default::default()
        };

        for asset in &set.kuchie {
            let act = partition_act(asset, structure);
            if let Some(img) = self.resolve_one(asset, ImageRole::Kuchie, act, &mut ids) {
                resolved.kuchie.push(img);
            }
        }
        for asset in &set.illustrations {
            if let Some(img) = self.resolve_one(asset, ImageRole::Illustration, 1, &mut ids) {
                resolved.illustrations.push(img);
            }
        }
        for asset in &set.ancillary {
            if let Some(img) = self.resolve_one(asset, ImageRole::Ancillary, 1, &mut ids) {
                resolved.ancillary.push(img);
            }
        }

        let mut claimed: HashSet<String> = resolved
            .all()
            .map(|img| base_name(&img.original_name).to_lowercase())
            .collect();
        if let Some(cover) = &set.cover {
            claimed.insert(cover.file_name().to_lowercase());
        }
        for asset in &set.kuchie {
            claimed.insert(asset.file_name().to_lowercase());
        }
        for name in self.scan_publisher_files(&claimed) {
            let asset = AssetRef::new(name);
            if let Some(img) = self.resolve_one(&asset, ImageRole::Illustration, 1, &mut ids) {
                debug!(file = %img.original_name, "picked up unlisted illustration");
                resolved.illustrations.push(img);
            }
        }

        resolved
    }

    fn resolve_cover(&self, cover: Option<&AssetRef>, ids: &mut IdAllocator) -> Option<ResolvedImage> {
        if let Some(cover) = cover {
            if is_composite_cover(&cover.file) {
                debug!(file = %cover.file, "cover is a composite of all covers, looking for the single cover");
            } else if let Some(img) = self.resolve_one(cover, ImageRole::Cover, 1, ids) {
                return Some(img);
            }
        }

        let found = COVER_CANDIDATES
            .iter()
            .find_map(|name| self.locate(name).map(|path| (*name, path)));
        match found {
            Some((name, _)) => self.resolve_one(&AssetRef::new(name), ImageRole::Cover, 1, ids),
            None => {
                if cover.is_some() {
                    warn!("no usable single cover image, building without a cover");
                }
                None
            }
        }
    }

    fn resolve_one(&self, asset: &AssetRef, role: ImageRole, act: u32, ids: &mut IdAllocator) -> Option<ResolvedImage> {
        let Some(source) = self.locate(&asset.file) else {
            warn!(file = %asset.file, ?role, "image not found, skipping");
            return None;
        };

        let data = match std::fs::read(&source) {
            Ok(data) => data,
            Err(e) => {
                warn!(file = %source.display(), error = %e, "image unreadable, skipping");
                return None;
            }
        };

        let format = detect_media_format(asset.file_name(), &data);
        if !format.is_image() {
            warn!(file = %asset.file, "not a recognized image format, skipping");
            return None;
        }

        let dimensions = asset.dimensions().or_else(|| extract_image_dimensions(&data));
        let (id, package_name) = ids.allocate(asset.file_name(), role == ImageRole::Cover);

        Some(ResolvedImage {
            id,
            package_name,
            original_name: asset.file.clone(),
            source,
            media_type: format.mime_type(),
            role,
            act,
            dimensions,
        })
    }

    /// Unclaimed files matching a publisher filename pattern, sorted.
    fn scan_publisher_files(&self, claimed: &HashSet<String>) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut found: Vec<String> = LOOKUP_DIRS
            .iter()
            .filter(|dir| **dir != "kuchie")
            .filter_map(|dir| std::fs::read_dir(self.root.join(dir)).ok())
            .flat_map(|entries| entries.filter_map(|e| e.ok()))
            .filter(|e| e.path().is_file())
            .filter_map(|e| e.file_name().to_str().map(str::to_string))
            .filter(|name| has_image_extension(name))
            .filter(|name| !claimed.contains(&name.to_lowercase()))
            .filter(|name| !is_composite_cover(name) && matches_publisher_pattern(name))
            .filter(|name| seen.insert(name.to_lowercase()))
            .collect();
        found.sort();
        found
    }
}

/// Act of a kuchie plate: explicit tag, else the act record listing it,
/// else act 1.
pub fn partition_act(asset: &AssetRef, structure: Option<&VolumeStructure>) -> u32 {
    let Some(structure) = structure else {
        return 1;
    };
    if let Some(act) = asset.act {
        return act;
    }
    let name = asset.file_name();
    structure
        .acts
        .iter()
        .find(|act| act.kuchie.iter().any(|k| base_name(k) == name))
        .map(|act| act.number)
        .unwrap_or(1)
}

fn base_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Hands out unique manifest ids and package file names.
#[derive(Debug, Default)]
struct IdAllocator {
    ids: HashSet<String>,
    names: HashSet<String>,
}

impl IdAllocator {
    fn allocate(&mut self, file_name: &str, cover: bool) -> (String, String) {
        let stem = Path::new(file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(file_name);
        let base_id = if cover && !self.ids.contains(COVER_IMAGE_ID) {
            COVER_IMAGE_ID.to_string()
        } else {
            format!("img-{}", sanitize_id(stem))
        };
        let id = unique(&mut self.ids, base_id, |base, n| format!("{base}-{n}"));

        let name = unique(&mut self.names, file_name.to_string(), |base, n| {
            let path = Path::new(base);
            match (path.file_stem().and_then(|s| s.to_str()), path.extension().and_then(|e| e.to_str())) {
                (Some(stem), Some(ext)) => format!("{stem}-{n}.{ext}"),
                _ => format!("{base}-{n}"),
            }
        });
        (id, name)
    }
}

fn unique(taken: &mut HashSet<String>, base: String, variant: impl Fn(&str, usize) -> String) -> String {
    let mut candidate = base.clone();
    let mut n = 2;
    while taken.contains(&candidate) {
        candidate = variant(&base, n);
        n += 1;
    }
    taken.insert(candidate.clone());
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Act;
    use proptest::prelude::*;
    use tempfile::TempDir;

    /// Minimal PNG header with the given dimensions.
    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut data = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13];
        data.extend_from_slice(b"IHDR");
        data.extend_from_slice(&width.to_be_bytes());
        data.extend_from_slice(&height.to_be_bytes());
        data.extend_from_slice(&[8, 2, 0, 0, 0]);
        data
    }

    fn assets_dir(files: &[&str]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for file in files {
            let path = dir.path().join(file);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, png(800, 1200)).unwrap();
        }
        dir
    }

    fn two_acts() -> VolumeStructure {
        VolumeStructure {
            acts: vec![
                Act { number: 1, first_chapter: 1, last_chapter: 2, ..Default::default() },
                Act {
                    number: 2,
                    first_chapter: 3,
                    last_chapter: 4,
                    kuchie: vec!["k3.png".into()],
                    ..Default::default()
                },
            ],
        }
    }

    #[test]
    fn test_cover_and_kuchie_resolution() {
        let dir = assets_dir(&["cover.png", "kuchie/k1.png", "kuchie/k2.png"]);
        let set = AssetSet {
            cover: Some(AssetRef::new("cover.png")),
            kuchie: vec![AssetRef::new("k1.png"), AssetRef::new("k2.png")],
            ..Default::default()
        };
        let r = AssetResolver::new(dir.path()).resolve(&set, None);
        let cover = r.cover.as_ref().unwrap();
        assert_eq!(cover.id, COVER_IMAGE_ID);
        assert_eq!(cover.media_type, "image/png");
        let ids: Vec<_> = r.kuchie.iter().map(|k| k.id.as_str()).collect();
        assert_eq!(ids, ["img-k1", "img-k2"]);
        assert_eq!(r.kuchie[0].orientation(), Orientation::Vertical);
    }

    #[test]
    fn test_composite_cover_without_single_cover_is_omitted() {
        let dir = assets_dir(&["allcover-001.png"]);
        let set = AssetSet {
            cover: Some(AssetRef::new("allcover-001.png")),
            ..Default::default()
        };
        let r = AssetResolver::new(dir.path()).resolve(&set, None);
        assert!(r.cover.is_none());
        assert!(r.is_empty());
    }

    #[test]
    fn test_composite_cover_recovers_single_cover() {
        let dir = assets_dir(&["allcover.png", "cover.jpg"]);
        let set = AssetSet {
            cover: Some(AssetRef::new("allcover.png")),
            ..Default::default()
        };
        let r = AssetResolver::new(dir.path()).resolve(&set, None);
        assert_eq!(r.cover.unwrap().original_name, "cover.jpg");
    }

    #[test]
    fn test_missing_images_are_skipped() {
        let dir = assets_dir(&["kuchie/k1.png"]);
        let set = AssetSet {
            kuchie: vec![AssetRef::new("k1.png"), AssetRef::new("missing.png")],
            ..Default::default()
        };
        let r = AssetResolver::new(dir.path()).resolve(&set, None);
        assert_eq!(r.kuchie.len(), 1);
    }

    #[test]
    fn test_directory_scan_finds_unclaimed_publisher_files() {
        let dir = assets_dir(&["illustrations/i-001.png", "illustrations/i-002.png", "notes.png", "kuchie/k1.png"]);
        let set = AssetSet {
            kuchie: vec![AssetRef::new("k1.png")],
            illustrations: vec![AssetRef::new("i-002.png")],
            ..Default::default()
        };
        let r = AssetResolver::new(dir.path()).resolve(&set, None);
        let names: Vec<_> = r.illustrations.iter().map(|i| i.original_name.as_str()).collect();
        assert_eq!(names, ["i-002.png", "i-001.png"]);
    }

    #[test]
    fn test_act_partition_precedence() {
        let structure = two_acts();
        let tagged = AssetRef { act: Some(2), ..AssetRef::new("k1.png") };
        assert_eq!(partition_act(&tagged, Some(&structure)), 2);
        assert_eq!(partition_act(&AssetRef::new("kuchie/k3.png"), Some(&structure)), 2);
        assert_eq!(partition_act(&AssetRef::new("k2.png"), Some(&structure)), 1);
        assert_eq!(partition_act(&tagged, None), 1);
    }

    #[test]
    fn test_orientation_from_record_dimensions() {
        let dir = assets_dir(&["k1.png"]);
        let set = AssetSet {
            kuchie: vec![AssetRef { width: Some(2400), height: Some(1700), ..AssetRef::new("k1.png") }],
            ..Default::default()
        };
        let r = AssetResolver::new(dir.path()).resolve(&set, None);
        assert_eq!(r.kuchie[0].orientation(), Orientation::Horizontal);
    }

    #[test]
    fn test_duplicate_names_get_unique_ids() {
        let dir = assets_dir(&["kuchie/01.png", "illustrations/01.png"]);
        let set = AssetSet {
            kuchie: vec![AssetRef::new("kuchie/01.png")],
            illustrations: vec![AssetRef::new("illustrations/01.png")],
            ..Default::default()
        };
        let r = AssetResolver::new(dir.path()).resolve(&set, None);
        assert_eq!(r.kuchie[0].id, "img-01");
        assert_eq!(r.illustrations[0].id, "img-01-2");
        assert_eq!(r.illustrations[0].package_name, "01-2.png");
        assert_ne!(r.kuchie[0].source, r.illustrations[0].source);
    }

    proptest! {
        #[test]
        fn prop_record_and_bare_kuchie_resolve_identically(
            names in prop::collection::vec("[a-z]{1,6}[0-9]{0,3}\\.(png|jpg)", 1..6),
            key in prop::sample::select(vec!["file", "filename", "path", "name", "src"]),
        ) {
            let bare: Vec<serde_json::Value> = names.iter().map(|n| serde_json::json!(n)).collect();
            let records: Vec<serde_json::Value> = names
                .iter()
                .map(|n| {
                    let mut record = serde_json::Map::new();
                    record.insert(key.to_string(), serde_json::json!(n));
                    serde_json::Value::Object(record)
                })
                .collect();
            let from_bare = crate::manifest::normalize(&serde_json::json!({"chapters": [], "kuchie": bare}), "jp", "en").unwrap();
            let from_records = crate::manifest::normalize(&serde_json::json!({"chapters": [], "kuchie": records}), "jp", "en").unwrap();
            let bare_files: Vec<_> = from_bare.assets.kuchie.iter().map(|k| k.file.clone()).collect();
            let record_files: Vec<_> = from_records.assets.kuchie.iter().map(|k| k.file.clone()).collect();
            prop_assert_eq!(&bare_files, &names);
            prop_assert_eq!(bare_files, record_files);
        }
    }
}
