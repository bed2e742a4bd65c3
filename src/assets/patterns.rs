//! Publisher original-filename conventions.

use std::path::Path;
use std::sync::LazyLock;

use regex::RegexSet;

/// Stems publishers use for in-body illustration plates, matched against the
/// lower-cased file stem.
static PUBLISHER_STEMS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"^i-\d+$",
        r"^p-\d+$",
        r"^p_?\d{3,}$",
        r"^img[-_]\d+$",
        r"^image[-_]?\d+$",
        r"^illust[-_]?\d+$",
        r"^insert[-_]?\d+$",
        r"^o_?\d+$",
        r"^m\d{3,}$",
        r"^k\d{3,}$",
        r"^f\d{3,}$",
        r"^\d{3,4}$",
        r"^plate[-_]?\d+$",
    ])
    .expect("publisher patterns are valid")
});

/// True for the composite image of every cover in a series, which must never
/// be used as the volume cover.
pub fn is_composite_cover(name: &str) -> bool {
    name.to_lowercase().contains("allcover")
}

pub fn matches_publisher_pattern(name: &str) -> bool {
    let stem = Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name)
        .to_lowercase();
    PUBLISHER_STEMS.is_match(&stem)
}
