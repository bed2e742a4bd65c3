//! Ranked field resolution across manifest schema generations.
//!
//! Each [`Rule`] pairs a schema predicate with an extractor. Rules are tried
//! in rank order and the first non-empty result wins, so every historical
//! fallback stays explicit and can be tested on its own.

use serde_json::Value;

use super::coerce::{coerce_text, text_field};

/// Volume-level text fields that go through the resolution chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    Author,
    Publisher,
    Series,
}

impl Field {
    pub fn key(self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Author => "author",
            Field::Publisher => "publisher",
            Field::Series => "series",
        }
    }

    /// Value used when every rule comes back empty.
    pub fn default_text(self) -> &'static str {
        match self {
            Field::Title => "Untitled",
            Field::Author => "Unknown Author",
            Field::Publisher | Field::Series => "",
        }
    }
}

/// Borrowed view over a raw manifest with its metadata blocks selected.
pub struct ManifestView<'a> {
    pub raw: &'a Value,
    /// `metadata_<lang>`, else `metadata_en`.
    pub localized: Option<&'a Value>,
    /// `metadata`, else the top level.
    pub source: &'a Value,
    pub lang: &'a str,
    pub source_lang: &'a str,
}

impl<'a> ManifestView<'a> {
    pub fn new(raw: &'a Value, lang: &'a str, source_lang: &'a str) -> Self {
        let localized = raw
            .get(format!("metadata_{lang}"))
            .filter(|v| v.is_object())
            .or_else(|| raw.get("metadata_en").filter(|v| v.is_object()));
        let source = raw.get("metadata").filter(|v| v.is_object()).unwrap_or(raw);
        Self {
            raw,
            localized,
            source,
            lang,
            source_lang,
        }
    }

    /// Blocks searched for generic fields, most specific first.
    fn blocks(&self) -> impl Iterator<Item = &'a Value> + '_ {
        self.localized
            .into_iter()
            .chain(std::iter::once(self.source))
            .chain((!std::ptr::eq(self.source, self.raw)).then_some(self.raw))
    }
}

/// One link in the resolution chain.
pub struct Rule {
    pub name: &'static str,
    pub applies: fn(&ManifestView<'_>, Field) -> bool,
    pub extract: fn(&ManifestView<'_>, Field) -> Option<String>,
}

/// Target-language resolution chain, in rank order.
pub const TARGET_RULES: &[Rule] = &[
    Rule {
        name: "localized-field",
        applies: |view, _| view.localized.is_some(),
        extract: |view, field| {
            let block = view.localized?;
            text_field(block, &format!("{}_{}", field.key(), view.lang))
                .or_else(|| text_field(block, field.key()))
        },
    },
    Rule {
        name: "generic-en",
        applies: |_, _| true,
        extract: |view, field| {
            let key = format!("{}_en", field.key());
            view.blocks().find_map(|block| text_field(block, &key))
        },
    },
    Rule {
        name: "series-object",
        applies: |_, field| matches!(field, Field::Title | Field::Series),
        extract: |view, _| view.blocks().find_map(|block| series_text(block.get("series")?, view.lang)),
    },
    Rule {
        name: "raw-source",
        applies: |_, _| true,
        extract: |view, field| {
            view.blocks()
                .skip(usize::from(view.localized.is_some()))
                .find_map(|block| text_field(block, field.key()))
        },
    },
];

/// Source-language resolution chain.
pub const SOURCE_RULES: &[Rule] = &[
    Rule {
        name: "source-suffixed",
        applies: |_, _| true,
        extract: |view, field| {
            let key = format!("{}_{}", field.key(), view.source_lang);
            view.blocks().find_map(|block| text_field(block, &key))
        },
    },
    Rule {
        name: "source-raw",
        applies: |_, _| true,
        extract: |view, field| {
            view.blocks()
                .skip(usize::from(view.localized.is_some()))
                .find_map(|block| text_field(block, field.key()))
        },
    },
];

/// Run `rules` in order and return the first non-empty value with the name
/// of the rule that produced it.
pub fn resolve(view: &ManifestView<'_>, field: Field, rules: &[Rule]) -> Option<(&'static str, String)> {
    rules
        .iter()
        .filter(|rule| (rule.applies)(view, field))
        .find_map(|rule| (rule.extract)(view, field).map(|text| (rule.name, text)))
}

/// Text of a nested `series` value, which has appeared as a plain string, an
/// `{english, romaji}` pair, and a record with direct title fields.
fn series_text(series: &Value, lang: &str) -> Option<String> {
    match series {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Object(_) => text_field(series, "english")
            .or_else(|| text_field(series, "romaji"))
            .or_else(|| text_field(series, &format!("title_{lang}")))
            .or_else(|| text_field(series, "title_en"))
            .or_else(|| text_field(series, "title")),
        other => Some(coerce_text(other)).filter(|s| !s.is_empty()),
    }
}
