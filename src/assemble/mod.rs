//! Structural assembler.
//!
//! Lays a volume out in its fixed emission order:
//!
//! 1. cover page (non-linear)
//! 2. front kuchie, one page per plate
//! 3. contents page (non-linear)
//! 4. chapters in TOC order; in multi-act volumes, the first chapter of a
//!    later act is preceded by that act's separator page and kuchie
//!
//! The spine mirrors this order. The manifest lists the NCX, stylesheet and
//! nav document first, then the text documents in spine order, then every
//! image.

mod acts;

use tracing::{debug, warn};

use crate::assets::{COVER_IMAGE_ID, ResolvedAssets, ResolvedImage};
use crate::config::PageProgression;
use crate::convert::{ParagraphUnit, render_units};
use crate::epub::xhtml;
use crate::manifest::VolumeManifest;
use crate::nav::{ActHeading, NavTarget, build_landmarks, build_toc, generate_ncx, render_nav_document};
use crate::package::{CSS, Metadata, NCX, Package, TocEntry, XHTML, derive_identifier};

pub use acts::ActLayout;

pub const COVER_HREF: &str = "Text/cover.xhtml";
pub const TOC_HREF: &str = "Text/toc.xhtml";
pub const NAV_HREF: &str = "Text/nav.xhtml";
pub const NCX_HREF: &str = "toc.ncx";
pub const STYLESHEET_PATH: &str = "Styles/stylesheet.css";

const CONTENTS_TITLE: &str = "Contents";

/// One chapter ready for assembly: a reconstructed batch after conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterDocument {
    pub title: String,
    /// False for pre-TOC content, which renders without a heading and stays
    /// out of navigation.
    pub navigable: bool,
    /// 1-based position of the batch's first entry in TOC order.
    pub position: u32,
    pub units: Vec<ParagraphUnit>,
    /// Ids of the manifest chapters folded into this document.
    pub sources: Vec<String>,
}

/// An assembled package plus what went into it.
#[derive(Debug, Clone)]
pub struct Assembly {
    pub package: Package,
    pub chapters: usize,
    pub images: usize,
    pub act_separators: usize,
}

/// A text document waiting for its place in the manifest.
struct TextDoc {
    id: String,
    href: String,
    content: String,
    linear: bool,
}

/// Builds a [`Package`] from a normalized manifest, resolved assets and
/// converted chapters.
#[derive(Debug, Clone)]
pub struct Assembler<'a> {
    manifest: &'a VolumeManifest,
    assets: &'a ResolvedAssets,
    language: String,
    source_language: Option<String>,
    page_progression: Option<PageProgression>,
    modified: String,
}

impl<'a> Assembler<'a> {
    pub fn new(manifest: &'a VolumeManifest, assets: &'a ResolvedAssets) -> Self {
        Self {
            manifest,
            assets,
            language: "en".to_string(),
            source_language: None,
            page_progression: None,
            modified: String::new(),
        }
    }

    /// Target language code as used in the work directory (`en`, `jp`, ...).
    pub fn with_language(mut self, code: &str) -> Self {
        self.language = language_tag(code);
        self
    }

    pub fn with_source_language(mut self, code: &str) -> Self {
        self.source_language = Some(language_tag(code));
        self
    }

    pub fn with_page_progression(mut self, progression: Option<PageProgression>) -> Self {
        self.page_progression = progression;
        self
    }

    /// `dcterms:modified` timestamp.
    pub fn with_modified(mut self, modified: impl Into<String>) -> Self {
        self.modified = modified.into();
        self
    }

    pub fn assemble(&self, chapters: &[ChapterDocument]) -> Assembly {
        let lang = self.language.as_str();
        let title = &self.manifest.title.target;
        let layout = ActLayout::new(self.manifest.structure.as_ref());

        let mut front = Vec::new();
        let mut body = Vec::new();
        let mut kuchie_count = 0usize;
        let mut first_kuchie_id = None;

        let cover_page = self.assets.cover.as_ref().map(|cover| TextDoc {
            id: "cover".into(),
            href: COVER_HREF.into(),
            content: xhtml::cover_page(title, lang, &image_src(cover), cover.dimensions),
            linear: false,
        });

        for plate in self.assets.kuchie.iter().filter(|k| layout.is_front_kuchie(k.act)) {
            first_kuchie_id.get_or_insert_with(|| plate.id.clone());
            front.push(self.kuchie_doc(plate, &mut kuchie_count));
        }

        let mut targets = Vec::new();
        let mut separators: Vec<(u32, String)> = Vec::new();
        let mut current_act = layout.first_act();

        for (i, chapter) in chapters.iter().enumerate() {
            if layout.is_multi_act() {
                let act = layout.act_for(chapter.position, current_act);
                for opened in layout.opened_between(current_act, act) {
                    debug!(act = opened.number, position = chapter.position, "opening act");
                    self.emit_act(opened, &mut body, &mut separators, &mut kuchie_count, &mut first_kuchie_id);
                }
                current_act = act;
            }

            let id = format!("chapter-{:03}", i + 1);
            let href = format!("Text/{id}.xhtml");
            let chapter_title = if chapter.title.is_empty() {
                format!("Chapter {}", i + 1)
            } else {
                chapter.title.clone()
            };
            let heading = chapter.navigable.then_some(chapter_title.as_str());
            let html = render_units(&chapter.units, |name| self.illustration_src(name, &id));

            body.push(TextDoc {
                id,
                href: href.clone(),
                content: xhtml::chapter_page(&chapter_title, lang, heading, &html),
                linear: true,
            });
            if chapter.navigable {
                targets.push(NavTarget {
                    title: chapter_title,
                    href,
                    act: current_act,
                });
            }
        }

        if layout.is_multi_act() {
            let unreached: Vec<_> = layout.after(current_act).collect();
            if !unreached.is_empty() {
                warn!(
                    acts = unreached.len(),
                    "acts with no chapters, appending their separators after the last chapter"
                );
            }
            for act in unreached {
                self.emit_act(act, &mut body, &mut separators, &mut kuchie_count, &mut first_kuchie_id);
            }
        }

        let headings: Vec<ActHeading> = layout
            .acts()
            .iter()
            .map(|act| ActHeading {
                number: act.number,
                title: ActLayout::title(act),
                separator_href: separators.iter().find(|(n, _)| *n == act.number).map(|(_, href)| href.clone()),
            })
            .collect();
        let mut toc = build_toc(&targets, layout.is_multi_act().then_some(headings.as_slice()));

        let body_start = targets.first().map(|t| t.href.as_str()).or_else(|| {
            body.iter()
                .find(|doc| doc.id.starts_with("chapter-"))
                .map(|doc| doc.href.as_str())
        });
        if toc.is_empty() {
            // Nav lists and the NCX navMap may not be empty.
            debug!("no navigable chapters, linking the volume title to the start of the body");
            toc.push(TocEntry::new(&self.manifest.title.target, body_start.unwrap_or(TOC_HREF)));
        }
        let landmarks = build_landmarks(cover_page.as_ref().map(|_| COVER_HREF), TOC_HREF, body_start);

        let toc_page = TextDoc {
            id: "toc".into(),
            href: TOC_HREF.into(),
            content: xhtml::toc_page(CONTENTS_TITLE, lang, &crate::nav::rebase_to_text(&toc)),
            linear: false,
        };

        let metadata = self.metadata(first_kuchie_id.as_deref());
        let mut package = Package::new();
        package.add_document("ncx", NCX_HREF, NCX, generate_ncx(&metadata, &toc));
        package.add_document("css", STYLESHEET_PATH, CSS, xhtml::STYLESHEET.to_string());
        package
            .add_document("nav", NAV_HREF, XHTML, render_nav_document(CONTENTS_TITLE, lang, &toc, &landmarks))
            .add_property("nav");

        let texts = cover_page.into_iter().chain(front).chain(std::iter::once(toc_page)).chain(body);
        for doc in texts {
            package.add_spine_item(&doc.id, doc.linear);
            package.add_document(doc.id, doc.href, XHTML, doc.content);
        }

        for image in self.assets.all() {
            let item = package.add_file(&image.id, image.path(), image.media_type, image.source.clone());
            if metadata.cover_id.as_deref() == Some(image.id.as_str()) {
                item.add_property("cover-image");
            }
        }

        package.metadata = metadata;
        package.toc = toc;
        package.landmarks = landmarks;
        package.page_progression = self.page_progression;

        Assembly {
            chapters: chapters.len(),
            images: self.assets.len(),
            act_separators: separators.len(),
            package,
        }
    }

    fn kuchie_doc(&self, plate: &ResolvedImage, count: &mut usize) -> TextDoc {
        *count += 1;
        let id = format!("kuchie-{:03}", *count);
        TextDoc {
            href: format!("Text/{id}.xhtml"),
            content: xhtml::kuchie_page(
                &self.manifest.title.target,
                &self.language,
                &image_src(plate),
                plate.orientation(),
                plate.dimensions,
            ),
            id,
            linear: true,
        }
    }

    fn emit_act(
        &self,
        act: &crate::manifest::Act,
        body: &mut Vec<TextDoc>,
        separators: &mut Vec<(u32, String)>,
        kuchie_count: &mut usize,
        first_kuchie_id: &mut Option<String>,
    ) {
        let id = format!("act-{}", act.number);
        let href = format!("Text/{id}.xhtml");
        body.push(TextDoc {
            id,
            href: href.clone(),
            content: xhtml::act_page(&ActLayout::title(act), &self.language),
            linear: true,
        });
        separators.push((act.number, href));

        for plate in self.assets.kuchie_for_act(act.number) {
            first_kuchie_id.get_or_insert_with(|| plate.id.clone());
            body.push(self.kuchie_doc(plate, kuchie_count));
        }
    }

    fn illustration_src(&self, name: &str, chapter: &str) -> Option<String> {
        match self.assets.find(name) {
            Some(image) => Some(image_src(image)),
            None => {
                warn!(file = name, chapter, "illustration not packaged, skipping");
                None
            }
        }
    }

    fn metadata(&self, first_kuchie_id: Option<&str>) -> Metadata {
        let m = self.manifest;
        let mut metadata = Metadata::new(&m.title.target)
            .with_author(&m.author.target)
            .with_language(&self.language)
            .with_identifier(derive_identifier(&m.title.target, &m.author.target));
        metadata.original_title = Some(m.title.source.clone()).filter(|t| !t.is_empty() && *t != m.title.target);
        metadata.original_language = self.source_language.clone();
        metadata.publisher = Some(m.publisher.target.clone()).filter(|p| !p.is_empty());
        metadata.series = Some(m.series.target.clone()).filter(|s| !s.is_empty());
        metadata.modified = self.modified.clone();
        metadata.cover_id = resolve_cover_id(self.assets, first_kuchie_id);
        metadata
    }
}

/// Pick the image advertised as the cover: the reserved `cover-image` id,
/// else any image id mentioning "cover" that is not the composite, else the
/// first kuchie plate in emission order.
///
/// A dropped composite cover still falls through to the kuchie plate, so a
/// volume with plates always advertises one cover image. Only the metadata
/// moves; no cover page is emitted for the plate. A volume with neither a
/// single cover nor plates carries no `cover-image` at all.
pub fn resolve_cover_id(assets: &ResolvedAssets, first_kuchie_id: Option<&str>) -> Option<String> {
    let ids: Vec<&str> = assets.all().map(|img| img.id.as_str()).collect();
    ids.iter()
        .find(|id| **id == COVER_IMAGE_ID)
        .or_else(|| {
            ids.iter().find(|id| {
                let id = id.to_lowercase();
                id.contains("cover") && !id.contains("allcover")
            })
        })
        .map(|id| id.to_string())
        .or_else(|| first_kuchie_id.map(str::to_string))
}

/// Map a work-directory language code to a BCP 47 tag.
pub fn language_tag(code: &str) -> String {
    match code.to_lowercase().as_str() {
        "jp" => "ja".to_string(),
        "cn" => "zh".to_string(),
        "kr" => "ko".to_string(),
        "vn" => "vi".to_string(),
        other => other.to_string(),
    }
}

fn image_src(image: &ResolvedImage) -> String {
    format!("../{}", image.href())
}
