mod common;

use common::{WorkDir, body, chapter};
use serde_json::json;
use tsuzuri::epub::{OPF_PATH, read_entry};
use tsuzuri::{BuildOutcome, Error, build_volume, read_epub, validate_epub};

fn single_volume() -> WorkDir {
    let work = WorkDir::new(json!({
        "schema_version": "3.0",
        "title_en": "Test Vol",
        "title": "テスト巻",
        "author_en": "Test Author",
        "chapters": [chapter(1, "One"), chapter(2, "Two"), chapter(3, "Three")],
        "assets": {
            "cover": "cover.png",
            "kuchie": ["k1.png", "k2.png"],
        },
    }));
    for n in 1..=3 {
        work.translated(&format!("chapter_{n:02}_en.md"), &body(n));
    }
    work.image("cover.png", 1000, 1500);
    work.image("kuchie/k1.png", 2400, 1700);
    work.image("kuchie/k2.png", 1200, 1700);
    work
}

#[test]
fn test_single_volume_spine() {
    let work = single_volume();
    let report = build_volume(&work.config());
    assert!(report.is_success(), "{:?}", report.error());

    let output = report.output().unwrap().to_path_buf();
    assert_eq!(output, work.path().join("output/Test Vol.epub"));

    let epub = validate_epub(&output).unwrap();
    assert_eq!(
        epub.spine_ids(),
        ["cover", "kuchie-001", "kuchie-002", "toc", "chapter-001", "chapter-002", "chapter-003"]
    );

    let chapter_items: Vec<_> = epub.items.iter().filter(|i| i.id.starts_with("chapter-")).collect();
    assert_eq!(chapter_items.len(), 3);
    for item in chapter_items {
        assert!(epub.spine_ids().contains(&item.id.as_str()));
    }

    let linear: Vec<_> = epub.spine.iter().filter(|s| !s.linear).map(|s| s.idref.as_str()).collect();
    assert_eq!(linear, ["cover", "toc"]);

    assert_eq!(epub.metadata.title, "Test Vol");
    assert_eq!(epub.metadata.authors, vec!["Test Author"]);
    assert_eq!(epub.metadata.original_title.as_deref(), Some("テスト巻"));
    assert_eq!(epub.metadata.cover_id.as_deref(), Some("cover-image"));
    assert!(epub.item("cover-image").unwrap().has_property("cover-image"));
    assert!(epub.item("nav").unwrap().has_property("nav"));
    assert!(epub.metadata.identifier.starts_with("urn:uuid:"));
}

#[test]
fn test_zip_layout() {
    let work = single_volume();
    let report = build_volume(&work.config());
    let output = report.output().unwrap();
    let epub = read_epub(output).unwrap();

    assert!(epub.mimetype_ok);
    assert_eq!(epub.entries[0], "mimetype");
    assert_eq!(epub.entries[1], "META-INF/container.xml");
    assert_eq!(epub.entries[2], OPF_PATH);
    assert!(epub.entries.contains(&"OEBPS/toc.ncx".to_string()));
    assert!(epub.entries.contains(&"OEBPS/Styles/stylesheet.css".to_string()));
    assert!(epub.entries.contains(&"OEBPS/Images/k1.png".to_string()));
}

#[test]
fn test_chapter_content_and_kuchie_templates() {
    let work = single_volume();
    let report = build_volume(&work.config());
    let output = report.output().unwrap();

    let chapter = read_entry(output, "OEBPS/Text/chapter-002.xhtml").unwrap();
    assert!(chapter.contains("<h2>Two</h2>"));
    assert!(chapter.contains("<p>The first paragraph of chapter 2.</p>"));
    assert!(!chapter.contains("# Chapter"));
    assert!(!chapter.contains("class=\"blank\""));

    let wide = read_entry(output, "OEBPS/Text/kuchie-001.xhtml").unwrap();
    let tall = read_entry(output, "OEBPS/Text/kuchie-002.xhtml").unwrap();
    assert!(wide.contains("<svg"));
    assert!(!tall.contains("<svg"));

    let nav = read_entry(output, "OEBPS/Text/nav.xhtml").unwrap();
    assert!(nav.contains("href=\"chapter-001.xhtml\">One</a>"));
    assert!(nav.contains("epub:type=\"landmarks\""));

    let ncx = read_entry(output, "OEBPS/toc.ncx").unwrap();
    assert_eq!(ncx.matches("<navPoint ").count(), 3);
}

#[test]
fn test_rebuild_is_idempotent() {
    let work = single_volume();
    let first = build_volume(&work.config());
    let opf_first = read_entry(first.output().unwrap(), OPF_PATH).unwrap();
    let second = build_volume(&work.config());
    assert!(second.is_success(), "{:?}", second.error());
    let opf_second = read_entry(second.output().unwrap(), OPF_PATH).unwrap();
    assert_eq!(opf_first, opf_second);
}

#[test]
fn test_pipeline_state_recorded() {
    let work = single_volume();
    let report = build_volume(&work.config());
    assert!(report.is_success());

    let manifest = work.manifest();
    let builder = &manifest["pipeline_state"]["builder"];
    assert_eq!(builder["status"], "completed");
    assert_eq!(builder["output_file"], "Test Vol.epub");
    assert_eq!(builder["chapters_built"], 3);
    assert_eq!(builder["images_included"], 3);
    assert_eq!(manifest["title_en"], "Test Vol");
}

#[test]
fn test_state_not_written_when_disabled() {
    let work = single_volume();
    let report = build_volume(&work.config().with_update_state(false));
    assert!(report.is_success());
    assert!(work.manifest().get("pipeline_state").is_none());
}

#[test]
fn test_composite_cover_is_omitted() {
    let work = WorkDir::new(json!({
        "title_en": "Covers",
        "chapters": [chapter(1, "One")],
        "cover": "allcover-001.png",
    }));
    work.translated("chapter_01_en.md", &body(1));
    work.image("allcover-001.png", 3000, 1500);

    let report = build_volume(&work.config());
    assert!(report.is_success(), "{:?}", report.error());

    let epub = validate_epub(report.output().unwrap()).unwrap();
    assert!(epub.items.iter().all(|i| !i.has_property("cover-image")));
    assert!(epub.metadata.cover_id.is_none());
    assert!(!epub.spine_ids().contains(&"cover"));
    assert!(!epub.entries.iter().any(|e| e.contains("allcover")));
}

#[test]
fn test_composite_cover_with_kuchie_advertises_first_plate() {
    let work = WorkDir::new(json!({
        "title_en": "Plates",
        "chapters": [chapter(1, "One")],
        "cover": "allcover-001.png",
        "kuchie": ["k1.png", "k2.png"],
    }));
    work.translated("chapter_01_en.md", &body(1));
    work.image("allcover-001.png", 3000, 1500);
    work.image("kuchie/k1.png", 1200, 1700);
    work.image("kuchie/k2.png", 1200, 1700);

    let report = build_volume(&work.config());
    assert!(report.is_success(), "{:?}", report.error());

    let epub = validate_epub(report.output().unwrap()).unwrap();
    assert_eq!(epub.metadata.cover_id.as_deref(), Some("img-k1"));
    let covers: Vec<_> = epub.items.iter().filter(|i| i.has_property("cover-image")).collect();
    assert_eq!(covers.len(), 1);
    assert_eq!(covers[0].id, "img-k1");
    assert_eq!(epub.spine_ids(), ["kuchie-001", "kuchie-002", "toc", "chapter-001"]);
}

#[test]
fn test_svg_pages_and_escaped_image_names() {
    let work = WorkDir::new(json!({
        "title_en": "Escapes",
        "chapters": [chapter(1, "One")],
        "assets": {"cover": "cover.png", "kuchie": ["口絵 01.png", "k2.png"]},
    }));
    work.translated("chapter_01_en.md", &body(1));
    work.image("cover.png", 1000, 1500);
    work.image("kuchie/口絵 01.png", 2400, 1700);
    work.image("kuchie/k2.png", 1200, 1700);

    let report = build_volume(&work.config());
    assert!(report.is_success(), "{:?}", report.error());
    let output = report.output().unwrap();
    let epub = validate_epub(output).unwrap();

    assert!(epub.item("cover").unwrap().has_property("svg"));
    assert!(epub.item("kuchie-001").unwrap().has_property("svg"));
    assert!(!epub.item("kuchie-002").unwrap().has_property("svg"));
    assert!(!epub.item("chapter-001").unwrap().has_property("svg"));
    assert_eq!(epub.svg_documents, ["cover", "kuchie-001"]);

    let plate = epub.item("img-01").unwrap();
    assert_eq!(plate.href, "Images/%E5%8F%A3%E7%B5%B5%2001.png");
    assert!(epub.entries.contains(&"OEBPS/Images/口絵 01.png".to_string()));

    let page = read_entry(output, "OEBPS/Text/kuchie-001.xhtml").unwrap();
    assert!(page.contains("xlink:href=\"../Images/%E5%8F%A3%E7%B5%B5%2001.png\""));
}

#[test]
fn test_missing_chapter_files_are_skipped_and_source_is_fallback() {
    let work = WorkDir::new(json!({
        "title_en": "Partial",
        "chapters": [chapter(1, "One"), chapter(2, "Two"), chapter(3, "Three")],
    }));
    work.translated("chapter_01_en.md", &body(1));
    work.write("JP/chapter_02.md", "原文の段落です。".as_bytes());

    let report = build_volume(&work.config());
    match &report.outcome {
        BuildOutcome::Succeeded { chapters, .. } => assert_eq!(*chapters, 2),
        BuildOutcome::Failed { error } => panic!("build failed: {error}"),
    }
    let chapter = read_entry(report.output().unwrap(), "OEBPS/Text/chapter-002.xhtml").unwrap();
    assert!(chapter.contains("原文の段落です。"));
}

#[test]
fn test_incomplete_upstream_fails_unless_forced() {
    let work = WorkDir::new(json!({
        "title_en": "Pending",
        "chapters": [chapter(1, "One")],
        "pipeline_state": {"translator": {"status": "in_progress"}},
    }));
    work.translated("chapter_01_en.md", &body(1));

    let report = build_volume(&work.config());
    assert!(matches!(report.error(), Some(Error::UpstreamIncomplete { .. })));
    assert!(!work.path().join("output").exists());

    let forced = build_volume(&work.config().with_force(true));
    assert!(forced.is_success(), "{:?}", forced.error());
}

#[test]
fn test_missing_chapters_is_fatal() {
    let work = WorkDir::new(json!({"title_en": "Empty"}));
    let report = build_volume(&work.config());
    assert!(matches!(report.error(), Some(Error::ChaptersMissing)));
}

#[test]
fn test_illustrations_inline_and_scanned() {
    let work = WorkDir::new(json!({
        "title_en": "Illustrated",
        "chapters": [chapter(1, "One")],
    }));
    work.translated(
        "chapter_01_en.md",
        "[ILLUSTRATION: opener.png]\n\nFirst line.\n\n[ILLUSTRATION: i-001.png]\n\nLast line.",
    );
    work.image("illustrations/i-001.png", 800, 1200);
    work.image("opener.png", 800, 1200);

    let report = build_volume(&work.config());
    assert!(report.is_success(), "{:?}", report.error());
    let output = report.output().unwrap();
    let chapter = read_entry(output, "OEBPS/Text/chapter-001.xhtml").unwrap();
    assert!(chapter.contains("<img src=\"../Images/i-001.png\""));
    assert!(!chapter.contains("opener.png"));

    let epub = validate_epub(output).unwrap();
    assert!(epub.item("img-i-001").is_some());
}

#[test]
fn test_rtl_page_progression() {
    let work = single_volume();
    let report = build_volume(&work.config().with_page_progression(tsuzuri::PageProgression::Rtl));
    let epub = read_epub(report.output().unwrap()).unwrap();
    assert_eq!(epub.page_progression.as_deref(), Some("rtl"));
    // Kuchie keep their narrative order.
    let spine = epub.spine_ids();
    assert_eq!(&spine[1..3], ["kuchie-001", "kuchie-002"]);
}
