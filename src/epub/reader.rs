//! Reading a written EPUB back: container, OPF and zip layout.
//!
//! Used by post-hoc validation, the `validate`/`inspect` commands and the
//! integration tests.

use std::io::{Read, Seek};
use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use zip::{CompressionMethod, ZipArchive};

use crate::error::{Error, Result};
use crate::package::{Metadata, SpineItem, XHTML, has_inline_svg};

use super::writer::CONTAINER_PATH;

/// A manifest `<item>` as found in the OPF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageItem {
    pub id: String,
    pub href: String,
    pub media_type: String,
    pub properties: Option<String>,
}

impl PackageItem {
    pub fn has_property(&self, property: &str) -> bool {
        self.properties
            .as_deref()
            .is_some_and(|p| p.split_ascii_whitespace().any(|x| x == property))
    }
}

/// Everything validation needs to know about a written EPUB.
#[derive(Debug, Clone, Default)]
pub struct EpubPackage {
    /// Zip entry names in archive order.
    pub entries: Vec<String>,
    /// Whether the first entry is `mimetype`, stored and correct.
    pub mimetype_ok: bool,
    pub opf_path: String,
    pub metadata: Metadata,
    pub items: Vec<PackageItem>,
    pub spine: Vec<SpineItem>,
    pub page_progression: Option<String>,
    /// Ids of XHTML items whose content embeds inline SVG.
    pub svg_documents: Vec<String>,
}

impl EpubPackage {
    pub fn item(&self, id: &str) -> Option<&PackageItem> {
        self.items.iter().find(|i| i.id == id)
    }

    pub fn spine_ids(&self) -> Vec<&str> {
        self.spine.iter().map(|s| s.idref.as_str()).collect()
    }

    /// Zip path of a manifest href. Percent-escapes are decoded.
    pub fn entry_path(&self, href: &str) -> String {
        let dir = opf_dir(&self.opf_path);
        let decoded = percent_encoding::percent_decode_str(href).decode_utf8_lossy();
        resolve_path(dir, &decoded)
    }

    pub fn has_entry(&self, path: &str) -> bool {
        self.entries.iter().any(|e| e == path)
    }
}

/// Read an EPUB file from disk.
///
/// # Example
///
/// ```no_run
/// let epub = tsuzuri::epub::read_epub("output/Test Vol.epub")?;
/// println!("{} spine items", epub.spine.len());
/// # Ok::<(), tsuzuri::Error>(())
/// ```
pub fn read_epub<P: AsRef<Path>>(path: P) -> Result<EpubPackage> {
    let file = std::fs::File::open(path)?;
    read_epub_from_reader(file)
}

/// Read an EPUB from any [`Read`] + [`Seek`] source.
pub fn read_epub_from_reader<R: Read + Seek>(reader: R) -> Result<EpubPackage> {
    let mut archive = ZipArchive::new(reader)?;

    let entries: Vec<String> = (0..archive.len())
        .map(|i| archive.name_for_index(i).map(str::to_string).unwrap_or_default())
        .collect();
    let mimetype_ok = check_mimetype(&mut archive)?;

    let opf_path = find_opf_path(&mut archive)?;
    let opf = read_archive_file(&mut archive, &opf_path)?;
    let mut epub = parse_opf(&opf)?;
    epub.entries = entries;
    epub.mimetype_ok = mimetype_ok;
    epub.opf_path = opf_path;

    let documents: Vec<(String, String)> = epub
        .items
        .iter()
        .filter(|item| item.media_type == XHTML)
        .map(|item| (item.id.clone(), epub.entry_path(&item.href)))
        .collect();
    for (id, path) in documents {
        // Missing documents are reported by validation.
        if let Ok(content) = read_archive_file(&mut archive, &path)
            && has_inline_svg(&content)
        {
            epub.svg_documents.push(id);
        }
    }
    Ok(epub)
}

/// Read one entry of an EPUB on disk as text.
pub fn read_entry<P: AsRef<Path>>(path: P, name: &str) -> Result<String> {
    let mut archive = ZipArchive::new(std::fs::File::open(path)?)?;
    read_archive_file(&mut archive, name)
}

fn check_mimetype<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<bool> {
    if archive.is_empty() {
        return Ok(false);
    }
    let mut first = archive.by_index(0)?;
    if first.name() != "mimetype" || first.compression() != CompressionMethod::Stored {
        return Ok(false);
    }
    let mut content = Vec::new();
    first.read_to_end(&mut content)?;
    Ok(content == super::writer::MIMETYPE)
}

fn find_opf_path<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<String> {
    let container = read_archive_file(archive, CONTAINER_PATH)?;

    let mut reader = Reader::from_str(&container);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(e)) | Ok(Event::Start(e)) if local_name(e.name().as_ref()) == b"rootfile" => {
                if let Some(path) = attribute(&e, b"full-path")? {
                    return Ok(path);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::Xml(e)),
            _ => {}
        }
    }

    Err(Error::InvalidEpub("No rootfile found in container.xml".into()))
}

/// Text-bearing metadata element currently being read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Capture {
    Title,
    Creator,
    Language,
    Identifier,
    Publisher,
    Modified,
    Collection,
    AlternateTitle,
}

fn parse_opf(content: &str) -> Result<EpubPackage> {
    let mut reader = Reader::from_str(content);

    let mut epub = EpubPackage::default();
    let mut in_metadata = false;
    let mut capture: Option<Capture> = None;
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"metadata" => in_metadata = true,
                    b"title" if in_metadata => capture = Some(Capture::Title),
                    b"creator" if in_metadata => capture = Some(Capture::Creator),
                    b"language" if in_metadata => capture = Some(Capture::Language),
                    b"identifier" if in_metadata => capture = Some(Capture::Identifier),
                    b"publisher" if in_metadata => capture = Some(Capture::Publisher),
                    b"meta" if in_metadata => {
                        let property = attribute(&e, b"property")?;
                        let refines = attribute(&e, b"refines")?;
                        capture = match (property.as_deref(), refines.as_deref()) {
                            (Some("dcterms:modified"), _) => Some(Capture::Modified),
                            (Some("belongs-to-collection"), None) => Some(Capture::Collection),
                            (Some("alternate-script"), Some("#title")) => Some(Capture::AlternateTitle),
                            _ => None,
                        };
                    }
                    b"spine" => {
                        epub.page_progression = attribute(&e, b"page-progression-direction")?;
                    }
                    _ => {}
                }
                text.clear();
            }
            Ok(Event::Empty(e)) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"item" => {
                        let id = attribute(&e, b"id")?.unwrap_or_default();
                        if !id.is_empty() {
                            epub.items.push(PackageItem {
                                id,
                                href: attribute(&e, b"href")?.unwrap_or_default(),
                                media_type: attribute(&e, b"media-type")?.unwrap_or_default(),
                                properties: attribute(&e, b"properties")?,
                            });
                        }
                    }
                    b"itemref" => {
                        if let Some(idref) = attribute(&e, b"idref")? {
                            let linear = attribute(&e, b"linear")?.is_none_or(|l| l != "no");
                            epub.spine.push(SpineItem { idref, linear });
                        }
                    }
                    b"meta" if in_metadata => {
                        if attribute(&e, b"name")?.as_deref() == Some("cover") {
                            epub.metadata.cover_id = attribute(&e, b"content")?;
                        }
                    }
                    b"spine" => {
                        epub.page_progression = attribute(&e, b"page-progression-direction")?;
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(e)) => {
                if capture.is_some() {
                    text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::GeneralRef(e)) => {
                if capture.is_some() {
                    let entity = String::from_utf8_lossy(e.as_ref());
                    text.push_str(match entity.as_ref() {
                        "apos" => "'",
                        "quot" => "\"",
                        "lt" => "<",
                        "gt" => ">",
                        "amp" => "&",
                        _ => "",
                    });
                }
            }
            Ok(Event::End(e)) => {
                if local_name(e.name().as_ref()) == b"metadata" {
                    in_metadata = false;
                }
                if let Some(field) = capture.take() {
                    store(&mut epub.metadata, field, text.trim());
                }
                text.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::Xml(e)),
            _ => {}
        }
    }

    Ok(epub)
}

fn store(metadata: &mut Metadata, field: Capture, value: &str) {
    let value = value.to_string();
    match field {
        Capture::Title if metadata.title.is_empty() => metadata.title = value,
        Capture::Creator => metadata.authors.push(value),
        Capture::Language => metadata.language = value,
        Capture::Identifier if metadata.identifier.is_empty() => metadata.identifier = value,
        Capture::Publisher => metadata.publisher = Some(value),
        Capture::Modified => metadata.modified = value,
        Capture::Collection => metadata.series = Some(value),
        Capture::AlternateTitle => metadata.original_title = Some(value),
        _ => {}
    }
}

fn attribute(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>> {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == key {
            return Ok(Some(String::from_utf8(attr.value.to_vec())?));
        }
    }
    Ok(None)
}

fn read_archive_file<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &str) -> Result<String> {
    let mut file = archive.by_name(path)?;
    let mut contents = Vec::new();
    file.read_to_end(&mut contents)?;
    let bytes = contents.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(&contents);
    Ok(String::from_utf8(bytes.to_vec())?)
}

fn opf_dir(opf_path: &str) -> &str {
    opf_path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

fn resolve_path(base: &str, href: &str) -> String {
    if base.is_empty() {
        href.to_string()
    } else {
        format!("{}/{}", base, href)
    }
}

/// Extract local name from potentially namespaced XML name
fn local_name(name: &[u8]) -> &[u8] {
    name.iter()
        .rposition(|&b| b == b':')
        .map(|i| &name[i + 1..])
        .unwrap_or(name)
}
