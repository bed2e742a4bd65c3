//! Staging and zipping.
//!
//! A package is first written out as a directory tree (the build's temporary
//! directory), then that tree is zipped in package order. The container
//! never sees a file that was not staged first.

use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::debug;
use zip::CompressionMethod;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::error::Result;
use crate::package::{ItemSource, Package};

use super::opf::generate_opf;

pub const MIMETYPE: &[u8] = b"application/epub+zip";
pub const CONTAINER_PATH: &str = "META-INF/container.xml";
pub const OPF_PATH: &str = "OEBPS/package.opf";
/// Directory holding the OPF and every manifest item.
pub const CONTENT_DIR: &str = "OEBPS";

const CONTAINER_XML: &[u8] = br#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/package.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>
"#;

/// Configuration for EPUB writing.
#[derive(Debug, Clone, Default)]
pub struct WriterOptions {
    /// Compression level for deflate (0-9, default 6).
    pub compression_level: Option<u32>,
}

/// Write every file of `package` below `staging`.
///
/// Returns the zip entry names after `mimetype`, in the order they must be
/// written: container, OPF, then manifest items in package order.
pub fn stage_package(package: &Package, staging: &Path) -> Result<Vec<String>> {
    let mut entries = Vec::with_capacity(package.items.len() + 2);

    stage_bytes(staging, CONTAINER_PATH, CONTAINER_XML)?;
    entries.push(CONTAINER_PATH.to_string());

    stage_bytes(staging, OPF_PATH, generate_opf(package).as_bytes())?;
    entries.push(OPF_PATH.to_string());

    for item in &package.items {
        let entry = format!("{}/{}", CONTENT_DIR, item.href);
        match &item.source {
            ItemSource::Inline(content) => stage_bytes(staging, &entry, content.as_bytes())?,
            ItemSource::File(source) => {
                let dest = staging.join(&entry);
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::copy(source, &dest)?;
            }
        }
        entries.push(entry);
    }

    debug!(files = entries.len(), dir = %staging.display(), "package staged");
    Ok(entries)
}

fn stage_bytes(staging: &Path, entry: &str, data: &[u8]) -> Result<()> {
    let dest = staging.join(entry);
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(dest, data)?;
    Ok(())
}

/// Zip a staged tree into `output`.
///
/// `mimetype` goes first and uncompressed; everything else is deflated in
/// the given order. The archive is written to a temp file next to `output`
/// and renamed into place, so a failed write leaves any previous `output`
/// untouched.
pub fn write_epub(staging: &Path, entries: &[String], output: &Path, options: &WriterOptions) -> Result<()> {
    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let compression_level = options.compression_level.unwrap_or(6);
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let deflated = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(compression_level as i64));

    let tmp = NamedTempFile::new_in(dir)?;
    let mut zip = ZipWriter::new(tmp.reopen()?);

    zip.start_file("mimetype", stored)?;
    zip.write_all(MIMETYPE)?;

    for entry in entries {
        let data = fs::read(staging.join(entry))?;
        zip.start_file(entry.as_str(), deflated)?;
        zip.write_all(&data)?;
    }

    zip.finish()?.sync_all()?;
    tmp.persist(output).map_err(|e| e.error)?;
    Ok(())
}

/// Stage `package` below `staging` and zip it into `output`.
pub fn package_epub(package: &Package, staging: &Path, output: &Path, options: &WriterOptions) -> Result<()> {
    let entries = stage_package(package, staging)?;
    write_epub(staging, &entries, output, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::{CSS, XHTML};
    use std::fs::File;
    use std::io::Read;
    use tempfile::TempDir;

    #[test]
    fn test_entry_order_and_mimetype() {
        let dir = TempDir::new().unwrap();
        let image = dir.path().join("k1.png");
        fs::write(&image, b"\x89PNG\r\n\x1a\n").unwrap();

        let mut package = Package::new();
        package.add_document("css", "Styles/stylesheet.css", CSS, "body {}".into());
        package.add_document("chapter-001", "Text/chapter-001.xhtml", XHTML, "<html/>".into());
        package.add_file("img-k1", "Images/k1.png", "image/png", image);

        let staging = dir.path().join("stage");
        let output = dir.path().join("out/book.epub");
        package_epub(&package, &staging, &output, &WriterOptions::default()).unwrap();

        assert!(staging.join("OEBPS/Images/k1.png").is_file());

        let mut archive = zip::ZipArchive::new(File::open(&output).unwrap()).unwrap();
        let names: Vec<_> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        assert_eq!(
            names,
            [
                "mimetype",
                "META-INF/container.xml",
                "OEBPS/package.opf",
                "OEBPS/Styles/stylesheet.css",
                "OEBPS/Text/chapter-001.xhtml",
                "OEBPS/Images/k1.png",
            ]
        );

        let mut mimetype = archive.by_index(0).unwrap();
        assert_eq!(mimetype.compression(), CompressionMethod::Stored);
        let mut content = String::new();
        mimetype.read_to_string(&mut content).unwrap();
        assert_eq!(content, "application/epub+zip");
    }

    #[test]
    fn test_failed_write_keeps_previous_output() {
        let dir = TempDir::new().unwrap();
        let staging = dir.path().join("stage");
        let output = dir.path().join("book.epub");
        fs::write(&output, b"previous").unwrap();

        let entries = vec!["OEBPS/Text/missing.xhtml".to_string()];
        assert!(write_epub(&staging, &entries, &output, &WriterOptions::default()).is_err());

        assert_eq!(fs::read(&output).unwrap(), b"previous");
        let leftovers: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn test_failed_write_creates_no_output() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("out/book.epub");
        let entries = vec!["OEBPS/package.opf".to_string()];
        assert!(write_epub(&dir.path().join("stage"), &entries, &output, &WriterOptions::default()).is_err());
        assert!(!output.exists());
        assert_eq!(fs::read_dir(dir.path().join("out")).unwrap().count(), 0);
    }
}
