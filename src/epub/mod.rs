//! EPUB serialization: page templates, OPF generation, zip packaging and
//! post-hoc validation.

mod opf;
mod reader;
mod validate;
mod writer;
pub mod xhtml;

pub use opf::generate_opf;
pub use reader::{EpubPackage, PackageItem, read_entry, read_epub, read_epub_from_reader};
pub use validate::{validate, validate_epub};
pub use writer::{
    CONTAINER_PATH, CONTENT_DIR, MIMETYPE, OPF_PATH, WriterOptions, package_epub, stage_package, write_epub,
};

/// Escape XML special characters.
pub fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
