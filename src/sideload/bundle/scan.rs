//! Executable image discovery.

use crate::sideload::error::{Error, ErrorExt, Result};
use std::{
    io::Read,
    path::{Path, PathBuf},
};

/// Universal (fat) binary magic, as stored on disk.
pub const FAT_MAGIC_BYTES: [u8; 4] = [0xCA, 0xFE, 0xBA, 0xBE];

/// 64-bit little-endian Mach-O magic, as stored on disk.
pub const MACHO_64_MAGIC_BYTES: [u8; 4] = [0xCF, 0xFA, 0xED, 0xFE];

const DYLIB_EXTENSION: &str = "dylib";

/// A file recognised as an executable image by its magic number.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Image {
    path: PathBuf,
}

impl Image {
    /// Wraps a path already known to be an image.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The image's location.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AsRef<Path> for Image {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

/// Whether a 4-byte prefix is one of the recognised image magics.
pub fn is_image_magic(prefix: &[u8]) -> bool {
    prefix == FAT_MAGIC_BYTES || prefix == MACHO_64_MAGIC_BYTES
}

/// Whether an extension qualifies a file for the magic check.
fn has_candidate_extension(path: &Path) -> bool {
    match path.extension() {
        None => true,
        Some(ext) => ext.is_empty() || ext == DYLIB_EXTENSION,
    }
}

/// Classifies one file: extension filter, size floor, then magic read.
pub fn classify(path: &Path) -> Result<Option<Image>> {
    if !has_candidate_extension(path) {
        return Ok(None);
    }

    let mut file = std::fs::File::open(path).fs_context("opening candidate image", path)?;
    let mut prefix = [0u8; 4];
    match file.read_exact(&mut prefix) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e).fs_context("reading candidate image", path),
    }

    Ok(is_image_magic(&prefix).then(|| Image::new(path)))
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'))
}

/// Walks `root` in enumeration order and returns every image found.
///
/// Hidden entries are skipped along with everything below them.
pub async fn scan(root: &Path) -> Result<Vec<Image>> {
    let root = root.to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<Vec<Image>> {
        let mut images = Vec::new();
        let walker = walkdir::WalkDir::new(&root)
            .into_iter()
            .filter_entry(|entry| !is_hidden(entry));

        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let metadata = entry.metadata()?;
            if metadata.len() < 4 {
                continue;
            }
            if let Some(image) = classify(entry.path())? {
                images.push(image);
            }
        }

        Ok(images)
    })
    .await
    .map_err(|e| Error::GenericError(format!("Image scan task panicked: {e}")))?
}

/// Whether an `otool -l` listing reports an active encryption segment.
///
/// True when a line naming `LC_ENCRYPTION_INFO` is followed anywhere later by
/// a line containing `cryptid 1`. Other nonzero crypt ids are not detected.
pub fn listing_reports_encryption(listing: &str) -> bool {
    let mut lines = listing.lines();
    lines.any(|line| line.contains("LC_ENCRYPTION_INFO"))
        && lines.any(|line| line.contains("cryptid 1"))
}
