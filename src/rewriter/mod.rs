//! Atomic metadata rewriting for zip-based documents (EPUB and CBZ).
//!
//! A rewrite has three terminal outcomes:
//! - [`RewriteOutcome::Rewritten`]: the original file was replaced
//! - [`RewriteOutcome::NoOp`]: nothing to write, the original is untouched
//! - an error: the original is untouched and no temporary file is left behind
//!
//! The new archive is staged in a temporary file next to the original. Every entry
//! except the metadata descriptor is copied raw, so compressed bytes, compression
//! method and modification time are carried over exactly. The staged file is then
//! renamed over the original.

pub mod comic_info;
pub mod markup;
pub mod opf;

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{Read, Seek, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{Error, Result};
use crate::path_utils::{parent_directory, path_to_string_lossy, validate_archive_path};
use crate::types::{ArchiveKind, ArchiveMetadata, RewriteOutcome};

/// The metadata descriptor of an opened archive.
#[derive(Debug)]
struct Descriptor {
    entry_name: String,
    text: String,
    // ComicInfo.xml did not exist and will be appended
    is_new: bool,
}

/// Rewrites archive metadata in place.
///
/// By default concurrent rewrites of the same path through one rewriter (or its
/// clones) are rejected with [`Error::RewriteInProgress`] instead of racing.
#[derive(Debug, Clone)]
pub struct ArchiveRewriter {
    in_flight: Option<Arc<Mutex<HashSet<PathBuf>>>>,
}

impl Default for ArchiveRewriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveRewriter {
    pub fn new() -> Self {
        Self {
            in_flight: Some(Arc::new(Mutex::new(HashSet::new()))),
        }
    }

    /// A rewriter that leaves per-path exclusion to the caller.
    pub fn without_path_locking() -> Self {
        Self { in_flight: None }
    }

    /// Patches the metadata descriptor of the archive at `path`.
    pub fn rewrite(&self, path: &Path, metadata: &ArchiveMetadata) -> Result<RewriteOutcome> {
        self.rewrite_with(path, metadata, |file| file)
    }

    /// Reads the current descriptor values of the archive at `path`.
    ///
    /// A CBZ without `ComicInfo.xml` yields empty metadata.
    pub fn read_metadata(&self, path: &Path) -> Result<ArchiveMetadata> {
        let kind = detect_kind(path)?;
        validate_archive_path(path)?;
        let mut archive = open_archive(path)?;
        let descriptor = read_descriptor(&mut archive, kind, path)?;
        if descriptor.is_new {
            return Ok(ArchiveMetadata::default());
        }
        match kind {
            ArchiveKind::Epub => opf::extract(&descriptor.text),
            ArchiveKind::Cbz => comic_info::extract(&descriptor.text),
        }
    }

    /// [`rewrite`](Self::rewrite) with the staging writer produced by `wrap`.
    pub(crate) fn rewrite_with<W, F>(
        &self,
        path: &Path,
        metadata: &ArchiveMetadata,
        wrap: F,
    ) -> Result<RewriteOutcome>
    where
        W: Write + Seek,
        F: FnOnce(File) -> W,
    {
        let kind = detect_kind(path)?;
        if metadata.is_empty() {
            log::debug!("No metadata to write for {}", path_to_string_lossy(path));
            return Ok(RewriteOutcome::NoOp);
        }
        validate_archive_path(path)?;
        let _claim = self.claim(path)?;

        let mut archive = open_archive(path)?;
        let descriptor = read_descriptor(&mut archive, kind, path)?;
        let patched = match kind {
            ArchiveKind::Epub => opf::patch(&descriptor.text, metadata)?,
            ArchiveKind::Cbz => comic_info::patch(&descriptor.text, metadata)?,
        };
        if !descriptor.is_new && patched == descriptor.text {
            log::debug!(
                "Descriptor of {} already up to date",
                path_to_string_lossy(path)
            );
            return Ok(RewriteOutcome::NoOp);
        }

        let write_failure = |e: Error| Error::WriteFailure(path.to_path_buf(), e.to_string());

        // Dropping the temp file on any early return removes it from disk
        let temp = tempfile::Builder::new()
            .prefix(".shiori-")
            .suffix(".tmp")
            .tempfile_in(parent_directory(path))
            .map_err(|e| write_failure(e.into()))?;

        let staging = temp.reopen().map_err(|e| write_failure(e.into()))?;
        stage(wrap(staging), &mut archive, &descriptor, patched.as_bytes())
            .map_err(write_failure)?;
        temp.as_file()
            .sync_all()
            .map_err(|e| write_failure(e.into()))?;
        drop(archive);

        let permissions = fs::metadata(path)
            .map_err(|e| write_failure(e.into()))?
            .permissions();
        fs::set_permissions(temp.path(), permissions).map_err(|e| write_failure(e.into()))?;

        install(temp, path).map_err(write_failure)?;
        log::info!(
            "Rewrote {} in {}",
            descriptor.entry_name,
            path_to_string_lossy(path)
        );
        Ok(RewriteOutcome::Rewritten)
    }

    fn claim(&self, path: &Path) -> Result<PathClaim> {
        let Some(registry) = &self.in_flight else {
            return Ok(PathClaim::unregistered());
        };
        let key = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let mut in_flight = registry
            .lock()
            .map_err(|_| Error::Other("Rewrite registry is poisoned".to_string()))?;
        if !in_flight.insert(key.clone()) {
            return Err(Error::RewriteInProgress(path.to_path_buf()));
        }
        Ok(PathClaim {
            registry: Some(Arc::clone(registry)),
            key,
        })
    }
}

/// Holds a path in the in-flight registry until dropped.
struct PathClaim {
    registry: Option<Arc<Mutex<HashSet<PathBuf>>>>,
    key: PathBuf,
}

impl PathClaim {
    fn unregistered() -> Self {
        Self {
            registry: None,
            key: PathBuf::new(),
        }
    }
}

impl Drop for PathClaim {
    fn drop(&mut self) {
        if let Some(registry) = &self.registry {
            if let Ok(mut in_flight) = registry.lock() {
                in_flight.remove(&self.key);
            }
        }
    }
}

fn detect_kind(path: &Path) -> Result<ArchiveKind> {
    ArchiveKind::from_path(path).ok_or_else(|| {
        Error::Unsupported(format!(
            "Cannot rewrite metadata of '{}': only EPUB and CBZ archives are supported",
            path_to_string_lossy(path)
        ))
    })
}

fn open_archive(path: &Path) -> Result<ZipArchive<File>> {
    let malformed = |reason: String| Error::MalformedArchive(path.to_path_buf(), reason);
    let file = File::open(path).map_err(|e| malformed(e.to_string()))?;
    ZipArchive::new(file).map_err(|e| malformed(e.to_string()))
}

fn read_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str, path: &Path) -> Result<String> {
    let malformed = |reason: String| Error::MalformedArchive(path.to_path_buf(), reason);
    let mut entry = archive
        .by_name(name)
        .map_err(|e| malformed(format!("{}: {}", name, e)))?;
    let mut text = String::new();
    entry
        .read_to_string(&mut text)
        .map_err(|e| malformed(format!("{} is not readable UTF-8: {}", name, e)))?;
    Ok(text)
}

fn read_descriptor<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    kind: ArchiveKind,
    path: &Path,
) -> Result<Descriptor> {
    match kind {
        ArchiveKind::Epub => {
            let container = read_entry(archive, opf::CONTAINER_PATH, path)?;
            let entry_name = opf::locate_package_path(&container).ok_or_else(|| {
                Error::MalformedArchive(
                    path.to_path_buf(),
                    "container.xml names no package document".to_string(),
                )
            })?;
            let text = read_entry(archive, &entry_name, path)?;
            Ok(Descriptor {
                entry_name,
                text,
                is_new: false,
            })
        }
        ArchiveKind::Cbz => {
            let existing = archive
                .file_names()
                .find(|name| name.eq_ignore_ascii_case(comic_info::COMIC_INFO_PATH))
                .map(str::to_string);
            match existing {
                Some(entry_name) => {
                    let text = read_entry(archive, &entry_name, path)?;
                    Ok(Descriptor {
                        entry_name,
                        text,
                        is_new: false,
                    })
                }
                None => Ok(Descriptor {
                    entry_name: comic_info::COMIC_INFO_PATH.to_string(),
                    text: comic_info::TEMPLATE.to_string(),
                    is_new: true,
                }),
            }
        }
    }
}

/// Writes the new archive: raw copies of every entry, the patched descriptor in place.
fn stage<W, R>(
    writer: W,
    archive: &mut ZipArchive<R>,
    descriptor: &Descriptor,
    patched: &[u8],
) -> Result<W>
where
    W: Write + Seek,
    R: Read + Seek,
{
    let mut zip = ZipWriter::new(writer);

    for index in 0..archive.len() {
        let entry = archive.by_index_raw(index)?;
        if entry.name() != descriptor.entry_name {
            zip.raw_copy_file(entry)?;
            continue;
        }

        let compression = match entry.compression() {
            CompressionMethod::Stored => CompressionMethod::Stored,
            _ => CompressionMethod::Deflated,
        };
        let mut options = SimpleFileOptions::default().compression_method(compression);
        if let Some(modified) = entry.last_modified() {
            options = options.last_modified_time(modified);
        }
        if let Some(mode) = entry.unix_mode() {
            options = options.unix_permissions(mode);
        }
        drop(entry);

        zip.start_file(descriptor.entry_name.as_str(), options)?;
        zip.write_all(patched)?;
    }

    if descriptor.is_new {
        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        zip.start_file(descriptor.entry_name.as_str(), options)?;
        zip.write_all(patched)?;
    }

    Ok(zip.finish()?)
}

/// Moves the staged file over `path`, falling back to copy-then-delete.
fn install(temp: tempfile::NamedTempFile, path: &Path) -> Result<()> {
    match temp.persist(path) {
        Ok(_) => Ok(()),
        Err(e) => {
            log::warn!(
                "Rename onto {} failed ({}), copying instead",
                path_to_string_lossy(path),
                e.error
            );
            // The temp file is deleted when `e.file` drops
            fs::copy(e.file.path(), path)?;
            Ok(())
        }
    }
}
