//! §4.5: resolve a path like `/A/B.jar/C/D.jar/E` when no in-memory context
//! exists yet for any prefix of it, by walking the filesystem to the nearest
//! real file and then recursing into zip streams by longest-prefix match.

use std::{
    io::{Cursor, Read},
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use crate::{
    source::{datetime_to_system_time, is_archive_name_exact, DirSource, RawEntry, StreamSource, ZipSource},
    Error, Invariant, Result,
};

/// The outcome of a partial-path search: a source ready to be wrapped in an
/// `ArchiveContext` (or queried directly, for a single non-archive leaf), and
/// the local path inside it that should become the new context's
/// `rootEntryPath`.
pub enum Resolution {
    /// The suffix named a directory inside a nested zip stream.
    Directory(DirSource),
    /// The suffix named a single non-archive leaf entry.
    Leaf(SingleEntrySource),
    /// The suffix named a nested archive; recurse into it as a context root.
    Archive(StreamSource),
}

/// A source exposing exactly one file entry, for when partial-path search
/// lands on a plain (non-archive) leaf nested inside a zip stream.
pub struct SingleEntrySource {
    name: String,
    bytes: Vec<u8>,
    modified: SystemTime,
}

/// A leaf source has no children of its own; it implements [`ZipSource`] so
/// it can be wrapped in an `ArchiveContext` the same way `FileSource` and
/// `StreamSource` are, with the context's root handler marked a leaf.
impl ZipSource for SingleEntrySource {
    fn acquire(&self) -> Result<()> {
        Ok(())
    }

    fn release(&self) {}

    fn enumerate(&self) -> Result<Vec<RawEntry>> {
        Ok(Vec::new())
    }

    fn open_entry(&self, _entry: &RawEntry) -> Result<Box<dyn Read + Send>> {
        Err(Error::Invariant(Invariant::InvalidName { name: self.name.clone() }))
    }

    fn root_as_stream(&self) -> Result<Box<dyn Read + Send>> {
        Ok(Box::new(Cursor::new(self.bytes.clone())))
    }

    fn size(&self) -> Option<u64> {
        Some(self.bytes.len() as u64)
    }

    fn last_modified(&self) -> SystemTime {
        self.modified
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn exists(&self) -> bool {
        true
    }

    fn delete(&self, _grace: Duration) -> bool {
        false
    }

    fn has_been_modified(&self) -> bool {
        false
    }
}

/// Resolve `path`, an absolute on-disk path that may point past an existing
/// file into entries nested inside zip archives.
pub fn resolve(path: &Path) -> Result<Resolution> {
    let (existing, suffix) = nearest_existing_ancestor(path)?;
    let bytes = std::fs::read(&existing)?;
    resolve_within(&existing, bytes, &suffix)
}

/// Walk `path`'s ancestors until one exists on disk, returning it along with
/// the path's remainder relative to it.
fn nearest_existing_ancestor(path: &Path) -> Result<(PathBuf, String)> {
    let mut current = path.to_path_buf();
    let mut trailer = Vec::new();
    loop {
        if current.as_os_str().is_empty() || current == Path::new("/") {
            return Err(Error::NotFound(path.to_path_buf()));
        }
        if current.exists() {
            let suffix = trailer
                .into_iter()
                .rev()
                .collect::<Vec<_>>()
                .join("/");
            return Ok((current, suffix));
        }
        let name = current
            .file_name()
            .ok_or_else(|| Error::NotFound(path.to_path_buf()))?
            .to_string_lossy()
            .into_owned();
        trailer.push(name);
        current = current
            .parent()
            .ok_or_else(|| Error::NotFound(path.to_path_buf()))?
            .to_path_buf();
    }
}

/// Recurse into `bytes` (the contents of `source_path`, already read into
/// memory) matching `suffix` by longest entry-name prefix, per spec.md §4.5
/// steps 3-4.
fn resolve_within(source_path: &Path, bytes: Vec<u8>, suffix: &str) -> Result<Resolution> {
    let name = source_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    if suffix.is_empty() {
        // The existing file itself is the target: treat it as an archive root.
        let modified = std::fs::metadata(source_path)
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        return Ok(Resolution::Archive(StreamSource::new(name, bytes, modified)?));
    }

    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|source| Error::ArchiveFormat { name: name.clone(), source })?;

    // Longest entry name that is `suffix` itself or an ancestor of it (the
    // entry to either resolve directly or recurse into).
    let mut best_match: Option<(String, bool, u64, SystemTime)> = None;
    // Whether any entry is a descendant of `suffix`, meaning `suffix` names
    // an implicit directory the archive never listed explicitly.
    let mut implicit_directory: Option<SystemTime> = None;

    for i in 0..archive.len() {
        let entry = archive
            .by_index(i)
            .map_err(|source| Error::ArchiveFormat { name: name.clone(), source })?;
        let entry_name = entry.name().trim_end_matches('/').to_owned();
        let modified = datetime_to_system_time(entry.last_modified());

        if suffix == entry_name || suffix.starts_with(&format!("{entry_name}/")) {
            let is_better = match &best_match {
                Some((current, ..)) => entry_name.len() > current.len(),
                None => true,
            };
            if is_better {
                best_match = Some((entry_name, entry.is_dir(), entry.size(), modified));
            }
        } else if entry_name.starts_with(&format!("{suffix}/")) && implicit_directory.is_none() {
            implicit_directory = Some(modified);
        }
    }

    let (matched_name, is_dir, size, modified) = match best_match {
        Some(found) => found,
        None => {
            // No entry names `suffix` or an ancestor of it; if something
            // nests under it, `suffix` is a dummy directory the archive
            // never listed, same as `ArchiveContext::synthesize_dummy_parents`.
            let modified = implicit_directory.ok_or_else(|| Error::NotFound(PathBuf::from(suffix)))?;
            return Ok(Resolution::Directory(DirSource::new(suffix.to_owned(), modified)));
        }
    };

    if matched_name == suffix {
        if is_dir {
            return Ok(Resolution::Directory(DirSource::new(matched_name, modified)));
        }
        let mut zip_file = archive
            .by_name(&matched_name)
            .map_err(|source| Error::ArchiveFormat { name: name.clone(), source })?;
        let mut entry_bytes = Vec::with_capacity(size as usize);
        zip_file.read_to_end(&mut entry_bytes)?;

        if is_archive_name_exact(&matched_name) {
            return Ok(Resolution::Archive(StreamSource::new(matched_name, entry_bytes, modified)?));
        }
        return Ok(Resolution::Leaf(SingleEntrySource {
            name: matched_name,
            bytes: entry_bytes,
            modified,
        }));
    }

    // Recurse: the matched entry must itself be a nested archive, since it's
    // a strict prefix of the remaining suffix.
    let mut zip_file = archive
        .by_name(&matched_name)
        .map_err(|source| Error::ArchiveFormat { name: name.clone(), source })?;
    let mut nested_bytes = Vec::with_capacity(size as usize);
    zip_file.read_to_end(&mut nested_bytes)?;

    let remaining = &suffix[matched_name.len() + 1..];
    resolve_within(Path::new(&matched_name), nested_bytes, remaining)
}
