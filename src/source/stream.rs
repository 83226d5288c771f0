use std::{
    io::{Cursor, Read},
    time::{Duration, SystemTime},
};

use parking_lot::Mutex;

use crate::{Error, Result};

use super::{datetime_to_system_time, RawEntry, ZipSource};

/// A one-shot, in-memory zip source: the entire archive's bytes are buffered
/// up front (zip streams can't be seeked or re-scanned), then a `ZipArchive`
/// is built over the buffer to support random-access-style lookups.
///
/// Used for no-copy nested mounts, where the inflated bytes of a nested
/// archive entry are captured once and held in memory rather than extracted
/// to a temp file.
pub struct StreamSource {
    name: String,
    buffer: Vec<u8>,
    modified: SystemTime,
    // Cached so `enumerate`/`open_entry` don't reparse the central directory
    // on every call; behind a lock since `ZipSource` methods take `&self`.
    archive: Mutex<zip::ZipArchive<Cursor<Vec<u8>>>>,
}

impl StreamSource {
    /// Build a source from already-inflated bytes plus the name and
    /// last-modified time inherited from the entry the stream came from.
    pub fn new(name: String, buffer: Vec<u8>, modified: SystemTime) -> Result<Self> {
        let archive = zip::ZipArchive::new(Cursor::new(buffer.clone()))
            .map_err(|source| Error::ArchiveFormat { name: name.clone(), source })?;
        Ok(Self {
            name,
            buffer,
            modified,
            archive: Mutex::new(archive),
        })
    }
}

impl ZipSource for StreamSource {
    fn acquire(&self) -> Result<()> {
        Ok(())
    }

    fn release(&self) {}

    fn enumerate(&self) -> Result<Vec<RawEntry>> {
        let mut archive = self.archive.lock();
        let mut entries = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let entry = archive
                .by_index(i)
                .map_err(|source| Error::ArchiveFormat { name: self.name.clone(), source })?;
            entries.push(RawEntry {
                name: entry.name().to_owned(),
                size: entry.size(),
                modified: Some(datetime_to_system_time(entry.last_modified())),
                is_directory: entry.is_dir(),
            });
        }
        Ok(entries)
    }

    fn open_entry(&self, entry: &RawEntry) -> Result<Box<dyn Read + Send>> {
        let mut archive = self.archive.lock();
        let mut zip_file = archive
            .by_name(&entry.name)
            .map_err(|source| Error::ArchiveFormat { name: self.name.clone(), source })?;
        let mut buf = Vec::with_capacity(entry.size as usize);
        zip_file.read_to_end(&mut buf)?;
        Ok(Box::new(Cursor::new(buf)))
    }

    fn root_as_stream(&self) -> Result<Box<dyn Read + Send>> {
        Ok(Box::new(Cursor::new(self.buffer.clone())))
    }

    fn size(&self) -> Option<u64> {
        Some(self.buffer.len() as u64)
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
