use std::{
    fs::{self, File},
    io::{BufReader, Read},
    path::PathBuf,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::{Duration, SystemTime},
};

use parking_lot::Mutex;

use crate::{config::ForceFlags, Error, Result};

use super::{datetime_to_system_time, reaper, RawEntry, ZipSource};

/// A random-access source over an on-disk zip file.
///
/// Descriptor lifetime depends on the reaper mode selected by
/// [`super::super::Options::no_reaper`] (or the process-wide
/// [`ForceFlags::force_no_reaper`] override): in reaper mode (the default) the
/// descriptor stays open only while acquired, plus a grace period after the
/// last release, after which a background sweeper closes it; in synchronous
/// mode it's closed at every release.
pub struct FileSource {
    inner: Arc<FileSourceState>,
}

pub(super) struct FileSourceState {
    path: PathBuf,
    handle: Mutex<Option<File>>,
    refcount: AtomicUsize,
    idle_since: Mutex<Option<SystemTime>>,
    indexed_mtime: Mutex<Option<SystemTime>>,
    reaper_enabled: bool,
    grace: Duration,
}

impl FileSource {
    /// Create a new source over `path`. The file is not opened until the
    /// first [`ZipSource::acquire`] call.
    pub fn new(path: PathBuf, no_reaper: bool, grace: Duration) -> Self {
        let reaper_enabled = !no_reaper && !ForceFlags::current().force_no_reaper;
        let indexed_mtime = fs::metadata(&path).ok().and_then(|m| m.modified().ok());
        let inner = Arc::new(FileSourceState {
            path,
            handle: Mutex::new(None),
            refcount: AtomicUsize::new(0),
            idle_since: Mutex::new(None),
            indexed_mtime: Mutex::new(indexed_mtime),
            reaper_enabled,
            grace,
        });
        if reaper_enabled {
            reaper::register(Arc::downgrade(&inner));
        }
        Self { inner }
    }
}

impl FileSourceState {
    fn open(&self) -> Result<()> {
        let mut handle = self.handle.lock();
        if handle.is_none() {
            *handle = Some(File::open(&self.path)?);
        }
        Ok(())
    }

    /// Called by the reaper: close the descriptor if it's been idle past the
    /// grace period and nobody currently holds a reference.
    pub(super) fn sweep_if_idle(&self, now: SystemTime) {
        if self.refcount.load(Ordering::Acquire) != 0 {
            return;
        }
        let mut idle_since = self.idle_since.lock();
        let Some(since) = *idle_since else { return };
        let elapsed = now.duration_since(since).unwrap_or_default();
        if elapsed >= self.grace {
            *self.handle.lock() = None;
            *idle_since = None;
        }
    }
}

impl ZipSource for FileSource {
    fn acquire(&self) -> Result<()> {
        self.inner.refcount.fetch_add(1, Ordering::AcqRel);
        *self.inner.idle_since.lock() = None;
        self.inner.open()
    }

    fn release(&self) {
        let previous = self.inner.refcount.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "released a FileSource with no outstanding acquire");
        if previous == 1 {
            if self.inner.reaper_enabled {
                *self.inner.idle_since.lock() = Some(SystemTime::now());
            } else {
                *self.inner.handle.lock() = None;
            }
        }
    }

    fn enumerate(&self) -> Result<Vec<RawEntry>> {
        self.acquire()?;
        let result = (|| {
            let handle = self.inner.handle.lock();
            let file = handle.as_ref().expect("acquired FileSource must have a handle");
            let mut archive = zip::ZipArchive::new(BufReader::new(file.try_clone()?))
                .map_err(|source| Error::ArchiveFormat { name: self.name().to_owned(), source })?;
            let mut entries = Vec::with_capacity(archive.len());
            for i in 0..archive.len() {
                let entry = archive
                    .by_index(i)
                    .map_err(|source| Error::ArchiveFormat { name: self.name().to_owned(), source })?;
                entries.push(RawEntry {
                    name: entry.name().to_owned(),
                    size: entry.size(),
                    modified: Some(datetime_to_system_time(entry.last_modified())),
                    is_directory: entry.is_dir(),
                });
            }
            Ok(entries)
        })();
        self.release();
        result
    }

    fn open_entry(&self, entry: &RawEntry) -> Result<Box<dyn Read + Send>> {
        self.acquire()?;
        let result = (|| {
            let handle = self.inner.handle.lock();
            let file = handle.as_ref().expect("acquired FileSource must have a handle");
            let mut archive = zip::ZipArchive::new(BufReader::new(file.try_clone()?))
                .map_err(|source| Error::ArchiveFormat { name: self.name().to_owned(), source })?;
            let mut zip_file = archive
                .by_name(&entry.name)
                .map_err(|source| Error::ArchiveFormat { name: self.name().to_owned(), source })?;
            let mut buf = Vec::with_capacity(entry.size as usize);
            zip_file.read_to_end(&mut buf)?;
            Ok(buf)
        })();
        self.release();
        result.map(|buf| Box::new(std::io::Cursor::new(buf)) as Box<dyn Read + Send>)
    }

    fn root_as_stream(&self) -> Result<Box<dyn Read + Send>> {
        self.acquire()?;
        let result = (|| {
            let handle = self.inner.handle.lock();
            let file = handle.as_ref().expect("acquired FileSource must have a handle");
            let mut buf = Vec::new();
            file.try_clone()?.read_to_end(&mut buf)?;
            Ok(buf)
        })();
        self.release();
        result.map(|buf| Box::new(std::io::Cursor::new(buf)) as Box<dyn Read + Send>)
    }

    fn size(&self) -> Option<u64> {
        fs::metadata(&self.inner.path).ok().map(|m| m.len())
    }

    fn last_modified(&self) -> SystemTime {
        fs::metadata(&self.inner.path)
            .ok()
            .and_then(|m| m.modified().ok())
            .unwrap_or(SystemTime::UNIX_EPOCH)
    }

    fn name(&self) -> &str {
        self.inner
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("")
    }

    fn exists(&self) -> bool {
        self.inner.path.exists()
    }

    fn delete(&self, grace: Duration) -> bool {
        std::thread::sleep(grace);
        *self.inner.handle.lock() = None;
        fs::remove_file(&self.inner.path).is_ok()
    }

    fn has_been_modified(&self) -> bool {
        let current = fs::metadata(&self.inner.path).ok().and_then(|m| m.modified().ok());
        let mut indexed = self.inner.indexed_mtime.lock();
        let modified = *indexed != current;
        if modified {
            *indexed = current;
        }
        modified
    }
}
