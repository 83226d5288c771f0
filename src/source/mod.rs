//! Uniform byte-level view over an archive, in three flavors: a random-access
//! on-disk file, a one-shot in-memory buffer (used for no-copy nested
//! mounts), and a synthetic single-directory source.

mod dir;
mod file;
mod reaper;
mod stream;

pub use dir::DirSource;
pub use file::FileSource;
pub use stream::StreamSource;

use std::{
    io::Read,
    time::{Duration, SystemTime},
};

use crate::Result;

/// Convert a zip entry's MS-DOS-resolution timestamp into a [`SystemTime`].
///
/// The zip format only stores local time with two-second resolution and no
/// timezone; this treats it as UTC, which is the conventional interpretation
/// (`unzip`/`jar` do the same).
pub(crate) fn datetime_to_system_time(time: zip::DateTime) -> SystemTime {
    let days = days_from_civil(time.year() as i64, time.month() as u32, time.day() as u32);
    let secs = days * 86_400
        + i64::from(time.hour()) * 3_600
        + i64::from(time.minute()) * 60
        + i64::from(time.second());
    if secs >= 0 {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs as u64)
    } else {
        SystemTime::UNIX_EPOCH - Duration::from_secs((-secs) as u64)
    }
}

/// Days since the Unix epoch for a given proleptic-Gregorian civil date.
/// Howard Hinnant's `days_from_civil` algorithm.
fn days_from_civil(y: i64, m: u32, d: u32) -> i64 {
    let y = if m <= 2 { y - 1 } else { y };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = (y - era * 400) as i64;
    let mp = (m as i64 + 9) % 12;
    let doy = (153 * mp + 2) / 5 + d as i64 - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

/// Metadata for one entry inside a zip, detached from the archive's lifetime
/// so it can be cached in the [`crate::index::EntryIndex`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawEntry {
    /// Full name of the entry as stored in the zip's central directory.
    pub name: String,
    /// Uncompressed size in bytes.
    pub size: u64,
    /// Last-modified time recorded in the zip entry, if any.
    pub modified: Option<SystemTime>,
    /// Whether the entry is a directory entry (name ends in `/`).
    pub is_directory: bool,
}

/// A uniform source of zip bytes, regardless of whether it's backed by a
/// file, an in-memory buffer, or a synthetic single directory.
pub trait ZipSource: Send + Sync {
    /// Acquire a reference to the underlying resource (e.g. open a file
    /// descriptor). Must be paired with a matching [`ZipSource::release`].
    fn acquire(&self) -> Result<()>;

    /// Release a reference acquired with [`ZipSource::acquire`].
    fn release(&self);

    /// List every entry under this source's root.
    fn enumerate(&self) -> Result<Vec<RawEntry>>;

    /// Open a readable stream over a specific entry's decompressed bytes.
    fn open_entry(&self, entry: &RawEntry) -> Result<Box<dyn Read + Send>>;

    /// Open a readable stream over the source's root itself (used when a
    /// context's root handler is opened directly, e.g. to read a whole
    /// nested archive's raw bytes).
    fn root_as_stream(&self) -> Result<Box<dyn Read + Send>>;

    /// Size of the backing resource, if known up front.
    fn size(&self) -> Option<u64>;

    /// Last-modified time of the backing resource.
    fn last_modified(&self) -> SystemTime;

    /// Human-readable name of this source (usually a file name).
    fn name(&self) -> &str;

    /// Whether the backing resource still exists.
    fn exists(&self) -> bool;

    /// Attempt to delete the backing resource after waiting `grace`.
    /// Returns whether the delete succeeded.
    fn delete(&self, grace: Duration) -> bool;

    /// Whether the backing resource has changed since it was last indexed.
    fn has_been_modified(&self) -> bool;
}

/// Extensions recognized as nested archives. The check is case-insensitive.
const ARCHIVE_EXTENSIONS: &[&str] = &["zip", "jar", "war", "ear", "sar", "rar"];

/// Whether `name` (a raw zip entry name, not a local path) looks like a
/// nested archive based on its extension.
pub fn is_archive_name(name: &str) -> bool {
    let name = name.trim_end_matches('/');
    match name.rsplit_once('.') {
        Some((_, ext)) => ARCHIVE_EXTENSIONS
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(ext)),
        None => false,
    }
}

/// As [`is_archive_name`], but exact-case: used during partial-path search,
/// where raw zip entry names are matched as written rather than folded.
pub fn is_archive_name_exact(name: &str) -> bool {
    let name = name.trim_end_matches('/');
    match name.rsplit_once('.') {
        Some((_, ext)) => ARCHIVE_EXTENSIONS.iter().any(|candidate| *candidate == ext),
        None => false,
    }
}
