use std::{
    io::Read,
    time::{Duration, SystemTime},
};

use crate::{Error, Invariant, Result};

use super::{RawEntry, ZipSource};

/// A synthetic source exposing a single directory entry, with no children of
/// its own. Produced by partial-path search when the matched suffix names a
/// directory inside a nested zip stream rather than a file or archive.
pub struct DirSource {
    name: String,
    modified: SystemTime,
}

impl DirSource {
    /// Build a source standing in for the directory named `name`, inheriting
    /// `modified` from the owning archive (per spec, a dummy directory's
    /// last-modified time is the source's last-modified time).
    pub fn new(name: String, modified: SystemTime) -> Self {
        Self { name, modified }
    }
}

impl ZipSource for DirSource {
    fn acquire(&self) -> Result<()> {
        Ok(())
    }

    fn release(&self) {}

    fn enumerate(&self) -> Result<Vec<RawEntry>> {
        Ok(vec![RawEntry {
            name: self.name.clone(),
            size: 0,
            modified: Some(self.modified),
            is_directory: true,
        }])
    }

    fn open_entry(&self, _entry: &RawEntry) -> Result<Box<dyn Read + Send>> {
        Err(Error::Invariant(Invariant::InvalidName {
            name: self.name.clone(),
        }))
    }

    fn root_as_stream(&self) -> Result<Box<dyn Read + Send>> {
        Err(Error::Invariant(Invariant::InvalidName {
            name: self.name.clone(),
        }))
    }

    fn size(&self) -> Option<u64> {
        Some(0)
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
