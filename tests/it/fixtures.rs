//! Synthetic zip construction for tests, in place of the checked-in
//! `testdata/` trees the crate this exercise is adapted from uses. Archives
//! here are tiny and built on the fly with [`zip::ZipWriter`].

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Build a zip archive in memory from `entries` (path, content) pairs and
/// write it to `dir/name`, returning the written path.
///
/// Entries are stored uncompressed; nothing here exercises the deflate path,
/// so there's no reason to pull extra dependencies into it.
pub fn write_zip(dir: &Path, name: &str, entries: &[(&str, &[u8])]) -> PathBuf {
    let path = dir.join(name);
    let bytes = zip_bytes(entries);
    std::fs::write(&path, bytes).expect("write fixture archive");
    path
}

/// Build a zip archive in memory and return its bytes directly, for entries
/// that get embedded inside another archive rather than written to disk.
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    for (entry_name, content) in entries {
        writer.start_file(*entry_name, options).expect("start_file");
        writer.write_all(content).expect("write entry content");
    }
    writer
        .finish()
        .expect("finish archive")
        .into_inner()
}

/// Count files under the shared nested-extraction temp directory whose name
/// ends with `marker`. Tests pick a unique marker (typically embedding the
/// process id) so parallel test runs can't observe each other's extractions.
pub fn count_temp_files(marker: &str) -> usize {
    let root = std::env::temp_dir().join("vfs-nested.tmp");
    std::fs::read_dir(&root)
        .map(|read_dir| {
            read_dir
                .flatten()
                .filter(|entry| entry.file_name().to_string_lossy().ends_with(marker))
                .count()
        })
        .unwrap_or(0)
}
