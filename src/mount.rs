//! Nested-archive mounting: given a zip entry that looks like a nested
//! archive, either stream it into memory or extract it to a temp file, then
//! wrap the result in a sub-[`ArchiveContext`] exposed through a
//! `DelegatingHandler`.

use std::{
    fs::{self, File},
    io::Read,
    path::PathBuf,
    sync::{Arc, OnceLock},
    time::Duration,
};

use dashmap::DashMap;

use crate::{
    context::ArchiveContext,
    handler::Handler,
    source::{FileSource, RawEntry, StreamSource},
    Error, Result,
};

/// Grace period before a reaper-managed descriptor on a freshly extracted
/// nested archive is closed after release.
const MOUNT_GRACE: Duration = Duration::from_secs(5);

static TEMP_ROOT_SWEPT: OnceLock<()> = OnceLock::new();

fn temp_root() -> PathBuf {
    std::env::temp_dir().join("vfs-nested.tmp")
}

/// One-time sweep of the shared temp directory's direct, non-hidden,
/// non-directory children. Run lazily before the first extraction in the
/// process, mirroring spec.md §5's "at startup" sweep without requiring
/// callers to invoke an explicit init function.
fn ensure_temp_root_swept() {
    TEMP_ROOT_SWEPT.get_or_init(|| {
        let root = temp_root();
        let Ok(read_dir) = fs::read_dir(&root) else {
            return;
        };
        for entry in read_dir.flatten() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with('.') {
                continue;
            }
            if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                let _ = fs::remove_file(entry.path());
            }
        }
    });
}

/// A record linking a context-relative nested-archive path to its extracted
/// temp file, so repeated lookups reuse the extraction instead of
/// re-extracting on every `getChild`.
#[derive(Clone)]
pub(crate) struct TempInfo {
    pub(crate) path: PathBuf,
}

/// Per-context allocator of extracted nested archives, keyed by the
/// context-relative path of the archive entry that was extracted.
pub(crate) struct TempStore {
    infos: DashMap<String, TempInfo>,
}

impl TempStore {
    pub(crate) fn new() -> Self {
        Self { infos: DashMap::new() }
    }

    /// An existing extraction for `key`, if one was made and the file is
    /// still present.
    pub(crate) fn existing(&self, key: &str) -> Option<TempInfo> {
        self.infos
            .get(key)
            .map(|entry| entry.clone())
            .filter(|info| info.path.exists())
    }

    /// Extract `reader`'s bytes to a freshly named temp file under this
    /// store's directory, recording the result under `key` for reuse.
    pub(crate) fn extract(&self, key: &str, original_name: &str, mut reader: impl Read) -> Result<TempInfo> {
        ensure_temp_root_swept();
        let dir = temp_root();
        fs::create_dir_all(&dir).map_err(|source| Error::TempIO { path: dir.clone(), source })?;

        let prefix: u32 = rand::random();
        let file_name = format!("{prefix:08x}_{original_name}");
        let path = dir.join(file_name);

        let mut file = File::create(&path).map_err(|source| Error::TempIO { path: path.clone(), source })?;
        std::io::copy(&mut reader, &mut file).map_err(|source| Error::TempIO { path: path.clone(), source })?;

        let info = TempInfo { path };
        self.infos.insert(key.to_owned(), info.clone());
        Ok(info)
    }
}

/// §4.3's nested-archive classification: select a nesting policy and return
/// the `DelegatingHandler` installed at `local_path`. Failures fall back to a
/// plain, non-recursing leaf handler rather than propagating, per spec.md §7
/// and the §9 open question resolving that fallback to be explicit.
pub(crate) fn mount_nested(
    parent: &ArchiveContext,
    local_path: &str,
    child_name: &str,
    raw_entry: &RawEntry,
) -> Result<Handler> {
    let use_copy = parent.options().effective_use_copy();
    let outcome = if use_copy {
        mount_copy(parent, local_path, child_name, raw_entry)
    } else {
        mount_stream(parent, local_path, child_name, raw_entry)
    };

    match outcome {
        Ok(handler) => Ok(handler),
        Err(err) => {
            log::warn!(
                "mounting nested archive {child_name:?} ({local_path:?}) failed, exposing as a plain leaf: {err}"
            );
            Ok(Handler::zip_entry(
                parent.weak_self(),
                local_path.to_owned(),
                child_name.to_owned(),
                true,
            ))
        }
    }
}

fn mount_copy(
    parent: &ArchiveContext,
    local_path: &str,
    child_name: &str,
    raw_entry: &RawEntry,
) -> Result<Handler> {
    let temp_info = match parent.temp_store().existing(local_path) {
        Some(info) => info,
        None => {
            let reader = parent.zip_source().open_entry(raw_entry)?;
            parent.temp_store().extract(local_path, child_name, reader)?
        }
    };

    let file_source = Arc::new(FileSource::new(
        temp_info.path,
        parent.options().effective_no_reaper(),
        MOUNT_GRACE,
    ));
    let real_url = parent.real_url_for(local_path)?;
    let sub_context = ArchiveContext::new(
        file_source,
        String::new(),
        parent.options().inherited(),
        None,
        true,
        real_url,
    );
    Ok(Handler::delegating(
        parent.weak_self(),
        local_path.to_owned(),
        child_name.to_owned(),
        sub_context.root_handler(),
        Some(sub_context),
    ))
}

fn mount_stream(
    parent: &ArchiveContext,
    local_path: &str,
    child_name: &str,
    raw_entry: &RawEntry,
) -> Result<Handler> {
    let mut reader = parent.zip_source().open_entry(raw_entry)?;
    let mut buffer = Vec::with_capacity(raw_entry.size as usize);
    reader.read_to_end(&mut buffer)?;

    // Open question from spec.md §9: a stream-mounted sub-archive's overall
    // `lastModified` defaults to "time of mount". We take the entry's own
    // recorded timestamp as the most faithful reading of that, falling back
    // to the parent source's last-modified time (itself a proxy for "now",
    // since nothing about the parent changed during this mount).
    let modified = raw_entry.modified.unwrap_or_else(|| parent.zip_source().last_modified());

    let stream_source = Arc::new(StreamSource::new(child_name.to_owned(), buffer, modified)?);
    let real_url = parent.real_url_for(local_path)?;
    let sub_context = ArchiveContext::new(
        stream_source,
        String::new(),
        parent.options().inherited(),
        None,
        false,
        real_url,
    );
    Ok(Handler::delegating(
        parent.weak_self(),
        local_path.to_owned(),
        child_name.to_owned(),
        sub_context.root_handler(),
        Some(sub_context),
    ))
}
