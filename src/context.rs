//! The central object: owns one [`ZipSource`], the [`EntryIndex`], the
//! initialization state machine, and drives recursive mounting of nested
//! archives.

use std::{
    io::Read,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Weak,
    },
    time::{Duration, SystemTime},
};

use parking_lot::Mutex;
use url::Url;

use crate::{
    handler::Handler,
    index::{EntryIndex, EntryInfo},
    mount,
    options::Options,
    path,
    source::{is_archive_name, RawEntry, ZipSource},
    Error, Invariant, Result,
};

/// `initState` from spec.md §4.8, collapsed to two values: the `INITIALIZING`
/// state is represented implicitly by holding `init_state`'s lock while still
/// `NotInitialized`, which is what gives `ensureEntries` its single-flight
/// property — everyone else blocks on the same mutex instead of racing.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum InitState {
    NotInitialized,
    Initialized,
}

/// The rooted view over one zip source.
pub struct ArchiveContext {
    pub(crate) self_weak: Weak<ArchiveContext>,
    zip_source: Arc<dyn ZipSource>,
    /// Prefix inside the archive treated as this context's root. Empty, or
    /// ends with `/`.
    root_entry_path: String,
    index: EntryIndex,
    init_state: Mutex<InitState>,
    pub(crate) options: Options,
    /// The handler in the parent context representing this archive, for
    /// mounted sub-contexts. `None` for top-level contexts.
    peer: Option<Handler>,
    /// Whether the backing file is deleted when this context is cleaned up.
    auto_clean: bool,
    /// Canonical `vfszip:`-scheme URL of this context's root.
    real_url: Url,
    temp_store: mount::TempStore,
    cleaned: AtomicBool,
}

impl ArchiveContext {
    /// Construct a new context over `zip_source`, rooted at `root_entry_path`
    /// inside it.
    pub(crate) fn new(
        zip_source: Arc<dyn ZipSource>,
        root_entry_path: String,
        options: Options,
        peer: Option<Handler>,
        auto_clean: bool,
        real_url: Url,
    ) -> Arc<Self> {
        Self::new_with_root_leaf(zip_source, root_entry_path, options, peer, auto_clean, real_url, false)
    }

    /// As [`ArchiveContext::new`], but lets the caller mark the root handler
    /// itself a leaf — used when wrapping a [`crate::partial::SingleEntrySource`],
    /// whose root *is* the target file rather than a directory.
    pub(crate) fn new_with_root_leaf(
        zip_source: Arc<dyn ZipSource>,
        root_entry_path: String,
        options: Options,
        peer: Option<Handler>,
        auto_clean: bool,
        real_url: Url,
        root_is_leaf: bool,
    ) -> Arc<Self> {
        let name = zip_source.name().to_owned();
        Arc::new_cyclic(|weak: &Weak<ArchiveContext>| {
            let root_handler = Handler::zip_entry(weak.clone(), String::new(), name, root_is_leaf);
            ArchiveContext {
                self_weak: weak.clone(),
                zip_source,
                root_entry_path,
                index: EntryIndex::new(root_handler),
                init_state: Mutex::new(InitState::NotInitialized),
                options,
                peer,
                auto_clean,
                real_url,
                temp_store: mount::TempStore::new(),
                cleaned: AtomicBool::new(false),
            }
        })
    }

    /// The root handler of this context (the `""` index entry).
    pub fn root_handler(&self) -> Handler {
        self.index
            .get("")
            .expect("context root entry must always be present")
            .handler()
            .clone()
    }

    pub(crate) fn options(&self) -> Options {
        self.options
    }

    pub(crate) fn temp_store(&self) -> &mount::TempStore {
        &self.temp_store
    }

    pub(crate) fn peer(&self) -> Option<&Handler> {
        self.peer.as_ref()
    }

    pub(crate) fn weak_self(&self) -> Weak<ArchiveContext> {
        self.self_weak.clone()
    }

    pub(crate) fn zip_source(&self) -> &dyn ZipSource {
        self.zip_source.as_ref()
    }

    /// §4.4: run initialization on first touch, or re-index after a detected
    /// modification. Failures during first-touch propagate; failures during
    /// re-indexing are logged and swallowed so the root handler survives.
    fn check_if_modified(&self) -> Result<()> {
        let mut state = self.init_state.lock();
        match *state {
            InitState::NotInitialized => match self.init_entries() {
                Ok(()) => {
                    *state = InitState::Initialized;
                    Ok(())
                }
                Err(err) => {
                    log::warn!("initializing {:?} failed: {err}", self.zip_source.name());
                    Err(err)
                }
            },
            InitState::Initialized => {
                if self.zip_source.has_been_modified() {
                    log::debug!("{:?} changed on disk, re-indexing", self.zip_source.name());
                    self.index.clear_except_root();
                    if self.zip_source.exists() {
                        if let Err(err) = self.init_entries() {
                            log::warn!(
                                "re-initializing {:?} after modification failed: {err}",
                                self.zip_source.name()
                            );
                        }
                    }
                }
                Ok(())
            }
        }
    }

    /// §4.3 phase 1 + phase 2.
    fn init_entries(&self) -> Result<()> {
        self.zip_source.acquire()?;
        let result = self.init_entries_inner();
        self.zip_source.release();
        result
    }

    fn init_entries_inner(&self) -> Result<()> {
        let mut entries: Vec<(String, RawEntry)> = self
            .zip_source
            .enumerate()?
            .into_iter()
            .filter_map(|raw| {
                let local = path::strip_root(&self.root_entry_path, &raw.name)?;
                Some((local, raw))
            })
            .collect();
        entries.sort_by(|a, b| a.1.name.cmp(&b.1.name));

        for (local_name, raw_entry) in entries {
            let key = local_name.trim_end_matches('/').to_owned();
            if key.is_empty() {
                // The archive explicitly listed its own root directory entry;
                // the root is already installed.
                continue;
            }
            self.install_entry(&key, raw_entry)?;
        }
        Ok(())
    }

    fn install_entry(&self, key: &str, raw_entry: RawEntry) -> Result<()> {
        let (parent_path, child_name) = path::split_parent_child(key);
        let parent_path = parent_path.ok_or_else(|| {
            Error::Invariant(Invariant::InvalidName {
                name: key.to_owned(),
            })
        })?;
        self.synthesize_dummy_parents(&parent_path)?;

        let handler = if !raw_entry.is_directory && is_archive_name(&raw_entry.name) {
            mount::mount_nested(self, key, &child_name, &raw_entry)?
        } else {
            Handler::zip_entry(
                self.weak_self(),
                key.to_owned(),
                child_name.clone(),
                !raw_entry.is_directory,
            )
        };

        self.index
            .insert(key.to_owned(), EntryInfo::new(handler.clone(), Some(raw_entry)));
        if let Some(parent_entry) = self.index.get(&parent_path) {
            parent_entry.add_child(child_name, handler);
        }
        Ok(())
    }

    /// Ensure every ancestor directory of `path` has an EntryInfo, synthesizing
    /// dummy parents (absent `rawEntry`) for any the archive never listed.
    fn synthesize_dummy_parents(&self, path: &str) -> Result<()> {
        if self.index.contains(path) {
            return Ok(());
        }
        let (parent_path, name) = path::split_parent_child(path);
        let parent_path = parent_path.ok_or_else(|| {
            Error::Invariant(Invariant::InvalidName {
                name: path.to_owned(),
            })
        })?;
        self.synthesize_dummy_parents(&parent_path)?;

        let handler = Handler::zip_entry(self.weak_self(), path.to_owned(), name.clone(), false);
        self.index.insert(path.to_owned(), EntryInfo::new(handler.clone(), None));
        if let Some(parent_entry) = self.index.get(&parent_path) {
            parent_entry.add_child(name, handler);
        }
        Ok(())
    }

    pub(crate) fn get_child(&self, parent_path: &str, name: &str) -> Result<Option<Handler>> {
        self.check_if_modified()?;
        let child_path = path::join(parent_path, name);
        if let Some(entry) = self.index.get(&child_path) {
            return Ok(Some(entry.handler().clone()));
        }
        // §6 `caseSensitive`: an exact-case miss is final when the option is
        // on; otherwise fall back to a case-insensitive scan of the parent's
        // children, the "extra check on stat" the option describes.
        if self.options.effective_case_sensitive() {
            return Ok(None);
        }
        let Some(parent_entry) = self.index.get(parent_path) else {
            return Ok(None);
        };
        Ok(parent_entry
            .children()
            .into_iter()
            .find(|(child_name, _)| child_name.eq_ignore_ascii_case(name))
            .map(|(_, handler)| handler))
    }

    pub(crate) fn get_children(&self, parent_path: &str) -> Result<Vec<Handler>> {
        self.check_if_modified()?;
        let entry = self
            .index
            .get(parent_path)
            .ok_or_else(|| Error::NotFound(PathBuf::from(parent_path)))?;
        Ok(entry.children().into_iter().map(|(_, handler)| handler).collect())
    }

    pub(crate) fn exists(&self, path: &str) -> bool {
        if self.check_if_modified().is_err() {
            return false;
        }
        self.index.contains(path)
    }

    pub(crate) fn is_leaf(&self, path: &str) -> Result<bool> {
        self.check_if_modified()?;
        let entry = self
            .index
            .get(path)
            .ok_or_else(|| Error::NotFound(PathBuf::from(path)))?;
        Ok(match entry.handler() {
            Handler::ZipEntry(zip_entry) => zip_entry.is_leaf,
            // A nested archive's mount point is a container, never a leaf,
            // even though it's stored as a single zip entry physically.
            Handler::Delegating(_) => false,
        })
    }

    pub(crate) fn size(&self, path: &str) -> Result<u64> {
        self.check_if_modified()?;
        if path.is_empty() {
            return Ok(self.zip_source.size().unwrap_or(0));
        }
        let entry = self
            .index
            .get(path)
            .ok_or_else(|| Error::NotFound(PathBuf::from(path)))?;
        Ok(entry.raw_entry().map(|raw| raw.size).unwrap_or(0))
    }

    pub(crate) fn last_modified(&self, path: &str) -> Result<SystemTime> {
        self.check_if_modified()?;
        if path.is_empty() {
            return Ok(self.zip_source.last_modified());
        }
        let entry = self
            .index
            .get(path)
            .ok_or_else(|| Error::NotFound(PathBuf::from(path)))?;
        Ok(entry
            .raw_entry()
            .and_then(|raw| raw.modified)
            .unwrap_or_else(|| self.zip_source.last_modified()))
    }

    pub(crate) fn open_stream(&self, path: &str) -> Result<Box<dyn Read + Send>> {
        self.check_if_modified()?;
        if path.is_empty() {
            return self.zip_source.root_as_stream();
        }
        let entry = self
            .index
            .get(path)
            .ok_or_else(|| Error::NotFound(PathBuf::from(path)))?;
        match entry.raw_entry() {
            Some(raw) => self.zip_source.open_entry(raw),
            None => Ok(Box::new(std::io::empty())),
        }
    }

    pub(crate) fn handler_at(&self, path: &str) -> Option<Handler> {
        self.index.get(path).map(|entry| entry.handler().clone())
    }

    /// §4.7: atomically install `replacement` as the handler for `original`'s
    /// path, wrapping it in a `DelegatingHandler` if it isn't already one.
    pub fn replace_child(&self, original: &Handler, replacement: Handler) -> Result<()> {
        self.check_if_modified()?;
        let path = original.local_path().to_owned();
        path::validate_path(&path)?;
        let (parent_path, child_name) = path::split_parent_child(&path);
        let parent_path = parent_path.ok_or(Error::MissingParent(path.clone()))?;
        let parent_entry = self
            .index
            .get(&parent_path)
            .ok_or_else(|| Error::MissingParent(parent_path.clone()))?;

        let wrapped = match replacement {
            already @ Handler::Delegating(_) => already,
            other => Handler::delegating(
                self.weak_self(),
                path.clone(),
                child_name.clone(),
                other,
                None,
            ),
        };

        parent_entry.add_child(child_name, wrapped.clone());
        drop(parent_entry);
        // Fresh `EntryInfo` starts with `rawEntry` absent and no children,
        // satisfying the "reset to absent, clear children" half of replaceChild.
        self.index.insert(path, EntryInfo::new(wrapped, None));
        Ok(())
    }

    pub(crate) fn uri_for(&self, path: &str) -> Result<Url> {
        let mut url = self.real_url.clone();
        if !path.is_empty() {
            let base = url.path().trim_end_matches('/').to_owned();
            url.set_path(&format!("{base}/{path}"));
        }
        Ok(url)
    }

    pub(crate) fn real_url_for(&self, path: &str) -> Result<Url> {
        self.uri_for(path)
    }

    /// Release backing resources. Deletes the backing file iff `autoClean`.
    /// Idempotent: a second call is a no-op.
    pub fn cleanup(&self) -> Result<()> {
        if self.cleaned.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        if self.auto_clean {
            self.zip_source.delete(Duration::from_millis(200));
        }
        Ok(())
    }
}

impl Drop for ArchiveContext {
    fn drop(&mut self) {
        if let Err(err) = self.cleanup() {
            log::warn!("cleanup during drop of {:?} failed: {err}", self.zip_source.name());
        }
    }
}

#[cfg(test)]
mod test {
    use std::{
        io::Cursor,
        sync::atomic::AtomicUsize,
        thread,
    };

    use super::*;

    /// A source with a handful of fixed entries, counting how many times
    /// `enumerate` is called, to verify single-flight initialization under
    /// concurrent first touch.
    struct CountingSource {
        entries: Vec<(RawEntry, Vec<u8>)>,
        enumerate_calls: AtomicUsize,
    }

    impl ZipSource for CountingSource {
        fn acquire(&self) -> Result<()> {
            Ok(())
        }

        fn release(&self) {}

        fn enumerate(&self) -> Result<Vec<RawEntry>> {
            self.enumerate_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.entries.iter().map(|(raw, _)| raw.clone()).collect())
        }

        fn open_entry(&self, entry: &RawEntry) -> Result<Box<dyn Read + Send>> {
            let bytes = self
                .entries
                .iter()
                .find(|(raw, _)| raw.name == entry.name)
                .map(|(_, bytes)| bytes.clone())
                .unwrap_or_default();
            Ok(Box::new(Cursor::new(bytes)))
        }

        fn root_as_stream(&self) -> Result<Box<dyn Read + Send>> {
            Ok(Box::new(Cursor::new(Vec::new())))
        }

        fn size(&self) -> Option<u64> {
            None
        }

        fn last_modified(&self) -> SystemTime {
            SystemTime::UNIX_EPOCH
        }

        fn name(&self) -> &str {
            "counting"
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

    #[test]
    fn concurrent_first_touch_initializes_exactly_once() {
        let source = Arc::new(CountingSource {
            entries: vec![(
                RawEntry {
                    name: "x".to_owned(),
                    size: 15,
                    modified: None,
                    is_directory: false,
                },
                b"concurrent-init".to_vec(),
            )],
            enumerate_calls: AtomicUsize::new(0),
        });
        let real_url = Url::parse("vfszip:///concurrent-test").unwrap();
        let context = ArchiveContext::new(source.clone(), String::new(), Options::default(), None, false, real_url);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let context = Arc::clone(&context);
                thread::spawn(move || {
                    let handler = context
                        .get_child("", "x")
                        .expect("get_child must not error")
                        .expect("x must exist");
                    let mut buf = Vec::new();
                    context
                        .open_stream(handler.local_path())
                        .expect("open_stream must not error")
                        .read_to_end(&mut buf)
                        .unwrap();
                    buf
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), b"concurrent-init");
        }
        assert_eq!(
            source.enumerate_calls.load(Ordering::SeqCst),
            1,
            "eight concurrent first touches must only enumerate the archive once"
        );
    }
}
