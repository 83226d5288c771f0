//! In-memory map from local path to [`EntryInfo`], the unit of a context's
//! lazily-populated directory tree.

use dashmap::DashMap;
use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::{handler::Handler, source::RawEntry};

/// Signature certificates attached to an entry. Distinguishes "we read the
/// stream and there were none" from "nobody has read the stream yet",
/// matching spec's sentinel requirement.
#[derive(Clone, Debug, Default)]
pub enum Certificates {
    /// The entry's stream has not been fully consumed yet.
    #[default]
    NotComputed,
    /// The stream was consumed; these are the certificates found (possibly empty).
    Computed(Vec<Certificate>),
}

/// Placeholder for a single signing certificate's raw bytes. Archive
/// signature verification itself is out of scope for this core; this exists
/// only so the data model in spec.md §3 has somewhere to live.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Certificate(pub Vec<u8>);

/// One entry in a context's index: the handler for a local path, the raw zip
/// entry it came from (if any), its children, and certificate status.
pub struct EntryInfo {
    handler: Handler,
    raw_entry: Option<RawEntry>,
    /// Insertion-ordered; lazily allocated on first child add. `None` means
    /// "no children added yet", distinct from `Some(empty)`.
    children: Mutex<Option<IndexMap<String, Handler>>>,
    certificates: Mutex<Certificates>,
}

impl EntryInfo {
    /// Build an entry for a real or synthesized raw zip entry.
    pub fn new(handler: Handler, raw_entry: Option<RawEntry>) -> Self {
        Self {
            handler,
            raw_entry,
            children: Mutex::new(None),
            certificates: Mutex::new(Certificates::NotComputed),
        }
    }

    /// The handler installed for this path.
    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    /// The raw zip entry this path was populated from, if any. `None` for
    /// the synthetic root entry and for dummy-parent directories the archive
    /// didn't explicitly list.
    pub fn raw_entry(&self) -> Option<&RawEntry> {
        self.raw_entry.as_ref()
    }

    /// Add or replace a named child. Duplicate inserts by the same name
    /// replace the previous handler, matching spec's EntryInfo invariant.
    pub fn add_child(&self, name: String, handler: Handler) {
        self.children
            .lock()
            .get_or_insert_with(IndexMap::new)
            .insert(name, handler);
    }

    /// Children in insertion order, as a snapshot copy.
    pub fn children(&self) -> Vec<(String, Handler)> {
        match self.children.lock().as_ref() {
            Some(children) => children.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            None => Vec::new(),
        }
    }

    /// Clear this entry's children (used by `replaceChild`).
    pub fn clear_children(&self) {
        *self.children.lock() = None;
    }

    /// Current certificate status.
    pub fn certificates(&self) -> Certificates {
        self.certificates.lock().clone()
    }

    /// Record the certificates found after fully consuming this entry's stream.
    pub fn set_certificates(&self, certs: Vec<Certificate>) {
        *self.certificates.lock() = Certificates::Computed(certs);
    }
}

/// Concurrent map from local path to [`EntryInfo`]. The root key `""` is
/// installed at construction and is never removed by [`EntryIndex::clear`].
pub struct EntryIndex {
    entries: DashMap<String, EntryInfo>,
}

impl EntryIndex {
    /// Create an index containing only the root entry.
    pub fn new(root_handler: Handler) -> Self {
        let entries = DashMap::new();
        entries.insert(String::new(), EntryInfo::new(root_handler, None));
        Self { entries }
    }

    /// Look up the entry at `path`, if indexed.
    pub fn get(&self, path: &str) -> Option<dashmap::mapref::one::Ref<'_, String, EntryInfo>> {
        self.entries.get(path)
    }

    /// Whether `path` has an entry.
    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// Insert (or replace) the entry at `path`.
    pub fn insert(&self, path: String, info: EntryInfo) {
        self.entries.insert(path, info);
    }

    /// Remove every entry except the root, preserving the root's handler
    /// identity. Used when re-initializing after a modification, or when the
    /// backing source has disappeared.
    pub fn clear_except_root(&self) {
        self.entries.retain(|path, _| path.is_empty());
    }

    /// Number of indexed entries, including the root. Exposed for tests that
    /// assert the index was populated exactly once.
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
