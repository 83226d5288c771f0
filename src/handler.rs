//! The node type exposed to callers: a tagged variant dispatched by match,
//! per the design notes in spec.md §9, rather than `dyn` dispatch on a class
//! hierarchy.

use std::{
    io::Read,
    sync::{Arc, Weak},
    time::SystemTime,
};

use url::Url;

use crate::{context::ArchiveContext, Error, Invariant, Result};

/// A node in an archive's virtual tree.
///
/// Cloning a `Handler` is cheap (it's a reference-counted pointer to shared
/// node state); it does not clone the underlying archive.
#[derive(Clone)]
pub enum Handler {
    /// A plain entry (file or directory) backed directly by this context's
    /// index.
    ZipEntry(Arc<ZipEntryHandler>),
    /// A node whose operations forward to the root handler of a mounted
    /// sub-context, making that sub-context appear as a subtree here.
    Delegating(Arc<DelegatingHandler>),
}

/// A leaf or directory entry backed by an [`ArchiveContext`]'s own index.
pub struct ZipEntryHandler {
    pub(crate) context: Weak<ArchiveContext>,
    pub(crate) local_path: String,
    pub(crate) name: String,
    pub(crate) is_leaf: bool,
}

/// A node that forwards all operations to `delegate`, the root handler of a
/// mounted sub-context.
///
/// When the sub-context was mounted by this crate's own [`crate::mount`]
/// machinery, `owned_sub_context` holds the owning reference and the
/// sub-context (and its backing temp file, if `autoClean`) is torn down when
/// this handler is dropped or [`Handler::cleanup`] is called. When a
/// `DelegatingHandler` is installed via [`crate::context::ArchiveContext::replace_child`]
/// over an externally supplied handler, `owned_sub_context` is `None` — the
/// caller retains ownership of whatever backs `delegate`.
pub struct DelegatingHandler {
    pub(crate) context: Weak<ArchiveContext>,
    pub(crate) local_path: String,
    pub(crate) name: String,
    pub(crate) delegate: Handler,
    pub(crate) owned_sub_context: Option<Arc<ArchiveContext>>,
}

impl Handler {
    /// Construct a plain entry handler.
    pub(crate) fn zip_entry(
        context: Weak<ArchiveContext>,
        local_path: String,
        name: String,
        is_leaf: bool,
    ) -> Self {
        Handler::ZipEntry(Arc::new(ZipEntryHandler {
            context,
            local_path,
            name,
            is_leaf,
        }))
    }

    /// Construct a delegating handler over a mounted sub-context's root.
    pub(crate) fn delegating(
        context: Weak<ArchiveContext>,
        local_path: String,
        name: String,
        delegate: Handler,
        owned_sub_context: Option<Arc<ArchiveContext>>,
    ) -> Self {
        Handler::Delegating(Arc::new(DelegatingHandler {
            context,
            local_path,
            name,
            delegate,
            owned_sub_context,
        }))
    }

    /// Simple file name of this node (the last path segment).
    pub fn name(&self) -> &str {
        match self {
            Handler::ZipEntry(h) => &h.name,
            Handler::Delegating(h) => &h.name,
        }
    }

    /// Path of this node relative to its owning context's root.
    pub fn local_path(&self) -> &str {
        match self {
            Handler::ZipEntry(h) => &h.local_path,
            Handler::Delegating(h) => &h.local_path,
        }
    }

    fn owning_context(&self) -> Result<Arc<ArchiveContext>> {
        let weak = match self {
            Handler::ZipEntry(h) => &h.context,
            Handler::Delegating(h) => &h.context,
        };
        weak.upgrade().ok_or_else(|| {
            Error::Invariant(Invariant::InvalidName {
                name: self.local_path().to_owned(),
            })
        })
    }

    /// The parent node, or `None` if this is a context root.
    pub fn parent(&self) -> Result<Option<Handler>> {
        let (parent_path, _) = crate::path::split_parent_child(self.local_path());
        let Some(parent_path) = parent_path else {
            return Ok(None);
        };
        let context = self.owning_context()?;
        Ok(context.handler_at(&parent_path))
    }

    /// Look up a named child of this node.
    pub fn get_child(&self, name: &str) -> Result<Option<Handler>> {
        crate::path::validate_name(name)?;
        match self {
            Handler::ZipEntry(h) => {
                let context = self.owning_context()?;
                context.get_child(&h.local_path, name)
            }
            Handler::Delegating(h) => h.delegate.get_child(name),
        }
    }

    /// List this node's children.
    pub fn get_children(&self) -> Result<Vec<Handler>> {
        match self {
            Handler::ZipEntry(h) => {
                let context = self.owning_context()?;
                context.get_children(&h.local_path)
            }
            Handler::Delegating(h) => h.delegate.get_children(),
        }
    }

    /// Whether this node still resolves to a live entry.
    pub fn exists(&self) -> bool {
        match self {
            Handler::ZipEntry(h) => match self.owning_context() {
                Ok(context) => context.exists(&h.local_path),
                Err(_) => false,
            },
            Handler::Delegating(h) => h.delegate.exists(),
        }
    }

    /// Whether this node is a leaf (file) rather than a directory.
    pub fn is_leaf(&self) -> Result<bool> {
        match self {
            Handler::ZipEntry(h) => {
                let context = self.owning_context()?;
                context.is_leaf(&h.local_path)
            }
            Handler::Delegating(h) => h.delegate.is_leaf(),
        }
    }

    /// Uncompressed size of this node, `0` for directories.
    pub fn size(&self) -> Result<u64> {
        match self {
            Handler::ZipEntry(h) => {
                let context = self.owning_context()?;
                context.size(&h.local_path)
            }
            Handler::Delegating(h) => h.delegate.size(),
        }
    }

    /// Last-modified time of this node.
    pub fn last_modified(&self) -> Result<SystemTime> {
        match self {
            Handler::ZipEntry(h) => {
                let context = self.owning_context()?;
                context.last_modified(&h.local_path)
            }
            Handler::Delegating(h) => h.delegate.last_modified(),
        }
    }

    /// Open a stream over this node's bytes. Empty for directories and for
    /// dummy-parent entries the archive never explicitly listed.
    pub fn open_stream(&self) -> Result<Box<dyn Read + Send>> {
        match self {
            Handler::ZipEntry(h) => {
                let context = self.owning_context()?;
                context.open_stream(&h.local_path)
            }
            Handler::Delegating(h) => h.delegate.open_stream(),
        }
    }

    /// The canonical `vfszip:`-scheme URI for this node, with `!` path
    /// separators stripped per spec.md §6's scheme normalization.
    pub fn to_uri(&self) -> Result<Url> {
        match self {
            Handler::ZipEntry(h) => {
                let context = self.owning_context()?;
                context.uri_for(&h.local_path)
            }
            Handler::Delegating(h) => h.delegate.to_uri(),
        }
    }

    /// The real, externally meaningful URL for this node — `jar:file:...!/entry`
    /// form for archive entries.
    pub fn real_url(&self) -> Result<Url> {
        match self {
            Handler::ZipEntry(h) => {
                let context = self.owning_context()?;
                context.real_url_for(&h.local_path)
            }
            Handler::Delegating(h) => h.delegate.real_url(),
        }
    }

    /// §4.7: replace this node with `replacement` in its owning context's
    /// index, wrapping it in a [`DelegatingHandler`] if it isn't already one.
    /// Errors if this node is a context root (it has no parent to update).
    pub fn replace(&self, replacement: Handler) -> Result<()> {
        match self {
            Handler::ZipEntry(_) => {
                let context = self.owning_context()?;
                context.replace_child(self, replacement)
            }
            Handler::Delegating(h) => h.delegate.replace(replacement),
        }
    }

    /// Release backing resources. Meaningful when called on a context root;
    /// elsewhere it's a no-op delegated down to the owning context.
    pub fn cleanup(&self) -> Result<()> {
        match self {
            Handler::ZipEntry(h) => {
                let context = self.owning_context()?;
                context.cleanup()
            }
            Handler::Delegating(h) => {
                h.delegate.cleanup()?;
                if let Some(owned) = &h.owned_sub_context {
                    owned.cleanup()?;
                }
                Ok(())
            }
        }
    }
}

/// The external interface consumers see, per spec.md §6. `Handler` already
/// exposes every one of these as an inherent method dispatched by match; this
/// trait exists so callers can hold a handler behind a trait object or write
/// generic code against it instead of depending on the concrete enum.
pub trait VirtualFileHandler {
    fn name(&self) -> &str;
    fn local_path(&self) -> &str;
    fn parent(&self) -> Result<Option<Handler>>;
    fn get_child(&self, name: &str) -> Result<Option<Handler>>;
    fn get_children(&self) -> Result<Vec<Handler>>;
    fn exists(&self) -> bool;
    fn is_leaf(&self) -> Result<bool>;
    fn size(&self) -> Result<u64>;
    fn last_modified(&self) -> Result<SystemTime>;
    fn open_stream(&self) -> Result<Box<dyn Read + Send>>;
    fn to_uri(&self) -> Result<Url>;
    fn real_url(&self) -> Result<Url>;
    fn replace(&self, replacement: Handler) -> Result<()>;
    fn cleanup(&self) -> Result<()>;
}

impl VirtualFileHandler for Handler {
    fn name(&self) -> &str {
        Handler::name(self)
    }

    fn local_path(&self) -> &str {
        Handler::local_path(self)
    }

    fn parent(&self) -> Result<Option<Handler>> {
        Handler::parent(self)
    }

    fn get_child(&self, name: &str) -> Result<Option<Handler>> {
        Handler::get_child(self, name)
    }

    fn get_children(&self) -> Result<Vec<Handler>> {
        Handler::get_children(self)
    }

    fn exists(&self) -> bool {
        Handler::exists(self)
    }

    fn is_leaf(&self) -> Result<bool> {
        Handler::is_leaf(self)
    }

    fn size(&self) -> Result<u64> {
        Handler::size(self)
    }

    fn last_modified(&self) -> Result<SystemTime> {
        Handler::last_modified(self)
    }

    fn open_stream(&self) -> Result<Box<dyn Read + Send>> {
        Handler::open_stream(self)
    }

    fn to_uri(&self) -> Result<Url> {
        Handler::to_uri(self)
    }

    fn real_url(&self) -> Result<Url> {
        Handler::real_url(self)
    }

    fn replace(&self, replacement: Handler) -> Result<()> {
        Handler::replace(self, replacement)
    }

    fn cleanup(&self) -> Result<()> {
        Handler::cleanup(self)
    }
}
