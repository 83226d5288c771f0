//! A virtual filesystem view over zip archives.
//!
//! A single archive is exposed as a tree of [`Handler`]s rooted at the
//! archive's top level. Archives stored as entries inside other archives are
//! mounted recursively, to arbitrary depth, either by streaming the nested
//! archive's inflated bytes into memory or by extracting it to a temp file,
//! depending on [`Options::use_copy`].

mod config;
mod context;
mod error;
mod handler;
mod index;
mod mount;
mod options;
mod partial;
mod path;
mod source;

use std::{
    path::Path,
    sync::{Arc, Weak},
    time::Duration,
};

use url::Url;

pub use error::{Error, Invariant, Result};
pub use handler::{Handler, VirtualFileHandler};
pub use index::{Certificate, Certificates};
pub use options::Options;
pub use source::{is_archive_name, ZipSource};

use context::ArchiveContext;
use source::FileSource;

/// Grace period before a top-level `FileSource`'s descriptor is closed by the
/// reaper after its last release.
const TOP_LEVEL_GRACE: Duration = Duration::from_secs(5);

/// Wrap a freshly built context's root in a handler that keeps the context
/// alive for as long as the handler (or any clone of it) lives.
///
/// A context's own index stores its root handler as a `Weak` back-reference
/// to avoid a self-owning cycle, so returning that handler directly would let
/// the context drop the moment this function's local `Arc` goes out of
/// scope. Wrapping it the same way [`mount`] wraps a mounted sub-context
/// gives the caller a handle that owns the context for as long as it's held.
fn own(context: Arc<ArchiveContext>) -> Handler {
    let root = context.root_handler();
    let name = root.name().to_owned();
    Handler::delegating(Weak::new(), String::new(), name, root, Some(context))
}

/// Mount the zip archive at `path` as a context root.
///
/// The archive is not read until the first operation on the returned
/// handler touches it; `path` itself is only stat'd to seed the
/// modification-tracking baseline.
pub fn mount_file(path: impl AsRef<Path>, options: Options) -> Result<Handler> {
    let path = path.as_ref().to_path_buf();
    let source = Arc::new(FileSource::new(
        path.clone(),
        options.effective_no_reaper(),
        TOP_LEVEL_GRACE,
    ));
    let real_url = vfszip_url_for_file(&path)?;
    let context = ArchiveContext::new(source, String::new(), options, None, false, real_url);
    Ok(own(context))
}

/// Mount an already-available in-memory zip buffer as a context root (e.g. a
/// zip received over the network rather than read from disk).
pub fn mount_bytes(name: impl Into<String>, bytes: Vec<u8>, options: Options) -> Result<Handler> {
    let name = name.into();
    if name.is_empty() {
        return Err(Error::Invariant(Invariant::EmptyArgument { name: "name" }));
    }
    let modified = std::time::SystemTime::now();
    let source = Arc::new(source::StreamSource::new(name.clone(), bytes, modified)?);
    let real_url = Url::parse(&format!("vfszip:///{name}"))
        .map_err(|_| Error::Invariant(Invariant::InvalidName { name: name.clone() }))?;
    let context = ArchiveContext::new(source, String::new(), options, None, false, real_url);
    Ok(own(context))
}

/// §4.5: resolve a path that addresses into an archive nested inside other
/// archives, with no in-memory context yet covering any prefix of it.
pub fn resolve_partial_path(path: impl AsRef<Path>, options: Options) -> Result<Handler> {
    let path = path.as_ref();
    let real_url = vfszip_url_for_file(path)?;
    let context = match partial::resolve(path)? {
        partial::Resolution::Archive(source) => {
            ArchiveContext::new(Arc::new(source), String::new(), options, None, false, real_url)
        }
        partial::Resolution::Directory(source) => {
            // `DirSource::enumerate` reports a single entry named after
            // itself; rooting the context at that same name strips it down
            // to the empty key, so it's recognized as the root's own
            // directory entry rather than installed as a spurious child.
            let root_entry_path = source.name().to_owned();
            ArchiveContext::new(Arc::new(source), root_entry_path, options, None, false, real_url)
        }
        partial::Resolution::Leaf(source) => ArchiveContext::new_with_root_leaf(
            Arc::new(source),
            String::new(),
            options,
            None,
            false,
            real_url,
            true,
        ),
    };
    Ok(own(context))
}

fn vfszip_url_for_file(path: &Path) -> Result<Url> {
    let display = path.to_string_lossy().replace('\\', "/");
    let url_str = if display.starts_with('/') {
        format!("vfszip://{display}")
    } else {
        format!("vfszip:///{display}")
    };
    Url::parse(&url_str).map_err(|_| Error::Invariant(Invariant::InvalidName { name: display }))
}
