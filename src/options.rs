//! Per-call option bag, aggregated from URL query parameters or explicit
//! context construction and merged down into mounted sub-contexts.

use typed_builder::TypedBuilder;

use crate::config::ForceFlags;

/// Options recognized by an [`crate::context::ArchiveContext`], mirroring
/// spec.md §6's `useCopy` / `noReaper` / `caseSensitive` keys.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, TypedBuilder)]
pub struct Options {
    /// Extract nested archives to a temp file instead of holding them as
    /// in-memory streams.
    #[builder(default)]
    pub use_copy: bool,
    /// Close `FileSource` descriptors synchronously on release instead of
    /// deferring to the reaper.
    #[builder(default)]
    pub no_reaper: bool,
    /// Whether a child lookup by name requires an exact case match. When
    /// `false` (the default), a miss falls back to a case-insensitive scan
    /// of the parent's children before reporting not-found.
    #[builder(default)]
    pub case_sensitive: bool,
}

impl Options {
    /// Resolve whether nested mounts under this option set should extract to
    /// a temp file, folding in the process-wide force-copy override.
    pub fn effective_use_copy(&self) -> bool {
        self.use_copy || ForceFlags::current().force_copy
    }

    /// Resolve whether `FileSource`s under this option set should skip the
    /// reaper, folding in the process-wide override.
    pub fn effective_no_reaper(&self) -> bool {
        self.no_reaper || ForceFlags::current().force_no_reaper
    }

    /// Resolve the effective case-sensitivity, folding in the process-wide
    /// override.
    pub fn effective_case_sensitive(&self) -> bool {
        self.case_sensitive || ForceFlags::current().force_case_sensitive
    }

    /// Options inherited by a mounted sub-context: the same bag, since
    /// spec.md §4.6 calls for "the parent's relevant options merged in" with
    /// no per-mount override surface.
    pub fn inherited(&self) -> Self {
        *self
    }
}
