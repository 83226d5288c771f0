//! Process-wide configuration, modeled as an immutable snapshot read once at
//! first use. Tests may inject a different snapshot via [`ForceFlags::set_for_test`].

use std::sync::RwLock;

/// Global override flags, equivalent to the `jboss.vfs.force*` system
/// properties of the source this core is modeled on.
///
/// Read once from the environment at first use and cached; the snapshot is
/// immutable thereafter except when a test installs a replacement via
/// [`ForceFlags::set_for_test`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ForceFlags {
    /// Force all nested archive mounts to extract-to-temp instead of stream-cache.
    pub force_copy: bool,
    /// Force all `FileSource`s to close descriptors synchronously on release.
    pub force_no_reaper: bool,
    /// Force case-sensitive stat everywhere, regardless of per-context options.
    pub force_case_sensitive: bool,
}

static SNAPSHOT: RwLock<Option<ForceFlags>> = RwLock::new(None);

impl ForceFlags {
    /// Return the current process-wide snapshot, reading it from the
    /// environment on first use and caching the result.
    pub fn current() -> Self {
        if let Some(flags) = *SNAPSHOT.read().expect("force flags lock poisoned") {
            return flags;
        }
        let flags = Self::from_env();
        *SNAPSHOT.write().expect("force flags lock poisoned") = Some(flags);
        flags
    }

    fn from_env() -> Self {
        let is_set = |name: &str| {
            std::env::var(name)
                .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
                .unwrap_or(false)
        };
        Self {
            force_copy: is_set("VFS_ZIP_FORCE_COPY"),
            force_no_reaper: is_set("VFS_ZIP_FORCE_NO_REAPER"),
            force_case_sensitive: is_set("VFS_ZIP_FORCE_CASE_SENSITIVE"),
        }
    }

    /// Inject an explicit snapshot, bypassing the environment. Intended for
    /// tests that need to exercise force-flag behavior deterministically;
    /// production code should never call this.
    #[cfg(test)]
    pub fn set_for_test(flags: Self) {
        *SNAPSHOT.write().expect("force flags lock poisoned") = Some(flags);
    }

    /// Clear the cached snapshot so the next `current()` call re-reads the
    /// environment. Test-only, used to reset state between test cases.
    #[cfg(test)]
    pub fn reset_for_test() {
        *SNAPSHOT.write().expect("force flags lock poisoned") = None;
    }
}
