use std::{io, path::PathBuf};

use thiserror::Error;

/// Convenience macro to create an invariant error.
#[macro_export]
macro_rules! invariant {
    ($kind:ident) => {
        Err($crate::Error::Invariant($crate::Invariant::$kind))
    };
    ($kind:ident, $arg:ident) => {
        Err($crate::Error::Invariant($crate::Invariant::$kind { $arg }))
    };
    ($kind:ident, $( $arg:expr ),*) => {
        Err($crate::Error::Invariant($crate::Invariant::$kind { $($arg),* }))
    }
}

/// Errors encountered while mounting or navigating an archive context.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// An invariant was violated by the caller.
    #[error("invariant")]
    Invariant(#[from] Invariant),

    /// Lookup found no entry for the requested path, and no nested-archive
    /// ancestor exists that could resolve it via partial-path search.
    #[error("not found: {0:?}")]
    NotFound(PathBuf),

    /// The backing bytes could not be parsed as a zip archive.
    #[error("archive format error reading {name:?}")]
    ArchiveFormat {
        /// Name of the source that failed to parse.
        name: String,
        /// Underlying zip error.
        #[source]
        source: zip::result::ZipError,
    },

    /// I/O error opening, reading, or closing the backing file or stream.
    #[error("backing io error")]
    BackingIO(#[from] io::Error),

    /// Failure creating or writing a temp file for an extracted nested archive.
    #[error("temp io error extracting {path:?}")]
    TempIO {
        /// Path of the temp file being written.
        path: PathBuf,
        /// Underlying io error.
        #[source]
        source: io::Error,
    },

    /// `replaceChild` was called with a parent that has no entry in the index.
    #[error("replaceChild: parent {0:?} has no index entry")]
    MissingParent(String),
}

/// Invariants expected of callers of this crate.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Invariant {
    /// A required argument was null/empty where that is not permitted.
    #[error("argument {name} must not be empty")]
    EmptyArgument {
        /// Name of the offending argument.
        name: &'static str,
    },

    /// A link/child name was `.`, `..`, or otherwise not a valid path segment.
    #[error("{name:?} is not a valid path segment")]
    InvalidName {
        /// The offending name.
        name: String,
    },

    /// The requested path escapes the context root (e.g. via `..` segments).
    #[error("{path:?} is outside the context root")]
    OutsideRoot {
        /// The offending path.
        path: String,
    },
}

/// Convenience alias for this crate's fallible operations.
pub type Result<T> = std::result::Result<T, Error>;
