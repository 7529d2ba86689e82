//! Centralized error handling for Pipepack.
//!
//! All failure conditions are propagated through the [`Result`] type; the
//! library never panics on malformed input. Errors fall into three behavioral
//! classes:
//!
//! - **Corruption** ([`PipepackError::Format`]): the archive structure itself
//!   is invalid (bad magic, unsupported version, truncated tables,
//!   out-of-range offsets). These abort opening the archive entirely.
//! - **Usage** ([`PipepackError::Usage`]): the caller violated an API
//!   contract (duplicate resource name with different content, empty backend
//!   set, invalid override). The operation is rejected and nothing changes.
//! - **Per-resource** ([`PipepackError::Resource`]): a single named resource
//!   could not be unpacked (name not found, backend block absent, missing
//!   shader). The archive and all other entries remain usable.
//!
//! [`PipepackError`] is `Clone` so errors can be stored or shared across
//! threads; I/O errors are wrapped in `Arc` to keep cloning cheap.

use std::fmt;
use std::io;
use std::sync::Arc;

/// A specialized `Result` type for Pipepack operations.
pub type Result<T> = std::result::Result<T, PipepackError>;

/// The master error enum covering all failure domains in Pipepack.
#[derive(Debug, Clone)]
pub enum PipepackError {
    /// Low-level I/O failure while reading or writing an archive.
    ///
    /// The underlying `io::Error` is wrapped in an `Arc` to make the error
    /// `Clone`.
    Io(Arc<io::Error>),

    /// A structured record could not be encoded or decoded.
    ///
    /// On the read path this usually means the record bytes end early or an
    /// enum tag has a value this version does not know.
    Serialization(String),

    /// The archive is invalid, corrupted, or has a version mismatch.
    ///
    /// Opening an archive fails with this error for a wrong magic number, an
    /// unsupported format version, truncated header or chunk table, duplicate
    /// chunk types, or offsets pointing past the end of the file.
    Format(String),

    /// The caller violated an API contract.
    ///
    /// Examples: adding two different resources under one name, requesting an
    /// empty or unregistered backend set, an override referencing a
    /// nonexistent attachment.
    Usage(String),

    /// A single named resource failed to load.
    ///
    /// The archive as a whole stays usable; only this unpack call failed.
    Resource(String),
}

impl fmt::Display for PipepackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Serialization(s) => write!(f, "serialization error: {s}"),
            Self::Format(s) => write!(f, "format error: {s}"),
            Self::Usage(s) => write!(f, "usage error: {s}"),
            Self::Resource(s) => write!(f, "resource error: {s}"),
        }
    }
}

impl std::error::Error for PipepackError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<io::Error> for PipepackError {
    fn from(err: io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}
