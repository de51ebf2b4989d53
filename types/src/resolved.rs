//! The outcome of binary resolution.

use std::path::{Path, PathBuf};

use crate::version::FlowVersion;

/// How a resolved binary was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOrigin {
    /// The user pointed at it explicitly.
    UserSupplied,
    /// Found installed under the project root.
    ProjectLocal,
    /// Fetched from the release index into the managed cache.
    Downloaded,
}

impl BinaryOrigin {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::UserSupplied => "user-supplied",
            Self::ProjectLocal => "project-local",
            Self::Downloaded => "downloaded",
        }
    }
}

/// A usable Flow binary: absolute path, probed version, provenance.
///
/// Immutable once constructed; owned by the engine handle for the lifetime
/// of one server session.
#[derive(Debug, Clone)]
pub struct ResolvedBinary {
    path: PathBuf,
    version: FlowVersion,
    origin: BinaryOrigin,
}

impl ResolvedBinary {
    /// Construct from an absolute path and a probed version.
    #[must_use]
    pub fn new(path: PathBuf, version: FlowVersion, origin: BinaryOrigin) -> Self {
        debug_assert!(path.is_absolute(), "resolved binary path must be absolute");
        Self {
            path,
            version,
            origin,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn version(&self) -> &FlowVersion {
        &self.version
    }

    #[must_use]
    pub fn origin(&self) -> BinaryOrigin {
        self.origin
    }
}
