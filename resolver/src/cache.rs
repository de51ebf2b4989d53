//! Managed cache layout for downloaded binaries.
//!
//! One directory per version under the cache root:
//! `<root>/v<version>/flow`. Installs land here via rename, so an entry
//! either exists in full or not at all.

use std::path::{Path, PathBuf};

use flowls_types::FlowVersion;

/// Platform-specific name of the flow executable.
#[must_use]
pub(crate) fn flow_binary_name() -> &'static str {
    if cfg!(windows) { "flow.exe" } else { "flow" }
}

/// Default managed cache root: `<user cache dir>/flowls/bin`.
#[must_use]
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("flowls")
        .join("bin")
}

/// Directory a given version installs into.
#[must_use]
pub(crate) fn entry_dir(cache_root: &Path, version: &FlowVersion) -> PathBuf {
    cache_root.join(format!("v{version}"))
}

/// Full path of the cached binary for a given version.
#[must_use]
pub(crate) fn entry_path(cache_root: &Path, version: &FlowVersion) -> PathBuf {
    entry_dir(cache_root, version).join(flow_binary_name())
}
