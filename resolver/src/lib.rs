//! Flow binary resolution.
//!
//! Given a project root and session options, decide which flow binary to
//! run: validate an explicit path, discover a project-local install, or
//! download a matching release into the managed cache. Every failure is a
//! typed [`flowls_types::ResolveError`]; nothing here talks to the user
//! directly except through the narrow [`Reporter`] capability.

mod cache;
mod download;
mod flowconfig;
mod index;
mod probe;
mod reporter;
mod resolve;

pub use cache::default_cache_dir;
pub use download::{DownloadRequest, Downloader, DownloaderConfig};
pub use flowconfig::declared_version;
pub use index::{DEFAULT_RELEASE_INDEX_URL, Release, ReleaseAsset, release_asset_name};
pub use probe::probe;
pub use reporter::{LogReporter, Reporter};
pub use resolve::{BinaryResolver, DEFAULT_FLOW_VERSION, ResolverConfig, ResolverOptions};
