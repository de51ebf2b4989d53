//! Binary resolver — decide which flow binary a session runs.
//!
//! The decision order encodes a trust hierarchy: an explicit user path wins
//! outright (and its failures are final), an already-installed project
//! binary beats the network, and the downloader is the last resort. Each
//! strategy is tried at most once per call; a failed resolution is only
//! retried by starting a fresh session.

use std::path::{Path, PathBuf};
use std::time::Duration;

use url::Url;

use flowls_types::{
    BinaryOrigin, FlowOptions, FlowVersion, ResolveError, ResolvedBinary, VersionConstraint,
};

use crate::cache;
use crate::download::{DownloadRequest, Downloader, DownloaderConfig};
use crate::flowconfig;
use crate::probe;
use crate::reporter::Reporter;

/// Known-good version used when auto-downloading and the project does not
/// declare one.
pub const DEFAULT_FLOW_VERSION: &str = "0.232.0";

/// Per-call resolution switches, mapped from the session's [`FlowOptions`].
#[derive(Debug, Clone, Default)]
pub struct ResolverOptions {
    /// Use exactly this binary; no fallback when it fails.
    pub explicit_path: Option<PathBuf>,
    /// Allow fetching a release when nothing usable is installed.
    pub auto_download: bool,
    /// Probe `node_modules/.bin/flow` under the project root.
    pub allow_project_local: bool,
}

impl From<&FlowOptions> for ResolverOptions {
    fn from(options: &FlowOptions) -> Self {
        Self {
            explicit_path: options.path_to_flow.clone(),
            auto_download: options.auto_download_flow,
            allow_project_local: options.try_flow_bin,
        }
    }
}

/// Construction-time configuration for [`BinaryResolver`].
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Release index endpoint.
    pub index_url: Url,
    /// Managed cache root downloads install into.
    pub cache_dir: PathBuf,
    /// Fallback version when the project declares none.
    pub default_version: FlowVersion,
    /// Bound on each network round-trip.
    pub network_timeout: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        let downloader = DownloaderConfig::default();
        Self {
            index_url: downloader.index_url,
            cache_dir: cache::default_cache_dir(),
            default_version: FlowVersion::parse(DEFAULT_FLOW_VERSION)
                .expect("default flow version is valid"),
            network_timeout: downloader.network_timeout,
        }
    }
}

/// Orchestrates probing, project-local discovery, and download.
pub struct BinaryResolver {
    downloader: Downloader,
    cache_dir: PathBuf,
    default_version: FlowVersion,
}

impl BinaryResolver {
    pub fn new(config: ResolverConfig) -> Result<Self, ResolveError> {
        let downloader = Downloader::new(&DownloaderConfig {
            index_url: config.index_url,
            network_timeout: config.network_timeout,
        })?;
        Ok(Self {
            downloader,
            cache_dir: config.cache_dir,
            default_version: config.default_version,
        })
    }

    /// Resolve a usable binary for `project_root`. First applicable strategy
    /// wins; see the module docs for the ordering.
    pub async fn resolve(
        &self,
        project_root: &Path,
        options: &ResolverOptions,
        reporter: &dyn Reporter,
    ) -> Result<ResolvedBinary, ResolveError> {
        if let Some(path) = &options.explicit_path {
            // A relative path would silently depend on the working
            // directory; reject before spawning anything.
            if !path.is_absolute() {
                return Err(ResolveError::PathNotAbsolute(path.clone()));
            }
            let version = probe::probe(path).await?;
            reporter.info(&format!(
                "using the provided flow binary at {} (version {version})",
                path.display()
            ));
            return Ok(ResolvedBinary::new(path.clone(), version, BinaryOrigin::UserSupplied));
        }

        if options.allow_project_local {
            let candidate = project_root
                .join("node_modules")
                .join(".bin")
                .join(cache::flow_binary_name());
            if candidate.exists() {
                match probe::probe(&candidate).await {
                    Ok(version) => {
                        reporter.info(&format!(
                            "using project-local flow {version} at {}",
                            candidate.display()
                        ));
                        return Ok(ResolvedBinary::new(
                            candidate,
                            version,
                            BinaryOrigin::ProjectLocal,
                        ));
                    }
                    Err(e) => {
                        reporter.warn(&format!("ignoring project-local flow binary: {e}"));
                    }
                }
            }
        }

        if options.auto_download {
            let constraint = flowconfig::declared_version(project_root).unwrap_or_else(|| {
                tracing::debug!(
                    "no version declared in .flowconfig, defaulting to {}",
                    self.default_version
                );
                VersionConstraint::Exact(self.default_version.clone())
            });
            let request = DownloadRequest {
                constraint,
                destination: self.cache_dir.clone(),
            };
            return self.downloader.download(&request, reporter).await;
        }

        Err(ResolveError::NoBinaryAvailable)
    }
}
