//! Semver downloader — fetch a matching flow release into the managed cache.
//!
//! The happy path is: pick the release satisfying the constraint, fetch its
//! platform archive, extract, verify with a fresh probe, then publish into
//! the cache with a rename. Scratch work stays in a temp directory on the
//! same filesystem as the cache, so a failure at any step leaves no partial
//! entry behind.

use std::path::{Path, PathBuf};
use std::time::Duration;

use flate2::read::GzDecoder;
use url::Url;

use flowls_types::{BinaryOrigin, FlowVersion, ResolveError, ResolvedBinary, VersionConstraint};

use crate::cache;
use crate::index::{self, Release, ReleaseIndex};
use crate::probe;
use crate::reporter::Reporter;

/// One download attempt: which version is wanted, where it must land.
/// Transient; lives for the duration of the attempt.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub constraint: VersionConstraint,
    pub destination: PathBuf,
}

/// Connection settings for the downloader.
#[derive(Debug, Clone)]
pub struct DownloaderConfig {
    /// Release index endpoint.
    pub index_url: Url,
    /// Bound on each network round-trip, so a dead mirror cannot hang
    /// initialization.
    pub network_timeout: Duration,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            index_url: Url::parse(index::DEFAULT_RELEASE_INDEX_URL)
                .expect("default index url is valid"),
            network_timeout: Duration::from_secs(60),
        }
    }
}

/// Fetches flow releases from the index into a local cache.
pub struct Downloader {
    index: ReleaseIndex,
}

impl Downloader {
    pub fn new(config: &DownloaderConfig) -> Result<Self, ResolveError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("flowls/", env!("CARGO_PKG_VERSION")))
            .timeout(config.network_timeout)
            .build()
            .map_err(|e| ResolveError::NetworkFailure {
                operation: "initializing the http client".to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            index: ReleaseIndex::new(http, config.index_url.clone()),
        })
    }

    /// Obtain a binary satisfying the request, downloading only when the
    /// cache cannot already serve it.
    pub async fn download(
        &self,
        request: &DownloadRequest,
        reporter: &dyn Reporter,
    ) -> Result<ResolvedBinary, ResolveError> {
        // A previous session may have installed a satisfying binary; an
        // exact constraint names its cache entry without touching the index.
        if let VersionConstraint::Exact(wanted) = &request.constraint
            && let Some(cached) = reuse_cached(&request.destination, wanted, reporter).await
        {
            return Ok(cached);
        }

        reporter.info(&format!(
            "looking for a flow release matching {}",
            request.constraint
        ));
        let releases = self.index.releases().await?;
        let versions: Vec<FlowVersion> = releases.iter().filter_map(Release::version).collect();
        let Some(selected) = request.constraint.best_match(&versions).cloned() else {
            return Err(ResolveError::NoMatchingRelease {
                constraint: request.constraint.to_string(),
            });
        };

        // A range constraint resolves to a concrete version only now; that
        // version may be cached from an earlier session too.
        if !matches!(request.constraint, VersionConstraint::Exact(_))
            && let Some(cached) = reuse_cached(&request.destination, &selected, reporter).await
        {
            return Ok(cached);
        }

        let asset_name = index::release_asset_name(&selected);
        let asset = releases
            .iter()
            .filter(|r| r.version().as_ref() == Some(&selected))
            .find_map(|r| r.asset_named(&asset_name));
        let Some(asset) = asset else {
            reporter.warn(&format!("release {selected} has no `{asset_name}` asset"));
            return Err(ResolveError::NoMatchingRelease {
                constraint: request.constraint.to_string(),
            });
        };

        reporter.info(&format!("downloading flow {selected}"));
        let archive = self.index.fetch_asset(asset).await?;

        let installed = install(archive, &selected, &request.destination).await?;
        reporter.info(&format!(
            "installed flow {selected} at {}",
            installed.path().display()
        ));
        Ok(installed)
    }
}

/// Return a cached entry for `version` if it exists and still probes as that
/// version; otherwise evict whatever is there.
async fn reuse_cached(
    cache_root: &Path,
    version: &FlowVersion,
    reporter: &dyn Reporter,
) -> Option<ResolvedBinary> {
    let path = cache::entry_path(cache_root, version);
    if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
        return None;
    }

    match probe::probe(&path).await {
        Ok(probed) if probed == *version => {
            reporter.info(&format!(
                "re-using cached flow {version} at {}",
                path.display()
            ));
            Some(ResolvedBinary::new(path, probed, BinaryOrigin::Downloaded))
        }
        outcome => {
            let reason = match outcome {
                Ok(other) => format!("reports version {other}"),
                Err(e) => e.to_string(),
            };
            reporter.warn(&format!(
                "evicting cached flow {version}: {reason}; re-downloading"
            ));
            let _ = tokio::fs::remove_dir_all(cache::entry_dir(cache_root, version)).await;
            None
        }
    }
}

/// Extract, verify, and publish one downloaded archive.
async fn install(
    archive: Vec<u8>,
    version: &FlowVersion,
    cache_root: &Path,
) -> Result<ResolvedBinary, ResolveError> {
    let extraction = |e: std::io::Error| ResolveError::ExtractionFailure(e.to_string());

    tokio::fs::create_dir_all(cache_root).await.map_err(extraction)?;
    let staging = tempfile::Builder::new()
        .prefix(".staging-")
        .tempdir_in(cache_root)
        .map_err(extraction)?;

    let staged = {
        let staging_dir = staging.path().to_path_buf();
        tokio::task::spawn_blocking(move || extract_flow_binary(&archive, &staging_dir))
            .await
            .map_err(|e| ResolveError::ExtractionFailure(e.to_string()))??
    };

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(&staged, std::fs::Permissions::from_mode(0o755))
            .await
            .map_err(extraction)?;
    }

    // Integrity check before anything becomes visible in the cache.
    let probed = probe::probe(&staged).await?;
    if probed != *version {
        return Err(ResolveError::InvalidBinary {
            path: staged,
            reason: format!("extracted binary reports {probed}, expected {version}"),
        });
    }

    let entry_dir = cache::entry_dir(cache_root, version);
    tokio::fs::create_dir_all(&entry_dir).await.map_err(extraction)?;
    let entry_path = cache::entry_path(cache_root, version);
    if let Err(e) = tokio::fs::rename(&staged, &entry_path).await {
        let _ = tokio::fs::remove_dir_all(&entry_dir).await;
        return Err(extraction(e));
    }

    Ok(ResolvedBinary::new(entry_path, probed, BinaryOrigin::Downloaded))
}

/// Pull the flow executable out of a gzipped tar. Entries that try to escape
/// the destination are skipped.
fn extract_flow_binary(archive: &[u8], dest: &Path) -> Result<PathBuf, ResolveError> {
    let invalid = |reason: String| ResolveError::ExtractionFailure(reason);

    let mut tar = tar::Archive::new(GzDecoder::new(archive));
    let wanted = std::ffi::OsStr::new(cache::flow_binary_name());
    for entry in tar
        .entries()
        .map_err(|e| invalid(format!("invalid archive: {e}")))?
    {
        let mut entry = entry.map_err(|e| invalid(format!("invalid archive entry: {e}")))?;
        let path = entry
            .path()
            .map_err(|e| invalid(format!("invalid entry path: {e}")))?;
        if path
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            continue;
        }
        if !entry.header().entry_type().is_file() || path.file_name() != Some(wanted) {
            continue;
        }

        let out = dest.join(wanted);
        let mut file = std::fs::File::create(&out).map_err(|e| invalid(e.to_string()))?;
        std::io::copy(&mut entry, &mut file).map_err(|e| invalid(e.to_string()))?;
        return Ok(out);
    }

    Err(invalid("archive does not contain a flow binary".to_string()))
}
