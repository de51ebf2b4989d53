//! Release index client.
//!
//! The index speaks the GitHub releases API shape: a JSON array of releases,
//! each with a version tag and a list of downloadable assets. Read-only, no
//! authentication.

use serde::Deserialize;
use url::Url;

use flowls_types::{FlowVersion, ResolveError};

/// Where flow releases are published.
pub const DEFAULT_RELEASE_INDEX_URL: &str =
    "https://api.github.com/repos/facebook/flow/releases?per_page=100";

/// One release as listed by the index.
#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    tag_name: String,
    #[serde(default)]
    assets: Vec<ReleaseAsset>,
}

/// One downloadable artifact attached to a release.
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseAsset {
    name: String,
    browser_download_url: String,
}

impl Release {
    /// Version parsed from the release tag, tolerating the conventional `v`
    /// prefix. Tags that aren't versions (nightlies, odd tags) are skipped.
    #[must_use]
    pub fn version(&self) -> Option<FlowVersion> {
        let tag = self.tag_name.strip_prefix('v').unwrap_or(&self.tag_name);
        FlowVersion::parse(tag).ok()
    }

    #[must_use]
    pub fn asset_named(&self, name: &str) -> Option<&ReleaseAsset> {
        self.assets.iter().find(|a| a.name == name)
    }
}

impl ReleaseAsset {
    #[must_use]
    pub fn url(&self) -> &str {
        &self.browser_download_url
    }
}

/// Asset filename carrying the flow binary for this platform.
#[must_use]
pub fn release_asset_name(version: &FlowVersion) -> String {
    format!("flow-{}-v{version}.tar.gz", platform())
}

fn platform() -> &'static str {
    if cfg!(target_os = "macos") {
        "osx"
    } else if cfg!(windows) {
        "win64"
    } else {
        "linux64"
    }
}

/// Thin HTTP client over the release index.
pub(crate) struct ReleaseIndex {
    http: reqwest::Client,
    releases_url: Url,
}

impl ReleaseIndex {
    pub fn new(http: reqwest::Client, releases_url: Url) -> Self {
        Self { http, releases_url }
    }

    /// List the published releases.
    pub async fn releases(&self) -> Result<Vec<Release>, ResolveError> {
        let response = self
            .http
            .get(self.releases_url.clone())
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| network("querying the release index", &e))?;

        response
            .json()
            .await
            .map_err(|e| network("reading the release index", &e))
    }

    /// Fetch one release asset in full.
    pub async fn fetch_asset(&self, asset: &ReleaseAsset) -> Result<Vec<u8>, ResolveError> {
        let operation = format!("fetching {}", asset.name);
        let response = self
            .http
            .get(asset.url())
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| network(&operation, &e))?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| network(&operation, &e))?;
        Ok(bytes.to_vec())
    }
}

fn network(operation: &str, error: &reqwest::Error) -> ResolveError {
    // reqwest chains the interesting cause (dns, connect, timeout); append
    // the root so the reason is actionable.
    let reason = match std::error::Error::source(error) {
        Some(mut source) => {
            while let Some(next) = source.source() {
                source = next;
            }
            format!("{error}: {source}")
        }
        None => error.to_string(),
    };
    ResolveError::NetworkFailure {
        operation: operation.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn release(tag: &str, assets: &[&str]) -> Release {
        serde_json::from_value(serde_json::json!({
            "tag_name": tag,
            "assets": assets
                .iter()
                .map(|name| serde_json::json!({
                    "name": name,
                    "browser_download_url": format!("https://example.test/{name}"),
                }))
                .collect::<Vec<_>>(),
        }))
        .unwrap()
    }

    #[test]
    fn test_version_strips_tag_prefix() {
        assert_eq!(
            release("v0.95.0", &[]).version(),
            Some(FlowVersion::new(0, 95, 0))
        );
        assert_eq!(
            release("0.95.0", &[]).version(),
            Some(FlowVersion::new(0, 95, 0))
        );
    }

    #[test]
    fn test_non_version_tag_skipped() {
        assert_eq!(release("nightly-2024-01-01", &[]).version(), None);
    }

    #[test]
    fn test_asset_lookup() {
        let release = release("v0.95.0", &["flow-linux64-v0.95.0.tar.gz"]);
        assert!(release.asset_named("flow-linux64-v0.95.0.tar.gz").is_some());
        assert!(release.asset_named("flow-osx-v0.95.0.tar.gz").is_none());
    }

    #[test]
    fn test_release_asset_name_embeds_version() {
        let name = release_asset_name(&FlowVersion::new(0, 95, 0));
        assert!(name.starts_with("flow-"));
        assert!(name.ends_with("-v0.95.0.tar.gz"));
    }

    #[test]
    fn test_releases_parse_from_index_json() {
        let releases: Vec<Release> = serde_json::from_value(serde_json::json!([
            { "tag_name": "v1.0.0", "assets": [] },
            { "tag_name": "v0.95.0" }
        ]))
        .unwrap();
        assert_eq!(releases.len(), 2);
        assert_eq!(releases[1].version(), Some(FlowVersion::new(0, 95, 0)));
    }
}
