//! Shared fixtures: fake flow binaries, fake release archives, a fake
//! release index served by wiremock.

use std::io::Write;
use std::path::Path;

use flate2::Compression;
use flate2::write::GzEncoder;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use flowls_resolver::release_asset_name;
use flowls_types::FlowVersion;

/// A shell script that answers `version --json` like flow does.
///
/// `marker`, when given, is a file the script creates on every invocation so
/// tests can assert whether a probe actually ran.
pub fn flow_script_body(semver: &str, marker: Option<&Path>) -> Vec<u8> {
    let mut body = b"#!/bin/sh\n".to_vec();
    if let Some(marker) = marker {
        writeln!(body, "touch '{}'", marker.display()).unwrap();
    }
    writeln!(body, r#"echo '{{"semver":"{semver}","binary":"'$0'"}}'"#).unwrap();
    body
}

/// Write an executable fake flow at `path`.
#[cfg(unix)]
pub fn write_flow_script(path: &Path, semver: &str, marker: Option<&Path>) {
    use std::os::unix::fs::PermissionsExt;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, flow_script_body(semver, marker)).unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

/// A gzipped tar laid out like a flow release archive, containing a fake
/// flow that reports `semver`.
pub fn release_archive(semver: &str) -> Vec<u8> {
    let script = flow_script_body(semver, None);
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    let mut header = tar::Header::new_gnu();
    header.set_size(script.len() as u64);
    header.set_mode(0o755);
    header.set_cksum();
    builder
        .append_data(&mut header, "flow/flow", script.as_slice())
        .unwrap();
    builder.into_inner().unwrap().finish().unwrap()
}

/// Stand up a fake release index listing `versions`, each with a platform
/// archive whose embedded binary reports that version.
pub async fn fake_release_index(versions: &[&str]) -> MockServer {
    let server = MockServer::start().await;

    let releases: Vec<serde_json::Value> = versions
        .iter()
        .map(|version| {
            let asset = release_asset_name(&FlowVersion::parse(version).unwrap());
            serde_json::json!({
                "tag_name": format!("v{version}"),
                "assets": [{
                    "name": asset,
                    "browser_download_url": format!("{}/archive/{asset}", server.uri()),
                }],
            })
        })
        .collect();

    Mock::given(method("GET"))
        .and(path("/releases"))
        .respond_with(ResponseTemplate::new(200).set_body_json(releases))
        .mount(&server)
        .await;

    for version in versions {
        let asset = release_asset_name(&FlowVersion::parse(version).unwrap());
        Mock::given(method("GET"))
            .and(path(format!("/archive/{asset}")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(release_archive(version)))
            .mount(&server)
            .await;
    }

    server
}

/// Releases endpoint URL for a mock server.
pub fn index_url(server: &MockServer) -> url::Url {
    url::Url::parse(&format!("{}/releases", server.uri())).unwrap()
}

/// Count requests the server saw for a given path.
pub async fn requests_for(server: &MockServer, wanted: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == wanted)
        .count()
}

/// A project root directory, optionally with a `.flowconfig` declaring a
/// version.
pub fn project_root(flowconfig_version: Option<&str>) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    if let Some(version) = flowconfig_version {
        std::fs::write(
            dir.path().join(".flowconfig"),
            format!("[ignore]\n.*/node_modules/.*\n\n[version]\n{version}\n"),
        )
        .unwrap();
    }
    dir
}
