//! Version probe — ask a candidate binary what it is.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use serde::Deserialize;
use tokio::process::Command;

use flowls_types::{FlowVersion, ResolveError};

/// Upper bound for one version query; the initialize handshake must not hang
/// on a wedged binary.
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Shape of `flow version --json` stdout.
#[derive(Debug, Deserialize)]
struct VersionReport {
    semver: String,
}

/// Run `<binary> version --json` and parse the reported version.
///
/// Spawns one short-lived process. Any deviation — spawn failure, non-zero
/// exit, timeout, unparsable output — is an
/// [`InvalidBinary`](ResolveError::InvalidBinary). No retries here; retry
/// policy belongs to the caller.
pub async fn probe(binary: &Path) -> Result<FlowVersion, ResolveError> {
    probe_with_timeout(binary, PROBE_TIMEOUT).await
}

pub(crate) async fn probe_with_timeout(
    binary: &Path,
    timeout: Duration,
) -> Result<FlowVersion, ResolveError> {
    let invalid = |reason: String| ResolveError::InvalidBinary {
        path: binary.to_path_buf(),
        reason,
    };

    let mut command = Command::new(binary);
    command
        .args(["version", "--json"])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    let output = match tokio::time::timeout(timeout, command.output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => return Err(invalid(format!("failed to execute: {e}"))),
        Err(_) => {
            return Err(invalid(format!(
                "version query did not finish within {}s",
                timeout.as_secs()
            )));
        }
    };

    if !output.status.success() {
        return Err(invalid(format!("version query exited with {}", output.status)));
    }

    let report: VersionReport = serde_json::from_slice(&output.stdout)
        .map_err(|e| invalid(format!("unparsable version output: {e}")))?;

    FlowVersion::parse(&report.semver)
        .map_err(|e| invalid(format!("unparsable version `{}`: {e}", report.semver)))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;

    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "#!/bin/sh\n{body}").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn test_probe_parses_version_report() {
        let dir = tempfile::tempdir().unwrap();
        let flow = script(
            dir.path(),
            "flow",
            r#"echo '{"semver":"0.95.0","binary":"flow"}'"#,
        );
        let version = probe(&flow).await.unwrap();
        assert_eq!(version, FlowVersion::new(0, 95, 0));
    }

    #[tokio::test]
    async fn test_probe_missing_binary() {
        let dir = tempfile::tempdir().unwrap();
        let err = probe(&dir.path().join("flow")).await.unwrap_err();
        assert!(matches!(err, ResolveError::InvalidBinary { .. }), "{err}");
    }

    #[tokio::test]
    async fn test_probe_nonzero_exit() {
        let dir = tempfile::tempdir().unwrap();
        let flow = script(dir.path(), "flow", "exit 3");
        let err = probe(&flow).await.unwrap_err();
        assert!(err.to_string().contains("exited"), "{err}");
    }

    #[tokio::test]
    async fn test_probe_garbage_output() {
        let dir = tempfile::tempdir().unwrap();
        let flow = script(dir.path(), "flow", "echo 'not json'");
        let err = probe(&flow).await.unwrap_err();
        assert!(err.to_string().contains("unparsable"), "{err}");
    }

    #[tokio::test]
    async fn test_probe_bad_semver_field() {
        let dir = tempfile::tempdir().unwrap();
        let flow = script(dir.path(), "flow", r#"echo '{"semver":"banana"}'"#);
        let err = probe(&flow).await.unwrap_err();
        assert!(err.to_string().contains("banana"), "{err}");
    }

    #[tokio::test]
    async fn test_probe_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let flow = script(dir.path(), "flow", "sleep 5");
        let err = probe_with_timeout(&flow, Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("did not finish"), "{err}");
    }
}
