//! Engine handle — the capability container the rest of the server holds.
//!
//! Wraps the resolved binary and owns the status stream. Requests shell out
//! to the flow CLI with `--json`; the engine's own background server process
//! is managed by flow itself, we only start, query, restart and stop it.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use flowls_types::{FlowVersion, ResolvedBinary};

use crate::status::{EngineStatus, StatusBroadcaster};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// A resolved, usable engine bound to one project root.
pub struct EngineHandle {
    binary: ResolvedBinary,
    project_root: PathBuf,
    status: StatusBroadcaster,
}

impl EngineHandle {
    /// Wrap a resolved binary. The stream starts at `Initializing`; call
    /// [`mark_ready`](Self::mark_ready) once the session is wired up.
    #[must_use]
    pub fn new(binary: ResolvedBinary, project_root: PathBuf) -> Self {
        let status = StatusBroadcaster::new();
        status.publish(EngineStatus::Initializing);
        Self {
            binary,
            project_root,
            status,
        }
    }

    #[must_use]
    pub fn binary(&self) -> &ResolvedBinary {
        &self.binary
    }

    #[must_use]
    pub fn version(&self) -> &FlowVersion {
        self.binary.version()
    }

    #[must_use]
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    #[must_use]
    pub fn status(&self) -> &StatusBroadcaster {
        &self.status
    }

    /// Mark the engine usable.
    pub fn mark_ready(&self) {
        self.status.publish(EngineStatus::Ready);
    }

    /// Run one engine command with `--json` output, feeding `stdin` to the
    /// process when given. The engine is `Busy` for the duration; a failure
    /// is published as `Failed` and returned.
    pub async fn request(
        &self,
        args: &[&str],
        stdin: Option<&str>,
    ) -> Result<serde_json::Value> {
        self.status.publish(EngineStatus::Busy);
        match self.run_json(args, stdin).await {
            Ok(value) => {
                self.status.publish(EngineStatus::Ready);
                Ok(value)
            }
            Err(e) => {
                self.status.publish(EngineStatus::Failed(format!("{e:#}")));
                Err(e)
            }
        }
    }

    /// Restart the engine's background server process.
    pub async fn restart(&self) -> Result<()> {
        self.status.publish(EngineStatus::Restarting);
        match self.run_plain(&["restart"]).await {
            Ok(()) => {
                self.status.publish(EngineStatus::Ready);
                Ok(())
            }
            Err(e) => {
                self.status.publish(EngineStatus::Failed(format!("{e:#}")));
                Err(e)
            }
        }
    }

    /// Best-effort stop of the engine's background server at teardown.
    pub async fn stop(&self) {
        if let Err(e) = self.run_plain(&["stop"]).await {
            tracing::debug!("flow stop failed: {e:#}");
        }
    }

    async fn run_json(&self, args: &[&str], stdin: Option<&str>) -> Result<serde_json::Value> {
        let output = self.run(args, true, stdin).await?;
        // The engine reports findings on stdout even when it exits non-zero
        // (a failing status check exits 2), so parseability decides.
        match serde_json::from_slice(&output.stdout) {
            Ok(value) => Ok(value),
            Err(_) if !output.status.success() => {
                bail!("engine exited with {}", output.status)
            }
            Err(e) => Err(e).context("unparsable engine output"),
        }
    }

    async fn run_plain(&self, args: &[&str]) -> Result<()> {
        let output = self.run(args, false, None).await?;
        if !output.status.success() {
            bail!("engine exited with {}", output.status);
        }
        Ok(())
    }

    async fn run(
        &self,
        args: &[&str],
        json: bool,
        stdin: Option<&str>,
    ) -> Result<std::process::Output> {
        let mut command = Command::new(self.binary.path());
        command.args(args);
        if json {
            command.arg("--json");
        }
        command
            .current_dir(&self.project_root)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = command
            .spawn()
            .with_context(|| format!("spawning {}", self.binary.path().display()))?;

        if let Some(text) = stdin {
            let mut handle = child.stdin.take().context("no stdin handle on child")?;
            handle
                .write_all(text.as_bytes())
                .await
                .context("writing document to engine")?;
            // Close so the engine sees EOF.
            drop(handle);
        }

        match tokio::time::timeout(REQUEST_TIMEOUT, child.wait_with_output()).await {
            Ok(output) => output.context("collecting engine output"),
            Err(_) => bail!("engine request timed out after {}s", REQUEST_TIMEOUT.as_secs()),
        }
    }
}
