//! Diagnostics over `flow status`.
//!
//! Flow reports every error in the project; we re-shape them into per-file
//! LSP diagnostics and remember which files we told the client about so
//! stale ones get an explicit empty publish.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use tower_lsp::lsp_types::{Diagnostic, DiagnosticSeverity, Position, Range, Url};

use crate::engine::EngineHandle;

pub(crate) struct DiagnosticsProvider {
    engine: Arc<EngineHandle>,
    published: Mutex<HashSet<Url>>,
}

impl DiagnosticsProvider {
    pub fn new(engine: Arc<EngineHandle>) -> Self {
        Self {
            engine,
            published: Mutex::new(HashSet::new()),
        }
    }

    /// Run a status check and return everything the client should be told:
    /// current findings per file, plus empty lists for files whose findings
    /// disappeared since the last check.
    pub async fn check(&self) -> Vec<(Url, Vec<Diagnostic>)> {
        let value = match self.engine.request(&["status"], None).await {
            Ok(value) => value,
            Err(e) => {
                // Unknown state; keep what the client has rather than
                // clearing findings that may still hold.
                tracing::debug!("status check failed: {e:#}");
                return Vec::new();
            }
        };

        let mut updates = diagnostics_from(&value, self.engine.project_root());
        let current: HashSet<Url> = updates.iter().map(|(uri, _)| uri.clone()).collect();

        let mut published = self.lock();
        for stale in published.difference(&current) {
            updates.push((stale.clone(), Vec::new()));
        }
        *published = current;
        updates
    }

    /// Forget everything published and return the files to clear, for
    /// session teardown.
    pub fn drain(&self) -> Vec<Url> {
        self.lock().drain().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<Url>> {
        self.published.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Re-shape a `flow status --json` reply into per-file diagnostics, sorted
/// by file for deterministic publishing.
fn diagnostics_from(value: &Value, project_root: &Path) -> Vec<(Url, Vec<Diagnostic>)> {
    let mut by_file: HashMap<Url, Vec<Diagnostic>> = HashMap::new();

    let errors = value.get("errors").and_then(Value::as_array);
    for error in errors.into_iter().flatten() {
        let blobs: Vec<&Value> = error
            .get("message")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .collect();

        let Some(primary) = blobs
            .iter()
            .find(|blob| blob.get("path").and_then(Value::as_str).is_some_and(|p| !p.is_empty()))
        else {
            continue;
        };
        let Some(uri) = file_uri(primary, project_root) else {
            continue;
        };

        let message = blobs
            .iter()
            .filter_map(|blob| blob.get("descr").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join(" ");
        let severity = match error.get("level").and_then(Value::as_str) {
            Some("warning") => DiagnosticSeverity::WARNING,
            _ => DiagnosticSeverity::ERROR,
        };

        by_file.entry(uri).or_default().push(Diagnostic {
            range: range_of(primary),
            severity: Some(severity),
            source: Some("flow".to_string()),
            message,
            ..Diagnostic::default()
        });
    }

    let mut files: Vec<(Url, Vec<Diagnostic>)> = by_file.into_iter().collect();
    files.sort_by(|a, b| a.0.cmp(&b.0));
    files
}

fn file_uri(blob: &Value, project_root: &Path) -> Option<Url> {
    let path = blob.get("path")?.as_str()?;
    let path = PathBuf::from(path);
    let absolute = if path.is_absolute() {
        path
    } else {
        project_root.join(path)
    };
    Url::from_file_path(absolute).ok()
}

/// Flow ranges are 1-based with inclusive ends.
fn range_of(blob: &Value) -> Range {
    let number = |key: &str| blob.get(key).and_then(Value::as_u64).unwrap_or(1);
    let line = number("line");
    Range {
        start: Position::new(
            line.saturating_sub(1) as u32,
            number("start").saturating_sub(1) as u32,
        ),
        end: Position::new(
            blob.get("endline")
                .and_then(Value::as_u64)
                .unwrap_or(line)
                .saturating_sub(1) as u32,
            number("end") as u32,
        ),
    }
}
