//! Resolution failure taxonomy.
//!
//! Every failure inside the resolver is mapped to one of these variants
//! before it crosses a crate boundary, so callers can branch on the kind and
//! present an actionable message. Only the server orchestrator turns a
//! variant into user-visible text.

use std::path::PathBuf;

use thiserror::Error;

/// Why binary resolution failed.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// An explicit path was supplied but is relative. Fatal for the attempt;
    /// a relative path is never resolved against the working directory.
    #[error(
        "supplied path to flow is not absolute: `{0}`; specify a complete path \
         to the flow binary or leave the option empty for flow to be managed \
         for you"
    )]
    PathNotAbsolute(PathBuf),

    /// The binary is missing, not executable, timed out, or reported an
    /// unparsable version.
    #[error("invalid flow binary at `{path}`: {reason}")]
    InvalidBinary { path: PathBuf, reason: String },

    /// The release index has no version satisfying the requirement.
    #[error("no flow release satisfies `{constraint}`")]
    NoMatchingRelease { constraint: String },

    /// Transport-level failure contacting the release index or fetching an
    /// archive.
    #[error("network failure while {operation}: {reason}")]
    NetworkFailure { operation: String, reason: String },

    /// The archive was corrupt or the filesystem write failed.
    #[error("failed to unpack flow release: {0}")]
    ExtractionFailure(String),

    /// No strategy was applicable.
    #[error(
        "no flow binary available: no explicit path was supplied, no \
         project-local binary was found, and auto-download is disabled"
    )]
    NoBinaryAvailable,
}

impl ResolveError {
    /// Stable short name for logging and telemetry.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PathNotAbsolute(_) => "path-not-absolute",
            Self::InvalidBinary { .. } => "invalid-binary",
            Self::NoMatchingRelease { .. } => "no-matching-release",
            Self::NetworkFailure { .. } => "network-failure",
            Self::ExtractionFailure(_) => "extraction-failure",
            Self::NoBinaryAvailable => "no-binary-available",
        }
    }
}
