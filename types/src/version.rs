//! Flow version descriptors and version constraints.
//!
//! Flow releases are versioned `MAJOR.MINOR.PATCH` with an optional
//! pre-release suffix. Parsing is total: anything that does not match the
//! grammar is a [`VersionParseError`], never a half-filled value.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure to parse a version or version constraint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionParseError {
    #[error("empty version string")]
    Empty,
    #[error("invalid version `{0}`: expected MAJOR.MINOR.PATCH[-PRERELEASE]")]
    Shape(String),
    #[error("invalid numeric component `{component}` in version `{raw}`")]
    Component { raw: String, component: String },
}

/// A parsed Flow version, together with the raw string it came from.
///
/// Equality and ordering consider only the parsed fields; the raw source
/// string is carried for display and logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FlowVersion {
    major: u64,
    minor: u64,
    patch: u64,
    pre: Option<String>,
    raw: String,
}

impl FlowVersion {
    /// Construct a release version from its numeric components.
    #[must_use]
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            pre: None,
            raw: format!("{major}.{minor}.{patch}"),
        }
    }

    /// Parse `MAJOR.MINOR.PATCH[-PRERELEASE]`.
    pub fn parse(input: &str) -> Result<Self, VersionParseError> {
        let raw = input.trim();
        if raw.is_empty() {
            return Err(VersionParseError::Empty);
        }

        let (numeric, pre) = match raw.split_once('-') {
            Some((n, p)) if !p.is_empty() => (n, Some(p.to_string())),
            Some(_) => return Err(VersionParseError::Shape(raw.to_string())),
            None => (raw, None),
        };

        let mut parts = numeric.split('.');
        let (Some(major), Some(minor), Some(patch), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(VersionParseError::Shape(raw.to_string()));
        };

        let component = |s: &str| -> Result<u64, VersionParseError> {
            s.parse().map_err(|_| VersionParseError::Component {
                raw: raw.to_string(),
                component: s.to_string(),
            })
        };

        Ok(Self {
            major: component(major)?,
            minor: component(minor)?,
            patch: component(patch)?,
            pre,
            raw: raw.to_string(),
        })
    }

    #[must_use]
    pub fn major(&self) -> u64 {
        self.major
    }

    #[must_use]
    pub fn minor(&self) -> u64 {
        self.minor
    }

    #[must_use]
    pub fn patch(&self) -> u64 {
        self.patch
    }

    /// Pre-release suffix, if any (`rc.1` in `0.95.0-rc.1`).
    #[must_use]
    pub fn pre(&self) -> Option<&str> {
        self.pre.as_deref()
    }

    /// The string this version was parsed from, unmodified.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

impl PartialEq for FlowVersion {
    fn eq(&self, other: &Self) -> bool {
        (self.major, self.minor, self.patch, &self.pre)
            == (other.major, other.minor, other.patch, &other.pre)
    }
}

impl Eq for FlowVersion {}

impl std::hash::Hash for FlowVersion {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        (self.major, self.minor, self.patch, &self.pre).hash(state);
    }
}

impl Ord for FlowVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (&self.pre, &other.pre) {
                // A pre-release sorts below its release.
                (None, None) => Ordering::Equal,
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some(a), Some(b)) => a.cmp(b),
            })
    }
}

impl PartialOrd for FlowVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for FlowVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(pre) = &self.pre {
            write!(f, "-{pre}")?;
        }
        Ok(())
    }
}

impl FromStr for FlowVersion {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for FlowVersion {
    type Error = VersionParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<FlowVersion> for String {
    fn from(v: FlowVersion) -> Self {
        v.to_string()
    }
}

/// A version requirement declared by the project or configuration.
///
/// `0.95.0`, `=0.95.0`, and `v0.95.0` all pin an exact version. Only an
/// explicit caret (`^0.95.0`) opts into range matching; a constraint is never
/// widened beyond what it wrote down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionConstraint {
    /// Only this version satisfies the constraint.
    Exact(FlowVersion),
    /// Caret semantics: same major (and same minor while major is 0), at
    /// least the written version.
    Compatible(FlowVersion),
}

impl VersionConstraint {
    /// Parse a constraint string.
    pub fn parse(input: &str) -> Result<Self, VersionParseError> {
        let raw = input.trim();
        if let Some(rest) = raw.strip_prefix('^') {
            return Ok(Self::Compatible(FlowVersion::parse(rest)?));
        }
        let exact = raw
            .strip_prefix('=')
            .or_else(|| raw.strip_prefix('v'))
            .unwrap_or(raw);
        Ok(Self::Exact(FlowVersion::parse(exact)?))
    }

    /// The version the constraint was written against.
    #[must_use]
    pub fn base(&self) -> &FlowVersion {
        match self {
            Self::Exact(v) | Self::Compatible(v) => v,
        }
    }

    /// Whether `candidate` satisfies this constraint.
    #[must_use]
    pub fn matches(&self, candidate: &FlowVersion) -> bool {
        match self {
            Self::Exact(wanted) => candidate == wanted,
            Self::Compatible(base) => {
                if candidate < base || candidate.major() != base.major() {
                    return false;
                }
                // While major is 0 every minor bump may break.
                base.major() != 0 || candidate.minor() == base.minor()
            }
        }
    }

    /// The best candidate out of `versions`: the exact version for an exact
    /// constraint, otherwise the highest satisfying one.
    #[must_use]
    pub fn best_match<'a, I>(&self, versions: I) -> Option<&'a FlowVersion>
    where
        I: IntoIterator<Item = &'a FlowVersion>,
    {
        versions.into_iter().filter(|v| self.matches(v)).max()
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(v) => write!(f, "{v}"),
            Self::Compatible(v) => write!(f, "^{v}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> FlowVersion {
        FlowVersion::parse(s).unwrap()
    }

    #[test]
    fn test_parse_release() {
        let version = v("0.95.0");
        assert_eq!(version.major(), 0);
        assert_eq!(version.minor(), 95);
        assert_eq!(version.patch(), 0);
        assert_eq!(version.pre(), None);
        assert_eq!(version.raw(), "0.95.0");
        assert_eq!(version.to_string(), "0.95.0");
    }

    #[test]
    fn test_parse_prerelease() {
        let version = v("1.2.3-rc.1");
        assert_eq!(version.pre(), Some("rc.1"));
        assert_eq!(version.to_string(), "1.2.3-rc.1");
    }

    #[test]
    fn test_parse_keeps_raw() {
        assert_eq!(v("  0.95.0 ").raw(), "0.95.0");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["", "0.95", "0.95.0.1", "0.95.x", "v0.95.0", "abc", "1.2.3-"] {
            assert!(FlowVersion::parse(bad).is_err(), "accepted `{bad}`");
        }
    }

    #[test]
    fn test_equality_ignores_raw() {
        let a = v("0.95.0");
        let b = v(" 0.95.0");
        assert_eq!(a, b);
    }

    #[test]
    fn test_ordering() {
        assert!(v("0.90.0") < v("0.95.0"));
        assert!(v("0.95.0") < v("1.0.0"));
        assert!(v("0.95.1") > v("0.95.0"));
        // Pre-release sorts below its release.
        assert!(v("1.0.0-rc.1") < v("1.0.0"));
    }

    #[test]
    fn test_serde_round_trip() {
        let version: FlowVersion = serde_json::from_str("\"0.95.0\"").unwrap();
        assert_eq!(version, v("0.95.0"));
        assert_eq!(serde_json::to_string(&version).unwrap(), "\"0.95.0\"");
    }

    #[test]
    fn test_serde_rejects_malformed() {
        assert!(serde_json::from_str::<FlowVersion>("\"nope\"").is_err());
    }

    #[test]
    fn test_constraint_parse_exact_forms() {
        for form in ["0.95.0", "=0.95.0", "v0.95.0"] {
            let constraint = VersionConstraint::parse(form).unwrap();
            assert_eq!(constraint, VersionConstraint::Exact(v("0.95.0")), "{form}");
        }
    }

    #[test]
    fn test_constraint_parse_caret() {
        assert_eq!(
            VersionConstraint::parse("^0.95.0").unwrap(),
            VersionConstraint::Compatible(v("0.95.0"))
        );
    }

    #[test]
    fn test_exact_matches_only_itself() {
        let constraint = VersionConstraint::parse("0.95.0").unwrap();
        assert!(constraint.matches(&v("0.95.0")));
        assert!(!constraint.matches(&v("0.95.1")));
        assert!(!constraint.matches(&v("1.0.0")));
    }

    #[test]
    fn test_caret_zero_major_pins_minor() {
        let constraint = VersionConstraint::parse("^0.95.0").unwrap();
        assert!(constraint.matches(&v("0.95.0")));
        assert!(constraint.matches(&v("0.95.7")));
        assert!(!constraint.matches(&v("0.96.0")));
        assert!(!constraint.matches(&v("0.94.9")));
    }

    #[test]
    fn test_caret_nonzero_major_pins_major() {
        let constraint = VersionConstraint::parse("^1.2.0").unwrap();
        assert!(constraint.matches(&v("1.2.0")));
        assert!(constraint.matches(&v("1.9.3")));
        assert!(!constraint.matches(&v("2.0.0")));
        assert!(!constraint.matches(&v("1.1.9")));
    }

    #[test]
    fn test_best_match_exact_never_substitutes() {
        let available = [v("0.90.0"), v("0.95.0"), v("1.0.0")];
        let constraint = VersionConstraint::parse("0.95.0").unwrap();
        assert_eq!(constraint.best_match(&available), Some(&available[1]));

        let missing = VersionConstraint::parse("0.99.0").unwrap();
        assert_eq!(missing.best_match(&available), None);
    }

    #[test]
    fn test_best_match_caret_picks_highest() {
        let available = [v("0.95.0"), v("0.95.3"), v("0.95.1"), v("0.96.0")];
        let constraint = VersionConstraint::parse("^0.95.0").unwrap();
        assert_eq!(constraint.best_match(&available), Some(&available[1]));
    }
}
