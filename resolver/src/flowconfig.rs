//! `.flowconfig` version discovery.
//!
//! Projects pin the Flow version they expect in the `[version]` section of
//! their `.flowconfig`. Absence of the file, the section, or a parsable
//! constraint all mean "no declared version" — the caller falls back to its
//! default.

use std::path::Path;

use flowls_types::VersionConstraint;

/// Read the version constraint the project declares, if any.
pub fn declared_version(project_root: &Path) -> Option<VersionConstraint> {
    let path = project_root.join(".flowconfig");
    let contents = std::fs::read_to_string(&path).ok()?;

    let mut in_version_section = false;
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if line.starts_with('[') {
            in_version_section = line.eq_ignore_ascii_case("[version]");
            continue;
        }
        if in_version_section {
            match VersionConstraint::parse(line) {
                Ok(constraint) => return Some(constraint),
                Err(e) => {
                    tracing::warn!(
                        "ignoring unparsable version constraint `{line}` in {}: {e}",
                        path.display()
                    );
                    return None;
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowls_types::FlowVersion;

    fn root_with(contents: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".flowconfig"), contents).unwrap();
        dir
    }

    #[test]
    fn test_declared_exact_version() {
        let root = root_with("[ignore]\n.*/node_modules/.*\n\n[version]\n0.95.0\n");
        assert_eq!(
            declared_version(root.path()),
            Some(VersionConstraint::Exact(FlowVersion::new(0, 95, 0)))
        );
    }

    #[test]
    fn test_declared_caret_version() {
        let root = root_with("[version]\n^0.95.0\n");
        assert_eq!(
            declared_version(root.path()),
            Some(VersionConstraint::Compatible(FlowVersion::new(0, 95, 0)))
        );
    }

    #[test]
    fn test_comments_and_blanks_skipped() {
        let root = root_with("[version]\n# pinned for CI\n\n0.95.0\n");
        assert_eq!(
            declared_version(root.path()),
            Some(VersionConstraint::Exact(FlowVersion::new(0, 95, 0)))
        );
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(declared_version(dir.path()), None);
    }

    #[test]
    fn test_missing_section() {
        let root = root_with("[ignore]\n.*/build/.*\n");
        assert_eq!(declared_version(root.path()), None);
    }

    #[test]
    fn test_empty_section() {
        let root = root_with("[version]\n\n[ignore]\nfoo\n");
        assert_eq!(declared_version(root.path()), None);
    }

    #[test]
    fn test_unparsable_constraint_is_none() {
        let root = root_with("[version]\nlatest-and-greatest\n");
        assert_eq!(declared_version(root.path()), None);
    }
}
