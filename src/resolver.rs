//! Locate the cppp executable from an ordered list of candidates.

use crate::error::ResolveError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default search order: a local build tree, the working directory, then `PATH`.
pub const DEFAULT_CANDIDATES: &[&str] = &["./build/cppp", "./cppp", "cppp"];

/// Shown when no candidate resolves.
pub const INSTALL_HINTS: &[&str] = &[
    "To install cppp:",
    "  1. git clone https://github.com/kernelginar/cppp",
    "  2. cd cppp && mkdir build && cd build",
    "  3. cmake .. && make",
    "  4. sudo make install  (or add the build directory to PATH)",
];

/// Return the first usable candidate.
///
/// A candidate is accepted when it names an existing filesystem entry, or when it is a
/// bare program name (no path separator), which is left for the OS to look up on `PATH`
/// at spawn time.
pub fn resolve<S: AsRef<str>>(candidates: &[S]) -> Result<PathBuf, ResolveError> {
    for candidate in candidates.iter().map(AsRef::as_ref) {
        if candidate.is_empty() {
            continue;
        }
        if Path::new(candidate).exists() {
            debug!(candidate, "resolved cppp on disk");
            return Ok(PathBuf::from(candidate));
        }
        if is_bare_name(candidate) {
            debug!(candidate, "falling back to PATH lookup");
            return Ok(PathBuf::from(candidate));
        }
    }
    Err(ResolveError::NotFound(
        candidates.iter().map(|c| c.as_ref().to_string()).collect(),
    ))
}

fn is_bare_name(candidate: &str) -> bool {
    !candidate.contains('/') && !candidate.contains(std::path::MAIN_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_existing_candidate_wins() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first");
        let second = dir.path().join("second");
        std::fs::write(&first, b"").unwrap();
        std::fs::write(&second, b"").unwrap();

        let missing = dir.path().join("missing");
        let candidates = [
            missing.to_string_lossy().to_string(),
            first.to_string_lossy().to_string(),
            second.to_string_lossy().to_string(),
        ];
        assert_eq!(resolve(&candidates).unwrap(), first);
    }

    #[test]
    fn bare_name_is_last_resort() {
        let candidates = ["/definitely/not/here/cppp", "./nor/here/cppp", "cppp"];
        assert_eq!(resolve(&candidates).unwrap(), PathBuf::from("cppp"));
    }

    #[test]
    fn existing_path_is_preferred_over_later_bare_name() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("cppp");
        std::fs::write(&local, b"").unwrap();
        let candidates = [local.to_string_lossy().to_string(), "cppp".to_string()];
        assert_eq!(resolve(&candidates).unwrap(), local);
    }

    #[test]
    fn missing_paths_without_bare_name_are_not_found() {
        let candidates = ["./build/definitely-missing", "/nope/cppp"];
        assert_eq!(
            resolve(&candidates),
            Err(ResolveError::NotFound(vec![
                "./build/definitely-missing".into(),
                "/nope/cppp".into()
            ]))
        );
    }

    #[test]
    fn empty_list_is_not_found() {
        let candidates: [&str; 0] = [];
        assert!(resolve(&candidates).is_err());
    }
}
