//! Path utilities for locating test fixture files.
//!
//! Supports both local development and CI by checking a handful of
//! plausible locations before giving up.

use std::path::PathBuf;

/// Returns the workspace root directory by walking up from this crate's
/// manifest directory (`crates/test-utils` -> workspace root).
pub fn workspace_root() -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    PathBuf::from(manifest_dir)
        .parent() // crates/
        .and_then(|p| p.parent()) // workspace root
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from(manifest_dir))
}

/// Path to `crates/{crate_name}/testdata/`.
pub fn crate_testdata_dir(crate_name: &str) -> PathBuf {
    workspace_root().join("crates").join(crate_name).join("testdata")
}

/// Path to `services/{service_name}/testdata/`.
pub fn service_testdata_dir(service_name: &str) -> PathBuf {
    workspace_root().join("services").join(service_name).join("testdata")
}

/// Searches for a fixture file in a few plausible locations:
/// 1. `TEST_DATA_DIR` env var, if set
/// 2. `crates/cml-extfilter/testdata/` (recorded radar tiles)
/// 3. the workspace-level `testdata/` directory
/// 4. `/tmp/`
pub fn find_test_file(name: &str) -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(test_data_dir) = std::env::var("TEST_DATA_DIR") {
        candidates.push(PathBuf::from(test_data_dir).join(name));
    }

    let root = workspace_root();
    candidates.extend([
        root.join("crates/cml-extfilter/testdata").join(name),
        root.join("testdata").join(name),
        PathBuf::from("/tmp").join(name),
    ]);

    candidates.into_iter().find(|p| p.exists())
}

/// Searches for a fixture file in a specific crate's testdata directory.
pub fn find_crate_test_file(crate_name: &str, name: &str) -> Option<PathBuf> {
    let path = crate_testdata_dir(crate_name).join(name);
    path.exists().then_some(path)
}

/// Creates a temporary directory for test output, cleaned up on drop.
pub fn temp_test_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("failed to create temporary test directory")
}

/// Creates a temporary directory with a specific prefix.
pub fn temp_test_dir_with_prefix(prefix: &str) -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .expect("failed to create temporary test directory")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_root_is_valid() {
        let root = workspace_root();
        assert!(root.join("Cargo.toml").exists(), "workspace root should contain Cargo.toml: {root:?}");
    }

    #[test]
    fn test_crate_testdata_dir() {
        let dir = crate_testdata_dir("cml-extfilter");
        assert!(dir.to_string_lossy().contains("cml-extfilter"));
        assert!(dir.to_string_lossy().contains("testdata"));
    }

    #[test]
    fn test_temp_test_dir() {
        let dir = temp_test_dir();
        assert!(dir.path().exists());
    }

    #[test]
    fn test_temp_test_dir_with_prefix() {
        let dir = temp_test_dir_with_prefix("cml_rain_test_");
        assert!(dir.path().to_string_lossy().contains("cml_rain_test_"));
    }
}
