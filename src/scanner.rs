use anyhow::{Context, Result};
use log::{debug, warn};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// File scanner for collecting the Rust sources that declare interfaces and types.
///
/// When the project root has a `src/` directory only that tree is scanned, so test and
/// bench files never contribute declarations. Otherwise the root itself is walked. The
/// `target` directory and hidden directories (those starting with `.`) are skipped.
///
/// # Example
///
/// ```no_run
/// use openapi_from_interface::scanner::FileScanner;
/// use std::path::PathBuf;
///
/// let scanner = FileScanner::new(PathBuf::from("./my-service"));
/// let result = scanner.scan().unwrap();
/// println!("Found {} Rust files", result.rust_files.len());
/// ```
pub struct FileScanner {
    root_path: PathBuf,
}

/// Result of directory scanning operation.
pub struct ScanResult {
    /// Paths of all discovered `.rs` files, sorted
    pub rust_files: Vec<PathBuf>,
    /// Warning messages for any issues encountered (e.g., inaccessible directories)
    pub warnings: Vec<String>,
}

impl FileScanner {
    /// Creates a new `FileScanner` for the specified project root or source directory.
    pub fn new(root_path: PathBuf) -> Self {
        Self { root_path }
    }

    /// Directory actually walked: `<root>/src` if present, the root otherwise
    pub fn source_root(&self) -> PathBuf {
        let src = self.root_path.join("src");
        if src.is_dir() {
            src
        } else {
            self.root_path.clone()
        }
    }

    /// Scans the source tree and collects all `.rs` files in a stable order.
    ///
    /// Inaccessible entries are logged and reported in [`ScanResult::warnings`];
    /// scanning continues past them.
    ///
    /// # Errors
    ///
    /// Returns an error if the root directory does not exist.
    pub fn scan(&self) -> Result<ScanResult> {
        let source_root = self.source_root();
        source_root
            .metadata()
            .with_context(|| format!("Cannot access source directory: {}", source_root.display()))?;
        debug!("Scanning {}", source_root.display());

        let mut rust_files = Vec::new();
        let mut warnings = Vec::new();

        for entry in WalkDir::new(&source_root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.path() == source_root || !Self::is_ignored(e.path()))
        {
            match entry {
                Ok(entry) => {
                    let path = entry.path();
                    if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("rs") {
                        rust_files.push(path.to_path_buf());
                    }
                }
                Err(e) => {
                    let warning = format!("Failed to access path: {}", e);
                    warn!("{}", warning);
                    warnings.push(warning);
                }
            }
        }

        debug!("Found {} Rust files", rust_files.len());
        Ok(ScanResult {
            rust_files,
            warnings,
        })
    }

    fn is_ignored(path: &Path) -> bool {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();
        file_name.starts_with('.') || file_name == "target"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn file_names(result: &ScanResult) -> Vec<String> {
        result
            .rust_files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn test_scan_prefers_src_directory() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::create_dir_all(root.join("src/jobs")).unwrap();
        fs::create_dir(root.join("tests")).unwrap();
        fs::write(root.join("build.rs"), "fn main() {}").unwrap();
        fs::write(root.join("src/lib.rs"), "pub mod jobs;").unwrap();
        fs::write(root.join("src/jobs/mod.rs"), "pub trait Jobs {}").unwrap();
        fs::write(root.join("tests/integration.rs"), "#[test] fn test() {}").unwrap();

        let scanner = FileScanner::new(root.to_path_buf());
        let result = scanner.scan().unwrap();

        assert_eq!(scanner.source_root(), root.join("src"));
        assert_eq!(file_names(&result), vec!["mod.rs", "lib.rs"]);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_scan_directory_without_src() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::write(root.join("service.rs"), "pub trait Service {}").unwrap();
        fs::write(root.join("model.rs"), "pub struct Model;").unwrap();
        fs::write(root.join("readme.md"), "# README").unwrap();

        let result = FileScanner::new(root.to_path_buf()).scan().unwrap();

        assert_eq!(file_names(&result), vec!["model.rs", "service.rs"]);
    }

    #[test]
    fn test_scan_empty_directory() {
        let temp_dir = TempDir::new().unwrap();

        let result = FileScanner::new(temp_dir.path().to_path_buf()).scan().unwrap();

        assert!(result.rust_files.is_empty());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_scan_skips_target_and_hidden_directories() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::create_dir(root.join("target")).unwrap();
        fs::create_dir(root.join(".git")).unwrap();
        fs::write(root.join("target/generated.rs"), "fn main() {}").unwrap();
        fs::write(root.join(".git/config.rs"), "// config").unwrap();
        fs::write(root.join("api.rs"), "pub trait Api {}").unwrap();

        let result = FileScanner::new(root.to_path_buf()).scan().unwrap();

        assert_eq!(file_names(&result), vec!["api.rs"]);
    }

    #[test]
    fn test_scan_missing_directory_fails() {
        let result = FileScanner::new(PathBuf::from("/nonexistent/project")).scan();
        assert!(result.is_err());
    }
}
