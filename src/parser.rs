use anyhow::{Context, Result};
use log::{debug, warn};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// AST (Abstract Syntax Tree) parser for Rust source files.
///
/// The `AstParser` uses the `syn` crate to parse Rust source code into an abstract syntax tree,
/// from which interfaces and type declarations are later introspected.
///
/// # Example
///
/// ```no_run
/// use openapi_from_interface::parser::AstParser;
/// use std::path::Path;
///
/// let parsed = AstParser::parse_file(Path::new("src/service.rs")).unwrap();
/// println!("Parsed {} items in module {:?}", parsed.syntax_tree.items.len(), parsed.module_path);
/// ```
pub struct AstParser;

/// A successfully parsed Rust file with its abstract syntax tree.
#[derive(Debug)]
pub struct ParsedFile {
    /// Path to the source file
    pub path: PathBuf,
    /// Module path of the file, e.g. `["jobs", "model"]` for `src/jobs/model.rs`
    pub module_path: Vec<String>,
    /// The parsed abstract syntax tree
    pub syntax_tree: syn::File,
}

impl ParsedFile {
    /// Parses source text that did not come from disk
    pub fn from_source(path: &Path, source: &str) -> Result<Self> {
        let syntax_tree = syn::parse_file(source)
            .with_context(|| format!("Failed to parse Rust syntax in file: {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            module_path: module_path_of(path),
            syntax_tree,
        })
    }
}

/// Derives the module path from the file location under `src/`.
///
/// Crate roots (`lib.rs`, `main.rs`) and `mod.rs` files name their directory; files
/// outside any `src/` directory are modules named after their stem.
pub fn module_path_of(path: &Path) -> Vec<String> {
    let components: Vec<String> = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    let relative = match components.iter().rposition(|c| c == "src") {
        Some(index) => &components[index + 1..],
        None => &components[components.len().saturating_sub(1)..],
    };

    let mut module_path: Vec<String> = relative
        .iter()
        .map(|segment| segment.strip_suffix(".rs").unwrap_or(segment).to_string())
        .collect();

    if let Some(last) = module_path.last() {
        if matches!(last.as_str(), "lib" | "main" | "mod") {
            module_path.pop();
        }
    }
    module_path
}

impl AstParser {
    /// Parses a single Rust source file into an AST.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read
    /// - The file contains invalid Rust syntax
    pub fn parse_file(path: &Path) -> Result<ParsedFile> {
        debug!("Parsing file: {}", path.display());

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read file: {}", path.display()))?;

        let parsed = ParsedFile::from_source(path, &content)?;

        debug!(
            "Successfully parsed file: {} (module `{}`)",
            path.display(),
            parsed.module_path.join("::")
        );
        Ok(parsed)
    }

    /// Parses multiple Rust source files, continuing even if some fail.
    ///
    /// Files that fail to parse are logged as warnings, but parsing continues for the
    /// remaining files so a broken file elsewhere in the project does not block generation.
    pub fn parse_files(paths: &[PathBuf]) -> Vec<Result<ParsedFile>> {
        debug!("Parsing {} files", paths.len());

        let results: Vec<Result<ParsedFile>> = paths
            .iter()
            .map(|path| match Self::parse_file(path) {
                Ok(parsed) => Ok(parsed),
                Err(e) => {
                    warn!("Failed to parse {}: {}", path.display(), e);
                    Err(e)
                }
            })
            .collect();

        let success_count = results.iter().filter(|r| r.is_ok()).count();
        debug!(
            "Parsing complete: {} succeeded, {} failed",
            success_count,
            results.len() - success_count
        );

        results
    }
}
