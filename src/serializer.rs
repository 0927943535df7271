//! Serialization module for converting OpenAPI documents to YAML or JSON format.
//!
//! This module provides functions to serialize OpenAPI documents into standard formats
//! and write them to files or return them as strings.

use crate::specification::OpenApiDocument;
use anyhow::{Context, Result};
use log::debug;
use std::fs;
use std::path::Path;

/// Serializes an OpenAPI document to YAML format.
///
/// Key order follows the document model, so repeated runs over the same sources
/// produce byte-identical output.
///
/// # Example
///
/// ```no_run
/// use openapi_from_interface::descriptor::TypeCatalog;
/// use openapi_from_interface::openapi_builder::assemble;
/// use openapi_from_interface::options::Options;
/// use openapi_from_interface::serializer::serialize_yaml;
///
/// let document = assemble(&[], TypeCatalog::new(), Options::default()).unwrap();
/// println!("{}", serialize_yaml(&document).unwrap());
/// ```
pub fn serialize_yaml(doc: &OpenApiDocument) -> Result<String> {
    debug!("Serializing OpenAPI document to YAML");
    serde_yaml::to_string(doc).context("Failed to serialize OpenAPI document to YAML")
}

/// Serializes an OpenAPI document to JSON format with pretty printing.
pub fn serialize_json(doc: &OpenApiDocument) -> Result<String> {
    debug!("Serializing OpenAPI document to JSON");
    serde_json::to_string_pretty(doc).context("Failed to serialize OpenAPI document to JSON")
}

/// Writes string content to a file.
///
/// Creates the file and any missing parent directories, or overwrites an existing file.
///
/// # Errors
///
/// Returns an error if a directory or the file cannot be created or written to.
pub fn write_to_file(content: &str, path: &Path) -> Result<()> {
    debug!("Writing content to file: {}", path.display());

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    fs::write(path, content)
        .with_context(|| format!("Failed to write to file: {}", path.display()))?;

    debug!("Successfully wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}
