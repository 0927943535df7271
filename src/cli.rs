use crate::options::Options;
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{debug, info};
use std::path::PathBuf;

/// OpenAPI from Interface - Generate OpenAPI documents from Rust interface traits
#[derive(Parser, Debug)]
#[command(name = "openapi-from-interface")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to the Rust project (or source) directory
    #[arg(value_name = "PROJECT_PATH")]
    pub project_path: PathBuf,

    /// Interface (trait) to document; repeat to select several (default: all traits)
    #[arg(short = 'i', long = "interface", value_name = "TRAIT")]
    pub interfaces: Vec<String>,

    /// YAML file with generation options (info, servers, security, status codes)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config_path: Option<PathBuf>,

    /// Output format (yaml or json)
    #[arg(short = 'f', long = "format", value_enum, default_value = "yaml")]
    pub output_format: OutputFormat,

    /// Output file path (if not specified, outputs to stdout)
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output_path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

/// Output format options
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// YAML format
    Yaml,
    /// JSON format
    Json,
}

/// Parse command line arguments
pub fn parse_args() -> Result<CliArgs> {
    let args = CliArgs::parse();
    parse_args_from_parsed(args)
}

/// Validate and log already-parsed arguments
pub fn parse_args_from_parsed(args: CliArgs) -> Result<CliArgs> {
    debug!("Parsed arguments: {:?}", args);

    if !args.project_path.exists() {
        anyhow::bail!(
            "Project path does not exist: {}",
            args.project_path.display()
        );
    }

    if !args.project_path.is_dir() {
        anyhow::bail!(
            "Project path is not a directory: {}",
            args.project_path.display()
        );
    }

    if let Some(config) = &args.config_path {
        if !config.is_file() {
            anyhow::bail!("Config file does not exist: {}", config.display());
        }
    }

    info!("Project path: {}", args.project_path.display());
    info!("Output format: {:?}", args.output_format);
    if let Some(ref output) = args.output_path {
        info!("Output file: {}", output.display());
    } else {
        info!("Output: stdout");
    }
    if args.interfaces.is_empty() {
        info!("Interfaces: all");
    } else {
        info!("Interfaces: {}", args.interfaces.join(", "));
    }

    Ok(args)
}

/// Run the main workflow
pub fn run(args: CliArgs) -> Result<()> {
    use crate::introspect::introspect;
    use crate::openapi_builder::assemble;
    use crate::parser::{AstParser, ParsedFile};
    use crate::scanner::FileScanner;
    use crate::serializer::{serialize_json, serialize_yaml, write_to_file};

    info!("Starting OpenAPI document generation...");

    // Step 1: Load generation options
    let options = match &args.config_path {
        Some(path) => {
            info!("Loading options from {}", path.display());
            Options::from_file(path)
                .with_context(|| format!("Failed to load options from {}", path.display()))?
        }
        None => Options::default(),
    };

    // Step 2: Scan directory for Rust files
    info!("Scanning project directory...");
    let scanner = FileScanner::new(args.project_path.clone());
    let scan_result = scanner.scan()?;

    info!("Found {} Rust files", scan_result.rust_files.len());
    for warning in &scan_result.warnings {
        log::warn!("{}", warning);
    }

    if scan_result.rust_files.is_empty() {
        anyhow::bail!("No Rust files found in the project directory");
    }

    // Step 3: Parse files into AST
    info!("Parsing Rust files...");
    let parsed_files: Vec<ParsedFile> = AstParser::parse_files(&scan_result.rust_files)
        .into_iter()
        .filter_map(|r| match r {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                debug!("Skipping file due to parse error: {}", e);
                None
            }
        })
        .collect();

    info!("Successfully parsed {} files", parsed_files.len());

    if parsed_files.is_empty() {
        anyhow::bail!("No files could be parsed successfully");
    }

    // Step 4: Introspect interfaces and types
    info!("Introspecting interfaces and types...");
    let introspection = introspect(&parsed_files)?;
    let interfaces = introspection.select(&args.interfaces)?;

    if interfaces.is_empty() {
        log::warn!("No interfaces with members found in the project");
    }
    let member_count: usize = interfaces.iter().map(|i| i.members.len()).sum();

    // Step 5: Build OpenAPI document
    info!("Building OpenAPI document...");
    let document = assemble(&interfaces, introspection.catalog, options)
        .context("Failed to build OpenAPI document")?;
    info!("OpenAPI document built successfully");

    // Step 6: Serialize to requested format
    info!("Serializing to {:?} format...", args.output_format);
    let content = match args.output_format {
        OutputFormat::Yaml => serialize_yaml(&document)?,
        OutputFormat::Json => serialize_json(&document)?,
    };

    // Step 7: Output to file or stdout
    if let Some(output_path) = &args.output_path {
        info!("Writing output to: {}", output_path.display());
        write_to_file(&content, output_path)?;
        info!("Successfully wrote OpenAPI document to {}", output_path.display());
    } else {
        println!("{}", content);
    }

    info!("Generation complete!");
    info!("Summary:");
    info!("  - Files scanned: {}", scan_result.rust_files.len());
    info!("  - Files parsed: {}", parsed_files.len());
    info!("  - Interfaces: {}", interfaces.len());
    info!("  - Operations: {}", member_count);
    info!(
        "  - Component schemas: {}",
        document.components.as_ref().map_or(0, |c| c.schemas.len())
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_project(root: &std::path::Path) {
        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(
            root.join("src/lib.rs"),
            r#"
            pub struct Job { pub id: uuid::Uuid, pub name: String }

            /// Jobs.
            pub trait Jobs {
                fn get_job(&self, #[path] job_id: uuid::Uuid) -> Job;
            }

            pub trait Hidden {
                fn get_secret(&self) -> String;
            }
            "#,
        )
        .unwrap();
    }

    #[test]
    fn test_cli_arguments() {
        let args = CliArgs::try_parse_from([
            "openapi-from-interface",
            "./service",
            "-i",
            "Jobs",
            "--interface",
            "People",
            "-c",
            "options.yaml",
            "-f",
            "json",
            "-o",
            "out/openapi.json",
            "-v",
        ])
        .unwrap();

        assert_eq!(args.project_path, PathBuf::from("./service"));
        assert_eq!(args.interfaces, vec!["Jobs".to_string(), "People".to_string()]);
        assert_eq!(args.config_path, Some(PathBuf::from("options.yaml")));
        assert!(matches!(args.output_format, OutputFormat::Json));
        assert!(args.verbose);
    }

    #[test]
    fn test_missing_project_path_is_rejected() {
        let args = CliArgs::try_parse_from(["openapi-from-interface", "/nonexistent/project"]).unwrap();
        let err = parse_args_from_parsed(args).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_run_writes_selected_interface() {
        let temp_dir = TempDir::new().unwrap();
        write_project(temp_dir.path());
        let config = temp_dir.path().join("options.yaml");
        fs::write(&config, "info:\n  title: Jobs API\n  version: 2.0.0\n").unwrap();
        let output = temp_dir.path().join("out/openapi.json");

        let args = CliArgs::try_parse_from([
            "openapi-from-interface",
            temp_dir.path().to_str().unwrap(),
            "-i",
            "Jobs",
            "-c",
            config.to_str().unwrap(),
            "-f",
            "json",
            "-o",
            output.to_str().unwrap(),
        ])
        .unwrap();
        run(parse_args_from_parsed(args).unwrap()).unwrap();

        let document: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(document["info"]["title"], "Jobs API");
        assert!(document["paths"]["/job/{job_id}"]["get"].is_object());
        assert!(document["paths"]["/secret"].is_null());
    }
}
