//! OpenAPI from Interface - Command-line tool for generating OpenAPI documents.
//!
//! Scans a Rust project for interface traits and the types they use, then emits an
//! OpenAPI 3 document describing one operation per trait method.
//!
//! # Usage
//!
//! ```bash
//! openapi-from-interface [OPTIONS] <PROJECT_PATH>
//! ```
//!
//! # Examples
//!
//! Generate YAML documentation for every trait:
//! ```bash
//! openapi-from-interface ./my-service -o openapi.yaml
//! ```
//!
//! Document selected traits as JSON, with options from a file:
//! ```bash
//! openapi-from-interface ./my-service -i JobManagement -i PeopleCatalog -c openapi.options.yaml -f json
//! ```
//!
//! Enable verbose logging:
//! ```bash
//! openapi-from-interface ./my-service -v
//! ```

use anyhow::Result;
use clap::Parser;
use log::info;
use openapi_from_interface::cli;

fn main() -> Result<()> {
    // Parse once up front so the verbose flag can configure the logger
    let args = cli::CliArgs::parse();

    let log_level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    info!("OpenAPI from Interface starting...");

    let args = cli::parse_args_from_parsed(args)?;
    cli::run(args)?;

    info!("OpenAPI document generation completed successfully");

    Ok(())
}
