//! OpenAPI from Interface - OpenAPI 3 documents from Rust interface traits.
//!
//! An interface is a trait whose methods describe remote operations. Each method becomes
//! one operation: the HTTP verb is inferred from the method name prefix (`get_`,
//! `create_`, `update_`, ...), simple parameters become path or query parameters, a
//! structured parameter becomes the JSON request body, and the return type becomes the
//! success response. Documentation comments supply summaries, parameter descriptions and
//! the error types an operation may raise.
//!
//! # Architecture
//!
//! The generation engine works on plain descriptors and knows nothing about Rust syntax:
//!
//! 1. [`descriptor`] - Type, member and interface descriptors plus the [`descriptor::TypeCatalog`]
//! 2. [`schema_generator`] - Resolves descriptors to JSON Schema fragments
//! 3. [`registry`] - Decides which named types become shared components and which are inlined
//! 4. [`docstring`] - Parses `:param:`/`:returns:`/`:raises:` documentation
//! 5. [`operation`] - Synthesizes one OpenAPI operation per member
//! 6. [`openapi_builder`] - Assembles operations, components, security and tags
//! 7. [`serializer`] - Serializes the document to YAML or JSON
//!
//! The front end builds those descriptors from source code:
//!
//! 1. [`scanner`] - Recursively scans project directories for Rust files
//! 2. [`parser`] - Parses Rust source files into Abstract Syntax Trees (AST)
//! 3. [`introspect`] - Turns traits into interfaces and type declarations into catalog entries
//!
//! # Example Usage
//!
//! ```no_run
//! use openapi_from_interface::{
//!     scanner::FileScanner,
//!     parser::AstParser,
//!     introspect::introspect,
//!     openapi_builder::assemble,
//!     options::Options,
//!     serializer::serialize_yaml,
//! };
//! use std::path::PathBuf;
//!
//! // Scan and parse the project
//! let scan_result = FileScanner::new(PathBuf::from("./my-service")).scan().unwrap();
//! let parsed_files: Vec<_> = AstParser::parse_files(&scan_result.rust_files)
//!     .into_iter()
//!     .filter_map(Result::ok)
//!     .collect();
//!
//! // Collect interfaces and types
//! let introspection = introspect(&parsed_files).unwrap();
//! let interfaces = introspection.select(&["JobManagement".to_string()]).unwrap();
//!
//! // Build and serialize the document
//! let document = assemble(&interfaces, introspection.catalog, Options::default()).unwrap();
//! println!("{}", serialize_yaml(&document).unwrap());
//! ```
//!
//! Descriptors can also be built by hand, without any source code:
//!
//! ```
//! use openapi_from_interface::descriptor::{
//!     CompositeType, Field, InterfaceDescriptor, MemberDescriptor, ParameterDescriptor,
//!     PrimitiveKind, TypeCatalog, TypeDescriptor,
//! };
//! use openapi_from_interface::{openapi_builder::assemble, options::Options};
//!
//! let catalog = TypeCatalog::new().with(
//!     CompositeType::new("Job").field(Field::new("name", TypeDescriptor::string())),
//! );
//! let jobs = InterfaceDescriptor::new("JobManagement").member(
//!     MemberDescriptor::new("get_job", TypeDescriptor::named("Job"))
//!         .param(ParameterDescriptor::path("job_id", TypeDescriptor::primitive(PrimitiveKind::Uuid))),
//! );
//!
//! let document = assemble(&[jobs], catalog, Options::default()).unwrap();
//! assert!(document.paths.contains_key("/job/{job_id}"));
//! ```
//!
//! # Command-Line Interface
//!
//! For command-line usage, see the [`cli`] module which provides a complete CLI application.

pub mod cli;
pub mod scanner;
pub mod parser;
pub mod introspect;
pub mod descriptor;
pub mod schema_generator;
pub mod registry;
pub mod docstring;
pub mod example;
pub mod operation;
pub mod specification;
pub mod options;
pub mod openapi_builder;
pub mod serializer;
pub mod error;
