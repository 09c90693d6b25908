//! XML Typegen
//!
//! Infers a structural schema from sample XML documents and generates data
//! binding code for Go (`encoding/xml` structs or a conversion program),
//! Java (JAXB classes) and Rust (serde structs), without a DTD or XSD.
//!
//! ## Pipeline
//!
//! ```text
//! sources ──► SourceQueue (producer thread, bounded)
//!                │
//!                ▼
//!            Extractor (quick-xml events)
//!                │
//!                ▼
//!            SchemaTree ── TypeInference
//!                │ finalize()
//!                ▼
//!            FinalizedTree ──► Walker ──► Dialect (go | java | rust)
//!                                             │
//!                                             ▼
//!                                      GeneratedOutput ──► write_output
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use xml_typegen::{pipeline, GeneratorConfig, OutputDialect, SourceSpec};
//!
//! let mut config = GeneratorConfig::default();
//! config.output.dialect = Some(OutputDialect::Go);
//! config.inference.use_types = true;
//!
//! let generation = pipeline::run(&config, vec![SourceSpec::inline("a.xml", "<a x=\"1\"/>")])?;
//! print!("{}", generation.output.files[0].contents);
//! # Ok::<(), xml_typegen::TypegenError>(())
//! ```

pub mod codegen;
pub mod config;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod source;
pub mod tree;

pub use codegen::{generate, Declaration, Dialect, Field, FieldKind, FieldType, GeneratedFile, GeneratedOutput, Walker};
pub use config::{DeclarationOrder, GeneratorConfig, OutputDialect};
pub use error::{Result, TypegenError};
pub use extract::{ExtractStats, Extractor};
pub use source::{expand_paths, PreparedSource, SourceQueue, SourceSpec};
pub use tree::{
    ElementNode, FinalizedTree, IgnoreSet, NodeKey, QualifiedName, SchemaModel, SchemaTree, TypeInference,
    ValueType,
};
