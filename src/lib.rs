//! Compile TypeScript type declarations into draft-07 JSON Schema documents
//! and matching example payloads.
//!
//! The pipeline per module is
//! [`syntax`] → [`symbols`] → [`lower`] → [`policy`] → [`emit`] → [`sample`];
//! [`compile`] runs it for one module and [`batch`] for many in parallel.
pub mod annotation;
pub mod batch;
pub mod cli;
pub mod compile;
pub mod config;
pub mod emit;
pub mod error;
pub mod ir;
pub mod lower;
pub mod policy;
pub mod sample;
pub mod symbols;
pub mod syntax;

pub use compile::{CompileOutput, CompileRequest, CompileSettings, ExportSelector, compile, compile_module};
pub use error::{CompileError, Result};
pub use symbols::{SourceSet, SymbolTable};
