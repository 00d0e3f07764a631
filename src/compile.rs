//! Front API: one module in, one schema document and its examples out.
use std::path::PathBuf;

use log::debug;
use serde_json::Value;

use crate::emit::{self, EmitOptions};
use crate::error::{CompileError, Result};
use crate::lower;
use crate::policy::RequiredPolicy;
use crate::sample::{Examples, SampleOptions, Sampler};
use crate::symbols::{SourceSet, SymbolTable};

pub use crate::lower::ExportSelector;

/// Everything that shapes one module's output besides its source text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompileSettings {
    pub selector: ExportSelector,
    pub policy: RequiredPolicy,
    pub emit: EmitOptions,
    pub sample: SampleOptions,
    /// One example per union variant instead of one per export.
    pub exhaustive: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CompileRequest {
    pub sources: SourceSet,
    pub entry_module: String,
    pub export_selector: ExportSelector,
    pub strict_null_checks: bool,
    pub force_all_required: bool,
    /// Where the caller intends to store the schema document.
    pub output_path: Option<PathBuf>,
    pub emit: EmitOptions,
    pub sample: SampleOptions,
}

impl CompileRequest {
    pub fn settings(&self) -> CompileSettings {
        CompileSettings {
            selector: self.export_selector.clone(),
            policy: RequiredPolicy {
                strict_null_checks: self.strict_null_checks,
                force_all_required: self.force_all_required,
            },
            emit: self.emit,
            sample: self.sample.clone(),
            exhaustive: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompileOutput {
    pub schema: Value,
    pub examples: Examples,
}

impl CompileOutput {
    pub fn schema_text(&self) -> String {
        emit::to_pretty_json(&self.schema)
    }

    pub fn examples_text(&self) -> String {
        emit::to_pretty_json(&serde_json::to_value(&self.examples).unwrap_or_default())
    }
}

/// Build the module graph from `request.sources` and compile the entry module.
/// Nothing is written; persisting the output is up to the caller.
pub fn compile(request: &CompileRequest) -> Result<CompileOutput> {
    let table = SymbolTable::build(&request.sources);
    compile_module(&table, &request.entry_module, &request.settings())
}

/// resolve → policy → emit → sample for one module of an already built table.
pub fn compile_module(table: &SymbolTable, module: &str, settings: &CompileSettings) -> Result<CompileOutput> {
    let id = table.check_module(module)?;
    let resolved = lower::resolve_module(table, id, &settings.selector)?;
    let decided = settings.policy.apply(&resolved);
    let schema = emit::emit_document(&decided, &settings.emit)?;

    let mut sampler = Sampler::new(&decided, settings.sample.clone());
    let examples = if settings.exhaustive {
        sampler.enumerate_exports()?
    } else {
        sampler.sample_exports()?
    };
    debug!(
        module = module,
        definitions = schema["definitions"].as_object().map_or(0, |d| d.len()),
        examples = examples.values().map(Vec::len).sum::<usize>();
        "Compiled module"
    );
    Ok(CompileOutput { schema, examples })
}
