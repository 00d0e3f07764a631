//! Batch driver: compile many modules concurrently and write their outputs.
//!
//! Modules share only the read-only symbol table. A module's failure is
//! recorded in the report and never stops its siblings.
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use colored::Colorize;
use log::{error, info};
use rayon::prelude::*;

use crate::compile::{CompileOutput, CompileSettings, compile_module};
use crate::error::{CompileError, Result};
use crate::symbols::{SymbolTable, module_stem};

/// Where and what to write for each module.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    pub dir: PathBuf,
    pub examples: bool,
}

impl OutputLayout {
    /// `<dir>/<stem>.json` for `src/common.ts`-style module paths.
    pub fn schema_path(&self, module: &str) -> PathBuf {
        self.dir.join(format!("{}.json", module_stem(module)))
    }

    pub fn examples_path(&self, module: &str) -> PathBuf {
        self.dir.join(format!("{}.examples.json", module_stem(module)))
    }
}

#[derive(Debug)]
pub struct ModuleReport {
    pub module: String,
    /// Written files on success.
    pub outcome: Result<Vec<PathBuf>>,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub modules: Vec<ModuleReport>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.modules.iter().all(|m| m.outcome.is_ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &CompileError)> {
        self.modules.iter().filter_map(|m| m.outcome.as_ref().err().map(|e| (m.module.as_str(), e)))
    }

    /// One line per module plus a totals line.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        for m in &self.modules {
            match &m.outcome {
                Ok(paths) => {
                    let written: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
                    let _ = writeln!(out, "{} {} → {}", "ok".green().bold(), m.module, written.join(", "));
                }
                Err(e) => {
                    let _ = writeln!(out, "{} {} [{}] {}", "FAILED".red().bold(), m.module, e.kind(), e);
                }
            }
        }
        let failed = self.failures().count();
        let line = format!("{} module(s), {} failed", self.modules.len(), failed);
        let _ = writeln!(out, "{}", if failed == 0 { line.as_str().green() } else { line.as_str().red() });
        out
    }
}

/// Run the per-module pipeline on the rayon pool; results keep input order.
pub fn compile_all(
    table: &SymbolTable,
    modules: &[String],
    settings: &CompileSettings,
) -> Vec<(String, Result<CompileOutput>)> {
    modules
        .par_iter()
        .map(|module| {
            let result = compile_module(table, module, settings);
            match &result {
                Ok(_) => info!(module = module.as_str(); "Compiled"),
                Err(e) => error!(module = module.as_str(), kind = e.kind(); "{e}"),
            }
            (module.clone(), result)
        })
        .collect()
}

/// Create the output directory, then write every successful module in parallel.
///
/// Output names are claimed in input order: a module whose stem was already
/// claimed by an earlier one fails instead of overwriting its files.
pub fn write_outputs(results: Vec<(String, Result<CompileOutput>)>, layout: &OutputLayout) -> BatchReport {
    // barrier: nothing is written before the directory exists
    let barrier = std::fs::create_dir_all(&layout.dir).map_err(|e| CompileError::io(&layout.dir, e));

    let mut claimed: HashMap<String, String> = HashMap::new();
    let results: Vec<(String, Result<CompileOutput>)> = results
        .into_iter()
        .map(|(module, result)| {
            let result = result.and_then(|output| match claimed.get(module_stem(&module)) {
                Some(first) => {
                    error!(module = module.as_str(), first = first.as_str(); "Output name already taken");
                    Err(CompileError::Io {
                        path: layout.schema_path(&module),
                        message: format!("output already claimed by `{first}`"),
                    })
                }
                None => {
                    claimed.insert(module_stem(&module).to_string(), module.clone());
                    Ok(output)
                }
            });
            (module, result)
        })
        .collect();

    let modules = results
        .into_par_iter()
        .map(|(module, result)| {
            let outcome = match (&barrier, result) {
                (Err(e), _) => Err(e.clone()),
                (Ok(()), Ok(output)) => write_module(&module, &output, layout),
                (Ok(()), Err(e)) => Err(e),
            };
            ModuleReport { module, outcome }
        })
        .collect();
    BatchReport { modules }
}

fn write_module(module: &str, output: &CompileOutput, layout: &OutputLayout) -> Result<Vec<PathBuf>> {
    let mut written = vec![write_file(&layout.schema_path(module), &output.schema_text())?];
    if layout.examples {
        written.push(write_file(&layout.examples_path(module), &output.examples_text())?);
    }
    Ok(written)
}

fn write_file(path: &Path, text: &str) -> Result<PathBuf> {
    std::fs::write(path, text).map_err(|e| CompileError::io(path, e))?;
    Ok(path.to_path_buf())
}

/// [`compile_all`] followed by [`write_outputs`].
pub fn run(table: &SymbolTable, modules: &[String], settings: &CompileSettings, layout: &OutputLayout) -> BatchReport {
    write_outputs(compile_all(table, modules, settings), layout)
}
