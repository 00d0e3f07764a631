//! CLI: schema | build | examples
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use log::{debug, info};

use crate::batch::{self, OutputLayout};
use crate::compile::{CompileSettings, ExportSelector, compile_module};
use crate::config::Config;
use crate::symbols::{SourceSet, SymbolTable, normalize_path};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// compile TypeScript type declarations into draft-07 JSON Schema and example payloads
#[derive(Parser, Debug)]
#[command(name = "decl-schema", version)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,

    /// log filter level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// compile one module into a schema document
    Schema(SchemaOut),
    /// compile every matched module concurrently into an output directory
    Build(BuildOut),
    /// generate example payloads for one module
    Examples(ExamplesOut),
}

#[derive(Args, Debug, Clone, Default)]
struct SharedSettings {
    /// optional fields stay non-nullable (otherwise they are widened with `null`)
    #[arg(long, aliases = ["strictNullChecks", "strictNullChechs"])]
    strict_null_checks: bool,

    /// list every field as required
    #[arg(long)]
    required: bool,

    /// close object schemas with `additionalProperties: false`
    #[arg(long)]
    no_extra_props: bool,

    /// copy unknown annotation tags into the schema
    #[arg(long)]
    extensions: bool,

    /// example generator seed
    #[arg(long)]
    seed: Option<u64>,

    /// JSON configuration file (defaults to ./decl-schema.json when present)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct SchemaOut {
    /// module file, e.g. src/types.ts
    module: PathBuf,

    /// exported type to select, or `*` for every export
    export: Option<String>,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,

    #[command(flatten)]
    settings: SharedSettings,
}

#[derive(Args, Debug)]
struct BuildOut {
    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,

    /// output directory
    #[arg(long, short)]
    dir: PathBuf,

    /// exported type to select in every module
    #[arg(long)]
    export: Option<String>,

    /// also write `<stem>.examples.json`
    #[arg(long)]
    examples: bool,

    #[command(flatten)]
    settings: SharedSettings,
}

#[derive(Args, Debug)]
struct ExamplesOut {
    /// module file, e.g. src/types.ts
    module: PathBuf,

    /// exported type to select, or `*` for every export
    export: Option<String>,

    /// one example per union variant
    #[arg(long)]
    exhaustive: bool,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,

    #[command(flatten)]
    settings: SharedSettings,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl SharedSettings {
    /// Config file values with command-line flags layered on top.
    fn resolve(&self, export: Option<&str>) -> anyhow::Result<CompileSettings> {
        let mut config = Config::discover(self.config.as_deref())?;
        config.strict_null_checks |= self.strict_null_checks;
        config.force_all_required |= self.required;
        config.no_extra_props |= self.no_extra_props;
        config.emit_extensions |= self.extensions;
        if let Some(seed) = self.seed {
            config.examples.seed = seed;
        }
        debug!(config:? = config; "Resolved settings");
        Ok(CompileSettings {
            selector: export.map(ExportSelector::parse).unwrap_or_default(),
            ..config.settings()
        })
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    /// `Ok(false)` when at least one module failed in a batch build.
    pub fn run(&self) -> anyhow::Result<bool> {
        match &self.cmd {
            Command::Schema(target) => {
                let settings = target.settings.resolve(target.export.as_deref())?;
                let (table, module) = load_single_module(&target.module)?;
                let output = compile_module(&table, &module, &settings)?;
                write_or_print(target.out.as_deref(), &output.schema_text())?;
                Ok(true)
            }
            Command::Examples(target) => {
                let settings = CompileSettings {
                    exhaustive: target.exhaustive,
                    ..target.settings.resolve(target.export.as_deref())?
                };
                let (table, module) = load_single_module(&target.module)?;
                let output = compile_module(&table, &module, &settings)?;
                write_or_print(target.out.as_deref(), &output.examples_text())?;
                Ok(true)
            }
            Command::Build(target) => {
                let settings = target.settings.resolve(target.export.as_deref())?;
                let paths = resolve_file_path_patterns(&target.input)?;
                let (table, modules) = load_modules(&paths)?;
                info!(modules = modules.len(), dir:? = target.dir; "Building");
                let layout = OutputLayout { dir: target.dir.clone(), examples: target.examples };
                let report = batch::run(&table, &modules, &settings, &layout);
                eprint!("{}", report.summary());
                Ok(report.is_success())
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn load_single_module(module: &Path) -> anyhow::Result<(SymbolTable, String)> {
    let (table, mut modules) = load_modules(std::slice::from_ref(&module.to_path_buf()))?;
    let module = modules.pop().context("no module given")?;
    Ok((table, module))
}

/// Read the given modules together with every sibling `.ts` file of their
/// directories, so relative imports resolve. Returns the normalized keys of
/// the given modules in input order.
fn load_modules(paths: &[PathBuf]) -> anyhow::Result<(SymbolTable, Vec<String>)> {
    let mut files: Vec<PathBuf> = Vec::new();
    for path in paths {
        if !path.is_file() {
            bail!("module file not found: {}", path.display());
        }
        files.push(path.clone());
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let pattern = format!("{}/*.ts", glob::Pattern::escape(&dir.to_string_lossy()));
        for entry in glob::glob(&pattern)? {
            files.push(entry?);
        }
    }
    files.sort();
    files.dedup();

    let sources = SourceSet::read_files(&files)?;
    debug!(files = sources.len(); "Loaded sources");
    let mut modules: Vec<String> = Vec::new();
    for path in paths {
        let key = normalize_path(&path.to_string_lossy());
        if !modules.contains(&key) {
            modules.push(key);
        }
    }
    Ok((SymbolTable::build(&sources), modules))
}

fn write_or_print(out: Option<&Path>, text: &str) -> anyhow::Result<()> {
    match out {
        Some(out) => {
            if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
            }
            std::fs::write(out, text).with_context(|| format!("writing {}", out.display()))?;
            info!(path:? = out; "Wrote output");
        }
        None => print!("{text}"),
    }
    Ok(())
}

fn resolve_file_path_patterns<I>(patterns: I) -> anyhow::Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                matched_any = true;
                out.push(entry?);
            }
            if !matched_any {
                // an explicit glob that matched nothing is an error
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}
