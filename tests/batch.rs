mod common;

use std::path::{Path, PathBuf};

use serde_json::Value;

use common::{COMMON, RESPONSES, validate_definition};
use decl_schema::batch::{self, OutputLayout};
use decl_schema::{CompileSettings, SourceSet, SymbolTable};

fn write_tree(root: &Path, files: &[(&str, &str)]) -> Vec<PathBuf> {
    files
        .iter()
        .map(|(name, text)| {
            let path = root.join(name);
            std::fs::write(&path, text).unwrap();
            path
        })
        .collect()
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn builds_every_module_and_isolates_failures() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let paths = write_tree(
        src.path(),
        &[
            ("common.ts", COMMON),
            ("responses.ts", RESPONSES),
            ("broken.ts", "export interface Broken { /** @format uuid\n@pattern ^[0-9]{3}$ */ id: string }"),
        ],
    );
    let sources = SourceSet::read_files(&paths).unwrap();
    let table = SymbolTable::build(&sources);
    let modules: Vec<String> = sources.paths().map(String::from).collect();
    let layout = OutputLayout { dir: out.path().join("schemas"), examples: true };

    let report = batch::run(&table, &modules, &CompileSettings::default(), &layout);

    assert!(!report.is_success());
    let failed: Vec<_> = report.failures().map(|(m, e)| (m.to_string(), e.kind())).collect();
    assert_eq!(failed.len(), 1);
    assert!(failed[0].0.ends_with("broken.ts"));
    assert_eq!(failed[0].1, "ConflictingConstraintError");

    for stem in ["common", "responses"] {
        let schema = read_json(&layout.dir.join(format!("{stem}.json")));
        let examples = read_json(&layout.dir.join(format!("{stem}.examples.json")));
        for (name, values) in examples.as_object().unwrap() {
            for value in values.as_array().unwrap() {
                validate_definition(&schema, name, value).unwrap();
            }
        }
    }
    assert!(!layout.dir.join("broken.json").exists());
}

#[test]
fn written_outputs_are_stable_across_runs() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let paths = write_tree(src.path(), &[("common.ts", COMMON), ("responses.ts", RESPONSES)]);
    let sources = SourceSet::read_files(&paths).unwrap();
    let table = SymbolTable::build(&sources);
    let modules: Vec<String> = sources.paths().map(String::from).collect();
    let layout = OutputLayout { dir: out.path().to_path_buf(), examples: false };

    let first = batch::run(&table, &modules, &CompileSettings::default(), &layout);
    assert!(first.is_success(), "{}", first.summary());
    let before = std::fs::read_to_string(out.path().join("responses.json")).unwrap();
    let second = batch::run(&table, &modules, &CompileSettings::default(), &layout);
    assert!(second.is_success());
    assert_eq!(std::fs::read_to_string(out.path().join("responses.json")).unwrap(), before);
    assert!(!out.path().join("responses.examples.json").exists());
}
