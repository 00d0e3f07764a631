//! Symbol table: an arena of named type declarations across a module graph.
//!
//! Every declaration of every provided module becomes one [`TypeSymbol`],
//! addressed by [`SymbolId`]. Each module gets a scope mapping visible names
//! (locals and imports) to ids. Errors are recorded per module so a broken
//! module never prevents its siblings from building; callers ask
//! [`SymbolTable::check_module`] before compiling a module.
use std::collections::VecDeque;
use std::path::Path;

use indexmap::IndexMap;
use log::{debug, trace};

use crate::annotation::ConstraintRecord;
use crate::error::{CompileError, Result};
use crate::syntax::{self, DeclKind, TypeExpr, TypeParam};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(usize);

#[derive(Debug, Clone, PartialEq)]
pub struct TypeSymbol {
    pub id: SymbolId,
    pub name: String,
    pub kind: DeclKind,
    pub module: ModuleId,
    pub exported: bool,
    pub type_params: Vec<TypeParam>,
    pub extends: Vec<TypeExpr>,
    pub definition: TypeExpr,
    pub constraints: ConstraintRecord,
}

impl TypeSymbol {
    /// A parameter with neither a default nor a constraint leaves the body
    /// open; constrained parameters stand for their constraint.
    pub fn needs_type_arguments(&self) -> bool {
        self.type_params.iter().any(|p| p.default.is_none() && p.constraint.is_none())
    }
}

#[derive(Debug, Clone)]
pub struct ModuleScope {
    pub path: String,
    names: IndexMap<String, SymbolId>,
    exports: Vec<SymbolId>,
    imports_from: Vec<ModuleId>,
    error: Option<CompileError>,
}

impl ModuleScope {
    pub fn error(&self) -> Option<&CompileError> {
        self.error.as_ref()
    }

    fn fail(&mut self, error: CompileError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }
}

// ------------------------------ Source set -------------------------------- //

/// Module texts keyed by normalized path. The table never touches the filesystem.
#[derive(Debug, Clone, Default)]
pub struct SourceSet {
    modules: IndexMap<String, String>,
}

impl SourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module; returns the normalized key it is stored under.
    pub fn insert(&mut self, path: impl AsRef<str>, text: impl Into<String>) -> String {
        let key = normalize_path(path.as_ref());
        self.modules.insert(key.clone(), text.into());
        key
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.modules.get(&normalize_path(path)).map(String::as_str)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.modules.contains_key(&normalize_path(path))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.modules.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Read module files from disk.
    pub fn read_files<P: AsRef<Path>>(paths: impl IntoIterator<Item = P>) -> Result<Self> {
        let mut out = Self::new();
        for path in paths {
            let path = path.as_ref();
            let text = std::fs::read_to_string(path).map_err(|e| CompileError::io(path, e))?;
            out.insert(path.to_string_lossy(), text);
        }
        Ok(out)
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for SourceSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut out = Self::new();
        for (k, v) in iter {
            out.insert(k, v);
        }
        out
    }
}

/// Lexical path normalization: forward slashes, no `.` segments, `..` folded.
pub fn normalize_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for seg in path.split('/') {
        match seg {
            "" | "." => {}
            ".." => match parts.last() {
                Some(&last) if last != ".." => {
                    parts.pop();
                }
                _ if absolute => {}
                _ => parts.push(".."),
            },
            seg => parts.push(seg),
        }
    }
    let joined = parts.join("/");
    if absolute { format!("/{joined}") } else { joined }
}

/// File name without its `.ts` / `.d.ts` extension.
pub fn module_stem(path: &str) -> &str {
    let file = path.rsplit('/').next().unwrap_or(path);
    file.strip_suffix(".d.ts")
        .or_else(|| file.strip_suffix(".ts"))
        .unwrap_or(file)
}

fn parent_dir(path: &str) -> &str {
    path.rfind('/').map_or("", |i| &path[..i])
}

/// Candidate module keys for an import specifier, most specific first.
fn specifier_candidates(importer: &str, spec: &str) -> Vec<String> {
    if !(spec.starts_with("./") || spec.starts_with("../") || spec.starts_with('/')) {
        return Vec::new();
    }
    let base = if spec.starts_with('/') {
        normalize_path(spec)
    } else {
        normalize_path(&format!("{}/{}", parent_dir(importer), spec))
    };
    let stem = base.strip_suffix(".js").unwrap_or(&base);
    vec![
        base.clone(),
        format!("{stem}.ts"),
        format!("{stem}.d.ts"),
        format!("{stem}/index.ts"),
    ]
}

// ------------------------------ Symbol table ------------------------------ //

#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    symbols: Vec<TypeSymbol>,
    modules: IndexMap<String, ModuleScope>,
}

impl SymbolTable {
    /// Parse and declare every module, then bind imports.
    pub fn build(sources: &SourceSet) -> Self {
        let mut table = SymbolTable::default();
        let mut pending_imports = Vec::with_capacity(sources.len());

        // pass 1: declarations
        for (path, text) in sources.iter() {
            let module = ModuleId(table.modules.len());
            let mut scope = ModuleScope {
                path: path.to_string(),
                names: IndexMap::new(),
                exports: Vec::new(),
                imports_from: Vec::new(),
                error: None,
            };
            let imports = match syntax::parse_module(path, text) {
                Ok(ast) => {
                    for decl in ast.decls {
                        if scope.names.contains_key(&decl.name) {
                            scope.fail(CompileError::DuplicateSymbol {
                                module: path.to_string(),
                                name: decl.name.clone(),
                            });
                            continue;
                        }
                        let id = SymbolId(table.symbols.len());
                        scope.names.insert(decl.name.clone(), id);
                        if decl.exported {
                            scope.exports.push(id);
                        }
                        table.symbols.push(TypeSymbol {
                            id,
                            name: decl.name,
                            kind: decl.kind,
                            module,
                            exported: decl.exported,
                            type_params: decl.type_params,
                            extends: decl.extends,
                            definition: decl.body,
                            constraints: decl.constraints,
                        });
                    }
                    ast.imports
                }
                Err(error) => {
                    scope.fail(error);
                    Vec::new()
                }
            };
            debug!(module = path, symbols = scope.names.len(); "Declared module");
            pending_imports.push(imports);
            table.modules.insert(path.to_string(), scope);
        }

        // pass 2: imports
        for (index, imports) in pending_imports.into_iter().enumerate() {
            for import in imports {
                table.bind_import(ModuleId(index), &import);
            }
        }
        table
    }

    fn bind_import(&mut self, module: ModuleId, import: &syntax::Import) {
        let path = self.modules[module.0].path.clone();
        let target = specifier_candidates(&path, &import.from)
            .into_iter()
            .find_map(|key| self.modules.get_index_of(&key))
            .map(ModuleId);

        for name in &import.names {
            let unresolved = || CompileError::UnresolvedImport {
                module: path.clone(),
                name: name.imported.clone(),
                from: import.from.clone(),
            };
            let found = target.and_then(|t| {
                let scope = &self.modules[t.0];
                scope
                    .exports
                    .iter()
                    .copied()
                    .find(|id| self.symbols[id.0].name == name.imported)
                    .map(|id| (t, id))
            });
            let scope = &mut self.modules[module.0];
            match found {
                None => scope.fail(unresolved()),
                Some(_) if scope.names.contains_key(&name.local) => scope.fail(CompileError::DuplicateSymbol {
                    module: path.clone(),
                    name: name.local.clone(),
                }),
                Some((t, id)) => {
                    trace!(module = path.as_str(), name = name.local.as_str(); "Bound import");
                    scope.names.insert(name.local.clone(), id);
                    if !scope.imports_from.contains(&t) {
                        scope.imports_from.push(t);
                    }
                }
            }
        }
    }

    pub fn module_id(&self, path: &str) -> Option<ModuleId> {
        self.modules.get_index_of(&normalize_path(path)).map(ModuleId)
    }

    pub fn module(&self, id: ModuleId) -> &ModuleScope {
        &self.modules[id.0]
    }

    pub fn module_paths(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    pub fn symbol(&self, id: SymbolId) -> &TypeSymbol {
        &self.symbols[id.0]
    }

    pub fn symbols(&self) -> &[TypeSymbol] {
        &self.symbols
    }

    /// Resolve a name as seen from inside `module` (locals and imports).
    pub fn lookup(&self, module: ModuleId, name: &str) -> Option<SymbolId> {
        self.modules[module.0].names.get(name).copied()
    }

    /// Exported declarations of a module, in declaration order.
    pub fn exports(&self, module: ModuleId) -> impl Iterator<Item = &TypeSymbol> {
        self.modules[module.0].exports.iter().map(|id| &self.symbols[id.0])
    }

    pub fn export(&self, module: ModuleId, name: &str) -> Option<&TypeSymbol> {
        self.exports(module).find(|s| s.name == name)
    }

    /// Constraint record keyed by `(owner, field)`; `field = None` is the type itself.
    pub fn constraints(&self, owner: SymbolId, field: Option<&str>) -> Option<&ConstraintRecord> {
        let symbol = self.symbol(owner);
        match field {
            None => Some(&symbol.constraints),
            Some(field) => match &symbol.definition {
                TypeExpr::Object(members) => members.iter().find(|m| m.name == field).map(|m| &m.constraints),
                _ => None,
            },
        }
    }

    /// First error of `path` or of any module it imports, transitively.
    pub fn check_module(&self, path: &str) -> Result<ModuleId> {
        let entry = self
            .module_id(path)
            .ok_or_else(|| CompileError::UnknownModule(path.to_string()))?;
        let mut seen = vec![entry];
        let mut queue = VecDeque::from([entry]);
        while let Some(id) = queue.pop_front() {
            let scope = &self.modules[id.0];
            if let Some(error) = &scope.error {
                return Err(error.clone());
            }
            for dep in &scope.imports_from {
                if !seen.contains(dep) {
                    seen.push(*dep);
                    queue.push_back(*dep);
                }
            }
        }
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(files: &[(&str, &str)]) -> SymbolTable {
        SymbolTable::build(&files.iter().copied().collect())
    }

    #[test]
    fn normalizes_paths() {
        assert_eq!(normalize_path("./src/../src/common.ts"), "src/common.ts");
        assert_eq!(normalize_path("src\\a\\..\\b.ts"), "src/b.ts");
        assert_eq!(normalize_path("../x.ts"), "../x.ts");
        assert_eq!(normalize_path("/a/./b/../c.ts"), "/a/c.ts");
    }

    #[test]
    fn resolves_imports_across_modules() {
        let t = table(&[
            ("src/common.ts", "export type JWT = string\ntype Hidden = number"),
            ("src/responses.ts", "import { JWT as Token } from './common'\nexport type R = { t: Token }"),
        ]);
        let responses = t.check_module("src/responses.ts").unwrap();
        let id = t.lookup(responses, "Token").unwrap();
        assert_eq!(t.symbol(id).name, "JWT");
        assert_eq!(t.exports(responses).count(), 1);
        assert!(t.lookup(t.module_id("src/common.ts").unwrap(), "Hidden").is_some());
    }

    #[test]
    fn missing_import_is_unresolved() {
        let t = table(&[
            ("src/common.ts", "export type A = string\ntype Local = string"),
            ("src/x.ts", "import { Local } from './common'\nexport type B = Local"),
            ("src/y.ts", "import { A } from './nowhere'\nexport type C = A"),
        ]);
        assert_eq!(
            t.check_module("src/x.ts").unwrap_err(),
            CompileError::UnresolvedImport { module: "src/x.ts".into(), name: "Local".into(), from: "./common".into() }
        );
        assert_eq!(t.check_module("src/y.ts").unwrap_err().kind(), "UnresolvedImportError");
        assert!(t.check_module("src/common.ts").is_ok());
    }

    #[test]
    fn duplicate_declarations_fail_only_their_module() {
        let t = table(&[
            ("a.ts", "export type A = string\nexport interface A { x: number }"),
            ("b.ts", "export type B = number"),
        ]);
        assert_eq!(
            t.check_module("a.ts").unwrap_err(),
            CompileError::DuplicateSymbol { module: "a.ts".into(), name: "A".into() }
        );
        assert!(t.check_module("b.ts").is_ok());
    }

    #[test]
    fn errors_in_imported_modules_propagate() {
        let t = table(&[
            ("a.ts", "export type A = string\nexport type A = number"),
            ("b.ts", "import { A } from './a'\nexport type B = A"),
        ]);
        assert_eq!(t.check_module("b.ts").unwrap_err().kind(), "DuplicateSymbolError");
    }

    #[test]
    fn field_constraints_are_keyed_by_owner_and_field() {
        let t = table(&[(
            "m.ts",
            "/** @format uuid */\nexport type Id = string\n\
             export interface T {\n  /** @format uuid */\n  id: Id\n  name: string\n}",
        )]);
        let m = t.module_id("m.ts").unwrap();
        let id = t.lookup(m, "Id").unwrap();
        let task = t.lookup(m, "T").unwrap();
        assert_eq!(t.constraints(id, None).unwrap().format.as_deref(), Some("uuid"));
        assert_eq!(t.constraints(task, Some("id")).unwrap().format.as_deref(), Some("uuid"));
        assert!(t.constraints(task, Some("name")).unwrap().is_empty());
        assert!(t.constraints(task, Some("missing")).is_none());
    }
}
