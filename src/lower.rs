//! Lowering: symbols and type expressions in, schema nodes out.
//!
//! Named object-like types are hoisted into a definitions arena and referred
//! to by name; primitive and literal aliases are inlined with their
//! constraints merged in. An arena slot holds `None` while its declaration is
//! being resolved, which is what lets recursive types terminate.
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use indexmap::IndexMap;
use log::{debug, trace};

use crate::annotation::ConstraintRecord;
use crate::error::{CompileError, Result};
use crate::ir::{Field, Literal, NodeKind, Primitive, ResolvedModule, SchemaNode};
use crate::symbols::{ModuleId, SymbolId, SymbolTable, TypeSymbol, module_stem};
use crate::syntax::{DeclKind, Keyword, Member, TypeExpr};

/// Which exports of a module to compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportSelector {
    All,
    Name(String),
}

impl ExportSelector {
    /// `*` selects every export; anything else is an export name.
    pub fn parse(s: &str) -> Self {
        if s == "*" { ExportSelector::All } else { ExportSelector::Name(s.to_string()) }
    }
}

impl Default for ExportSelector {
    fn default() -> Self {
        ExportSelector::All
    }
}

// ---------------------------- Conditional types ---------------------------- //

/// A conditional type flattened into literal discriminants and their branches.
///
/// `E extends "a" ? A : E extends "b" | "c" ? B : C` becomes the arms
/// `("a", A), ("b", B), ("c", B)` with fallback `C`.
#[derive(Debug, Clone)]
pub struct ConditionalType<'a> {
    pub subject: &'a TypeExpr,
    pub arms: Vec<(Literal, &'a TypeExpr)>,
    pub otherwise: &'a TypeExpr,
}

impl<'a> ConditionalType<'a> {
    pub fn from_expr(expr: &'a TypeExpr) -> std::result::Result<Self, String> {
        let TypeExpr::Conditional { check, .. } = expr else {
            return Err(format!("`{expr}` is not a conditional type"));
        };
        let subject: &TypeExpr = check;
        let mut arms = Vec::new();
        let mut cur = expr;
        loop {
            match cur {
                TypeExpr::Conditional { check, extends, then, otherwise } if **check == *subject => {
                    for lit in discriminants(extends)? {
                        arms.push((lit, &**then));
                    }
                    cur = otherwise;
                }
                other => return Ok(Self { subject, arms, otherwise: other }),
            }
        }
    }

    /// Branch selected by a known discriminant; first matching arm wins.
    pub fn specialize(&self, discriminant: &Literal) -> &'a TypeExpr {
        self.arms
            .iter()
            .find(|(lit, _)| lit == discriminant)
            .map_or(self.otherwise, |(_, branch)| *branch)
    }

    /// Every branch, arms first, fallback last.
    pub fn branches(&self) -> impl Iterator<Item = &'a TypeExpr> + '_ {
        self.arms.iter().map(|(_, b)| *b).chain(std::iter::once(self.otherwise))
    }
}

fn discriminants(expr: &TypeExpr) -> std::result::Result<Vec<Literal>, String> {
    match expr {
        TypeExpr::Literal(lit) => Ok(vec![lit.clone()]),
        TypeExpr::Union(xs) => xs
            .iter()
            .map(|x| match x {
                TypeExpr::Literal(lit) => Ok(lit.clone()),
                other => Err(format!("conditional discriminant `{other}` is not a literal type")),
            })
            .collect(),
        other => Err(format!("conditional discriminant `{other}` is not a literal type")),
    }
}

// --------------------------------- Scopes ---------------------------------- //

/// Where a type expression is evaluated: its module, the symbol it belongs
/// to, and the type arguments bound so far.
#[derive(Clone)]
struct Scope<'t> {
    module: ModuleId,
    owner: SymbolId,
    params: Rc<Vec<(String, Binding<'t>)>>,
}

#[derive(Clone)]
struct Binding<'t> {
    expr: &'t TypeExpr,
    scope: Scope<'t>,
}

impl<'t> Scope<'t> {
    fn of(symbol: &TypeSymbol, params: Vec<(String, Binding<'t>)>) -> Self {
        Scope { module: symbol.module, owner: symbol.id, params: Rc::new(params) }
    }

    fn param(&self, name: &str) -> Option<&Binding<'t>> {
        self.params.iter().rev().find(|(n, _)| n == name).map(|(_, b)| b)
    }
}

// -------------------------------- Resolver --------------------------------- //

pub struct Resolver<'t> {
    table: &'t SymbolTable,
    /// `None` marks a definition whose resolution is in progress.
    definitions: IndexMap<String, Option<SchemaNode>>,
    /// instantiation identity -> definition name
    names: HashMap<String, String>,
    taken: HashSet<String>,
}

/// Resolve the selected exports of `module` into self-contained nodes.
pub fn resolve_module(table: &SymbolTable, module: ModuleId, selector: &ExportSelector) -> Result<ResolvedModule> {
    Resolver::new(table).resolve_module(module, selector)
}

impl<'t> Resolver<'t> {
    pub fn new(table: &'t SymbolTable) -> Self {
        Self { table, definitions: IndexMap::new(), names: HashMap::new(), taken: HashSet::new() }
    }

    pub fn resolve_module(mut self, module: ModuleId, selector: &ExportSelector) -> Result<ResolvedModule> {
        let table = self.table;
        let path = table.module(module).path.clone();

        let selected: Vec<&'t TypeSymbol> = match selector {
            ExportSelector::All => table
                .exports(module)
                .filter(|s| {
                    let open = s.needs_type_arguments();
                    if open {
                        debug!(module = path.as_str(), export = s.name.as_str(); "Skipping generic export");
                    }
                    !open
                })
                .collect(),
            ExportSelector::Name(name) => {
                let symbol = table
                    .export(module, name)
                    .ok_or_else(|| CompileError::UnknownExport { module: path.clone(), name: name.clone() })?;
                if symbol.needs_type_arguments() {
                    return Err(CompileError::unsupported(
                        &symbol.name,
                        None,
                        "generic type needs type arguments before it can be emitted",
                    ));
                }
                vec![symbol]
            }
        };

        // exports claim their own names before anything else is hoisted
        for symbol in &selected {
            self.definition_name(&instance_identity(symbol), symbol.name.clone(), module);
        }

        let mut exports = IndexMap::new();
        for symbol in selected {
            let bindings = self.bind(symbol, &[], &Scope::of(symbol, Vec::new()))?;
            let node = if self.is_hoisted(symbol.id, &mut Vec::new())? {
                let name = self.hoist(symbol.id, bindings, &instance_identity(symbol), symbol.name.clone())?;
                self.definitions.get(&name).cloned().flatten().ok_or_else(|| CompileError::DanglingReference {
                    owner: symbol.name.clone(),
                    target: name.clone(),
                })?
            } else {
                self.declaration(symbol.id, bindings)?
            };
            exports.insert(symbol.name.clone(), node);
        }

        let mut definitions = IndexMap::new();
        for (name, node) in self.definitions {
            let node =
                node.ok_or_else(|| CompileError::DanglingReference { owner: path.clone(), target: name.clone() })?;
            if !exports.contains_key(&name) {
                definitions.insert(name, node);
            }
        }

        let root = match selector {
            ExportSelector::Name(name) => Some(name.clone()),
            ExportSelector::All => None,
        };
        let resolved = ResolvedModule { module: path, exports, definitions, root };
        check_references(&resolved)?;
        debug!(
            module = resolved.module.as_str(),
            exports = resolved.exports.len(),
            definitions = resolved.definitions.len();
            "Resolved module"
        );
        Ok(resolved)
    }

    /// Resolve a declaration in full, hoisting what it references. Type
    /// parameters fall back to their defaults, then to their constraints.
    pub fn resolve_symbol(&mut self, symbol: SymbolId) -> Result<SchemaNode> {
        let table = self.table;
        let sym = table.symbol(symbol);
        if sym.needs_type_arguments() {
            return Err(CompileError::unsupported(
                &sym.name,
                None,
                "generic type needs type arguments before it can be emitted",
            ));
        }
        let bindings = self.bind(sym, &[], &Scope::of(sym, Vec::new()))?;
        self.declaration(symbol, bindings)
    }

    /// Resolve one branch of a conditional alias for a known discriminant.
    pub fn resolve_branch(&mut self, symbol: SymbolId, discriminant: &Literal) -> Result<SchemaNode> {
        let table = self.table;
        let sym = table.symbol(symbol);
        let cond = ConditionalType::from_expr(&sym.definition)
            .map_err(|m| CompileError::unsupported(&sym.name, None, m))?;
        self.resolve_expr(cond.specialize(discriminant), &Scope::of(sym, Vec::new()))
    }

    fn owner_name(&self, scope: &Scope<'t>) -> &'t str {
        let table = self.table;
        &table.symbol(scope.owner).name
    }

    fn unsupported(&self, scope: &Scope<'t>, message: impl Into<String>) -> CompileError {
        CompileError::unsupported(self.owner_name(scope), None, message)
    }

    // 1) Hoisting policy

    /// Interfaces and aliases of structured types get a definition; aliases
    /// of primitives and literals are inlined at every use.
    fn is_hoisted(&self, id: SymbolId, seen: &mut Vec<SymbolId>) -> Result<bool> {
        let sym = self.table.symbol(id);
        if sym.kind == DeclKind::Interface {
            return Ok(true);
        }
        if seen.contains(&id) {
            return Err(CompileError::unsupported(
                &sym.name,
                None,
                format!("type alias `{}` circularly references itself", sym.name),
            ));
        }
        seen.push(id);
        Ok(match &sym.definition {
            TypeExpr::Keyword(_) | TypeExpr::Literal(_) => false,
            TypeExpr::Ref { name, args } => {
                if sym.type_params.iter().any(|p| &p.name == name) {
                    false
                } else if !args.is_empty() {
                    true
                } else {
                    match self.table.lookup(sym.module, name) {
                        Some(target) => self.is_hoisted(target, seen)?,
                        None => false,
                    }
                }
            }
            _ => true,
        })
    }

    fn definition_name(&mut self, identity: &str, display: String, module: ModuleId) -> String {
        if let Some(name) = self.names.get(identity) {
            return name.clone();
        }
        let mut name = display;
        if self.taken.contains(&name) {
            let qualified = format!("{}.{name}", module_stem(&self.table.module(module).path));
            name = qualified.clone();
            let mut n = 2;
            while self.taken.contains(&name) {
                name = format!("{qualified}{n}");
                n += 1;
            }
        }
        self.taken.insert(name.clone());
        self.names.insert(identity.to_string(), name.clone());
        name
    }

    fn hoist(
        &mut self,
        id: SymbolId,
        bindings: Vec<(String, Binding<'t>)>,
        identity: &str,
        display: String,
    ) -> Result<String> {
        let module = self.table.symbol(id).module;
        let name = self.definition_name(identity, display, module);
        if !self.definitions.contains_key(&name) {
            trace!(definition = name.as_str(); "Hoisting definition");
            self.definitions.insert(name.clone(), None);
            let node = self.declaration(id, bindings)?;
            self.definitions.insert(name.clone(), Some(node));
        }
        Ok(name)
    }

    // 2) Declarations

    fn declaration(&mut self, id: SymbolId, bindings: Vec<(String, Binding<'t>)>) -> Result<SchemaNode> {
        let table = self.table;
        let sym = table.symbol(id);
        let scope = Scope::of(sym, bindings);
        let node = match sym.kind {
            DeclKind::Interface => self.interface(sym, &scope)?,
            DeclKind::Alias => self.resolve_expr(&sym.definition, &scope)?,
        };
        absorb(node, &sym.constraints, &sym.name, None)
    }

    fn interface(&mut self, sym: &'t TypeSymbol, scope: &Scope<'t>) -> Result<SchemaNode> {
        let mut fields: Vec<Field> = Vec::new();
        for base in &sym.extends {
            let node = self.resolve_expr(base, scope)?;
            for field in self.object_fields(&node, scope)? {
                merge_field(&mut fields, field);
            }
        }
        let TypeExpr::Object(members) = &sym.definition else {
            return Err(self.unsupported(scope, "interface body is not an object type"));
        };
        for field in self.members(members, scope)? {
            merge_field(&mut fields, field);
        }
        Ok(SchemaNode::new(NodeKind::Object { fields }))
    }

    /// Fields contributed by an `extends` base.
    fn object_fields(&self, node: &SchemaNode, scope: &Scope<'t>) -> Result<Vec<Field>> {
        match &node.kind {
            NodeKind::Object { fields } => Ok(fields.clone()),
            NodeKind::Reference { target } => match self.definitions.get(target) {
                Some(Some(def)) => self.object_fields(def, scope),
                Some(None) => {
                    Err(self.unsupported(scope, format!("`{target}` is extended while it is still being defined")))
                }
                None => Err(CompileError::DanglingReference {
                    owner: self.owner_name(scope).to_string(),
                    target: target.clone(),
                }),
            },
            _ => Err(self.unsupported(scope, format!("cannot extend {}", describe(node)))),
        }
    }

    fn members(&mut self, members: &'t [Member], scope: &Scope<'t>) -> Result<Vec<Field>> {
        let owner = self.owner_name(scope);
        let mut fields: Vec<Field> = Vec::with_capacity(members.len());
        for m in members {
            if fields.iter().any(|f| f.name == m.name) {
                return Err(CompileError::DuplicateSymbol {
                    module: self.table.module(scope.module).path.clone(),
                    name: format!("{owner}.{}", m.name),
                });
            }
            let node = self.resolve_expr(&m.ty, scope).map_err(|e| e.in_field(&m.name))?;
            let node = absorb(node, &m.constraints, owner, Some(&m.name))?;
            fields.push(Field { name: m.name.clone(), node, optional: m.optional, required: !m.optional });
        }
        Ok(fields)
    }

    // 3) Type expressions

    fn resolve_expr(&mut self, expr: &'t TypeExpr, scope: &Scope<'t>) -> Result<SchemaNode> {
        match expr {
            TypeExpr::Keyword(k) => self.keyword(*k, scope),
            TypeExpr::Literal(lit) => Ok(SchemaNode::literal(lit.clone())),
            TypeExpr::Array(inner) => Ok(array_of(self.resolve_expr(inner, scope)?)),
            TypeExpr::Union(members) => {
                let mut variants = Vec::with_capacity(members.len());
                for m in members {
                    if is_uninhabited(m) {
                        continue;
                    }
                    variants.push(self.resolve_expr(m, scope)?);
                }
                if variants.is_empty() {
                    return Err(self.unsupported(scope, format!("`{expr}` has no JSON representation")));
                }
                Ok(SchemaNode::union(variants))
            }
            TypeExpr::Object(members) => {
                Ok(SchemaNode::new(NodeKind::Object { fields: self.members(members, scope)? }))
            }
            TypeExpr::Ref { name, args } => self.reference(name, args, scope),
            TypeExpr::Conditional { .. } => {
                let cond = ConditionalType::from_expr(expr).map_err(|m| self.unsupported(scope, m))?;
                if let Some(lit) = self.discriminant(cond.subject, scope) {
                    trace!(discriminant:% = lit; "Specializing conditional type");
                    return self.resolve_expr(cond.specialize(&lit), scope);
                }
                let mut variants = Vec::new();
                for branch in cond.branches().filter(|b| !is_uninhabited(b)) {
                    variants.push(self.resolve_expr(branch, scope)?);
                }
                Ok(SchemaNode::union(variants))
            }
            TypeExpr::Intersection(_) => Err(self.unsupported(scope, format!("intersection type `{expr}`"))),
            TypeExpr::Tuple(_) => Err(self.unsupported(scope, format!("tuple type `{expr}`"))),
        }
    }

    fn keyword(&self, keyword: Keyword, scope: &Scope<'t>) -> Result<SchemaNode> {
        Ok(match keyword {
            Keyword::String => SchemaNode::primitive(Primitive::String),
            Keyword::Number => SchemaNode::primitive(Primitive::Number),
            Keyword::Boolean => SchemaNode::primitive(Primitive::Boolean),
            Keyword::Any | Keyword::Unknown => SchemaNode::new(NodeKind::Any),
            Keyword::Object => SchemaNode::new(NodeKind::Object { fields: Vec::new() }),
            Keyword::Undefined | Keyword::Never | Keyword::Void | Keyword::Bigint | Keyword::Symbol => {
                return Err(self.unsupported(scope, format!("`{}` has no JSON representation", keyword.as_str())));
            }
        })
    }

    /// The literal a conditional's subject is known to be, if its binding pins it.
    fn discriminant(&self, subject: &TypeExpr, scope: &Scope<'t>) -> Option<Literal> {
        match subject {
            TypeExpr::Literal(lit) => Some(lit.clone()),
            TypeExpr::Ref { name, args } if args.is_empty() => {
                let binding = scope.param(name)?;
                self.discriminant(binding.expr, &binding.scope)
            }
            _ => None,
        }
    }

    fn reference(&mut self, name: &'t str, args: &'t [TypeExpr], scope: &Scope<'t>) -> Result<SchemaNode> {
        if let Some(binding) = scope.param(name).cloned() {
            if !args.is_empty() {
                return Err(self.unsupported(scope, format!("type parameter `{name}` cannot take type arguments")));
            }
            return self.resolve_expr(binding.expr, &binding.scope);
        }
        let table = self.table;
        let Some(id) = table.lookup(scope.module, name) else {
            return self.builtin(name, args, scope);
        };
        let sym = table.symbol(id);
        let bindings = self.bind(sym, args, scope)?;
        if self.is_hoisted(id, &mut Vec::new())? {
            let display = self.render_instance(sym, args, scope, false);
            let identity = self.render_instance(sym, args, scope, true);
            let name = self.hoist(id, bindings, &identity, display)?;
            Ok(SchemaNode::reference(name))
        } else {
            self.declaration(id, bindings)
        }
    }

    fn builtin(&mut self, name: &str, args: &'t [TypeExpr], scope: &Scope<'t>) -> Result<SchemaNode> {
        match (name, args) {
            ("Array" | "ReadonlyArray", [element]) => Ok(array_of(self.resolve_expr(element, scope)?)),
            ("Date", []) => {
                let mut node = SchemaNode::primitive(Primitive::String);
                node.annotations.format = Some("date-time".to_string());
                Ok(node)
            }
            _ if name.contains('.') => Err(self.unsupported(scope, format!("qualified type name `{name}`"))),
            _ => Err(CompileError::DanglingReference {
                owner: self.owner_name(scope).to_string(),
                target: name.to_string(),
            }),
        }
    }

    /// Bind type arguments to a generic's parameters. A missing argument takes
    /// the declared default, else the parameter's `extends` constraint.
    fn bind(
        &self,
        sym: &'t TypeSymbol,
        args: &'t [TypeExpr],
        scope: &Scope<'t>,
    ) -> Result<Vec<(String, Binding<'t>)>> {
        if args.len() > sym.type_params.len() {
            return Err(self.unsupported(
                scope,
                format!(
                    "`{}` takes {} type argument(s) but {} were given",
                    sym.name,
                    sym.type_params.len(),
                    args.len()
                ),
            ));
        }
        let mut bound: Vec<(String, Binding<'t>)> = Vec::with_capacity(sym.type_params.len());
        for (i, param) in sym.type_params.iter().enumerate() {
            let binding = match (args.get(i), &param.default, &param.constraint) {
                (Some(arg), _, _) => Binding { expr: arg, scope: scope.clone() },
                (None, Some(fallback), _) | (None, None, Some(fallback)) => {
                    Binding { expr: fallback, scope: Scope::of(sym, bound.clone()) }
                }
                (None, None, None) => {
                    return Err(self.unsupported(
                        scope,
                        format!("missing type argument for `{}` of `{}`", param.name, sym.name),
                    ));
                }
            };
            bound.push((param.name.clone(), binding));
        }
        Ok(bound)
    }

    // 4) Definition naming

    /// `Payload<Lesson[]>` for display; with `identity` set, symbol ids are
    /// folded in so same-named types from different modules never collide.
    fn render_instance(&self, sym: &TypeSymbol, args: &[TypeExpr], scope: &Scope<'t>, identity: bool) -> String {
        let mut out = if identity { instance_identity(sym) } else { sym.name.clone() };
        if !args.is_empty() {
            let rendered: Vec<String> = args.iter().map(|a| self.render(a, scope, identity)).collect();
            out.push('<');
            out.push_str(&rendered.join(", "));
            out.push('>');
        }
        out
    }

    fn render(&self, expr: &TypeExpr, scope: &Scope<'t>, identity: bool) -> String {
        match expr {
            TypeExpr::Ref { name, args } => {
                if let Some(binding) = scope.param(name) {
                    return self.render(binding.expr, &binding.scope, identity);
                }
                match self.table.lookup(scope.module, name) {
                    Some(id) => self.render_instance(self.table.symbol(id), args, scope, identity),
                    None if args.is_empty() => name.clone(),
                    None => {
                        let rendered: Vec<String> = args.iter().map(|a| self.render(a, scope, identity)).collect();
                        format!("{name}<{}>", rendered.join(", "))
                    }
                }
            }
            TypeExpr::Array(inner) => {
                let s = self.render(inner, scope, identity);
                match **inner {
                    TypeExpr::Union(_) | TypeExpr::Intersection(_) | TypeExpr::Conditional { .. } => format!("({s})[]"),
                    _ => format!("{s}[]"),
                }
            }
            TypeExpr::Union(xs) => xs.iter().map(|x| self.render(x, scope, identity)).collect::<Vec<_>>().join(" | "),
            TypeExpr::Intersection(xs) => {
                xs.iter().map(|x| self.render(x, scope, identity)).collect::<Vec<_>>().join(" & ")
            }
            TypeExpr::Tuple(xs) => {
                format!("[{}]", xs.iter().map(|x| self.render(x, scope, identity)).collect::<Vec<_>>().join(", "))
            }
            other => other.to_string(),
        }
    }
}

fn instance_identity(sym: &TypeSymbol) -> String {
    format!("{}#{:?}", sym.name, sym.id)
}

/// `undefined` and `never` contribute nothing to a union.
fn is_uninhabited(expr: &TypeExpr) -> bool {
    matches!(expr, TypeExpr::Keyword(Keyword::Undefined | Keyword::Never))
}

fn merge_field(fields: &mut Vec<Field>, field: Field) {
    match fields.iter_mut().find(|f| f.name == field.name) {
        Some(slot) => *slot = field,
        None => fields.push(field),
    }
}

fn array_of(element: SchemaNode) -> SchemaNode {
    SchemaNode::new(NodeKind::Array { element: Box::new(element) })
}

fn describe(node: &SchemaNode) -> String {
    match &node.kind {
        NodeKind::Object { .. } => "an object".into(),
        NodeKind::Array { .. } => "an array".into(),
        NodeKind::Union { .. } => "a union".into(),
        NodeKind::Literal { value } => format!("the literal {value}"),
        NodeKind::Primitive { kind } => format!("a {}", kind.as_str()),
        NodeKind::Reference { target } => format!("a reference to `{target}`"),
        NodeKind::Any => "an unconstrained type".into(),
    }
}

// --------------------------- Constraint absorption -------------------------- //

/// Change a primitive's kind for `@type`; numeric kinds convert freely.
fn retype(node: &mut SchemaNode, to: Primitive) -> std::result::Result<(), String> {
    let found = describe(node);
    match &mut node.kind {
        NodeKind::Primitive { kind } if *kind == to || (kind.is_numeric() && to.is_numeric()) => {
            *kind = to;
            Ok(())
        }
        NodeKind::Primitive { kind } => Err(format!("cannot turn a {} into a {}", kind.as_str(), to.as_str())),
        _ => Err(format!("expected a primitive, found {found}")),
    }
}

fn admits_bounds(node: &SchemaNode) -> bool {
    match &node.kind {
        NodeKind::Primitive { kind } => kind.is_numeric(),
        NodeKind::Literal { value } => matches!(value, Literal::Num(_)),
        NodeKind::Reference { .. } | NodeKind::Union { .. } | NodeKind::Any => true,
        NodeKind::Object { .. } | NodeKind::Array { .. } => false,
    }
}

/// Merge a declaration site's constraint record into its resolved node.
/// Keywords given here override those inherited from an inlined alias.
fn absorb(mut node: SchemaNode, rec: &ConstraintRecord, owner: &str, field: Option<&str>) -> Result<SchemaNode> {
    if rec.is_empty() {
        return Ok(node);
    }
    let conflict = |message: String| CompileError::conflict(owner, field, message);

    if let Some(kind) = rec.type_override {
        retype(&mut node, kind).map_err(|m| conflict(format!("@type {}: {m}", kind.as_str())))?;
    }
    if rec.items_format.is_some() || rec.items_type.is_some() {
        let found = describe(&node);
        let NodeKind::Array { element } = &mut node.kind else {
            return Err(conflict(format!("@items requires an array, found {found}")));
        };
        if let Some(kind) = rec.items_type {
            retype(element, kind).map_err(|m| conflict(format!("@items.type {}: {m}", kind.as_str())))?;
        }
        if let Some(format) = &rec.items_format {
            element.annotations.format = Some(format.clone());
        }
    }

    let a = &mut node.annotations;
    if rec.format.is_some() {
        a.format = rec.format.clone();
    }
    if rec.pattern.is_some() {
        a.pattern = rec.pattern.clone();
    }
    if rec.minimum.is_some() {
        a.minimum = rec.minimum;
    }
    if rec.maximum.is_some() {
        a.maximum = rec.maximum;
    }
    if let Some(description) = rec.full_description() {
        a.description = Some(description);
    }
    for (k, v) in &rec.extensions {
        a.extensions.insert(k.clone(), v.clone());
    }

    if let (Some(min), Some(max)) = (a.minimum, a.maximum) {
        if min > max {
            return Err(conflict(format!("minimum {min} exceeds maximum {max}")));
        }
    }
    let bounded = a.minimum.is_some() || a.maximum.is_some();
    if bounded && !admits_bounds(&node) {
        return Err(conflict(format!("numeric bounds on {}", describe(&node))));
    }
    Ok(node)
}

fn check_references(module: &ResolvedModule) -> Result<()> {
    let mut missing: Option<(String, String)> = None;
    for (owner, node) in module.exports.iter().chain(module.definitions.iter()) {
        node.for_each_reference(&mut |target| {
            if missing.is_none() && module.get(target).is_none() {
                missing = Some((owner.clone(), target.to_string()));
            }
        });
    }
    match missing {
        Some((owner, target)) => Err(CompileError::DanglingReference { owner, target }),
        None => Ok(()),
    }
}
