//! Recursive-descent parser over the token stream from [`super::lex`].
use crate::annotation::{self, ConstraintRecord};
use crate::error::{CompileError, Result};
use crate::ir::Literal;

use super::lex::{Tok, Token, tokenize};
use super::{Decl, DeclKind, Import, ImportName, Keyword, Member, SourceModule, TypeExpr, TypeParam};

pub fn parse_module(module: &str, src: &str) -> Result<SourceModule> {
    let tokens = tokenize(module, src)?;
    let mut p = Parser { module, tokens, pos: 0, owner: String::new() };
    p.module()
}

struct Parser<'a> {
    module: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    /// Declaration currently being parsed, for error context.
    owner: String,
}

impl<'a> Parser<'a> {
    // ---------------------------- token plumbing ---------------------------- //

    /// Consume doc comments at the cursor, returning the last one.
    fn skip_docs(&mut self) -> Option<String> {
        let mut doc = None;
        while let Tok::Doc(text) = &self.tokens[self.pos].tok {
            doc = Some(text.clone());
            self.pos += 1;
        }
        doc
    }

    /// Index of the next non-doc token. Peeking never consumes doc comments,
    /// so a member's doc survives lookahead done by the previous member.
    fn next_index(&self) -> usize {
        let mut i = self.pos;
        while matches!(self.tokens[i].tok, Tok::Doc(_)) {
            i += 1;
        }
        i
    }

    fn peek(&self) -> &Tok {
        &self.tokens[self.next_index()].tok
    }

    fn peek_at(&self, offset: usize) -> &Tok {
        let mut i = self.pos;
        let mut seen = 0;
        loop {
            match &self.tokens[i].tok {
                Tok::Doc(_) => {}
                Tok::Eof => return &self.tokens[i].tok,
                tok if seen == offset => return tok,
                _ => seen += 1,
            }
            i += 1;
        }
    }

    fn line(&self) -> usize {
        self.tokens[self.next_index()].line
    }

    /// Line of the last consumed non-doc token.
    fn last_line(&self) -> usize {
        self.tokens[..self.pos]
            .iter()
            .rev()
            .find(|t| !matches!(t.tok, Tok::Doc(_)))
            .map_or(1, |t| t.line)
    }

    fn bump(&mut self) -> Tok {
        let i = self.next_index();
        let tok = self.tokens[i].tok.clone();
        if tok != Tok::Eof {
            self.pos = i + 1;
        }
        tok
    }

    fn eat_punct(&mut self, c: char) -> bool {
        if *self.peek() == Tok::Punct(c) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn eat_ident(&mut self, word: &str) -> bool {
        if matches!(self.peek(), Tok::Ident(w) if w == word) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, c: char) -> Result<()> {
        if self.eat_punct(c) {
            Ok(())
        } else {
            let found = self.peek().clone();
            Err(self.syntax(format!("expected `{c}`, found {}", describe(&found))))
        }
    }

    fn expect_ident(&mut self) -> Result<String> {
        match self.bump() {
            Tok::Ident(name) => Ok(name),
            other => Err(self.syntax(format!("expected identifier, found {}", describe(&other)))),
        }
    }

    fn syntax(&self, message: String) -> CompileError {
        let line = self.line();
        CompileError::Syntax { module: self.module.to_string(), line, message }
    }

    fn unsupported(&self, message: impl Into<String>) -> CompileError {
        CompileError::unsupported(&self.owner, None, message)
    }

    // ------------------------------- items ---------------------------------- //

    fn module(&mut self) -> Result<SourceModule> {
        let mut out = SourceModule { imports: Vec::new(), decls: Vec::new() };
        loop {
            let doc = self.skip_docs();
            match self.peek().clone() {
                Tok::Eof => break,
                Tok::Punct(';') => {
                    self.bump();
                }
                Tok::Ident(word) if word == "import" => {
                    if let Some(import) = self.import()? {
                        out.imports.push(import);
                    }
                }
                Tok::Ident(word) if word == "export" => {
                    self.bump();
                    self.eat_ident("declare");
                    let is_decl = matches!(self.peek(), Tok::Ident(w) if w == "type" || w == "interface");
                    if !is_decl {
                        self.owner = self.module.to_string();
                        return Err(self.unsupported("only `export type` and `export interface` are supported"));
                    }
                    let decl = self.decl(doc, true)?;
                    out.decls.push(decl);
                }
                Tok::Ident(word) if word == "type" || word == "interface" || word == "declare" => {
                    self.eat_ident("declare");
                    let decl = self.decl(doc, false)?;
                    out.decls.push(decl);
                }
                other => {
                    return Err(self.syntax(format!("expected a type declaration, found {}", describe(&other))));
                }
            }
        }
        Ok(out)
    }

    fn import(&mut self) -> Result<Option<Import>> {
        let line = self.line();
        self.bump(); // import
        if matches!(self.peek(), Tok::Str(_)) {
            // side-effect import carries no types
            self.bump();
            self.eat_punct(';');
            return Ok(None);
        }
        self.eat_ident("type");
        if *self.peek() != Tok::Punct('{') {
            self.owner = self.module.to_string();
            return Err(self.unsupported("only named imports (`import { A } from \"...\"`) are supported"));
        }
        self.bump();
        let mut names = Vec::new();
        while !self.eat_punct('}') {
            if matches!(self.peek_at(1), Tok::Ident(_)) {
                self.eat_ident("type");
            }
            let imported = self.expect_ident()?;
            let local = if self.eat_ident("as") { self.expect_ident()? } else { imported.clone() };
            names.push(ImportName { imported, local });
            if !self.eat_punct(',') {
                self.expect_punct('}')?;
                break;
            }
        }
        if !self.eat_ident("from") {
            return Err(self.syntax("expected `from` after import list".into()));
        }
        let from = match self.bump() {
            Tok::Str(s) => s,
            other => return Err(self.syntax(format!("expected module specifier, found {}", describe(&other)))),
        };
        self.eat_punct(';');
        Ok(Some(Import { names, from, line }))
    }

    fn decl(&mut self, doc: Option<String>, exported: bool) -> Result<Decl> {
        let line = self.line();
        let kind = match self.bump() {
            Tok::Ident(w) if w == "type" => DeclKind::Alias,
            Tok::Ident(w) if w == "interface" => DeclKind::Interface,
            other => return Err(self.syntax(format!("expected `type` or `interface`, found {}", describe(&other)))),
        };
        let name = self.expect_ident()?;
        self.owner = name.clone();
        let constraints = match doc {
            Some(doc) => annotation::extract(&doc, &name, None)?,
            None => ConstraintRecord::default(),
        };
        let type_params = self.type_params()?;
        let (extends, body) = match kind {
            DeclKind::Alias => {
                self.expect_punct('=')?;
                let body = self.ty()?;
                (Vec::new(), body)
            }
            DeclKind::Interface => {
                let mut extends = Vec::new();
                if self.eat_ident("extends") {
                    loop {
                        extends.push(self.type_ref()?);
                        if !self.eat_punct(',') {
                            break;
                        }
                    }
                }
                let body = self.object()?;
                (extends, body)
            }
        };
        self.eat_punct(';');
        Ok(Decl { name, kind, exported, constraints, type_params, extends, body, line })
    }

    fn type_params(&mut self) -> Result<Vec<TypeParam>> {
        let mut out = Vec::new();
        if !self.eat_punct('<') {
            return Ok(out);
        }
        loop {
            let name = self.expect_ident()?;
            let constraint = if self.eat_ident("extends") { Some(self.ty()?) } else { None };
            let default = if self.eat_punct('=') { Some(self.ty()?) } else { None };
            out.push(TypeParam { name, constraint, default });
            if !self.eat_punct(',') {
                break;
            }
        }
        self.expect_punct('>')?;
        Ok(out)
    }

    // ------------------------------- types ---------------------------------- //

    fn ty(&mut self) -> Result<TypeExpr> {
        let check = self.union()?;
        if !self.eat_ident("extends") {
            return Ok(check);
        }
        let extends = self.union()?;
        self.expect_punct('?')?;
        let then = self.ty()?;
        self.expect_punct(':')?;
        let otherwise = self.ty()?;
        Ok(TypeExpr::Conditional {
            check: Box::new(check),
            extends: Box::new(extends),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    fn union(&mut self) -> Result<TypeExpr> {
        self.eat_punct('|');
        let mut members = vec![self.intersection()?];
        while self.eat_punct('|') {
            members.push(self.intersection()?);
        }
        Ok(if members.len() == 1 { members.remove(0) } else { TypeExpr::Union(members) })
    }

    fn intersection(&mut self) -> Result<TypeExpr> {
        self.eat_punct('&');
        let mut members = vec![self.postfix()?];
        while self.eat_punct('&') {
            members.push(self.postfix()?);
        }
        Ok(if members.len() == 1 { members.remove(0) } else { TypeExpr::Intersection(members) })
    }

    fn postfix(&mut self) -> Result<TypeExpr> {
        let mut ty = self.primary()?;
        while *self.peek() == Tok::Punct('[') {
            if *self.peek_at(1) != Tok::Punct(']') {
                return Err(self.unsupported("indexed access types are not supported"));
            }
            self.bump();
            self.bump();
            ty = TypeExpr::Array(Box::new(ty));
        }
        Ok(ty)
    }

    fn primary(&mut self) -> Result<TypeExpr> {
        match self.peek().clone() {
            Tok::Str(s) => {
                self.bump();
                Ok(TypeExpr::Literal(Literal::Str(s)))
            }
            Tok::Num(n) => {
                self.bump();
                Ok(TypeExpr::Literal(Literal::number(n)))
            }
            Tok::Punct('{') => self.object(),
            Tok::Punct('(') => {
                self.bump();
                if matches!(self.peek(), Tok::Punct(')')) || matches!(self.peek_at(1), Tok::Punct(':')) {
                    return Err(self.unsupported("function types are not supported"));
                }
                let inner = self.ty()?;
                self.expect_punct(')')?;
                if *self.peek() == Tok::Arrow {
                    return Err(self.unsupported("function types are not supported"));
                }
                Ok(inner)
            }
            Tok::Punct('[') => {
                self.bump();
                let mut elems = Vec::new();
                while !self.eat_punct(']') {
                    elems.push(self.ty()?);
                    if !self.eat_punct(',') {
                        self.expect_punct(']')?;
                        break;
                    }
                }
                Ok(TypeExpr::Tuple(elems))
            }
            Tok::Ident(word) => match word.as_str() {
                "true" | "false" => {
                    self.bump();
                    Ok(TypeExpr::Literal(Literal::Bool(word == "true")))
                }
                "null" => {
                    self.bump();
                    Ok(TypeExpr::Literal(Literal::Null))
                }
                "typeof" | "keyof" | "infer" | "readonly" | "unique" => {
                    Err(self.unsupported(format!("`{word}` type operators are not supported")))
                }
                _ => match Keyword::parse(&word) {
                    Some(k) => {
                        self.bump();
                        Ok(TypeExpr::Keyword(k))
                    }
                    None => self.type_ref(),
                },
            },
            other => Err(self.syntax(format!("expected a type, found {}", describe(&other)))),
        }
    }

    fn type_ref(&mut self) -> Result<TypeExpr> {
        let mut name = self.expect_ident()?;
        while self.eat_punct('.') {
            name.push('.');
            name.push_str(&self.expect_ident()?);
        }
        let mut args = Vec::new();
        if self.eat_punct('<') {
            loop {
                args.push(self.ty()?);
                if !self.eat_punct(',') {
                    break;
                }
            }
            self.expect_punct('>')?;
        }
        Ok(TypeExpr::Ref { name, args })
    }

    fn object(&mut self) -> Result<TypeExpr> {
        self.expect_punct('{')?;
        let mut members = Vec::new();
        loop {
            let doc = self.skip_docs();
            if self.eat_punct('}') {
                break;
            }
            let line = self.line();
            if matches!(self.peek(), Tok::Ident(w) if w == "readonly")
                && matches!(self.peek_at(1), Tok::Ident(_) | Tok::Str(_))
            {
                self.bump();
            }
            let name = match self.bump() {
                Tok::Ident(name) | Tok::Str(name) => name,
                Tok::Punct('[') => return Err(self.unsupported("index signatures are not supported")),
                other => return Err(self.syntax(format!("expected a member name, found {}", describe(&other)))),
            };
            let optional = self.eat_punct('?');
            if matches!(self.peek(), Tok::Punct('(') | Tok::Punct('<')) {
                return Err(CompileError::unsupported(&self.owner, Some(&name), "method signatures are not supported"));
            }
            self.expect_punct(':')?;
            let ty = self.ty()?;
            let end_line = self.last_line();
            let constraints = match &doc {
                Some(doc) => annotation::extract(doc, &self.owner, Some(&name))?,
                None => ConstraintRecord::default(),
            };
            members.push(Member { name, optional, ty, constraints, line });
            let on_new_line = self.line() > end_line;
            if !self.eat_punct(';') && !self.eat_punct(',') && *self.peek() != Tok::Punct('}') && !on_new_line {
                let found = self.peek().clone();
                return Err(self.syntax(format!("expected `;` or `}}` after member, found {}", describe(&found))));
            }
        }
        Ok(TypeExpr::Object(members))
    }
}

fn describe(tok: &Tok) -> String {
    match tok {
        Tok::Ident(s) => format!("`{s}`"),
        Tok::Str(s) => format!("string {s:?}"),
        Tok::Num(n) => format!("number {n}"),
        Tok::Doc(_) => "doc comment".into(),
        Tok::Punct(c) => format!("`{c}`"),
        Tok::Arrow => "`=>`".into(),
        Tok::Eof => "end of input".into(),
    }
}
