//! Syntax tree for the declaration subset we compile.
//!
//! Only type-level constructs are modelled: imports, type aliases and
//! interfaces. Each doc comment is run through the annotation extractor as
//! soon as its owning declaration and member are known, so the tree carries
//! constraint records rather than comment text.
pub mod lex;
pub mod parse;

pub use parse::parse_module;

use crate::annotation::ConstraintRecord;
use crate::ir::Literal;

#[derive(Debug, Clone, PartialEq)]
pub struct SourceModule {
    pub imports: Vec<Import>,
    pub decls: Vec<Decl>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    pub names: Vec<ImportName>,
    pub from: String,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportName {
    pub imported: String,
    pub local: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Alias,
    Interface,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decl {
    pub name: String,
    pub kind: DeclKind,
    pub exported: bool,
    pub constraints: ConstraintRecord,
    pub type_params: Vec<TypeParam>,
    /// Interface bases, in declaration order.
    pub extends: Vec<TypeExpr>,
    /// Alias target, or the interface body as an object literal.
    pub body: TypeExpr,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeParam {
    pub name: String,
    pub constraint: Option<TypeExpr>,
    pub default: Option<TypeExpr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    String,
    Number,
    Boolean,
    Undefined,
    Any,
    Unknown,
    Never,
    Object,
    Void,
    Bigint,
    Symbol,
}

impl Keyword {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "string" => Keyword::String,
            "number" => Keyword::Number,
            "boolean" => Keyword::Boolean,
            "undefined" => Keyword::Undefined,
            "any" => Keyword::Any,
            "unknown" => Keyword::Unknown,
            "never" => Keyword::Never,
            "object" => Keyword::Object,
            "void" => Keyword::Void,
            "bigint" => Keyword::Bigint,
            "symbol" => Keyword::Symbol,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::String => "string",
            Keyword::Number => "number",
            Keyword::Boolean => "boolean",
            Keyword::Undefined => "undefined",
            Keyword::Any => "any",
            Keyword::Unknown => "unknown",
            Keyword::Never => "never",
            Keyword::Object => "object",
            Keyword::Void => "void",
            Keyword::Bigint => "bigint",
            Keyword::Symbol => "symbol",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    Keyword(Keyword),
    Literal(Literal),
    Ref { name: String, args: Vec<TypeExpr> },
    Array(Box<TypeExpr>),
    Union(Vec<TypeExpr>),
    Intersection(Vec<TypeExpr>),
    Tuple(Vec<TypeExpr>),
    Object(Vec<Member>),
    Conditional {
        check: Box<TypeExpr>,
        extends: Box<TypeExpr>,
        then: Box<TypeExpr>,
        otherwise: Box<TypeExpr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub name: String,
    pub optional: bool,
    pub ty: TypeExpr,
    pub constraints: ConstraintRecord,
    pub line: usize,
}

impl std::fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeExpr::Keyword(k) => f.write_str(k.as_str()),
            TypeExpr::Literal(l) => write!(f, "{l}"),
            TypeExpr::Ref { name, args } => {
                f.write_str(name)?;
                if !args.is_empty() {
                    f.write_str("<")?;
                    write_joined(f, args, ", ")?;
                    f.write_str(">")?;
                }
                Ok(())
            }
            TypeExpr::Array(inner) => match **inner {
                TypeExpr::Union(_) | TypeExpr::Intersection(_) | TypeExpr::Conditional { .. } => {
                    write!(f, "({inner})[]")
                }
                _ => write!(f, "{inner}[]"),
            },
            TypeExpr::Union(xs) => write_joined(f, xs, " | "),
            TypeExpr::Intersection(xs) => write_joined(f, xs, " & "),
            TypeExpr::Tuple(xs) => {
                f.write_str("[")?;
                write_joined(f, xs, ", ")?;
                f.write_str("]")
            }
            TypeExpr::Object(members) => {
                f.write_str("{ ")?;
                for m in members {
                    write!(f, "{}{}: {}; ", m.name, if m.optional { "?" } else { "" }, m.ty)?;
                }
                f.write_str("}")
            }
            TypeExpr::Conditional { check, extends, then, otherwise } => {
                write!(f, "{check} extends {extends} ? {then} : {otherwise}")
            }
        }
    }
}

fn write_joined(f: &mut std::fmt::Formatter<'_>, xs: &[TypeExpr], sep: &str) -> std::fmt::Result {
    for (i, x) in xs.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{x}")?;
    }
    Ok(())
}
