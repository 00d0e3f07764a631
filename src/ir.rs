// Strongly-typed schema IR. No serde_json::Value here.

use indexmap::IndexMap;
use ordered_float::OrderedFloat;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Literal {
    Str(String),
    Num(OrderedFloat<f64>),
    Bool(bool),
    Null,
}

impl Literal {
    pub fn number(n: f64) -> Self {
        Literal::Num(OrderedFloat(n))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Literal::Str(_) => "string",
            Literal::Num(_) => "number",
            Literal::Bool(_) => "boolean",
            Literal::Null => "null",
        }
    }
}

impl std::fmt::Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::Str(s) => write!(f, "{s:?}"),
            Literal::Num(n) => write!(f, "{}", n.0),
            Literal::Bool(b) => write!(f, "{b}"),
            Literal::Null => f.write_str("null"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    String,
    Integer,
    Number,
    Boolean,
}

impl Primitive {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "string" => Some(Primitive::String),
            "integer" => Some(Primitive::Integer),
            "number" => Some(Primitive::Number),
            "boolean" => Some(Primitive::Boolean),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Primitive::String => "string",
            Primitive::Integer => "integer",
            Primitive::Number => "number",
            Primitive::Boolean => "boolean",
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, Primitive::Integer | Primitive::Number)
    }
}

/// Constraint keywords carried by a resolved node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Annotations {
    pub format: Option<String>,
    pub pattern: Option<String>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub description: Option<String>,
    pub extensions: IndexMap<String, String>,
}

impl Annotations {
    /// True when any keyword that affects validation is present.
    pub fn constrains(&self) -> bool {
        self.format.is_some() || self.pattern.is_some() || self.minimum.is_some() || self.maximum.is_some()
    }

    pub fn is_empty(&self) -> bool {
        !self.constrains() && self.description.is_none() && self.extensions.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Object { fields: Vec<Field> },        // declaration order
    Array { element: Box<SchemaNode> },
    Union { variants: Vec<SchemaNode> },  // declaration order, structurally distinct
    Literal { value: Literal },
    Primitive { kind: Primitive },
    Reference { target: String },         // key into the definitions arena
    Any,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaNode {
    pub kind: NodeKind,
    pub annotations: Annotations,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub node: SchemaNode,
    pub optional: bool, // `?` in the declaration
    pub required: bool, // decided by policy; defaults to !optional
}

impl SchemaNode {
    pub fn new(kind: NodeKind) -> Self {
        Self { kind, annotations: Annotations::default() }
    }

    pub fn primitive(kind: Primitive) -> Self {
        Self::new(NodeKind::Primitive { kind })
    }

    pub fn literal(value: Literal) -> Self {
        Self::new(NodeKind::Literal { value })
    }

    pub fn reference(target: impl Into<String>) -> Self {
        Self::new(NodeKind::Reference { target: target.into() })
    }

    pub fn with_annotations(mut self, annotations: Annotations) -> Self {
        self.annotations = annotations;
        self
    }

    /// Union constructor that flattens nested unions, drops structural
    /// duplicates, and collapses a single survivor.
    pub fn union(variants: Vec<SchemaNode>) -> Self {
        let mut flat: Vec<SchemaNode> = Vec::with_capacity(variants.len());
        for v in variants {
            match v.kind {
                NodeKind::Union { variants: inner } if v.annotations.is_empty() => {
                    for x in inner {
                        if !flat.contains(&x) {
                            flat.push(x);
                        }
                    }
                }
                _ => {
                    if !flat.contains(&v) {
                        flat.push(v);
                    }
                }
            }
        }
        if flat.len() == 1 {
            return flat.remove(0);
        }
        Self::new(NodeKind::Union { variants: flat })
    }

    /// Closed enumeration: a union whose variants are all literals.
    pub fn enum_literals(&self) -> Option<Vec<&Literal>> {
        match &self.kind {
            NodeKind::Union { variants } => variants
                .iter()
                .map(|v| match &v.kind {
                    NodeKind::Literal { value } => Some(value),
                    _ => None,
                })
                .collect(),
            _ => None,
        }
    }

    /// Whether an explicit `null` already satisfies this node (without following references).
    pub fn accepts_null(&self) -> bool {
        match &self.kind {
            NodeKind::Literal { value: Literal::Null } | NodeKind::Any => true,
            NodeKind::Union { variants } => variants.iter().any(SchemaNode::accepts_null),
            _ => false,
        }
    }

    /// Visit every reference target in this tree, in depth-first declaration order.
    pub fn for_each_reference(&self, f: &mut impl FnMut(&str)) {
        match &self.kind {
            NodeKind::Reference { target } => f(target),
            NodeKind::Object { fields } => fields.iter().for_each(|x| x.node.for_each_reference(f)),
            NodeKind::Array { element } => element.for_each_reference(f),
            NodeKind::Union { variants } => variants.iter().for_each(|v| v.for_each_reference(f)),
            NodeKind::Literal { .. } | NodeKind::Primitive { .. } | NodeKind::Any => {}
        }
    }
}

/// Output unit for one source module, before emission.
#[derive(Debug, Clone, Default)]
pub struct ResolvedModule {
    pub module: String,
    /// Selected exported types, in declaration order.
    pub exports: IndexMap<String, SchemaNode>,
    /// Hoisted named types, in discovery order.
    pub definitions: IndexMap<String, SchemaNode>,
    /// Set when a single export was selected by name.
    pub root: Option<String>,
}

impl ResolvedModule {
    /// Look up a named node, exports first.
    pub fn get(&self, name: &str) -> Option<&SchemaNode> {
        self.exports.get(name).or_else(|| self.definitions.get(name))
    }
}
