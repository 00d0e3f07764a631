//! Example synthesis: one value per exported type that validates against the
//! emitted schema.
//!
//! All randomness comes from a single seeded `StdRng`, so a given seed and
//! module always produce the same examples.
pub mod format;

use indexmap::IndexMap;
use log::{debug, trace};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::emit::{json_number, literal_value};
use crate::error::{CompileError, Result};
use crate::ir::{Annotations, Literal, NodeKind, Primitive, ResolvedModule, SchemaNode};
use format::{KnownFormat, minimal_match, reconcile};

/// Past `max_depth`, only required structure is expanded; this many extra
/// levels are allowed before a required cycle is declared endless.
const REQUIRED_DEPTH_SLACK: usize = 32;

/// Examples per exported type name.
pub type Examples = IndexMap<String, Vec<Value>>;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SampleOptions {
    pub seed: u64,
    /// Probability of including each optional field, in `[0, 1]`.
    pub optional_inclusion: f64,
    /// Upper bound on generated array length; at least 1.
    pub max_array_len: usize,
    pub max_depth: usize,
}

impl Default for SampleOptions {
    fn default() -> Self {
        Self { seed: 0, optional_inclusion: 0.5, max_array_len: 3, max_depth: 6 }
    }
}

pub struct Sampler<'m> {
    module: &'m ResolvedModule,
    options: SampleOptions,
    rng: StdRng,
}

impl<'m> Sampler<'m> {
    pub fn new(module: &'m ResolvedModule, options: SampleOptions) -> Self {
        let rng = StdRng::seed_from_u64(options.seed);
        Self { module, options, rng }
    }

    /// One example per selected export.
    pub fn sample_exports(&mut self) -> Result<Examples> {
        let module = self.module;
        let mut out = Examples::new();
        for (name, node) in &module.exports {
            out.insert(name.clone(), vec![self.value(node, name, 0)?]);
        }
        Ok(out)
    }

    /// One example per union variant of every selected export.
    pub fn enumerate_exports(&mut self) -> Result<Examples> {
        let module = self.module;
        let mut out = Examples::new();
        for name in module.exports.keys() {
            out.insert(name.clone(), self.enumerate(name)?);
        }
        Ok(out)
    }

    /// One example per variant of the named type (each literal of an
    /// enumeration); non-union types yield a single example.
    pub fn enumerate(&mut self, name: &str) -> Result<Vec<Value>> {
        let module = self.module;
        let mut node = module.get(name).ok_or_else(|| CompileError::UnknownExport {
            module: module.module.clone(),
            name: name.to_string(),
        })?;
        let mut owner = name;
        while let NodeKind::Reference { target } = &node.kind {
            if target == owner {
                break;
            }
            owner = target;
            node = self.lookup(target, name)?;
        }
        match &node.kind {
            NodeKind::Union { variants } => {
                let admitted: Vec<SchemaNode> = admitted_variants(node, variants).collect();
                if admitted.is_empty() {
                    return Err(Self::unsatisfiable(owner, "no variant of the union satisfies its constraints"));
                }
                admitted.iter().map(|v| self.value(v, owner, 0)).collect()
            }
            _ => Ok(vec![self.value(node, owner, 0)?]),
        }
    }

    fn lookup(&self, target: &str, owner: &str) -> Result<&'m SchemaNode> {
        let module = self.module;
        module.get(target).ok_or_else(|| CompileError::DanglingReference {
            owner: owner.to_string(),
            target: target.to_string(),
        })
    }

    fn unsatisfiable(owner: &str, message: impl Into<String>) -> CompileError {
        CompileError::UnsatisfiableConstraint { owner: owner.to_string(), message: message.into() }
    }

    fn value(&mut self, node: &SchemaNode, owner: &str, depth: usize) -> Result<Value> {
        if depth > self.options.max_depth + REQUIRED_DEPTH_SLACK {
            return Err(Self::unsatisfiable(owner, "required fields form a cycle with no finite instance"));
        }
        match &node.kind {
            NodeKind::Reference { target } => {
                let def = self.lookup(target, owner)?;
                if node.annotations.constrains() {
                    let merged = with_constraints(def, &node.annotations);
                    self.value(&merged, target, depth + 1)
                } else {
                    self.value(def, target, depth + 1)
                }
            }
            NodeKind::Literal { value } => {
                if admits_literal(&node.annotations, value) {
                    Ok(literal_value(value))
                } else {
                    Err(Self::unsatisfiable(owner, format!("the literal {value} violates its own constraints")))
                }
            }
            NodeKind::Primitive { kind: Primitive::String } => self.string(&node.annotations, owner).map(Value::from),
            NodeKind::Primitive { kind: Primitive::Integer } => self.number(&node.annotations, true, owner),
            NodeKind::Primitive { kind: Primitive::Number } => self.number(&node.annotations, false, owner),
            NodeKind::Primitive { kind: Primitive::Boolean } => Ok(Value::Bool(self.rng.random_bool(0.5))),
            NodeKind::Union { variants } => match admitted_variants(node, variants).next() {
                Some(first) => self.value(&first, owner, depth),
                None => Err(Self::unsatisfiable(owner, "no variant of the union satisfies its constraints")),
            },
            NodeKind::Array { element } => {
                if depth >= self.options.max_depth {
                    return Ok(Value::Array(Vec::new()));
                }
                let len = self.rng.random_range(1..=self.options.max_array_len.max(1));
                let mut items = Vec::with_capacity(len);
                for _ in 0..len {
                    items.push(self.value(element, owner, depth + 1)?);
                }
                Ok(Value::Array(items))
            }
            NodeKind::Object { fields } => {
                let rate = self.options.optional_inclusion.clamp(0.0, 1.0);
                let mut o = Map::new();
                for f in fields {
                    let include = f.required || (depth < self.options.max_depth && self.rng.random_bool(rate));
                    if include {
                        o.insert(f.name.clone(), self.value(&f.node, owner, depth + 1)?);
                    }
                }
                Ok(Value::Object(o))
            }
            NodeKind::Any => Ok(Value::Null),
        }
    }

    /// Formats without a generator are non-asserting: the value then comes
    /// from the pattern, if any.
    fn string(&mut self, a: &Annotations, owner: &str) -> Result<String> {
        let known = a.format.as_deref().and_then(KnownFormat::parse);
        if let (Some(format), None) = (a.format.as_deref(), known) {
            debug!(owner = owner, format = format; "No generator for format; treating it as non-asserting");
        }
        match (known, a.pattern.as_deref()) {
            (Some(format), Some(pattern)) => reconcile(format, pattern, &mut self.rng).ok_or_else(|| {
                Self::unsatisfiable(owner, format!("no `{}` value matches pattern `{pattern}`", format.as_str()))
            }),
            (Some(format), None) => Ok(format.generate(&mut self.rng)),
            (None, Some(pattern)) => minimal_match(pattern)
                .ok_or_else(|| Self::unsatisfiable(owner, format!("no string matches pattern `{pattern}`"))),
            (None, None) => Ok("example".to_string()),
        }
    }

    fn number(&mut self, a: &Annotations, integer: bool, owner: &str) -> Result<Value> {
        let (lo, hi) = if integer {
            (a.minimum.map(f64::ceil), a.maximum.map(f64::floor))
        } else {
            (a.minimum, a.maximum)
        };
        if let (Some(l), Some(h)) = (lo, hi) {
            if l > h {
                let what = if integer { "no integer lies between" } else { "empty range between" };
                return Err(Self::unsatisfiable(
                    owner,
                    format!("{what} {} and {}", a.minimum.unwrap_or(l), a.maximum.unwrap_or(h)),
                ));
            }
        }
        let n = match (lo, hi) {
            (Some(l), Some(h)) if integer => ((l + h) / 2.0).floor(),
            (Some(l), Some(h)) => (l + h) / 2.0,
            (Some(l), None) => l,
            (None, Some(h)) => h,
            (None, None) => 0.0,
        };
        trace!(owner = owner, value = n; "Sampled number");
        Ok(json_number(n))
    }
}

/// Variants of `union` that can satisfy the union's own keywords, each
/// carrying those keywords. Literals outside the bounds or not matching the
/// pattern are dropped.
fn admitted_variants<'n>(
    union: &'n SchemaNode,
    variants: &'n [SchemaNode],
) -> impl Iterator<Item = SchemaNode> + 'n {
    let a = &union.annotations;
    variants.iter().filter_map(move |v| match &v.kind {
        NodeKind::Literal { value } if !admits_literal(a, value) => None,
        _ if a.constrains() => Some(with_constraints(v, a)),
        _ => Some(v.clone()),
    })
}

/// Bounds apply to numeric literals and patterns to string literals.
fn admits_literal(a: &Annotations, value: &Literal) -> bool {
    match value {
        Literal::Num(n) => a.minimum.is_none_or(|min| n.0 >= min) && a.maximum.is_none_or(|max| n.0 <= max),
        Literal::Str(s) => a
            .pattern
            .as_deref()
            .is_none_or(|p| Regex::new(p).is_ok_and(|re| re.is_match(s))),
        Literal::Bool(_) | Literal::Null => true,
    }
}

/// Target definition with the reference site's keywords layered on top.
fn with_constraints(def: &SchemaNode, site: &Annotations) -> SchemaNode {
    let mut merged = def.clone();
    let a = &mut merged.annotations;
    if site.format.is_some() {
        a.format = site.format.clone();
    }
    if site.pattern.is_some() {
        a.pattern = site.pattern.clone();
    }
    if site.minimum.is_some() {
        a.minimum = site.minimum;
    }
    if site.maximum.is_some() {
        a.maximum = site.maximum;
    }
    merged
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use regex::Regex;
    use serde_json::json;

    use super::*;
    use crate::ir::{Field, Literal};

    fn module(exports: Vec<(&str, SchemaNode)>, definitions: Vec<(&str, SchemaNode)>) -> ResolvedModule {
        ResolvedModule {
            module: "m.ts".into(),
            exports: exports.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
            definitions: definitions.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
            root: None,
        }
    }

    fn bounded(kind: Primitive, min: Option<f64>, max: Option<f64>) -> SchemaNode {
        let mut n = SchemaNode::primitive(kind);
        n.annotations.minimum = min;
        n.annotations.maximum = max;
        n
    }

    fn field(name: &str, node: SchemaNode, required: bool) -> Field {
        Field { name: name.into(), node, optional: !required, required }
    }

    #[test]
    fn numbers_use_midpoints_and_single_bounds() {
        let m = module(
            vec![
                ("Hour", bounded(Primitive::Integer, Some(0.0), Some(24.0))),
                ("Low", bounded(Primitive::Number, Some(2.5), None)),
                ("High", bounded(Primitive::Integer, None, Some(-3.0))),
                ("Free", bounded(Primitive::Number, None, None)),
            ],
            vec![],
        );
        let ex = Sampler::new(&m, SampleOptions::default()).sample_exports().unwrap();
        assert_eq!(ex["Hour"], [json!(12)]);
        assert_eq!(ex["Low"], [json!(2.5)]);
        assert_eq!(ex["High"], [json!(-3)]);
        assert_eq!(ex["Free"], [json!(0)]);
    }

    #[test]
    fn empty_ranges_are_unsatisfiable() {
        let m = module(vec![("Gap", bounded(Primitive::Integer, Some(0.2), Some(0.8)))], vec![]);
        let err = Sampler::new(&m, SampleOptions::default()).sample_exports().unwrap_err();
        assert_eq!(err.kind(), "UnsatisfiableConstraintError");

        let m = module(vec![("Swapped", bounded(Primitive::Number, Some(5.0), Some(1.0)))], vec![]);
        assert!(Sampler::new(&m, SampleOptions::default()).sample_exports().is_err());
    }

    #[test]
    fn unions_take_the_first_variant_and_enumerate_all() {
        let days = SchemaNode::union((1..=7).map(|n| SchemaNode::literal(Literal::number(n as f64))).collect());
        let m = module(vec![("WeekDay", days)], vec![]);
        let mut sampler = Sampler::new(&m, SampleOptions::default());
        assert_eq!(sampler.sample_exports().unwrap()["WeekDay"], [json!(1)]);
        let all = sampler.enumerate("WeekDay").unwrap();
        assert_eq!(all, (1..=7).map(|n| json!(n)).collect::<Vec<_>>());
    }

    #[test]
    fn enumerate_follows_aliases_to_their_union() {
        let kinds = SchemaNode::union(vec![
            SchemaNode::literal(Literal::Str("weekly".into())),
            SchemaNode::literal(Literal::Str("biweekly".into())),
        ]);
        let m = module(vec![("Alias", SchemaNode::reference("Kinds"))], vec![("Kinds", kinds)]);
        let all = Sampler::new(&m, SampleOptions::default()).enumerate("Alias").unwrap();
        assert_eq!(all, [json!("weekly"), json!("biweekly")]);
    }

    #[test]
    fn optional_fields_follow_the_inclusion_rate() {
        let obj = SchemaNode::new(NodeKind::Object {
            fields: vec![
                field("id", SchemaNode::primitive(Primitive::String), true),
                field("note", SchemaNode::primitive(Primitive::String), false),
            ],
        });
        let m = module(vec![("T", obj)], vec![]);
        let never = SampleOptions { optional_inclusion: 0.0, ..SampleOptions::default() };
        let always = SampleOptions { optional_inclusion: 1.0, ..SampleOptions::default() };
        assert_eq!(Sampler::new(&m, never).sample_exports().unwrap()["T"], [json!({ "id": "example" })]);
        assert_eq!(
            Sampler::new(&m, always).sample_exports().unwrap()["T"],
            [json!({ "id": "example", "note": "example" })]
        );
    }

    #[test]
    fn recursion_stops_at_the_depth_limit() {
        let node = SchemaNode::new(NodeKind::Object {
            fields: vec![
                field(
                    "children",
                    SchemaNode::new(NodeKind::Array { element: Box::new(SchemaNode::reference("Node")) }),
                    true,
                ),
                field("parent", SchemaNode::reference("Node"), false),
            ],
        });
        let m = module(vec![("Node", node)], vec![]);
        let opts = SampleOptions { max_depth: 3, optional_inclusion: 1.0, ..SampleOptions::default() };
        assert!(Sampler::new(&m, opts).sample_exports().is_ok());
    }

    #[test]
    fn required_cycles_are_unsatisfiable() {
        let node =
            SchemaNode::new(NodeKind::Object { fields: vec![field("next", SchemaNode::reference("Loop"), true)] });
        let m = module(vec![("Loop", node)], vec![]);
        let err = Sampler::new(&m, SampleOptions::default()).sample_exports().unwrap_err();
        assert_eq!(err.kind(), "UnsatisfiableConstraintError");
    }

    #[test]
    fn formats_and_patterns_drive_strings() {
        let mut id = SchemaNode::primitive(Primitive::String);
        id.annotations.format = Some("uuid".into());
        let mut code = SchemaNode::primitive(Primitive::String);
        code.annotations.pattern = Some("^[A-Z]{2}-[0-9]{4}$".into());
        let m = module(vec![("Id", id), ("Code", code)], vec![]);
        let ex = Sampler::new(&m, SampleOptions { seed: 42, ..SampleOptions::default() }).sample_exports().unwrap();
        assert!(format::KnownFormat::Uuid.check(ex["Id"][0].as_str().unwrap()));
        assert_eq!(ex["Code"], [json!("AA-0000")]);
    }

    fn literals(values: &[Literal]) -> SchemaNode {
        SchemaNode::union(values.iter().cloned().map(SchemaNode::literal).collect())
    }

    #[test]
    fn enumerations_honour_their_own_bounds() {
        let mut day = literals(&(1..=5).map(|n| Literal::number(n as f64)).collect::<Vec<_>>());
        day.annotations.minimum = Some(3.0);
        let m = module(vec![("Day", day)], vec![]);
        let mut sampler = Sampler::new(&m, SampleOptions::default());
        assert_eq!(sampler.sample_exports().unwrap()["Day"], [json!(3)]);
        assert_eq!(sampler.enumerate("Day").unwrap(), [json!(3), json!(4), json!(5)]);

        let mut none = literals(&[Literal::number(1.0), Literal::number(2.0)]);
        none.annotations.minimum = Some(10.0);
        let m = module(vec![("None", none)], vec![]);
        let err = Sampler::new(&m, SampleOptions::default()).sample_exports().unwrap_err();
        assert_eq!(err.kind(), "UnsatisfiableConstraintError");
        assert!(Sampler::new(&m, SampleOptions::default()).enumerate("None").is_err());
    }

    #[test]
    fn enumerations_honour_their_own_pattern() {
        let mut kind = literals(&[Literal::Str("abc".into()), Literal::Str("xyz".into())]);
        kind.annotations.pattern = Some("^x".into());
        let m = module(vec![("Kind", kind)], vec![]);
        assert_eq!(Sampler::new(&m, SampleOptions::default()).sample_exports().unwrap()["Kind"], [json!("xyz")]);
    }

    #[test]
    fn constrained_literals_must_satisfy_their_keywords() {
        let mut one = SchemaNode::literal(Literal::number(1.0));
        one.annotations.minimum = Some(3.0);
        let mut word = SchemaNode::literal(Literal::Str("abc".into()));
        word.annotations.pattern = Some("^a".into());
        let m = module(vec![("Word", word), ("One", one)], vec![]);
        let err = Sampler::new(&m, SampleOptions::default()).sample_exports().unwrap_err();
        let expected = CompileError::UnsatisfiableConstraint {
            owner: "One".into(),
            message: "the literal 1 violates its own constraints".into(),
        };
        assert_eq!(err, expected);
    }

    #[test]
    fn unknown_formats_fall_back_to_the_pattern() {
        let mut ip = SchemaNode::primitive(Primitive::String);
        ip.annotations.format = Some("ipv4".into());
        ip.annotations.pattern = Some(r"^[0-9]{1,3}(\.[0-9]{1,3}){3}$".into());
        let m = module(vec![("Ip", ip)], vec![]);
        assert_eq!(Sampler::new(&m, SampleOptions::default()).sample_exports().unwrap()["Ip"], [json!("0.0.0.0")]);
    }

    #[test]
    fn same_seed_same_examples() {
        let mut id = SchemaNode::primitive(Primitive::String);
        id.annotations.format = Some("jwt".into());
        let m = module(vec![("Token", id)], vec![]);
        let a = Sampler::new(&m, SampleOptions { seed: 9, ..SampleOptions::default() }).sample_exports().unwrap();
        let b = Sampler::new(&m, SampleOptions { seed: 9, ..SampleOptions::default() }).sample_exports().unwrap();
        assert_eq!(a, b);
    }

    proptest! {
        #[test]
        fn integers_stay_within_bounds(lo in -1000i64..1000, span in 0i64..1000) {
            let hi = lo + span;
            let m = module(vec![("N", bounded(Primitive::Integer, Some(lo as f64), Some(hi as f64)))], vec![]);
            let ex = Sampler::new(&m, SampleOptions::default()).sample_exports().unwrap();
            let n = ex["N"][0].as_i64().unwrap();
            prop_assert!(lo <= n && n <= hi);
        }

        #[test]
        fn arrays_respect_the_length_cap(max_len in 1usize..6, seed in any::<u64>()) {
            let arr = SchemaNode::new(NodeKind::Array { element: Box::new(SchemaNode::primitive(Primitive::Boolean)) });
            let m = module(vec![("A", arr)], vec![]);
            let opts = SampleOptions { seed, max_array_len: max_len, ..SampleOptions::default() };
            let ex = Sampler::new(&m, opts).sample_exports().unwrap();
            let len = ex["A"][0].as_array().unwrap().len();
            prop_assert!((1..=max_len).contains(&len));
        }

        #[test]
        fn jwt_examples_match_the_token_pattern(seed in any::<u64>()) {
            let pattern = r"[a-zA-Z0-9_=]{18,24}\.[a-zA-Z0-9_=]{48,64}\.[a-zA-Z0-9_=]{36,48}";
            let mut jwt = SchemaNode::primitive(Primitive::String);
            jwt.annotations.format = Some("jwt".into());
            jwt.annotations.pattern = Some(pattern.into());
            let m = module(vec![("JWT", jwt)], vec![]);
            let ex = Sampler::new(&m, SampleOptions { seed, ..SampleOptions::default() }).sample_exports().unwrap();
            prop_assert!(Regex::new(pattern).unwrap().is_match(ex["JWT"][0].as_str().unwrap()));
        }
    }
}
