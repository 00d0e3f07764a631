//! Draft-07 schema emission from a resolved module.
//!
//! Output is built with `serde_json` in `preserve_order` mode, so the
//! document's key order is exactly the insertion order below and repeated
//! runs over unchanged input are byte-identical.
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde_json::{Map, Value, json};

use crate::error::{CompileError, Result};
use crate::ir::{Literal, NodeKind, ResolvedModule, SchemaNode};
use crate::sample::format::{KnownFormat, reconcile};

pub const DRAFT_07: &str = "http://json-schema.org/draft-07/schema#";
const DEFINITIONS_PREFIX: &str = "#/definitions/";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitOptions {
    /// Close every object with `additionalProperties: false`.
    pub no_extra_props: bool,
    /// Copy unrecognized doc tags into the schema as extra keywords.
    pub emit_extensions: bool,
}

/// Build the schema document for `module`.
pub fn emit_document(module: &ResolvedModule, options: &EmitOptions) -> Result<Value> {
    check_format_patterns(module)?;

    let mut definitions = Map::new();
    for (name, node) in module.exports.iter().chain(module.definitions.iter()) {
        if !definitions.contains_key(name) {
            definitions.insert(name.clone(), node_schema(node, options));
        }
    }

    let mut doc = Map::new();
    doc.insert("$schema".into(), Value::from(DRAFT_07));
    if let Some(root) = &module.root {
        doc.insert("$ref".into(), Value::from(definition_pointer(root)));
    }
    doc.insert("definitions".into(), Value::Object(definitions));
    Ok(Value::Object(doc))
}

/// Pretty-printed document text with a trailing newline.
pub fn to_pretty_json(doc: &Value) -> String {
    let mut text = serde_json::to_string_pretty(doc).unwrap_or_default();
    text.push('\n');
    text
}

// -------------------------------- Pointers --------------------------------- //

/// `#/definitions/<name>` with JSON-pointer escaping, percent-encoded for
/// use as a URI fragment (`Payload<Lesson[]>` → `Payload%3CLesson%5B%5D%3E`).
pub fn definition_pointer(name: &str) -> String {
    let escaped = name.replace('~', "~0").replace('/', "~1");
    let mut out = String::from(DEFINITIONS_PREFIX);
    for b in escaped.bytes() {
        if b.is_ascii_alphanumeric() || b"-._~!$&'()*+,;=:@".contains(&b) {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

/// Inverse of [`definition_pointer`].
pub fn definition_name(pointer: &str) -> Option<String> {
    let encoded = pointer.strip_prefix(DEFINITIONS_PREFIX)?;
    let bytes = encoded.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = encoded.get(i + 1..i + 3)?;
            decoded.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            decoded.push(bytes[i]);
            i += 1;
        }
    }
    let name = String::from_utf8(decoded).ok()?;
    Some(name.replace("~1", "/").replace("~0", "~"))
}

// --------------------------------- Values ---------------------------------- //

/// Integral values become JSON integers.
pub(crate) fn json_number(n: f64) -> Value {
    if n.is_finite() && n.fract() == 0.0 && n >= i64::MIN as f64 && n <= i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        Value::from(n)
    }
}

pub(crate) fn literal_value(lit: &Literal) -> Value {
    match lit {
        Literal::Str(s) => Value::from(s.clone()),
        Literal::Num(n) => json_number(n.0),
        Literal::Bool(b) => Value::from(*b),
        Literal::Null => Value::Null,
    }
}

// ---------------------------------- Nodes ---------------------------------- //

fn node_schema(node: &SchemaNode, options: &EmitOptions) -> Value {
    let a = &node.annotations;
    let mut o = Map::new();
    if let Some(description) = &a.description {
        o.insert("description".into(), Value::from(description.clone()));
    }

    match &node.kind {
        NodeKind::Reference { target } => {
            let r = Value::from(definition_pointer(target));
            if a.constrains() {
                o.insert("allOf".into(), json!([{ "$ref": r }]));
            } else {
                o.insert("$ref".into(), r);
            }
        }
        NodeKind::Primitive { kind } => {
            o.insert("type".into(), Value::from(kind.as_str()));
        }
        NodeKind::Literal { value: Literal::Null } => {
            o.insert("type".into(), Value::from("null"));
        }
        NodeKind::Literal { value } => {
            o.insert("type".into(), Value::from(value.kind()));
            o.insert("const".into(), literal_value(value));
        }
        NodeKind::Union { variants } => match node.enum_literals() {
            Some(lits) => {
                let first = lits.first().map(|l| l.kind());
                if lits.iter().all(|l| Some(l.kind()) == first) {
                    if let Some(kind) = first {
                        o.insert("type".into(), Value::from(kind));
                    }
                }
                o.insert("enum".into(), Value::Array(lits.into_iter().map(literal_value).collect()));
            }
            None => {
                let arms = variants.iter().map(|v| node_schema(v, options)).collect();
                o.insert("anyOf".into(), Value::Array(arms));
            }
        },
        NodeKind::Array { element } => {
            o.insert("type".into(), Value::from("array"));
            o.insert("items".into(), node_schema(element, options));
        }
        NodeKind::Object { fields } => {
            o.insert("type".into(), Value::from("object"));
            let mut props = Map::new();
            for f in fields {
                props.insert(f.name.clone(), node_schema(&f.node, options));
            }
            o.insert("properties".into(), Value::Object(props));
            let required: Vec<Value> =
                fields.iter().filter(|f| f.required).map(|f| Value::from(f.name.clone())).collect();
            if !required.is_empty() {
                o.insert("required".into(), Value::Array(required));
            }
            if options.no_extra_props {
                o.insert("additionalProperties".into(), Value::Bool(false));
            }
        }
        NodeKind::Any => {}
    }

    if let Some(format) = &a.format {
        o.insert("format".into(), Value::from(format.clone()));
    }
    if let Some(pattern) = &a.pattern {
        o.insert("pattern".into(), Value::from(pattern.clone()));
    }
    if let Some(min) = a.minimum {
        o.insert("minimum".into(), json_number(min));
    }
    if let Some(max) = a.maximum {
        o.insert("maximum".into(), json_number(max));
    }
    if options.emit_extensions {
        for (tag, value) in &a.extensions {
            if !o.contains_key(tag) {
                o.insert(tag.clone(), Value::from(value.clone()));
            }
        }
    }
    Value::Object(o)
}

// ------------------------------ Consistency -------------------------------- //

/// Every string carrying both a known format and a pattern must admit at
/// least one value; a fixed seed keeps the verdict deterministic.
fn check_format_patterns(module: &ResolvedModule) -> Result<()> {
    let mut rng = StdRng::seed_from_u64(0);
    for (owner, node) in module.exports.iter().chain(module.definitions.iter()) {
        check_node(node, owner, None, &mut rng)?;
    }
    Ok(())
}

fn check_node(node: &SchemaNode, owner: &str, field: Option<&str>, rng: &mut StdRng) -> Result<()> {
    let a = &node.annotations;
    if let (Some(format), Some(pattern)) = (a.format.as_deref(), a.pattern.as_deref()) {
        if let Some(known) = KnownFormat::parse(format) {
            if reconcile(known, pattern, rng).is_none() {
                return Err(CompileError::conflict(
                    owner,
                    field,
                    format!("no `{format}` value matches pattern `{pattern}`"),
                ));
            }
        }
    }
    match &node.kind {
        NodeKind::Object { fields } => {
            for f in fields {
                check_node(&f.node, owner, Some(&f.name), rng)?;
            }
        }
        NodeKind::Array { element } => check_node(element, owner, field, rng)?,
        NodeKind::Union { variants } => {
            for v in variants {
                check_node(v, owner, field, rng)?;
            }
        }
        NodeKind::Literal { .. } | NodeKind::Primitive { .. } | NodeKind::Reference { .. } | NodeKind::Any => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use super::*;
    use crate::ir::{Field, Primitive};

    fn module(exports: Vec<(&str, SchemaNode)>, definitions: Vec<(&str, SchemaNode)>) -> ResolvedModule {
        ResolvedModule {
            module: "m.ts".into(),
            exports: exports.into_iter().map(|(k, v)| (k.to_string(), v)).collect::<IndexMap<_, _>>(),
            definitions: definitions.into_iter().map(|(k, v)| (k.to_string(), v)).collect::<IndexMap<_, _>>(),
            root: None,
        }
    }

    fn field(name: &str, node: SchemaNode, required: bool) -> Field {
        Field { name: name.into(), node, optional: !required, required }
    }

    #[test]
    fn objects_keep_declaration_order_and_required_list() {
        let mut id = SchemaNode::primitive(Primitive::String);
        id.annotations.format = Some("uuid".into());
        let lesson = SchemaNode::new(NodeKind::Object {
            fields: vec![
                field("id", id, true),
                field("title", SchemaNode::primitive(Primitive::String), true),
                field("description", SchemaNode::primitive(Primitive::String), false),
            ],
        });
        let doc = emit_document(&module(vec![("Lesson", lesson)], vec![]), &EmitOptions::default()).unwrap();
        assert_eq!(
            doc,
            json!({
                "$schema": DRAFT_07,
                "definitions": {
                    "Lesson": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "string", "format": "uuid" },
                            "title": { "type": "string" },
                            "description": { "type": "string" }
                        },
                        "required": ["id", "title"]
                    }
                }
            })
        );
        let keys: Vec<_> = doc["definitions"]["Lesson"]["properties"].as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, ["id", "title", "description"]);
    }

    #[test]
    fn literal_unions_become_enums() {
        let days = SchemaNode::union((1..=7).map(|n| SchemaNode::literal(Literal::number(n as f64))).collect());
        let mixed = SchemaNode::union(vec![
            SchemaNode::literal(Literal::Str("a".into())),
            SchemaNode::literal(Literal::Null),
        ]);
        let doc = emit_document(&module(vec![("WeekDay", days), ("Mixed", mixed)], vec![]), &EmitOptions::default())
            .unwrap();
        assert_eq!(doc["definitions"]["WeekDay"], json!({ "type": "number", "enum": [1, 2, 3, 4, 5, 6, 7] }));
        assert_eq!(doc["definitions"]["Mixed"], json!({ "enum": ["a", null] }));
    }

    #[test]
    fn constrained_references_wrap_in_all_of() {
        let mut constrained = SchemaNode::reference("Id");
        constrained.annotations.format = Some("uuid".into());
        let mut described = SchemaNode::reference("Id");
        described.annotations.description = Some("owner".into());
        let holder = SchemaNode::new(NodeKind::Object {
            fields: vec![field("a", constrained, true), field("b", described, true)],
        });
        let doc = emit_document(
            &module(vec![("Holder", holder)], vec![("Id", SchemaNode::primitive(Primitive::String))]),
            &EmitOptions { no_extra_props: true, emit_extensions: false },
        )
        .unwrap();
        let props = &doc["definitions"]["Holder"]["properties"];
        assert_eq!(props["a"], json!({ "allOf": [{ "$ref": "#/definitions/Id" }], "format": "uuid" }));
        assert_eq!(props["b"], json!({ "description": "owner", "$ref": "#/definitions/Id" }));
        assert_eq!(doc["definitions"]["Holder"]["additionalProperties"], json!(false));
    }

    #[test]
    fn single_selection_adds_a_root_reference() {
        let mut m = module(vec![("Payload<Lesson[]>", SchemaNode::new(NodeKind::Any))], vec![]);
        m.root = Some("Payload<Lesson[]>".into());
        let doc = emit_document(&m, &EmitOptions::default()).unwrap();
        assert_eq!(doc["$ref"], json!("#/definitions/Payload%3CLesson%5B%5D%3E"));
        assert_eq!(definition_name(doc["$ref"].as_str().unwrap()).as_deref(), Some("Payload<Lesson[]>"));
        assert_eq!(definition_name(&definition_pointer("a/b~c")).as_deref(), Some("a/b~c"));
        let keys: Vec<_> = doc.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, ["$schema", "$ref", "definitions"]);
    }

    #[test]
    fn extensions_are_opt_in() {
        let mut node = SchemaNode::primitive(Primitive::String);
        node.annotations.extensions.insert("deprecated".into(), "use Token".into());
        let m = module(vec![("T", node)], vec![]);
        let plain = emit_document(&m, &EmitOptions::default()).unwrap();
        assert_eq!(plain["definitions"]["T"], json!({ "type": "string" }));
        let with = emit_document(&m, &EmitOptions { no_extra_props: false, emit_extensions: true }).unwrap();
        assert_eq!(with["definitions"]["T"]["deprecated"], json!("use Token"));
    }

    #[test]
    fn unsatisfiable_format_and_pattern_conflict() {
        let mut node = SchemaNode::primitive(Primitive::String);
        node.annotations.format = Some("uuid".into());
        node.annotations.pattern = Some("^[0-9]{3}$".into());
        let holder = SchemaNode::new(NodeKind::Object { fields: vec![field("id", node, true)] });
        let err = emit_document(&module(vec![("T", holder)], vec![]), &EmitOptions::default()).unwrap_err();
        assert_eq!(
            err,
            CompileError::conflict("T", Some("id"), "no `uuid` value matches pattern `^[0-9]{3}$`")
        );
    }

    #[test]
    fn numbers_prefer_integers() {
        assert_eq!(json_number(24.0), json!(24));
        assert_eq!(json_number(0.5), json!(0.5));
    }
}
