//! Shared helpers for the integration suite, including a small draft-07
//! checker covering the keywords the compiler emits.
#![allow(dead_code)]

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use decl_schema::emit::definition_name;
use decl_schema::{CompileRequest, ExportSelector, SourceSet};

pub const COMMON: &str = include_str!("../fixtures/common.ts");
pub const RESPONSES: &str = include_str!("../fixtures/responses.ts");

static UUID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$").unwrap());
static JWT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_=-]+\.[A-Za-z0-9_=-]+\.[A-Za-z0-9_=-]+$").unwrap());

pub fn fixtures() -> SourceSet {
    let mut sources = SourceSet::new();
    sources.insert("src/common.ts", COMMON);
    sources.insert("src/responses.ts", RESPONSES);
    sources
}

pub fn request(sources: SourceSet, entry: &str, selector: &str) -> CompileRequest {
    CompileRequest {
        sources,
        entry_module: entry.into(),
        export_selector: ExportSelector::parse(selector),
        ..CompileRequest::default()
    }
}

/// Single-module source set keyed `m.ts`.
pub fn single(src: &str) -> SourceSet {
    let mut sources = SourceSet::new();
    sources.insert("m.ts", src);
    sources
}

/// Validate `instance` against the named definition of `doc`.
pub fn validate_definition(doc: &Value, name: &str, instance: &Value) -> Result<(), String> {
    let schema = doc["definitions"].get(name).ok_or_else(|| format!("no definition `{name}`"))?;
    check(doc, schema, instance, name)
}

/// Every `$ref` in the document resolves to a definition.
pub fn dangling_refs(doc: &Value) -> Vec<String> {
    let mut out = Vec::new();
    collect_refs(doc, &mut out);
    out.retain(|r| {
        definition_name(r).and_then(|name| doc["definitions"].get(&name).map(|_| ())).is_none()
    });
    out
}

fn collect_refs(node: &Value, out: &mut Vec<String>) {
    match node {
        Value::Object(o) => {
            for (k, v) in o {
                match (k.as_str(), v) {
                    ("$ref", Value::String(r)) => out.push(r.clone()),
                    _ => collect_refs(v, out),
                }
            }
        }
        Value::Array(xs) => xs.iter().for_each(|x| collect_refs(x, out)),
        _ => {}
    }
}

fn check(doc: &Value, schema: &Value, instance: &Value, path: &str) -> Result<(), String> {
    let fail = |what: String| Err(format!("{path}: {what} (value {instance})"));
    let schema = match schema {
        Value::Bool(true) => return Ok(()),
        Value::Bool(false) => return fail("schema `false`".into()),
        Value::Object(o) => o,
        other => return fail(format!("not a schema: {other}")),
    };

    if let Some(Value::String(r)) = schema.get("$ref") {
        let name = definition_name(r).ok_or_else(|| format!("{path}: bad $ref {r}"))?;
        let target = doc["definitions"].get(&name).ok_or_else(|| format!("{path}: dangling $ref {r}"))?;
        // draft-07 ignores siblings of $ref
        return check(doc, target, instance, path);
    }
    if let Some(Value::Array(all)) = schema.get("allOf") {
        for s in all {
            check(doc, s, instance, path)?;
        }
    }
    if let Some(Value::Array(any)) = schema.get("anyOf") {
        if !any.iter().any(|s| check(doc, s, instance, path).is_ok()) {
            return fail("no anyOf branch matches".into());
        }
    }
    if let Some(Value::String(ty)) = schema.get("type") {
        if !has_type(instance, ty) {
            return fail(format!("expected type {ty}"));
        }
    }
    if let Some(expected) = schema.get("const") {
        if expected != instance {
            return fail(format!("expected const {expected}"));
        }
    }
    if let Some(Value::Array(options)) = schema.get("enum") {
        if !options.contains(instance) {
            return fail("not one of the enum values".into());
        }
    }

    match instance {
        Value::String(s) => {
            if let Some(Value::String(pattern)) = schema.get("pattern") {
                let re = Regex::new(pattern).map_err(|e| format!("{path}: bad pattern: {e}"))?;
                if !re.is_match(s) {
                    return fail(format!("does not match {pattern}"));
                }
            }
            match schema.get("format").and_then(Value::as_str) {
                Some("uuid") if !UUID.is_match(s) => return fail("not a uuid".into()),
                Some("jwt") if !JWT.is_match(s) => return fail("not a jwt".into()),
                Some("date-time") if chrono::DateTime::parse_from_rfc3339(s).is_err() => {
                    return fail("not a date-time".into());
                }
                _ => {}
            }
        }
        Value::Number(n) => {
            let n = n.as_f64().unwrap_or(f64::NAN);
            if let Some(min) = schema.get("minimum").and_then(Value::as_f64) {
                if n < min {
                    return fail(format!("below minimum {min}"));
                }
            }
            if let Some(max) = schema.get("maximum").and_then(Value::as_f64) {
                if n > max {
                    return fail(format!("above maximum {max}"));
                }
            }
        }
        Value::Array(items) => {
            if let Some(item_schema) = schema.get("items") {
                for (i, item) in items.iter().enumerate() {
                    check(doc, item_schema, item, &format!("{path}[{i}]"))?;
                }
            }
        }
        Value::Object(o) => {
            let props = schema.get("properties").and_then(Value::as_object);
            if let Some(Value::Array(required)) = schema.get("required") {
                for key in required.iter().filter_map(Value::as_str) {
                    if !o.contains_key(key) {
                        return fail(format!("missing required `{key}`"));
                    }
                }
            }
            for (key, value) in o {
                match props.and_then(|p| p.get(key)) {
                    Some(s) => check(doc, s, value, &format!("{path}.{key}"))?,
                    None if schema.get("additionalProperties") == Some(&Value::Bool(false)) => {
                        return fail(format!("unexpected property `{key}`"));
                    }
                    None => {}
                }
            }
        }
        Value::Bool(_) | Value::Null => {}
    }
    Ok(())
}

fn has_type(instance: &Value, ty: &str) -> bool {
    match ty {
        "string" => instance.is_string(),
        "number" => instance.is_number(),
        "integer" => instance.as_f64().is_some_and(|n| n.fract() == 0.0),
        "boolean" => instance.is_boolean(),
        "null" => instance.is_null(),
        "array" => instance.is_array(),
        "object" => instance.is_object(),
        _ => false,
    }
}
