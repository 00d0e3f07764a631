//! Doc-comment annotation extraction.
//!
//! A closed [`Tag`] vocabulary is recognized; anything else lands in
//! [`ConstraintRecord::extensions`] verbatim so newer tags pass through
//! without breaking older compilers.
use indexmap::IndexMap;

use crate::error::{CompileError, Result};
use crate::ir::Primitive;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Format,
    Pattern,
    Minimum,
    Maximum,
    Description,
    ItemsFormat,
    ItemsType,
    Abstract,
    Type,
}

impl Tag {
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "format" => Tag::Format,
            "pattern" => Tag::Pattern,
            "minimum" => Tag::Minimum,
            "maximum" => Tag::Maximum,
            "description" => Tag::Description,
            "items.format" => Tag::ItemsFormat,
            "items.type" => Tag::ItemsType,
            "abstract" => Tag::Abstract,
            "type" => Tag::Type,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tag::Format => "format",
            Tag::Pattern => "pattern",
            Tag::Minimum => "minimum",
            Tag::Maximum => "maximum",
            Tag::Description => "description",
            Tag::ItemsFormat => "items.format",
            Tag::ItemsType => "items.type",
            Tag::Abstract => "abstract",
            Tag::Type => "type",
        }
    }
}

/// Constraints parsed from one doc comment. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstraintRecord {
    pub format: Option<String>,
    pub pattern: Option<String>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub description: Option<String>,
    pub items_format: Option<String>,
    pub items_type: Option<Primitive>,
    /// Non-normative design note; ends up in `description`, never in validation.
    pub abstract_note: Option<String>,
    pub type_override: Option<Primitive>,
    pub extensions: IndexMap<String, String>,
}

impl ConstraintRecord {
    pub fn is_empty(&self) -> bool {
        *self == ConstraintRecord::default()
    }

    /// Description with the abstract note appended as a trailing paragraph.
    pub fn full_description(&self) -> Option<String> {
        match (&self.description, &self.abstract_note) {
            (Some(d), Some(a)) => Some(format!("{d}\n\n{a}")),
            (Some(d), None) => Some(d.clone()),
            (None, Some(a)) => Some(a.clone()),
            (None, None) => None,
        }
    }
}

/// Strip comment decoration: leading `*` on each line and surrounding blank lines.
fn clean_lines(raw: &str) -> Vec<String> {
    let mut lines: Vec<String> = raw
        .lines()
        .map(|line| {
            let t = line.trim();
            let t = t.strip_prefix('*').unwrap_or(t);
            t.strip_prefix(' ').unwrap_or(t).trim_end().to_string()
        })
        .collect();
    while lines.first().is_some_and(|l| l.is_empty()) {
        lines.remove(0);
    }
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines
}

/// Split cleaned text into (tag, value) chunks. The untagged leading text is
/// reported under the `description` tag.
fn split_tags(lines: &[String]) -> Vec<(String, String)> {
    let mut out: Vec<(String, String)> = Vec::new();
    let mut lead = String::new();
    for line in lines {
        let trimmed = line.trim_start();
        if let Some(rest) = trimmed.strip_prefix('@') {
            let (name, value) = match rest.find(char::is_whitespace) {
                Some(i) => (&rest[..i], rest[i..].trim()),
                None => (rest, ""),
            };
            out.push((name.to_string(), value.to_string()));
        } else if let Some((_, value)) = out.last_mut() {
            if !value.is_empty() {
                value.push('\n');
            }
            value.push_str(trimmed);
        } else {
            if !lead.is_empty() {
                lead.push('\n');
            }
            lead.push_str(trimmed);
        }
    }
    let lead = lead.trim().to_string();
    if !lead.is_empty() {
        out.insert(0, ("description".to_string(), lead));
    }
    for (_, value) in out.iter_mut() {
        *value = value.trim().to_string();
    }
    out
}

/// Parse the doc comment preceding `owner` (or its member `field`).
pub fn extract(raw: &str, owner: &str, field: Option<&str>) -> Result<ConstraintRecord> {
    let malformed = |tag: &str, message: String| CompileError::MalformedAnnotation {
        owner: owner.to_string(),
        field: field.map(str::to_string),
        tag: tag.to_string(),
        message,
    };
    let number = |tag: &str, value: &str| -> Result<f64> {
        value
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .ok_or_else(|| malformed(tag, format!("`{value}` is not a number")))
    };
    let primitive = |tag: &str, value: &str| -> Result<Primitive> {
        Primitive::parse(value)
            .ok_or_else(|| malformed(tag, format!("`{value}` is not one of string, integer, number, boolean")))
    };

    let mut rec = ConstraintRecord::default();
    for (name, value) in split_tags(&clean_lines(raw)) {
        let Some(tag) = Tag::parse(&name) else {
            rec.extensions.insert(name, value);
            continue;
        };
        if value.is_empty() {
            return Err(malformed(tag.as_str(), "missing value".into()));
        }
        match tag {
            Tag::Format => rec.format = Some(value),
            Tag::Pattern => {
                regex::Regex::new(&value).map_err(|e| malformed(tag.as_str(), e.to_string()))?;
                rec.pattern = Some(value);
            }
            Tag::Minimum => rec.minimum = Some(number(tag.as_str(), &value)?),
            Tag::Maximum => rec.maximum = Some(number(tag.as_str(), &value)?),
            Tag::Description => {
                rec.description = Some(match rec.description.take() {
                    Some(lead) => format!("{lead}\n{value}"),
                    None => value,
                })
            }
            Tag::ItemsFormat => rec.items_format = Some(value),
            Tag::ItemsType => rec.items_type = Some(primitive(tag.as_str(), &value)?),
            Tag::Abstract => rec.abstract_note = Some(value),
            Tag::Type => rec.type_override = Some(primitive(tag.as_str(), &value)?),
        }
    }
    Ok(rec)
}
