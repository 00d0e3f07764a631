//! Required-field policy.
//!
//! Decides, per object field, whether the field is required and whether an
//! explicit `null` stands in for absence. Runs after resolution so the same
//! resolved tree can be emitted under different flag combinations.
use log::trace;

use crate::ir::{Literal, NodeKind, ResolvedModule, SchemaNode};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequiredPolicy {
    /// When false, source-optional fields also accept `null`.
    pub strict_null_checks: bool,
    /// Every field is required, whatever its source marker says.
    pub force_all_required: bool,
}

impl RequiredPolicy {
    /// A copy of `module` with every object field decided.
    pub fn apply(&self, module: &ResolvedModule) -> ResolvedModule {
        let mut out = module.clone();
        for node in out.exports.values_mut().chain(out.definitions.values_mut()) {
            self.apply_node(node);
        }
        trace!(module = out.module.as_str(), policy:? = self; "Applied required-field policy");
        out
    }

    fn apply_node(&self, node: &mut SchemaNode) {
        match &mut node.kind {
            NodeKind::Object { fields } => {
                for field in fields.iter_mut() {
                    self.apply_node(&mut field.node);
                    field.required = self.force_all_required || !field.optional;
                    if field.optional && !self.strict_null_checks && !field.node.accepts_null() {
                        widen_with_null(&mut field.node);
                    }
                }
            }
            NodeKind::Array { element } => self.apply_node(element),
            NodeKind::Union { variants } => variants.iter_mut().for_each(|v| self.apply_node(v)),
            NodeKind::Literal { .. } | NodeKind::Primitive { .. } | NodeKind::Reference { .. } | NodeKind::Any => {}
        }
    }
}

/// `T` becomes `T | null`; the description stays on the outer node.
fn widen_with_null(node: &mut SchemaNode) {
    let mut inner = std::mem::replace(node, SchemaNode::literal(Literal::Null));
    let description = inner.annotations.description.take();
    let extensions = std::mem::take(&mut inner.annotations.extensions);
    let mut widened = SchemaNode::union(vec![inner, SchemaNode::literal(Literal::Null)]);
    widened.annotations.description = description;
    widened.annotations.extensions = extensions;
    *node = widened;
}
