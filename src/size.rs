//! Static-size oracle: the byte width of a chain when every field is
//! statically sized.

use std::collections::HashSet;

use crate::options::Lazy;
use crate::registry;
use crate::schema::{FieldType, Node, NodeKind, Schema};

pub(crate) fn static_size(schema: &Schema) -> Option<usize> {
    let mut seen = HashSet::new();
    let total = chain_size(schema, &mut seen)?;
    usize::try_from(total).ok()
}

fn chain_size(schema: &Schema, seen: &mut HashSet<String>) -> Option<i64> {
    if schema.err.is_some() {
        return None;
    }
    let mut total = 0i64;
    for node in &schema.nodes {
        total = total.checked_add(node_size(node, seen)?)?;
    }
    Some(total)
}

fn node_size(node: &Node, seen: &mut HashSet<String>) -> Option<i64> {
    match &node.kind {
        NodeKind::Prim(p) => Some(p.width() as i64),
        // A bit field pulls its neighbors into a packed run; individual
        // widths are not meaningful here.
        NodeKind::Bit(_) => None,
        NodeKind::Seek => const_len(&node.opts.length),
        NodeKind::Str => {
            if node.opts.zero_terminated || node.opts.greedy {
                return None;
            }
            const_len(&node.opts.length)
        }
        NodeKind::Buffer => {
            if node.opts.read_until.is_some() {
                return None;
            }
            const_len(&node.opts.length)
        }
        NodeKind::Array(elem) => {
            if node.opts.read_until.is_some() || node.opts.length_in_bytes.is_some() {
                return None;
            }
            let count = const_len(&node.opts.length)?;
            let elem = type_size(elem, seen)?;
            count.checked_mul(elem)
        }
        NodeKind::Nest(inner) => type_size(inner, seen),
        NodeKind::Choice { .. } | NodeKind::Pointer(_) | NodeKind::SaveOffset => None,
    }
}

fn type_size(ft: &FieldType, seen: &mut HashSet<String>) -> Option<i64> {
    match ft {
        FieldType::Prim(p) => Some(p.width() as i64),
        FieldType::Inline(s) => chain_size(s, seen),
        FieldType::Alias(name) => {
            // A revisited alias means a cycle, which has no static size.
            if !seen.insert(name.clone()) {
                return None;
            }
            let schema = registry::get(name)?;
            chain_size(&schema, seen)
        }
    }
}

fn const_len(length: &Option<Lazy>) -> Option<i64> {
    match length {
        Some(Lazy::Const(n)) => Some(*n),
        _ => None,
    }
}
