pub mod decoder;
pub mod encoder;
pub mod wire;

use std::collections::HashMap;

use crate::error::BuildError;
use crate::registry;
use crate::schema::{FieldType, NodeKind, Schema};

/// Errors surfaced while preparing a schema for traversal.
pub(crate) enum PlanError {
    Build(BuildError),
    UnknownAlias(String),
}

/// Collect every alias a schema transitively references, fetching each from
/// the registry exactly once. Requesting an already-collected alias is a
/// no-op, which is what lets mutually recursive schemas terminate. Also
/// surfaces deferred builder errors from the root, inline schemas and
/// referenced aliases.
pub(crate) fn plan(root: &Schema) -> Result<HashMap<String, Schema>, PlanError> {
    let mut resolved: HashMap<String, Schema> = HashMap::new();
    let mut pending: Vec<String> = Vec::new();
    scan(root, &mut pending)?;
    while let Some(name) = pending.pop() {
        if resolved.contains_key(&name) {
            continue;
        }
        let schema =
            registry::get(&name).ok_or_else(|| PlanError::UnknownAlias(name.clone()))?;
        scan(&schema, &mut pending)?;
        resolved.insert(name, schema);
    }
    Ok(resolved)
}

fn scan(schema: &Schema, pending: &mut Vec<String>) -> Result<(), PlanError> {
    if let Some(e) = &schema.err {
        return Err(PlanError::Build(e.clone()));
    }
    for node in &schema.nodes {
        match &node.kind {
            NodeKind::Array(ft) | NodeKind::Nest(ft) | NodeKind::Pointer(ft) => {
                scan_type(ft, pending)?;
            }
            NodeKind::Choice { cases, default } => {
                for ft in cases.values() {
                    scan_type(ft, pending)?;
                }
                if let Some(ft) = default {
                    scan_type(ft, pending)?;
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn scan_type(ft: &FieldType, pending: &mut Vec<String>) -> Result<(), PlanError> {
    match ft {
        FieldType::Prim(_) => Ok(()),
        FieldType::Alias(name) => {
            pending.push(name.clone());
            Ok(())
        }
        FieldType::Inline(s) => scan(s, pending),
    }
}

/// Dotted field name for error payloads.
pub(crate) fn qualify(path: &[String], name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else if name.is_empty() {
        path.join(".")
    } else {
        format!("{}.{}", path.join("."), name)
    }
}

pub(crate) fn bit_width(node: &crate::schema::Node) -> u32 {
    match node.kind {
        NodeKind::Bit(w) => w,
        _ => 0,
    }
}

/// Smallest supported packed width (8, 16, 24 or 32 bits) holding a run.
pub(crate) fn round_up_bits(total: u32) -> u32 {
    match total {
        0..=8 => 8,
        9..=16 => 16,
        17..=24 => 24,
        _ => 32,
    }
}
