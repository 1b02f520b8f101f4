//! Encode traversal: walk a schema chain over a record and serialize it
//! into a byte sink.

use std::collections::HashMap;

use crate::codec::wire::Sink;
use crate::codec::{bit_width, plan, qualify, round_up_bits, wire, PlanError};
use crate::error::{EncodeError, SchemaError};
use crate::kind::Endian;
use crate::options::{Lazy, ReadUntil, Side};
use crate::schema::{FieldType, Node, NodeKind, Schema};
use crate::value::{Record, Value};

/// Encode a record according to `schema`.
pub fn encode(schema: &Schema, value: &Value) -> Result<Vec<u8>, SchemaError> {
    let aliases = plan(schema).map_err(|e| match e {
        PlanError::Build(b) => SchemaError::Build(b),
        PlanError::UnknownAlias(n) => SchemaError::Encode(EncodeError::UnknownAlias(n)),
    })?;
    let mut rec = match value {
        Value::Record(r) => r.clone(),
        other => {
            return Err(SchemaError::Encode(EncodeError::NotARecord {
                actual: other.type_name(),
            }))
        }
    };
    let enc = Encoder { aliases };
    let mut sink = Sink::with_capacity(schema.capacity);
    let mut path = Vec::new();
    enc.run_into(schema, &mut rec, &mut sink, &mut path)
        .map_err(SchemaError::Encode)?;
    Ok(sink.into_bytes())
}

struct Encoder {
    aliases: HashMap<String, Schema>,
}

impl Encoder {
    fn run_into(
        &self,
        schema: &Schema,
        rec: &mut Record,
        sink: &mut Sink,
        path: &mut Vec<String>,
    ) -> Result<(), EncodeError> {
        let mut run: Vec<&Node> = Vec::new();
        for node in &schema.nodes {
            match &node.kind {
                NodeKind::Bit(_) => run.push(node),
                // A nest does not break a bit run; the packed write happens
                // when the run flushes.
                NodeKind::Nest(_) => self.encode_node(node, rec, sink, path)?,
                _ => {
                    self.flush_bits(&mut run, rec, sink, path)?;
                    self.encode_node(node, rec, sink, path)?;
                }
            }
        }
        self.flush_bits(&mut run, rec, sink, path)
    }

    /// Encode one field, wrapping it in the `encoder` pre-transform: the
    /// field value is replaced for the duration of this node and restored
    /// afterwards so sibling fields see untransformed data.
    fn encode_node(
        &self,
        node: &Node,
        rec: &mut Record,
        sink: &mut Sink,
        path: &mut Vec<String>,
    ) -> Result<(), EncodeError> {
        let hook = match (&node.opts.encoder, node.name.is_empty()) {
            (Some(hook), false) => hook.clone(),
            _ => return self.encode_field(node, rec, sink, path),
        };
        let original = rec.get(&node.name).cloned();
        if let Some(orig) = &original {
            let transformed = hook(orig, rec);
            rec.insert(node.name.clone(), transformed);
        }
        let result = self.encode_field(node, rec, sink, path);
        match original {
            Some(orig) => {
                rec.insert(node.name.clone(), orig);
            }
            None => {
                rec.remove(&node.name);
            }
        }
        result
    }

    fn encode_field(
        &self,
        node: &Node,
        rec: &mut Record,
        sink: &mut Sink,
        path: &mut Vec<String>,
    ) -> Result<(), EncodeError> {
        match &node.kind {
            NodeKind::Prim(p) => {
                let value = self.field_value(node, rec, path)?;
                wire::write_prim(sink, *p, value, &node.name)
            }
            NodeKind::Str => self.encode_string(node, rec, sink, path),
            NodeKind::Buffer => {
                let value = self.field_value(node, rec, path)?;
                let bytes = value.as_bytes().ok_or_else(|| EncodeError::TypeMismatch {
                    field: qualify(path, &node.name),
                    expected: "bytes",
                    actual: value.type_name(),
                })?;
                sink.put_slice(bytes);
                Ok(())
            }
            NodeKind::Array(elem) => self.encode_array(node, elem, rec, sink, path),
            NodeKind::Choice { cases, default } => {
                self.encode_choice(node, cases, default.as_ref(), rec, sink, path)
            }
            NodeKind::Seek => {
                let n = self.eval(&node.opts.length, "length", rec)?;
                // There is no way to move backwards in a sink.
                let n = usize::try_from(n).map_err(|_| EncodeError::BadLength {
                    field: "seek".to_string(),
                    value: n,
                })?;
                sink.put_zeros(n);
                Ok(())
            }
            NodeKind::Nest(inner) => self.encode_dispatch(node, inner, rec, sink, path),
            // Pointer targets were written by whatever owns that region;
            // save_offset has nothing to write. Both are zero-width here.
            NodeKind::Pointer(_) | NodeKind::SaveOffset => Ok(()),
            // Accumulated by the chain walker; never dispatched here.
            NodeKind::Bit(_) => Ok(()),
        }
    }

    fn encode_string(
        &self,
        node: &Node,
        rec: &mut Record,
        sink: &mut Sink,
        path: &mut Vec<String>,
    ) -> Result<(), EncodeError> {
        let opts = &node.opts;
        let value = self.field_value(node, rec, path)?;
        let text = value.as_str().ok_or_else(|| EncodeError::TypeMismatch {
            field: qualify(path, &node.name),
            expected: "string",
            actual: value.type_name(),
        })?;
        let mut bytes = opts
            .encoding
            .encode(text)
            .ok_or_else(|| EncodeError::Unencodable {
                field: qualify(path, &node.name),
                encoding: opts.encoding.name(),
            })?;
        if opts.length.is_some() {
            let n = self.eval_len(&node.opts.length, &node.name, rec)?;
            if bytes.len() > n {
                bytes.truncate(n);
            } else if opts.padding == Side::Left {
                let mut padded = vec![opts.pad; n - bytes.len()];
                padded.extend_from_slice(&bytes);
                bytes = padded;
            } else {
                bytes.resize(n, opts.pad);
            }
        }
        sink.put_slice(&bytes);
        if opts.zero_terminated {
            sink.put_u8(0);
        }
        Ok(())
    }

    fn encode_array(
        &self,
        node: &Node,
        elem: &FieldType,
        rec: &mut Record,
        sink: &mut Sink,
        path: &mut Vec<String>,
    ) -> Result<(), EncodeError> {
        let value = rec.get(&node.name).ok_or_else(|| EncodeError::MissingField {
            field: qualify(path, &node.name),
        })?;
        let seq = match value {
            Value::Array(a) => a.clone(),
            Value::Map(_) => {
                return Err(EncodeError::KeyedArray {
                    field: qualify(path, &node.name),
                })
            }
            other => {
                return Err(EncodeError::TypeMismatch {
                    field: qualify(path, &node.name),
                    expected: "array",
                    actual: other.type_name(),
                })
            }
        };
        if let Some(assert) = &node.opts.assert {
            let value = Value::Array(seq.clone());
            if !assert.holds(rec, &value) {
                return Err(EncodeError::AssertFailed {
                    field: qualify(path, &node.name),
                    value: value.to_string(),
                });
            }
        }
        let limit = match &node.opts.length {
            Some(_) => {
                let n = self.eval_len(&node.opts.length, &node.name, rec)?;
                seq.len().min(n)
            }
            None => seq.len(),
        };
        // Items go through a temporary sink so length_in_bytes can trim the
        // tail before it reaches the caller's sink.
        let mut tmp = Sink::with_capacity(64);
        for item in seq.iter().take(limit) {
            self.encode_item(node, elem, item, &mut tmp, path)?;
            if let Some(pred) = &node.opts.encode_until {
                if pred(item, rec) {
                    break;
                }
            } else if let Some(ReadUntil::Until(pred)) = &node.opts.read_until {
                if pred(item, tmp.snapshot()) {
                    break;
                }
            }
        }
        if node.opts.length_in_bytes.is_some() {
            let n = self.eval_len(&node.opts.length_in_bytes, &node.name, rec)?;
            tmp.truncate(n);
        }
        sink.put_slice(tmp.snapshot());
        Ok(())
    }

    fn encode_item(
        &self,
        node: &Node,
        elem: &FieldType,
        item: &Value,
        sink: &mut Sink,
        path: &mut Vec<String>,
    ) -> Result<(), EncodeError> {
        match elem {
            FieldType::Prim(p) => wire::write_prim(sink, *p, item, &node.name),
            FieldType::Alias(name) => {
                let schema = self.alias(name)?;
                self.encode_sub(&schema, node, item, sink, path)
            }
            FieldType::Inline(schema) => self.encode_sub(schema, node, item, sink, path),
        }
    }

    /// Encode a record-valued item or branch through a sub-schema.
    fn encode_sub(
        &self,
        schema: &Schema,
        node: &Node,
        item: &Value,
        sink: &mut Sink,
        path: &mut Vec<String>,
    ) -> Result<(), EncodeError> {
        let mut sub = match item {
            Value::Record(r) => r.clone(),
            other => {
                return Err(EncodeError::TypeMismatch {
                    field: qualify(path, &node.name),
                    expected: "record",
                    actual: other.type_name(),
                })
            }
        };
        if !node.name.is_empty() {
            path.push(node.name.clone());
        }
        let result = self.run_into(schema, &mut sub, sink, path);
        if !node.name.is_empty() {
            path.pop();
        }
        result
    }

    fn encode_choice(
        &self,
        node: &Node,
        cases: &HashMap<i64, FieldType>,
        default: Option<&FieldType>,
        rec: &mut Record,
        sink: &mut Sink,
        path: &mut Vec<String>,
    ) -> Result<(), EncodeError> {
        let tag = self.eval(&node.opts.tag, "tag", rec)?;
        let chosen = cases
            .get(&tag)
            .or(default)
            .ok_or_else(|| EncodeError::UndefinedTag {
                field: qualify(path, &node.name),
                tag,
            })?;
        self.encode_dispatch(node, chosen, rec, sink, path)
    }

    /// Encode a branch/nested type from the named field, or from the
    /// current record when the node is unnamed.
    fn encode_dispatch(
        &self,
        node: &Node,
        target: &FieldType,
        rec: &mut Record,
        sink: &mut Sink,
        path: &mut Vec<String>,
    ) -> Result<(), EncodeError> {
        match target {
            FieldType::Prim(p) => {
                let value = self.field_value(node, rec, path)?;
                wire::write_prim(sink, *p, value, &node.name)
            }
            FieldType::Inline(schema) => {
                if node.name.is_empty() {
                    self.run_into(schema, rec, sink, path)
                } else {
                    let value = self.field_value(node, rec, path)?.clone();
                    self.encode_sub(schema, node, &value, sink, path)
                }
            }
            FieldType::Alias(name) => {
                let schema = self.alias(name)?;
                if node.name.is_empty() {
                    self.run_into(&schema, rec, sink, path)
                } else {
                    let value = self.field_value(node, rec, path)?.clone();
                    self.encode_sub(&schema, node, &value, sink, path)
                }
            }
        }
    }

    /// Pack an accumulated bit run into a single big-endian integer and
    /// write it out.
    fn flush_bits(
        &self,
        run: &mut Vec<&Node>,
        rec: &mut Record,
        sink: &mut Sink,
        path: &mut Vec<String>,
    ) -> Result<(), EncodeError> {
        if run.is_empty() {
            return Ok(());
        }
        let total: u32 = run.iter().map(|n| bit_width(n)).sum();
        if total > 32 {
            run.clear();
            return Err(EncodeError::BitRunTooLong { bits: total });
        }
        let rounded = round_up_bits(total);
        let mut packed = 0u32;
        let mut cum = 0u32;
        for node in run.iter() {
            let width = bit_width(node);
            let raw = self.field_value(node, rec, path)?;
            let hooked = match &node.opts.encoder {
                Some(hook) => hook(raw, rec),
                None => raw.clone(),
            };
            let v = wire::coerce_u64(&hooked).ok_or_else(|| EncodeError::TypeMismatch {
                field: qualify(path, &node.name),
                expected: "integer",
                actual: hooked.type_name(),
            })?;
            let shift = match node.endian {
                Endian::Big => rounded - cum - width,
                Endian::Little => cum,
            };
            let mask: u32 = if width == 32 { u32::MAX } else { (1u32 << width) - 1 };
            packed |= ((v as u32) & mask) << shift;
            cum += width;
        }
        wire::write_packed_bits(sink, (rounded / 8) as usize, packed);
        run.clear();
        Ok(())
    }

    /// Fetch the named field and check its assertion.
    fn field_value<'r>(
        &self,
        node: &Node,
        rec: &'r Record,
        path: &[String],
    ) -> Result<&'r Value, EncodeError> {
        let value = rec.get(&node.name).ok_or_else(|| EncodeError::MissingField {
            field: qualify(path, &node.name),
        })?;
        if let Some(assert) = &node.opts.assert {
            if !assert.holds(rec, value) {
                return Err(EncodeError::AssertFailed {
                    field: qualify(path, &node.name),
                    value: value.to_string(),
                });
            }
        }
        Ok(value)
    }

    fn alias(&self, name: &str) -> Result<Schema, EncodeError> {
        self.aliases
            .get(name)
            .cloned()
            .ok_or_else(|| EncodeError::UnknownAlias(name.to_string()))
    }

    fn eval(&self, lazy: &Option<Lazy>, what: &str, rec: &Record) -> Result<i64, EncodeError> {
        match lazy {
            Some(l) => l.eval(rec).ok_or_else(|| EncodeError::LateBound {
                name: l.describe(),
            }),
            None => Err(EncodeError::LateBound {
                name: what.to_string(),
            }),
        }
    }

    fn eval_len(
        &self,
        lazy: &Option<Lazy>,
        field: &str,
        rec: &Record,
    ) -> Result<usize, EncodeError> {
        let v = self.eval(lazy, field, rec)?;
        usize::try_from(v).map_err(|_| EncodeError::BadLength {
            field: field.to_string(),
            value: v,
        })
    }
}
