//! Decode traversal: walk a schema chain over a byte buffer and build the
//! value tree.

use std::collections::HashMap;

use crate::codec::{bit_width, plan, qualify, round_up_bits, wire, PlanError};
use crate::error::{DecodeError, SchemaError};
use crate::kind::Endian;
use crate::options::{Lazy, ReadUntil};
use crate::schema::{FieldType, Node, NodeKind, Schema};
use crate::value::{Record, Value};

/// Decode `data` according to `schema`.
pub fn decode(schema: &Schema, data: &[u8]) -> Result<Value, SchemaError> {
    let aliases = plan(schema).map_err(|e| match e {
        PlanError::Build(b) => SchemaError::Build(b),
        PlanError::UnknownAlias(n) => SchemaError::Decode(DecodeError::UnknownAlias(n)),
    })?;
    let dec = Decoder { data, aliases };
    let mut rec = Record::new();
    let mut path = Vec::new();
    dec.run_into(schema, 0, &mut rec, &mut path)
        .map_err(SchemaError::Decode)?;
    Ok(match &schema.ctor {
        Some(ctor) => ctor(rec),
        None => Value::Record(rec),
    })
}

struct Decoder<'d> {
    data: &'d [u8],
    aliases: HashMap<String, Schema>,
}

impl<'d> Decoder<'d> {
    /// Decode every node of `schema` into `rec`, starting at `offset`.
    /// Returns the offset after the last field.
    fn run_into(
        &self,
        schema: &Schema,
        mut offset: usize,
        rec: &mut Record,
        path: &mut Vec<String>,
    ) -> Result<usize, DecodeError> {
        let mut run: Vec<&Node> = Vec::new();
        for node in &schema.nodes {
            match &node.kind {
                NodeKind::Bit(_) => run.push(node),
                // A nest does not break a bit run: it decodes in place and
                // the packed read happens when the run flushes.
                NodeKind::Nest(_) => offset = self.decode_nest(node, offset, rec, path)?,
                _ => {
                    offset = self.flush_bits(&mut run, offset, rec, path)?;
                    offset = self.decode_node(node, offset, rec, path)?;
                }
            }
        }
        self.flush_bits(&mut run, offset, rec, path)
    }

    fn decode_node(
        &self,
        node: &Node,
        offset: usize,
        rec: &mut Record,
        path: &mut Vec<String>,
    ) -> Result<usize, DecodeError> {
        match &node.kind {
            NodeKind::Prim(p) => {
                let value = wire::read_prim(self.data, offset, *p)?;
                let end = offset + p.width();
                self.finish(node, value, end, rec, path)?;
                Ok(end)
            }
            NodeKind::Str => self.decode_string(node, offset, rec, path),
            NodeKind::Buffer => self.decode_buffer(node, offset, rec, path),
            NodeKind::Array(elem) => self.decode_array(node, elem, offset, rec, path),
            NodeKind::Choice { cases, default } => {
                self.decode_choice(node, cases, default.as_ref(), offset, rec, path)
            }
            NodeKind::Seek => {
                let delta = self.eval(&node.opts.length, "length", rec)?;
                shift_offset(offset, delta)
            }
            NodeKind::Pointer(target) => self.decode_pointer(node, target, offset, rec, path),
            NodeKind::SaveOffset => {
                self.finish(node, Value::UInt(offset as u64), offset, rec, path)?;
                Ok(offset)
            }
            // Grouped by the chain walker; never dispatched here.
            NodeKind::Bit(_) | NodeKind::Nest(_) => Ok(offset),
        }
    }

    fn decode_string(
        &self,
        node: &Node,
        offset: usize,
        rec: &mut Record,
        path: &mut Vec<String>,
    ) -> Result<usize, DecodeError> {
        let opts = &node.opts;
        let limit = self.data.len();
        let (mut raw, end): (&[u8], usize) = if opts.length.is_some() && opts.zero_terminated {
            // Read at most `length` bytes, stopping early at (and
            // consuming) a zero byte that is not part of the text.
            let n = self.eval_len(&node.opts.length, &node.name, rec)?;
            let start = offset.min(limit);
            let window = &self.data[start..(offset.saturating_add(n)).min(limit)];
            match window.iter().position(|b| *b == 0) {
                Some(i) => (&window[..i], start + i + 1),
                None => (window, start + window.len()),
            }
        } else if opts.length.is_some() {
            let n = self.eval_len(&node.opts.length, &node.name, rec)?;
            (wire::take(self.data, offset, n)?, offset + n)
        } else if opts.zero_terminated {
            let start = offset.min(limit);
            let window = &self.data[start..];
            match window.iter().position(|b| *b == 0) {
                Some(i) => (&window[..i], start + i + 1),
                None => (window, limit),
            }
        } else {
            // greedy
            (&self.data[offset.min(limit)..], limit)
        };
        if opts.strip_null {
            while let Some((&0, rest)) = raw.split_last() {
                raw = rest;
            }
        }
        let text = opts.encoding.decode(raw).ok_or_else(|| DecodeError::InvalidText {
            field: qualify(path, &node.name),
            encoding: opts.encoding.name(),
        })?;
        let text = if opts.trim {
            text.trim().to_string()
        } else {
            text
        };
        self.finish(node, Value::Str(text), end, rec, path)?;
        Ok(end)
    }

    fn decode_buffer(
        &self,
        node: &Node,
        offset: usize,
        rec: &mut Record,
        path: &mut Vec<String>,
    ) -> Result<usize, DecodeError> {
        let limit = self.data.len();
        let (bytes, end) = match &node.opts.read_until {
            Some(ReadUntil::Until(pred)) => {
                let start = offset.min(limit);
                let mut cur = start;
                while cur < limit {
                    let byte = Value::UInt(self.data[cur] as u64);
                    if pred(&byte, &self.data[cur + 1..]) {
                        break;
                    }
                    cur += 1;
                }
                (self.data[start..cur].to_vec(), cur)
            }
            Some(ReadUntil::Eof) => (self.data[offset.min(limit)..].to_vec(), limit),
            None => {
                let n = self.eval_len(&node.opts.length, &node.name, rec)?;
                (wire::take(self.data, offset, n)?.to_vec(), offset + n)
            }
        };
        self.finish(node, Value::Bytes(bytes), end, rec, path)?;
        Ok(end)
    }

    fn decode_array(
        &self,
        node: &Node,
        elem: &FieldType,
        offset: usize,
        rec: &mut Record,
        path: &mut Vec<String>,
    ) -> Result<usize, DecodeError> {
        let mut items = match &node.opts.key {
            Some(key) => Items::Keyed(key.clone(), HashMap::new()),
            None => Items::Seq(Vec::new()),
        };
        let mut end = offset;
        match &node.opts.read_until {
            Some(ReadUntil::Until(pred)) => {
                // do-while: at least one item is always attempted.
                loop {
                    let (item, next) = self.decode_item(node, elem, end, path)?;
                    end = next;
                    let stop = pred(&item, &self.data[end.min(self.data.len())..]);
                    items.push(node, path, item)?;
                    if stop {
                        break;
                    }
                }
            }
            Some(ReadUntil::Eof) => {
                while end < self.data.len() {
                    let (item, next) = self.decode_item(node, elem, end, path)?;
                    // A zero-width item cannot make progress.
                    if next == end {
                        items.push(node, path, item)?;
                        break;
                    }
                    end = next;
                    items.push(node, path, item)?;
                }
            }
            None => {
                if node.opts.length_in_bytes.is_some() {
                    let n = self.eval_len(&node.opts.length_in_bytes, &node.name, rec)?;
                    while end - offset < n {
                        let (item, next) = self.decode_item(node, elem, end, path)?;
                        if next == end {
                            items.push(node, path, item)?;
                            break;
                        }
                        end = next;
                        items.push(node, path, item)?;
                    }
                } else {
                    let n = self.eval_len(&node.opts.length, &node.name, rec)?;
                    for _ in 0..n {
                        let (item, next) = self.decode_item(node, elem, end, path)?;
                        end = next;
                        items.push(node, path, item)?;
                    }
                }
            }
        }
        self.finish(node, items.into_value(), end, rec, path)?;
        Ok(end)
    }

    fn decode_item(
        &self,
        node: &Node,
        elem: &FieldType,
        offset: usize,
        path: &mut Vec<String>,
    ) -> Result<(Value, usize), DecodeError> {
        match elem {
            FieldType::Prim(p) => Ok((wire::read_prim(self.data, offset, *p)?, offset + p.width())),
            FieldType::Alias(name) => {
                let schema = self.alias(name)?;
                self.decode_sub(&schema, &node.name, offset, path)
            }
            FieldType::Inline(schema) => self.decode_sub(schema, &node.name, offset, path),
        }
    }

    /// Decode a sub-schema into a fresh record, pushing the field name onto
    /// the path for error reporting.
    fn decode_sub(
        &self,
        schema: &Schema,
        name: &str,
        offset: usize,
        path: &mut Vec<String>,
    ) -> Result<(Value, usize), DecodeError> {
        let mut sub = Record::new();
        if !name.is_empty() {
            path.push(name.to_string());
        }
        let result = self.run_into(schema, offset, &mut sub, path);
        if !name.is_empty() {
            path.pop();
        }
        Ok((Value::Record(sub), result?))
    }

    fn decode_choice(
        &self,
        node: &Node,
        cases: &HashMap<i64, FieldType>,
        default: Option<&FieldType>,
        offset: usize,
        rec: &mut Record,
        path: &mut Vec<String>,
    ) -> Result<usize, DecodeError> {
        let tag = self.eval(&node.opts.tag, "tag", rec)?;
        let chosen = cases
            .get(&tag)
            .or(default)
            .ok_or_else(|| DecodeError::UndefinedTag {
                field: qualify(path, &node.name),
                tag,
            })?;
        self.decode_dispatch(node, chosen, offset, rec, path)
    }

    fn decode_nest(
        &self,
        node: &Node,
        offset: usize,
        rec: &mut Record,
        path: &mut Vec<String>,
    ) -> Result<usize, DecodeError> {
        let NodeKind::Nest(inner) = &node.kind else {
            return Ok(offset);
        };
        self.decode_dispatch(node, inner, offset, rec, path)
    }

    /// Decode a branch/nested type into the named field, or merge it into
    /// the current record when the node is unnamed.
    fn decode_dispatch(
        &self,
        node: &Node,
        target: &FieldType,
        offset: usize,
        rec: &mut Record,
        path: &mut Vec<String>,
    ) -> Result<usize, DecodeError> {
        match target {
            FieldType::Prim(p) => {
                let value = wire::read_prim(self.data, offset, *p)?;
                let end = offset + p.width();
                self.finish(node, value, end, rec, path)?;
                Ok(end)
            }
            FieldType::Inline(schema) => {
                if node.name.is_empty() {
                    self.run_into(schema, offset, rec, path)
                } else {
                    let (value, end) = self.decode_sub(schema, &node.name, offset, path)?;
                    self.finish(node, value, end, rec, path)?;
                    Ok(end)
                }
            }
            FieldType::Alias(name) => {
                let schema = self.alias(name)?;
                if node.name.is_empty() {
                    self.run_into(&schema, offset, rec, path)
                } else {
                    let (value, end) = self.decode_sub(&schema, &node.name, offset, path)?;
                    self.finish(node, value, end, rec, path)?;
                    Ok(end)
                }
            }
        }
    }

    fn decode_pointer(
        &self,
        node: &Node,
        target: &FieldType,
        offset: usize,
        rec: &mut Record,
        path: &mut Vec<String>,
    ) -> Result<usize, DecodeError> {
        let pos = self.eval(&node.opts.offset, "offset", rec)?;
        let pos = usize::try_from(pos).map_err(|_| DecodeError::OffsetOutOfRange {
            offset: pos,
        })?;
        let value = match target {
            FieldType::Prim(p) => wire::read_prim(self.data, pos, *p)?,
            FieldType::Inline(schema) => self.decode_sub(schema, &node.name, pos, path)?.0,
            FieldType::Alias(name) => {
                let schema = self.alias(name)?;
                self.decode_sub(&schema, &node.name, pos, path)?.0
            }
        };
        // The outer offset is untouched by the redirected read.
        self.finish(node, value, offset, rec, path)?;
        Ok(offset)
    }

    /// Read the packed integer behind an accumulated bit run and extract
    /// each named field, then clear the run.
    fn flush_bits(
        &self,
        run: &mut Vec<&Node>,
        offset: usize,
        rec: &mut Record,
        path: &mut Vec<String>,
    ) -> Result<usize, DecodeError> {
        if run.is_empty() {
            return Ok(offset);
        }
        let total: u32 = run.iter().map(|n| bit_width(n)).sum();
        if total > 32 {
            run.clear();
            return Err(DecodeError::BitRunTooLong { bits: total });
        }
        let rounded = round_up_bits(total);
        let nbytes = (rounded / 8) as usize;
        let packed = wire::read_packed_bits(self.data, offset, nbytes)?;
        let end = offset + nbytes;
        let mut cum = 0u32;
        for node in run.iter() {
            let width = bit_width(node);
            let shift = match node.endian {
                Endian::Big => rounded - cum - width,
                Endian::Little => cum,
            };
            let mask: u32 = if width == 32 { u32::MAX } else { (1u32 << width) - 1 };
            let value = Value::UInt(((packed >> shift) & mask) as u64);
            self.finish(node, value, end, rec, path)?;
            cum += width;
        }
        run.clear();
        Ok(end)
    }

    /// Apply the formatter, check the assertion, store the named value.
    fn finish(
        &self,
        node: &Node,
        value: Value,
        offset: usize,
        rec: &mut Record,
        path: &mut Vec<String>,
    ) -> Result<(), DecodeError> {
        let value = match &node.opts.formatter {
            Some(f) => f(value, self.data, offset),
            None => value,
        };
        if let Some(assert) = &node.opts.assert {
            if !assert.holds(rec, &value) {
                return Err(DecodeError::AssertFailed {
                    field: qualify(path, &node.name),
                    value: value.to_string(),
                });
            }
        }
        if !node.name.is_empty() {
            rec.insert(node.name.clone(), value);
        }
        Ok(())
    }

    fn alias(&self, name: &str) -> Result<Schema, DecodeError> {
        self.aliases
            .get(name)
            .cloned()
            .ok_or_else(|| DecodeError::UnknownAlias(name.to_string()))
    }

    fn eval(&self, lazy: &Option<Lazy>, what: &str, rec: &Record) -> Result<i64, DecodeError> {
        match lazy {
            Some(l) => l.eval(rec).ok_or_else(|| DecodeError::LateBound {
                name: l.describe(),
            }),
            None => Err(DecodeError::LateBound {
                name: what.to_string(),
            }),
        }
    }

    fn eval_len(
        &self,
        lazy: &Option<Lazy>,
        field: &str,
        rec: &Record,
    ) -> Result<usize, DecodeError> {
        let v = self.eval(lazy, field, rec)?;
        usize::try_from(v).map_err(|_| DecodeError::BadLength {
            field: field.to_string(),
            value: v,
        })
    }
}

/// Array accumulator: an ordered sequence, or a dictionary keyed by a
/// subfield of each item.
enum Items {
    Seq(Vec<Value>),
    Keyed(String, HashMap<String, Value>),
}

impl Items {
    fn push(&mut self, node: &Node, path: &[String], item: Value) -> Result<(), DecodeError> {
        match self {
            Items::Seq(seq) => seq.push(item),
            Items::Keyed(key, map) => {
                let key_value = item.get(key).ok_or_else(|| DecodeError::MissingKey {
                    field: qualify(path, &node.name),
                    key: key.clone(),
                })?;
                let rendered = match key_value {
                    Value::Str(s) => s.clone(),
                    other => other.to_string(),
                };
                map.insert(rendered, item);
            }
        }
        Ok(())
    }

    fn into_value(self) -> Value {
        match self {
            Items::Seq(seq) => Value::Array(seq),
            Items::Keyed(_, map) => Value::Map(map),
        }
    }
}

fn shift_offset(offset: usize, delta: i64) -> Result<usize, DecodeError> {
    let next = offset as i64 + delta;
    usize::try_from(next).map_err(|_| DecodeError::OffsetOutOfRange { offset: next })
}
