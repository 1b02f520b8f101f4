//! Schema chain: the builder that composes fields into a decodable,
//! encodable description of a byte layout.

use std::collections::HashMap;
use std::sync::Arc;

use crate::codec;
use crate::error::{BuildError, SchemaError};
use crate::kind::{Endian, Numeric, Primitive};
use crate::options::{Assert, CtorFn, Lazy, Opts, TypeRef};
use crate::registry;
use crate::size;
use crate::value::{Record, Value};

/// A resolved element type carried by array/choice/nest/pointer nodes.
#[derive(Clone)]
pub(crate) enum FieldType {
    Prim(Primitive),
    Alias(String),
    Inline(Schema),
}

#[derive(Clone)]
pub(crate) enum NodeKind {
    Prim(Primitive),
    Bit(u32),
    Str,
    Buffer,
    Array(FieldType),
    Choice {
        cases: HashMap<i64, FieldType>,
        default: Option<FieldType>,
    },
    Nest(FieldType),
    Seek,
    Pointer(FieldType),
    SaveOffset,
}

/// One field in the chain.
#[derive(Clone)]
pub(crate) struct Node {
    pub(crate) kind: NodeKind,
    pub(crate) name: String,
    /// Endianness default captured when the field was appended; governs
    /// bit extraction order within a packed run.
    pub(crate) endian: Endian,
    pub(crate) opts: Opts,
}

/// A chainable binary schema.
///
/// Built with [`Schema::start`] and one builder call per field; decoded with
/// [`parse`](Schema::parse) and serialized with [`encode`](Schema::encode).
/// Builder misuse does not panic: the first error is recorded on the chain
/// and surfaced by `parse`/`encode`/[`check`](Schema::check).
///
/// ```
/// use binform::{Schema, Value};
///
/// let schema = Schema::start().uint16be("n");
/// let rec = schema.parse(&[0x12, 0x34]).unwrap();
/// assert_eq!(rec.get("n"), Some(&Value::UInt(0x1234)));
/// assert_eq!(schema.encode(&rec).unwrap(), vec![0x12, 0x34]);
/// ```
#[derive(Clone)]
pub struct Schema {
    pub(crate) nodes: Vec<Node>,
    pub(crate) endian: Endian,
    pub(crate) alias: Option<String>,
    pub(crate) ctor: Option<CtorFn>,
    pub(crate) capacity: usize,
    pub(crate) err: Option<BuildError>,
}

impl Default for Schema {
    fn default() -> Self {
        Schema::start()
    }
}

macro_rules! prim_methods {
    ($($name:ident => ($num:ident, $endian:expr);)*) => {
        $(
            pub fn $name(self, name: &str) -> Self {
                self.append_prim(name, Numeric::$num, $endian)
            }
        )*
    };
}

macro_rules! bit_methods {
    ($($name:ident => $w:literal;)*) => {
        $(
            pub fn $name(self, name: &str) -> Self {
                self.append(NodeKind::Bit($w), name, Opts::new())
            }
        )*
    };
}

impl Schema {
    /// Create an empty root schema. The default endianness is big.
    pub fn start() -> Self {
        Schema {
            nodes: Vec::new(),
            endian: Endian::Big,
            alias: None,
            ctor: None,
            capacity: 256,
            err: None,
        }
    }

    /// Switch the endianness default for subsequently appended fields.
    pub fn endianness(mut self, endian: Endian) -> Self {
        self.endian = endian;
        self
    }

    /// Install a constructor applied to the root record returned by
    /// [`parse`](Schema::parse).
    pub fn create<F>(mut self, ctor: F) -> Self
    where
        F: Fn(Record) -> Value + Send + Sync + 'static,
    {
        self.ctor = Some(Arc::new(ctor));
        self.sync();
        self
    }

    /// Initial capacity of the byte sink used by [`encode`](Schema::encode);
    /// defaults to 256.
    pub fn encode_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Register this schema in the process-wide alias registry so other
    /// schemas can reference it by name, including recursively.
    ///
    /// Fields appended after `namely` are still visible through the alias:
    /// every later append re-registers the chain under its name.
    pub fn namely(mut self, alias: &str) -> Self {
        self.alias = Some(alias.to_string());
        registry::register(alias, self.clone());
        self
    }

    // Byte-aligned numeric fields. Endian-neutral methods inherit the
    // schema's current default.
    prim_methods! {
        uint8 => (U8, None);
        int8 => (I8, None);
        uint16 => (U16, None);
        uint16be => (U16, Some(Endian::Big));
        uint16le => (U16, Some(Endian::Little));
        uint32 => (U32, None);
        uint32be => (U32, Some(Endian::Big));
        uint32le => (U32, Some(Endian::Little));
        uint64 => (U64, None);
        uint64be => (U64, Some(Endian::Big));
        uint64le => (U64, Some(Endian::Little));
        int16 => (I16, None);
        int16be => (I16, Some(Endian::Big));
        int16le => (I16, Some(Endian::Little));
        int32 => (I32, None);
        int32be => (I32, Some(Endian::Big));
        int32le => (I32, Some(Endian::Little));
        int64 => (I64, None);
        int64be => (I64, Some(Endian::Big));
        int64le => (I64, Some(Endian::Little));
        float => (F32, None);
        floatbe => (F32, Some(Endian::Big));
        floatle => (F32, Some(Endian::Little));
        double => (F64, None);
        doublebe => (F64, Some(Endian::Big));
        doublele => (F64, Some(Endian::Little));
    }

    // Bit fields. Consecutive bit fields form a run decoded as one packed
    // big-endian integer of up to 32 bits; the schema endianness chooses
    // which field takes the most significant bits.
    bit_methods! {
        bit1 => 1; bit2 => 2; bit3 => 3; bit4 => 4;
        bit5 => 5; bit6 => 6; bit7 => 7; bit8 => 8;
        bit9 => 9; bit10 => 10; bit11 => 11; bit12 => 12;
        bit13 => 13; bit14 => 14; bit15 => 15; bit16 => 16;
        bit17 => 17; bit18 => 18; bit19 => 19; bit20 => 20;
        bit21 => 21; bit22 => 22; bit23 => 23; bit24 => 24;
        bit25 => 25; bit26 => 26; bit27 => 27; bit28 => 28;
        bit29 => 29; bit30 => 30; bit31 => 31; bit32 => 32;
    }

    /// A text field. Exactly one of `length`, `zero_terminated` or `greedy`
    /// must be set (`length` plus `zero_terminated` is also accepted and
    /// reads at most `length` bytes, stopping early at a zero).
    pub fn string(self, name: &str, opts: Opts) -> Self {
        let has_len = opts.length.is_some();
        let ok = matches!(
            (has_len, opts.zero_terminated, opts.greedy),
            (true, false, false) | (false, true, false) | (false, false, true) | (true, true, false)
        );
        if !ok {
            return self.fail(BuildError::StringMode { field: name.into() });
        }
        if opts.strip_null && !(has_len || opts.greedy) {
            return self.fail(BuildError::StripNullWithoutLength { field: name.into() });
        }
        self.append(NodeKind::Str, name, opts)
    }

    /// A raw byte field delimited by `length` or `read_until`.
    pub fn buffer(self, name: &str, opts: Opts) -> Self {
        if opts.length.is_none() && opts.read_until.is_none() {
            return self.fail(BuildError::BufferMode { field: name.into() });
        }
        self.append(NodeKind::Buffer, name, opts)
    }

    /// A repeated field. Needs an element type (`of`) and one of `length`,
    /// `length_in_bytes` or `read_until`. With `key`, decodes to a
    /// dictionary keyed by that subfield instead of a sequence.
    pub fn array(self, name: &str, mut opts: Opts) -> Self {
        if opts.length.is_none() && opts.length_in_bytes.is_none() && opts.read_until.is_none() {
            return self.fail(BuildError::ArrayMode { field: name.into() });
        }
        let Some(t) = opts.type_ref.take() else {
            return self.fail(BuildError::MissingType { field: name.into() });
        };
        match self.resolve_strict(name, t) {
            Ok(ft) => self.append(NodeKind::Array(ft), name, opts),
            Err(e) => self.fail(e),
        }
    }

    /// A discriminated union. `tag` selects among the `case` types; with no
    /// match, `default_choice` is used if present. Case types referencing an
    /// alias may be registered later, any time before `parse`/`encode`.
    /// With an empty name, the chosen branch merges into the parent record.
    pub fn choice(self, name: &str, mut opts: Opts) -> Self {
        if opts.tag.is_none() || opts.choices.is_empty() {
            return self.fail(BuildError::ChoiceMode { field: name.into() });
        }
        let cases: HashMap<i64, FieldType> = std::mem::take(&mut opts.choices)
            .into_iter()
            .map(|(tag, t)| (tag, self.resolve_lenient(t)))
            .collect();
        let default = opts.default_choice.take().map(|t| self.resolve_lenient(t));
        self.append(NodeKind::Choice { cases, default }, name, opts)
    }

    /// A nested subrecord: an inline schema or an alias. The alias may be
    /// registered later, any time before `parse`/`encode`. With an empty
    /// name and an inline schema, the fields merge into the parent record.
    pub fn nest(self, name: &str, mut opts: Opts) -> Self {
        let Some(t) = opts.type_ref.take() else {
            return self.fail(BuildError::NestType { field: name.into() });
        };
        let ft = match self.resolve_lenient(t) {
            // A primitive is not a nestable type.
            FieldType::Prim(_) => {
                return self.fail(BuildError::NestType { field: name.into() })
            }
            ft => ft,
        };
        if name.is_empty() && !matches!(ft, FieldType::Inline(_)) {
            return self.fail(BuildError::AnonymousNest);
        }
        self.append(NodeKind::Nest(ft), name, opts)
    }

    /// Move the read position by `length` bytes (negative moves backwards).
    /// On encode, emits that many zero bytes.
    pub fn seek(self, length: impl Into<Lazy>) -> Self {
        let mut opts = Opts::new();
        opts.length = Some(length.into());
        self.append(NodeKind::Seek, "", opts)
    }

    /// Alias for [`seek`](Schema::seek).
    pub fn skip(self, length: impl Into<Lazy>) -> Self {
        self.seek(length)
    }

    /// Decode `of` at the absolute position given by `offset`, then restore
    /// the read position. The target may be a catalog kind, an inline
    /// schema, or an alias registered any time before `parse`/`encode`.
    /// Not encodable; `encode` treats it as a no-op, so schemas using
    /// pointers do not round-trip.
    pub fn pointer(self, name: &str, mut opts: Opts) -> Self {
        if opts.offset.is_none() {
            return self.fail(BuildError::PointerMode { field: name.into() });
        }
        let Some(t) = opts.type_ref.take() else {
            return self.fail(BuildError::PointerMode { field: name.into() });
        };
        let ft = self.resolve_lenient(t);
        self.append(NodeKind::Pointer(ft), name, opts)
    }

    /// Store the current read position into the named field without
    /// consuming bytes. A no-op on encode.
    pub fn save_offset(self, name: &str) -> Self {
        self.append(NodeKind::SaveOffset, name, Opts::new())
    }

    /// Assert that the most recently appended field decodes (and encodes)
    /// to the given literal value.
    pub fn assert(self, expected: impl Into<Assert>) -> Self {
        let expected = expected.into();
        self.modify_last("assert", move |node| node.opts.assert = Some(expected))
    }

    /// Assert with a predicate over the enclosing record and the value.
    pub fn assert_with<F>(self, pred: F) -> Self
    where
        F: Fn(&Record, &Value) -> bool + Send + Sync + 'static,
    {
        self.modify_last("assert", move |node| {
            node.opts.assert = Some(Assert::check(pred))
        })
    }

    /// Replace the most recently appended field's decoded value before it is
    /// stored.
    pub fn formatter<F>(self, f: F) -> Self
    where
        F: Fn(Value, &[u8], usize) -> Value + Send + Sync + 'static,
    {
        self.modify_last("formatter", move |node| {
            node.opts.formatter = Some(Arc::new(f))
        })
    }

    /// Transform the most recently appended field's value just before
    /// encoding; the original is restored afterwards.
    pub fn encoder<F>(self, f: F) -> Self
    where
        F: Fn(&Value, &Record) -> Value + Send + Sync + 'static,
    {
        self.modify_last("encoder", move |node| {
            node.opts.encoder = Some(Arc::new(f))
        })
    }

    /// The first builder error recorded on this chain, if any.
    pub fn check(&self) -> Result<(), BuildError> {
        match &self.err {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    /// Decode `data` into a value tree.
    pub fn parse(&self, data: &[u8]) -> Result<Value, SchemaError> {
        codec::decoder::decode(self, data)
    }

    /// Encode a record back into bytes.
    pub fn encode(&self, value: &Value) -> Result<Vec<u8>, SchemaError> {
        codec::encoder::encode(self, value)
    }

    /// Static byte width of this schema, or `None` when any field is
    /// dynamically sized.
    pub fn size_of(&self) -> Option<usize> {
        size::static_size(self)
    }

    fn append_prim(self, name: &str, numeric: Numeric, endian: Option<Endian>) -> Self {
        let endian = endian.unwrap_or(self.endian);
        self.append(
            NodeKind::Prim(Primitive::new(numeric, endian)),
            name,
            Opts::new(),
        )
    }

    fn append(mut self, kind: NodeKind, name: &str, opts: Opts) -> Self {
        let endian = self.endian;
        self.nodes.push(Node {
            kind,
            name: name.to_string(),
            endian,
            opts,
        });
        self.sync();
        self
    }

    fn modify_last(mut self, what: &'static str, f: impl FnOnce(&mut Node)) -> Self {
        if self.err.is_some() {
            return self;
        }
        if self.nodes.is_empty() {
            return self.fail(BuildError::DanglingModifier { modifier: what });
        }
        let is_seek = matches!(self.nodes.last(), Some(n) if matches!(n.kind, NodeKind::Seek));
        if is_seek && what == "assert" {
            return self.fail(BuildError::SeekAssert);
        }
        if let Some(node) = self.nodes.last_mut() {
            f(node);
        }
        self.sync();
        self
    }

    fn fail(mut self, e: BuildError) -> Self {
        if self.err.is_none() {
            self.err = Some(e);
        }
        self
    }

    /// Keep the registry copy in step with the live chain.
    fn sync(&self) {
        if let Some(alias) = &self.alias {
            registry::register(alias, self.clone());
        }
    }

    /// Resolve a type reference that must name a primitive or an
    /// already-registered alias (arrays).
    fn resolve_strict(&self, field: &str, t: TypeRef) -> Result<FieldType, BuildError> {
        match t {
            TypeRef::Schema(s) => Ok(FieldType::Inline(s)),
            TypeRef::Name(n) => {
                if let Some(p) = Primitive::from_name(&n, self.endian) {
                    Ok(FieldType::Prim(p))
                } else if registry::contains(&n) {
                    Ok(FieldType::Alias(n))
                } else {
                    Err(BuildError::UnknownType {
                        field: field.into(),
                        type_name: n,
                    })
                }
            }
        }
    }

    /// Resolve a type reference whose alias may be registered later
    /// (choice cases); unknown names surface at `parse`/`encode` time.
    fn resolve_lenient(&self, t: TypeRef) -> FieldType {
        match t {
            TypeRef::Schema(s) => FieldType::Inline(s),
            TypeRef::Name(n) => match Primitive::from_name(&n, self.endian) {
                Some(p) => FieldType::Prim(p),
                None => FieldType::Alias(n),
            },
        }
    }
}
