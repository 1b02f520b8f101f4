//! Per-field options: late-bound integers, user hooks, element types.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::kind::Encoding;
use crate::schema::Schema;
use crate::value::{Record, Value};

/// Late-bound integer hook: called with the enclosing record.
pub type LazyFn = Arc<dyn Fn(&Record) -> i64 + Send + Sync>;
/// Formatter hook: `(decoded value, full buffer, current offset) -> value`.
pub type FormatFn = Arc<dyn Fn(Value, &[u8], usize) -> Value + Send + Sync>;
/// Encode pre-transform hook: `(field value, enclosing record) -> value`.
pub type EncodeHookFn = Arc<dyn Fn(&Value, &Record) -> Value + Send + Sync>;
/// Container stop predicate: `(item, remaining bytes) -> stop`.
pub type UntilFn = Arc<dyn Fn(&Value, &[u8]) -> bool + Send + Sync>;
/// Encode-side stop predicate: `(item, enclosing record) -> stop`.
pub type EncodeUntilFn = Arc<dyn Fn(&Value, &Record) -> bool + Send + Sync>;
/// Assertion predicate: `(enclosing record, field value) -> ok`.
pub type AssertFn = Arc<dyn Fn(&Record, &Value) -> bool + Send + Sync>;
/// Root record constructor installed with [`Schema::create`](crate::Schema::create).
pub type CtorFn = Arc<dyn Fn(Record) -> Value + Send + Sync>;

/// An integer option resolved at decode/encode time: a constant, a dotted
/// field name looked up in the enclosing record, or a computed value.
#[derive(Clone)]
pub enum Lazy {
    Const(i64),
    Field(String),
    Compute(LazyFn),
}

impl Lazy {
    /// Late-bound integer computed from the enclosing record.
    pub fn compute<F>(f: F) -> Self
    where
        F: Fn(&Record) -> i64 + Send + Sync + 'static,
    {
        Lazy::Compute(Arc::new(f))
    }

    /// Resolve against the enclosing record. `None` when a field reference
    /// is missing or not an integer.
    pub(crate) fn eval(&self, rec: &Record) -> Option<i64> {
        match self {
            Lazy::Const(n) => Some(*n),
            Lazy::Field(path) => lookup_record(rec, path)?.as_int(),
            Lazy::Compute(f) => Some(f(rec)),
        }
    }

    /// The referenced field name, for error reporting.
    pub(crate) fn describe(&self) -> String {
        match self {
            Lazy::Const(n) => n.to_string(),
            Lazy::Field(path) => path.clone(),
            Lazy::Compute(_) => "<computed>".to_string(),
        }
    }
}

impl fmt::Debug for Lazy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lazy::Const(n) => write!(f, "Const({})", n),
            Lazy::Field(name) => write!(f, "Field({:?})", name),
            Lazy::Compute(_) => write!(f, "Compute(..)"),
        }
    }
}

impl From<i64> for Lazy {
    fn from(v: i64) -> Self {
        Lazy::Const(v)
    }
}

impl From<i32> for Lazy {
    fn from(v: i32) -> Self {
        Lazy::Const(v as i64)
    }
}

impl From<usize> for Lazy {
    fn from(v: usize) -> Self {
        Lazy::Const(v as i64)
    }
}

impl From<&str> for Lazy {
    fn from(v: &str) -> Self {
        Lazy::Field(v.to_string())
    }
}

impl From<String> for Lazy {
    fn from(v: String) -> Self {
        Lazy::Field(v)
    }
}

/// Resolve a dotted path in a record.
pub(crate) fn lookup_record<'a>(rec: &'a Record, path: &str) -> Option<&'a Value> {
    let mut segs = path.split('.');
    let mut v = rec.get(segs.next()?)?;
    for seg in segs {
        v = v.get(seg)?;
    }
    Some(v)
}

/// Container termination mode for buffers and arrays.
#[derive(Clone)]
pub enum ReadUntil {
    /// Consume to the end of the buffer.
    Eof,
    /// Stop when the predicate returns true.
    Until(UntilFn),
}

/// Field assertion: literal equality or a predicate over the record and the
/// just-decoded value.
#[derive(Clone)]
pub enum Assert {
    Int(i64),
    Str(String),
    Check(AssertFn),
}

impl Assert {
    pub fn check<F>(f: F) -> Self
    where
        F: Fn(&Record, &Value) -> bool + Send + Sync + 'static,
    {
        Assert::Check(Arc::new(f))
    }

    pub(crate) fn holds(&self, rec: &Record, value: &Value) -> bool {
        match self {
            Assert::Int(n) => value.as_int() == Some(*n),
            Assert::Str(s) => value.as_str() == Some(s.as_str()),
            Assert::Check(f) => f(rec, value),
        }
    }
}

impl From<i64> for Assert {
    fn from(v: i64) -> Self {
        Assert::Int(v)
    }
}

impl From<i32> for Assert {
    fn from(v: i32) -> Self {
        Assert::Int(v as i64)
    }
}

impl From<&str> for Assert {
    fn from(v: &str) -> Self {
        Assert::Str(v.to_string())
    }
}

/// An element type reference: a catalog kind or alias by name, or an inline
/// schema.
#[derive(Clone)]
pub enum TypeRef {
    Name(String),
    Schema(Schema),
}

impl From<&str> for TypeRef {
    fn from(v: &str) -> Self {
        TypeRef::Name(v.to_string())
    }
}

impl From<String> for TypeRef {
    fn from(v: String) -> Self {
        TypeRef::Name(v)
    }
}

impl From<Schema> for TypeRef {
    fn from(v: Schema) -> Self {
        TypeRef::Schema(v)
    }
}

/// Which side of a fixed-width string the text occupies when padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Side {
    Left,
    #[default]
    Right,
}

/// Options attached to a single field.
///
/// Built with chainable setters and validated by the builder method the
/// options are passed to:
///
/// ```
/// use binform::{Opts, Schema, Value};
///
/// let schema = Schema::start()
///     .uint8("n")
///     .array("items", Opts::new().length("n").of("uint16be"));
/// let rec = schema.parse(&[0x01, 0x00, 0x07]).unwrap();
/// assert_eq!(rec.get("items"), Some(&Value::Array(vec![Value::UInt(7)])));
/// ```
#[derive(Clone)]
pub struct Opts {
    pub(crate) length: Option<Lazy>,
    pub(crate) length_in_bytes: Option<Lazy>,
    pub(crate) zero_terminated: bool,
    pub(crate) greedy: bool,
    pub(crate) strip_null: bool,
    pub(crate) trim: bool,
    pub(crate) encoding: Encoding,
    pub(crate) read_until: Option<ReadUntil>,
    pub(crate) encode_until: Option<EncodeUntilFn>,
    pub(crate) type_ref: Option<TypeRef>,
    pub(crate) key: Option<String>,
    pub(crate) tag: Option<Lazy>,
    pub(crate) choices: HashMap<i64, TypeRef>,
    pub(crate) default_choice: Option<TypeRef>,
    pub(crate) offset: Option<Lazy>,
    pub(crate) formatter: Option<FormatFn>,
    pub(crate) encoder: Option<EncodeHookFn>,
    pub(crate) assert: Option<Assert>,
    pub(crate) pad: u8,
    pub(crate) padding: Side,
}

impl Default for Opts {
    fn default() -> Self {
        Opts::new()
    }
}

impl Opts {
    pub fn new() -> Self {
        Opts {
            length: None,
            length_in_bytes: None,
            zero_terminated: false,
            greedy: false,
            strip_null: false,
            trim: false,
            encoding: Encoding::Utf8,
            read_until: None,
            encode_until: None,
            type_ref: None,
            key: None,
            tag: None,
            choices: HashMap::new(),
            default_choice: None,
            offset: None,
            formatter: None,
            encoder: None,
            assert: None,
            pad: b' ',
            padding: Side::Right,
        }
    }

    /// Field length: constant, field name, or computed.
    pub fn length(mut self, l: impl Into<Lazy>) -> Self {
        self.length = Some(l.into());
        self
    }

    /// Array length measured in bytes instead of items.
    pub fn length_in_bytes(mut self, l: impl Into<Lazy>) -> Self {
        self.length_in_bytes = Some(l.into());
        self
    }

    /// Strings: stop at (and consume) a zero byte.
    pub fn zero_terminated(mut self) -> Self {
        self.zero_terminated = true;
        self
    }

    /// Strings: consume to the end of the buffer.
    pub fn greedy(mut self) -> Self {
        self.greedy = true;
        self
    }

    /// Strings: drop trailing zero bytes before decoding text.
    pub fn strip_null(mut self) -> Self {
        self.strip_null = true;
        self
    }

    /// Strings: trim leading/trailing whitespace from the decoded text.
    pub fn trim(mut self) -> Self {
        self.trim = true;
        self
    }

    /// Text encoding; defaults to UTF-8.
    pub fn encoding(mut self, enc: Encoding) -> Self {
        self.encoding = enc;
        self
    }

    /// Buffers/arrays: stop when the predicate returns true. Buffers see
    /// `(current byte, remaining bytes)`, arrays `(decoded item, remaining
    /// bytes)`.
    pub fn read_until<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value, &[u8]) -> bool + Send + Sync + 'static,
    {
        self.read_until = Some(ReadUntil::Until(Arc::new(f)));
        self
    }

    /// Buffers/arrays: consume to the end of the buffer.
    pub fn read_until_eof(mut self) -> Self {
        self.read_until = Some(ReadUntil::Eof);
        self
    }

    /// Arrays: stop encoding when the predicate returns true for the
    /// just-encoded item.
    pub fn encode_until<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value, &Record) -> bool + Send + Sync + 'static,
    {
        self.encode_until = Some(Arc::new(f));
        self
    }

    /// Element type for arrays, choices, nests and pointers: a catalog kind
    /// name, an alias name, or an inline [`Schema`].
    pub fn of(mut self, t: impl Into<TypeRef>) -> Self {
        self.type_ref = Some(t.into());
        self
    }

    /// Arrays: produce a dictionary keyed by this subfield (decode-only).
    pub fn key(mut self, k: &str) -> Self {
        self.key = Some(k.to_string());
        self
    }

    /// Choices: the discriminator, as a field name or computed value.
    pub fn tag(mut self, t: impl Into<Lazy>) -> Self {
        self.tag = Some(t.into());
        self
    }

    /// Choices: add a case for the given discriminator value.
    pub fn case(mut self, tag: i64, t: impl Into<TypeRef>) -> Self {
        self.choices.insert(tag, t.into());
        self
    }

    /// Choices: fallback type when no case matches.
    pub fn default_choice(mut self, t: impl Into<TypeRef>) -> Self {
        self.default_choice = Some(t.into());
        self
    }

    /// Pointers: absolute byte position to decode at.
    pub fn offset(mut self, o: impl Into<Lazy>) -> Self {
        self.offset = Some(o.into());
        self
    }

    /// Replace the decoded value before it is stored.
    pub fn formatter<F>(mut self, f: F) -> Self
    where
        F: Fn(Value, &[u8], usize) -> Value + Send + Sync + 'static,
    {
        self.formatter = Some(Arc::new(f));
        self
    }

    /// Transform the value just before encoding; the original is restored
    /// afterwards so sibling fields see untransformed data.
    pub fn encoder<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value, &Record) -> Value + Send + Sync + 'static,
    {
        self.encoder = Some(Arc::new(f));
        self
    }

    /// Assert the decoded/encoded value equals a literal, or satisfies a
    /// predicate via [`Assert::check`].
    pub fn assert(mut self, a: impl Into<Assert>) -> Self {
        self.assert = Some(a.into());
        self
    }

    /// Fixed-width strings: pad byte, default space.
    pub fn pad(mut self, c: u8) -> Self {
        self.pad = c;
        self
    }

    /// Fixed-width strings: which side the text occupies; pad bytes go on
    /// the other side. Default [`Side::Right`] (pad after the text).
    pub fn padding(mut self, side: Side) -> Self {
        self.padding = side;
        self
    }

    /// Buffers: request an owned copy of the decoded slice. Decoded buffers
    /// always own their bytes here, so the hint is accepted as a no-op.
    pub fn cloned(self) -> Self {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lazy_eval() {
        let mut rec = Record::new();
        rec.insert("n".to_string(), Value::UInt(4));

        assert_eq!(Lazy::from(7).eval(&rec), Some(7));
        assert_eq!(Lazy::from("n").eval(&rec), Some(4));
        assert_eq!(Lazy::from("missing").eval(&rec), None);
        assert_eq!(Lazy::compute(|r| r.len() as i64).eval(&rec), Some(1));
    }

    #[test]
    fn test_lazy_dotted_field() {
        let mut inner = Record::new();
        inner.insert("len".to_string(), Value::UInt(9));
        let mut rec = Record::new();
        rec.insert("head".to_string(), Value::Record(inner));

        assert_eq!(Lazy::from("head.len").eval(&rec), Some(9));
    }

    #[test]
    fn test_assert_holds() {
        let rec = Record::new();
        assert!(Assert::from(5).holds(&rec, &Value::UInt(5)));
        assert!(!Assert::from(5).holds(&rec, &Value::UInt(6)));
        assert!(Assert::from("ok").holds(&rec, &Value::Str("ok".into())));
        assert!(Assert::check(|_, v| v.as_int() == Some(1)).holds(&rec, &Value::Int(1)));
    }
}
