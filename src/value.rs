use std::collections::HashMap;
use std::fmt;

/// A decoded record: field names mapped to values.
pub type Record = HashMap<String, Value>;

/// Dynamic value type produced by decoding, similar to `serde_json::Value`.
///
/// Unsigned primitives and bit fields decode to `UInt`, signed primitives
/// to `Int`, floats to `Float`. `Map` is the dictionary form produced by
/// keyed arrays and cannot be encoded back.
#[derive(Clone, Debug)]
pub enum Value {
    /// Unsigned integer, up to 64 bits.
    UInt(u64),
    /// Signed integer, up to 64 bits.
    Int(i64),
    /// IEEE 754 floating point (both 32- and 64-bit kinds widen to f64).
    Float(f64),
    /// Decoded text.
    Str(String),
    /// Raw binary data.
    Bytes(Vec<u8>),
    /// A nested record with named fields.
    Record(Record),
    /// An ordered sequence of values.
    Array(Vec<Value>),
    /// A dictionary of records produced by a keyed array (decode-only).
    Map(HashMap<String, Value>),
}

impl Value {
    /// Create a new empty record value.
    pub fn record() -> Self {
        Value::Record(Record::new())
    }

    /// Helper to build a record from key-value pairs.
    pub fn from_fields(fields: Vec<(&str, Value)>) -> Self {
        let mut map = Record::new();
        for (k, v) in fields {
            map.insert(k.to_string(), v);
        }
        Value::Record(map)
    }

    /// Get a field from a record or map value; `None` otherwise.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Record(map) | Value::Map(map) => map.get(key),
            _ => None,
        }
    }

    /// Resolve a dotted path (`"header.flags.ack"`) through nested records.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut v = self;
        for seg in path.split('.') {
            v = v.get(seg)?;
        }
        Some(v)
    }

    /// Get as i64, converting from `UInt` if needed.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::UInt(v) => Some(*v as i64),
            _ => None,
        }
    }

    /// Get as u64, converting from `Int` if needed.
    pub fn as_uint(&self) -> Option<u64> {
        match self {
            Value::UInt(v) => Some(*v),
            Value::Int(v) => Some(*v as u64),
            _ => None,
        }
    }

    /// Get as f64.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            Value::UInt(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Get as string slice.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(v) => Some(v),
            _ => None,
        }
    }

    /// Get as binary slice.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(v) => Some(v),
            _ => None,
        }
    }

    /// Get as record map.
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(map) => Some(map),
            _ => None,
        }
    }

    /// Get as array.
    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(v) => Some(v),
            _ => None,
        }
    }

    /// Get as keyed-array dictionary.
    pub fn as_map(&self) -> Option<&HashMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Returns a short type description string.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::UInt(_) | Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Record(_) => "record",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::UInt(a), Value::UInt(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::UInt(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Str(v) => write!(f, "\"{}\"", v),
            Value::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            Value::Record(map) | Value::Map(map) => {
                write!(f, "{{ ")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, " }}")
            }
            Value::Array(arr) => {
                write!(f, "[")?;
                for (i, v) in arr.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
        }
    }
}

// Conversion traits
impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::UInt(v as u64)
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Value::UInt(v as u64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

impl From<Record> for Value {
    fn from(v: Record) -> Self {
        Value::Record(v)
    }
}

impl TryFrom<Value> for u64 {
    type Error = &'static str;
    fn try_from(v: Value) -> Result<Self, Self::Error> {
        v.as_uint().ok_or("expected integer")
    }
}

impl TryFrom<Value> for i64 {
    type Error = &'static str;
    fn try_from(v: Value) -> Result<Self, Self::Error> {
        v.as_int().ok_or("expected integer")
    }
}

impl TryFrom<Value> for f64 {
    type Error = &'static str;
    fn try_from(v: Value) -> Result<Self, Self::Error> {
        v.as_float().ok_or("expected float")
    }
}

impl TryFrom<Value> for String {
    type Error = &'static str;
    fn try_from(v: Value) -> Result<Self, Self::Error> {
        match v {
            Value::Str(s) => Ok(s),
            _ => Err("expected string"),
        }
    }
}

impl TryFrom<Value> for Vec<u8> {
    type Error = &'static str;
    fn try_from(v: Value) -> Result<Self, Self::Error> {
        match v {
            Value::Bytes(b) => Ok(b),
            _ => Err("expected bytes"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_conversions() {
        assert_eq!(Value::from(42u64), Value::UInt(42));
        assert_eq!(Value::from(-3i64), Value::Int(-3));
        assert_eq!(Value::from("hi"), Value::Str("hi".into()));
        assert_eq!(Value::from(0.5f64), Value::Float(0.5));
    }

    #[test]
    fn test_record_builder() {
        let val = Value::from_fields(vec![("a", 1u64.into()), ("b", "x".into())]);
        assert_eq!(val.get("a"), Some(&Value::UInt(1)));
        assert_eq!(val.get("b"), Some(&Value::Str("x".into())));
        assert_eq!(val.get("missing"), None);
    }

    #[test]
    fn test_dotted_lookup() {
        let inner = Value::from_fields(vec![("len", 7u64.into())]);
        let val = Value::from_fields(vec![("header", inner)]);
        assert_eq!(val.lookup("header.len"), Some(&Value::UInt(7)));
        assert_eq!(val.lookup("header.none"), None);
        assert_eq!(val.lookup("nope.len"), None);
    }

    #[test]
    fn test_float_equality_is_bitwise() {
        assert_eq!(Value::Float(0.1), Value::Float(0.1));
        assert_ne!(Value::UInt(1), Value::Int(1));
    }
}
