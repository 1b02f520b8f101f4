/// Errors raised while composing a schema chain.
///
/// Builder methods never panic; the first misuse is recorded on the chain
/// and returned by [`Schema::check`](crate::Schema::check), `parse` and
/// `encode`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("string field '{field}' needs exactly one of length, zero_terminated or greedy (length plus zero_terminated is also accepted)")]
    StringMode { field: String },

    #[error("string field '{field}': strip_null requires length or greedy")]
    StripNullWithoutLength { field: String },

    #[error("buffer field '{field}' needs a length or read_until option")]
    BufferMode { field: String },

    #[error("array field '{field}' needs one of length, length_in_bytes or read_until")]
    ArrayMode { field: String },

    #[error("field '{field}' needs an element type")]
    MissingType { field: String },

    #[error("type '{type_name}' of field '{field}' is neither a primitive nor a registered alias")]
    UnknownType { field: String, type_name: String },

    #[error("choice field '{field}' needs a tag and at least one case")]
    ChoiceMode { field: String },

    #[error("nest field '{field}' needs an inline schema or an alias type")]
    NestType { field: String },

    #[error("an unnamed nest needs an inline schema type")]
    AnonymousNest,

    #[error("pointer field '{field}' needs an offset and a type")]
    PointerMode { field: String },

    #[error("seek does not accept an assert")]
    SeekAssert,

    #[error("{modifier} requires a preceding field")]
    DanglingModifier { modifier: &'static str },
}

/// Errors raised while decoding a buffer.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("truncated data: need {need} bytes, have {have}")]
    Truncated { need: usize, have: usize },

    #[error("assertion failed on field '{field}': got {value}")]
    AssertFailed { field: String, value: String },

    #[error("no case for tag {tag} on choice field '{field}'")]
    UndefinedTag { field: String, tag: i64 },

    #[error("bit run of {bits} bits exceeds 32")]
    BitRunTooLong { bits: u32 },

    #[error("unknown alias '{0}'")]
    UnknownAlias(String),

    #[error("field '{field}' is not valid {encoding}")]
    InvalidText {
        field: String,
        encoding: &'static str,
    },

    #[error("late-bound option '{name}' did not resolve to an integer")]
    LateBound { name: String },

    #[error("length of field '{field}' resolved to {value}")]
    BadLength { field: String, value: i64 },

    #[error("offset moved out of range ({offset})")]
    OffsetOutOfRange { offset: i64 },

    #[error("item of keyed array '{field}' has no '{key}' subfield")]
    MissingKey { field: String, key: String },
}

/// Errors raised while encoding a record.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EncodeError {
    #[error("expected a record, got {actual}")]
    NotARecord { actual: &'static str },

    #[error("type mismatch for field '{field}': expected {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("missing field '{field}'")]
    MissingField { field: String },

    #[error("assertion failed on field '{field}': got {value}")]
    AssertFailed { field: String, value: String },

    #[error("no case for tag {tag} on choice field '{field}'")]
    UndefinedTag { field: String, tag: i64 },

    #[error("bit run of {bits} bits exceeds 32")]
    BitRunTooLong { bits: u32 },

    #[error("unknown alias '{0}'")]
    UnknownAlias(String),

    #[error("keyed array field '{field}' cannot be encoded")]
    KeyedArray { field: String },

    #[error("value of field '{field}' cannot be represented as {encoding}")]
    Unencodable {
        field: String,
        encoding: &'static str,
    },

    #[error("late-bound option '{name}' did not resolve to an integer")]
    LateBound { name: String },

    #[error("length of field '{field}' resolved to {value}")]
    BadLength { field: String, value: i64 },
}

/// Top-level error type that wraps all sub-errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// Result type alias for schema operations.
pub type Result<T> = std::result::Result<T, SchemaError>;
