//! Binform: declarative binary format descriptions.
//!
//! Compose a schema for a byte-oriented structure with a chainable builder,
//! then decode buffers into dynamic value trees and encode them back.
//! Supports bit-packed fields straddling byte boundaries, length- and
//! terminator-driven strings, buffers and arrays, discriminated unions,
//! nested and recursive schemas via a process-wide alias registry, and
//! absolute pointer redirection during decode.
//!
//! # Quick Start
//!
//! ```rust
//! use binform::{Opts, Schema, Value};
//!
//! let schema = Schema::start()
//!     .uint8("count")
//!     .array("items", Opts::new().length("count").of("uint16be"));
//!
//! let rec = schema.parse(&[0x02, 0x00, 0x01, 0x00, 0x02]).unwrap();
//! assert_eq!(rec.get("count"), Some(&Value::UInt(2)));
//! assert_eq!(
//!     rec.get("items"),
//!     Some(&Value::Array(vec![Value::UInt(1), Value::UInt(2)]))
//! );
//!
//! let bytes = schema.encode(&rec).unwrap();
//! assert_eq!(bytes, vec![0x02, 0x00, 0x01, 0x00, 0x02]);
//! ```

pub mod codec;
pub mod error;
pub mod kind;
pub mod options;
pub mod registry;
pub mod schema;
mod size;
pub mod value;

#[cfg(feature = "serde")]
mod serde;

pub use error::{BuildError, DecodeError, EncodeError, Result, SchemaError};
pub use kind::{Encoding, Endian, Numeric, Primitive};
pub use options::{Assert, Lazy, Opts, ReadUntil, Side, TypeRef};
pub use schema::Schema;
pub use value::{Record, Value};
