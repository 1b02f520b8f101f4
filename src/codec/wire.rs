//! Byte-level IO: checked primitive reads, primitive writes, and the
//! growable sink used by the encoder.

use crate::error::{DecodeError, EncodeError};
use crate::kind::{Endian, Numeric, Primitive};
use crate::value::Value;

/// Borrow `n` bytes at `offset`, or report how many bytes would be needed.
#[inline]
pub fn take(data: &[u8], offset: usize, n: usize) -> Result<&[u8], DecodeError> {
    let end = offset.checked_add(n).ok_or(DecodeError::Truncated {
        need: usize::MAX,
        have: data.len(),
    })?;
    data.get(offset..end).ok_or(DecodeError::Truncated {
        need: end,
        have: data.len(),
    })
}

/// Read one primitive at `offset` in its declared width and endianness.
pub fn read_prim(data: &[u8], offset: usize, prim: Primitive) -> Result<Value, DecodeError> {
    let b = take(data, offset, prim.width())?;
    let value = match (prim.numeric, prim.endian) {
        (Numeric::U8, _) => Value::UInt(b[0] as u64),
        (Numeric::I8, _) => Value::Int(b[0] as i8 as i64),
        (Numeric::U16, Endian::Big) => Value::UInt(u16::from_be_bytes([b[0], b[1]]) as u64),
        (Numeric::U16, Endian::Little) => Value::UInt(u16::from_le_bytes([b[0], b[1]]) as u64),
        (Numeric::I16, Endian::Big) => Value::Int(i16::from_be_bytes([b[0], b[1]]) as i64),
        (Numeric::I16, Endian::Little) => Value::Int(i16::from_le_bytes([b[0], b[1]]) as i64),
        (Numeric::U32, Endian::Big) => {
            Value::UInt(u32::from_be_bytes([b[0], b[1], b[2], b[3]]) as u64)
        }
        (Numeric::U32, Endian::Little) => {
            Value::UInt(u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as u64)
        }
        (Numeric::I32, Endian::Big) => {
            Value::Int(i32::from_be_bytes([b[0], b[1], b[2], b[3]]) as i64)
        }
        (Numeric::I32, Endian::Little) => {
            Value::Int(i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as i64)
        }
        (Numeric::U64, Endian::Big) => Value::UInt(u64::from_be_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ])),
        (Numeric::U64, Endian::Little) => Value::UInt(u64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ])),
        (Numeric::I64, Endian::Big) => Value::Int(i64::from_be_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ])),
        (Numeric::I64, Endian::Little) => Value::Int(i64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ])),
        (Numeric::F32, Endian::Big) => {
            Value::Float(f32::from_be_bytes([b[0], b[1], b[2], b[3]]) as f64)
        }
        (Numeric::F32, Endian::Little) => {
            Value::Float(f32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64)
        }
        (Numeric::F64, Endian::Big) => Value::Float(f64::from_be_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ])),
        (Numeric::F64, Endian::Little) => Value::Float(f64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ])),
    };
    Ok(value)
}

/// Write one primitive in its declared width and endianness. Integer and
/// float values coerce to the field's kind; out-of-range values wrap.
pub fn write_prim(
    sink: &mut Sink,
    prim: Primitive,
    value: &Value,
    field: &str,
) -> Result<(), EncodeError> {
    match prim.numeric {
        Numeric::U8 | Numeric::U16 | Numeric::U32 | Numeric::U64 => {
            let v = coerce_u64(value).ok_or_else(|| mismatch(field, "integer", value))?;
            match (prim.numeric, prim.endian) {
                (Numeric::U8, _) => sink.put_u8(v as u8),
                (Numeric::U16, Endian::Big) => sink.put_slice(&(v as u16).to_be_bytes()),
                (Numeric::U16, Endian::Little) => sink.put_slice(&(v as u16).to_le_bytes()),
                (Numeric::U32, Endian::Big) => sink.put_slice(&(v as u32).to_be_bytes()),
                (Numeric::U32, Endian::Little) => sink.put_slice(&(v as u32).to_le_bytes()),
                (Numeric::U64, Endian::Big) => sink.put_slice(&v.to_be_bytes()),
                _ => sink.put_slice(&v.to_le_bytes()),
            }
        }
        Numeric::I8 | Numeric::I16 | Numeric::I32 | Numeric::I64 => {
            let v = coerce_i64(value).ok_or_else(|| mismatch(field, "integer", value))?;
            match (prim.numeric, prim.endian) {
                (Numeric::I8, _) => sink.put_u8(v as i8 as u8),
                (Numeric::I16, Endian::Big) => sink.put_slice(&(v as i16).to_be_bytes()),
                (Numeric::I16, Endian::Little) => sink.put_slice(&(v as i16).to_le_bytes()),
                (Numeric::I32, Endian::Big) => sink.put_slice(&(v as i32).to_be_bytes()),
                (Numeric::I32, Endian::Little) => sink.put_slice(&(v as i32).to_le_bytes()),
                (Numeric::I64, Endian::Big) => sink.put_slice(&v.to_be_bytes()),
                _ => sink.put_slice(&v.to_le_bytes()),
            }
        }
        Numeric::F32 | Numeric::F64 => {
            let v = coerce_f64(value).ok_or_else(|| mismatch(field, "float", value))?;
            match (prim.numeric, prim.endian) {
                (Numeric::F32, Endian::Big) => sink.put_slice(&(v as f32).to_be_bytes()),
                (Numeric::F32, Endian::Little) => sink.put_slice(&(v as f32).to_le_bytes()),
                (Numeric::F64, Endian::Big) => sink.put_slice(&v.to_be_bytes()),
                _ => sink.put_slice(&v.to_le_bytes()),
            }
        }
    }
    Ok(())
}

/// Read the packed integer backing a bit run: 1-4 bytes, big-endian byte
/// order, with the 24-bit form assembled as `(u16be << 8) | u8`.
pub fn read_packed_bits(data: &[u8], offset: usize, nbytes: usize) -> Result<u32, DecodeError> {
    let b = take(data, offset, nbytes)?;
    Ok(match nbytes {
        1 => b[0] as u32,
        2 => u16::from_be_bytes([b[0], b[1]]) as u32,
        3 => ((u16::from_be_bytes([b[0], b[1]]) as u32) << 8) | b[2] as u32,
        _ => u32::from_be_bytes([b[0], b[1], b[2], b[3]]),
    })
}

/// Write the packed integer backing a bit run, mirroring
/// [`read_packed_bits`].
pub fn write_packed_bits(sink: &mut Sink, nbytes: usize, packed: u32) {
    match nbytes {
        1 => sink.put_u8(packed as u8),
        2 => sink.put_slice(&(packed as u16).to_be_bytes()),
        3 => {
            sink.put_slice(&((packed >> 8) as u16).to_be_bytes());
            sink.put_u8(packed as u8);
        }
        _ => sink.put_slice(&packed.to_be_bytes()),
    }
}

fn mismatch(field: &str, expected: &'static str, value: &Value) -> EncodeError {
    EncodeError::TypeMismatch {
        field: field.to_string(),
        expected,
        actual: value.type_name(),
    }
}

pub(crate) fn coerce_u64(value: &Value) -> Option<u64> {
    match value {
        Value::UInt(v) => Some(*v),
        Value::Int(v) => Some(*v as u64),
        Value::Float(v) => Some(*v as u64),
        _ => None,
    }
}

fn coerce_i64(value: &Value) -> Option<i64> {
    match value {
        Value::UInt(v) => Some(*v as i64),
        Value::Int(v) => Some(*v),
        Value::Float(v) => Some(*v as i64),
        _ => None,
    }
}

fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::UInt(v) => Some(*v as f64),
        Value::Int(v) => Some(*v as f64),
        Value::Float(v) => Some(*v),
        _ => None,
    }
}

/// Growable byte sink for encoding.
#[derive(Debug, Default)]
pub struct Sink {
    buf: Vec<u8>,
}

impl Sink {
    pub fn with_capacity(capacity: usize) -> Self {
        Sink {
            buf: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn put_u8(&mut self, byte: u8) {
        self.buf.push(byte);
    }

    #[inline]
    pub fn put_slice(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn put_zeros(&mut self, n: usize) {
        self.buf.resize(self.buf.len() + n, 0);
    }

    /// The bytes written so far.
    pub fn snapshot(&self) -> &[u8] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Drop everything past the first `n` bytes.
    pub fn truncate(&mut self, n: usize) {
        self.buf.truncate(n);
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}
