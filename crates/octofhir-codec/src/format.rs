//! Byte layout of record values.
//!
//! ```text
//! value   := tag payload
//! tag     := 0 null | 1 string | 2 i64 | 3 f64 | 4 bool | 5 record | 6 list
//! string  := u32 len, utf-8 bytes
//! record  := string(type name), body
//! body    := 0 present:u8 [string]          (raw primitive)
//!          | 1 count:u32 (string value)*    (named fields)
//! list    := count:u32 value*
//! ```
//!
//! All integers are little-endian. A serialized value is prefixed by one
//! format version byte.

use std::io::{Cursor, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use indexmap::IndexMap;

use crate::error::{CodecError, CodecResult};
use crate::record::{BinaryRecord, RecordBody, RecordValue};

pub const FORMAT_VERSION: u8 = 1;

/// Deepest nesting accepted when reading.
pub const MAX_DEPTH: usize = 128;

const TAG_NULL: u8 = 0;
const TAG_STRING: u8 = 1;
const TAG_LONG: u8 = 2;
const TAG_DOUBLE: u8 = 3;
const TAG_BOOL: u8 = 4;
const TAG_RECORD: u8 = 5;
const TAG_LIST: u8 = 6;

const BODY_RAW: u8 = 0;
const BODY_FIELDS: u8 = 1;

pub fn to_bytes(value: &RecordValue) -> CodecResult<Vec<u8>> {
    let mut buf = Vec::with_capacity(64);
    buf.write_u8(FORMAT_VERSION).map_err(io_error)?;
    write_value(&mut buf, value)?;
    Ok(buf)
}

pub fn record_to_bytes(record: &BinaryRecord) -> CodecResult<Vec<u8>> {
    let mut buf = Vec::with_capacity(128);
    buf.write_u8(FORMAT_VERSION).map_err(io_error)?;
    buf.write_u8(TAG_RECORD).map_err(io_error)?;
    write_record(&mut buf, record)?;
    Ok(buf)
}

pub fn from_bytes(bytes: &[u8]) -> CodecResult<RecordValue> {
    let mut reader = Cursor::new(bytes);
    let version = reader.read_u8().map_err(read_error)?;
    if version != FORMAT_VERSION {
        return Err(CodecError::UnsupportedVersion(version));
    }

    let value = read_value(&mut reader, 0)?;

    let consumed = reader.position() as usize;
    if consumed != bytes.len() {
        return Err(CodecError::TrailingBytes(bytes.len() - consumed));
    }
    Ok(value)
}

fn write_value<W: Write>(w: &mut W, value: &RecordValue) -> CodecResult<()> {
    match value {
        RecordValue::Null => w.write_u8(TAG_NULL).map_err(io_error),
        RecordValue::String(s) => {
            w.write_u8(TAG_STRING).map_err(io_error)?;
            write_string(w, s)
        }
        RecordValue::Long(n) => {
            w.write_u8(TAG_LONG).map_err(io_error)?;
            w.write_i64::<LittleEndian>(*n).map_err(io_error)
        }
        RecordValue::Double(d) => {
            w.write_u8(TAG_DOUBLE).map_err(io_error)?;
            w.write_f64::<LittleEndian>(*d).map_err(io_error)
        }
        RecordValue::Bool(b) => {
            w.write_u8(TAG_BOOL).map_err(io_error)?;
            w.write_u8(u8::from(*b)).map_err(io_error)
        }
        RecordValue::Record(record) => {
            w.write_u8(TAG_RECORD).map_err(io_error)?;
            write_record(w, record)
        }
        RecordValue::List(items) => {
            w.write_u8(TAG_LIST).map_err(io_error)?;
            write_len(w, items.len())?;
            for item in items {
                write_value(w, item)?;
            }
            Ok(())
        }
    }
}

fn write_record<W: Write>(w: &mut W, record: &BinaryRecord) -> CodecResult<()> {
    write_string(w, &record.type_name)?;
    match &record.body {
        RecordBody::Raw(value) => {
            w.write_u8(BODY_RAW).map_err(io_error)?;
            match value {
                Some(s) => {
                    w.write_u8(1).map_err(io_error)?;
                    write_string(w, s)
                }
                None => w.write_u8(0).map_err(io_error),
            }
        }
        RecordBody::Fields(fields) => {
            w.write_u8(BODY_FIELDS).map_err(io_error)?;
            write_len(w, fields.len())?;
            for (name, value) in fields {
                write_string(w, name)?;
                write_value(w, value)?;
            }
            Ok(())
        }
    }
}

fn write_string<W: Write>(w: &mut W, s: &str) -> CodecResult<()> {
    write_len(w, s.len())?;
    w.write_all(s.as_bytes()).map_err(io_error)
}

fn write_len<W: Write>(w: &mut W, len: usize) -> CodecResult<()> {
    let len = u32::try_from(len).map_err(|_| CodecError::Io(format!("length {len} exceeds u32")))?;
    w.write_u32::<LittleEndian>(len).map_err(io_error)
}

fn read_value(r: &mut Cursor<&[u8]>, depth: usize) -> CodecResult<RecordValue> {
    if depth > MAX_DEPTH {
        return Err(CodecError::TooDeep(MAX_DEPTH));
    }

    let tag = r.read_u8().map_err(read_error)?;
    match tag {
        TAG_NULL => Ok(RecordValue::Null),
        TAG_STRING => Ok(RecordValue::String(read_string(r)?)),
        TAG_LONG => Ok(RecordValue::Long(r.read_i64::<LittleEndian>().map_err(read_error)?)),
        TAG_DOUBLE => Ok(RecordValue::Double(r.read_f64::<LittleEndian>().map_err(read_error)?)),
        TAG_BOOL => match r.read_u8().map_err(read_error)? {
            0 => Ok(RecordValue::Bool(false)),
            1 => Ok(RecordValue::Bool(true)),
            other => Err(CodecError::InvalidTag {
                context: "bool",
                tag: other,
            }),
        },
        TAG_RECORD => Ok(RecordValue::Record(read_record(r, depth)?)),
        TAG_LIST => {
            let count = read_count(r)?;
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                items.push(read_value(r, depth + 1)?);
            }
            Ok(RecordValue::List(items))
        }
        other => Err(CodecError::InvalidTag {
            context: "value",
            tag: other,
        }),
    }
}

fn read_record(r: &mut Cursor<&[u8]>, depth: usize) -> CodecResult<BinaryRecord> {
    let type_name = read_string(r)?;
    let body = match r.read_u8().map_err(read_error)? {
        BODY_RAW => match r.read_u8().map_err(read_error)? {
            0 => RecordBody::Raw(None),
            1 => RecordBody::Raw(Some(read_string(r)?)),
            other => {
                return Err(CodecError::InvalidTag {
                    context: "raw presence",
                    tag: other,
                });
            }
        },
        BODY_FIELDS => {
            let count = read_count(r)?;
            let mut fields = IndexMap::with_capacity(count);
            for _ in 0..count {
                let name = read_string(r)?;
                let value = read_value(r, depth + 1)?;
                fields.insert(name, value);
            }
            RecordBody::Fields(fields)
        }
        other => {
            return Err(CodecError::InvalidTag {
                context: "record body",
                tag: other,
            });
        }
    };
    Ok(BinaryRecord { type_name, body })
}

fn read_string(r: &mut Cursor<&[u8]>) -> CodecResult<String> {
    let len = r.read_u32::<LittleEndian>().map_err(read_error)? as usize;
    if len > remaining(r) {
        return Err(CodecError::Truncated);
    }
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf).map_err(read_error)?;
    String::from_utf8(buf).map_err(|_| CodecError::InvalidUtf8)
}

/// Reads an element count. Every element takes at least one byte, so a
/// count larger than the remaining input is rejected before allocating.
fn read_count(r: &mut Cursor<&[u8]>) -> CodecResult<usize> {
    let count = r.read_u32::<LittleEndian>().map_err(read_error)? as usize;
    if count > remaining(r) {
        return Err(CodecError::Truncated);
    }
    Ok(count)
}

fn remaining(r: &Cursor<&[u8]>) -> usize {
    r.get_ref().len().saturating_sub(r.position() as usize)
}

fn read_error(err: std::io::Error) -> CodecError {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        CodecError::Truncated
    } else {
        CodecError::Io(err.to_string())
    }
}

fn io_error(err: std::io::Error) -> CodecError {
    CodecError::Io(err.to_string())
}
