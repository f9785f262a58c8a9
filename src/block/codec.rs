//! Row-at-a-time binary encoding.
//!
//! Layout of an encoded row:
//! - NULL bitmap, 1 bit per field rounded up to bytes (bit set = NULL)
//! - each non-NULL field in order:
//!   - boolean: 1 byte (0 or 1)
//!   - bigint / double: 8 bytes little-endian
//!   - varchar: u32 length followed by UTF-8 bytes
//!   - array: u32 element count, element NULL bitmap, then elements
//!   - row: field NULL bitmap, then fields
//!
//! [`EncodedRow`] indexes field offsets up front and decodes a field only when
//! it is read, so a malformed field fails the row only if an evaluator
//! actually touches it.

use crate::block::{DataType, RowCursor, Value};
use crate::error::{EvalResult, EvaluationError};
use anyhow::{bail, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use bytes::{BufMut, Bytes, BytesMut};
use std::io::Cursor;
use std::sync::Arc;

/// Encode a row of values according to `schema`
pub fn encode_row(values: &[Option<Value>], schema: &[DataType]) -> Result<Bytes> {
    if values.len() != schema.len() {
        bail!(
            "Value count {} doesn't match schema length {}",
            values.len(),
            schema.len()
        );
    }

    let mut buf = BytesMut::new();
    encode_fields(&mut buf, values, schema.iter())?;
    Ok(buf.freeze())
}

fn encode_fields<'a>(
    buf: &mut BytesMut,
    values: &[Option<Value>],
    types: impl Iterator<Item = &'a DataType>,
) -> Result<()> {
    buf.put_slice(&null_bitmap(values));
    for (value, data_type) in values.iter().zip(types) {
        if let Some(value) = value {
            encode_value(buf, value, data_type)?;
        }
    }
    Ok(())
}

fn null_bitmap(values: &[Option<Value>]) -> Vec<u8> {
    let mut bitmap = vec![0u8; values.len().div_ceil(8)];
    for (i, value) in values.iter().enumerate() {
        if value.is_none() {
            bitmap[i / 8] |= 1 << (i % 8);
        }
    }
    bitmap
}

fn encode_value(buf: &mut BytesMut, value: &Value, data_type: &DataType) -> Result<()> {
    match (value, data_type) {
        (Value::Boolean(b), DataType::Boolean) => buf.put_u8(u8::from(*b)),
        (Value::Bigint(n), DataType::Bigint) => buf.put_i64_le(*n),
        (Value::Double(n), DataType::Double) => buf.put_f64_le(*n),
        (Value::Varchar(s), DataType::Varchar) => {
            buf.put_u32_le(s.len() as u32);
            buf.put_slice(s.as_bytes());
        }
        (Value::Array(elements), DataType::Array(element_type)) => {
            buf.put_u32_le(elements.len() as u32);
            encode_fields(buf, elements, std::iter::repeat(&**element_type))?;
        }
        (Value::Row(fields), DataType::Row(field_types)) if fields.len() == field_types.len() => {
            encode_fields(buf, fields, field_types.iter())?;
        }
        _ => bail!(
            "Value {} is not compatible with type {}",
            value,
            data_type
        ),
    }
    Ok(())
}

/// A [`RowCursor`] reading fields straight out of an encoded row
#[derive(Debug, Clone)]
pub struct EncodedRow {
    data: Bytes,
    schema: Arc<[DataType]>,
    /// Byte offset of each field, `None` for NULL fields
    offsets: Vec<Option<usize>>,
}

impl EncodedRow {
    /// Index the fields of `data`. Fails if the bytes are too short for the
    /// schema.
    pub fn new(data: Bytes, schema: Arc<[DataType]>) -> EvalResult<Self> {
        let bitmap_size = schema.len().div_ceil(8);
        if data.len() < bitmap_size {
            return Err(EvaluationError::invalid_format(
                "encoded row too short for NULL bitmap",
            ));
        }

        let mut cursor = Cursor::new(&data[..]);
        cursor.set_position(bitmap_size as u64);

        let mut offsets = Vec::with_capacity(schema.len());
        for (field, data_type) in schema.iter().enumerate() {
            if bit_is_set(&data[..bitmap_size], field) {
                offsets.push(None);
                continue;
            }
            offsets.push(Some(cursor.position() as usize));
            skip_value(&mut cursor, data_type)
                .map_err(|e| e.with_context(format!("field {}", field)))?;
        }

        Ok(Self {
            data,
            schema,
            offsets,
        })
    }

    pub fn schema(&self) -> &[DataType] {
        &self.schema
    }
}

impl RowCursor for EncodedRow {
    fn field_count(&self) -> usize {
        self.schema.len()
    }

    fn read(&self, field: usize) -> EvalResult<Option<Value>> {
        let offset = match self.offsets.get(field) {
            Some(Some(offset)) => *offset,
            Some(None) => return Ok(None),
            None => {
                return Err(EvaluationError::internal(format!(
                    "field {} out of bounds for row with {} fields",
                    field,
                    self.schema.len()
                )))
            }
        };
        let data_type = &self.schema[field];
        let mut cursor = Cursor::new(&self.data[..]);
        cursor.set_position(offset as u64);
        decode_value(&mut cursor, data_type)
            .map(Some)
            .map_err(|e| e.with_context(format!("field {}", field)))
    }

    fn is_null(&self, field: usize) -> EvalResult<bool> {
        match self.offsets.get(field) {
            Some(offset) => Ok(offset.is_none()),
            None => Err(EvaluationError::internal(format!(
                "field {} out of bounds for row with {} fields",
                field,
                self.schema.len()
            ))),
        }
    }
}

fn bit_is_set(bitmap: &[u8], i: usize) -> bool {
    bitmap[i / 8] & (1 << (i % 8)) != 0
}

fn truncated(what: &str) -> EvaluationError {
    EvaluationError::invalid_format(format!("truncated {} value", what))
}

fn read_len(cursor: &mut Cursor<&[u8]>, what: &str) -> EvalResult<usize> {
    cursor
        .read_u32::<LittleEndian>()
        .map(|n| n as usize)
        .map_err(|_| truncated(what))
}

fn read_bitmap(cursor: &mut Cursor<&[u8]>, count: usize) -> EvalResult<Vec<u8>> {
    let start = cursor.position() as usize;
    let end = start + count.div_ceil(8);
    let data = *cursor.get_ref();
    if end > data.len() {
        return Err(EvaluationError::invalid_format("truncated NULL bitmap"));
    }
    cursor.set_position(end as u64);
    Ok(data[start..end].to_vec())
}

fn advance(cursor: &mut Cursor<&[u8]>, n: usize, what: &str) -> EvalResult<()> {
    let end = cursor.position() as usize + n;
    if end > cursor.get_ref().len() {
        return Err(truncated(what));
    }
    cursor.set_position(end as u64);
    Ok(())
}

fn skip_value(cursor: &mut Cursor<&[u8]>, data_type: &DataType) -> EvalResult<()> {
    match data_type {
        DataType::Boolean => advance(cursor, 1, "boolean"),
        DataType::Bigint => advance(cursor, 8, "bigint"),
        DataType::Double => advance(cursor, 8, "double"),
        DataType::Varchar => {
            let len = read_len(cursor, "varchar")?;
            advance(cursor, len, "varchar")
        }
        DataType::Array(element_type) => {
            let count = read_len(cursor, "array")?;
            let bitmap = read_bitmap(cursor, count)?;
            for i in 0..count {
                if !bit_is_set(&bitmap, i) {
                    skip_value(cursor, element_type)?;
                }
            }
            Ok(())
        }
        DataType::Row(field_types) => {
            let bitmap = read_bitmap(cursor, field_types.len())?;
            for (i, field_type) in field_types.iter().enumerate() {
                if !bit_is_set(&bitmap, i) {
                    skip_value(cursor, field_type)?;
                }
            }
            Ok(())
        }
        DataType::Unknown | DataType::Function { .. } => Err(EvaluationError::type_mismatch(
            format!("type {} cannot be stored in a row", data_type),
        )),
    }
}

fn decode_value(cursor: &mut Cursor<&[u8]>, data_type: &DataType) -> EvalResult<Value> {
    match data_type {
        DataType::Boolean => match cursor.read_u8().map_err(|_| truncated("boolean"))? {
            0 => Ok(Value::Boolean(false)),
            1 => Ok(Value::Boolean(true)),
            other => Err(EvaluationError::invalid_format(format!(
                "cannot decode byte {} as boolean",
                other
            ))),
        },
        DataType::Bigint => cursor
            .read_i64::<LittleEndian>()
            .map(Value::Bigint)
            .map_err(|_| truncated("bigint")),
        DataType::Double => cursor
            .read_f64::<LittleEndian>()
            .map(Value::Double)
            .map_err(|_| truncated("double")),
        DataType::Varchar => {
            let len = read_len(cursor, "varchar")?;
            let start = cursor.position() as usize;
            advance(cursor, len, "varchar")?;
            let bytes = &cursor.get_ref()[start..start + len];
            let s = std::str::from_utf8(bytes).map_err(|e| {
                EvaluationError::invalid_format(format!("cannot decode varchar: {}", e))
            })?;
            Ok(Value::varchar(s))
        }
        DataType::Array(element_type) => {
            let count = read_len(cursor, "array")?;
            let bitmap = read_bitmap(cursor, count)?;
            let mut elements = Vec::with_capacity(count);
            for i in 0..count {
                if bit_is_set(&bitmap, i) {
                    elements.push(None);
                } else {
                    elements.push(Some(decode_value(cursor, element_type)?));
                }
            }
            Ok(Value::array(elements))
        }
        DataType::Row(field_types) => {
            let bitmap = read_bitmap(cursor, field_types.len())?;
            let mut fields = Vec::with_capacity(field_types.len());
            for (i, field_type) in field_types.iter().enumerate() {
                if bit_is_set(&bitmap, i) {
                    fields.push(None);
                } else {
                    fields.push(Some(decode_value(cursor, field_type)?));
                }
            }
            Ok(Value::row(fields))
        }
        DataType::Unknown | DataType::Function { .. } => Err(EvaluationError::type_mismatch(
            format!("type {} cannot be stored in a row", data_type),
        )),
    }
}
