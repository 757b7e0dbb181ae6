//! Column chunk body serialization
//!
//! A chunk body (before compression) is laid out as
//! `[u32 triple count][rep levels][def levels][values]`. Levels are u16 LE
//! and are omitted entirely when the column's maximum depth is 0. Only
//! non-null values are stored: Int64 and Double as 8 bytes, Bool as 1 byte,
//! Timestamp as i128 nanoseconds, strings and bytes with a u32 length prefix.

use crate::codec::LevelValue;
use crate::mapper::PhysicalColumn;
use crate::schema::ScalarKind;
use crate::value::ScalarValue;
use crate::{NestcolError, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use bytes::Bytes;
use ordered_float::OrderedFloat;
use std::io::{Cursor, Read};
use std::sync::Arc;

/// Buffer position to restore when a row is only partly pushed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferMark {
    levels: usize,
    values: usize,
    rows: usize,
}

/// In-memory accumulator for one column between flushes
#[derive(Debug, Clone)]
pub struct ColumnBuffer {
    column: PhysicalColumn,
    rep_levels: Vec<u16>,
    def_levels: Vec<u16>,
    values: Vec<u8>,
    rows: usize,
}

impl ColumnBuffer {
    pub fn new(column: PhysicalColumn) -> Self {
        Self {
            column,
            rep_levels: Vec::new(),
            def_levels: Vec::new(),
            values: Vec::new(),
            rows: 0,
        }
    }

    pub fn column(&self) -> &PhysicalColumn {
        &self.column
    }

    /// Append one record's triples for this column
    pub fn push_row(&mut self, levels: &[LevelValue]) -> Result<()> {
        for level in levels {
            self.rep_levels.push(level.repetition_level);
            self.def_levels.push(level.definition_level);
            if let Some(value) = &level.value {
                write_value(&mut self.values, value)?;
            }
        }
        self.rows += 1;
        Ok(())
    }

    pub fn mark(&self) -> BufferMark {
        BufferMark {
            levels: self.def_levels.len(),
            values: self.values.len(),
            rows: self.rows,
        }
    }

    /// Discard everything pushed since `mark`
    pub fn rollback(&mut self, mark: BufferMark) {
        self.rep_levels.truncate(mark.levels);
        self.def_levels.truncate(mark.levels);
        self.values.truncate(mark.values);
        self.rows = mark.rows;
    }

    pub fn num_triples(&self) -> usize {
        self.def_levels.len()
    }

    pub fn num_rows(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Approximate bytes held by the buffer
    pub fn memory_size(&self) -> usize {
        self.def_levels.len() * 4 + self.values.len()
    }

    /// Serialize the buffered triples into a chunk body and reset the buffer
    pub fn take_body(&mut self) -> Result<Vec<u8>> {
        let count = u32::try_from(self.def_levels.len()).map_err(|_| {
            NestcolError::unsupported(format!(
                "column {} buffered more than u32::MAX levels",
                self.column.path
            ))
        })?;

        let mut body = Vec::with_capacity(4 + self.memory_size());
        body.write_u32::<LittleEndian>(count)?;
        if self.column.max_repetition_depth > 0 {
            for level in &self.rep_levels {
                body.write_u16::<LittleEndian>(*level)?;
            }
        }
        if self.column.max_definition_depth > 0 {
            for level in &self.def_levels {
                body.write_u16::<LittleEndian>(*level)?;
            }
        }
        body.extend_from_slice(&self.values);

        self.rep_levels.clear();
        self.def_levels.clear();
        self.values.clear();
        self.rows = 0;
        Ok(body)
    }
}

fn write_value(buf: &mut Vec<u8>, value: &ScalarValue) -> Result<()> {
    match value {
        ScalarValue::Int64(v) => buf.write_i64::<LittleEndian>(*v)?,
        ScalarValue::Double(v) => buf.write_f64::<LittleEndian>(v.into_inner())?,
        ScalarValue::Bool(v) => buf.write_u8(u8::from(*v))?,
        ScalarValue::String(s) => write_prefixed(buf, s.as_bytes())?,
        ScalarValue::Bytes(b) => write_prefixed(buf, b)?,
        ScalarValue::Timestamp(ts) => buf.write_i128::<LittleEndian>(ts.as_nanosecond())?,
    }
    Ok(())
}

fn write_prefixed(buf: &mut Vec<u8>, data: &[u8]) -> Result<()> {
    let len = u32::try_from(data.len())
        .map_err(|_| NestcolError::unsupported("value longer than u32::MAX bytes"))?;
    buf.write_u32::<LittleEndian>(len)?;
    buf.extend_from_slice(data);
    Ok(())
}

/// Decode a chunk body back into triples
pub fn decode_body(body: &[u8], column: &PhysicalColumn) -> Result<Vec<LevelValue>> {
    let corrupt = |what: &str| {
        NestcolError::corrupt_chunk(format!("column {}: {}", column.path, what))
    };

    let mut cursor = Cursor::new(body);
    let count = cursor
        .read_u32::<LittleEndian>()
        .map_err(|_| corrupt("missing level count"))? as usize;

    // Every triple occupies at least one byte (a level or a value)
    let min_width = 2
        * (usize::from(column.max_repetition_depth > 0)
            + usize::from(column.max_definition_depth > 0));
    if count.saturating_mul(min_width.max(1)) > body.len() {
        return Err(corrupt("level count exceeds chunk size"));
    }

    let rep_levels = read_levels(&mut cursor, count, column.max_repetition_depth)
        .map_err(|_| corrupt("truncated repetition levels"))?;
    let def_levels = read_levels(&mut cursor, count, column.max_definition_depth)
        .map_err(|_| corrupt("truncated definition levels"))?;

    let mut levels = Vec::with_capacity(count);
    for (rep, def) in rep_levels.into_iter().zip(def_levels) {
        if rep > column.max_repetition_depth || def > column.max_definition_depth {
            return Err(corrupt("level exceeds column maximum"));
        }
        let value = if def == column.max_definition_depth {
            Some(read_value(&mut cursor, column.scalar_kind).map_err(|e| match e {
                NestcolError::CorruptChunk(msg) => corrupt(&msg),
                _ => corrupt("truncated values"),
            })?)
        } else {
            None
        };
        levels.push(LevelValue::new(value, rep, def));
    }

    if cursor.position() as usize != body.len() {
        return Err(corrupt("trailing bytes after values"));
    }
    Ok(levels)
}

fn read_levels(cursor: &mut Cursor<&[u8]>, count: usize, max_depth: u16) -> std::io::Result<Vec<u16>> {
    if max_depth == 0 {
        return Ok(vec![0; count]);
    }
    (0..count)
        .map(|_| cursor.read_u16::<LittleEndian>())
        .collect()
}

fn read_value(cursor: &mut Cursor<&[u8]>, kind: ScalarKind) -> Result<ScalarValue> {
    Ok(match kind {
        ScalarKind::Int64 => ScalarValue::Int64(cursor.read_i64::<LittleEndian>()?),
        ScalarKind::Double => {
            ScalarValue::Double(OrderedFloat(cursor.read_f64::<LittleEndian>()?))
        }
        ScalarKind::Bool => match cursor.read_u8()? {
            0 => ScalarValue::Bool(false),
            1 => ScalarValue::Bool(true),
            other => {
                return Err(NestcolError::corrupt_chunk(format!(
                    "invalid bool byte {}",
                    other
                )))
            }
        },
        ScalarKind::Utf8String => {
            let raw = read_prefixed(cursor)?;
            let s = std::str::from_utf8(&raw)
                .map_err(|e| NestcolError::corrupt_chunk(format!("invalid UTF-8: {}", e)))?;
            ScalarValue::String(Arc::from(s))
        }
        ScalarKind::Bytes => ScalarValue::Bytes(Bytes::from(read_prefixed(cursor)?)),
        ScalarKind::Timestamp => {
            let nanos = cursor.read_i128::<LittleEndian>()?;
            let ts = jiff::Timestamp::from_nanosecond(nanos)
                .map_err(|e| NestcolError::corrupt_chunk(format!("invalid timestamp: {}", e)))?;
            ScalarValue::Timestamp(ts)
        }
    })
}

fn read_prefixed(cursor: &mut Cursor<&[u8]>) -> Result<Vec<u8>> {
    let len = cursor.read_u32::<LittleEndian>()? as usize;
    let remaining = cursor.get_ref().len() - cursor.position() as usize;
    if len > remaining {
        return Err(NestcolError::corrupt_chunk("length prefix past end of chunk"));
    }
    let mut data = vec![0; len];
    cursor.read_exact(&mut data)?;
    Ok(data)
}
