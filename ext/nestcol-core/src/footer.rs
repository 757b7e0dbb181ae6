//! File footer and fixed-size trailer
//!
//! A file ends with `[footer][trailer]`. The footer is a JSON document
//! describing the schema and the location of every column chunk; the
//! trailer is 16 bytes: `footer_offset: u64 LE`, `footer_length: u32 LE`
//! and the magic `NCOL`.

use crate::compression::Compression;
use crate::mapper::{ColumnPath, PhysicalColumn};
use crate::schema::{Cardinality, Field, LogicalType, RecordType, ScalarKind};
use crate::{NestcolError, Result};
use serde::{Deserialize, Serialize};

pub const MAGIC: [u8; 4] = *b"NCOL";
pub const TRAILER_SIZE: usize = 16;
pub const FORMAT_VERSION: u32 = 1;

/// Location of the footer, always the last bytes of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trailer {
    pub footer_offset: u64,
    pub footer_length: u32,
}

/// Parsed footer metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub version: u32,
    pub compression: Compression,
    pub row_count: u64,
    pub schema: Vec<FieldDescription>,
    pub columns: Vec<ColumnMetadata>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub path: Vec<String>,
    pub scalar_kind: String,
    pub max_repetition_depth: u16,
    pub max_definition_depth: u16,
    pub chunks: Vec<ChunkMetadata>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub chunk_offset: u64,
    pub chunk_length: u64,
    pub uncompressed_length: u64,
    pub row_count: u64,
    pub value_count: u64,
    pub crc32: u32,
}

/// Serialized form of a schema field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescription {
    pub name: String,
    pub cardinality: Cardinality,
    #[serde(rename = "type")]
    pub logical_type: TypeDescription,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeDescription {
    Scalar { scalar_kind: String },
    Record { fields: Vec<FieldDescription> },
    List { element: Box<TypeDescription> },
}

impl Trailer {
    pub fn to_bytes(&self) -> [u8; TRAILER_SIZE] {
        let mut buf = [0u8; TRAILER_SIZE];
        buf[0..8].copy_from_slice(&self.footer_offset.to_le_bytes());
        buf[8..12].copy_from_slice(&self.footer_length.to_le_bytes());
        buf[12..16].copy_from_slice(&MAGIC);
        buf
    }

    pub fn from_bytes(bytes: &[u8; TRAILER_SIZE]) -> Result<Self> {
        if bytes[12..16] != MAGIC {
            return Err(NestcolError::corrupt_footer("invalid trailer magic"));
        }
        let mut offset = [0u8; 8];
        offset.copy_from_slice(&bytes[0..8]);
        let mut length = [0u8; 4];
        length.copy_from_slice(&bytes[8..12]);
        Ok(Self {
            footer_offset: u64::from_le_bytes(offset),
            footer_length: u32::from_le_bytes(length),
        })
    }

    /// Check that the footer sits exactly between the chunks and the trailer
    pub fn check_bounds(&self, stream_len: u64) -> Result<()> {
        let end = self
            .footer_offset
            .checked_add(u64::from(self.footer_length))
            .and_then(|end| end.checked_add(TRAILER_SIZE as u64));
        match end {
            Some(end) if end == stream_len => Ok(()),
            _ => Err(NestcolError::corrupt_footer(format!(
                "footer at {} with length {} does not fit a stream of {} bytes",
                self.footer_offset, self.footer_length, stream_len
            ))),
        }
    }
}

impl FileMetadata {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| NestcolError::Io(std::io::Error::other(e)))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let metadata: FileMetadata = serde_json::from_slice(bytes)
            .map_err(|e| NestcolError::corrupt_footer(format!("unparseable footer: {}", e)))?;
        if metadata.version != FORMAT_VERSION {
            return Err(NestcolError::corrupt_footer(format!(
                "unsupported format version {}",
                metadata.version
            )));
        }
        Ok(metadata)
    }

    /// Rebuild the recorded record type
    pub fn record_type(&self) -> Result<RecordType> {
        let fields = self
            .schema
            .iter()
            .map(field_from_description)
            .collect::<Result<Vec<_>>>()?;
        RecordType::from_fields(fields)
    }

    /// Physical columns as recorded, in file order
    pub fn physical_columns(&self) -> Result<Vec<PhysicalColumn>> {
        self.columns
            .iter()
            .map(|c| {
                Ok(PhysicalColumn {
                    path: ColumnPath::new(c.path.clone()),
                    scalar_kind: ScalarKind::from_name(&c.scalar_kind)?,
                    max_repetition_depth: c.max_repetition_depth,
                    max_definition_depth: c.max_definition_depth,
                })
            })
            .collect()
    }

    pub fn num_row_groups(&self) -> usize {
        self.columns.first().map_or(0, |c| c.chunks.len())
    }

    /// Check chunk placement and row-group alignment against the footer offset
    pub fn validate_layout(&self, footer_offset: u64) -> Result<()> {
        let row_groups = self.num_row_groups();
        let mut total_rows = 0u64;

        for group in 0..row_groups {
            let mut group_rows = None;
            for column in &self.columns {
                let chunk = column.chunks.get(group).ok_or_else(|| {
                    NestcolError::corrupt_footer(format!(
                        "column {} has {} chunks, expected {}",
                        column.path.join("."),
                        column.chunks.len(),
                        row_groups
                    ))
                })?;

                let in_bounds = chunk
                    .chunk_offset
                    .checked_add(chunk.chunk_length)
                    .is_some_and(|end| end <= footer_offset);
                if !in_bounds {
                    return Err(NestcolError::corrupt_footer(format!(
                        "chunk {} of column {} lies outside the data region",
                        group,
                        column.path.join(".")
                    )));
                }

                match group_rows {
                    None => group_rows = Some(chunk.row_count),
                    Some(rows) if rows == chunk.row_count => {}
                    Some(rows) => {
                        return Err(NestcolError::corrupt_footer(format!(
                            "row group {} has columns with {} and {} rows",
                            group, rows, chunk.row_count
                        )))
                    }
                }
            }
            total_rows = total_rows.saturating_add(group_rows.unwrap_or(0));
        }

        if self.columns.iter().any(|c| c.chunks.len() != row_groups) {
            return Err(NestcolError::corrupt_footer("columns disagree on chunk count"));
        }
        if total_rows != self.row_count {
            return Err(NestcolError::corrupt_footer(format!(
                "chunks hold {} rows, footer declares {}",
                total_rows, self.row_count
            )));
        }
        Ok(())
    }
}

impl ColumnMetadata {
    pub fn new(column: &PhysicalColumn) -> Self {
        Self {
            path: column.path.parts().to_vec(),
            scalar_kind: column.scalar_kind.type_name().to_string(),
            max_repetition_depth: column.max_repetition_depth,
            max_definition_depth: column.max_definition_depth,
            chunks: Vec::new(),
        }
    }
}

/// Describe a record type for the footer
pub fn describe_record_type(record_type: &RecordType) -> Vec<FieldDescription> {
    record_type.fields().iter().map(describe_field).collect()
}

fn describe_field(field: &Field) -> FieldDescription {
    FieldDescription {
        name: field.name.clone(),
        cardinality: field.cardinality,
        logical_type: describe_type(&field.logical_type),
    }
}

fn describe_type(ty: &LogicalType) -> TypeDescription {
    match ty {
        LogicalType::Scalar(kind) => TypeDescription::Scalar {
            scalar_kind: kind.type_name().to_string(),
        },
        LogicalType::Record(fields) => TypeDescription::Record {
            fields: fields.iter().map(describe_field).collect(),
        },
        LogicalType::List(element) => TypeDescription::List {
            element: Box::new(describe_type(element)),
        },
    }
}

fn field_from_description(desc: &FieldDescription) -> Result<Field> {
    Ok(Field::new(
        desc.name.clone(),
        type_from_description(&desc.logical_type)?,
        desc.cardinality,
    ))
}

fn type_from_description(desc: &TypeDescription) -> Result<LogicalType> {
    Ok(match desc {
        TypeDescription::Scalar { scalar_kind } => {
            LogicalType::Scalar(ScalarKind::from_name(scalar_kind)?)
        }
        TypeDescription::Record { fields } => LogicalType::Record(
            fields
                .iter()
                .map(field_from_description)
                .collect::<Result<Vec<_>>>()?,
        ),
        TypeDescription::List { element } => {
            LogicalType::List(Box::new(type_from_description(element)?))
        }
    })
}
