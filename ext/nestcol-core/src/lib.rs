//! Nested records stored as independently compressed columns
//!
//! `nestcol-core` flattens nested, optional and repeated records into
//! physical leaf columns, records repetition and definition levels beside
//! every value so the nesting can be rebuilt exactly, and stores the columns
//! in a self-describing file.
//!
//! # Key Components
//!
//! - **Schema**: [`RecordType`] built through [`RecordTypeBuilder`]
//!   - Scalars, nested records and lists with explicit cardinality
//!   - Structural queries through the [`traits::SchemaInspector`] trait
//!
//! - **Mapper**: [`ColumnSchema`] derives one [`PhysicalColumn`] per leaf
//!   with its maximum repetition and definition depth
//!
//! - **Codec**: [`RecordCodec`] turns a [`RecordValue`] into a [`Row`] of
//!   [`LevelValue`] triples and rebuilds the record from them
//!
//! - **Writer**: [`Writer`] buffers rows per column and flushes row groups
//!   of compressed chunks, configured through [`WriterBuilder`]
//!
//! - **Reader**: [`Reader`] parses the footer, loads chunks one row group at
//!   a time and reassembles rows
//!
//! # File layout
//!
//! ```text
//! [chunk]...[chunk][footer JSON][footer_offset u64][footer_length u32]["NCOL"]
//! ```
//!
//! # Example
//!
//! ```
//! use nestcol_core::*;
//!
//! let schema = RecordType::builder()
//!     .add_scalar_field("id", ScalarKind::Int64, Cardinality::Required)?
//!     .add_list_field("emails", LogicalType::Scalar(ScalarKind::Utf8String))?
//!     .build()?;
//!
//! let record = RecordValue::builder()
//!     .add_int64_value("id", 1)
//!     .add_string_list_value("emails", ["a@example.com"])
//!     .build();
//!
//! let mut writer = Writer::new(Vec::new(), &schema)?;
//! writer.write_record(&record)?;
//! writer.close()?;
//!
//! let bytes = bytes::Bytes::from(writer.into_inner());
//! let reader = Reader::from_bytes(bytes, &schema)?;
//! let records = reader.records().collect::<Result<Vec<_>>>()?;
//! assert_eq!(records, vec![record]);
//! # Ok::<(), NestcolError>(())
//! ```

pub mod codec;
pub mod compression;
pub mod encoding;
pub mod error;
pub mod footer;
pub mod mapper;
pub mod reader;
pub mod schema;
pub mod traits;
pub mod value;
pub mod writer;

#[cfg(test)]
pub mod test_utils;

pub use codec::{decode_record, encode_record, LevelValue, RecordCodec, Row};
pub use compression::Compression;
pub use error::{ErrorKind, NestcolError, Result};
pub use footer::FileMetadata;
pub use mapper::{map_record_type, ColumnPath, ColumnSchema, PhysicalColumn};
pub use reader::{Reader, RecordIterator, RowBatch};
pub use schema::{Cardinality, Field, LogicalType, RecordType, RecordTypeBuilder, ScalarKind};
pub use traits::SchemaInspector;
pub use value::{RecordValue, RecordValueBuilder, ScalarValue, Value};
pub use writer::{FileSummary, Writer, WriterBuilder};
