//! Columnar file writing

use crate::codec::{RecordCodec, Row};
use crate::compression::{Codec, Compression};
use crate::encoding::ColumnBuffer;
use crate::footer::{
    describe_record_type, ChunkMetadata, ColumnMetadata, FileMetadata, Trailer, FORMAT_VERSION,
};
use crate::mapper::ColumnSchema;
use crate::{NestcolError, RecordType, RecordValue, Result};
use std::io::Write;

// Default configuration constants
const DEFAULT_ROW_GROUP_SIZE: usize = 1000;
const DEFAULT_MEMORY_THRESHOLD: usize = 64 * 1024 * 1024; // 64MB

/// Builder for creating a configured Writer
#[derive(Debug, Clone)]
pub struct WriterBuilder {
    compression: Compression,
    row_group_size: usize,
    memory_threshold: usize,
}

impl Default for WriterBuilder {
    fn default() -> Self {
        Self {
            compression: Compression::default(),
            row_group_size: DEFAULT_ROW_GROUP_SIZE,
            memory_threshold: DEFAULT_MEMORY_THRESHOLD,
        }
    }
}

impl WriterBuilder {
    /// Create a new WriterBuilder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the compression applied to every column chunk
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Flush a row group once this many rows are buffered
    pub fn with_row_group_size(mut self, rows: usize) -> Self {
        self.row_group_size = rows.max(1);
        self
    }

    /// Flush a row group once buffered column data reaches this many bytes
    pub fn with_memory_threshold(mut self, threshold: usize) -> Self {
        self.memory_threshold = threshold;
        self
    }

    /// Build a Writer with the configured settings
    pub fn build<W: Write>(self, writer: W, record_type: &RecordType) -> Result<Writer<W>> {
        let codec = RecordCodec::new(record_type)?;
        let buffers = codec
            .column_schema()
            .columns()
            .map(|c| ColumnBuffer::new(c.clone()))
            .collect::<Vec<_>>();
        let column_meta = codec
            .column_schema()
            .columns()
            .map(ColumnMetadata::new)
            .collect();

        log::debug!(
            "opening writer with {} columns, {:?} compression",
            buffers.len(),
            self.compression
        );

        Ok(Writer {
            sink: writer,
            chunk_codec: self.compression.codec(),
            compression: self.compression,
            codec,
            buffers,
            column_meta,
            row_group_size: self.row_group_size,
            memory_threshold: self.memory_threshold,
            buffered_rows: 0,
            total_rows: 0,
            bytes_written: 0,
            state: WriterState::Accepting,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Accepting,
    Closed,
    /// A flush failed; the output is unusable
    Poisoned,
}

/// What a successfully closed file contains
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSummary {
    pub row_count: u64,
    pub row_groups: usize,
    pub bytes_written: u64,
}

/// Columnar writer over any byte sink
///
/// Rows are buffered per column and written as one compressed chunk per
/// column whenever the row-count or byte threshold is reached.
pub struct Writer<W: Write> {
    sink: W,
    chunk_codec: Box<dyn Codec>,
    compression: Compression,
    codec: RecordCodec,
    buffers: Vec<ColumnBuffer>,
    column_meta: Vec<ColumnMetadata>,
    row_group_size: usize,
    memory_threshold: usize,
    buffered_rows: usize,
    total_rows: u64,
    bytes_written: u64,
    state: WriterState,
}

impl<W: Write> Writer<W> {
    /// Create a new writer with default settings
    pub fn new(writer: W, record_type: &RecordType) -> Result<Self> {
        WriterBuilder::new().build(writer, record_type)
    }

    pub fn record_type(&self) -> &RecordType {
        self.codec.record_type()
    }

    /// Physical columns in file order
    pub fn columns(&self) -> &ColumnSchema {
        self.codec.column_schema()
    }

    /// Rows accepted so far, including rows still buffered
    pub fn rows_written(&self) -> u64 {
        self.total_rows + self.buffered_rows as u64
    }

    pub fn is_closed(&self) -> bool {
        self.state != WriterState::Accepting
    }

    /// Encode and buffer one record
    ///
    /// A record that does not conform to the schema is rejected without
    /// affecting the writer; later records can still be written.
    pub fn write_record(&mut self, value: &RecordValue) -> Result<()> {
        self.ensure_accepting()?;
        let row = self.codec.encode(value)?;
        self.buffer_row(&row)
    }

    /// Encode and buffer a sequence of records, stopping at the first failure
    pub fn write_records<'a, I>(&mut self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a RecordValue>,
    {
        for value in values {
            self.write_record(value)?;
        }
        Ok(())
    }

    /// Buffer one pre-encoded row
    ///
    /// The row must decode to a record: sibling columns have to agree on
    /// every shared list length and presence decision.
    pub fn write_row(&mut self, row: &Row) -> Result<()> {
        self.ensure_accepting()?;
        row.validate(self.codec.column_schema())?;
        self.codec.decode(row)?;
        self.buffer_row(row)
    }

    /// Write out all buffered rows as a row group and flush the sink
    pub fn flush(&mut self) -> Result<()> {
        self.ensure_accepting()?;
        let result = self.flush_row_group().and_then(|_| Ok(self.sink.flush()?));
        self.poison_on_error(result)
    }

    /// Flush remaining rows, then append the footer and trailer
    ///
    /// Any later write fails with [`NestcolError::WriteAfterClose`].
    pub fn close(&mut self) -> Result<FileSummary> {
        self.ensure_accepting()?;
        let result = self.finish();
        let summary = self.poison_on_error(result)?;
        self.state = WriterState::Closed;
        Ok(summary)
    }

    /// Give back the underlying sink
    pub fn into_inner(self) -> W {
        self.sink
    }

    fn ensure_accepting(&self) -> Result<()> {
        match self.state {
            WriterState::Accepting => Ok(()),
            WriterState::Closed | WriterState::Poisoned => Err(NestcolError::WriteAfterClose),
        }
    }

    fn poison_on_error<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            log::warn!("writer poisoned: {}", e);
            self.state = WriterState::Poisoned;
        }
        result
    }

    fn buffer_row(&mut self, row: &Row) -> Result<()> {
        let marks = self.buffers.iter().map(ColumnBuffer::mark).collect::<Vec<_>>();
        let pushed = self
            .buffers
            .iter_mut()
            .zip(row.columns())
            .try_for_each(|(buffer, levels)| buffer.push_row(levels));
        if let Err(e) = pushed {
            // Drop the partial row so every column holds the same records
            for (buffer, mark) in self.buffers.iter_mut().zip(&marks) {
                buffer.rollback(*mark);
            }
            return Err(e);
        }
        self.buffered_rows += 1;

        let buffered_bytes: usize = self.buffers.iter().map(ColumnBuffer::memory_size).sum();
        if self.buffered_rows >= self.row_group_size || buffered_bytes >= self.memory_threshold {
            let result = self.flush_row_group();
            self.poison_on_error(result)?;
        }
        Ok(())
    }

    fn flush_row_group(&mut self) -> Result<()> {
        if self.buffered_rows == 0 {
            return Ok(());
        }

        let rows = self.buffered_rows as u64;
        log::debug!(
            "flushing row group {} with {} rows at offset {}",
            self.column_meta.first().map_or(0, |c| c.chunks.len()),
            rows,
            self.bytes_written
        );

        for (buffer, meta) in self.buffers.iter_mut().zip(self.column_meta.iter_mut()) {
            let value_count = buffer.num_triples() as u64;
            let body = buffer.take_body()?;
            let compressed = self.chunk_codec.compress(&body)?;
            self.sink.write_all(&compressed)?;

            let chunk = ChunkMetadata {
                chunk_offset: self.bytes_written,
                chunk_length: compressed.len() as u64,
                uncompressed_length: body.len() as u64,
                row_count: rows,
                value_count,
                crc32: crc32fast::hash(&compressed),
            };
            log::trace!(
                "column {}: chunk of {} bytes ({} uncompressed)",
                buffer.column().path,
                chunk.chunk_length,
                chunk.uncompressed_length
            );
            self.bytes_written += chunk.chunk_length;
            meta.chunks.push(chunk);
        }

        self.total_rows += rows;
        self.buffered_rows = 0;
        Ok(())
    }

    fn finish(&mut self) -> Result<FileSummary> {
        self.flush_row_group()?;

        let metadata = FileMetadata {
            version: FORMAT_VERSION,
            compression: self.compression,
            row_count: self.total_rows,
            schema: describe_record_type(self.codec.record_type()),
            columns: self.column_meta.clone(),
        };
        let footer = metadata.to_bytes()?;
        let footer_length = u32::try_from(footer.len())
            .map_err(|_| NestcolError::unsupported("footer larger than u32::MAX bytes"))?;
        let trailer = Trailer {
            footer_offset: self.bytes_written,
            footer_length,
        };

        self.sink.write_all(&footer)?;
        self.sink.write_all(&trailer.to_bytes())?;
        self.sink.flush()?;
        self.bytes_written += footer.len() as u64 + trailer.to_bytes().len() as u64;

        log::debug!(
            "closed file: {} rows in {} row groups, {} bytes",
            self.total_rows,
            metadata.num_row_groups(),
            self.bytes_written
        );

        Ok(FileSummary {
            row_count: self.total_rows,
            row_groups: metadata.num_row_groups(),
            bytes_written: self.bytes_written,
        })
    }
}
