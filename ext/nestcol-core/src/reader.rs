//! Columnar file reading

use crate::codec::{LevelValue, RecordCodec, Row};
use crate::compression::Codec;
use crate::encoding::decode_body;
use crate::footer::{FileMetadata, Trailer, TRAILER_SIZE};
use crate::mapper::ColumnSchema;
use crate::{NestcolError, RecordType, RecordValue, Result};
use bytes::Bytes;
use std::collections::VecDeque;
use std::io::{Cursor, Read, Seek, SeekFrom};

const DEFAULT_BATCH_SIZE: usize = 1024;

/// Rows produced by one [`Reader::read_rows`] call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowBatch {
    pub rows: Vec<Row>,
    /// True once every chunk has been consumed and no record is pending
    pub done: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReaderState {
    Open,
    Closed,
    Poisoned,
}

/// Columnar reader over any source implementing Read + Seek
///
/// The caller supplies the record type the file was written with; it must
/// match the schema recorded in the footer. Column chunks are loaded one row
/// group at a time as rows are requested.
pub struct Reader<R> {
    stream: R,
    codec: RecordCodec,
    chunk_codec: Box<dyn Codec>,
    metadata: FileMetadata,
    pending: Vec<VecDeque<LevelValue>>,
    next_group: usize,
    rows_read: u64,
    state: ReaderState,
}

impl Reader<Cursor<Bytes>> {
    /// Open a file held entirely in memory
    pub fn from_bytes(bytes: Bytes, record_type: &RecordType) -> Result<Self> {
        Self::open(Cursor::new(bytes), record_type)
    }
}

impl<R: Read + Seek> Reader<R> {
    /// Read the trailer and footer and check them against `record_type`
    pub fn open(mut stream: R, record_type: &RecordType) -> Result<Self> {
        let stream_len = stream.seek(SeekFrom::End(0))?;
        if stream_len < TRAILER_SIZE as u64 {
            return Err(NestcolError::corrupt_footer(format!(
                "stream of {} bytes is shorter than the trailer",
                stream_len
            )));
        }

        stream.seek(SeekFrom::Start(stream_len - TRAILER_SIZE as u64))?;
        let mut raw = [0u8; TRAILER_SIZE];
        stream.read_exact(&mut raw)?;
        let trailer = Trailer::from_bytes(&raw)?;
        trailer.check_bounds(stream_len)?;

        stream.seek(SeekFrom::Start(trailer.footer_offset))?;
        let mut footer = vec![0u8; trailer.footer_length as usize];
        stream.read_exact(&mut footer)?;
        let metadata = FileMetadata::from_bytes(&footer)?;
        metadata.validate_layout(trailer.footer_offset)?;

        let codec = RecordCodec::new(record_type)?;
        check_schema(&metadata, record_type, codec.column_schema())?;

        log::debug!(
            "opened file: {} rows in {} row groups, {} columns, {:?} compression",
            metadata.row_count,
            metadata.num_row_groups(),
            metadata.columns.len(),
            metadata.compression
        );

        Ok(Self {
            stream,
            chunk_codec: metadata.compression.codec(),
            pending: vec![VecDeque::new(); metadata.columns.len()],
            codec,
            metadata,
            next_group: 0,
            rows_read: 0,
            state: ReaderState::Open,
        })
    }

    /// Get the parsed footer
    pub fn metadata(&self) -> &FileMetadata {
        &self.metadata
    }

    /// Total rows recorded in the footer
    pub fn row_count(&self) -> u64 {
        self.metadata.row_count
    }

    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    pub fn record_type(&self) -> &RecordType {
        self.codec.record_type()
    }

    pub fn columns(&self) -> &ColumnSchema {
        self.codec.column_schema()
    }

    /// Release buffered chunks; later reads fail with [`NestcolError::ReaderClosed`]
    pub fn close(&mut self) {
        self.pending.iter_mut().for_each(VecDeque::clear);
        self.state = ReaderState::Closed;
    }

    /// Return up to `max_count` reassembled rows
    pub fn read_rows(&mut self, max_count: usize) -> Result<RowBatch> {
        self.ensure_open()?;
        let result = self.next_rows(max_count);
        self.poison_on_error(result)
    }

    /// Return up to `max_count` decoded records and whether the file is exhausted
    pub fn read_records(&mut self, max_count: usize) -> Result<(Vec<RecordValue>, bool)> {
        let batch = self.read_rows(max_count)?;
        let records = batch
            .rows
            .iter()
            .map(|row| self.codec.decode(row))
            .collect::<Result<Vec<_>>>();
        let records = self.poison_on_error(records)?;
        Ok((records, batch.done))
    }

    /// Iterate over every remaining record
    pub fn records(self) -> RecordIterator<R> {
        RecordIterator {
            reader: self,
            buffered: VecDeque::new(),
            finished: false,
        }
    }

    fn ensure_open(&self) -> Result<()> {
        match self.state {
            ReaderState::Open => Ok(()),
            ReaderState::Closed | ReaderState::Poisoned => Err(NestcolError::ReaderClosed),
        }
    }

    fn poison_on_error<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            log::warn!("reader poisoned: {}", e);
            self.state = ReaderState::Poisoned;
        }
        result
    }

    fn is_exhausted(&self) -> bool {
        self.next_group >= self.metadata.num_row_groups()
            && self.pending.iter().all(VecDeque::is_empty)
    }

    fn next_rows(&mut self, max_count: usize) -> Result<RowBatch> {
        let mut rows = Vec::with_capacity(max_count.min(DEFAULT_BATCH_SIZE));
        while rows.len() < max_count {
            if self.pending.iter().all(VecDeque::is_empty) {
                if self.next_group >= self.metadata.num_row_groups() {
                    break;
                }
                self.load_row_group()?;
                continue;
            }
            rows.push(self.take_row()?);
        }
        self.rows_read += rows.len() as u64;

        Ok(RowBatch {
            rows,
            done: self.is_exhausted(),
        })
    }

    /// Pull one record's triples from every column
    fn take_row(&mut self) -> Result<Row> {
        let mut columns = Vec::with_capacity(self.pending.len());
        for (levels, column) in self.pending.iter_mut().zip(self.codec.column_schema().columns()) {
            let first = match levels.pop_front() {
                Some(first) if first.repetition_level == 0 => first,
                Some(_) => {
                    return Err(NestcolError::malformed_row(format!(
                        "column {} continues a record that was never started",
                        column.path
                    )))
                }
                None => {
                    return Err(NestcolError::malformed_row(format!(
                        "column {} ran out of records before its siblings",
                        column.path
                    )))
                }
            };

            let mut record = vec![first];
            while levels.front().is_some_and(|l| l.repetition_level != 0) {
                record.extend(levels.pop_front());
            }
            columns.push(record);
        }
        Ok(Row::new(columns))
    }

    fn load_row_group(&mut self) -> Result<()> {
        let group = self.next_group;
        let schema = self.codec.column_schema();

        for ((meta, column), pending) in self
            .metadata
            .columns
            .iter()
            .zip(schema.columns())
            .zip(self.pending.iter_mut())
        {
            let chunk = meta.chunks.get(group).copied().ok_or_else(|| {
                NestcolError::corrupt_footer(format!("column {} has no chunk {}", column.path, group))
            })?;
            let corrupt = |what: String| {
                NestcolError::corrupt_chunk(format!("chunk {} of column {}: {}", group, column.path, what))
            };

            let mut compressed = vec![0u8; chunk.chunk_length as usize];
            self.stream.seek(SeekFrom::Start(chunk.chunk_offset))?;
            self.stream.read_exact(&mut compressed)?;

            let crc = crc32fast::hash(&compressed);
            if crc != chunk.crc32 {
                return Err(corrupt(format!(
                    "checksum {:08x} does not match recorded {:08x}",
                    crc, chunk.crc32
                )));
            }

            let uncompressed_len = usize::try_from(chunk.uncompressed_length)
                .map_err(|_| corrupt("uncompressed length overflows usize".to_string()))?;
            let body = self.chunk_codec.decompress(&compressed, uncompressed_len)?;
            let levels = decode_body(&body, column)?;

            if levels.len() as u64 != chunk.value_count {
                return Err(corrupt(format!(
                    "holds {} levels, footer declares {}",
                    levels.len(),
                    chunk.value_count
                )));
            }
            let rows = levels.iter().filter(|l| l.repetition_level == 0).count() as u64;
            if rows != chunk.row_count {
                return Err(corrupt(format!(
                    "holds {} records, footer declares {}",
                    rows, chunk.row_count
                )));
            }

            log::trace!(
                "loaded chunk {} of column {}: {} levels, {} bytes",
                group,
                column.path,
                levels.len(),
                chunk.chunk_length
            );
            *pending = levels.into();
        }

        self.next_group += 1;
        Ok(())
    }
}

fn check_schema(metadata: &FileMetadata, record_type: &RecordType, schema: &ColumnSchema) -> Result<()> {
    let invalid = |e: NestcolError| {
        NestcolError::corrupt_footer(format!("recorded schema is invalid: {}", e))
    };
    let recorded = metadata.record_type().map_err(invalid)?;
    if recorded != *record_type {
        return Err(NestcolError::schema_mismatch(format!(
            "file was written with fields [{}], reader expects [{}]",
            field_names(&recorded),
            field_names(record_type)
        )));
    }

    let physical = metadata.physical_columns().map_err(invalid)?;
    if !physical.iter().eq(schema.columns()) {
        return Err(NestcolError::corrupt_footer(
            "recorded columns do not match the recorded schema",
        ));
    }
    Ok(())
}

fn field_names(record_type: &RecordType) -> String {
    record_type
        .fields()
        .iter()
        .map(|f| format!("{}: {}", f.name, f.logical_type.type_name()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Iterator over decoded records
///
/// Yields each record in file order. After the first error the iterator
/// yields that error and then stops.
pub struct RecordIterator<R> {
    reader: Reader<R>,
    buffered: VecDeque<RecordValue>,
    finished: bool,
}

impl<R: Read + Seek> RecordIterator<R> {
    /// Give back the reader, e.g. to inspect its metadata
    pub fn into_reader(self) -> Reader<R> {
        self.reader
    }
}

impl<R: Read + Seek> Iterator for RecordIterator<R> {
    type Item = Result<RecordValue>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(record) = self.buffered.pop_front() {
            return Some(Ok(record));
        }
        if self.finished {
            return None;
        }

        match self.reader.read_records(DEFAULT_BATCH_SIZE) {
            Ok((records, done)) => {
                self.finished = done;
                self.buffered.extend(records);
                self.buffered.pop_front().map(Ok)
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
