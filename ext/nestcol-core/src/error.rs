use thiserror::Error;

/// Core error type for columnar record operations
#[derive(Error, Debug)]
pub enum NestcolError {
    /// A field name appears twice within one record level
    #[error("Duplicate field name: {0}")]
    DuplicateFieldName(String),

    /// A record type was built without any fields
    #[error("Empty schema: {0}")]
    EmptySchema(String),

    /// A type or scalar kind the mapper cannot lay out as a physical column
    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    /// A value's runtime tag disagrees with its schema
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    /// A value violates its field's Required/Optional/Repeated cardinality
    #[error("Cardinality violation: {0}")]
    CardinalityViolation(String),

    /// Trailer or footer bytes are structurally invalid
    #[error("Corrupt footer: {0}")]
    CorruptFooter(String),

    /// A column chunk disagrees with its footer entry
    #[error("Corrupt chunk: {0}")]
    CorruptChunk(String),

    /// Level triples for a record are structurally inconsistent
    #[error("Malformed row: {0}")]
    MalformedRow(String),

    /// The caller's record type does not match the file's recorded schema
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// The writer was closed or poisoned by an earlier failure
    #[error("Write after close")]
    WriteAfterClose,

    /// The reader was closed or poisoned by an earlier failure
    #[error("Reader closed")]
    ReaderClosed,

    /// IO errors from the underlying byte stream
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Broad category of a [`NestcolError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Fatal at build time, never retried
    Schema,
    /// Fatal for the offending record only
    Value,
    /// Fatal for the whole file
    Format,
    /// Propagated from the byte stream
    Io,
    /// Use of a closed or poisoned writer/reader
    State,
}

/// Result type alias for columnar record operations
pub type Result<T> = std::result::Result<T, NestcolError>;

impl NestcolError {
    pub fn duplicate_field<S: Into<String>>(name: S) -> Self {
        NestcolError::DuplicateFieldName(name.into())
    }

    pub fn empty_schema<S: Into<String>>(msg: S) -> Self {
        NestcolError::EmptySchema(msg.into())
    }

    pub fn unsupported<S: Into<String>>(msg: S) -> Self {
        NestcolError::UnsupportedType(msg.into())
    }

    pub fn type_mismatch<S: Into<String>>(msg: S) -> Self {
        NestcolError::TypeMismatch(msg.into())
    }

    pub fn cardinality<S: Into<String>>(msg: S) -> Self {
        NestcolError::CardinalityViolation(msg.into())
    }

    pub fn corrupt_footer<S: Into<String>>(msg: S) -> Self {
        NestcolError::CorruptFooter(msg.into())
    }

    pub fn corrupt_chunk<S: Into<String>>(msg: S) -> Self {
        NestcolError::CorruptChunk(msg.into())
    }

    pub fn malformed_row<S: Into<String>>(msg: S) -> Self {
        NestcolError::MalformedRow(msg.into())
    }

    pub fn schema_mismatch<S: Into<String>>(msg: S) -> Self {
        NestcolError::SchemaMismatch(msg.into())
    }

    /// Which part of the error taxonomy this error belongs to
    pub fn kind(&self) -> ErrorKind {
        match self {
            NestcolError::DuplicateFieldName(_)
            | NestcolError::EmptySchema(_)
            | NestcolError::UnsupportedType(_) => ErrorKind::Schema,
            NestcolError::TypeMismatch(_) | NestcolError::CardinalityViolation(_) => {
                ErrorKind::Value
            }
            NestcolError::CorruptFooter(_)
            | NestcolError::CorruptChunk(_)
            | NestcolError::MalformedRow(_)
            | NestcolError::SchemaMismatch(_) => ErrorKind::Format,
            NestcolError::Io(_) => ErrorKind::Io,
            NestcolError::WriteAfterClose | NestcolError::ReaderClosed => ErrorKind::State,
        }
    }
}
