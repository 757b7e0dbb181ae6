use crate::{NestcolError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Scalar kinds a leaf column can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ScalarKind {
    Int64,
    Double,
    Bool,
    Utf8String,
    Bytes,
    /// Nanosecond-precision instant
    Timestamp,
}

/// Represents how often a field may occur within its parent record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cardinality {
    /// Field must have exactly one value
    Required,
    /// Field can have 0 or 1 value
    Optional,
    /// Field can have 0 or more values
    Repeated,
}

/// Logical type tree of a record schema
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LogicalType {
    Scalar(ScalarKind),
    /// Ordered, uniquely named fields
    Record(Vec<Field>),
    /// A repeated element of a single type
    List(Box<LogicalType>),
}

/// A named field inside a record
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    pub name: String,
    pub logical_type: LogicalType,
    pub cardinality: Cardinality,
}

/// Root record type: the schema for one table or stream
///
/// Only constructed through [`RecordTypeBuilder`] (or validated footer
/// decoding), so every instance is structurally sound.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordType {
    fields: Vec<Field>,
}

impl ScalarKind {
    /// Every kind this crate knows how to store
    pub const ALL: [ScalarKind; 6] = [
        ScalarKind::Int64,
        ScalarKind::Double,
        ScalarKind::Bool,
        ScalarKind::Utf8String,
        ScalarKind::Bytes,
        ScalarKind::Timestamp,
    ];

    /// Get the kind name for display and for the file footer
    pub fn type_name(&self) -> &'static str {
        match self {
            ScalarKind::Int64 => "Int64",
            ScalarKind::Double => "Double",
            ScalarKind::Bool => "Bool",
            ScalarKind::Utf8String => "Utf8String",
            ScalarKind::Bytes => "Bytes",
            ScalarKind::Timestamp => "Timestamp",
        }
    }

    /// Parse a kind name recorded by [`ScalarKind::type_name`]
    pub fn from_name(name: &str) -> Result<Self> {
        ScalarKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.type_name() == name)
            .ok_or_else(|| NestcolError::unsupported(format!("unknown scalar kind '{}'", name)))
    }

    /// Encoded width in bytes, or None for length-prefixed kinds
    pub fn fixed_width(&self) -> Option<usize> {
        match self {
            ScalarKind::Int64 | ScalarKind::Double => Some(8),
            ScalarKind::Bool => Some(1),
            ScalarKind::Timestamp => Some(16),
            ScalarKind::Utf8String | ScalarKind::Bytes => None,
        }
    }
}

impl LogicalType {
    /// Short name used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            LogicalType::Scalar(kind) => kind.type_name(),
            LogicalType::Record(_) => "Record",
            LogicalType::List(_) => "List",
        }
    }
}

impl Field {
    pub fn new<S: Into<String>>(name: S, logical_type: LogicalType, cardinality: Cardinality) -> Self {
        Self {
            name: name.into(),
            logical_type,
            cardinality,
        }
    }

    /// Check if the field may be absent from a record
    pub fn is_nullable(&self) -> bool {
        self.cardinality == Cardinality::Optional
    }
}

impl RecordType {
    pub fn builder() -> RecordTypeBuilder {
        RecordTypeBuilder::new()
    }

    /// Build a record type from already assembled fields, validating the whole tree
    pub fn from_fields(fields: Vec<Field>) -> Result<Self> {
        validate_fields(&fields, "")?;
        Ok(Self { fields })
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Look up a top-level field by name
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// View this record type as a nested logical type
    pub fn to_logical_type(&self) -> LogicalType {
        LogicalType::Record(self.fields.clone())
    }
}

/// Staged builder for [`RecordType`]
///
/// Each `add_*` call validates immediately so structural errors surface at
/// construction time rather than at first use by the codec.
#[derive(Debug, Default)]
pub struct RecordTypeBuilder {
    fields: Vec<Field>,
}

impl RecordTypeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_scalar_field<S: Into<String>>(
        self,
        name: S,
        kind: ScalarKind,
        cardinality: Cardinality,
    ) -> Result<Self> {
        self.push(Field::new(name, LogicalType::Scalar(kind), cardinality))
    }

    pub fn add_record_field<S: Into<String>>(
        self,
        name: S,
        nested: RecordType,
        cardinality: Cardinality,
    ) -> Result<Self> {
        self.push(Field::new(
            name,
            LogicalType::Record(nested.fields),
            cardinality,
        ))
    }

    pub fn add_list_field<S: Into<String>>(self, name: S, element: LogicalType) -> Result<Self> {
        self.push(Field::new(
            name,
            LogicalType::List(Box::new(element)),
            Cardinality::Repeated,
        ))
    }

    /// Add a nullable Int64 field
    pub fn add_int64_field<S: Into<String>>(self, name: S) -> Result<Self> {
        self.add_scalar_field(name, ScalarKind::Int64, Cardinality::Optional)
    }

    /// Add a nullable string field
    pub fn add_string_field<S: Into<String>>(self, name: S) -> Result<Self> {
        self.add_scalar_field(name, ScalarKind::Utf8String, Cardinality::Optional)
    }

    pub fn build(self) -> Result<RecordType> {
        if self.fields.is_empty() {
            return Err(NestcolError::empty_schema("record type has no fields"));
        }
        Ok(RecordType {
            fields: self.fields,
        })
    }

    fn push(mut self, field: Field) -> Result<Self> {
        if self.fields.iter().any(|f| f.name == field.name) {
            return Err(NestcolError::duplicate_field(field.name));
        }
        validate_field(&field, "")?;
        self.fields.push(field);
        Ok(self)
    }
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

fn validate_fields(fields: &[Field], prefix: &str) -> Result<()> {
    if fields.is_empty() {
        let at = if prefix.is_empty() { "<root>" } else { prefix };
        return Err(NestcolError::empty_schema(format!("record at {} has no fields", at)));
    }

    let mut seen = HashSet::with_capacity(fields.len());
    for field in fields {
        if !seen.insert(field.name.as_str()) {
            return Err(NestcolError::duplicate_field(join_path(prefix, &field.name)));
        }
        validate_field(field, prefix)?;
    }
    Ok(())
}

fn validate_field(field: &Field, prefix: &str) -> Result<()> {
    let path = join_path(prefix, &field.name);
    match (&field.logical_type, field.cardinality) {
        (LogicalType::List(_), Cardinality::Repeated) => {}
        (LogicalType::List(_), other) => {
            return Err(NestcolError::unsupported(format!(
                "list field {} must be Repeated, got {:?}",
                path, other
            )))
        }
        (ty, Cardinality::Repeated) => {
            return Err(NestcolError::unsupported(format!(
                "field {} of type {} cannot be Repeated; use a List",
                path,
                ty.type_name()
            )))
        }
        _ => {}
    }
    validate_type(&field.logical_type, &path)
}

fn validate_type(ty: &LogicalType, path: &str) -> Result<()> {
    match ty {
        LogicalType::Scalar(_) => Ok(()),
        LogicalType::Record(fields) => validate_fields(fields, path),
        LogicalType::List(element) => validate_type(element, path),
    }
}
