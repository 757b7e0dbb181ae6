//! Record codec: nested values to leveled column triples and back
//!
//! Encoding walks each physical column's [`Step`]s through a [`RecordValue`]
//! and emits one [`LevelValue`] per leaf occurrence, per empty list and per
//! absent optional field. The repetition level says at which list depth a
//! value starts a new element (0 means a new record); the definition level
//! says how many optional/repeated ancestors are present.
//!
//! Decoding rebuilds a partial record from each column independently and then
//! merges the partials, so sibling columns must agree on every shared list
//! length and every shared presence decision.

use crate::mapper::{ColumnDescriptor, ColumnSchema, Step};
use crate::schema::{Cardinality, Field, LogicalType, RecordType};
use crate::value::{RecordValue, ScalarValue, Value};
use crate::{NestcolError, Result};

/// One leaf occurrence: value (or null) with its repetition and definition level
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelValue {
    pub value: Option<ScalarValue>,
    pub repetition_level: u16,
    pub definition_level: u16,
}

/// One record flattened to physical columns, in mapper order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    columns: Vec<Vec<LevelValue>>,
}

impl LevelValue {
    pub fn new(value: Option<ScalarValue>, repetition_level: u16, definition_level: u16) -> Self {
        Self {
            value,
            repetition_level,
            definition_level,
        }
    }

    pub fn null(repetition_level: u16, definition_level: u16) -> Self {
        Self::new(None, repetition_level, definition_level)
    }
}

impl Row {
    pub fn new(columns: Vec<Vec<LevelValue>>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[Vec<LevelValue>] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> Option<&[LevelValue]> {
        self.columns.get(index).map(Vec::as_slice)
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn into_columns(self) -> Vec<Vec<LevelValue>> {
        self.columns
    }

    /// Check that every column's triples are well formed for the given schema
    ///
    /// Each column must hold at least one triple, start a new record exactly
    /// once, stay within the column's maximum depths and carry a value of the
    /// column's kind exactly when fully defined.
    pub fn validate(&self, schema: &ColumnSchema) -> Result<()> {
        if self.columns.len() != schema.len() {
            return Err(NestcolError::malformed_row(format!(
                "row has {} columns but schema has {}",
                self.columns.len(),
                schema.len()
            )));
        }

        for (levels, descriptor) in self.columns.iter().zip(schema.descriptors()) {
            let column = descriptor.column();
            let path = &column.path;
            let Some(first) = levels.first() else {
                return Err(NestcolError::malformed_row(format!("column {} has no levels", path)));
            };
            if first.repetition_level != 0 {
                return Err(NestcolError::malformed_row(format!(
                    "column {} does not start a new record",
                    path
                )));
            }

            for (idx, level) in levels.iter().enumerate() {
                if idx > 0
                    && (level.repetition_level == 0
                        || level.repetition_level > column.max_repetition_depth)
                {
                    return Err(NestcolError::malformed_row(format!(
                        "column {} has repetition level {} at position {}",
                        path, level.repetition_level, idx
                    )));
                }
                if level.definition_level > column.max_definition_depth {
                    return Err(NestcolError::malformed_row(format!(
                        "column {} has definition level {} above maximum {}",
                        path, level.definition_level, column.max_definition_depth
                    )));
                }
                match &level.value {
                    Some(value) if level.definition_level != column.max_definition_depth => {
                        return Err(NestcolError::malformed_row(format!(
                            "column {} has a {} value at partial definition level {}",
                            path,
                            value.kind().type_name(),
                            level.definition_level
                        )))
                    }
                    Some(value) if value.kind() != column.scalar_kind => {
                        return Err(NestcolError::type_mismatch(format!(
                            "column {} expects {}, got {}",
                            path,
                            column.scalar_kind.type_name(),
                            value.kind().type_name()
                        )))
                    }
                    None if level.definition_level == column.max_definition_depth => {
                        return Err(NestcolError::malformed_row(format!(
                            "column {} is missing a value at full definition level",
                            path
                        )))
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }
}

/// Encoder/decoder bound to one record type
#[derive(Debug, Clone)]
pub struct RecordCodec {
    record_type: RecordType,
    schema: ColumnSchema,
}

impl RecordCodec {
    pub fn new(record_type: &RecordType) -> Result<Self> {
        Ok(Self {
            schema: ColumnSchema::new(record_type)?,
            record_type: record_type.clone(),
        })
    }

    pub fn record_type(&self) -> &RecordType {
        &self.record_type
    }

    pub fn column_schema(&self) -> &ColumnSchema {
        &self.schema
    }

    /// Flatten one record value into leveled triples per physical column
    pub fn encode(&self, value: &RecordValue) -> Result<Row> {
        validate_record(self.record_type.fields(), value, "")?;

        let mut columns = Vec::with_capacity(self.schema.len());
        for descriptor in self.schema.descriptors() {
            let mut out = Vec::new();
            match descriptor.steps().split_first() {
                Some((Step::Field { name, cardinality }, rest)) => {
                    shred_field(name, *cardinality, rest, value, 0, 0, 0, &mut out)?
                }
                _ => {
                    return Err(NestcolError::unsupported(format!(
                        "column {} does not start at a root field",
                        descriptor.path()
                    )))
                }
            }
            columns.push(out);
        }
        Ok(Row { columns })
    }

    /// Rebuild a record value from one row's triples
    pub fn decode(&self, row: &Row) -> Result<RecordValue> {
        if row.columns.len() != self.schema.len() {
            return Err(NestcolError::malformed_row(format!(
                "row has {} columns but schema has {}",
                row.columns.len(),
                self.schema.len()
            )));
        }

        let mut merged = Value::Record(RecordValue::new());
        for (levels, descriptor) in row.columns.iter().zip(self.schema.descriptors()) {
            let partial = assemble_column(descriptor, levels)?;
            merge(&mut merged, partial, &descriptor.path().to_string())?;
        }

        match merged {
            Value::Record(record) => Ok(record),
            other => Err(NestcolError::malformed_row(format!(
                "row assembled into {} instead of a record",
                other.type_name()
            ))),
        }
    }
}

/// Encode a record value against a record type
pub fn encode_record(record_type: &RecordType, value: &RecordValue) -> Result<Row> {
    RecordCodec::new(record_type)?.encode(value)
}

/// Decode a row back into a record value
pub fn decode_record(record_type: &RecordType, row: &Row) -> Result<RecordValue> {
    RecordCodec::new(record_type)?.decode(row)
}

fn child_path(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", path, name)
    }
}

fn validate_record(fields: &[Field], record: &RecordValue, path: &str) -> Result<()> {
    for (name, _) in record.iter() {
        if !fields.iter().any(|f| f.name == name) {
            return Err(NestcolError::type_mismatch(format!(
                "unknown field '{}'",
                child_path(path, name)
            )));
        }
    }

    for field in fields {
        let value = record.get_or_null(&field.name);
        validate_field(field, value, &child_path(path, &field.name))?;
    }
    Ok(())
}

fn validate_field(field: &Field, value: &Value, path: &str) -> Result<()> {
    match (field.cardinality, value) {
        (Cardinality::Repeated, Value::List(items)) => {
            let LogicalType::List(element) = &field.logical_type else {
                return Err(NestcolError::unsupported(format!(
                    "repeated field {} is not a list",
                    path
                )));
            };
            validate_elements(element, items, path)
        }
        (Cardinality::Repeated, other) => Err(NestcolError::cardinality(format!(
            "repeated field {} must hold a List, got {}",
            path,
            other.type_name()
        ))),
        (_, Value::List(_)) => Err(NestcolError::cardinality(format!(
            "non-repeated field {} holds a List",
            path
        ))),
        (Cardinality::Required, Value::Null) => Err(NestcolError::cardinality(format!(
            "required field {} is null",
            path
        ))),
        (Cardinality::Optional, Value::Null) => Ok(()),
        (_, value) => validate_type(&field.logical_type, value, path),
    }
}

fn validate_elements(element: &LogicalType, items: &[Value], path: &str) -> Result<()> {
    for (idx, item) in items.iter().enumerate() {
        let item_path = format!("{}[{}]", path, idx);
        match (element, item) {
            (_, Value::Null) => {
                return Err(NestcolError::cardinality(format!(
                    "list element {} is null",
                    item_path
                )))
            }
            (LogicalType::List(inner), Value::List(nested)) => {
                validate_elements(inner, nested, &item_path)?
            }
            (ty, value) => validate_type(ty, value, &item_path)?,
        }
    }
    Ok(())
}

fn validate_type(ty: &LogicalType, value: &Value, path: &str) -> Result<()> {
    match (ty, value) {
        (LogicalType::Scalar(kind), Value::Scalar(scalar)) if scalar.kind() == *kind => Ok(()),
        (LogicalType::Record(fields), Value::Record(record)) => validate_record(fields, record, path),
        (expected, actual) => Err(NestcolError::type_mismatch(format!(
            "expected {} at {}, got {}",
            expected.type_name(),
            path,
            actual.type_name()
        ))),
    }
}

/// Emit the triples of one column below `value`
///
/// `rep` is the repetition level the next emitted triple carries, `def` the
/// number of optional/repeated ancestors present so far and `depth` the
/// number of lists entered so far.
fn shred(
    steps: &[Step],
    value: &Value,
    rep: u16,
    def: u16,
    depth: u16,
    out: &mut Vec<LevelValue>,
) -> Result<()> {
    let Some((step, rest)) = steps.split_first() else {
        return match value {
            Value::Scalar(scalar) => {
                out.push(LevelValue::new(Some(scalar.clone()), rep, def));
                Ok(())
            }
            other => Err(NestcolError::type_mismatch(format!(
                "expected a scalar leaf, got {}",
                other.type_name()
            ))),
        };
    };

    match step {
        Step::Field { name, cardinality } => {
            let Some(record) = value.as_record() else {
                return Err(NestcolError::type_mismatch(format!(
                    "expected a Record holding '{}', got {}",
                    name,
                    value.type_name()
                )));
            };
            shred_field(name, *cardinality, rest, record, rep, def, depth, out)
        }
        Step::Element => shred_list(rest, value, rep, def, depth, out),
    }
}

#[allow(clippy::too_many_arguments)]
fn shred_field(
    name: &str,
    cardinality: Cardinality,
    rest: &[Step],
    record: &RecordValue,
    rep: u16,
    def: u16,
    depth: u16,
    out: &mut Vec<LevelValue>,
) -> Result<()> {
    let child = record.get_or_null(name);
    match cardinality {
        Cardinality::Required if child.is_null() => Err(NestcolError::cardinality(format!(
            "required field '{}' is null",
            name
        ))),
        Cardinality::Required => shred(rest, child, rep, def, depth, out),
        Cardinality::Optional if child.is_null() => {
            out.push(LevelValue::null(rep, def));
            Ok(())
        }
        Cardinality::Optional => shred(rest, child, rep, def + 1, depth, out),
        Cardinality::Repeated => shred_list(rest, child, rep, def, depth, out),
    }
}

fn shred_list(
    rest: &[Step],
    value: &Value,
    rep: u16,
    def: u16,
    depth: u16,
    out: &mut Vec<LevelValue>,
) -> Result<()> {
    let Some(items) = value.as_list() else {
        return Err(NestcolError::cardinality(format!(
            "repeated value must be a List, got {}",
            value.type_name()
        )));
    };

    let list_depth = depth + 1;
    if items.is_empty() {
        out.push(LevelValue::null(rep, def));
        return Ok(());
    }
    for (idx, item) in items.iter().enumerate() {
        let item_rep = if idx == 0 { rep } else { list_depth };
        shred(rest, item, item_rep, def + 1, list_depth, out)?;
    }
    Ok(())
}

struct LevelCursor<'a> {
    descriptor: &'a ColumnDescriptor,
    levels: &'a [LevelValue],
    pos: usize,
}

impl<'a> LevelCursor<'a> {
    fn peek(&self) -> Option<&'a LevelValue> {
        self.levels.get(self.pos)
    }

    fn expect_peek(&self) -> Result<&'a LevelValue> {
        self.peek().ok_or_else(|| {
            NestcolError::malformed_row(format!(
                "column {} ran out of levels mid-record",
                self.descriptor.path()
            ))
        })
    }

    fn take(&mut self) -> Result<&'a LevelValue> {
        let level = self.expect_peek()?;
        self.pos += 1;
        Ok(level)
    }

    /// Consume a null marker that must sit exactly at definition level `def`
    fn take_null_at(&mut self, def: u16) -> Result<()> {
        let level = self.take()?;
        if level.value.is_some() {
            return Err(self.malformed(format!(
                "non-null value at definition level {} below maximum",
                def
            )));
        }
        Ok(())
    }

    fn malformed(&self, msg: String) -> NestcolError {
        NestcolError::malformed_row(format!("column {}: {}", self.descriptor.path(), msg))
    }
}

fn assemble_column(descriptor: &ColumnDescriptor, levels: &[LevelValue]) -> Result<Value> {
    let mut cursor = LevelCursor {
        descriptor,
        levels,
        pos: 0,
    };

    match cursor.peek() {
        None => return Err(cursor.malformed("no levels for record".to_string())),
        Some(first) if first.repetition_level != 0 => {
            return Err(cursor.malformed(format!(
                "first repetition level is {} instead of 0",
                first.repetition_level
            )))
        }
        Some(_) => {}
    }

    let value = assemble(descriptor.steps(), &mut cursor, 0, 0)?;
    if cursor.pos != levels.len() {
        return Err(cursor.malformed(format!(
            "{} trailing levels without a record boundary",
            levels.len() - cursor.pos
        )));
    }
    Ok(value)
}

fn assemble(steps: &[Step], cursor: &mut LevelCursor<'_>, def: u16, depth: u16) -> Result<Value> {
    let Some((step, rest)) = steps.split_first() else {
        let level = cursor.take()?;
        if level.definition_level != def {
            return Err(cursor.malformed(format!(
                "leaf at definition level {} instead of {}",
                level.definition_level, def
            )));
        }
        return match &level.value {
            Some(scalar) if scalar.kind() == cursor.descriptor.column().scalar_kind => {
                Ok(Value::Scalar(scalar.clone()))
            }
            Some(scalar) => Err(NestcolError::type_mismatch(format!(
                "column {} expects {}, got {}",
                cursor.descriptor.path(),
                cursor.descriptor.column().scalar_kind.type_name(),
                scalar.kind().type_name()
            ))),
            None => Err(cursor.malformed("null at full definition level".to_string())),
        };
    };

    match step {
        Step::Field { name, cardinality } => {
            let child = match cardinality {
                Cardinality::Required => assemble(rest, cursor, def, depth)?,
                Cardinality::Optional => {
                    let level = cursor.expect_peek()?;
                    if level.definition_level < def {
                        return Err(cursor.malformed(format!(
                            "definition level {} skips an ancestor of '{}'",
                            level.definition_level, name
                        )));
                    }
                    if level.definition_level == def {
                        cursor.take_null_at(def)?;
                        Value::Null
                    } else {
                        assemble(rest, cursor, def + 1, depth)?
                    }
                }
                Cardinality::Repeated => assemble_list(rest, cursor, def, depth)?,
            };
            let mut record = RecordValue::new();
            record.insert(name.as_str(), child);
            Ok(Value::Record(record))
        }
        Step::Element => assemble_list(rest, cursor, def, depth),
    }
}

fn assemble_list(rest: &[Step], cursor: &mut LevelCursor<'_>, def: u16, depth: u16) -> Result<Value> {
    let list_depth = depth + 1;
    let level = cursor.expect_peek()?;
    if level.definition_level < def {
        return Err(cursor.malformed(format!(
            "definition level {} skips an enclosing list",
            level.definition_level
        )));
    }
    if level.definition_level == def {
        cursor.take_null_at(def)?;
        return Ok(Value::List(Vec::new()));
    }

    let mut items = Vec::new();
    loop {
        items.push(assemble(rest, cursor, def + 1, list_depth)?);
        match cursor.peek() {
            Some(next) if next.repetition_level == list_depth => continue,
            Some(next) if next.repetition_level > list_depth => {
                return Err(cursor.malformed(format!(
                    "repetition level {} deeper than list depth {}",
                    next.repetition_level, list_depth
                )))
            }
            _ => break,
        }
    }
    Ok(Value::List(items))
}

fn merge(target: &mut Value, incoming: Value, path: &str) -> Result<()> {
    match (target, incoming) {
        (Value::Record(existing), Value::Record(other)) => {
            for (name, value) in other {
                match existing.get_mut(&name) {
                    Some(slot) => merge(slot, value, path)?,
                    None => {
                        existing.insert(name, value);
                    }
                }
            }
            Ok(())
        }
        (Value::List(existing), Value::List(other)) => {
            if existing.len() != other.len() {
                return Err(NestcolError::malformed_row(format!(
                    "column {} disagrees with a sibling column on list length ({} vs {})",
                    path,
                    other.len(),
                    existing.len()
                )));
            }
            for (slot, value) in existing.iter_mut().zip(other) {
                merge(slot, value, path)?;
            }
            Ok(())
        }
        (Value::Null, Value::Null) => Ok(()),
        (existing, other) => Err(NestcolError::malformed_row(format!(
            "column {} disagrees with a sibling column: {} vs {}",
            path,
            other.type_name(),
            existing.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ScalarKind;

    fn person_schema() -> RecordType {
        let person = RecordType::builder()
            .add_scalar_field("name", ScalarKind::Utf8String, Cardinality::Required)
            .unwrap()
            .add_list_field("emails", LogicalType::Scalar(ScalarKind::Utf8String))
            .unwrap()
            .build()
            .unwrap();
        RecordType::builder()
            .add_scalar_field("id", ScalarKind::Int64, Cardinality::Required)
            .unwrap()
            .add_record_field("person", person, Cardinality::Optional)
            .unwrap()
            .build()
            .unwrap()
    }

    fn string(s: &str) -> Option<ScalarValue> {
        Some(ScalarValue::String(s.into()))
    }

    #[test]
    fn test_encode_populated_list() {
        let value = RecordValue::builder()
            .add_int64_value("id", 1)
            .add_record_value(
                "person",
                RecordValue::builder()
                    .add_string_value("name", "a")
                    .add_string_list_value("emails", ["x@a", "y@b"])
                    .build(),
            )
            .build();

        let row = encode_record(&person_schema(), &value).unwrap();

        assert_eq!(
            row.columns(),
            &[
                vec![LevelValue::new(Some(ScalarValue::Int64(1)), 0, 0)],
                vec![LevelValue::new(string("a"), 0, 1)],
                vec![
                    LevelValue::new(string("x@a"), 0, 2),
                    LevelValue::new(string("y@b"), 1, 2)
                ],
            ]
        );
        assert_eq!(decode_record(&person_schema(), &row).unwrap(), value);
    }

    #[test]
    fn test_encode_absent_optional_record() {
        let value = RecordValue::builder()
            .add_int64_value("id", 2)
            .add_null("person")
            .build();

        let row = encode_record(&person_schema(), &value).unwrap();

        assert_eq!(row.column(1).unwrap(), &[LevelValue::null(0, 0)]);
        assert_eq!(row.column(2).unwrap(), &[LevelValue::null(0, 0)]);
        assert_eq!(decode_record(&person_schema(), &row).unwrap(), value);
    }

    #[test]
    fn test_empty_list_is_not_null() {
        let value = RecordValue::builder()
            .add_int64_value("id", 3)
            .add_record_value(
                "person",
                RecordValue::builder()
                    .add_string_value("name", "b")
                    .add_list_value("emails", vec![])
                    .build(),
            )
            .build();

        let row = encode_record(&person_schema(), &value).unwrap();
        assert_eq!(row.column(2).unwrap(), &[LevelValue::null(0, 1)]);

        let decoded = decode_record(&person_schema(), &row).unwrap();
        let emails = decoded
            .get("person")
            .and_then(Value::as_record)
            .and_then(|p| p.get("emails"))
            .cloned();
        assert_eq!(emails, Some(Value::List(vec![])));
    }

    #[test]
    fn test_nested_list_levels() {
        let schema = RecordType::builder()
            .add_list_field(
                "matrix",
                LogicalType::List(Box::new(LogicalType::Scalar(ScalarKind::Int64))),
            )
            .unwrap()
            .build()
            .unwrap();
        let value = RecordValue::builder()
            .add_list_value(
                "matrix",
                vec![
                    Value::List(vec![Value::from(1i64), Value::from(2i64)]),
                    Value::List(vec![]),
                    Value::List(vec![Value::from(3i64)]),
                ],
            )
            .build();

        let row = encode_record(&schema, &value).unwrap();
        let levels: Vec<(u16, u16)> = row.columns()[0]
            .iter()
            .map(|l| (l.repetition_level, l.definition_level))
            .collect();
        assert_eq!(levels, vec![(0, 2), (2, 2), (1, 1), (1, 2)]);

        assert_eq!(decode_record(&schema, &row).unwrap(), value);
    }

    #[test]
    fn test_list_for_required_scalar() {
        let value = RecordValue::builder()
            .add_list_value("id", vec![Value::from(1i64)])
            .add_null("person")
            .build();

        let result = encode_record(&person_schema(), &value);
        assert!(matches!(result, Err(NestcolError::CardinalityViolation(_))));
    }

    #[test]
    fn test_type_mismatch() {
        let value = RecordValue::builder()
            .add_string_value("id", "one")
            .build();

        let result = encode_record(&person_schema(), &value);
        assert!(matches!(result, Err(NestcolError::TypeMismatch(_))));
    }

    #[test]
    fn test_decode_rejects_sibling_disagreement() {
        // name says person is present, emails says it is absent
        let row = Row::new(vec![
            vec![LevelValue::new(Some(ScalarValue::Int64(1)), 0, 0)],
            vec![LevelValue::new(string("a"), 0, 1)],
            vec![LevelValue::null(0, 0)],
        ]);

        let result = decode_record(&person_schema(), &row);
        assert!(matches!(result, Err(NestcolError::MalformedRow(_))));
    }

    #[test]
    fn test_decode_rejects_trailing_levels() {
        let row = Row::new(vec![
            vec![
                LevelValue::new(Some(ScalarValue::Int64(1)), 0, 0),
                LevelValue::new(Some(ScalarValue::Int64(2)), 0, 0),
            ],
            vec![LevelValue::null(0, 0)],
            vec![LevelValue::null(0, 0)],
        ]);

        let result = decode_record(&person_schema(), &row);
        assert!(matches!(result, Err(NestcolError::MalformedRow(_))));
    }

    #[test]
    fn test_row_validate() {
        let schema = ColumnSchema::new(&person_schema()).unwrap();
        let good = encode_record(
            &person_schema(),
            &RecordValue::builder().add_int64_value("id", 9).build(),
        )
        .unwrap();
        assert!(good.validate(&schema).is_ok());

        let too_deep = Row::new(vec![
            vec![LevelValue::new(Some(ScalarValue::Int64(1)), 0, 0)],
            vec![LevelValue::null(0, 0)],
            vec![LevelValue::null(0, 0), LevelValue::null(2, 0)],
        ]);
        assert!(matches!(
            too_deep.validate(&schema),
            Err(NestcolError::MalformedRow(_))
        ));
    }
}
