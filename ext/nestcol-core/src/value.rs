use crate::schema::ScalarKind;
use bytes::Bytes;
use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use std::sync::Arc;

/// A leaf value stored in a physical column
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScalarValue {
    Int64(i64),
    Double(OrderedFloat<f64>),
    Bool(bool),
    String(Arc<str>),
    Bytes(Bytes),
    Timestamp(jiff::Timestamp),
}

/// Runtime value tree mirroring a [`crate::LogicalType`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Null,
    Scalar(ScalarValue),
    Record(RecordValue),
    List(Vec<Value>),
}

/// Field name to value mapping for one record occurrence
///
/// Field order follows insertion; equality ignores order. A key that is not
/// present reads as [`Value::Null`], so it compares equal to an explicit null.
#[derive(Debug, Clone, Default)]
pub struct RecordValue {
    fields: IndexMap<Arc<str>, Value>,
}

static NULL: Value = Value::Null;

impl ScalarValue {
    /// The scalar kind this value belongs to
    pub fn kind(&self) -> ScalarKind {
        match self {
            ScalarValue::Int64(_) => ScalarKind::Int64,
            ScalarValue::Double(_) => ScalarKind::Double,
            ScalarValue::Bool(_) => ScalarKind::Bool,
            ScalarValue::String(_) => ScalarKind::Utf8String,
            ScalarValue::Bytes(_) => ScalarKind::Bytes,
            ScalarValue::Timestamp(_) => ScalarKind::Timestamp,
        }
    }

    /// Encoded size in bytes inside a column chunk
    pub fn encoded_size(&self) -> usize {
        match self {
            ScalarValue::String(s) => 4 + s.len(),
            ScalarValue::Bytes(b) => 4 + b.len(),
            other => other.kind().fixed_width().unwrap_or(0),
        }
    }
}

impl Value {
    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get the type name of the value
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Scalar(s) => s.kind().type_name(),
            Value::Record(_) => "Record",
            Value::List(_) => "List",
        }
    }

    pub fn string<S: AsRef<str>>(s: S) -> Self {
        Value::Scalar(ScalarValue::String(Arc::from(s.as_ref())))
    }

    pub fn bytes<B: Into<Bytes>>(b: B) -> Self {
        Value::Scalar(ScalarValue::Bytes(b.into()))
    }

    pub fn as_record(&self) -> Option<&RecordValue> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<ScalarValue> for Value {
    fn from(value: ScalarValue) -> Self {
        Value::Scalar(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Scalar(ScalarValue::Int64(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Scalar(ScalarValue::Double(OrderedFloat(value)))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Scalar(ScalarValue::Bool(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::string(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::string(value)
    }
}

impl From<jiff::Timestamp> for Value {
    fn from(value: jiff::Timestamp) -> Self {
        Value::Scalar(ScalarValue::Timestamp(value))
    }
}

impl From<RecordValue> for Value {
    fn from(value: RecordValue) -> Self {
        Value::Record(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

impl RecordValue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> RecordValueBuilder {
        RecordValueBuilder::new()
    }

    /// Get a field's value; absent keys yield None
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Get a field's value, reading absent keys as null
    pub fn get_or_null(&self, name: &str) -> &Value {
        self.fields.get(name).unwrap_or(&NULL)
    }

    /// Insert or replace a field's value
    pub fn insert<S: Into<Arc<str>>>(&mut self, name: S, value: Value) -> Option<Value> {
        self.fields.insert(name.into(), value)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_ref(), v))
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.fields.get_mut(name)
    }
}

impl PartialEq for RecordValue {
    fn eq(&self, other: &Self) -> bool {
        self.fields.iter().all(|(k, v)| other.get_or_null(k) == v)
            && other
                .fields
                .iter()
                .all(|(k, v)| self.fields.contains_key(k) || v.is_null())
    }
}

impl Eq for RecordValue {}

impl IntoIterator for RecordValue {
    type Item = (Arc<str>, Value);
    type IntoIter = indexmap::map::IntoIter<Arc<str>, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

/// Chained builder for [`RecordValue`]
#[derive(Debug, Default)]
pub struct RecordValueBuilder {
    record: RecordValue,
}

impl RecordValueBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_value<S: Into<Arc<str>>>(mut self, name: S, value: Value) -> Self {
        self.record.insert(name, value);
        self
    }

    pub fn add_null<S: Into<Arc<str>>>(self, name: S) -> Self {
        self.add_value(name, Value::Null)
    }

    pub fn add_int64_value<S: Into<Arc<str>>>(self, name: S, value: i64) -> Self {
        self.add_value(name, Value::from(value))
    }

    pub fn add_double_value<S: Into<Arc<str>>>(self, name: S, value: f64) -> Self {
        self.add_value(name, Value::from(value))
    }

    pub fn add_bool_value<S: Into<Arc<str>>>(self, name: S, value: bool) -> Self {
        self.add_value(name, Value::from(value))
    }

    pub fn add_string_value<S: Into<Arc<str>>>(self, name: S, value: &str) -> Self {
        self.add_value(name, Value::string(value))
    }

    pub fn add_bytes_value<S: Into<Arc<str>>, B: Into<Bytes>>(self, name: S, value: B) -> Self {
        self.add_value(name, Value::bytes(value))
    }

    pub fn add_timestamp_value<S: Into<Arc<str>>>(self, name: S, value: jiff::Timestamp) -> Self {
        self.add_value(name, Value::from(value))
    }

    pub fn add_record_value<S: Into<Arc<str>>>(self, name: S, value: RecordValue) -> Self {
        self.add_value(name, Value::Record(value))
    }

    pub fn add_list_value<S: Into<Arc<str>>>(self, name: S, items: Vec<Value>) -> Self {
        self.add_value(name, Value::List(items))
    }

    pub fn add_string_list_value<S, I, T>(self, name: S, items: I) -> Self
    where
        S: Into<Arc<str>>,
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let items = items.into_iter().map(Value::string).collect();
        self.add_value(name, Value::List(items))
    }

    pub fn build(self) -> RecordValue {
        self.record
    }
}
