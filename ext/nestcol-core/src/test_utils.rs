//! Test utilities for nestcol-core

#[cfg(test)]
pub mod test {
    use crate::{Cardinality, LogicalType, RecordType, RecordValue, ScalarKind, Value};

    /// Create a simple flat schema for testing
    pub fn sample_schema() -> RecordType {
        RecordType::builder()
            .add_scalar_field("id", ScalarKind::Int64, Cardinality::Required)
            .unwrap()
            .add_string_field("name")
            .unwrap()
            .add_scalar_field("salary", ScalarKind::Double, Cardinality::Optional)
            .unwrap()
            .add_scalar_field("active", ScalarKind::Bool, Cardinality::Optional)
            .unwrap()
            .build()
            .unwrap()
    }

    /// Create a schema with a nested record, a list and a list of lists
    pub fn complex_schema() -> RecordType {
        let person = RecordType::builder()
            .add_scalar_field("name", ScalarKind::Utf8String, Cardinality::Required)
            .unwrap()
            .add_int64_field("age")
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
            .add_list_field(
                "matrix",
                LogicalType::List(Box::new(LogicalType::Scalar(ScalarKind::Int64))),
            )
            .unwrap()
            .build()
            .unwrap()
    }

    /// Create multiple sample records matching the simple schema
    pub fn sample_records(count: usize) -> Vec<RecordValue> {
        (0..count)
            .map(|i| {
                let builder = RecordValue::builder()
                    .add_int64_value("id", i as i64)
                    .add_string_value("name", &format!("Person{}", i))
                    .add_double_value("salary", 50000.0 + i as f64 * 1000.0);
                if i % 3 == 0 {
                    builder.add_null("active").build()
                } else {
                    builder.add_bool_value("active", i % 2 == 0).build()
                }
            })
            .collect()
    }

    /// Create a record matching the complex schema
    pub fn complex_record(id: i64) -> RecordValue {
        let person = RecordValue::builder()
            .add_string_value("name", "Bob")
            .add_int64_value("age", 35)
            .add_string_list_value("emails", ["bob@a.com", "bob@b.com"])
            .build();

        RecordValue::builder()
            .add_int64_value("id", id)
            .add_record_value("person", person)
            .add_list_value(
                "matrix",
                vec![
                    Value::List(vec![Value::from(1i64), Value::from(2i64)]),
                    Value::List(vec![]),
                    Value::List(vec![Value::from(3i64)]),
                ],
            )
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::test::*;
    use crate::{Reader, RecordCodec, Result, Writer};
    use bytes::Bytes;

    #[test]
    fn test_sample_records_encode() {
        let codec = RecordCodec::new(&sample_schema()).unwrap();
        for record in sample_records(6) {
            let row = codec.encode(&record).unwrap();
            assert_eq!(row.num_columns(), 4);
            assert_eq!(codec.decode(&row).unwrap(), record);
        }
    }

    #[test]
    fn test_complex_record_through_file() {
        let schema = complex_schema();
        let records = (0..3).map(complex_record).collect::<Vec<_>>();

        let mut writer = Writer::new(Vec::new(), &schema).unwrap();
        writer.write_records(&records).unwrap();
        writer.close().unwrap();

        let reader = Reader::from_bytes(Bytes::from(writer.into_inner()), &schema).unwrap();
        let read = reader.records().collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(read, records);
    }
}
