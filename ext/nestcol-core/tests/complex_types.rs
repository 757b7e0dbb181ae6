use nestcol_core::*;

use test_helpers::*;

#[test]
fn test_list_of_records() {
    let item = RecordType::builder()
        .add_scalar_field("sku", ScalarKind::Utf8String, Cardinality::Required)
        .unwrap()
        .add_scalar_field("qty", ScalarKind::Int64, Cardinality::Required)
        .unwrap()
        .add_scalar_field("discount", ScalarKind::Double, Cardinality::Optional)
        .unwrap()
        .build()
        .unwrap();
    let schema = RecordType::builder()
        .add_scalar_field("order_id", ScalarKind::Int64, Cardinality::Required)
        .unwrap()
        .add_list_field("items", item.to_logical_type())
        .unwrap()
        .build()
        .unwrap();

    let records = (0..30i64)
        .map(|i| {
            let items = (0..i % 4)
                .map(|n| {
                    let builder = RecordValue::builder()
                        .add_string_value("sku", &format!("sku-{}-{}", i, n))
                        .add_int64_value("qty", n + 1);
                    let item = if n % 2 == 0 {
                        builder.add_double_value("discount", 0.1 * n as f64).build()
                    } else {
                        builder.add_null("discount").build()
                    };
                    Value::from(item)
                })
                .collect();
            RecordValue::builder()
                .add_int64_value("order_id", i)
                .add_list_value("items", items)
                .build()
        })
        .collect::<Vec<_>>();

    test_roundtrip_with_options(records, schema, Compression::Lz4, Some(8)).unwrap();
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

    let columns = ColumnSchema::new(&schema).unwrap();
    let column = columns.columns().next().unwrap();
    assert_eq!(column.max_repetition_depth, 2);
    assert_eq!(column.max_definition_depth, 2);

    // [[1, 2], [], [3]]
    let record = RecordValue::builder()
        .add_list_value(
            "matrix",
            vec![
                Value::List(vec![Value::from(1i64), Value::from(2i64)]),
                Value::List(vec![]),
                Value::List(vec![Value::from(3i64)]),
            ],
        )
        .build();

    let row = encode_record(&schema, &record).unwrap();
    let levels = row
        .column(0)
        .unwrap()
        .iter()
        .map(|l| (l.repetition_level, l.definition_level))
        .collect::<Vec<_>>();
    assert_eq!(levels, vec![(0, 2), (2, 2), (1, 1), (1, 2)]);

    test_roundtrip(vec![record], schema).unwrap();
}

#[test]
fn test_deeply_nested_optional_records() {
    let level3 = RecordType::builder()
        .add_scalar_field("leaf", ScalarKind::Bool, Cardinality::Optional)
        .unwrap()
        .build()
        .unwrap();
    let level2 = RecordType::builder()
        .add_record_field("c", level3, Cardinality::Optional)
        .unwrap()
        .add_list_field("values", LogicalType::Scalar(ScalarKind::Double))
        .unwrap()
        .build()
        .unwrap();
    let schema = RecordType::builder()
        .add_record_field("b", level2, Cardinality::Optional)
        .unwrap()
        .build()
        .unwrap();

    let columns = ColumnSchema::new(&schema).unwrap();
    let depths = columns
        .columns()
        .map(|c| (c.path.to_string(), c.max_repetition_depth, c.max_definition_depth))
        .collect::<Vec<_>>();
    assert_eq!(
        depths,
        vec![("b.c.leaf".to_string(), 0, 3), ("b.values".to_string(), 1, 2)]
    );

    let leaf = |v: Value| RecordValue::builder().add_value("leaf", v).build();
    let b = |c: Value, values: Vec<Value>| {
        RecordValue::builder()
            .add_value("c", c)
            .add_list_value("values", values)
            .build()
    };
    let records = vec![
        RecordValue::builder().add_null("b").build(),
        RecordValue::builder()
            .add_record_value("b", b(Value::Null, vec![]))
            .build(),
        RecordValue::builder()
            .add_record_value("b", b(leaf(Value::Null).into(), vec![Value::from(1.0)]))
            .build(),
        RecordValue::builder()
            .add_record_value(
                "b",
                b(leaf(true.into()).into(), vec![Value::from(2.0), Value::from(3.0)]),
            )
            .build(),
    ];

    test_roundtrip(records, schema).unwrap();
}

#[test]
fn test_lists_inside_list_of_records() {
    let inner = RecordType::builder()
        .add_string_field("name")
        .unwrap()
        .add_list_field("aliases", LogicalType::Scalar(ScalarKind::Utf8String))
        .unwrap()
        .build()
        .unwrap();
    let schema = RecordType::builder()
        .add_list_field("people", inner.to_logical_type())
        .unwrap()
        .build()
        .unwrap();

    let person = |name: &str, aliases: &[&str]| {
        Value::from(
            RecordValue::builder()
                .add_string_value("name", name)
                .add_string_list_value("aliases", aliases.iter().copied())
                .build(),
        )
    };
    let record = RecordValue::builder()
        .add_list_value(
            "people",
            vec![
                person("ann", &["a", "annie"]),
                person("bob", &[]),
                person("cy", &["c"]),
            ],
        )
        .build();

    let row = encode_record(&schema, &record).unwrap();
    let aliases = row
        .column(1)
        .unwrap()
        .iter()
        .map(|l| (l.repetition_level, l.definition_level))
        .collect::<Vec<_>>();
    assert_eq!(aliases, vec![(0, 2), (2, 2), (1, 1), (1, 2)]);

    test_roundtrip(vec![record], schema).unwrap();
}

#[test]
fn test_schema_inspection() {
    let item = RecordType::builder()
        .add_int64_field("qty")
        .unwrap()
        .build()
        .unwrap();
    let schema = RecordType::builder()
        .add_int64_field("id")
        .unwrap()
        .add_list_field("items", item.to_logical_type())
        .unwrap()
        .build()
        .unwrap();

    assert!(schema.has_field("items.qty"));
    assert!(!schema.has_field("items.price"));
    assert_eq!(schema.all_field_paths(), vec!["id", "items", "items.qty"]);
}
