use nestcol_core::*;

use test_helpers::*;

fn repetitive_records(count: usize) -> Vec<RecordValue> {
    (0..count)
        .map(|i| {
            RecordValue::builder()
                .add_int64_value("id", (i % 10) as i64)
                .add_string_value("name", "the same string over and over")
                .add_double_value("value", 1.0)
                .add_bool_value("active", true)
                .build()
        })
        .collect()
}

#[test]
fn test_all_compressions_roundtrip() {
    for compression in [
        Compression::Uncompressed,
        Compression::Snappy,
        Compression::zstd_default(),
        Compression::Zstd(19),
        Compression::Lz4,
    ] {
        test_roundtrip_with_options(
            generate_test_records(500),
            create_test_schema(),
            compression,
            Some(100),
        )
        .unwrap_or_else(|e| panic!("{:?} failed: {}", compression, e));
    }
}

#[test]
fn test_compression_shrinks_repetitive_data() {
    let schema = create_test_schema();
    let records = repetitive_records(2_000);

    let size_of = |compression| {
        write_to_bytes(
            &records,
            &schema,
            WriterBuilder::new().with_compression(compression),
        )
        .len()
    };

    let uncompressed = size_of(Compression::Uncompressed);
    for compression in [Compression::Snappy, Compression::zstd_default(), Compression::Lz4] {
        let compressed = size_of(compression);
        assert!(
            compressed < uncompressed,
            "{:?}: {} >= {}",
            compression,
            compressed,
            uncompressed
        );
    }
}

#[test]
fn test_compression_recorded_in_footer() {
    let schema = create_test_schema();
    let bytes = write_to_bytes(
        &generate_test_records(5),
        &schema,
        WriterBuilder::new().with_compression(Compression::Zstd(7)),
    );

    let reader = Reader::from_bytes(bytes, &schema).unwrap();
    assert_eq!(reader.metadata().compression, Compression::Zstd(7));
    for column in &reader.metadata().columns {
        for chunk in &column.chunks {
            assert!(chunk.uncompressed_length > 0);
        }
    }
}

#[test]
fn test_default_is_snappy() {
    let schema = create_test_schema();
    let bytes = write_to_bytes(&generate_test_records(5), &schema, WriterBuilder::new());
    let reader = Reader::from_bytes(bytes, &schema).unwrap();
    assert_eq!(reader.metadata().compression, Compression::Snappy);
}
