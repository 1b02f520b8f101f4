//! Round-trip properties: encode(decode(bytes)) reproduces the bytes for
//! lossless schemas, decode(encode(record)) reproduces the record, and the
//! size oracle agrees with what decode actually consumes.

use binform::{Opts, Schema, Value};

fn packet_schema() -> Schema {
    Schema::start()
        .uint16be("magic")
        .uint8("flags")
        .string("name", Opts::new().length(4))
        .buffer("payload", Opts::new().length(3))
        .uint8("n")
        .array("items", Opts::new().length("n").of("uint16le"))
        .nest(
            "footer",
            Opts::new().of(Schema::start().uint8("crc_hi").uint8("crc_lo")),
        )
}

#[test]
fn test_bytes_survive_decode_then_encode() {
    let data: Vec<u8> = vec![
        0x4D, 0x5A, // magic
        0x03, // flags
        b'd', b'a', b't', b'a', // name
        0xDE, 0xAD, 0xBF, // payload
        0x02, // n
        0x01, 0x00, 0x02, 0x00, // items
        0xAB, 0xCD, // footer
    ];
    let schema = packet_schema();
    let rec = schema.parse(&data).unwrap();
    assert_eq!(schema.encode(&rec).unwrap(), data);
}

#[test]
fn test_record_survives_encode_then_decode() {
    let schema = packet_schema();
    let rec = Value::from_fields(vec![
        ("magic", Value::UInt(0x4D5A)),
        ("flags", Value::UInt(1)),
        ("name", Value::Str("abcd".into())),
        ("payload", Value::Bytes(vec![9, 8, 7])),
        ("n", Value::UInt(1)),
        ("items", Value::Array(vec![Value::UInt(0x0102)])),
        (
            "footer",
            Value::from_fields(vec![
                ("crc_hi", Value::UInt(0xAA)),
                ("crc_lo", Value::UInt(0x55)),
            ]),
        ),
    ]);
    let decoded = schema.parse(&schema.encode(&rec).unwrap()).unwrap();
    assert_eq!(decoded, rec);
}

#[test]
fn test_single_primitive_scenario() {
    let schema = Schema::start().uint16be("n");
    let rec = schema.parse(&[0x12, 0x34]).unwrap();
    assert_eq!(rec.get("n"), Some(&Value::UInt(0x1234)));
    assert_eq!(schema.encode(&rec).unwrap(), vec![0x12, 0x34]);
}

#[test]
fn test_length_prefixed_array_roundtrip() {
    let schema = Schema::start()
        .uint8("n")
        .array("items", Opts::new().length("n").of("uint16le"));
    let data = [0x02, 0x01, 0x00, 0x02, 0x00];
    let rec = schema.parse(&data).unwrap();
    assert_eq!(
        rec.get("items"),
        Some(&Value::Array(vec![Value::UInt(1), Value::UInt(2)]))
    );
    assert_eq!(schema.encode(&rec).unwrap(), data.to_vec());
}

#[test]
fn test_choice_roundtrip() {
    let schema = Schema::start().uint8("t").choice(
        "v",
        Opts::new()
            .tag("t")
            .case(1, "uint8")
            .case(2, "uint16be")
            .default_choice("uint8"),
    );
    for data in [vec![1u8, 9], vec![2, 1, 2], vec![9, 5]] {
        let rec = schema.parse(&data).unwrap();
        assert_eq!(schema.encode(&rec).unwrap(), data);
    }
}

#[test]
fn test_signed_and_float_roundtrip() {
    let schema = Schema::start()
        .int16be("a")
        .int32le("b")
        .floatbe("f")
        .doublele("d");
    let rec = Value::from_fields(vec![
        ("a", Value::Int(-300)),
        ("b", Value::Int(-70000)),
        ("f", Value::Float(0.5)),
        ("d", Value::Float(-2.25)),
    ]);
    let decoded = schema.parse(&schema.encode(&rec).unwrap()).unwrap();
    assert_eq!(decoded, rec);
}

#[test]
fn test_latin1_string_roundtrip() {
    use binform::Encoding;
    let schema = Schema::start().string("s", Opts::new().length(3).encoding(Encoding::Latin1));
    let data = [0xE9, 0xE8, 0xE7];
    let rec = schema.parse(&data).unwrap();
    assert_eq!(schema.encode(&rec).unwrap(), data.to_vec());
}

#[test]
fn test_size_of_matches_consumed_bytes() {
    let schema = Schema::start()
        .uint16be("a")
        .string("s", Opts::new().length(4))
        .nest("n", Opts::new().of(Schema::start().uint32le("x")))
        .seek(1)
        .uint8("z");
    let size = schema.size_of().unwrap();
    assert_eq!(size, 12);

    // A buffer of exactly that size decodes; one byte less does not.
    let data = vec![0u8; size];
    assert!(schema.parse(&data).is_ok());
    assert!(schema.parse(&data[..size - 1]).is_err());

    // Encoding a decoded record reproduces the width too.
    let rec = schema.parse(&data).unwrap();
    assert_eq!(schema.encode(&rec).unwrap().len(), size);
}

#[test]
fn test_save_offset_reports_consumed_width() {
    let schema = Schema::start()
        .uint32be("a")
        .string("s", Opts::new().length(2))
        .save_offset("end");
    let rec = schema.parse(&[0, 0, 0, 0, b'h', b'i']).unwrap();
    assert_eq!(rec.get("end"), Some(&Value::UInt(6)));
}
