//! Bit-packed runs: extraction order, rounding, endianness, the nest
//! tolerance, and the 32-bit ceiling.

use binform::{DecodeError, Endian, Opts, Schema, SchemaError, Value};

#[test]
fn test_big_endian_run_takes_most_significant_bits_first() {
    let schema = Schema::start().bit1("a").bit3("b").bit4("c");
    let rec = schema.parse(&[0b1_011_0110]).unwrap();
    assert_eq!(rec.get("a"), Some(&Value::UInt(1)));
    assert_eq!(rec.get("b"), Some(&Value::UInt(3)));
    assert_eq!(rec.get("c"), Some(&Value::UInt(6)));

    assert_eq!(schema.encode(&rec).unwrap(), vec![0b1_011_0110]);
}

#[test]
fn test_little_endian_run_takes_least_significant_bits_first() {
    let schema = Schema::start()
        .endianness(Endian::Little)
        .bit1("a")
        .bit3("b")
        .bit4("c");
    let rec = schema.parse(&[0b1011_0110]).unwrap();
    assert_eq!(rec.get("a"), Some(&Value::UInt(0)));
    assert_eq!(rec.get("b"), Some(&Value::UInt(3)));
    assert_eq!(rec.get("c"), Some(&Value::UInt(11)));

    assert_eq!(schema.encode(&rec).unwrap(), vec![0b1011_0110]);
}

#[test]
fn test_run_advances_by_rounded_up_byte_count() {
    // 12 bits round up to 16: the run consumes two bytes.
    let rec = Schema::start()
        .bit4("a")
        .bit8("b")
        .uint8("after")
        .parse(&[0xAB, 0xCD, 0x7F])
        .unwrap();
    assert_eq!(rec.get("a"), Some(&Value::UInt(0xA)));
    assert_eq!(rec.get("b"), Some(&Value::UInt(0xBC)));
    assert_eq!(rec.get("after"), Some(&Value::UInt(0x7F)));
}

#[test]
fn test_three_bit_run_reads_from_the_top_of_the_byte() {
    // Three bits still consume a whole byte, taken from the high end.
    let rec = Schema::start()
        .bit1("a")
        .bit2("b")
        .uint8("after")
        .parse(&[0b101_00000, 0x11])
        .unwrap();
    assert_eq!(rec.get("a"), Some(&Value::UInt(1)));
    assert_eq!(rec.get("b"), Some(&Value::UInt(0b01)));
    assert_eq!(rec.get("after"), Some(&Value::UInt(0x11)));
}

#[test]
fn test_twenty_four_bit_run() {
    let schema = Schema::start().bit8("x").bit8("y").bit8("z");
    let rec = schema.parse(&[0xAB, 0xCD, 0xEF]).unwrap();
    assert_eq!(rec.get("x"), Some(&Value::UInt(0xAB)));
    assert_eq!(rec.get("y"), Some(&Value::UInt(0xCD)));
    assert_eq!(rec.get("z"), Some(&Value::UInt(0xEF)));

    assert_eq!(schema.encode(&rec).unwrap(), vec![0xAB, 0xCD, 0xEF]);
}

#[test]
fn test_thirty_two_bit_run_roundtrip() {
    let schema = Schema::start().bit16("hi").bit16("lo");
    let rec = schema.parse(&[0x12, 0x34, 0x56, 0x78]).unwrap();
    assert_eq!(rec.get("hi"), Some(&Value::UInt(0x1234)));
    assert_eq!(rec.get("lo"), Some(&Value::UInt(0x5678)));

    assert_eq!(schema.encode(&rec).unwrap(), vec![0x12, 0x34, 0x56, 0x78]);
}

#[test]
fn test_run_longer_than_32_bits_fails() {
    let err = Schema::start()
        .bit32("a")
        .bit1("b")
        .parse(&[0, 0, 0, 0, 0]);
    assert_eq!(
        err,
        Err(SchemaError::Decode(DecodeError::BitRunTooLong { bits: 33 }))
    );
}

#[test]
fn test_byte_aligned_field_breaks_the_run() {
    // Two separate 4-bit runs, each padded to its own byte.
    let rec = Schema::start()
        .bit4("first")
        .uint8("mid")
        .bit4("second")
        .parse(&[0xA0, 0x42, 0xB0])
        .unwrap();
    assert_eq!(rec.get("first"), Some(&Value::UInt(0xA)));
    assert_eq!(rec.get("mid"), Some(&Value::UInt(0x42)));
    assert_eq!(rec.get("second"), Some(&Value::UInt(0xB)));
}

#[test]
fn test_nest_does_not_break_a_run() {
    // The nest decodes at its chain position; the packed read for the
    // accumulated bits happens afterwards, at the advanced offset.
    let rec = Schema::start()
        .bit4("hi")
        .nest("mid", Opts::new().of(Schema::start().uint8("x")))
        .bit4("lo")
        .parse(&[0xAB, 0xCD])
        .unwrap();
    assert_eq!(rec.lookup("mid.x"), Some(&Value::UInt(0xAB)));
    assert_eq!(rec.get("hi"), Some(&Value::UInt(0xC)));
    assert_eq!(rec.get("lo"), Some(&Value::UInt(0xD)));
}

#[test]
fn test_mixed_widths_roundtrip() {
    let schema = Schema::start().bit3("a").bit5("b").bit7("c").bit1("d");
    let data = [0b101_10011, 0b1011010_1];
    let rec = schema.parse(&data).unwrap();
    assert_eq!(rec.get("a"), Some(&Value::UInt(0b101)));
    assert_eq!(rec.get("b"), Some(&Value::UInt(0b10011)));
    assert_eq!(rec.get("c"), Some(&Value::UInt(0b1011010)));
    assert_eq!(rec.get("d"), Some(&Value::UInt(1)));

    assert_eq!(schema.encode(&rec).unwrap(), data.to_vec());
}

#[test]
fn test_bit_field_assert_and_formatter() {
    let schema = Schema::start()
        .bit1("version")
        .assert(1)
        .bit7("length")
        .formatter(|v, _, _| Value::UInt(v.as_uint().unwrap_or(0) * 4));
    let rec = schema.parse(&[0b1_0000011]).unwrap();
    assert_eq!(rec.get("length"), Some(&Value::UInt(12)));

    assert!(schema.parse(&[0b0_0000011]).is_err());
}
