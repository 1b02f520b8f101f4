//! Alias registry: forward references, recursion, mutual recursion and
//! the unknown-alias failure mode.
//!
//! The registry is process-wide, so every test uses its own alias names.

use binform::{DecodeError, Opts, Schema, SchemaError, Value};

#[test]
fn test_recursive_linked_list() {
    // A choice case may reference the alias before namely registers it.
    let node = Schema::start()
        .uint8("val")
        .uint8("has_next")
        .choice(
            "next",
            Opts::new()
                .tag("has_next")
                .case(0, Schema::start())
                .case(1, "ll_node"),
        )
        .namely("ll_node");

    let rec = node.parse(&[1, 1, 2, 1, 3, 0]).unwrap();
    assert_eq!(rec.get("val"), Some(&Value::UInt(1)));
    assert_eq!(rec.lookup("next.val"), Some(&Value::UInt(2)));
    assert_eq!(rec.lookup("next.next.val"), Some(&Value::UInt(3)));
    assert_eq!(rec.lookup("next.next.next"), Some(&Value::record()));
}

#[test]
fn test_recursive_roundtrip() {
    let node = Schema::start()
        .uint8("val")
        .uint8("has_next")
        .choice(
            "next",
            Opts::new()
                .tag("has_next")
                .case(0, Schema::start())
                .case(1, "rt_node"),
        )
        .namely("rt_node");

    let data = [7, 1, 8, 0];
    let rec = node.parse(&data).unwrap();
    assert_eq!(node.encode(&rec).unwrap(), data.to_vec());
}

#[test]
fn test_mutual_recursion() {
    let _b = Schema::start()
        .uint8("beta")
        .uint8("more")
        .choice(
            "next",
            Opts::new()
                .tag("more")
                .case(0, Schema::start())
                .case(1, "mutual_a"),
        )
        .namely("mutual_b");
    let a = Schema::start()
        .uint8("alpha")
        .uint8("more")
        .choice(
            "next",
            Opts::new()
                .tag("more")
                .case(0, Schema::start())
                .case(1, "mutual_b"),
        )
        .namely("mutual_a");

    let rec = a.parse(&[1, 1, 2, 1, 3, 0]).unwrap();
    assert_eq!(rec.get("alpha"), Some(&Value::UInt(1)));
    assert_eq!(rec.lookup("next.beta"), Some(&Value::UInt(2)));
    assert_eq!(rec.lookup("next.next.alpha"), Some(&Value::UInt(3)));
}

#[test]
fn test_unknown_alias_fails_at_parse_time() {
    let schema = Schema::start()
        .uint8("t")
        .choice("v", Opts::new().tag("t").case(0, "never_registered_alias"));
    let err = schema.parse(&[0, 1]);
    assert_eq!(
        err,
        Err(SchemaError::Decode(DecodeError::UnknownAlias(
            "never_registered_alias".into()
        )))
    );
}

#[test]
fn test_array_of_registered_alias() {
    let _pair = Schema::start().uint8("x").uint8("y").namely("aliased_pair");
    let rec = Schema::start()
        .array("pairs", Opts::new().length(2).of("aliased_pair"))
        .parse(&[1, 2, 3, 4])
        .unwrap();
    let pairs = rec.get("pairs").unwrap().as_array().unwrap();
    assert_eq!(pairs[1].get("y"), Some(&Value::UInt(4)));
}

#[test]
fn test_nest_of_registered_alias() {
    let _head = Schema::start().uint16be("magic").namely("aliased_head");
    let rec = Schema::start()
        .nest("head", Opts::new().of("aliased_head"))
        .uint8("rest")
        .parse(&[0x4F, 0x4B, 9])
        .unwrap();
    assert_eq!(rec.lookup("head.magic"), Some(&Value::UInt(0x4F4B)));
    assert_eq!(rec.get("rest"), Some(&Value::UInt(9)));
}

#[test]
fn test_registration_is_write_last_wins() {
    let _first = Schema::start().uint8("old").namely("replaced_alias");
    let _second = Schema::start().uint16be("new").namely("replaced_alias");

    let rec = Schema::start()
        .nest("n", Opts::new().of("replaced_alias"))
        .parse(&[0x01, 0x02])
        .unwrap();
    assert_eq!(rec.lookup("n.new"), Some(&Value::UInt(0x102)));
    assert_eq!(rec.lookup("n.old"), None);
}

#[test]
fn test_fields_appended_after_namely_are_visible() {
    let _schema = Schema::start()
        .uint8("first")
        .namely("growing_alias")
        .uint8("second");

    let rec = Schema::start()
        .nest("g", Opts::new().of("growing_alias"))
        .parse(&[10, 20])
        .unwrap();
    assert_eq!(rec.lookup("g.first"), Some(&Value::UInt(10)));
    assert_eq!(rec.lookup("g.second"), Some(&Value::UInt(20)));
}

#[test]
fn test_nest_forward_reference() {
    // The chain references the alias before it exists in the registry.
    let schema = Schema::start()
        .uint8("kind")
        .nest("body", Opts::new().of("fwd_nest_body"));
    let _body = Schema::start().uint16be("len").namely("fwd_nest_body");

    let rec = schema.parse(&[1, 0x02, 0x03]).unwrap();
    assert_eq!(rec.get("kind"), Some(&Value::UInt(1)));
    assert_eq!(rec.lookup("body.len"), Some(&Value::UInt(0x203)));
}

#[test]
fn test_recursive_nest_through_choice() {
    // Tag 1 recurses into the alias through a nest built before namely
    // registers the name.
    let node = Schema::start()
        .uint8("val")
        .uint8("tag")
        .choice(
            "",
            Opts::new()
                .tag("tag")
                .case(0, Schema::start())
                .case(
                    1,
                    Schema::start().nest("child", Opts::new().of("nested_tree_node")),
                ),
        )
        .namely("nested_tree_node");

    let rec = node.parse(&[1, 1, 2, 0]).unwrap();
    assert_eq!(rec.get("val"), Some(&Value::UInt(1)));
    assert_eq!(rec.lookup("child.val"), Some(&Value::UInt(2)));
    assert_eq!(rec.lookup("child.tag"), Some(&Value::UInt(0)));
}

#[test]
fn test_pointer_forward_reference() {
    let schema = Schema::start()
        .uint8("at")
        .pointer("entry", Opts::new().offset("at").of("fwd_ptr_entry"))
        .uint8("after");
    let _entry = Schema::start().uint8("x").uint8("y").namely("fwd_ptr_entry");

    let rec = schema.parse(&[3, 0xAA, 0, 7, 8]).unwrap();
    assert_eq!(rec.lookup("entry.x"), Some(&Value::UInt(7)));
    assert_eq!(rec.lookup("entry.y"), Some(&Value::UInt(8)));
    assert_eq!(rec.get("after"), Some(&Value::UInt(0xAA)));
}

#[test]
fn test_alias_encode_via_nest() {
    let _inner = Schema::start().uint8("a").uint8("b").namely("enc_pair");
    let schema = Schema::start().nest("p", Opts::new().of("enc_pair"));
    let rec = Value::from_fields(vec![(
        "p",
        Value::from_fields(vec![("a", Value::UInt(1)), ("b", Value::UInt(2))]),
    )]);
    assert_eq!(schema.encode(&rec).unwrap(), vec![1, 2]);
}
