// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Reference protocol: dedup of shared objects, cycle safety, the three
//! tracking policies, and fatal protocol violations.

mod common;

use common::fixture;
use weft_core::{
    Config, DecodeError, EncodeError, RefTrackingPolicy, TypeRegistry, Value, Weft,
};

fn list_items(value: &Value) -> Vec<Value> {
    match value {
        Value::List(rc) => rc.borrow().items.clone(),
        other => panic!("expected a list, got {other:?}"),
    }
}

fn record_fields(value: &Value) -> Vec<Value> {
    match value {
        Value::Record(rc) => rc.borrow().fields.clone(),
        other => panic!("expected a record, got {other:?}"),
    }
}

#[test]
fn shared_string_is_written_once_and_identity_survives() {
    let weft = Weft::new(TypeRegistry::new());
    let shared = Value::str("str1");
    let graph = Value::list(vec![shared.clone(), shared]);

    let bytes = weft.serialize(&graph).unwrap();
    // A second full encoding of "str1" would repeat its 4 payload bytes;
    // the back-reference is flag + id.
    let separate = weft
        .serialize(&Value::list(vec![Value::str("str1"), Value::str("str1")]))
        .unwrap();
    assert!(bytes.len() < separate.len());

    let back = weft.deserialize(&bytes).unwrap();
    let items = list_items(&back);
    assert!(items[0].structurally_eq(&Value::str("str1")));
    assert!(items[0].same_object(&items[1]), "dedup must restore identity");

    // Distinct source objects with equal content stay distinct.
    let separate_back = weft.deserialize(&separate).unwrap();
    let separate_items = list_items(&separate_back);
    assert!(separate_items[0].structurally_eq(&separate_items[1]));
    assert!(!separate_items[0].same_object(&separate_items[1]));
}

#[test]
fn self_referential_list_roundtrips() {
    let weft = Weft::new(TypeRegistry::new());
    let graph = Value::list(vec![Value::Int32(1)]);
    if let Value::List(rc) = &graph {
        let self_ref = graph.clone();
        rc.borrow_mut().items.push(self_ref);
    }

    let bytes = weft.serialize(&graph).unwrap();
    let back = weft.deserialize(&bytes).unwrap();
    let items = list_items(&back);
    assert!(items[0].structurally_eq(&Value::Int32(1)));
    assert!(items[1].same_object(&back), "cycle must close on the same object");
}

#[test]
fn self_referential_record_roundtrips() {
    // { a: {b: 1}, self: <same record> }.
    let mut registry = TypeRegistry::new();
    let pair = registry
        .register_record(
            40,
            vec![
                weft_core::FieldSchema::new("a", weft_core::DeclaredType::Dynamic),
                weft_core::FieldSchema::new("self", weft_core::DeclaredType::Dynamic),
            ],
        )
        .unwrap();
    let inner = Value::record(pair, vec![Value::Int32(1), Value::Null]);
    let outer = Value::record(pair, vec![inner.clone(), Value::Null]);
    if let Value::Record(rc) = &outer {
        let self_ref = outer.clone();
        rc.borrow_mut().fields[1] = self_ref;
    }

    let weft = Weft::new(registry);
    let bytes = weft.serialize(&outer).unwrap();
    let back = weft.deserialize(&bytes).unwrap();
    let fields = record_fields(&back);
    assert!(fields[0].structurally_eq(&inner));
    assert!(fields[1].same_object(&back), "result.self must equal result");
}

#[test]
fn mutual_record_cycle_roundtrips() {
    let fx = fixture();
    let a = Value::record(fx.node, vec![Value::str("a"), Value::Null]);
    let b = Value::record(fx.node, vec![Value::str("b"), a.clone()]);
    if let Value::Record(rc) = &a {
        rc.borrow_mut().fields[1] = b.clone();
    }

    let weft = Weft::new(fx.registry);
    let bytes = weft.serialize(&a).unwrap();
    let back = weft.deserialize(&bytes).unwrap();
    let back_b = record_fields(&back)[1].clone();
    let back_a_again = record_fields(&back_b)[1].clone();
    assert!(back_a_again.same_object(&back));
}

#[test]
fn disabled_tracking_duplicates_shared_objects() {
    let weft = Weft::with_config(
        TypeRegistry::new(),
        Config { ref_tracking: RefTrackingPolicy::Disabled, ..Config::default() },
    );
    let shared = Value::str("dup");
    let graph = Value::list(vec![shared.clone(), shared]);
    let bytes = weft.serialize(&graph).unwrap();
    let back = weft.deserialize(&bytes).unwrap();
    let items = list_items(&back);
    assert!(items[0].structurally_eq(&items[1]));
    assert!(!items[0].same_object(&items[1]), "no tracking, no shared identity");
}

#[test]
fn disabled_tracking_rejects_cycles() {
    let weft = Weft::with_config(
        TypeRegistry::new(),
        Config { ref_tracking: RefTrackingPolicy::Disabled, ..Config::default() },
    );
    let graph = Value::list(vec![]);
    if let Value::List(rc) = &graph {
        let self_ref = graph.clone();
        rc.borrow_mut().items.push(self_ref);
    }
    assert!(matches!(
        weft.serialize(&graph),
        Err(EncodeError::CircularReference)
    ));
}

#[test]
fn cycle_only_tracking_keeps_cycles_but_not_sharing() {
    let weft = Weft::with_config(
        TypeRegistry::new(),
        Config { ref_tracking: RefTrackingPolicy::CycleOnly, ..Config::default() },
    );

    // A cycle still closes...
    let cyclic = Value::list(vec![]);
    if let Value::List(rc) = &cyclic {
        let self_ref = cyclic.clone();
        rc.borrow_mut().items.push(self_ref);
    }
    let bytes = weft.serialize(&cyclic).unwrap();
    let back = weft.deserialize(&bytes).unwrap();
    assert!(list_items(&back)[0].same_object(&back));

    // ...while sibling sharing is re-encoded.
    let shared = Value::list(vec![Value::Int32(9)]);
    let graph = Value::list(vec![shared.clone(), shared]);
    let bytes = weft.serialize(&graph).unwrap();
    let back = weft.deserialize(&bytes).unwrap();
    let items = list_items(&back);
    assert!(items[0].structurally_eq(&items[1]));
    assert!(!items[0].same_object(&items[1]));
}

#[test]
fn out_of_range_ref_id_is_fatal() {
    let weft = Weft::new(TypeRegistry::new());
    // Ref flag (-2) followed by id 5: nothing has been registered.
    let bytes = [0xfe_u8, 0x05];
    assert!(matches!(
        weft.deserialize(&bytes),
        Err(DecodeError::RefIdOutOfRange { id: 5, len: 0 })
    ));
}

#[test]
fn unknown_ref_flag_is_fatal() {
    let weft = Weft::new(TypeRegistry::new());
    assert!(matches!(
        weft.deserialize(&[0x05]),
        Err(DecodeError::BadRefFlag(5))
    ));
}

#[test]
fn unknown_type_kind_is_fatal() {
    let weft = Weft::new(TypeRegistry::new());
    // NotNullValue flag, then composite varint naming kind 99.
    let bytes = [0xff_u8, 99];
    assert!(matches!(
        weft.deserialize(&bytes),
        Err(DecodeError::UnknownTypeKind(99))
    ));
}

#[test]
fn unregistered_type_id_is_fatal() {
    let weft = Weft::new(TypeRegistry::new());
    // NotNullValue, composite (7 << 8 | Record) = varint of 1807.
    let composite = 7u32 << 8 | 15;
    let mut bytes = vec![0xff_u8];
    let mut v = composite;
    while v >= 0x80 {
        bytes.push((v as u8) | 0x80);
        v >>= 7;
    }
    bytes.push(v as u8);
    assert!(matches!(
        weft.deserialize(&bytes),
        Err(DecodeError::UnknownTypeId { user_id: 7, .. })
    ));
}
