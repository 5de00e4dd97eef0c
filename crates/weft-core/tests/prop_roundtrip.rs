// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Property-based round trips over generated acyclic graphs.

mod common;

use common::{read_chunked, write_chunked};
use proptest::prelude::*;
use weft_core::{DeclaredType, TypeRegistry, Value, Weft};

fn arb_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i8>().prop_map(Value::Int8),
        any::<i16>().prop_map(Value::Int16),
        any::<i32>().prop_map(Value::Int32),
        any::<i64>().prop_map(Value::Int64),
        any::<f32>().prop_map(Value::Float32),
        any::<f64>().prop_map(Value::Float64),
        "[a-zA-Z0-9 _.]{0,16}".prop_map(Value::str),
        "[\\PC]{0,8}".prop_map(Value::str),
    ];
    leaf.prop_recursive(3, 32, 6, |inner| {
        prop::collection::vec(inner, 0..6).prop_map(Value::list)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn roundtrip_preserves_structure(graph in arb_value()) {
        let weft = Weft::new(TypeRegistry::new());
        let bytes = weft.serialize(&graph).unwrap();
        let back = weft.deserialize(&bytes).unwrap();
        prop_assert!(graph.structurally_eq(&back));
    }

    #[test]
    fn chunked_write_is_byte_identical(graph in arb_value(), chunk in 1usize..6) {
        let weft = Weft::new(TypeRegistry::new());
        let oneshot = weft.serialize(&graph).unwrap();
        let chunked = write_chunked(&weft, DeclaredType::Dynamic, &graph, chunk);
        prop_assert_eq!(chunked, oneshot);
    }

    #[test]
    fn chunked_read_matches(graph in arb_value(), chunk in 1usize..6) {
        let weft = Weft::new(TypeRegistry::new());
        let bytes = weft.serialize(&graph).unwrap();
        let back = read_chunked(&weft, DeclaredType::Dynamic, &bytes, chunk);
        prop_assert!(graph.structurally_eq(&back));
    }
}
