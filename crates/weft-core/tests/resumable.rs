// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Suspension and resumption: chunked output must be byte-identical to
//! one-shot output, chunked input must decode to the same graph, and
//! cached header units must not change across a suspension.

mod common;

use common::{fixture, int32_token, read_chunked, write_chunked};
use weft_core::{DeclaredType, Progress, TypeRegistry, Value, Weft};
use weft_wire::WriteCursor;

fn sample_graphs() -> Vec<(TypeRegistry, Value)> {
    let mut graphs = Vec::new();

    graphs.push((TypeRegistry::new(), Value::str("resumable payload with some length")));
    graphs.push((
        TypeRegistry::new(),
        Value::list(vec![
            Value::Int64(1 << 40),
            Value::str("chunk"),
            Value::Null,
            Value::list(vec![Value::Float64(2.5), Value::Bool(true)]),
        ]),
    ));

    let fx = fixture();
    let shared = Value::str("shared");
    let cyclic = Value::record(fx.node, vec![shared.clone(), Value::Null]);
    if let Value::Record(rc) = &cyclic {
        let self_ref = cyclic.clone();
        rc.borrow_mut().fields[1] = self_ref;
    }
    graphs.push((fx.registry, Value::list(vec![cyclic, shared])));

    graphs
}

#[test]
fn chunked_writes_match_oneshot_bytes() {
    for (registry, graph) in sample_graphs() {
        let weft = Weft::new(registry);
        let oneshot = weft.serialize(&graph).unwrap();
        for chunk in [1, 2, 3, 5, 8, 13] {
            let chunked = write_chunked(&weft, DeclaredType::Dynamic, &graph, chunk);
            assert_eq!(
                chunked, oneshot,
                "chunk budget {chunk} changed the encoding"
            );
        }
    }
}

#[test]
fn chunked_reads_match_oneshot_value() {
    for (registry, graph) in sample_graphs() {
        let weft = Weft::new(registry);
        let bytes = weft.serialize(&graph).unwrap();
        for chunk in [1, 2, 3, 7] {
            let back = read_chunked(&weft, DeclaredType::Dynamic, &bytes, chunk);
            assert!(
                graph.structurally_eq(&back),
                "chunk window {chunk} changed the value"
            );
        }
    }
}

#[test]
fn chunked_read_preserves_identity() {
    let weft = Weft::new(TypeRegistry::new());
    let shared = Value::str("twice");
    let graph = Value::list(vec![shared.clone(), shared]);
    let bytes = weft.serialize(&graph).unwrap();
    let back = read_chunked(&weft, DeclaredType::Dynamic, &bytes, 1);
    let Value::List(rc) = &back else { panic!("expected a list") };
    let items = rc.borrow().items.clone();
    assert!(items[0].same_object(&items[1]));
}

#[test]
fn collection_flags_survive_suspension_after_count() {
    // Cut the write exactly between the element count and the flags byte;
    // the cached statistics pass must replay the same flags on resumption.
    let registry = TypeRegistry::new();
    let int32 = int32_token(&registry);
    let weft = Weft::new(registry);
    let declared = DeclaredType::ListOf(Box::new(DeclaredType::Token(int32)));
    let list = Value::list(vec![Value::Int32(5), Value::Int32(6)]);

    let oneshot = weft.serialize_as(declared.clone(), &list).unwrap();

    let mut writer = weft.writer_as(declared, list);
    let mut buf = Vec::new();
    // Budget 2 fits the ref flag and the count, not the flags byte.
    let mut cur = WriteCursor::with_budget(&mut buf, 2);
    assert_eq!(writer.write_chunk(&mut cur).unwrap(), Progress::Pending);
    assert_eq!(buf.len(), 2, "flag + count written, flags byte held back");

    let mut cur = WriteCursor::new(&mut buf);
    assert_eq!(writer.write_chunk(&mut cur).unwrap(), Progress::Done);
    assert_eq!(buf, oneshot);
}

#[test]
fn string_body_suspends_mid_payload() {
    let weft = Weft::new(TypeRegistry::new());
    let value = Value::str("0123456789abcdef");
    let oneshot = weft.serialize(&value).unwrap();

    let mut writer = weft.writer(value);
    let mut buf = Vec::new();
    // Enough for flag + type meta + header + 4 payload bytes.
    let mut cur = WriteCursor::with_budget(&mut buf, 7);
    assert_eq!(writer.write_chunk(&mut cur).unwrap(), Progress::Pending);
    let cut = buf.len();
    assert!(cut > 3 && cut < oneshot.len(), "must stop inside the payload");

    let mut cur = WriteCursor::new(&mut buf);
    assert_eq!(writer.write_chunk(&mut cur).unwrap(), Progress::Done);
    assert_eq!(buf, oneshot);
}

#[test]
fn randomized_chunk_partitions_are_stable() {
    use rand::{rngs::StdRng, Rng, SeedableRng};

    let fx = fixture();
    let weft = Weft::new(fx.registry);
    let graph = Value::list(vec![
        Value::record(fx.point, vec![Value::Float64(1.0), Value::Float64(2.0)]),
        Value::str("padding between records"),
        Value::enum_const(fx.mode, 1),
    ]);
    let oneshot = weft.serialize(&graph).unwrap();

    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _ in 0..32 {
        let mut writer = weft.writer(graph.clone());
        let mut buf = Vec::new();
        loop {
            let before = buf.len();
            let budget = rng.gen_range(1..9);
            let mut cur = WriteCursor::with_budget(&mut buf, budget);
            if writer.write_chunk(&mut cur).unwrap().is_done() {
                break;
            }
            if buf.len() == before {
                // Atomic unit larger than this chunk; give it real room.
                let mut cur = WriteCursor::with_budget(&mut buf, 16);
                if writer.write_chunk(&mut cur).unwrap().is_done() {
                    break;
                }
            }
        }
        assert_eq!(buf, oneshot);
    }
}

#[test]
fn writer_reports_finished_and_stays_done() {
    let weft = Weft::new(TypeRegistry::new());
    let mut writer = weft.writer(Value::Bool(true));
    let mut buf = Vec::new();
    let mut cur = WriteCursor::new(&mut buf);
    assert_eq!(writer.write_chunk(&mut cur).unwrap(), Progress::Done);
    assert!(writer.is_finished());
    let len = buf.len();
    let mut cur = WriteCursor::new(&mut buf);
    assert_eq!(writer.write_chunk(&mut cur).unwrap(), Progress::Done);
    assert_eq!(buf.len(), len, "a finished writer must not emit more bytes");
}
