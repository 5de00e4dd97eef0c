// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared helpers: a fixture registry and chunk-at-a-time drivers for the
//! resumable writer/reader.

use weft_core::{
    DeclaredType, FieldSchema, TypeKind, TypeRegistry, TypeToken, Value, Weft,
};
use weft_wire::{ReadCursor, WriteCursor};

/// Tokens of the fixture registry, in registration order.
#[allow(dead_code)]
pub struct Fixture {
    pub registry: TypeRegistry,
    /// `demo.point { x: float64, y: float64 }` (named).
    pub point: TypeToken,
    /// Id-registered `node { label: string, next: dynamic }`.
    pub node: TypeToken,
    /// Named enum `demo.mode { idle, busy, halted }`.
    pub mode: TypeToken,
}

#[allow(dead_code)]
pub fn fixture() -> Fixture {
    let mut registry = TypeRegistry::new();
    let float64 = float64_token(&registry);
    let string = string_token(&registry);
    let point = registry
        .register_record_named(
            "demo",
            "point",
            vec![
                FieldSchema::new("x", DeclaredType::Token(float64)),
                FieldSchema::new("y", DeclaredType::Token(float64)),
            ],
        )
        .unwrap();
    let node = registry
        .register_record(
            1,
            vec![
                FieldSchema::new("label", DeclaredType::Token(string)),
                FieldSchema::new("next", DeclaredType::Dynamic),
            ],
        )
        .unwrap();
    let mode = registry
        .register_enum_named("demo", "mode", vec!["idle".into(), "busy".into(), "halted".into()])
        .unwrap();
    Fixture { registry, point, node, mode }
}

#[allow(dead_code)]
pub fn float64_token(registry: &TypeRegistry) -> TypeToken {
    registry.builtin_token(TypeKind::Float64).unwrap()
}

#[allow(dead_code)]
pub fn string_token(registry: &TypeRegistry) -> TypeToken {
    registry.builtin_token(TypeKind::String).unwrap()
}

#[allow(dead_code)]
pub fn int32_token(registry: &TypeRegistry) -> TypeToken {
    registry.builtin_token(TypeKind::Int32).unwrap()
}

/// Encodes `value` through bounded cursors of `chunk` bytes, growing the
/// window one byte at a time whenever an atomic unit cannot fit, and
/// returns the stream. The result must be byte-identical to the one-shot
/// encoding regardless of `chunk`.
#[allow(dead_code)]
pub fn write_chunked(weft: &Weft, declared: DeclaredType, value: &Value, chunk: usize) -> Vec<u8> {
    let mut writer = weft.writer_as(declared, value.clone());
    let mut buf = Vec::new();
    let mut budget = chunk.max(1);
    loop {
        let before = buf.len();
        let mut cur = WriteCursor::with_budget(&mut buf, budget);
        let done = writer.write_chunk(&mut cur).unwrap().is_done();
        if done {
            break;
        }
        // An atomic unit larger than the window: widen until it fits.
        if buf.len() == before {
            budget += 1;
        } else {
            budget = chunk.max(1);
        }
    }
    buf
}

/// Decodes `bytes` by presenting windows of `chunk` bytes, growing the
/// window whenever the reader makes no progress, never re-presenting
/// consumed input.
#[allow(dead_code)]
pub fn read_chunked(weft: &Weft, declared: DeclaredType, bytes: &[u8], chunk: usize) -> Value {
    let mut reader = weft.reader_as(declared);
    let mut consumed = 0;
    let mut window = chunk.max(1);
    loop {
        let end = (consumed + window).min(bytes.len());
        let mut cur = ReadCursor::new(&bytes[consumed..end]);
        let done = reader.read_chunk(&mut cur).unwrap().is_done();
        let advanced = cur.consumed();
        consumed += advanced;
        if done {
            break;
        }
        assert!(
            end < bytes.len() || advanced > 0,
            "reader stalled at end of input"
        );
        if advanced == 0 {
            window += 1;
        } else {
            window = chunk.max(1);
        }
    }
    assert_eq!(consumed, bytes.len(), "reader must consume the whole stream");
    reader.into_value().unwrap()
}
