// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! weft-core: incremental, reference-tracking binary object-graph
//! serialization.
//!
//! The engine converts [`Value`] graphs to and from a compact wire format
//! while preserving object identity across cycles and shared references.
//! Every operation is resumable: a write suspends when its output cursor
//! runs out of room, a read suspends when input runs short, and both pick
//! up exactly where they left off — the same state machine serves
//! synchronous callers (spin until done) and incremental ones (supply
//! buffers as they become available).
//!
//! ```
//! use weft_core::{TypeRegistry, Value, Weft};
//!
//! let weft = Weft::new(TypeRegistry::new());
//! let shared = Value::str("hi");
//! let graph = Value::list(vec![shared.clone(), shared]);
//! let bytes = weft.serialize(&graph).unwrap();
//! let back = weft.deserialize(&bytes).unwrap();
//! assert!(graph.structurally_eq(&back));
//! ```
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::missing_const_for_fn,
    clippy::module_name_repetitions,
    clippy::use_self,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::struct_excessive_bools,
    clippy::option_if_let_else,
    clippy::single_match_else,
    clippy::cognitive_complexity,
    clippy::too_many_lines,
    clippy::redundant_pub_crate,
    clippy::unreadable_literal,
    clippy::doc_markdown,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::similar_names
)]

mod config;
mod de;
mod error;
mod flags;
mod progress;
mod registry;
mod resolver;
mod ser;
mod typemeta;
mod value;

use tracing::debug;
use weft_wire::{ReadCursor, WriteCursor};

/// Engine configuration and reference-tracking policies.
pub use config::{Config, RefTrackingPolicy};
/// Resumable whole-graph reader.
pub use de::GraphReader;
/// Error taxonomy: fatal encode/decode/registry failures (suspension is
/// [`Progress::Pending`], not an error).
pub use error::{DecodeError, EncodeError, RegistryError};
/// Wire-level flag bytes.
pub use flags::{CollectionFlags, RefFlag, StringEncoding};
/// Suspension primitives.
pub use progress::{BoxSlot, InstancePhase, Progress};
/// Type registrations, schemas, and declared types.
pub use registry::{
    DeclaredType, EnumSchema, FieldSchema, RecordSchema, RegisteredName, TypeKind,
    TypeRegistration, TypeRegistry, TypeToken, MAX_TYPE_ID,
};
/// Resumable whole-graph writer.
pub use ser::GraphWriter;
/// The dynamic object-graph model.
pub use value::{EnumValue, ListValue, RecordValue, Value};

/// An engine instance: one registry plus configuration.
///
/// Cheap to construct; independent streams may share one `Weft` because
/// every writer/reader carries its own resolver state. A single
/// writer/reader, however, belongs to exactly one in-flight operation.
#[derive(Debug)]
pub struct Weft {
    config: Config,
    registry: TypeRegistry,
}

impl Weft {
    /// Creates an engine with default configuration.
    pub fn new(registry: TypeRegistry) -> Self {
        Self::with_config(registry, Config::default())
    }

    /// Creates an engine with explicit configuration.
    pub fn with_config(registry: TypeRegistry, config: Config) -> Self {
        Self { config, registry }
    }

    /// The registry this engine dispatches through.
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// The engine configuration.
    pub fn config(&self) -> Config {
        self.config
    }

    /// Starts a resumable write of `value` with a dynamic root slot.
    pub fn writer(&self, value: Value) -> GraphWriter<'_> {
        self.writer_as(DeclaredType::Dynamic, value)
    }

    /// Starts a resumable write of `value` with a declared root slot.
    pub fn writer_as(&self, declared: DeclaredType, value: Value) -> GraphWriter<'_> {
        GraphWriter::new(&self.registry, self.config, declared, value)
    }

    /// Starts a resumable read with a dynamic root slot.
    pub fn reader(&self) -> GraphReader<'_> {
        self.reader_as(DeclaredType::Dynamic)
    }

    /// Starts a resumable read with a declared root slot.
    pub fn reader_as(&self, declared: DeclaredType) -> GraphReader<'_> {
        GraphReader::new(&self.registry, self.config, declared)
    }

    /// Encodes a whole graph synchronously.
    pub fn serialize(&self, value: &Value) -> Result<Vec<u8>, EncodeError> {
        self.serialize_as(DeclaredType::Dynamic, value)
    }

    /// Encodes a whole graph synchronously with a declared root slot.
    pub fn serialize_as(
        &self,
        declared: DeclaredType,
        value: &Value,
    ) -> Result<Vec<u8>, EncodeError> {
        debug!(value = ?value, "serialize");
        let mut writer = self.writer_as(declared, value.clone());
        let mut buf = Vec::new();
        loop {
            let mut cur = WriteCursor::new(&mut buf);
            if writer.write_chunk(&mut cur)?.is_done() {
                break;
            }
            debug_assert!(false, "an unbounded cursor cannot stall");
        }
        Ok(buf)
    }

    /// Decodes a whole graph synchronously, requiring the input to be
    /// exactly one value.
    pub fn deserialize(&self, bytes: &[u8]) -> Result<Value, DecodeError> {
        self.deserialize_as(DeclaredType::Dynamic, bytes)
    }

    /// Decodes a whole graph synchronously with a declared root slot.
    pub fn deserialize_as(
        &self,
        declared: DeclaredType,
        bytes: &[u8],
    ) -> Result<Value, DecodeError> {
        debug!(len = bytes.len(), "deserialize");
        let mut reader = self.reader_as(declared);
        let mut cur = ReadCursor::new(bytes);
        match reader.read_chunk(&mut cur)? {
            Progress::Pending => Err(DecodeError::Truncated),
            Progress::Done => {
                if cur.remaining() != 0 {
                    return Err(DecodeError::TrailingBytes(cur.remaining()));
                }
                reader.into_value().ok_or(DecodeError::Truncated)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smoke_roundtrip() {
        let weft = Weft::new(TypeRegistry::new());
        let graph = Value::list(vec![Value::Int32(7), Value::str("seven"), Value::Null]);
        let bytes = weft.serialize(&graph).unwrap();
        let back = weft.deserialize(&bytes).unwrap();
        assert!(graph.structurally_eq(&back));
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let weft = Weft::new(TypeRegistry::new());
        let mut bytes = weft.serialize(&Value::Bool(true)).unwrap();
        bytes.push(0xff);
        assert!(matches!(
            weft.deserialize(&bytes),
            Err(DecodeError::TrailingBytes(1))
        ));
    }

    #[test]
    fn truncated_input_is_rejected() {
        let weft = Weft::new(TypeRegistry::new());
        let bytes = weft.serialize(&Value::str("hello world")).unwrap();
        assert!(matches!(
            weft.deserialize(&bytes[..bytes.len() - 1]),
            Err(DecodeError::Truncated)
        ));
    }
}
