// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Error taxonomy for the engine.
//!
//! Suspension ("not enough buffer") is **not** an error — it travels as
//! [`crate::Progress::Pending`] so the hot resumable path stays allocation-
//! and branch-cheap. The enums here are the fatal cases: corrupt or
//! adversarial streams on the read side, and bad input graphs or missing
//! registrations on the write side.

use crate::flags::RefFlag;
use crate::registry::TypeKind;
use weft_meta::MetaStringError;
use weft_wire::WireError;

/// Fatal errors while encoding a graph.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    /// The graph contains a cycle but the tracking policy forbids
    /// back-references.
    #[error("circular reference detected with reference tracking disabled")]
    CircularReference,

    /// A value's runtime type does not match the slot's declared type.
    #[error("declared type expects {expected}, found {found}")]
    DeclaredTypeMismatch {
        /// What the slot declares.
        expected: &'static str,
        /// What the value actually is.
        found: &'static str,
    },

    /// A record value's field count disagrees with its registered schema.
    #[error("record has {found} fields, schema declares {expected}")]
    ArityMismatch {
        /// Field count in the schema.
        expected: usize,
        /// Field count in the value.
        found: usize,
    },

    /// An enum value's ordinal is outside its registered variant range.
    #[error("enum ordinal {ordinal} out of range for {variants} variants")]
    OrdinalOutOfRange {
        /// Ordinal carried by the value.
        ordinal: u32,
        /// Number of registered variants.
        variants: usize,
    },

    /// A value carries a type token that this registry did not issue.
    #[error("value carries a foreign or stale type token")]
    InvalidToken,
}

/// Fatal errors while decoding a stream.
///
/// Every variant means the stream is corrupt, adversarial, or mismatched
/// against the registry — never "try again with more bytes".
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Malformed varint at the wire layer.
    #[error(transparent)]
    Wire(#[from] WireError),

    /// A reference-flag byte outside the known set.
    #[error("unknown reference flag {0}")]
    BadRefFlag(i8),

    /// A valid reference flag where the slot's layout forbids it (e.g. a
    /// back-reference in a slot the header declared untracked).
    #[error("reference flag {0:?} not permitted in this slot")]
    UnexpectedRefFlag(RefFlag),

    /// A back-reference to an id the reference table has not populated.
    #[error("reference id {id} out of range ({len} objects known)")]
    RefIdOutOfRange {
        /// Referenced id.
        id: u32,
        /// Number of objects currently in the table.
        len: usize,
    },

    /// A type-kind byte outside the known set.
    #[error("unknown type kind {0}")]
    UnknownTypeKind(u8),

    /// A registered-type id with no matching registration.
    #[error("no registration for type id {user_id} (kind {kind:?})")]
    UnknownTypeId {
        /// Declared kind from the wire.
        kind: TypeKind,
        /// Registered id from the wire.
        user_id: u32,
    },

    /// A registration exists for the id but under a different kind.
    #[error("type id {user_id} is registered as {registered:?}, stream says {kind:?}")]
    TypeKindMismatch {
        /// Kind from the wire.
        kind: TypeKind,
        /// Kind in the registry.
        registered: TypeKind,
        /// Registered id from the wire.
        user_id: u32,
    },

    /// A named type with no matching registration.
    #[error("no registration for type name {namespace:?}.{name:?}")]
    UnknownTypeName {
        /// Namespace from the stream.
        namespace: String,
        /// Name from the stream.
        name: String,
    },

    /// The collection header carries flag bits this engine does not know.
    #[error("unknown collection header bits {0:#04x}")]
    UnknownCollectionFlags(u8),

    /// A collection count that cannot be materialized on this host.
    #[error("collection count {0} overflows addressable size")]
    CountOverflow(u64),

    /// A string header names an encoding outside the known set.
    #[error("unknown string encoding {0}")]
    BadStringEncoding(u8),

    /// String payload bytes do not decode under the declared encoding.
    #[error("string payload is not valid for its declared encoding")]
    CorruptString,

    /// An enum ordinal outside the registered variant range.
    #[error("enum ordinal {ordinal} out of range for {variants} variants")]
    OrdinalOutOfRange {
        /// Ordinal from the stream.
        ordinal: u32,
        /// Number of registered variants.
        variants: usize,
    },

    /// A meta-string name failed to decode.
    #[error(transparent)]
    MetaString(#[from] MetaStringError),

    /// A meta-string back-reference to an id not yet written in this stream.
    #[error("meta-string id {id} out of range ({len} names known)")]
    MetaStringIdOutOfRange {
        /// Referenced id.
        id: u32,
        /// Number of names currently known.
        len: usize,
    },

    /// The caller-supplied declared type carries a token this registry did
    /// not issue.
    #[error("declared type carries a foreign or stale type token")]
    InvalidToken,

    /// The synchronous entry point ran out of input before the value
    /// completed.
    #[error("input ended before the value completed")]
    Truncated,

    /// The synchronous entry point decoded a complete value with input left
    /// over.
    #[error("{0} trailing bytes after value")]
    TrailingBytes(usize),
}

/// Errors raised while building the type registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The numeric id is already registered.
    #[error("type id {0} already registered")]
    DuplicateTypeId(u32),

    /// The namespace + name pair is already registered.
    #[error("type name {namespace:?}.{name:?} already registered")]
    DuplicateTypeName {
        /// Namespace of the offending registration.
        namespace: String,
        /// Name of the offending registration.
        name: String,
    },

    /// The numeric id does not fit the composite wire id's 24-bit budget.
    #[error("type id {0} exceeds the 24-bit wire budget")]
    TypeIdTooLarge(u32),

    /// The namespace or name cannot be represented as a meta-string.
    #[error(transparent)]
    MetaString(#[from] MetaStringError),
}
