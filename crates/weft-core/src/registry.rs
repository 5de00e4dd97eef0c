// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Type registry: the immutable bindings from registered types to wire ids,
//! names, and schemas.
//!
//! Registration happens up front, before any stream is opened; the engine
//! then treats registrations as immutable handles ([`TypeToken`]) and
//! resolves all dispatch through them — one index lookup, no per-call
//! reflection.
//!
//! On the wire a type is identified by a composite varint
//! `user_id << 8 | kind`, where builtin and named kinds carry `user_id = 0`.
//! Named kinds (`NamedRecord`, `NamedEnum`) are followed by their namespace
//! and name as meta-strings (see [`weft_meta`]).

use rustc_hash::FxHashMap;

use crate::error::{DecodeError, RegistryError};
use crate::value::Value;

/// Largest registrable numeric type id (the composite reserves 8 bits for
/// the kind).
pub const MAX_TYPE_ID: u32 = (1 << 24) - 1;

/// Wire-level type kinds.
///
/// The numeric values are fixed by the cross-language protocol; the gaps
/// belong to kinds this engine does not implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TypeKind {
    /// Boolean.
    Bool = 1,
    /// 8-bit signed integer.
    Int8 = 2,
    /// 16-bit signed integer.
    Int16 = 3,
    /// 32-bit signed integer.
    Int32 = 4,
    /// 64-bit signed integer.
    Int64 = 6,
    /// 32-bit float.
    Float32 = 10,
    /// 64-bit float.
    Float64 = 11,
    /// Text string.
    String = 12,
    /// Enum registered by numeric id, serialized as its ordinal.
    Enum = 13,
    /// Enum registered by namespace + name.
    NamedEnum = 14,
    /// Record registered by numeric id.
    Record = 15,
    /// Record registered by namespace + name.
    NamedRecord = 17,
    /// Ordered sequence of values.
    List = 21,
}

impl TypeKind {
    /// Parses a wire kind byte; `None` for kinds this engine does not know.
    pub fn from_wire(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Self::Bool),
            2 => Some(Self::Int8),
            3 => Some(Self::Int16),
            4 => Some(Self::Int32),
            6 => Some(Self::Int64),
            10 => Some(Self::Float32),
            11 => Some(Self::Float64),
            12 => Some(Self::String),
            13 => Some(Self::Enum),
            14 => Some(Self::NamedEnum),
            15 => Some(Self::Record),
            17 => Some(Self::NamedRecord),
            21 => Some(Self::List),
            _ => None,
        }
    }

    /// The byte this kind writes in the composite id.
    #[inline]
    pub fn wire(self) -> u8 {
        self as u8
    }

    /// Whether values of this kind are inline — copied, never null on their
    /// own, and never reference-tracked.
    pub fn is_inline(self) -> bool {
        matches!(
            self,
            Self::Bool
                | Self::Int8
                | Self::Int16
                | Self::Int32
                | Self::Int64
                | Self::Float32
                | Self::Float64
                | Self::Enum
                | Self::NamedEnum
        )
    }

    /// Whether the composite id is followed by namespace + name
    /// meta-strings.
    pub fn is_named(self) -> bool {
        matches!(self, Self::NamedEnum | Self::NamedRecord)
    }

    /// Stable human-readable name, for diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::String => "string",
            Self::Enum => "enum",
            Self::NamedEnum => "named enum",
            Self::Record => "record",
            Self::NamedRecord => "named record",
            Self::List => "list",
        }
    }
}

/// Opaque handle to a registration. Tokens are only meaningful against the
/// registry that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeToken(u32);

impl TypeToken {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// What a slot statically declares about its value.
///
/// Concrete declarations let both ends elide per-value type meta; `Dynamic`
/// slots carry it on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclaredType {
    /// Any registered type; type meta travels on the wire.
    Dynamic,
    /// Exactly the registered type behind the token.
    Token(TypeToken),
    /// A list whose elements declare the inner type.
    ListOf(Box<DeclaredType>),
}

/// One field of a record schema. Field resolution is positional; the name
/// is carried for diagnostics only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSchema {
    /// Field name (diagnostics only).
    pub name: String,
    /// Declared type of the field slot.
    pub declared: DeclaredType,
}

impl FieldSchema {
    /// Creates a field schema.
    pub fn new(name: impl Into<String>, declared: DeclaredType) -> Self {
        Self { name: name.into(), declared }
    }
}

/// Schema of a registered record: positional fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSchema {
    /// Field slots in wire order.
    pub fields: Vec<FieldSchema>,
}

/// Schema of a registered enum: named constants, serialized as ordinals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumSchema {
    /// Variant names in ordinal order.
    pub variants: Vec<String>,
}

/// Per-kind payload of a registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeSchema {
    /// Builtin kinds carry no schema.
    Builtin,
    /// Record schema.
    Record(RecordSchema),
    /// Enum schema.
    Enum(EnumSchema),
}

/// A registered name with its meta-string forms resolved at registration
/// time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredName {
    namespace: weft_meta::MetaString,
    name: weft_meta::MetaString,
}

impl RegisteredName {
    /// Namespace meta-string.
    pub fn namespace(&self) -> &weft_meta::MetaString {
        &self.namespace
    }

    /// Name meta-string.
    pub fn name(&self) -> &weft_meta::MetaString {
        &self.name
    }
}

/// Immutable binding of a registered type to its wire identity and schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRegistration {
    token: TypeToken,
    kind: TypeKind,
    user_id: u32,
    name: Option<RegisteredName>,
    schema: TypeSchema,
}

impl TypeRegistration {
    /// The handle this registration is addressed by.
    pub fn token(&self) -> TypeToken {
        self.token
    }

    /// Wire kind.
    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    /// Registered numeric id (0 for builtin and named kinds).
    pub fn user_id(&self) -> u32 {
        self.user_id
    }

    /// Registered name, for named kinds.
    pub fn name(&self) -> Option<&RegisteredName> {
        self.name.as_ref()
    }

    /// The composite id written on the wire.
    pub fn wire_composite(&self) -> u32 {
        self.user_id << 8 | u32::from(self.kind.wire())
    }

    /// Record schema, when this registration is a record.
    pub fn record_schema(&self) -> Option<&RecordSchema> {
        match &self.schema {
            TypeSchema::Record(rs) => Some(rs),
            _ => None,
        }
    }

    /// Enum schema, when this registration is an enum.
    pub fn enum_schema(&self) -> Option<&EnumSchema> {
        match &self.schema {
            TypeSchema::Enum(es) => Some(es),
            _ => None,
        }
    }
}

/// Order builtins are pre-registered in; token values are their positions.
const BUILTIN_KINDS: [TypeKind; 9] = [
    TypeKind::Bool,
    TypeKind::Int8,
    TypeKind::Int16,
    TypeKind::Int32,
    TypeKind::Int64,
    TypeKind::Float32,
    TypeKind::Float64,
    TypeKind::String,
    TypeKind::List,
];

/// The registry. Build it up front with every record and enum a stream may
/// carry, then hand it to the engine; it is never mutated mid-stream.
#[derive(Debug)]
pub struct TypeRegistry {
    regs: Vec<TypeRegistration>,
    by_user_id: FxHashMap<u32, TypeToken>,
    by_name: FxHashMap<(String, String), TypeToken>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    /// Creates a registry with the builtin kinds pre-registered.
    pub fn new() -> Self {
        let mut registry = Self {
            regs: Vec::with_capacity(BUILTIN_KINDS.len()),
            by_user_id: FxHashMap::default(),
            by_name: FxHashMap::default(),
        };
        for kind in BUILTIN_KINDS {
            let token = TypeToken(registry.regs.len() as u32);
            registry.regs.push(TypeRegistration {
                token,
                kind,
                user_id: 0,
                name: None,
                schema: TypeSchema::Builtin,
            });
        }
        registry
    }

    /// Token of a builtin kind; `None` for record/enum kinds, which only
    /// exist through registration.
    pub fn builtin_token(&self, kind: TypeKind) -> Option<TypeToken> {
        BUILTIN_KINDS
            .iter()
            .position(|&k| k == kind)
            .map(|pos| TypeToken(pos as u32))
    }

    /// Infallible builtin lookup for kinds the engine knows are builtin.
    pub(crate) fn builtin(&self, kind: TypeKind) -> TypeToken {
        self.builtin_token(kind).unwrap_or(TypeToken(0))
    }

    /// Registers a record under a numeric id.
    pub fn register_record(
        &mut self,
        user_id: u32,
        fields: Vec<FieldSchema>,
    ) -> Result<TypeToken, RegistryError> {
        self.insert_by_id(user_id, TypeKind::Record, TypeSchema::Record(RecordSchema { fields }))
    }

    /// Registers a record under a namespace + name.
    pub fn register_record_named(
        &mut self,
        namespace: &str,
        name: &str,
        fields: Vec<FieldSchema>,
    ) -> Result<TypeToken, RegistryError> {
        self.insert_by_name(
            namespace,
            name,
            TypeKind::NamedRecord,
            TypeSchema::Record(RecordSchema { fields }),
        )
    }

    /// Registers an enum under a numeric id.
    pub fn register_enum(
        &mut self,
        user_id: u32,
        variants: Vec<String>,
    ) -> Result<TypeToken, RegistryError> {
        self.insert_by_id(user_id, TypeKind::Enum, TypeSchema::Enum(EnumSchema { variants }))
    }

    /// Registers an enum under a namespace + name.
    pub fn register_enum_named(
        &mut self,
        namespace: &str,
        name: &str,
        variants: Vec<String>,
    ) -> Result<TypeToken, RegistryError> {
        self.insert_by_name(
            namespace,
            name,
            TypeKind::NamedEnum,
            TypeSchema::Enum(EnumSchema { variants }),
        )
    }

    fn insert_by_id(
        &mut self,
        user_id: u32,
        kind: TypeKind,
        schema: TypeSchema,
    ) -> Result<TypeToken, RegistryError> {
        if user_id > MAX_TYPE_ID {
            return Err(RegistryError::TypeIdTooLarge(user_id));
        }
        if self.by_user_id.contains_key(&user_id) {
            return Err(RegistryError::DuplicateTypeId(user_id));
        }
        let token = TypeToken(self.regs.len() as u32);
        self.regs.push(TypeRegistration { token, kind, user_id, name: None, schema });
        self.by_user_id.insert(user_id, token);
        Ok(token)
    }

    fn insert_by_name(
        &mut self,
        namespace: &str,
        name: &str,
        kind: TypeKind,
        schema: TypeSchema,
    ) -> Result<TypeToken, RegistryError> {
        let key = (namespace.to_owned(), name.to_owned());
        if self.by_name.contains_key(&key) {
            return Err(RegistryError::DuplicateTypeName {
                namespace: namespace.to_owned(),
                name: name.to_owned(),
            });
        }
        let registered = RegisteredName {
            namespace: weft_meta::encode(namespace)?,
            name: weft_meta::encode(name)?,
        };
        let token = TypeToken(self.regs.len() as u32);
        self.regs.push(TypeRegistration {
            token,
            kind,
            user_id: 0,
            name: Some(registered),
            schema,
        });
        self.by_name.insert(key, token);
        Ok(token)
    }

    /// Looks up a registration by token.
    pub fn get(&self, token: TypeToken) -> Option<&TypeRegistration> {
        self.regs.get(token.index())
    }

    /// Resolves a decoded composite id for unnamed kinds.
    pub(crate) fn resolve_wire(
        &self,
        kind: TypeKind,
        user_id: u32,
    ) -> Result<TypeToken, DecodeError> {
        match kind {
            TypeKind::Record | TypeKind::Enum => match self.by_user_id.get(&user_id) {
                None => Err(DecodeError::UnknownTypeId { kind, user_id }),
                Some(&token) => {
                    let registered = self.regs[token.index()].kind;
                    if registered == kind {
                        Ok(token)
                    } else {
                        Err(DecodeError::TypeKindMismatch { kind, registered, user_id })
                    }
                }
            },
            TypeKind::NamedRecord | TypeKind::NamedEnum => {
                // Named kinds resolve through resolve_named after their
                // meta-strings arrive.
                Err(DecodeError::UnknownTypeId { kind, user_id })
            }
            _ if user_id == 0 => Ok(self.builtin(kind)),
            _ => Err(DecodeError::UnknownTypeId { kind, user_id }),
        }
    }

    /// Resolves a decoded namespace + name for named kinds.
    pub(crate) fn resolve_named(
        &self,
        kind: TypeKind,
        namespace: &str,
        name: &str,
    ) -> Result<TypeToken, DecodeError> {
        match self.by_name.get(&(namespace.to_owned(), name.to_owned())) {
            Some(&token) if self.regs[token.index()].kind == kind => Ok(token),
            _ => Err(DecodeError::UnknownTypeName {
                namespace: namespace.to_owned(),
                name: name.to_owned(),
            }),
        }
    }

    /// The runtime token a value dispatches through, or `None` for null.
    pub(crate) fn runtime_token(&self, value: &Value) -> Option<TypeToken> {
        match value {
            Value::Null => None,
            Value::Bool(_) => Some(self.builtin(TypeKind::Bool)),
            Value::Int8(_) => Some(self.builtin(TypeKind::Int8)),
            Value::Int16(_) => Some(self.builtin(TypeKind::Int16)),
            Value::Int32(_) => Some(self.builtin(TypeKind::Int32)),
            Value::Int64(_) => Some(self.builtin(TypeKind::Int64)),
            Value::Float32(_) => Some(self.builtin(TypeKind::Float32)),
            Value::Float64(_) => Some(self.builtin(TypeKind::Float64)),
            Value::Str(_) => Some(self.builtin(TypeKind::String)),
            Value::List(_) => Some(self.builtin(TypeKind::List)),
            Value::Record(record) => Some(record.borrow().type_token),
            Value::Enum(ev) => Some(ev.type_token),
        }
    }

    /// The token a declared type pins the slot to, or `None` for dynamic
    /// slots.
    pub(crate) fn token_for_declared(&self, declared: &DeclaredType) -> Option<TypeToken> {
        match declared {
            DeclaredType::Dynamic => None,
            DeclaredType::Token(token) => Some(*token),
            DeclaredType::ListOf(_) => Some(self.builtin(TypeKind::List)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_preregistered() {
        let registry = TypeRegistry::new();
        let token = registry.builtin(TypeKind::String);
        let reg = registry.get(token).unwrap();
        assert_eq!(reg.kind(), TypeKind::String);
        assert_eq!(reg.wire_composite(), u32::from(TypeKind::String.wire()));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut registry = TypeRegistry::new();
        registry.register_record(7, vec![]).unwrap();
        assert_eq!(
            registry.register_enum(7, vec!["a".into()]),
            Err(RegistryError::DuplicateTypeId(7))
        );
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut registry = TypeRegistry::new();
        registry.register_record_named("demo", "point", vec![]).unwrap();
        assert!(matches!(
            registry.register_enum_named("demo", "point", vec![]),
            Err(RegistryError::DuplicateTypeName { .. })
        ));
    }

    #[test]
    fn wire_composite_packs_id_and_kind() {
        let mut registry = TypeRegistry::new();
        let token = registry.register_record(3, vec![]).unwrap();
        let reg = registry.get(token).unwrap();
        assert_eq!(reg.wire_composite(), 3 << 8 | u32::from(TypeKind::Record.wire()));
    }

    #[test]
    fn resolve_wire_checks_kind() {
        let mut registry = TypeRegistry::new();
        registry.register_enum(9, vec!["on".into(), "off".into()]).unwrap();
        assert!(registry.resolve_wire(TypeKind::Enum, 9).is_ok());
        assert_eq!(
            registry.resolve_wire(TypeKind::Record, 9),
            Err(DecodeError::TypeKindMismatch {
                kind: TypeKind::Record,
                registered: TypeKind::Enum,
                user_id: 9,
            })
        );
    }

    #[test]
    fn oversized_id_is_rejected() {
        let mut registry = TypeRegistry::new();
        assert_eq!(
            registry.register_record(MAX_TYPE_ID + 1, vec![]),
            Err(RegistryError::TypeIdTooLarge(MAX_TYPE_ID + 1))
        );
    }
}
