// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The read engine.
//!
//! [`GraphReader`] mirrors the write engine slot for slot: reference flag,
//! optional type meta, then a body — with the stub-then-fill protocol that
//! makes cycles safe. A `RefValue` slot's stub is created from the minimum
//! header (a list's count, a record's schema arity), registered in the
//! reference table, and only then filled, so a nested value can
//! back-reference an ancestor whose fields are still arriving.
//!
//! Every read unit is cached once consumed: a suspended read never
//! re-reads bytes, and the caller never re-presents consumed input.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::trace;
use weft_wire::ReadCursor;

use crate::config::Config;
use crate::error::DecodeError;
use crate::flags::{CollectionFlags, RefFlag, StringEncoding};
use crate::progress::{BoxSlot, InstancePhase, Progress};
use crate::registry::{DeclaredType, TypeKind, TypeRegistry, TypeToken};
use crate::resolver::ReadRefResolver;
use crate::ser::{element_mode, SlotMode};
use crate::typemeta::{MetaStringReadTable, TypeMetaReader};
use crate::value::{ListValue, Value};

/// Upper bound on speculative pre-allocation from a wire-declared count; a
/// hostile count cannot reserve more than this before elements actually
/// arrive.
const MAX_PREALLOC: usize = 4096;

/// Shared mutable state one read chain threads through its slots.
pub(crate) struct ReadCtx<'a> {
    pub(crate) registry: &'a TypeRegistry,
    pub(crate) config: Config,
    pub(crate) resolver: &'a mut ReadRefResolver,
    pub(crate) meta_strings: &'a mut MetaStringReadTable,
}

/// Resumable reader for one whole object graph.
///
/// Obtain via [`crate::Weft::reader`]. Feed successive cursors to
/// [`GraphReader::read_chunk`] until it reports [`Progress::Done`], never
/// re-presenting consumed bytes, then take the value with
/// [`GraphReader::into_value`].
pub struct GraphReader<'r> {
    registry: &'r TypeRegistry,
    config: Config,
    resolver: ReadRefResolver,
    meta_strings: MetaStringReadTable,
    root: SlotDecoder,
    finished: bool,
}

impl<'r> GraphReader<'r> {
    pub(crate) fn new(registry: &'r TypeRegistry, config: Config, declared: DeclaredType) -> Self {
        Self {
            registry,
            config,
            resolver: ReadRefResolver::new(),
            meta_strings: MetaStringReadTable::default(),
            root: SlotDecoder::new(declared, SlotMode::Full),
            finished: false,
        }
    }

    /// Advances the decoding as far as `cur`'s bytes allow.
    ///
    /// Returns [`Progress::Pending`] when more input is needed; call again
    /// with a cursor beginning at the first unconsumed byte. Calling again
    /// after `Done` is a no-op.
    pub fn read_chunk(&mut self, cur: &mut ReadCursor<'_>) -> Result<Progress, DecodeError> {
        if self.finished {
            return Ok(Progress::Done);
        }
        let mut ctx = ReadCtx {
            registry: self.registry,
            config: self.config,
            resolver: &mut self.resolver,
            meta_strings: &mut self.meta_strings,
        };
        let progress = self.root.read(cur, &mut ctx)?;
        if progress.is_done() {
            trace!(bytes = cur.consumed(), "graph decoding complete");
            self.finished = true;
        }
        Ok(progress)
    }

    /// Whether the whole graph has been decoded.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Takes the decoded value; `None` until the reader finishes.
    pub fn into_value(mut self) -> Option<Value> {
        if self.finished {
            Some(self.root.take_value())
        } else {
            None
        }
    }
}

/// State machine for one slot (the root, a record field, or a collection
/// element).
pub(crate) struct SlotDecoder {
    declared: DeclaredType,
    mode: SlotMode,
    flag: Option<RefFlag>,
    ref_id: Option<u32>,
    token: Option<TypeToken>,
    type_meta: TypeMetaReader,
    phase: InstancePhase,
    body: Option<BodyDecoder>,
    out: BoxSlot<Value>,
}

impl SlotDecoder {
    pub(crate) fn new(declared: DeclaredType, mode: SlotMode) -> Self {
        Self {
            declared,
            mode,
            flag: None,
            ref_id: None,
            token: None,
            type_meta: TypeMetaReader::default(),
            phase: InstancePhase::NotCreated,
            body: None,
            out: BoxSlot::new(),
        }
    }

    /// Clears per-value progress so the decoder can take the next value of
    /// the same declared slot shape.
    pub(crate) fn reset(&mut self) {
        self.flag = None;
        self.ref_id = None;
        self.token = None;
        self.type_meta.reset();
        self.phase = InstancePhase::NotCreated;
        self.body = None;
        self.out = BoxSlot::new();
    }

    /// Moves the completed value out.
    pub(crate) fn take_value(&mut self) -> Value {
        self.out.take().unwrap_or(Value::Null)
    }

    pub(crate) fn read(
        &mut self,
        cur: &mut ReadCursor<'_>,
        ctx: &mut ReadCtx<'_>,
    ) -> Result<Progress, DecodeError> {
        debug_assert!(
            self.phase != InstancePhase::Completed,
            "slot decoder reused without reset"
        );

        let flag = match self.mode {
            // The header ruled out nulls and tracking: no flag on the wire.
            SlotMode::Bare => RefFlag::NotNullValue,
            _ => match self.flag {
                Some(f) => f,
                None => {
                    let Some(byte) = cur.try_read_i8() else {
                        return Ok(Progress::Pending);
                    };
                    let f = RefFlag::from_wire(byte).ok_or(DecodeError::BadRefFlag(byte))?;
                    if self.mode == SlotMode::NullOnly
                        && matches!(f, RefFlag::Ref | RefFlag::RefValue)
                    {
                        return Err(DecodeError::UnexpectedRefFlag(f));
                    }
                    self.flag = Some(f);
                    f
                }
            },
        };

        match flag {
            RefFlag::Null => {
                self.out.fill(Value::Null);
                self.phase = InstancePhase::Completed;
                return Ok(Progress::Done);
            }
            RefFlag::Ref => {
                let id = match self.ref_id {
                    Some(id) => id,
                    None => {
                        let Some(id) = cur.try_read_varint32()? else {
                            return Ok(Progress::Pending);
                        };
                        self.ref_id = Some(id);
                        id
                    }
                };
                self.out.fill(ctx.resolver.get(id)?);
                self.phase = InstancePhase::Completed;
                return Ok(Progress::Done);
            }
            RefFlag::NotNullValue | RefFlag::RefValue => {}
        }

        // Resolve the slot's runtime type: pinned by the declaration, or
        // carried as type meta for dynamic slots.
        let token = match self.token {
            Some(t) => t,
            None => {
                let t = match ctx.registry.token_for_declared(&self.declared) {
                    Some(t) => t,
                    None => {
                        let Some(t) =
                            self.type_meta.read(cur, ctx.registry, ctx.meta_strings)?
                        else {
                            return Ok(Progress::Pending);
                        };
                        t
                    }
                };
                self.token = Some(t);
                t
            }
        };

        if self.phase == InstancePhase::NotCreated {
            if self.body.is_none() {
                let reg = ctx.registry.get(token).ok_or(DecodeError::InvalidToken)?;
                self.body = Some(BodyDecoder::new(reg.kind(), &self.declared));
            }
            let Some(body) = self.body.as_mut() else {
                debug_assert!(false, "body decoder just installed");
                return Ok(Progress::Pending);
            };
            let Some(created) = body.create(cur, ctx, token)? else {
                return Ok(Progress::Pending);
            };
            // Register the stub before anything nested decodes; a cycle
            // back to this value dereferences the identity slot only.
            if flag == RefFlag::RefValue {
                ctx.resolver.push(created.clone());
            }
            self.out.fill(created);
            self.phase = InstancePhase::Created;
        }

        if self.phase == InstancePhase::Created {
            let stub = match self.out.get() {
                Some(v) => v.clone(),
                None => {
                    debug_assert!(false, "created phase with a vacant box");
                    return Ok(Progress::Pending);
                }
            };
            let Some(body) = self.body.as_mut() else {
                debug_assert!(false, "created phase without a body decoder");
                return Ok(Progress::Pending);
            };
            if body.fill(cur, &stub, ctx)?.is_pending() {
                return Ok(Progress::Pending);
            }
            self.phase = InstancePhase::Completed;
        }
        Ok(Progress::Done)
    }
}

/// Closed set of body readers, selected once per value from the resolved
/// type.
enum BodyDecoder {
    Prim(TypeKind),
    Str(StrReader),
    List(Box<ListReader>),
    Record(Box<RecordReader>),
    Enum,
}

impl BodyDecoder {
    fn new(kind: TypeKind, declared: &DeclaredType) -> Self {
        match kind {
            TypeKind::String => Self::Str(StrReader::default()),
            TypeKind::Enum | TypeKind::NamedEnum => Self::Enum,
            TypeKind::List => {
                let elem_declared = match declared {
                    DeclaredType::ListOf(inner) => (**inner).clone(),
                    _ => DeclaredType::Dynamic,
                };
                Self::List(Box::new(ListReader::new(elem_declared)))
            }
            TypeKind::Record | TypeKind::NamedRecord => {
                Self::Record(Box::new(RecordReader::default()))
            }
            _ => Self::Prim(kind),
        }
    }

    /// Reads the minimum header and produces the stub (for primitives,
    /// strings, and enums: the completed value). `None` means insufficient
    /// input — retry, nothing half-consumed.
    fn create(
        &mut self,
        cur: &mut ReadCursor<'_>,
        ctx: &mut ReadCtx<'_>,
        token: TypeToken,
    ) -> Result<Option<Value>, DecodeError> {
        match self {
            Self::Prim(kind) => Ok(read_primitive(cur, *kind)),
            Self::Str(r) => r.create(cur, ctx),
            Self::List(r) => r.create(cur),
            Self::Record(r) => r.create(ctx, token),
            Self::Enum => read_enum(cur, ctx, token),
        }
    }

    /// Continues populating the stub from wherever the last call left off.
    fn fill(
        &mut self,
        cur: &mut ReadCursor<'_>,
        stub: &Value,
        ctx: &mut ReadCtx<'_>,
    ) -> Result<Progress, DecodeError> {
        match self {
            Self::Prim(_) | Self::Str(_) | Self::Enum => Ok(Progress::Done),
            Self::List(r) => r.fill(cur, stub, ctx),
            Self::Record(r) => r.fill(cur, stub, ctx),
        }
    }
}

/// Primitives are single fixed-width units: read whole or not at all.
fn read_primitive(cur: &mut ReadCursor<'_>, kind: TypeKind) -> Option<Value> {
    match kind {
        TypeKind::Bool => cur.try_read_u8().map(|b| Value::Bool(b != 0)),
        TypeKind::Int8 => cur.try_read_i8().map(Value::Int8),
        TypeKind::Int16 => cur.try_read_i16().map(Value::Int16),
        TypeKind::Int32 => cur.try_read_i32().map(Value::Int32),
        TypeKind::Int64 => cur.try_read_i64().map(Value::Int64),
        TypeKind::Float32 => cur.try_read_f32().map(Value::Float32),
        TypeKind::Float64 => cur.try_read_f64().map(Value::Float64),
        _ => {
            debug_assert!(false, "primitive body reader fed a non-primitive kind");
            None
        }
    }
}

/// Enum bodies are one atomic ordinal varint, validated against the
/// registered arity.
fn read_enum(
    cur: &mut ReadCursor<'_>,
    ctx: &mut ReadCtx<'_>,
    token: TypeToken,
) -> Result<Option<Value>, DecodeError> {
    let Some(ordinal) = cur.try_read_varint32()? else {
        return Ok(None);
    };
    let reg = ctx.registry.get(token).ok_or(DecodeError::InvalidToken)?;
    let schema = reg.enum_schema().ok_or(DecodeError::InvalidToken)?;
    if ordinal as usize >= schema.variants.len() {
        return Err(DecodeError::OrdinalOutOfRange {
            ordinal,
            variants: schema.variants.len(),
        });
    }
    Ok(Some(Value::enum_const(token, ordinal)))
}

/// Resumable string body reader. The whole string is produced by `create`;
/// strings have no children, so registering them on completion preserves
/// the write-side id order.
#[derive(Default)]
struct StrReader {
    header: Option<(StringEncoding, usize)>,
    utf16_len_read: bool,
    buf: Vec<u8>,
}

impl StrReader {
    fn create(
        &mut self,
        cur: &mut ReadCursor<'_>,
        ctx: &mut ReadCtx<'_>,
    ) -> Result<Option<Value>, DecodeError> {
        let (encoding, byte_len) = match self.header {
            Some(h) => h,
            None => {
                let Some(header) = cur.try_read_varint64()? else {
                    return Ok(None);
                };
                let enc_bits = (header & StringEncoding::MASK) as u8;
                let encoding = StringEncoding::from_wire(enc_bits)
                    .ok_or(DecodeError::BadStringEncoding(enc_bits))?;
                let len = header >> StringEncoding::BITS;
                let byte_len =
                    usize::try_from(len).map_err(|_| DecodeError::CountOverflow(len))?;
                self.header = Some((encoding, byte_len));
                (encoding, byte_len)
            }
        };

        // The redundant UTF-16 byte count travels only under matching
        // config; it is read and discarded.
        if ctx.config.write_utf16_byte_count
            && encoding == StringEncoding::Utf8
            && !self.utf16_len_read
        {
            if cur.try_read_varint64()?.is_none() {
                return Ok(None);
            }
            self.utf16_len_read = true;
        }

        while self.buf.len() < byte_len {
            let chunk = cur.read_raw_slice(byte_len - self.buf.len());
            if chunk.is_empty() {
                return Ok(None);
            }
            self.buf.extend_from_slice(chunk);
        }

        let text = decode_string(&self.buf, encoding)?;
        Ok(Some(Value::Str(Rc::from(text.as_str()))))
    }
}

fn decode_string(bytes: &[u8], encoding: StringEncoding) -> Result<String, DecodeError> {
    match encoding {
        StringEncoding::Latin1 => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
        StringEncoding::Utf8 => std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| DecodeError::CorruptString),
        StringEncoding::Utf16 => {
            if bytes.len() % 2 != 0 {
                return Err(DecodeError::CorruptString);
            }
            let units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16(&units).map_err(|_| DecodeError::CorruptString)
        }
    }
}

/// Resumable list body reader: count at create time (stub registered with
/// the right capacity before any element decodes), then flags, optional
/// shared element type meta, and elements. The element index cursor is the
/// stub's own length.
struct ListReader {
    elem_declared: DeclaredType,
    count: Option<usize>,
    flags: Option<CollectionFlags>,
    shared_meta: TypeMetaReader,
    shared: Option<TypeToken>,
    layout: Option<(DeclaredType, SlotMode)>,
    elem: Option<SlotDecoder>,
}

impl ListReader {
    fn new(elem_declared: DeclaredType) -> Self {
        Self {
            elem_declared,
            count: None,
            flags: None,
            shared_meta: TypeMetaReader::default(),
            shared: None,
            layout: None,
            elem: None,
        }
    }

    fn create(&mut self, cur: &mut ReadCursor<'_>) -> Result<Option<Value>, DecodeError> {
        let count = match self.count {
            Some(c) => c,
            None => {
                let Some(raw) = cur.try_read_varint64()? else {
                    return Ok(None);
                };
                let count =
                    usize::try_from(raw).map_err(|_| DecodeError::CountOverflow(raw))?;
                self.count = Some(count);
                count
            }
        };
        Ok(Some(Value::List(Rc::new(RefCell::new(ListValue {
            items: Vec::with_capacity(count.min(MAX_PREALLOC)),
        })))))
    }

    fn fill(
        &mut self,
        cur: &mut ReadCursor<'_>,
        stub: &Value,
        ctx: &mut ReadCtx<'_>,
    ) -> Result<Progress, DecodeError> {
        let Value::List(rc) = stub else {
            debug_assert!(false, "list body reader fed a non-list stub");
            return Ok(Progress::Done);
        };

        let flags = match self.flags {
            Some(f) => f,
            None => {
                let Some(byte) = cur.try_read_u8() else {
                    return Ok(Progress::Pending);
                };
                let f = CollectionFlags::from_bits(byte);
                if f.has_unknown_bits() {
                    return Err(DecodeError::UnknownCollectionFlags(byte));
                }
                self.flags = Some(f);
                f
            }
        };

        if flags.not_decl_element_type() && !flags.not_same_type() && self.shared.is_none() {
            let Some(token) = self.shared_meta.read(cur, ctx.registry, ctx.meta_strings)? else {
                return Ok(Progress::Pending);
            };
            self.shared = Some(token);
        }

        if self.layout.is_none() {
            let elem_effective = if flags.not_same_type() {
                DeclaredType::Dynamic
            } else if let Some(token) = self.shared {
                DeclaredType::Token(token)
            } else {
                self.elem_declared.clone()
            };
            let mode = element_mode(flags, &elem_effective, ctx.registry);
            self.layout = Some((elem_effective, mode));
        }

        let count = self.count.unwrap_or(0);
        loop {
            let filled = rc.borrow().items.len();
            if filled >= count {
                break;
            }
            if self.elem.is_none() {
                let Some((declared, mode)) = self.layout.clone() else {
                    debug_assert!(false, "element layout just installed");
                    return Ok(Progress::Pending);
                };
                self.elem = Some(SlotDecoder::new(declared, mode));
            }
            let Some(child) = self.elem.as_mut() else {
                debug_assert!(false, "element decoder just installed");
                return Ok(Progress::Pending);
            };
            if child.read(cur, ctx)?.is_pending() {
                return Ok(Progress::Pending);
            }
            let item = child.take_value();
            child.reset();
            rc.borrow_mut().items.push(item);
        }
        Ok(Progress::Done)
    }
}

/// Resumable record body reader: the stub exists immediately (arity comes
/// from the schema, not the wire), fields fill in schema order.
#[derive(Default)]
struct RecordReader {
    index: usize,
    field: Option<SlotDecoder>,
}

impl RecordReader {
    fn create(
        &mut self,
        ctx: &mut ReadCtx<'_>,
        token: TypeToken,
    ) -> Result<Option<Value>, DecodeError> {
        let reg = ctx.registry.get(token).ok_or(DecodeError::InvalidToken)?;
        let schema = reg.record_schema().ok_or(DecodeError::InvalidToken)?;
        let fields = vec![Value::Null; schema.fields.len()];
        Ok(Some(Value::record(token, fields)))
    }

    fn fill(
        &mut self,
        cur: &mut ReadCursor<'_>,
        stub: &Value,
        ctx: &mut ReadCtx<'_>,
    ) -> Result<Progress, DecodeError> {
        let Value::Record(rc) = stub else {
            debug_assert!(false, "record body reader fed a non-record stub");
            return Ok(Progress::Done);
        };
        let token = rc.borrow().type_token;
        let reg = ctx.registry.get(token).ok_or(DecodeError::InvalidToken)?;
        let schema = reg.record_schema().ok_or(DecodeError::InvalidToken)?;

        while self.index < schema.fields.len() {
            if self.field.is_none() {
                self.field = Some(SlotDecoder::new(
                    schema.fields[self.index].declared.clone(),
                    SlotMode::Full,
                ));
            }
            let Some(child) = self.field.as_mut() else {
                debug_assert!(false, "field decoder just installed");
                return Ok(Progress::Pending);
            };
            if child.read(cur, ctx)?.is_pending() {
                return Ok(Progress::Pending);
            }
            let value = child.take_value();
            // Each field declares its own type: drop the decoder rather
            // than reset it.
            self.field = None;
            rc.borrow_mut().fields[self.index] = value;
            self.index += 1;
        }
        Ok(Progress::Done)
    }
}
