// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The write engine.
//!
//! [`GraphWriter`] drives one value graph into successive
//! [`WriteCursor`]s. Every slot goes through the same state machine:
//!
//! ```text
//! [ref flag][ref id?]            reference protocol (per slot mode)
//! [type meta?]                   only for dynamically declared slots
//! [body]                         primitive / string / list / record / enum
//! ```
//!
//! Each multi-unit writer caches everything it computes (reference
//! sighting, string encoding choice, collection flags) before emitting its
//! first byte, so a write suspended mid-value replays byte-identical output
//! on resumption — no byte is ever written twice or skipped, and the
//! statistics pass over a collection runs at most once.

use tracing::trace;
use weft_wire::WriteCursor;

use crate::config::{Config, RefTrackingPolicy};
use crate::error::EncodeError;
use crate::flags::{CollectionFlags, RefFlag, StringEncoding};
use crate::progress::Progress;
use crate::registry::{DeclaredType, TypeRegistry, TypeToken};
use crate::resolver::{WriteRefResolver, WriteSighting};
use crate::typemeta::{MetaStringWriteTable, TypeMetaWriter};
use crate::value::{ObjKey, Value};

/// How much reference protocol a slot carries. Decided by the enclosing
/// container (collection header flags) and identical on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SlotMode {
    /// Full reference flag set (`Null`/`Ref`/`NotNullValue`/`RefValue`).
    Full,
    /// Only a null marker (`Null`/`NotNullValue`); the header ruled out
    /// tracking.
    NullOnly,
    /// No flag at all; the header ruled out nulls and tracking.
    Bare,
}

/// Shared mutable state one write chain threads through its slots.
pub(crate) struct WriteCtx<'a> {
    pub(crate) registry: &'a TypeRegistry,
    pub(crate) config: Config,
    pub(crate) resolver: &'a mut WriteRefResolver,
    pub(crate) meta_strings: &'a mut MetaStringWriteTable,
}

/// Resumable writer for one whole object graph.
///
/// Obtain via [`crate::Weft::writer`]. Call
/// [`GraphWriter::write_chunk`] with successive cursors until it reports
/// [`Progress::Done`]; the encoding never depends on how the output was
/// chunked.
pub struct GraphWriter<'w> {
    registry: &'w TypeRegistry,
    config: Config,
    resolver: WriteRefResolver,
    meta_strings: MetaStringWriteTable,
    value: Value,
    root: SlotEncoder,
    finished: bool,
}

impl<'w> GraphWriter<'w> {
    pub(crate) fn new(
        registry: &'w TypeRegistry,
        config: Config,
        declared: DeclaredType,
        value: Value,
    ) -> Self {
        Self {
            registry,
            config,
            resolver: WriteRefResolver::new(config.ref_tracking),
            meta_strings: MetaStringWriteTable::default(),
            value,
            root: SlotEncoder::new(declared, SlotMode::Full),
            finished: false,
        }
    }

    /// Advances the encoding as far as `cur`'s budget allows.
    ///
    /// Returns [`Progress::Pending`] when the cursor ran out of room; call
    /// again with a fresh cursor. Calling again after `Done` is a no-op.
    pub fn write_chunk(&mut self, cur: &mut WriteCursor<'_>) -> Result<Progress, EncodeError> {
        if self.finished {
            return Ok(Progress::Done);
        }
        let mut ctx = WriteCtx {
            registry: self.registry,
            config: self.config,
            resolver: &mut self.resolver,
            meta_strings: &mut self.meta_strings,
        };
        let progress = self.root.write(cur, &self.value, &mut ctx)?;
        if progress.is_done() {
            trace!(bytes = cur.written(), "graph encoding complete");
            self.finished = true;
        }
        Ok(progress)
    }

    /// Whether the whole graph has been emitted.
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

/// What to tell the resolver when this slot's body finishes.
#[derive(Debug, Clone, Copy)]
enum CompletionNote {
    None,
    /// The slot went through the full sighting protocol.
    Sighted(ObjKey),
    /// The slot only held a cycle guard (no id, no flag semantics).
    Guarded(ObjKey),
}

/// Cached outcome of a slot's reference decision. Computed exactly once per
/// slot — the resolver mutates on sighting, and retries must replay the
/// same flag and id.
#[derive(Debug, Clone, Copy)]
struct SlotDecision {
    flag: Option<RefFlag>,
    ref_id: Option<u32>,
    completion: CompletionNote,
    needs_body: bool,
}

/// State machine for one slot (the root, a record field, or a collection
/// element).
pub(crate) struct SlotEncoder {
    declared: DeclaredType,
    mode: SlotMode,
    decision: Option<SlotDecision>,
    wrote_flag: bool,
    wrote_ref_id: bool,
    type_meta: TypeMetaWriter,
    type_meta_done: bool,
    body: Option<BodyEncoder>,
    finished: bool,
}

impl SlotEncoder {
    pub(crate) fn new(declared: DeclaredType, mode: SlotMode) -> Self {
        Self {
            declared,
            mode,
            decision: None,
            wrote_flag: false,
            wrote_ref_id: false,
            type_meta: TypeMetaWriter::default(),
            type_meta_done: false,
            body: None,
            finished: false,
        }
    }

    /// Clears per-value progress so the encoder can take the next value of
    /// the same declared slot shape.
    pub(crate) fn reset(&mut self) {
        self.decision = None;
        self.wrote_flag = false;
        self.wrote_ref_id = false;
        self.type_meta.reset();
        self.type_meta_done = false;
        self.body = None;
        self.finished = false;
    }

    pub(crate) fn write(
        &mut self,
        cur: &mut WriteCursor<'_>,
        value: &Value,
        ctx: &mut WriteCtx<'_>,
    ) -> Result<Progress, EncodeError> {
        debug_assert!(!self.finished, "slot encoder reused without reset");

        let decision = match self.decision {
            Some(d) => d,
            None => {
                let d = Self::decide(self.mode, value, ctx)?;
                self.decision = Some(d);
                d
            }
        };

        if let Some(flag) = decision.flag {
            if !self.wrote_flag {
                if !cur.try_write_i8(flag.wire()) {
                    return Ok(Progress::Pending);
                }
                self.wrote_flag = true;
            }
            if flag == RefFlag::Ref {
                if !self.wrote_ref_id {
                    let id = decision.ref_id.unwrap_or_default();
                    if !cur.try_write_varint32(id) {
                        return Ok(Progress::Pending);
                    }
                    self.wrote_ref_id = true;
                }
                self.finished = true;
                return Ok(Progress::Done);
            }
        }
        if !decision.needs_body {
            self.finished = true;
            return Ok(Progress::Done);
        }

        // Body path: type meta first when the slot is dynamically declared.
        let runtime = match ctx.registry.runtime_token(value) {
            Some(token) => token,
            None => {
                return Err(EncodeError::DeclaredTypeMismatch {
                    expected: "non-null value",
                    found: "null",
                })
            }
        };
        match ctx.registry.token_for_declared(&self.declared) {
            Some(expected) => {
                if expected != runtime {
                    return Err(declared_mismatch(ctx.registry, expected, value));
                }
            }
            None => {
                if !self.type_meta_done {
                    let reg = ctx.registry.get(runtime).ok_or(EncodeError::InvalidToken)?;
                    if self.type_meta.write(cur, reg, ctx.meta_strings)?.is_pending() {
                        return Ok(Progress::Pending);
                    }
                    self.type_meta_done = true;
                }
            }
        }

        if self.body.is_none() {
            self.body = Some(BodyEncoder::new(value, &self.declared)?);
        }
        let Some(body) = self.body.as_mut() else {
            debug_assert!(false, "body encoder just installed");
            return Ok(Progress::Pending);
        };
        if body.write(cur, value, ctx)?.is_pending() {
            return Ok(Progress::Pending);
        }
        match decision.completion {
            CompletionNote::None => {}
            CompletionNote::Sighted(key) => ctx.resolver.complete(key),
            CompletionNote::Guarded(key) => ctx.resolver.leave_untracked(key),
        }
        self.finished = true;
        Ok(Progress::Done)
    }

    fn decide(
        mode: SlotMode,
        value: &Value,
        ctx: &mut WriteCtx<'_>,
    ) -> Result<SlotDecision, EncodeError> {
        let is_null = matches!(value, Value::Null);
        match mode {
            SlotMode::Bare => {
                // The collection statistics pass already ruled out nulls.
                debug_assert!(!is_null, "null element in a bare slot");
                Ok(SlotDecision {
                    flag: None,
                    ref_id: None,
                    completion: CompletionNote::None,
                    needs_body: true,
                })
            }
            SlotMode::NullOnly => {
                if is_null {
                    return Ok(SlotDecision {
                        flag: Some(RefFlag::Null),
                        ref_id: None,
                        completion: CompletionNote::None,
                        needs_body: false,
                    });
                }
                // No ids travel through this slot, but a referenceable
                // value still needs the cycle guard: the wire format has
                // no way to express a back-reference here.
                let completion = match value.identity() {
                    Some(key) => {
                        ctx.resolver.enter_untracked(key)?;
                        CompletionNote::Guarded(key)
                    }
                    None => CompletionNote::None,
                };
                Ok(SlotDecision {
                    flag: Some(RefFlag::NotNullValue),
                    ref_id: None,
                    completion,
                    needs_body: true,
                })
            }
            SlotMode::Full => {
                if is_null {
                    return Ok(SlotDecision {
                        flag: Some(RefFlag::Null),
                        ref_id: None,
                        completion: CompletionNote::None,
                        needs_body: false,
                    });
                }
                let Some(key) = value.identity() else {
                    // Inline values are never tracked.
                    return Ok(SlotDecision {
                        flag: Some(RefFlag::NotNullValue),
                        ref_id: None,
                        completion: CompletionNote::None,
                        needs_body: true,
                    });
                };
                match ctx.resolver.sight(key)? {
                    WriteSighting::New { .. } => Ok(SlotDecision {
                        flag: Some(RefFlag::RefValue),
                        ref_id: None,
                        completion: CompletionNote::Sighted(key),
                        needs_body: true,
                    }),
                    WriteSighting::Seen { id } => Ok(SlotDecision {
                        flag: Some(RefFlag::Ref),
                        ref_id: Some(id),
                        completion: CompletionNote::None,
                        needs_body: false,
                    }),
                    WriteSighting::Untracked => Ok(SlotDecision {
                        flag: Some(RefFlag::NotNullValue),
                        ref_id: None,
                        completion: CompletionNote::Sighted(key),
                        needs_body: true,
                    }),
                }
            }
        }
    }
}

fn declared_mismatch(
    registry: &TypeRegistry,
    expected: TypeToken,
    value: &Value,
) -> EncodeError {
    EncodeError::DeclaredTypeMismatch {
        expected: registry.get(expected).map_or("unknown", |r| r.kind().name()),
        found: value.kind_name(),
    }
}

/// Closed set of body writers, selected once per value.
enum BodyEncoder {
    Prim,
    Str(StrWriter),
    List(Box<ListWriter>),
    Record(Box<RecordWriter>),
    Enum(EnumWriter),
}

impl BodyEncoder {
    fn new(value: &Value, declared: &DeclaredType) -> Result<Self, EncodeError> {
        Ok(match value {
            Value::Null => {
                return Err(EncodeError::DeclaredTypeMismatch {
                    expected: "non-null value",
                    found: "null",
                })
            }
            Value::Bool(_)
            | Value::Int8(_)
            | Value::Int16(_)
            | Value::Int32(_)
            | Value::Int64(_)
            | Value::Float32(_)
            | Value::Float64(_) => Self::Prim,
            Value::Str(_) => Self::Str(StrWriter::default()),
            Value::Enum(_) => Self::Enum(EnumWriter::default()),
            Value::List(_) => {
                let elem_declared = match declared {
                    DeclaredType::ListOf(inner) => (**inner).clone(),
                    _ => DeclaredType::Dynamic,
                };
                Self::List(Box::new(ListWriter::new(elem_declared)))
            }
            Value::Record(_) => Self::Record(Box::new(RecordWriter::default())),
        })
    }

    fn write(
        &mut self,
        cur: &mut WriteCursor<'_>,
        value: &Value,
        ctx: &mut WriteCtx<'_>,
    ) -> Result<Progress, EncodeError> {
        match self {
            Self::Prim => Ok(write_primitive(cur, value)),
            Self::Str(w) => w.write(cur, value, ctx),
            Self::List(w) => w.write(cur, value, ctx),
            Self::Record(w) => w.write(cur, value, ctx),
            Self::Enum(w) => w.write(cur, value, ctx),
        }
    }
}

/// Primitives are single fixed-width little-endian units: written whole or
/// not at all, so they carry no progress state.
fn write_primitive(cur: &mut WriteCursor<'_>, value: &Value) -> Progress {
    let fits = match value {
        Value::Bool(v) => cur.try_write_u8(u8::from(*v)),
        Value::Int8(v) => cur.try_write_i8(*v),
        Value::Int16(v) => cur.try_write_i16(*v),
        Value::Int32(v) => cur.try_write_i32(*v),
        Value::Int64(v) => cur.try_write_i64(*v),
        Value::Float32(v) => cur.try_write_f32(*v),
        Value::Float64(v) => cur.try_write_f64(*v),
        _ => {
            debug_assert!(false, "primitive body writer fed a non-primitive");
            true
        }
    };
    if fits {
        Progress::Done
    } else {
        Progress::Pending
    }
}

/// Cached encoding plan for one string; computed before the first header
/// byte goes out.
struct StrPlan {
    encoding: StringEncoding,
    bytes: Vec<u8>,
    utf16_len: Option<u64>,
}

/// Resumable string body writer: atomic header, optional atomic UTF-16
/// count, freely-resumable payload bytes.
#[derive(Default)]
struct StrWriter {
    plan: Option<StrPlan>,
    wrote_header: bool,
    wrote_utf16_len: bool,
    bytes_written: usize,
}

impl StrWriter {
    fn write(
        &mut self,
        cur: &mut WriteCursor<'_>,
        value: &Value,
        ctx: &mut WriteCtx<'_>,
    ) -> Result<Progress, EncodeError> {
        let Value::Str(text) = value else {
            return Err(EncodeError::DeclaredTypeMismatch {
                expected: "string",
                found: value.kind_name(),
            });
        };

        if self.plan.is_none() {
            let latin1 = text.chars().all(|c| (c as u32) < 0x100);
            let (encoding, bytes) = if latin1 {
                (
                    StringEncoding::Latin1,
                    text.chars().map(|c| c as u8).collect::<Vec<u8>>(),
                )
            } else {
                (StringEncoding::Utf8, text.as_bytes().to_vec())
            };
            let utf16_len = (ctx.config.write_utf16_byte_count
                && encoding == StringEncoding::Utf8)
                .then(|| text.encode_utf16().count() as u64 * 2);
            self.plan = Some(StrPlan { encoding, bytes, utf16_len });
        }
        let Some(plan) = self.plan.as_ref() else {
            return Ok(Progress::Pending);
        };

        if !self.wrote_header {
            let header = (plan.bytes.len() as u64) << StringEncoding::BITS
                | u64::from(plan.encoding as u8);
            if !cur.try_write_varint64(header) {
                return Ok(Progress::Pending);
            }
            self.wrote_header = true;
        }
        if !self.wrote_utf16_len {
            if let Some(utf16_len) = plan.utf16_len {
                if !cur.try_write_varint64(utf16_len) {
                    return Ok(Progress::Pending);
                }
            }
            self.wrote_utf16_len = true;
        }
        while self.bytes_written < plan.bytes.len() {
            let n = cur.write_raw(&plan.bytes[self.bytes_written..]);
            if n == 0 {
                return Ok(Progress::Pending);
            }
            self.bytes_written += n;
        }
        Ok(Progress::Done)
    }
}

/// Cached per-collection plan: header flags, the shared element type (when
/// one exists), and the element slot layout both sides derive from them.
struct ListPlan {
    flags: CollectionFlags,
    shared: Option<TypeToken>,
    elem_declared: DeclaredType,
    elem_mode: SlotMode,
}

/// Resumable list body writer: atomic count, atomic flags byte (one cached
/// statistics pass), optional shared element type meta, then elements with
/// an index cursor.
struct ListWriter {
    elem_declared: DeclaredType,
    wrote_count: bool,
    plan: Option<ListPlan>,
    wrote_flags: bool,
    shared_meta: TypeMetaWriter,
    shared_meta_done: bool,
    index: usize,
    elem: Option<SlotEncoder>,
}

impl ListWriter {
    fn new(elem_declared: DeclaredType) -> Self {
        Self {
            elem_declared,
            wrote_count: false,
            plan: None,
            wrote_flags: false,
            shared_meta: TypeMetaWriter::default(),
            shared_meta_done: false,
            index: 0,
            elem: None,
        }
    }

    fn write(
        &mut self,
        cur: &mut WriteCursor<'_>,
        value: &Value,
        ctx: &mut WriteCtx<'_>,
    ) -> Result<Progress, EncodeError> {
        let Value::List(rc) = value else {
            return Err(EncodeError::DeclaredTypeMismatch {
                expected: "list",
                found: value.kind_name(),
            });
        };
        let list = rc.borrow();

        if !self.wrote_count {
            if !cur.try_write_varint64(list.items.len() as u64) {
                return Ok(Progress::Pending);
            }
            self.wrote_count = true;
        }

        if self.plan.is_none() {
            self.plan = Some(compute_list_plan(&list.items, &self.elem_declared, ctx)?);
        }
        let Some(plan) = self.plan.as_ref() else {
            return Ok(Progress::Pending);
        };

        if !self.wrote_flags {
            if !cur.try_write_u8(plan.flags.bits()) {
                return Ok(Progress::Pending);
            }
            self.wrote_flags = true;
        }

        if plan.flags.not_decl_element_type()
            && !plan.flags.not_same_type()
            && !self.shared_meta_done
        {
            let token = plan.shared.ok_or(EncodeError::InvalidToken)?;
            let reg = ctx.registry.get(token).ok_or(EncodeError::InvalidToken)?;
            if self.shared_meta.write(cur, reg, ctx.meta_strings)?.is_pending() {
                return Ok(Progress::Pending);
            }
            self.shared_meta_done = true;
        }

        while self.index < list.items.len() {
            if self.elem.is_none() {
                self.elem = Some(SlotEncoder::new(plan.elem_declared.clone(), plan.elem_mode));
            }
            let Some(encoder) = self.elem.as_mut() else {
                debug_assert!(false, "element encoder just installed");
                return Ok(Progress::Pending);
            };
            if encoder.write(cur, &list.items[self.index], ctx)?.is_pending() {
                return Ok(Progress::Pending);
            }
            encoder.reset();
            self.index += 1;
        }
        Ok(Progress::Done)
    }
}

/// The single statistics pass over a collection: nullability and runtime
/// type homogeneity, folded into header flags and the element slot layout.
fn compute_list_plan(
    items: &[Value],
    elem_declared: &DeclaredType,
    ctx: &WriteCtx<'_>,
) -> Result<ListPlan, EncodeError> {
    let declared_token = ctx.registry.token_for_declared(elem_declared);
    let declared_inline = declared_token
        .and_then(|token| ctx.registry.get(token))
        .is_some_and(|reg| reg.kind().is_inline());

    let mut has_null = false;
    let mut common: Option<TypeToken> = None;
    let mut mixed = false;
    for item in items {
        match ctx.registry.runtime_token(item) {
            None => has_null = true,
            Some(token) => match common {
                None => common = Some(token),
                Some(existing) if existing != token => mixed = true,
                Some(_) => {}
            },
        }
    }

    let tracking = matches!(
        ctx.config.ref_tracking,
        RefTrackingPolicy::Enabled | RefTrackingPolicy::CycleOnly
    );
    let mut bits = 0u8;
    if declared_inline {
        if has_null {
            bits |= CollectionFlags::HAS_NULL;
        }
    } else if tracking {
        // Reference flags subsume null marking.
        bits |= CollectionFlags::TRACKING_REF;
    } else if has_null {
        bits |= CollectionFlags::HAS_NULL;
    }

    let mut shared = None;
    match declared_token {
        Some(declared) => {
            if mixed {
                bits |= CollectionFlags::NOT_DECL_ELEMENT_TYPE | CollectionFlags::NOT_SAME_TYPE;
            } else if let Some(actual) = common {
                if actual != declared {
                    bits |= CollectionFlags::NOT_DECL_ELEMENT_TYPE;
                    shared = Some(actual);
                }
            }
        }
        None => {
            if let (Some(actual), false) = (common, mixed) {
                bits |= CollectionFlags::NOT_DECL_ELEMENT_TYPE;
                shared = Some(actual);
            } else {
                // Mixed, empty, or all-null: per-element meta (of which
                // there may be none to write).
                bits |= CollectionFlags::NOT_DECL_ELEMENT_TYPE | CollectionFlags::NOT_SAME_TYPE;
            }
        }
    }
    let flags = CollectionFlags::from_bits(bits);

    let elem_effective = if flags.not_same_type() {
        DeclaredType::Dynamic
    } else if let Some(token) = shared {
        DeclaredType::Token(token)
    } else {
        elem_declared.clone()
    };
    let elem_mode = element_mode(flags, &elem_effective, ctx.registry);

    Ok(ListPlan { flags, shared, elem_declared: elem_effective, elem_mode })
}

/// Element slot layout derived from the header flags; the reader derives
/// the identical answer from the same inputs.
pub(crate) fn element_mode(
    flags: CollectionFlags,
    elem_effective: &DeclaredType,
    registry: &TypeRegistry,
) -> SlotMode {
    if flags.tracking_ref() {
        return SlotMode::Full;
    }
    if flags.has_null() {
        return SlotMode::NullOnly;
    }
    let inline = registry
        .token_for_declared(elem_effective)
        .and_then(|token| registry.get(token))
        .is_some_and(|reg| reg.kind().is_inline());
    if inline {
        SlotMode::Bare
    } else {
        SlotMode::NullOnly
    }
}

/// Resumable record body writer: fields in schema order, one slot at a
/// time, each field slot freshly declared from the schema.
#[derive(Default)]
struct RecordWriter {
    arity_checked: bool,
    index: usize,
    field: Option<SlotEncoder>,
}

impl RecordWriter {
    fn write(
        &mut self,
        cur: &mut WriteCursor<'_>,
        value: &Value,
        ctx: &mut WriteCtx<'_>,
    ) -> Result<Progress, EncodeError> {
        let Value::Record(rc) = value else {
            return Err(EncodeError::DeclaredTypeMismatch {
                expected: "record",
                found: value.kind_name(),
            });
        };
        let record = rc.borrow();
        let reg = ctx.registry.get(record.type_token).ok_or(EncodeError::InvalidToken)?;
        let schema = reg.record_schema().ok_or(EncodeError::InvalidToken)?;

        if !self.arity_checked {
            if record.fields.len() != schema.fields.len() {
                return Err(EncodeError::ArityMismatch {
                    expected: schema.fields.len(),
                    found: record.fields.len(),
                });
            }
            self.arity_checked = true;
        }

        while self.index < record.fields.len() {
            if self.field.is_none() {
                self.field = Some(SlotEncoder::new(
                    schema.fields[self.index].declared.clone(),
                    SlotMode::Full,
                ));
            }
            let Some(encoder) = self.field.as_mut() else {
                debug_assert!(false, "field encoder just installed");
                return Ok(Progress::Pending);
            };
            if encoder.write(cur, &record.fields[self.index], ctx)?.is_pending() {
                return Ok(Progress::Pending);
            }
            // Each field declares its own type: drop the encoder rather
            // than reset it.
            self.field = None;
            self.index += 1;
        }
        Ok(Progress::Done)
    }
}

/// Resumable enum body writer: one atomic ordinal varint.
#[derive(Default)]
struct EnumWriter {
    ordinal_checked: bool,
}

impl EnumWriter {
    fn write(
        &mut self,
        cur: &mut WriteCursor<'_>,
        value: &Value,
        ctx: &mut WriteCtx<'_>,
    ) -> Result<Progress, EncodeError> {
        let Value::Enum(ev) = value else {
            return Err(EncodeError::DeclaredTypeMismatch {
                expected: "enum",
                found: value.kind_name(),
            });
        };
        if !self.ordinal_checked {
            let reg = ctx.registry.get(ev.type_token).ok_or(EncodeError::InvalidToken)?;
            let schema = reg.enum_schema().ok_or(EncodeError::InvalidToken)?;
            if ev.ordinal as usize >= schema.variants.len() {
                return Err(EncodeError::OrdinalOutOfRange {
                    ordinal: ev.ordinal,
                    variants: schema.variants.len(),
                });
            }
            self.ordinal_checked = true;
        }
        if !cur.try_write_varint32(ev.ordinal) {
            return Ok(Progress::Pending);
        }
        Ok(Progress::Done)
    }
}
