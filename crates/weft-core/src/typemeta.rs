// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Type meta on the wire: the composite kind varint and, for named kinds,
//! namespace + name meta-strings.
//!
//! Meta-string framing (per name):
//!
//! ```text
//! varint header  (len << 1) | 0   first sighting; encoding byte + packed
//!                                 bytes follow
//!                (id  << 1) | 1   back-reference to the id'th name first
//!                                 written in this stream
//! ```
//!
//! Each side keeps a per-stream name table in first-written order, reset
//! with the reference resolvers. Header and encoding byte are atomic units;
//! packed bytes are freely resumable.

use rustc_hash::FxHashMap;
use weft_meta::MetaString;
use weft_wire::{ReadCursor, WriteCursor};

use crate::error::{DecodeError, EncodeError};
use crate::progress::Progress;
use crate::registry::{TypeKind, TypeRegistration, TypeRegistry, TypeToken};

/// Longest meta-string payload the reader will buffer: the name-length
/// bound times the worst-case UTF-8 expansion.
const MAX_META_BYTES: u64 = (weft_meta::MAX_NAME_LEN as u64) * 4;

/// Write-side per-stream name table.
#[derive(Debug, Default)]
pub(crate) struct MetaStringWriteTable {
    ids: FxHashMap<String, u32>,
}

impl MetaStringWriteTable {
    /// Returns the name's id and whether this sighting is its first.
    fn get_or_add(&mut self, text: &str) -> (u32, bool) {
        if let Some(&id) = self.ids.get(text) {
            return (id, false);
        }
        let id = self.ids.len() as u32;
        self.ids.insert(text.to_owned(), id);
        (id, true)
    }
}

/// Read-side per-stream name table.
#[derive(Debug, Default)]
pub(crate) struct MetaStringReadTable {
    names: Vec<String>,
}

impl MetaStringReadTable {
    fn push(&mut self, name: String) {
        self.names.push(name);
    }

    fn get(&self, id: u32) -> Result<String, DecodeError> {
        self.names
            .get(id as usize)
            .cloned()
            .ok_or(DecodeError::MetaStringIdOutOfRange { id, len: self.names.len() })
    }
}

/// Cached plan for one meta-string write; computed once so retries replay
/// identical bytes.
#[derive(Debug, Clone, Copy)]
struct MetaStringPlan {
    header: u64,
    is_new: bool,
}

/// Resumable writer for one meta-string.
#[derive(Debug, Default)]
pub(crate) struct MetaStringWriter {
    plan: Option<MetaStringPlan>,
    wrote_header: bool,
    wrote_encoding: bool,
    bytes_written: usize,
}

impl MetaStringWriter {
    pub(crate) fn write(
        &mut self,
        cur: &mut WriteCursor<'_>,
        ms: &MetaString,
        table: &mut MetaStringWriteTable,
    ) -> Progress {
        let plan = *self.plan.get_or_insert_with(|| {
            let (id, is_new) = table.get_or_add(ms.text());
            let header = if is_new {
                (ms.bytes().len() as u64) << 1
            } else {
                u64::from(id) << 1 | 1
            };
            MetaStringPlan { header, is_new }
        });

        if !self.wrote_header {
            if !cur.try_write_varint64(plan.header) {
                return Progress::Pending;
            }
            self.wrote_header = true;
        }
        if !plan.is_new {
            return Progress::Done;
        }
        if !self.wrote_encoding {
            if !cur.try_write_u8(ms.encoding().wire()) {
                return Progress::Pending;
            }
            self.wrote_encoding = true;
        }
        while self.bytes_written < ms.bytes().len() {
            let n = cur.write_raw(&ms.bytes()[self.bytes_written..]);
            if n == 0 {
                return Progress::Pending;
            }
            self.bytes_written += n;
        }
        Progress::Done
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Resumable reader for one meta-string. Yields the decoded name.
#[derive(Debug, Default)]
pub(crate) struct MetaStringReader {
    header: Option<u64>,
    encoding: Option<weft_meta::MetaEncoding>,
    buf: Vec<u8>,
}

impl MetaStringReader {
    pub(crate) fn read(
        &mut self,
        cur: &mut ReadCursor<'_>,
        table: &mut MetaStringReadTable,
    ) -> Result<Option<String>, DecodeError> {
        let header = match self.header {
            Some(h) => h,
            None => {
                let Some(h) = cur.try_read_varint64()? else {
                    return Ok(None);
                };
                self.header = Some(h);
                h
            }
        };

        if header & 1 == 1 {
            let id = u32::try_from(header >> 1)
                .map_err(|_| DecodeError::MetaStringIdOutOfRange { id: u32::MAX, len: 0 })?;
            return table.get(id).map(Some);
        }

        let len = header >> 1;
        if len > MAX_META_BYTES {
            return Err(DecodeError::CountOverflow(len));
        }
        let len = len as usize;

        let encoding = match self.encoding {
            Some(e) => e,
            None => {
                let Some(byte) = cur.try_read_u8() else {
                    return Ok(None);
                };
                let e = weft_meta::MetaEncoding::from_wire(byte)?;
                self.encoding = Some(e);
                e
            }
        };

        while self.buf.len() < len {
            let chunk = cur.read_raw_slice(len - self.buf.len());
            if chunk.is_empty() {
                return Ok(None);
            }
            self.buf.extend_from_slice(chunk);
        }

        let name = weft_meta::decode(&self.buf, encoding)?;
        table.push(name.clone());
        Ok(Some(name))
    }

    pub(crate) fn reset(&mut self) {
        self.header = None;
        self.encoding = None;
        self.buf.clear();
    }
}

/// Resumable writer for one slot's type meta.
#[derive(Debug, Default)]
pub(crate) struct TypeMetaWriter {
    wrote_composite: bool,
    namespace: MetaStringWriter,
    name: MetaStringWriter,
}

impl TypeMetaWriter {
    pub(crate) fn write(
        &mut self,
        cur: &mut WriteCursor<'_>,
        reg: &TypeRegistration,
        table: &mut MetaStringWriteTable,
    ) -> Result<Progress, EncodeError> {
        if !self.wrote_composite {
            if !cur.try_write_varint32(reg.wire_composite()) {
                return Ok(Progress::Pending);
            }
            self.wrote_composite = true;
        }
        if reg.kind().is_named() {
            let Some(registered) = reg.name() else {
                return Err(EncodeError::InvalidToken);
            };
            if self.namespace.write(cur, registered.namespace(), table).is_pending() {
                return Ok(Progress::Pending);
            }
            if self.name.write(cur, registered.name(), table).is_pending() {
                return Ok(Progress::Pending);
            }
        }
        Ok(Progress::Done)
    }

    pub(crate) fn reset(&mut self) {
        self.wrote_composite = false;
        self.namespace.reset();
        self.name.reset();
    }
}

/// Resumable reader for one slot's type meta. Yields the resolved token.
#[derive(Debug, Default)]
pub(crate) struct TypeMetaReader {
    composite: Option<(TypeKind, u32)>,
    namespace_reader: MetaStringReader,
    namespace: Option<String>,
    name_reader: MetaStringReader,
}

impl TypeMetaReader {
    pub(crate) fn read(
        &mut self,
        cur: &mut ReadCursor<'_>,
        registry: &TypeRegistry,
        table: &mut MetaStringReadTable,
    ) -> Result<Option<TypeToken>, DecodeError> {
        let (kind, user_id) = match self.composite {
            Some(c) => c,
            None => {
                let Some(composite) = cur.try_read_varint32()? else {
                    return Ok(None);
                };
                let kind_byte = (composite & 0xff) as u8;
                let kind = TypeKind::from_wire(kind_byte)
                    .ok_or(DecodeError::UnknownTypeKind(kind_byte))?;
                let user_id = composite >> 8;
                self.composite = Some((kind, user_id));
                (kind, user_id)
            }
        };

        if !kind.is_named() {
            return registry.resolve_wire(kind, user_id).map(Some);
        }
        if user_id != 0 {
            return Err(DecodeError::UnknownTypeId { kind, user_id });
        }

        if self.namespace.is_none() {
            let Some(ns) = self.namespace_reader.read(cur, table)? else {
                return Ok(None);
            };
            self.namespace = Some(ns);
        }
        let Some(name) = self.name_reader.read(cur, table)? else {
            return Ok(None);
        };
        let namespace = self.namespace.as_deref().unwrap_or_default();
        registry.resolve_named(kind, namespace, &name).map(Some)
    }

    pub(crate) fn reset(&mut self) {
        self.composite = None;
        self.namespace_reader.reset();
        self.namespace = None;
        self.name_reader.reset();
    }
}
