// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Reference resolvers: write-side identity tracking and the read-side
//! object table.
//!
//! Ids are dense and assigned in first-sighted order on the write side; the
//! read side reproduces the same order by appending every `RefValue` stub at
//! creation time. An id is dereferenceable as soon as it is appended, even
//! while the object's fields are still filling — that is the invariant that
//! makes cycles work.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::config::RefTrackingPolicy;
use crate::error::{DecodeError, EncodeError};
use crate::value::{ObjKey, Value};

/// Outcome of sighting an object on the write side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteSighting {
    /// First sighting of a tracked object; write `RefValue` and the body.
    New {
        /// Assigned dense id.
        id: u32,
    },
    /// The object was sighted before (or is an in-flight ancestor under the
    /// cycle-only policy); write `Ref` + id, no body.
    Seen {
        /// Previously assigned id.
        id: u32,
    },
    /// Tracking is off for this stream; write `NotNullValue` and the body.
    Untracked,
}

/// Write-side resolver: object identity → id, per the configured policy.
#[derive(Debug)]
pub(crate) struct WriteRefResolver {
    policy: RefTrackingPolicy,
    next_id: u32,
    /// `Enabled`: permanent identity → id table.
    ids: FxHashMap<ObjKey, u32>,
    /// `CycleOnly`: ids of objects whose bodies are still being written.
    in_flight: FxHashMap<ObjKey, u32>,
    /// `Disabled`: objects currently being written, for cycle detection.
    writing: FxHashSet<ObjKey>,
}

impl WriteRefResolver {
    pub(crate) fn new(policy: RefTrackingPolicy) -> Self {
        Self {
            policy,
            next_id: 0,
            ids: FxHashMap::default(),
            in_flight: FxHashMap::default(),
            writing: FxHashSet::default(),
        }
    }

    /// Records a sighting of `key`. Must be called exactly once per slot;
    /// callers cache the outcome so a suspended write replays the same
    /// flag and id.
    pub(crate) fn sight(&mut self, key: ObjKey) -> Result<WriteSighting, EncodeError> {
        match self.policy {
            RefTrackingPolicy::Enabled => {
                if let Some(&id) = self.ids.get(&key) {
                    return Ok(WriteSighting::Seen { id });
                }
                let id = self.assign_id();
                self.ids.insert(key, id);
                Ok(WriteSighting::New { id })
            }
            RefTrackingPolicy::Disabled => {
                if !self.writing.insert(key) {
                    return Err(EncodeError::CircularReference);
                }
                Ok(WriteSighting::Untracked)
            }
            RefTrackingPolicy::CycleOnly => {
                // Only an in-flight ancestor earns a back-reference;
                // completed siblings are re-encoded under a fresh id.
                if let Some(&id) = self.in_flight.get(&key) {
                    return Ok(WriteSighting::Seen { id });
                }
                let id = self.assign_id();
                self.in_flight.insert(key, id);
                Ok(WriteSighting::New { id })
            }
        }
    }

    /// Guards a slot that carries no reference protocol (a collection ruled
    /// out tracking for its elements): no id is assigned, but a re-entrant
    /// sighting is a cycle the wire format cannot express.
    pub(crate) fn enter_untracked(&mut self, key: ObjKey) -> Result<(), EncodeError> {
        if !self.writing.insert(key) {
            return Err(EncodeError::CircularReference);
        }
        Ok(())
    }

    /// Ends an [`WriteRefResolver::enter_untracked`] guard.
    pub(crate) fn leave_untracked(&mut self, key: ObjKey) {
        self.writing.remove(&key);
    }

    /// Marks `key`'s body fully written.
    pub(crate) fn complete(&mut self, key: ObjKey) {
        match self.policy {
            RefTrackingPolicy::Enabled => {}
            RefTrackingPolicy::Disabled => {
                self.writing.remove(&key);
            }
            RefTrackingPolicy::CycleOnly => {
                self.in_flight.remove(&key);
            }
        }
    }

    fn assign_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

/// Read-side resolver: the append-only id → object table.
#[derive(Debug, Default)]
pub(crate) struct ReadRefResolver {
    values: Vec<Value>,
}

impl ReadRefResolver {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Appends a freshly created stub; returns its id.
    pub(crate) fn push(&mut self, value: Value) -> u32 {
        let id = self.values.len() as u32;
        self.values.push(value);
        id
    }

    /// Dereferences an id. Out-of-range ids mean a corrupt stream or a
    /// call-order bug — fatal, never retryable.
    pub(crate) fn get(&self, id: u32) -> Result<Value, DecodeError> {
        self.values
            .get(id as usize)
            .cloned()
            .ok_or(DecodeError::RefIdOutOfRange { id, len: self.values.len() })
    }
}
