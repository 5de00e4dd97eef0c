// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Engine configuration.

/// How the writer treats repeated sightings of one object.
///
/// Both ends of a stream must agree on the policy: it changes which
/// reference flags the writer emits, and the reader trusts the flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefTrackingPolicy {
    /// Full dedup: every re-sighted object becomes a back-reference and
    /// deserializes identity-equal.
    #[default]
    Enabled,
    /// No back-references: shared objects are re-encoded per sighting and a
    /// cycle is a fatal encode error.
    Disabled,
    /// Back-references only for genuine cycles (an object sighted again
    /// while still being written). Sibling sharing is re-encoded.
    CycleOnly,
}

/// Engine configuration. Plain data; both ends of a stream must use equal
/// settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Config {
    /// Reference-tracking policy (see [`RefTrackingPolicy`]).
    pub ref_tracking: RefTrackingPolicy,
    /// Write a redundant UTF-16 byte count after UTF-8 string headers, for
    /// peers that pre-size UTF-16 buffers.
    pub write_utf16_byte_count: bool,
}
