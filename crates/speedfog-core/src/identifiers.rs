// crates/speedfog-core/src/identifiers.rs
// ============================================================================
// Module: SpeedFog Identifiers
// Description: Canonical opaque identifiers for races, participants, seeds,
// users, and invites.
// Purpose: Provide strongly typed, serializable identifiers with stable wire
// forms (opaque strings, per the wire contract in spec.md section 6.3).
// Dependencies: serde, uuid
// ============================================================================

//! ## Overview
//! Every identifier here is an opaque string on the wire. The server owns
//! generation (UUIDv4) and never asks a client to interpret structure inside
//! an id.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

// ============================================================================
// SECTION: Macro: opaque string identifier
// ============================================================================

macro_rules! opaque_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            /// Wraps an existing opaque string as an identifier.
            #[must_use]
            pub fn from_raw(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

opaque_id!(UserId);
opaque_id!(RaceId);
opaque_id!(ParticipantId);
opaque_id!(SeedId);
opaque_id!(InviteId);

/// Opaque bearer secret the game client presents to authenticate its
/// WebSocket connection. Never logged.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModToken(String);

impl ModToken {
    /// Creates a new random mod token.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wraps an existing opaque token string.
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ModToken {
    fn default() -> Self {
        Self::new()
    }
}

// Never print the token value: auth secrets must not end up in logs.
impl fmt::Debug for ModToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ModToken(..)")
    }
}

/// DAG node identifier within a seed's graph. Opaque to clients except for
/// the mod, which receives it verbatim in `zone_update` payloads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Wraps an existing node identifier string.
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the node id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Event flag identifier read from game memory. Opaque integer; the server
/// never documents the mapping to clients (spec.md section 6.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlagId(i64);

impl FlagId {
    /// Creates a new flag identifier from a raw integer.
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Returns the raw integer value.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for FlagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opaque_ids_round_trip_through_json() {
        let id = RaceId::new();
        let json = serde_json::to_string(&id).unwrap();
        let back: RaceId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn mod_token_debug_never_prints_secret() {
        let token = ModToken::from_raw("super-secret-value");
        let rendered = format!("{token:?}");
        assert!(!rendered.contains("super-secret-value"));
    }
}
