use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// NOTE: ID Design
//
// Every durable entity carries an opaque string ID with a short type prefix
// ("evt_", "ses_", "ws_", "run_"). The prefix makes IDs self-describing in
// logs and payloads; the remainder is a v4 UUID in simple (dashless) form.
// Blob IDs are the exception: they are derived from the content hash so that
// identical bytes always resolve to the same ID (content addressing).

macro_rules! impl_id_common {
    ($name:ident) => {
        impl $name {
            pub fn from_raw(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

/// Unique event identifier (`evt_` prefix).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    pub fn mint() -> Self {
        Self(format!("evt_{}", Uuid::new_v4().simple()))
    }
}

impl_id_common!(EventId);

/// Unique session identifier (`ses_` prefix).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn mint() -> Self {
        Self(format!("ses_{}", Uuid::new_v4().simple()))
    }
}

impl_id_common!(SessionId);

/// Unique workspace identifier (`ws_` prefix).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkspaceId(String);

impl WorkspaceId {
    pub fn mint() -> Self {
        Self(format!("ws_{}", Uuid::new_v4().simple()))
    }
}

impl_id_common!(WorkspaceId);

/// Agent-run correlation identifier (`run_` prefix).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    pub fn mint() -> Self {
        Self(format!("run_{}", Uuid::new_v4().simple()))
    }
}

impl_id_common!(RunId);

/// Provider-issued tool call identifier (e.g. `toolu_01READ`).
///
/// Minted by the provider, not by this crate, so there is no `mint()`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolCallId(String);

impl_id_common!(ToolCallId);

/// Stable short blob identifier, derived from the content hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobId(String);

impl BlobId {
    /// Derive the blob ID from a hex-encoded content hash.
    ///
    /// Uses the first 12 hex characters, enough to make collisions no more
    /// likely than a hash collision on the full digest (which is already the
    /// dedup key).
    pub fn from_hash(hash_hex: &str) -> Self {
        let short: String = hash_hex.chars().take(12).collect();
        Self(format!("blob_{short}"))
    }
}

impl_id_common!(BlobId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minted_ids_carry_prefix() {
        assert!(EventId::mint().as_str().starts_with("evt_"));
        assert!(SessionId::mint().as_str().starts_with("ses_"));
        assert!(WorkspaceId::mint().as_str().starts_with("ws_"));
        assert!(RunId::mint().as_str().starts_with("run_"));
    }

    #[test]
    fn minted_ids_are_unique() {
        assert_ne!(EventId::mint(), EventId::mint());
    }

    #[test]
    fn blob_id_is_a_function_of_the_hash() {
        let a = BlobId::from_hash("deadbeefcafebabe0123456789");
        let b = BlobId::from_hash("deadbeefcafebabe0123456789");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "blob_deadbeefcafe");
    }

    #[test]
    fn serde_is_transparent() {
        let id = EventId::from_raw("evt_abc");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"evt_abc\"");
        let back: EventId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
