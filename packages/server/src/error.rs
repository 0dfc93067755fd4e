//! Engine error taxonomy.
//!
//! Structural failures abort the operation that hit them; semantic failures
//! (a record missing from the store, a handler rejecting a change) are
//! logged at the point of occurrence and skipped. The engine never retries.

use shardsync_core::CodecError;
use uuid::Uuid;

/// Errors surfaced by the [`SyncEngine`](crate::SyncEngine) host API.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The type name has no registered config.
    #[error("no registered config for type `{name}`")]
    UnknownType { name: String },

    /// `register_type` was called for a name that is already taken.
    /// Unregister first; re-registration in place is not supported.
    #[error("type `{name}` is already registered")]
    AlreadyRegistered { name: String },

    /// The same connection was registered twice. Logged; the registration
    /// call reports `false` per the host API contract.
    #[error("connection is already registered")]
    DuplicateConnection,

    /// A config violated a registration invariant.
    #[error("invalid config for type `{name}`: {reason}")]
    InvalidConfig { name: String, reason: &'static str },

    /// Malformed frame bytes. The stream is desynchronized; the host should
    /// close the connection.
    #[error("malformed sync frame: {0}")]
    Decode(#[from] CodecError),

    /// An inbound frame referenced a UUID the store does not have. Logged;
    /// the record is skipped and the frame continues.
    #[error("type `{name}` has no record {uuid} in its store")]
    MissingPersistent { name: String, uuid: Uuid },

    /// The store itself failed while loading a referenced record. Logged;
    /// the record is skipped and the frame continues.
    #[error("store load failed for type `{name}`: {source}")]
    StoreLoad {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    /// A local update handler rejected the change. The change is not
    /// relayed.
    #[error("update handler rejected the change for type `{name}`")]
    LocalApplyFailed { name: String },
}
