//! The engine-facing contract of a synchronized domain object.
//!
//! The engine never looks inside a record. It needs exactly three things:
//! identity for set membership ([`RecordIdentity`]), a UUID for records of
//! persistent types, and snapshot (de)serialization for records of transient
//! types. Everything else -- field layout, validation, the dynamic-size
//! sidecar the object codec shares between its writer and reader -- stays
//! behind [`SyncObject`].

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use bytes::{BufMut, Bytes};
use uuid::Uuid;

use crate::error::CodecError;

/// A domain object the engine can relay between servers.
///
/// Implemented by the host's generated object layer. Records are handed to
/// the engine as [`RecordRef`]s; mutation happens in the host's producer
/// code before a record is submitted, the engine only reads during encode.
pub trait SyncObject: Send + Sync + 'static {
    /// The record's durable identity. `Some` for records of persistent
    /// types; the engine puts it on the wire instead of a snapshot.
    fn uuid(&self) -> Option<Uuid>;

    /// Append a full snapshot of this record to `buf`.
    ///
    /// The snapshot must be self-delimiting: [`SyncObject::decode_snapshot`]
    /// consumes exactly the bytes written here, including any sidecar the
    /// codec needs to size dynamic fields.
    fn encode_snapshot(&self, buf: &mut dyn BufMut) -> Result<(), CodecError>;

    /// Overwrite this record from a snapshot at the front of `buf`,
    /// consuming exactly what the matching `encode_snapshot` produced.
    fn decode_snapshot(&mut self, buf: &mut Bytes) -> Result<(), CodecError>;

    /// Upcast for update handlers that need the concrete record type.
    fn as_any(&self) -> &dyn Any;
}

/// Shared handle to a synchronized record.
pub type RecordRef = Arc<dyn SyncObject>;

/// Set-membership key for a [`RecordRef`], compared by allocation address.
///
/// Two handles refer to the same pending entry iff they point at the same
/// record in memory; logical keys play no part. Resubmitting the same handle
/// between flushes therefore coalesces to one wire entry.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordIdentity(usize);

impl RecordIdentity {
    /// The identity of `record`'s allocation.
    #[must_use]
    pub fn of(record: &RecordRef) -> Self {
        Self(Arc::as_ptr(record).cast::<()>() as usize)
    }
}

impl fmt::Debug for RecordIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordIdentity({:#x})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Marker;

    impl SyncObject for Marker {
        fn uuid(&self) -> Option<Uuid> {
            None
        }
        fn encode_snapshot(&self, _buf: &mut dyn BufMut) -> Result<(), CodecError> {
            Ok(())
        }
        fn decode_snapshot(&mut self, _buf: &mut Bytes) -> Result<(), CodecError> {
            Ok(())
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn identity_tracks_the_allocation() {
        let a: RecordRef = Arc::new(Marker);
        let b: RecordRef = Arc::new(Marker);
        let a_again = Arc::clone(&a);

        assert_eq!(RecordIdentity::of(&a), RecordIdentity::of(&a_again));
        assert_ne!(RecordIdentity::of(&a), RecordIdentity::of(&b));
    }

    #[test]
    fn identity_is_hashable() {
        let a: RecordRef = Arc::new(Marker);
        let mut set = std::collections::HashSet::new();
        assert!(set.insert(RecordIdentity::of(&a)));
        assert!(!set.insert(RecordIdentity::of(&Arc::clone(&a))));
    }
}
