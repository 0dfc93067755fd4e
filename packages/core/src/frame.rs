//! Sync frame wire codec.
//!
//! A frame is the unit handed to the transport: one batched `(type, updates,
//! removes)` triple, little-endian, laid out as
//!
//! | field        | encoding                    |
//! |--------------|-----------------------------|
//! | type name    | u16 length + UTF-8 bytes    |
//! | update count | u32                         |
//! | updates      | 16-byte UUID or snapshot    |
//! | remove count | u32                         |
//! | removes      | same as updates             |
//!
//! Persistent types put UUIDs on the wire and the receiver reloads records
//! from its store; transient types carry full snapshots delegated to
//! [`SyncObject::encode_snapshot`]. Encoding is one-shot ([`encode_frame`]);
//! decoding is streaming ([`FrameReader`]) because payload materialization
//! needs the receiver's type registry.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use uuid::Uuid;

use crate::error::CodecError;
use crate::record::{RecordRef, SyncObject};

/// Wire limit on the UTF-8 byte length of a type name.
pub const MAX_TYPE_NAME_LEN: usize = u16::MAX as usize;

/// Encoded size of one persistent payload.
pub const UUID_WIRE_LEN: usize = 16;

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encode one fused frame for `type_name` carrying both pending sets.
///
/// For a persistent type each record contributes its 16-byte UUID; for a
/// transient type each record appends a self-delimiting snapshot. Either
/// section may be empty.
///
/// # Errors
///
/// [`CodecError::NameTooLong`] / [`CodecError::BatchTooLarge`] when a field
/// does not fit its length prefix, [`CodecError::MissingUuid`] when a
/// persistent record has no UUID, and [`CodecError::Snapshot`] when the
/// object codec rejects a record.
pub fn encode_frame(
    type_name: &str,
    persistent: bool,
    updates: &[RecordRef],
    removes: &[RecordRef],
) -> Result<Bytes, CodecError> {
    let mut buf = BytesMut::with_capacity(capacity_hint(type_name, persistent, updates, removes));
    put_type_name(&mut buf, type_name)?;
    put_records(&mut buf, persistent, updates)?;
    put_records(&mut buf, persistent, removes)?;
    Ok(buf.freeze())
}

fn capacity_hint(
    type_name: &str,
    persistent: bool,
    updates: &[RecordRef],
    removes: &[RecordRef],
) -> usize {
    let header = 2 + type_name.len() + 4 + 4;
    if persistent {
        header + UUID_WIRE_LEN * (updates.len() + removes.len())
    } else {
        // Snapshot sizes are unknown up front; BytesMut grows as needed.
        header
    }
}

fn put_type_name(buf: &mut BytesMut, name: &str) -> Result<(), CodecError> {
    let len = name.len();
    let prefix = u16::try_from(len).map_err(|_| CodecError::NameTooLong {
        len,
        max: MAX_TYPE_NAME_LEN,
    })?;
    buf.put_u16_le(prefix);
    buf.put_slice(name.as_bytes());
    Ok(())
}

fn put_records(
    buf: &mut BytesMut,
    persistent: bool,
    records: &[RecordRef],
) -> Result<(), CodecError> {
    let count =
        u32::try_from(records.len()).map_err(|_| CodecError::BatchTooLarge(records.len()))?;
    buf.put_u32_le(count);
    for record in records {
        if persistent {
            let uuid = record.uuid().ok_or(CodecError::MissingUuid)?;
            buf.put_slice(uuid.as_bytes());
        } else {
            record.encode_snapshot(buf)?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Streaming decoder over one received frame.
///
/// The caller drives it in wire order: [`FrameReader::read_type_name`], then
/// for each section [`FrameReader::read_count`] followed by that many
/// [`FrameReader::read_uuid`] or [`FrameReader::decode_snapshot_into`]
/// calls, then [`FrameReader::finish`]. When the type name is unknown,
/// [`FrameReader::consume_remaining`] discards the payload so the stream
/// stays aligned.
#[derive(Debug)]
pub struct FrameReader {
    buf: Bytes,
}

impl FrameReader {
    #[must_use]
    pub fn new(frame: Bytes) -> Self {
        Self { buf: frame }
    }

    fn need(&self, n: usize) -> Result<(), CodecError> {
        if self.buf.len() < n {
            return Err(CodecError::Truncated {
                needed: n - self.buf.len(),
                remaining: self.buf.len(),
            });
        }
        Ok(())
    }

    /// Read the frame's type name.
    ///
    /// # Errors
    ///
    /// [`CodecError::Truncated`] or [`CodecError::InvalidUtf8`].
    pub fn read_type_name(&mut self) -> Result<String, CodecError> {
        self.need(2)?;
        let len = self.buf.get_u16_le() as usize;
        self.need(len)?;
        let raw = self.buf.split_to(len);
        String::from_utf8(raw.to_vec()).map_err(|_| CodecError::InvalidUtf8)
    }

    /// Read a section count.
    ///
    /// # Errors
    ///
    /// [`CodecError::Truncated`].
    pub fn read_count(&mut self) -> Result<u32, CodecError> {
        self.need(4)?;
        Ok(self.buf.get_u32_le())
    }

    /// Read one persistent payload: a 16-byte UUID.
    ///
    /// # Errors
    ///
    /// [`CodecError::Truncated`].
    pub fn read_uuid(&mut self) -> Result<Uuid, CodecError> {
        self.need(UUID_WIRE_LEN)?;
        let mut raw = [0u8; UUID_WIRE_LEN];
        self.buf.copy_to_slice(&mut raw);
        Ok(Uuid::from_bytes(raw))
    }

    /// Decode one transient payload into a freshly built blank record.
    ///
    /// # Errors
    ///
    /// Whatever the record's object codec reports, as
    /// [`CodecError::Snapshot`] or [`CodecError::Truncated`].
    pub fn decode_snapshot_into(&mut self, record: &mut dyn SyncObject) -> Result<(), CodecError> {
        record.decode_snapshot(&mut self.buf)
    }

    /// Discard everything left in the frame, returning the byte count.
    ///
    /// Used for unknown types: the payload cannot be interpreted without a
    /// registered config, but the frame must still be consumed.
    pub fn consume_remaining(&mut self) -> usize {
        let n = self.buf.len();
        self.buf.advance(n);
        n
    }

    /// Assert the frame was consumed exactly.
    ///
    /// # Errors
    ///
    /// [`CodecError::TrailingBytes`] when payload bytes remain; the stream
    /// is desynchronized and the connection should be dropped.
    pub fn finish(self) -> Result<(), CodecError> {
        if self.buf.is_empty() {
            Ok(())
        } else {
            Err(CodecError::TrailingBytes(self.buf.len()))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
