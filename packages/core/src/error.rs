//! Structural errors for the sync frame wire codec.

/// Errors raised while encoding or decoding a sync frame.
///
/// Every variant except [`CodecError::Snapshot`] is structural: the frame
/// bytes themselves are unusable and the receiving host should treat the
/// connection stream as desynchronized. `Snapshot` wraps whatever the host's
/// object codec reported and is structural too -- a half-read snapshot leaves
/// the cursor in the middle of a payload.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The buffer ended before a field could be read.
    #[error("frame truncated: needed {needed} more byte(s), {remaining} left")]
    Truncated { needed: usize, remaining: usize },

    /// The type name bytes were not valid UTF-8.
    #[error("type name is not valid UTF-8")]
    InvalidUtf8,

    /// The type name does not fit the u16 length prefix.
    #[error("type name is {len} bytes, wire limit is {max}")]
    NameTooLong { len: usize, max: usize },

    /// A batch does not fit the u32 section count.
    #[error("batch of {0} records does not fit a u32 count")]
    BatchTooLarge(usize),

    /// A record of a persistent type was submitted without a UUID.
    #[error("persistent record has no uuid")]
    MissingUuid,

    /// Bytes remained after the remove section.
    #[error("{0} trailing byte(s) after frame end")]
    TrailingBytes(usize),

    /// The object codec failed to encode or decode a snapshot.
    #[error("snapshot codec: {0}")]
    Snapshot(#[from] anyhow::Error),
}
