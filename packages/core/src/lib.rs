//! shardsync core -- record contract and sync frame wire codec.
//!
//! Foundation layer for the shardsync engine:
//!
//! - **Record** ([`record`]): [`SyncObject`] trait, [`RecordRef`] shared
//!   handle, [`RecordIdentity`] set-membership key
//! - **Frame** ([`frame`]): [`encode_frame`], streaming [`FrameReader`],
//!   wire layout constants
//! - **Errors** ([`error`]): [`CodecError`]
//!
//! The engine itself, with its type registry, connection table and outbound
//! queue, lives in the `shardsync-server` crate.

pub mod error;
pub mod frame;
pub mod record;

pub use error::CodecError;
pub use frame::{encode_frame, FrameReader, MAX_TYPE_NAME_LEN, UUID_WIRE_LEN};
pub use record::{RecordIdentity, RecordRef, SyncObject};
