//! MPEG-TS demuxing
//!
//! This module turns 188-byte TS cells into completed PES messages:
//! - PAT/PMT section parsing to learn which PIDs carry which codecs
//! - PES reassembly across cells with PTS/DTS extraction
//!
//! Transport-level loss and reordering are not handled here; the SRT layer
//! already guarantees delivery of whole datagrams in order.

pub mod context;
pub mod message;

pub use context::TsContext;
pub use message::{TsMessage, TsPidApply, TsStream};

/// Size of one TS cell.
pub const TS_PACKET_SIZE: usize = 188;

/// TS sync byte, first byte of every cell.
pub const TS_SYNC_BYTE: u8 = 0x47;

/// PES stream id for private stream 1.
///
/// Some muxers carry AAC under this id; it is remapped to the common audio
/// id before codec dispatch.
pub const PES_STREAM_ID_PRIVATE_STREAM_1: u8 = 0xBD;

/// PES stream id for the first common audio substream (110x_xxxx, x=0).
pub const PES_STREAM_ID_AUDIO_COMMON: u8 = 0xC0;

/// PES stream id for the first common video substream (1110_xxxx, x=0).
pub const PES_STREAM_ID_VIDEO_COMMON: u8 = 0xE0;
