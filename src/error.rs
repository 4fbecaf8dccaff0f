//! Error types for the SRT source core
//!
//! Each layer has its own error enum so callers can match on the failure mode
//! without string inspection. Wrapped causes are preserved through
//! `std::error::Error::source`.

use thiserror::Error;

use crate::ts::TsStream;

/// Errors from the MPEG-TS demuxer.
#[derive(Debug, Error)]
pub enum TsError {
    /// Cell is not exactly one TS packet.
    #[error("ts: cell is {0} bytes, expected 188")]
    CellSize(usize),

    /// First byte of the cell is not the 0x47 sync byte.
    #[error("ts: bad sync byte {0:#04x}")]
    SyncByte(u8),

    /// A PSI section (PAT or PMT) was truncated or malformed.
    #[error("ts: malformed {0} section")]
    Section(&'static str),

    /// The PES header at a payload unit start could not be parsed.
    #[error("ts: malformed PES header on pid {pid:#06x}")]
    PesHeader { pid: u16 },
}

/// Errors from the raw bitstream helpers (Annex-B, ADTS, config records).
#[derive(Debug, Error)]
pub enum MediaError {
    /// Payload claimed to be Annex-B but does not begin with a start code.
    #[error("annexb: payload does not start with a start code")]
    AnnexbStartCode,

    /// ADTS syncword missing or the header is truncated.
    #[error("adts: malformed header")]
    AdtsHeader,

    /// ADTS frame length field points past the end of the payload.
    #[error("adts: frame length {length} exceeds remaining {remaining} bytes")]
    AdtsFrameLength { length: usize, remaining: usize },

    /// SPS too short to carry profile/level for the decoder config record.
    #[error("avcc: sps is {0} bytes, need at least 4")]
    SpsTooShort(usize),
}

/// Errors raised while transforming one PES message into RTMP frames.
///
/// These abort the current message only. The per-cell loop in
/// [`SrtFrameBuilder::on_packet`](crate::SrtFrameBuilder::on_packet) logs and
/// absorbs them, so a single bad message never tears down the publish path.
#[derive(Debug, Error)]
pub enum FrameError {
    /// PES stream number is non-zero; only the first substream is handled.
    #[error("ts: unsupported stream format, sid={sid:#04x} stream_number={stream_number}")]
    UnsupportedStreamFormat { sid: u8, stream_number: i32 },

    /// Elementary stream codec is not H.264, HEVC or AAC.
    #[error("ts: unsupported stream codec {0:?}")]
    UnsupportedCodec(TsStream),

    /// A sequence-header dispatch was requested with SPS or PPS missing.
    #[error("sps or pps empty")]
    EmptySpsPps,

    /// The AVC path produced zero NAL units after parameter-set filtering.
    #[error("empty video frame")]
    EmptyFrame,

    /// Annex-B / ADTS / parameter-set demux failed.
    #[error("demux: {0}")]
    Demux(#[source] MediaError),

    /// FLV / AVCC wrapping failed.
    #[error("mux: {0}")]
    Mux(#[source] MediaError),

    /// The downstream bridge rejected a frame.
    #[error("bridge: {0}")]
    Bridge(#[from] BridgeError),
}

/// Opaque failure reported by a downstream [`StreamBridge`](crate::StreamBridge).
#[derive(Debug, Error)]
#[error("{message}")]
pub struct BridgeError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl BridgeError {
    /// A bridge error with a message only.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// A bridge error wrapping an underlying cause.
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Errors from source publish lifecycle operations.
#[derive(Debug, Error)]
pub enum PublishError {
    /// `on_publish` was called while another publisher holds the stream.
    #[error("stream already has a publisher: {0}")]
    AlreadyPublishing(String),

    /// The bridge chain failed while starting the publish.
    #[error("bridge: {0}")]
    Bridge(#[from] BridgeError),
}
