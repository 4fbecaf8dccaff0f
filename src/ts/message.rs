//! Completed PES messages and their channel classification

use bytes::Bytes;

/// What a PID carries, learned from PAT/PMT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TsPidApply {
    /// Program association table (PID 0).
    Pat,
    /// Program map table.
    Pmt,
    /// Elementary audio stream.
    Audio,
    /// Elementary video stream.
    Video,
    /// Known PID with no handling.
    Reserved,
}

/// Elementary stream codec from the PMT `stream_type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TsStream {
    /// H.264/AVC (stream_type 0x1B).
    H264,
    /// H.265/HEVC (stream_type 0x24).
    Hevc,
    /// AAC in ADTS framing (stream_type 0x0F).
    AacAdts,
    /// Anything else; carried so the frame builder can reject it by value.
    Other(u8),
}

impl TsStream {
    /// Map a PMT stream_type byte.
    pub fn from_stream_type(ty: u8) -> Self {
        match ty {
            0x1B => TsStream::H264,
            0x24 => TsStream::Hevc,
            0x0F => TsStream::AacAdts,
            other => TsStream::Other(other),
        }
    }

    /// Channel classification for this codec.
    pub fn apply(&self) -> TsPidApply {
        match self {
            TsStream::H264 | TsStream::Hevc => TsPidApply::Video,
            TsStream::AacAdts => TsPidApply::Audio,
            // MPEG-1/2 audio and private PES are still audio-shaped for
            // the purpose of the private-stream-1 remap.
            TsStream::Other(0x03) | TsStream::Other(0x04) | TsStream::Other(0x11) => {
                TsPidApply::Audio
            }
            TsStream::Other(0x01) | TsStream::Other(0x02) | TsStream::Other(0x10) => {
                TsPidApply::Video
            }
            TsStream::Other(_) => TsPidApply::Reserved,
        }
    }
}

/// One completed PES message.
#[derive(Debug, Clone)]
pub struct TsMessage {
    /// PES stream id byte.
    pub sid: u8,
    /// Channel classification of the carrying PID.
    pub apply: TsPidApply,
    /// Elementary stream codec.
    pub stream: TsStream,
    /// Decode timestamp, 90 kHz. Equal to `pts` when the PES carried none.
    pub dts: i64,
    /// Presentation timestamp, 90 kHz.
    pub pts: i64,
    /// Reassembled elementary stream payload.
    pub payload: Bytes,
}

impl TsMessage {
    /// True when the stream id is in the common audio range (110x_xxxx).
    pub fn is_audio(&self) -> bool {
        self.sid & 0xE0 == 0xC0
    }

    /// True when the stream id is in the common video range (1110_xxxx).
    pub fn is_video(&self) -> bool {
        self.sid & 0xF0 == 0xE0
    }

    /// Substream number within the audio/video stream id ranges.
    ///
    /// `None` when the stream id is neither common audio nor common video.
    pub fn stream_number(&self) -> Option<u8> {
        if self.is_audio() {
            Some(self.sid & 0x1F)
        } else if self.is_video() {
            Some(self.sid & 0x0F)
        } else {
            None
        }
    }
}
