//! Downstream RTMP sink interface
//!
//! The frame builder hands finished FLV tagged messages to a [`StreamBridge`].
//! The bridge is the boundary of this crate: everything past `on_frame` (RTMP
//! chunking, sessions, edge distribution) belongs to the downstream stack.

use bytes::Bytes;

use crate::error::BridgeError;

/// Kind of RTMP message produced by the frame builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtmpFrameType {
    Video,
    Audio,
}

/// An RTMP message carrying one FLV tag payload.
///
/// Cheap to clone: the payload is reference-counted.
#[derive(Debug, Clone)]
pub struct RtmpMessage {
    /// Message kind.
    pub frame_type: RtmpFrameType,
    /// Timestamp in milliseconds (FLV timebase; dts for video, pts for audio).
    pub timestamp: u32,
    /// RTMP message stream id.
    pub stream_id: u32,
    /// FLV tag payload, codec headers included.
    pub payload: Bytes,
}

impl RtmpMessage {
    /// A video message.
    pub fn video(timestamp: u32, stream_id: u32, payload: Bytes) -> Self {
        Self {
            frame_type: RtmpFrameType::Video,
            timestamp,
            stream_id,
            payload,
        }
    }

    /// An audio message.
    pub fn audio(timestamp: u32, stream_id: u32, payload: Bytes) -> Self {
        Self {
            frame_type: RtmpFrameType::Audio,
            timestamp,
            stream_id,
            payload,
        }
    }

    /// True for video payloads tagged as keyframes.
    pub fn is_keyframe(&self) -> bool {
        self.frame_type == RtmpFrameType::Video
            && self
                .payload
                .first()
                .map(|b| (b >> 4) & 0x0F == 1)
                .unwrap_or(false)
    }

    /// True for AVC/HEVC sequence header messages (packet type byte = 0).
    pub fn is_video_sequence_header(&self) -> bool {
        self.frame_type == RtmpFrameType::Video
            && self.payload.len() >= 2
            && self.payload[1] == 0
    }

    /// True for AAC sequence header messages (0xAF 0x00 ...).
    pub fn is_aac_sequence_header(&self) -> bool {
        self.frame_type == RtmpFrameType::Audio
            && self.payload.len() >= 2
            && self.payload[0] == 0xAF
            && self.payload[1] == 0
    }
}

/// A sink accepting the RTMP side of a bridged SRT stream.
///
/// Calls arrive in publish order. An error from `on_frame` aborts the
/// remaining dispatches of the current PES message, maintaining strict
/// frame ordering downstream.
pub trait StreamBridge: Send {
    /// The bridged stream is starting.
    fn on_publish(&mut self) -> Result<(), BridgeError>;

    /// One finished RTMP/FLV tagged message.
    fn on_frame(&mut self, frame: RtmpMessage) -> Result<(), BridgeError>;

    /// The bridged stream has stopped.
    fn on_unpublish(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyframe_detection() {
        let key = RtmpMessage::video(0, 1, Bytes::from_static(&[0x17, 0x01, 0, 0, 0]));
        assert!(key.is_keyframe());

        let inter = RtmpMessage::video(0, 1, Bytes::from_static(&[0x27, 0x01, 0, 0, 0]));
        assert!(!inter.is_keyframe());

        let audio = RtmpMessage::audio(0, 2, Bytes::from_static(&[0xAF, 0x01]));
        assert!(!audio.is_keyframe());
    }

    #[test]
    fn sequence_header_detection() {
        let video_sh = RtmpMessage::video(0, 1, Bytes::from_static(&[0x17, 0x00, 0, 0, 0]));
        assert!(video_sh.is_video_sequence_header());

        let audio_sh = RtmpMessage::audio(0, 2, Bytes::from_static(&[0xAF, 0x00, 0x12, 0x10]));
        assert!(audio_sh.is_aac_sequence_header());
        assert!(!audio_sh.is_video_sequence_header());

        let raw = RtmpMessage::audio(0, 2, Bytes::from_static(&[0xAF, 0x01, 0x21]));
        assert!(!raw.is_aac_sequence_header());
    }
}
