//! AAC bitstream helpers
//!
//! The TS side carries AAC as self-framed ADTS; the FLV side wants raw
//! frames plus an out-of-band AudioSpecificConfig. This module demuxes
//! ADTS headers into codec fields and muxes the two-byte config record.
//!
//! ADTS header (7 bytes, 9 with CRC):
//! ```text
//! syncword (12) | ID (1) | layer (2) | protection_absent (1)
//! | profile (2) | sampling_frequency_index (4) | private (1)
//! | channel_configuration (3) | original (1) | home (1)
//! | copyright (1) | copyright_start (1) | frame_length (13)
//! | buffer_fullness (11) | number_of_frames (2)
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::MediaError;

use super::flv::AudioSampleRate;

/// Standard sampling frequencies by ADTS/ASC index.
const SAMPLING_FREQUENCIES: [u32; 16] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350, 0,
    0, 0,
];

/// Codec fields parsed from one ADTS frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AacCodec {
    /// Audio object type (ADTS profile + 1; 2 = AAC-LC).
    pub object_type: u8,
    /// Sampling frequency index into the standard table.
    pub sampling_frequency_index: u8,
    /// Channel configuration (1 = mono, 2 = stereo, ...).
    pub channel_configuration: u8,
    /// FLV sound-rate category for this frame's real frequency.
    pub sound_rate: AudioSampleRate,
}

impl AacCodec {
    /// Real sampling frequency in Hz, 0 for reserved indices.
    pub fn frequency(&self) -> u32 {
        SAMPLING_FREQUENCIES[usize::from(self.sampling_frequency_index & 0x0F)]
    }
}

/// One demuxed ADTS frame: its codec fields and the raw AAC payload.
#[derive(Debug)]
pub struct AdtsFrame<'a> {
    pub codec: AacCodec,
    pub payload: &'a [u8],
}

/// Walks the ADTS frames of a PES payload.
pub struct AdtsDemuxer<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> AdtsDemuxer<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Demux the next frame; `None` when the payload is exhausted.
    pub fn next_frame(&mut self) -> Option<Result<AdtsFrame<'a>, MediaError>> {
        let remaining = &self.data[self.offset..];
        if remaining.is_empty() {
            return None;
        }
        Some(self.parse(remaining))
    }

    fn parse(&mut self, remaining: &'a [u8]) -> Result<AdtsFrame<'a>, MediaError> {
        if remaining.len() < 7 || remaining[0] != 0xFF || remaining[1] & 0xF0 != 0xF0 {
            return Err(MediaError::AdtsHeader);
        }

        let protection_absent = remaining[1] & 0x01 != 0;
        let header_len = if protection_absent { 7 } else { 9 };

        let frame_length = (usize::from(remaining[3] & 0x03) << 11)
            | (usize::from(remaining[4]) << 3)
            | usize::from(remaining[5] >> 5);
        if frame_length < header_len {
            return Err(MediaError::AdtsHeader);
        }
        if frame_length > remaining.len() {
            return Err(MediaError::AdtsFrameLength {
                length: frame_length,
                remaining: remaining.len(),
            });
        }

        let sampling_frequency_index = (remaining[2] >> 2) & 0x0F;
        let codec = AacCodec {
            object_type: (remaining[2] >> 6) + 1,
            sampling_frequency_index,
            channel_configuration: ((remaining[2] & 0x01) << 2) | (remaining[3] >> 6),
            sound_rate: AudioSampleRate::from_hz(
                SAMPLING_FREQUENCIES[usize::from(sampling_frequency_index)],
            ),
        };

        self.offset += frame_length;
        Ok(AdtsFrame {
            codec,
            payload: &remaining[header_len..frame_length],
        })
    }
}

/// Mux the two-byte AudioSpecificConfig for these codec fields.
pub fn mux_audio_specific_config(codec: &AacCodec) -> Bytes {
    let mut config = BytesMut::with_capacity(2);
    config.put_u8(
        (codec.object_type << 3) | ((codec.sampling_frequency_index >> 1) & 0x07),
    );
    config.put_u8(
        ((codec.sampling_frequency_index & 0x01) << 7)
            | ((codec.channel_configuration & 0x0F) << 3),
    );
    config.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::es_fixture::adts_frame;

    #[test]
    fn demuxes_two_frames() {
        let mut data = adts_frame(4, 2, &[0x21, 0x00, 0x49]);
        data.extend_from_slice(&adts_frame(4, 2, &[0x90, 0x02]));

        let mut demuxer = AdtsDemuxer::new(&data);

        let first = demuxer.next_frame().unwrap().unwrap();
        assert_eq!(first.codec.object_type, 2);
        assert_eq!(first.codec.sampling_frequency_index, 4);
        assert_eq!(first.codec.channel_configuration, 2);
        assert_eq!(first.codec.frequency(), 44100);
        assert_eq!(first.payload, &[0x21, 0x00, 0x49]);

        let second = demuxer.next_frame().unwrap().unwrap();
        assert_eq!(second.payload, &[0x90, 0x02]);

        assert!(demuxer.next_frame().is_none());
    }

    #[test]
    fn rate_categories() {
        // Index 3 = 48 kHz: categorized as 44100 for timestamp math.
        let data = adts_frame(3, 2, &[0x00]);
        let frame = AdtsDemuxer::new(&data).next_frame().unwrap().unwrap();
        assert_eq!(frame.codec.frequency(), 48000);
        assert_eq!(frame.codec.sound_rate, AudioSampleRate::Rate44100);

        // Index 7 = 22050.
        let data = adts_frame(7, 1, &[0x00]);
        let frame = AdtsDemuxer::new(&data).next_frame().unwrap().unwrap();
        assert_eq!(frame.codec.sound_rate, AudioSampleRate::Rate22050);
    }

    #[test]
    fn rejects_bad_syncword() {
        let mut demuxer = AdtsDemuxer::new(&[0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06]);
        assert!(matches!(
            demuxer.next_frame(),
            Some(Err(MediaError::AdtsHeader))
        ));
    }

    #[test]
    fn rejects_truncated_frame() {
        let mut data = adts_frame(4, 2, &[0x01, 0x02, 0x03, 0x04]);
        data.truncate(data.len() - 2);
        let mut demuxer = AdtsDemuxer::new(&data);
        assert!(matches!(
            demuxer.next_frame(),
            Some(Err(MediaError::AdtsFrameLength { .. }))
        ));
    }

    #[test]
    fn audio_specific_config_layout() {
        // AAC-LC, 44.1 kHz (index 4), stereo → 0x12 0x10.
        let codec = AacCodec {
            object_type: 2,
            sampling_frequency_index: 4,
            channel_configuration: 2,
            sound_rate: AudioSampleRate::Rate44100,
        };
        assert_eq!(&mux_audio_specific_config(&codec)[..], &[0x12, 0x10]);

        // AAC-LC, 48 kHz (index 3), stereo → 0x11 0x90.
        let codec = AacCodec {
            object_type: 2,
            sampling_frequency_index: 3,
            channel_configuration: 2,
            sound_rate: AudioSampleRate::Rate44100,
        };
        assert_eq!(&mux_audio_specific_config(&codec)[..], &[0x11, 0x90]);
    }
}
