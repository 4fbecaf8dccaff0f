//! H.264/AVC bitstream helpers
//!
//! The TS side carries AVC as Annex-B (start-code delimited NAL units);
//! the FLV side wants AVCC (length-prefixed NALs plus an out-of-band
//! AVCDecoderConfigurationRecord). This module supplies the Annex-B
//! iterator and the decoder config muxer; the frame builder does the
//! per-message assembly.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::MediaError;

/// NAL unit type (lower 5 bits of the NAL header byte).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvcNaluType {
    /// Non-IDR slice.
    NonIdr = 1,
    /// IDR slice (keyframe).
    Idr = 5,
    /// Supplemental enhancement information.
    Sei = 6,
    /// Sequence parameter set.
    Sps = 7,
    /// Picture parameter set.
    Pps = 8,
    /// Access unit delimiter.
    Aud = 9,
}

impl AvcNaluType {
    /// Classify a NAL header byte.
    pub fn from_header(b: u8) -> Option<Self> {
        match b & 0x1F {
            1 => Some(AvcNaluType::NonIdr),
            5 => Some(AvcNaluType::Idr),
            6 => Some(AvcNaluType::Sei),
            7 => Some(AvcNaluType::Sps),
            8 => Some(AvcNaluType::Pps),
            9 => Some(AvcNaluType::Aud),
            _ => None,
        }
    }

    pub fn is_keyframe(&self) -> bool {
        matches!(self, AvcNaluType::Idr)
    }
}

/// Find the next 3- or 4-byte start code at or after `from`.
fn next_start_code(data: &[u8], from: usize) -> Option<(usize, usize)> {
    let mut i = from;
    while i + 3 <= data.len() {
        if data[i] == 0 && data[i + 1] == 0 {
            if data[i + 2] == 1 {
                return Some((i, 3));
            }
            if data[i + 2] == 0 && i + 4 <= data.len() && data[i + 3] == 1 {
                return Some((i, 4));
            }
        }
        i += 1;
    }
    None
}

/// Iterator over the NAL units of an Annex-B payload.
///
/// Construction fails when the payload does not begin with a start code;
/// empty NALs (back-to-back start codes) are skipped.
pub struct AnnexbIter<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> AnnexbIter<'a> {
    pub fn new(data: &'a [u8]) -> Result<Self, MediaError> {
        match next_start_code(data, 0) {
            Some((0, len)) => Ok(Self { data, offset: len }),
            _ => Err(MediaError::AnnexbStartCode),
        }
    }
}

impl<'a> Iterator for AnnexbIter<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        while self.offset < self.data.len() {
            let (end, next) = match next_start_code(self.data, self.offset) {
                Some((pos, len)) => (pos, pos + len),
                None => (self.data.len(), self.data.len()),
            };
            let nal = &self.data[self.offset..end];
            self.offset = next;
            if !nal.is_empty() {
                return Some(nal);
            }
        }
        None
    }
}

/// Mux an AVCDecoderConfigurationRecord from one SPS and one PPS.
///
/// Profile, compatibility and level are lifted straight from the SPS
/// payload; NAL lengths are fixed at 4 bytes.
pub fn mux_sequence_header(sps: &[u8], pps: &[u8]) -> Result<Bytes, MediaError> {
    if sps.len() < 4 {
        return Err(MediaError::SpsTooShort(sps.len()));
    }

    let mut record = BytesMut::with_capacity(11 + sps.len() + pps.len());
    record.put_u8(0x01); // configurationVersion
    record.put_u8(sps[1]); // AVCProfileIndication
    record.put_u8(sps[2]); // profile_compatibility
    record.put_u8(sps[3]); // AVCLevelIndication
    record.put_u8(0xFF); // lengthSizeMinusOne = 3
    record.put_u8(0xE1); // numOfSequenceParameterSets = 1
    record.put_u16(sps.len() as u16);
    record.put_slice(sps);
    record.put_u8(0x01); // numOfPictureParameterSets = 1
    record.put_u16(pps.len() as u16);
    record.put_slice(pps);
    Ok(record.freeze())
}
