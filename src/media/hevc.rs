//! H.265/HEVC bitstream helpers
//!
//! HEVC NAL headers are two bytes; the unit type lives in bits 6..1 of the
//! first byte. Parameter sets are VPS/SPS/PPS, and a frame is a keyframe
//! when any of its NALs is an IRAP unit (BLA through the reserved IRAP
//! range).

use bytes::{BufMut, Bytes, BytesMut};

/// nal_unit_type values this crate cares about.
pub const NALU_TYPE_BLA_W_LP: u8 = 16;
pub const NALU_TYPE_RSV_IRAP_VCL23: u8 = 23;
pub const NALU_TYPE_VPS: u8 = 32;
pub const NALU_TYPE_SPS: u8 = 33;
pub const NALU_TYPE_PPS: u8 = 34;

/// Extract nal_unit_type from the first NAL header byte.
pub fn nalu_type(header: u8) -> u8 {
    (header >> 1) & 0x3F
}

pub fn is_vps(header: u8) -> bool {
    nalu_type(header) == NALU_TYPE_VPS
}

pub fn is_sps(header: u8) -> bool {
    nalu_type(header) == NALU_TYPE_SPS
}

pub fn is_pps(header: u8) -> bool {
    nalu_type(header) == NALU_TYPE_PPS
}

/// True for IRAP units: BLA_W_LP (16) through RSV_IRAP_VCL23 (23).
pub fn is_keyframe(header: u8) -> bool {
    (NALU_TYPE_BLA_W_LP..=NALU_TYPE_RSV_IRAP_VCL23).contains(&nalu_type(header))
}

/// Mux an HEVCDecoderConfigurationRecord from the current parameter sets.
///
/// Profile/tier/level fields are filled with Main-profile defaults rather
/// than re-parsed from the SPS; decoders read the authoritative values from
/// the parameter set NALs carried in the arrays.
pub fn mux_sequence_header(vps: &[u8], sps: &[u8], pps_list: &[Bytes]) -> Bytes {
    let nal_bytes: usize = pps_list.iter().map(|p| 3 + p.len()).sum();
    let mut record = BytesMut::with_capacity(23 + 10 + vps.len() + sps.len() + nal_bytes);

    record.put_u8(0x01); // configurationVersion
    record.put_u8(0x01); // profile_space(2)=0, tier(1)=0, profile_idc(5)=Main
    record.put_u32(0x6000_0000); // general_profile_compatibility_flags
    record.put_uint(0, 6); // general_constraint_indicator_flags
    record.put_u8(0x5D); // general_level_idc = 93 (level 3.1)
    record.put_u16(0xF000); // min_spatial_segmentation_idc
    record.put_u8(0xFC); // parallelismType
    record.put_u8(0xFD); // chroma_format_idc = 1 (4:2:0)
    record.put_u8(0xF8); // bit_depth_luma_minus8 = 0
    record.put_u8(0xF8); // bit_depth_chroma_minus8 = 0
    record.put_u16(0); // avgFrameRate
    // constantFrameRate=0, numTemporalLayers=1, temporalIdNested=1,
    // lengthSizeMinusOne=3
    record.put_u8(0x0F);

    record.put_u8(3); // numOfArrays: vps, sps, pps

    record.put_u8(0x80 | NALU_TYPE_VPS);
    record.put_u16(1);
    record.put_u16(vps.len() as u16);
    record.put_slice(vps);

    record.put_u8(0x80 | NALU_TYPE_SPS);
    record.put_u16(1);
    record.put_u16(sps.len() as u16);
    record.put_slice(sps);

    record.put_u8(0x80 | NALU_TYPE_PPS);
    record.put_u16(pps_list.len() as u16);
    for pps in pps_list {
        record.put_u16(pps.len() as u16);
        record.put_slice(pps);
    }

    record.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    // HEVC NAL header first bytes: type << 1.
    const VPS_HDR: u8 = NALU_TYPE_VPS << 1; // 0x40
    const SPS_HDR: u8 = NALU_TYPE_SPS << 1; // 0x42
    const PPS_HDR: u8 = NALU_TYPE_PPS << 1; // 0x44
    const IDR_W_RADL_HDR: u8 = 19 << 1; // 0x26

    #[test]
    fn classification() {
        assert!(is_vps(VPS_HDR));
        assert!(is_sps(SPS_HDR));
        assert!(is_pps(PPS_HDR));
        assert!(!is_vps(SPS_HDR));
    }

    #[test]
    fn keyframe_range() {
        assert!(is_keyframe(IDR_W_RADL_HDR));
        assert!(is_keyframe(NALU_TYPE_BLA_W_LP << 1));
        assert!(is_keyframe(NALU_TYPE_RSV_IRAP_VCL23 << 1));
        assert!(!is_keyframe(1 << 1)); // TRAIL_R
        assert!(!is_keyframe(VPS_HDR));
    }

    #[test]
    fn sequence_header_carries_all_arrays() {
        let vps = [VPS_HDR, 0x01, 0x0C];
        let sps = [SPS_HDR, 0x01, 0x02, 0x03];
        let pps_list = vec![
            Bytes::from_static(&[PPS_HDR, 0xC1]),
            Bytes::from_static(&[PPS_HDR, 0xC2, 0xC3]),
        ];

        let record = mux_sequence_header(&vps, &sps, &pps_list);

        assert_eq!(record[0], 0x01);
        assert_eq!(record[22], 3); // numOfArrays

        // VPS array.
        let mut idx = 23;
        assert_eq!(record[idx], 0x80 | NALU_TYPE_VPS);
        assert_eq!(&record[idx + 1..idx + 3], &[0x00, 0x01]);
        assert_eq!(&record[idx + 3..idx + 5], &[0x00, 0x03]);
        assert_eq!(&record[idx + 5..idx + 8], &vps);

        // SPS array.
        idx += 5 + vps.len();
        assert_eq!(record[idx], 0x80 | NALU_TYPE_SPS);
        assert_eq!(&record[idx + 5..idx + 5 + sps.len()], &sps);

        // PPS array holds both parameter sets.
        idx += 5 + sps.len();
        assert_eq!(record[idx], 0x80 | NALU_TYPE_PPS);
        assert_eq!(&record[idx + 1..idx + 3], &[0x00, 0x02]);
    }
}
