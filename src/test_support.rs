//! Shared test fixtures
//!
//! Hand-built TS cells, elementary-stream payloads and a recording bridge,
//! used across the demuxer, frame builder and source tests.

pub(crate) mod ts_fixture {
    use crate::ts::TS_PACKET_SIZE;

    /// Build one TS cell for `pid` carrying `payload`, padding with an
    /// adaptation field of stuffing bytes when the payload is short.
    pub(crate) fn ts_cell(pid: u16, unit_start: bool, payload: &[u8]) -> [u8; TS_PACKET_SIZE] {
        assert!(payload.len() <= 184, "payload too large for one cell");

        let mut cell = [0xFFu8; TS_PACKET_SIZE];
        cell[0] = 0x47;
        cell[1] = (if unit_start { 0x40 } else { 0x00 }) | (pid >> 8) as u8;
        cell[2] = (pid & 0xFF) as u8;

        if payload.len() == 184 {
            cell[3] = 0x10; // payload only
            cell[4..].copy_from_slice(payload);
        } else {
            cell[3] = 0x30; // adaptation + payload
            let af_len = 183 - payload.len();
            cell[4] = af_len as u8;
            if af_len > 0 {
                cell[5] = 0x00; // adaptation flags, rest is stuffing
            }
            let start = 5 + af_len;
            cell[start..start + payload.len()].copy_from_slice(payload);
        }
        cell
    }

    /// A single-program PAT announcing `pmt_pid`.
    pub(crate) fn ts_cell_pat(pmt_pid: u16) -> [u8; TS_PACKET_SIZE] {
        let mut section = vec![
            0x00, // table_id
            0xB0, 0x0D, // section_length = 13
            0x00, 0x01, // transport_stream_id
            0xC1, // version, current_next
            0x00, 0x00, // section_number, last_section_number
            0x00, 0x01, // program_number 1
            0xE0 | (pmt_pid >> 8) as u8,
            (pmt_pid & 0xFF) as u8,
        ];
        section.extend_from_slice(&[0, 0, 0, 0]); // CRC (unchecked)

        let mut payload = vec![0x00]; // pointer field
        payload.extend_from_slice(&section);
        ts_cell(0, true, &payload)
    }

    /// A PMT on `pmt_pid` declaring `(stream_type, elementary_pid)` pairs.
    pub(crate) fn ts_cell_pmt(
        pmt_pid: u16,
        streams: &[(u8, u16)],
    ) -> [u8; TS_PACKET_SIZE] {
        let section_length = 9 + 5 * streams.len() + 4;
        let mut section = vec![
            0x02, // table_id
            0xB0 | ((section_length >> 8) & 0x0F) as u8,
            (section_length & 0xFF) as u8,
            0x00, 0x01, // program_number
            0xC1, // version, current_next
            0x00, 0x00, // section_number, last_section_number
            0xE1, 0x00, // PCR PID
            0xF0, 0x00, // program_info_length = 0
        ];
        for &(stream_type, es_pid) in streams {
            section.push(stream_type);
            section.push(0xE0 | (es_pid >> 8) as u8);
            section.push((es_pid & 0xFF) as u8);
            section.push(0xF0);
            section.push(0x00); // ES_info_length = 0
        }
        section.extend_from_slice(&[0, 0, 0, 0]); // CRC (unchecked)

        let mut payload = vec![0x00]; // pointer field
        payload.extend_from_slice(&section);
        ts_cell(pmt_pid, true, &payload)
    }

    /// Encode a 33-bit PTS/DTS field with marker bits.
    fn encode_timestamp(prefix: u8, value: i64) -> [u8; 5] {
        [
            (prefix << 4) | ((((value >> 30) as u8) & 0x07) << 1) | 1,
            (value >> 22) as u8,
            ((((value >> 15) as u8) & 0x7F) << 1) | 1,
            (value >> 7) as u8,
            (((value as u8) & 0x7F) << 1) | 1,
        ]
    }

    /// Build the TS cells of one bounded PES packet carrying `es`.
    ///
    /// Encodes PTS only when `pts == dts`, PTS+DTS otherwise.
    pub(crate) fn pes_cells(
        pid: u16,
        sid: u8,
        pts: i64,
        dts: i64,
        es: &[u8],
    ) -> Vec<[u8; TS_PACKET_SIZE]> {
        let (flags, header): (u8, Vec<u8>) = if pts == dts {
            (0x80, encode_timestamp(0b0010, pts).to_vec())
        } else {
            let mut h = encode_timestamp(0b0011, pts).to_vec();
            h.extend_from_slice(&encode_timestamp(0b0001, dts));
            (0xC0, h)
        };

        let pes_packet_length = 3 + header.len() + es.len();
        assert!(pes_packet_length <= u16::MAX as usize);

        let mut pes = vec![
            0x00,
            0x00,
            0x01,
            sid,
            (pes_packet_length >> 8) as u8,
            (pes_packet_length & 0xFF) as u8,
            0x80, // marker bits
            flags,
            header.len() as u8,
        ];
        pes.extend_from_slice(&header);
        pes.extend_from_slice(es);

        let mut cells = Vec::new();
        let mut chunks = pes.chunks(184);
        if let Some(first) = chunks.next() {
            cells.push(ts_cell(pid, true, first));
        }
        for chunk in chunks {
            cells.push(ts_cell(pid, false, chunk));
        }
        cells
    }
}

pub(crate) mod es_fixture {
    /// Join NAL units with 4-byte Annex-B start codes.
    pub(crate) fn annexb(nals: &[&[u8]]) -> Vec<u8> {
        let mut out = Vec::new();
        for nal in nals {
            out.extend_from_slice(&[0x00, 0x00, 0x00, 0x01]);
            out.extend_from_slice(nal);
        }
        out
    }

    /// Wrap an AAC payload in a 7-byte ADTS header (AAC-LC, no CRC).
    pub(crate) fn adts_frame(freq_index: u8, channels: u8, payload: &[u8]) -> Vec<u8> {
        let frame_length = payload.len() + 7;
        let profile = 1u8; // AAC-LC: audio_object_type 2, stored minus one
        let mut out = vec![
            0xFF,
            0xF1,
            ((profile & 0x03) << 6) | ((freq_index & 0x0F) << 2) | ((channels >> 2) & 0x01),
            ((channels & 0x03) << 6) | ((frame_length >> 11) & 0x03) as u8,
            ((frame_length >> 3) & 0xFF) as u8,
            (((frame_length & 0x07) << 5) | 0x1F) as u8,
            0xFC,
        ];
        out.extend_from_slice(payload);
        out
    }
}

pub(crate) mod bridge_fixture {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    use crate::bridge::{RtmpMessage, StreamBridge};
    use crate::error::BridgeError;

    /// Frames collected by a [`RecordingBridge`].
    pub(crate) type FrameLog = Arc<Mutex<Vec<RtmpMessage>>>;

    /// Bridge that records every call; optionally fails from frame N on.
    pub(crate) struct RecordingBridge {
        pub frames: FrameLog,
        pub published: Arc<AtomicBool>,
        pub unpublished: Arc<AtomicBool>,
        pub fail_from_frame: Option<usize>,
    }

    impl RecordingBridge {
        pub(crate) fn new() -> Self {
            Self {
                frames: Arc::new(Mutex::new(Vec::new())),
                published: Arc::new(AtomicBool::new(false)),
                unpublished: Arc::new(AtomicBool::new(false)),
                fail_from_frame: None,
            }
        }

        pub(crate) fn failing_from(frame: usize) -> Self {
            let mut bridge = Self::new();
            bridge.fail_from_frame = Some(frame);
            bridge
        }

        pub(crate) fn log(&self) -> FrameLog {
            Arc::clone(&self.frames)
        }
    }

    impl StreamBridge for RecordingBridge {
        fn on_publish(&mut self) -> Result<(), BridgeError> {
            self.published.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn on_frame(&mut self, frame: RtmpMessage) -> Result<(), BridgeError> {
            let mut frames = self.frames.lock().unwrap();
            if let Some(limit) = self.fail_from_frame {
                if frames.len() >= limit {
                    return Err(BridgeError::new("downstream rejected frame"));
                }
            }
            frames.push(frame);
            Ok(())
        }

        fn on_unpublish(&mut self) {
            self.unpublished.store(true, Ordering::SeqCst);
        }
    }
}
