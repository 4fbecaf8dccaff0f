//! Stateful TS demuxer
//!
//! [`TsContext`] consumes one 188-byte cell at a time and returns the PES
//! messages that completed with it. PID→codec mapping is learned from the
//! stream's own PAT/PMT; cells for unknown PIDs are ignored so a subscriber
//! can join mid-stream without erroring until tables repeat.

use std::collections::HashMap;

use bytes::BytesMut;

use crate::error::TsError;

use super::message::{TsMessage, TsPidApply, TsStream};
use super::{TS_PACKET_SIZE, TS_SYNC_BYTE};

/// What we know about a PID, learned from PAT/PMT.
#[derive(Debug, Clone, Copy)]
struct TsChannel {
    apply: TsPidApply,
    stream: TsStream,
}

/// A PES packet being reassembled across cells.
#[derive(Debug)]
struct PesAssembler {
    sid: u8,
    dts: i64,
    pts: i64,
    /// Declared ES payload length; 0 means unbounded (completes at the
    /// next payload unit start on the same PID).
    expected: usize,
    payload: BytesMut,
}

/// Stateful PES reassembler over a sequence of TS cells.
#[derive(Debug, Default)]
pub struct TsContext {
    channels: HashMap<u16, TsChannel>,
    assemblers: HashMap<u16, PesAssembler>,
}

impl TsContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one TS cell, returning any PES messages it completed.
    pub fn decode(&mut self, cell: &[u8]) -> Result<Vec<TsMessage>, TsError> {
        if cell.len() != TS_PACKET_SIZE {
            return Err(TsError::CellSize(cell.len()));
        }
        if cell[0] != TS_SYNC_BYTE {
            return Err(TsError::SyncByte(cell[0]));
        }

        let unit_start = cell[1] & 0x40 != 0;
        let pid = u16::from(cell[1] & 0x1F) << 8 | u16::from(cell[2]);
        let adaptation = (cell[3] >> 4) & 0x03;

        let mut offset = 4;
        if adaptation & 0x02 != 0 {
            offset += 1 + cell[4] as usize;
            if offset > TS_PACKET_SIZE {
                return Err(TsError::Section("adaptation field"));
            }
        }
        if adaptation & 0x01 == 0 || offset >= TS_PACKET_SIZE {
            // Adaptation-only cell, nothing to demux.
            return Ok(Vec::new());
        }
        let payload = &cell[offset..];

        if pid == 0 {
            if unit_start {
                self.parse_pat(payload)?;
            }
            return Ok(Vec::new());
        }

        match self.channels.get(&pid).copied() {
            Some(channel) if channel.apply == TsPidApply::Pmt => {
                if unit_start {
                    self.parse_pmt(payload)?;
                }
                Ok(Vec::new())
            }
            Some(channel)
                if channel.apply == TsPidApply::Audio
                    || channel.apply == TsPidApply::Video =>
            {
                self.on_pes_payload(pid, channel, unit_start, payload)
            }
            // Unknown or reserved PID: skip until tables tell us more.
            _ => Ok(Vec::new()),
        }
    }

    /// Strip the PSI pointer field preceding a section at a unit start.
    fn section_at_unit_start(payload: &[u8]) -> Result<&[u8], TsError> {
        let pointer = *payload.first().ok_or(TsError::Section("PSI"))? as usize;
        payload
            .get(1 + pointer..)
            .ok_or(TsError::Section("PSI"))
    }

    fn parse_pat(&mut self, payload: &[u8]) -> Result<(), TsError> {
        let section = Self::section_at_unit_start(payload)?;
        if section.len() < 12 || section[0] != 0x00 {
            return Err(TsError::Section("PAT"));
        }

        let section_length = usize::from(section[1] & 0x0F) << 8 | usize::from(section[2]);
        let end = 3 + section_length;
        if end > section.len() || section_length < 9 {
            return Err(TsError::Section("PAT"));
        }

        // Program loop: 4-byte entries up to the CRC.
        let mut idx = 8;
        while idx + 4 <= end - 4 {
            let program = u16::from(section[idx]) << 8 | u16::from(section[idx + 1]);
            let map_pid =
                u16::from(section[idx + 2] & 0x1F) << 8 | u16::from(section[idx + 3]);
            if program != 0 {
                self.channels.insert(
                    map_pid,
                    TsChannel {
                        apply: TsPidApply::Pmt,
                        stream: TsStream::Other(0),
                    },
                );
            }
            idx += 4;
        }
        Ok(())
    }

    fn parse_pmt(&mut self, payload: &[u8]) -> Result<(), TsError> {
        let section = Self::section_at_unit_start(payload)?;
        if section.len() < 16 || section[0] != 0x02 {
            return Err(TsError::Section("PMT"));
        }

        let section_length = usize::from(section[1] & 0x0F) << 8 | usize::from(section[2]);
        let end = 3 + section_length;
        if end > section.len() || section_length < 13 {
            return Err(TsError::Section("PMT"));
        }

        let program_info_length =
            usize::from(section[10] & 0x0F) << 8 | usize::from(section[11]);
        let mut idx = 12 + program_info_length;

        // Elementary stream loop, up to the CRC.
        while idx + 5 <= end - 4 {
            let stream = TsStream::from_stream_type(section[idx]);
            let es_pid =
                u16::from(section[idx + 1] & 0x1F) << 8 | u16::from(section[idx + 2]);
            let es_info_length =
                usize::from(section[idx + 3] & 0x0F) << 8 | usize::from(section[idx + 4]);
            idx += 5 + es_info_length;

            self.channels.insert(
                es_pid,
                TsChannel {
                    apply: stream.apply(),
                    stream,
                },
            );
        }
        Ok(())
    }

    fn on_pes_payload(
        &mut self,
        pid: u16,
        channel: TsChannel,
        unit_start: bool,
        payload: &[u8],
    ) -> Result<Vec<TsMessage>, TsError> {
        let mut completed = Vec::new();

        if unit_start {
            // A new PES packet terminates any unbounded one in flight.
            if let Some(assembler) = self.assemblers.remove(&pid) {
                completed.push(Self::finish(assembler, channel));
            }

            let mut assembler = Self::parse_pes_header(pid, payload)?;
            if Self::append(&mut assembler, &[]) {
                completed.push(Self::finish(assembler, channel));
            } else {
                self.assemblers.insert(pid, assembler);
            }
        } else if let Some(assembler) = self.assemblers.get_mut(&pid) {
            if Self::append(assembler, payload) {
                if let Some(assembler) = self.assemblers.remove(&pid) {
                    completed.push(Self::finish(assembler, channel));
                }
            }
        }
        // Continuation for a PID with nothing in flight: mid-stream join,
        // drop until the next unit start.

        Ok(completed)
    }

    /// Parse the PES header at a unit start, returning an assembler already
    /// holding the cell's ES bytes.
    fn parse_pes_header(pid: u16, payload: &[u8]) -> Result<PesAssembler, TsError> {
        if payload.len() < 9
            || payload[0] != 0x00
            || payload[1] != 0x00
            || payload[2] != 0x01
        {
            return Err(TsError::PesHeader { pid });
        }

        let sid = payload[3];
        let pes_packet_length =
            usize::from(payload[4]) << 8 | usize::from(payload[5]);
        if payload[6] >> 6 != 0b10 {
            return Err(TsError::PesHeader { pid });
        }
        let pts_dts_flags = (payload[7] >> 6) & 0x03;
        let header_data_length = payload[8] as usize;

        let es_start = 9 + header_data_length;
        if es_start > payload.len() {
            return Err(TsError::PesHeader { pid });
        }

        let (pts, dts) = match pts_dts_flags {
            0b10 => {
                let pts = Self::parse_timestamp(payload.get(9..14), pid)?;
                (pts, pts)
            }
            0b11 => {
                let pts = Self::parse_timestamp(payload.get(9..14), pid)?;
                let dts = Self::parse_timestamp(payload.get(14..19), pid)?;
                (pts, dts)
            }
            _ => (0, 0),
        };

        // PES_packet_length counts everything after its own field; zero
        // means unbounded (common for video).
        let expected = if pes_packet_length > 0 {
            pes_packet_length
                .checked_sub(3 + header_data_length)
                .ok_or(TsError::PesHeader { pid })?
        } else {
            0
        };

        let mut assembler = PesAssembler {
            sid,
            dts,
            pts,
            expected,
            payload: BytesMut::with_capacity(expected.max(payload.len() - es_start)),
        };
        assembler.payload.extend_from_slice(&payload[es_start..]);
        Ok(assembler)
    }

    /// Append continuation bytes. True when a bounded PES is now complete.
    fn append(assembler: &mut PesAssembler, data: &[u8]) -> bool {
        assembler.payload.extend_from_slice(data);
        if assembler.expected > 0 && assembler.payload.len() >= assembler.expected {
            assembler.payload.truncate(assembler.expected);
            return true;
        }
        false
    }

    fn finish(assembler: PesAssembler, channel: TsChannel) -> TsMessage {
        TsMessage {
            sid: assembler.sid,
            apply: channel.apply,
            stream: channel.stream,
            dts: assembler.dts,
            pts: assembler.pts,
            payload: assembler.payload.freeze(),
        }
    }

    /// Decode a 33-bit PTS/DTS field (5 bytes with marker bits).
    fn parse_timestamp(bytes: Option<&[u8]>, pid: u16) -> Result<i64, TsError> {
        let b = bytes.ok_or(TsError::PesHeader { pid })?;
        if b.len() < 5 {
            return Err(TsError::PesHeader { pid });
        }
        Ok((i64::from((b[0] >> 1) & 0x07) << 30)
            | (i64::from(b[1]) << 22)
            | (i64::from(b[2] >> 1) << 15)
            | (i64::from(b[3]) << 7)
            | i64::from(b[4] >> 1))
    }
}
