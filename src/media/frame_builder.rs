//! TS→RTMP frame builder
//!
//! [`SrtFrameBuilder`] is the stateful transcoder between the TS demuxer and
//! the RTMP bridge. It tracks the current codec parameter sets, emits
//! sequence-header tags when they change, wraps Annex-B NALs as AVCC, and
//! converts ADTS AAC to FLV audio with per-frame timestamps rebuilt from the
//! PES base PTS.
//!
//! Timebase: TS runs at 90 kHz, FLV at 1 kHz; every timestamp is divided by
//! 90 with integer math.

use std::time::{Duration, Instant};

use bytes::{BufMut, Bytes, BytesMut};

use crate::bridge::{RtmpMessage, StreamBridge};
use crate::config::RelayConfig;
use crate::error::{BridgeError, FrameError};
use crate::packet::SrtPacket;
use crate::request::SrtRequest;
use crate::ts::{
    TsContext, TsMessage, TsPidApply, TsStream, PES_STREAM_ID_AUDIO_COMMON,
    PES_STREAM_ID_PRIVATE_STREAM_1, TS_PACKET_SIZE,
};

use super::aac::{self, AdtsDemuxer};
use super::avc::{self, AnnexbIter, AvcNaluType};
use super::flv::{
    self, VideoCodecId, VideoFrameType, AAC_AUDIO_FLAGS, AAC_PACKET_TYPE_RAW,
    AAC_PACKET_TYPE_SEQUENCE_HEADER, AVC_PACKET_TYPE_NALU, AVC_PACKET_TYPE_SEQUENCE_HEADER,
};
use super::hevc;

/// Samples per AAC frame.
const AAC_SAMPLES_PER_FRAME: u64 = 1024;

/// RTMP message stream id for video.
const VIDEO_STREAM_ID: u32 = 1;

/// RTMP message stream id for audio.
const AUDIO_STREAM_ID: u32 = 2;

/// Stateful TS→RTMP transcoder feeding one [`StreamBridge`].
pub struct SrtFrameBuilder {
    ts_ctx: TsContext,
    bridge: Box<dyn StreamBridge>,
    req: Option<SrtRequest>,

    // AVC parameter sets.
    sps: Bytes,
    pps: Bytes,
    sps_pps_change: bool,

    // HEVC parameter sets. The PPS list is replaced wholesale by each
    // message that carries PPS NALs.
    hevc_vps: Bytes,
    hevc_sps: Bytes,
    hevc_pps: Vec<Bytes>,
    vps_sps_pps_change: bool,

    // Current AAC AudioSpecificConfig.
    audio_sh: Bytes,
    audio_sh_change: bool,

    video_stream_id: u32,
    audio_stream_id: u32,

    audio_warn_duration_ms: u32,
    audio_warn: LogThrottle,
}

impl SrtFrameBuilder {
    /// A frame builder dispatching to `bridge`, with default configuration.
    pub fn new(bridge: Box<dyn StreamBridge>) -> Self {
        Self::with_config(bridge, &RelayConfig::default())
    }

    /// A frame builder dispatching to `bridge`.
    pub fn with_config(bridge: Box<dyn StreamBridge>, config: &RelayConfig) -> Self {
        Self {
            ts_ctx: TsContext::new(),
            bridge,
            req: None,
            sps: Bytes::new(),
            pps: Bytes::new(),
            sps_pps_change: false,
            hevc_vps: Bytes::new(),
            hevc_sps: Bytes::new(),
            hevc_pps: Vec::new(),
            vps_sps_pps_change: false,
            audio_sh: Bytes::new(),
            audio_sh_change: false,
            video_stream_id: VIDEO_STREAM_ID,
            audio_stream_id: AUDIO_STREAM_ID,
            audio_warn_duration_ms: config.audio_warn_duration_ms,
            audio_warn: LogThrottle::new(config.audio_warn_interval),
        }
    }

    /// Snapshot the publishing request.
    pub fn initialize(&mut self, req: &SrtRequest) {
        self.req = Some(req.clone());
    }

    /// Start the downstream bridge.
    pub fn on_publish(&mut self) -> Result<(), BridgeError> {
        if let Some(req) = &self.req {
            tracing::debug!(stream = %req, "frame builder start");
        }
        self.bridge.on_publish()
    }

    /// Stop the downstream bridge.
    pub fn on_unpublish(&mut self) {
        self.bridge.on_unpublish();
    }

    /// Feed one transport packet of TS bytes.
    ///
    /// The payload is split into whole 188-byte cells; bytes past the last
    /// complete cell are discarded. Decode and per-message failures are
    /// logged and skipped, never propagated: the transport already handles
    /// loss, so one bad cell must not tear down the publish path.
    pub fn on_packet(&mut self, packet: &SrtPacket) -> Result<(), FrameError> {
        for cell in packet.data().chunks_exact(TS_PACKET_SIZE) {
            let messages = match self.ts_ctx.decode(cell) {
                Ok(messages) => messages,
                Err(err) => {
                    tracing::warn!(error = %err, "failed to parse ts cell");
                    continue;
                }
            };
            for message in messages {
                if let Err(err) = self.on_ts_message(message) {
                    tracing::warn!(error = %err, "failed to bridge ts message");
                }
            }
        }
        Ok(())
    }

    /// Transform one completed PES message into RTMP frames.
    pub fn on_ts_message(&mut self, mut msg: TsMessage) -> Result<(), FrameError> {
        // Some muxers put AAC under private stream 1; treat it as the
        // common audio stream id.
        if msg.apply == TsPidApply::Audio && msg.sid == PES_STREAM_ID_PRIVATE_STREAM_1 {
            msg.sid = PES_STREAM_ID_AUDIO_COMMON;
        }

        if msg.stream_number() != Some(0) {
            return Err(FrameError::UnsupportedStreamFormat {
                sid: msg.sid,
                stream_number: msg.stream_number().map(i32::from).unwrap_or(-1),
            });
        }

        match msg.stream {
            TsStream::H264 => self.on_ts_video_avc(&msg),
            TsStream::Hevc => self.on_ts_video_hevc(&msg),
            TsStream::AacAdts => self.on_ts_audio(&msg),
            other => Err(FrameError::UnsupportedCodec(other)),
        }
    }

    fn on_ts_video_avc(&mut self, msg: &TsMessage) -> Result<(), FrameError> {
        let mut ipb_frames: Vec<&[u8]> = Vec::new();

        for nal in AnnexbIter::new(&msg.payload).map_err(FrameError::Demux)? {
            match AvcNaluType::from_header(nal[0]) {
                Some(AvcNaluType::Sps) => {
                    if self.sps.as_ref() != nal {
                        self.sps_pps_change = true;
                    }
                    self.sps = Bytes::copy_from_slice(nal);
                }
                Some(AvcNaluType::Pps) => {
                    if self.pps.as_ref() != nal {
                        self.sps_pps_change = true;
                    }
                    self.pps = Bytes::copy_from_slice(nal);
                }
                _ => ipb_frames.push(nal),
            }
        }

        self.check_sps_pps_change(msg)?;
        self.on_avc_frame(msg, &ipb_frames)
    }

    /// Emit a fresh AVC sequence header when the parameter sets changed.
    fn check_sps_pps_change(&mut self, msg: &TsMessage) -> Result<(), FrameError> {
        if !self.sps_pps_change {
            return Ok(());
        }
        if self.sps.is_empty() || self.pps.is_empty() {
            return Err(FrameError::EmptySpsPps);
        }
        self.sps_pps_change = false;

        let dts = (msg.dts / 90) as u32;
        let record = avc::mux_sequence_header(&self.sps, &self.pps).map_err(FrameError::Mux)?;

        let mut payload = BytesMut::with_capacity(5 + record.len());
        payload.put_u8(flv::video_tag_header(
            VideoFrameType::Keyframe,
            VideoCodecId::Avc,
        ));
        payload.put_u8(AVC_PACKET_TYPE_SEQUENCE_HEADER);
        payload.put_uint(0, 3); // composition time
        payload.put_slice(&record);

        let frame = RtmpMessage::video(dts, self.video_stream_id, payload.freeze());
        self.bridge.on_frame(frame).map_err(FrameError::Bridge)
    }

    fn on_avc_frame(&mut self, msg: &TsMessage, ipb_frames: &[&[u8]]) -> Result<(), FrameError> {
        if ipb_frames.is_empty() {
            return Err(FrameError::EmptyFrame);
        }

        let dts = (msg.dts / 90) as u32;
        let pts = (msg.pts / 90) as u32;
        let cts = i64::from(pts) - i64::from(dts);

        let keyframe = ipb_frames
            .iter()
            .any(|nal| AvcNaluType::from_header(nal[0]) == Some(AvcNaluType::Idr));
        let frame_type = if keyframe {
            VideoFrameType::Keyframe
        } else {
            VideoFrameType::InterFrame
        };

        let nalus_len: usize = ipb_frames.iter().map(|nal| 4 + nal.len()).sum();
        let mut payload = BytesMut::with_capacity(5 + nalus_len);
        payload.put_u8(flv::video_tag_header(frame_type, VideoCodecId::Avc));
        payload.put_u8(AVC_PACKET_TYPE_NALU);
        payload.put_int(cts, 3);
        for nal in ipb_frames {
            payload.put_u32(nal.len() as u32);
            payload.put_slice(nal);
        }

        let frame = RtmpMessage::video(dts, self.video_stream_id, payload.freeze());
        self.bridge.on_frame(frame).map_err(FrameError::Bridge)
    }

    fn on_ts_video_hevc(&mut self, msg: &TsMessage) -> Result<(), FrameError> {
        let mut ipb_frames: Vec<&[u8]> = Vec::new();
        let mut message_pps: Vec<Bytes> = Vec::new();

        for nal in AnnexbIter::new(&msg.payload).map_err(FrameError::Demux)? {
            if hevc::is_vps(nal[0]) {
                if self.hevc_vps.as_ref() != nal {
                    self.vps_sps_pps_change = true;
                }
                self.hevc_vps = Bytes::copy_from_slice(nal);
                continue;
            }
            if hevc::is_sps(nal[0]) {
                if self.hevc_sps.as_ref() != nal {
                    self.vps_sps_pps_change = true;
                }
                self.hevc_sps = Bytes::copy_from_slice(nal);
                continue;
            }
            if hevc::is_pps(nal[0]) {
                self.vps_sps_pps_change = true;
                message_pps.push(Bytes::copy_from_slice(nal));
                continue;
            }
            ipb_frames.push(nal);
        }

        // PPS set is replaced wholesale by whatever this message carried.
        if !message_pps.is_empty() {
            self.hevc_pps = message_pps;
        }

        self.check_vps_sps_pps_change(msg)?;
        self.on_hevc_frame(msg, &ipb_frames)
    }

    /// Emit a fresh HEVC sequence header once all three parameter sets are
    /// present. Missing one is not an error; the change flag stays raised
    /// until a later message completes the set.
    fn check_vps_sps_pps_change(&mut self, msg: &TsMessage) -> Result<(), FrameError> {
        if !self.vps_sps_pps_change {
            return Ok(());
        }
        if self.hevc_vps.is_empty() || self.hevc_sps.is_empty() || self.hevc_pps.is_empty() {
            return Ok(());
        }
        self.vps_sps_pps_change = false;

        let dts = (msg.dts / 90) as u32;
        let record = hevc::mux_sequence_header(&self.hevc_vps, &self.hevc_sps, &self.hevc_pps);

        let mut payload = BytesMut::with_capacity(5 + record.len());
        payload.put_u8(flv::video_tag_header(
            VideoFrameType::Keyframe,
            VideoCodecId::Hevc,
        ));
        payload.put_u8(AVC_PACKET_TYPE_SEQUENCE_HEADER);
        payload.put_uint(0, 3); // composition time
        payload.put_slice(&record);

        let frame = RtmpMessage::video(dts, self.video_stream_id, payload.freeze());
        self.bridge.on_frame(frame).map_err(FrameError::Bridge)
    }

    fn on_hevc_frame(&mut self, msg: &TsMessage, ipb_frames: &[&[u8]]) -> Result<(), FrameError> {
        if ipb_frames.is_empty() {
            return Ok(());
        }

        let dts = (msg.dts / 90) as u32;
        let pts = (msg.pts / 90) as u32;
        let cts = i64::from(pts) - i64::from(dts);

        let keyframe = ipb_frames.iter().any(|nal| hevc::is_keyframe(nal[0]));
        let frame_type = if keyframe {
            VideoFrameType::Keyframe
        } else {
            VideoFrameType::InterFrame
        };

        let nalus_len: usize = ipb_frames.iter().map(|nal| 4 + nal.len()).sum();
        let mut payload = BytesMut::with_capacity(5 + nalus_len);
        payload.put_u8(flv::video_tag_header(frame_type, VideoCodecId::Hevc));
        payload.put_u8(AVC_PACKET_TYPE_NALU);
        payload.put_int(cts, 3);
        for nal in ipb_frames {
            payload.put_u32(nal.len() as u32);
            payload.put_slice(nal);
        }

        let frame = RtmpMessage::video(dts, self.video_stream_id, payload.freeze());
        self.bridge.on_frame(frame).map_err(FrameError::Bridge)
    }

    fn on_ts_audio(&mut self, msg: &TsMessage) -> Result<(), FrameError> {
        let base_pts = (msg.pts / 90) as u32;

        let mut demuxer = AdtsDemuxer::new(&msg.payload);
        let mut frame_idx: u64 = 0;
        let mut duration_ms: u32 = 0;

        while let Some(frame) = demuxer.next_frame() {
            let frame = frame.map_err(FrameError::Demux)?;
            if frame.payload.is_empty() {
                continue;
            }

            let sh = aac::mux_audio_specific_config(&frame.codec);
            if !sh.is_empty() && sh != self.audio_sh {
                self.audio_sh = sh;
                self.audio_sh_change = true;
            }

            // The PES PTS belongs to the first ADTS frame only; later
            // frames in the same packet get synthesized timestamps.
            let sample_rate = u64::from(frame.codec.sound_rate.to_hz());
            let frame_pts =
                base_pts + ((frame_idx * AAC_SAMPLES_PER_FRAME * 1000) / sample_rate) as u32;
            duration_ms += ((AAC_SAMPLES_PER_FRAME * 1000) / sample_rate) as u32;
            frame_idx += 1;

            self.check_audio_sh_change(frame_pts)?;
            self.on_aac_frame(frame_pts, frame.payload)?;
        }

        if duration_ms >= self.audio_warn_duration_ms && self.audio_warn.allow() {
            // MPEG-TS muxers merge many AAC frames into one PES packet,
            // which inflates latency and can break AV sync downstream.
            tracing::warn!(
                duration_ms,
                frames = frame_idx,
                "aggregated audio in one pes packet"
            );
        }

        Ok(())
    }

    /// Emit a fresh AAC sequence header when the config changed.
    fn check_audio_sh_change(&mut self, pts: u32) -> Result<(), FrameError> {
        if !self.audio_sh_change {
            return Ok(());
        }
        self.audio_sh_change = false;

        let mut payload = BytesMut::with_capacity(2 + self.audio_sh.len());
        payload.put_u8(AAC_AUDIO_FLAGS);
        payload.put_u8(AAC_PACKET_TYPE_SEQUENCE_HEADER);
        payload.put_slice(&self.audio_sh);

        let frame = RtmpMessage::audio(pts, self.audio_stream_id, payload.freeze());
        self.bridge.on_frame(frame).map_err(FrameError::Bridge)
    }

    fn on_aac_frame(&mut self, pts: u32, data: &[u8]) -> Result<(), FrameError> {
        let mut payload = BytesMut::with_capacity(2 + data.len());
        payload.put_u8(AAC_AUDIO_FLAGS);
        payload.put_u8(AAC_PACKET_TYPE_RAW);
        payload.put_slice(data);

        let frame = RtmpMessage::audio(pts, self.audio_stream_id, payload.freeze());
        self.bridge.on_frame(frame).map_err(FrameError::Bridge)
    }
}

/// Interval gate for log lines that would otherwise fire at line rate.
struct LogThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl LogThrottle {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// True at most once per interval.
    fn allow(&mut self) -> bool {
        let now = Instant::now();
        match self.last {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}
