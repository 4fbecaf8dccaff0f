//! Media handling for the TS→RTMP path
//!
//! This module provides:
//! - Annex-B NAL iteration and AVC parameter-set handling
//! - HEVC NAL classification and decoder config muxing
//! - ADTS AAC demuxing and AudioSpecificConfig muxing
//! - FLV tag byte constants shared by the frame builder
//! - The frame builder itself: the TS→RTMP state machine

pub mod aac;
pub mod avc;
pub mod flv;
pub mod frame_builder;
pub mod hevc;

pub use aac::{AacCodec, AdtsDemuxer};
pub use avc::{AnnexbIter, AvcNaluType};
pub use flv::{AudioSampleRate, VideoCodecId, VideoFrameType};
pub use frame_builder::SrtFrameBuilder;
