//! SRT live stream source core
//!
//! This crate ingests MPEG-TS bytes arriving over a reliable datagram
//! transport (SRT), fans the raw TS packets out to any number of pull-side
//! subscribers, and in parallel rebuilds the elementary streams into RTMP/FLV
//! tagged messages for a downstream bridge.
//!
//! # Architecture
//!
//! ```text
//!                        Arc<SrtSourceRegistry>
//!                   ┌────────────────────────────┐
//!                   │ pool: HashMap<stream_url,  │
//!                   │   Arc<SrtSource> {         │
//!                   │     consumers,             │
//!                   │     frame_builder+bridge,  │
//!                   │   }                        │
//!                   │ >                          │
//!                   └─────────────┬──────────────┘
//!                                 │
//!          ┌──────────────────────┼──────────────────────┐
//!          │                      │                      │
//!          ▼                      ▼                      ▼
//!     [Publisher]           [Subscriber]           [Subscriber]
//!     on_packet()           wait()+dump_packet()   wait()+dump_packet()
//!          │
//!          ├──► SrtConsumer.enqueue(packet.copy())   (raw TS pass-through)
//!          └──► SrtFrameBuilder ──► TsContext ──► AVC/HEVC/AAC ──► StreamBridge
//! ```
//!
//! # Zero-copy design
//!
//! [`SrtPacket`] backs its payload with `bytes::Bytes`, so the per-consumer
//! `copy()` in the fan-out path is a reference-count bump, not a memcpy. The
//! frame builder reads the same bytes the subscribers receive.

pub mod bridge;
pub mod config;
pub mod error;
pub mod media;
pub mod packet;
pub mod request;
pub mod source;
pub mod stats;
pub mod ts;

#[cfg(test)]
pub(crate) mod test_support;

pub use bridge::{RtmpFrameType, RtmpMessage, StreamBridge};
pub use config::RelayConfig;
pub use error::{BridgeError, FrameError, MediaError, PublishError, TsError};
pub use media::frame_builder::SrtFrameBuilder;
pub use packet::SrtPacket;
pub use request::SrtRequest;
pub use source::{SrtConsumer, SrtSource, SrtSourceRegistry};
pub use stats::{NullStatistic, Statistic, StreamPublishRecorder};
pub use ts::{TsContext, TsMessage, TS_PACKET_SIZE};
