//! Per-stream source hub
//!
//! An [`SrtSource`] is the meeting point of one publisher, any number of
//! consumers and an optional RTMP bridge. Every transport packet fans out to
//! the consumers first (each gets a refcount copy), then feeds the frame
//! builder, so both sides see every packet in publish order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::bridge::StreamBridge;
use crate::config::RelayConfig;
use crate::error::{FrameError, PublishError};
use crate::media::frame_builder::SrtFrameBuilder;
use crate::packet::SrtPacket;
use crate::request::SrtRequest;
use crate::stats::Statistic;

use super::consumer::{ConsumerInner, SrtConsumer};
use super::registry::SrtSourceRegistry;

/// One live stream: publisher gate, consumer list, bridge attachment.
pub struct SrtSource {
    req: Mutex<SrtRequest>,
    /// True exactly when no publisher is active.
    can_publish: AtomicBool,
    /// Non-owning registrations; consumers deregister on drop.
    consumers: Mutex<Vec<Arc<ConsumerInner>>>,
    /// Present iff the source forwards to RTMP. Owns the bridge.
    frame_builder: Mutex<Option<SrtFrameBuilder>>,
    /// Context id of the current publisher.
    source_id: Mutex<String>,
    /// Context id of the first publisher ever; never reset.
    pre_source_id: Mutex<String>,
    registry: Weak<SrtSourceRegistry>,
    stats: Arc<dyn Statistic>,
    config: RelayConfig,
}

impl SrtSource {
    pub(crate) fn new(
        req: SrtRequest,
        registry: Weak<SrtSourceRegistry>,
        stats: Arc<dyn Statistic>,
        config: RelayConfig,
    ) -> Self {
        Self {
            req: Mutex::new(req),
            can_publish: AtomicBool::new(true),
            consumers: Mutex::new(Vec::new()),
            frame_builder: Mutex::new(None),
            source_id: Mutex::new(String::new()),
            pre_source_id: Mutex::new(String::new()),
            registry,
            stats,
            config,
        }
    }

    /// Snapshot of the stream's request.
    pub fn request(&self) -> SrtRequest {
        self.req.lock().unwrap().clone()
    }

    /// Registry key of this stream.
    pub fn stream_url(&self) -> String {
        self.req.lock().unwrap().stream_url()
    }

    /// Refresh auth fields from `r`, preserving identity.
    pub fn update_auth(&self, r: &SrtRequest) {
        self.req.lock().unwrap().update_auth(r);
    }

    /// Attach a bridge, replacing any existing one together with its
    /// paired frame builder.
    pub fn set_bridge(&self, bridge: Box<dyn StreamBridge>) {
        let builder = SrtFrameBuilder::with_config(bridge, &self.config);
        *self.frame_builder.lock().unwrap() = Some(builder);
    }

    /// True when a bridge is attached.
    pub fn has_bridge(&self) -> bool {
        self.frame_builder.lock().unwrap().is_some()
    }

    /// Register a new consumer on this source.
    pub fn create_consumer(self: &Arc<Self>) -> SrtConsumer {
        let inner = Arc::new(ConsumerInner::new());
        self.consumers.lock().unwrap().push(Arc::clone(&inner));
        tracing::debug!(stream = %self.stream_url(), "create ts consumer, no gop cache");
        SrtConsumer::new(Arc::clone(self), inner)
    }

    /// Deregister a consumer; removes the source from the registry when
    /// nothing references the stream anymore.
    pub(crate) fn on_consumer_destroy(&self, inner: &Arc<ConsumerInner>) {
        let empty = {
            let mut consumers = self.consumers.lock().unwrap();
            consumers.retain(|c| !Arc::ptr_eq(c, inner));
            consumers.is_empty()
        };
        if self.can_publish() && empty {
            self.eliminate();
        }
    }

    /// True exactly when no publisher is active.
    pub fn can_publish(&self) -> bool {
        self.can_publish.load(Ordering::SeqCst)
    }

    /// Context id of the current publisher.
    pub fn source_id(&self) -> String {
        self.source_id.lock().unwrap().clone()
    }

    /// Context id of the first publisher; stable across republishes.
    pub fn pre_source_id(&self) -> String {
        self.pre_source_id.lock().unwrap().clone()
    }

    /// Start publishing under the given context id.
    ///
    /// Closes the publisher gate, records the id transition, notifies
    /// consumers, and brings up the bridge chain when one is attached.
    pub fn on_publish(&self, source_id: &str) -> Result<(), PublishError> {
        if self
            .can_publish
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(PublishError::AlreadyPublishing(self.stream_url()));
        }

        self.on_source_id_changed(source_id);

        if let Some(builder) = self.frame_builder.lock().unwrap().as_mut() {
            let req = self.req.lock().unwrap().clone();
            builder.initialize(&req);
            builder.on_publish()?;
        }

        let req = self.req.lock().unwrap().clone();
        self.stats.on_stream_publish(&req, source_id);
        tracing::info!(stream = %req, source_id, "srt stream publish");
        Ok(())
    }

    /// Stop publishing. No-op when already unpublished.
    ///
    /// Reopens the gate, tears down the bridge chain, and removes the
    /// source from the registry when no consumers remain.
    pub fn on_unpublish(&self) {
        if self
            .can_publish
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        if let Some(mut builder) = self.frame_builder.lock().unwrap().take() {
            builder.on_unpublish();
        }
        tracing::info!(stream = %self.stream_url(), "srt stream unpublish");

        if self.consumers.lock().unwrap().is_empty() {
            self.eliminate();
        }
    }

    /// Ingest one transport packet: fan out to every consumer, then feed
    /// the frame builder. Both receive every packet.
    pub fn on_packet(&self, packet: &mut SrtPacket) -> Result<(), FrameError> {
        let consumers: Vec<_> = self.consumers.lock().unwrap().clone();
        for consumer in &consumers {
            consumer.enqueue(packet.copy());
        }

        if let Some(builder) = self.frame_builder.lock().unwrap().as_mut() {
            builder.on_packet(packet)?;
        }
        Ok(())
    }

    /// Record a publisher id change and flag every consumer to log it.
    fn on_source_id_changed(&self, id: &str) {
        {
            let mut current = self.source_id.lock().unwrap();
            if *current == id {
                return;
            }
            let mut pre = self.pre_source_id.lock().unwrap();
            if pre.is_empty() {
                *pre = id.to_string();
            }
            *current = id.to_string();
        }
        for consumer in self.consumers.lock().unwrap().iter() {
            consumer.flag_source_id_change();
        }
    }

    /// Ask the registry to forget this stream.
    fn eliminate(&self) {
        if let Some(registry) = self.registry.upgrade() {
            let req = self.req.lock().unwrap().clone();
            registry.eliminate(&req);
        }
    }
}
