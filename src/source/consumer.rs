//! Pull-side consumer queues
//!
//! A consumer owns a FIFO of TS packets fed by its source's fan-out. The
//! subscriber loop is `wait(n, timeout)` then `dump_packet()` until empty:
//! the min-fill threshold lets subscribers batch downstream sends instead of
//! waking per packet.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;

use crate::packet::SrtPacket;

use super::source::SrtSource;

/// Queue state shared between the consumer handle and its source.
#[derive(Default)]
struct ConsumerState {
    queue: VecDeque<SrtPacket>,
    min_msgs: usize,
    waiting: bool,
    should_update_source_id: bool,
}

/// The source-facing half of a consumer.
///
/// The source holds these as non-owning registrations; the packets queue
/// here until the consumer handle dumps them.
pub(crate) struct ConsumerInner {
    state: Mutex<ConsumerState>,
    wakeup: Notify,
}

impl ConsumerInner {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(ConsumerState::default()),
            wakeup: Notify::new(),
        }
    }

    /// Append a packet. Never blocks, never drops; wakes the waiter once
    /// the queue grows past its min-fill threshold.
    pub(crate) fn enqueue(&self, packet: SrtPacket) {
        let mut state = self.state.lock().unwrap();
        state.queue.push_back(packet);
        if state.waiting && state.queue.len() > state.min_msgs {
            state.waiting = false;
            self.wakeup.notify_one();
        }
    }

    /// Make the consumer log the publisher id transition on its next dump.
    pub(crate) fn flag_source_id_change(&self) {
        self.state.lock().unwrap().should_update_source_id = true;
    }
}

/// A subscriber's handle onto one source's packet stream.
///
/// Holds a strong reference to its [`SrtSource`]; dropping the consumer
/// deregisters it, which may in turn remove an idle source from the
/// registry.
pub struct SrtConsumer {
    source: Arc<SrtSource>,
    inner: Arc<ConsumerInner>,
}

impl SrtConsumer {
    pub(crate) fn new(source: Arc<SrtSource>, inner: Arc<ConsumerInner>) -> Self {
        Self { source, inner }
    }

    /// The source this consumer is attached to.
    pub fn source(&self) -> &Arc<SrtSource> {
        &self.source
    }

    /// Block until more than `min_msgs` packets wait, or `timeout` elapses.
    ///
    /// Returns immediately when the queue is already past the threshold.
    /// A timeout is not an error; the caller checks the queue and reissues.
    pub async fn wait(&self, min_msgs: usize, timeout: Duration) {
        {
            let mut state = self.inner.state.lock().unwrap();
            state.min_msgs = min_msgs;
            if state.queue.len() > min_msgs {
                return;
            }
            state.waiting = true;
        }
        let _ = tokio::time::timeout(timeout, self.inner.wakeup.notified()).await;
    }

    /// Pop the queue head, or `None` when empty. The caller takes ownership.
    pub fn dump_packet(&mut self) -> Option<SrtPacket> {
        let mut state = self.inner.state.lock().unwrap();
        if state.should_update_source_id {
            state.should_update_source_id = false;
            tracing::info!(
                source_id = %self.source.source_id(),
                pre_source_id = %self.source.pre_source_id(),
                "update source_id"
            );
        }
        state.queue.pop_front()
    }

    /// Number of packets currently queued.
    pub fn queued(&self) -> usize {
        self.inner.state.lock().unwrap().queue.len()
    }
}

impl Drop for SrtConsumer {
    fn drop(&mut self) {
        self.source.on_consumer_destroy(&self.inner);
    }
}
