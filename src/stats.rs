//! Publish statistics hooks
//!
//! The source reports lifecycle events to an injected [`Statistic`] sink.
//! Real deployments forward these into their metrics stack; tests and
//! simple embeddings use the in-memory recorder.

use std::sync::Mutex;
use std::time::Instant;

use crate::request::SrtRequest;

/// Sink for stream lifecycle statistics.
pub trait Statistic: Send + Sync {
    /// A stream started publishing under `source_id`.
    fn on_stream_publish(&self, req: &SrtRequest, source_id: &str);
}

/// Discards every event.
#[derive(Debug, Default)]
pub struct NullStatistic;

impl Statistic for NullStatistic {
    fn on_stream_publish(&self, _req: &SrtRequest, _source_id: &str) {}
}

/// One recorded publish event.
#[derive(Debug, Clone)]
pub struct PublishRecord {
    /// Stream url at publish time.
    pub stream_url: String,
    /// Publisher context id.
    pub source_id: String,
    /// When the publish happened.
    pub published_at: Instant,
}

/// In-memory recorder of publish events.
#[derive(Debug, Default)]
pub struct StreamPublishRecorder {
    records: Mutex<Vec<PublishRecord>>,
}

impl StreamPublishRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn records(&self) -> Vec<PublishRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl Statistic for StreamPublishRecorder {
    fn on_stream_publish(&self, req: &SrtRequest, source_id: &str) {
        self.records.lock().unwrap().push(PublishRecord {
            stream_url: req.stream_url(),
            source_id: source_id.to_string(),
            published_at: Instant::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorder_keeps_publish_events_in_order() {
        let recorder = StreamPublishRecorder::new();
        recorder.on_stream_publish(&SrtRequest::new("live", "a"), "ctx-1");
        recorder.on_stream_publish(&SrtRequest::new("live", "b"), "ctx-2");

        let records = recorder.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].stream_url, "live/a");
        assert_eq!(records[1].source_id, "ctx-2");
    }
}
