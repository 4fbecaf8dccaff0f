//! Process-wide source directory
//!
//! One registry instance per process, injected into whatever accepts SRT
//! connections. A single coarse lock guards the pool: it is touched on
//! connection setup and teardown only, never per packet.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::config::RelayConfig;
use crate::request::SrtRequest;
use crate::stats::{NullStatistic, Statistic};

use super::source::SrtSource;

/// Name-keyed directory of live SRT sources.
pub struct SrtSourceRegistry {
    pool: Mutex<HashMap<String, Arc<SrtSource>>>,
    config: RelayConfig,
    stats: Arc<dyn Statistic>,
}

impl SrtSourceRegistry {
    /// A registry with default configuration and no statistics sink.
    pub fn new() -> Arc<Self> {
        Self::with_config(RelayConfig::default(), Arc::new(NullStatistic))
    }

    /// A registry with explicit configuration and statistics sink.
    pub fn with_config(config: RelayConfig, stats: Arc<dyn Statistic>) -> Arc<Self> {
        Arc::new(Self {
            pool: Mutex::new(HashMap::new()),
            config,
            stats,
        })
    }

    /// The configuration sources are created with.
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Look up the source for `req`'s stream url, creating it on miss.
    ///
    /// On a hit the cached request's auth is refreshed from `req`: with
    /// origin auth on, the stored token may have expired and only the token
    /// needs updating.
    pub fn fetch_or_create(self: &Arc<Self>, req: &SrtRequest) -> Arc<SrtSource> {
        let mut pool = self.pool.lock().unwrap();
        let stream_url = req.stream_url();

        if let Some(source) = pool.get(&stream_url) {
            source.update_auth(req);
            return Arc::clone(source);
        }

        let source = Arc::new(SrtSource::new(
            req.clone(),
            Arc::downgrade(self),
            Arc::clone(&self.stats),
            self.config.clone(),
        ));
        tracing::info!(stream = %stream_url, "new srt source");
        pool.insert(stream_url, Arc::clone(&source));
        source
    }

    /// Forget the source for `req`'s stream url, if present.
    ///
    /// Consumers still holding the shared handle keep the source alive;
    /// the last owner to release it destroys it.
    pub fn eliminate(&self, req: &SrtRequest) {
        let mut pool = self.pool.lock().unwrap();
        if pool.remove(&req.stream_url()).is_some() {
            tracing::info!(stream = %req.stream_url(), "srt source eliminated");
        }
    }

    /// True when a source is registered for `req`'s stream url.
    pub fn contains(&self, req: &SrtRequest) -> bool {
        self.pool.lock().unwrap().contains_key(&req.stream_url())
    }

    /// Number of registered sources.
    pub fn source_count(&self) -> usize {
        self.pool.lock().unwrap().len()
    }
}
