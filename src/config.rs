//! Relay configuration

use std::time::Duration;

/// Configuration options for SRT sources created by the registry.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Attach an RTMP bridge to sources so published TS streams are
    /// rebuilt into FLV tagged messages. When false the relay only fans
    /// raw TS packets out to subscribers.
    pub srt_to_rtmp: bool,

    /// Warn when a single PES packet aggregates at least this much audio.
    ///
    /// MPEG-TS muxers commonly merge many AAC frames into one PES packet,
    /// which inflates latency and can break AV sync downstream.
    pub audio_warn_duration_ms: u32,

    /// Minimum interval between aggregated-audio warnings.
    pub audio_warn_interval: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            srt_to_rtmp: true,
            audio_warn_duration_ms: 200,
            audio_warn_interval: Duration::from_secs(3),
        }
    }
}

impl RelayConfig {
    /// Set whether sources forward to an RTMP bridge.
    pub fn srt_to_rtmp(mut self, enabled: bool) -> Self {
        self.srt_to_rtmp = enabled;
        self
    }

    /// Set the aggregated-audio warning threshold.
    pub fn audio_warn_duration_ms(mut self, ms: u32) -> Self {
        self.audio_warn_duration_ms = ms;
        self
    }

    /// Set the aggregated-audio warning throttle interval.
    pub fn audio_warn_interval(mut self, interval: Duration) -> Self {
        self.audio_warn_interval = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = RelayConfig::default();
        assert!(config.srt_to_rtmp);
        assert_eq!(config.audio_warn_duration_ms, 200);
        assert_eq!(config.audio_warn_interval, Duration::from_secs(3));
    }

    #[test]
    fn builder_style() {
        let config = RelayConfig::default()
            .srt_to_rtmp(false)
            .audio_warn_duration_ms(500);
        assert!(!config.srt_to_rtmp);
        assert_eq!(config.audio_warn_duration_ms, 500);
    }
}
