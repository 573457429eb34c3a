//! Call configuration

use std::time::Duration;

use super::state::CallKind;

/// Call coordinator options
#[derive(Debug, Clone)]
pub struct CallConfig {
    /// Audio or video call
    pub kind: CallKind,

    /// How long an outgoing call may stay in `calling` before giving up
    pub ring_timeout: Duration,

    /// Capacity of the signaling event queue
    pub event_capacity: usize,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            kind: CallKind::Video,
            ring_timeout: Duration::from_secs(45),
            event_capacity: 256,
        }
    }
}

impl CallConfig {
    /// Audio-only call with default settings
    pub fn audio() -> Self {
        Self {
            kind: CallKind::Audio,
            ..Default::default()
        }
    }

    /// Video call with default settings
    pub fn video() -> Self {
        Self::default()
    }

    /// Set the ring timeout
    pub fn ring_timeout(mut self, timeout: Duration) -> Self {
        self.ring_timeout = timeout;
        self
    }

    /// Set the signaling event queue capacity
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CallConfig::default();

        assert_eq!(config.kind, CallKind::Video);
        assert_eq!(config.ring_timeout, Duration::from_secs(45));
        assert_eq!(config.event_capacity, 256);
    }

    #[test]
    fn test_audio_config() {
        assert_eq!(CallConfig::audio().kind, CallKind::Audio);
    }

    #[test]
    fn test_builder_chaining() {
        let config = CallConfig::audio()
            .ring_timeout(Duration::from_secs(5))
            .event_capacity(0);

        assert_eq!(config.kind, CallKind::Audio);
        assert_eq!(config.ring_timeout, Duration::from_secs(5));
        // Capacity is clamped so the queue can always hold one event
        assert_eq!(config.event_capacity, 1);
    }
}
