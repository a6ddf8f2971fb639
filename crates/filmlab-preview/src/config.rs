//! Runtime configuration for the preview worker.

use std::time::Duration;

/// Environment variable overriding the debounce window in milliseconds.
pub const DEBOUNCE_ENV: &str = "FILMLAB_DEBOUNCE_MS";
/// Default quiet period before a burst of changes triggers a run.
const DEFAULT_DEBOUNCE_MS: u64 = 300;
/// Default capacity of the event broadcast channel.
const DEFAULT_EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewConfig {
    /// Changes arriving closer together than this are coalesced.
    pub debounce: Duration,
    /// Events buffered per subscriber before slow receivers start lagging.
    pub event_capacity: usize,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(
                std::env::var(DEBOUNCE_ENV)
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_DEBOUNCE_MS),
            ),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl PreviewConfig {
    pub fn with_debounce(debounce: Duration) -> Self {
        Self {
            debounce,
            ..Self::default()
        }
    }
}
