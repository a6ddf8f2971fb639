//! Pipeline construction settings.

use serde::{Deserialize, Serialize};

use crate::effects::HalationLayering;

/// Environment variable overriding the render thread count.
pub const THREADS_ENV: &str = "FILMLAB_THREADS";

/// Settings used when building a [`Pipeline`](super::orchestrator::Pipeline).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Layer order used by the halation composites.
    #[serde(default)]
    pub halation_layering: HalationLayering,
    /// Fixed grain seed. `None` draws a fresh pattern on every run.
    #[serde(default)]
    pub grain_seed: Option<u64>,
    /// Dedicated render threads. `None` uses rayon's global pool.
    #[serde(default)]
    pub threads: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            halation_layering: HalationLayering::default(),
            grain_seed: None,
            threads: std::env::var(THREADS_ENV)
                .ok()
                .and_then(|s| s.parse().ok()),
        }
    }
}
