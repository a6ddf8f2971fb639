//! Filmlab Preview — debounced background rendering of pipeline previews.
//!
//! Slider drags produce bursts of parameter changes. [`PreviewWorker`]
//! coalesces each burst into a single pipeline run using only the latest
//! snapshot, runs it off the async thread, and cancels a run that newer
//! parameters have superseded. Progress is observable through
//! [`PreviewEvent`] notifications and a [`PreviewStatus`] watch channel.

pub mod config;
pub mod worker;

pub use config::PreviewConfig;
pub use worker::{PreviewError, PreviewEvent, PreviewStatus, PreviewWorker};
