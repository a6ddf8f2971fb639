//! Pipeline orchestration — profiles, configuration, cancellation, and the
//! fail-open stage sequencer.

pub mod cancel;
pub mod config;
pub mod orchestrator;
pub mod profile;
