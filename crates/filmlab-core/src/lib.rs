//! Filmlab Core — domain layer for the photo filter pipeline.
//!
//! This crate contains cube LUT parsing, the trilinear color transform,
//! the halation and grain effect stages, and the fail-open pipeline that
//! sequences them. No async runtime or UI dependencies.

pub mod effects;
pub mod error;
pub mod image;
pub mod pipeline;
pub mod render;
pub mod transform;

// Re-exports for convenience.
pub use error::{LutParseError, PipelineError};
pub use crate::image::{BitDepth, FilmImage};
pub use pipeline::cancel::CancellationToken;
pub use pipeline::orchestrator::{Pipeline, PipelineOutput, PipelineRequest};
pub use pipeline::profile::{LutProfile, ProfileCatalog};
pub use render::RenderContext;
pub use transform::engine::ColorTransformEngine;
pub use transform::library::{DirectoryLutSource, LutLibrary, LutSource, MemoryLutSource};
pub use transform::lut::Lut3D;
pub use transform::params::FilterParams;
