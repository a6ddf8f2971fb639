//! Secondary effect stages — halation glow and film grain.

pub mod grain;
pub mod halation;
pub mod ops;

pub use grain::GrainStage;
pub use halation::{HalationLayering, HalationStage};

use crate::error::PipelineError;
use crate::image::FilmImage;
use crate::render::RenderContext;

/// One intensity-driven image effect.
///
/// Implementations must not modify `image`; they return a freshly allocated
/// buffer or a [`PipelineError::StageFailure`].
pub trait EffectStage: Send + Sync {
    /// Short name used in logs and stage reports.
    fn name(&self) -> &'static str;

    /// Render the effect at `intensity` in `[0, 1]`.
    fn apply(
        &self,
        image: &FilmImage,
        intensity: f32,
        ctx: &RenderContext,
    ) -> Result<FilmImage, PipelineError>;
}

/// Reject intensities the stages cannot render.
pub(crate) fn check_intensity(stage: &'static str, intensity: f32) -> Result<(), PipelineError> {
    if !intensity.is_finite() {
        return Err(PipelineError::stage(
            stage,
            format!("intensity must be finite, got {intensity}"),
        ));
    }
    Ok(())
}
