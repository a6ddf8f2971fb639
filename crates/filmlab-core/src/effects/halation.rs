//! Halation — light bleeding around bright areas of film.
//!
//! # Algorithm
//! ```text
//! blurred  = gaussian_blur(src, radius = intensity × 10)
//! darkened = color_controls(blurred, brightness = −0.5, contrast = 1)
//! base     = composite(darkened, src)
//! glow     = base with alpha × intensity
//! out      = composite(glow, src)
//! ```
//! The two composites use source-over with the original on top by default.
//! For an opaque photo the glow then shows only where the source is
//! transparent; [`HalationLayering::GlowOverSource`] puts the glow on top.

use serde::{Deserialize, Serialize};

use crate::effects::ops::{color_controls, composite_over, gaussian_blur, scale_alpha};
use crate::effects::{EffectStage, check_intensity};
use crate::error::PipelineError;
use crate::image::FilmImage;
use crate::render::RenderContext;

/// Blur radius in pixels at full intensity.
pub const MAX_BLUR_RADIUS: f32 = 10.0;
/// Brightness offset applied to the blurred copy.
pub const GLOW_BRIGHTNESS: f32 = -0.5;
/// Contrast applied to the blurred copy (unchanged).
pub const GLOW_CONTRAST: f32 = 1.0;

/// Stacking order of the glow and the source in both composites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HalationLayering {
    /// Source composited over the glow. The glow only shows through
    /// transparent regions of the source.
    #[default]
    SourceOverGlow,
    /// Glow composited over the source. Intensity fades the darkened blur in
    /// over an opaque photo.
    GlowOverSource,
}

/// Halation effect stage.
#[derive(Debug, Clone, Copy, Default)]
pub struct HalationStage {
    pub layering: HalationLayering,
}

impl HalationStage {
    pub fn new(layering: HalationLayering) -> Self {
        Self { layering }
    }

    fn stack(
        &self,
        glow: &FilmImage,
        source: &FilmImage,
        ctx: &RenderContext,
    ) -> Result<FilmImage, PipelineError> {
        match self.layering {
            HalationLayering::GlowOverSource => composite_over(glow, source, ctx),
            HalationLayering::SourceOverGlow => composite_over(source, glow, ctx),
        }
    }
}

impl EffectStage for HalationStage {
    fn name(&self) -> &'static str {
        "halation"
    }

    fn apply(
        &self,
        image: &FilmImage,
        intensity: f32,
        ctx: &RenderContext,
    ) -> Result<FilmImage, PipelineError> {
        check_intensity(self.name(), intensity)?;
        image.validate()?;
        let intensity = intensity.clamp(0.0, 1.0);

        let blurred = gaussian_blur(image, intensity * MAX_BLUR_RADIUS, ctx);
        let darkened = color_controls(&blurred, GLOW_BRIGHTNESS, GLOW_CONTRAST, ctx);
        let base = self.stack(&darkened, image, ctx)?;
        let glow = scale_alpha(&base, intensity, ctx);
        self.stack(&glow, image, ctx)
    }
}
