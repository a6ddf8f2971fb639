//! Applies a 3D LUT to a whole image, blended with the original.

use std::sync::Arc;

use crate::error::PipelineError;
use crate::image::FilmImage;
use crate::render::RenderContext;
use crate::transform::library::LutLibrary;
use crate::transform::lut::Lut3D;

/// Runs LUT lookups over images through a shared [`RenderContext`].
#[derive(Debug)]
pub struct ColorTransformEngine {
    context: Arc<RenderContext>,
    library: Arc<LutLibrary>,
}

impl ColorTransformEngine {
    pub fn new(context: Arc<RenderContext>, library: Arc<LutLibrary>) -> Self {
        Self { context, library }
    }

    pub fn context(&self) -> &Arc<RenderContext> {
        &self.context
    }

    pub fn library(&self) -> &Arc<LutLibrary> {
        &self.library
    }

    /// Apply `table` to every pixel and blend with the original.
    ///
    /// ```text
    /// out.rgb = original.rgb × (1 − intensity) + lut(original.rgb) × intensity
    /// out.a   = original.a
    /// ```
    ///
    /// `intensity = 0.0` returns the input unchanged.
    pub fn apply_lut(
        &self,
        image: &FilmImage,
        table: &Lut3D,
        intensity: f32,
    ) -> Result<FilmImage, PipelineError> {
        image.validate()?;
        if intensity.is_nan() {
            return Err(PipelineError::stage("lut", "intensity is NaN"));
        }
        let t = intensity.clamp(0.0, 1.0);
        if t == 0.0 {
            return Ok(image.clone());
        }

        let pixels = self
            .context
            .map_pixels(&image.pixels, image.width, image.height, |px| {
                let graded = table.apply([px[0], px[1], px[2]]);
                [
                    px[0] * (1.0 - t) + graded[0] * t,
                    px[1] * (1.0 - t) + graded[1] * t,
                    px[2] * (1.0 - t) + graded[2] * t,
                    px[3],
                ]
            });
        Ok(image.with_pixels(pixels))
    }

    /// Resolve `lut_name` through the library, then [`apply_lut`](Self::apply_lut).
    ///
    /// Fails with `ResourceNotFound`, `Io`, or `Parse` when the LUT cannot be
    /// loaded; no partially transformed image is ever returned.
    pub fn apply_named(
        &self,
        image: &FilmImage,
        lut_name: &str,
        intensity: f32,
    ) -> Result<FilmImage, PipelineError> {
        let table = self.library.get(lut_name)?;
        self.apply_lut(image, &table, intensity)
    }
}
