//! Film grain — a fresh uniform noise layer composited over the image.
//!
//! # Algorithm
//! ```text
//! scale = intensity × 3.5
//! noise = uniform RGBA field of ceil(w / s) × ceil(h / s), s = max(scale, 1)
//! layer = scale_and_crop(noise, s) to w × h
//! layer.a ×= intensity × 0.15
//! out   = layer over src
//! ```
//! Grain cells are never smaller than one pixel: sampling independent noise
//! at a sub-pixel stride is again independent per-pixel noise.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::effects::ops::{composite_over, scale_and_crop, scale_alpha};
use crate::effects::{EffectStage, check_intensity};
use crate::error::PipelineError;
use crate::image::FilmImage;
use crate::render::RenderContext;

/// Grain cell size in pixels at full intensity.
pub const MAX_GRAIN_SCALE: f32 = 3.5;
/// Noise opacity at full intensity. Keeps grain subtle.
pub const MAX_GRAIN_OPACITY: f32 = 0.15;

/// Film grain effect stage.
///
/// Each call draws a new noise pattern from a fresh RNG unless the stage was
/// built with [`GrainStage::seeded`], which repeats the same pattern.
#[derive(Debug, Clone, Copy, Default)]
pub struct GrainStage {
    seed: Option<u64>,
}

impl GrainStage {
    pub fn new() -> Self {
        Self { seed: None }
    }

    /// Reproducible grain: every call uses an RNG seeded with `seed`.
    pub fn seeded(seed: u64) -> Self {
        Self { seed: Some(seed) }
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// Render grain using the caller's RNG.
    pub fn apply_with_rng<R: Rng>(
        &self,
        image: &FilmImage,
        intensity: f32,
        rng: &mut R,
        ctx: &RenderContext,
    ) -> Result<FilmImage, PipelineError> {
        check_intensity(self.name(), intensity)?;
        image.validate()?;
        let intensity = intensity.clamp(0.0, 1.0);
        if intensity == 0.0 || image.is_empty() {
            return Ok(image.clone());
        }

        let scale = (intensity * MAX_GRAIN_SCALE).max(1.0);
        let field_w = (image.width as f32 / scale).ceil().max(1.0) as u32;
        let field_h = (image.height as f32 / scale).ceil().max(1.0) as u32;
        let noise = generate_noise(field_w, field_h, rng);

        let layer = scale_and_crop(&noise, scale, image.width, image.height, ctx)?;
        let layer = scale_alpha(&layer, intensity * MAX_GRAIN_OPACITY, ctx);
        composite_over(&layer, image, ctx)
    }
}

impl EffectStage for GrainStage {
    fn name(&self) -> &'static str {
        "grain"
    }

    fn apply(
        &self,
        image: &FilmImage,
        intensity: f32,
        ctx: &RenderContext,
    ) -> Result<FilmImage, PipelineError> {
        match self.seed {
            Some(seed) => {
                let mut rng = StdRng::seed_from_u64(seed);
                self.apply_with_rng(image, intensity, &mut rng, ctx)
            }
            None => self.apply_with_rng(image, intensity, &mut rand::rng(), ctx),
        }
    }
}

/// Uniform per-pixel RGBA noise in `[0, 1)`.
pub fn generate_noise<R: Rng>(width: u32, height: u32, rng: &mut R) -> FilmImage {
    let pixels = (0..width as usize * height as usize)
        .map(|_| rng.random::<[f32; 4]>())
        .collect();
    FilmImage {
        width,
        height,
        pixels,
        source_bit_depth: crate::image::BitDepth::F32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-5;

    fn photo() -> FilmImage {
        let pixels = (0..64)
            .map(|i| {
                let t = i as f32 / 64.0;
                [t, 0.5, 1.0 - t, 1.0]
            })
            .collect();
        FilmImage::new(8, 8, pixels).unwrap()
    }

    #[test]
    fn test_zero_intensity_is_identity() {
        let ctx = RenderContext::new();
        let image = photo();
        let out = GrainStage::new().apply(&image, 0.0, &ctx).unwrap();
        assert_eq!(out, image);
    }

    #[test]
    fn test_seeded_grain_is_reproducible() {
        let ctx = RenderContext::new();
        let stage = GrainStage::seeded(42);
        let a = stage.apply(&photo(), 0.8, &ctx).unwrap();
        let b = stage.apply(&photo(), 0.8, &ctx).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_unseeded_grain_changes_every_call() {
        let ctx = RenderContext::new();
        let stage = GrainStage::new();
        let a = stage.apply(&photo(), 1.0, &ctx).unwrap();
        let b = stage.apply(&photo(), 1.0, &ctx).unwrap();
        assert!(a.max_abs_diff(&b).unwrap() > EPSILON);
    }

    #[test]
    fn test_different_seeds_differ() {
        let ctx = RenderContext::new();
        let a = GrainStage::seeded(1).apply(&photo(), 1.0, &ctx).unwrap();
        let b = GrainStage::seeded(2).apply(&photo(), 1.0, &ctx).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_grain_stays_subtle() {
        let ctx = RenderContext::new();
        let image = photo();
        let out = GrainStage::seeded(7).apply(&image, 1.0, &ctx).unwrap();
        // Noise alpha never exceeds 0.15, so no channel moves further than that.
        let diff = out.max_abs_diff(&image).unwrap();
        assert!(diff <= MAX_GRAIN_OPACITY + EPSILON, "diff {diff}");
        assert!(diff > 0.0);
        assert!(out.pixels.iter().all(|px| (px[3] - 1.0).abs() < EPSILON));
    }

    #[test]
    fn test_output_keeps_extent() {
        let ctx = RenderContext::new();
        let image = FilmImage::filled(13, 5, [0.5, 0.5, 0.5, 1.0]);
        let out = GrainStage::seeded(3).apply(&image, 0.9, &ctx).unwrap();
        assert_eq!((out.width, out.height), (13, 5));
        assert_eq!(out.pixels.len(), 65);
    }

    #[test]
    fn test_noise_is_in_unit_range() {
        let mut rng = StdRng::seed_from_u64(9);
        let noise = generate_noise(16, 16, &mut rng);
        assert!(noise.pixels.iter().flatten().all(|&c| (0.0..1.0).contains(&c)));
    }
}
