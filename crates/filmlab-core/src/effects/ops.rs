//! Image operations the effect stages are assembled from.
//!
//! All operations take straight (non-premultiplied) RGBA and allocate a new
//! output buffer. Source-over compositing follows Porter-Duff:
//!
//! ```text
//! out.a   = fg.a + bg.a × (1 − fg.a)
//! out.rgb = (fg.rgb × fg.a + bg.rgb × bg.a × (1 − fg.a)) / out.a
//! ```
//! Composited RGB is clamped to `[0, 1]`.

use crate::error::PipelineError;
use crate::image::FilmImage;
use crate::render::RenderContext;

/// Kernel half-width in multiples of sigma.
const KERNEL_SIGMAS: f32 = 3.0;

/// Composites one pixel over another (Porter-Duff over, straight alpha).
#[inline]
pub fn over_pixel(fg: [f32; 4], bg: [f32; 4]) -> [f32; 4] {
    let fg_a = fg[3];
    let bg_a = bg[3];
    let out_a = fg_a + bg_a * (1.0 - fg_a);

    if out_a < 1e-8 {
        return [0.0, 0.0, 0.0, 0.0];
    }

    let inv_out_a = 1.0 / out_a;
    let mix = |c: usize| {
        ((fg[c] * fg_a + bg[c] * bg_a * (1.0 - fg_a)) * inv_out_a).clamp(0.0, 1.0)
    };
    [mix(0), mix(1), mix(2), out_a]
}

/// Composite `fg` over `bg`. Both images must have the same dimensions.
pub fn composite_over(
    fg: &FilmImage,
    bg: &FilmImage,
    ctx: &RenderContext,
) -> Result<FilmImage, PipelineError> {
    if fg.width != bg.width || fg.height != bg.height {
        return Err(PipelineError::stage(
            "composite",
            format!(
                "layer is {}x{}, background is {}x{}",
                fg.width, fg.height, bg.width, bg.height
            ),
        ));
    }
    fg.validate()?;
    bg.validate()?;

    let w = bg.width as usize;
    let pixels = ctx.map_rows(bg.width, bg.height, |y, row| {
        let start = y as usize * w;
        let fg_row = &fg.pixels[start..start + w];
        let bg_row = &bg.pixels[start..start + w];
        for ((dst, &f), &b) in row.iter_mut().zip(fg_row).zip(bg_row) {
            *dst = over_pixel(f, b);
        }
    });
    Ok(bg.with_pixels(pixels))
}

/// Multiply every pixel's alpha by `factor`; RGB passes through.
pub fn scale_alpha(image: &FilmImage, factor: f32, ctx: &RenderContext) -> FilmImage {
    let pixels = ctx.map_pixels(&image.pixels, image.width, image.height, |px| {
        [px[0], px[1], px[2], px[3] * factor]
    });
    image.with_pixels(pixels)
}

/// Brightness offset and contrast around mid-gray, clamped to `[0, 1]`.
///
/// ```text
/// out.rgb = (in.rgb − 0.5) × contrast + 0.5 + brightness
/// ```
///
/// `brightness = 0.0`, `contrast = 1.0` leave in-range values unchanged.
pub fn color_controls(
    image: &FilmImage,
    brightness: f32,
    contrast: f32,
    ctx: &RenderContext,
) -> FilmImage {
    let adjust = move |c: f32| ((c - 0.5) * contrast + 0.5 + brightness).clamp(0.0, 1.0);
    let pixels = ctx.map_pixels(&image.pixels, image.width, image.height, |px| {
        [adjust(px[0]), adjust(px[1]), adjust(px[2]), px[3]]
    });
    image.with_pixels(pixels)
}

/// Normalized 1D Gaussian weights for `sigma`, half-width `ceil(3σ)`.
pub fn gaussian_kernel(sigma: f32) -> Vec<f32> {
    let half = (sigma * KERNEL_SIGMAS).ceil().max(1.0) as i32;
    let two_sigma2 = 2.0 * sigma * sigma;

    let mut weights: Vec<f32> = (-half..=half)
        .map(|i| (-((i * i) as f32) / two_sigma2).exp())
        .collect();
    let sum: f32 = weights.iter().sum();
    for w in &mut weights {
        *w /= sum;
    }
    weights
}

/// Separable Gaussian blur with `sigma = radius` pixels.
///
/// Samples outside the image repeat the nearest edge pixel. A non-positive
/// radius returns a copy of the input.
pub fn gaussian_blur(image: &FilmImage, radius: f32, ctx: &RenderContext) -> FilmImage {
    if radius <= f32::EPSILON || image.is_empty() {
        return image.clone();
    }

    let kernel = gaussian_kernel(radius);
    let half = (kernel.len() / 2) as i64;
    let w = image.width as usize;
    let h = image.height as usize;
    let src = &image.pixels;

    let horizontal = ctx.map_rows(image.width, image.height, |y, row| {
        let base = y as usize * w;
        for (x, dst) in row.iter_mut().enumerate() {
            let mut acc = [0.0_f32; 4];
            for (k, &weight) in kernel.iter().enumerate() {
                let sx = (x as i64 + k as i64 - half).clamp(0, w as i64 - 1) as usize;
                let px = src[base + sx];
                for c in 0..4 {
                    acc[c] += px[c] * weight;
                }
            }
            *dst = acc;
        }
    });

    let pixels = ctx.map_rows(image.width, image.height, |y, row| {
        for (x, dst) in row.iter_mut().enumerate() {
            let mut acc = [0.0_f32; 4];
            for (k, &weight) in kernel.iter().enumerate() {
                let sy = (y as i64 + k as i64 - half).clamp(0, h as i64 - 1) as usize;
                let px = horizontal[sy * w + x];
                for c in 0..4 {
                    acc[c] += px[c] * weight;
                }
            }
            *dst = acc;
        }
    });

    image.with_pixels(pixels)
}

/// Scale `src` by `scale` around the origin with bilinear sampling, then crop
/// the result to `width × height`.
///
/// Output pixel centers map back to `((x + 0.5) / scale − 0.5, …)` in source
/// space; samples beyond the source repeat its edge.
pub fn scale_and_crop(
    src: &FilmImage,
    scale: f32,
    width: u32,
    height: u32,
    ctx: &RenderContext,
) -> Result<FilmImage, PipelineError> {
    if !(scale.is_finite() && scale > 0.0) {
        return Err(PipelineError::stage(
            "scale",
            format!("scale factor must be positive, got {scale}"),
        ));
    }
    if src.is_empty() {
        return Err(PipelineError::stage("scale", "source image is empty"));
    }

    let sw = src.width as usize;
    let max_x = (src.width - 1) as f32;
    let max_y = (src.height - 1) as f32;
    let inv = 1.0 / scale;

    let pixels = ctx.map_rows(width, height, |y, row| {
        let fy = ((y as f32 + 0.5) * inv - 0.5).clamp(0.0, max_y);
        let y0 = fy.floor() as usize;
        let y1 = (y0 + 1).min(src.height as usize - 1);
        let ty = fy - y0 as f32;

        for (x, dst) in row.iter_mut().enumerate() {
            let fx = ((x as f32 + 0.5) * inv - 0.5).clamp(0.0, max_x);
            let x0 = fx.floor() as usize;
            let x1 = (x0 + 1).min(sw - 1);
            let tx = fx - x0 as f32;

            let p00 = src.pixels[y0 * sw + x0];
            let p10 = src.pixels[y0 * sw + x1];
            let p01 = src.pixels[y1 * sw + x0];
            let p11 = src.pixels[y1 * sw + x1];
            for c in 0..4 {
                let top = p00[c] + (p10[c] - p00[c]) * tx;
                let bottom = p01[c] + (p11[c] - p01[c]) * tx;
                dst[c] = top + (bottom - top) * ty;
            }
        }
    });

    FilmImage::new(width, height, pixels)
}
