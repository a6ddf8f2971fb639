//! Image representation shared by every pipeline stage.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::PipelineError;

/// Supported bit depths for source images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BitDepth {
    /// 8-bit unsigned integer.
    U8,
    /// 16-bit unsigned integer.
    U16,
    /// 32-bit floating point.
    F32,
}

impl fmt::Display for BitDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::U8 => write!(f, "8-bit"),
            Self::U16 => write!(f, "16-bit"),
            Self::F32 => write!(f, "32-bit float"),
        }
    }
}

impl From<image::ColorType> for BitDepth {
    fn from(color: image::ColorType) -> Self {
        match color {
            image::ColorType::L16
            | image::ColorType::La16
            | image::ColorType::Rgb16
            | image::ColorType::Rgba16 => Self::U16,
            image::ColorType::Rgb32F | image::ColorType::Rgba32F => Self::F32,
            _ => Self::U8,
        }
    }
}

/// Internal image representation. Always stored as straight-alpha RGBA f32
/// with channels normalized to `[0, 1]`.
///
/// Stages never write into an existing `FilmImage`; each one allocates its
/// own output, so buffers can be shared across threads behind an `Arc`.
#[derive(Debug, Clone, PartialEq)]
pub struct FilmImage {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Pixel data, row-major, `width * height` entries.
    pub pixels: Vec<[f32; 4]>,
    /// Original bit depth of the source image.
    pub source_bit_depth: BitDepth,
}

impl FilmImage {
    /// Build an image from raw pixels, checking the buffer length.
    pub fn new(width: u32, height: u32, pixels: Vec<[f32; 4]>) -> Result<Self, PipelineError> {
        let expected = width as usize * height as usize;
        if pixels.len() != expected {
            return Err(PipelineError::Decode(format!(
                "pixel buffer holds {} entries, {width}x{height} needs {expected}",
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
            source_bit_depth: BitDepth::F32,
        })
    }

    /// A `width × height` image where every pixel is `rgba`.
    pub fn filled(width: u32, height: u32, rgba: [f32; 4]) -> Self {
        Self {
            width,
            height,
            pixels: vec![rgba; width as usize * height as usize],
            source_bit_depth: BitDepth::F32,
        }
    }

    /// Decode an encoded image (PNG, JPEG, TIFF, ...) via the `image` crate.
    pub fn decode(bytes: &[u8]) -> Result<Self, PipelineError> {
        let img = image::load_from_memory(bytes)?;
        let rgba = img.to_rgba32f();
        let (width, height) = rgba.dimensions();

        let pixels: Vec<[f32; 4]> = rgba
            .pixels()
            .map(|p| [p.0[0], p.0[1], p.0[2], p.0[3]])
            .collect();

        Ok(Self {
            width,
            height,
            pixels,
            source_bit_depth: BitDepth::from(img.color()),
        })
    }

    /// Convert an 8-bit RGBA buffer handed over by a display collaborator.
    pub fn from_rgba8(rgba: &image::RgbaImage) -> Self {
        let (width, height) = rgba.dimensions();
        let pixels = rgba
            .pixels()
            .map(|p| {
                [
                    p.0[0] as f32 / 255.0,
                    p.0[1] as f32 / 255.0,
                    p.0[2] as f32 / 255.0,
                    p.0[3] as f32 / 255.0,
                ]
            })
            .collect();
        Self {
            width,
            height,
            pixels,
            source_bit_depth: BitDepth::U8,
        }
    }

    /// Quantize to 8-bit RGBA for display.
    pub fn to_rgba8(&self) -> image::RgbaImage {
        image::RgbaImage::from_fn(self.width, self.height, |x, y| {
            let px = self.pixel(x, y);
            image::Rgba(px.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8))
        })
    }

    /// Pixel at `(x, y)`. Panics when out of bounds.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [f32; 4] {
        self.pixels[(y as usize) * (self.width as usize) + x as usize]
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Same dimensions, new pixel data.
    pub(crate) fn with_pixels(&self, pixels: Vec<[f32; 4]>) -> Self {
        debug_assert_eq!(pixels.len(), self.pixels.len());
        Self {
            width: self.width,
            height: self.height,
            pixels,
            source_bit_depth: self.source_bit_depth,
        }
    }

    /// Check that the buffer length agrees with the declared dimensions.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let expected = self.width as usize * self.height as usize;
        if self.pixels.len() != expected {
            return Err(PipelineError::Decode(format!(
                "pixel buffer holds {} entries, {}x{} needs {expected}",
                self.pixels.len(),
                self.width,
                self.height
            )));
        }
        Ok(())
    }

    /// Largest per-channel absolute difference, or `None` if the sizes differ.
    pub fn max_abs_diff(&self, other: &FilmImage) -> Option<f32> {
        if self.width != other.width || self.height != other.height {
            return None;
        }
        let diff = self
            .pixels
            .iter()
            .zip(&other.pixels)
            .flat_map(|(a, b)| (0..4).map(move |c| (a[c] - b[c]).abs()))
            .fold(0.0_f32, f32::max);
        Some(diff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_wrong_pixel_count() {
        let err = FilmImage::new(2, 2, vec![[0.0; 4]; 3]).unwrap_err();
        assert!(matches!(err, PipelineError::Decode(_)));
    }

    #[test]
    fn test_decode_garbage_fails() {
        let err = FilmImage::decode(b"definitely not an image").unwrap_err();
        assert!(matches!(err, PipelineError::Decode(_)));
    }

    #[test]
    fn test_decode_png_roundtrip() {
        let mut src = image::RgbaImage::new(3, 2);
        src.put_pixel(1, 1, image::Rgba([255, 128, 0, 255]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgba8(src.clone())
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();

        let decoded = FilmImage::decode(&bytes).unwrap();
        assert_eq!((decoded.width, decoded.height), (3, 2));
        assert_eq!(decoded.source_bit_depth, BitDepth::U8);
        assert_eq!(decoded.to_rgba8(), src);
    }

    #[test]
    fn test_rgba8_conversion_preserves_values() {
        let mut src = image::RgbaImage::new(2, 1);
        src.put_pixel(0, 0, image::Rgba([10, 20, 30, 40]));
        src.put_pixel(1, 0, image::Rgba([255, 0, 127, 255]));
        let film = FilmImage::from_rgba8(&src);
        assert_eq!(film.to_rgba8(), src);
    }

    #[test]
    fn test_max_abs_diff_size_mismatch() {
        let a = FilmImage::filled(2, 2, [0.5; 4]);
        let b = FilmImage::filled(1, 2, [0.5; 4]);
        assert_eq!(a.max_abs_diff(&b), None);
        assert_eq!(a.max_abs_diff(&a), Some(0.0));
    }
}
