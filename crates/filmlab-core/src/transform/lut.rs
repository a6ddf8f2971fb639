//! 3D LUT parsing, trilinear application, and `.cube` file I/O.
//!
//! # Format
//! ```text
//! # comment
//! TITLE "Polaroid 600"
//! LUT_3D_SIZE 2
//! 0.0 0.0 0.0
//! 1.0 0.0 0.0
//! ...
//! ```
//! Data lines are stored in file order: red varies fastest, then green,
//! then blue, so entry `(r, g, b)` lives at `(b * size + g) * size + r`.

use std::fmt::Write as _;
use std::path::Path;

use crate::error::LutParseError;

/// Directive that sets the lattice size.
const SIZE_DIRECTIVE: &str = "LUT_3D_SIZE";
/// Directive that names the LUT.
const TITLE_DIRECTIVE: &str = "TITLE";

/// A 3D lookup table mapping input RGB to output RGB.
///
/// Immutable once built; share it across pipeline runs behind an `Arc`.
#[derive(Debug, Clone, PartialEq)]
pub struct Lut3D {
    /// Grid size per axis.
    pub size: u32,
    /// LUT entries as RGBA values, alpha fixed at 1.0. Length = size³.
    pub data: Vec<[f32; 4]>,
    /// Optional `TITLE` from the cube file.
    pub title: Option<String>,
}

impl Lut3D {
    /// Parse cube-format text.
    ///
    /// Empty lines and `#` comments are ignored. `LUT_3D_SIZE n` sets the
    /// size (a later directive overrides an earlier one). Lines made of
    /// exactly three floats are data points; any other line is skipped.
    pub fn parse(text: &str) -> Result<Self, LutParseError> {
        let mut size: Option<u32> = None;
        let mut title = None;
        let mut data: Vec<[f32; 4]> = Vec::new();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let tokens: Vec<&str> = line.split_whitespace().collect();

            if tokens[0].eq_ignore_ascii_case(SIZE_DIRECTIVE) {
                if let Some(n) = tokens.get(1).and_then(|t| t.parse::<u32>().ok())
                    && n > 0
                {
                    if let Some(prev) = size
                        && prev != n
                    {
                        tracing::debug!("{SIZE_DIRECTIVE} redefined: {prev} -> {n}");
                    }
                    size = Some(n);
                }
                continue;
            }

            if tokens[0] == TITLE_DIRECTIVE {
                let rest = line[TITLE_DIRECTIVE.len()..].trim().trim_matches('"');
                title = Some(rest.to_string());
                continue;
            }

            if tokens.len() == 3
                && let (Ok(r), Ok(g), Ok(b)) = (
                    tokens[0].parse::<f32>(),
                    tokens[1].parse::<f32>(),
                    tokens[2].parse::<f32>(),
                )
            {
                data.push([r, g, b, 1.0]);
            }
        }

        let size = size.ok_or(LutParseError::MissingSize)?;
        let expected = (size as usize)
            .checked_pow(3)
            .ok_or(LutParseError::SizeTooLarge { size })?;
        if data.len() != expected {
            return Err(LutParseError::CountMismatch {
                expected,
                actual: data.len(),
            });
        }

        Ok(Self { size, data, title })
    }

    /// Build a LUT by evaluating `f` at every lattice point.
    ///
    /// `f` receives normalized `[r, g, b]` coordinates in `[0, 1]`. A size
    /// of zero is raised to one.
    pub fn from_fn(size: u32, f: impl Fn([f32; 3]) -> [f32; 3]) -> Self {
        let size = size.max(1);
        let n = size as usize;
        let scale = (size.max(2) - 1) as f32;
        let mut data = Vec::with_capacity(n * n * n);
        for b in 0..n {
            for g in 0..n {
                for r in 0..n {
                    let rgb = f([r as f32 / scale, g as f32 / scale, b as f32 / scale]);
                    data.push([rgb[0], rgb[1], rgb[2], 1.0]);
                }
            }
        }
        Self {
            size,
            data,
            title: None,
        }
    }

    /// Identity LUT of the given size.
    pub fn identity(size: u32) -> Self {
        Self::from_fn(size, |rgb| rgb)
    }

    /// Entry at lattice coordinates `(r, g, b)`.
    #[inline]
    pub fn get(&self, r: usize, g: usize, b: usize) -> [f32; 4] {
        let n = self.size as usize;
        self.data[(b * n + g) * n + r]
    }

    /// Apply this LUT to an RGB pixel using trilinear interpolation.
    ///
    /// Inputs are clamped to `[0, 1]`, scaled by `size - 1`, and the 8
    /// surrounding lattice points are blended by fractional distance.
    pub fn apply(&self, rgb: [f32; 3]) -> [f32; 3] {
        // Size 1 is a constant; a table that does not match its size has no
        // lattice to interpolate.
        if self.size <= 1 || (self.size as usize).checked_pow(3) != Some(self.data.len()) {
            return match self.data.first() {
                Some(c) => [c[0], c[1], c[2]],
                None => rgb,
            };
        }

        let n = (self.size - 1) as f32;
        let max_base = self.size as usize - 2;

        let mut base = [0_usize; 3];
        let mut frac = [0.0_f32; 3];
        for c in 0..3 {
            let v = rgb[c].clamp(0.0, 1.0) * n;
            let i = (v.floor() as usize).min(max_base);
            base[c] = i;
            frac[c] = v - i as f32;
        }
        let [ri, gi, bi] = base;
        let [rf, gf, bf] = frac;

        let c000 = self.get(ri, gi, bi);
        let c100 = self.get(ri + 1, gi, bi);
        let c010 = self.get(ri, gi + 1, bi);
        let c110 = self.get(ri + 1, gi + 1, bi);
        let c001 = self.get(ri, gi, bi + 1);
        let c101 = self.get(ri + 1, gi, bi + 1);
        let c011 = self.get(ri, gi + 1, bi + 1);
        let c111 = self.get(ri + 1, gi + 1, bi + 1);

        let mut out = [0.0_f32; 3];
        for c in 0..3 {
            // Collapse along red, then green, then blue.
            let c00 = lerp(c000[c], c100[c], rf);
            let c10 = lerp(c010[c], c110[c], rf);
            let c01 = lerp(c001[c], c101[c], rf);
            let c11 = lerp(c011[c], c111[c], rf);
            let c0 = lerp(c00, c10, gf);
            let c1 = lerp(c01, c11, gf);
            out[c] = lerp(c0, c1, bf);
        }
        out
    }

    /// Serialize as cube text. Parsing the result yields an identical table.
    pub fn to_cube_string(&self) -> String {
        let mut out = String::with_capacity(self.data.len() * 24 + 64);
        if let Some(title) = &self.title {
            let _ = writeln!(out, "{TITLE_DIRECTIVE} \"{title}\"");
        }
        let _ = writeln!(out, "{SIZE_DIRECTIVE} {}", self.size);
        for entry in &self.data {
            let _ = writeln!(out, "{} {} {}", entry[0], entry[1], entry[2]);
        }
        out
    }

    /// Load a 3D LUT from a `.cube` file.
    pub fn load_cube(path: &Path) -> std::io::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Save this 3D LUT to a `.cube` file.
    pub fn save_cube(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, self.to_cube_string())
    }
}

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}
