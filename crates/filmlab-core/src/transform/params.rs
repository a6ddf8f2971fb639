//! The parameter snapshot every pipeline run is built from.
//!
//! `FilterParams` is the single source of truth for the user-facing sliders.
//! The preview worker debounces changes to it; the pipeline reads a frozen
//! copy for the duration of one run.

use serde::{Deserialize, Serialize};

/// LUT selected when nothing else has been chosen.
pub const DEFAULT_LUT: &str = "PRESET_Fujicolor_SuperHR100";

/// LUT choice plus the three effect intensities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterParams {
    /// Name of the LUT resource to apply.
    pub lut: String,
    /// LUT blend strength. 0.0 = original image.
    pub lut_intensity: f32,
    /// Halation glow strength. 0.0 = off.
    pub halation_intensity: f32,
    /// Film grain strength. 0.0 = off.
    pub grain_intensity: f32,
}

impl Default for FilterParams {
    /// Default LUT with every intensity at zero, so the image passes through unchanged.
    fn default() -> Self {
        Self {
            lut: DEFAULT_LUT.to_string(),
            lut_intensity: 0.0,
            halation_intensity: 0.0,
            grain_intensity: 0.0,
        }
    }
}

impl FilterParams {
    /// Convenience constructor for a LUT at a given strength, effects off.
    pub fn with_lut(lut: impl Into<String>, lut_intensity: f32) -> Self {
        Self {
            lut: lut.into(),
            lut_intensity,
            ..Self::default()
        }
    }

    /// Zero all intensities, keeping the LUT selection.
    pub fn reset_adjustments(&mut self) {
        self.lut_intensity = 0.0;
        self.halation_intensity = 0.0;
        self.grain_intensity = 0.0;
    }

    /// Copy with every intensity clamped to `[0, 1]`; NaN becomes 0.0.
    pub fn clamped(&self) -> Self {
        Self {
            lut: self.lut.clone(),
            lut_intensity: clamp_unit(self.lut_intensity),
            halation_intensity: clamp_unit(self.halation_intensity),
            grain_intensity: clamp_unit(self.grain_intensity),
        }
    }
}

fn clamp_unit(v: f32) -> f32 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}
