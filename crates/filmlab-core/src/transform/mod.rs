//! Color transform — LUT parsing, the LUT library, and LUT application.

pub mod engine;
pub mod library;
pub mod lut;
pub mod params;
