//! Error types for LUT parsing and pipeline stages.

/// Errors produced while parsing cube LUT text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LutParseError {
    #[error("missing LUT_3D_SIZE directive")]
    MissingSize,
    #[error("data count mismatch: expected {expected} entries, found {actual}")]
    CountMismatch { expected: usize, actual: usize },
    #[error("LUT_3D_SIZE {size} is too large")]
    SizeTooLarge { size: u32 },
}

/// Errors reported by the color transform engine and the effect stages.
///
/// Only [`PipelineError::Decode`] on the initial source image and
/// [`PipelineError::Cancelled`] end a pipeline run without an image; every
/// other variant is recorded and the run continues with the pre-stage image.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("failed to parse LUT '{name}': {source}")]
    Parse {
        name: String,
        #[source]
        source: LutParseError,
    },
    #[error("LUT resource not found: {name}")]
    ResourceNotFound { name: String },
    #[error("failed to read LUT '{name}': {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode image: {0}")]
    Decode(String),
    #[error("{stage} stage failed: {reason}")]
    StageFailure { stage: &'static str, reason: String },
    #[error("pipeline run cancelled")]
    Cancelled,
    #[error("render context error: {0}")]
    Context(String),
}

impl PipelineError {
    pub(crate) fn stage(stage: &'static str, reason: impl Into<String>) -> Self {
        Self::StageFailure {
            stage,
            reason: reason.into(),
        }
    }

    /// Whether this error came from resolving or parsing a LUT resource.
    pub fn is_lut_error(&self) -> bool {
        matches!(
            self,
            Self::Parse { .. } | Self::ResourceNotFound { .. } | Self::Io { .. }
        )
    }
}

impl From<image::ImageError> for PipelineError {
    fn from(err: image::ImageError) -> Self {
        Self::Decode(err.to_string())
    }
}
