//! Sequences LUT transform → halation → grain over one source image.
//!
//! The pipeline is fail-open: a stage that errors is reported and skipped,
//! and the next stage receives the image as it was before the failed stage.
//! Once a source image exists the pipeline always produces an image.

use std::convert::Infallible;
use std::sync::Arc;

use crate::effects::{EffectStage, GrainStage, HalationStage};
use crate::error::PipelineError;
use crate::image::FilmImage;
use crate::pipeline::cancel::CancellationToken;
use crate::pipeline::config::PipelineConfig;
use crate::pipeline::profile::ProfileCatalog;
use crate::render::RenderContext;
use crate::transform::engine::ColorTransformEngine;
use crate::transform::library::LutLibrary;
use crate::transform::params::FilterParams;

/// One unit of work: a source image and the parameters to render it with.
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub source: Arc<FilmImage>,
    pub params: FilterParams,
}

impl PipelineRequest {
    /// Build a request; intensities are clamped to `[0, 1]`.
    pub fn new(source: Arc<FilmImage>, params: &FilterParams) -> Self {
        Self {
            source,
            params: params.clamped(),
        }
    }

    /// Decode `bytes` into the source image. Decode failure is the one
    /// error that leaves nothing to render.
    pub fn from_encoded(bytes: &[u8], params: &FilterParams) -> Result<Self, PipelineError> {
        let source = FilmImage::decode(bytes)?;
        Ok(Self::new(Arc::new(source), params))
    }
}

/// Pipeline progress, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Transforming,
    Halating,
    Graining,
    Done,
}

/// Why an optional stage did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The active LUT profile does not enable secondary effects.
    ProfileWithoutEffects,
    /// The stage's intensity is zero.
    ZeroIntensity,
}

#[derive(Debug)]
pub enum StageOutcome {
    Applied,
    Skipped(SkipReason),
    /// The stage failed; its input image was carried forward.
    Failed(PipelineError),
}

/// What happened in one stage of a run.
#[derive(Debug)]
pub struct StageReport {
    pub state: PipelineState,
    pub outcome: StageOutcome,
}

/// The image a run produced plus its per-stage reports.
#[derive(Debug)]
pub struct PipelineOutput {
    pub image: Arc<FilmImage>,
    pub reports: Vec<StageReport>,
}

impl PipelineOutput {
    /// Errors from stages that failed and were skipped.
    pub fn diagnostics(&self) -> impl Iterator<Item = &PipelineError> {
        self.reports.iter().filter_map(|r| match &r.outcome {
            StageOutcome::Failed(err) => Some(err),
            _ => None,
        })
    }

    /// Whether the stage for `state` ran successfully.
    pub fn applied(&self, state: PipelineState) -> bool {
        self.reports
            .iter()
            .any(|r| r.state == state && matches!(r.outcome, StageOutcome::Applied))
    }

    pub fn outcome(&self, state: PipelineState) -> Option<&StageOutcome> {
        self.reports.iter().find(|r| r.state == state).map(|r| &r.outcome)
    }
}

/// The color transform pipeline.
///
/// `Pipeline` is `Send + Sync`; one instance can serve concurrent runs.
pub struct Pipeline {
    engine: ColorTransformEngine,
    catalog: ProfileCatalog,
    halation: Box<dyn EffectStage>,
    grain: Box<dyn EffectStage>,
}

impl Pipeline {
    /// Build a pipeline, creating its render context from `config`.
    pub fn new(
        library: Arc<LutLibrary>,
        catalog: ProfileCatalog,
        config: &PipelineConfig,
    ) -> Result<Self, PipelineError> {
        let context = match config.threads {
            Some(threads) => RenderContext::with_threads(threads)?,
            None => RenderContext::new(),
        };
        let grain = match config.grain_seed {
            Some(seed) => GrainStage::seeded(seed),
            None => GrainStage::new(),
        };
        Ok(Self::with_context(Arc::new(context), library, catalog)
            .with_halation_stage(HalationStage::new(config.halation_layering))
            .with_grain_stage(grain))
    }

    /// Build a pipeline on an existing render context with default stages.
    pub fn with_context(
        context: Arc<RenderContext>,
        library: Arc<LutLibrary>,
        catalog: ProfileCatalog,
    ) -> Self {
        Self {
            engine: ColorTransformEngine::new(context, library),
            catalog,
            halation: Box::new(HalationStage::default()),
            grain: Box::new(GrainStage::new()),
        }
    }

    /// Replace the halation stage.
    pub fn with_halation_stage(mut self, stage: impl EffectStage + 'static) -> Self {
        self.halation = Box::new(stage);
        self
    }

    /// Replace the grain stage.
    pub fn with_grain_stage(mut self, stage: impl EffectStage + 'static) -> Self {
        self.grain = Box::new(stage);
        self
    }

    pub fn engine(&self) -> &ColorTransformEngine {
        &self.engine
    }

    pub fn catalog(&self) -> &ProfileCatalog {
        &self.catalog
    }

    /// Run every stage and return the best image available.
    pub fn process(&self, request: &PipelineRequest) -> PipelineOutput {
        match self.run(request, || Ok::<(), Infallible>(())) {
            Ok(output) => output,
            Err(never) => match never {},
        }
    }

    /// Like [`process`](Self::process), but checks `cancel` before each stage
    /// and returns [`PipelineError::Cancelled`] once it fires.
    pub fn process_cancellable(
        &self,
        request: &PipelineRequest,
        cancel: &CancellationToken,
    ) -> Result<PipelineOutput, PipelineError> {
        self.run(request, || check_cancelled(cancel))
    }

    /// Decode `bytes` and process them.
    pub fn process_encoded(
        &self,
        bytes: &[u8],
        params: &FilterParams,
    ) -> Result<PipelineOutput, PipelineError> {
        let request = PipelineRequest::from_encoded(bytes, params)?;
        Ok(self.process(&request))
    }

    /// Sequence the stages. `checkpoint` runs before each stage that does
    /// work; its error ends the run.
    fn run<E>(
        &self,
        request: &PipelineRequest,
        checkpoint: impl Fn() -> Result<(), E>,
    ) -> Result<PipelineOutput, E> {
        let params = &request.params;
        let mut reports = Vec::with_capacity(3);
        let mut current = Arc::clone(&request.source);

        checkpoint()?;
        tracing::debug!("pipeline: {:?} lut={}", PipelineState::Transforming, params.lut);
        let outcome = match self
            .engine
            .apply_named(&current, &params.lut, params.lut_intensity)
        {
            Ok(image) => {
                current = Arc::new(image);
                StageOutcome::Applied
            }
            Err(err) => {
                tracing::warn!("LUT stage failed, keeping untransformed image: {err}");
                StageOutcome::Failed(err)
            }
        };
        reports.push(StageReport {
            state: PipelineState::Transforming,
            outcome,
        });

        let effects_enabled = self.catalog.supports_effects(&params.lut);
        let effect_stages: [(PipelineState, &dyn EffectStage, f32); 2] = [
            (PipelineState::Halating, self.halation.as_ref(), params.halation_intensity),
            (PipelineState::Graining, self.grain.as_ref(), params.grain_intensity),
        ];

        for (state, stage, intensity) in effect_stages {
            let outcome = if !effects_enabled {
                StageOutcome::Skipped(SkipReason::ProfileWithoutEffects)
            } else if intensity <= 0.0 {
                StageOutcome::Skipped(SkipReason::ZeroIntensity)
            } else {
                checkpoint()?;
                tracing::debug!("pipeline: {state:?} intensity={intensity}");
                match stage.apply(&current, intensity, self.engine.context()) {
                    Ok(image) => {
                        current = Arc::new(image);
                        StageOutcome::Applied
                    }
                    Err(err) => {
                        tracing::warn!("{} stage failed, skipping: {err}", stage.name());
                        StageOutcome::Failed(err)
                    }
                }
            };
            reports.push(StageReport { state, outcome });
        }

        tracing::debug!("pipeline: {:?}", PipelineState::Done);
        Ok(PipelineOutput {
            image: current,
            reports,
        })
    }
}

fn check_cancelled(cancel: &CancellationToken) -> Result<(), PipelineError> {
    if cancel.is_cancelled() {
        return Err(PipelineError::Cancelled);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::library::MemoryLutSource;
    use crate::error::LutParseError;
    use crate::transform::lut::Lut3D;

    const EPSILON: f32 = 1e-5;
    const POLAROID: &str = "Polaroid 600";

    struct FailingStage;

    impl EffectStage for FailingStage {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn apply(
            &self,
            _image: &FilmImage,
            _intensity: f32,
            _ctx: &RenderContext,
        ) -> Result<FilmImage, PipelineError> {
            Err(PipelineError::stage("failing", "filter construction failed"))
        }
    }

    fn invert_text() -> String {
        Lut3D::from_fn(2, |[r, g, b]| [1.0 - r, 1.0 - g, 1.0 - b]).to_cube_string()
    }

    fn pipeline() -> Pipeline {
        let source = MemoryLutSource::new()
            .with(POLAROID, invert_text())
            .with(crate::transform::params::DEFAULT_LUT, invert_text());
        Pipeline::with_context(
            Arc::new(RenderContext::new()),
            Arc::new(LutLibrary::new(source)),
            ProfileCatalog::default(),
        )
        .with_grain_stage(GrainStage::seeded(11))
    }

    fn source() -> Arc<FilmImage> {
        Arc::new(FilmImage::filled(6, 4, [0.2, 0.4, 0.6, 1.0]))
    }

    fn params(lut: &str, lut_i: f32, hal_i: f32, grain_i: f32) -> FilterParams {
        FilterParams {
            lut: lut.to_string(),
            lut_intensity: lut_i,
            halation_intensity: hal_i,
            grain_intensity: grain_i,
        }
    }

    #[test]
    fn test_lut_only_run() {
        let out = pipeline().process(&PipelineRequest::new(
            source(),
            &params(POLAROID, 1.0, 0.0, 0.0),
        ));
        let px = out.image.pixel(0, 0);
        assert!((px[0] - 0.8).abs() < EPSILON);
        assert!((px[2] - 0.4).abs() < EPSILON);
        assert!(out.applied(PipelineState::Transforming));
        assert!(matches!(
            out.outcome(PipelineState::Halating),
            Some(StageOutcome::Skipped(SkipReason::ZeroIntensity))
        ));
        assert_eq!(out.diagnostics().count(), 0);
    }

    #[test]
    fn test_missing_lut_falls_back_to_source() {
        let src = source();
        let out = pipeline().process(&PipelineRequest::new(
            Arc::clone(&src),
            &params("Nonexistent", 1.0, 0.0, 0.0),
        ));
        assert_eq!(*out.image, *src);
        let diags: Vec<_> = out.diagnostics().collect();
        assert_eq!(diags.len(), 1);
        assert!(matches!(diags[0], PipelineError::ResourceNotFound { .. }));
    }

    #[test]
    fn test_effects_gated_by_profile() {
        let out = pipeline().process(&PipelineRequest::new(
            source(),
            &params(crate::transform::params::DEFAULT_LUT, 0.5, 1.0, 1.0),
        ));
        assert!(out.applied(PipelineState::Transforming));
        assert!(matches!(
            out.outcome(PipelineState::Halating),
            Some(StageOutcome::Skipped(SkipReason::ProfileWithoutEffects))
        ));
        assert!(matches!(
            out.outcome(PipelineState::Graining),
            Some(StageOutcome::Skipped(SkipReason::ProfileWithoutEffects))
        ));
    }

    #[test]
    fn test_effects_run_for_capable_profile() {
        let out = pipeline().process(&PipelineRequest::new(
            source(),
            &params(POLAROID, 1.0, 0.5, 0.5),
        ));
        assert!(out.applied(PipelineState::Halating));
        assert!(out.applied(PipelineState::Graining));
        assert_eq!(out.reports.len(), 3);
    }

    #[test]
    fn test_failed_effect_keeps_pre_stage_image() {
        let lut_only = pipeline().process(&PipelineRequest::new(
            source(),
            &params(POLAROID, 1.0, 0.0, 0.0),
        ));
        let out = pipeline()
            .with_halation_stage(FailingStage)
            .with_grain_stage(FailingStage)
            .process(&PipelineRequest::new(source(), &params(POLAROID, 1.0, 0.7, 0.7)));
        assert_eq!(*out.image, *lut_only.image);
        assert_eq!(out.diagnostics().count(), 2);
        assert!(
            out.diagnostics()
                .all(|e| matches!(e, PipelineError::StageFailure { stage: "failing", .. }))
        );
    }

    #[test]
    fn test_oversized_lut_size_fails_open() {
        let lut_source = MemoryLutSource::new().with("Huge", "LUT_3D_SIZE 3000000\n0 0 0\n");
        let pipeline = Pipeline::with_context(
            Arc::new(RenderContext::new()),
            Arc::new(LutLibrary::new(lut_source)),
            ProfileCatalog::default(),
        );
        let src = source();
        let out = pipeline.process(&PipelineRequest::new(
            Arc::clone(&src),
            &params("Huge", 1.0, 0.0, 0.0),
        ));
        assert_eq!(*out.image, *src);
        match out.outcome(PipelineState::Transforming) {
            Some(StageOutcome::Failed(PipelineError::Parse { source, .. })) => {
                assert_eq!(*source, LutParseError::SizeTooLarge { size: 3_000_000 });
            }
            other => panic!("expected parse failure, got {other:?}"),
        }
    }

    #[test]
    fn test_process_reports_every_stage() {
        let out = pipeline().process(&PipelineRequest::new(
            source(),
            &params(POLAROID, 1.0, 0.0, 0.0),
        ));
        let states: Vec<_> = out.reports.iter().map(|r| r.state).collect();
        assert_eq!(
            states,
            [PipelineState::Transforming, PipelineState::Halating, PipelineState::Graining]
        );
    }

    #[test]
    fn test_cancelled_token_aborts() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = pipeline()
            .process_cancellable(
                &PipelineRequest::new(source(), &params(POLAROID, 1.0, 0.0, 0.0)),
                &cancel,
            )
            .unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled));
    }

    #[test]
    fn test_process_encoded_rejects_garbage() {
        let err = pipeline()
            .process_encoded(b"\x00\x01\x02", &FilterParams::default())
            .unwrap_err();
        assert!(matches!(err, PipelineError::Decode(_)));
    }

    #[test]
    fn test_request_clamps_intensities() {
        let request = PipelineRequest::new(source(), &params(POLAROID, 3.0, -1.0, f32::NAN));
        assert_eq!(request.params.lut_intensity, 1.0);
        assert_eq!(request.params.halation_intensity, 0.0);
        assert_eq!(request.params.grain_intensity, 0.0);
    }
}
