use std::sync::Arc;
use std::time::Duration;

use filmlab_core::effects::EffectStage;
use filmlab_core::{
    FilmImage, FilterParams, Lut3D, LutLibrary, MemoryLutSource, Pipeline, PipelineError,
    ProfileCatalog, RenderContext,
};
use filmlab_preview::{PreviewConfig, PreviewEvent, PreviewWorker};
use tokio::sync::broadcast::{self, error::TryRecvError};

const POLAROID: &str = "Polaroid 600";
const DEBOUNCE: Duration = Duration::from_millis(300);

/// Halation stand-in that holds the blocking thread long enough to be superseded.
struct SlowStage;

impl EffectStage for SlowStage {
    fn name(&self) -> &'static str {
        "slow"
    }

    fn apply(
        &self,
        image: &FilmImage,
        _intensity: f32,
        _ctx: &RenderContext,
    ) -> Result<FilmImage, PipelineError> {
        std::thread::sleep(Duration::from_millis(200));
        Ok(image.clone())
    }
}

fn pipeline() -> Arc<Pipeline> {
    let invert = Lut3D::from_fn(2, |[r, g, b]| [1.0 - r, 1.0 - g, 1.0 - b]);
    let source = MemoryLutSource::new().with(POLAROID, invert.to_cube_string());
    Arc::new(
        Pipeline::with_context(
            Arc::new(RenderContext::new()),
            Arc::new(LutLibrary::new(source)),
            ProfileCatalog::default(),
        )
        .with_halation_stage(SlowStage),
    )
}

fn photo() -> Arc<FilmImage> {
    Arc::new(FilmImage::filled(8, 6, [0.2, 0.4, 0.6, 1.0]))
}

fn params(lut_intensity: f32, halation_intensity: f32) -> FilterParams {
    FilterParams {
        lut: POLAROID.to_string(),
        lut_intensity,
        halation_intensity,
        grain_intensity: 0.0,
    }
}

async fn next_event(rx: &mut broadcast::Receiver<PreviewEvent>) -> PreviewEvent {
    tokio::time::timeout(Duration::from_secs(30), rx.recv())
        .await
        .expect("timed out waiting for preview event")
        .expect("event channel closed")
}

#[tokio::test(start_paused = true)]
async fn burst_collapses_into_one_run_with_latest_params() {
    let worker = PreviewWorker::spawn(pipeline(), PreviewConfig::with_debounce(DEBOUNCE));
    let mut events = worker.subscribe();
    let start = tokio::time::Instant::now();

    worker.set_source(photo()).unwrap();
    worker.submit(params(0.2, 0.0)).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    worker.submit(params(0.5, 0.0)).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    worker.submit(params(1.5, 0.0)).unwrap();

    match next_event(&mut events).await {
        PreviewEvent::ProcessingStarted { run } => assert_eq!(run, 1),
        other => panic!("expected start, got {other:?}"),
    }
    assert!(start.elapsed() >= Duration::from_millis(500));

    match next_event(&mut events).await {
        PreviewEvent::ProcessingFinished {
            run,
            params: rendered,
            output,
        } => {
            assert_eq!(run, 1);
            // Only the last snapshot renders, clamped into range.
            assert_eq!(rendered, params(1.0, 0.0));
            let px = output.image.pixel(0, 0);
            assert!((px[0] - 0.8).abs() < 1e-5);
            assert!((px[2] - 0.4).abs() < 1e-5);
        }
        other => panic!("expected finish, got {other:?}"),
    }

    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    let status = worker.status().borrow().clone();
    assert!(!status.processing);
    assert_eq!(status.completed_runs, 1);
    assert!(status.latest.is_some());

    worker.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn change_during_run_supersedes_it() {
    let worker = PreviewWorker::spawn(pipeline(), PreviewConfig::with_debounce(DEBOUNCE));
    let mut events = worker.subscribe();

    worker.set_source(photo()).unwrap();
    worker.submit(params(1.0, 0.6)).unwrap();

    match next_event(&mut events).await {
        PreviewEvent::ProcessingStarted { run } => assert_eq!(run, 1),
        other => panic!("expected start, got {other:?}"),
    }
    assert!(worker.status().borrow().processing);

    let latest = params(0.4, 0.0);
    worker.submit(latest.clone()).unwrap();

    match next_event(&mut events).await {
        PreviewEvent::Superseded { run } => assert_eq!(run, 1),
        other => panic!("expected superseded, got {other:?}"),
    }
    match next_event(&mut events).await {
        PreviewEvent::ProcessingStarted { run } => assert_eq!(run, 2),
        other => panic!("expected second start, got {other:?}"),
    }
    match next_event(&mut events).await {
        PreviewEvent::ProcessingFinished { run, params, .. } => {
            assert_eq!(run, 2);
            assert_eq!(params, latest);
        }
        other => panic!("expected finish, got {other:?}"),
    }

    assert_eq!(worker.status().borrow().completed_runs, 1);
    worker.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn no_source_means_no_run() {
    let worker = PreviewWorker::spawn(pipeline(), PreviewConfig::with_debounce(DEBOUNCE));
    let mut events = worker.subscribe();

    worker.submit(params(1.0, 0.0)).unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    assert_eq!(worker.status().borrow().completed_runs, 0);

    // A source arriving later renders the params already submitted.
    worker.set_source(photo()).unwrap();
    assert!(matches!(
        next_event(&mut events).await,
        PreviewEvent::ProcessingStarted { run: 1 }
    ));
    match next_event(&mut events).await {
        PreviewEvent::ProcessingFinished { params: p, .. } => assert_eq!(p, params(1.0, 0.0)),
        other => panic!("expected finish, got {other:?}"),
    }

    worker.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_closes_status_channel() {
    let worker = PreviewWorker::spawn(pipeline(), PreviewConfig::with_debounce(DEBOUNCE));
    let mut status = worker.status();

    worker.shutdown().await;

    assert!(status.changed().await.is_err());
}
