//! The debounced, supersedable preview worker.
//!
//! ```text
//! submit(P1) submit(P2) submit(P3)   ── quiet for `debounce` ──▶ run(P3)
//!                                     submit(P4) during run  ──▶ cancel run, debounce, run(P4)
//! ```

use std::sync::Arc;
use std::time::Duration;

use filmlab_core::{
    CancellationToken, FilmImage, FilterParams, Pipeline, PipelineError, PipelineOutput,
    PipelineRequest,
};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use crate::config::PreviewConfig;

/// Notifications published by the worker.
#[derive(Debug, Clone)]
pub enum PreviewEvent {
    /// A pipeline run began.
    ProcessingStarted { run: u64 },
    /// A run completed; `params` is the snapshot it rendered.
    ProcessingFinished {
        run: u64,
        params: FilterParams,
        output: Arc<PipelineOutput>,
    },
    /// A run was cancelled because newer parameters arrived.
    Superseded { run: u64 },
}

/// Latest observable state of the worker.
#[derive(Debug, Clone, Default)]
pub struct PreviewStatus {
    /// A run is in flight.
    pub processing: bool,
    /// Output of the most recent completed run.
    pub latest: Option<Arc<FilmImage>>,
    /// Number of runs that completed (superseded runs excluded).
    pub completed_runs: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum PreviewError {
    #[error("preview worker has shut down")]
    Closed,
}

#[derive(Debug)]
enum Command {
    SetParams(FilterParams),
    SetSource(Arc<FilmImage>),
}

/// The state the next run renders from. Later commands overwrite earlier ones.
#[derive(Debug, Default)]
struct Snapshot {
    source: Option<Arc<FilmImage>>,
    params: FilterParams,
}

impl Snapshot {
    fn apply(&mut self, cmd: Command) {
        match cmd {
            Command::SetParams(params) => self.params = params,
            Command::SetSource(image) => self.source = Some(image),
        }
    }
}

/// Handle to a background task that renders previews.
///
/// Dropping the handle closes the command channel; the task then stops after
/// cancelling any in-flight run.
pub struct PreviewWorker {
    commands: mpsc::UnboundedSender<Command>,
    events: broadcast::Sender<PreviewEvent>,
    status: watch::Receiver<PreviewStatus>,
    task: JoinHandle<()>,
}

impl PreviewWorker {
    /// Spawn the worker on the current tokio runtime.
    pub fn spawn(pipeline: Arc<Pipeline>, config: PreviewConfig) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let (status_tx, status) = watch::channel(PreviewStatus::default());

        let task = tokio::spawn(run_worker(
            pipeline,
            config.debounce,
            command_rx,
            events.clone(),
            status_tx,
        ));

        Self {
            commands,
            events,
            status,
            task,
        }
    }

    /// Queue new parameters. Never blocks.
    pub fn submit(&self, params: FilterParams) -> Result<(), PreviewError> {
        self.send(Command::SetParams(params))
    }

    /// Replace the source image. Debounced together with parameter changes.
    pub fn set_source(&self, image: Arc<FilmImage>) -> Result<(), PreviewError> {
        self.send(Command::SetSource(image))
    }

    /// Subscribe to run notifications from this point on.
    pub fn subscribe(&self) -> broadcast::Receiver<PreviewEvent> {
        self.events.subscribe()
    }

    /// Watch the processing flag and the latest output.
    pub fn status(&self) -> watch::Receiver<PreviewStatus> {
        self.status.clone()
    }

    /// Close the command channel and wait for the task to exit.
    pub async fn shutdown(self) {
        let Self { commands, task, .. } = self;
        drop(commands);
        if let Err(e) = task.await {
            tracing::error!("preview worker task failed: {e}");
        }
    }

    fn send(&self, cmd: Command) -> Result<(), PreviewError> {
        self.commands.send(cmd).map_err(|_| PreviewError::Closed)
    }
}

async fn run_worker(
    pipeline: Arc<Pipeline>,
    debounce: Duration,
    mut commands: mpsc::UnboundedReceiver<Command>,
    events: broadcast::Sender<PreviewEvent>,
    status: watch::Sender<PreviewStatus>,
) {
    let mut snapshot = Snapshot::default();
    let mut run = 0_u64;

    // Wait for the first change of a burst.
    'idle: while let Some(cmd) = commands.recv().await {
        snapshot.apply(cmd);

        loop {
            if !settle(&mut commands, debounce, &mut snapshot).await {
                break 'idle;
            }

            let Some(source) = snapshot.source.clone() else {
                tracing::debug!("preview: parameters changed but no source image is set");
                continue 'idle;
            };

            run += 1;
            let request = PipelineRequest::new(source, &snapshot.params);
            let params = request.params.clone();
            let cancel = CancellationToken::new();

            status.send_modify(|s| s.processing = true);
            let _ = events.send(PreviewEvent::ProcessingStarted { run });

            let job = tokio::task::spawn_blocking({
                let pipeline = Arc::clone(&pipeline);
                let cancel = cancel.clone();
                move || pipeline.process_cancellable(&request, &cancel)
            });

            tokio::select! {
                result = job => {
                    match result {
                        Ok(Ok(output)) => publish(run, params, output, &events, &status),
                        Ok(Err(PipelineError::Cancelled)) => {
                            status.send_modify(|s| s.processing = false);
                        }
                        Ok(Err(e)) => {
                            tracing::warn!("preview run {run} failed: {e}");
                            status.send_modify(|s| s.processing = false);
                        }
                        Err(e) => {
                            tracing::error!("preview run {run} panicked: {e}");
                            status.send_modify(|s| s.processing = false);
                        }
                    }
                    continue 'idle;
                }
                cmd = commands.recv() => {
                    cancel.cancel();
                    let _ = events.send(PreviewEvent::Superseded { run });
                    match cmd {
                        Some(cmd) => {
                            tracing::debug!("preview: run {run} superseded");
                            snapshot.apply(cmd);
                            // Debounce the new burst, then render again.
                        }
                        None => {
                            status.send_modify(|s| s.processing = false);
                            break 'idle;
                        }
                    }
                }
            }
        }
    }

    tracing::debug!("preview worker stopped after {run} runs");
}

/// Absorb commands until `window` passes without one.
///
/// Returns `false` when the command channel closed.
async fn settle(
    commands: &mut mpsc::UnboundedReceiver<Command>,
    window: Duration,
    snapshot: &mut Snapshot,
) -> bool {
    let mut coalesced = 0_usize;
    loop {
        match tokio::time::timeout(window, commands.recv()).await {
            Ok(Some(cmd)) => {
                snapshot.apply(cmd);
                coalesced += 1;
            }
            Ok(None) => return false,
            Err(_) => {
                if coalesced > 0 {
                    tracing::debug!("preview: coalesced {coalesced} extra changes");
                }
                return true;
            }
        }
    }
}

fn publish(
    run: u64,
    params: FilterParams,
    output: PipelineOutput,
    events: &broadcast::Sender<PreviewEvent>,
    status: &watch::Sender<PreviewStatus>,
) {
    let output = Arc::new(output);
    tracing::info!(
        "preview run {run} finished: {} at {:.2}, halation={:.2} grain={:.2}",
        params.lut,
        params.lut_intensity,
        params.halation_intensity,
        params.grain_intensity
    );
    status.send_modify(|s| {
        s.processing = false;
        s.latest = Some(Arc::clone(&output.image));
        s.completed_runs += 1;
    });
    let _ = events.send(PreviewEvent::ProcessingFinished {
        run,
        params,
        output,
    });
}
