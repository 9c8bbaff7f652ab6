// Seeker service - Drives the engine from commands, host changes and fetch results
use crate::application::host::HostTimeRange;
use crate::application::seeker_engine::{
    FetchOutcome, FetchRequest, SeekerEngine, SeekerNotification, SeekerSnapshot, UpdateSource,
};
use crate::application::series_repository::SeriesRepository;
use crate::domain::series::SeekerQuery;
use crate::domain::time_range::{ContextPreset, PanDirection, TimeRange};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};

const COMMAND_BUFFER: usize = 64;

#[derive(Debug)]
pub enum SeekerCommand {
    Zoom(f64),
    Pan(PanDirection),
    Reset,
    ApplyPreset(ContextPreset),
    ApplyAbsoluteContext(TimeRange),
    SetTimeline(TimeRange),
    WheelZoom { cursor_ms: i64, delta_y: f64 },
    SetQuery(SeekerQuery),
    RetryErrors,
    /// Re-check for missing batches; scheduled after every stored batch.
    LoadNext,
    FetchCompleted(FetchOutcome),
}

/// Cloneable client of a running [`SeekerService`].
#[derive(Clone)]
pub struct SeekerHandle {
    commands: mpsc::Sender<SeekerCommand>,
    snapshots: watch::Receiver<SeekerSnapshot>,
}

impl SeekerHandle {
    pub async fn send(&self, command: SeekerCommand) -> anyhow::Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| anyhow::anyhow!("seeker service has stopped"))
    }

    pub fn snapshot(&self) -> SeekerSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SeekerSnapshot> {
        self.snapshots.clone()
    }
}

/// Single owner of a [`SeekerEngine`]. Runs one fetch at a time and stops
/// once every [`SeekerHandle`] is dropped.
pub struct SeekerService {
    engine: SeekerEngine,
    /// Set from spawning a fetch until its `FetchCompleted` arrives, even when
    /// a query change has already cleared the engine's loading marker.
    fetch_in_flight: bool,
    repository: Arc<dyn SeriesRepository>,
    host: Arc<dyn HostTimeRange>,
    commands: mpsc::WeakSender<SeekerCommand>,
    snapshots: watch::Sender<SeekerSnapshot>,
}

impl SeekerService {
    pub fn spawn(
        engine: SeekerEngine,
        repository: Arc<dyn SeriesRepository>,
        host: Arc<dyn HostTimeRange>,
    ) -> SeekerHandle {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let (snapshot_tx, snapshot_rx) = watch::channel(engine.snapshot());
        let host_rx = host.subscribe();

        let service = Self {
            engine,
            fetch_in_flight: false,
            repository,
            host,
            commands: tx.downgrade(),
            snapshots: snapshot_tx,
        };
        tokio::spawn(service.run(rx, host_rx));

        SeekerHandle {
            commands: tx,
            snapshots: snapshot_rx,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<SeekerCommand>,
        mut host_rx: watch::Receiver<TimeRange>,
    ) {
        tracing::info!(
            "Seeker started for {} over {}",
            self.engine.query().cache_key(),
            self.engine.visible()
        );
        host_rx.borrow_and_update();
        let mut host_open = true;
        self.after_update(true);

        loop {
            let poll = tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.apply(command),
                    None => break,
                },
                changed = host_rx.changed(), if host_open => {
                    match changed {
                        Ok(()) => {
                            let range = *host_rx.borrow_and_update();
                            self.engine.handle_dashboard_range_change(range);
                        }
                        Err(_) => {
                            tracing::debug!("Host time range closed");
                            host_open = false;
                        }
                    }
                    true
                }
            };
            self.after_update(poll);
        }

        tracing::info!("Seeker stopped");
    }

    /// Returns false when the load check must wait for a scheduled `LoadNext`.
    fn apply(&mut self, command: SeekerCommand) -> bool {
        match command {
            SeekerCommand::Zoom(factor) => self.engine.zoom_context_window(factor),
            SeekerCommand::Pan(direction) => self.engine.pan_context_window(direction),
            SeekerCommand::Reset => self.engine.reset_context_window(),
            SeekerCommand::ApplyPreset(preset) => self.engine.apply_context_preset(&preset),
            SeekerCommand::ApplyAbsoluteContext(range) => {
                if let Err(e) = self.engine.apply_absolute_context(range.from, range.to) {
                    tracing::warn!("Ignoring absolute context window: {}", e);
                }
            }
            SeekerCommand::SetTimeline(range) => {
                self.engine.set_timeline_range(range, UpdateSource::Programmatic)
            }
            SeekerCommand::WheelZoom { cursor_ms, delta_y } => {
                self.engine.wheel_zoom(cursor_ms, delta_y)
            }
            SeekerCommand::SetQuery(query) => self.engine.set_query(query),
            SeekerCommand::RetryErrors => self.engine.retry_errors(),
            SeekerCommand::LoadNext => {}
            SeekerCommand::FetchCompleted(outcome) => {
                self.fetch_in_flight = false;
                if self.engine.complete_fetch(outcome) {
                    self.schedule_load_check();
                }
                return false;
            }
        }
        true
    }

    fn after_update(&mut self, poll: bool) {
        for notification in self.engine.take_notifications() {
            match notification {
                SeekerNotification::TimeRangeChanged { range } => {
                    tracing::debug!("Pushing selection {} to host", range);
                    self.host.set_time_range(range);
                }
                SeekerNotification::VisibleRangeChanged { range } => {
                    tracing::debug!("Context window now {}", range);
                }
            }
        }

        if poll && !self.fetch_in_flight {
            if let Some(request) = self.engine.poll_load() {
                self.start_fetch(request);
            }
        }
        self.snapshots.send_replace(self.engine.snapshot());
    }

    fn start_fetch(&mut self, request: FetchRequest) {
        let Some(tx) = self.commands.upgrade() else {
            return;
        };
        self.fetch_in_flight = true;
        let repository = self.repository.clone();
        tracing::debug!("Fetching batch {} {}", request.batch_id, request.window);

        tokio::spawn(async move {
            let started = Instant::now();
            let result = repository
                .fetch_series(&request.query, request.window)
                .await
                .map_err(|e| format!("{e:#}"));
            tracing::debug!(
                "Batch {} finished in {:?} ({})",
                request.batch_id,
                started.elapsed(),
                if result.is_ok() { "ok" } else { "error" }
            );
            let _ = tx
                .send(SeekerCommand::FetchCompleted(FetchOutcome { request, result }))
                .await;
        });
    }

    /// Run the next load check on a later tick so the UI sees each batch.
    fn schedule_load_check(&self) {
        let Some(tx) = self.commands.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            let _ = tx.send(SeekerCommand::LoadNext).await;
        });
    }
}
