//! Engine lifecycle and the owner event loop.
//!
//! The engine runs as one background task that exclusively owns the
//! [`ViewportController`]. Control commands from the UI layer and
//! settlements from fetch tasks arrive on two channels; the pending commit
//! deadline is the third arm of the loop. This is the single coordinating
//! context of the engine: nothing else ever mutates its state.
//!
//! # Usage
//!
//! ```ignore
//! use zonelayer::engine::{EngineConfig, TileEngine};
//!
//! let engine = TileEngine::spawn(EngineConfig::default(), fetcher, render, notices);
//! engine.enable("https://tiles.example.jp/zones/{z}/{x}/{y}.json");
//! engine.on_viewport_changed(bounds, zoom);
//! // ...
//! engine.shutdown().await;
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::coord::GeoBounds;
use crate::fetch::FetchSettled;
use crate::notice::NoticeSink;
use crate::render::RenderSink;
use crate::source::TileFetcher;
use crate::telemetry::{EngineMetrics, MetricsSnapshot};

use super::config::EngineConfig;
use super::controller::ViewportController;

/// Control commands from the owning UI layer.
#[derive(Debug)]
enum EngineCommand {
    Enable { url_template: String },
    Disable,
    ViewportChanged { bounds: GeoBounds, zoom: f64 },
}

/// The zone tile engine.
///
/// Construct with [`TileEngine::spawn`]; interact through the returned
/// [`EngineHandle`].
pub struct TileEngine;

impl TileEngine {
    /// Start the engine loop as a background task.
    ///
    /// Must be called from within a Tokio runtime. The engine starts
    /// disabled; call [`EngineHandle::enable`] to begin fetching.
    pub fn spawn(
        config: EngineConfig,
        fetcher: Arc<dyn TileFetcher>,
        render: Arc<dyn RenderSink>,
        notices: Arc<dyn NoticeSink>,
    ) -> EngineHandle {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        let metrics = Arc::new(EngineMetrics::new());

        let controller =
            ViewportController::new(config, fetcher, results_tx, render, notices, metrics.clone());

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(run_loop(
            controller,
            commands_rx,
            results_rx,
            shutdown.clone(),
        ));

        EngineHandle {
            commands_tx,
            metrics,
            shutdown,
            task: Some(task),
        }
    }
}

/// Handle to a running engine: the lifecycle surface exposed to the UI
/// layer, plus telemetry access and shutdown.
pub struct EngineHandle {
    commands_tx: mpsc::UnboundedSender<EngineCommand>,
    metrics: Arc<EngineMetrics>,
    shutdown: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl EngineHandle {
    /// Turn the overlay on, fetching from `url_template`
    /// (placeholders `{z}`, `{x}`, `{y}`).
    pub fn enable(&self, url_template: impl Into<String>) {
        let _ = self.commands_tx.send(EngineCommand::Enable {
            url_template: url_template.into(),
        });
    }

    /// Turn the overlay off and clear the rendered output.
    pub fn disable(&self) {
        let _ = self.commands_tx.send(EngineCommand::Disable);
    }

    /// Report a viewport change (new bounding box and display zoom).
    pub fn on_viewport_changed(&self, bounds: GeoBounds, zoom: f64) {
        let _ = self
            .commands_tx
            .send(EngineCommand::ViewportChanged { bounds, zoom });
    }

    /// Point-in-time engine telemetry.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Stop the engine loop and wait for it to finish.
    pub async fn shutdown(mut self) {
        info!("shutting down zone tile engine");
        self.shutdown.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

/// Fallback sleep target while no commit is pending; the guard on the
/// select arm keeps it from ever firing.
const IDLE_DEADLINE: Duration = Duration::from_secs(3600);

async fn run_loop(
    mut controller: ViewportController,
    mut commands_rx: mpsc::UnboundedReceiver<EngineCommand>,
    mut results_rx: mpsc::UnboundedReceiver<FetchSettled>,
    shutdown: CancellationToken,
) {
    info!("zone tile engine started");
    loop {
        let commit_deadline = controller.commit_deadline();
        let sleep_target = commit_deadline.unwrap_or_else(|| Instant::now() + IDLE_DEADLINE);

        tokio::select! {
            _ = shutdown.cancelled() => break,

            command = commands_rx.recv() => match command {
                Some(EngineCommand::Enable { url_template }) => {
                    controller.enable(url_template);
                }
                Some(EngineCommand::Disable) => controller.disable(),
                Some(EngineCommand::ViewportChanged { bounds, zoom }) => {
                    controller.on_viewport_changed(bounds, zoom);
                }
                // All handles dropped; nothing can reach the engine again.
                None => break,
            },

            Some(settled) = results_rx.recv() => {
                controller.handle_settled(settled);
            }

            _ = tokio::time::sleep_until(tokio::time::Instant::from_std(sleep_target)),
                if commit_deadline.is_some() =>
            {
                controller.fire_commit();
            }
        }
    }
    info!("zone tile engine stopped");
}
