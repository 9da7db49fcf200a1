//! Adaptive quality host.
//!
//! Runs the adaptive quality controller against a synthetic frame-time load,
//! restoring and persisting the chosen quality level across runs.

use adaptive_quality::config::ConfigManager;
use adaptive_quality::controller::{AdaptiveQualityController, TickOutcome};
use adaptive_quality::levels::{QualityLadder, QualityLevels};
use adaptive_quality::logging;
use adaptive_quality::metrics::QualityMetrics;
use adaptive_quality::persistence::JsonLevelStore;
use adaptive_quality::registry::InstanceRegistry;
use adaptive_quality::simulation::SyntheticLoad;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, error, info};

/// Interval between controller status log lines
const STATUS_LOG_INTERVAL_SECS: u64 = 10;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _log_guard = logging::init_logging().map_err(|e| {
        eprintln!("Failed to initialize logging: {}", e);
        e
    })?;

    info!("Adaptive quality host starting...");

    let result = run_host().await;

    match &result {
        Ok(()) => info!("Adaptive quality host shut down gracefully"),
        Err(e) => error!("Adaptive quality host error: {}", e),
    }

    result
}

async fn run_host() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = ConfigManager::default_path();
    let config_manager = ConfigManager::load_or_default(&config_path)?;
    info!("Configuration loaded from {:?}", config_path);

    let config = config_manager.get();
    let level_names = config.host.level_names.clone();

    let ladder = QualityLadder::new(level_names.clone(), config.host.default_level)
        .ok_or("no quality levels configured")?;
    let mut load = SyntheticLoad::from_host_config(&config.host);
    let display = Box::new(config.host.display.clone());

    let store_path = JsonLevelStore::default_path();
    let store = Arc::new(JsonLevelStore::open_or_empty(&store_path));
    info!("Quality level store at {:?}", store_path);

    let registry = Arc::new(InstanceRegistry::new());
    let mut controller = AdaptiveQualityController::new(config, ladder, store, display, registry)?;

    let metrics = Arc::new(QualityMetrics::new());
    let metrics_sink = Arc::clone(&metrics);
    controller.subscribe(move |change| {
        metrics_sink.record_change(change);
        Ok(())
    });
    controller.subscribe(move |change| {
        let name = |level: i32| {
            usize::try_from(level)
                .ok()
                .and_then(|i| level_names.get(i))
                .map(String::as_str)
                .unwrap_or("?")
        };
        info!(
            "Quality set to {} (was {})",
            name(change.new_level),
            name(change.previous_level)
        );
        Ok(())
    });

    controller.activate()?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = setup_signal_handlers(shutdown_tx).await {
            error!("Signal handler error: {}", e);
        }
    });

    run_frame_loop(&mut controller, &mut load, shutdown_rx).await;

    info!("Shutdown signal received, persisting quality level...");
    if let Err(e) = controller.deactivate() {
        error!("Failed to persist quality level: {}", e);
    }

    let snapshot = metrics.snapshot();
    info!(
        total_changes = snapshot.total_changes,
        decreases = snapshot.decrease_count,
        increases = snapshot.increase_count,
        avg_secs_between_changes = snapshot.avg_secs_between_changes,
        uptime_sec = snapshot.uptime_sec,
        "Quality metrics: {}",
        serde_json::to_string(&snapshot)?
    );

    Ok(())
}

/// Render synthetic frames and tick the controller once per frame.
async fn run_frame_loop(
    controller: &mut AdaptiveQualityController<QualityLadder>,
    load: &mut SyntheticLoad,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let status_interval = Duration::from_secs(STATUS_LOG_INTERVAL_SECS);
    let mut last_status = Instant::now();
    let mut last_frame = Instant::now();

    loop {
        let frame = load.next_frame(controller.levels().current_level());

        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    info!("Frame loop shutting down");
                    break;
                }
            }
            _ = tokio::time::sleep(frame) => {
                let now = Instant::now();
                let measured = now.duration_since(last_frame);
                last_frame = now;

                match controller.tick(measured.as_secs_f64()) {
                    TickOutcome::FloorDiscovered(level) => {
                        info!("Lowest reachable quality level is {}", level);
                    }
                    TickOutcome::CeilingDiscovered(level) => {
                        info!("Highest reachable quality level is {}", level);
                    }
                    outcome => debug!(?outcome, "Tick"),
                }

                if now.duration_since(last_status) >= status_interval {
                    let status = controller.status();
                    info!(
                        level = status.current_level,
                        level_name = controller.levels().current_name(),
                        smoothed_fps = ?status.smoothed_rate,
                        target_fps = status.target_frame_rate,
                        direction = %status.direction,
                        up_attempts = status.up_attempts_used,
                        "Controller status"
                    );
                    last_status = now;
                }
            }
        }
    }
}

/// Set up signal handlers for graceful shutdown.
/// Handles SIGTERM and SIGINT.
#[cfg(unix)]
async fn setup_signal_handlers(
    shutdown_tx: watch::Sender<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => {
            info!("Received SIGTERM");
        }
        _ = sigint.recv() => {
            info!("Received SIGINT");
        }
    }

    let _ = shutdown_tx.send(true);
    Ok(())
}

/// Signal handler for non-Unix platforms
#[cfg(not(unix))]
async fn setup_signal_handlers(
    shutdown_tx: watch::Sender<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C");
    let _ = shutdown_tx.send(true);
    Ok(())
}
