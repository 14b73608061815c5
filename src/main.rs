use log::{debug, error, info, warn};
use time::OffsetDateTime;
use tokio::time::{sleep, Duration};

use testdrive_telemetry::bluetooth::{scan_for_advertisements, TagAdvertisement};
use testdrive_telemetry::config::ServiceConfig;
use testdrive_telemetry::models::ValidationError;
use testdrive_telemetry::protocol::decode_frame;
use testdrive_telemetry::scoring::ScoringEngine;
use testdrive_telemetry::sink::{AlertSink, LogSink, SnapshotSink};
use testdrive_telemetry::utils::{
    duration_to_seconds, format_datetime, is_moving, MOVEMENT_THRESHOLD_MG,
};

const SUMMARY_INTERVAL_SECS: u64 = 1800; // 30 minutes
const POLL_INTERVAL_SECS: u64 = 30;
const SCAN_DURATION_SECS: u64 = 20;

/// Run one advertisement through decode, validation, and scoring, then hand
/// the results to the collaborator sinks.
///
/// Returns true when the measurement reached the scoring engine. A frame
/// that fails to decode or validate is dropped with a diagnostic log entry;
/// it never aborts the ingestion of later frames.
fn ingest_advertisement(
    config: &ServiceConfig,
    engine: &mut ScoringEngine,
    snapshot_sink: &dyn SnapshotSink,
    alert_sink: &dyn AlertSink,
    advertisement: &TagAdvertisement,
) -> bool {
    let measurement = match decode_frame(
        &advertisement.payload,
        &advertisement.device_id,
        advertisement.rssi,
    ) {
        Ok(measurement) => measurement,
        Err(e) => {
            warn!("Dropping frame from {}: {}", advertisement.device_id, e);
            return false;
        }
    };

    // Session lookup: each configured tag is bound to its vehicle's session
    let session_id = match config.tags.get(&advertisement.device_id) {
        Some(label) => label.clone(),
        None => {
            warn!(
                "Rejecting measurement: {}",
                ValidationError::UnknownSensor(advertisement.device_id.clone())
            );
            return false;
        }
    };

    if let Err(e) = measurement.validate(&session_id) {
        warn!(
            "Rejecting measurement from {}: {}",
            advertisement.device_id, e
        );
        return false;
    }

    let (snapshot, alerts) = engine.process(&session_id, &measurement);

    if let (Some(x), Some(y), Some(z)) = (
        measurement.acceleration_x,
        measurement.acceleration_y,
        measurement.acceleration_z,
    ) {
        if is_moving(x, y, z, MOVEMENT_THRESHOLD_MG) {
            debug!("Vehicle in session {} is in motion", session_id);
        }
    }

    // A sink failure never rolls back the session counters
    if let Err(e) = snapshot_sink.store_snapshot(&snapshot) {
        error!("Failed to store snapshot for session {}: {}", session_id, e);
    }
    for alert in &alerts {
        if let Err(e) = alert_sink.publish_alert(alert) {
            error!("Failed to publish alert for session {}: {}", session_id, e);
        }
    }

    true
}

fn log_summary(engine: &ScoringEngine, processed: u64) {
    if processed == 0 {
        warn!("No measurements processed during this interval!");
        return;
    }

    for session_id in engine.session_ids() {
        if let Some(snapshot) = engine.snapshot(&session_id) {
            info!("Summary for {}:", session_id);
            info!(
                "  Driving score: {}",
                snapshot
                    .driving_score
                    .map(|score| score.to_string())
                    .unwrap_or_else(|| "-".to_string())
            );
            info!("  Hard accelerations: {}", snapshot.hard_accelerations);
            info!("  Hard braking: {}", snapshot.hard_braking);
            info!("  Aggressive turns: {}", snapshot.aggressive_turns);
            info!("  Based on {} readings", snapshot.total_measurements);
        }
    }
}

async fn main_loop(
    config: &ServiceConfig,
    engine: &mut ScoringEngine,
    snapshot_sink: &dyn SnapshotSink,
    alert_sink: &dyn AlertSink,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting test-drive telemetry service");

    let mut summary_start = OffsetDateTime::now_utc();
    let mut processed_since_summary: u64 = 0;

    info!(
        "Collection started at: {}",
        format_datetime(&summary_start)
    );

    loop {
        let advertisements = match scan_for_advertisements().await {
            Ok(advertisements) => advertisements,
            Err(e) => {
                error!("Scan failed: {}", e);
                sleep(Duration::from_secs(POLL_INTERVAL_SECS)).await;
                continue;
            }
        };

        for advertisement in &advertisements {
            if ingest_advertisement(config, engine, snapshot_sink, alert_sink, advertisement) {
                processed_since_summary += 1;
            }
        }

        // Periodic per-session summary
        let elapsed = duration_to_seconds(OffsetDateTime::now_utc() - summary_start);
        if elapsed >= SUMMARY_INTERVAL_SECS {
            info!(
                "Summary interval complete at: {}",
                format_datetime(&OffsetDateTime::now_utc())
            );
            log_summary(engine, processed_since_summary);
            summary_start = OffsetDateTime::now_utc();
            processed_since_summary = 0;
        }

        // Wait until the next poll, accounting for the scan itself
        let sleep_time = POLL_INTERVAL_SECS.saturating_sub(SCAN_DURATION_SECS);
        if sleep_time > 0 {
            sleep(Duration::from_secs(sleep_time)).await;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_secs()
        .init();

    // Load configuration
    let config = match ServiceConfig::new() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };

    let sink = LogSink;
    let mut engine = ScoringEngine::new(config.thresholds);

    // Handle Ctrl+C gracefully
    let (tx, mut rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to listen for Ctrl+C");
        let _ = tx.send(());
    });

    // Run main loop or wait for shutdown signal
    tokio::select! {
        result = main_loop(&config, &mut engine, &sink, &sink) => {
            match result {
                Ok(_) => info!("Program completed successfully"),
                Err(e) => error!("Fatal error: {}", e),
            }
        }
        _ = &mut rx => {
            info!("Service terminated by user. Closing open sessions.");
        }
    }

    // Hand every open session's final statistics to the persistence
    // collaborator before exit
    for session_id in engine.session_ids() {
        if let Some(final_snapshot) = engine.end_session(&session_id) {
            if let Err(e) = sink.store_snapshot(&final_snapshot) {
                error!(
                    "Failed to store final snapshot for session {}: {}",
                    session_id, e
                );
            }
        }
    }

    Ok(())
}
