//! Dispatch seams for the persistence and live-update collaborators

use log::{error, info, warn};

use crate::models::{AlertEvent, AlertSeverity, SessionSnapshot};

/// Receives an owned statistics snapshot after every processed measurement
/// and once more when a session ends.
///
/// A failing sink is the collaborator's problem: the engine's in-memory
/// state stays the source of truth for the next measurement either way.
pub trait SnapshotSink {
    fn store_snapshot(&self, snapshot: &SessionSnapshot) -> Result<(), String>;
}

/// Receives alert events raised while processing measurements.
pub trait AlertSink {
    fn publish_alert(&self, alert: &AlertEvent) -> Result<(), String>;
}

/// Sink that writes snapshots and alerts to the service log. Stands in for
/// the record store and the broadcast channel in deployments without them.
pub struct LogSink;

impl SnapshotSink for LogSink {
    fn store_snapshot(&self, snapshot: &SessionSnapshot) -> Result<(), String> {
        let score = match snapshot.driving_score {
            Some(score) => score.to_string(),
            None => "-".to_string(),
        };
        info!(
            "Session {}: score={} accelerations={} braking={} turns={} readings={}",
            snapshot.session_id,
            score,
            snapshot.hard_accelerations,
            snapshot.hard_braking,
            snapshot.aggressive_turns,
            snapshot.total_measurements
        );
        Ok(())
    }
}

impl AlertSink for LogSink {
    fn publish_alert(&self, alert: &AlertEvent) -> Result<(), String> {
        match alert.severity {
            AlertSeverity::Warning => warn!(
                "[{}] Session {}: {}",
                alert.severity.as_str(),
                alert.session_id,
                alert.message
            ),
            AlertSeverity::Critical => error!(
                "[{}] Session {}: {}",
                alert.severity.as_str(),
                alert.session_id,
                alert.message
            ),
        }
        Ok(())
    }
}
