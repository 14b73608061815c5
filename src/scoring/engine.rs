//! Per-session driving-behavior scoring

use std::collections::HashMap;

use time::OffsetDateTime;

use crate::models::{AlertEvent, AlertKind, AlertSeverity, Measurement, SessionSnapshot};
use crate::scoring::ScoringThresholds;
use crate::utils::battery_percentage;

/// Running statistics for one active test-drive session.
///
/// A single reading can raise both an X-axis event and a turn event, so the
/// event counters may legitimately sum to more than `total_measurements`.
#[derive(Debug, Default)]
struct SessionScoreState {
    hard_accelerations: u32,
    hard_braking: u32,
    aggressive_turns: u32,
    total_measurements: u64,
    last_acceleration_x: Option<i16>,
    driving_score: Option<u8>,
}

impl SessionScoreState {
    fn snapshot(&self, session_id: &str) -> SessionSnapshot {
        SessionSnapshot {
            session_id: session_id.to_string(),
            hard_accelerations: self.hard_accelerations,
            hard_braking: self.hard_braking,
            aggressive_turns: self.aggressive_turns,
            total_measurements: self.total_measurements,
            driving_score: self.driving_score,
        }
    }
}

/// Streaming scorer for all active test-drive sessions.
///
/// The engine is the sole owner of every session's accumulator; callers
/// only ever receive owned snapshots. Each `process` call is one bounded
/// in-memory read-modify-write, and `&mut self` guarantees the strict
/// per-session ordering the delta classification depends on.
pub struct ScoringEngine {
    thresholds: ScoringThresholds,
    sessions: HashMap<String, SessionScoreState>,
}

impl ScoringEngine {
    pub fn new(thresholds: ScoringThresholds) -> Self {
        Self {
            thresholds,
            sessions: HashMap::new(),
        }
    }

    /// Fold one measurement into its session's statistics.
    ///
    /// The session accumulator is created on first use; session lifecycle
    /// (deciding which sessions are open, ending them) belongs to the
    /// caller. Never fails on a structurally valid measurement: every
    /// missing-field combination has defined behavior.
    ///
    /// # Arguments
    /// * `session_id` - The test-drive session the measurement belongs to
    /// * `measurement` - The decoded reading, in arrival order per session
    ///
    /// # Returns
    /// The updated session snapshot and any alerts this measurement raised
    pub fn process(
        &mut self,
        session_id: &str,
        measurement: &Measurement,
    ) -> (SessionSnapshot, Vec<AlertEvent>) {
        let state = self
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(SessionScoreState::default);

        // Classify the X-axis change against the previous reading.
        // Strict comparisons: a delta of exactly the threshold is allowed.
        if let (Some(previous), Some(current)) =
            (state.last_acceleration_x, measurement.acceleration_x)
        {
            let delta = current as i32 - previous as i32;
            if delta > self.thresholds.hard_accel_delta_mg {
                state.hard_accelerations += 1;
            } else if delta < -self.thresholds.hard_accel_delta_mg {
                state.hard_braking += 1;
            }
        }

        // Lateral force classification, independent of the X-axis check
        if let Some(lateral) = measurement.acceleration_y {
            if (lateral as i32).abs() > self.thresholds.aggressive_turn_mg {
                state.aggressive_turns += 1;
            }
        }

        // A missing X reading keeps the last known value, so the next
        // delta still spans the dropped sample
        if let Some(current) = measurement.acceleration_x {
            state.last_acceleration_x = Some(current);
        }

        state.total_measurements += 1;

        let aggressive_events =
            (state.hard_accelerations + state.hard_braking + state.aggressive_turns) as f64;
        let rate = aggressive_events / state.total_measurements as f64;
        state.driving_score = Some((100.0 - rate * 100.0).round().max(0.0) as u8);

        let snapshot = state.snapshot(session_id);
        let alerts = self.battery_alerts(session_id, measurement);
        (snapshot, alerts)
    }

    /// Current statistics for a session, if it has processed anything.
    pub fn snapshot(&self, session_id: &str) -> Option<SessionSnapshot> {
        self.sessions
            .get(session_id)
            .map(|state| state.snapshot(session_id))
    }

    /// Close a session: discard its accumulator and return the final
    /// snapshot for the persistence collaborator.
    pub fn end_session(&mut self, session_id: &str) -> Option<SessionSnapshot> {
        self.sessions
            .remove(session_id)
            .map(|state| state.snapshot(session_id))
    }

    /// Identifiers of every session currently holding state.
    pub fn session_ids(&self) -> Vec<String> {
        self.sessions.keys().cloned().collect()
    }

    /// Battery check, evaluated on every measurement: below the warning
    /// threshold one alert fires, escalated to critical below the critical
    /// threshold. Critical supersedes warning; at most one alert per
    /// measurement. There is no debouncing, so the alert re-fires for as
    /// long as the battery stays low.
    fn battery_alerts(&self, session_id: &str, measurement: &Measurement) -> Vec<AlertEvent> {
        let battery_mv = match measurement.battery {
            Some(mv) => mv,
            None => return Vec::new(),
        };

        let charge_pct = battery_percentage(battery_mv);
        if charge_pct >= self.thresholds.low_battery_pct {
            return Vec::new();
        }

        let (kind, severity) = if charge_pct < self.thresholds.critical_battery_pct {
            (AlertKind::BatteryCritical, AlertSeverity::Critical)
        } else {
            (AlertKind::BatteryLow, AlertSeverity::Warning)
        };

        vec![AlertEvent {
            kind,
            session_id: session_id.to_string(),
            severity,
            message: format!("Low battery: {}%", charge_pct),
            created_at: OffsetDateTime::now_utc(),
        }]
    }
}
