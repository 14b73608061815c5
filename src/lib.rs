//! Test-drive telemetry for dealership vehicles
//!
//! Decodes RuuviTag RAWv2 advertisements broadcast by tags mounted in
//! test-drive vehicles and folds the readings into per-session driving
//! behavior statistics: hard accelerations, hard braking, aggressive turns,
//! and a 0-100 driving score, with low-battery alerting.
//!
//! The two call surfaces are [`protocol::decode_frame`] (raw frame to
//! measurement) and [`scoring::ScoringEngine::process`] (measurement to
//! updated session snapshot plus alerts). Everything else is the service
//! around them: BLE collection, configuration, and the sinks through which
//! snapshots and alerts reach the record store and live viewers.

pub mod bluetooth;
pub mod config;
pub mod models;
pub mod protocol;
pub mod scoring;
pub mod sink;
pub mod utils;

pub use models::{AlertEvent, AlertKind, AlertSeverity, Measurement, SessionSnapshot};
pub use protocol::{decode_frame, DecodeError};
pub use scoring::{ScoringEngine, ScoringThresholds};
