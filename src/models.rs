use thiserror::Error;
use time::OffsetDateTime;

/// One decoded RuuviTag reading.
///
/// Fields mirror the RAWv2 wire format. A field whose wire value is the
/// reserved "not available" pattern decodes to `None`, never to zero.
#[derive(Debug, Clone)]
pub struct Measurement {
    pub device_id: String,
    pub temperature: Option<f32>,    // °C
    pub humidity: Option<f32>,       // %
    pub pressure: Option<f32>,       // hPa
    pub acceleration_x: Option<i16>, // mG
    pub acceleration_y: Option<i16>, // mG
    pub acceleration_z: Option<i16>, // mG
    pub battery: Option<u16>,        // mV
    pub tx_power: Option<i8>,        // dBm
    pub movement_counter: u8,
    pub measurement_sequence: u16,
    pub rssi: Option<i16>, // dBm
    pub captured_at: OffsetDateTime,
}

impl Measurement {
    /// Caller-side guard run before a measurement may reach the scoring
    /// engine: the session id must be usable and the atmospheric fields
    /// must be present. The engine itself trusts its inputs.
    pub fn validate(&self, session_id: &str) -> Result<(), ValidationError> {
        if session_id.is_empty() {
            return Err(ValidationError::EmptySessionId);
        }
        if self.temperature.is_none() {
            return Err(ValidationError::MissingField("temperature"));
        }
        if self.humidity.is_none() {
            return Err(ValidationError::MissingField("humidity"));
        }
        if self.pressure.is_none() {
            return Err(ValidationError::MissingField("pressure"));
        }
        Ok(())
    }
}

/// Rejection raised by the ingestion path for structurally unusable input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("session identifier is empty")]
    EmptySessionId,

    #[error("no session configured for sensor {0}")]
    UnknownSensor(String),
}

/// Owned copy of one session's running statistics, handed to collaborators
/// after every processed measurement and when the session ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub hard_accelerations: u32,
    pub hard_braking: u32,
    pub aggressive_turns: u32,
    pub total_measurements: u64,
    pub driving_score: Option<u8>, // 0-100, None before the first measurement
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    BatteryLow,
    BatteryCritical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertSeverity {
    Warning,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertSeverity::Warning => "warning",
            AlertSeverity::Critical => "critical",
        }
    }
}

/// Alert raised while processing a measurement. Emitted as a return value;
/// delivery is the collaborators' concern.
#[derive(Debug, Clone)]
pub struct AlertEvent {
    pub kind: AlertKind,
    pub session_id: String,
    pub severity: AlertSeverity,
    pub message: String,
    pub created_at: OffsetDateTime,
}
