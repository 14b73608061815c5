use std::collections::HashMap;
use std::env;

use log::{info, warn};

use crate::scoring::ScoringThresholds;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Sensor MAC address -> vehicle/session label
    pub tags: HashMap<String, String>,
    pub thresholds: ScoringThresholds,
}

impl ServiceConfig {
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        // Load environment variables
        dotenv::dotenv().ok();

        let mut tags = HashMap::new();

        // Try TESTDRIVE_TAGS format first
        if let Ok(raw) = env::var("TESTDRIVE_TAGS") {
            tags = parse_tag_list(&raw);
        } else {
            // Fallback to individual environment variables
            info!("TESTDRIVE_TAGS environment variable not found, trying individual variables");
            for (key, value) in env::vars() {
                if key.starts_with("TESTDRIVE_TAG_") && key.ends_with("_MAC") {
                    if let Some(index) = key
                        .strip_prefix("TESTDRIVE_TAG_")
                        .and_then(|s| s.strip_suffix("_MAC"))
                    {
                        let name_key = format!("TESTDRIVE_TAG_{}_NAME", index);
                        if let Ok(name) = env::var(&name_key) {
                            tags.insert(value.to_uppercase(), name);
                        }
                    }
                }
            }
        }

        info!("Total tags loaded: {}", tags.len());
        for (mac, name) in &tags {
            info!("Tag: {} -> {}", mac, name);
        }

        if tags.is_empty() {
            return Err("No RuuviTag sensors configured. Please set TESTDRIVE_TAGS or TESTDRIVE_TAG_<N>_MAC/TESTDRIVE_TAG_<N>_NAME environment variables".into());
        }

        Ok(ServiceConfig {
            tags,
            thresholds: load_thresholds(),
        })
    }
}

/// Parse the comma-separated `MAC=label` list from TESTDRIVE_TAGS.
/// Malformed or empty pairs are skipped.
fn parse_tag_list(raw: &str) -> HashMap<String, String> {
    let mut tags = HashMap::new();
    for pair in raw.split(',') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        match pair.split_once('=') {
            Some((mac, name)) => {
                let mac = mac.trim();
                let name = name.trim();
                if !mac.is_empty() && !name.is_empty() {
                    tags.insert(mac.to_uppercase(), name.to_string());
                }
            }
            None => warn!("Ignoring malformed tag pair: '{}'", pair),
        }
    }
    tags
}

/// Scoring thresholds, starting from the calibrated defaults with optional
/// per-deployment overrides from the environment.
fn load_thresholds() -> ScoringThresholds {
    let mut thresholds = ScoringThresholds::default();
    if let Some(value) = env_number::<i32>("SCORE_HARD_ACCEL_DELTA_MG") {
        thresholds.hard_accel_delta_mg = value;
    }
    if let Some(value) = env_number::<i32>("SCORE_AGGRESSIVE_TURN_MG") {
        thresholds.aggressive_turn_mg = value;
    }
    if let Some(value) = env_number::<u8>("SCORE_LOW_BATTERY_PCT") {
        thresholds.low_battery_pct = value;
    }
    if let Some(value) = env_number::<u8>("SCORE_CRITICAL_BATTERY_PCT") {
        thresholds.critical_battery_pct = value;
    }
    thresholds
}

fn env_number<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring {}: '{}' is not a valid number", key, raw);
            None
        }
    }
}
