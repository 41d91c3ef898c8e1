//! Engine configuration, loaded from JSON by the host

use crate::types::{ADVANCE_COUNTDOWN_TICKS, DEFAULT_TICK_INTERVAL_MS};
use embassy_time::Duration;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub tick_interval_ms: u64,
    /// Ticks between a step's natural completion and the move to the next one
    pub advance_countdown_ticks: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            advance_countdown_ticks: ADVANCE_COUNTDOWN_TICKS,
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn tick_interval(&self) -> Duration {
        // A zero interval would turn the clock into a busy loop
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}
