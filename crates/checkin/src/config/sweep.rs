use std::time::Duration;

/// Background expiry sweep
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct SweepConfig {
    /// Seconds between sweeps of lapsed credentials and sessions
    pub interval: u64,
}

impl Default for SweepConfig {
    fn default() -> SweepConfig {
        SweepConfig { interval: 30 }
    }
}

impl SweepConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval.max(1))
    }
}
