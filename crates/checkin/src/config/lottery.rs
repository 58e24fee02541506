/// Golden ticket lottery
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct LotteryConfig {
    /// Draws fall in `[0, range)`; events pick their target in the same range
    pub range: u32,
}

impl Default for LotteryConfig {
    fn default() -> LotteryConfig {
        LotteryConfig { range: 5000 }
    }
}
