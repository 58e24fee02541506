mod lottery;
mod pool;
mod session;
mod sweep;

pub use lottery::*;
pub use pool::*;
pub use session::*;
pub use sweep::*;

/// Check-in configuration
#[derive(Default, Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct Config {
    /// Code pool options
    pub code_pool: CodePoolConfig,

    /// Validation session lifetimes
    pub session: SessionConfig,

    /// Golden ticket lottery
    pub lottery: LotteryConfig,

    /// Background expiry sweep
    pub sweep: SweepConfig,
}
