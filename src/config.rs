use serde::{Deserialize, Serialize};
use std::fs;

use crate::fee::DEFAULT_PLATFORM_FEE;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub escrow: EscrowConfig,
    /// Distinguishes id streams when more than one instance runs.
    /// The id generator carries 8 bits for this, so 0..=255.
    #[serde(default)]
    pub machine_id: u8,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EscrowConfig {
    /// Platform fee rate in FEE_PRECISION units (50_000 = 5%)
    pub fee_rate: u64,
    /// Smallest payout, in paise
    pub min_withdrawal: u64,
    /// Days after which an unverified outcome auto-releases; None keeps
    /// sessions in outcome_pending until a party or a dispute moves them
    pub outcome_auto_release_days: Option<u32>,
    /// Upper bound on one completion hook invocation
    pub hook_timeout_ms: u64,
}

impl Default for EscrowConfig {
    fn default() -> Self {
        Self {
            fee_rate: DEFAULT_PLATFORM_FEE,
            min_withdrawal: 10_000,
            outcome_auto_release_days: None,
            hook_timeout_ms: 2_000,
        }
    }
}

impl AppConfig {
    pub fn load(env: &str) -> Self {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .unwrap_or_else(|_| panic!("Failed to read config file: {}", config_path));
        serde_yaml::from_str(&content).expect("Failed to parse config yaml")
    }
}
