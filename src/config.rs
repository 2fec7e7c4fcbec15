//! Process-scoped platform configuration.
//!
//! Defaults match the reference deployment; every knob can be overridden
//! through environment variables. Invalid override values fall back to the
//! default silently.

use std::env;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct PlatformConfig {
    /// Fraction of every gross donation retained by the platform, in [0, 1].
    pub fee_percentage: f64,
    /// Default proof-of-work difficulty (leading zero hex chars).
    pub difficulty: usize,
    pub donation_chain_difficulty: usize,
    pub expenditure_chain_difficulty: usize,
    /// Annual donation ceiling for basic-KYC donors.
    pub default_annual_limit: f64,
    /// Annual donation ceiling once a donor passes premium KYC.
    pub premium_annual_limit: f64,
    /// Window used by rating sweeps.
    pub rating_period_days: i64,
    /// Public-chain RPC endpoint handed to the anchor driver.
    pub provider_url: String,
    pub anchor_private_key: String,
    pub gas_limit: u64,
    pub gas_price_gwei: u64,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            fee_percentage: 0.01,
            difficulty: 2,
            donation_chain_difficulty: 2,
            expenditure_chain_difficulty: 2,
            default_annual_limit: 1_000_000.0,
            premium_annual_limit: 5_000_000.0,
            rating_period_days: 30,
            provider_url: "https://polygon-mumbai.g.alchemy.com/v2/demo".to_string(),
            anchor_private_key: "1111111111111111111111111111111111111111111111111111111111111111"
                .to_string(),
            gas_limit: 300_000,
            gas_price_gwei: 30,
        }
    }
}

impl PlatformConfig {
    /// Load the configuration from the environment, falling back to the
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            fee_percentage: env_or("PLATFORM_FEE_PERCENTAGE", defaults.fee_percentage),
            difficulty: env_or("CHAIN_DIFFICULTY", defaults.difficulty),
            donation_chain_difficulty: env_or(
                "DONATION_CHAIN_DIFFICULTY",
                defaults.donation_chain_difficulty,
            ),
            expenditure_chain_difficulty: env_or(
                "EXPENDITURE_CHAIN_DIFFICULTY",
                defaults.expenditure_chain_difficulty,
            ),
            default_annual_limit: env_or("DEFAULT_ANNUAL_LIMIT", defaults.default_annual_limit),
            premium_annual_limit: env_or("PREMIUM_ANNUAL_LIMIT", defaults.premium_annual_limit),
            rating_period_days: env_or("RATING_PERIOD_DAYS", defaults.rating_period_days),
            provider_url: env::var("ANCHOR_RPC_URL").unwrap_or(defaults.provider_url),
            anchor_private_key: env::var("ANCHOR_PRIVATE_KEY")
                .unwrap_or(defaults.anchor_private_key),
            gas_limit: env_or("ANCHOR_GAS_LIMIT", defaults.gas_limit),
            gas_price_gwei: env_or("ANCHOR_GAS_PRICE_GWEI", defaults.gas_price_gwei),
        }
    }

    /// Clamp out-of-range values into their documented domains.
    pub fn normalized(mut self) -> Self {
        self.fee_percentage = self.fee_percentage.clamp(0.0, 1.0);
        self.difficulty = self.difficulty.max(1);
        self.donation_chain_difficulty = self.donation_chain_difficulty.max(1);
        self.expenditure_chain_difficulty = self.expenditure_chain_difficulty.max(1);
        self.rating_period_days = self.rating_period_days.max(1);
        self
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}
