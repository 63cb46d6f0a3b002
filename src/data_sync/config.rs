use crate::logic::types::RiskConfig;
use crate::utils::config_loader::{
    LoadConfigError, WatchConfigLoader, load_from_file_sync, parse_flag, parse_json_var, parse_var,
};
use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

#[derive(Clone, Deserialize, Debug)]
pub struct WatchConfigRoot {
    pub watch: WatchConfig,
}

/// Credentials of the optional Discord DM notifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscordConfig {
    pub bot_token: String,
    pub user_id: u64,
}

/// Configuration of the reserve monitor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// HTTP JSON-RPC endpoint of the chain node
    pub rpc_url: String,
    /// Contracts emitting `ReserveInitialized`
    pub configurators: Vec<Address>,
    /// Contracts emitting `ReserveDataUpdated`; empty accepts any emitter
    pub pools: Vec<Address>,
    /// Blocks behind head before a block is scanned
    pub confirmations: u64,
    /// Blocks a market stays tracked after discovery
    pub window_blocks: u64,
    pub poll_interval_secs: u64,
    /// Largest block range of a single `eth_getLogs` request
    pub max_blocks_per_query: u64,
    pub max_concurrent_evaluations: usize,
    /// First block to scan instead of `head - confirmations`
    pub start_block: Option<u64>,
    pub risk: RiskConfig,
    pub discord: Option<DiscordConfig>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://localhost:8545".to_string(),
            configurators: Vec::new(),
            pools: Vec::new(),
            confirmations: 2,
            window_blocks: 1000,
            poll_interval_secs: 3,
            max_blocks_per_query: 2000,
            max_concurrent_evaluations: 8,
            start_block: None,
            risk: RiskConfig::default(),
            discord: None,
        }
    }
}

impl WatchConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, LoadConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key/value source, starting from the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, LoadConfigError> {
        let mut config = Self::default();

        if let Some(rpc_url) = lookup("RPC_URL") {
            config.rpc_url = rpc_url;
        }
        if let Some(configurators) = parse_json_var(&lookup, "CONFIGURATORS")? {
            config.configurators = configurators;
        }
        if let Some(pools) = parse_json_var(&lookup, "POOL_ADDRESSES")? {
            config.pools = pools;
        }
        if let Some(confirmations) = parse_var(&lookup, "CONFIRMATIONS")? {
            config.confirmations = confirmations;
        }
        if let Some(window_blocks) = parse_var(&lookup, "WINDOW_BLOCKS")? {
            config.window_blocks = window_blocks;
        }
        if let Some(interval) = parse_var(&lookup, "POLL_INTERVAL_SECS")? {
            config.poll_interval_secs = interval;
        }
        if let Some(max_blocks) = parse_var(&lookup, "MAX_BLOCKS_PER_QUERY")? {
            config.max_blocks_per_query = max_blocks;
        }
        if let Some(max_concurrent) = parse_var(&lookup, "MAX_CONCURRENT_EVALUATIONS")? {
            config.max_concurrent_evaluations = max_concurrent;
        }
        config.start_block = parse_var(&lookup, "START_BLOCK")?;

        let risk = &mut config.risk;
        if let Some(enabled) = parse_flag(&lookup, "ENABLE_RAW_SUPPLY_CHECK")? {
            risk.raw_supply_enabled = enabled;
        }
        if let Some(threshold) = parse_var::<U256>(&lookup, "RAW_SUPPLY_THRESHOLD")? {
            risk.raw_supply_threshold = threshold;
        }
        if let Some(enabled) = parse_flag(&lookup, "ENABLE_SUPPLY_CHECK")? {
            risk.supply_enabled = enabled;
        }
        if let Some(min_units) = parse_var(&lookup, "MIN_SUPPLY_UNITS")? {
            risk.min_supply_units = min_units;
        }
        if let Some(enabled) = parse_flag(&lookup, "ENABLE_TVL_CHECK")? {
            risk.tvl_enabled = enabled;
        }
        if let Some(min_units) = parse_var(&lookup, "MIN_TVL_UNITS")? {
            risk.min_tvl_units = min_units;
        }
        if let Some(enabled) = parse_flag(&lookup, "ENABLE_MINTER_CHECK")? {
            risk.minter_enabled = enabled;
        }
        if let Some(gate) = parse_var(&lookup, "MINTER_GATE_BLOCKS")? {
            risk.minter_gate_blocks = gate;
        }
        if let Some(max_minters) = parse_var(&lookup, "MAX_MINTERS")? {
            risk.max_minters = max_minters;
        }

        if let (Some(bot_token), Some(user_id)) = (lookup("DISCORD_BOT_TOKEN"), parse_var(&lookup, "DISCORD_ALERT_USER_ID")?) {
            config.discord = Some(DiscordConfig { bot_token, user_id });
        }

        Ok(config)
    }

    /// Checks the settings the monitor cannot start without.
    pub fn validate(&self) -> Result<(), LoadConfigError> {
        self.rpc_url()?;

        if self.configurators.is_empty() {
            return Err(LoadConfigError::ConfigError("no configurator addresses configured (CONFIGURATORS)".to_string()));
        }
        if self.window_blocks == 0 {
            return Err(LoadConfigError::invalid("WINDOW_BLOCKS", "must be greater than zero"));
        }
        if self.max_blocks_per_query == 0 {
            return Err(LoadConfigError::invalid("MAX_BLOCKS_PER_QUERY", "must be greater than zero"));
        }
        if self.max_concurrent_evaluations == 0 {
            return Err(LoadConfigError::invalid("MAX_CONCURRENT_EVALUATIONS", "must be greater than zero"));
        }
        Ok(())
    }

    pub fn rpc_url(&self) -> Result<Url, LoadConfigError> {
        Url::parse(&self.rpc_url).map_err(|e| LoadConfigError::invalid("RPC_URL", e))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl WatchConfigLoader for WatchConfig {
    fn load_section_from_file(file_name: &str) -> Result<Self, LoadConfigError> {
        let root: WatchConfigRoot = load_from_file_sync(file_name)?;
        Ok(root.watch)
    }
}
