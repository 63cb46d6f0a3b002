use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};

/// The risk signals in their fixed evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum RiskSignal {
    RawSupply,
    Supply,
    Tvl,
    MinterConcentration,
}

/// Thresholds and toggles of the risk evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Compare `scaledTotalSupply` without decimal scaling.
    pub raw_supply_enabled: bool,
    pub raw_supply_threshold: U256,

    pub supply_enabled: bool,
    /// Minimum `totalSupply` in whole token units.
    pub min_supply_units: f64,

    pub tvl_enabled: bool,
    /// Minimum `scaledTotalSupply * liquidityIndex / RAY` in whole units.
    pub min_tvl_units: f64,

    pub minter_enabled: bool,
    /// Blocks after discovery before minters are counted.
    pub minter_gate_blocks: u64,
    /// Alert when the distinct minter count is at or below this.
    pub max_minters: usize,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            raw_supply_enabled: false,
            raw_supply_threshold: U256::from(1_000_000u64),
            supply_enabled: true,
            min_supply_units: 1.0,
            tvl_enabled: true,
            min_tvl_units: 1.0,
            minter_enabled: true,
            minter_gate_blocks: 100,
            max_minters: 1,
        }
    }
}

impl RiskConfig {
    pub fn is_enabled(&self, signal: RiskSignal) -> bool {
        match signal {
            RiskSignal::RawSupply => self.raw_supply_enabled,
            RiskSignal::Supply => self.supply_enabled,
            RiskSignal::Tvl => self.tvl_enabled,
            RiskSignal::MinterConcentration => self.minter_enabled,
        }
    }
}

/// A market that produced at least one risk reason at `block`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub block: u64,
    pub asset: Address,
    pub market_token: Address,
    pub symbol: String,
    pub reasons: Vec<String>,
}

impl Alert {
    /// Short human-readable rendering for notifiers.
    pub fn message(&self) -> String {
        let mut message = format!(
            "Low liquidity reserve {} at block {}\nmarket: {}\nasset: {}",
            self.symbol, self.block, self.market_token, self.asset
        );
        for reason in &self.reasons {
            message.push_str("\n- ");
            message.push_str(reason);
        }
        message
    }
}
