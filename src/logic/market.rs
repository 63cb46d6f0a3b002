use crate::data_sync::ingestor::ReserveDiscovery;
use crate::utils::units::to_units;
use ahash::AHashSet;
use alloy_primitives::{Address, B256, U256};
use std::fmt;

/// A newly initialized reserve watched over a bounded block window.
#[derive(Clone, Debug)]
pub struct Market {
    asset: Address,
    market_token: Address,
    start_block: u64,
    discovery_tx: Option<B256>,
    symbol: String,
    decimals: u8,
    /// Last liquidity index seen in an index-update event for `asset`.
    pub liquidity_index: Option<U256>,
    /// Distinct mint recipients since `start_block`, filled once the minter gate opens.
    pub minters: AHashSet<Address>,
}

impl Market {
    pub fn new(discovery: &ReserveDiscovery, symbol: String, decimals: u8) -> Self {
        Self {
            asset: discovery.asset,
            market_token: discovery.market_token,
            start_block: discovery.block,
            discovery_tx: discovery.tx_hash,
            symbol,
            decimals,
            liquidity_index: None,
            minters: AHashSet::new(),
        }
    }

    pub fn asset(&self) -> Address {
        self.asset
    }

    pub fn market_token(&self) -> Address {
        self.market_token
    }

    pub fn start_block(&self) -> u64 {
        self.start_block
    }

    pub fn discovery_tx(&self) -> Option<B256> {
        self.discovery_tx
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    /// Last block of the watch window `[start_block, start_block + window]`.
    pub fn window_end(&self, window: u64) -> u64 {
        self.start_block.saturating_add(window)
    }

    pub fn is_expired(&self, safe_block: u64, window: u64) -> bool {
        safe_block > self.window_end(window)
    }

    /// Blocks elapsed since discovery as seen from `block`.
    pub fn age_at(&self, block: u64) -> u64 {
        block.saturating_sub(self.start_block)
    }

    /// Converts a raw token amount into whole units using this market's decimals.
    pub fn to_units(&self, value: U256) -> f64 {
        to_units(value, self.decimals)
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.symbol, self.market_token)
    }
}
