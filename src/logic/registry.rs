use super::market::Market;
use crate::constants::{DEFAULT_DECIMALS, DEFAULT_SYMBOL};
use crate::data_sync::chain_client::{ChainClient, read_decimals, read_symbol};
use crate::data_sync::ingestor::ReserveDiscovery;
use ahash::AHashSet;
use alloy_primitives::Address;
use tracing::{info, warn};

/// Owns the tracked markets in discovery order.
///
/// `ensure` and `expire` are the only ways markets enter or leave the registry.
#[derive(Debug)]
pub struct MarketRegistry {
    window_blocks: u64,
    markets: Vec<Market>,
    // Fast membership check for idempotent registration
    tracked: AHashSet<Address>,
}

impl MarketRegistry {
    pub fn new(window_blocks: u64) -> Self {
        Self { window_blocks, markets: Vec::new(), tracked: AHashSet::new() }
    }

    pub fn len(&self) -> usize {
        self.markets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markets.is_empty()
    }

    pub fn contains(&self, market_token: &Address) -> bool {
        self.tracked.contains(market_token)
    }

    pub fn get(&self, market_token: &Address) -> Option<&Market> {
        if !self.contains(market_token) {
            return None;
        }
        self.markets.iter().find(|market| market.market_token() == *market_token)
    }

    pub fn markets(&self) -> &[Market] {
        &self.markets
    }

    pub fn markets_mut(&mut self) -> impl Iterator<Item = &mut Market> {
        self.markets.iter_mut()
    }

    /// Registers the discovered market unless it is already tracked.
    ///
    /// Symbol and decimals are read at the discovery block; a failed read falls back to
    /// the placeholder symbol and 18 decimals so the market is always tracked.
    /// Returns `true` when a new market was added.
    pub async fn ensure(&mut self, client: &dyn ChainClient, discovery: &ReserveDiscovery) -> bool {
        if self.contains(&discovery.market_token) {
            return false;
        }

        let token = discovery.market_token;
        let symbol = match read_symbol(client, token, discovery.block).await {
            Ok(symbol) => symbol,
            Err(e) => {
                warn!(market = %token, block = discovery.block, "Failed to read symbol, using {}: {}", DEFAULT_SYMBOL, e);
                DEFAULT_SYMBOL.to_string()
            }
        };
        let decimals = match read_decimals(client, token, discovery.block).await {
            Ok(decimals) => decimals,
            Err(e) => {
                warn!(market = %token, block = discovery.block, "Failed to read decimals, using {}: {}", DEFAULT_DECIMALS, e);
                DEFAULT_DECIMALS
            }
        };

        let market = Market::new(discovery, symbol, decimals);
        info!(
            market = %token,
            asset = %discovery.asset,
            block = discovery.block,
            tx = ?discovery.tx_hash,
            "Tracking new reserve {} ({} decimals) until block {}",
            market.symbol(),
            market.decimals(),
            market.window_end(self.window_blocks)
        );

        self.tracked.insert(token);
        self.markets.push(market);
        true
    }

    /// Evicts every market whose window ended before `safe_block` and returns them.
    pub fn expire(&mut self, safe_block: u64) -> Vec<Market> {
        let window = self.window_blocks;
        let (expired, kept): (Vec<Market>, Vec<Market>) =
            std::mem::take(&mut self.markets).into_iter().partition(|market| market.is_expired(safe_block, window));
        self.markets = kept;

        for market in &expired {
            self.tracked.remove(&market.market_token());
            info!(
                market = %market.market_token(),
                block = safe_block,
                tx = ?market.discovery_tx(),
                "Stopped watching {} (window {}..={} elapsed, {} distinct minters)",
                market.symbol(),
                market.start_block(),
                market.window_end(window),
                market.minters.len()
            );
        }

        expired
    }
}
