use super::market::Market;
use super::types::{RiskConfig, RiskSignal};
use crate::constants::{LIQUIDITY_INDEX_WORD, MINT_SENDER, RAY, RESERVE_DATA_WORDS, ReserveDataUpdated, Transfer};
use crate::data_sync::chain_client::{ChainClient, LogQuery, LogRecord, read_scaled_total_supply, read_total_supply};
use crate::data_sync::ingestor::fetch_logs_chunked;
use crate::errors::ChainError;
use ahash::AHashSet;
use alloy_primitives::{Address, U256};
use alloy_sol_types::SolEvent;
use futures::stream::{self, StreamExt};
use strum::IntoEnumIterator;
use tracing::{debug, warn};

/// Extracts `liquidityIndex` from a `ReserveDataUpdated` payload of five words.
pub fn decode_liquidity_index(log: &LogRecord) -> Result<U256, ChainError> {
    let expected = RESERVE_DATA_WORDS * 32;
    if log.data.len() != expected {
        return Err(ChainError::decode(format!("reserve data payload is {} bytes, expected {}", log.data.len(), expected)));
    }
    let start = LIQUIDITY_INDEX_WORD * 32;
    Ok(U256::from_be_slice(&log.data[start..start + 32]))
}

/// Extracts the mint recipient (second indexed argument) of a `Transfer` log.
pub fn decode_mint_recipient(log: &LogRecord) -> Result<Address, ChainError> {
    match log.topics.get(2) {
        Some(topic) => Ok(Address::from_word(*topic)),
        None => Err(ChainError::decode(format!("transfer log has {} topics", log.topics.len()))),
    }
}

/// Computes the risk signals of a tracked market.
///
/// Signals run in the order of [`RiskSignal`] and fail independently: a read or decode
/// error drops that single signal for this tick and is only logged.
#[derive(Debug, Clone)]
pub struct RiskEvaluator {
    config: RiskConfig,
    // Emitters of index updates; empty means any emitter
    pools: Vec<Address>,
    max_blocks_per_query: u64,
}

impl RiskEvaluator {
    pub fn new(config: RiskConfig, pools: Vec<Address>, max_blocks_per_query: u64) -> Self {
        Self { config, pools, max_blocks_per_query }
    }

    /// Evaluates every enabled signal of `market` at block `to`.
    ///
    /// `scan_from..=to` is the block range scanned in the current tick and bounds the
    /// index-update lookup. Returns the triggered reasons in signal order.
    pub async fn evaluate(&self, client: &dyn ChainClient, market: &mut Market, scan_from: u64, to: u64) -> Vec<String> {
        let mut reasons = Vec::new();

        for signal in RiskSignal::iter() {
            if !self.config.is_enabled(signal) {
                continue;
            }

            let outcome = match signal {
                RiskSignal::RawSupply => self.check_raw_supply(client, market, to).await,
                RiskSignal::Supply => self.check_supply(client, market, to).await,
                RiskSignal::Tvl => self.check_tvl(client, market, scan_from, to).await,
                RiskSignal::MinterConcentration => self.check_minters(client, market, to).await,
            };

            match outcome {
                Ok(Some(reason)) => reasons.push(reason),
                Ok(None) => {}
                Err(e) => {
                    warn!(market = %market.market_token(), block = to, signal = %signal, "Skipping signal: {}", e);
                }
            }
        }

        reasons
    }

    /// Evaluates `markets` with at most `max_concurrent` in flight, returning the
    /// reasons in the same order as the input.
    pub async fn evaluate_all<'a>(
        &self,
        client: &dyn ChainClient,
        markets: impl Iterator<Item = &'a mut Market>,
        scan_from: u64,
        to: u64,
        max_concurrent: usize,
    ) -> Vec<Vec<String>> {
        stream::iter(markets.map(move |market| self.evaluate(client, market, scan_from, to)))
            .buffered(max_concurrent.max(1))
            .collect()
            .await
    }

    async fn check_raw_supply(&self, client: &dyn ChainClient, market: &Market, to: u64) -> Result<Option<String>, ChainError> {
        // Raw comparison, no decimal scaling applied
        let scaled = read_scaled_total_supply(client, market.market_token(), to).await?;
        if scaled < self.config.raw_supply_threshold {
            return Ok(Some(format!("scaledTotalSupply raw {} < {}", scaled, self.config.raw_supply_threshold)));
        }
        Ok(None)
    }

    async fn check_supply(&self, client: &dyn ChainClient, market: &Market, to: u64) -> Result<Option<String>, ChainError> {
        let supply = read_total_supply(client, market.market_token(), to).await?;
        let units = market.to_units(supply);
        if units < self.config.min_supply_units {
            return Ok(Some(format!(
                "totalSupply {:.6} {} < {}",
                units,
                market.symbol(),
                self.config.min_supply_units
            )));
        }
        Ok(None)
    }

    async fn check_tvl(
        &self,
        client: &dyn ChainClient,
        market: &mut Market,
        scan_from: u64,
        to: u64,
    ) -> Result<Option<String>, ChainError> {
        self.refresh_liquidity_index(client, market, scan_from, to).await?;

        let index = match market.liquidity_index {
            Some(index) => index,
            None => {
                debug!(market = %market.market_token(), "No liquidity index observed yet");
                return Ok(None);
            }
        };

        let scaled = read_scaled_total_supply(client, market.market_token(), to).await?;
        let product = scaled
            .checked_mul(index)
            .ok_or_else(|| ChainError::decode(format!("scaled supply {scaled} * index {index} overflows")))?;
        let tvl = market.to_units(product / RAY);

        if tvl < self.config.min_tvl_units {
            return Ok(Some(format!(
                "TVL {:.6} {} < {} (liquidity index {})",
                tvl,
                market.symbol(),
                self.config.min_tvl_units,
                index
            )));
        }
        Ok(None)
    }

    /// Updates the market's index from the latest index-update event in `scan_from..=to`.
    async fn refresh_liquidity_index(
        &self,
        client: &dyn ChainClient,
        market: &mut Market,
        scan_from: u64,
        to: u64,
    ) -> Result<(), ChainError> {
        if scan_from > to {
            return Ok(());
        }

        let query = LogQuery::new(scan_from, to)
            .with_addresses(self.pools.clone())
            .with_event(ReserveDataUpdated::SIGNATURE_HASH)
            .with_topic1(market.asset().into_word());
        let logs = fetch_logs_chunked(client, &query, self.max_blocks_per_query).await?;

        for log in &logs {
            match decode_liquidity_index(log) {
                Ok(index) => market.liquidity_index = Some(index),
                Err(e) => warn!(market = %market.market_token(), block = ?log.block_number, "Skipping index update: {}", e),
            }
        }
        Ok(())
    }

    async fn check_minters(&self, client: &dyn ChainClient, market: &mut Market, to: u64) -> Result<Option<String>, ChainError> {
        if market.age_at(to) < self.config.minter_gate_blocks {
            return Ok(None);
        }

        // Full rescan of the window every tick once the gate is open
        let query = LogQuery::new(market.start_block(), to)
            .with_address(market.market_token())
            .with_event(Transfer::SIGNATURE_HASH)
            .with_topic1(MINT_SENDER.into_word());
        let logs = fetch_logs_chunked(client, &query, self.max_blocks_per_query).await?;

        let mut minters = AHashSet::new();
        for log in &logs {
            match decode_mint_recipient(log) {
                Ok(recipient) => {
                    minters.insert(recipient);
                }
                Err(e) => warn!(market = %market.market_token(), block = ?log.block_number, "Skipping mint log: {}", e),
            }
        }
        market.minters = minters;

        let count = market.minters.len();
        if count <= self.config.max_minters {
            return Ok(Some(format!(
                "{} distinct minters <= {} over blocks {}..={}",
                count,
                self.config.max_minters,
                market.start_block(),
                to
            )));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::IMarketToken;
    use crate::data_sync::ingestor::ReserveDiscovery;
    use crate::data_sync::mock_client::MockChainClient;
    use alloy_primitives::Bytes;
    use alloy_sol_types::SolCall;

    const POOL: Address = Address::new([0x50; 20]);
    const ASSET: Address = Address::new([0xa0; 20]);
    const TOKEN: Address = Address::new([0xb0; 20]);

    fn market(start_block: u64, decimals: u8) -> Market {
        let discovery = ReserveDiscovery { asset: ASSET, market_token: TOKEN, block: start_block, tx_hash: None };
        Market::new(&discovery, "aTEST".to_string(), decimals)
    }

    fn only(signal: RiskSignal) -> RiskConfig {
        RiskConfig {
            raw_supply_enabled: signal == RiskSignal::RawSupply,
            supply_enabled: signal == RiskSignal::Supply,
            tvl_enabled: signal == RiskSignal::Tvl,
            minter_enabled: signal == RiskSignal::MinterConcentration,
            ..RiskConfig::default()
        }
    }

    fn evaluator(config: RiskConfig) -> RiskEvaluator {
        RiskEvaluator::new(config, vec![POOL], 1000)
    }

    #[test]
    fn test_decode_liquidity_index_requires_five_words() {
        let log = LogRecord {
            address: POOL,
            topics: vec![],
            data: Bytes::from(vec![0u8; 4 * 32]),
            block_number: Some(1),
            transaction_hash: None,
        };
        assert!(matches!(decode_liquidity_index(&log), Err(ChainError::Decode(_))));
    }

    #[tokio::test]
    async fn test_raw_supply_is_not_scaled() {
        let client = MockChainClient::new(200);
        client.set_scaled_total_supply(TOKEN, U256::from(999_999u64));
        let mut market = market(100, 18);

        let reasons = evaluator(only(RiskSignal::RawSupply)).evaluate(&client, &mut market, 150, 200).await;
        assert_eq!(reasons, vec!["scaledTotalSupply raw 999999 < 1000000".to_string()]);

        client.set_scaled_total_supply(TOKEN, U256::from(1_000_000u64));
        let reasons = evaluator(only(RiskSignal::RawSupply)).evaluate(&client, &mut market, 150, 200).await;
        assert!(reasons.is_empty());
    }

    #[tokio::test]
    async fn test_supply_uses_decimals() {
        let client = MockChainClient::new(200);
        client.set_total_supply(TOKEN, U256::from(500_000u64));
        let mut market = market(100, 6);

        let config = RiskConfig { min_supply_units: 1e6, ..only(RiskSignal::Supply) };
        let reasons = evaluator(config).evaluate(&client, &mut market, 150, 200).await;
        assert_eq!(reasons.len(), 1);
        assert!(reasons[0].starts_with("totalSupply 0.500000 aTEST"));

        client.set_total_supply(TOKEN, U256::from(2_000_000u64));
        let config = RiskConfig { min_supply_units: 1.0, ..only(RiskSignal::Supply) };
        assert!(evaluator(config).evaluate(&client, &mut market, 150, 200).await.is_empty());
    }

    #[tokio::test]
    async fn test_tvl_skipped_without_index() {
        let client = MockChainClient::new(200);
        client.set_scaled_total_supply(TOKEN, U256::ZERO);
        let mut market = market(100, 6);

        let reasons = evaluator(only(RiskSignal::Tvl)).evaluate(&client, &mut market, 150, 200).await;
        assert!(reasons.is_empty());
        assert_eq!(market.liquidity_index, None);
    }

    #[tokio::test]
    async fn test_tvl_uses_latest_index_in_window() {
        let client = MockChainClient::new(200);
        client.set_scaled_total_supply(TOKEN, U256::from(400_000u64));
        client.push_reserve_data_updated(POOL, ASSET, RAY, 160);
        // 2x index: 400_000 scaled -> 800_000 raw -> 0.8 units
        client.push_reserve_data_updated(POOL, ASSET, RAY * U256::from(2), 170);
        // another asset's update must not leak in
        client.push_reserve_data_updated(POOL, Address::repeat_byte(0xa1), RAY * U256::from(100), 180);
        let mut market = market(100, 6);

        let reasons = evaluator(only(RiskSignal::Tvl)).evaluate(&client, &mut market, 150, 200).await;
        assert_eq!(market.liquidity_index, Some(RAY * U256::from(2)));
        assert_eq!(reasons.len(), 1);
        assert!(reasons[0].starts_with("TVL 0.800000 aTEST < 1"));
    }

    #[tokio::test]
    async fn test_index_persists_across_ticks() {
        let client = MockChainClient::new(300);
        client.set_scaled_total_supply(TOKEN, U256::from(5_000_000u64));
        client.push_reserve_data_updated(POOL, ASSET, RAY, 160);
        let mut market = market(100, 6);
        let evaluator = evaluator(only(RiskSignal::Tvl));

        assert!(evaluator.evaluate(&client, &mut market, 150, 200).await.is_empty());
        // next tick window has no update, the previous index still applies
        client.set_scaled_total_supply(TOKEN, U256::from(5u64));
        let reasons = evaluator.evaluate(&client, &mut market, 201, 300).await;
        assert_eq!(market.liquidity_index, Some(RAY));
        assert_eq!(reasons.len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_index_update_is_skipped() {
        let client = MockChainClient::new(200);
        client.set_scaled_total_supply(TOKEN, U256::from(5_000_000u64));
        client.push_reserve_data_updated(POOL, ASSET, RAY, 160);
        // four data words instead of five
        client.push_log(LogRecord {
            address: POOL,
            topics: vec![ReserveDataUpdated::SIGNATURE_HASH, ASSET.into_word()],
            data: Bytes::from(vec![0xffu8; 4 * 32]),
            block_number: Some(170),
            transaction_hash: None,
        });
        client.push_reserve_data_updated(POOL, ASSET, RAY * U256::from(3), 180);
        let mut market = market(100, 6);

        let reasons = evaluator(only(RiskSignal::Tvl)).evaluate(&client, &mut market, 150, 200).await;
        assert!(reasons.is_empty());
        assert_eq!(market.liquidity_index, Some(RAY * U256::from(3)));
    }

    #[tokio::test]
    async fn test_malformed_mint_log_is_skipped() {
        let client = MockChainClient::new(300);
        client.push_mint(TOKEN, Address::repeat_byte(0x01), U256::from(1u64), 120);
        // mint without a recipient topic
        client.push_log(LogRecord {
            address: TOKEN,
            topics: vec![Transfer::SIGNATURE_HASH, MINT_SENDER.into_word()],
            data: Bytes::new(),
            block_number: Some(130),
            transaction_hash: None,
        });
        let mut market = market(100, 6);

        let reasons = evaluator(only(RiskSignal::MinterConcentration)).evaluate(&client, &mut market, 250, 300).await;
        assert_eq!(reasons, vec!["1 distinct minters <= 1 over blocks 100..=300".to_string()]);
        assert_eq!(market.minters.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_tvl_does_not_hide_supply_reason() {
        let client = MockChainClient::new(200);
        client.set_total_supply(TOKEN, U256::from(10u64));
        client.push_reserve_data_updated(POOL, ASSET, RAY, 160);
        client.set_call_response(
            TOKEN,
            IMarketToken::scaledTotalSupplyCall::SELECTOR,
            Err(ChainError::Transport("timeout".to_string())),
        );
        let mut market = market(100, 6);

        let config = RiskConfig { minter_enabled: false, ..RiskConfig::default() };
        let reasons = evaluator(config).evaluate(&client, &mut market, 150, 200).await;

        assert_eq!(reasons.len(), 1);
        assert!(reasons[0].starts_with("totalSupply"));
        assert!(!reasons.iter().any(|r| r.starts_with("TVL")));
    }

    #[tokio::test]
    async fn test_minter_gate() {
        let client = MockChainClient::new(300);
        client.push_mint(TOKEN, Address::repeat_byte(0x01), U256::from(1u64), 120);
        let mut market = market(100, 6);
        let evaluator = evaluator(only(RiskSignal::MinterConcentration));

        // 99 blocks elapsed, gate is 100
        assert!(evaluator.evaluate(&client, &mut market, 150, 199).await.is_empty());
        assert!(market.minters.is_empty());
        assert_eq!(client.log_query_count(), 0);

        let reasons = evaluator.evaluate(&client, &mut market, 200, 200).await;
        assert_eq!(reasons, vec!["1 distinct minters <= 1 over blocks 100..=200".to_string()]);
    }

    #[tokio::test]
    async fn test_single_minter_triggers() {
        let client = MockChainClient::new(300);
        let minter = Address::repeat_byte(0x01);
        client.push_mint(TOKEN, minter, U256::from(1u64), 120);
        client.push_mint(TOKEN, minter, U256::from(5u64), 180);
        let mut market = market(100, 6);

        let reasons = evaluator(only(RiskSignal::MinterConcentration)).evaluate(&client, &mut market, 250, 300).await;
        assert_eq!(reasons.len(), 1);
        assert_eq!(market.minters.len(), 1);
    }

    #[tokio::test]
    async fn test_two_minters_do_not_trigger() {
        let client = MockChainClient::new(300);
        client.push_mint(TOKEN, Address::repeat_byte(0x01), U256::from(1u64), 120);
        client.push_mint(TOKEN, Address::repeat_byte(0x02), U256::from(1u64), 130);
        // a plain transfer is not a mint
        client.push_log(LogRecord {
            address: TOKEN,
            topics: vec![
                Transfer::SIGNATURE_HASH,
                Address::repeat_byte(0x01).into_word(),
                Address::repeat_byte(0x03).into_word(),
            ],
            data: Bytes::new(),
            block_number: Some(140),
            transaction_hash: None,
        });
        let mut market = market(100, 6);

        let reasons = evaluator(only(RiskSignal::MinterConcentration)).evaluate(&client, &mut market, 250, 300).await;
        assert!(reasons.is_empty());
        assert_eq!(market.minters.len(), 2);
    }

    #[tokio::test]
    async fn test_reasons_follow_signal_order() {
        let client = MockChainClient::new(300);
        client.set_scaled_total_supply(TOKEN, U256::from(1u64));
        client.set_total_supply(TOKEN, U256::from(1u64));
        client.push_reserve_data_updated(POOL, ASSET, RAY, 260);
        client.push_mint(TOKEN, Address::repeat_byte(0x01), U256::from(1u64), 120);
        let mut market = market(100, 6);

        let config = RiskConfig { raw_supply_enabled: true, ..RiskConfig::default() };
        let reasons = evaluator(config).evaluate(&client, &mut market, 250, 300).await;

        assert_eq!(reasons.len(), 4);
        assert!(reasons[0].starts_with("scaledTotalSupply raw"));
        assert!(reasons[1].starts_with("totalSupply"));
        assert!(reasons[2].starts_with("TVL"));
        assert!(reasons[3].contains("distinct minters"));
    }

    #[tokio::test]
    async fn test_evaluate_all_keeps_order() {
        let client = MockChainClient::new(300);
        let tokens = [Address::repeat_byte(0xb1), Address::repeat_byte(0xb2), Address::repeat_byte(0xb3)];
        client.set_total_supply(tokens[0], U256::from(1u64));
        client.set_total_supply(tokens[1], U256::from(10_000_000u64));
        client.set_total_supply(tokens[2], U256::from(1u64));

        let mut markets: Vec<Market> = tokens
            .iter()
            .map(|token| {
                let discovery = ReserveDiscovery { asset: ASSET, market_token: *token, block: 100, tx_hash: None };
                Market::new(&discovery, "aTEST".to_string(), 6)
            })
            .collect();

        let results = evaluator(only(RiskSignal::Supply)).evaluate_all(&client, markets.iter_mut(), 250, 300, 2).await;
        let triggered: Vec<bool> = results.iter().map(|reasons| !reasons.is_empty()).collect();
        assert_eq!(triggered, vec![true, false, true]);
    }
}
