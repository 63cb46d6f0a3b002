use super::chain_client::{ChainClient, LogQuery, LogRecord};
use crate::constants::{IMarketToken, MINT_SENDER, ReserveDataUpdated, ReserveInitialized, Transfer};
use crate::errors::ChainError;
use alloy_primitives::{Address, B256, Bytes, U256};
use alloy_sol_types::{SolCall, SolEvent, SolType, SolValue, sol_data};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct MockState {
    head: u64,
    head_error: Option<ChainError>,
    logs: Vec<LogRecord>,
    // (contract, selector) -> return data or failure
    calls: HashMap<(Address, [u8; 4]), Result<Bytes, ChainError>>,
    failing_log_addresses: HashSet<Address>,
    // (emitter, block): queries for the emitter whose range covers the block fail
    failing_log_blocks: Vec<(Address, u64)>,
}

/// In-memory chain used by tests and benches.
///
/// Logs are filtered the way a node would filter them; contract reads are answered
/// from responses registered per (contract, selector).
#[derive(Default)]
pub struct MockChainClient {
    state: Mutex<MockState>,
    call_count: AtomicUsize,
    log_query_count: AtomicUsize,
}

impl MockChainClient {
    pub fn new(head: u64) -> Self {
        let client = Self::default();
        client.set_head(head);
        client
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_head(&self, head: u64) {
        self.state().head = head;
    }

    pub fn fail_block_number(&self, error: Option<ChainError>) {
        self.state().head_error = error;
    }

    pub fn push_log(&self, log: LogRecord) {
        self.state().logs.push(log);
    }

    pub fn push_reserve_initialized(&self, configurator: Address, asset: Address, market_token: Address, block: u64) {
        self.push_log(LogRecord {
            address: configurator,
            topics: vec![ReserveInitialized::SIGNATURE_HASH, asset.into_word(), market_token.into_word()],
            data: Bytes::from((Address::ZERO, Address::ZERO, Address::ZERO).abi_encode_params()),
            block_number: Some(block),
            transaction_hash: Some(B256::with_last_byte((block % 256) as u8)),
        });
    }

    pub fn push_reserve_data_updated(&self, pool: Address, asset: Address, liquidity_index: U256, block: u64) {
        let words = (U256::ZERO, U256::ZERO, U256::ZERO, liquidity_index, U256::ZERO);
        self.push_log(LogRecord {
            address: pool,
            topics: vec![ReserveDataUpdated::SIGNATURE_HASH, asset.into_word()],
            data: Bytes::from(words.abi_encode_params()),
            block_number: Some(block),
            transaction_hash: None,
        });
    }

    pub fn push_mint(&self, market_token: Address, recipient: Address, amount: U256, block: u64) {
        self.push_log(LogRecord {
            address: market_token,
            topics: vec![Transfer::SIGNATURE_HASH, MINT_SENDER.into_word(), recipient.into_word()],
            data: Bytes::from(amount.abi_encode()),
            block_number: Some(block),
            transaction_hash: None,
        });
    }

    /// Log queries touching `address` fail with a transport error.
    pub fn fail_logs_for(&self, address: Address) {
        self.state().failing_log_addresses.insert(address);
    }

    /// Log queries touching `address` whose range covers `block` fail with a transport error.
    pub fn fail_logs_at(&self, address: Address, block: u64) {
        self.state().failing_log_blocks.push((address, block));
    }

    pub fn set_call_response(&self, to: Address, selector: [u8; 4], response: Result<Bytes, ChainError>) {
        self.state().calls.insert((to, selector), response);
    }

    pub fn set_scaled_total_supply(&self, token: Address, value: U256) {
        self.set_call_response(token, IMarketToken::scaledTotalSupplyCall::SELECTOR, Ok((value,).abi_encode_params().into()));
    }

    pub fn set_total_supply(&self, token: Address, value: U256) {
        self.set_call_response(token, IMarketToken::totalSupplyCall::SELECTOR, Ok((value,).abi_encode_params().into()));
    }

    pub fn set_symbol(&self, token: Address, symbol: &str) {
        self.set_call_response(token, IMarketToken::symbolCall::SELECTOR, Ok((symbol.to_string(),).abi_encode_params().into()));
    }

    pub fn set_decimals(&self, token: Address, decimals: u8) {
        self.set_call_response(token, IMarketToken::decimalsCall::SELECTOR, Ok(<(sol_data::Uint<8>,)>::abi_encode_params(&(decimals,)).into()));
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn log_query_count(&self) -> usize {
        self.log_query_count.load(Ordering::Relaxed)
    }

    fn matches(query: &LogQuery, log: &LogRecord) -> bool {
        if !query.addresses.is_empty() && !query.addresses.contains(&log.address) {
            return false;
        }
        let topics_match = [query.topic0, query.topic1, query.topic2]
            .iter()
            .enumerate()
            .all(|(position, wanted)| match wanted {
                Some(topic) => log.topics.get(position) == Some(topic),
                None => true,
            });
        // Pending logs carry no block number and match any range
        let in_range = log.block_number.is_none_or(|block| (query.from_block..=query.to_block).contains(&block));
        topics_match && in_range
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    async fn block_number(&self) -> Result<u64, ChainError> {
        let state = self.state();
        match &state.head_error {
            Some(error) => Err(error.clone()),
            None => Ok(state.head),
        }
    }

    async fn get_logs(&self, query: &LogQuery) -> Result<Vec<LogRecord>, ChainError> {
        self.log_query_count.fetch_add(1, Ordering::Relaxed);
        let state = self.state();
        if query.addresses.iter().any(|address| state.failing_log_addresses.contains(address)) {
            return Err(ChainError::Transport("connection reset".to_string()));
        }
        let range = query.from_block..=query.to_block;
        if state
            .failing_log_blocks
            .iter()
            .any(|(address, block)| query.addresses.contains(address) && range.contains(block))
        {
            return Err(ChainError::Transport("request timed out".to_string()));
        }
        Ok(state.logs.iter().filter(|log| Self::matches(query, log)).cloned().collect())
    }

    async fn call(&self, to: Address, call_data: Bytes, _block: u64) -> Result<Bytes, ChainError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        let selector: [u8; 4] = match call_data.get(..4).and_then(|bytes| bytes.try_into().ok()) {
            Some(selector) => selector,
            None => return Err(ChainError::decode("call data shorter than a selector")),
        };
        // Unknown contracts behave like an EOA: empty return data.
        self.state().calls.get(&(to, selector)).cloned().unwrap_or_else(|| Ok(Bytes::new()))
    }
}
