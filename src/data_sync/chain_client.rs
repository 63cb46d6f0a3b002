use crate::constants::{IMarketToken, MAX_DECIMALS};
use crate::errors::ChainError;
use crate::utils::call_trace::CallFrame;
use alloy_primitives::{Address, B256, Bytes, U256};
use alloy_provider::{Provider, RootProvider};
use alloy_rpc_types_eth::{BlockId, Filter, TransactionInput, TransactionRequest};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use url::Url;

/// A log range query. An empty address list matches every emitter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogQuery {
    pub addresses: Vec<Address>,
    pub from_block: u64,
    pub to_block: u64,
    pub topic0: Option<B256>,
    pub topic1: Option<B256>,
    pub topic2: Option<B256>,
}

impl LogQuery {
    pub fn new(from_block: u64, to_block: u64) -> Self {
        Self { from_block, to_block, ..Self::default() }
    }

    pub fn with_addresses(mut self, addresses: Vec<Address>) -> Self {
        self.addresses = addresses;
        self
    }

    pub fn with_address(self, address: Address) -> Self {
        self.with_addresses(vec![address])
    }

    pub fn with_event(mut self, signature: B256) -> Self {
        self.topic0 = Some(signature);
        self
    }

    /// Filter on the first indexed argument.
    pub fn with_topic1(mut self, topic: B256) -> Self {
        self.topic1 = Some(topic);
        self
    }

    /// Filter on the second indexed argument.
    pub fn with_topic2(mut self, topic: B256) -> Self {
        self.topic2 = Some(topic);
        self
    }

    /// Same filter over a different block range.
    pub fn over(&self, from_block: u64, to_block: u64) -> Self {
        Self { from_block, to_block, ..self.clone() }
    }
}

/// A raw log record as returned by the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    pub block_number: Option<u64>,
    pub transaction_hash: Option<B256>,
}

/// Blocking-style access to a chain node.
///
/// Implementations own their retry and timeout policy; anything they give up on is
/// returned as a classified [`ChainError`].
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn block_number(&self) -> Result<u64, ChainError>;

    async fn get_logs(&self, query: &LogQuery) -> Result<Vec<LogRecord>, ChainError>;

    /// `eth_call` against `to` at the given block, returning the raw return data.
    async fn call(&self, to: Address, call_data: Bytes, block: u64) -> Result<Bytes, ChainError>;
}

/// Performs a typed contract read, decoding the return data at the boundary.
pub async fn read_call<C>(client: &dyn ChainClient, to: Address, call: C, block: u64) -> Result<C::Return, ChainError>
where
    C: SolCall + Send,
{
    let call_data = Bytes::from(call.abi_encode());
    let raw = client.call(to, call_data, block).await?;
    if raw.is_empty() {
        return Err(ChainError::decode(format!("empty return data from {to} for {}", C::SIGNATURE)));
    }
    Ok(C::abi_decode_returns(&raw)?)
}

pub async fn read_scaled_total_supply(client: &dyn ChainClient, token: Address, block: u64) -> Result<U256, ChainError> {
    read_call(client, token, IMarketToken::scaledTotalSupplyCall {}, block).await
}

pub async fn read_total_supply(client: &dyn ChainClient, token: Address, block: u64) -> Result<U256, ChainError> {
    read_call(client, token, IMarketToken::totalSupplyCall {}, block).await
}

pub async fn read_symbol(client: &dyn ChainClient, token: Address, block: u64) -> Result<String, ChainError> {
    read_call(client, token, IMarketToken::symbolCall {}, block).await
}

pub async fn read_decimals(client: &dyn ChainClient, token: Address, block: u64) -> Result<u8, ChainError> {
    let decimals = read_call(client, token, IMarketToken::decimalsCall {}, block).await?;
    if decimals > MAX_DECIMALS {
        return Err(ChainError::decode(format!("decimals {decimals} of {token} out of range")));
    }
    Ok(decimals)
}

/// [`ChainClient`] over JSON-RPC HTTP using an alloy provider.
#[derive(Clone)]
pub struct RpcChainClient {
    provider: RootProvider,
}

impl RpcChainClient {
    pub fn new(rpc_url: Url) -> Self {
        Self { provider: RootProvider::new_http(rpc_url) }
    }

    /// Fetches the internal call tree of a transaction via `debug_traceTransaction`.
    pub async fn trace_transaction(&self, tx_hash: B256) -> Result<CallFrame, ChainError> {
        let options = serde_json::json!({ "tracer": "callTracer", "timeout": "30s" });
        let frame = self.provider.raw_request("debug_traceTransaction".into(), (tx_hash, options)).await?;
        Ok(frame)
    }

    fn build_filter(query: &LogQuery) -> Filter {
        let mut filter = Filter::new().from_block(query.from_block).to_block(query.to_block);
        if !query.addresses.is_empty() {
            filter = filter.address(query.addresses.clone());
        }
        if let Some(topic0) = query.topic0 {
            filter = filter.event_signature(topic0);
        }
        if let Some(topic1) = query.topic1 {
            filter = filter.topic1(topic1);
        }
        if let Some(topic2) = query.topic2 {
            filter = filter.topic2(topic2);
        }
        filter
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn block_number(&self) -> Result<u64, ChainError> {
        Ok(self.provider.get_block_number().await?)
    }

    async fn get_logs(&self, query: &LogQuery) -> Result<Vec<LogRecord>, ChainError> {
        let filter = Self::build_filter(query);
        let logs = self.provider.get_logs(&filter).await?;

        Ok(logs
            .into_iter()
            .map(|log| LogRecord {
                address: log.address(),
                topics: log.topics().to_vec(),
                data: log.data().data.clone(),
                block_number: log.block_number,
                transaction_hash: log.transaction_hash,
            })
            .collect())
    }

    async fn call(&self, to: Address, call_data: Bytes, block: u64) -> Result<Bytes, ChainError> {
        let request = TransactionRequest::default().to(to).input(TransactionInput::new(call_data));
        Ok(self.provider.call(request).block(BlockId::number(block)).await?)
    }
}
