use super::chain_client::{ChainClient, LogQuery, LogRecord};
use crate::constants::ReserveInitialized;
use crate::errors::ChainError;
use alloy_primitives::{Address, B256};
use alloy_sol_types::SolEvent;
use std::ops::RangeInclusive;
use tracing::{debug, warn};

/// A reserve-creation event decoded from a configurator log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReserveDiscovery {
    pub asset: Address,
    pub market_token: Address,
    pub block: u64,
    pub tx_hash: Option<B256>,
}

impl ReserveDiscovery {
    /// Decodes a `ReserveInitialized` log. Both addresses live in the indexed
    /// topics as the low 20 bytes of a 32-byte word.
    pub fn from_log(log: &LogRecord) -> Result<Self, ChainError> {
        let topics = &log.topics;
        if topics.len() < 3 {
            return Err(ChainError::decode(format!("expected 3 topics, got {}", topics.len())));
        }
        if topics[0] != ReserveInitialized::SIGNATURE_HASH {
            return Err(ChainError::decode(format!("unexpected event signature {}", topics[0])));
        }
        let block = log.block_number.ok_or_else(|| ChainError::decode("log without block number"))?;

        Ok(Self {
            asset: Address::from_word(topics[1]),
            market_token: Address::from_word(topics[2]),
            block,
            tx_hash: log.transaction_hash,
        })
    }
}

/// Splits `[from, to]` into consecutive ranges of at most `max_blocks` blocks.
pub fn block_chunks(from: u64, to: u64, max_blocks: u64) -> Vec<RangeInclusive<u64>> {
    let mut chunks = Vec::new();
    if from > to || max_blocks == 0 {
        return chunks;
    }

    let mut start = from;
    loop {
        let end = start.saturating_add(max_blocks - 1).min(to);
        chunks.push(start..=end);
        if end >= to {
            break;
        }
        start = end + 1;
    }
    chunks
}

/// Runs `query` over its block range in chunks, concatenating results in block order.
/// The first failing chunk aborts the whole fetch.
pub async fn fetch_logs_chunked(
    client: &dyn ChainClient,
    query: &LogQuery,
    max_blocks: u64,
) -> Result<Vec<LogRecord>, ChainError> {
    let mut logs = Vec::new();
    for chunk in block_chunks(query.from_block, query.to_block, max_blocks) {
        let mut batch = client.get_logs(&query.over(*chunk.start(), *chunk.end())).await?;
        logs.append(&mut batch);
    }
    Ok(logs)
}

/// Scans configurator contracts for reserve-creation events.
#[derive(Debug, Clone)]
pub struct EventIngestor {
    configurators: Vec<Address>,
    max_blocks_per_query: u64,
}

impl EventIngestor {
    pub fn new(configurators: Vec<Address>, max_blocks_per_query: u64) -> Self {
        Self { configurators, max_blocks_per_query }
    }

    /// Collects the reserve discoveries in `[from, to]`.
    ///
    /// Each configurator is queried on its own, chunk by chunk. A failed chunk is logged
    /// and only the remaining chunks of that configurator are skipped; logs from the
    /// chunks fetched before it are kept. Logs that fail to decode are skipped one by one.
    /// Duplicates are possible and left to the registry.
    pub async fn scan(&self, client: &dyn ChainClient, from: u64, to: u64) -> Vec<ReserveDiscovery> {
        let mut discoveries = Vec::new();
        if from > to {
            return discoveries;
        }

        for configurator in &self.configurators {
            let query = LogQuery::new(from, to)
                .with_address(*configurator)
                .with_event(ReserveInitialized::SIGNATURE_HASH);

            let mut logs = Vec::new();
            for chunk in block_chunks(from, to, self.max_blocks_per_query) {
                match client.get_logs(&query.over(*chunk.start(), *chunk.end())).await {
                    Ok(mut batch) => logs.append(&mut batch),
                    Err(e) => {
                        warn!(
                            configurator = %configurator,
                            from = *chunk.start(),
                            to,
                            "Failed to fetch reserve logs, skipping rest of range: {}",
                            e
                        );
                        break;
                    }
                }
            }

            debug!(configurator = %configurator, from, to, "{} reserve logs", logs.len());

            for log in &logs {
                match ReserveDiscovery::from_log(log) {
                    Ok(discovery) => discoveries.push(discovery),
                    Err(e) => {
                        warn!(configurator = %configurator, tx = ?log.transaction_hash, "Skipping undecodable reserve log: {}", e);
                    }
                }
            }
        }

        discoveries
    }
}
