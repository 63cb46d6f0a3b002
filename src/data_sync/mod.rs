/// Data Synchronization Layer
///
/// Everything that talks to the chain node:
///
/// - `ChainClient` seam with the HTTP JSON-RPC implementation and typed contract reads
/// - Chunked `eth_getLogs` scanning and reserve discovery
/// - The polling service that owns the scan cursor and drives each tick
pub mod chain_client;
pub mod config;
pub mod ingestor;
pub mod mock_client;
pub mod service;


pub use chain_client::{ChainClient, LogQuery, LogRecord, RpcChainClient};
pub use config::{DiscordConfig, WatchConfig};
pub use ingestor::{EventIngestor, ReserveDiscovery};
pub use mock_client::MockChainClient;
pub use service::{ReserveWatchService, ReserveWatchServiceBuilder, TickOutcome};
