// Three-Layer Architecture
pub mod data_sync; // Data Layer: chain access, log ingestion, polling service
pub mod execution; // Execution Layer: alert delivery
pub mod logic; // Logic Layer: market registry, risk evaluation

// Common utilities and types
pub mod constants;
pub mod errors;
pub mod utils;

// Re-export key components from each layer
pub use data_sync::{
    ChainClient, EventIngestor, MockChainClient, ReserveWatchService, ReserveWatchServiceBuilder, RpcChainClient,
    TickOutcome, WatchConfig,
};
pub use errors::ChainError;
pub use execution::{AlertSink, DiscordNotifier, NoopNotifier, Notifier};
pub use logic::{Alert, Market, MarketRegistry, RiskConfig, RiskEvaluator, RiskSignal};
