use crate::data_sync::{
    chain_client::{ChainClient, RpcChainClient},
    config::WatchConfig,
    ingestor::EventIngestor,
};
use crate::errors::ChainError;
use crate::execution::{AlertSink, Notifier};
use crate::logic::{registry::MarketRegistry, risk_evaluator::RiskEvaluator, types::Alert};
use eyre::Result;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info};

/// What a single tick did.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// No newly confirmed block since the last tick.
    Idle { head: u64, last_scanned: u64 },
    Processed {
        from: u64,
        to: u64,
        discovered: usize,
        expired: usize,
        evaluated: usize,
        alerts: Vec<Alert>,
    },
}

/// Polls the chain on a fixed interval, tracks newly initialized reserves and
/// evaluates them until their watch window closes.
///
/// The service exclusively owns the scan cursor and the market registry, so every
/// mutation happens inside `tick` and several services can run side by side.
pub struct ReserveWatchService {
    client: Arc<dyn ChainClient>,
    config: WatchConfig,
    ingestor: EventIngestor,
    registry: MarketRegistry,
    evaluator: RiskEvaluator,
    alert_sink: AlertSink,
    last_scanned: Option<u64>,
}

impl ReserveWatchService {
    /// Create a new reserve watch service. Fails on an unusable configuration.
    pub fn new(config: WatchConfig, client: Arc<dyn ChainClient>, alert_sink: AlertSink) -> Result<Self> {
        config.validate()?;

        info!(
            configurators = config.configurators.len(),
            pools = config.pools.len(),
            window_blocks = config.window_blocks,
            confirmations = config.confirmations,
            "Initializing ReserveWatchService"
        );

        Ok(Self {
            client,
            ingestor: EventIngestor::new(config.configurators.clone(), config.max_blocks_per_query),
            registry: MarketRegistry::new(config.window_blocks),
            evaluator: RiskEvaluator::new(config.risk.clone(), config.pools.clone(), config.max_blocks_per_query),
            alert_sink,
            last_scanned: None,
            config,
        })
    }

    /// Sets the cursor from the current head, or from the configured start block.
    pub async fn initialize(&mut self) -> Result<u64, ChainError> {
        let last_scanned = match self.config.start_block {
            Some(start_block) => start_block.saturating_sub(1),
            None => self.client.block_number().await?.saturating_sub(self.config.confirmations),
        };
        info!(last_scanned, "Scan cursor initialized");
        self.last_scanned = Some(last_scanned);
        Ok(last_scanned)
    }

    /// Processes every block confirmed since the previous tick.
    ///
    /// Only a failure to read the chain head escapes; ingestion, registry and
    /// evaluation failures are logged where they happen.
    pub async fn tick(&mut self) -> Result<TickOutcome, ChainError> {
        let last_scanned = match self.last_scanned {
            Some(last_scanned) => last_scanned,
            None => self.initialize().await?,
        };

        let head = self.client.block_number().await?;
        let safe = head.saturating_sub(self.config.confirmations);
        if safe <= last_scanned {
            debug!(head, last_scanned, "No new confirmed blocks");
            return Ok(TickOutcome::Idle { head, last_scanned });
        }

        Ok(self.process_range(last_scanned + 1, safe).await)
    }

    /// Ingests, maintains and evaluates `[from, to]`, then moves the cursor to `to`.
    ///
    /// Blocks at or below the cursor are never processed again; the cursor only moves forward.
    async fn process_range(&mut self, from: u64, to: u64) -> TickOutcome {
        let from = match self.last_scanned {
            Some(last_scanned) => from.max(last_scanned.saturating_add(1)),
            None => from,
        };
        if from > to {
            return TickOutcome::Processed { from, to, discovered: 0, expired: 0, evaluated: 0, alerts: Vec::new() };
        }

        let client = self.client.as_ref();

        let discoveries = self.ingestor.scan(client, from, to).await;
        let mut discovered = 0;
        for discovery in &discoveries {
            if self.registry.ensure(client, discovery).await {
                discovered += 1;
            }
        }

        // Evicted markets are never evaluated in the tick that drops them
        let expired = self.registry.expire(to).len();

        let reasons = self
            .evaluator
            .evaluate_all(client, self.registry.markets_mut(), from, to, self.config.max_concurrent_evaluations)
            .await;
        let evaluated = reasons.len();

        let alerts: Vec<Alert> = self
            .registry
            .markets()
            .iter()
            .zip(reasons)
            .filter(|(_, reasons)| !reasons.is_empty())
            .map(|(market, reasons)| Alert {
                block: to,
                asset: market.asset(),
                market_token: market.market_token(),
                symbol: market.symbol().to_string(),
                reasons,
            })
            .collect();

        for alert in &alerts {
            self.alert_sink.emit(alert);
        }

        self.last_scanned = Some(to);
        info!(from, to, discovered, expired, evaluated, alerts = alerts.len(), tracked = self.registry.len(), "Tick processed");

        TickOutcome::Processed { from, to, discovered, expired, evaluated, alerts }
    }

    /// Runs ticks until `shutdown` resolves. A tick in flight always completes first.
    pub async fn run_until<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let interval = self.config.poll_interval();
        info!(interval_secs = interval.as_secs(), "ReserveWatchService started");

        loop {
            if let Err(e) = self.tick().await {
                error!(transient = e.is_transient(), "Tick failed: {}", e);
            }

            tokio::select! {
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        info!(last_scanned = ?self.last_scanned, tracked = self.registry.len(), "ReserveWatchService stopped");
    }

    /// Runs until Ctrl-C.
    pub async fn run(&mut self) {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;
    }

    pub fn last_scanned(&self) -> Option<u64> {
        self.last_scanned
    }

    pub fn registry(&self) -> &MarketRegistry {
        &self.registry
    }
}

/// Builder for ReserveWatchService
#[derive(Default)]
pub struct ReserveWatchServiceBuilder {
    config: Option<WatchConfig>,
    client: Option<Arc<dyn ChainClient>>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl ReserveWatchServiceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: WatchConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_client(mut self, client: Arc<dyn ChainClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Falls back to the environment for the config and to an HTTP client on
    /// the configured RPC URL.
    pub fn build(self) -> Result<ReserveWatchService> {
        let config = match self.config {
            Some(config) => config,
            None => WatchConfig::from_env()?,
        };
        let client = match self.client {
            Some(client) => client,
            None => Arc::new(RpcChainClient::new(config.rpc_url()?)),
        };
        let alert_sink = match self.notifier {
            Some(notifier) => AlertSink::with_notifier(notifier),
            None => AlertSink::new(),
        };

        ReserveWatchService::new(config, client, alert_sink)
    }
}
