/// Logic Layer - Risk Engine
///
/// This layer is responsible for:
/// - Per-market lifecycle over a bounded block window
/// - Risk signal evaluation of every tracked market
pub mod market;
pub mod registry;
pub mod risk_evaluator;
pub mod types;

pub use market::Market;
pub use registry::MarketRegistry;
pub use risk_evaluator::RiskEvaluator;
pub use types::{Alert, RiskConfig, RiskSignal};
