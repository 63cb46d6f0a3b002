pub mod call_trace;
pub mod config_loader;
pub mod units;

pub use config_loader::*;
