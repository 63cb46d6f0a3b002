use alloy_primitives::{Address, B256};
use eyre::{Result, WrapErr, eyre};
use reserve_watch::RpcChainClient;
use reserve_watch::constants::INIT_RESERVES_SELECTOR;
use reserve_watch::utils::call_trace::{TraceSummary, contains_call, flatten_calls, render_calls};
use tracing_subscriber::EnvFilter;
use url::Url;

/// Prints the internal call tree of a transaction.
///
/// Usage: `trace_inspect <tx-hash> [configurator]`. `RPC_URL` must point at a node
/// with the debug namespace enabled.
#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let mut args = std::env::args().skip(1);
    let tx_hash: B256 = args
        .next()
        .ok_or_else(|| eyre!("usage: trace_inspect <tx-hash> [configurator]"))?
        .parse()
        .wrap_err("invalid transaction hash")?;
    let configurator: Option<Address> = args.next().map(|raw| raw.parse()).transpose().wrap_err("invalid configurator address")?;

    let rpc_url = std::env::var("RPC_URL").unwrap_or_else(|_| "http://localhost:8545".to_string());
    let client = RpcChainClient::new(Url::parse(&rpc_url)?);

    let trace = client.trace_transaction(tx_hash).await?;
    let calls = flatten_calls(&trace);
    let summary = TraceSummary::new(&trace, &calls);

    println!("=== Transaction Trace Analysis ===");
    println!("Transaction Hash: {}", tx_hash);
    println!("From: {}", trace.from);
    if let Some(to) = trace.to {
        println!("To: {}", to);
    }
    println!("Total Gas Used: {}", summary.gas_used);
    println!();
    print!("{}", render_calls(&calls));

    println!("=== Summary ===");
    for (call_type, count) in &summary.calls_by_type {
        println!("{}: {}", call_type, count);
    }
    println!("Total Internal Calls: {}", summary.total_calls);

    if let Some(configurator) = configurator {
        let found = contains_call(&trace, configurator, INIT_RESERVES_SELECTOR);
        println!("initReserves on {}: {}", configurator, if found { "yes" } else { "no" });
    }

    Ok(())
}
