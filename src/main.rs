use clap::Parser;
use std::sync::Arc;
use tokio::time::Duration;
use walletpool::ledger::{BalanceQuery, RpcBalanceClient, SimulatedLedger};
use walletpool::random::{RandomSource, ThreadRandom};
use walletpool::store::{AccountStore, JsonFileStore, RedisAccountStore};
use walletpool::{CircuitBreaker, PoolConfig, PoolManager};

/// Dry run of the account pool against a simulated ledger
///
/// Trade execution is a stand-in that succeeds with a configurable
/// probability; the pool, funding and breaker logic are the real ones.
#[derive(Parser, Debug)]
#[command(name = "walletpool", version)]
struct Args {
    /// Number of selection cycles to run
    #[arg(long, default_value_t = 20)]
    cycles: u32,

    /// Delay between cycles in milliseconds
    #[arg(long, default_value_t = 1000)]
    cycle_delay_ms: u64,

    /// Probability that a simulated trade fails
    #[arg(long, default_value_t = 0.05)]
    failure_probability: f64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let args = Args::parse();
    let config = PoolConfig::from_env()?;

    tracing::info!("🚀 walletpool starting (target {} accounts)", config.target_pool_size);

    match config.redis_url.clone() {
        Some(url) => {
            let store = RedisAccountStore::new(&url).await?;
            run(config, store, &args).await
        }
        None => {
            let store = JsonFileStore::new(&config.store_path);
            run(config, store, &args).await
        }
    }
}

fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter("walletpool=info")
        .init();
}

async fn run<S: AccountStore>(config: PoolConfig, store: S, args: &Args) -> anyhow::Result<()> {
    let ledger = Arc::new(SimulatedLedger::new());
    let rpc = config.rpc_url.clone().map(RpcBalanceClient::new);
    let breaker_config = config.breaker.clone();

    let mut pool = PoolManager::new(config, ledger.clone(), store);
    let summary = pool.load_or_generate().await?;
    tracing::info!(
        "Loaded {}, generated {}, funded {}",
        summary.loaded,
        summary.generated,
        summary.funding.funded
    );

    let mut breaker = CircuitBreaker::new(breaker_config, pool.sink().cloned());

    // Sink monitoring goes to the real RPC when one is configured
    match rpc {
        Some(client) => cycle_loop(&mut pool, &mut breaker, &client, args).await,
        None => cycle_loop(&mut pool, &mut breaker, ledger.as_ref(), args).await,
    }

    Ok(())
}

async fn cycle_loop<S: AccountStore, B: BalanceQuery>(
    pool: &mut PoolManager<SimulatedLedger, S>,
    breaker: &mut CircuitBreaker,
    sink_client: &B,
    args: &Args,
) {
    let mut rng = ThreadRandom::new();
    breaker.record_initial_sink_balance(sink_client).await;

    for cycle in 1..=args.cycles {
        let batch = pool.select_active_batch(chrono::Utc::now());
        if batch.is_empty() {
            tracing::debug!("Cycle {}: nothing eligible, waiting", cycle);
        }

        for record in &batch {
            let success = rng.unit() >= args.failure_probability;
            pool.mark_used(&record.public_id);
            breaker.record_outcome(success);
            if !success {
                tracing::warn!("Cycle {}: simulated trade failed for {}", cycle, record.display_name);
            }
        }

        let verdict = breaker.evaluate(sink_client).await;
        if verdict.tripped {
            tracing::error!("🛑 Stopping after cycle {}: {}", cycle, verdict.reason);
            return;
        }

        tokio::time::sleep(Duration::from_millis(args.cycle_delay_ms)).await;
    }

    tracing::info!("✅ Completed {} cycles", args.cycles);
}
