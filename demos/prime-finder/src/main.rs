use anyhow::Context;
use taskfarm::{
    primes::{self, SearchRange},
    FarmConfig,
};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const LOWER: i64 = 2;
const UPPER: i64 = 100;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    tracing::info!("starting prime-finder example...");

    let config = FarmConfig::from_env().context("invalid farm configuration")?;
    let range = SearchRange::new(LOWER, UPPER);

    let report = primes::search(&config, range)
        .await
        .context("prime search failed")?;

    println!(
        "searched [{LOWER}, {UPPER}] with {workers} workers",
        workers = config.workers()
    );
    for (worker, tasks) in &report.dispatched {
        println!("  worker {worker} tested {tasks} candidates");
    }
    println!("primes as they arrived: {:?}", report.primes);
    println!("primes in order: {:?}", report.sorted());
    println!("collected {} results", report.results);

    Ok(())
}
