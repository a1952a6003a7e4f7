use anyhow::Context;
use taskfarm::{collective, Communicator, FarmConfig, Pid, World};
use tokio::task::JoinSet;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const ROOT: Pid = 0;
const INTERVALS: u32 = 1_000_000;

#[derive(Debug, Clone, Copy)]
enum Value {
    Intervals(u32),
    Partial(f64),
}

fn add(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Partial(a), Value::Partial(b)) => Value::Partial(a + b),
        (Value::Partial(a), _) | (_, Value::Partial(a)) => Value::Partial(a),
        (a, Value::Intervals(_)) => a,
    }
}

/// Midpoint rule for the integral of `4 / (1 + x^2)` over `[0, 1]`, each
/// rank taking every `size`-th interval starting at its own rank.
async fn estimate(mut comm: Communicator<Value>) -> anyhow::Result<Option<f64>> {
    let root_value = (comm.rank() == ROOT).then_some(Value::Intervals(INTERVALS));
    let Value::Intervals(intervals) = collective::broadcast(&mut comm, ROOT, root_value).await? else {
        anyhow::bail!("expected the interval count from the root");
    };

    let width = 1.0 / f64::from(intervals);
    let step = u32::try_from(comm.size()).context("too many participants")?;
    let start = u32::try_from(comm.rank()).context("rank out of range")?;

    let mut sum = 0.0;
    let mut i = start;
    while i < intervals {
        let x = width * (f64::from(i) + 0.5);
        sum += 4.0 / (1.0 + x * x);
        i += step;
    }

    let total = collective::reduce(&mut comm, ROOT, Value::Partial(width * sum), add).await?;

    Ok(total.and_then(|total| match total {
        Value::Partial(pi) => Some(pi),
        Value::Intervals(_) => None,
    }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    tracing::info!("starting pi-integral example...");

    let config = FarmConfig::from_env().context("invalid configuration")?;
    let world = World::new(config.participants());

    let mut ranks = JoinSet::new();
    for comm in world.split() {
        ranks.spawn(estimate(comm));
    }

    let mut pi = None;
    while let Some(joined) = ranks.join_next().await {
        if let Some(estimate) = joined.context("rank panicked")?? {
            pi = Some(estimate);
        }
    }

    let pi = pi.context("root returned no estimate")?;
    println!(
        "pi is approximately {pi:.16}, error {:.2e}",
        (pi - std::f64::consts::PI).abs()
    );

    Ok(())
}
