use anyhow::Context;
use taskfarm::{
    collective::{self, partition},
    Communicator, FarmConfig, Pid, World,
};
use tokio::task::JoinSet;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const ROOT: Pid = 0;
const LEN: u32 = 20;
const ALPHA: f64 = 2.5;

/// One rank's share of `y <- alpha * x + y`.
///
/// The root owns both vectors, splits them evenly, and reassembles `y` from
/// the updated slices. Every other rank only ever sees its own slice.
async fn axpy(
    mut comm: Communicator<Vec<f64>>,
    vectors: Option<(Vec<f64>, Vec<f64>)>,
) -> anyhow::Result<Option<Vec<f64>>> {
    let size = comm.size();
    let rank = comm.rank();

    let alpha = collective::broadcast(&mut comm, ROOT, (rank == ROOT).then(|| vec![ALPHA]))
        .await?
        .first()
        .copied()
        .context("broadcast carried no coefficient")?;

    let (x_chunks, y_chunks) = match vectors {
        Some((x, y)) => {
            let ranges = partition(x.len(), size);
            let split = |v: &[f64]| -> Vec<Vec<f64>> {
                ranges.iter().map(|r| v[r.clone()].to_vec()).collect()
            };
            (Some(split(x.as_slice())), Some(split(y.as_slice())))
        }
        None => (None, None),
    };

    let x = collective::scatter(&mut comm, ROOT, x_chunks).await?;
    let mut y = collective::scatter(&mut comm, ROOT, y_chunks).await?;

    for (yi, xi) in y.iter_mut().zip(&x) {
        *yi += alpha * xi;
    }
    tracing::debug!(rank, len = y.len(), "updated slice");

    let gathered = collective::gather(&mut comm, ROOT, y).await?;
    Ok(gathered.map(|chunks| chunks.concat()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    tracing::info!("starting vector-update example...");

    let config = FarmConfig::from_env().context("invalid configuration")?;
    let world = World::new(config.participants());

    let x: Vec<f64> = (0..LEN).map(f64::from).collect();
    let y = vec![1.0; x.len()];

    let mut ranks = JoinSet::new();
    for comm in world.split() {
        let vectors = (comm.rank() == ROOT).then(|| (x.clone(), y.clone()));
        ranks.spawn(axpy(comm, vectors));
    }

    let mut updated = None;
    while let Some(joined) = ranks.join_next().await {
        if let Some(y) = joined.context("rank panicked")?? {
            updated = Some(y);
        }
    }

    let updated = updated.context("root returned no vector")?;
    println!("y <- {ALPHA} * x + y over {} participants", config.participants());
    println!("{updated:?}");

    Ok(())
}
