//! Wires a coordinator and its workers together over a fresh world and runs
//! them to completion.
use error::FarmError;
use tokio::task::JoinSet;

use crate::{
    config::FarmConfig,
    coordinator::{Coordinator, Report},
    transport::World,
    worker::{Workable, Worker},
};

/// Runs `tasks` through a farm of `config.workers()` workers, each applying
/// its own clone of `workable`.
///
/// The coordinator runs on the calling task, every worker gets a tokio task
/// of its own. A transport failure or a worker going down aborts the whole
/// run with an error, there is no retry.
pub async fn run<W>(
    config: &FarmConfig,
    tasks: impl IntoIterator<Item = W::Task>,
    workable: W,
) -> Result<Report<W::Output>, FarmError>
where
    W: Workable + Clone + 'static,
    W::Task: 'static,
    W::Output: 'static,
{
    let world = World::new(config.participants());
    tracing::info!(
        run_id = %world.run_id(),
        participants = world.size(),
        "starting task farm"
    );

    let (coordinator, comms) = world.split_root();
    let coordinator = Coordinator::<W>::new(coordinator, tasks)?;

    let mut workers = JoinSet::new();
    for comm in comms {
        workers.spawn(Worker::new(workable.clone(), comm).run());
    }

    let coordinator = coordinator.run();
    tokio::pin!(coordinator);

    let mut summaries = Vec::with_capacity(config.workers());

    // Workers normally finish before the coordinator does, since they stop
    // ahead of the collection phase. One that finishes with an error takes
    // the run down with it rather than leaving the coordinator waiting.
    let mut report = loop {
        tokio::select! {
            report = &mut coordinator => break report?,
            Some(joined) = workers.join_next() => summaries.push(joined??),
        }
    };

    while let Some(joined) = workers.join_next().await {
        summaries.push(joined??);
    }

    summaries.sort_by_key(|summary| summary.pid);
    report.workers = summaries;

    Ok(report)
}

pub mod error {
    //! Farm related errors

    use thiserror::Error;
    use tokio::task::JoinError;

    use crate::{
        config::error::ConfigError,
        transport::{error::TransportError, Tag},
        Pid,
    };

    #[derive(Debug, Error)]
    pub enum FarmError {
        #[error("transport failure: {0}")]
        Transport(#[from] TransportError),

        #[error("invalid configuration: {0}")]
        Config(#[from] ConfigError),

        #[error("unexpected {message} from {sender} on {tag}")]
        UnexpectedMessage {
            sender: Pid,
            tag: Tag,
            message: String,
        },

        #[error("coordinator must run on rank 0, got rank {rank}")]
        NotCoordinator { rank: Pid },

        #[error("worker task failed: {0}")]
        Join(#[from] JoinError),
    }
}
