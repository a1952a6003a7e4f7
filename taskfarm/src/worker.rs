use std::{fmt::Debug, future::Future};

use crate::{
    farm::error::FarmError,
    message::Message,
    transport::{Communicator, Source, Tag},
    Pid, COORDINATOR,
};

/// Marker for a unit of work handed out by the coordinator.
pub trait Task: Send + Sync {}

/// The computation a worker applies to every task it pulls.
///
/// `process` takes `&self` so that whatever configuration the computation
/// needs travels with the worker value instead of living in global state.
pub trait Workable: Debug + Send + Sync + Sized {
    type Task: Task + Debug;
    type Output: Send + Debug;

    fn process(&self, task: &Self::Task) -> impl Future<Output = Self::Output> + Send;
}

/// Message exchanged by a farm running `W`.
pub type FarmMessage<W> = Message<<W as Workable>::Task, <W as Workable>::Output>;

/// Communicator carrying [`FarmMessage`]s.
pub type FarmCommunicator<W> = Communicator<FarmMessage<W>>;

/// What a worker reports once it has been stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSummary {
    pub pid: Pid,
    pub processed: usize,
}

/// A long-lived worker that pulls one task at a time from the coordinator
/// until it is handed the stop sentinel.
#[derive(Debug)]
pub struct Worker<W: Workable> {
    pid: Pid,
    workable: W,
    comm: FarmCommunicator<W>,
}

impl<W: Workable> Worker<W> {
    pub fn new(workable: W, comm: FarmCommunicator<W>) -> Self {
        Self {
            pid: comm.rank(),
            workable,
            comm,
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    #[tracing::instrument(skip(self), fields(worker_id = self.pid, run_id = %self.comm.run_id()))]
    pub async fn run(mut self) -> Result<WorkerSummary, FarmError> {
        let mut processed = 0;
        let mut state = State::Idle;

        loop {
            tracing::trace!("entering state {state:?}");

            state = match state {
                State::Idle => {
                    self.comm.send(COORDINATOR, Tag::Ready, Message::Ready)?;
                    State::AwaitingAssignment
                }
                State::AwaitingAssignment => {
                    let envelope = self
                        .comm
                        .recv(Source::Rank(COORDINATOR), Tag::Assignment)
                        .await?;

                    match envelope.payload {
                        Message::Task(task) => State::Processing { task },
                        Message::Stop => State::Stopped,
                        other => {
                            return Err(FarmError::UnexpectedMessage {
                                sender: envelope.source,
                                tag: envelope.tag,
                                message: format!("{other:?}"),
                            })
                        }
                    }
                }
                State::Processing { task } => {
                    let output = self.workable.process(&task).await;
                    tracing::trace!("processed {task:?} into {output:?}");

                    self.comm
                        .send(COORDINATOR, Tag::Result, Message::Complete(output))?;
                    processed += 1;

                    State::Idle
                }
                State::Stopped => {
                    tracing::debug!(processed, "received stop sentinel from coordinator");

                    return Ok(WorkerSummary {
                        pid: self.pid,
                        processed,
                    });
                }
            };
        }
    }
}

#[derive(Debug)]
enum State<T> {
    Idle,
    AwaitingAssignment,
    Processing { task: T },
    Stopped,
}

// The worker life cycle. Sends are eager, so a ready signal moves the worker
// straight from IDLE into waiting on the coordinator.
//
//         ┌──────────┐     ready      ┌────────────┐
//         │          ├────────────────►            │
//         │   IDLE   │                │  AWAITING  │
//         │          │                │            │
//         └────▲─────┘                └──┬──────┬──┘
//              │                   task  │      │ stop
//              │ result sent  ┌──────────▼─┐ ┌──▼───────┐
//              └──────────────┤ PROCESSING │ │ STOPPED  │
//                             └────────────┘ └──────────┘
//
// STOPPED is terminal and is only ever entered through the sentinel.
