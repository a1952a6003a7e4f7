use std::collections::{BTreeMap, VecDeque};

use crate::{
    config::error::ConfigError,
    farm::error::FarmError,
    message::Message,
    transport::{Source, Tag},
    worker::{FarmCommunicator, Workable, WorkerSummary},
    Pid, COORDINATOR,
};

/// Outcome of a farm run, as seen from the coordinator.
#[derive(Debug)]
pub struct Report<O> {
    /// Every output paired with the worker that produced it, in the order
    /// the outputs arrived. This is not the order tasks were handed out in.
    pub results: Vec<(Pid, O)>,

    /// Number of tasks handed to each worker.
    pub dispatched: BTreeMap<Pid, usize>,

    /// Workers in the order they were sent the stop sentinel.
    pub stopped: Vec<Pid>,

    /// Filled in once every worker task has been joined, ordered by pid.
    pub workers: Vec<WorkerSummary>,
}

impl<O> Report<O> {
    fn new() -> Self {
        Self {
            results: Vec::new(),
            dispatched: BTreeMap::new(),
            stopped: Vec::new(),
            workers: Vec::new(),
        }
    }

    /// Total number of tasks dispatched over the run.
    pub fn task_count(&self) -> usize {
        self.dispatched.values().sum()
    }

    pub fn outputs(&self) -> impl Iterator<Item = &O> {
        self.results.iter().map(|(_, output)| output)
    }
}

/// Owns the task queue and answers worker requests until the queue is empty.
///
/// A run goes through three phases, strictly one after the other:
///
/// 1. dispatch: answer each ready signal with the next task;
/// 2. shutdown: answer one more ready signal per worker with the sentinel;
/// 3. collect: receive one result per dispatched task.
///
/// Workers pull, so a slow worker simply asks less often and the queue never
/// needs locking since nothing but the coordinator touches it.
#[derive(Debug)]
pub struct Coordinator<W: Workable> {
    comm: FarmCommunicator<W>,
    queue: VecDeque<W::Task>,
    report: Report<W::Output>,
}

impl<W: Workable> Coordinator<W> {
    /// Fails unless `comm` is rank [`COORDINATOR`] of a world that has at
    /// least one worker. Either mistake would otherwise leave the run waiting
    /// on ready signals that never come.
    pub fn new(
        comm: FarmCommunicator<W>,
        tasks: impl IntoIterator<Item = W::Task>,
    ) -> Result<Self, FarmError> {
        if comm.rank() != COORDINATOR {
            return Err(FarmError::NotCoordinator { rank: comm.rank() });
        }

        if comm.size() < 2 {
            return Err(ConfigError::TooFewParticipants {
                participants: comm.size(),
            }
            .into());
        }

        Ok(Self {
            comm,
            queue: tasks.into_iter().collect(),
            report: Report::new(),
        })
    }

    /// Number of tasks still waiting to be dispatched.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    #[tracing::instrument(skip(self), fields(run_id = %self.comm.run_id(), tasks = self.queue.len()))]
    pub async fn run(mut self) -> Result<Report<W::Output>, FarmError> {
        self.dispatch().await?;
        self.shutdown().await?;
        self.collect().await?;

        tracing::info!(
            results = self.report.results.len(),
            workers = self.report.stopped.len(),
            "coordinator finished"
        );

        Ok(self.report)
    }

    async fn dispatch(&mut self) -> Result<(), FarmError> {
        tracing::debug!(tasks = self.queue.len(), "dispatch phase");

        while !self.queue.is_empty() {
            let worker = self.next_ready().await?;

            if let Some(task) = self.queue.pop_front() {
                tracing::trace!(worker, "dispatching {task:?}");
                self.comm.send(worker, Tag::Assignment, Message::Task(task))?;
                *self.report.dispatched.entry(worker).or_default() += 1;
            }
        }

        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), FarmError> {
        let workers = self.comm.size() - 1;
        tracing::debug!(workers, "shutdown phase");

        // NOTE(jdb): This relies on every worker asking exactly once more
        // after its last task. A worker that never asks again stalls us here.
        for _ in 0..workers {
            let worker = self.next_ready().await?;

            tracing::trace!(worker, "sending stop sentinel");
            self.comm.send(worker, Tag::Assignment, Message::Stop)?;
            self.report.stopped.push(worker);
        }

        Ok(())
    }

    async fn collect(&mut self) -> Result<(), FarmError> {
        let expected = self.report.task_count();
        tracing::debug!(expected, "collection phase");

        for _ in 0..expected {
            let envelope = self.comm.recv(Source::Any, Tag::Result).await?;

            match envelope.payload {
                Message::Complete(output) => self.report.results.push((envelope.source, output)),
                other => {
                    return Err(FarmError::UnexpectedMessage {
                        sender: envelope.source,
                        tag: envelope.tag,
                        message: format!("{other:?}"),
                    })
                }
            }
        }

        Ok(())
    }

    /// Waits for a ready signal from whichever worker asks first.
    async fn next_ready(&mut self) -> Result<Pid, FarmError> {
        let envelope = self.comm.recv(Source::Any, Tag::Ready).await?;

        match envelope.payload {
            Message::Ready => Ok(envelope.source),
            other => Err(FarmError::UnexpectedMessage {
                sender: envelope.source,
                tag: envelope.tag,
                message: format!("{other:?}"),
            }),
        }
    }
}

#[cfg(test)]
mod test {
    use std::num::NonZeroUsize;

    use super::*;
    use crate::{
        transport::{Communicator, World},
        worker::Task,
    };

    #[derive(Debug)]
    struct Echo;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Job(u8);

    impl Task for Job {}

    impl Workable for Echo {
        type Task = Job;
        type Output = u8;

        async fn process(&self, task: &Job) -> u8 {
            task.0
        }
    }

    type Comm = Communicator<Message<Job, u8>>;

    fn world(size: usize) -> (Comm, Vec<Comm>) {
        let mut comms = World::new(NonZeroUsize::new(size).unwrap()).split();
        let workers = comms.split_off(1);
        (comms.pop().unwrap(), workers)
    }

    async fn assignment(worker: &mut Comm) -> Message<Job, u8> {
        worker.recv(Source::Rank(0), Tag::Assignment).await.unwrap().payload
    }

    #[tokio::test]
    async fn tasks_go_to_whoever_asks_first() {
        let (comm, mut workers) = world(3);
        let coordinator = Coordinator::<Echo>::new(comm, [Job(1), Job(2), Job(3)]).unwrap();
        assert_eq!(coordinator.pending(), 3);
        let handle = tokio::spawn(coordinator.run());

        // Worker 2 asks first and gets the head of the queue.
        workers[1].send(0, Tag::Ready, Message::Ready).unwrap();
        assert_eq!(assignment(&mut workers[1]).await, Message::Task(Job(1)));

        workers[0].send(0, Tag::Ready, Message::Ready).unwrap();
        assert_eq!(assignment(&mut workers[0]).await, Message::Task(Job(2)));

        // Worker 2 is back before worker 1 has finished.
        workers[1].send(0, Tag::Result, Message::Complete(1)).unwrap();
        workers[1].send(0, Tag::Ready, Message::Ready).unwrap();
        assert_eq!(assignment(&mut workers[1]).await, Message::Task(Job(3)));

        // Queue is empty, every further request is answered with the sentinel.
        workers[1].send(0, Tag::Result, Message::Complete(3)).unwrap();
        workers[1].send(0, Tag::Ready, Message::Ready).unwrap();
        assert_eq!(assignment(&mut workers[1]).await, Message::Stop);

        workers[0].send(0, Tag::Result, Message::Complete(2)).unwrap();
        workers[0].send(0, Tag::Ready, Message::Ready).unwrap();
        assert_eq!(assignment(&mut workers[0]).await, Message::Stop);

        let report = handle.await.unwrap().unwrap();
        assert_eq!(report.results, vec![(2, 1), (2, 3), (1, 2)]);
        assert_eq!(report.dispatched, BTreeMap::from([(1, 1), (2, 2)]));
        assert_eq!(report.stopped, vec![2, 1]);
        assert_eq!(report.task_count(), 3);
        assert_eq!(report.outputs().copied().collect::<Vec<_>>(), vec![1, 3, 2]);
    }

    #[tokio::test]
    async fn empty_queue_only_sends_sentinels() {
        let (comm, mut workers) = world(4);
        let handle = tokio::spawn(Coordinator::<Echo>::new(comm, []).unwrap().run());

        for worker in &mut workers {
            worker.send(0, Tag::Ready, Message::Ready).unwrap();
            assert_eq!(assignment(worker).await, Message::Stop);
        }

        let report = handle.await.unwrap().unwrap();
        assert!(report.results.is_empty());
        assert_eq!(report.task_count(), 0);
        assert_eq!(report.stopped, vec![1, 2, 3]);
    }

    #[test]
    fn only_rank_zero_can_coordinate() {
        let (_, mut workers) = world(3);

        let err = Coordinator::<Echo>::new(workers.pop().unwrap(), [Job(1)]).unwrap_err();
        assert!(matches!(err, FarmError::NotCoordinator { rank: 2 }));
    }

    #[test]
    fn coordinator_without_workers_is_rejected() {
        let (comm, workers) = world(1);
        assert!(workers.is_empty());

        let err = Coordinator::<Echo>::new(comm, [Job(1)]).unwrap_err();
        assert!(matches!(
            err,
            FarmError::Config(ConfigError::TooFewParticipants { participants: 1 })
        ));
    }

    #[tokio::test]
    async fn ready_tag_with_wrong_payload_is_rejected() {
        let (comm, workers) = world(2);
        let handle = tokio::spawn(Coordinator::<Echo>::new(comm, [Job(1)]).unwrap().run());

        workers[0].send(0, Tag::Ready, Message::Stop).unwrap();

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            FarmError::UnexpectedMessage {
                sender: 1,
                tag: Tag::Ready,
                ..
            }
        ));
    }
}
