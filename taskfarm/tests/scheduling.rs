use std::{collections::BTreeSet, time::Duration};

use taskfarm::{farm, FarmConfig, Task, Workable};

#[derive(Debug, Clone, Copy)]
struct Job {
    id: u32,
    millis: u64,
}

impl Task for Job {}

#[derive(Debug, Clone, Copy)]
struct Sleeper;

impl Workable for Sleeper {
    type Task = Job;
    type Output = u32;

    async fn process(&self, task: &Job) -> u32 {
        tokio::time::sleep(Duration::from_millis(task.millis)).await;
        task.id
    }
}

fn jobs(count: u32, slow: Option<u32>) -> Vec<Job> {
    (0..count)
        .map(|id| Job {
            id,
            millis: if Some(id) == slow { 1_000 } else { 1 },
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn every_task_dispatched_exactly_once() {
    for participants in 2..=5 {
        let config = FarmConfig::new(participants).unwrap();
        let report = farm::run(&config, jobs(40, None), Sleeper).await.unwrap();

        let mut ids: Vec<u32> = report.outputs().copied().collect();
        ids.sort_unstable();
        assert_eq!(ids, (0..40).collect::<Vec<_>>());
        assert_eq!(report.task_count(), 40);
    }
}

#[tokio::test(start_paused = true)]
async fn every_worker_is_stopped_exactly_once() {
    let config = FarmConfig::new(5).unwrap();
    let report = farm::run(&config, jobs(17, None), Sleeper).await.unwrap();

    assert_eq!(report.stopped.len(), config.workers());
    let stopped: BTreeSet<_> = report.stopped.iter().copied().collect();
    assert_eq!(stopped, (1..=4).collect());

    // Every worker came back from its run, so each one saw the sentinel, and
    // nothing it processed went unaccounted for.
    assert_eq!(report.workers.len(), 4);
    for worker in &report.workers {
        assert_eq!(
            report.dispatched.get(&worker.pid).copied().unwrap_or_default(),
            worker.processed
        );
        let returned = report.results.iter().filter(|(pid, _)| *pid == worker.pid).count();
        assert_eq!(returned, worker.processed);
    }
}

#[tokio::test(start_paused = true)]
async fn slow_worker_is_not_given_more_work() {
    let config = FarmConfig::new(4).unwrap();
    let report = farm::run(&config, jobs(21, Some(0)), Sleeper).await.unwrap();

    let (slow, _) = report
        .results
        .iter()
        .find(|(_, id)| *id == 0)
        .copied()
        .unwrap();

    // The slow task is the head of the queue. Whoever picked it up stays
    // busy while the others drain the remaining twenty.
    assert_eq!(report.dispatched[&slow], 1);
    assert_eq!(report.task_count(), 21);

    // Its result arrives last, well after it was dispatched first.
    assert_eq!(report.results.last().map(|(_, id)| *id), Some(0));
}

#[tokio::test(start_paused = true)]
async fn single_worker_takes_everything() {
    let config = FarmConfig::new(2).unwrap();
    let report = farm::run(&config, jobs(5, None), Sleeper).await.unwrap();

    assert_eq!(report.dispatched.len(), 1);
    assert_eq!(report.dispatched[&1], 5);
    assert_eq!(report.outputs().copied().collect::<Vec<_>>(), vec![0, 1, 2, 3, 4]);
}
