//! Primality testing over the task farm.
//!
//! Candidates are handed out one at a time, so expensive candidates do not
//! hold up a fixed slice of the range the way a static split would.
use std::collections::BTreeMap;

use crate::{
    config::FarmConfig,
    coordinator::Report,
    farm::{self, error::FarmError},
    worker::{Task, Workable},
    Pid,
};

/// Trial division by every `d` in `[2, floor(sqrt(n))]`.
///
/// Anything below 2, negative numbers included, is not prime.
pub fn is_prime(n: i64) -> bool {
    if n < 2 {
        return false;
    }

    // `d <= n / d` is `d * d <= n` without the overflow.
    let mut divisor = 2;
    while divisor <= n / divisor {
        if n % divisor == 0 {
            return false;
        }
        divisor += 1;
    }

    true
}

/// A number to test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Candidate(pub i64);

impl Task for Candidate {}

/// Outcome of testing a single candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub candidate: i64,
    pub prime: bool,
}

impl Verdict {
    pub fn of(candidate: i64) -> Self {
        Self {
            candidate,
            prime: is_prime(candidate),
        }
    }

    /// Sign-encoded form of the verdict: the candidate itself if it is
    /// prime, its negation otherwise.
    ///
    /// `None` for candidates below 2, whose sign already means something
    /// else. Negating them could read back as a prime.
    pub fn signed(&self) -> Option<i64> {
        match (self.candidate, self.prime) {
            (candidate, _) if candidate < 2 => None,
            (candidate, true) => Some(candidate),
            (candidate, false) => Some(-candidate),
        }
    }
}

/// Tests candidates for primality.
#[derive(Debug, Clone, Copy, Default)]
pub struct Primality;

impl Workable for Primality {
    type Task = Candidate;
    type Output = Verdict;

    async fn process(&self, task: &Candidate) -> Verdict {
        Verdict::of(task.0)
    }
}

/// Inclusive range of candidates. Empty when `lower > upper`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchRange {
    pub lower: i64,
    pub upper: i64,
}

impl SearchRange {
    pub fn new(lower: i64, upper: i64) -> Self {
        Self { lower, upper }
    }

    pub fn len(&self) -> usize {
        usize::try_from(i128::from(self.upper) - i128::from(self.lower) + 1).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn candidates(&self) -> impl Iterator<Item = Candidate> {
        (self.lower..=self.upper).map(Candidate)
    }
}

/// Result of a prime search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimeReport {
    /// Primes in the order their verdicts reached the coordinator.
    pub primes: Vec<i64>,

    /// Total number of verdicts collected, composites included.
    pub results: usize,

    pub dispatched: BTreeMap<Pid, usize>,
}

impl PrimeReport {
    /// Primes in ascending order.
    pub fn sorted(&self) -> Vec<i64> {
        let mut primes = self.primes.clone();
        primes.sort_unstable();
        primes
    }
}

impl From<Report<Verdict>> for PrimeReport {
    fn from(report: Report<Verdict>) -> Self {
        let primes = report
            .outputs()
            .filter(|verdict| verdict.prime)
            .map(|verdict| verdict.candidate)
            .collect();

        Self {
            primes,
            results: report.results.len(),
            dispatched: report.dispatched,
        }
    }
}

/// Finds every prime in `range` using the farm described by `config`.
#[tracing::instrument(skip(config), fields(participants = config.participants().get()))]
pub async fn search(config: &FarmConfig, range: SearchRange) -> Result<PrimeReport, FarmError> {
    let report = farm::run(config, range.candidates(), Primality).await?;
    let report = PrimeReport::from(report);

    tracing::info!(
        primes = report.primes.len(),
        results = report.results,
        "prime search complete"
    );

    Ok(report)
}
