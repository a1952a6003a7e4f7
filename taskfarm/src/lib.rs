pub mod collective;
pub mod config;
pub mod coordinator;
pub mod farm;
pub mod message;
pub mod primes;
pub mod transport;
pub mod worker;

pub use crate::{
    config::FarmConfig,
    coordinator::{Coordinator, Report},
    message::Message,
    transport::{Communicator, Envelope, Source, Tag, World},
    worker::{Task, Workable, Worker, WorkerSummary},
};

// NOTE(jdb): Messages always carry the Pid of their sender -- a rank within
// the world, following Erlang's message format. Rank 0 is reserved for the
// coordinator.
pub type Pid = usize;

/// Rank of the participant that owns the task queue.
pub const COORDINATOR: Pid = 0;
