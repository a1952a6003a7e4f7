//! Point-to-point message passing between the participants of a run.
//!
//! Every participant owns a [`Communicator`] with a single inbox that all of
//! its peers write into. A receive filters on the sender and the tag, anything
//! that arrives but does not match is parked under its tag and handed out
//! later, in arrival order, to the first receive that asks for it.
use std::{
    collections::{HashMap, VecDeque},
    fmt, iter,
    num::NonZeroUsize,
    sync::Arc,
};

use error::TransportError;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

use crate::Pid;

/// Type tag carried by every message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    /// Worker announcing that it is ready for its next assignment.
    Ready,
    /// Coordinator handing out a task or the stop sentinel.
    Assignment,
    /// Worker returning the output of a task.
    Result,
    Broadcast,
    Reduce,
    Scatter,
    Gather,
}

impl fmt::Display for Tag {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Tag::Ready => "ready",
            Tag::Assignment => "assignment",
            Tag::Result => "result",
            Tag::Broadcast => "broadcast",
            Tag::Reduce => "reduce",
            Tag::Scatter => "scatter",
            Tag::Gather => "gather",
        };

        fmt.write_str(name)
    }
}

/// Which sender a receive is willing to match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Wildcard, the first matching message from anyone.
    Any,
    Rank(Pid),
}

impl Source {
    fn matches(self, pid: Pid) -> bool {
        match self {
            Source::Any => true,
            Source::Rank(rank) => rank == pid,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Envelope<M> {
    pub source: Pid,
    pub tag: Tag,
    pub payload: M,
}

impl<M> Envelope<M> {
    fn matches(&self, source: Source, tag: Tag) -> bool {
        self.tag == tag && source.matches(self.source)
    }
}

/// A fixed group of connected participants.
///
/// The world is built once up front and then split into one
/// [`Communicator`] per rank, each of which can be moved onto its own task.
pub struct World<M> {
    run_id: Uuid,
    root: Communicator<M>,
    others: Vec<Communicator<M>>,
}

impl<M> fmt::Debug for World<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("run_id", &self.run_id)
            .field("size", &self.size())
            .finish()
    }
}

impl<M> World<M> {
    pub fn new(size: NonZeroUsize) -> Self {
        let run_id = Uuid::new_v4();

        // Rank 0 always exists, the remaining `size - 1` ranks may not.
        let (root_tx, root_inbox) = mpsc::unbounded_channel();
        let (senders, inboxes): (Vec<_>, Vec<_>) =
            (1..size.get()).map(|_| mpsc::unbounded_channel()).unzip();
        let peers: Arc<[UnboundedSender<Envelope<M>>]> =
            iter::once(root_tx).chain(senders).collect();

        let communicator = |rank, inbox| Communicator {
            rank,
            run_id,
            peers: Arc::clone(&peers),
            inbox,
            parked: HashMap::new(),
        };

        let root = communicator(0, root_inbox);
        let others = inboxes
            .into_iter()
            .enumerate()
            .map(|(index, inbox)| communicator(index + 1, inbox))
            .collect();

        Self {
            run_id,
            root,
            others,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn size(&self) -> usize {
        self.others.len() + 1
    }

    /// Hands out the communicators, ordered by rank.
    pub fn split(self) -> Vec<Communicator<M>> {
        iter::once(self.root).chain(self.others).collect()
    }

    /// Hands out rank 0 on its own, followed by every other rank in order.
    pub fn split_root(self) -> (Communicator<M>, Vec<Communicator<M>>) {
        (self.root, self.others)
    }
}

/// One participant's view of the world: its identity, a handle to every
/// peer's inbox and its own inbox.
pub struct Communicator<M> {
    rank: Pid,
    run_id: Uuid,
    peers: Arc<[UnboundedSender<Envelope<M>>]>,
    inbox: UnboundedReceiver<Envelope<M>>,

    // Messages that arrived while a receive was waiting on something else,
    // one queue per tag. Each queue is kept in arrival order so that ordering
    // between a fixed pair of participants is never reshuffled, and a
    // wildcard receive only ever looks at the front of its own tag's queue.
    parked: HashMap<Tag, VecDeque<Envelope<M>>>,
}

impl<M> fmt::Debug for Communicator<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Communicator")
            .field("rank", &self.rank)
            .field("size", &self.peers.len())
            .field("parked", &self.parked.values().map(VecDeque::len).sum::<usize>())
            .finish_non_exhaustive()
    }
}

impl<M> Drop for Communicator<M> {
    fn drop(&mut self) {
        // NOTE(jdb): Perform clean shutdown as recommended by tokio
        //
        // https://docs.rs/tokio/latest/tokio/sync/mpsc/index.html#clean-shutdown
        self.inbox.close();
        while self.inbox.try_recv().is_ok() {}
    }
}

impl<M> Communicator<M> {
    pub fn rank(&self) -> Pid {
        self.rank
    }

    pub fn size(&self) -> usize {
        self.peers.len()
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Fails if `rank` does not name a participant of this world.
    pub fn check_rank(&self, rank: Pid) -> Result<(), TransportError> {
        if rank < self.size() {
            Ok(())
        } else {
            Err(TransportError::UnknownRank {
                rank,
                size: self.size(),
            })
        }
    }

    /// Sends `payload` to `dest`.
    ///
    /// Sends are eager: the message is buffered in the destination's inbox
    /// and the call returns immediately, whether or not the destination is
    /// currently receiving.
    pub fn send(&self, dest: Pid, tag: Tag, payload: M) -> Result<(), TransportError> {
        self.check_rank(dest)?;

        tracing::trace!(dest, %tag, "sending message");

        let envelope = Envelope {
            source: self.rank,
            tag,
            payload,
        };

        self.peers[dest]
            .send(envelope)
            .map_err(|_| TransportError::Disconnected { rank: dest })
    }

    /// Blocks until a message with `tag` from `source` is available.
    ///
    /// With [`Source::Any`] the returned envelope names the actual sender.
    pub async fn recv(&mut self, source: Source, tag: Tag) -> Result<Envelope<M>, TransportError> {
        if let Some(envelope) = self.take_parked(source, tag) {
            return Ok(envelope);
        }

        loop {
            let envelope = self.inbox.recv().await.ok_or(TransportError::Closed)?;

            if envelope.matches(source, tag) {
                tracing::trace!(source = envelope.source, %tag, "received message");
                return Ok(envelope);
            }

            tracing::trace!(
                source = envelope.source,
                tag = %envelope.tag,
                "parking message until a matching receive"
            );
            self.parked.entry(envelope.tag).or_default().push_back(envelope);
        }
    }

    fn take_parked(&mut self, source: Source, tag: Tag) -> Option<Envelope<M>> {
        let queue = self.parked.get_mut(&tag)?;

        match source {
            Source::Any => queue.pop_front(),
            Source::Rank(rank) => {
                let index = queue.iter().position(|e| e.source == rank)?;
                queue.remove(index)
            }
        }
    }
}

pub mod error {
    //! Transport related errors

    use thiserror::Error;

    use crate::Pid;

    #[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
    pub enum TransportError {
        #[error("rank {rank} is outside of a world of size {size}")]
        UnknownRank { rank: Pid, size: usize },

        #[error("participant {rank} has gone away")]
        Disconnected { rank: Pid },

        #[error("inbox closed while waiting for a message")]
        Closed,
    }
}
