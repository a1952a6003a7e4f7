//! Fixed-shape exchanges involving every participant of a world.
//!
//! These are linear: the root talks to each peer directly. They are meant for
//! bulk, evenly split work where nothing needs to be coordinated while the
//! computation runs.
use std::ops::Range;

use error::CollectiveError;

use crate::{
    transport::{Communicator, Source, Tag},
    Pid,
};

/// Distributes the root's `value` to every participant.
///
/// Only the root needs to pass `Some(value)`, everyone else may pass `None`.
/// Every participant, root included, gets the broadcast value back.
pub async fn broadcast<M: Clone>(
    comm: &mut Communicator<M>,
    root: Pid,
    value: Option<M>,
) -> Result<M, CollectiveError> {
    comm.check_rank(root)?;

    if comm.rank() != root {
        return Ok(comm.recv(Source::Rank(root), Tag::Broadcast).await?.payload);
    }

    let value = value.ok_or(CollectiveError::MissingRootValue { root })?;
    for peer in (0..comm.size()).filter(|&peer| peer != root) {
        comm.send(peer, Tag::Broadcast, value.clone())?;
    }

    Ok(value)
}

/// Combines one value per participant with `op` at the root.
///
/// Contributions are folded in rank order. The root gets `Some(aggregate)`,
/// every other participant gets `None`.
pub async fn reduce<M, F>(
    comm: &mut Communicator<M>,
    root: Pid,
    value: M,
    op: F,
) -> Result<Option<M>, CollectiveError>
where
    F: Fn(M, M) -> M,
{
    comm.check_rank(root)?;

    if comm.rank() != root {
        comm.send(root, Tag::Reduce, value)?;
        return Ok(None);
    }

    let mut own = Some(value);
    let mut aggregate = None;

    for peer in 0..comm.size() {
        let contribution = if peer == root {
            own.take()
        } else {
            Some(comm.recv(Source::Rank(peer), Tag::Reduce).await?.payload)
        };

        if let Some(contribution) = contribution {
            aggregate = Some(match aggregate.take() {
                Some(acc) => op(acc, contribution),
                None => contribution,
            });
        }
    }

    Ok(aggregate)
}

/// Hands chunk `i` of the root's `chunks` to rank `i`.
///
/// The root must supply exactly one chunk per participant.
pub async fn scatter<M>(
    comm: &mut Communicator<M>,
    root: Pid,
    chunks: Option<Vec<M>>,
) -> Result<M, CollectiveError> {
    comm.check_rank(root)?;

    if comm.rank() != root {
        return Ok(comm.recv(Source::Rank(root), Tag::Scatter).await?.payload);
    }

    let chunks = chunks.ok_or(CollectiveError::MissingRootValue { root })?;
    if chunks.len() != comm.size() {
        return Err(CollectiveError::ChunkCount {
            expected: comm.size(),
            actual: chunks.len(),
        });
    }

    let mut own = None;
    for (peer, chunk) in chunks.into_iter().enumerate() {
        if peer == root {
            own = Some(chunk);
        } else {
            comm.send(peer, Tag::Scatter, chunk)?;
        }
    }

    own.ok_or(CollectiveError::MissingRootValue { root })
}

/// Collects one value per participant at the root, ordered by rank.
pub async fn gather<M>(
    comm: &mut Communicator<M>,
    root: Pid,
    value: M,
) -> Result<Option<Vec<M>>, CollectiveError> {
    comm.check_rank(root)?;

    if comm.rank() != root {
        comm.send(root, Tag::Gather, value)?;
        return Ok(None);
    }

    let mut own = Some(value);
    let mut gathered = Vec::with_capacity(comm.size());

    for peer in 0..comm.size() {
        if peer == root {
            gathered.extend(own.take());
        } else {
            gathered.push(comm.recv(Source::Rank(peer), Tag::Gather).await?.payload);
        }
    }

    Ok(Some(gathered))
}

/// Splits `len` items into `parts` contiguous ranges whose sizes differ by at
/// most one. The first `len % parts` ranges carry the extra item.
pub fn partition(len: usize, parts: usize) -> Vec<Range<usize>> {
    if parts == 0 {
        return Vec::new();
    }

    let base = len / parts;
    let remainder = len % parts;

    let mut start = 0;
    (0..parts)
        .map(|part| {
            let end = start + base + usize::from(part < remainder);
            let range = start..end;
            start = end;
            range
        })
        .collect()
}

pub mod error {
    //! Collective related errors

    use thiserror::Error;

    use crate::{transport::error::TransportError, Pid};

    #[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
    pub enum CollectiveError {
        #[error(transparent)]
        Transport(#[from] TransportError),

        #[error("root {root} did not supply a value to distribute")]
        MissingRootValue { root: Pid },

        #[error("expected {expected} chunks, one per participant, got {actual}")]
        ChunkCount { expected: usize, actual: usize },
    }
}
