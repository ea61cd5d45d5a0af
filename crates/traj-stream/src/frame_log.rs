//! Append-only snapshot storage with a single writer and lock-free readers.
//!
//! Storage is split into segments of doubling size, allocated on first use,
//! so slots never move once written. Each slot is written exactly once and
//! published by bumping `len` with `Release` ordering; readers load `len`
//! with `Acquire` before touching a slot.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

use traj_store::{Snapshot, TrajError, TrajResult};

const FIRST_SEGMENT: usize = 64;
const MAX_SEGMENTS: usize = 40;

type Segment = Box<[OnceLock<Snapshot>]>;

pub(crate) struct FrameLog {
    segments: Vec<OnceLock<Segment>>,
    len: AtomicUsize,
}

fn locate(index: usize) -> (usize, usize) {
    let bucket = index / FIRST_SEGMENT + 1;
    let segment = (usize::BITS - 1 - bucket.leading_zeros()) as usize;
    let offset = index - FIRST_SEGMENT * ((1usize << segment) - 1);
    (segment, offset)
}

impl FrameLog {
    pub(crate) fn new() -> Self {
        Self {
            segments: (0..MAX_SEGMENTS).map(|_| OnceLock::new()).collect(),
            len: AtomicUsize::new(0),
        }
    }

    /// Number of published snapshots.
    pub(crate) fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    pub(crate) fn get(&self, index: usize) -> Option<&Snapshot> {
        if index >= self.len() {
            return None;
        }
        let (segment, offset) = locate(index);
        self.segments[segment].get()?.get(offset)?.get()
    }

    /// Write the next slot, then publish it. Must only be called from the
    /// single loader thread.
    pub(crate) fn push(&self, snapshot: Snapshot) -> TrajResult<usize> {
        let index = self.len.load(Ordering::Relaxed);
        let (segment, offset) = locate(index);
        let slots = self
            .segments
            .get(segment)
            .ok_or_else(|| TrajError::Invalid(format!("frame log full at {index} steps")))?
            .get_or_init(|| {
                (0..FIRST_SEGMENT << segment)
                    .map(|_| OnceLock::new())
                    .collect()
            });
        slots[offset]
            .set(snapshot)
            .map_err(|_| TrajError::Invalid(format!("slot {index} written twice")))?;
        Ok(self.len.fetch_add(1, Ordering::Release) + 1)
    }
}
