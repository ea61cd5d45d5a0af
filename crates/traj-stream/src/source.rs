use std::collections::VecDeque;

use traj_store::{Snapshot, Species, TrajError, TrajResult, Trajectory};

/// Static description of a source, known before the first snapshot.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceHeader {
    pub species: Species,
    pub periodic: bool,
    pub ntime_hint: Option<usize>,
}

/// Yields snapshots one at a time. Implemented once per backing format.
pub trait SourceReader {
    fn header(&self) -> &SourceHeader;

    /// Next snapshot, `Ok(None)` at a clean end of stream.
    fn next_snapshot(&mut self) -> TrajResult<Option<Snapshot>>;

    /// Label used in logs and progress events.
    fn describe(&self) -> String {
        "source".into()
    }
}

/// Drain a source into an owned trajectory.
pub fn read_all(source: &mut dyn SourceReader) -> TrajResult<Trajectory> {
    let header = source.header().clone();
    let mut traj = Trajectory::new(header.species, header.periodic);
    while let Some(snap) = source.next_snapshot()? {
        traj.push(snap)?;
    }
    Ok(traj)
}

/// Source over snapshots already in memory, optionally failing at a given
/// index to mimic a truncated or corrupt file.
#[derive(Debug)]
pub struct MemorySource {
    header: SourceHeader,
    pending: VecDeque<Snapshot>,
    served: usize,
    fail_at: Option<usize>,
}

impl MemorySource {
    pub fn new(species: Species, periodic: bool, snapshots: Vec<Snapshot>) -> Self {
        let ntime_hint = Some(snapshots.len());
        Self {
            header: SourceHeader {
                species,
                periodic,
                ntime_hint,
            },
            pending: snapshots.into(),
            served: 0,
            fail_at: None,
        }
    }

    pub fn from_trajectory(traj: &Trajectory) -> Self {
        Self::new(
            traj.species().clone(),
            traj.is_periodic(),
            traj.snapshots().to_vec(),
        )
    }

    /// Report a parse failure instead of snapshot `index`.
    pub fn failing_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }
}

impl SourceReader for MemorySource {
    fn header(&self) -> &SourceHeader {
        &self.header
    }

    fn next_snapshot(&mut self) -> TrajResult<Option<Snapshot>> {
        if self.fail_at == Some(self.served) {
            return Err(TrajError::ParseFailure(format!(
                "corrupt record at snapshot {}",
                self.served
            )));
        }
        let next = self.pending.pop_front();
        if next.is_some() {
            self.served += 1;
        }
        Ok(next)
    }

    fn describe(&self) -> String {
        format!("memory[{}]", self.header.ntime_hint.unwrap_or(0))
    }
}
