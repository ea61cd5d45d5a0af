use traj_store::{StepAccess, TrajResult};

/// A windowed, read-only computation over a trajectory.
///
/// `run` validates `[tbegin, tend)` with `check_times` before touching any
/// step and never mutates the store. Any [`StepAccess`] works as input, so a
/// store that is still loading can be analysed over its committed prefix
/// without copying it.
pub trait Analysis {
    type Output;

    fn name(&self) -> &'static str;

    fn run<S>(&self, traj: &S, tbegin: usize, tend: usize) -> TrajResult<Self::Output>
    where
        S: StepAccess + ?Sized;

    /// Run over every step of `traj`.
    fn run_all<S>(&self, traj: &S) -> TrajResult<Self::Output>
    where
        S: StepAccess + ?Sized,
    {
        self.run(traj, 0, traj.ntime())
    }
}
