use traj_store::{StepAccess, TrajResult};

use crate::analysis::Analysis;

/// Mean squared displacement from the first step of the window.
#[derive(Clone, Debug, Default)]
pub struct MsdPlan;

#[derive(Clone, Debug, PartialEq)]
pub struct MsdOutput {
    /// Elapsed time since the window start.
    pub time: Vec<f64>,
    /// One series per atom type, in type order.
    pub per_type: Vec<Vec<f64>>,
    pub total: Vec<f64>,
}

impl MsdPlan {
    pub fn new() -> Self {
        Self
    }
}

impl Analysis for MsdPlan {
    type Output = MsdOutput;

    fn name(&self) -> &'static str {
        "msd"
    }

    fn run<S>(&self, traj: &S, tbegin: usize, tend: usize) -> TrajResult<MsdOutput>
    where
        S: StepAccess + ?Sized,
    {
        let window = traj.check_times(tbegin, tend)?;
        let path = traj.unwrapped_xcart(window)?;
        let species = traj.species();
        let ntypes = species.ntypes();
        let natom = traj.natom();
        let type_counts: Vec<usize> = (0..ntypes)
            .map(|ty| species.atoms_of_type(ty).len())
            .collect();
        let t0 = traj.time(window.begin)?;

        let mut time = Vec::with_capacity(window.len());
        let mut per_type = vec![Vec::with_capacity(window.len()); ntypes];
        let mut total = Vec::with_capacity(window.len());
        let origin = &path[0];
        for (lag, frame) in path.iter().enumerate() {
            time.push(traj.time(window.begin + lag)? - t0);
            let mut sums = vec![0.0f64; ntypes];
            let mut all = 0.0f64;
            for (atom, (x, x0)) in frame.iter().zip(origin.iter()).enumerate() {
                let d2 = (0..3).map(|k| (x[k] - x0[k]).powi(2)).sum::<f64>();
                sums[species.typat()[atom]] += d2;
                all += d2;
            }
            for (ty, series) in per_type.iter_mut().enumerate() {
                let n = type_counts[ty];
                series.push(if n > 0 { sums[ty] / n as f64 } else { 0.0 });
            }
            total.push(if natom > 0 { all / natom as f64 } else { 0.0 });
        }
        Ok(MsdOutput {
            time,
            per_type,
            total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use traj_store::{Snapshot, Species, Trajectory};

    #[test]
    fn ballistic_atom_crossing_the_box() {
        // One atom moves 1.5 per step in a box of 4 and wraps around.
        let species = Species::from_znucl_per_atom(&[1, 8]);
        let rprimd = [[4.0, 0.0, 0.0], [0.0, 4.0, 0.0], [0.0, 0.0, 4.0]];
        let snaps = (0..5)
            .map(|t| {
                let x = (0.5 + 1.5 * t as f64).rem_euclid(4.0);
                Snapshot::from_cartesian([1.0; 3], rprimd, vec![[x, 0.0, 0.0], [2.0, 2.0, 2.0]], t as f64)
                    .unwrap()
            })
            .collect();
        let traj = Trajectory::from_snapshots(species, true, snaps).unwrap();
        let out = MsdPlan::new().run(&traj, 0, 5).unwrap();
        assert_eq!(out.total[0], 0.0);
        assert_eq!(out.per_type[0][0], 0.0);
        for t in 0..5 {
            let expected = (1.5 * t as f64).powi(2);
            assert!((out.per_type[0][t] - expected).abs() < 1e-9);
            assert!(out.per_type[1][t].abs() < 1e-12);
            assert!((out.total[t] - expected / 2.0).abs() < 1e-9);
        }
        assert_eq!(out.time, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn later_window_starts_at_zero() {
        let species = Species::from_znucl_per_atom(&[1]);
        let rprimd = [[10.0, 0.0, 0.0], [0.0, 10.0, 0.0], [0.0, 0.0, 10.0]];
        let snaps = (0..4)
            .map(|t| Snapshot::from_cartesian([1.0; 3], rprimd, vec![[t as f64, 0.0, 0.0]], t as f64).unwrap())
            .collect();
        let traj = Trajectory::from_snapshots(species, false, snaps).unwrap();
        let out = MsdPlan::new().run(&traj, 2, 4).unwrap();
        assert_eq!(out.total, vec![0.0, 1.0]);
    }
}
