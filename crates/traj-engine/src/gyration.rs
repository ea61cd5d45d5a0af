use nalgebra::Matrix3;
use log::debug;
use traj_store::{center_of_geometry, StepAccess, TrajError, TrajResult};

use crate::analysis::Analysis;

/// How atoms are grouped for the gyration tensor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GyrationGroups {
    /// One group per atom type that has atoms.
    ByType,
    /// One group per image replica; nothing for an empty store.
    ImageReplicas,
    /// A single explicit group.
    Atoms(Vec<usize>),
}

#[derive(Clone, Debug)]
pub struct GyrationPlan {
    groups: GyrationGroups,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GyrationTensor {
    pub tensor: [[f64; 3]; 3],
    /// Eigenvalues of `tensor`, ascending.
    pub principal: [f64; 3],
    pub rg: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GyrationOutput {
    pub groups: Vec<Vec<usize>>,
    /// `frames[step][group]`.
    pub frames: Vec<Vec<GyrationTensor>>,
}

impl GyrationPlan {
    pub fn new(groups: GyrationGroups) -> Self {
        Self { groups }
    }

    fn resolve<S: StepAccess + ?Sized>(&self, traj: &S) -> TrajResult<Vec<Vec<usize>>> {
        let species = traj.species();
        let groups: Vec<Vec<usize>> = match &self.groups {
            GyrationGroups::ByType => (0..species.ntypes())
                .map(|ty| species.atoms_of_type(ty))
                .collect(),
            GyrationGroups::ImageReplicas => {
                let nper = species.natom_per_image();
                (0..species.nimage())
                    .map(|img| (img * nper..(img + 1) * nper).collect())
                    .collect()
            }
            GyrationGroups::Atoms(atoms) => {
                if atoms.is_empty() {
                    return Err(TrajError::Invalid("gyration group is empty".into()));
                }
                if let Some(&bad) = atoms.iter().find(|&&a| a >= traj.natom()) {
                    return Err(TrajError::OutOfRange(format!(
                        "atom {bad} not in a store of {} atoms",
                        traj.natom()
                    )));
                }
                vec![atoms.clone()]
            }
        };
        let total = groups.len();
        let groups: Vec<Vec<usize>> = groups.into_iter().filter(|g| !g.is_empty()).collect();
        if groups.len() < total {
            debug!("gyration skipped {} empty groups", total - groups.len());
        }
        Ok(groups)
    }
}

fn principal_moments(tensor: &[[f64; 3]; 3]) -> [f64; 3] {
    let m = Matrix3::from_fn(|r, c| tensor[r][c]);
    let eigen = m.symmetric_eigen();
    let mut vals = [eigen.eigenvalues[0], eigen.eigenvalues[1], eigen.eigenvalues[2]];
    vals.sort_by(|a, b| a.total_cmp(b));
    vals
}

impl Analysis for GyrationPlan {
    type Output = GyrationOutput;

    fn name(&self) -> &'static str {
        "gyration"
    }

    fn run<S>(&self, traj: &S, tbegin: usize, tend: usize) -> TrajResult<GyrationOutput>
    where
        S: StepAccess + ?Sized,
    {
        let window = traj.check_times(tbegin, tend)?;
        let groups = self.resolve(traj)?;
        let mut frames = Vec::with_capacity(window.len());
        for t in window.steps() {
            let cell = traj.cell(t)?;
            let x = traj.xcart(t)?;
            let mut row = Vec::with_capacity(groups.len());
            for group in &groups {
                let Some(&first) = group.first() else { continue };
                let anchor = x[first];
                let pos: Vec<[f64; 3]> = group
                    .iter()
                    .map(|&a| {
                        if traj.is_periodic() {
                            let d = cell.minimum_image(x[a], anchor);
                            [anchor[0] + d[0], anchor[1] + d[1], anchor[2] + d[2]]
                        } else {
                            x[a]
                        }
                    })
                    .collect();
                let inv_n = 1.0 / pos.len() as f64;
                let center = center_of_geometry(&pos);
                let mut tensor = [[0.0f64; 3]; 3];
                for p in &pos {
                    let d = [p[0] - center[0], p[1] - center[1], p[2] - center[2]];
                    for r in 0..3 {
                        for c in 0..3 {
                            tensor[r][c] += d[r] * d[c] * inv_n;
                        }
                    }
                }
                let trace = tensor[0][0] + tensor[1][1] + tensor[2][2];
                row.push(GyrationTensor {
                    tensor,
                    principal: principal_moments(&tensor),
                    rg: trace.max(0.0).sqrt(),
                });
            }
            frames.push(row);
        }
        Ok(GyrationOutput { groups, frames })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use traj_store::{Snapshot, Species, Trajectory};

    fn store(periodic: bool, x: Vec<[f64; 3]>, znucl: &[u32]) -> Trajectory {
        let snap = Snapshot::from_cartesian(
            [1.0; 3],
            [[10.0, 0.0, 0.0], [0.0, 10.0, 0.0], [0.0, 0.0, 10.0]],
            x,
            0.0,
        )
        .unwrap();
        Trajectory::from_snapshots(Species::from_znucl_per_atom(znucl), periodic, vec![snap]).unwrap()
    }

    #[test]
    fn dimer_split_across_boundary() {
        // Atoms at 9.5 and 0.5 are 1 apart through the boundary.
        let traj = store(true, vec![[9.5, 5.0, 5.0], [0.5, 5.0, 5.0]], &[6, 6]);
        let out = GyrationPlan::new(GyrationGroups::ByType).run(&traj, 0, 1).unwrap();
        let g = out.frames[0][0];
        assert!((g.tensor[0][0] - 0.25).abs() < 1e-12);
        assert!((g.rg - 0.5).abs() < 1e-12);
        assert!(g.principal[0].abs() < 1e-12);
        assert!((g.principal[2] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn groups_follow_types() {
        let traj = store(
            false,
            vec![[0.0; 3], [1.0, 0.0, 0.0], [0.0, 0.0, 0.0], [0.0, 2.0, 0.0]],
            &[1, 8, 8, 1],
        );
        let out = GyrationPlan::new(GyrationGroups::ByType).run(&traj, 0, 1).unwrap();
        assert_eq!(out.groups, vec![vec![0, 3], vec![1, 2]]);
        assert!((out.frames[0][0].rg - 1.0).abs() < 1e-12);
        assert!((out.frames[0][1].rg - 0.5).abs() < 1e-12);
    }

    #[test]
    fn empty_groups_are_skipped() {
        // Oxygen is declared but no atom uses it.
        let species = Species::new(vec![0, 0], vec![1, 8], 1).unwrap();
        let snap = Snapshot::from_cartesian(
            [1.0; 3],
            [[10.0, 0.0, 0.0], [0.0, 10.0, 0.0], [0.0, 0.0, 10.0]],
            vec![[1.0, 1.0, 1.0], [3.0, 1.0, 1.0]],
            0.0,
        )
        .unwrap();
        let traj = Trajectory::from_snapshots(species, true, vec![snap]).unwrap();
        let out = GyrationPlan::new(GyrationGroups::ByType).run(&traj, 0, 1).unwrap();
        assert_eq!(out.groups, vec![vec![0, 1]]);
        assert_eq!(out.frames[0].len(), 1);
        assert!((out.frames[0][0].rg - 1.0).abs() < 1e-12);

        let species = Species::new(Vec::new(), vec![1], 2).unwrap();
        let snap = Snapshot::from_cartesian(
            [1.0; 3],
            [[10.0, 0.0, 0.0], [0.0, 10.0, 0.0], [0.0, 0.0, 10.0]],
            Vec::new(),
            0.0,
        )
        .unwrap();
        let empty = Trajectory::from_snapshots(species, false, vec![snap]).unwrap();
        let out = GyrationPlan::new(GyrationGroups::ImageReplicas).run(&empty, 0, 1).unwrap();
        assert!(out.groups.is_empty());
        assert!(out.frames[0].is_empty());
    }

    #[test]
    fn explicit_group_is_checked() {
        let traj = store(false, vec![[0.0; 3]], &[1]);
        let plan = GyrationPlan::new(GyrationGroups::Atoms(vec![0, 4]));
        assert!(matches!(plan.run(&traj, 0, 1), Err(TrajError::OutOfRange(_))));
        let plan = GyrationPlan::new(GyrationGroups::Atoms(Vec::new()));
        assert!(matches!(plan.run(&traj, 0, 1), Err(TrajError::Invalid(_))));
    }
}
