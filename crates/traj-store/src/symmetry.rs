//! Seam to an external space-group finder.

use crate::error::{TrajError, TrajResult};
use crate::trajectory::Trajectory;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpaceGroup {
    /// International table number, 1..=230.
    pub number: u32,
    /// Hermann–Mauguin symbol.
    pub hm_symbol: String,
}

/// Space-group detection delegated to a symmetry library.
pub trait SymmetryFinder {
    fn find(
        &self,
        rprimd: &[[f64; 3]; 3],
        xred: &[[f64; 3]],
        znucl_per_atom: &[u32],
        tolerance: f64,
    ) -> TrajResult<SpaceGroup>;
}

impl Trajectory {
    fn space_group(
        &self,
        finder: &dyn SymmetryFinder,
        t: usize,
        tolerance: f64,
    ) -> TrajResult<SpaceGroup> {
        if tolerance <= 0.0 || tolerance.is_nan() {
            return Err(TrajError::Invalid(format!(
                "symmetry tolerance must be positive, got {tolerance}"
            )));
        }
        let snap = self.snapshot(t)?;
        let znucl: Vec<u32> = (0..self.natom())
            .map(|a| self.species().znucl_of(a))
            .collect();
        let group = finder.find(snap.rprimd(), snap.xred(), &znucl, tolerance)?;
        if !(1..=230).contains(&group.number) {
            return Err(TrajError::Invalid(format!(
                "symmetry finder returned space group {}",
                group.number
            )));
        }
        Ok(group)
    }

    pub fn spg_number(
        &self,
        finder: &dyn SymmetryFinder,
        t: usize,
        tolerance: f64,
    ) -> TrajResult<u32> {
        Ok(self.space_group(finder, t, tolerance)?.number)
    }

    pub fn spg_hm(
        &self,
        finder: &dyn SymmetryFinder,
        t: usize,
        tolerance: f64,
    ) -> TrajResult<String> {
        Ok(self.space_group(finder, t, tolerance)?.hm_symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{Snapshot, Species};

    struct CubicOnly;

    impl SymmetryFinder for CubicOnly {
        fn find(
            &self,
            rprimd: &[[f64; 3]; 3],
            xred: &[[f64; 3]],
            _znucl_per_atom: &[u32],
            _tolerance: f64,
        ) -> TrajResult<SpaceGroup> {
            let l = rprimd[0][0];
            let cubic = (rprimd[1][1] - l).abs() < 1e-8 && (rprimd[2][2] - l).abs() < 1e-8;
            if cubic && xred.len() == 1 {
                Ok(SpaceGroup {
                    number: 221,
                    hm_symbol: "Pm-3m".into(),
                })
            } else {
                Ok(SpaceGroup {
                    number: 1,
                    hm_symbol: "P1".into(),
                })
            }
        }
    }

    #[test]
    fn delegates_to_finder() {
        let species = Species::new(vec![0], vec![29], 1).unwrap();
        let snap = Snapshot::from_reduced(
            [1.0; 3],
            [[3.6, 0.0, 0.0], [0.0, 3.6, 0.0], [0.0, 0.0, 3.6]],
            vec![[0.0; 3]],
            0.0,
        )
        .unwrap();
        let traj = Trajectory::from_snapshots(species, true, vec![snap]).unwrap();
        assert_eq!(traj.spg_number(&CubicOnly, 0, 1e-3).unwrap(), 221);
        assert_eq!(traj.spg_hm(&CubicOnly, 0, 1e-3).unwrap(), "Pm-3m");
        assert!(traj.spg_number(&CubicOnly, 1, 1e-3).is_err());
        assert!(traj.spg_number(&CubicOnly, 0, 0.0).is_err());
    }
}
