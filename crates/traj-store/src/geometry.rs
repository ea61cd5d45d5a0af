//! Per-step geometric queries and in-place periodic transforms.

use crate::cell::{fold_reduced, nearest_image};
use crate::error::{check_index, TrajError, TrajResult};
use crate::geom::{angle_from_vectors, Vec3};
use crate::trajectory::Trajectory;

fn displacement(traj: &Trajectory, from: usize, to: usize, t: usize) -> TrajResult<Vec3> {
    let natom = traj.natom();
    check_index("atom", from, natom)?;
    check_index("atom", to, natom)?;
    let snap = traj.snapshot(t)?;
    let a = snap.xcart()[to];
    let b = snap.xcart()[from];
    if traj.is_periodic() {
        Ok(Vec3::from_array(snap.cell()?.minimum_image(a, b)))
    } else {
        Ok(Vec3::from_array(a).sub(Vec3::from_array(b)))
    }
}

/// Distance between two atoms at step `t` (minimum image when periodic).
pub fn distance(traj: &Trajectory, atom_a: usize, atom_b: usize, t: usize) -> TrajResult<f64> {
    Ok(displacement(traj, atom_a, atom_b, t)?.norm())
}

/// Angle at `atom_b` formed with `atom_a` and `atom_c`, in radians.
pub fn angle(
    traj: &Trajectory,
    atom_a: usize,
    atom_b: usize,
    atom_c: usize,
    t: usize,
) -> TrajResult<f64> {
    let ba = displacement(traj, atom_b, atom_a, t)?;
    let bc = displacement(traj, atom_b, atom_c, t)?;
    angle_from_vectors(ba, bc).ok_or_else(|| {
        TrajError::Invalid(format!(
            "angle {atom_a}-{atom_b}-{atom_c} undefined at step {t}: coincident atoms"
        ))
    })
}

/// Fold step `t` into the cell (`to_periodic`) or re-attach it to the
/// nearest images of step `t - 1`. Unwrapping step 0 is a no-op.
pub fn wrap(traj: &mut Trajectory, t: usize, to_periodic: bool) -> TrajResult<()> {
    check_index("time step", t, traj.ntime())?;
    if !to_periodic && t == 0 {
        return Ok(());
    }
    let previous = if to_periodic {
        None
    } else {
        Some(traj.steps[t - 1].xred.clone())
    };
    let snap = traj.snapshot_mut(t)?;
    let cell = snap.cell()?;
    match previous {
        None => {
            for red in snap.xred.iter_mut() {
                *red = red.map(fold_reduced);
            }
        }
        Some(prev) => {
            for (red, p) in snap.xred.iter_mut().zip(prev.iter()) {
                for k in 0..3 {
                    red[k] = nearest_image(red[k], p[k]);
                }
            }
        }
    }
    snap.sync_all_cartesian(&cell);
    Ok(())
}

/// Apply [`wrap`] to every step in order and record the new policy.
pub fn wrap_all(traj: &mut Trajectory, to_periodic: bool) -> TrajResult<()> {
    for t in 0..traj.ntime() {
        wrap(traj, t, to_periodic)?;
    }
    traj.set_periodic(to_periodic);
    Ok(())
}

/// Scale the lattice vectors of step `t`, keeping reduced coordinates.
pub fn scale_cell(traj: &mut Trajectory, t: usize, factors: [f64; 3]) -> TrajResult<()> {
    let snap = traj.snapshot_mut(t)?;
    let cell = snap.cell()?.scaled(factors)?;
    snap.rprimd = *cell.rprimd();
    for (a, f) in snap.acell.iter_mut().zip(factors.iter()) {
        *a *= f;
    }
    snap.sync_all_cartesian(&cell);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{Snapshot, Species};

    fn cubic(l: f64) -> [[f64; 3]; 3] {
        [[l, 0.0, 0.0], [0.0, l, 0.0], [0.0, 0.0, l]]
    }

    fn store(periodic: bool, xcart: Vec<[f64; 3]>) -> Trajectory {
        let n = xcart.len();
        let species = Species::new(vec![0; n], vec![14], 1).unwrap();
        let snap = Snapshot::from_cartesian([1.0; 3], cubic(10.0), xcart, 0.0).unwrap();
        Trajectory::from_snapshots(species, periodic, vec![snap]).unwrap()
    }

    #[test]
    fn distance_uses_minimum_image_only_when_periodic() {
        let xcart = vec![[0.5, 0.0, 0.0], [9.5, 0.0, 0.0]];
        let periodic = store(true, xcart.clone());
        let open = store(false, xcart);
        assert!((distance(&periodic, 0, 1, 0).unwrap() - 1.0).abs() < 1e-12);
        assert!((distance(&open, 0, 1, 0).unwrap() - 9.0).abs() < 1e-12);
        assert!(matches!(distance(&open, 0, 2, 0), Err(TrajError::OutOfRange(_))));
        assert!(matches!(distance(&open, 0, 1, 1), Err(TrajError::OutOfRange(_))));
    }

    #[test]
    fn right_angle_across_boundary() {
        let traj = store(
            true,
            vec![[9.0, 0.0, 0.0], [0.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
        );
        let theta = angle(&traj, 0, 1, 2, 0).unwrap();
        assert!((theta - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn coincident_atoms_have_no_angle() {
        let traj = store(false, vec![[1.0, 0.0, 0.0], [1.0, 0.0, 0.0], [2.0, 0.0, 0.0]]);
        assert!(matches!(angle(&traj, 0, 1, 2, 0), Err(TrajError::Invalid(_))));
    }

    #[test]
    fn scale_cell_keeps_reduced_coordinates() {
        let mut traj = store(false, vec![[5.0, 5.0, 5.0]]);
        scale_cell(&mut traj, 0, [2.0, 1.0, 1.0]).unwrap();
        assert!((traj.xred(0).unwrap()[0][0] - 0.5).abs() < 1e-12);
        assert!((traj.xcart(0).unwrap()[0][0] - 10.0).abs() < 1e-12);
        assert!((traj.acell(0).unwrap()[0] - 2.0).abs() < 1e-12);
        assert!(scale_cell(&mut traj, 0, [0.0, 1.0, 1.0]).is_err());
    }
}
