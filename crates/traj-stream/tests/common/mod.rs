#![allow(dead_code)]

use traj_store::{Snapshot, Species, Trajectory};

pub fn cubic(l: f64) -> [[f64; 3]; 3] {
    [[l, 0.0, 0.0], [0.0, l, 0.0], [0.0, 0.0, l]]
}

/// `n` snapshots of a water-like O/H/H triple drifting along x.
pub fn water_frames(n: usize) -> Vec<Snapshot> {
    (0..n)
        .map(|t| {
            let dx = 0.05 * t as f64;
            Snapshot::from_cartesian(
                [1.0; 3],
                cubic(12.0),
                vec![
                    [1.0 + dx, 1.0, 1.0],
                    [2.8 + dx, 1.0, 1.0],
                    [0.4 + dx, 2.7, 1.0],
                ],
                0.5 * t as f64,
            )
            .expect("snapshot")
            .with_etotal(-17.0 - 0.01 * t as f64)
            .with_stress([1e-5, 2e-5, 3e-5, 0.0, 0.0, 0.0])
        })
        .collect()
}

pub fn water_species() -> Species {
    Species::from_znucl_per_atom(&[8, 1, 1])
}

pub fn water_store(n: usize) -> Trajectory {
    Trajectory::from_snapshots(water_species(), true, water_frames(n)).expect("store")
}

pub fn assert_close(a: f64, b: f64, tol: f64) {
    assert!((a - b).abs() < tol, "{a} != {b} (tol {tol})");
}
