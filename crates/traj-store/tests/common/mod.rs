#![allow(dead_code)]

use traj_store::{Snapshot, Species, Trajectory};

pub fn cubic(l: f64) -> [[f64; 3]; 3] {
    [[l, 0.0, 0.0], [0.0, l, 0.0], [0.0, 0.0, l]]
}

/// Store built from cartesian frames in a cubic box, one time unit apart.
pub fn cartesian_store(
    znucl_per_atom: &[u32],
    box_len: f64,
    periodic: bool,
    frames: Vec<Vec<[f64; 3]>>,
) -> Trajectory {
    let species = Species::from_znucl_per_atom(znucl_per_atom);
    let snaps = frames
        .into_iter()
        .enumerate()
        .map(|(t, x)| {
            Snapshot::from_cartesian([1.0; 3], cubic(box_len), x, t as f64)
                .expect("snapshot")
        })
        .collect();
    Trajectory::from_snapshots(species, periodic, snaps).expect("store")
}

/// Two atoms translating rigidly by `step` per frame, unwrapped.
pub fn rigid_drift(ntime: usize, step: [f64; 3]) -> Vec<Vec<[f64; 3]>> {
    let base = [[1.0, 2.0, 3.0], [4.0, 4.5, 1.5]];
    (0..ntime)
        .map(|t| {
            base.iter()
                .map(|p| {
                    [
                        p[0] + step[0] * t as f64,
                        p[1] + step[1] * t as f64,
                        p[2] + step[2] * t as f64,
                    ]
                })
                .collect()
        })
        .collect()
}

pub fn assert_close(a: f64, b: f64, tol: f64) {
    assert!((a - b).abs() < tol, "{a} != {b} (tol {tol})");
}
