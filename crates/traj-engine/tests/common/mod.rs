#![allow(dead_code)]

use traj_store::{Snapshot, Species, Trajectory};

pub fn cubic(l: f64) -> [[f64; 3]; 3] {
    [[l, 0.0, 0.0], [0.0, l, 0.0], [0.0, 0.0, l]]
}

/// Deterministic pseudo-random walk of `natom` atoms of alternating
/// hydrogen and oxygen in a periodic cube, one time unit per step.
pub fn random_walk(natom: usize, ntime: usize, box_len: f64, seed: u64) -> Trajectory {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    let mut next = move || {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        ((state >> 11) as f64 / (1u64 << 53) as f64) - 0.5
    };
    let znucl: Vec<u32> = (0..natom).map(|i| if i % 2 == 0 { 1 } else { 8 }).collect();
    let mut x: Vec<[f64; 3]> = (0..natom)
        .map(|i| [0.3 * i as f64, 0.5 * box_len, 0.25 * box_len])
        .collect();
    let mut snaps = Vec::with_capacity(ntime);
    for t in 0..ntime {
        let wrapped = x
            .iter()
            .map(|p| p.map(|c| c.rem_euclid(box_len)))
            .collect();
        snaps.push(
            Snapshot::from_cartesian([1.0; 3], cubic(box_len), wrapped, t as f64)
                .expect("snapshot")
                .with_etotal(-10.0 + 0.01 * next())
                .with_stress([1e-5, 1e-5, 1e-5, 0.0, 0.0, 0.0]),
        );
        for p in &mut x {
            for c in p.iter_mut() {
                *c += 0.4 * next();
            }
        }
    }
    Trajectory::from_snapshots(Species::from_znucl_per_atom(&znucl), true, snaps).expect("store")
}
